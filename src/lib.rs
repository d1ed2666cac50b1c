//! # tflite-trace
//!
//! Per-operator tensor tracing for quantized TFLite inference runs.
//!
//! Given a live interpreter, the JSON graph description of the same model and
//! a sample input, this crate runs one forward pass and reports, for every
//! operator in graph order:
//! - the operator's builtin type
//! - each input and output tensor's name, index, dtype, shape and quantization
//! - the tensor's value as the interpreter holds it after the run
//!
//! A tensor the interpreter cannot produce is reported as `Unavailable`
//! instead of failing the whole trace.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tflite_trace::{GraphDescription, Interpreter, TensorData, TensorValue, build_trace};
//!
//! # fn run(interpreter: &mut impl Interpreter) -> tflite_trace::Result<()> {
//! let graph = GraphDescription::load_from_file("model_int8.json")?;
//! graph.print_summary();
//!
//! let sample = TensorValue::new(vec![1, 4], TensorData::Int8(vec![-3, 0, 7, 12]))?;
//! let trace = build_trace(interpreter, &graph, &sample)?;
//! for record in &trace {
//!     println!("{} {}: {} unavailable", record.op_index, record.op_type, record.unavailable_count());
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod graph;
pub mod interpreter;
pub mod kernel;
pub mod operation;
pub mod proto_adapter;
pub mod tensor;
pub mod trace;
pub mod types;

pub use error::{Error, Result};
pub use graph::{Buffer, BufferContents, GraphDescription, SubGraph};
pub use interpreter::{Interpreter, ReadError, TensorDetails, TensorRead};
pub use operation::{OPTIONAL_TENSOR, Operator, OperatorCode};
pub use proto_adapter::{decode_trace, encode_trace};
pub use tensor::{QuantizationParams, TensorData, TensorMeta, TensorValue};
pub use trace::{
    TensorSnapshot, TensorValues, TraceBuilder, TraceOptions, TraceRecord, build_trace,
};
pub use types::DataType;
