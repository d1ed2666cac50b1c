//! The seam between the trace builder and a live inference runtime.
//!
//! The crate never constructs or drives a runtime on its own; callers wrap
//! whatever interpreter they use (TFLite bindings, a recorded run, a test
//! double) in an [`Interpreter`] implementation. The runtime must be
//! configured to keep intermediate tensors alive after `invoke`, otherwise
//! most reads come back as [`ReadError::NotAllocated`].

use std::fmt;

use crate::{DataType, Result, TensorData, TensorValue};

/// Declared properties of an interpreter input slot
#[derive(Debug, Clone, PartialEq)]
pub struct TensorDetails {
    pub name: String,
    pub index: usize,
    pub dtype: DataType,
    pub shape: Vec<usize>,
}

/// Why a tensor value could not be read
#[derive(Debug, Clone, PartialEq)]
pub enum ReadError {
    /// The tensor has no buffer, e.g. it was freed or never materialised
    NotAllocated(usize),
    /// The runtime knows no tensor with this index
    OutOfRange(usize),
    /// Any other runtime-specific failure
    Backend(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadError::NotAllocated(idx) => write!(f, "tensor {} is not allocated", idx),
            ReadError::OutOfRange(idx) => write!(f, "tensor {} does not exist", idx),
            ReadError::Backend(msg) => write!(f, "backend read failed: {}", msg),
        }
    }
}

impl std::error::Error for ReadError {}

/// Outcome of reading one tensor from the interpreter
pub type TensorRead = std::result::Result<TensorData, ReadError>;

/// A live, already constructed model interpreter.
///
/// Methods that fail structurally (`allocate_tensors`, `set_tensor`,
/// `invoke`) return the crate [`Error`](crate::Error); a trace build stops at
/// the first such failure. `get_tensor` reports through [`TensorRead`] so
/// the builder can degrade a single tensor instead.
pub trait Interpreter {
    /// Allocate buffers for every tensor of the model
    fn allocate_tensors(&mut self) -> Result<()>;

    /// Input slots in declaration order
    fn input_details(&self) -> Vec<TensorDetails>;

    /// Write `value` into the tensor at `index`; shape or dtype mismatches are errors
    fn set_tensor(&mut self, index: usize, value: TensorValue) -> Result<()>;

    /// Run one forward pass synchronously
    fn invoke(&mut self) -> Result<()>;

    /// Current contents of the tensor at `index`
    fn get_tensor(&self, index: usize) -> TensorRead;
}
