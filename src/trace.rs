//! Per-operator trace of one inference run.
//!
//! [`build_trace`] runs the interpreter once on a sample input and then walks
//! the operators of the graph description in order, pairing each input and
//! output tensor's static metadata with the value the interpreter holds for
//! it after the run.

use serde::{Deserialize, Serialize, Serializer};
use std::fs;
use std::path::Path;

use crate::{
    DataType, Error, GraphDescription, Interpreter, QuantizationParams, Result, SubGraph,
    TensorData, TensorValue,
};

/// Value slot of a snapshot
#[derive(Debug, Clone, PartialEq)]
pub enum TensorValues {
    /// Contents read back from the interpreter after the run
    Available(TensorData),
    /// The read failed; serialised as the string `"Unavailable"`
    Unavailable,
}

impl TensorValues {
    pub fn is_available(&self) -> bool {
        self.data().is_some()
    }

    /// Borrow the data, if it was read
    pub fn data(&self) -> Option<&TensorData> {
        match self {
            TensorValues::Available(data) => Some(data),
            TensorValues::Unavailable => None,
        }
    }
}

impl Serialize for TensorValues {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TensorValues::Available(data) => data.serialize(serializer),
            TensorValues::Unavailable => serializer.serialize_str("Unavailable"),
        }
    }
}

/// Metadata and observed value of one tensor at one operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorSnapshot {
    pub name: String,
    pub index: usize,
    pub dtype: DataType,
    pub shape: Vec<i32>,
    pub quantization: QuantizationParams,
    pub values: TensorValues,
}

/// Everything observed around a single operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceRecord {
    pub op_index: usize,
    pub op_type: String,
    pub inputs: Vec<TensorSnapshot>,
    pub outputs: Vec<TensorSnapshot>,
}

impl TraceRecord {
    /// Inputs followed by outputs
    pub fn snapshots(&self) -> impl Iterator<Item = &TensorSnapshot> {
        self.inputs.iter().chain(self.outputs.iter())
    }

    /// Number of snapshots whose value could not be read
    pub fn unavailable_count(&self) -> usize {
        self.snapshots()
            .filter(|s| !s.values.is_available())
            .count()
    }
}

/// Trace builder settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TraceOptions {
    /// Subgraph whose operators are traced
    pub subgraph: usize,
    /// Position in `input_details()` that receives the sample input
    pub input_slot: usize,
}

/// Runs an interpreter once and collects per-operator snapshots
#[derive(Debug, Clone, Default)]
pub struct TraceBuilder {
    options: TraceOptions,
}

impl TraceBuilder {
    pub fn new(options: TraceOptions) -> Self {
        Self { options }
    }

    /// Run `interpreter` on `sample_input` and trace every operator.
    ///
    /// The sample is cast to the declared dtype of the selected input slot.
    /// Errors from allocation, the input write or the forward pass abort the
    /// build; a tensor that cannot be read afterwards is reported as
    /// [`TensorValues::Unavailable`] and the build carries on.
    pub fn build<I: Interpreter + ?Sized>(
        &self,
        interpreter: &mut I,
        graph: &GraphDescription,
        sample_input: &TensorValue,
    ) -> Result<Vec<TraceRecord>> {
        let subgraph = graph.subgraph(self.options.subgraph).ok_or_else(|| {
            Error::InvalidModel(format!(
                "subgraph {} requested but model has {}",
                self.options.subgraph,
                graph.subgraphs.len()
            ))
        })?;

        interpreter.allocate_tensors()?;

        let input_details = interpreter.input_details();
        let slot = input_details.get(self.options.input_slot).ok_or_else(|| {
            Error::Interpreter(format!(
                "input slot {} requested but interpreter declares {}",
                self.options.input_slot,
                input_details.len()
            ))
        })?;
        interpreter.set_tensor(slot.index, sample_input.cast(slot.dtype.clone())?)?;
        interpreter.invoke()?;

        log::info!(
            "tracing {} operators of subgraph {}",
            subgraph.operators.len(),
            self.options.subgraph
        );

        let mut trace = Vec::with_capacity(subgraph.operators.len());
        for (op_index, op) in subgraph.operators.iter().enumerate() {
            let op_type = graph.operator_type(op)?;

            let inputs = op
                .connected_inputs()
                .map(|idx| snapshot(&*interpreter, subgraph, idx))
                .collect::<Result<Vec<_>>>()?;
            let outputs = op
                .output_indices()
                .map(|idx| snapshot(&*interpreter, subgraph, idx))
                .collect::<Result<Vec<_>>>()?;

            trace.push(TraceRecord {
                op_index,
                op_type,
                inputs,
                outputs,
            });
        }

        let unavailable: usize = trace.iter().map(TraceRecord::unavailable_count).sum();
        log::info!(
            "trace complete: {} records, {} unavailable tensor reads",
            trace.len(),
            unavailable
        );

        Ok(trace)
    }
}

fn snapshot<I: Interpreter + ?Sized>(
    interpreter: &I,
    subgraph: &SubGraph,
    index: usize,
) -> Result<TensorSnapshot> {
    let meta = subgraph
        .tensor(index)
        .ok_or_else(|| Error::InvalidModel(format!("tensor index {} out of range", index)))?;

    let values = match interpreter.get_tensor(index) {
        Ok(data) => TensorValues::Available(data),
        Err(e) => {
            log::debug!("tensor {} unavailable: {}", index, e);
            TensorValues::Unavailable
        }
    };

    Ok(TensorSnapshot {
        name: meta.name(index),
        index,
        dtype: meta.data_type(),
        shape: meta.shape().to_vec(),
        quantization: meta.quantization(),
        values,
    })
}

/// Trace the first subgraph, feeding `sample_input` into the first input slot
pub fn build_trace<I: Interpreter + ?Sized>(
    interpreter: &mut I,
    graph: &GraphDescription,
    sample_input: &TensorValue,
) -> Result<Vec<TraceRecord>> {
    TraceBuilder::default().build(interpreter, graph, sample_input)
}

/// Render a trace as pretty-printed JSON
pub fn to_json(trace: &[TraceRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(trace)?)
}

/// Write a trace to `path` as pretty-printed JSON
pub fn write_json<P: AsRef<Path>>(path: P, trace: &[TraceRecord]) -> Result<()> {
    fs::write(path, to_json(trace)?)?;
    Ok(())
}
