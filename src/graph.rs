use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use crate::{Error, Operator, OperatorCode, Result, TensorData, TensorMeta};

/// Raw byte storage referenced by constant tensors.
///
/// Small models carry the bytes inline in `data`. Models past the flatbuffer
/// size limit store them after the flatbuffer and record where instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Buffer {
    #[serde(default)]
    pub data: Vec<u8>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// What a tensor's buffer holds, as far as the document can tell
#[derive(Debug, Clone, PartialEq)]
pub enum BufferContents {
    /// No buffer attached, or the buffer is empty (activations, graph inputs)
    Empty,
    /// Bytes stored in the document, decoded to the tensor's type
    Inline(TensorData),
    /// Bytes stored in the model file outside the document
    External { offset: u64, size: u64 },
}

/// One executable graph of the model
#[derive(Debug, Clone, Deserialize)]
pub struct SubGraph {
    pub tensors: Vec<TensorMeta>,
    pub operators: Vec<Operator>,
    #[serde(default)]
    pub inputs: Vec<i32>,
    #[serde(default)]
    pub outputs: Vec<i32>,
    #[serde(default)]
    pub name: Option<String>,
}

impl SubGraph {
    /// Get tensor metadata by index
    pub fn tensor(&self, index: usize) -> Option<&TensorMeta> {
        self.tensors.get(index)
    }
}

/// Typed graph description of a compiled model.
///
/// This is the JSON rendering of the model schema (as written by
/// `flatc --json`), parsed and validated once. Every constructor runs
/// [`validate`](Self::validate).
#[derive(Debug, Clone, Deserialize)]
pub struct GraphDescription {
    pub operator_codes: Vec<OperatorCode>,
    pub subgraphs: Vec<SubGraph>,
    #[serde(default)]
    pub buffers: Vec<Buffer>,
    #[serde(default)]
    pub version: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
}

impl GraphDescription {
    /// Load graph description from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::load_from_str(&text)
    }

    /// Load graph description from JSON text
    pub fn load_from_str(json: &str) -> Result<Self> {
        let graph: GraphDescription = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Load graph description from JSON bytes
    pub fn load_from_slice(json: &[u8]) -> Result<Self> {
        let graph: GraphDescription = serde_json::from_slice(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Build from an already parsed JSON document
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let graph: GraphDescription = serde_json::from_value(value)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Check cross references between operators, operator codes and tensors
    pub fn validate(&self) -> Result<()> {
        if self.subgraphs.is_empty() {
            return Err(Error::InvalidModel("No subgraph found in model".to_string()));
        }

        for (code_idx, code) in self.operator_codes.iter().enumerate() {
            code.builtin_name().map_err(|_| {
                Error::MissingField(format!("operator_codes[{}].builtin_code", code_idx))
            })?;
        }

        for (sg_idx, subgraph) in self.subgraphs.iter().enumerate() {
            for (op_idx, op) in subgraph.operators.iter().enumerate() {
                if op.opcode_index as usize >= self.operator_codes.len() {
                    return Err(Error::InvalidModel(format!(
                        "subgraph {} operator {}: opcode_index {} out of range ({} operator codes)",
                        sg_idx,
                        op_idx,
                        op.opcode_index,
                        self.operator_codes.len()
                    )));
                }
                op.check_indices(subgraph.tensors.len()).map_err(|e| {
                    Error::InvalidModel(format!("subgraph {} operator {}: {}", sg_idx, op_idx, e))
                })?;
            }
        }

        Ok(())
    }

    /// Get subgraph by index
    pub fn subgraph(&self, index: usize) -> Option<&SubGraph> {
        self.subgraphs.get(index)
    }

    /// The main graph, the one the interpreter runs
    pub fn primary_subgraph(&self) -> &SubGraph {
        // validate() guarantees at least one subgraph
        &self.subgraphs[0]
    }

    /// Builtin name of the operation an operator runs
    pub fn operator_type(&self, op: &Operator) -> Result<String> {
        self.operator_codes
            .get(op.opcode_index as usize)
            .ok_or_else(|| {
                Error::InvalidModel(format!("opcode_index {} out of range", op.opcode_index))
            })?
            .builtin_name()
    }

    /// Decode the constant data behind a tensor of the primary subgraph.
    ///
    /// `offset` 0 and 1 are placeholders the converter writes for buffers
    /// that live inline, so only larger offsets count as external storage.
    pub fn constant_data(&self, tensor_index: usize) -> Result<BufferContents> {
        let tensor = self
            .primary_subgraph()
            .tensor(tensor_index)
            .ok_or_else(|| Error::InvalidModel(format!("tensor {} out of range", tensor_index)))?;

        let Some(buffer) = tensor
            .buffer()
            .and_then(|b| self.buffers.get(b as usize))
        else {
            return Ok(BufferContents::Empty);
        };

        if !buffer.data.is_empty() {
            return TensorData::from_le_bytes(tensor.data_type(), &buffer.data)
                .map(BufferContents::Inline);
        }
        match (buffer.offset, buffer.size) {
            (Some(offset), Some(size)) if offset > 1 && size > 0 => {
                Ok(BufferContents::External { offset, size })
            }
            _ => Ok(BufferContents::Empty),
        }
    }

    /// Get all operation types in the primary subgraph, sorted and unique
    pub fn operation_types(&self) -> Result<Vec<String>> {
        let mut set = BTreeSet::new();
        for op in &self.primary_subgraph().operators {
            set.insert(self.operator_type(op)?);
        }
        Ok(set.into_iter().collect())
    }

    /// Count operations by type in the primary subgraph
    pub fn count_operations_by_type(&self) -> Result<HashMap<String, usize>> {
        let operators = &self.primary_subgraph().operators;
        let mut counts = HashMap::with_capacity(operators.len());
        for op in operators {
            *counts.entry(self.operator_type(op)?).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Print a summary of the model
    pub fn print_summary(&self) {
        println!("=== Graph Summary ===");
        println!(
            "Subgraphs: {} | Operator codes: {} | Buffers: {}",
            self.subgraphs.len(),
            self.operator_codes.len(),
            self.buffers.len()
        );
        if let Some(description) = &self.description {
            println!("Description: {}", description);
        }

        for (idx, code) in self.operator_codes.iter().enumerate() {
            let name = code
                .builtin_name()
                .unwrap_or_else(|_| "<unresolved>".to_string());
            match code.custom_code() {
                Some(custom) => {
                    println!("  code {}: {} ({}) v{}", idx, name, custom, code.version())
                }
                None => println!("  code {}: {} v{}", idx, name, code.version()),
            }
        }

        let main = self.primary_subgraph();
        println!(
            "Inputs: {:?} | Outputs: {:?} | Operators: {} | Tensors: {}",
            main.inputs,
            main.outputs,
            main.operators.len(),
            main.tensors.len()
        );

        for (idx, op) in main.operators.iter().enumerate() {
            let op_type = self
                .operator_type(op)
                .unwrap_or_else(|_| "<unresolved>".to_string());
            println!("  [{}] {}: {:?} -> {:?}", idx, op_type, op.inputs, op.outputs);
        }
    }
}
