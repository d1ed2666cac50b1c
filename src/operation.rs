use serde::Deserialize;

use crate::types::{EnumRepr, builtin_operator_name};
use crate::{Error, Result};

/// Input slot value meaning "no tensor connected"
pub const OPTIONAL_TENSOR: i32 = -1;

/// Entry of the model-wide `operator_codes` table
#[derive(Debug, Clone, Deserialize)]
pub struct OperatorCode {
    #[serde(default)]
    builtin_code: Option<EnumRepr>,
    #[serde(default)]
    deprecated_builtin_code: Option<i64>,
    #[serde(default)]
    custom_code: Option<String>,
    #[serde(default)]
    version: Option<i32>,
}

impl OperatorCode {
    /// Builtin operation name, e.g. `CONV_2D`.
    ///
    /// Uses `builtin_code` and falls back to `deprecated_builtin_code` for
    /// models written before the code space was widened.
    pub fn builtin_name(&self) -> Result<String> {
        match (&self.builtin_code, self.deprecated_builtin_code) {
            (Some(EnumRepr::Name(name)), _) => Ok(name.clone()),
            (Some(EnumRepr::Code(code)), _) => Ok(builtin_operator_name(*code)),
            (None, Some(code)) => Ok(builtin_operator_name(code)),
            (None, None) => Err(Error::MissingField("builtin_code".to_string())),
        }
    }

    /// Name of a custom op, set when the builtin name is `CUSTOM`
    pub fn custom_code(&self) -> Option<&str> {
        self.custom_code.as_deref()
    }

    /// Kernel version, 1 when not declared
    pub fn version(&self) -> i32 {
        self.version.unwrap_or(1)
    }
}

/// One computation step of a subgraph
#[derive(Debug, Clone, Deserialize)]
pub struct Operator {
    pub opcode_index: u32,
    #[serde(default)]
    pub inputs: Vec<i32>,
    #[serde(default)]
    pub outputs: Vec<i32>,
}

impl Operator {
    /// Connected input tensor indices in declared order, optional slots removed
    pub fn connected_inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.inputs
            .iter()
            .filter(|&&idx| idx != OPTIONAL_TENSOR)
            .map(|&idx| idx as usize)
    }

    /// Output tensor indices in declared order, duplicates kept
    pub fn output_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.outputs.iter().map(|&idx| idx as usize)
    }

    /// Check every referenced tensor index against the subgraph's tensor count.
    ///
    /// `-1` is only allowed in input slots.
    pub(crate) fn check_indices(&self, tensor_count: usize) -> Result<()> {
        let in_range = |idx: i32| usize::try_from(idx).is_ok_and(|i| i < tensor_count);

        for &idx in &self.inputs {
            if idx != OPTIONAL_TENSOR && !in_range(idx) {
                return Err(Error::InvalidModel(format!(
                    "input tensor index {} out of range ({} tensors)",
                    idx, tensor_count
                )));
            }
        }
        for &idx in &self.outputs {
            if !in_range(idx) {
                return Err(Error::InvalidModel(format!(
                    "output tensor index {} out of range ({} tensors)",
                    idx, tensor_count
                )));
            }
        }
        Ok(())
    }
}
