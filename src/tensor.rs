use serde::{Deserialize, Serialize};

use crate::{DataType, Error, Result};

/// Per-tensor (or per-channel) scale and zero point.
///
/// Other keys of the document's quantization block (`min`, `max`,
/// `quantized_dimension`) are not part of a trace and are skipped on load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationParams {
    pub scale: Vec<f32>,
    pub zero_point: Vec<i64>,
}

impl QuantizationParams {
    /// Quantize real values to int8 with the first scale and zero point.
    ///
    /// Computes `round(x / scale + zero_point)` with ties to even and clips
    /// the result to `[-128, 127]`. A missing zero point counts as 0.
    pub fn quantize_int8(&self, values: &[f32]) -> Result<Vec<i8>> {
        let scale = *self
            .scale
            .first()
            .ok_or_else(|| Error::MissingField("quantization scale".to_string()))?;
        if scale == 0.0 || !scale.is_finite() {
            return Err(Error::DataConversion(format!(
                "quantization scale must be finite and non-zero, got {}",
                scale
            )));
        }
        let zero_point = self.zero_point.first().copied().unwrap_or(0) as f32;

        Ok(values
            .iter()
            .map(|&x| {
                (x / scale + zero_point)
                    .round_ties_even()
                    .clamp(i8::MIN as f32, i8::MAX as f32) as i8
            })
            .collect())
    }
}

/// Static metadata of one tensor in a subgraph.
///
/// Every field is optional in the document; use the accessors, which apply
/// the defaults a trace reports.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TensorMeta {
    name: Option<String>,
    #[serde(rename = "type")]
    data_type: Option<DataType>,
    shape: Option<Vec<i32>>,
    quantization: Option<QuantizationParams>,
    buffer: Option<u32>,
}

impl TensorMeta {
    /// Tensor name, or `tensor_<index>` when the document has none
    pub fn name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("tensor_{}", index))
    }

    /// Declared element type, [`DataType::Unknown`] when absent
    pub fn data_type(&self) -> DataType {
        self.data_type.clone().unwrap_or(DataType::Unknown)
    }

    /// Declared shape, empty when absent
    pub fn shape(&self) -> &[i32] {
        self.shape.as_deref().unwrap_or(&[])
    }

    /// Scale and zero point, both empty when the tensor is not quantized
    pub fn quantization(&self) -> QuantizationParams {
        self.quantization.clone().unwrap_or_default()
    }

    /// Index into the model's buffer table
    pub fn buffer(&self) -> Option<u32> {
        self.buffer
    }

    /// Number of elements implied by the declared shape
    pub fn element_count(&self) -> usize {
        self.shape()
            .iter()
            .map(|&d| usize::try_from(d).unwrap_or(0))
            .product()
    }
}

/// Live tensor contents, flattened in row-major order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TensorData {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Bool(Vec<bool>),
}

// `as` conversion of every element into the target type; bool targets
// compare against zero.
macro_rules! convert_to {
    ($values:expr, $target:expr) => {{
        let values = $values;
        match $target {
            DataType::Int8 => Ok(TensorData::Int8(values.iter().map(|&v| v as i8).collect())),
            DataType::Uint8 => Ok(TensorData::Uint8(values.iter().map(|&v| v as u8).collect())),
            DataType::Int16 => Ok(TensorData::Int16(values.iter().map(|&v| v as i16).collect())),
            DataType::Int32 => Ok(TensorData::Int32(values.iter().map(|&v| v as i32).collect())),
            DataType::Int64 => Ok(TensorData::Int64(values.iter().map(|&v| v as i64).collect())),
            DataType::Float32 => Ok(TensorData::Float32(
                values.iter().map(|&v| v as f32).collect(),
            )),
            DataType::Float64 => Ok(TensorData::Float64(
                values.iter().map(|&v| v as f64).collect(),
            )),
            DataType::Bool => Ok(TensorData::Bool(
                values.iter().map(|&v| v as f64 != 0.0).collect(),
            )),
            other => Err(Error::Unsupported(format!("cast to {}", other))),
        }
    }};
}

impl TensorData {
    /// Number of elements
    #[inline]
    pub fn len(&self) -> usize {
        match self {
            TensorData::Int8(v) => v.len(),
            TensorData::Uint8(v) => v.len(),
            TensorData::Int16(v) => v.len(),
            TensorData::Int32(v) => v.len(),
            TensorData::Int64(v) => v.len(),
            TensorData::Float32(v) => v.len(),
            TensorData::Float64(v) => v.len(),
            TensorData::Bool(v) => v.len(),
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type of the buffer
    pub fn data_type(&self) -> DataType {
        match self {
            TensorData::Int8(_) => DataType::Int8,
            TensorData::Uint8(_) => DataType::Uint8,
            TensorData::Int16(_) => DataType::Int16,
            TensorData::Int32(_) => DataType::Int32,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::Float32(_) => DataType::Float32,
            TensorData::Float64(_) => DataType::Float64,
            TensorData::Bool(_) => DataType::Bool,
        }
    }

    /// Convert every element to `target`.
    ///
    /// Float to integer truncates toward zero and saturates; integer to
    /// narrower integer wraps. Casting to the current type is a clone.
    pub fn cast(&self, target: DataType) -> Result<TensorData> {
        if self.data_type() == target {
            return Ok(self.clone());
        }
        match self {
            TensorData::Int8(v) => convert_to!(v, target),
            TensorData::Uint8(v) => convert_to!(v, target),
            TensorData::Int16(v) => convert_to!(v, target),
            TensorData::Int32(v) => convert_to!(v, target),
            TensorData::Int64(v) => convert_to!(v, target),
            TensorData::Float32(v) => convert_to!(v, target),
            TensorData::Float64(v) => convert_to!(v, target),
            TensorData::Bool(v) => {
                let as_bytes: Vec<u8> = v.iter().map(|&b| b as u8).collect();
                convert_to!(as_bytes, target)
            }
        }
    }

    /// Widen every element to f64
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            TensorData::Int8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Uint8(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int16(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Int64(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Float32(v) => v.iter().map(|&x| x as f64).collect(),
            TensorData::Float64(v) => v.clone(),
            TensorData::Bool(v) => v.iter().map(|&x| if x { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Rebuild typed data from f64 values, the inverse of [`to_f64_vec`](Self::to_f64_vec)
    pub fn from_f64_vec(data_type: DataType, values: Vec<f64>) -> Result<TensorData> {
        TensorData::Float64(values).cast(data_type)
    }

    /// Reinterpret little-endian bytes as elements of `data_type`.
    ///
    /// Returns an error if the byte count is not a multiple of the element
    /// size or the type has no fixed-width numeric layout.
    pub fn from_le_bytes(data_type: DataType, bytes: &[u8]) -> Result<TensorData> {
        let type_size = data_type
            .size_in_bytes()
            .ok_or_else(|| Error::Unsupported(format!("raw data of type {}", data_type)))?;

        if !bytes.len().is_multiple_of(type_size) {
            return Err(Error::DataConversion(format!(
                "Data size {} not aligned to type size {} for {}",
                bytes.len(),
                type_size,
                data_type
            )));
        }

        match data_type {
            DataType::Int8 => Ok(TensorData::Int8(
                bytes.iter().map(|&b| b as i8).collect(),
            )),
            DataType::Uint8 => Ok(TensorData::Uint8(bytes.to_vec())),
            DataType::Bool => Ok(TensorData::Bool(bytes.iter().map(|&b| b != 0).collect())),
            DataType::Int16 => Ok(TensorData::Int16(decode_le(bytes, i16::from_le_bytes))),
            DataType::Int32 => Ok(TensorData::Int32(decode_le(bytes, i32::from_le_bytes))),
            DataType::Int64 => Ok(TensorData::Int64(decode_le(bytes, i64::from_le_bytes))),
            DataType::Float32 => Ok(TensorData::Float32(decode_le(bytes, f32::from_le_bytes))),
            DataType::Float64 => Ok(TensorData::Float64(decode_le(bytes, f64::from_le_bytes))),
            other => Err(Error::Unsupported(format!("raw data of type {}", other))),
        }
    }
}

fn decode_le<const N: usize, T>(bytes: &[u8], from_le: fn([u8; N]) -> T) -> Vec<T> {
    bytes
        .chunks_exact(N)
        .map(|chunk| {
            let mut word = [0u8; N];
            word.copy_from_slice(chunk);
            from_le(word)
        })
        .collect()
}

/// A shaped tensor value, used to feed the interpreter
#[derive(Debug, Clone, PartialEq)]
pub struct TensorValue {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl TensorValue {
    /// Pair data with a shape; the element counts must agree
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::DataConversion(format!(
                "cannot reshape {} elements into {:?}",
                data.len(),
                shape
            )));
        }
        Ok(TensorValue { shape, data })
    }

    /// Same shape, elements cast to `target`
    pub fn cast(&self, target: DataType) -> Result<TensorValue> {
        Ok(TensorValue {
            shape: self.shape.clone(),
            data: self.data.cast(target)?,
        })
    }
}
