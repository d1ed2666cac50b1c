use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

/// Tensor element types declared by the model schema
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Float32,
    Float16,
    Int32,
    Uint8,
    Int64,
    String,
    Bool,
    Int16,
    Complex64,
    Int8,
    Float64,
    Complex128,
    Uint64,
    Resource,
    Variant,
    Uint32,
    Uint16,
    Int4,
    BFloat16,
    /// A type name this crate does not know, kept as written
    Named(String),
    /// An integer type code past the known table, kept as written
    Code(i64),
    /// The tensor declares no type at all
    Unknown,
}

impl DataType {
    /// Create DataType from the schema's integer code
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => DataType::Float32,
            1 => DataType::Float16,
            2 => DataType::Int32,
            3 => DataType::Uint8,
            4 => DataType::Int64,
            5 => DataType::String,
            6 => DataType::Bool,
            7 => DataType::Int16,
            8 => DataType::Complex64,
            9 => DataType::Int8,
            10 => DataType::Float64,
            11 => DataType::Complex128,
            12 => DataType::Uint64,
            13 => DataType::Resource,
            14 => DataType::Variant,
            15 => DataType::Uint32,
            16 => DataType::Uint16,
            17 => DataType::Int4,
            18 => DataType::BFloat16,
            other => DataType::Code(other),
        }
    }

    /// Create DataType from the schema's enum name, e.g. `"INT8"`
    pub fn from_name(name: &str) -> Self {
        match name {
            "FLOAT32" => DataType::Float32,
            "FLOAT16" => DataType::Float16,
            "INT32" => DataType::Int32,
            "UINT8" => DataType::Uint8,
            "INT64" => DataType::Int64,
            "STRING" => DataType::String,
            "BOOL" => DataType::Bool,
            "INT16" => DataType::Int16,
            "COMPLEX64" => DataType::Complex64,
            "INT8" => DataType::Int8,
            "FLOAT64" => DataType::Float64,
            "COMPLEX128" => DataType::Complex128,
            "UINT64" => DataType::Uint64,
            "RESOURCE" => DataType::Resource,
            "VARIANT" => DataType::Variant,
            "UINT32" => DataType::Uint32,
            "UINT16" => DataType::Uint16,
            "INT4" => DataType::Int4,
            "BFLOAT16" => DataType::BFloat16,
            "UNKNOWN" => DataType::Unknown,
            other => DataType::Named(other.to_string()),
        }
    }

    /// Inverse of [`name`](Self::name): decimal labels come back as codes
    pub fn from_label(label: &str) -> Self {
        match label.parse::<i64>() {
            Ok(code) => DataType::from_code(code),
            Err(_) => DataType::from_name(label),
        }
    }

    /// Schema name of this type. Unrecognised types keep their declared
    /// spelling; [`DataType::Unknown`] reads `"UNKNOWN"`.
    pub fn name(&self) -> Cow<'_, str> {
        let name = match self {
            DataType::Float32 => "FLOAT32",
            DataType::Float16 => "FLOAT16",
            DataType::Int32 => "INT32",
            DataType::Uint8 => "UINT8",
            DataType::Int64 => "INT64",
            DataType::String => "STRING",
            DataType::Bool => "BOOL",
            DataType::Int16 => "INT16",
            DataType::Complex64 => "COMPLEX64",
            DataType::Int8 => "INT8",
            DataType::Float64 => "FLOAT64",
            DataType::Complex128 => "COMPLEX128",
            DataType::Uint64 => "UINT64",
            DataType::Resource => "RESOURCE",
            DataType::Variant => "VARIANT",
            DataType::Uint32 => "UINT32",
            DataType::Uint16 => "UINT16",
            DataType::Int4 => "INT4",
            DataType::BFloat16 => "BFLOAT16",
            DataType::Named(name) => return Cow::Borrowed(name.as_str()),
            DataType::Code(code) => return Cow::Owned(code.to_string()),
            DataType::Unknown => "UNKNOWN",
        };
        Cow::Borrowed(name)
    }

    /// Get the size in bytes for numeric types
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Float32 | DataType::Int32 | DataType::Uint32 => Some(4),
            DataType::Float64 | DataType::Int64 | DataType::Uint64 => Some(8),
            DataType::Float16 | DataType::BFloat16 | DataType::Int16 | DataType::Uint16 => Some(2),
            DataType::Int8 | DataType::Uint8 | DataType::Bool => Some(1),
            DataType::Complex64 => Some(8),
            DataType::Complex128 => Some(16),
            DataType::Int4
            | DataType::String
            | DataType::Resource
            | DataType::Variant
            | DataType::Named(_)
            | DataType::Code(_)
            | DataType::Unknown => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Schema enum as it appears in a JSON dump: flatc writes names, hand-made
/// documents often carry the raw integer.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum EnumRepr {
    Name(String),
    Code(i64),
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match EnumRepr::deserialize(deserializer)? {
            EnumRepr::Name(name) => DataType::from_name(&name),
            EnumRepr::Code(code) => DataType::from_code(code),
        })
    }
}

impl Serialize for DataType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DataType::Code(code) => serializer.serialize_i64(*code),
            other => serializer.serialize_str(&other.name()),
        }
    }
}

/// Builtin operator names indexed by their integer code
const BUILTIN_OPERATORS: [&str; 128] = [
    "ADD",
    "AVERAGE_POOL_2D",
    "CONCATENATION",
    "CONV_2D",
    "DEPTHWISE_CONV_2D",
    "DEPTH_TO_SPACE",
    "DEQUANTIZE",
    "EMBEDDING_LOOKUP",
    "FLOOR",
    "FULLY_CONNECTED",
    "HASHTABLE_LOOKUP",
    "L2_NORMALIZATION",
    "L2_POOL_2D",
    "LOCAL_RESPONSE_NORMALIZATION",
    "LOGISTIC",
    "LSH_PROJECTION",
    "LSTM",
    "MAX_POOL_2D",
    "MUL",
    "RELU",
    "RELU_N1_TO_1",
    "RELU6",
    "RESHAPE",
    "RESIZE_BILINEAR",
    "RNN",
    "SOFTMAX",
    "SPACE_TO_DEPTH",
    "SVDF",
    "TANH",
    "CONCAT_EMBEDDINGS",
    "SKIP_GRAM",
    "CALL",
    "CUSTOM",
    "EMBEDDING_LOOKUP_SPARSE",
    "PAD",
    "UNIDIRECTIONAL_SEQUENCE_RNN",
    "GATHER",
    "BATCH_TO_SPACE_ND",
    "SPACE_TO_BATCH_ND",
    "TRANSPOSE",
    "MEAN",
    "SUB",
    "DIV",
    "SQUEEZE",
    "UNIDIRECTIONAL_SEQUENCE_LSTM",
    "STRIDED_SLICE",
    "BIDIRECTIONAL_SEQUENCE_RNN",
    "EXP",
    "TOPK_V2",
    "SPLIT",
    "LOG_SOFTMAX",
    "DELEGATE",
    "BIDIRECTIONAL_SEQUENCE_LSTM",
    "CAST",
    "PRELU",
    "MAXIMUM",
    "ARG_MAX",
    "MINIMUM",
    "LESS",
    "NEG",
    "PADV2",
    "GREATER",
    "GREATER_EQUAL",
    "LESS_EQUAL",
    "SELECT",
    "SLICE",
    "SIN",
    "TRANSPOSE_CONV",
    "SPARSE_TO_DENSE",
    "TILE",
    "EXPAND_DIMS",
    "EQUAL",
    "NOT_EQUAL",
    "LOG",
    "SUM",
    "SQRT",
    "RSQRT",
    "SHAPE",
    "POW",
    "ARG_MIN",
    "FAKE_QUANT",
    "REDUCE_PROD",
    "REDUCE_MAX",
    "PACK",
    "LOGICAL_OR",
    "ONE_HOT",
    "LOGICAL_AND",
    "LOGICAL_NOT",
    "UNPACK",
    "REDUCE_MIN",
    "FLOOR_DIV",
    "REDUCE_ANY",
    "SQUARE",
    "ZEROS_LIKE",
    "FILL",
    "FLOOR_MOD",
    "RANGE",
    "RESIZE_NEAREST_NEIGHBOR",
    "LEAKY_RELU",
    "SQUARED_DIFFERENCE",
    "MIRROR_PAD",
    "ABS",
    "SPLIT_V",
    "UNIQUE",
    "CEIL",
    "REVERSE_V2",
    "ADD_N",
    "GATHER_ND",
    "COS",
    "WHERE",
    "RANK",
    "ELU",
    "REVERSE_SEQUENCE",
    "MATRIX_DIAG",
    "QUANTIZE",
    "MATRIX_SET_DIAG",
    "ROUND",
    "HARD_SWISH",
    "IF",
    "WHILE",
    "NON_MAX_SUPPRESSION_V4",
    "NON_MAX_SUPPRESSION_V5",
    "SCATTER_ND",
    "SELECT_V2",
    "DENSIFY",
    "SEGMENT_SUM",
    "BATCH_MATMUL",
    "PLACEHOLDER_FOR_GREATER_OP_CODES",
];

/// Resolve a builtin operator code to its name.
///
/// Codes past the table are rendered as `BUILTIN_<code>` so that newer
/// models still produce a readable trace.
pub fn builtin_operator_name(code: i64) -> String {
    usize::try_from(code)
        .ok()
        .and_then(|idx| BUILTIN_OPERATORS.get(idx))
        .map(|name| name.to_string())
        .unwrap_or_else(|| format!("BUILTIN_{}", code))
}
