use std::fmt;

/// Custom error type for tflite-trace
#[derive(Debug)]
pub enum Error {
    /// I/O error when reading or writing files
    Io(std::io::Error),
    /// JSON parse or serialisation error
    Json(serde_json::Error),
    /// Protobuf decoding error
    Decode(prost::DecodeError),
    /// Graph description structure error
    InvalidModel(String),
    /// Missing required field
    MissingField(String),
    /// Unsupported feature
    Unsupported(String),
    /// Failure reported by the interpreter during allocate, set or invoke
    Interpreter(String),
    /// Tensor data could not be converted
    DataConversion(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Json(e) => write!(f, "JSON error: {}", e),
            Error::Decode(e) => write!(f, "Protobuf decode error: {}", e),
            Error::InvalidModel(msg) => write!(f, "Invalid model: {}", msg),
            Error::MissingField(field) => write!(f, "Missing required field: {}", field),
            Error::Unsupported(feature) => write!(f, "Unsupported feature: {}", feature),
            Error::Interpreter(msg) => write!(f, "Interpreter error: {}", msg),
            Error::DataConversion(msg) => write!(f, "Data conversion error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Json(e) => Some(e),
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

impl From<prost::DecodeError> for Error {
    fn from(err: prost::DecodeError) -> Self {
        Error::Decode(err)
    }
}

impl From<std::num::TryFromIntError> for Error {
    fn from(err: std::num::TryFromIntError) -> Self {
        Error::InvalidModel(format!("Integer conversion error: {}", err))
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
