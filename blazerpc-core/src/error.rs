use std::fmt;

/// All error types produced by the blazerpc core library.
///
/// The taxonomy mirrors the framework's boundary behavior: configuration and
/// validation errors are fatal at startup, `ModelNotFound` never crosses the
/// wire (the dispatcher only ever serves paths it built), serialization
/// failures surface as `INVALID_ARGUMENT`, inference failures surface as
/// `INTERNAL`, and cancellation is not an error at all from the caller's
/// point of view.
#[derive(Debug, Clone)]
pub enum BlazeError {
    /// Bad CLI input, missing app object, wrong type. Fatal at startup.
    Configuration(String),

    /// Registration rejected (e.g. no typed inputs). Fatal at startup.
    Validation(String),

    /// Registry lookup miss. Internal only — the dispatcher enumerates the
    /// registry itself, so a client never triggers this directly.
    ModelNotFound { name: String, version: String },

    /// Wire encode/decode failure: malformed JSON, unknown dtype, a
    /// tensor-typed result that isn't a recognizable tensor.
    Serialization(String),

    /// Any failure raised inside a handler, or a per-item/whole-batch
    /// failure reported by the batcher.
    Inference { model_name: String, cause: String },

    /// Client or server cancellation. Never logged as an error.
    Cancelled,
}

impl fmt::Display for BlazeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlazeError::Configuration(msg) => write!(f, "configuration error: {msg}"),
            BlazeError::Validation(msg) => write!(f, "validation error: {msg}"),
            BlazeError::ModelNotFound { name, version } => {
                write!(f, "model '{name}' version '{version}' not found")
            }
            BlazeError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            BlazeError::Inference { model_name, cause } => {
                write!(f, "model '{model_name}' inference failed: {cause}")
            }
            BlazeError::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::error::Error for BlazeError {}

impl From<BlazeError> for tonic::Status {
    fn from(err: BlazeError) -> Self {
        match err {
            BlazeError::Serialization(msg) => tonic::Status::invalid_argument(msg),
            BlazeError::Inference { model_name, cause } => {
                tonic::Status::internal(format!("model '{model_name}' inference failed: {cause}"))
            }
            BlazeError::Cancelled => tonic::Status::cancelled("request cancelled"),
            // Configuration/Validation/ModelNotFound never reach a client in
            // practice; map them conservatively rather than panic.
            BlazeError::Configuration(msg) => tonic::Status::internal(msg),
            BlazeError::Validation(msg) => tonic::Status::internal(msg),
            BlazeError::ModelNotFound { name, version } => {
                tonic::Status::not_found(format!("model '{name}' version '{version}' not found"))
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, BlazeError>;
