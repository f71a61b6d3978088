//! Core library for blazerpc: a dynamic gRPC inference-serving framework.
//!
//! A model is registered against a [`registry::ModelRegistry`] with a typed
//! [`registry::Signature`]; [`app::App`] wires the registry into an adaptive
//! [`batcher::Batcher`] per non-streaming model and a single dynamic
//! [`dispatch::InferenceService`] serving every model under one gRPC
//! service name, using the bypass [`codec::RawCodec`] and the
//! [`wire`] JSON envelope instead of generated protobuf types.

pub mod app;
pub mod batcher;
pub mod codec;
pub mod dispatch;
pub mod error;
pub mod idl;
pub mod registry;
pub mod server;
pub mod types;
pub mod value;
pub mod wire;

pub use app::{App, BatchingPolicy};
pub use error::{BlazeError, Result};
pub use registry::{HandlerKind, ModelDescriptor, ModelRegistry, Signature};
pub use types::{ScalarKind, SemanticType, TensorDim, TensorDirection, TensorDtype};
pub use value::{Args, TensorEnvelope, Value};
