//! The dynamic value representation handlers exchange with the dispatcher.
//!
//! Values carry their own tag (unlike a raw `serde_json::Value`, which can't
//! tell an int64 apart from a double once it's just a JSON number), so
//! `wire::encode_value` never needs the `SemanticType` to know how to render
//! a value — only `wire::decode_value` does, to recover that distinction
//! from untagged JSON input.

use std::collections::BTreeMap;

use crate::types::TensorDtype;

/// Wire-level tensor sub-document: shape, canonical dtype, and a contiguous
/// row-major little-endian byte payload.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorEnvelope {
    pub shape: Vec<i64>,
    pub dtype: TensorDtype,
    pub data: Vec<u8>,
}

impl TensorEnvelope {
    pub fn new(shape: Vec<i64>, dtype: TensorDtype, data: Vec<u8>) -> Self {
        TensorEnvelope { shape, dtype, data }
    }

    pub fn element_count(&self) -> i64 {
        self.shape.iter().product()
    }
}

/// The ordered argument map a decoded request carries for a handler call.
pub type Args = BTreeMap<String, Value>;

/// A handler's dynamic input/output value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int64(i64),
    Float(f32),
    Double(f64),
    Bool(bool),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
    Tensor(TensorEnvelope),
    /// Opaque, wire-encoded as a base64 byte blob.
    Opaque(Vec<u8>),
    /// Absent/no-output value (an `Unknown` return type).
    Null,
}
