//! The tagged `SemanticType` variant that stands in for the Type Reflector's
//! dynamic-annotation classification (see `registry::Signature`).

use std::fmt;

/// Scalar kinds a handler parameter or return value can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    Int64,
    Float,
    Double,
    Bool,
    String,
    Bytes,
}

/// Tensor element dtypes, with the canonical wire tag and cell size from the
/// dtype table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorDtype {
    Float32,
    Float64,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Bool,
    Bytes,
    String,
}

impl TensorDtype {
    /// The canonical dtype tag used in the wire envelope and the IDL table.
    pub fn tag(self) -> &'static str {
        match self {
            TensorDtype::Float32 => "float",
            TensorDtype::Float64 => "double",
            TensorDtype::Int32 => "int32",
            TensorDtype::Int64 => "int64",
            TensorDtype::Uint32 => "uint32",
            TensorDtype::Uint64 => "uint64",
            TensorDtype::Bool => "bool",
            TensorDtype::Bytes => "bytes",
            TensorDtype::String => "string",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "float" => TensorDtype::Float32,
            "double" => TensorDtype::Float64,
            "int32" => TensorDtype::Int32,
            "int64" => TensorDtype::Int64,
            "uint32" => TensorDtype::Uint32,
            "uint64" => TensorDtype::Uint64,
            "bool" => TensorDtype::Bool,
            "bytes" => TensorDtype::Bytes,
            "string" => TensorDtype::String,
            _ => return None,
        })
    }

    /// Cell size in bytes for fixed-width dtypes. `Bytes`/`String` cells are
    /// variable-length and length-prefixed; they have no fixed cell size.
    pub fn fixed_cell_size(self) -> Option<usize> {
        match self {
            TensorDtype::Float32 | TensorDtype::Int32 | TensorDtype::Uint32 => Some(4),
            TensorDtype::Float64 | TensorDtype::Int64 | TensorDtype::Uint64 => Some(8),
            TensorDtype::Bool => Some(1),
            TensorDtype::Bytes | TensorDtype::String => None,
        }
    }
}

impl fmt::Display for TensorDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// One dimension of a tensor shape: a fixed extent, or a named symbolic
/// dimension (e.g. a batch axis shared across several tensors).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TensorDim {
    Fixed(i64),
    Symbolic(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorDirection {
    Input,
    Output,
}

/// The tagged type variant every parameter and return value is classified
/// into. `Unknown` is reserved for an absent return annotation; `Opaque` is
/// for a declared-but-unrecognized parameter/return shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticType {
    Scalar(ScalarKind),
    List(Box<SemanticType>),
    Tensor {
        dtype: TensorDtype,
        shape: Vec<TensorDim>,
        direction: TensorDirection,
    },
    Opaque,
    Unknown,
}

impl SemanticType {
    pub fn tensor(
        dtype: TensorDtype,
        shape: impl IntoIterator<Item = TensorDim>,
        direction: TensorDirection,
    ) -> Self {
        SemanticType::Tensor {
            dtype,
            shape: shape.into_iter().collect(),
            direction,
        }
    }

    pub fn list(inner: SemanticType) -> Self {
        SemanticType::List(Box::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dtype_round_trips_through_tag() {
        for dtype in [
            TensorDtype::Float32,
            TensorDtype::Float64,
            TensorDtype::Int32,
            TensorDtype::Int64,
            TensorDtype::Uint32,
            TensorDtype::Uint64,
            TensorDtype::Bool,
            TensorDtype::Bytes,
            TensorDtype::String,
        ] {
            assert_eq!(TensorDtype::from_tag(dtype.tag()), Some(dtype));
        }
    }

    #[test]
    fn fixed_cell_sizes_match_the_dtype_table() {
        assert_eq!(TensorDtype::Float32.fixed_cell_size(), Some(4));
        assert_eq!(TensorDtype::Float64.fixed_cell_size(), Some(8));
        assert_eq!(TensorDtype::Int64.fixed_cell_size(), Some(8));
        assert_eq!(TensorDtype::Bool.fixed_cell_size(), Some(1));
        assert_eq!(TensorDtype::Bytes.fixed_cell_size(), None);
        assert_eq!(TensorDtype::String.fixed_cell_size(), None);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        assert_eq!(TensorDtype::from_tag("complex128"), None);
    }
}
