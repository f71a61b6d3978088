//! The model registry (component B) and the `Signature` builder that stands
//! in for the Type Reflector (component A) — see `SPEC_FULL.md` §4.A for why
//! Rust registration is explicit rather than introspected.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures_core::Stream;

use crate::error::{BlazeError, Result};
use crate::types::SemanticType;
use crate::value::{Args, Value};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// An ordered parameter-name → type map plus a return type, built explicitly
/// at registration time in place of runtime annotation introspection.
#[derive(Debug, Clone, Default)]
pub struct Signature {
    inputs: Vec<(String, SemanticType)>,
    output: SemanticType,
}

impl Signature {
    pub fn new() -> Self {
        Signature {
            inputs: Vec::new(),
            output: SemanticType::Unknown,
        }
    }

    /// Declare the next parameter, in call order. Parameter order is part of
    /// the public contract: it drives both IDL and wire field numbering.
    pub fn param(mut self, name: impl Into<String>, ty: SemanticType) -> Self {
        self.inputs.push((name.into(), ty));
        self
    }

    pub fn output(mut self, ty: SemanticType) -> Self {
        self.output = ty;
        self
    }

    pub fn inputs(&self) -> &[(String, SemanticType)] {
        &self.inputs
    }

    pub fn output_type(&self) -> &SemanticType {
        &self.output
    }
}

/// The four callable shapes a registered handler can take, classified once
/// at registration time (see Design Notes: "Callable polymorphism ... →
/// variant at registration time").
#[derive(Clone)]
pub enum HandlerKind {
    UnarySync(Arc<dyn Fn(Args) -> Result<Value> + Send + Sync>),
    UnaryAsync(Arc<dyn Fn(Args) -> BoxFuture<Result<Value>> + Send + Sync>),
    /// A sync iterator-producing handler. Iteration may block, so the
    /// dispatcher drives it from a blocking-pool task (SPEC_FULL.md §10.2).
    StreamSync(Arc<dyn Fn(Args) -> Result<Box<dyn Iterator<Item = Result<Value>> + Send>> + Send + Sync>),
    StreamAsync(Arc<dyn Fn(Args) -> Result<BoxStream<Result<Value>>> + Send + Sync>),
}

impl HandlerKind {
    pub fn is_streaming(&self) -> bool {
        matches!(self, HandlerKind::StreamSync(_) | HandlerKind::StreamAsync(_))
    }
}

/// An immutable, append-only (for the lifetime of a running server) model
/// entry.
#[derive(Clone)]
pub struct ModelDescriptor {
    pub name: String,
    pub version: String,
    pub handler: HandlerKind,
    pub streaming: bool,
    pub inputs: Vec<(String, SemanticType)>,
    pub output: SemanticType,
}

impl ModelDescriptor {
    /// The gRPC method path this model is served on:
    /// `/blazerpc.InferenceService/Predict<PascalCase(name)>`.
    pub fn rpc_path(&self) -> String {
        format!(
            "/blazerpc.InferenceService/Predict{}",
            pascal_case(&self.name)
        )
    }
}

/// Convert a model name to a valid proto/path identifier by splitting on
/// `-`/`_` and capitalizing each segment.
pub fn pascal_case(name: &str) -> String {
    name.split(['-', '_'])
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

/// Stores handlers keyed by `(name, version)`. Mutated only during
/// application configuration (single-threaded); read-only once `serve`
/// begins, so concurrent readers need no locking under that discipline.
#[derive(Default)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    index: HashMap<(String, String), usize>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        ModelRegistry::default()
    }

    /// Insert a new descriptor, or overwrite the existing one in place if
    /// `(name, version)` was already registered (matches the original
    /// Python `dict` assignment semantics — see SPEC_FULL.md §10.1).
    pub fn register(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        handler: HandlerKind,
        streaming: bool,
        signature: Signature,
    ) -> Result<()> {
        let name = name.into();
        let version = version.into();

        if signature.inputs().is_empty() {
            return Err(BlazeError::Validation(format!(
                "model '{name}' has no typed inputs; registration requires at least one parameter"
            )));
        }
        if streaming != handler.is_streaming() {
            return Err(BlazeError::Validation(format!(
                "model '{name}': streaming={streaming} disagrees with the handler variant"
            )));
        }

        let descriptor = ModelDescriptor {
            name: name.clone(),
            version: version.clone(),
            handler,
            streaming,
            inputs: signature.inputs().to_vec(),
            output: signature.output_type().clone(),
        };

        let key = (name, version);
        match self.index.get(&key) {
            Some(&idx) => self.models[idx] = descriptor,
            None => {
                self.index.insert(key, self.models.len());
                self.models.push(descriptor);
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str, version: &str) -> Result<&ModelDescriptor> {
        self.index
            .get(&(name.to_string(), version.to_string()))
            .map(|&idx| &self.models[idx])
            .ok_or_else(|| BlazeError::ModelNotFound {
                name: name.to_string(),
                version: version.to_string(),
            })
    }

    /// Snapshot of descriptors in registration order.
    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }
}
