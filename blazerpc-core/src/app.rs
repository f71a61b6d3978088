//! `App`: orchestrates model registration, batcher startup, and the server
//! lifecycle. Grounded on `original_source/src/blazerpc/app.py`'s `BlazeApp`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::batcher::{BatchConfig, Batcher, InferenceFn, ItemOutcome};
use crate::dispatch::InferenceService;
use crate::error::Result;
use crate::registry::{HandlerKind, ModelDescriptor, ModelRegistry, Signature};
use crate::server;

/// Batching configuration shared by every non-streaming model, unless the
/// app is built with batching disabled entirely.
#[derive(Debug, Clone, Copy)]
pub struct BatchingPolicy {
    pub enabled: bool,
    pub max_batch_size: usize,
    pub timeout: Duration,
}

impl Default for BatchingPolicy {
    fn default() -> Self {
        BatchingPolicy {
            enabled: true,
            max_batch_size: 32,
            timeout: Duration::from_millis(10),
        }
    }
}

/// The application object an embedding binary builds: register models, then
/// call `serve`.
pub struct App {
    name: String,
    registry: ModelRegistry,
    batching: BatchingPolicy,
}

impl App {
    pub fn new(name: impl Into<String>) -> Self {
        App {
            name: name.into(),
            registry: ModelRegistry::new(),
            batching: BatchingPolicy::default(),
        }
    }

    pub fn with_batching(mut self, batching: BatchingPolicy) -> Self {
        self.batching = batching;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a model. Thin wrapper over `ModelRegistry::register` so
    /// binaries assembling an `App` don't need to reach into `registry`
    /// directly.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        version: impl Into<String>,
        handler: HandlerKind,
        streaming: bool,
        signature: Signature,
    ) -> Result<()> {
        self.registry.register(name, version, handler, streaming, signature)
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Render this app's `.proto` document without starting a server.
    pub fn generate_proto(&self) -> String {
        crate::idl::generate_proto(&self.registry)
    }

    /// Start every enabled batcher, build the dispatch table, bind, serve,
    /// and block until a shutdown signal arrives (SPEC_FULL.md §4.E "Server
    /// startup sequence").
    pub async fn serve(self, host: &str, port: u16) -> Result<()> {
        let mut batchers: Vec<(String, String, Batcher)> = Vec::new();
        let mut handles = HashMap::new();

        if self.batching.enabled {
            for model in self.registry.list() {
                if model.streaming {
                    continue;
                }
                let config = BatchConfig {
                    max_size: self.batching.max_batch_size,
                    timeout: self.batching.timeout,
                };
                let mut batcher = Batcher::new(config);
                batcher.start(make_batch_inference_fn(model.clone()));
                handles.insert((model.name.clone(), model.version.clone()), batcher.handle());
                batchers.push((model.name.clone(), model.version.clone(), batcher));
            }
        }

        let service = InferenceService::new(&self.registry, &handles);
        let app_name = self.name.clone();
        let registry_for_reflection = self.registry;

        let result = server::serve(&app_name, host, port, service, &registry_for_reflection).await;

        for (_, _, mut batcher) in batchers {
            batcher.stop().await;
        }

        result
    }
}

/// Per-model inference adapter used by the batcher: invoke the handler once
/// per item in order, reporting per-item failures as `Err` values so one
/// bad input doesn't fail its batch-mates (SPEC_FULL.md §10.3).
fn make_batch_inference_fn(descriptor: ModelDescriptor) -> InferenceFn {
    Arc::new(move |batch| {
        let descriptor = descriptor.clone();
        Box::pin(async move {
            let mut results: Vec<ItemOutcome> = Vec::with_capacity(batch.len());
            for args in batch {
                results.push(crate::dispatch::invoke_unary_handler(&descriptor, args).await);
            }
            Ok(results)
        })
    })
}
