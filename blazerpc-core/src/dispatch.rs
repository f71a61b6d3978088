//! The dynamic dispatcher (component E): turns a `ModelRegistry` snapshot
//! into gRPC endpoints under one logical service, `blazerpc.InferenceService`.
//!
//! tonic's generated server code builds one `tower::Service` per `.proto`
//! service, matching request paths against a fixed set of `match` arms, each
//! wrapping a per-method `UnaryService`/`ServerStreamingService` around
//! `tonic::server::Grpc`. There is no generated code here — models register
//! at runtime — so this module hand-writes that same shape against a path
//! table built from the registry instead of a match statement.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_core::Stream;
use futures_util::StreamExt;
use http::{Request, Response};
use tonic::body::Body as BoxBody;
use tonic::server::{Grpc, NamedService, ServerStreamingService, UnaryService};
use tonic::Status;

use crate::batcher::BatcherHandle;
use crate::codec::RawCodec;
use crate::error::BlazeError;
use crate::registry::{HandlerKind, ModelDescriptor, ModelRegistry};
use crate::value::Value;
use crate::wire;

type BoxFuture<T> = Pin<Box<dyn std::future::Future<Output = T> + Send>>;

struct RoutedModel {
    descriptor: ModelDescriptor,
    batcher: Option<BatcherHandle>,
}

struct Inner {
    by_path: HashMap<String, RoutedModel>,
}

/// The single tower `Service` serving every registered model. Cloning is
/// cheap — it shares the routing table via `Arc`.
#[derive(Clone)]
pub struct InferenceService {
    inner: Arc<Inner>,
}

impl InferenceService {
    /// Build the dispatch table from a finalized registry and the batcher
    /// handles started for it (server startup step 1-2, SPEC_FULL.md §4.E).
    pub fn new(registry: &ModelRegistry, batchers: &HashMap<(String, String), BatcherHandle>) -> Self {
        let mut by_path = HashMap::new();
        for descriptor in registry.list() {
            let key = (descriptor.name.clone(), descriptor.version.clone());
            let batcher = batchers.get(&key).cloned();
            by_path.insert(
                descriptor.rpc_path(),
                RoutedModel {
                    descriptor: descriptor.clone(),
                    batcher,
                },
            );
        }
        InferenceService {
            inner: Arc::new(Inner { by_path }),
        }
    }
}

impl NamedService for InferenceService {
    const NAME: &'static str = "blazerpc.InferenceService";
}

impl tower::Service<Request<BoxBody>> for InferenceService {
    type Response = Response<BoxBody>;
    type Error = std::convert::Infallible;
    type Future = BoxFuture<Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<BoxBody>) -> Self::Future {
        let Some(routed) = self.inner.by_path.get(req.uri().path()) else {
            return Box::pin(async move { Ok(unimplemented_response()) });
        };
        let descriptor = routed.descriptor.clone();
        let batcher = routed.batcher.clone();

        Box::pin(async move {
            let response = if descriptor.streaming {
                Grpc::new(RawCodec)
                    .server_streaming(ModelStreamingService { descriptor }, req)
                    .await
            } else {
                Grpc::new(RawCodec)
                    .unary(ModelUnaryService { descriptor, batcher }, req)
                    .await
            };
            Ok(response)
        })
    }
}

fn unimplemented_response() -> Response<BoxBody> {
    Response::builder()
        .status(200)
        .header("grpc-status", "12")
        .header("content-type", "application/grpc")
        .body(BoxBody::default())
        .unwrap()
}

/// Drives a single non-streaming model: decode, dispatch (batched or
/// direct), encode (SPEC_FULL.md §4.E "Unary handling").
struct ModelUnaryService {
    descriptor: ModelDescriptor,
    batcher: Option<BatcherHandle>,
}

impl UnaryService<Bytes> for ModelUnaryService {
    type Response = Bytes;
    type Future = BoxFuture<Result<Response<Self::Response>, Status>>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        let descriptor = self.descriptor.clone();
        let batcher = self.batcher.clone();
        Box::pin(async move {
            let args = wire::decode_request(request.get_ref(), &descriptor.inputs)
                .map_err(Status::from)?;

            let outcome = match batcher {
                Some(handle) => handle.submit(args).await,
                None => invoke_unary_handler(&descriptor, args).await,
            };

            let value = outcome.map_err(tonic_status_for(&descriptor.name))?;
            let bytes = wire::encode_response(&value, &descriptor.output).map_err(Status::from)?;
            Ok(Response::new(Bytes::from(bytes)))
        })
    }
}

/// Invoke a model's handler directly (no batcher): sync handlers are
/// offloaded to the blocking pool, async handlers are awaited in place.
/// Also used as the per-item step of the batcher's inference adapter
/// (`app::make_batch_inference_fn`).
pub(crate) async fn invoke_unary_handler(descriptor: &ModelDescriptor, args: crate::value::Args) -> Result<Value, BlazeError> {
    match &descriptor.handler {
        HandlerKind::UnarySync(handler) => {
            let handler = handler.clone();
            tokio::task::spawn_blocking(move || handler(args))
                .await
                .map_err(|e| BlazeError::Inference {
                    model_name: descriptor.name.clone(),
                    cause: format!("handler task panicked: {e}"),
                })?
        }
        HandlerKind::UnaryAsync(handler) => handler(args).await,
        HandlerKind::StreamSync(_) | HandlerKind::StreamAsync(_) => unreachable!(
            "registry.register rejects a streaming handler for a non-streaming model"
        ),
    }
}

/// Drives a single streaming model: decode once, stream encoded chunks
/// (SPEC_FULL.md §4.E "Streaming handling").
struct ModelStreamingService {
    descriptor: ModelDescriptor,
}

impl ServerStreamingService<Bytes> for ModelStreamingService {
    type Response = Bytes;
    type ResponseStream = Pin<Box<dyn Stream<Item = Result<Bytes, Status>> + Send>>;
    type Future = BoxFuture<Result<Response<Self::ResponseStream>, Status>>;

    fn call(&mut self, request: tonic::Request<Bytes>) -> Self::Future {
        let descriptor = self.descriptor.clone();
        Box::pin(async move {
            let args = wire::decode_request(request.get_ref(), &descriptor.inputs)
                .map_err(Status::from)?;
            let stream = open_stream(&descriptor, args).map_err(Status::from)?;
            Ok(Response::new(stream))
        })
    }
}

fn open_stream(
    descriptor: &ModelDescriptor,
    args: crate::value::Args,
) -> Result<Pin<Box<dyn Stream<Item = Result<Bytes, Status>> + Send>>, BlazeError> {
    let output = descriptor.output.clone();
    let model_name = descriptor.name.clone();

    match &descriptor.handler {
        HandlerKind::StreamAsync(handler) => {
            let items = handler(args)?;
            let encoded = items.map(move |item| encode_chunk(item, &output, &model_name));
            Ok(Box::pin(encoded))
        }
        HandlerKind::StreamSync(handler) => {
            let iter = handler(args)?;
            // Sync iteration may block; drive it from the blocking pool and
            // bridge chunks back through a bounded channel.
            let (tx, rx) = tokio::sync::mpsc::channel(16);
            tokio::task::spawn_blocking(move || {
                for item in iter {
                    if tx.blocking_send(item).is_err() {
                        break;
                    }
                }
            });
            let encoded = tokio_stream::wrappers::ReceiverStream::new(rx)
                .map(move |item| encode_chunk(item, &output, &model_name));
            Ok(Box::pin(encoded))
        }
        HandlerKind::UnarySync(_) | HandlerKind::UnaryAsync(_) => {
            unreachable!("registry.register rejects a unary handler for a streaming model")
        }
    }
}

fn encode_chunk(item: Result<Value, BlazeError>, output: &crate::types::SemanticType, model_name: &str) -> Result<Bytes, Status> {
    let value = item.map_err(tonic_status_for(model_name))?;
    let bytes = wire::encode_response(&value, output).map_err(Status::from)?;
    Ok(Bytes::from(bytes))
}

/// Wrap a handler-raised `BlazeError` as `InferenceError(model_name, cause)`
/// before converting to a `Status`, unless it's already a tagged variant
/// (e.g. a `Serialization` error from decoding) or cancellation.
fn tonic_status_for(model_name: &str) -> impl Fn(BlazeError) -> Status + '_ {
    move |err| match err {
        BlazeError::Inference { .. } | BlazeError::Cancelled | BlazeError::Serialization(_) => err.into(),
        other => BlazeError::Inference {
            model_name: model_name.to_string(),
            cause: other.to_string(),
        }
        .into(),
    }
}
