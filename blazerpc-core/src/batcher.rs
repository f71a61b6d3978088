//! The adaptive batcher (component D): a per-model FIFO queue and background
//! task that coalesces concurrent unary requests up to a size or timeout
//! bound. Grounded on `original_source/src/blazerpc/runtime/batcher.py`'s
//! collection algorithm, translated from its `asyncio.Queue` + `Future` pair
//! into an unbounded `mpsc` channel + `oneshot` completion per item.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::BlazeError;
use crate::value::{Args, Value};

/// The per-item result of a batched dispatch: either the handler's success
/// value, or an error reported as a value rather than raised, so one bad
/// input doesn't fail its batch-mates (SPEC_FULL.md §10.3).
pub type ItemOutcome = Result<Value, BlazeError>;

/// A queued unit of work: the decoded argument map plus a one-shot channel
/// the batcher completes exactly once.
struct BatchItem {
    request: Args,
    completion: oneshot::Sender<ItemOutcome>,
}

/// A per-model adapter invoked once per dispatched batch. Fans the batch out
/// over the registered handler, one call per item (sync handlers offloaded,
/// async handlers awaited) — see SPEC_FULL.md §4.E. A future vectorized
/// batch call is an extension point, not implemented here.
pub type InferenceFn = Arc<dyn Fn(Vec<Args>) -> crate::registry::BoxFuture<Result<Vec<ItemOutcome>, BlazeError>> + Send + Sync>;

/// Per-model batching configuration.
#[derive(Debug, Clone, Copy)]
pub struct BatchConfig {
    pub max_size: usize,
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            max_size: 32,
            timeout: Duration::from_millis(10),
        }
    }
}

/// Owns a model's request queue and its background collection loop.
///
/// `start`/`stop` are idempotent. After `stop`, the queue's receiver is gone,
/// so a subsequent `submit` fails its `send` immediately and is reported as
/// `BlazeError::Cancelled` — no extra state tracking is needed to satisfy
/// "new submissions fail promptly after stop".
pub struct Batcher {
    config: BatchConfig,
    sender: mpsc::UnboundedSender<BatchItem>,
    receiver: Option<mpsc::UnboundedReceiver<BatchItem>>,
    cancel: CancellationToken,
    handle: Option<tokio::task::JoinHandle<()>>,
}

/// A cheaply-cloneable submission handle, held by the dispatcher so every
/// in-flight request can enqueue concurrently without contending on the
/// `Batcher` itself, whose `start`/`stop` stay owned by the server
/// lifecycle (SPEC_FULL.md §4.F).
#[derive(Clone)]
pub struct BatcherHandle {
    sender: mpsc::UnboundedSender<BatchItem>,
}

impl BatcherHandle {
    /// Submit a request and await its batched result. Fails with
    /// `BlazeError::Cancelled` if the batcher has stopped.
    pub async fn submit(&self, request: Args) -> ItemOutcome {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(BatchItem { request, completion: tx })
            .map_err(|_| BlazeError::Cancelled)?;
        rx.await.map_err(|_| BlazeError::Cancelled)?
    }
}

impl Batcher {
    pub fn new(config: BatchConfig) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Batcher {
            config,
            sender,
            receiver: Some(receiver),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// A cloneable handle for submitting requests, independent of this
    /// batcher's own lifecycle methods.
    pub fn handle(&self) -> BatcherHandle {
        BatcherHandle {
            sender: self.sender.clone(),
        }
    }

    /// Submit a request and await its batched result. Convenience
    /// pass-through to a fresh `handle()`, used directly in tests.
    pub async fn submit(&self, request: Args) -> ItemOutcome {
        self.handle().submit(request).await
    }

    /// Start the background collection loop. No-op if already running.
    pub fn start(&mut self, inference_fn: InferenceFn) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        let config = self.config;
        let cancel = self.cancel.clone();
        self.handle = Some(tokio::spawn(run_loop(receiver, config, cancel, inference_fn)));
    }

    /// Cancel the loop and await its clean exit. Idempotent.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

async fn run_loop(
    mut receiver: mpsc::UnboundedReceiver<BatchItem>,
    config: BatchConfig,
    cancel: CancellationToken,
    inference_fn: InferenceFn,
) {
    loop {
        let batch = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            batch = collect_batch(&mut receiver, config) => batch,
        };
        let Some(batch) = batch else {
            // Sender side dropped entirely; nothing left to serve.
            break;
        };
        dispatch(batch, &inference_fn).await;
    }
}

/// Implements the collection algorithm from SPEC_FULL.md §4.D: block for the
/// first item, then pull further items bounded by `max_size` and a deadline
/// measured from when the first item was pulled. Returns `None` only if the
/// channel is closed with no item pending.
async fn collect_batch(receiver: &mut mpsc::UnboundedReceiver<BatchItem>, config: BatchConfig) -> Option<Vec<BatchItem>> {
    let first = receiver.recv().await?;
    let mut batch = vec![first];
    let deadline = Instant::now() + config.timeout;

    while batch.len() < config.max_size {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match tokio::time::timeout(remaining, receiver.recv()).await {
            Ok(Some(item)) => batch.push(item),
            Ok(None) => break,
            Err(_elapsed) => break,
        }
    }
    Some(batch)
}

async fn dispatch(batch: Vec<BatchItem>, inference_fn: &InferenceFn) {
    let requests: Vec<Args> = batch.iter().map(|item| item.request.clone()).collect();
    let batch_size = batch.len();

    match inference_fn(requests).await {
        Err(err) => {
            // Whole-batch failure: every waiter observes the same error.
            for item in batch {
                let _ = item.completion.send(Err(err.clone()));
            }
        }
        Ok(results) if results.len() != batch_size => {
            let mismatch = BlazeError::Inference {
                model_name: "<batch>".to_string(),
                cause: format!(
                    "handler returned {} results for a batch of {batch_size}",
                    results.len()
                ),
            };
            for item in batch {
                let _ = item.completion.send(Err(mismatch.clone()));
            }
        }
        Ok(results) => {
            for (item, outcome) in batch.into_iter().zip(results) {
                // A receiver dropped (client cancelled while queued) makes
                // `send` fail; that's fine, there's nothing left to notify.
                let _ = item.completion.send(outcome);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    fn echo_adapter() -> InferenceFn {
        Arc::new(|batch: Vec<Args>| {
            Box::pin(async move {
                Ok(batch
                    .into_iter()
                    .map(|args| Ok(args.get("text").cloned().unwrap_or(Value::Null)))
                    .collect())
            })
        })
    }

    #[tokio::test]
    async fn single_submission_round_trips() {
        let mut batcher = Batcher::new(BatchConfig {
            max_size: 4,
            timeout: StdDuration::from_millis(20),
        });
        batcher.start(echo_adapter());

        let mut args = Args::new();
        args.insert("text".into(), Value::Str("hi".into()));
        let result = batcher.submit(args).await.unwrap();
        assert_eq!(result, Value::Str("hi".into()));

        batcher.stop().await;
    }

    #[tokio::test]
    async fn concurrent_submissions_never_exceed_max_batch_size() {
        let seen_max = Arc::new(AtomicUsize::new(0));
        let seen_max_clone = seen_max.clone();
        let inference_fn: InferenceFn = Arc::new(move |batch: Vec<Args>| {
            let seen_max = seen_max_clone.clone();
            Box::pin(async move {
                seen_max.fetch_max(batch.len(), Ordering::SeqCst);
                Ok(batch.into_iter().map(|_| Ok(Value::Int64(1))).collect())
            })
        });

        let mut batcher = Batcher::new(BatchConfig {
            max_size: 3,
            timeout: StdDuration::from_millis(200),
        });
        batcher.start(inference_fn);

        let batcher = Arc::new(batcher);
        let mut handles = Vec::new();
        for _ in 0..6 {
            let batcher = batcher.clone();
            handles.push(tokio::spawn(async move {
                let args = Args::new();
                batcher.submit(args).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert!(seen_max.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn whole_batch_failure_reaches_every_waiter() {
        let inference_fn: InferenceFn = Arc::new(|batch: Vec<Args>| {
            Box::pin(async move {
                let _ = batch;
                Err(BlazeError::Inference {
                    model_name: "m".into(),
                    cause: "boom".into(),
                })
            })
        });

        let mut batcher = Batcher::new(BatchConfig {
            max_size: 3,
            timeout: StdDuration::from_millis(50),
        });
        batcher.start(inference_fn);
        let batcher = Arc::new(batcher);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let batcher = batcher.clone();
            handles.push(tokio::spawn(async move { batcher.submit(Args::new()).await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            match err {
                BlazeError::Inference { cause, .. } => assert!(cause.contains("boom")),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn length_mismatch_completes_all_items_with_an_error() {
        let inference_fn: InferenceFn = Arc::new(|batch: Vec<Args>| {
            Box::pin(async move {
                let _ = batch;
                Ok(vec![Ok(Value::Int64(1))])
            })
        });

        let mut batcher = Batcher::new(BatchConfig {
            max_size: 3,
            timeout: StdDuration::from_millis(50),
        });
        batcher.start(inference_fn);
        let batcher = Arc::new(batcher);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let batcher = batcher.clone();
            handles.push(tokio::spawn(async move { batcher.submit(Args::new()).await }));
        }
        for handle in handles {
            let err = handle.await.unwrap().unwrap_err();
            match err {
                BlazeError::Inference { cause, .. } => assert!(cause.contains("mismatch") || cause.contains("results")),
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn submission_after_stop_is_rejected_promptly() {
        let mut batcher = Batcher::new(BatchConfig::default());
        batcher.start(echo_adapter());
        batcher.stop().await;

        let err = batcher.submit(Args::new()).await.unwrap_err();
        assert!(matches!(err, BlazeError::Cancelled));
    }
}
