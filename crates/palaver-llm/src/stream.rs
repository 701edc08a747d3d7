//! The streaming normalizer.
//!
//! Vendor adapters emit [`RawEvent`]s over a channel; this module turns that
//! into the public [`ChunkStream`] with the contracts the rest of palaver
//! relies on:
//!
//! - the sequence is finite and ends with exactly one `is_final` chunk,
//!   whether the vendor signalled completion, errored mid-stream, stalled
//!   past the timeout, or just closed the connection;
//! - chunks arrive in transport order;
//! - dropping the stream aborts the producer task, which closes the vendor
//!   transport.
//!
//! Transport errors and stalls are logged and converted into the terminal
//! chunk; whatever partial text was already emitted stands.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::adapter::{RawEvent, VendorAdapter};
use crate::config::ServiceConfig;
use crate::types::{ChatMessage, StreamChunk};

/// If no vendor event arrives within this window the transport is presumed
/// dead and the stream is terminated with whatever accumulated.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(30);

const CHANNEL_CAPACITY: usize = 32;

/// A finite, cancellable sequence of [`StreamChunk`]s for one call.
///
/// Yields in transport order and always ends with exactly one chunk whose
/// `is_final` flag is set. Dropping the stream cancels the underlying
/// vendor transport.
pub struct ChunkStream {
    inner: ReceiverStream<StreamChunk>,
    pump: JoinHandle<()>,
    // The transport-holding worker must die with the stream too; aborting
    // only the pump would leave it parked on the vendor socket.
    worker: AbortHandle,
}

impl Stream for ChunkStream {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ChunkStream {
    fn drop(&mut self) {
        self.pump.abort();
        self.worker.abort();
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream").finish_non_exhaustive()
    }
}

/// Drive one adapter streaming call and normalize it into a [`ChunkStream`].
pub(crate) fn run(
    adapter: Arc<dyn VendorAdapter>,
    messages: Vec<ChatMessage>,
    config: ServiceConfig,
    stall_timeout: Duration,
) -> ChunkStream {
    let (raw_tx, mut raw_rx) = mpsc::channel::<RawEvent>(CHANNEL_CAPACITY);
    let (out_tx, out_rx) = mpsc::channel::<StreamChunk>(CHANNEL_CAPACITY);

    let vendor = config.vendor;
    let model = config.model.clone();

    let worker = tokio::spawn(async move {
        adapter.stream_chat(&messages, &config, raw_tx).await
    });
    let worker_abort = worker.abort_handle();

    let pump = tokio::spawn(async move {
        loop {
            match tokio::time::timeout(stall_timeout, raw_rx.recv()).await {
                Ok(Some(RawEvent::Delta(text))) => {
                    if text.is_empty() {
                        continue;
                    }
                    let chunk = StreamChunk::delta(text, vendor, model.clone());
                    if out_tx.send(chunk).await.is_err() {
                        // Consumer went away; tear down the transport.
                        worker.abort();
                        return;
                    }
                }
                Ok(Some(RawEvent::Done)) => {
                    debug!(vendor = %vendor, "stream completed");
                    worker.abort();
                    break;
                }
                Ok(None) => {
                    // Channel closed without an explicit done: the adapter
                    // returned, either cleanly (connection close) or with an
                    // error worth logging.
                    match worker.await {
                        Ok(Err(err)) => {
                            warn!(vendor = %vendor, error = %err, "stream transport failed; terminating");
                        }
                        Err(join_err) if !join_err.is_cancelled() => {
                            warn!(vendor = %vendor, error = %join_err, "stream worker panicked");
                        }
                        _ => {}
                    }
                    break;
                }
                Err(_) => {
                    worker.abort();
                    warn!(
                        vendor = %vendor,
                        stall_ms = stall_timeout.as_millis() as u64,
                        "stream stalled; cancelling transport"
                    );
                    break;
                }
            }
        }

        let _ = out_tx.send(StreamChunk::terminal(vendor, model)).await;
    });

    ChunkStream {
        inner: ReceiverStream::new(out_rx),
        pump,
        worker: worker_abort,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::VendorAdapter;
    use crate::error::{AdapterError, Result};
    use crate::types::{ChatResult, ModelDescriptor};
    use crate::vendor::VendorId;
    use async_trait::async_trait;
    use futures_util::StreamExt;

    /// Scripted adapter: plays back a fixed sequence of raw events, then
    /// either hangs (simulating a stalled vendor) or finishes with the
    /// given result.
    struct Scripted {
        events: Vec<RawEvent>,
        outcome: fn() -> Result<()>,
        then_hang: bool,
    }

    #[async_trait]
    impl VendorAdapter for Scripted {
        fn vendor(&self) -> VendorId {
            VendorId::OpenAi
        }

        async fn chat(&self, _m: &[ChatMessage], _c: &ServiceConfig) -> Result<ChatResult> {
            unreachable!("unary path not used in these tests")
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        async fn stream_chat(
            &self,
            _messages: &[ChatMessage],
            _config: &ServiceConfig,
            tx: mpsc::Sender<RawEvent>,
        ) -> Result<()> {
            for event in &self.events {
                if tx.send(event.clone()).await.is_err() {
                    return Ok(());
                }
            }
            if self.then_hang {
                futures_util::future::pending::<()>().await;
            }
            (self.outcome)()
        }

        async fn list_models(&self, _c: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
            Ok(vec![])
        }
    }

    fn scripted(events: Vec<RawEvent>, outcome: fn() -> Result<()>) -> Arc<dyn VendorAdapter> {
        Arc::new(Scripted {
            events,
            outcome,
            then_hang: false,
        })
    }

    fn test_config() -> ServiceConfig {
        let mut config = ServiceConfig::new(VendorId::OpenAi, "gpt-4o");
        config.credential = "sk-test".into();
        config
    }

    async fn collect(stream: ChunkStream) -> Vec<StreamChunk> {
        stream.collect().await
    }

    #[tokio::test]
    async fn happy_path_ends_with_single_terminal() {
        let adapter = scripted(
            vec![
                RawEvent::Delta("Hel".into()),
                RawEvent::Delta("lo".into()),
                RawEvent::Done,
            ],
            || Ok(()),
        );
        let chunks = collect(run(
            adapter,
            vec![ChatMessage::user("hi")],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text_delta, "Hel");
        assert_eq!(chunks[1].text_delta, "lo");
        assert!(chunks[2].is_final);
        assert!(chunks[2].text_delta.is_empty());
        assert_eq!(chunks.iter().filter(|c| c.is_final).count(), 1);
    }

    #[tokio::test]
    async fn connection_close_without_done_still_terminates() {
        let adapter = scripted(vec![RawEvent::Delta("partial".into())], || Ok(()));
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text_delta, "partial");
        assert!(chunks[1].is_final);
    }

    #[tokio::test]
    async fn mid_stream_error_still_terminates() {
        let adapter = scripted(vec![RawEvent::Delta("some".into())], || {
            Err(AdapterError::Upstream {
                vendor: VendorId::OpenAi,
                status: None,
                message: "connection reset".into(),
            })
        });
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].is_final);
    }

    #[tokio::test]
    async fn immediate_error_yields_lone_terminal() {
        let adapter = scripted(vec![], || {
            Err(AdapterError::Upstream {
                vendor: VendorId::OpenAi,
                status: Some(401),
                message: "bad key".into(),
            })
        });
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_final);
    }

    #[tokio::test]
    async fn stall_is_cancelled_with_partial_text() {
        // One quick delta, then the vendor goes silent forever.
        let adapter: Arc<dyn VendorAdapter> = Arc::new(Scripted {
            events: vec![RawEvent::Delta("before-stall".into())],
            outcome: || Ok(()),
            then_hang: true,
        });
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_millis(100),
        ))
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text_delta, "before-stall");
        assert!(chunks[1].is_final);
    }

    #[tokio::test]
    async fn empty_deltas_are_dropped() {
        let adapter = scripted(
            vec![
                RawEvent::Delta(String::new()),
                RawEvent::Delta("x".into()),
                RawEvent::Done,
            ],
            || Ok(()),
        );
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text_delta, "x");
    }

    #[tokio::test]
    async fn dropping_stream_aborts_producer() {
        let adapter: Arc<dyn VendorAdapter> = Arc::new(Scripted {
            events: vec![RawEvent::Delta("x".into()); 100],
            outcome: || Ok(()),
            then_hang: false,
        });
        let mut stream = run(adapter, vec![], test_config(), Duration::from_secs(5));
        let first = stream.next().await;
        assert!(first.is_some());
        drop(stream);
        // Nothing to assert beyond not hanging: abort-on-drop severed the
        // pump, and the worker's next send fails against a closed channel.
    }

    /// Holds a flag high for as long as the owning future is alive; the
    /// flag clearing proves the transport-side future was torn down.
    struct TransportGuard(Arc<std::sync::atomic::AtomicBool>);

    impl Drop for TransportGuard {
        fn drop(&mut self) {
            self.0.store(false, std::sync::atomic::Ordering::SeqCst);
        }
    }

    /// Sends one delta, then parks on the transport forever while holding
    /// a [`TransportGuard`].
    struct StalledVendor {
        held: Arc<std::sync::atomic::AtomicBool>,
    }

    #[async_trait]
    impl VendorAdapter for StalledVendor {
        fn vendor(&self) -> VendorId {
            VendorId::OpenAi
        }

        async fn chat(&self, _m: &[ChatMessage], _c: &ServiceConfig) -> Result<ChatResult> {
            unreachable!("unary path not used in these tests")
        }

        fn supports_streaming(&self) -> bool {
            true
        }

        async fn stream_chat(
            &self,
            _messages: &[ChatMessage],
            _config: &ServiceConfig,
            tx: mpsc::Sender<RawEvent>,
        ) -> Result<()> {
            self.held.store(true, std::sync::atomic::Ordering::SeqCst);
            let _guard = TransportGuard(Arc::clone(&self.held));
            let _ = tx.send(RawEvent::Delta("first".into())).await;
            futures_util::future::pending::<()>().await;
            Ok(())
        }

        async fn list_models(&self, _c: &ServiceConfig) -> Result<Vec<ModelDescriptor>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn dropping_stream_releases_stalled_transport() {
        let held = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let adapter: Arc<dyn VendorAdapter> = Arc::new(StalledVendor {
            held: Arc::clone(&held),
        });

        // A generous stall window: the drop, not the timeout, must do the
        // teardown here.
        let mut stream = run(adapter, vec![], test_config(), Duration::from_secs(60));
        let first = stream.next().await;
        assert!(first.is_some());
        assert!(held.load(std::sync::atomic::Ordering::SeqCst));

        drop(stream);

        let released = async {
            while held.load(std::sync::atomic::Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(2), released)
            .await
            .expect("transport still held after stream drop");
    }

    #[tokio::test]
    async fn chunks_carry_vendor_and_model() {
        let adapter = scripted(vec![RawEvent::Delta("a".into()), RawEvent::Done], || Ok(()));
        let chunks = collect(run(
            adapter,
            vec![],
            test_config(),
            Duration::from_secs(5),
        ))
        .await;
        for chunk in &chunks {
            assert_eq!(chunk.vendor, VendorId::OpenAi);
            assert_eq!(chunk.model, "gpt-4o");
        }
    }
}
