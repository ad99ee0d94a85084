//! Process-wide single-flight generation service.
//!
//! Sessions send requests to a worker task and never wait for the pass.
//! The worker runs each pass on its own task behind one async mutex, so
//! passes execute one at a time in request order.
//!
//! Cancellation uses a small synchronous slot, separate from the
//! generation mutex. It holds the token of the running pass and an epoch
//! that [`ThumbnailCoordinator::cancel_current`] bumps. A queued pass
//! whose request predates the latest cancel is dropped when it reaches
//! the front of the queue.
//!
//! The slot is a leaf lock. It is only taken inside short synchronous
//! helpers that never await, so it is never held while waiting for the
//! generation mutex, and `cancel_current` never touches the generation
//! mutex at all.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use photosync_protocol::ThumbRecord;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pass::{PassReport, generate_pass};
use crate::{ExternalTools, ThumbnailError, catalog};

struct GenerateRequest {
    dir: PathBuf,
    epoch: u64,
    done: Option<oneshot::Sender<PassReport>>,
}

#[derive(Default)]
struct CancelSlot {
    epoch: u64,
    running: Option<(u64, CancellationToken)>,
}

struct Inner {
    requests: mpsc::UnboundedSender<GenerateRequest>,
    generation: tokio::sync::Mutex<()>,
    slot: Mutex<CancelSlot>,
    next_pass: AtomicU64,
    tools: Arc<dyn ExternalTools>,
    shutdown: CancellationToken,
}

/// Handle to the thumbnail service; cheap to clone into every session.
#[derive(Clone)]
pub struct ThumbnailCoordinator {
    inner: Arc<Inner>,
}

impl ThumbnailCoordinator {
    /// Starts the worker task. It exits when `shutdown` is cancelled, which
    /// also cancels the pass in flight.
    pub fn spawn(
        tools: Arc<dyn ExternalTools>,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let coordinator = Self {
            inner: Arc::new(Inner {
                requests: tx,
                generation: tokio::sync::Mutex::new(()),
                slot: Mutex::new(CancelSlot::default()),
                next_pass: AtomicU64::new(1),
                tools,
                shutdown,
            }),
        };
        let handle = tokio::spawn(coordinator.clone().worker(rx));
        (coordinator, handle)
    }

    async fn worker(self, mut rx: mpsc::UnboundedReceiver<GenerateRequest>) {
        let shutdown = self.inner.shutdown.clone();
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("thumbnail worker stopping");
                    break;
                }
                request = rx.recv() => {
                    let Some(request) = request else { break };
                    let this = self.clone();
                    tokio::spawn(async move { this.run_pass(request).await });
                }
            }
        }
    }

    /// Queues a pass over `dir` and returns immediately.
    pub fn request_generate(&self, dir: impl Into<PathBuf>) {
        self.enqueue(dir.into(), None);
    }

    /// Queues a pass over `dir` and waits for its report.
    ///
    /// Returns `None` if the pass was dropped (stale request or shutdown).
    pub async fn generate_and_wait(&self, dir: impl Into<PathBuf>) -> Option<PassReport> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(dir.into(), Some(tx));
        rx.await.ok()
    }

    fn enqueue(&self, dir: PathBuf, done: Option<oneshot::Sender<PassReport>>) {
        let epoch = self.lock_slot().epoch;
        let request = GenerateRequest { dir, epoch, done };
        if self.inner.requests.send(request).is_err() {
            tracing::warn!("thumbnail worker is gone; generation request dropped");
        }
    }

    /// Cancels the pass in flight, if any, and every pass queued so far.
    pub fn cancel_current(&self) {
        let mut slot = self.lock_slot();
        slot.epoch += 1;
        if let Some((pass, token)) = slot.running.take() {
            tracing::info!(pass, "cancelling thumbnail generation");
            token.cancel();
        }
    }

    /// Returns `true` while a pass holds the generation lock.
    pub fn is_generating(&self) -> bool {
        self.inner.generation.try_lock().is_err()
    }

    /// Thumbnail count for `dir`. Never waits on a pass.
    pub async fn count(&self, dir: &Path) -> Result<usize, ThumbnailError> {
        catalog::count(dir).await
    }

    /// One catalog page for `dir`. Never waits on a pass.
    pub async fn list_page(
        &self,
        dir: &Path,
        page_index: usize,
        page_size: usize,
    ) -> Result<Vec<ThumbRecord>, ThumbnailError> {
        catalog::list_page(dir, page_index, page_size).await
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, CancelSlot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a pass for `epoch`, or returns `None` if a cancel happened
    /// since the request was queued.
    fn claim_slot(&self, epoch: u64) -> Option<(u64, CancellationToken)> {
        let mut slot = self.lock_slot();
        if slot.epoch != epoch || self.inner.shutdown.is_cancelled() {
            return None;
        }
        let pass = self.inner.next_pass.fetch_add(1, Ordering::Relaxed);
        let token = self.inner.shutdown.child_token();
        slot.running = Some((pass, token.clone()));
        Some((pass, token))
    }

    /// Clears the slot unless a later pass already owns it.
    fn release_slot(&self, pass: u64) {
        let mut slot = self.lock_slot();
        if slot.running.as_ref().is_some_and(|(id, _)| *id == pass) {
            slot.running = None;
        }
    }

    async fn run_pass(self, request: GenerateRequest) {
        let GenerateRequest { dir, epoch, done } = request;
        let _guard = self.inner.generation.lock().await;

        let Some((pass, token)) = self.claim_slot(epoch) else {
            tracing::debug!(dir = %dir.display(), "dropping stale generation request");
            return;
        };

        tracing::info!(pass, dir = %dir.display(), "thumbnail generation started");
        let result = generate_pass(&dir, self.inner.tools.as_ref(), &token).await;
        self.release_slot(pass);

        match result {
            Ok(report) => {
                if report.cancelled {
                    tracing::info!(
                        pass,
                        written = report.written,
                        "thumbnail generation cancelled"
                    );
                } else {
                    tracing::info!(
                        pass,
                        written = report.written,
                        skipped = report.skipped,
                        failed = report.failed,
                        "thumbnail generation finished"
                    );
                }
                if let Some(done) = done {
                    let _ = done.send(report);
                }
            }
            Err(e) => {
                tracing::error!(pass, dir = %dir.display(), "thumbnail generation failed: {e}");
            }
        }
    }
}
