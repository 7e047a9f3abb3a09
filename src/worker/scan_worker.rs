//! The scan worker task and its client-side handle.
//!
//! [`scan_worker_loop`] is the worker side: a plain request loop that scans
//! byte sources and sends back correlated replies. [`ScanWorker`] is the
//! client side: it posts requests, keeps an explicit pending-request table
//! keyed by cookie, and resolves each call on the matching terminal reply or
//! a deadline. Replies whose cookie is no longer registered (a wait that
//! already timed out) are dropped by the router.

use crate::error::{LineSeekError, Result};
use crate::scanner::{self, SeparatorKind};
use crate::source::ByteSource;
use crate::worker::protocol::{
    next_cookie, CallOptions, Cookie, ScanProgress, ScanReply, ScanRequest,
};
use crate::worker::{WorkerKind, WorkerState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Grace period for a worker to finish its current request during terminate.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Run the scan worker, processing requests until `Shutdown` or channel close.
pub async fn scan_worker_loop(
    mut rx: mpsc::Receiver<ScanRequest>,
    tx: mpsc::Sender<ScanReply>,
) {
    while let Some(request) = rx.recv().await {
        let ok = match request {
            ScanRequest::Shutdown => break,
            ScanRequest::FindSeparator {
                cookie,
                source,
                from,
                kind,
            } => {
                let started = Instant::now();
                let reply = match scanner::find_separator(source.as_bytes(), from, kind) {
                    Ok(offset) => ScanReply::FindSeparatorResult {
                        cookie,
                        offset,
                        duration: started.elapsed(),
                    },
                    Err(e) => ScanReply::Error {
                        cookie,
                        message: e.to_string(),
                    },
                };
                tx.send(reply).await.is_ok()
            }
            ScanRequest::ScanAll {
                cookie,
                source,
                limit,
                step,
                kind,
            } => run_scan_all(&tx, cookie, source, limit, step, kind).await,
            ScanRequest::CountAll {
                cookie,
                source,
                limit,
                step,
                kind,
            } => run_count_all(&tx, cookie, source, limit, step, kind).await,
        };

        if !ok {
            break;
        }
    }
}

async fn run_scan_all(
    tx: &mpsc::Sender<ScanReply>,
    cookie: Cookie,
    source: ByteSource,
    limit: u64,
    step: usize,
    kind: Option<SeparatorKind>,
) -> bool {
    let bytes = source.as_bytes();
    let limit = (limit as usize).min(bytes.len());
    let step = if step == 0 { limit.max(1) } else { step };
    let started = Instant::now();

    let mut offsets = Vec::new();
    let mut kind = kind;
    let mut searched = 0usize;

    while searched < limit {
        let window_end = (searched + step).min(limit);
        kind = match scanner::scan_separators(bytes, searched, window_end, kind, &mut offsets) {
            Ok(kind) => kind,
            Err(e) => {
                return tx
                    .send(ScanReply::Error {
                        cookie,
                        message: e.to_string(),
                    })
                    .await
                    .is_ok();
            }
        };
        searched = window_end;

        if searched < limit {
            let progress = ScanReply::Progress {
                cookie,
                searched: searched as u64,
                total: limit as u64,
                duration: started.elapsed(),
            };
            if tx.send(progress).await.is_err() {
                return false;
            }
        }
    }

    tx.send(ScanReply::ScanAllResult {
        cookie,
        offsets,
        detected: kind,
        searched: limit as u64,
        total: limit as u64,
        duration: started.elapsed(),
    })
    .await
    .is_ok()
}

async fn run_count_all(
    tx: &mpsc::Sender<ScanReply>,
    cookie: Cookie,
    source: ByteSource,
    limit: u64,
    step: usize,
    kind: Option<SeparatorKind>,
) -> bool {
    let bytes = source.as_bytes();
    let limit = (limit as usize).min(bytes.len());
    let step = if step == 0 { limit.max(1) } else { step };
    let started = Instant::now();

    let mut count = 0u64;
    let mut kind = kind;
    let mut searched = 0usize;

    while searched < limit {
        let window_end = (searched + step).min(limit);
        match scanner::count_separators(bytes, searched, window_end, kind) {
            Ok((detected, n)) => {
                kind = detected.or(kind);
                count += n;
            }
            Err(e) => {
                return tx
                    .send(ScanReply::Error {
                        cookie,
                        message: e.to_string(),
                    })
                    .await
                    .is_ok();
            }
        }
        searched = window_end;

        if searched < limit {
            let progress = ScanReply::Progress {
                cookie,
                searched: searched as u64,
                total: limit as u64,
                duration: started.elapsed(),
            };
            if tx.send(progress).await.is_err() {
                return false;
            }
        }
    }

    tx.send(ScanReply::CountAllResult {
        cookie,
        count,
        detected: kind,
        searched: limit as u64,
        total: limit as u64,
        duration: started.elapsed(),
    })
    .await
    .is_ok()
}

/// Result of a full-slice scan.
#[derive(Debug)]
pub struct ScanOutcome {
    /// Separator end offsets, relative to the scanned slice, increasing.
    pub offsets: Vec<u64>,
    /// Kind in effect after the scan (supplied or detected).
    pub detected: Option<SeparatorKind>,
    /// Worker-side elapsed time for the whole scan.
    pub duration: Duration,
}

/// Result of a full-slice separator count.
#[derive(Debug)]
pub struct CountOutcome {
    pub count: u64,
    pub detected: Option<SeparatorKind>,
    pub duration: Duration,
}

type PendingMap = Arc<Mutex<HashMap<Cookie, mpsc::UnboundedSender<ScanReply>>>>;

/// Client-side handle to one scan worker task.
///
/// Owned by the pool; the pool's `Occupied` lease guarantees a handle is
/// never driven by two concurrent owners.
#[derive(Debug)]
pub struct ScanWorker {
    kind: WorkerKind,
    tx: mpsc::Sender<ScanRequest>,
    pending: PendingMap,
    state: Mutex<WorkerState>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ScanWorker {
    /// Spawn the worker task plus a reply router and return the handle.
    ///
    /// Must run inside a tokio runtime.
    pub(crate) fn spawn(kind: WorkerKind) -> Self {
        let (req_tx, req_rx) = mpsc::channel(16);
        let (reply_tx, mut reply_rx) = mpsc::channel::<ScanReply>(16);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let loop_task = tokio::spawn(scan_worker_loop(req_rx, reply_tx));

        let router_pending = Arc::clone(&pending);
        let router_task = tokio::spawn(async move {
            while let Some(reply) = reply_rx.recv().await {
                let cookie = reply.cookie();
                let mut map = router_pending.lock();
                if let Some(waiter) = map.get(&cookie) {
                    let terminal = reply.is_terminal();
                    let _ = waiter.send(reply);
                    if terminal {
                        map.remove(&cookie);
                    }
                }
                // Unknown cookie: the wait already timed out and was
                // deregistered; the reply is dropped.
            }
        });

        Self {
            kind,
            tx: req_tx,
            pending,
            state: Mutex::new(WorkerState::Idle),
            tasks: Mutex::new(vec![loop_task, router_task]),
        }
    }

    /// A handle whose worker accepts requests but never replies. Lets tests
    /// exercise the timeout path deterministically.
    #[cfg(test)]
    pub(crate) fn unresponsive() -> Self {
        let (req_tx, mut req_rx) = mpsc::channel::<ScanRequest>(16);
        let task = tokio::spawn(async move { while req_rx.recv().await.is_some() {} });
        Self {
            kind: WorkerKind::Scanner,
            tx: req_tx,
            pending: Arc::new(Mutex::new(HashMap::new())),
            state: Mutex::new(WorkerState::Idle),
            tasks: Mutex::new(vec![task]),
        }
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    /// Single-shot separator search (see [`scanner::find_separator`]).
    pub async fn find_separator(
        &self,
        source: ByteSource,
        from: i64,
        kind: Option<SeparatorKind>,
        options: CallOptions,
    ) -> Result<Option<u64>> {
        let reply = self
            .call(
                |cookie| ScanRequest::FindSeparator {
                    cookie,
                    source,
                    from,
                    kind,
                },
                &options,
                None,
            )
            .await?;
        match reply {
            ScanReply::FindSeparatorResult { offset, .. } => Ok(offset),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Scan a whole slice for separator end offsets.
    ///
    /// `limit` bounds where matches may start; `step` sets progress
    /// granularity. Progress notifications go to `progress` when supplied.
    pub async fn scan_all(
        &self,
        source: ByteSource,
        limit: u64,
        step: usize,
        kind: Option<SeparatorKind>,
        progress: Option<&mpsc::UnboundedSender<ScanProgress>>,
        options: CallOptions,
    ) -> Result<ScanOutcome> {
        let reply = self
            .call(
                |cookie| ScanRequest::ScanAll {
                    cookie,
                    source,
                    limit,
                    step,
                    kind,
                },
                &options,
                progress,
            )
            .await?;
        match reply {
            ScanReply::ScanAllResult {
                offsets,
                detected,
                duration,
                ..
            } => Ok(ScanOutcome {
                offsets,
                detected,
                duration,
            }),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Count separators in a slice.
    pub async fn count_all(
        &self,
        source: ByteSource,
        limit: u64,
        step: usize,
        kind: Option<SeparatorKind>,
        progress: Option<&mpsc::UnboundedSender<ScanProgress>>,
        options: CallOptions,
    ) -> Result<CountOutcome> {
        let reply = self
            .call(
                |cookie| ScanRequest::CountAll {
                    cookie,
                    source,
                    limit,
                    step,
                    kind,
                },
                &options,
                progress,
            )
            .await?;
        match reply {
            ScanReply::CountAllResult {
                count,
                detected,
                duration,
                ..
            } => Ok(CountOutcome {
                count,
                detected,
                duration,
            }),
            other => Err(unexpected_reply(&other)),
        }
    }

    /// Post a request and await its terminal reply.
    ///
    /// The deadline is armed at post time. On expiry the pending entry is
    /// removed so a late reply cannot resolve anything.
    async fn call(
        &self,
        make_request: impl FnOnce(Cookie) -> ScanRequest,
        options: &CallOptions,
        progress: Option<&mpsc::UnboundedSender<ScanProgress>>,
    ) -> Result<ScanReply> {
        let cookie = options.cookie.unwrap_or_else(next_cookie);
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        self.pending.lock().insert(cookie, reply_tx);
        let deadline = tokio::time::Instant::now() + options.timeout;

        if self.tx.send(make_request(cookie)).await.is_err() {
            self.pending.lock().remove(&cookie);
            return Err(LineSeekError::worker("scan worker is gone"));
        }

        loop {
            match tokio::time::timeout_at(deadline, reply_rx.recv()).await {
                Ok(Some(ScanReply::Progress {
                    searched, total, ..
                })) => {
                    if let Some(sink) = progress {
                        let _ = sink.send(ScanProgress { searched, total });
                    }
                }
                Ok(Some(ScanReply::Error { message, .. })) => {
                    return Err(LineSeekError::worker(message));
                }
                Ok(Some(reply)) => return Ok(reply),
                Ok(None) => {
                    self.pending.lock().remove(&cookie);
                    return Err(LineSeekError::worker("scan worker reply channel closed"));
                }
                Err(_) => {
                    self.pending.lock().remove(&cookie);
                    return Err(LineSeekError::RpcTimeout {
                        timeout: options.timeout,
                    });
                }
            }
        }
    }

    /// Stop the worker: best-effort graceful shutdown within
    /// [`SHUTDOWN_GRACE`], abort past it.
    pub(crate) async fn terminate(&self) {
        self.set_state(WorkerState::Destroyed);
        let _ = self.tx.try_send(ScanRequest::Shutdown);

        let tasks = std::mem::take(&mut *self.tasks.lock());
        for task in tasks {
            let abort = task.abort_handle();
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                abort.abort();
            }
        }
    }
}

fn unexpected_reply(reply: &ScanReply) -> LineSeekError {
    LineSeekError::worker(format!("unexpected reply: {:?}", reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::protocol::DEFAULT_RPC_TIMEOUT;

    #[tokio::test]
    async fn scan_all_returns_offsets_and_kind() {
        let worker = ScanWorker::spawn(WorkerKind::Scanner);
        let source = ByteSource::from_bytes(&b"one\ntwo\nthree\n"[..]);
        let limit = source.len();

        let outcome = worker
            .scan_all(source, limit, 0, None, None, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.offsets, vec![3, 7, 13]);
        assert_eq!(outcome.detected, Some(SeparatorKind::Lf));

        worker.terminate().await;
    }

    #[tokio::test]
    async fn scan_all_emits_progress_per_step() {
        let worker = ScanWorker::spawn(WorkerKind::Scanner);
        let source = ByteSource::from_bytes(&b"a\nb\nc\nd\n"[..]);
        let limit = source.len();
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

        let outcome = worker
            .scan_all(
                source,
                limit,
                3,
                None,
                Some(&progress_tx),
                CallOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.offsets, vec![1, 3, 5, 7]);

        // 8 bytes in steps of 3: progress at 3 and 6, result at 8.
        let mut seen = Vec::new();
        while let Ok(p) = progress_rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(
            seen,
            vec![
                ScanProgress {
                    searched: 3,
                    total: 8
                },
                ScanProgress {
                    searched: 6,
                    total: 8
                },
            ]
        );

        worker.terminate().await;
    }

    #[tokio::test]
    async fn count_all_matches_scan_all() {
        let worker = ScanWorker::spawn(WorkerKind::Scanner);
        let source = ByteSource::from_bytes(&b"a\r\nb\r\nc\r\n"[..]);
        let limit = source.len();

        let count = worker
            .count_all(source.clone(), limit, 4, None, None, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(count.count, 3);
        assert_eq!(count.detected, Some(SeparatorKind::CrLf));

        worker.terminate().await;
    }

    #[tokio::test]
    async fn find_separator_forward_and_reverse() {
        let worker = ScanWorker::spawn(WorkerKind::Scanner);
        let source = ByteSource::from_bytes(&b"ab\ncd\nef"[..]);

        let first = worker
            .find_separator(source.clone(), 0, None, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(first, Some(2));

        let last = worker
            .find_separator(source.clone(), -1, None, CallOptions::default())
            .await
            .unwrap();
        assert_eq!(last, Some(5));

        worker.terminate().await;
    }

    #[tokio::test]
    async fn withheld_reply_times_out_near_deadline() {
        let worker = ScanWorker::unresponsive();
        let source = ByteSource::from_bytes(&b"a\n"[..]);
        let timeout = Duration::from_millis(50);

        let started = Instant::now();
        let result = worker
            .scan_all(
                source,
                2,
                0,
                None,
                None,
                CallOptions {
                    cookie: None,
                    timeout,
                },
            )
            .await;
        let elapsed = started.elapsed();

        match result {
            Err(LineSeekError::RpcTimeout { .. }) => {}
            other => panic!("expected RpcTimeout, got {:?}", other),
        }
        assert!(elapsed >= timeout, "rejected before the deadline");
        assert!(
            elapsed < timeout + Duration::from_millis(500),
            "rejected far past the deadline"
        );
        assert!(worker.pending.lock().is_empty(), "wait not deregistered");

        worker.terminate().await;
    }

    #[tokio::test]
    async fn session_cookie_is_honored() {
        let worker = ScanWorker::spawn(WorkerKind::Scanner);
        let source = ByteSource::from_bytes(&b"x\ny\n"[..]);

        let outcome = worker
            .scan_all(
                source,
                4,
                0,
                None,
                None,
                CallOptions {
                    cookie: Some(9999),
                    timeout: DEFAULT_RPC_TIMEOUT,
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.offsets, vec![1, 3]);

        worker.terminate().await;
    }
}
