//! Protocol definitions shared between the client-side worker handle and the
//! scan worker task.
//!
//! Every request carries a `cookie` its replies must echo; a call that spans
//! several messages (progress then result) reuses one cookie as a session
//! token. Payloads travel as [`ByteSource`] values, so moving a request
//! through a channel transfers ownership of a view without copying the
//! backing bytes.

use crate::scanner::SeparatorKind;
use crate::source::ByteSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Correlation token linking a request to its replies across the task boundary.
pub type Cookie = u64;

/// Default deadline for a single RPC wait.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

/// Default sub-step size (bytes) for progress granularity inside a full scan.
pub const DEFAULT_SCAN_STEP: usize = 1024;

static NEXT_COOKIE: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, process-unique cookie.
pub fn next_cookie() -> Cookie {
    NEXT_COOKIE.fetch_add(1, Ordering::Relaxed)
}

/// Options for a single worker call.
#[derive(Debug, Clone)]
pub struct CallOptions {
    /// Session cookie correlating this call's messages. A fresh cookie is
    /// allocated when absent.
    pub cookie: Option<Cookie>,
    /// Deadline armed when the request is posted. Expiry abandons the wait;
    /// the worker's computation is not cancelled.
    pub timeout: Duration,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            cookie: None,
            timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

/// Requests accepted by a scan worker.
#[derive(Debug)]
pub enum ScanRequest {
    /// Single-shot search for the first separator (forward), or the last one
    /// when `from` is negative (reverse from the tail).
    FindSeparator {
        cookie: Cookie,
        source: ByteSource,
        from: i64,
        kind: Option<SeparatorKind>,
    },
    /// Scan the whole slice for separator end offsets, emitting progress
    /// every `step` bytes. Matches must start before `limit`; a byte at
    /// `limit`, when the slice carries one, is lookahead for a straddling
    /// CRLF.
    ScanAll {
        cookie: Cookie,
        source: ByteSource,
        limit: u64,
        step: usize,
        kind: Option<SeparatorKind>,
    },
    /// Count separators in the slice without collecting offsets.
    CountAll {
        cookie: Cookie,
        source: ByteSource,
        limit: u64,
        step: usize,
        kind: Option<SeparatorKind>,
    },
    /// Stop the worker loop.
    Shutdown,
}

/// Replies emitted by a scan worker back to its handle.
///
/// Terminal replies carry the elapsed time of the whole operation; progress
/// replies the time since the operation started.
#[derive(Debug)]
pub enum ScanReply {
    FindSeparatorResult {
        cookie: Cookie,
        offset: Option<u64>,
        duration: Duration,
    },
    /// Intermediate progress; delivered zero or more times before the
    /// terminal reply of the same cookie.
    Progress {
        cookie: Cookie,
        searched: u64,
        total: u64,
        duration: Duration,
    },
    ScanAllResult {
        cookie: Cookie,
        offsets: Vec<u64>,
        detected: Option<SeparatorKind>,
        searched: u64,
        total: u64,
        duration: Duration,
    },
    CountAllResult {
        cookie: Cookie,
        count: u64,
        detected: Option<SeparatorKind>,
        searched: u64,
        total: u64,
        duration: Duration,
    },
    Error {
        cookie: Cookie,
        message: String,
    },
}

impl ScanReply {
    pub fn cookie(&self) -> Cookie {
        match self {
            ScanReply::FindSeparatorResult { cookie, .. }
            | ScanReply::Progress { cookie, .. }
            | ScanReply::ScanAllResult { cookie, .. }
            | ScanReply::CountAllResult { cookie, .. }
            | ScanReply::Error { cookie, .. } => *cookie,
        }
    }

    /// Whether this reply resolves its call (everything except progress).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanReply::Progress { .. })
    }
}

/// Progress notification forwarded to an optional caller-supplied sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanProgress {
    pub searched: u64,
    pub total: u64,
}
