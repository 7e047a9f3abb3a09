//! Global line index and the chunked builder that produces it.

use crate::error::Result;
use crate::scanner::SeparatorKind;
use crate::source::ByteSource;
use crate::worker::scan_worker::ScanWorker;
use crate::worker::{CallOptions, WorkerKind, WorkerPool, DEFAULT_RPC_TIMEOUT};
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// Bytes scanned per indexing round trip.
pub const DEFAULT_CHUNK_SIZE: usize = 10 * 1024 * 1024;

/// Absolute end offsets of every line separator in a source.
///
/// Entry `i` is the offset of the last byte of line `i`'s separator, so line
/// `i` spans `[entry[i-1] + 1, entry[i]]` (line 0 starts at byte 0). Strictly
/// increasing; immutable once built.
#[derive(Debug, Clone)]
pub struct LineIndex {
    separator_ends: Vec<u64>,
    kind: Option<SeparatorKind>,
    synthetic_tail: bool,
}

impl LineIndex {
    pub(crate) fn new(
        separator_ends: Vec<u64>,
        kind: Option<SeparatorKind>,
        synthetic_tail: bool,
    ) -> Self {
        Self {
            separator_ends,
            kind,
            synthetic_tail,
        }
    }

    pub fn line_count(&self) -> u64 {
        self.separator_ends.len() as u64
    }

    /// Separator kind detected during indexing, `None` for a separator-free
    /// source.
    pub fn separator_kind(&self) -> Option<SeparatorKind> {
        self.kind
    }

    /// Whether the final entry was synthesized because the source did not
    /// end with a separator.
    pub fn has_synthetic_tail(&self) -> bool {
        self.synthetic_tail
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.separator_ends
    }

    /// Byte range of one line, separator included.
    pub fn line_span(&self, line: u64) -> Option<Range<u64>> {
        self.range_span(line, line + 1)
    }

    /// Byte range covering lines `[start, end)`, separators included.
    pub fn range_span(&self, start: u64, end: u64) -> Option<Range<u64>> {
        if start >= end || end > self.line_count() {
            return None;
        }
        let first = if start == 0 {
            0
        } else {
            self.separator_ends[start as usize - 1] + 1
        };
        let last = self.separator_ends[end as usize - 1] + 1;
        Some(first..last)
    }
}

/// Builds a [`LineIndex`] by scanning a source in fixed-size chunks.
///
/// Chunks are scanned strictly sequentially on one leased worker, so offsets
/// come out increasing by construction and peak transfer stays at one chunk.
/// Each chunk slice carries one byte of lookahead past its limit so a CRLF
/// straddling the boundary is matched by the chunk its CR falls in, never
/// mis-read as a lone CR.
#[derive(Debug)]
pub struct ChunkedIndexBuilder {
    pool: Arc<WorkerPool>,
    chunk_size: usize,
    rpc_timeout: Duration,
}

impl ChunkedIndexBuilder {
    pub fn new(pool: Arc<WorkerPool>) -> Self {
        Self {
            pool,
            chunk_size: DEFAULT_CHUNK_SIZE,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Scan `source` end to end and build its index.
    ///
    /// `on_progress(scanned, total)` runs after every chunk. When the source
    /// does not end with a separator a terminal entry at `size - 1` is
    /// synthesized, so the trailing partial line is addressable like any
    /// other.
    pub async fn build(
        &self,
        source: &ByteSource,
        mut on_progress: impl FnMut(u64, u64),
    ) -> Result<LineIndex> {
        let worker = self.pool.acquire(WorkerKind::Scanner)?;
        let outcome = self
            .scan_chunks(&worker, source, &mut on_progress)
            .await;
        self.pool.release(&worker);
        let (mut ends, kind) = outcome?;

        let size = source.len();
        let mut synthetic_tail = false;
        if size > 0 && ends.last() != Some(&(size - 1)) {
            ends.push(size - 1);
            synthetic_tail = true;
        }

        Ok(LineIndex::new(ends, kind, synthetic_tail))
    }

    async fn scan_chunks(
        &self,
        worker: &ScanWorker,
        source: &ByteSource,
        on_progress: &mut impl FnMut(u64, u64),
    ) -> Result<(Vec<u64>, Option<SeparatorKind>)> {
        let size = source.len();
        let chunk_size = self.chunk_size as u64;
        let mut ends: Vec<u64> = Vec::new();
        let mut kind: Option<SeparatorKind> = None;
        let mut offset = 0u64;

        while offset < size {
            let chunk_end = (offset + chunk_size).min(size);
            let limit = chunk_end - offset;
            // One extra byte past the limit when available: lookahead for a
            // boundary-straddling CRLF.
            let slice = source.slice(offset..(chunk_end + 1).min(size));

            let outcome = worker
                .scan_all(
                    slice,
                    limit,
                    limit as usize,
                    kind,
                    None,
                    CallOptions {
                        cookie: None,
                        timeout: self.rpc_timeout,
                    },
                )
                .await?;

            // Kind is locked in by the earliest chunk that detects one.
            if kind.is_none() {
                kind = outcome.detected;
            }
            ends.extend(outcome.offsets.iter().map(|local| local + offset));

            offset = chunk_end;
            on_progress(offset, size);
        }

        Ok((ends, kind))
    }
}
