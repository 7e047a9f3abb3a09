//! On-demand line-range access without fragment bookkeeping.

use crate::error::{LineSeekError, Result};
use crate::reader::{decode_lines, LineReader, LoadState, ReaderCore, ReaderEvent, ReaderOptions};
use crate::source::ByteSource;
use crate::worker::WorkerPool;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

/// Result of one [`LineRangeReader::read_lines`] call.
#[derive(Debug)]
pub struct ReadLines {
    /// Decoded lines, separators included.
    pub lines: Vec<String>,
    /// Time spent materializing the byte range.
    pub load_duration: Duration,
    /// Time spent decoding it into strings.
    pub decode_duration: Duration,
}

/// Reader that decodes arbitrary line windows straight from the index.
///
/// Keeps only the global index, so its footprint stays flat no matter how
/// many windows are read. Decodes are serialized per instance: a second
/// concurrent `read_lines` call queues behind the first.
pub struct LineRangeReader {
    core: Arc<ReaderCore>,
    decode_gate: tokio::sync::Mutex<()>,
}

impl LineRangeReader {
    /// Open a reader over `source` and start indexing in the background.
    pub fn open(source: ByteSource, pool: Arc<WorkerPool>, options: &ReaderOptions) -> Arc<Self> {
        let core = ReaderCore::spawn_load(source, pool, options);
        Arc::new(Self {
            core,
            decode_gate: tokio::sync::Mutex::new(()),
        })
    }

    /// Decode lines `[start, start + length)`, clamped to the source's end.
    ///
    /// `length == 0` fails with `InvalidArgument`. A `start` at or past the
    /// last line yields an empty result without error; a window running past
    /// the end comes back shorter than requested. The byte range is derived
    /// straight from the index, so no worker round trip is needed.
    pub async fn read_lines(&self, start: u64, length: u64) -> Result<ReadLines> {
        if length == 0 {
            return Err(LineSeekError::invalid_argument(
                "read_lines length must be positive",
            ));
        }
        let index = self.core.index()?;
        let total = index.line_count();
        let end = start.saturating_add(length).min(total);
        if start >= end {
            return Ok(ReadLines {
                lines: Vec::new(),
                load_duration: Duration::ZERO,
                decode_duration: Duration::ZERO,
            });
        }

        // One decode at a time per reader; later callers queue here.
        let _gate = self.decode_gate.lock().await;

        let span = index
            .range_span(start, end)
            .ok_or_else(|| LineSeekError::other("line range fell outside the index"))?;

        let load_started = Instant::now();
        let slice = self.core.source().slice(span.clone());
        let bytes = slice.as_bytes().to_vec();
        let load_duration = load_started.elapsed();

        let decode_started = Instant::now();
        let local_ends: Vec<u64> = index.as_slice()[start as usize..end as usize]
            .iter()
            .map(|absolute| absolute - span.start)
            .collect();
        let lines = decode_lines(&bytes, &local_ends);
        let decode_duration = decode_started.elapsed();

        Ok(ReadLines {
            lines,
            load_duration,
            decode_duration,
        })
    }
}

#[async_trait]
impl LineReader for LineRangeReader {
    async fn loaded(&self) {
        self.core.loaded().await;
    }

    fn state(&self) -> LoadState {
        self.core.state()
    }

    fn total_lines(&self) -> Result<u64> {
        self.core.total_lines()
    }

    fn source_size(&self) -> u64 {
        self.core.source().len()
    }

    fn subscribe(&self) -> broadcast::Receiver<ReaderEvent> {
        self.core.subscribe()
    }
}
