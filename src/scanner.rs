//! Pure line-separator scanning over byte ranges.
//!
//! Detects and matches the three supported separators (LF, CR, CRLF) in a
//! `&[u8]` range. When no kind is supplied it is auto-detected from the first
//! separator encountered scanning forward; once a kind is known, the rest of
//! the range is matched against that fixed-width pattern only. All offsets
//! reported are the offset of the *last byte* of the separator.
//!
//! Scanning uses `memchr` for the single-byte hot paths and to skip to CR
//! candidates for CRLF.

use crate::error::{LineSeekError, Result};
use memchr::{memchr, memchr_iter, memrchr};

const CR: u8 = 0x0d;
const LF: u8 = 0x0a;

/// Line separator flavor, fixed per scanning session.
///
/// See <https://en.wikipedia.org/wiki/Newline>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeparatorKind {
    /// `\n` (Unix)
    Lf,
    /// `\r` (classic Mac OS)
    Cr,
    /// `\r\n` (Windows)
    CrLf,
}

impl SeparatorKind {
    /// Byte pattern of this separator.
    pub const fn pattern(self) -> &'static [u8] {
        match self {
            SeparatorKind::Lf => b"\n",
            SeparatorKind::Cr => b"\r",
            SeparatorKind::CrLf => b"\r\n",
        }
    }

    /// Pattern width in bytes (1 or 2).
    pub const fn width(self) -> usize {
        self.pattern().len()
    }
}

/// Find the first separator in `bytes`, returning the offset of its last byte.
///
/// `from >= 0` searches forward starting at that offset. `from < 0` searches
/// backward from the tail (`-1` starts at the last byte); used for single-shot
/// "find one" queries, not for full indexing.
///
/// Returns `Ok(None)` when no separator is present; never panics on empty
/// input or out-of-range `from`.
pub fn find_separator(bytes: &[u8], from: i64, kind: Option<SeparatorKind>) -> Result<Option<u64>> {
    if bytes.is_empty() {
        return Ok(None);
    }

    if from >= 0 {
        find_forward(bytes, from as usize, kind)
    } else {
        let start = bytes.len() as i64 + from;
        if start < 0 {
            return Ok(None);
        }
        find_backward(bytes, start as usize, kind)
    }
}

fn find_forward(bytes: &[u8], start: usize, kind: Option<SeparatorKind>) -> Result<Option<u64>> {
    if start >= bytes.len() {
        return Ok(None);
    }

    let Some(kind) = kind else {
        for i in start..bytes.len() {
            match bytes[i] {
                CR => {
                    if bytes.get(i + 1) == Some(&LF) {
                        return Ok(Some(i as u64 + 1));
                    }
                    return Ok(Some(i as u64));
                }
                LF => return Ok(Some(i as u64)),
                _ => {}
            }
        }
        return Ok(None);
    };

    match kind.pattern() {
        &[b] => Ok(memchr(b, &bytes[start..]).map(|i| (start + i) as u64)),
        &[b0, b1] => {
            let mut i = start;
            while let Some(off) = memchr(b0, &bytes[i..]) {
                let at = i + off;
                if bytes.get(at + 1) == Some(&b1) {
                    return Ok(Some(at as u64 + 1));
                }
                i = at + 1;
            }
            Ok(None)
        }
        p => Err(LineSeekError::UnsupportedSeparatorWidth { width: p.len() }),
    }
}

fn find_backward(bytes: &[u8], start: usize, kind: Option<SeparatorKind>) -> Result<Option<u64>> {
    let start = start.min(bytes.len() - 1);

    let Some(kind) = kind else {
        for i in (0..=start).rev() {
            match bytes[i] {
                CR => {
                    if bytes.get(i + 1) == Some(&LF) {
                        return Ok(Some(i as u64 + 1));
                    }
                    return Ok(Some(i as u64));
                }
                LF => return Ok(Some(i as u64)),
                _ => {}
            }
        }
        return Ok(None);
    };

    match kind.pattern() {
        &[b] => Ok(memrchr(b, &bytes[..=start]).map(|i| i as u64)),
        &[b0, b1] => {
            let mut upper = start + 1;
            while let Some(at) = memrchr(b0, &bytes[..upper]) {
                if bytes.get(at + 1) == Some(&b1) {
                    return Ok(Some(at as u64 + 1));
                }
                if at == 0 {
                    break;
                }
                upper = at;
            }
            Ok(None)
        }
        p => Err(LineSeekError::UnsupportedSeparatorWidth { width: p.len() }),
    }
}

/// Append the end offset of every separator whose match *starts* in
/// `[from, limit)` to `offsets`, in increasing order.
///
/// Returns the kind in effect afterwards: the supplied one, the detected one,
/// or `None` when nothing could be determined in range (in which case
/// `offsets` is untouched).
///
/// `bytes` may extend one byte past `limit`; a CRLF whose CR sits at
/// `limit - 1` then matches and ends *at* `limit`. Chunked callers exploit
/// this lookahead so a separator straddling a chunk boundary is never
/// mis-read as a lone CR.
pub fn scan_separators(
    bytes: &[u8],
    from: usize,
    limit: usize,
    kind: Option<SeparatorKind>,
    offsets: &mut Vec<u64>,
) -> Result<Option<SeparatorKind>> {
    let limit = limit.min(bytes.len());
    let mut pos = from;

    let kind = match kind {
        Some(kind) => kind,
        None => match detect(bytes, &mut pos, limit, offsets) {
            Some(kind) => kind,
            None => return Ok(None),
        },
    };

    match kind.pattern() {
        &[b] => {
            for i in memchr_iter(b, &bytes[pos..limit]) {
                offsets.push((pos + i) as u64);
            }
        }
        &[b0, b1] => {
            let mut i = pos;
            while i < limit {
                match memchr(b0, &bytes[i..limit]) {
                    Some(off) => {
                        let at = i + off;
                        if bytes.get(at + 1) == Some(&b1) {
                            offsets.push(at as u64 + 1);
                            i = at + 2;
                        } else {
                            i = at + 1;
                        }
                    }
                    None => break,
                }
            }
        }
        p => return Err(LineSeekError::UnsupportedSeparatorWidth { width: p.len() }),
    }

    Ok(Some(kind))
}

/// Count separators whose match starts in `[from, limit)`.
///
/// Same walk as [`scan_separators`] without collecting offsets.
pub fn count_separators(
    bytes: &[u8],
    from: usize,
    limit: usize,
    kind: Option<SeparatorKind>,
) -> Result<(Option<SeparatorKind>, u64)> {
    let limit = limit.min(bytes.len());
    let mut pos = from;
    let mut count = 0u64;

    let kind = match kind {
        Some(kind) => kind,
        None => {
            let mut first = Vec::with_capacity(1);
            match detect(bytes, &mut pos, limit, &mut first) {
                Some(kind) => {
                    count += first.len() as u64;
                    kind
                }
                None => return Ok((None, 0)),
            }
        }
    };

    match kind.pattern() {
        &[b] => {
            count += memchr_iter(b, &bytes[pos..limit]).count() as u64;
        }
        &[b0, b1] => {
            let mut i = pos;
            while i < limit {
                match memchr(b0, &bytes[i..limit]) {
                    Some(off) => {
                        let at = i + off;
                        if bytes.get(at + 1) == Some(&b1) {
                            count += 1;
                            i = at + 2;
                        } else {
                            i = at + 1;
                        }
                    }
                    None => break,
                }
            }
        }
        p => return Err(LineSeekError::UnsupportedSeparatorWidth { width: p.len() }),
    }

    Ok((Some(kind), count))
}

/// Auto-detect the separator kind from the first match in `[*pos, limit)`,
/// recording that match and advancing `*pos` past it.
fn detect(
    bytes: &[u8],
    pos: &mut usize,
    limit: usize,
    offsets: &mut Vec<u64>,
) -> Option<SeparatorKind> {
    let mut i = *pos;
    while i < limit {
        match bytes[i] {
            CR => {
                if bytes.get(i + 1) == Some(&LF) {
                    offsets.push(i as u64 + 1);
                    *pos = i + 2;
                    return Some(SeparatorKind::CrLf);
                }
                offsets.push(i as u64);
                *pos = i + 1;
                return Some(SeparatorKind::Cr);
            }
            LF => {
                offsets.push(i as u64);
                *pos = i + 1;
                return Some(SeparatorKind::Lf);
            }
            _ => i += 1,
        }
    }
    None
}
