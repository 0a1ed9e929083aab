//! Line-delimited transport over byte streams.
//!
//! Each inbound line carries one message. Lines longer than the configured
//! limit and lines that are not UTF-8 are dropped with a warning; blank
//! lines are skipped.

use std::cell::RefCell;
use std::fmt;
use std::io::{self, BufRead, Read, Write};

use statebridge_protocol::{Connection, MessageWriter};
use tracing::{debug, warn};

use crate::STDIO_TARGET;

/// Counters for one served session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Lines handed to the adapter.
    pub delivered: usize,
    /// Lines dropped as oversize or not UTF-8.
    pub dropped: usize,
}

enum Line {
    Message(String),
    Blank,
    Oversize { len: usize },
    NotUtf8,
}

/// A [`Connection`] writing each posted message as one line.
pub struct LineConnection<W> {
    writer: RefCell<MessageWriter<W>>,
}

impl<W: Write> LineConnection<W> {
    /// Wraps an output stream.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            writer: RefCell::new(MessageWriter::new(writer)),
        }
    }
}

impl<W: Write> Connection for LineConnection<W> {
    fn post_message(&self, message: String) {
        if let Err(error) = self.writer.borrow_mut().write_encoded(&message) {
            warn!(target: STDIO_TARGET, %error, "failed to write message");
        }
    }
}

impl<W> fmt::Debug for LineConnection<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LineConnection").finish_non_exhaustive()
    }
}

/// Reads `input` to the end, handing each accepted line to `deliver`.
///
/// # Errors
///
/// Returns the first read error other than an interruption.
pub fn serve_lines<R, F>(mut input: R, limit: usize, mut deliver: F) -> io::Result<SessionStats>
where
    R: BufRead,
    F: FnMut(&str),
{
    let mut stats = SessionStats::default();
    let mut buffer = Vec::new();
    while let Some(line) = read_line(&mut input, limit, &mut buffer)? {
        match line {
            Line::Message(text) => {
                deliver(&text);
                stats.delivered += 1;
            }
            Line::Blank => debug!(target: STDIO_TARGET, "skipping blank line"),
            Line::Oversize { len } => {
                warn!(target: STDIO_TARGET, len, limit, "dropping oversize line");
                stats.dropped += 1;
            }
            Line::NotUtf8 => {
                warn!(target: STDIO_TARGET, "dropping line that is not UTF-8");
                stats.dropped += 1;
            }
        }
    }
    debug!(
        target: STDIO_TARGET,
        delivered = stats.delivered,
        dropped = stats.dropped,
        "input closed"
    );
    Ok(stats)
}

/// Reads one line of at most `limit` bytes, excluding the terminator.
fn read_line<R: BufRead>(
    input: &mut R,
    limit: usize,
    buffer: &mut Vec<u8>,
) -> io::Result<Option<Line>> {
    buffer.clear();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    let read = input.by_ref().take(cap).read_until(b'\n', buffer)?;
    if read == 0 {
        return Ok(None);
    }
    if buffer.last() != Some(&b'\n') && buffer.len() > limit {
        let skipped = input.skip_until(b'\n')?;
        return Ok(Some(Line::Oversize {
            len: buffer.len() + skipped,
        }));
    }
    let line = match std::str::from_utf8(buffer) {
        Ok(text) if text.trim().is_empty() => Line::Blank,
        Ok(text) => Line::Message(text.trim().to_owned()),
        Err(_) => Line::NotUtf8,
    };
    Ok(Some(line))
}
