//! Bounded line reading shared by the listener, the client and the proxy transport.

use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;

/// Outcome of reading one frame.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ReadFrame {
    /// A full line is in the buffer, newline stripped.
    Line,
    /// The line exceeded the limit. It was consumed and discarded; the stream
    /// is positioned at the start of the next line.
    TooLarge(usize),
    /// The peer closed the stream before sending anything.
    Closed,
}

/// Reads one `\n`-terminated line into `buf`, never buffering more than `limit` bytes.
///
/// A final line without a trailing newline still counts as a line.
pub(crate) async fn read_frame<R>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    limit: usize,
) -> std::io::Result<ReadFrame>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let mut seen = 0usize;

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(match seen {
                0 => ReadFrame::Closed,
                n if n > limit => ReadFrame::TooLarge(n),
                _ => ReadFrame::Line,
            });
        }

        let (chunk_len, done) = match available.iter().position(|b| *b == b'\n') {
            Some(pos) => (pos, true),
            None => (available.len(), false),
        };

        seen += chunk_len;
        if seen <= limit {
            buf.extend_from_slice(&available[..chunk_len]);
        } else {
            buf.clear();
        }

        let consumed = if done { chunk_len + 1 } else { chunk_len };
        reader.consume(consumed);

        if done {
            return Ok(if seen > limit { ReadFrame::TooLarge(seen) } else { ReadFrame::Line });
        }
    }
}
