use std::io::ErrorKind;
use std::time::{Duration, Instant};

use crate::error::{LinkError, Result};

/// Pull bytes from `read_chunk` into `pending` until it holds a `\n`, then
/// split off and return that first line. Bytes after the terminator stay in
/// `pending` for the next call.
///
/// Read timeouts from the underlying port are retried until `timeout` has
/// elapsed overall. A trailing `\r` is dropped. If the deadline passes with a
/// partial line buffered, the fragment is discarded and the result is
/// [`LinkError::Truncated`]; with nothing buffered it is [`LinkError::Timeout`].
pub fn read_line_with_timeout(
    mut read_chunk: impl FnMut(&mut [u8]) -> std::io::Result<usize>,
    pending: &mut Vec<u8>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let deadline = Instant::now() + timeout;
    let mut buf = [0u8; 64];
    loop {
        if let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            return Ok(line);
        }
        if Instant::now() >= deadline {
            if pending.is_empty() {
                return Err(LinkError::Timeout);
            }
            let received = pending.len();
            pending.clear();
            return Err(LinkError::Truncated { received });
        }
        match read_chunk(&mut buf) {
            Ok(0) => std::thread::sleep(Duration::from_millis(1)),
            Ok(n) => pending.extend_from_slice(&buf[..n]),
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
                ) => {}
            Err(e) => return Err(LinkError::Io(e)),
        }
    }
}
