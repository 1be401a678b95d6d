//! Concurrent drains of the shell's stdout and stderr.
//!
//! Both streams must be read in parallel until their sentinels arrive;
//! reading them in sequence deadlocks as soon as one pipe's buffer
//! fills. Each drain owns its pipe for the duration of one command and
//! hands it back for the next.

use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, ChildStdout};

use crate::script::Sentinels;

/// Result of draining stdout for one command.
#[derive(Debug)]
pub struct StdoutCapture {
    /// Captured output bytes.
    pub output: Vec<u8>,
    /// Exit code parsed from the exit sentinel.
    pub exit_code: Option<i32>,
    /// False when the pipe hit EOF before the sentinel: the shell died.
    pub complete: bool,
}

/// Result of draining stderr for one command.
#[derive(Debug)]
pub struct StderrCapture {
    /// Captured output bytes.
    pub output: Vec<u8>,
    /// False when the pipe hit EOF before the sentinel.
    pub complete: bool,
}

/// Find `needle` in `haystack` no earlier than `from`.
fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || haystack.len() < from + needle.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|p| p + from)
}

/// Strip the single newline the framing script prints before a sentinel.
fn strip_frame_newline(buf: &mut Vec<u8>) {
    if buf.last() == Some(&b'\n') {
        buf.pop();
    }
}

/// Parse the integer that follows `pattern_len` bytes at `at`, requiring
/// a terminating newline. Returns the value and the index just past the
/// newline. `None` means the line is still incomplete or malformed.
fn parse_sentinel_int(buf: &[u8], at: usize, pattern_len: usize) -> Option<(i32, usize)> {
    let digits_start = at + pattern_len;
    let rest = buf.get(digits_start..)?;
    let nl = rest.iter().position(|&b| b == b'\n')?;
    let text = std::str::from_utf8(&rest[..nl]).ok()?;
    let value: i32 = text.trim().parse().ok()?;
    Some((value, digits_start + nl + 1))
}

/// Drain the shell's stdout until the exit sentinel (or EOF).
pub async fn drain_stdout(mut pipe: ChildStdout, sentinels: Sentinels) -> (ChildStdout, StdoutCapture) {
    let exit_pat = sentinels.exit_pattern().into_bytes();

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    // Position below which the exit pattern is known absent.
    let mut scan = 0usize;

    loop {
        let n = pipe.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return (
                pipe,
                StdoutCapture {
                    output: buf,
                    exit_code: None,
                    complete: false,
                },
            );
        }
        buf.extend_from_slice(&chunk[..n]);

        match find_from(&buf, &exit_pat, scan) {
            Some(at) => match parse_sentinel_int(&buf, at, exit_pat.len()) {
                Some((code, _)) => {
                    buf.truncate(at);
                    strip_frame_newline(&mut buf);
                    return (
                        pipe,
                        StdoutCapture {
                            output: buf,
                            exit_code: Some(code),
                            complete: true,
                        },
                    );
                }
                // Pattern present but the code's newline is still in
                // flight; hold position and read more.
                None => scan = at,
            },
            None => scan = buf.len().saturating_sub(exit_pat.len()),
        }
    }
}

/// Drain the shell's stderr until the done sentinel (or EOF).
pub async fn drain_stderr(
    mut pipe: ChildStderr,
    sentinels: Sentinels,
) -> (ChildStderr, StderrCapture) {
    let done_pat = {
        let mut p = sentinels.done_pattern().into_bytes();
        p.push(b'\n');
        p
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut scan = 0usize;

    loop {
        let n = pipe.read(&mut chunk).await.unwrap_or(0);
        if n == 0 {
            return (
                pipe,
                StderrCapture {
                    output: buf,
                    complete: false,
                },
            );
        }
        buf.extend_from_slice(&chunk[..n]);

        match find_from(&buf, &done_pat, scan) {
            Some(at) => {
                buf.truncate(at);
                strip_frame_newline(&mut buf);
                return (
                    pipe,
                    StderrCapture {
                        output: buf,
                        complete: true,
                    },
                );
            }
            None => scan = buf.len().saturating_sub(done_pat.len()),
        }
    }
}
