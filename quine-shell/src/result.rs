//! The fixed tool-result format for shell commands.

/// Marker appended when a captured stream exceeds the truncation
/// threshold.
fn truncation_marker(total: usize) -> String {
    format!("\n...[Output Truncated, {total} bytes total]")
}

/// Render a captured stream, truncating to `limit` bytes.
#[must_use]
pub fn render_stream(bytes: &[u8], limit: usize) -> String {
    if bytes.len() <= limit {
        String::from_utf8_lossy(bytes).into_owned()
    } else {
        let mut out = String::from_utf8_lossy(&bytes[..limit]).into_owned();
        out.push_str(&truncation_marker(bytes.len()));
        out
    }
}

/// Outcome of one command in the persistent shell.
#[derive(Debug)]
pub struct ShellOutcome {
    /// Command exit code.
    pub exit_code: i32,
    /// Captured stdout bytes.
    pub stdout: Vec<u8>,
    /// Captured stderr bytes.
    pub stderr: Vec<u8>,
    /// The command exceeded the shell timeout and its group was killed.
    pub timed_out: bool,
    /// The persistent shell itself died; its state is gone.
    pub state_lost: bool,
}

impl ShellOutcome {
    /// Whether this outcome is an error from the model's point of view.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.exit_code != 0 || self.timed_out || self.state_lost
    }

    /// Render to the fixed result shape:
    ///
    /// ```text
    /// [EXIT CODE] <n>
    /// [STDOUT]
    /// <captured stdout, possibly truncated>
    /// [STDERR]
    /// <captured stderr, possibly truncated>
    /// ```
    #[must_use]
    pub fn render(&self, truncate_bytes: usize) -> String {
        let mut stderr = render_stream(&self.stderr, truncate_bytes);
        if self.timed_out {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str("SHELL ERROR: command timed out; process group killed");
        }
        if self.state_lost {
            if !stderr.is_empty() {
                stderr.push('\n');
            }
            stderr.push_str("SHELL ERROR: persistent shell crashed; state lost");
        }
        format!(
            "[EXIT CODE] {}\n[STDOUT]\n{}\n[STDERR]\n{}",
            self.exit_code,
            render_stream(&self.stdout, truncate_bytes),
            stderr,
        )
    }
}

/// A result string split back into its parts.
///
/// Exists for tooling and tests that consume audit logs; rendering is
/// lossy only past the truncation threshold.
#[derive(Debug, PartialEq, Eq)]
pub struct ParsedResult {
    /// Exit code.
    pub exit_code: i32,
    /// Stdout section text.
    pub stdout: String,
    /// Stderr section text.
    pub stderr: String,
}

/// Parse a rendered result string.
#[must_use]
pub fn parse_rendered(text: &str) -> Option<ParsedResult> {
    let rest = text.strip_prefix("[EXIT CODE] ")?;
    let (code_line, rest) = rest.split_once('\n')?;
    let exit_code: i32 = code_line.trim().parse().ok()?;
    let rest = rest.strip_prefix("[STDOUT]\n")?;
    let (stdout, stderr) = rest.split_once("\n[STDERR]\n")?;
    Some(ParsedResult {
        exit_code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(exit_code: i32, stdout: &str, stderr: &str) -> ShellOutcome {
        ShellOutcome {
            exit_code,
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            timed_out: false,
            state_lost: false,
        }
    }

    #[test]
    fn renders_fixed_shape() {
        let text = outcome(0, "hello\n", "").render(1024);
        assert_eq!(text, "[EXIT CODE] 0\n[STDOUT]\nhello\n\n[STDERR]\n");
    }

    #[test]
    fn nonzero_exit_is_error() {
        assert!(outcome(1, "", "").is_error());
        assert!(!outcome(0, "", "").is_error());
    }

    #[test]
    fn truncates_with_exact_marker_and_total() {
        let bytes = vec![b'x'; 101];
        let rendered = render_stream(&bytes, 100);
        assert!(rendered.starts_with(&"x".repeat(100)));
        assert!(rendered.ends_with("\n...[Output Truncated, 101 bytes total]"));
    }

    #[test]
    fn no_marker_at_exactly_the_threshold() {
        let bytes = vec![b'x'; 100];
        assert_eq!(render_stream(&bytes, 100), "x".repeat(100));
    }

    #[test]
    fn state_lost_annotates_stderr() {
        let mut o = outcome(1, "", "");
        o.state_lost = true;
        let text = o.render(1024);
        assert!(text.contains("SHELL ERROR: persistent shell crashed; state lost"));
        assert!(o.is_error());
    }

    #[test]
    fn timeout_annotates_stderr() {
        let mut o = outcome(137, "partial", "");
        o.timed_out = true;
        let text = o.render(1024);
        assert!(text.contains("[EXIT CODE] 137"));
        assert!(text.contains("timed out"));
    }

    #[test]
    fn parse_round_trips_exit_and_streams() {
        let rendered = outcome(3, "out bytes", "err bytes").render(1024);
        let parsed = parse_rendered(&rendered).unwrap();
        assert_eq!(parsed.exit_code, 3);
        assert_eq!(parsed.stdout, "out bytes");
        assert_eq!(parsed.stderr, "err bytes");
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(parse_rendered("nope").is_none());
        assert!(parse_rendered("[EXIT CODE] x\n[STDOUT]\n\n[STDERR]\n").is_none());
    }
}
