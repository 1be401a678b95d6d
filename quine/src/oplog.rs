//! Operational log: prefixed free-form lines under the data directory.
//!
//! Lines look like `quine[1a2b3c4d]: <text>`. This log is diagnostics
//! only, never part of the data contract, and never touches the
//! process's real stdout or stderr: fd 1 is the deliverable channel and
//! fd 2 carries failure gradients exclusively.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

use quine_core::session::short_id;

/// Writer that opens the log file append-only for every event, so the
/// file can be rotated or tailed externally at any time.
struct FileAppender {
    path: PathBuf,
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for FileAppender {
    type Writer = Box<dyn Write>;

    fn make_writer(&'a self) -> Self::Writer {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            Ok(file) => Box::new(file),
            Err(_) => Box::new(std::io::sink()),
        }
    }
}

/// Event format producing `<prog>[<short-session>]: <fields>` lines.
struct OpLogFormat {
    prefix: String,
}

impl<S, N> FormatEvent<S, N> for OpLogFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "{}: ", self.prefix)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Install the operational log for this session.
///
/// Failures are swallowed: a session without diagnostics is degraded,
/// not dead.
pub fn init(log_path: &Path, session_id: &str) {
    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let format = OpLogFormat {
        prefix: format!("quine[{}]", short_id(session_id)),
    };
    let writer = FileAppender {
        path: log_path.to_path_buf(),
    };
    let _ = tracing_subscriber::fmt()
        .event_format(format)
        .with_writer(writer)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appender_writes_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.log");
        let appender = FileAppender { path: path.clone() };
        {
            use tracing_subscriber::fmt::MakeWriter;
            let mut w = appender.make_writer();
            w.write_all(b"quine[abc]: hello\n").unwrap();
        }
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "quine[abc]: hello\n");
    }

    #[test]
    fn appender_swallows_open_failures() {
        use tracing_subscriber::fmt::MakeWriter;
        let appender = FileAppender {
            path: PathBuf::from("/nonexistent-dir/sub/s.log"),
        };
        let mut w = appender.make_writer();
        // Writes into a sink; must not error.
        w.write_all(b"dropped").unwrap();
    }
}
