// crates/acceptance-harness/src/logs.rs
// ============================================================================
// Module: Container Log Sink
// Description: Follows container stdout/stderr into an inspectable buffer.
// Purpose: Back log-match readiness and post-mortem log inspection.
// Dependencies: tracing
// ============================================================================

//! ## Overview
//! [`LogSink::follow`] spawns one reader thread per stream. Each line is
//! appended to a shared buffer and waiters are notified. Occurrence counting
//! only ever sees lines produced after the streams were attached, which for a
//! container is its start.
//!
//! Reader threads are detached: a followed stream ends when the container is
//! removed, and the thread exits with it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::io::BufRead;
use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use tracing::debug;
use tracing::warn;

use crate::cancel::CancelToken;
use crate::readiness::ReadinessFailure;
use crate::timeouts::deadline_after;
use crate::timeouts::deadline_passed;
use crate::timeouts::next_wait;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Upper bound on a single condvar wait so cancellation is observed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A readable, line-oriented log stream.
pub type LogStream = Box<dyn BufRead + Send>;

/// Which container stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSource {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

impl fmt::Display for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        })
    }
}

/// One captured log line without its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    /// Stream the line came from.
    pub source: LogSource,
    /// Line text, lossily decoded as UTF-8.
    pub text: String,
}

/// Buffer state guarded by the sink mutex.
#[derive(Debug, Default)]
struct LogBuffer {
    /// Every line captured so far, in arrival order.
    lines: Vec<LogLine>,
    /// Streams still being read.
    open_streams: usize,
}

/// Mutex plus condvar shared with reader threads.
#[derive(Debug, Default)]
struct Shared {
    /// Captured lines and stream bookkeeping.
    buffer: Mutex<LogBuffer>,
    /// Signalled on every new line and on stream close.
    changed: Condvar,
}

impl Shared {
    /// Locks the buffer, recovering from a poisoned reader thread.
    fn lock(&self) -> MutexGuard<'_, LogBuffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks one stream as finished and wakes waiters.
    fn close_stream(&self) {
        let mut buffer = self.lock();
        buffer.open_streams = buffer.open_streams.saturating_sub(1);
        drop(buffer);
        self.changed.notify_all();
    }
}

// ============================================================================
// SECTION: Log Sink
// ============================================================================

/// Cloneable handle to the captured output of a container.
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    /// State shared with reader threads.
    shared: Arc<Shared>,
}

impl LogSink {
    /// Starts following the given streams.
    #[must_use]
    pub fn follow(streams: Vec<(LogSource, LogStream)>) -> Self {
        let sink = Self::default();
        sink.shared.lock().open_streams = streams.len();
        for (source, stream) in streams {
            let shared = Arc::clone(&sink.shared);
            let spawned = thread::Builder::new()
                .name(format!("container-{source}"))
                .spawn(move || pump(&shared, source, stream));
            if let Err(err) = spawned {
                warn!(%source, error = %err, "failed to spawn log reader");
                sink.shared.close_stream();
            }
        }
        sink
    }

    /// Returns a snapshot of every captured line.
    #[must_use]
    pub fn lines(&self) -> Vec<LogLine> {
        self.shared.lock().lines.clone()
    }

    /// Returns the last `count` captured lines.
    #[must_use]
    pub fn tail(&self, count: usize) -> Vec<LogLine> {
        let buffer = self.shared.lock();
        let start = buffer.lines.len().saturating_sub(count);
        buffer.lines[start ..].to_vec()
    }

    /// Blocks until `needle` has appeared in at least `times` lines.
    ///
    /// Counting is strict: fewer than `times` occurrences when the timeout
    /// elapses, or when every stream has closed, is a failure.
    ///
    /// # Errors
    ///
    /// Returns [`ReadinessFailure`] on timeout, closed streams, or cancel.
    pub fn wait_for_occurrences(
        &self,
        needle: &str,
        times: usize,
        timeout: Duration,
        cancel: &CancelToken,
    ) -> Result<usize, ReadinessFailure> {
        let deadline = deadline_after(timeout);
        let mut scanned = 0usize;
        let mut observed = 0usize;
        let mut buffer = self.shared.lock();
        loop {
            observed += buffer.lines[scanned ..].iter().filter(|line| line.text.contains(needle)).count();
            scanned = buffer.lines.len();
            if observed >= times {
                return Ok(observed);
            }
            if buffer.open_streams == 0 {
                return Err(ReadinessFailure::LogStreamsClosed {
                    needle: needle.to_string(),
                    observed,
                    required: times,
                });
            }
            if cancel.is_cancelled() {
                return Err(ReadinessFailure::Cancelled);
            }
            let now = Instant::now();
            if deadline_passed(deadline, now) {
                return Err(ReadinessFailure::LogTimeout {
                    needle: needle.to_string(),
                    observed,
                    required: times,
                    timeout_ms: timeout.as_millis(),
                });
            }
            let wait = next_wait(deadline, now, POLL_INTERVAL);
            buffer = match self.shared.changed.wait_timeout(buffer, wait) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Reads `stream` line by line into the shared buffer until EOF or error.
fn pump(shared: &Shared, source: LogSource, mut stream: LogStream) {
    let mut raw = Vec::new();
    loop {
        raw.clear();
        match stream.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&raw).trim_end_matches(['\r', '\n']).to_string();
                debug!(%source, line = %text, "container log");
                shared.lock().lines.push(LogLine {
                    source,
                    text,
                });
                shared.changed.notify_all();
            }
            Err(err) => {
                debug!(%source, error = %err, "log stream ended with error");
                break;
            }
        }
    }
    shared.close_stream();
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used, reason = "Test-only assertions favor expect for clarity.")]

    use std::io::Cursor;
    use std::time::Duration;

    use super::LogSink;
    use super::LogSource;
    use super::LogStream;
    use crate::cancel::CancelToken;
    use crate::readiness::ReadinessFailure;

    fn stream(text: &str) -> LogStream {
        Box::new(Cursor::new(text.as_bytes().to_vec()))
    }

    #[test]
    fn merges_both_streams() {
        let sink = LogSink::follow(vec![
            (LogSource::Stdout, stream("ready\n")),
            (LogSource::Stderr, stream("noise\nready\r\n")),
        ]);
        let observed = sink
            .wait_for_occurrences("ready", 2, Duration::from_secs(5), &CancelToken::new())
            .expect("both occurrences");
        assert_eq!(observed, 2);
        assert_eq!(sink.lines().len(), 3);
        assert!(sink.lines().iter().all(|line| !line.text.ends_with('\r')));
    }

    #[test]
    fn closed_streams_short_of_count_fail_early() {
        let sink = LogSink::follow(vec![(LogSource::Stderr, stream("ready\nother\n"))]);
        let err = sink
            .wait_for_occurrences("ready", 2, Duration::from_secs(30), &CancelToken::new())
            .expect_err("one occurrence is not two");
        assert!(matches!(err, ReadinessFailure::LogStreamsClosed { observed: 1, required: 2, .. }));
    }

    #[test]
    fn open_stream_short_of_count_times_out() {
        let (reader, _writer) = std::io::pipe().expect("pipe");
        let sink = LogSink::follow(vec![
            (LogSource::Stdout, stream("ready\n")),
            (LogSource::Stderr, Box::new(std::io::BufReader::new(reader))),
        ]);
        let err = sink
            .wait_for_occurrences("ready", 2, Duration::from_millis(300), &CancelToken::new())
            .expect_err("strict count");
        assert!(matches!(err, ReadinessFailure::LogTimeout { observed: 1, required: 2, .. }));
    }

    #[test]
    fn cancel_interrupts_wait() {
        let (reader, _writer) = std::io::pipe().expect("pipe");
        let sink =
            LogSink::follow(vec![(LogSource::Stdout, Box::new(std::io::BufReader::new(reader)))]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = sink
            .wait_for_occurrences("ready", 1, Duration::from_secs(30), &cancel)
            .expect_err("cancelled");
        assert_eq!(err, ReadinessFailure::Cancelled);
    }

    #[test]
    fn tail_returns_latest_lines() {
        let sink = LogSink::follow(vec![(LogSource::Stdout, stream("a\nb\nc\n"))]);
        let _ = sink.wait_for_occurrences("c", 1, Duration::from_secs(5), &CancelToken::new());
        let tail: Vec<String> = sink.tail(2).into_iter().map(|line| line.text).collect();
        assert_eq!(tail, vec!["b".to_string(), "c".to_string()]);
    }
}
