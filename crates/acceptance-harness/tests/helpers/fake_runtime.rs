// crates/acceptance-harness/tests/helpers/fake_runtime.rs
// ============================================================================
// Module: Fake Container Runtime
// Description: Scriptable in-process implementation of the runtime seam.
// Purpose: Exercise lifecycle, readiness, and teardown without Docker.
// Dependencies: acceptance-harness
// ============================================================================

//! ## Overview
//! [`FakeRuntime`] "launches" containers that emit scripted log lines and
//! report a scripted mapped port, optionally a different one per launch.
//! Every launch and removal is recorded in an event journal so tests can
//! assert ordering and exactly-once termination.

use std::io::BufReader;
use std::io::Cursor;
use std::io::PipeWriter;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use acceptance_harness::container::ContainerRequest;
use acceptance_harness::container::ContainerRuntime;
use acceptance_harness::container::LaunchedContainer;
use acceptance_harness::container::RuntimeError;
use acceptance_harness::endpoint::ContainerPort;
use acceptance_harness::logs::LogSource;
use acceptance_harness::logs::LogStream;

/// Shared, ordered record of runtime and scenario events.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events().iter().filter(|event| event.starts_with(prefix)).count()
    }
}

/// Scripted container behavior.
#[derive(Debug, Clone, Default)]
pub struct FakeBehavior {
    /// Daemon probe failure.
    pub unavailable: Option<String>,
    /// Launch failure.
    pub launch_error: Option<String>,
    /// Time spent "pulling" before the launch returns.
    pub launch_delay: Duration,
    /// Lines written to stdout at start.
    pub stdout: Vec<String>,
    /// Lines written to stderr at start.
    pub stderr: Vec<String>,
    /// Keep log streams open until removal.
    pub hold_logs_open: bool,
    /// Host port reported for every container port.
    pub mapped_port: Option<u16>,
    /// Offset `mapped_port` by the launch index so each container differs.
    pub port_per_launch: bool,
    /// Removal failure.
    pub remove_error: Option<String>,
}

/// In-process runtime driven by a [`FakeBehavior`].
#[derive(Debug, Default)]
pub struct FakeRuntime {
    pub behavior: FakeBehavior,
    pub journal: Journal,
    launched: AtomicUsize,
}

impl FakeRuntime {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    pub fn with_journal(behavior: FakeBehavior, journal: Journal) -> Self {
        Self {
            behavior,
            journal,
            launched: AtomicUsize::new(0),
        }
    }

    pub fn into_shared(self) -> Arc<dyn ContainerRuntime> {
        Arc::new(self)
    }
}

impl ContainerRuntime for FakeRuntime {
    fn ensure_available(&self) -> Result<(), RuntimeError> {
        self.behavior.unavailable.clone().map_or(Ok(()), |msg| Err(RuntimeError::new(msg)))
    }

    fn launch(&self, request: &ContainerRequest) -> Result<Box<dyn LaunchedContainer>, RuntimeError> {
        thread::sleep(self.behavior.launch_delay);
        if let Some(message) = &self.behavior.launch_error {
            return Err(RuntimeError::new(message.clone()));
        }
        let index = self.launched.fetch_add(1, Ordering::SeqCst);
        let id = format!("fake-{index}");
        let mapped_port = self.behavior.mapped_port.and_then(|base| {
            if self.behavior.port_per_launch {
                u16::try_from(index).ok().and_then(|offset| base.checked_add(offset))
            } else {
                Some(base)
            }
        });
        self.journal.push(format!("launch:{id}:{}", request.image));

        let mut writers = Vec::new();
        let mut streams: Vec<(LogSource, LogStream)> = Vec::new();
        for (source, lines) in
            [(LogSource::Stdout, &self.behavior.stdout), (LogSource::Stderr, &self.behavior.stderr)]
        {
            let text: String = lines.iter().map(|line| format!("{line}\n")).collect();
            if self.behavior.hold_logs_open {
                let (reader, mut writer) =
                    std::io::pipe().map_err(|err| RuntimeError::new(err.to_string()))?;
                writer.write_all(text.as_bytes()).map_err(|err| RuntimeError::new(err.to_string()))?;
                writers.push(writer);
                streams.push((source, Box::new(BufReader::new(reader))));
            } else {
                streams.push((source, Box::new(Cursor::new(text.into_bytes()))));
            }
        }
        Ok(Box::new(FakeContainer {
            id,
            journal: self.journal.clone(),
            mapped_port,
            remove_error: self.behavior.remove_error.clone(),
            streams: Mutex::new(streams),
            _writers: writers,
            running: AtomicBool::new(true),
        }))
    }
}

/// Container produced by [`FakeRuntime`].
struct FakeContainer {
    id: String,
    journal: Journal,
    mapped_port: Option<u16>,
    remove_error: Option<String>,
    streams: Mutex<Vec<(LogSource, LogStream)>>,
    /// Dropping the writers closes the held-open log streams.
    _writers: Vec<PipeWriter>,
    running: AtomicBool,
}

impl LaunchedContainer for FakeContainer {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn host(&self) -> Result<String, RuntimeError> {
        Ok("127.0.0.1".to_string())
    }

    fn mapped_port(&self, port: ContainerPort) -> Result<u16, RuntimeError> {
        self.mapped_port.ok_or_else(|| RuntimeError::new(format!("{port} is not mapped")))
    }

    fn is_running(&self) -> Result<bool, RuntimeError> {
        Ok(self.running.load(Ordering::SeqCst))
    }

    fn log_streams(&self) -> Vec<(LogSource, LogStream)> {
        std::mem::take(&mut *self.streams.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn remove(self: Box<Self>) -> Result<(), RuntimeError> {
        self.running.store(false, Ordering::SeqCst);
        self.journal.push(format!("remove:{}", self.id));
        self.remove_error.clone().map_or(Ok(()), |msg| Err(RuntimeError::new(msg)))
    }
}
