//! Tracing setup: a terminal layer sized to the output mode and a file
//! layer that stays silent until [`LogFileHandle::activate`] is called.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::progress::OutputMode;

type Slot = Arc<Mutex<Option<File>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<File>> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `MakeWriter` that drops everything until a file is attached.
#[derive(Clone, Default)]
pub struct DeferredLogFile {
    slot: Slot,
}

/// Attaches the log file once the server name is known.
#[derive(Clone)]
pub struct LogFileHandle {
    slot: Slot,
}

impl DeferredLogFile {
    pub fn new() -> (Self, LogFileHandle) {
        let writer = Self::default();
        let handle = LogFileHandle {
            slot: writer.slot.clone(),
        };
        (writer, handle)
    }
}

impl LogFileHandle {
    /// Open `path` for appending, creating parent directories.
    pub fn activate(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *lock(&self.slot) = Some(file);
        Ok(())
    }
}

pub struct DeferredWriter {
    slot: Slot,
}

impl Write for DeferredWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match lock(&self.slot).as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match lock(&self.slot).as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for DeferredLogFile {
    type Writer = DeferredWriter;

    fn make_writer(&'a self) -> Self::Writer {
        DeferredWriter {
            slot: self.slot.clone(),
        }
    }
}

/// Terminal verbosity per output mode. Spinner modes keep the terminal
/// layer off so log lines do not tear the progress bars.
fn terminal_filter(mode: OutputMode) -> EnvFilter {
    match mode {
        OutputMode::Verbose => EnvFilter::new("sacvm=debug,warn"),
        OutputMode::Normal | OutputMode::Quiet | OutputMode::Silent => EnvFilter::new("off"),
        OutputMode::Plain => EnvFilter::from_default_env()
            .add_directive("sacvm=info".parse().expect("valid log directive")),
    }
}

/// Install the global subscriber and return the handle for the log file.
pub fn init(mode: OutputMode) -> LogFileHandle {
    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter(mode));

    let (file_writer, handle) = DeferredLogFile::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("sacvm=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    handle
}
