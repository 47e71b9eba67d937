//! Purpose: Own one tab-delimited file handle and expose the record read/write contract.
//! Exports: `RecordChannel`, `Records`.
//! Role: The component callers open, read or write through, then close.
//! Invariants: At most one handle (input or output) is held; the enum makes both unrepresentable.
//! Invariants: `open` never fails; failures go to the diagnostic sink and leave the handle unset.
//! Invariants: Once disposed, a channel never reopens; reads are empty and writes are no-ops.
//! Invariants: `close` and `Drop` are idempotent and safe when nothing was ever opened.
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::core::diagnostic::{Diagnostic, DiagnosticKind, DiagnosticSink, TracingSink};
use crate::core::error::{Error, ErrorKind};
use crate::core::mode::{Mode, ModeFlags};
use crate::core::record::{self, Record};

enum Handle {
    Unset,
    Input {
        path: PathBuf,
        reader: BufReader<File>,
    },
    Output {
        path: PathBuf,
        writer: BufWriter<File>,
    },
}

impl Handle {
    fn mode(&self) -> Option<Mode> {
        match self {
            Handle::Unset => None,
            Handle::Input { .. } => Some(Mode::Read),
            Handle::Output { .. } => Some(Mode::Write),
        }
    }

    fn path(&self) -> Option<&Path> {
        match self {
            Handle::Unset => None,
            Handle::Input { path, .. } | Handle::Output { path, .. } => Some(path),
        }
    }
}

pub struct RecordChannel {
    handle: Handle,
    disposed: bool,
    sink: Arc<dyn DiagnosticSink>,
}

impl RecordChannel {
    pub fn new() -> Self {
        Self::with_sink(Arc::new(TracingSink))
    }

    pub fn with_sink(sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            handle: Handle::Unset,
            disposed: false,
            sink,
        }
    }

    /// Mode of the held handle; `None` while unset or after disposal.
    pub fn mode(&self) -> Option<Mode> {
        self.handle.mode()
    }

    pub fn path(&self) -> Option<&Path> {
        self.handle.path()
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.handle, Handle::Unset)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Opens `path` in `mode`, masking any failure.
    ///
    /// The call always returns normally. When the file cannot be acquired the
    /// channel keeps whatever handle it had (none, for a fresh channel) and the
    /// failure is reported to the diagnostic sink. Reads on a handle-less
    /// channel return no records; writes are dropped.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: Mode) {
        if let Err(err) = self.try_open(path, mode) {
            let kind = if err.kind() == ErrorKind::Disposed {
                DiagnosticKind::OpenIgnored
            } else {
                DiagnosticKind::OpenFailed
            };
            self.sink
                .report(Diagnostic::from_error(kind, Some(mode), &err));
        }
    }

    /// Same state transition as [`RecordChannel::open`], but returns the failure.
    pub fn try_open(&mut self, path: impl AsRef<Path>, mode: Mode) -> Result<(), Error> {
        let path = path.as_ref();
        if self.disposed {
            return Err(Error::new(ErrorKind::Disposed)
                .with_message("channel is disposed and cannot be reopened")
                .with_path(path)
                .with_hint("Create a new channel for each file."));
        }

        // Buffered output must reach the file before a reopen can truncate it.
        // A flush failure here resurfaces when the handle is released.
        if let Handle::Output { writer, .. } = &mut self.handle {
            let _ = writer.flush();
        }
        let handle = acquire(path, mode)?;
        debug!(path = %path.display(), %mode, "record channel opened");
        let previous = std::mem::replace(&mut self.handle, handle);
        let previous_mode = previous.mode();
        if let Err(err) = release(previous) {
            self.sink.report(Diagnostic::from_error(
                DiagnosticKind::CloseFailed,
                previous_mode,
                &err,
            ));
        }
        Ok(())
    }

    /// Opens with legacy mode bits.
    ///
    /// Anything other than exactly `READ` or `WRITE` fails with
    /// `ErrorKind::UnknownMode` and leaves the channel untouched. Valid bits
    /// follow the masking contract of [`RecordChannel::open`].
    pub fn open_flags(&mut self, path: impl AsRef<Path>, flags: ModeFlags) -> Result<(), Error> {
        let path = path.as_ref();
        let mode = flags.to_mode(path)?;
        self.open(path, mode);
        Ok(())
    }

    /// Writes one line of tab-separated `columns`; a no-op without an output handle.
    pub fn write<I, S>(&mut self, columns: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let Handle::Output { path, writer } = &mut self.handle else {
            return Ok(());
        };
        record::write_fields(writer, columns)
            .map_err(|err| Error::from_io(err, "failed to write record", path))
    }

    pub fn write_record(&mut self, record: &Record) -> Result<(), Error> {
        self.write(record.fields())
    }

    /// Reads the next record; `None` at end of input or without an input handle.
    pub fn read(&mut self) -> Result<Option<Record>, Error> {
        let Handle::Input { path, reader } = &mut self.handle else {
            return Ok(None);
        };
        let mut line = String::new();
        let more = record::read_line(reader, &mut line)
            .map_err(|err| Error::from_io(err, "failed to read record", path))?;
        if !more {
            return Ok(None);
        }
        Ok(Some(Record::parse(&line)))
    }

    /// Out-parameter form of [`RecordChannel::read`].
    ///
    /// Both outputs are `None` when this returns `false`. A line without a tab
    /// returns `true` with `column2` set to `None`.
    pub fn read_into(
        &mut self,
        column1: &mut Option<String>,
        column2: &mut Option<String>,
    ) -> Result<bool, Error> {
        *column1 = None;
        *column2 = None;
        match self.read()? {
            Some(record) => {
                let (first, second) = record.into_columns();
                *column1 = Some(first);
                *column2 = second;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Legacy by-value form; the arguments are ignored and the record is discarded.
    pub fn read_columns(&mut self, _column1: &str, _column2: &str) -> Result<bool, Error> {
        let mut column1 = None;
        let mut column2 = None;
        self.read_into(&mut column1, &mut column2)
    }

    pub fn records(&mut self) -> Records<'_> {
        Records { channel: self }
    }

    /// Releases the held handle and marks the channel disposed.
    ///
    /// Buffered output is flushed here. Only the first call can fail; later
    /// calls return `Ok(())` without touching anything.
    pub fn close(&mut self) -> Result<(), Error> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;
        let handle = std::mem::replace(&mut self.handle, Handle::Unset);
        release(handle)
    }
}

impl Default for RecordChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RecordChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordChannel")
            .field("mode", &self.mode())
            .field("path", &self.path())
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}

impl Drop for RecordChannel {
    fn drop(&mut self) {
        let mode = self.mode();
        if let Err(err) = self.close() {
            self.sink
                .report(Diagnostic::from_error(DiagnosticKind::CloseFailed, mode, &err));
        }
    }
}

/// Iterator over the remaining records of a read-mode channel.
pub struct Records<'a> {
    channel: &'a mut RecordChannel,
}

impl Iterator for Records<'_> {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.channel.read().transpose()
    }
}

fn acquire(path: &Path, mode: Mode) -> Result<Handle, Error> {
    match mode {
        Mode::Read => {
            let file = File::open(path)
                .map_err(|err| Error::from_io(err, "failed to open for reading", path))?;
            let mut reader = BufReader::new(file);
            record::skip_bom(&mut reader)
                .map_err(|err| Error::from_io(err, "failed to open for reading", path))?;
            Ok(Handle::Input {
                path: path.to_path_buf(),
                reader,
            })
        }
        Mode::Write => {
            let file = OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(path)
                .map_err(|err| Error::from_io(err, "failed to open for writing", path))?;
            Ok(Handle::Output {
                path: path.to_path_buf(),
                writer: BufWriter::new(file),
            })
        }
    }
}

fn release(handle: Handle) -> Result<(), Error> {
    match handle {
        Handle::Unset => Ok(()),
        Handle::Input { path, reader } => {
            drop(reader);
            debug!(path = %path.display(), "record channel closed input");
            Ok(())
        }
        Handle::Output { path, mut writer } => {
            let flushed = writer
                .flush()
                .map_err(|err| Error::from_io(err, "failed to flush on close", &path));
            drop(writer);
            debug!(path = %path.display(), ok = flushed.is_ok(), "record channel closed output");
            flushed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::RecordChannel;
    use crate::core::diagnostic::{DiagnosticKind, MemorySink};
    use crate::core::error::ErrorKind;
    use crate::core::mode::{Mode, ModeFlags};
    use crate::core::record::{LINE_ENDING, Record};
    use std::sync::Arc;

    fn channel_with_sink() -> (RecordChannel, MemorySink) {
        let sink = MemorySink::new();
        (RecordChannel::with_sink(Arc::new(sink.clone())), sink)
    }

    #[test]
    fn fresh_channel_is_unset() {
        let mut channel = RecordChannel::new();
        assert_eq!(channel.mode(), None);
        assert!(!channel.is_open());
        assert!(!channel.is_disposed());
        assert_eq!(channel.read().expect("read"), None);
        channel.write(["a", "b"]).expect("write is a no-op");
    }

    #[test]
    fn open_sets_mode_and_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.tsv");
        let mut channel = RecordChannel::new();
        channel.open(&path, Mode::Write);
        assert_eq!(channel.mode(), Some(Mode::Write));
        assert_eq!(channel.path(), Some(path.as_path()));
        channel.close().expect("close");
        assert_eq!(channel.mode(), None);
        assert!(channel.is_disposed());
    }

    #[test]
    fn masked_open_failure_reaches_sink() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.tsv");
        let (mut channel, sink) = channel_with_sink();
        channel.open(&path, Mode::Read);

        assert!(!channel.is_open());
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiagnosticKind::OpenFailed);
        assert_eq!(entries[0].error_kind, ErrorKind::NotFound);
        assert_eq!(entries[0].mode, Some(Mode::Read));
        assert_eq!(entries[0].path.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn try_open_returns_the_masked_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.tsv");
        let (mut channel, sink) = channel_with_sink();
        let err = channel.try_open(&path, Mode::Read).expect_err("missing");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(!channel.is_open());
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn write_into_missing_directory_is_masked() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nope").join("out.tsv");
        let (mut channel, sink) = channel_with_sink();
        channel.open(&path, Mode::Write);
        assert!(!channel.is_open());
        channel.write(["a", "b"]).expect("no-op write");
        assert_eq!(sink.entries()[0].kind, DiagnosticKind::OpenFailed);
    }

    #[test]
    fn reading_a_directory_is_an_open_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (mut channel, sink) = channel_with_sink();
        channel.open(dir.path(), Mode::Read);
        assert!(!channel.is_open());
        assert_eq!(channel.read().expect("read"), None);
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn unknown_flags_leave_no_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("out.tsv");
        let mut channel = RecordChannel::new();
        let err = channel
            .open_flags(&path, ModeFlags::READ | ModeFlags::WRITE)
            .expect_err("combined flags");
        assert_eq!(err.kind(), ErrorKind::UnknownMode);
        assert!(err.message().expect("message").contains("out.tsv"));
        assert!(!channel.is_open());
        assert!(!path.exists());
    }

    #[test]
    fn read_on_write_channel_is_empty_and_write_on_read_channel_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "a\tb\n").expect("seed");

        let mut reader = RecordChannel::new();
        reader.open(&path, Mode::Read);
        reader.write(["x", "y"]).expect("no-op");
        assert_eq!(reader.read().expect("read"), Some(Record::new("a", "b")));
        reader.close().expect("close");

        let other = dir.path().join("other.tsv");
        let mut writer = RecordChannel::new();
        writer.open(&other, Mode::Write);
        assert_eq!(writer.read().expect("read"), None);
        writer.close().expect("close");
        assert_eq!(std::fs::read_to_string(&path).expect("unchanged"), "a\tb\n");
    }

    #[test]
    fn reopen_closes_the_previous_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        let mut channel = RecordChannel::new();
        channel.open(&path, Mode::Write);
        channel.write(["k", "v"]).expect("write");
        channel.open(&path, Mode::Read);
        assert_eq!(channel.mode(), Some(Mode::Read));
        assert_eq!(channel.read().expect("read"), Some(Record::new("k", "v")));
    }

    #[test]
    fn reopen_for_write_on_same_path_truncates_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        let mut channel = RecordChannel::new();
        channel.open(&path, Mode::Write);
        channel.write(["long-name", "long-street"]).expect("write");
        channel.open(&path, Mode::Write);
        channel.write(["x", "y"]).expect("write");
        channel.close().expect("close");

        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, format!("x\ty{LINE_ENDING}"));
    }

    #[test]
    fn failed_reopen_keeps_the_previous_handle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "a\tb\n").expect("seed");
        let (mut channel, sink) = channel_with_sink();
        channel.open(&path, Mode::Read);
        channel.open(dir.path().join("missing.tsv"), Mode::Read);
        assert_eq!(channel.path(), Some(path.as_path()));
        assert_eq!(channel.read().expect("read"), Some(Record::new("a", "b")));
        assert_eq!(sink.entries().len(), 1);
    }

    #[test]
    fn disposed_channel_never_reopens() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "a\tb\n").expect("seed");
        let (mut channel, sink) = channel_with_sink();
        channel.close().expect("close");
        channel.open(&path, Mode::Read);

        assert!(!channel.is_open());
        assert_eq!(channel.read().expect("read"), None);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiagnosticKind::OpenIgnored);
        assert_eq!(entries[0].error_kind, ErrorKind::Disposed);

        let err = channel.try_open(&path, Mode::Read).expect_err("disposed");
        assert_eq!(err.kind(), ErrorKind::Disposed);
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        let mut channel = RecordChannel::new();
        channel.open(&path, Mode::Write);
        channel.close().expect("first close");
        channel.close().expect("second close");
        assert!(channel.is_disposed());
    }

    #[test]
    fn close_without_open_is_safe() {
        let mut channel = RecordChannel::new();
        channel.close().expect("close");
        channel.close().expect("close again");
    }

    #[test]
    fn drop_flushes_buffered_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        {
            let mut channel = RecordChannel::new();
            channel.open(&path, Mode::Write);
            channel.write(["x", "y"]).expect("write");
        }
        let text = std::fs::read_to_string(&path).expect("read back");
        assert_eq!(text, format!("x\ty{LINE_ENDING}"));
    }

    #[test]
    fn records_iterates_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("data.tsv");
        std::fs::write(&path, "a\t1\nb\t2\nc\n").expect("seed");
        let mut channel = RecordChannel::new();
        channel.open(&path, Mode::Read);
        let records = channel
            .records()
            .collect::<Result<Vec<_>, _>>()
            .expect("records");
        assert_eq!(
            records,
            vec![Record::new("a", "1"), Record::new("b", "2"), Record::parse("c")]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn flush_failure_surfaces_on_close_and_drop() {
        let full = std::path::Path::new("/dev/full");
        if !full.exists() {
            return;
        }
        let (mut channel, _) = channel_with_sink();
        channel.open(full, Mode::Write);
        channel.write(["a", "b"]).expect("buffered write");
        let err = channel.close().expect_err("flush to /dev/full");
        assert_eq!(err.kind(), ErrorKind::Io);
        channel.close().expect("second close is a no-op");

        let (mut channel, sink) = channel_with_sink();
        channel.open(full, Mode::Write);
        channel.write(["a", "b"]).expect("buffered write");
        drop(channel);
        let entries = sink.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, DiagnosticKind::CloseFailed);
        assert_eq!(entries[0].mode, Some(Mode::Write));
    }
}
