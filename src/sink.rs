//! Output sinks for encoded bytes.
//!
//! The encoder writes straight into a [`Sink`]; nothing is collected in
//! memory first. A run ends with [`Sink::commit`], which flushes and, for file
//! sinks, atomically moves the finished file into place.
//!
//! File output goes to a temporary file next to the target. Dropping the sink
//! without committing (after an encode error, a panic, or a signal that
//! unwinds) deletes the temporary file, so the target path only ever holds a
//! complete image or whatever it held before.

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

pub enum Sink {
    Stdout(BufWriter<Stdout>),
    File {
        writer: BufWriter<NamedTempFile>,
        target: PathBuf,
    },
}

impl Sink {
    pub fn stdout() -> Self {
        Sink::Stdout(BufWriter::new(io::stdout()))
    }

    /// Stage output for `target` in a temp file in the same directory.
    pub fn file(target: &Path) -> io::Result<Self> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let temp = NamedTempFile::new_in(dir)?;
        debug!(temp = %temp.path().display(), target = %target.display(), "Staging output");
        Ok(Sink::File {
            writer: BufWriter::new(temp),
            target: target.to_path_buf(),
        })
    }

    /// Flush everything and make the output visible.
    pub fn commit(self) -> io::Result<()> {
        match self {
            Sink::Stdout(mut writer) => writer.flush(),
            Sink::File { writer, target } => {
                let temp = writer.into_inner().map_err(|e| e.into_error())?;
                temp.as_file().sync_all()?;
                let file: File = temp.persist(&target)?;
                drop(file);
                debug!(target = %target.display(), "Output written");
                Ok(())
            }
        }
    }
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(writer) => writer.write(buf),
            Sink::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(writer) => writer.flush(),
            Sink::File { writer, .. } => writer.flush(),
        }
    }
}
