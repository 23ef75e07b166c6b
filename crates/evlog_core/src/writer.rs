//! Record encoder. Produces logs in the logger's on-disk layout, either into
//! memory or into a temp file that is published atomically on `finish`.

use crate::consts::*;
use crate::errors::{LogError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

#[cfg(unix)]
pub(crate) fn fsync_dir(path: &Path) -> std::io::Result<()> {
    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    File::open(dir)?.sync_all()
}
#[cfg(not(unix))]
pub(crate) fn fsync_dir(_path: &Path) -> std::io::Result<()> { Ok(()) }

/// Temp file next to the destination, renamed into place by [`LogWriter::finish`].
pub struct PendingFile {
    path_final: PathBuf,
    out: BufWriter<NamedTempFile>,
}

impl Write for PendingFile {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { self.out.write(buf) }
    fn flush(&mut self) -> std::io::Result<()> { self.out.flush() }
}

pub struct LogWriter<W: Write> {
    out: W,
    records: u64,
    bytes: u64,
}

impl LogWriter<Vec<u8>> {
    pub fn in_memory() -> Self { Self::new(Vec::new()) }
    pub fn into_bytes(self) -> Vec<u8> { self.out }
}

impl LogWriter<PendingFile> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path_final = path.as_ref().to_path_buf();
        let dir = path_final.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
        let tmp = tempfile::Builder::new().prefix("evlog_").tempfile_in(dir)?;
        Ok(Self::new(PendingFile { path_final, out: BufWriter::new(tmp) }))
    }

    /// Flush, sync and publish under the final name.
    pub fn finish(self) -> Result<PathBuf> {
        let PendingFile { path_final, out } = self.out;
        let tmp = out.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path_final)?;
        let _ = fsync_dir(&path_final);
        Ok(path_final)
    }
}

impl<W: Write> LogWriter<W> {
    pub fn new(out: W) -> Self { Self { out, records: 0, bytes: 0 } }

    pub fn records(&self) -> u64 { self.records }
    pub fn bytes(&self) -> u64 { self.bytes }

    /// Raw record; the payload length is the caller's responsibility.
    pub fn record(&mut self, code: u8, payload: &[u8]) -> Result<()> {
        self.out.write_all(&[code])?;
        self.out.write_all(payload)?;
        self.records += 1;
        self.bytes += 1 + payload.len() as u64;
        Ok(())
    }

    pub fn tick(&mut self, t: u16) -> Result<()> { self.record(CODE_TICK, &t.to_le_bytes()) }
    pub fn voltage(&mut self, millivolts: u16) -> Result<()> { self.record(CODE_VOLTAGE, &millivolts.to_le_bytes()) }
    pub fn temperature(&mut self, centi_celsius: i16) -> Result<()> {
        self.record(CODE_TEMPERATURE, &centi_celsius.to_le_bytes())
    }
    pub fn counter(&mut self, v: u8) -> Result<()> { self.record(CODE_COUNTER, &[v]) }

    pub fn position(&mut self, x: i32, y: i32) -> Result<()> {
        let mut p = [0u8; 8];
        p[..4].copy_from_slice(&x.to_le_bytes());
        p[4..].copy_from_slice(&y.to_le_bytes());
        self.record(CODE_POSITION, &p)
    }

    pub fn button(&mut self, tick: u16, id: u8) -> Result<()> {
        let t = tick.to_le_bytes();
        self.record(CODE_BUTTON, &[t[0], t[1], id])
    }

    pub fn status(&mut self, code: u8) -> Result<()> { self.record(CODE_STATUS, &[code]) }

    pub fn label(&mut self, s: &str) -> Result<()> { self.split_string(CODE_LABEL_CHAR, s) }
    pub fn message(&mut self, s: &str) -> Result<()> { self.split_string(CODE_MESSAGE_CHAR, s) }

    /// One record per character, then the terminator.
    fn split_string(&mut self, code: u8, s: &str) -> Result<()> {
        if !s.is_ascii() || s.bytes().any(|b| b == STRING_TERMINATOR) {
            return Err(LogError::InvalidInput(format!("split strings must be ASCII without NUL: {s:?}")));
        }
        for b in s.bytes() {
            self.record(code, &[b])?;
        }
        self.record(code, &[STRING_TERMINATOR])
    }

    pub fn session_start(&mut self) -> Result<()> { self.record(CODE_SESSION_START, &[]) }
    pub fn sync(&mut self) -> Result<()> { self.record(CODE_SYNC, &[0]) }
    pub fn overflow(&mut self) -> Result<()> { self.record(CODE_OVERFLOW, &[]) }
}
