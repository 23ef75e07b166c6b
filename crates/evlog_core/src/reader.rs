//! Opened log: memory map + event index + range decoding.
//!
//! `decode` borrows `&self` and keeps its position in a local variable, so any
//! number of sessions can run against one `LogReader` (e.g. behind an `Arc`).
//! Only [`LogReader::refresh`] needs exclusive access.

use crate::boundary::BoundaryScanner;
use crate::catalog::Catalog;
use crate::config::{EngineConfig, TimeBase};
use crate::decoder::{peek_record, DecodedRecord, RecordDecoder};
use crate::errors::{LogError, Result};
use crate::index::{EventIndex, IndexStats};
use crate::sidecar;
use crate::timeline::TimeKeeper;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

pub struct LogReader {
    path: PathBuf,
    file: File,
    mmap: Mmap,
    catalog: Catalog,
    index: EventIndex,
    config: EngineConfig,
}

impl LogReader {
    /// Open with the built-in catalog and default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, Catalog::builtin(), EngineConfig::default())
    }

    pub fn open_with(path: impl AsRef<Path>, catalog: Catalog, config: EngineConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let mut index = None;
        if config.use_sidecar {
            match sidecar::load(&path, &mmap, &catalog, config.strict_types) {
                Ok(Some(mut idx)) => {
                    let added = idx.extend(&mmap, &catalog, config.scan_options())?;
                    debug!(added, "index sidecar loaded");
                    index = Some(idx);
                }
                Ok(None) => {}
                Err(e @ LogError::UnresolvedType { .. }) => return Err(e),
                Err(e) => info!(path = %path.display(), error = %e, "ignoring index sidecar, rescanning"),
            }
        }
        let index = match index {
            Some(idx) => idx,
            None => EventIndex::build(&mmap, &catalog, config.scan_options())?,
        };
        info!(
            path = %path.display(),
            events = index.total_events(),
            bytes = index.scanned_to(),
            trailing = index.stats().trailing_bytes,
            "log indexed"
        );

        let reader = Self { path, file, mmap, catalog, index, config };
        if reader.config.use_sidecar {
            if let Err(e) = reader.save_index() {
                warn!(error = %e, "could not write index sidecar");
            }
        }
        Ok(reader)
    }

    pub fn path(&self) -> &Path { &self.path }
    pub fn catalog(&self) -> &Catalog { &self.catalog }
    pub fn config(&self) -> &EngineConfig { &self.config }
    pub fn index(&self) -> &EventIndex { &self.index }
    pub fn stats(&self) -> &IndexStats { self.index.stats() }
    pub fn data(&self) -> &[u8] { &self.mmap }

    pub fn total_events(&self) -> u64 { self.index.total_events() }

    pub fn offset_of(&self, event: u64) -> Option<u64> { self.index.offset_of(event) }

    pub fn record_range_for(&self, start_record: u64, end_record: u64) -> Option<(u64, u64)> {
        self.index.event_range_for_record_range(start_record, end_record)
    }

    /// Decode events `[start, end)` using the configured time base.
    pub fn decode(&self, start_event: u64, end_event: u64) -> Vec<DecodedRecord> {
        self.decode_with(start_event, end_event, self.config.time_base)
    }

    /// Decode events `[start, end)`. The result is short if the log ends inside
    /// a record; it is empty if the range is.
    pub fn decode_with(&self, start_event: u64, end_event: u64, time_base: TimeBase) -> Vec<DecodedRecord> {
        let end_event = end_event.min(self.index.total_events());
        if start_event >= end_event {
            return Vec::new();
        }
        let data: &[u8] = &self.mmap;
        let actual_start =
            BoundaryScanner::new(data, &self.catalog, &self.index, self.config.lookback_limit).adjust(start_event);
        let Some(mut offset) = self.index.offset_of(actual_start) else {
            return Vec::new();
        };
        let timeline = match time_base {
            TimeBase::Session => TimeKeeper::new(),
            TimeBase::Absolute => self.timeline_at(actual_start),
        };
        debug!(start_event, actual_start, end_event, ?time_base, "decode range");

        let mut dec = RecordDecoder::new(data, &self.catalog).with_timeline(timeline);
        let mut out = Vec::with_capacity((end_event - start_event) as usize);
        for event in actual_start..end_event {
            let Some(rec) = dec.decode_at(event, offset) else {
                debug!(event, offset, "record runs past end of log; returning short range");
                break;
            };
            offset += rec.consumed();
            if let Some(next) = self.index.offset_of(event + 1) {
                if next != offset {
                    error!(event, indexed = next, decoded = offset, "decoder and index disagree on record span");
                    break;
                }
            }
            if event >= start_event {
                out.push(rec);
            }
        }
        out
    }

    /// Timeline state just before `event`, as a decode from byte 0 would have it.
    fn timeline_at(&self, event: u64) -> TimeKeeper {
        let (from, mut tk) = match self.index.checkpoint_before(event) {
            Some(cp) => (cp.event, cp.timekeeper()),
            None => (0, TimeKeeper::new()),
        };
        for e in from..event {
            if let Some((kind, payload)) = self.index.offset_of(e).and_then(|off| peek_record(&self.mmap, &self.catalog, off)) {
                tk.apply(kind, payload);
            }
        }
        tk
    }

    /// Remap the file and index whatever the logger appended since.
    pub fn refresh(&mut self) -> Result<u64> {
        let mmap = unsafe { Mmap::map(&self.file)? };
        if (mmap.len() as u64) < self.index.scanned_to() {
            return Err(LogError::InvalidInput(format!(
                "{} shrank below the indexed length ({} < {})",
                self.path.display(),
                mmap.len(),
                self.index.scanned_to()
            )));
        }
        self.mmap = mmap;
        let added = self.index.extend(&self.mmap, &self.catalog, self.config.scan_options())?;
        if added > 0 {
            info!(added, events = self.index.total_events(), "index refreshed");
        }
        Ok(added)
    }

    pub fn save_index(&self) -> Result<PathBuf> {
        sidecar::save(&self.index, &self.path, &self.mmap, &self.catalog)
    }

    /// Release the mapping and file handle.
    pub fn close(self) {
        debug!(path = %self.path.display(), "log closed");
    }
}
