//! Forward event index.
//!
//! One linear pass over the log records `event → offset` for every complete
//! record. The pass also runs a [`TimeKeeper`] so that a timeline checkpoint can
//! be kept every `checkpoint_interval` events; absolute-time decodes resume
//! from those instead of replaying the whole file.
//!
//! The only clean end of a log is EOF at a type byte. A record whose payload
//! runs past EOF is left out of the index (`trailing_bytes` in the stats) and is
//! picked up by [`EventIndex::extend`] once the logger has finished writing it.

use crate::catalog::{Catalog, RecordKind};
use crate::consts::DEFAULT_CHECKPOINT_INTERVAL;
use crate::errors::{LogError, Result};
use crate::timeline::TimeKeeper;
use crate::utils::take;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Timeline state *before* `event` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeCheckpoint {
    pub event: u64,
    pub time_ns: u64,
    pub prev_tick: Option<u16>,
}

impl TimeCheckpoint {
    pub fn timekeeper(&self) -> TimeKeeper { TimeKeeper::resume(self.time_ns, self.prev_tick) }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    pub total_events: u64,
    /// End of the last complete record.
    pub scanned_bytes: u64,
    pub file_len: u64,
    /// Bytes of an incomplete record at the tail.
    pub trailing_bytes: u64,
    /// Codes absent from the length table, with occurrence counts.
    pub unresolved: BTreeMap<u8, u64>,
    pub per_code: BTreeMap<u8, u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Fail on the first unresolved code instead of indexing it as zero-length.
    pub strict_types: bool,
    /// 0 disables checkpoints.
    pub checkpoint_interval: u64,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self { strict_types: false, checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventIndex {
    offsets: Vec<u64>,
    checkpoints: Vec<TimeCheckpoint>,
    scanned_to: u64,
    resume: TimeKeeper,
    stats: IndexStats,
}

impl EventIndex {
    pub fn build(data: &[u8], catalog: &Catalog, opts: ScanOptions) -> Result<Self> {
        let mut idx = Self::default();
        idx.extend(data, catalog, opts)?;
        Ok(idx)
    }

    /// Rebuild from persisted parts; per-code stats are recounted from the type bytes.
    pub(crate) fn from_parts(
        data: &[u8],
        catalog: &Catalog,
        strict_types: bool,
        offsets: Vec<u64>,
        checkpoints: Vec<TimeCheckpoint>,
        scanned_to: u64,
        resume: TimeKeeper,
    ) -> Result<Self> {
        let mut stats = IndexStats::default();
        for &off in &offsets {
            let code = *data
                .get(off as usize)
                .ok_or_else(|| LogError::BadSidecar(format!("offset {off} past end of log")))?;
            *stats.per_code.entry(code).or_insert(0) += 1;
            if !catalog.is_resolved(code) {
                if strict_types {
                    return Err(LogError::UnresolvedType { code, offset: off });
                }
                *stats.unresolved.entry(code).or_insert(0) += 1;
            }
        }
        stats.total_events = offsets.len() as u64;
        stats.scanned_bytes = scanned_to;
        stats.file_len = data.len() as u64;
        stats.trailing_bytes = (data.len() as u64).saturating_sub(scanned_to);
        Ok(Self { offsets, checkpoints, scanned_to, resume, stats })
    }

    /// Continue the scan from the end of the last complete record.
    /// Returns the number of events added.
    pub fn extend(&mut self, data: &[u8], catalog: &Catalog, opts: ScanOptions) -> Result<u64> {
        let len = data.len() as u64;
        let base_events = self.offsets.len();
        let base_checkpoints = self.checkpoints.len();
        let mut stats = self.stats.clone();
        let mut tk = self.resume;
        let mut off = self.scanned_to;
        let mut event = base_events as u64;

        while off < len {
            let code = data[off as usize];
            let kind = catalog.classify(code);
            if let RecordKind::Unresolved { code } = kind {
                if opts.strict_types {
                    self.offsets.truncate(base_events);
                    self.checkpoints.truncate(base_checkpoints);
                    return Err(LogError::UnresolvedType { code, offset: off });
                }
                let seen = stats.unresolved.entry(code).or_insert(0);
                if *seen == 0 {
                    warn!(code, offset = off, "unresolved type code indexed as zero-length; later offsets may be wrong");
                }
                *seen += 1;
            }
            let Some(payload) = take(data, off as usize + 1, kind.payload_len() as usize) else {
                warn!(offset = off, trailing = len - off, "incomplete trailing record left out of the index");
                break;
            };
            if opts.checkpoint_interval > 0 && event % opts.checkpoint_interval == 0 {
                self.checkpoints.push(TimeCheckpoint { event, time_ns: tk.time_ns(), prev_tick: tk.prev_tick() });
            }
            self.offsets.push(off);
            *stats.per_code.entry(code).or_insert(0) += 1;
            tk.apply(kind, payload);
            off += 1 + payload.len() as u64;
            event += 1;
        }

        let added = (self.offsets.len() - base_events) as u64;
        stats.total_events = self.offsets.len() as u64;
        stats.scanned_bytes = off;
        stats.file_len = len;
        stats.trailing_bytes = len - off;
        self.stats = stats;
        self.scanned_to = off;
        self.resume = tk;
        debug!(added, total = self.offsets.len(), scanned_to = off, "index scan");
        Ok(added)
    }

    pub fn total_events(&self) -> u64 { self.offsets.len() as u64 }

    pub fn offset_of(&self, event: u64) -> Option<u64> {
        self.offsets.get(usize::try_from(event).ok()?).copied()
    }

    /// Byte span `[start, end)` of one event.
    pub fn span_of(&self, event: u64) -> Option<(u64, u64)> {
        let start = self.offset_of(event)?;
        let end = self.offset_of(event + 1).unwrap_or(self.scanned_to);
        Some((start, end))
    }

    /// Records and events map 1:1, so this clamps `[start, end)` to the index.
    pub fn event_range_for_record_range(&self, start: u64, end: u64) -> Option<(u64, u64)> {
        let total = self.total_events();
        if start >= total || start >= end {
            return None;
        }
        Some((start, end.min(total)))
    }

    /// Latest checkpoint at or before `event`.
    pub fn checkpoint_before(&self, event: u64) -> Option<&TimeCheckpoint> {
        let n = self.checkpoints.partition_point(|c| c.event <= event);
        n.checked_sub(1).map(|i| &self.checkpoints[i])
    }

    pub fn offsets(&self) -> &[u64] { &self.offsets }
    pub fn checkpoints(&self) -> &[TimeCheckpoint] { &self.checkpoints }
    pub fn scanned_to(&self) -> u64 { self.scanned_to }
    pub fn resume_timeline(&self) -> TimeKeeper { self.resume }
    pub fn stats(&self) -> &IndexStats { &self.stats }
}
