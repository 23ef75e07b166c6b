//! Index sidecar (`<log>.evx`) so a reopened log skips the full scan.
//!
//! Header (LE, 56 bytes):
//!   magic[4]      = "EVLX"
//!   version[2]    = 2
//!   flags[2]      = 0
//!   log_len[8]    = log size when saved
//!   head_hash[8]  = xxh3 of the first min(log_len, 64 KiB) log bytes
//!   catalog[8]    = Catalog::fingerprint of the table that laid out the offsets
//!   events[8]
//!   ckpts[4]
//!   body_crc[4]   = crc32 of the body
//!   scanned_to[8] = end of the last complete record
//!
//! Body:
//!   events * u64 offset
//!   ckpts  * { u64 event, u64 time_ns, u16 prev_tick, u8 has_tick, u8 pad }
//!   resume   { u64 time_ns, u16 prev_tick, u8 has_tick, u8 pad }
//!
//! The sidecar only describes a prefix of the log; a log that has grown since
//! is still valid and the caller extends the index from `scanned_to`.

use crate::catalog::Catalog;
use crate::consts::*;
use crate::errors::{LogError, Result};
use crate::index::{EventIndex, TimeCheckpoint};
use crate::timeline::TimeKeeper;
use crate::utils::{crc32, head_hash, read_u16, read_u32, read_u64, write_u16, write_u64};
use crate::writer::fsync_dir;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

pub fn sidecar_path(log_path: &Path) -> PathBuf {
    let mut s = log_path.as_os_str().to_owned();
    s.push(".");
    s.push(SIDECAR_EXT);
    PathBuf::from(s)
}

fn write_tick_state<W: Write>(w: &mut W, prev_tick: Option<u16>) -> std::io::Result<()> {
    write_u16(w, prev_tick.unwrap_or(0))?;
    w.write_all(&[prev_tick.is_some() as u8, 0])
}

fn read_tick_state<R: Read>(r: &mut R) -> std::io::Result<Option<u16>> {
    let tick = read_u16(r)?;
    let mut flags = [0u8; 2];
    r.read_exact(&mut flags)?;
    Ok((flags[0] != 0).then_some(tick))
}

/// Write the sidecar for `log_path` atomically.
pub fn save(index: &EventIndex, log_path: &Path, data: &[u8], catalog: &Catalog) -> Result<PathBuf> {
    let path_final = sidecar_path(log_path);
    let log_len = data.len() as u64;

    let mut body = Vec::with_capacity(
        index.offsets().len() * 8 + index.checkpoints().len() * SIDECAR_CHECKPOINT_SIZE + SIDECAR_RESUME_SIZE,
    );
    for &off in index.offsets() {
        write_u64(&mut body, off)?;
    }
    for cp in index.checkpoints() {
        write_u64(&mut body, cp.event)?;
        write_u64(&mut body, cp.time_ns)?;
        write_tick_state(&mut body, cp.prev_tick)?;
    }
    let resume = index.resume_timeline();
    write_u64(&mut body, resume.time_ns())?;
    write_tick_state(&mut body, resume.prev_tick())?;

    let mut hdr = Vec::with_capacity(SIDECAR_HDR_SIZE);
    hdr.extend_from_slice(MAGIC_IDX);
    hdr.extend_from_slice(&SIDECAR_VERSION.to_le_bytes());
    hdr.extend_from_slice(&0u16.to_le_bytes());
    hdr.extend_from_slice(&log_len.to_le_bytes());
    hdr.extend_from_slice(&head_hash(data, SIDECAR_HEAD_WINDOW).to_le_bytes());
    hdr.extend_from_slice(&catalog.fingerprint().to_le_bytes());
    hdr.extend_from_slice(&index.total_events().to_le_bytes());
    hdr.extend_from_slice(&(index.checkpoints().len() as u32).to_le_bytes());
    hdr.extend_from_slice(&crc32(&body).to_le_bytes());
    hdr.extend_from_slice(&index.scanned_to().to_le_bytes());
    debug_assert_eq!(hdr.len(), SIDECAR_HDR_SIZE);

    let dir = path_final.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut tmp = tempfile::Builder::new().prefix("evlog_idx_").tempfile_in(dir)?;
    tmp.write_all(&hdr)?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(&path_final)?;
    let _ = fsync_dir(&path_final);
    Ok(path_final)
}

/// Load the sidecar of `log_path`, checked against the mapped log `data` and
/// the catalog in use. `Ok(None)` if there is no sidecar. With `strict_types`
/// an indexed unresolved code fails the load as it would fail a scan.
pub fn load(log_path: &Path, data: &[u8], catalog: &Catalog, strict_types: bool) -> Result<Option<EventIndex>> {
    let path = sidecar_path(log_path);
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read(&path)?;
    if raw.len() < SIDECAR_HDR_SIZE || &raw[0..4] != MAGIC_IDX {
        return Err(LogError::BadSidecar("bad magic".into()));
    }
    let mut hdr = Cursor::new(&raw[4..SIDECAR_HDR_SIZE]);
    let version = read_u16(&mut hdr)?;
    if version != SIDECAR_VERSION {
        return Err(LogError::BadSidecar(format!("unsupported version {version}")));
    }
    let _flags = read_u16(&mut hdr)?;
    let log_len = read_u64(&mut hdr)?;
    let hash = read_u64(&mut hdr)?;
    let catalog_fp = read_u64(&mut hdr)?;
    let events = read_u64(&mut hdr)?;
    let ckpts = read_u32(&mut hdr)? as u64;
    let body_crc = read_u32(&mut hdr)?;
    let scanned_to = read_u64(&mut hdr)?;

    let body = &raw[SIDECAR_HDR_SIZE..];
    let want = events
        .checked_mul(8)
        .and_then(|n| n.checked_add(ckpts * SIDECAR_CHECKPOINT_SIZE as u64))
        .and_then(|n| n.checked_add(SIDECAR_RESUME_SIZE as u64));
    if want != Some(body.len() as u64) {
        return Err(LogError::BadSidecar("body size does not match header".into()));
    }
    if crc32(body) != body_crc {
        return Err(LogError::BadSidecar("body checksum mismatch".into()));
    }
    if (data.len() as u64) < log_len
        || scanned_to > log_len
        || head_hash(&data[..log_len as usize], SIDECAR_HEAD_WINDOW) != hash
    {
        return Err(LogError::StaleSidecar);
    }
    if catalog_fp != catalog.fingerprint() {
        return Err(LogError::StaleSidecar);
    }

    let mut rd = Cursor::new(body);
    let mut offsets = Vec::with_capacity(events as usize);
    for _ in 0..events {
        let off = read_u64(&mut rd)?;
        if off >= scanned_to || offsets.last().is_some_and(|&prev| off <= prev) {
            return Err(LogError::BadSidecar(format!("offset {off} out of order")));
        }
        offsets.push(off);
    }
    let mut checkpoints = Vec::with_capacity(ckpts as usize);
    for _ in 0..ckpts {
        let event = read_u64(&mut rd)?;
        let time_ns = read_u64(&mut rd)?;
        let prev_tick = read_tick_state(&mut rd)?;
        checkpoints.push(TimeCheckpoint { event, time_ns, prev_tick });
    }
    let resume_time = read_u64(&mut rd)?;
    let resume = TimeKeeper::resume(resume_time, read_tick_state(&mut rd)?);

    EventIndex::from_parts(data, catalog, strict_types, offsets, checkpoints, scanned_to, resume).map(Some)
}
