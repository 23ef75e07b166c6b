//! Record catalog & length resolution.
//!
//! On disk every record is `[type u8][payload; length(type)]`. The length table
//! is injected (any [`LengthSource`]); [`Catalog`] resolves each of the 256
//! codes once into a [`RecordKind`] so the indexer and decoder agree on layout.
//!
//! Built-in table (code, payload bytes):
//!   0x01 tick 2 | 0x02 voltage 2 | 0x03 temperature 2 | 0x04 counter 1
//!   0x05 position 8 | 0x06 button 3 | 0x07 status 1
//!   0x10 label char 1 | 0x11 message char 1
//!   0x20 session start 0 | 0x21 sync 1 (pad) | 0x22 overflow 0
//!   0x30 diagnostic 3 | 0x31 calibration 4  (no decode branch)

use crate::consts::*;
use crate::errors::{LogError, Result};
use crate::utils::xxh3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Injected type→payload-length lookup. `None` means the code is unresolved.
pub trait LengthSource: Send + Sync {
    fn declared_length(&self, code: u8) -> Option<u32>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringField {
    Label,
    Message,
}

impl StringField {
    pub const ALL: [StringField; 2] = [StringField::Label, StringField::Message];

    pub fn name(self) -> &'static str {
        match self {
            StringField::Label => "label",
            StringField::Message => "message",
        }
    }

    pub fn slot(self) -> usize {
        match self {
            StringField::Label => 0,
            StringField::Message => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    SessionStart,
    /// Carries one ignorable padding byte.
    Sync,
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeRule {
    /// Payload starts with a raw u16 tick reading.
    Tick,
    /// No clock reading; advance by the ordering nudge.
    Nudge,
    /// Leaves the timeline untouched.
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Tick,
    Voltage,
    Temperature,
    Counter,
    Position,
    Button,
    Status,
    StringChar(StringField),
    Marker(MarkerKind),
    /// Declared by the length table but without a decode branch.
    Unknown { code: u8, length: u32 },
    /// Absent from the length table.
    Unresolved { code: u8 },
}

impl RecordKind {
    fn builtin(code: u8) -> Option<RecordKind> {
        Some(match code {
            CODE_TICK => RecordKind::Tick,
            CODE_VOLTAGE => RecordKind::Voltage,
            CODE_TEMPERATURE => RecordKind::Temperature,
            CODE_COUNTER => RecordKind::Counter,
            CODE_POSITION => RecordKind::Position,
            CODE_BUTTON => RecordKind::Button,
            CODE_STATUS => RecordKind::Status,
            CODE_LABEL_CHAR => RecordKind::StringChar(StringField::Label),
            CODE_MESSAGE_CHAR => RecordKind::StringChar(StringField::Message),
            CODE_SESSION_START => RecordKind::Marker(MarkerKind::SessionStart),
            CODE_SYNC => RecordKind::Marker(MarkerKind::Sync),
            CODE_OVERFLOW => RecordKind::Marker(MarkerKind::Overflow),
            _ => return None,
        })
    }

    /// Payload bytes the decode branch consumes.
    pub fn payload_len(self) -> u32 {
        match self {
            RecordKind::Tick | RecordKind::Voltage | RecordKind::Temperature => 2,
            RecordKind::Counter | RecordKind::Status => 1,
            RecordKind::Position => 8,
            RecordKind::Button => 3,
            RecordKind::StringChar(_) => 1,
            RecordKind::Marker(MarkerKind::Sync) => 1,
            RecordKind::Marker(_) => 0,
            RecordKind::Unknown { length, .. } => length,
            RecordKind::Unresolved { .. } => 0,
        }
    }

    pub fn time_rule(self) -> TimeRule {
        match self {
            RecordKind::Tick | RecordKind::Button => TimeRule::Tick,
            RecordKind::Voltage
            | RecordKind::Temperature
            | RecordKind::Counter
            | RecordKind::Position
            | RecordKind::Status
            | RecordKind::Marker(MarkerKind::SessionStart)
            | RecordKind::Marker(MarkerKind::Sync) => TimeRule::Nudge,
            RecordKind::StringChar(_)
            | RecordKind::Marker(MarkerKind::Overflow)
            | RecordKind::Unknown { .. }
            | RecordKind::Unresolved { .. } => TimeRule::Hold,
        }
    }

    pub fn string_field(self) -> Option<StringField> {
        match self {
            RecordKind::StringChar(f) => Some(f),
            _ => None,
        }
    }
}

/// Canonical status table (the long legacy variant).
pub const STATUS_NAMES: [&str; 8] = [
    "idle",
    "armed",
    "logging",
    "paused",
    "low_battery",
    "storage_full",
    "fault",
    "shutdown",
];

pub fn status_name(code: u8) -> Option<&'static str> {
    STATUS_NAMES.get(code as usize).copied()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthEntry {
    pub code: u8,
    pub length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LengthTableFile {
    entries: Vec<LengthEntry>,
}

/// Type→length table, loadable from JSON:
/// `{ "entries": [ { "code": 1, "length": 2, "name": "tick" } ] }`
#[derive(Debug, Clone)]
pub struct LengthTable {
    entries: Vec<LengthEntry>,
    slots: Vec<Option<u32>>,
}

impl LengthTable {
    pub fn from_entries(entries: Vec<LengthEntry>) -> Result<Self> {
        let mut slots = vec![None; 256];
        for e in &entries {
            if slots[e.code as usize].replace(e.length).is_some() {
                return Err(LogError::InvalidInput(format!("duplicate length entry for 0x{:02x}", e.code)));
            }
        }
        Ok(Self { entries, slots })
    }

    pub fn builtin() -> Self {
        let table: [(u8, u32, &str); 14] = [
            (CODE_TICK, 2, "tick"),
            (CODE_VOLTAGE, 2, "voltage"),
            (CODE_TEMPERATURE, 2, "temperature"),
            (CODE_COUNTER, 1, "counter"),
            (CODE_POSITION, 8, "position"),
            (CODE_BUTTON, 3, "button"),
            (CODE_STATUS, 1, "status"),
            (CODE_LABEL_CHAR, 1, "label_char"),
            (CODE_MESSAGE_CHAR, 1, "message_char"),
            (CODE_SESSION_START, 0, "session_start"),
            (CODE_SYNC, 1, "sync"),
            (CODE_OVERFLOW, 0, "overflow"),
            (CODE_DIAGNOSTIC, 3, "diagnostic"),
            (CODE_CALIBRATION, 4, "calibration"),
        ];
        let mut slots = vec![None; 256];
        let entries = table
            .iter()
            .map(|&(code, length, name)| {
                slots[code as usize] = Some(length);
                LengthEntry { code, length, name: Some(name.to_string()) }
            })
            .collect();
        Self { entries, slots }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)?;
        Self::from_json(&s)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        let f: LengthTableFile = serde_json::from_str(s)?;
        Self::from_entries(f.entries)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        let f = LengthTableFile { entries: self.entries.clone() };
        Ok(serde_json::to_string_pretty(&f)?)
    }

    pub fn entries(&self) -> &[LengthEntry] { &self.entries }
}

impl LengthSource for LengthTable {
    fn declared_length(&self, code: u8) -> Option<u32> {
        self.slots.get(code as usize).copied().flatten()
    }
}

/// Resolve one code against `source`.
fn resolve(source: &dyn LengthSource, code: u8) -> Result<RecordKind> {
    Ok(match (source.declared_length(code), RecordKind::builtin(code)) {
        (None, _) => RecordKind::Unresolved { code },
        (Some(declared), Some(kind)) => {
            let expected = kind.payload_len();
            if declared != expected {
                return Err(LogError::CatalogMismatch { code, declared, expected });
            }
            kind
        }
        (Some(length), None) => RecordKind::Unknown { code, length },
    })
}

/// Length resolver: every code resolved once against the injected table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    kinds: Vec<RecordKind>,
}

impl Catalog {
    /// Fails if the table disagrees with a code that has a decode branch.
    pub fn new(source: &dyn LengthSource) -> Result<Self> {
        let kinds = (0..=u8::MAX).map(|code| resolve(source, code)).collect::<Result<Vec<_>>>()?;
        Ok(Self { kinds })
    }

    /// The built-in table agrees with every decode branch (checked in tests),
    /// so no code can fail here.
    pub fn builtin() -> Self {
        let table = LengthTable::builtin();
        let kinds = (0..=u8::MAX)
            .map(|code| resolve(&table, code).unwrap_or(RecordKind::Unresolved { code }))
            .collect();
        Self { kinds }
    }

    /// Hash of every code's resolved length and resolution state. Two catalogs
    /// with the same fingerprint lay out any log identically.
    pub fn fingerprint(&self) -> u64 {
        let mut buf = Vec::with_capacity(self.kinds.len() * 5);
        for kind in &self.kinds {
            buf.extend_from_slice(&kind.payload_len().to_le_bytes());
            buf.push(!matches!(kind, RecordKind::Unresolved { .. }) as u8);
        }
        xxh3(&buf)
    }

    #[inline]
    pub fn classify(&self, code: u8) -> RecordKind { self.kinds[code as usize] }

    /// Payload length; 0 for marker and unresolved codes.
    #[inline]
    pub fn length_of(&self, code: u8) -> u32 { self.classify(code).payload_len() }

    pub fn is_resolved(&self, code: u8) -> bool {
        !matches!(self.classify(code), RecordKind::Unresolved { .. })
    }
}

impl Default for Catalog {
    fn default() -> Self { Self::builtin() }
}
