//! Per-record decode dispatch.
//!
//! A [`RecordDecoder`] is one decode session over an immutable byte view of the
//! log: it owns the timeline and the two split-string accumulators, and keeps
//! no file cursor of its own. Callers hand it `(event_index, offset)` pairs.
//!
//! Record shapes:
//!   scalar    tick/voltage/temperature/counter/position/button
//!   status    one byte through the status table
//!   string    one character per record, 0 terminates
//!   marker    fixed label, optional pad byte
//!   unknown   declared length skipped, generic line

use crate::catalog::{status_name, Catalog, MarkerKind, RecordKind, StringField};
use crate::consts::STRING_TERMINATOR;
use crate::timeline::TimeKeeper;
use crate::utils::{le_i16, le_i32, le_u16, take};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedRecord {
    pub index: u64,
    /// Display line; may carry `<b>`/`<i>` markup. Empty for mid-string characters.
    pub rendered: String,
    /// Every consumed byte, type code included.
    pub raw_bytes: Vec<u8>,
    pub raw_offset: u64,
    pub time_ns: u64,
}

impl DecodedRecord {
    pub fn consumed(&self) -> u64 { self.raw_bytes.len() as u64 }
}

/// State of one split-string field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StringAccumulator {
    #[default]
    Empty,
    Accumulating { buffer: String, start_event: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringStep {
    Begin,
    Middle,
    Complete(String),
}

impl StringAccumulator {
    pub fn push(&mut self, ch: u8, event: u64) -> StringStep {
        if ch == STRING_TERMINATOR {
            return match std::mem::take(self) {
                StringAccumulator::Empty => StringStep::Complete(String::new()),
                StringAccumulator::Accumulating { buffer, .. } => StringStep::Complete(buffer),
            };
        }
        match self {
            StringAccumulator::Empty => {
                *self = StringAccumulator::Accumulating { buffer: char::from(ch).to_string(), start_event: event };
                StringStep::Begin
            }
            StringAccumulator::Accumulating { buffer, .. } => {
                buffer.push(char::from(ch));
                StringStep::Middle
            }
        }
    }

    pub fn is_empty(&self) -> bool { matches!(self, StringAccumulator::Empty) }

    pub fn start_event(&self) -> Option<u64> {
        match self {
            StringAccumulator::Empty => None,
            StringAccumulator::Accumulating { start_event, .. } => Some(*start_event),
        }
    }

    pub fn buffer(&self) -> &str {
        match self {
            StringAccumulator::Empty => "",
            StringAccumulator::Accumulating { buffer, .. } => buffer,
        }
    }
}

/// Classify the record at `offset` without touching any session state.
/// `None` if the type byte or its payload runs past the end of `data`.
pub fn peek_record<'d>(data: &'d [u8], catalog: &Catalog, offset: u64) -> Option<(RecordKind, &'d [u8])> {
    let off = usize::try_from(offset).ok()?;
    let code = *data.get(off)?;
    let kind = catalog.classify(code);
    let payload = take(data, off + 1, kind.payload_len() as usize)?;
    Some((kind, payload))
}

pub struct RecordDecoder<'a> {
    data: &'a [u8],
    catalog: &'a Catalog,
    strings: [StringAccumulator; 2],
    timeline: TimeKeeper,
}

impl<'a> RecordDecoder<'a> {
    pub fn new(data: &'a [u8], catalog: &'a Catalog) -> Self {
        Self { data, catalog, strings: Default::default(), timeline: TimeKeeper::new() }
    }

    pub fn with_timeline(mut self, timeline: TimeKeeper) -> Self {
        self.timeline = timeline;
        self
    }

    pub fn timeline(&self) -> &TimeKeeper { &self.timeline }

    pub fn accumulator(&self, field: StringField) -> &StringAccumulator { &self.strings[field.slot()] }

    /// Decode the record starting at `offset` as event `index`.
    /// Returns `None` when the log ends before the record does.
    pub fn decode_at(&mut self, index: u64, offset: u64) -> Option<DecodedRecord> {
        let (kind, payload) = peek_record(self.data, self.catalog, offset)?;
        let start = offset as usize;
        let raw_bytes = self.data[start..start + 1 + payload.len()].to_vec();

        let rendered = match kind {
            RecordKind::Tick => format!("tick {}", le_u16(payload)),
            RecordKind::Voltage => format!("voltage {} mV", le_u16(payload)),
            RecordKind::Temperature => format!("temperature {} °C", centi(le_i16(payload))),
            RecordKind::Counter => format!("counter {}", payload[0]),
            RecordKind::Position => {
                format!("position x={} y={}", le_i32(&payload[0..4]), le_i32(&payload[4..8]))
            }
            RecordKind::Button => format!("button {} @tick {}", payload[2], le_u16(&payload[0..2])),
            RecordKind::Status => match status_name(payload[0]) {
                Some(name) => format!("status <b>{name}</b>"),
                None => format!("status <b>unknown({})</b>", payload[0]),
            },
            RecordKind::StringChar(field) => match self.strings[field.slot()].push(payload[0], index) {
                StringStep::Begin => format!("{} <i>begin</i>", field.name()),
                StringStep::Middle => String::new(),
                StringStep::Complete(s) => format!("{} \"{}\"", field.name(), s),
            },
            RecordKind::Marker(MarkerKind::SessionStart) => "<i>session start</i>".to_string(),
            RecordKind::Marker(MarkerKind::Sync) => "<i>sync</i>".to_string(),
            RecordKind::Marker(MarkerKind::Overflow) => "<i>overflow</i>".to_string(),
            RecordKind::Unknown { code, length } => format!("unrecognized type 0x{code:02x} ({length} bytes)"),
            RecordKind::Unresolved { code } => {
                warn!(code, offset, "unresolved type code; offsets after this record are unreliable");
                format!("<b>unresolved type 0x{code:02x}</b>")
            }
        };

        let time_ns = self.timeline.apply(kind, payload);
        Some(DecodedRecord { index, rendered, raw_bytes, raw_offset: offset, time_ns })
    }
}

/// Fixed-point hundredths, e.g. -1234 → "-12.34".
fn centi(v: i16) -> String {
    let sign = if v < 0 { "-" } else { "" };
    let abs = (v as i32).abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
