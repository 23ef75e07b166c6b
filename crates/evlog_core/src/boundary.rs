//! Backward walk that moves a range start to the first character of any split
//! string still open at the boundary. Records are peeked, never decoded.

use crate::catalog::{Catalog, StringField};
use crate::consts::STRING_TERMINATOR;
use crate::decoder::peek_record;
use crate::index::EventIndex;
use tracing::debug;

pub struct BoundaryScanner<'a> {
    data: &'a [u8],
    catalog: &'a Catalog,
    index: &'a EventIndex,
    limit: u64,
}

impl<'a> BoundaryScanner<'a> {
    pub fn new(data: &'a [u8], catalog: &'a Catalog, index: &'a EventIndex, limit: u64) -> Self {
        Self { data, catalog, index, limit }
    }

    /// Earliest event a decode must start from so that every string open at
    /// `start_event` is rebuilt from its first character.
    ///
    /// The walk stops at a non-string record, at event 0, or once a terminator
    /// has been seen for every string field. A field not yet reached may still
    /// be open, so one closed field alone does not stop it. If `limit` records
    /// are walked while a string is still open, `start_event - limit` is
    /// returned and the string prefix is lost.
    pub fn adjust(&self, start_event: u64) -> u64 {
        let floor = start_event.saturating_sub(self.limit);
        let mut first_char: [Option<u64>; 2] = [None; 2];
        let mut closed = [false; 2];
        let earliest = |first_char: &[Option<u64>; 2]| first_char.iter().flatten().min().copied().unwrap_or(start_event);

        let mut j = start_event;
        while j > floor {
            j -= 1;
            let Some((kind, payload)) = self.index.offset_of(j).and_then(|off| peek_record(self.data, self.catalog, off))
            else {
                return earliest(&first_char);
            };
            let Some(field) = kind.string_field() else {
                return earliest(&first_char);
            };
            let slot = field.slot();
            if closed[slot] {
                continue;
            }
            if payload[0] == STRING_TERMINATOR {
                closed[slot] = true;
                if StringField::ALL.iter().all(|f| closed[f.slot()]) {
                    return earliest(&first_char);
                }
            } else {
                first_char[slot] = Some(j);
            }
        }

        let truncated = StringField::ALL.iter().any(|f| first_char[f.slot()].is_some() && !closed[f.slot()]);
        if floor == 0 || !truncated {
            return earliest(&first_char);
        }
        debug!(start_event, floor, "look-back bound exhausted inside a split string; prefix truncated");
        floor
    }
}
