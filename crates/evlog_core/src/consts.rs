// crates/evlog_core/src/consts.rs

/// One hardware tick of the logger's free-running counter.
pub const TICK_PERIOD_NS: u64 = 2_000;
/// Counter width: ticks wrap from 65535 to 0.
pub const TICK_MODULUS: u32 = 1 << 16;
/// Ordering nudge applied by records without a clock reading.
pub const NUDGE_NS: u64 = 1;

/// Split-string terminator character.
pub const STRING_TERMINATOR: u8 = 0;

pub const DEFAULT_LOOKBACK_LIMIT: u64 = 256;
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 4096;

// type codes of the built-in catalog
pub const CODE_TICK: u8 = 0x01;
pub const CODE_VOLTAGE: u8 = 0x02;
pub const CODE_TEMPERATURE: u8 = 0x03;
pub const CODE_COUNTER: u8 = 0x04;
pub const CODE_POSITION: u8 = 0x05;
pub const CODE_BUTTON: u8 = 0x06;
pub const CODE_STATUS: u8 = 0x07;
pub const CODE_LABEL_CHAR: u8 = 0x10;
pub const CODE_MESSAGE_CHAR: u8 = 0x11;
pub const CODE_SESSION_START: u8 = 0x20;
pub const CODE_SYNC: u8 = 0x21;
pub const CODE_OVERFLOW: u8 = 0x22;
pub const CODE_DIAGNOSTIC: u8 = 0x30;
pub const CODE_CALIBRATION: u8 = 0x31;

// index sidecar (<log>.evx)
pub const MAGIC_IDX: &[u8; 4] = b"EVLX";
pub const SIDECAR_VERSION: u16 = 2;
pub const SIDECAR_EXT: &str = "evx";
pub const SIDECAR_HDR_SIZE: usize = 56;
pub const SIDECAR_CHECKPOINT_SIZE: usize = 20;
pub const SIDECAR_RESUME_SIZE: usize = 12;
/// Bytes of the log head hashed into the sidecar to detect a replaced file.
pub const SIDECAR_HEAD_WINDOW: usize = 64 * 1024;

const _: () = { assert!(SIDECAR_CHECKPOINT_SIZE == 8 + 8 + 2 + 1 + 1); };
