pub mod consts;
pub mod errors;
pub mod utils;
pub mod catalog;
pub mod timeline;
pub mod decoder;
pub mod index;
pub mod boundary;
pub mod config;
pub mod sidecar;
pub mod writer;
pub mod reader;

pub use catalog::{Catalog, LengthEntry, LengthSource, LengthTable, RecordKind, StringField};
pub use config::{EngineConfig, TimeBase};
pub use decoder::{DecodedRecord, RecordDecoder};
pub use errors::{LogError, Result};
pub use index::{EventIndex, IndexStats, ScanOptions};
pub use reader::LogReader;
pub use timeline::TimeKeeper;
pub use writer::LogWriter;
