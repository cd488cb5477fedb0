//! siglog - Log-to-Signal Engine
//!
//! Parses arbitrary text log files through pluggable parsers into named,
//! timestamped signal samples, persists them in a single-file SQLite
//! project, and reconstructs them as ordered per-signal time series
//! supporting interactive temporal queries.
//!
//! ```text
//! log files
//!     ↓ IngestPipeline (dedicated worker thread, per-file transactions)
//! SignalStore (SQLite: sources / categories / names / ticks / tags)
//!     ↓ SeriesModel::finalize()  (ascending-epoch read-back)
//! SignalSerie arenas + virtual boundary padding
//!     ├── set_hovered_time()  → per-serie preview values
//!     ├── diff marks          → compute_diff_result()
//!     └── show_hide_signal()  → GroupSet display buckets
//! ```
//!
//! Rendering, dialogs and process bootstrap live in the embedding
//! application; this crate ends at the read-only model accessors.

pub mod color;
pub mod config;
pub mod groups;
pub mod ingest;
pub mod series;
pub mod store;
pub mod types;

pub use color::Color;
pub use config::EngineConfig;
pub use groups::{GraphGroup, GroupSet};
pub use ingest::{IngestError, IngestJob, IngestPipeline, LogParser, ParserKind, SignalSink};
pub use series::{DiffEntry, SeriesModel, SignalSerie};
pub use store::{SignalStore, StoreError};
pub use types::{
    EpochTime, SerieId, SignalTag, SourceFile, Tick, TickId, TickKind, TickValue, ValueRange,
};
