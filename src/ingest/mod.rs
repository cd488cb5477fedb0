//! Ingestion Pipeline - Worker-Thread Log Parsing
//!
//! Orchestrates one parse job at a time:
//!
//! ```text
//! IngestJob { project file, source files, ParserKind }
//!     ↓ IngestPipeline::start()          (caller thread, clears model)
//! worker thread: per file
//!     read text → compile → transaction
//!         → on_start / on_row per line / on_end   (LogParser)
//!         → SignalSink callbacks → SignalStore
//!     commit, or rollback on error (per-file isolation)
//!     ↓
//! IngestPipeline::finish_if_required()   (caller thread, finalize model)
//! ```
//!
//! Progress and cancellation travel through atomics; the remaining job
//! state sits behind one mutex.

pub mod parser;
pub mod parsers;
pub mod pipeline;

pub use parser::{IngestError, LogParser, ParserKind, SignalSink};
pub use parsers::{JsonLinesParser, KeyValueParser};
pub use pipeline::{IngestJob, IngestPipeline};
