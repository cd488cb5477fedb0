//! Parser adapter contract.
//!
//! A parser turns one text log format into signal samples. The pipeline
//! drives it per source file: `compile`, `on_start`, one `on_row` per
//! line, `on_end`. Whatever the parser extracts it emits through the
//! [`SignalSink`] callbacks, which the pipeline forwards to the store
//! under the file's source id.

use std::path::Path;
use thiserror::Error;

use crate::color::Color;
use crate::store::StoreError;
use crate::types::EpochTime;

/// Failure while processing one source file. The pipeline catches it,
/// rolls back that file's transaction and moves on to the next file.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Transaction error: {0}")]
    Transaction(String),
}

/// Callbacks a parser uses to emit extracted samples.
///
/// Implemented by the pipeline on top of the active file's transaction;
/// storage failures are logged there and never surface to the parser.
pub trait SignalSink {
    fn add_signal_value(
        &mut self,
        category: &str,
        name: &str,
        time: EpochTime,
        value: f64,
        desc: &str,
    );
    fn add_signal_status(&mut self, category: &str, name: &str, time: EpochTime, status: &str);
    fn add_signal_start_zone(&mut self, category: &str, name: &str, time: EpochTime, message: &str);
    fn add_signal_end_zone(&mut self, category: &str, name: &str, time: EpochTime, message: &str);
    fn add_signal_tag(&mut self, time: EpochTime, color: Color, name: &str, help: &str);
}

/// One log-format adapter.
///
/// A single parser instance is reused for every file of a run, so
/// `compile` must reset any per-file state. Returning `false` from
/// `compile` skips the file without writing anything; an `Err` from a
/// hook aborts and rolls back the current file only.
pub trait LogParser: Send {
    /// Prepare for the given file. `false` rejects it.
    fn compile(&mut self, path: &Path) -> bool;

    fn on_start(&mut self, sink: &mut dyn SignalSink) -> Result<(), IngestError>;

    /// One line of input, without its terminator.
    fn on_row(&mut self, line: &str, sink: &mut dyn SignalSink) -> Result<(), IngestError>;

    fn on_end(&mut self, sink: &mut dyn SignalSink) -> Result<(), IngestError>;
}

/// Selectable built-in parser, the tag stored in the job configuration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// Whitespace-separated `epoch key=value` lines, noise-tolerant.
    #[default]
    KeyValue,
    /// One JSON object per line, strict.
    JsonLines,
}

impl ParserKind {
    pub fn build(self) -> Box<dyn LogParser> {
        match self {
            ParserKind::KeyValue => Box::new(crate::ingest::parsers::KeyValueParser::new()),
            ParserKind::JsonLines => Box::new(crate::ingest::parsers::JsonLinesParser::new()),
        }
    }
}
