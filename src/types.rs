//! Core data model shared by the storage layer and the in-memory series model.

use std::fmt;

/// Epoch timestamp in seconds, as parsed out of the log lines.
///
/// Stored as REAL in the project database; sub-second resolution is up to
/// whatever the parser extracts.
pub type EpochTime = f64;

/// Handle into the model's flat tick arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickId(pub(crate) usize);

/// Handle into the model's flat serie arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerieId(pub(crate) usize);

impl TickId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl SerieId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Closed numeric interval, grown incrementally while scanning ticks.
///
/// Used for per-serie value ranges, per-group aggregate ranges and the
/// global time extent. An empty range is represented as `Option::None` at
/// the use sites, so `min <= max` always holds here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    /// Degenerate range covering a single value.
    pub fn point(v: f64) -> Self {
        Self { min: v, max: v }
    }

    /// Grow to include `v`.
    pub fn expand(&mut self, v: f64) {
        if v < self.min {
            self.min = v;
        }
        if v > self.max {
            self.max = v;
        }
    }

    /// Grow to cover `other` entirely.
    pub fn merge(&mut self, other: ValueRange) {
        self.expand(other.min);
        self.expand(other.max);
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn contains(&self, v: f64) -> bool {
        self.min <= v && v <= self.max
    }
}

/// What a tick row represents.
///
/// The integer codes are the on-disk `status` column values. `Virtual` is
/// memory-only: boundary-padding ticks are synthesized during finalize and
/// never written back to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Value,
    Status,
    ZoneStart,
    ZoneEnd,
    Virtual,
}

impl TickKind {
    /// Database code for this kind, `None` for memory-only kinds.
    pub fn db_code(self) -> Option<i64> {
        match self {
            TickKind::Value => Some(0),
            TickKind::Status => Some(1),
            TickKind::ZoneStart => Some(2),
            TickKind::ZoneEnd => Some(3),
            TickKind::Virtual => None,
        }
    }

    /// Decode the `status` column; unknown codes map to `Status` so a
    /// project written by a newer version still loads.
    pub fn from_db_code(code: i64) -> TickKind {
        match code {
            0 => TickKind::Value,
            2 => TickKind::ZoneStart,
            3 => TickKind::ZoneEnd,
            _ => TickKind::Status,
        }
    }

    pub fn is_zone(self) -> bool {
        matches!(self, TickKind::ZoneStart | TickKind::ZoneEnd)
    }
}

/// Sample payload: numeric value or string state.
#[derive(Debug, Clone, PartialEq)]
pub enum TickValue {
    Value(f64),
    Status(String),
}

impl TickValue {
    /// Numeric view, `None` for string states.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TickValue::Value(v) => Some(*v),
            TickValue::Status(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TickValue::Value(_) => None,
            TickValue::Status(s) => Some(s),
        }
    }
}

impl fmt::Display for TickValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickValue::Value(v) => write!(f, "{}", v),
            TickValue::Status(s) => write!(f, "{}", s),
        }
    }
}

/// One timestamped sample for a (category, name) signal.
///
/// Ticks live in a flat arena owned by the series model; `serie` is the
/// back-reference to the owning serie, resolved by index.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub serie: SerieId,
    /// Row id of the source file this tick came from; `None` for virtual
    /// boundary ticks.
    pub source: Option<i64>,
    pub time: EpochTime,
    pub value: TickValue,
    pub kind: TickKind,
    pub desc: Option<String>,
}

impl Tick {
    pub fn is_virtual(&self) -> bool {
        self.kind == TickKind::Virtual
    }
}

/// Point-in-time annotation independent of any serie.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalTag {
    pub time: EpochTime,
    pub color: crate::color::Color,
    pub name: String,
    pub help: String,
}

/// One ingested log file, as recorded in the project database.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub id: i64,
    pub path: String,
}
