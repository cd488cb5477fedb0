//! Signal Series Model - Reconstructed Time-Series State
//!
//! Rebuilds query-ready per-signal time series from the project store and
//! answers the interactive temporal queries:
//!
//! ```text
//! SignalStore --finalize()--> SeriesModel
//!     ├── category -> name -> SignalSerie (ticks in one flat arena)
//!     ├── global time extent + virtual boundary padding
//!     ├── set_hovered_time()        -> per-serie preview + changed flag
//!     ├── diff marks                -> compute_diff_result()
//!     ├── show_hide_signal()        -> GroupSet sync + rainbow recolor
//!     └── prepare_for_save() / apply_saved_settings()
//! ```
//!
//! Everything here runs on the caller thread; the ingest worker only ever
//! writes to the store.

pub mod model;
pub mod serie;
pub mod settings;

pub use model::{DiffEntry, SeriesModel};
pub use serie::SignalSerie;
pub use settings::{SettingsSnapshot, SignalSettings};
