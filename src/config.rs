//! Engine configuration with environment overrides.

use std::env;

/// Tunables for the series model. The embedding application usually builds
/// this once and hands it to [`crate::series::SeriesModel::new`].
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Value given to virtual boundary ticks; when `None`, padding copies
    /// the nearest real edge value of the serie.
    pub predefined_zero: Option<f64>,
    /// Re-assign rainbow colors to visible series on every visibility
    /// change.
    pub auto_color: bool,
    /// HSV saturation of the rainbow palette, clamped to [0,1].
    pub palette_saturation: f32,
    /// HSV value of the rainbow palette, clamped to [0,1].
    pub palette_value: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            predefined_zero: None,
            auto_color: true,
            palette_saturation: 0.85,
            palette_value: 0.92,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `SIGLOG_*` environment variables. Invalid
    /// values keep the default and log a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = env::var("SIGLOG_PREDEFINED_ZERO") {
            match raw.parse::<f64>() {
                Ok(v) => config.predefined_zero = Some(v),
                Err(_) => log::warn!("Invalid SIGLOG_PREDEFINED_ZERO '{}', ignoring", raw),
            }
        }

        if let Ok(raw) = env::var("SIGLOG_AUTO_COLOR") {
            match raw.to_lowercase().parse::<bool>() {
                Ok(v) => config.auto_color = v,
                Err(_) => log::warn!("Invalid SIGLOG_AUTO_COLOR '{}', keeping default", raw),
            }
        }

        if let Ok(raw) = env::var("SIGLOG_PALETTE_SATURATION") {
            match raw.parse::<f32>() {
                Ok(v) if (0.0..=1.0).contains(&v) => config.palette_saturation = v,
                _ => log::warn!("Invalid SIGLOG_PALETTE_SATURATION '{}', keeping default", raw),
            }
        }

        if let Ok(raw) = env::var("SIGLOG_PALETTE_VALUE") {
            match raw.parse::<f32>() {
                Ok(v) if (0.0..=1.0).contains(&v) => config.palette_value = v,
                _ => log::warn!("Invalid SIGLOG_PALETTE_VALUE '{}', keeping default", raw),
            }
        }

        config
    }
}
