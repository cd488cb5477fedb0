//! Persisted per-signal display settings.
//!
//! The snapshot is sparse: only visible series are recorded, keyed by
//! category then name. It serializes to JSON and is stored as the opaque
//! settings blob inside the project database.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::Color;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// category -> name -> settings
    pub signals: BTreeMap<String, BTreeMap<String, SignalSettings>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSettings {
    pub visible: bool,
    pub color: Color,
    pub group: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_json_round_trip() {
        let mut snapshot = SettingsSnapshot::default();
        snapshot.signals.entry("cpu".to_string()).or_default().insert(
            "usage".to_string(),
            SignalSettings {
                visible: true,
                color: Color::rgba(10, 20, 30, 255),
                group: 2,
            },
        );

        let json = serde_json::to_string(&snapshot).unwrap();
        let back: SettingsSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.signals["cpu"]["usage"].group, 2);
        assert_eq!(back.signals["cpu"]["usage"].color, Color::rgba(10, 20, 30, 255));
        assert!(back.signals["cpu"]["usage"].visible);
    }
}
