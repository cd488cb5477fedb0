//! The reconstructed, query-ready series model.

use std::collections::BTreeMap;

use crate::color;
use crate::config::EngineConfig;
use crate::groups::GroupSet;
use crate::series::serie::SignalSerie;
use crate::series::settings::{SettingsSnapshot, SignalSettings};
use crate::store::{SignalStore, TickRow};
use crate::types::{EpochTime, SerieId, SignalTag, SourceFile, Tick, TickId, TickKind, TickValue, ValueRange};

/// One entry of the diff result: a serie whose values at the two marks
/// differ. Resolve the tick handles through [`SeriesModel::tick`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiffEntry {
    pub serie: SerieId,
    pub first: TickId,
    pub second: TickId,
}

/// One diff cursor: the probe time plus the per-serie bracket snapshot
/// taken when it was set.
#[derive(Debug, Default, Clone)]
struct DiffMark {
    time: Option<EpochTime>,
    samples: Vec<(SerieId, TickId)>,
}

/// In-memory model of every signal in the project.
///
/// All tick storage lives in one flat arena owned here; series and groups
/// refer into it by handle. The model is rebuilt from the store by
/// [`finalize`](Self::finalize) and mutated only on the caller thread;
/// the ingest worker never touches it.
pub struct SeriesModel {
    config: EngineConfig,
    ticks: Vec<Tick>,
    series: Vec<SignalSerie>,
    by_name: BTreeMap<String, BTreeMap<String, SerieId>>,
    sources: Vec<SourceFile>,
    tags: Vec<SignalTag>,
    time_range: Option<ValueRange>,
    visible_count: usize,
    hovered_time: Option<EpochTime>,
    first_mark: DiffMark,
    second_mark: DiffMark,
    diff_result: Vec<DiffEntry>,
    groups: GroupSet,
}

impl Default for SeriesModel {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl SeriesModel {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ticks: Vec::new(),
            series: Vec::new(),
            by_name: BTreeMap::new(),
            sources: Vec::new(),
            tags: Vec::new(),
            time_range: None,
            visible_count: 0,
            hovered_time: None,
            first_mark: DiffMark::default(),
            second_mark: DiffMark::default(),
            diff_result: Vec::new(),
            groups: GroupSet::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Drop every entity: arenas, lookup map, tags, sources, hover/diff
    /// state and group membership. Used on new/load/close project and at
    /// the start of every ingest run.
    pub fn clear(&mut self) {
        self.ticks.clear();
        self.series.clear();
        self.by_name.clear();
        self.sources.clear();
        self.tags.clear();
        self.time_range = None;
        self.visible_count = 0;
        self.hovered_time = None;
        self.first_mark = DiffMark::default();
        self.second_mark = DiffMark::default();
        self.diff_result.clear();
        self.groups.clear();
    }

    // ------------------------------------------------------------------
    // Reconstruction
    // ------------------------------------------------------------------

    /// Rebuild the whole model by streaming the store back.
    ///
    /// Ticks arrive in ascending epoch order and are appended as-is; after
    /// the streams are drained every serie is classified and padded with
    /// virtual boundary ticks so all series share the global time extent.
    /// Series come back hidden; replaying saved settings is a separate
    /// step.
    pub fn finalize(&mut self, store: &SignalStore) -> bool {
        self.clear();

        let mut ok = store.for_each_source(|source| self.sources.push(source));
        ok &= store.for_each_tick(|row| self.append_row(row));
        ok &= store.for_each_tag(|tag| self.tags.push(tag));

        for serie in &mut self.series {
            serie.classify(&self.ticks);
        }
        if let Some(extent) = self.time_range {
            for idx in 0..self.series.len() {
                self.pad_serie(idx, extent);
            }
        }

        log::info!(
            "Model finalized: {} series, {} ticks, {} tags from {} files",
            self.series.len(),
            self.ticks.len(),
            self.tags.len(),
            self.sources.len()
        );
        ok
    }

    fn append_row(&mut self, row: TickRow) {
        let value = if let Some(v) = row.value {
            TickValue::Value(v)
        } else if let Some(s) = row.string {
            TickValue::Status(s)
        } else {
            log::warn!("Skipping payload-less tick for {}/{}", row.category, row.name);
            return;
        };

        let serie_id = self.ensure_serie(&row.category, &row.name);
        let tick = Tick {
            serie: serie_id,
            source: Some(row.source_id),
            time: row.time,
            value,
            kind: TickKind::from_db_code(row.status),
            desc: row.desc,
        };

        match self.time_range.as_mut() {
            Some(range) => range.expand(tick.time),
            None => self.time_range = Some(ValueRange::point(tick.time)),
        }

        let id = TickId(self.ticks.len());
        let serie = &mut self.series[serie_id.index()];
        if let Some(&last) = serie.tick_ids().last() {
            // Read-back order is the contract; a regression here means the
            // store query or the arena got corrupted.
            debug_assert!(
                self.ticks[last.index()].time <= tick.time,
                "tick time regression in {}/{}",
                row.category,
                row.name
            );
        }
        serie.push_tick(id, &tick);
        self.ticks.push(tick);
    }

    fn ensure_serie(&mut self, category: &str, name: &str) -> SerieId {
        if let Some(id) = self.by_name.get(category).and_then(|names| names.get(name)) {
            return *id;
        }
        let id = SerieId(self.series.len());
        self.series
            .push(SignalSerie::new(id, category.to_string(), name.to_string()));
        self.by_name
            .entry(category.to_string())
            .or_default()
            .insert(name.to_string(), id);
        id
    }

    /// Synthesize virtual boundary ticks so the serie spans `extent`.
    fn pad_serie(&mut self, idx: usize, extent: ValueRange) {
        let Self {
            ticks,
            series,
            config,
            ..
        } = self;
        let serie = &mut series[idx];
        let (Some(&first), Some(&last)) = (serie.tick_ids().first(), serie.tick_ids().last())
        else {
            return;
        };

        if ticks[first.index()].time > extent.min {
            let value = boundary_value(ticks, first, config.predefined_zero);
            let id = TickId(ticks.len());
            ticks.push(Tick {
                serie: serie.id(),
                source: None,
                time: extent.min,
                value,
                kind: TickKind::Virtual,
                desc: None,
            });
            serie.prepend_tick(id, &ticks[id.index()]);
        }
        if ticks[last.index()].time < extent.max {
            let value = boundary_value(ticks, last, config.predefined_zero);
            let id = TickId(ticks.len());
            ticks.push(Tick {
                serie: serie.id(),
                source: None,
                time: extent.max,
                value,
                kind: TickKind::Virtual,
                desc: None,
            });
            serie.push_tick(id, &ticks[id.index()]);
        }
    }

    // ------------------------------------------------------------------
    // Read-only accessors (presentation boundary)
    // ------------------------------------------------------------------

    /// category -> name -> serie handle, sorted for stable display order.
    pub fn series_map(&self) -> &BTreeMap<String, BTreeMap<String, SerieId>> {
        &self.by_name
    }

    pub fn serie(&self, id: SerieId) -> Option<&SignalSerie> {
        self.series.get(id.index())
    }

    pub fn serie_id(&self, category: &str, name: &str) -> Option<SerieId> {
        self.by_name
            .get(category)
            .and_then(|names| names.get(name))
            .copied()
    }

    pub fn serie_by_name(&self, category: &str, name: &str) -> Option<&SignalSerie> {
        self.serie_id(category, name).map(|id| &self.series[id.index()])
    }

    pub fn tick(&self, id: TickId) -> Option<&Tick> {
        self.ticks.get(id.index())
    }

    /// Global [min, max] time extent over all ticks, `None` while empty.
    pub fn time_range(&self) -> Option<ValueRange> {
        self.time_range
    }

    pub fn sources(&self) -> &[SourceFile] {
        &self.sources
    }

    pub fn tags(&self) -> &[SignalTag] {
        &self.tags
    }

    pub fn visible_count(&self) -> usize {
        self.visible_count
    }

    pub fn hovered_time(&self) -> Option<EpochTime> {
        self.hovered_time
    }

    pub fn groups(&self) -> &GroupSet {
        &self.groups
    }

    pub fn diff_result(&self) -> &[DiffEntry] {
        &self.diff_result
    }

    // ------------------------------------------------------------------
    // Temporal queries
    // ------------------------------------------------------------------

    /// Resolve the hover bracket for every visible serie at probe time `t`
    /// and flag the series whose preview value just changed relative to
    /// the previous hover.
    pub fn set_hovered_time(&mut self, t: EpochTime) {
        self.hovered_time = Some(t);
        let Self { ticks, series, .. } = self;
        for serie in series.iter_mut() {
            if !serie.visible() {
                serie.clear_hover();
                continue;
            }
            let preview = bracket(ticks, serie.tick_ids(), t);
            let changed = match (serie.preview(), preview) {
                (Some(old), Some(new)) => {
                    ticks[old.index()].value != ticks[new.index()].value
                }
                _ => false,
            };
            serie.set_hover(preview, changed);
        }
    }

    /// Place the first diff cursor and snapshot every visible serie's
    /// bracket at `t`.
    pub fn set_first_diff_mark(&mut self, t: EpochTime) {
        self.first_mark = self.make_mark(t);
    }

    /// Place the second diff cursor.
    pub fn set_second_diff_mark(&mut self, t: EpochTime) {
        self.second_mark = self.make_mark(t);
    }

    pub fn first_diff_mark(&self) -> Option<EpochTime> {
        self.first_mark.time
    }

    pub fn second_diff_mark(&self) -> Option<EpochTime> {
        self.second_mark.time
    }

    fn make_mark(&self, t: EpochTime) -> DiffMark {
        let mut samples = Vec::new();
        for serie in &self.series {
            if !serie.visible() {
                continue;
            }
            if let Some(tick) = bracket(&self.ticks, serie.tick_ids(), t) {
                samples.push((serie.id(), tick));
            }
        }
        DiffMark {
            time: Some(t),
            samples,
        }
    }

    /// Pair the two mark snapshots by serie and keep the pairs whose
    /// values differ exactly. Both marks must be set.
    ///
    /// The snapshots are taken over the same visible set in the same
    /// order, so a serie mismatch while zipping indicates a logic bug, not
    /// a data condition.
    pub fn compute_diff_result(&mut self) {
        self.diff_result.clear();
        if self.first_mark.time.is_none() || self.second_mark.time.is_none() {
            return;
        }
        for (&(id_a, tick_a), &(id_b, tick_b)) in
            self.first_mark.samples.iter().zip(&self.second_mark.samples)
        {
            if id_a != id_b {
                log::error!(
                    "Diff snapshots disagree on serie order: {:?} vs {:?}",
                    id_a,
                    id_b
                );
                debug_assert!(false, "diff mark snapshots out of sync");
                continue;
            }
            let (Some(a), Some(b)) = (self.ticks.get(tick_a.index()), self.ticks.get(tick_b.index()))
            else {
                continue;
            };
            if a.value != b.value {
                self.diff_result.push(DiffEntry {
                    serie: id_a,
                    first: tick_a,
                    second: tick_b,
                });
            }
        }
    }

    // ------------------------------------------------------------------
    // Visibility and grouping
    // ------------------------------------------------------------------

    /// Toggle a signal's visibility. Showing adds it to the default group;
    /// hiding removes it from whichever group holds it. With auto-color
    /// enabled every visibility change re-spreads the rainbow palette over
    /// the visible set. Unknown signals no-op.
    pub fn show_hide_signal(&mut self, category: &str, name: &str, visible: bool) {
        let Some(id) = self.serie_id(category, name) else {
            return;
        };
        if self.series[id.index()].visible() == visible {
            return;
        }
        self.series[id.index()].set_visible(visible);
        if visible {
            self.visible_count += 1;
            let range = self.series[id.index()].range();
            self.groups.add_serie_to_group(id, range, 0);
        } else {
            self.visible_count = self.visible_count.saturating_sub(1);
            self.series[id.index()].clear_hover();
            self.groups.remove_serie(id);
        }
        if self.config.auto_color {
            self.recolor_visible();
        }
    }

    /// Move a visible signal into the group at `group`. Unknown signals or
    /// targets no-op.
    pub fn move_signal_to_group(&mut self, category: &str, name: &str, group: usize) {
        if let Some(id) = self.serie_id(category, name) {
            self.groups.move_serie_to_group(id, group);
        }
    }

    /// Rainbow the visible series in display (map) order.
    fn recolor_visible(&mut self) {
        let visible: Vec<SerieId> = self
            .by_name
            .values()
            .flat_map(|names| names.values())
            .copied()
            .filter(|id| self.series[id.index()].visible())
            .collect();
        let count = visible.len();
        for (ordinal, id) in visible.into_iter().enumerate() {
            let color = color::rainbow(
                ordinal,
                count,
                self.config.palette_saturation,
                self.config.palette_value,
            );
            self.series[id.index()].set_color(color);
        }
    }

    // ------------------------------------------------------------------
    // Settings persistence
    // ------------------------------------------------------------------

    /// Serialize the visible series' display settings (visibility, color,
    /// group id) as the JSON blob stored in the project database.
    pub fn prepare_for_save(&self) -> String {
        let mut snapshot = SettingsSnapshot::default();
        for (category, names) in &self.by_name {
            for (name, &id) in names {
                let serie = &self.series[id.index()];
                if !serie.visible() {
                    continue;
                }
                snapshot
                    .signals
                    .entry(category.clone())
                    .or_default()
                    .insert(
                        name.clone(),
                        SignalSettings {
                            visible: true,
                            color: serie.color(),
                            group: self.groups.group_id_of(id),
                        },
                    );
            }
        }
        match serde_json::to_string(&snapshot) {
            Ok(json) => json,
            Err(e) => {
                log::error!("Failed to serialize display settings: {}", e);
                String::new()
            }
        }
    }

    /// Replay a saved settings blob: re-show the recorded signals, restore
    /// their colors and group assignment. Signals that no longer exist are
    /// skipped; a malformed blob logs a warning and changes nothing.
    pub fn apply_saved_settings(&mut self, json: &str) {
        let snapshot: SettingsSnapshot = match serde_json::from_str(json) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Ignoring unreadable display settings: {}", e);
                return;
            }
        };

        for (category, names) in &snapshot.signals {
            for (name, settings) in names {
                if !settings.visible {
                    continue;
                }
                let Some(id) = self.serie_id(category, name) else {
                    continue;
                };
                let serie = &mut self.series[id.index()];
                serie.set_color(settings.color);
                if !serie.visible() {
                    serie.set_visible(true);
                    self.visible_count += 1;
                }
                if self.groups.group_id_of(id) == self.groups.len() {
                    let range = self.series[id.index()].range();
                    self.groups.add_serie_to_group_id(id, range, settings.group);
                }
            }
        }
        self.groups.remove_empty_groups();
        if self.config.auto_color {
            self.recolor_visible();
        }
    }
}

/// Boundary padding value: the configured predefined zero for numeric
/// edges, otherwise a copy of the edge tick's value.
fn boundary_value(ticks: &[Tick], edge: TickId, predefined_zero: Option<f64>) -> TickValue {
    let edge = &ticks[edge.index()];
    match (&edge.value, predefined_zero) {
        (TickValue::Value(_), Some(zero)) => TickValue::Value(zero),
        (value, _) => value.clone(),
    }
}

/// Find the bracketing adjacent pair (a, b) with a.time <= t <= b.time by
/// linear scan and return `a`. Probe times outside the serie produce
/// `None`.
fn bracket(ticks: &[Tick], ids: &[TickId], t: EpochTime) -> Option<TickId> {
    match ids {
        [] => None,
        [only] => (ticks[only.index()].time == t).then_some(*only),
        _ => {
            for pair in ids.windows(2) {
                let a = &ticks[pair[0].index()];
                let b = &ticks[pair[1].index()];
                if a.time <= t && t <= b.time {
                    return Some(pair[0]);
                }
            }
            None
        }
    }
}
