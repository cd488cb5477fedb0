//! Per-signal serie state: the ordered tick handles plus display-facing
//! derived attributes.

use crate::color::Color;
use crate::types::{SerieId, Tick, TickId, ValueRange};

/// One (category, name) time series.
///
/// The serie does not own tick storage; it holds ordered handles into the
/// model's flat tick arena. Everything else here is derived while the
/// model streams the store back, or toggled by the visibility operations.
#[derive(Debug, Clone)]
pub struct SignalSerie {
    id: SerieId,
    category: String,
    name: String,
    ticks: Vec<TickId>,
    range: Option<ValueRange>,
    visible: bool,
    color: Color,
    has_zones: bool,
    constant: bool,
    preview: Option<TickId>,
    changed: bool,
}

impl SignalSerie {
    pub(crate) fn new(id: SerieId, category: String, name: String) -> Self {
        Self {
            id,
            category,
            name,
            ticks: Vec::new(),
            range: None,
            visible: false,
            color: Color::WHITE,
            has_zones: false,
            constant: true,
            preview: None,
            changed: false,
        }
    }

    pub fn id(&self) -> SerieId {
        self.id
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tick handles in ascending time order.
    pub fn tick_ids(&self) -> &[TickId] {
        &self.ticks
    }

    pub fn len(&self) -> usize {
        self.ticks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty()
    }

    /// Numeric value range over this serie's ticks, `None` for pure
    /// string-state series.
    pub fn range(&self) -> Option<ValueRange> {
        self.range
    }

    pub fn visible(&self) -> bool {
        self.visible
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// True when any tick is a zone start/end marker.
    pub fn has_zones(&self) -> bool {
        self.has_zones
    }

    /// True when every real tick carries the same value.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    /// Left tick of the current hover bracket, `None` while un-hovered or
    /// when the probe time fell outside this serie.
    pub fn preview(&self) -> Option<TickId> {
        self.preview
    }

    /// True when the last hover move changed this serie's preview value.
    pub fn just_changed(&self) -> bool {
        self.changed
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub(crate) fn set_hover(&mut self, preview: Option<TickId>, changed: bool) {
        self.preview = preview;
        self.changed = changed;
    }

    pub(crate) fn clear_hover(&mut self) {
        self.preview = None;
        self.changed = false;
    }

    /// Append a tick handle, folding its value into the derived state.
    pub(crate) fn push_tick(&mut self, id: TickId, tick: &Tick) {
        self.note_tick(tick);
        self.ticks.push(id);
    }

    /// Prepend a tick handle (virtual boundary padding at the front).
    pub(crate) fn prepend_tick(&mut self, id: TickId, tick: &Tick) {
        self.note_tick(tick);
        self.ticks.insert(0, id);
    }

    fn note_tick(&mut self, tick: &Tick) {
        if let Some(v) = tick.value.as_f64() {
            match self.range.as_mut() {
                Some(range) => range.expand(v),
                None => self.range = Some(ValueRange::point(v)),
            }
        }
        if tick.kind.is_zone() {
            self.has_zones = true;
        }
    }

    /// Constant/variable classification over the real ticks. Runs once
    /// after read-back, before boundary padding is synthesized.
    pub(crate) fn classify(&mut self, arena: &[Tick]) {
        let mut values = self.ticks.iter().map(|id| &arena[id.index()].value);
        self.constant = match values.next() {
            Some(first) => values.all(|v| v == first),
            None => true,
        };
    }
}
