//! Ordered display buckets for visible signal series.
//!
//! Groups are identified by their position in the list, which doubles as
//! the persisted group id. The list always holds at least two groups: the
//! first is the default bucket newly shown series land in, the last is an
//! always-empty placeholder the user drops a serie on to open a new group.
//! Interior groups that run empty are erased and the remaining ids
//! renumber densely by virtue of being positions.

use crate::types::{SerieId, ValueRange};

/// One display bucket. Members share a single aggregate value axis.
#[derive(Debug, Default, Clone)]
pub struct GraphGroup {
    members: Vec<GroupMember>,
    range: Option<ValueRange>,
}

#[derive(Debug, Clone, Copy)]
struct GroupMember {
    serie: SerieId,
    /// Value range captured when the serie was added; series are immutable
    /// after finalize so this never goes stale.
    range: Option<ValueRange>,
}

impl GraphGroup {
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, serie: SerieId) -> bool {
        self.members.iter().any(|m| m.serie == serie)
    }

    /// Member series in insertion order.
    pub fn serie_ids(&self) -> impl Iterator<Item = SerieId> + '_ {
        self.members.iter().map(|m| m.serie)
    }

    /// Union of the members' value ranges, `None` while empty or when no
    /// member carries a numeric range.
    pub fn range(&self) -> Option<ValueRange> {
        self.range
    }

    fn recompute_range(&mut self) {
        let mut range: Option<ValueRange> = None;
        for member in &self.members {
            let Some(r) = member.range else { continue };
            match range.as_mut() {
                Some(acc) => acc.merge(r),
                None => range = Some(r),
            }
        }
        self.range = range;
    }
}

/// The ordered group list plus the membership operations on it.
#[derive(Debug, Clone)]
pub struct GroupSet {
    groups: Vec<GraphGroup>,
}

impl Default for GroupSet {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupSet {
    /// Fresh set: the default group plus the trailing placeholder.
    pub fn new() -> Self {
        Self {
            groups: vec![GraphGroup::default(), GraphGroup::default()],
        }
    }

    /// Drop all membership, back to the two seed groups.
    pub fn clear(&mut self) {
        self.groups.clear();
        self.groups.push(GraphGroup::default());
        self.groups.push(GraphGroup::default());
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        // Never true: the seed groups are permanent.
        self.groups.is_empty()
    }

    pub fn groups(&self) -> &[GraphGroup] {
        &self.groups
    }

    pub fn group(&self, id: usize) -> Option<&GraphGroup> {
        self.groups.get(id)
    }

    /// Index of the group holding `serie`, or `len()` as the not-found
    /// sentinel (one past the end, never a valid id).
    pub fn group_id_of(&self, serie: SerieId) -> usize {
        self.find_serie(serie).unwrap_or(self.groups.len())
    }

    /// Add `serie` to the group at `group`. Adding to the trailing
    /// placeholder first appends a fresh placeholder, so there is always
    /// an empty last slot to drop onto. Out-of-range targets no-op.
    pub fn add_serie_to_group(&mut self, serie: SerieId, range: Option<ValueRange>, group: usize) {
        if group >= self.groups.len() {
            return;
        }
        if group + 1 == self.groups.len() {
            self.groups.push(GraphGroup::default());
        }
        self.groups[group].members.push(GroupMember { serie, range });
        self.groups[group].recompute_range();
    }

    /// Add `serie` to the group with persisted id `id`, materializing
    /// empty groups until index `id + 1` exists. This is how saved
    /// settings restore a group id larger than the current list.
    pub fn add_serie_to_group_id(&mut self, serie: SerieId, range: Option<ValueRange>, id: usize) {
        while self.groups.len() <= id + 1 {
            self.groups.push(GraphGroup::default());
        }
        self.add_serie_to_group(serie, range, id);
    }

    /// Remove `serie` from whichever group holds it, then erase any
    /// interior group that ran empty. Returns false when the serie is in
    /// no group.
    pub fn remove_serie(&mut self, serie: SerieId) -> bool {
        let Some(group) = self.find_serie(serie) else {
            return false;
        };
        self.remove_from(serie, group);
        self.remove_empty_groups();
        true
    }

    /// Move `serie` into the group at `to`: remove, re-add with the same
    /// captured range, then compact. Unknown serie or target no-ops.
    pub fn move_serie_to_group(&mut self, serie: SerieId, to: usize) {
        if to >= self.groups.len() {
            return;
        }
        let Some(from) = self.find_serie(serie) else {
            return;
        };
        let member = self.remove_from(serie, from);
        if let Some(member) = member {
            self.add_serie_to_group(serie, member.range, to);
        }
        self.remove_empty_groups();
    }

    /// Erase empty interior groups. The first (default) and last
    /// (placeholder) groups survive even when empty, keeping the list at
    /// two or more entries.
    pub fn remove_empty_groups(&mut self) {
        if self.groups.len() <= 2 {
            return;
        }
        let empties: Vec<usize> = (1..self.groups.len() - 1)
            .filter(|&i| self.groups[i].is_empty())
            .collect();
        // Reverse order so earlier removals don't shift pending indices.
        for i in empties.into_iter().rev() {
            self.groups.remove(i);
        }
    }

    fn find_serie(&self, serie: SerieId) -> Option<usize> {
        self.groups.iter().position(|g| g.contains(serie))
    }

    fn remove_from(&mut self, serie: SerieId, group: usize) -> Option<GroupMember> {
        let members = &mut self.groups[group].members;
        let pos = members.iter().position(|m| m.serie == serie)?;
        let member = members.remove(pos);
        self.groups[group].recompute_range();
        Some(member)
    }
}
