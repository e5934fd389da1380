//! Optimistic local view of one content kind
//!
//! Local submissions go through three phases:
//! 1. `propose_*` applies the change immediately and returns a [`PendingId`]
//! 2. the caller issues the request and reports back with `confirm*` or
//!    `rollback`
//! 3. authoritative state arriving from push events or poll snapshots is
//!    merged at any point, before or after the request settles
//!
//! The server always wins. Provisional entries use negative ids, store ids
//! are positive, so the two never collide.

use crate::item::{SyncEvent, SyncItem};
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::debug;

/// Provisional and authoritative creates match when their timestamps are
/// within this many seconds of each other.
pub const DEFAULT_MATCH_TOLERANCE_SECS: i64 = 30;

/// Deleted ids remembered per timeline. Older tombstones are forgotten.
pub const DEFAULT_TOMBSTONE_CAPACITY: usize = 1_024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PendingId(u64);

impl PendingId {
    /// Temporary id given to the provisional entry of a create.
    fn provisional_id(self) -> i64 {
        -(self.0 as i64)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entry<T> {
    pub item: T,
    /// A local change to this entry is still in flight.
    pub pending: bool,
}

/// A rolled-back operation, to be surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub pending: PendingId,
    pub message: String,
}

/// What an authoritative item did to the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge {
    Inserted,
    Replaced,
    /// Adopted a matching provisional entry.
    Matched,
    Removed,
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub inserted: usize,
    pub replaced: usize,
    pub matched: usize,
    pub removed: usize,
}

#[derive(Debug, Clone)]
enum PendingOp<T> {
    Create {
        temp_id: i64,
        /// Store id of an authoritative item that took over the provisional
        /// entry before the request returned.
        adopted: Option<i64>,
    },
    Edit {
        id: i64,
        previous: String,
        superseded: bool,
    },
    Delete {
        item: T,
    },
}

#[derive(Debug, Clone)]
struct Pending<T> {
    op: PendingOp<T>,
    started_at: DateTime<Utc>,
}

/// Ids known to be deleted, so late events cannot resurrect them. Keeps the
/// newest `capacity` ids.
#[derive(Debug, Clone)]
pub(crate) struct Tombstones {
    ids: HashSet<i64>,
    order: VecDeque<i64>,
    capacity: usize,
}

impl Tombstones {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            ids: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub(crate) fn insert(&mut self, id: i64) {
        if !self.ids.insert(id) {
            return;
        }
        self.order.push_back(id);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.ids.remove(&oldest);
            }
        }
    }

    pub(crate) fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

impl Default for Tombstones {
    fn default() -> Self {
        Self::new(DEFAULT_TOMBSTONE_CAPACITY)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Created,
    Updated,
    Snapshot,
    Confirmed,
}

#[derive(Debug, Clone)]
pub struct Timeline<T> {
    /// Sorted by `(created_at, id)`.
    entries: Vec<Entry<T>>,
    pending: BTreeMap<PendingId, Pending<T>>,
    deleted: Tombstones,
    notices: Vec<Notice>,
    next_pending: u64,
    match_tolerance: Duration,
}

impl<T: SyncItem> Default for Timeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SyncItem> Timeline<T> {
    pub fn new() -> Self {
        Self::with_match_tolerance(Duration::seconds(DEFAULT_MATCH_TOLERANCE_SECS))
    }

    pub fn with_match_tolerance(match_tolerance: Duration) -> Self {
        Self {
            entries: Vec::new(),
            pending: BTreeMap::new(),
            deleted: Tombstones::default(),
            notices: Vec::new(),
            next_pending: 0,
            match_tolerance,
        }
    }

    pub fn with_tombstone_capacity(mut self, capacity: usize) -> Self {
        self.deleted = Tombstones::new(capacity);
        self
    }

    /// Deleted ids currently remembered.
    pub fn tombstone_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn entries(&self) -> &[Entry<T>] {
        &self.entries
    }

    pub fn items(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.iter().map(|entry| &entry.item)
    }

    pub fn get(&self, id: i64) -> Option<&T> {
        self.position(id).map(|idx| &self.entries[idx].item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Mutate an entry in place without changing its identity or position.
    pub fn modify(&mut self, id: i64, f: impl FnOnce(&mut T)) -> bool {
        match self.position(id) {
            Some(idx) => {
                f(&mut self.entries[idx].item);
                true
            }
            None => false,
        }
    }

    /// Mutate every entry in place.
    pub fn modify_each(&mut self, mut f: impl FnMut(&mut T)) {
        for entry in &mut self.entries {
            f(&mut entry.item);
        }
    }

    // ---- propose ----

    /// Show `item` immediately under a provisional id.
    pub fn propose_create(&mut self, mut item: T, now: DateTime<Utc>) -> PendingId {
        let pending = self.next_pending_id();
        let temp_id = pending.provisional_id();
        item.set_id(temp_id);
        self.insert_sorted(Entry {
            item,
            pending: true,
        });
        self.pending.insert(
            pending,
            Pending {
                op: PendingOp::Create {
                    temp_id,
                    adopted: None,
                },
                started_at: now,
            },
        );
        pending
    }

    /// Replace the content of a stored item locally. Returns `None` when the
    /// id is not shown or is still provisional.
    pub fn propose_edit(
        &mut self,
        id: i64,
        content: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Option<PendingId> {
        if id <= 0 {
            return None;
        }
        let idx = self.position(id)?;
        let entry = &mut self.entries[idx];
        let previous = entry.item.content().to_string();
        entry.item.set_content(content.into());
        entry.pending = true;

        let pending = self.next_pending_id();
        self.pending.insert(
            pending,
            Pending {
                op: PendingOp::Edit {
                    id,
                    previous,
                    superseded: false,
                },
                started_at: now,
            },
        );
        Some(pending)
    }

    /// Hide a stored item locally. Returns `None` when the id is not shown or
    /// is still provisional.
    pub fn propose_delete(&mut self, id: i64, now: DateTime<Utc>) -> Option<PendingId> {
        if id <= 0 {
            return None;
        }
        let idx = self.position(id)?;
        let entry = self.entries.remove(idx);

        let pending = self.next_pending_id();
        self.pending.insert(
            pending,
            Pending {
                op: PendingOp::Delete { item: entry.item },
                started_at: now,
            },
        );
        Some(pending)
    }

    // ---- settle ----

    /// Complete a create with the item the service returned.
    pub fn confirm_create(&mut self, pending: PendingId, item: T) -> bool {
        let temp_id = match self.pending.get(&pending) {
            Some(Pending {
                op: PendingOp::Create { temp_id, .. },
                ..
            }) => *temp_id,
            _ => return false,
        };
        self.pending.remove(&pending);

        if let Some(idx) = self.position(temp_id) {
            self.entries.remove(idx);
        }
        self.merge(item, Source::Confirmed);
        true
    }

    /// Complete an edit or delete.
    pub fn confirm(&mut self, pending: PendingId) -> bool {
        if matches!(
            self.pending.get(&pending),
            None | Some(Pending {
                op: PendingOp::Create { .. },
                ..
            })
        ) {
            return false;
        }

        match self.pending.remove(&pending).map(|p| p.op) {
            Some(PendingOp::Edit { id, .. }) => self.settle(id),
            Some(PendingOp::Delete { item }) => {
                let id = item.id();
                self.deleted.insert(id);
                if let Some(idx) = self.position(id) {
                    self.entries.remove(idx);
                }
            }
            _ => {}
        }
        true
    }

    /// Undo a failed operation and queue `reason` as a notice.
    pub fn rollback(&mut self, pending: PendingId, reason: impl Into<String>) -> bool {
        let Some(Pending { op, .. }) = self.pending.remove(&pending) else {
            return false;
        };

        match op {
            PendingOp::Create { temp_id, adopted } => {
                // An adopted create is known to exist server-side; keep it.
                if adopted.is_none() {
                    if let Some(idx) = self.position(temp_id) {
                        self.entries.remove(idx);
                    }
                }
            }
            PendingOp::Edit {
                id,
                previous,
                superseded,
            } => {
                if !superseded {
                    self.modify(id, |item| item.set_content(previous));
                }
                self.settle(id);
            }
            PendingOp::Delete { item } => {
                let id = item.id();
                if !self.deleted.contains(id) && self.position(id).is_none() {
                    self.insert_sorted(Entry {
                        item,
                        pending: false,
                    });
                }
            }
        }

        let message = reason.into();
        debug!(pending = pending.0, reason = %message, "rolled back local change");
        self.notices.push(Notice { pending, message });
        true
    }

    /// Roll back everything that has been in flight for at least `timeout`.
    pub fn expire_pending(&mut self, now: DateTime<Utc>, timeout: Duration) -> Vec<PendingId> {
        let expired: Vec<PendingId> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.started_at >= timeout)
            .map(|(id, _)| *id)
            .collect();
        for pending in &expired {
            self.rollback(*pending, "request timed out");
        }
        expired
    }

    // ---- merge ----

    pub fn apply(&mut self, event: SyncEvent<T>) -> Merge {
        match event {
            SyncEvent::Created(item) => self.merge(item, Source::Created),
            SyncEvent::Updated(item) => self.merge(item, Source::Updated),
            SyncEvent::Deleted(id) => self.remove_authoritative(id),
        }
    }

    /// Merge a full recent-items list.
    ///
    /// Confirmed entries inside the snapshot's `(created_at, id)` range that
    /// the snapshot lacks were deleted server-side and are dropped. An empty
    /// snapshot means the store holds nothing of this kind.
    pub fn apply_snapshot(&mut self, items: Vec<T>) -> SnapshotSummary {
        let mut summary = SnapshotSummary::default();

        let ids: HashSet<i64> = items.iter().map(|item| item.id()).collect();
        let range = items
            .iter()
            .map(sort_key)
            .fold(None, |acc: Option<((DateTime<Utc>, i64), (DateTime<Utc>, i64))>, key| {
                Some(match acc {
                    None => (key, key),
                    Some((lo, hi)) => (lo.min(key), hi.max(key)),
                })
            });

        let before = self.entries.len();
        self.entries.retain(|entry| {
            let id = entry.item.id();
            if entry.pending || id <= 0 || ids.contains(&id) {
                return true;
            }
            match range {
                Some((lo, hi)) => {
                    let key = sort_key(&entry.item);
                    key < lo || key > hi
                }
                None => false,
            }
        });
        summary.removed = before - self.entries.len();

        for item in items {
            match self.merge(item, Source::Snapshot) {
                Merge::Inserted => summary.inserted += 1,
                Merge::Replaced => summary.replaced += 1,
                Merge::Matched => summary.matched += 1,
                Merge::Removed | Merge::Ignored => {}
            }
        }
        summary
    }

    fn merge(&mut self, mut item: T, source: Source) -> Merge {
        let id = item.id();
        if self.deleted.contains(id) {
            return Merge::Ignored;
        }

        // Hidden by a local delete: refresh what a rollback would restore.
        if let Some(stashed) = self.pending.values_mut().find_map(|p| match &mut p.op {
            PendingOp::Delete { item: stashed } if stashed.id() == id => Some(stashed),
            _ => None,
        }) {
            if source != Source::Created {
                *stashed = item;
            }
            return Merge::Ignored;
        }

        if let Some(idx) = self.position(id) {
            // A create notification carries the original version; anything
            // already shown is at least as new.
            if source == Source::Created {
                return Merge::Ignored;
            }
            self.supersede_edits(id);
            item.keep_local(&self.entries[idx].item);
            self.entries[idx].item = item;
            self.reposition(idx);
            return Merge::Replaced;
        }

        if matches!(source, Source::Created | Source::Snapshot) {
            if let Some((pending, idx)) = self.match_provisional(&item) {
                if let Some(Pending {
                    op: PendingOp::Create { adopted, .. },
                    ..
                }) = self.pending.get_mut(&pending)
                {
                    *adopted = Some(id);
                }
                self.entries[idx] = Entry {
                    item,
                    pending: false,
                };
                self.reposition(idx);
                return Merge::Matched;
            }
        }

        self.insert_sorted(Entry {
            item,
            pending: false,
        });
        Merge::Inserted
    }

    fn remove_authoritative(&mut self, id: i64) -> Merge {
        self.deleted.insert(id);
        self.supersede_edits(id);
        match self.position(id) {
            Some(idx) => {
                self.entries.remove(idx);
                Merge::Removed
            }
            None => Merge::Ignored,
        }
    }

    /// Oldest unadopted provisional create with the same author and content
    /// within the match tolerance.
    fn match_provisional(&self, item: &T) -> Option<(PendingId, usize)> {
        self.pending.iter().find_map(|(pending, p)| {
            let PendingOp::Create {
                temp_id,
                adopted: None,
            } = p.op
            else {
                return None;
            };
            let idx = self.position(temp_id)?;
            let candidate = &self.entries[idx].item;
            let skew = (candidate.created_at() - item.created_at()).abs();
            (candidate.author() == item.author()
                && candidate.content() == item.content()
                && skew <= self.match_tolerance)
                .then_some((*pending, idx))
        })
    }

    fn supersede_edits(&mut self, target: i64) {
        for p in self.pending.values_mut() {
            if let PendingOp::Edit { id, superseded, .. } = &mut p.op {
                if *id == target {
                    *superseded = true;
                }
            }
        }
    }

    /// Clear the pending flag once nothing else is in flight for `id`.
    fn settle(&mut self, id: i64) {
        let busy = self
            .pending
            .values()
            .any(|p| matches!(&p.op, PendingOp::Edit { id: other, .. } if *other == id));
        if !busy {
            if let Some(idx) = self.position(id) {
                self.entries[idx].pending = false;
            }
        }
    }

    fn position(&self, id: i64) -> Option<usize> {
        self.entries.iter().position(|entry| entry.item.id() == id)
    }

    fn insert_sorted(&mut self, entry: Entry<T>) {
        let key = sort_key(&entry.item);
        let idx = self
            .entries
            .partition_point(|existing| sort_key(&existing.item) < key);
        self.entries.insert(idx, entry);
    }

    fn reposition(&mut self, idx: usize) {
        let entry = self.entries.remove(idx);
        self.insert_sorted(entry);
    }

    fn next_pending_id(&mut self) -> PendingId {
        self.next_pending += 1;
        PendingId(self.next_pending)
    }
}

fn sort_key<T: SyncItem>(item: &T) -> (DateTime<Utc>, i64) {
    (item.created_at(), item.id())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use content_model::ChatMessage;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap()
    }

    fn msg(id: i64, author: &str, content: &str, offset_secs: i64) -> ChatMessage {
        ChatMessage {
            id,
            author: author.to_string(),
            content: content.to_string(),
            created_at: t0() + Duration::seconds(offset_secs),
            edit_count: 0,
        }
    }

    fn ids(timeline: &Timeline<ChatMessage>) -> Vec<i64> {
        timeline.items().map(|m| m.id).collect()
    }

    #[test]
    fn test_entries_sorted_with_id_tiebreak() {
        let mut timeline = Timeline::new();
        timeline.apply(SyncEvent::Created(msg(7, "Kay", "b", 10)));
        timeline.apply(SyncEvent::Created(msg(3, "Kay", "a", 10)));
        timeline.apply(SyncEvent::Created(msg(1, "Kay", "first", 0)));
        assert_eq!(ids(&timeline), vec![1, 3, 7]);
    }

    #[test]
    fn test_provisional_ids_are_negative() {
        let mut timeline = Timeline::new();
        timeline.propose_create(msg(0, "Kay", "one", 0), t0());
        timeline.propose_create(msg(0, "Kay", "two", 1), t0());
        assert_eq!(ids(&timeline), vec![-1, -2]);
        assert!(timeline.entries().iter().all(|e| e.pending));
    }

    #[test]
    fn test_edit_of_provisional_refused() {
        let mut timeline = Timeline::new();
        timeline.propose_create(msg(0, "Kay", "one", 0), t0());
        assert!(timeline.propose_edit(-1, "changed", t0()).is_none());
        assert!(timeline.propose_delete(-1, t0()).is_none());
    }

    #[test]
    fn test_match_respects_tolerance() {
        let mut timeline = Timeline::with_match_tolerance(Duration::seconds(5));
        timeline.propose_create(msg(0, "Kay", "hello", 0), t0());

        let outcome = timeline.apply(SyncEvent::Created(msg(40, "Kay", "hello", 6)));
        assert_eq!(outcome, Merge::Inserted);
        assert_eq!(ids(&timeline), vec![-1, 40]);
    }

    #[test]
    fn test_confirm_rejects_wrong_phase() {
        let mut timeline = Timeline::new();
        let create = timeline.propose_create(msg(0, "Kay", "hello", 0), t0());
        assert!(!timeline.confirm(create));

        timeline.apply(SyncEvent::Created(msg(5, "Kay", "other", 1)));
        let edit = timeline.propose_edit(5, "other!", t0()).unwrap();
        assert!(!timeline.confirm_create(edit, msg(5, "Kay", "other!", 1)));
        assert!(timeline.confirm(edit));
        assert!(!timeline.confirm(edit));
    }

    #[test]
    fn test_expire_pending_rolls_back_old_requests() {
        let mut timeline = Timeline::new();
        let stale = timeline.propose_create(msg(0, "Kay", "lost", 0), t0());
        let fresh = timeline.propose_create(msg(0, "Kay", "recent", 20), t0() + Duration::seconds(20));

        let expired = timeline.expire_pending(t0() + Duration::seconds(25), Duration::seconds(10));
        assert_eq!(expired, vec![stale]);
        assert_eq!(ids(&timeline), vec![fresh.provisional_id()]);

        let notices = timeline.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "request timed out");
        assert!(timeline.take_notices().is_empty());
    }

    #[test]
    fn test_modify_keeps_position() {
        let mut timeline = Timeline::new();
        timeline.apply(SyncEvent::Created(msg(1, "Kay", "a", 0)));
        assert!(timeline.modify(1, |m| m.content = "b".to_string()));
        assert!(!timeline.modify(2, |_| {}));
        assert_eq!(timeline.get(1).map(|m| m.content.as_str()), Some("b"));
    }

    #[test]
    fn test_tombstones_keep_only_the_newest() {
        let mut timeline = Timeline::new().with_tombstone_capacity(2);
        for id in 1..=3 {
            timeline.apply(SyncEvent::Created(msg(id, "Kay", "x", id)));
            timeline.apply(SyncEvent::Deleted(id));
        }
        assert_eq!(timeline.tombstone_count(), 2);

        // Ids 2 and 3 stay dead; 1 has been forgotten.
        assert_eq!(timeline.apply(SyncEvent::Created(msg(3, "Kay", "x", 3))), Merge::Ignored);
        assert_eq!(timeline.apply(SyncEvent::Created(msg(2, "Kay", "x", 2))), Merge::Ignored);
        assert_eq!(timeline.apply(SyncEvent::Created(msg(1, "Kay", "x", 1))), Merge::Inserted);
    }

    #[test]
    fn test_tombstone_insert_is_idempotent() {
        let mut tombstones = Tombstones::new(0);
        tombstones.insert(7);
        tombstones.insert(7);
        assert_eq!(tombstones.len(), 1);
        assert!(tombstones.contains(7));
        tombstones.insert(8);
        assert!(!tombstones.contains(7));
    }
}
