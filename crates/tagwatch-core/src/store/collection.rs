// ── Reactive tag collection ──
//
// Insertion-ordered storage keyed by EPC with push-based change
// notification via `watch` channels. Not internally synchronized;
// `TagStore` owns it behind its session lock.
//
// Between `defer` and `flush` mutations only mark the collection dirty,
// so a whole read batch costs one snapshot rebuild.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::TagObservation;
use crate::stream::TagSnapshot;

/// One observation per EPC, in first-seen order.
///
/// Every published change bumps a version counter and rebuilds the
/// snapshot that subscribers receive.
pub(crate) struct TagCollection {
    by_epc: IndexMap<String, Arc<TagObservation>>,

    /// Version counter, bumped on every published change.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on publish for efficient subscription.
    snapshot: watch::Sender<TagSnapshot>,

    deferred: bool,
    dirty: bool,
}

impl TagCollection {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));

        Self {
            by_epc: IndexMap::new(),
            version,
            snapshot,
            deferred: false,
            dirty: false,
        }
    }

    /// Insert or replace an observation, returning the stored value.
    pub(crate) fn upsert(&mut self, tag: TagObservation) -> Arc<TagObservation> {
        let tag = Arc::new(tag);
        self.by_epc.insert(tag.epc.clone(), Arc::clone(&tag));
        self.changed();
        tag
    }

    /// Apply `f` to a copy of the stored observation and store the result.
    pub(crate) fn update<F>(&mut self, epc: &str, f: F) -> Option<Arc<TagObservation>>
    where
        F: FnOnce(&mut TagObservation),
    {
        let slot = self.by_epc.get_mut(epc)?;
        let mut tag = TagObservation::clone(slot);
        f(&mut tag);
        let tag = Arc::new(tag);
        *slot = Arc::clone(&tag);
        self.changed();
        Some(tag)
    }

    pub(crate) fn get(&self, epc: &str) -> Option<Arc<TagObservation>> {
        self.by_epc.get(epc).cloned()
    }

    pub(crate) fn contains(&self, epc: &str) -> bool {
        self.by_epc.contains_key(epc)
    }

    /// Get the current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> TagSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes via a `watch::Receiver`.
    pub(crate) fn subscribe(&self) -> watch::Receiver<TagSnapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Remove all observations.
    pub(crate) fn clear(&mut self) {
        if self.by_epc.is_empty() {
            return;
        }
        self.by_epc.clear();
        self.changed();
    }

    pub(crate) fn len(&self) -> usize {
        self.by_epc.len()
    }

    /// Hold back publishing until [`flush`](Self::flush).
    pub(crate) fn defer(&mut self) {
        self.deferred = true;
    }

    /// Publish everything changed since [`defer`](Self::defer), once.
    pub(crate) fn flush(&mut self) {
        self.deferred = false;
        if self.dirty {
            self.publish();
        }
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn changed(&mut self) {
        if self.deferred {
            self.dirty = true;
        } else {
            self.publish();
        }
    }

    fn publish(&mut self) {
        self.dirty = false;
        self.rebuild_snapshot();
        self.bump_version();
    }

    /// Collect all values into a snapshot vec and broadcast to subscribers.
    fn rebuild_snapshot(&self) {
        let values: Vec<Arc<TagObservation>> = self.by_epc.values().cloned().collect();
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }

    fn bump_version(&self) {
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use tokio::time::Instant;

    use super::*;
    use crate::model::Registration;

    fn tag(epc: &str, rssi: i32) -> TagObservation {
        TagObservation {
            epc: epc.into(),
            rssi,
            last_seen: Instant::now(),
            seen_at: Utc::now(),
            selected: false,
            registration: Registration::Unregistered,
        }
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut tags = TagCollection::new();
        tags.upsert(tag("E1", -50));
        tags.upsert(tag("E2", -60));
        tags.upsert(tag("E1", -40));

        assert_eq!(tags.len(), 2);
        let snap = tags.snapshot();
        assert_eq!(snap[0].epc, "E1");
        assert_eq!(snap[0].rssi, -40);
        assert_eq!(tags.version(), 3);
    }

    #[test]
    fn update_missing_is_none() {
        let mut tags = TagCollection::new();
        assert!(tags.update("E1", |t| t.rssi = -10).is_none());
        assert_eq!(tags.version(), 0);
    }

    #[test]
    fn subscribers_see_mutations() {
        let mut tags = TagCollection::new();
        let mut rx = tags.subscribe();
        tags.upsert(tag("E1", -50));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);

        tags.clear();
        assert!(rx.borrow_and_update().is_empty());
    }

    #[test]
    fn deferred_changes_publish_once() {
        let mut tags = TagCollection::new();
        let mut rx = tags.subscribe();

        tags.defer();
        tags.upsert(tag("E1", -50));
        tags.upsert(tag("E2", -60));
        tags.update("E1", |t| t.rssi = -45);
        assert!(!rx.has_changed().unwrap());
        assert_eq!(tags.version(), 0);

        tags.flush();
        assert_eq!(tags.version(), 1);
        let snap = rx.borrow_and_update().clone();
        assert_eq!(snap.len(), 2);
        assert_eq!(snap[0].rssi, -45);

        tags.defer();
        tags.flush();
        assert_eq!(tags.version(), 1);
        assert!(!rx.has_changed().unwrap());
    }
}
