// ── Tag store ──
//
// Session state for one scan: the deduplicated tag collection, the
// per-EPC decision cache, reads waiting on an in-flight lookup, the
// scan policy, and the operator's selection. Everything lives under one
// lock so a policy change clears tags and decisions atomically.
//
// Each clear bumps an epoch. Lookups carry the epoch they started in
// and their results are dropped if it has moved on.

mod collection;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::Instant;

use crate::model::{ClassificationDecision, RawRead, ScanPolicy, TagObservation, Workflow};
use crate::signal::RSSI_FLOOR;
use crate::stream::{TagSnapshot, TagStream};

use collection::TagCollection;

/// What happened to one raw read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Observed {
    /// Filtered out by the workflow before classification.
    Ignored,
    /// A cached decision rejects this EPC.
    Rejected,
    /// An accepted tag was refreshed in place.
    Updated,
    /// A lookup for this EPC is already in flight; the read was queued.
    Pending,
    /// First sighting this session: classify under `policy`, then call
    /// [`TagStore::apply_decision`] with `epoch`.
    NeedsLookup { epoch: u64, policy: ScanPolicy },
}

/// Result of applying a classification decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Applied {
    /// The session was cleared while the lookup ran.
    Stale,
    Rejected,
    /// The tag entered the store.
    Inserted(Arc<TagObservation>),
}

#[derive(Debug, Clone, Copy)]
struct PendingRead {
    rssi: i32,
    at: Instant,
    wall: DateTime<Utc>,
}

struct SessionState {
    tags: TagCollection,
    decisions: HashMap<String, ClassificationDecision>,
    pending: HashMap<String, PendingRead>,
    epoch: u64,
    policy: ScanPolicy,
    selected: Option<String>,
}

/// Deduplicating, reactive store of tags seen in the current session.
pub struct TagStore {
    state: Mutex<SessionState>,
    selected: watch::Sender<Option<Arc<TagObservation>>>,
}

impl TagStore {
    pub(crate) fn new(policy: ScanPolicy) -> Self {
        let (selected, _) = watch::channel(None);
        Self {
            state: Mutex::new(SessionState {
                tags: TagCollection::new(),
                decisions: HashMap::new(),
                pending: HashMap::new(),
                epoch: 0,
                selected: policy.workflow.pinned_epc().map(str::to_string),
                policy,
            }),
            selected,
        }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Current snapshot of every tag, in first-seen order.
    pub fn snapshot(&self) -> TagSnapshot {
        self.lock().tags.snapshot()
    }

    /// Subscribe to store changes.
    pub fn subscribe(&self) -> TagStream {
        TagStream::new(self.lock().tags.subscribe())
    }

    pub fn get(&self, epc: &str) -> Option<Arc<TagObservation>> {
        self.lock().tags.get(epc)
    }

    pub fn len(&self) -> usize {
        self.lock().tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mutation counter of the tag collection.
    pub fn version(&self) -> u64 {
        self.lock().tags.version()
    }

    /// The selected tag's latest observation (if it has been seen).
    pub fn selected(&self) -> Option<Arc<TagObservation>> {
        self.selected.borrow().clone()
    }

    /// The selected EPC, even if it has not been seen yet.
    pub fn selected_epc(&self) -> Option<String> {
        self.lock().selected.clone()
    }

    pub fn subscribe_selected(&self) -> watch::Receiver<Option<Arc<TagObservation>>> {
        self.selected.subscribe()
    }

    pub fn policy(&self) -> ScanPolicy {
        self.lock().policy.clone()
    }

    /// Number of cached classification decisions.
    pub fn cached_decisions(&self) -> usize {
        self.lock().decisions.len()
    }

    /// Cached decision for `epc`, if any.
    pub fn decision(&self, epc: &str) -> Option<ClassificationDecision> {
        self.lock().decisions.get(epc).cloned()
    }

    /// Number of EPCs with a lookup in flight.
    pub fn pending_lookups(&self) -> usize {
        self.lock().pending.len()
    }

    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    // ── Ingestion ────────────────────────────────────────────────────

    /// Route a batch of raw reads through the cache under one lock.
    ///
    /// Subscribers see a single snapshot for the whole batch.
    pub(crate) fn observe_batch(
        &self,
        reads: &[RawRead],
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Vec<Observed> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.tags.defer();
        let observed = reads
            .iter()
            .map(|read| self.observe_in(state, read, now, wall))
            .collect();
        state.tags.flush();
        observed
    }

    /// Route one raw read through the cache.
    #[cfg(test)]
    pub(crate) fn observe(&self, read: &RawRead, now: Instant, wall: DateTime<Utc>) -> Observed {
        let mut state = self.lock();
        self.observe_in(&mut state, read, now, wall)
    }

    fn observe_in(
        &self,
        state: &mut SessionState,
        read: &RawRead,
        now: Instant,
        wall: DateTime<Utc>,
    ) -> Observed {
        if !state.policy.admits(&read.epc, state.selected.as_deref()) {
            return Observed::Ignored;
        }

        match state.decisions.get(&read.epc) {
            Some(decision) if !decision.matched => Observed::Rejected,
            Some(decision) => {
                let registration = decision.registration.clone();
                let is_selected = state.selected.as_deref() == Some(read.epc.as_str());
                let updated = if state.tags.contains(&read.epc) {
                    state.tags.update(&read.epc, |tag| {
                        tag.rssi = read.rssi;
                        if now >= tag.last_seen {
                            tag.last_seen = now;
                            tag.seen_at = wall;
                        }
                    })
                } else {
                    Some(state.tags.upsert(TagObservation {
                        epc: read.epc.clone(),
                        rssi: read.rssi,
                        last_seen: now,
                        seen_at: wall,
                        selected: is_selected,
                        registration,
                    }))
                };
                if is_selected {
                    self.selected.send_replace(updated);
                }
                Observed::Updated
            }
            None => {
                let queued = PendingRead {
                    rssi: read.rssi,
                    at: now,
                    wall,
                };
                if let Some(pending) = state.pending.get_mut(&read.epc) {
                    if now >= pending.at {
                        *pending = queued;
                    }
                    return Observed::Pending;
                }
                state.pending.insert(read.epc.clone(), queued);
                Observed::NeedsLookup {
                    epoch: state.epoch,
                    policy: state.policy.clone(),
                }
            }
        }
    }

    /// Cache a decision made in `epoch` and insert the tag if accepted.
    pub(crate) fn apply_decision(&self, epoch: u64, decision: ClassificationDecision) -> Applied {
        let mut guard = self.lock();
        let state = &mut *guard;

        if state.epoch != epoch {
            return Applied::Stale;
        }
        let Some(read) = state.pending.remove(&decision.epc) else {
            return Applied::Stale;
        };

        let epc = decision.epc.clone();
        let matched = decision.matched;
        let registration = decision.registration.clone();
        state.decisions.insert(epc.clone(), decision);
        if !matched {
            return Applied::Rejected;
        }

        let is_selected = state.selected.as_deref() == Some(epc.as_str());
        let tag = state.tags.upsert(TagObservation {
            epc,
            rssi: read.rssi,
            last_seen: read.at,
            seen_at: read.wall,
            selected: is_selected,
            registration,
        });
        if is_selected {
            self.selected.send_replace(Some(Arc::clone(&tag)));
        }
        Applied::Inserted(tag)
    }

    // ── Session control ──────────────────────────────────────────────

    /// Change the scan policy; tags, decisions and selection reset.
    ///
    /// A monitor workflow pre-selects its EPC.
    pub(crate) fn update_policy<F>(&self, f: F) -> u64
    where
        F: FnOnce(&mut ScanPolicy),
    {
        let mut state = self.lock();
        f(&mut state.policy);
        state.selected = state.policy.workflow.pinned_epc().map(str::to_string);
        Self::reset(&mut state);
        self.selected.send_replace(None);
        state.epoch
    }

    /// Drop every tag and cached decision, keeping the policy.
    pub(crate) fn clear(&self) -> u64 {
        let mut state = self.lock();
        if !matches!(state.policy.workflow, Workflow::Monitor { .. }) {
            state.selected = None;
        }
        Self::reset(&mut state);
        self.selected.send_replace(None);
        state.epoch
    }

    /// Mark `epc` as the operator's focus. Returns `false` if it is unknown.
    pub(crate) fn select(&self, epc: &str) -> bool {
        let mut state = self.lock();
        if !state.tags.contains(epc) {
            return false;
        }
        if let Some(previous) = state.selected.take() {
            state.tags.update(&previous, |tag| tag.selected = false);
        }
        let tag = state.tags.update(epc, |tag| tag.selected = true);
        state.selected = Some(epc.to_string());
        self.selected.send_replace(tag);
        true
    }

    /// Release the selection (a monitor workflow keeps its EPC).
    pub(crate) fn clear_selection(&self) {
        let mut state = self.lock();
        if matches!(state.policy.workflow, Workflow::Monitor { .. }) {
            return;
        }
        if let Some(previous) = state.selected.take() {
            state.tags.update(&previous, |tag| tag.selected = false);
        }
        self.selected.send_replace(None);
    }

    // ── Staleness ────────────────────────────────────────────────────

    /// Demote the selected tag to the RSSI floor if it has been silent
    /// for longer than `timeout`. Returns the demoted observation.
    pub(crate) fn sweep(&self, now: Instant, timeout: Duration) -> Option<Arc<TagObservation>> {
        let mut state = self.lock();
        let epc = state.selected.clone()?;
        let tag = state.tags.get(&epc)?;
        if tag.rssi <= RSSI_FLOOR || now.saturating_duration_since(tag.last_seen) <= timeout {
            return None;
        }
        let demoted = state.tags.update(&epc, |tag| tag.rssi = RSSI_FLOOR)?;
        self.selected.send_replace(Some(Arc::clone(&demoted)));
        Some(demoted)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn reset(state: &mut SessionState) {
        state.tags.clear();
        state.decisions.clear();
        state.pending.clear();
        state.epoch += 1;
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{ReadingMode, Registration};

    fn inventory() -> TagStore {
        TagStore::new(ScanPolicy::default())
    }

    fn accept(epc: &str) -> ClassificationDecision {
        ClassificationDecision {
            epc: epc.into(),
            matched: true,
            registration: Registration::Registered {
                product_id: Some("SKU-1".into()),
                product: None,
            },
        }
    }

    fn reject(epc: &str) -> ClassificationDecision {
        ClassificationDecision {
            epc: epc.into(),
            matched: false,
            registration: Registration::Unregistered,
        }
    }

    /// Observe and, on first sighting, apply `decision`.
    fn feed(
        store: &TagStore,
        epc: &str,
        rssi: i32,
        at: Instant,
        decision: fn(&str) -> ClassificationDecision,
    ) -> Observed {
        let observed = store.observe(&RawRead::new(epc, rssi), at, Utc::now());
        if let Observed::NeedsLookup { epoch, .. } = &observed {
            store.apply_decision(*epoch, decision(epc));
        }
        observed
    }

    #[test]
    fn repeated_reads_update_in_place() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -60, t0, accept);
        feed(&store, "E1", -50, t0 + Duration::from_millis(10), accept);
        feed(&store, "E1", -55, t0 + Duration::from_millis(20), accept);

        assert_eq!(store.len(), 1);
        let tag = store.get("E1").unwrap();
        assert_eq!(tag.rssi, -55);
        assert_eq!(tag.last_seen, t0 + Duration::from_millis(20));
    }

    #[test]
    fn batch_publishes_one_snapshot() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -60, t0, accept);
        feed(&store, "E2", -60, t0, accept);
        let before = store.version();
        let stream = store.subscribe();

        let reads = [
            RawRead::new("E1", -50),
            RawRead::new("E2", -55),
            RawRead::new("E1", -45),
            RawRead::new("E3", -70),
        ];
        let observed = store.observe_batch(&reads, t0 + Duration::from_millis(10), Utc::now());

        assert_eq!(observed.len(), 4);
        assert!(observed[..3].iter().all(|o| *o == Observed::Updated));
        assert!(matches!(observed[3], Observed::NeedsLookup { .. }));
        assert_eq!(store.version(), before + 1);
        assert_eq!(store.get("E1").unwrap().rssi, -45);
        assert_eq!(store.get("E2").unwrap().rssi, -55);
        assert_eq!(stream.latest()[0].rssi, -45);
        assert_eq!(store.pending_lookups(), 1);
    }

    #[test]
    fn batch_of_new_reads_changes_nothing() {
        let store = inventory();
        let before = store.version();
        let reads = [RawRead::new("E1", -50), RawRead::new("E1", -40)];

        let observed = store.observe_batch(&reads, Instant::now(), Utc::now());

        assert!(matches!(observed[0], Observed::NeedsLookup { .. }));
        assert_eq!(observed[1], Observed::Pending);
        assert_eq!(store.version(), before);
    }

    #[test]
    fn last_seen_never_moves_backwards() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -60, t0 + Duration::from_millis(50), accept);
        feed(&store, "E1", -40, t0, accept);

        let tag = store.get("E1").unwrap();
        assert_eq!(tag.last_seen, t0 + Duration::from_millis(50));
        assert_eq!(tag.rssi, -40);
    }

    #[test]
    fn cached_rejection_skips_lookup() {
        let store = inventory();
        let t0 = Instant::now();
        assert!(matches!(
            feed(&store, "E1", -60, t0, reject),
            Observed::NeedsLookup { .. }
        ));
        assert_eq!(feed(&store, "E1", -60, t0, reject), Observed::Rejected);
        assert!(store.is_empty());
        assert_eq!(store.cached_decisions(), 1);
    }

    #[test]
    fn reads_during_lookup_are_queued() {
        let store = inventory();
        let t0 = Instant::now();
        let Observed::NeedsLookup { epoch, .. } =
            store.observe(&RawRead::new("E1", -70), t0, Utc::now())
        else {
            panic!("expected lookup");
        };
        let later = t0 + Duration::from_millis(30);
        assert_eq!(
            store.observe(&RawRead::new("E1", -45), later, Utc::now()),
            Observed::Pending
        );
        assert_eq!(store.pending_lookups(), 1);

        let Applied::Inserted(tag) = store.apply_decision(epoch, accept("E1")) else {
            panic!("expected insert");
        };
        assert_eq!(store.pending_lookups(), 0);
        assert_eq!(tag.rssi, -45);
        assert_eq!(tag.last_seen, later);
    }

    #[test]
    fn clear_discards_in_flight_results() {
        let store = inventory();
        let Observed::NeedsLookup { epoch, .. } =
            store.observe(&RawRead::new("E1", -60), Instant::now(), Utc::now())
        else {
            panic!("expected lookup");
        };
        store.clear();
        assert_eq!(store.apply_decision(epoch, accept("E1")), Applied::Stale);
        assert!(store.is_empty());
        assert_eq!(store.cached_decisions(), 0);
    }

    #[test]
    fn policy_change_clears_cache_and_tags() {
        let store = inventory();
        feed(&store, "E1", -60, Instant::now(), accept);
        feed(&store, "E2", -60, Instant::now(), reject);
        assert_eq!(store.cached_decisions(), 2);

        store.update_policy(|policy| {
            policy.mode = ReadingMode::OnlyRegistered;
            policy.target = Some("SKU-2".into());
        });
        assert!(store.is_empty());
        assert_eq!(store.cached_decisions(), 0);
        assert!(matches!(
            store.observe(&RawRead::new("E1", -60), Instant::now(), Utc::now()),
            Observed::NeedsLookup { .. }
        ));
    }

    #[test]
    fn locate_without_target_ignores_reads() {
        let store = TagStore::new(ScanPolicy {
            workflow: Workflow::Locate,
            ..ScanPolicy::default()
        });
        assert_eq!(
            store.observe(&RawRead::new("E1", -60), Instant::now(), Utc::now()),
            Observed::Ignored
        );
    }

    #[test]
    fn selection_flags_follow_select() {
        let store = inventory();
        let now = Instant::now();
        feed(&store, "E1", -60, now, accept);
        feed(&store, "E2", -60, now, accept);

        assert!(store.select("E1"));
        assert!(store.select("E2"));
        assert!(!store.get("E1").unwrap().selected);
        assert!(store.get("E2").unwrap().selected);
        assert_eq!(store.selected().unwrap().epc, "E2");
        assert!(!store.select("E9"));

        store.clear_selection();
        assert!(store.selected().is_none());
        assert!(!store.get("E2").unwrap().selected);
    }

    #[test]
    fn sweep_demotes_silent_selected_tag() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -50, t0, accept);
        store.select("E1");
        let timeout = Duration::from_millis(1000);

        assert!(store.sweep(t0 + Duration::from_millis(900), timeout).is_none());
        let lost = store.sweep(t0 + Duration::from_millis(1100), timeout).unwrap();
        assert_eq!(lost.rssi, RSSI_FLOOR);
        assert_eq!(store.selected().unwrap().rssi, RSSI_FLOOR);

        // Already at the floor: no second transition.
        assert!(store.sweep(t0 + Duration::from_millis(2000), timeout).is_none());
    }

    #[test]
    fn fresh_read_prevents_demotion() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -50, t0, accept);
        store.select("E1");
        feed(&store, "E1", -48, t0 + Duration::from_millis(800), accept);

        let timeout = Duration::from_millis(1000);
        assert!(store.sweep(t0 + Duration::from_millis(1500), timeout).is_none());
        assert_eq!(store.get("E1").unwrap().rssi, -48);
    }

    #[test]
    fn sweep_ignores_unselected_tags() {
        let store = inventory();
        let t0 = Instant::now();
        feed(&store, "E1", -50, t0, accept);
        let later = t0 + Duration::from_secs(10);
        assert!(store.sweep(later, Duration::from_millis(1000)).is_none());
    }

    #[test]
    fn monitor_preselects_its_epc() {
        let store = TagStore::new(ScanPolicy {
            workflow: Workflow::Monitor { epc: "E7".into() },
            ..ScanPolicy::default()
        });
        assert_eq!(store.selected_epc().as_deref(), Some("E7"));
        assert_eq!(
            store.observe(&RawRead::new("E1", -50), Instant::now(), Utc::now()),
            Observed::Ignored
        );

        feed(&store, "E7", -50, Instant::now(), accept);
        assert_eq!(store.selected().unwrap().epc, "E7");
        assert!(store.get("E7").unwrap().selected);

        store.clear();
        assert_eq!(store.selected_epc().as_deref(), Some("E7"));
    }
}
