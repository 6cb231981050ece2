//! The Reconciliation Store - Derived Truth with a Staleness Lifecycle
//!
//! The stream carries presence only: updates may be missing, duplicated or
//! out of chronological order, and removal is never announced. The store
//! absorbs all of that by construction:
//! - every receipt upserts the contact and forces it `Active`
//!   (last-write-wins, keyed by receipt time)
//! - a periodic sweep demotes contacts the stream went quiet on to `Lost`,
//!   then evicts them outright
//!
//! Staleness is measured on the receiver's clock (`last_seen_ms`), never on
//! the update's embedded `ts`: batched, lossy delivery makes sender time
//! arrive out of order relative to receipt order.

use skytrack_core::ContactUpdate;
use std::collections::HashMap;

pub const DEFAULT_LOST_THRESHOLD_MS: u64 = 45_000;
pub const DEFAULT_REMOVE_THRESHOLD_MS: u64 = 120_000;
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 10_000;

/// Subscriber-side lifecycle of a tracked contact, derived purely from time
/// since the stream last reported it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactStatus {
    Active,
    Lost,
}

/// A contact as reconstructed by a subscriber.
#[derive(Debug, Clone)]
pub struct TrackedContact {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    pub heading: f64,

    /// Sender-side timestamp carried on the wire; informational only
    pub ts: u64,

    /// Receiver clock at the moment the last update arrived
    pub last_seen_ms: u64,

    pub status: ContactStatus,
}

/// What one sweep pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub marked_lost: usize,
    pub removed: usize,
}

/// Holds the tracked-contact map. Exclusively owns its records: nothing
/// else mutates them.
#[derive(Debug)]
pub struct ContactStore {
    contacts: HashMap<String, TrackedContact>,
    lost_threshold_ms: u64,
    remove_threshold_ms: u64,
    last_update_ms: Option<u64>,
}

impl ContactStore {
    /// Store with the reference thresholds (45 s lost, 120 s removed).
    pub fn new() -> Self {
        Self::with_thresholds(DEFAULT_LOST_THRESHOLD_MS, DEFAULT_REMOVE_THRESHOLD_MS)
    }

    /// Store with custom thresholds.
    ///
    /// `lost_threshold_ms` must be strictly below `remove_threshold_ms`;
    /// the store trusts its configuration and does not check.
    pub fn with_thresholds(lost_threshold_ms: u64, remove_threshold_ms: u64) -> Self {
        Self {
            contacts: HashMap::new(),
            lost_threshold_ms,
            remove_threshold_ms,
            last_update_ms: None,
        }
    }

    /// Upserts a contact from a received update.
    ///
    /// The only way contacts are created or revived: all fields are
    /// overwritten, `last_seen_ms` is set to the receipt clock and the
    /// status is forced back to `Active` whatever it was.
    pub fn apply_update(&mut self, update: ContactUpdate, now_ms: u64) {
        let contact = TrackedContact {
            id: update.id.clone(),
            lat: update.lat,
            lng: update.lng,
            heading: update.heading,
            ts: update.ts,
            last_seen_ms: now_ms,
            status: ContactStatus::Active,
        };

        self.contacts.insert(update.id, contact);
        self.last_update_ms = Some(now_ms);
    }

    /// One staleness pass over every contact.
    ///
    /// Past the remove threshold the contact is evicted outright - checked
    /// first so an already-`Lost` contact still ages out. Past the lost
    /// threshold an `Active` contact is demoted; re-demoting is a no-op.
    pub fn sweep(&mut self, now_ms: u64) -> SweepSummary {
        let lost_threshold = self.lost_threshold_ms;
        let remove_threshold = self.remove_threshold_ms;
        let mut summary = SweepSummary::default();

        self.contacts.retain(|_, contact| {
            let elapsed = now_ms.saturating_sub(contact.last_seen_ms);

            if elapsed > remove_threshold {
                summary.removed += 1;
                return false;
            }
            if elapsed > lost_threshold && contact.status == ContactStatus::Active {
                contact.status = ContactStatus::Lost;
                summary.marked_lost += 1;
            }
            true
        });

        summary
    }

    /// Demotes one contact to `Lost`. Idempotent; false if absent.
    pub fn mark_lost(&mut self, id: &str) -> bool {
        match self.contacts.get_mut(id) {
            Some(contact) => {
                contact.status = ContactStatus::Lost;
                true
            }
            None => false,
        }
    }

    /// Evicts one contact. False if absent.
    pub fn remove(&mut self, id: &str) -> bool {
        self.contacts.remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&TrackedContact> {
        self.contacts.get(id)
    }

    /// All tracked contacts, in no particular order.
    pub fn contacts(&self) -> Vec<TrackedContact> {
        self.contacts.values().cloned().collect()
    }

    /// All tracked ids, in no particular order.
    pub fn ids(&self) -> Vec<String> {
        self.contacts.keys().cloned().collect()
    }

    // Derived counts are computed from the map on every read; separately
    // maintained counters would be a drift hazard at this scale.

    pub fn active_count(&self) -> usize {
        self.status_count(ContactStatus::Active)
    }

    pub fn lost_count(&self) -> usize {
        self.status_count(ContactStatus::Lost)
    }

    pub fn total_count(&self) -> usize {
        self.contacts.len()
    }

    /// Receipt clock of the most recent update, if any arrived yet.
    pub fn last_update_ms(&self) -> Option<u64> {
        self.last_update_ms
    }

    pub fn clear(&mut self) {
        self.contacts.clear();
        self.last_update_ms = None;
    }

    fn status_count(&self, status: ContactStatus) -> usize {
        self.contacts
            .values()
            .filter(|contact| contact.status == status)
            .count()
    }
}

impl Default for ContactStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(id: &str, ts: u64) -> ContactUpdate {
        ContactUpdate {
            id: id.to_string(),
            lat: 48.5,
            lng: 31.2,
            heading: 270.0,
            ts,
        }
    }

    #[test]
    fn test_apply_creates_active_contact() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 100), 1_000);

        let contact = store.get("ct-a").unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.last_seen_ms, 1_000);
        assert_eq!(contact.ts, 100);
        assert_eq!(store.total_count(), 1);
        assert_eq!(store.last_update_ms(), Some(1_000));
    }

    #[test]
    fn test_apply_overwrites_all_fields() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 100), 1_000);

        let mut newer = update("ct-a", 200);
        newer.lat = 49.0;
        store.apply_update(newer, 2_000);

        let contact = store.get("ct-a").unwrap();
        assert_eq!(contact.lat, 49.0);
        assert_eq!(contact.ts, 200);
        assert_eq!(contact.last_seen_ms, 2_000);
        assert_eq!(store.total_count(), 1);
    }

    #[test]
    fn test_duplicate_and_stale_ts_updates_are_absorbed() {
        // Receipt order wins: an update whose embedded ts is older still
        // refreshes the contact.
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 500), 1_000);
        store.apply_update(update("ct-a", 300), 2_000);

        let contact = store.get("ct-a").unwrap();
        assert_eq!(contact.ts, 300);
        assert_eq!(contact.last_seen_ms, 2_000);
        assert_eq!(contact.status, ContactStatus::Active);
    }

    #[test]
    fn test_mark_lost_idempotent() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 100), 1_000);

        assert!(store.mark_lost("ct-a"));
        let first = store.get("ct-a").unwrap().clone();

        assert!(store.mark_lost("ct-a"));
        let second = store.get("ct-a").unwrap();

        assert_eq!(first.status, ContactStatus::Lost);
        assert_eq!(second.status, ContactStatus::Lost);
        assert_eq!(first.last_seen_ms, second.last_seen_ms);
        assert!(!store.mark_lost("ct-missing"));
    }

    #[test]
    fn test_update_revives_lost_contact() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 100), 1_000);
        store.mark_lost("ct-a");

        store.apply_update(update("ct-a", 150), 5_000);

        let contact = store.get("ct-a").unwrap();
        assert_eq!(contact.status, ContactStatus::Active);
        assert_eq!(contact.last_seen_ms, 5_000);
    }

    #[test]
    fn test_staleness_ordering() {
        let t0 = 1_000_000u64;
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), t0);

        // Just past the lost threshold: present but demoted
        store.sweep(t0 + 45_001);
        assert_eq!(store.get("ct-a").unwrap().status, ContactStatus::Lost);
        assert_eq!(store.total_count(), 1);

        // Just past the remove threshold: gone
        store.sweep(t0 + 120_001);
        assert!(store.get("ct-a").is_none());
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn test_sweep_exactly_at_thresholds_is_lenient() {
        // Thresholds are strict: elapsed must exceed them, not merely reach
        let t0 = 0u64;
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), t0);

        store.sweep(t0 + 45_000);
        assert_eq!(store.get("ct-a").unwrap().status, ContactStatus::Active);

        store.sweep(t0 + 120_000);
        assert_eq!(store.total_count(), 1);
    }

    #[test]
    fn test_sweep_removes_already_lost_contacts() {
        let t0 = 0u64;
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), t0);
        store.mark_lost("ct-a");

        let summary = store.sweep(t0 + 120_001);

        assert_eq!(summary.removed, 1);
        assert_eq!(store.total_count(), 0);
    }

    #[test]
    fn test_two_contacts_age_independently() {
        let t0 = 50_000u64;
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), t0);
        store.apply_update(update("ct-b", 2), t0 + 80_000);

        let summary = store.sweep(t0 + 120_001);

        assert!(store.get("ct-a").is_none(), "A aged past removal");
        let b = store.get("ct-b").unwrap();
        assert_eq!(b.status, ContactStatus::Active, "B was seen 40s ago");
        assert_eq!(summary.removed, 1);
        assert_eq!(summary.marked_lost, 0);
    }

    #[test]
    fn test_derived_counts() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), 1_000);
        store.apply_update(update("ct-b", 2), 1_000);
        store.apply_update(update("ct-c", 3), 1_000);
        store.mark_lost("ct-b");

        assert_eq!(store.active_count(), 2);
        assert_eq!(store.lost_count(), 1);
        assert_eq!(store.total_count(), 3);

        let mut ids = store.ids();
        ids.sort();
        assert_eq!(ids, vec!["ct-a", "ct-b", "ct-c"]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut store = ContactStore::new();
        store.apply_update(update("ct-a", 1), 1_000);

        store.clear();

        assert_eq!(store.total_count(), 0);
        assert_eq!(store.last_update_ms(), None);
    }

    #[test]
    fn test_custom_thresholds() {
        let mut store = ContactStore::with_thresholds(10, 20);
        store.apply_update(update("ct-a", 1), 0);

        store.sweep(11);
        assert_eq!(store.get("ct-a").unwrap().status, ContactStatus::Lost);

        store.sweep(21);
        assert!(store.get("ct-a").is_none());
    }
}
