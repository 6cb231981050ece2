//! Broadcast Sampling - The Deliberately Lossy Feed Policy
//!
//! Each subscriber's push loop samples the active set on a fixed cadence:
//! a random batch is selected, then each selected contact is independently
//! dropped with a configured probability. The result models a noisy
//! telemetry feed: no contact is guaranteed to appear on any given tick.
//!
//! The connect-time snapshot does NOT pass through this module; it emits
//! every active contact exactly once, loss-exempt.

use crate::contact::ContactUpdate;
use rand::seq::SliceRandom;
use rand::Rng;

/// Contacts considered per broadcast tick, before the drop filter.
pub const BATCH_MIN: usize = 30;
pub const BATCH_MAX: usize = 50;

/// Configuration for a subscriber's broadcast loop.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Broadcast tick interval in milliseconds
    pub interval_ms: u64,

    /// Per-contact, per-tick probability that a selected update is withheld
    pub drop_chance: f64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            drop_chance: 0.2,
        }
    }
}

/// Draws one broadcast tick's worth of updates from the active set.
///
/// Selection: uniform batch size in [`BATCH_MIN`, `BATCH_MAX`], random
/// shuffle, truncate to availability, then independent per-contact drops.
pub fn sample_batch<R: Rng>(
    active: &[ContactUpdate],
    config: &BroadcastConfig,
    rng: &mut R,
) -> Vec<ContactUpdate> {
    if active.is_empty() {
        return Vec::new();
    }

    let batch_size = rng.gen_range(BATCH_MIN..=BATCH_MAX).min(active.len());

    let mut batch = active.to_vec();
    batch.shuffle(rng);
    batch.truncate(batch_size);
    batch.retain(|_| rng.gen::<f64>() >= config.drop_chance);
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn make_updates(count: usize) -> Vec<ContactUpdate> {
        (0..count)
            .map(|i| ContactUpdate {
                id: format!("ct-{i:08}"),
                lat: 48.0,
                lng: 31.0,
                heading: 90.0,
                ts: 1_000,
            })
            .collect()
    }

    #[test]
    fn test_sample_empty_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let batch = sample_batch(&[], &BroadcastConfig::default(), &mut rng);
        assert!(batch.is_empty());
    }

    #[test]
    fn test_sample_without_drops_stays_in_window() {
        let config = BroadcastConfig {
            drop_chance: 0.0,
            ..Default::default()
        };
        let active = make_updates(100);
        let mut rng = ChaCha8Rng::seed_from_u64(2);

        for _ in 0..200 {
            let batch = sample_batch(&active, &config, &mut rng);
            assert!(batch.len() >= BATCH_MIN);
            assert!(batch.len() <= BATCH_MAX);
        }
    }

    #[test]
    fn test_sample_caps_at_available() {
        let config = BroadcastConfig {
            drop_chance: 0.0,
            ..Default::default()
        };
        let active = make_updates(7);
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        let batch = sample_batch(&active, &config, &mut rng);
        assert_eq!(batch.len(), 7);
    }

    #[test]
    fn test_sample_never_duplicates_within_tick() {
        let active = make_updates(40);
        let mut rng = ChaCha8Rng::seed_from_u64(4);

        for _ in 0..100 {
            let batch = sample_batch(&active, &BroadcastConfig::default(), &mut rng);
            let mut ids: Vec<&str> = batch.iter().map(|u| u.id.as_str()).collect();
            ids.sort();
            ids.dedup();
            assert_eq!(ids.len(), batch.len());
        }
    }

    #[test]
    fn test_delivery_rate_converges_to_keep_probability() {
        // With fewer contacts than BATCH_MIN every contact is selected every
        // tick, so the empirical delivery rate is the keep probability.
        let config = BroadcastConfig::default();
        let active = make_updates(20);
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        let ticks = 2_000usize;
        let mut delivered = 0usize;
        for _ in 0..ticks {
            delivered += sample_batch(&active, &config, &mut rng).len();
        }

        let rate = delivered as f64 / (ticks * active.len()) as f64;
        let expected = 1.0 - config.drop_chance;
        assert!(
            (rate - expected).abs() < 0.02,
            "delivery rate {rate:.4} strayed from {expected}"
        );
    }
}
