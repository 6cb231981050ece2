//! The Contact Simulator - Authoritative Population State
//!
//! Owns the contact table and advances it with three independently-scheduled
//! periodic processes:
//! 1. **Movement**: perturb heading, project forward, reflect off bounds
//! 2. **Spawn**: top up the population while below capacity
//! 3. **Despawn**: retire a random handful of active contacts
//!
//! All three processes and every reader share one mutex-guarded state; each
//! timer callback locks, runs to completion, and unlocks, so no reader ever
//! observes a half-applied tick.

use crate::contact::{unix_ms, Contact, ContactUpdate};
use crate::geo::{self, destination_point, normalize_heading, Bounds};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Contacts created per spawn tick, before the capacity cap.
const SPAWN_BATCH_MIN: usize = 2;
const SPAWN_BATCH_MAX: usize = 5;

/// Contacts retired per despawn tick, before the active-count cap.
const DESPAWN_BATCH_MIN: usize = 2;
const DESPAWN_BATCH_MAX: usize = 6;

/// Configuration for the contact simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Contacts spawned synchronously at start
    pub initial_count: usize,

    /// Hard cap on the contact table, retired contacts included
    pub max_count: usize,

    /// Movement tick interval in milliseconds
    pub update_interval_ms: u64,

    /// Spawn tick interval in milliseconds
    pub spawn_interval_ms: u64,

    /// Despawn tick interval in milliseconds
    pub despawn_interval_ms: u64,

    /// Geographic box contacts are confined to
    pub bounds: Bounds,

    /// Speed range for new contacts, meters per second
    pub min_speed_mps: f64,
    pub max_speed_mps: f64,

    /// Maximum per-tick heading perturbation, degrees either way
    pub heading_change_max_deg: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_count: 30,
            max_count: 200,
            update_interval_ms: 10_000,
            spawn_interval_ms: 20_000,
            despawn_interval_ms: 25_000,
            bounds: Bounds {
                min_lat: 44.38,
                max_lat: 52.38,
                min_lng: 22.14,
                max_lng: 40.23,
            },
            min_speed_mps: 20.0,
            max_speed_mps: 60.0,
            heading_change_max_deg: 15.0,
        }
    }
}

/// Mutable simulator state behind the single mutex: the contact table plus
/// the RNG that drives every stochastic decision.
struct SimState {
    contacts: HashMap<String, Contact>,
    rng: ChaCha8Rng,
}

impl SimState {
    fn new(rng: ChaCha8Rng) -> Self {
        Self {
            contacts: HashMap::new(),
            rng,
        }
    }

    /// Creates one contact at a uniform random position and inserts it.
    fn create_contact(&mut self, config: &SimulatorConfig, now_ms: u64) -> String {
        let SimState { contacts, rng } = self;

        let position = geo::random_point_in(&config.bounds, rng);
        let heading = geo::random_heading(rng);
        let speed_mps = rng.gen_range(config.min_speed_mps..=config.max_speed_mps);

        let contact = Contact::new(position, heading, speed_mps, now_ms);
        let id = contact.id.clone();
        contacts.insert(id.clone(), contact);
        id
    }

    /// Movement tick: advance every active contact by one interval.
    fn update_all(&mut self, config: &SimulatorConfig, now_ms: u64) {
        let delta_secs = config.update_interval_ms as f64 / 1000.0;
        let SimState { contacts, rng } = self;

        for contact in contacts.values_mut() {
            if !contact.active {
                continue;
            }

            let jitter = rng.gen_range(
                -config.heading_change_max_deg..=config.heading_change_max_deg,
            );
            contact.heading = normalize_heading(contact.heading + jitter);

            let distance_m = contact.speed_mps * delta_secs;
            let mut next = destination_point(contact.position, contact.heading, distance_m);

            if !config.bounds.contains(next) {
                // Single reflection retry. A pathological box/speed pairing
                // can still leave the contact outside; that is accepted.
                contact.heading = normalize_heading(contact.heading + 180.0);
                next = destination_point(contact.position, contact.heading, distance_m);
            }

            contact.position = next;
            contact.last_update_ms = now_ms;
        }
    }

    /// Spawn tick: create 2-5 contacts while below capacity.
    ///
    /// Retired contacts count toward the cap; at capacity this is a no-op,
    /// not an error.
    fn spawn_batch(&mut self, config: &SimulatorConfig, now_ms: u64) -> usize {
        let current = self.contacts.len();
        if current >= config.max_count {
            return 0;
        }

        let wanted = self.rng.gen_range(SPAWN_BATCH_MIN..=SPAWN_BATCH_MAX);
        let count = wanted.min(config.max_count - current);

        for _ in 0..count {
            self.create_contact(config, now_ms);
        }
        count
    }

    /// Despawn tick: retire a without-replacement random subset of the
    /// active contacts. A no-op when nothing is active.
    fn despawn_batch(&mut self) -> usize {
        let SimState { contacts, rng } = self;

        let active_ids: Vec<&String> = contacts
            .iter()
            .filter(|(_, contact)| contact.active)
            .map(|(id, _)| id)
            .collect();
        if active_ids.is_empty() {
            return 0;
        }

        let count = rng
            .gen_range(DESPAWN_BATCH_MIN..=DESPAWN_BATCH_MAX)
            .min(active_ids.len());
        let picked: Vec<String> = rand::seq::index::sample(rng, active_ids.len(), count)
            .into_iter()
            .map(|i| active_ids[i].clone())
            .collect();

        for id in &picked {
            if let Some(contact) = contacts.get_mut(id) {
                contact.active = false;
            }
        }
        count
    }

    /// Wire projection of every active contact.
    fn active_updates(&self) -> Vec<ContactUpdate> {
        self.contacts
            .values()
            .filter(|contact| contact.active)
            .map(Contact::to_update)
            .collect()
    }

    fn active_count(&self) -> usize {
        self.contacts.values().filter(|c| c.active).count()
    }
}

/// The contact simulator.
///
/// `start()` seeds the initial population and launches the three periodic
/// processes; `stop()` cancels them and freezes the table in place. Reads
/// are safe at any point in between.
pub struct ContactSimulator {
    config: SimulatorConfig,
    state: Arc<Mutex<SimState>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ContactSimulator {
    /// Creates a simulator driven by OS entropy.
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_rng(config, ChaCha8Rng::from_entropy())
    }

    /// Creates a reproducible simulator from a fixed seed.
    pub fn seeded(config: SimulatorConfig, seed: u64) -> Self {
        Self::with_rng(config, ChaCha8Rng::seed_from_u64(seed))
    }

    fn with_rng(config: SimulatorConfig, rng: ChaCha8Rng) -> Self {
        Self {
            config,
            state: Arc::new(Mutex::new(SimState::new(rng))),
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawns the initial population, then launches the movement, spawn and
    /// despawn processes on their own timers. Calling twice is a no-op.
    pub fn start(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if !tasks.is_empty() {
            return;
        }

        {
            let now_ms = unix_ms();
            let mut state = self.state.lock().unwrap();
            for _ in 0..self.config.initial_count {
                state.create_contact(&self.config, now_ms);
            }
        }
        info!(
            initial = self.config.initial_count,
            max = self.config.max_count,
            "contact simulator started"
        );

        tasks.push(self.spawn_periodic(self.config.update_interval_ms, TickKind::Update));
        tasks.push(self.spawn_periodic(self.config.spawn_interval_ms, TickKind::Spawn));
        tasks.push(self.spawn_periodic(self.config.despawn_interval_ms, TickKind::Despawn));
    }

    /// Cancels the periodic processes. The contact table is left intact and
    /// no further mutation happens after this returns.
    pub fn stop(&self) {
        let mut tasks = self.tasks.lock().unwrap();
        if tasks.is_empty() {
            return;
        }
        for task in tasks.drain(..) {
            task.abort();
        }
        info!("contact simulator stopped");
    }

    /// Wire projection of every active contact, rounded for emission.
    ///
    /// Side-effect free and safe to call concurrently with the periodic
    /// processes.
    pub fn active_contacts(&self) -> Vec<ContactUpdate> {
        self.state.lock().unwrap().active_updates()
    }

    /// Number of active (non-retired) contacts.
    pub fn active_count(&self) -> usize {
        self.state.lock().unwrap().active_count()
    }

    /// Total table size, retired contacts included.
    pub fn total_count(&self) -> usize {
        self.state.lock().unwrap().contacts.len()
    }

    /// Runs one movement tick synchronously.
    pub fn run_update_tick(&self) {
        self.state
            .lock()
            .unwrap()
            .update_all(&self.config, unix_ms());
    }

    /// Runs one spawn tick synchronously, returning the number created.
    pub fn run_spawn_tick(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .spawn_batch(&self.config, unix_ms())
    }

    /// Runs one despawn tick synchronously, returning the number retired.
    pub fn run_despawn_tick(&self) -> usize {
        self.state.lock().unwrap().despawn_batch()
    }

    fn spawn_periodic(&self, interval_ms: u64, kind: TickKind) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        let config = self.config.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
            // The first interval tick completes immediately; consume it so
            // every process fires one full interval after start.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now_ms = unix_ms();
                let mut state = state.lock().unwrap();
                match kind {
                    TickKind::Update => {
                        state.update_all(&config, now_ms);
                        debug!(active = state.active_count(), "movement tick");
                    }
                    TickKind::Spawn => {
                        let spawned = state.spawn_batch(&config, now_ms);
                        if spawned > 0 {
                            debug!(spawned, total = state.contacts.len(), "spawn tick");
                        }
                    }
                    TickKind::Despawn => {
                        let retired = state.despawn_batch();
                        if retired > 0 {
                            debug!(retired, active = state.active_count(), "despawn tick");
                        }
                    }
                }
            }
        })
    }
}

#[derive(Clone, Copy)]
enum TickKind {
    Update,
    Spawn,
    Despawn,
}
