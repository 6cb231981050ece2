//! The per-subscriber contact stream.
//!
//! Each connection gets its own broadcast loop: a loss-exempt snapshot of
//! every active contact, then one lossy sampled batch per broadcast tick.
//! The loop lives exactly as long as the subscriber - when the SSE body is
//! dropped the channel send fails and the feeder task exits, without
//! touching the simulator or any other subscriber.

use crate::state::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use skytrack_core::{sample_batch, ContactUpdate};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

/// Queue depth between the feeder task and the SSE body.
const SUBSCRIBER_QUEUE: usize = 64;

/// `GET /api/contacts/stream` - the persistent push channel.
pub async fn stream_contacts(State(state): State<AppState>) -> impl IntoResponse {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(SUBSCRIBER_QUEUE);

    tokio::spawn(run_broadcast_loop(state, tx));

    let stream = ReceiverStream::new(rx);
    (
        [("cache-control", "no-cache"), ("x-accel-buffering", "no")],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
}

/// One subscriber's feed: snapshot, then sampled batches until hang-up.
async fn run_broadcast_loop(state: AppState, tx: mpsc::Sender<Result<Event, Infallible>>) {
    let mut rng = ChaCha8Rng::from_entropy();

    // Full-snapshot catch-up: every active contact, exempt from the loss
    // model, exactly once.
    let snapshot = state.simulator.active_contacts();
    debug!(contacts = snapshot.len(), "subscriber connected, sending snapshot");
    for update in &snapshot {
        if send_update(&tx, update).await.is_err() {
            return;
        }
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(state.broadcast.interval_ms));
    // The first interval tick completes immediately; the snapshot already
    // covered this instant.
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let active = state.simulator.active_contacts();
        let batch = sample_batch(&active, &state.broadcast, &mut rng);
        debug!(sent = batch.len(), active = active.len(), "broadcast tick");

        for update in &batch {
            if send_update(&tx, update).await.is_err() {
                debug!("subscriber disconnected, broadcast loop released");
                return;
            }
        }
    }
}

/// Encodes one update as an SSE event and queues it for the subscriber.
///
/// `Err` means the subscriber is gone; an unencodable update is logged and
/// skipped rather than tearing the stream down.
async fn send_update(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    update: &ContactUpdate,
) -> Result<(), ()> {
    let event = match Event::default().json_data(update) {
        Ok(event) => event,
        Err(err) => {
            warn!(error = %err, id = %update.id, "failed to encode contact update");
            return Ok(());
        }
    };

    tx.send(Ok(event)).await.map_err(|_| ())
}
