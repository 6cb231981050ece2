//! The Stream Transport - One Persistent Push Connection
//!
//! Wraps a single SSE subscription to one endpoint+credential pair and
//! fans received frames out to registered observers. Three event kinds,
//! each with its own registry: open, update, error.
//!
//! Failure policy (deliberately asymmetric):
//! - a malformed frame is dropped with a diagnostic and the connection
//!   stays up; it never reaches observers
//! - a transport failure (connect error, non-2xx, broken or closed body)
//!   is surfaced once through the error registry and ends the transport
//!   task; reconnecting is the caller's policy, never this module's

use crate::error::ClientError;
use futures_util::StreamExt;
use skytrack_core::ContactUpdate;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Token returned by the subscribe functions; pass it back to deregister.
pub type HandlerId = u64;

/// A registry of observers for one event kind.
///
/// Handlers are held as `Arc` so emission can snapshot the list and call
/// outside the lock - an observer may re-register without deadlocking.
struct HandlerSet<T> {
    inner: Mutex<HandlerSetInner<T>>,
}

struct HandlerSetInner<T> {
    next_id: HandlerId,
    handlers: Vec<(HandlerId, Arc<dyn Fn(&T) + Send + Sync>)>,
}

impl<T> HandlerSet<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(HandlerSetInner {
                next_id: 0,
                handlers: Vec::new(),
            }),
        }
    }

    fn add(&self, handler: Arc<dyn Fn(&T) + Send + Sync>) -> HandlerId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, handler));
        id
    }

    fn remove(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.handlers.len();
        inner.handlers.retain(|(handler_id, _)| *handler_id != id);
        inner.handlers.len() != before
    }

    fn emit(&self, value: &T) {
        let snapshot: Vec<Arc<dyn Fn(&T) + Send + Sync>> = {
            let inner = self.inner.lock().unwrap();
            inner
                .handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in snapshot {
            handler(value);
        }
    }
}

/// State shared between the client handle and its transport task.
struct Shared {
    open: AtomicBool,
    on_open: HandlerSet<()>,
    on_update: HandlerSet<ContactUpdate>,
    on_error: HandlerSet<ClientError>,
}

impl Shared {
    fn fail(&self, error: ClientError) {
        self.open.store(false, Ordering::SeqCst);
        warn!(error = %error, "contact stream failed");
        self.on_error.emit(&error);
    }
}

/// Client wrapper around the persistent contact stream.
pub struct StreamClient {
    stream_url: String,
    api_key: String,
    http: reqwest::Client,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamClient {
    /// `stream_url` is the full stream endpoint; the credential is appended
    /// as the `key` query parameter on connect.
    pub fn new(stream_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
            shared: Arc::new(Shared {
                open: AtomicBool::new(false),
                on_open: HandlerSet::new(),
                on_update: HandlerSet::new(),
                on_error: HandlerSet::new(),
            }),
            task: Mutex::new(None),
        }
    }

    /// Opens the transport. Idempotent: a second call while a transport
    /// task is live is a no-op.
    pub fn connect(&self) {
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.as_ref() {
            if !handle.is_finished() {
                debug!("connect ignored, transport already live");
                return;
            }
        }

        let request = self
            .http
            .get(&self.stream_url)
            .query(&[("key", self.api_key.as_str())]);
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(run_transport(request, shared)));
    }

    /// Closes the transport if open, else a no-op. No notification of any
    /// kind fires after this returns.
    pub fn disconnect(&self) {
        let mut task = self.task.lock().unwrap();
        if let Some(handle) = task.take() {
            handle.abort();
            self.shared.open.store(false, Ordering::SeqCst);
            debug!("contact stream disconnected");
        }
    }

    /// Whether the transport is currently open (connected and past the
    /// open notification, with no error since).
    pub fn is_connected(&self) -> bool {
        self.shared.open.load(Ordering::SeqCst)
    }

    pub fn on_open<F>(&self, handler: F) -> HandlerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.shared.on_open.add(Arc::new(move |_: &()| handler()))
    }

    pub fn off_open(&self, id: HandlerId) -> bool {
        self.shared.on_open.remove(id)
    }

    pub fn on_update<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ContactUpdate) + Send + Sync + 'static,
    {
        self.shared.on_update.add(Arc::new(handler))
    }

    pub fn off_update(&self, id: HandlerId) -> bool {
        self.shared.on_update.remove(id)
    }

    pub fn on_error<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ClientError) + Send + Sync + 'static,
    {
        self.shared.on_error.add(Arc::new(handler))
    }

    pub fn off_error(&self, id: HandlerId) -> bool {
        self.shared.on_error.remove(id)
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

/// The transport task: request, open notification, then frame pump.
async fn run_transport(request: reqwest::RequestBuilder, shared: Arc<Shared>) {
    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            shared.fail(ClientError::Connect(err.to_string()));
            return;
        }
    };

    if !response.status().is_success() {
        shared.fail(ClientError::Rejected(response.status().as_u16()));
        return;
    }

    shared.open.store(true, Ordering::SeqCst);
    shared.on_open.emit(&());
    debug!("contact stream open");

    let mut decoder = FrameDecoder::new();
    let mut body = response.bytes_stream();

    while let Some(chunk) = body.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                shared.fail(ClientError::Transport(err.to_string()));
                return;
            }
        };

        for payload in decoder.push(&bytes) {
            match serde_json::from_str::<ContactUpdate>(&payload) {
                Ok(update) => shared.on_update.emit(&update),
                // Malformed frames die here: logged, never surfaced,
                // never fatal to the connection.
                Err(err) => warn!(error = %err, "dropping malformed stream frame"),
            }
        }
    }

    // The server ended the stream; to a subscriber that is a transport
    // failure like any other.
    shared.fail(ClientError::Transport("stream closed by server".to_string()));
}

/// Incremental `text/event-stream` decoder.
///
/// Collects raw bytes and yields the joined `data:` payload of each
/// complete (blank-line terminated) event. Comment lines, such as SSE
/// keep-alives, produce nothing.
struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(pos) = find_frame_end(&self.buf) {
            let frame: Vec<u8> = self.buf.drain(..pos + 2).collect();
            if let Some(payload) = extract_data(&frame) {
                payloads.push(payload);
            }
        }
        payloads
    }
}

fn find_frame_end(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|window| window == b"\n\n")
}

fn extract_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data_lines = Vec::new();

    for line in text.lines() {
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
    }

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decoder_single_frame() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data: {\"id\":\"ct-1\"}\n\n");

        assert_eq!(payloads, vec!["{\"id\":\"ct-1\"}"]);
    }

    #[test]
    fn test_decoder_frame_split_across_chunks() {
        let mut decoder = FrameDecoder::new();

        assert!(decoder.push(b"data: {\"id\":").is_empty());
        assert!(decoder.push(b"\"ct-1\"}").is_empty());
        let payloads = decoder.push(b"\n\n");

        assert_eq!(payloads, vec!["{\"id\":\"ct-1\"}"]);
    }

    #[test]
    fn test_decoder_multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data: a\n\ndata: b\n\ndata: c\n\n");

        assert_eq!(payloads, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_decoder_skips_comment_frames() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b": keep-alive\n\ndata: x\n\n");

        assert_eq!(payloads, vec!["x"]);
    }

    #[test]
    fn test_decoder_handles_unspaced_data() {
        let mut decoder = FrameDecoder::new();
        let payloads = decoder.push(b"data:tight\n\n");

        assert_eq!(payloads, vec!["tight"]);
    }

    #[test]
    fn test_handler_set_register_emit_remove() {
        use std::sync::atomic::AtomicUsize;

        let set: HandlerSet<u32> = HandlerSet::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_a = Arc::clone(&calls);
        let a = set.add(Arc::new(move |_| {
            calls_a.fetch_add(1, Ordering::SeqCst);
        }));
        let calls_b = Arc::clone(&calls);
        let b = set.add(Arc::new(move |_| {
            calls_b.fetch_add(1, Ordering::SeqCst);
        }));
        assert_ne!(a, b);

        set.emit(&7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        assert!(set.remove(a));
        assert!(!set.remove(a), "second deregistration is a no-op");
        set.emit(&7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_handler_may_reregister_during_emit() {
        let set: Arc<HandlerSet<u32>> = Arc::new(HandlerSet::new());

        let set_clone = Arc::clone(&set);
        set.add(Arc::new(move |_| {
            set_clone.add(Arc::new(|_| {}));
        }));

        // Must not deadlock
        set.emit(&1);
    }
}
