// Media acquisition: a capability trait for anything that can produce frames,
// stream/track handles shared by the video surfaces, and the fire-and-forget
// request that runs the source on its own capture thread.

use crate::error::Error;
use crate::types::FrameBuffer;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    /// Front camera, looking at the user.
    #[default]
    User,
    Environment,
}

/// What the widget asks for. Width and height are ideals, not requirements.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub facing_mode: FacingMode,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self { ideal_width: 600, ideal_height: 600, facing_mode: FacingMode::User, audio: false }
    }
}

/// Something that can be asked for a stream once.
///
/// `acquire` may block (permission prompts, device start-up); it always runs
/// on the capture thread, never on the caller's. Only the source has to be
/// `Send`; the capture it opens stays on that thread.
pub trait MediaSource: Send {
    fn acquire(self: Box<Self>, constraints: &StreamConstraints)
    -> Result<Box<dyn MediaCapture>, Error>;

    fn label(&self) -> String {
        "video".to_string()
    }
}

/// An opened device, pulled for frames until it is released.
pub trait MediaCapture {
    /// Resolution actually delivered.
    fn resolution(&self) -> (u32, u32);

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<FrameBuffer, Error>;

    /// Close the device. Called once, after the last track stops.
    fn release(&mut self);
}

/// A source that is never permitted to capture.
pub struct UnavailableSource {
    reason: String,
}

impl UnavailableSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

impl MediaSource for UnavailableSource {
    fn acquire(
        self: Box<Self>,
        _constraints: &StreamConstraints,
    ) -> Result<Box<dyn MediaCapture>, Error> {
        Err(Error::MediaNotAllowed(self.reason))
    }
}

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

fn next_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// One track of a stream. Clones share the same live flag.
#[derive(Clone, Debug)]
pub struct MediaTrack {
    id: u64,
    label: String,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    fn new(label: String) -> Self {
        Self { id: next_id(), label, live: Arc::new(AtomicBool::new(true)) }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> &'static str {
        "video"
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    /// Idempotent.
    pub fn stop(&self) {
        self.live.store(false, Ordering::Release);
    }
}

/// A live stream shared read-only by every surface it is bound to.
#[derive(Clone, Debug)]
pub struct MediaStream {
    id: u64,
    resolution: (u32, u32),
    tracks: Vec<MediaTrack>,
    latest: Arc<Mutex<Option<FrameBuffer>>>,
}

impl MediaStream {
    pub fn new(label: String, resolution: (u32, u32)) -> Self {
        Self {
            id: next_id(),
            resolution,
            tracks: vec![MediaTrack::new(label)],
            latest: Arc::new(Mutex::new(None)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn resolution(&self) -> (u32, u32) {
        self.resolution
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// True while at least one track is live.
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn stop_all(&self) {
        for t in &self.tracks {
            t.stop();
        }
    }

    /// Replace the current frame. Frames published after the stream stops are dropped.
    pub fn publish(&self, frame: FrameBuffer) {
        if !self.is_active() {
            return;
        }
        if let Ok(mut slot) = self.latest.lock() {
            *slot = Some(frame);
        }
    }

    /// True when no handle other than this one is left.
    fn is_orphaned(&self) -> bool {
        Arc::strong_count(&self.latest) == 1
    }

    /// Most recent frame, if any has arrived yet.
    pub fn latest_frame(&self) -> Option<FrameBuffer> {
        self.latest.lock().ok().and_then(|f| f.clone())
    }
}

#[derive(Debug)]
pub enum MediaOutcome {
    Ready(MediaStream),
    Unavailable(Error),
}

/// The caller's end of an in-flight request.
pub struct PendingMedia {
    rx: Option<Receiver<MediaOutcome>>,
    immediate: Option<MediaOutcome>,
}

impl PendingMedia {
    /// Non-blocking. Yields the outcome exactly once.
    pub fn poll(&mut self) -> Option<MediaOutcome> {
        if let Some(outcome) = self.immediate.take() {
            return Some(outcome);
        }
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(outcome) => {
                self.rx = None;
                Some(outcome)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(MediaOutcome::Unavailable(Error::CameraInit(
                    "capture thread exited without a result".into(),
                )))
            }
        }
    }
}

/// Start acquiring `source` without blocking the caller.
///
/// The capture thread keeps pulling frames into the stream until every track
/// is stopped (or every other handle is dropped), then releases the source.
/// There is no timeout on `acquire`.
pub fn request(source: Box<dyn MediaSource>, constraints: StreamConstraints) -> PendingMedia {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("media-capture".into())
        .spawn(move || capture_loop(source, constraints, tx));

    match spawned {
        Ok(_) => PendingMedia { rx: Some(rx), immediate: None },
        Err(e) => PendingMedia {
            rx: None,
            immediate: Some(MediaOutcome::Unavailable(Error::MediaNotAllowed(format!(
                "spawn capture thread: {e}"
            )))),
        },
    }
}

fn capture_loop(
    source: Box<dyn MediaSource>,
    constraints: StreamConstraints,
    tx: mpsc::Sender<MediaOutcome>,
) {
    // 1) Open the device here; the capture handle never leaves this thread.
    let label = source.label();
    let mut capture = match source.acquire(&constraints) {
        Ok(capture) => capture,
        Err(e) => {
            let _ = tx.send(MediaOutcome::Unavailable(e));
            return;
        }
    };

    // 2) Hand the stream to whoever asked.
    let stream = MediaStream::new(label, capture.resolution());
    if tx.send(MediaOutcome::Ready(stream.clone())).is_err() {
        // Nobody is left to bind the stream.
        tracing::debug!("media request abandoned; releasing capture");
        capture.release();
        return;
    }

    // 3) Pump frames until every track is stopped or the widget is gone.
    while stream.is_active() && !stream.is_orphaned() {
        match capture.next_frame() {
            Ok(frame) => stream.publish(frame),
            Err(e) => {
                tracing::warn!(error = %e, "camera stream ended");
                stream.stop_all();
            }
        }
    }
    capture.release();
    tracing::debug!(stream = stream.id(), "capture thread finished");
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::time::{Duration, Instant};

    /// Scripted source: optionally fails, otherwise emits solid frames.
    pub struct ScriptedSource {
        pub fail: Option<Error>,
        pub color: u32,
        pub size: (u32, u32),
        pub released: Arc<AtomicBool>,
    }

    impl ScriptedSource {
        pub fn working(color: u32) -> Self {
            Self { fail: None, color, size: (8, 6), released: Arc::new(AtomicBool::new(false)) }
        }

        pub fn failing(err: Error) -> Self {
            Self { fail: Some(err), ..Self::working(0) }
        }
    }

    struct ScriptedCapture {
        color: u32,
        size: (u32, u32),
        released: Arc<AtomicBool>,
    }

    impl MediaSource for ScriptedSource {
        fn acquire(
            self: Box<Self>,
            _c: &StreamConstraints,
        ) -> Result<Box<dyn MediaCapture>, Error> {
            let this = *self;
            match this.fail {
                Some(e) => Err(e),
                None => Ok(Box::new(ScriptedCapture {
                    color: this.color,
                    size: this.size,
                    released: this.released,
                })),
            }
        }
    }

    impl MediaCapture for ScriptedCapture {
        fn resolution(&self) -> (u32, u32) {
            self.size
        }

        fn next_frame(&mut self) -> Result<FrameBuffer, Error> {
            thread::sleep(Duration::from_millis(2));
            Ok(FrameBuffer::filled(self.size.0 as usize, self.size.1 as usize, self.color))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::Release);
        }
    }

    /// Spin until `check` holds or two seconds pass.
    pub fn wait_until(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        check()
    }
}
