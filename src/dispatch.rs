use crate::clock::Clock;
use crate::cover::CoverArt;
use crate::volume::VolumeOverlay;
use tracing::{debug, warn};

/// Every metadata subtopic the player publishes. All of them are subscribed
/// so reconnects re-establish the full set; only a few drive the display.
pub const KNOWN_SUBTOPICS: &[&str] = &[
    "artist",
    "album",
    "title",
    "genre",
    "cover",
    "songalbum",
    "volume",
    "client_ip",
    "active_start",
    "active_end",
    "play_start",
    "play_end",
    "play_flush",
    "play_resume",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataEvent {
    Cover(Vec<u8>),
    Volume(Vec<u8>),
    ActiveEnd,
    Other { topic: String, payload: Vec<u8> },
}

impl MetadataEvent {
    /// Map a broker message to an event by its subtopic under `topic_root`.
    pub fn from_topic(topic_root: &str, topic: &str, payload: Vec<u8>) -> Self {
        let suffix = topic
            .strip_prefix(topic_root)
            .and_then(|rest| rest.strip_prefix('/'));
        match suffix {
            Some("cover") => MetadataEvent::Cover(payload),
            Some("volume") => MetadataEvent::Volume(payload),
            Some("active_end") => MetadataEvent::ActiveEnd,
            _ => MetadataEvent::Other {
                topic: topic.to_string(),
                payload,
            },
        }
    }
}

/// Routes metadata events to the content sources and encodes the hand-off
/// between them.
///
/// Cover art stops the clock before its first frame (the stop joins the clock
/// worker, so no stale tick can follow), and a session end clears the cover
/// channel before the clock resumes, releasing the priority gate.
pub struct Dispatcher {
    cover: CoverArt,
    volume: VolumeOverlay,
    clock: Clock,
}

impl Dispatcher {
    pub fn new(cover: CoverArt, volume: VolumeOverlay, clock: Clock) -> Self {
        Self {
            cover,
            volume,
            clock,
        }
    }

    /// Start the idle-state clock; called once at startup before any track
    /// is playing.
    pub fn start_idle(&self) {
        self.clock.start();
    }

    pub fn handle(&self, event: MetadataEvent) {
        match event {
            MetadataEvent::Cover(payload) => {
                if payload.is_empty() {
                    debug!("empty cover art payload, blanking display");
                    if let Err(e) = self.cover.end_session() {
                        warn!("failed to blank cover channel: {e}");
                    }
                    return;
                }
                self.clock.stop();
                if let Err(e) = self.cover.show_cover(&payload) {
                    warn!("cover art rejected: {e:#}");
                    if let Err(e) = self.cover.end_session() {
                        warn!("failed to blank cover channel: {e}");
                    }
                }
            }
            MetadataEvent::Volume(payload) => {
                if let Err(e) = self.volume.update(&payload) {
                    warn!("dropping volume update: {e}");
                }
            }
            MetadataEvent::ActiveEnd => {
                if let Err(e) = self.cover.end_session() {
                    warn!("failed to clear cover channel: {e}");
                }
                self.clock.start();
            }
            MetadataEvent::Other { topic, payload } => {
                debug!("ignoring {topic} ({} bytes)", payload.len());
            }
        }
    }
}
