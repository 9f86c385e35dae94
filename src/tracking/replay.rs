//! Recorded tracking replay
//!
//! Plays back a file of landmarker packets (one JSON object per line, the
//! same format the helper sends over UDP) against a [`Clock`], so the render
//! loop can be driven without a camera.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::error::{FacerigError, TrackingError};
use crate::render::scheduler::Clock;

use super::mediapipe::{lock_data, MpData, MpPacket, PacketLandmarker};
use super::source::VideoSource;
use super::types::{ReadyState, VideoFrame};

/// Parse a replay document. Blank lines are skipped; packets are sorted by
/// timestamp.
pub fn parse_packets(contents: &str) -> Result<Vec<MpPacket>, TrackingError> {
    let mut packets = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let packet: MpPacket = serde_json::from_str(line)
            .map_err(|e| TrackingError::Replay(format!("line {}: {}", idx + 1, e)))?;
        packets.push(packet);
    }

    if packets.is_empty() {
        return Err(TrackingError::Replay("replay contains no packets".to_string()));
    }

    packets.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));
    Ok(packets)
}

/// Video half of a replay: the stream position follows the clock.
pub struct ReplayFeed {
    packets: Vec<MpPacket>,
    cursor: usize,
    clock: Arc<dyn Clock>,
    started_at: Duration,
    data: Arc<Mutex<MpData>>,
}

impl ReplayFeed {
    /// Build a feed from packets, starting playback at the clock's current time.
    pub fn new(packets: Vec<MpPacket>, clock: Arc<dyn Clock>) -> Result<Self, TrackingError> {
        if packets.is_empty() {
            return Err(TrackingError::Replay("replay contains no packets".to_string()));
        }
        let mut packets = packets;
        packets.sort_by(|a, b| a.timestamp_ms.total_cmp(&b.timestamp_ms));

        let started_at = clock.now();
        Ok(Self {
            packets,
            cursor: 0,
            clock,
            started_at,
            data: Arc::new(Mutex::new(MpData::default())),
        })
    }

    /// Load a replay file.
    pub fn from_file<P: AsRef<Path>>(path: P, clock: Arc<dyn Clock>) -> Result<Self, FacerigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TrackingError::Replay(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let packets = parse_packets(&contents)?;
        tracing::info!(
            "Loaded replay {} ({} packets, {:.1}s)",
            path.display(),
            packets.len(),
            duration_ms(&packets) / 1000.0
        );
        Ok(Self::new(packets, clock)?)
    }

    /// Detection half sharing this feed's current packet.
    pub fn landmarker(&self) -> PacketLandmarker {
        PacketLandmarker::new(Arc::clone(&self.data))
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// All packets have been played.
    pub fn is_finished(&self) -> bool {
        self.cursor >= self.packets.len()
    }

    /// Publish every packet whose offset from the first one has elapsed.
    fn advance(&mut self) -> Result<(), TrackingError> {
        let elapsed_ms = (self.clock.now().saturating_sub(self.started_at)).as_secs_f64() * 1000.0;
        let first_ts = self.packets[0].timestamp_ms;

        let mut data = lock_data(&self.data)?;
        while let Some(packet) = self.packets.get(self.cursor) {
            if packet.timestamp_ms - first_ts > elapsed_ms {
                break;
            }
            data.push(packet.clone());
            self.cursor += 1;
        }
        Ok(())
    }
}

fn duration_ms(packets: &[MpPacket]) -> f64 {
    match (packets.first(), packets.last()) {
        (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
        _ => 0.0,
    }
}

impl VideoSource for ReplayFeed {
    fn ready_state(&mut self) -> Result<ReadyState, TrackingError> {
        self.advance()?;
        if lock_data(&self.data)?.has_data() {
            Ok(ReadyState::HaveEnoughData)
        } else {
            Ok(ReadyState::HaveMetadata)
        }
    }

    fn current_frame(&mut self) -> Result<VideoFrame, TrackingError> {
        lock_data(&self.data)?
            .current_frame()
            .ok_or_else(|| TrackingError::Replay("replay has not started".to_string()))
    }
}
