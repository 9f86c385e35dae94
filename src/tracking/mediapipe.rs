//! MediaPipe face landmarker feed
//!
//! Receives JSON-over-UDP packets from the `scripts/face_landmarker.py`
//! helper, which owns the camera and runs the MediaPipe Face Landmarker. Each
//! packet carries the capture timestamp, the facial transformation matrix and
//! the blendshape categories for one camera frame.
//!
//! The receiver is split into a [`VideoSource`] half (the stream position is
//! the newest packet) and a [`LandmarkSource`] half (detection returns the
//! result carried by that packet).

use serde::Deserialize;
use std::net::UdpSocket;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::TrackingConfig;
use crate::error::{FacerigError, TrackingError};
use crate::retarget::PoseMatrix;

use super::source::{LandmarkSource, VideoSource};
use super::types::{Category, FrameHandle, ReadyState, TrackingResult, VideoFrame};

fn default_true() -> bool {
    true
}

/// A single JSON packet from the landmarker helper
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MpPacket {
    /// Capture timestamp of the camera frame (ms)
    pub timestamp_ms: f64,
    /// Whether a face was detected this frame
    #[serde(default = "default_true")]
    pub face_detected: bool,
    /// Facial transformation matrix, 16 values row-major
    #[serde(default)]
    pub transformation_matrix: Option<Vec<f32>>,
    /// Blendshape categories in model order
    #[serde(default)]
    pub blendshapes: Vec<Category>,
}

impl MpPacket {
    /// Convert to a tracking result. No face → empty result.
    pub fn to_tracking_result(&self) -> Result<TrackingResult, TrackingError> {
        if !self.face_detected {
            return Ok(TrackingResult::default());
        }

        let pose = match &self.transformation_matrix {
            Some(data) => Some(PoseMatrix::from_row_major_slice(data).ok_or_else(|| {
                TrackingError::Parse(format!(
                    "transformation_matrix must have 16 values, got {}",
                    data.len()
                ))
            })?),
            None => None,
        };

        let expressions = if self.blendshapes.is_empty() {
            None
        } else {
            Some(self.blendshapes.clone())
        };

        Ok(TrackingResult { pose, expressions })
    }
}

/// Latest packet shared between the two feed halves
#[derive(Debug, Clone, Default)]
pub struct MpData {
    /// Most recently received packet
    pub packet: Option<MpPacket>,
    /// Number of packets accepted so far
    pub frames_received: u64,
}

impl MpData {
    pub fn has_data(&self) -> bool {
        self.packet.is_some()
    }

    /// Replace the current packet, advancing the frame counter.
    pub fn push(&mut self, packet: MpPacket) {
        self.packet = Some(packet);
        self.frames_received += 1;
    }

    /// The current frame, if any packet has arrived.
    pub fn current_frame(&self) -> Option<VideoFrame> {
        self.packet
            .as_ref()
            .map(|p| VideoFrame::new(p.timestamp_ms, FrameHandle(self.frames_received)))
    }
}

pub(crate) fn lock_data(data: &Mutex<MpData>) -> Result<MutexGuard<'_, MpData>, TrackingError> {
    data.lock()
        .map_err(|_| TrackingError::Receiver("tracking data lock poisoned".to_string()))
}

/// MediaPipe JSON-over-UDP receiver
pub struct MpReceiver {
    config: TrackingConfig,
    socket: Option<UdpSocket>,
    data: Arc<Mutex<MpData>>,
}

impl MpReceiver {
    /// Create a new receiver (does not bind yet)
    pub fn new(config: &TrackingConfig) -> Self {
        Self {
            config: config.clone(),
            socket: None,
            data: Arc::new(Mutex::new(MpData::default())),
        }
    }

    /// Bind the UDP socket and start receiving
    pub fn start(&mut self) -> Result<(), FacerigError> {
        let addr = format!("{}:{}", self.config.listen_address, self.config.port);

        let socket = UdpSocket::bind(&addr).map_err(|e| {
            TrackingError::Receiver(format!("Failed to bind to {}: {}", addr, e))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TrackingError::Receiver(format!("Failed to set non-blocking: {}", e))
        })?;

        tracing::info!("MediaPipe receiver listening on {}", addr);
        self.socket = Some(socket);

        Ok(())
    }

    /// Local address of the bound socket
    pub fn local_addr(&self) -> Option<std::net::SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    pub fn is_started(&self) -> bool {
        self.socket.is_some()
    }

    /// Drain all pending datagrams, keeping the newest valid packet.
    ///
    /// Returns the number of packets accepted. Malformed datagrams are logged
    /// and skipped.
    pub fn poll(&self) -> Result<usize, TrackingError> {
        let socket = match &self.socket {
            Some(s) => s,
            None => return Ok(0),
        };

        let mut buf = [0u8; 65536];
        let mut accepted = 0;

        loop {
            match socket.recv(&mut buf) {
                Ok(size) if size > 0 => match serde_json::from_slice::<MpPacket>(&buf[..size]) {
                    Ok(packet) => {
                        lock_data(&self.data)?.push(packet);
                        accepted += 1;
                    }
                    Err(e) => {
                        tracing::warn!("Dropping malformed tracking packet: {}", e);
                    }
                },
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    return Err(TrackingError::Receiver(format!("Receive error: {}", e)));
                }
            }
        }

        Ok(accepted)
    }

    /// Wait until the first packet arrives (stream metadata is known).
    pub async fn wait_for_data(&self) -> Result<(), FacerigError> {
        loop {
            self.poll()?;
            let ready = lock_data(&self.data)?.has_data();
            if ready {
                return Ok(());
            }
            // Small yield to avoid busy-spinning when no data arrives
            tokio::time::sleep(tokio::time::Duration::from_millis(5)).await;
        }
    }

    /// Get a copy of the current data
    pub fn get_data(&self) -> Result<MpData, TrackingError> {
        Ok(lock_data(&self.data)?.clone())
    }

    /// Split into the video half and the detection half.
    pub fn split(self) -> (MpVideoFeed, PacketLandmarker) {
        let landmarker = PacketLandmarker::new(Arc::clone(&self.data));
        (MpVideoFeed { receiver: self }, landmarker)
    }
}

/// Video half of the MediaPipe feed: the newest packet is the current frame.
pub struct MpVideoFeed {
    receiver: MpReceiver,
}

impl VideoSource for MpVideoFeed {
    fn ready_state(&mut self) -> Result<ReadyState, TrackingError> {
        if !self.receiver.is_started() {
            return Ok(ReadyState::HaveNothing);
        }
        self.receiver.poll()?;
        if lock_data(&self.receiver.data)?.has_data() {
            Ok(ReadyState::HaveEnoughData)
        } else {
            Ok(ReadyState::HaveMetadata)
        }
    }

    fn current_frame(&mut self) -> Result<VideoFrame, TrackingError> {
        lock_data(&self.receiver.data)?
            .current_frame()
            .ok_or_else(|| TrackingError::Receiver("no frame received yet".to_string()))
    }
}

/// Detection half of a packet feed: returns the result carried by the packet
/// whose timestamp matches the requested frame.
pub struct PacketLandmarker {
    data: Arc<Mutex<MpData>>,
}

impl PacketLandmarker {
    pub fn new(data: Arc<Mutex<MpData>>) -> Self {
        Self { data }
    }
}

impl LandmarkSource for PacketLandmarker {
    fn detect(
        &mut self,
        _frame: &VideoFrame,
        timestamp_ms: f64,
    ) -> Result<TrackingResult, TrackingError> {
        let data = lock_data(&self.data)?;
        match &data.packet {
            Some(packet) if packet.timestamp_ms == timestamp_ms => packet.to_tracking_result(),
            _ => Err(TrackingError::FrameUnavailable(timestamp_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_row_major() -> Vec<f32> {
        vec![
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]
    }

    fn sample_json(timestamp_ms: f64, face_detected: bool, jaw_open: f32) -> String {
        serde_json::json!({
            "timestamp_ms": timestamp_ms,
            "face_detected": face_detected,
            "transformation_matrix": identity_row_major(),
            "blendshapes": [
                {"category_name": "_neutral", "score": 0.01},
                {"category_name": "jawOpen", "score": jaw_open},
                {"category_name": "mouthSmileLeft", "score": 0.2}
            ]
        })
        .to_string()
    }

    fn test_config() -> TrackingConfig {
        TrackingConfig {
            port: 0,
            auto_launch: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_packet() {
        let pkt: MpPacket = serde_json::from_str(&sample_json(33.0, true, 0.45)).unwrap();
        assert!(pkt.face_detected);
        assert_eq!(pkt.timestamp_ms, 33.0);
        assert_eq!(pkt.blendshapes.len(), 3);
        assert_eq!(pkt.blendshapes[1].name, "jawOpen");

        let result = pkt.to_tracking_result().unwrap();
        assert_eq!(result.pose, Some(PoseMatrix::IDENTITY));
        assert_eq!(result.expressions.unwrap().len(), 3);
    }

    #[test]
    fn test_parse_no_face() {
        let json = r#"{"timestamp_ms":10.0,"face_detected":false}"#;
        let pkt: MpPacket = serde_json::from_str(json).unwrap();
        assert!(pkt.to_tracking_result().unwrap().is_empty());
    }

    #[test]
    fn test_parse_minimal_packet() {
        // face_detected defaults to true, missing outputs stay absent
        let json = r#"{"timestamp_ms":5.0,"blendshapes":[{"category_name":"jawOpen","score":0.3}]}"#;
        let pkt: MpPacket = serde_json::from_str(json).unwrap();
        let result = pkt.to_tracking_result().unwrap();
        assert!(result.pose.is_none());
        assert_eq!(result.expressions.unwrap()[0].score, 0.3);
    }

    #[test]
    fn test_bad_matrix_length() {
        let pkt = MpPacket {
            timestamp_ms: 0.0,
            face_detected: true,
            transformation_matrix: Some(vec![1.0; 9]),
            blendshapes: Vec::new(),
        };
        assert!(matches!(
            pkt.to_tracking_result(),
            Err(TrackingError::Parse(_))
        ));
    }

    #[test]
    fn test_landmarker_matches_timestamp() {
        let data = Arc::new(Mutex::new(MpData::default()));
        let mut landmarker = PacketLandmarker::new(Arc::clone(&data));
        let frame = VideoFrame::new(33.0, FrameHandle(1));

        assert!(matches!(
            landmarker.detect(&frame, 33.0),
            Err(TrackingError::FrameUnavailable(_))
        ));

        data.lock()
            .unwrap()
            .push(serde_json::from_str(&sample_json(33.0, true, 0.5)).unwrap());
        assert!(landmarker.detect(&frame, 33.0).is_ok());
        assert!(landmarker.detect(&frame, 66.0).is_err());
    }

    #[test]
    fn test_udp_feed_receives_latest_packet() {
        let mut receiver = MpReceiver::new(&test_config());
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let (mut video, mut landmarker) = receiver.split();
        assert_eq!(video.ready_state().unwrap(), ReadyState::HaveMetadata);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(sample_json(10.0, true, 0.1).as_bytes(), addr).unwrap();
        sender.send_to(b"{not json", addr).unwrap();
        sender.send_to(sample_json(20.0, true, 0.9).as_bytes(), addr).unwrap();

        // Loopback delivery is asynchronous; give it a moment
        let mut state = ReadyState::HaveMetadata;
        for _ in 0..100 {
            state = video.ready_state().unwrap();
            if state.has_current_data() && video.current_frame().unwrap().timestamp_ms == 20.0 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(state, ReadyState::HaveEnoughData);

        let frame = video.current_frame().unwrap();
        assert_eq!(frame.timestamp_ms, 20.0);

        let result = landmarker.detect(&frame, frame.timestamp_ms).unwrap();
        let jaw = result
            .expressions
            .unwrap()
            .into_iter()
            .find(|c| c.name == "jawOpen")
            .unwrap();
        assert!((jaw.score - 0.9).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_wait_for_data() {
        let mut receiver = MpReceiver::new(&test_config());
        receiver.start().unwrap();
        let addr = receiver.local_addr().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(sample_json(1.0, true, 0.2).as_bytes(), addr).unwrap();

        receiver.wait_for_data().await.unwrap();
        assert_eq!(receiver.get_data().unwrap().frames_received, 1);
    }
}
