//! Frame deduplication by media timestamp.

/// Lets each distinct video frame through exactly once.
///
/// The render loop usually ticks faster than the camera delivers frames, so
/// the same decoded frame shows up on several consecutive ticks. This is an
/// equality check, not a monotonic one: any timestamp different from the last
/// processed one passes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameGate {
    last_processed: Option<f64>,
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true, and records `timestamp`, iff it differs from the last
    /// processed timestamp.
    pub fn should_process(&mut self, timestamp: f64) -> bool {
        if self.last_processed == Some(timestamp) {
            return false;
        }
        self.last_processed = Some(timestamp);
        true
    }

    pub fn last_processed(&self) -> Option<f64> {
        self.last_processed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_processes() {
        let mut gate = FrameGate::new();
        assert_eq!(gate.last_processed(), None);
        assert!(gate.should_process(0.0));
        assert_eq!(gate.last_processed(), Some(0.0));
    }

    #[test]
    fn test_repeated_timestamp_skipped() {
        let mut gate = FrameGate::new();
        assert!(gate.should_process(33.3));
        assert!(!gate.should_process(33.3));
        assert!(!gate.should_process(33.3));
        assert_eq!(gate.last_processed(), Some(33.3));
    }

    #[test]
    fn test_advancing_timestamps() {
        let mut gate = FrameGate::new();
        for t in [0.0, 33.3, 66.7, 100.0] {
            assert!(gate.should_process(t));
            assert_eq!(gate.last_processed(), Some(t));
        }
    }

    #[test]
    fn test_any_change_processes() {
        // A rewound media clock is a different frame, not a stale one
        let mut gate = FrameGate::new();
        assert!(gate.should_process(100.0));
        assert!(gate.should_process(50.0));
        assert_eq!(gate.last_processed(), Some(50.0));
    }
}
