//! What a worker does with the messages it receives and produces
//!
//! The message loop is generic; a [`WorkerBehaviour`] supplies the two
//! worker-specific steps. Three behaviours ship with the node: the demo
//! producer, a CAN frame source and a per-identifier frame tally.

use crate::bus::{Element, Outgoing};
use crate::core::time::{epoch_micros, TimeProvider};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub trait WorkerBehaviour: Send {
    /// Handle one element popped from the worker's own queue
    fn on_message(&mut self, worker: &str, element: Element);

    /// Build the next outgoing message, or `None` to skip this transmit.
    /// `count` is the worker's message sequence number.
    fn produce(
        &mut self,
        worker: &str,
        count: u64,
        clock: &dyn TimeProvider,
    ) -> Option<Outgoing<'static>>;

    /// One-line state summary logged when the worker stops
    fn summary(&self) -> Option<String> {
        None
    }
}

/// Payload exchanged by demo workers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemoMessage {
    pub name: String,
    pub count: u64,
    pub text: String,
}

/// Publishes a greeting on every transmit and logs whatever it receives
#[derive(Debug, Clone)]
pub struct DemoBehaviour {
    text: String,
    received: BTreeMap<String, u64>,
}

impl Default for DemoBehaviour {
    fn default() -> Self {
        Self::new("hello")
    }
}

impl DemoBehaviour {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received: BTreeMap::new(),
        }
    }

    /// Messages received per sender
    pub fn received(&self) -> &BTreeMap<String, u64> {
        &self.received
    }
}

impl WorkerBehaviour for DemoBehaviour {
    fn on_message(&mut self, worker: &str, element: Element) {
        match element.decode::<DemoMessage>() {
            Ok(message) => {
                log::info!(
                    "[{:<5}] rx \"[{:<5}] {:03} {}\"",
                    worker,
                    message.name,
                    message.count,
                    message.text
                );
                *self.received.entry(message.name).or_insert(0) += 1;
            }
            Err(e) => {
                log::warn!(
                    "[{:<5}] rx unreadable payload \"{}\": {}",
                    worker,
                    String::from_utf8_lossy(element.payload()),
                    e
                );
            }
        }
    }

    fn produce(
        &mut self,
        worker: &str,
        count: u64,
        _clock: &dyn TimeProvider,
    ) -> Option<Outgoing<'static>> {
        let message = DemoMessage {
            name: worker.to_string(),
            count,
            text: self.text.clone(),
        };
        match Outgoing::encode(&message) {
            Ok(outgoing) => Some(outgoing),
            Err(e) => {
                log::error!("[{:<5}] could not build message: {}", worker, e);
                None
            }
        }
    }

    fn summary(&self) -> Option<String> {
        if self.received.is_empty() {
            return None;
        }
        let senders: Vec<String> = self
            .received
            .iter()
            .map(|(name, n)| format!("{}={}", name, n))
            .collect();
        Some(format!("received from {}", senders.join(", ")))
    }
}

/// One CAN frame as captured by the reader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanFrame {
    pub id: u32,
    pub dlc: u8,
    pub data: [u8; 8],
    /// Capture time, microseconds since the Unix epoch
    pub usec: u64,
}

/// Stand-in for the CAN reader: cycles through a set of identifiers and
/// publishes one synthetic frame per transmit
#[derive(Debug, Clone)]
pub struct FrameSource {
    ids: Vec<u32>,
}

impl Default for FrameSource {
    fn default() -> Self {
        Self::new(vec![0x100, 0x101, 0x200, 0x351])
    }
}

impl FrameSource {
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids }
    }

    fn frame(&self, count: u64, usec: u64) -> Option<CanFrame> {
        if self.ids.is_empty() {
            return None;
        }
        let slot = usize::try_from(count % self.ids.len() as u64).ok()?;
        Some(CanFrame {
            id: self.ids[slot],
            dlc: 8,
            data: count.to_le_bytes(),
            usec,
        })
    }
}

impl WorkerBehaviour for FrameSource {
    fn on_message(&mut self, worker: &str, element: Element) {
        log::debug!("[{:<5}] ignoring {} byte message", worker, element.len());
    }

    fn produce(
        &mut self,
        worker: &str,
        count: u64,
        clock: &dyn TimeProvider,
    ) -> Option<Outgoing<'static>> {
        let frame = self.frame(count, epoch_micros(clock.system_time()))?;
        log::trace!("[{:<5}] frame {:03x} #{}", worker, frame.id, count);
        Outgoing::encode(&frame).ok()
    }
}

/// What a [`FrameTally`] knows about one identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    pub count: u64,
    pub last_usec: u64,
    pub last_data: [u8; 8],
    pub last_dlc: u8,
    /// Smallest gap between consecutive frames, once two have been seen
    pub min_gap_usec: Option<u64>,
    pub max_gap_usec: Option<u64>,
}

impl FrameStats {
    fn first(frame: &CanFrame) -> Self {
        Self {
            count: 1,
            last_usec: frame.usec,
            last_data: frame.data,
            last_dlc: frame.dlc,
            min_gap_usec: None,
            max_gap_usec: None,
        }
    }

    fn update(&mut self, frame: &CanFrame) {
        let gap = frame.usec.saturating_sub(self.last_usec);
        self.min_gap_usec = Some(self.min_gap_usec.map_or(gap, |m| m.min(gap)));
        self.max_gap_usec = Some(self.max_gap_usec.map_or(gap, |m| m.max(gap)));
        self.count += 1;
        self.last_usec = frame.usec;
        self.last_data = frame.data;
        self.last_dlc = frame.dlc;
    }
}

/// Aggregating consumer keeping per-identifier frame statistics
///
/// The map belongs to the worker thread running the tally; nothing else
/// reads it while the node runs.
#[derive(Debug, Clone, Default)]
pub struct FrameTally {
    frames: BTreeMap<u32, FrameStats>,
    rejected: u64,
}

impl FrameTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: u32) -> Option<&FrameStats> {
        self.frames.get(&id)
    }

    pub fn identifiers(&self) -> usize {
        self.frames.len()
    }

    pub fn total_frames(&self) -> u64 {
        self.frames.values().map(|s| s.count).sum()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn record(&mut self, frame: &CanFrame) {
        self.frames
            .entry(frame.id)
            .and_modify(|stats| stats.update(frame))
            .or_insert_with(|| FrameStats::first(frame));
    }
}

impl WorkerBehaviour for FrameTally {
    fn on_message(&mut self, worker: &str, element: Element) {
        match element.decode::<CanFrame>() {
            Ok(frame) => self.record(&frame),
            Err(e) => {
                self.rejected += 1;
                log::debug!("[{:<5}] not a frame: {}", worker, e);
            }
        }
    }

    fn produce(
        &mut self,
        _worker: &str,
        _count: u64,
        _clock: &dyn TimeProvider,
    ) -> Option<Outgoing<'static>> {
        None
    }

    fn summary(&self) -> Option<String> {
        let per_id: Vec<String> = self
            .frames
            .iter()
            .map(|(id, stats)| format!("{:03x}:{}", id, stats.count))
            .collect();
        Some(format!(
            "{} frames over {} identifiers [{}], {} rejected",
            self.total_frames(),
            self.identifiers(),
            per_id.join(" "),
            self.rejected
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{Queue, QueueOptions};
    use crate::core::time::MockTimeProvider;
    use std::time::{Duration, UNIX_EPOCH};

    fn delivered(outgoing: Outgoing<'static>) -> Element {
        let queue = Queue::new("t", 1, QueueOptions::default()).unwrap();
        queue.push(outgoing).unwrap();
        queue.pop().unwrap().unwrap()
    }

    #[test]
    fn test_demo_roundtrip_between_workers() {
        let clock = MockTimeProvider::new();
        let mut one = DemoBehaviour::default();
        let mut two = DemoBehaviour::default();

        let element = delivered(one.produce("one", 3, &clock).unwrap());
        let message: DemoMessage = element.decode().unwrap();
        assert_eq!(
            message,
            DemoMessage {
                name: "one".to_string(),
                count: 3,
                text: "hello".to_string()
            }
        );

        two.on_message("two", element);
        assert_eq!(two.received().get("one"), Some(&1));
        assert!(two.summary().unwrap().contains("one=1"));
    }

    #[test]
    fn test_frame_source_cycles_identifiers() {
        let clock = MockTimeProvider::new();
        clock.set_system_time(UNIX_EPOCH + Duration::from_micros(42));
        let mut source = FrameSource::new(vec![0x10, 0x20]);

        let ids: Vec<u32> = (0..4)
            .map(|count| {
                let frame: CanFrame = delivered(source.produce("can", count, &clock).unwrap())
                    .decode()
                    .unwrap();
                assert_eq!(frame.usec, 42);
                frame.id
            })
            .collect();
        assert_eq!(ids, vec![0x10, 0x20, 0x10, 0x20]);

        assert!(FrameSource::new(Vec::new())
            .produce("can", 0, &clock)
            .is_none());
    }

    #[test]
    fn test_tally_tracks_gaps_per_identifier() {
        let mut tally = FrameTally::new();
        let frame = |id, usec| CanFrame {
            id,
            dlc: 8,
            data: [0; 8],
            usec,
        };

        tally.record(&frame(0x100, 1_000));
        tally.record(&frame(0x100, 1_500));
        tally.record(&frame(0x100, 3_500));
        tally.record(&frame(0x200, 2_000));

        let stats = tally.get(0x100).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.last_usec, 3_500);
        assert_eq!(stats.min_gap_usec, Some(500));
        assert_eq!(stats.max_gap_usec, Some(2_000));

        let single = tally.get(0x200).unwrap();
        assert_eq!(single.min_gap_usec, None);
        assert_eq!(tally.identifiers(), 2);
        assert_eq!(tally.total_frames(), 4);
    }

    #[test]
    fn test_tally_counts_rejected_payloads() {
        let mut tally = FrameTally::new();
        tally.on_message("tally", delivered(Outgoing::from_vec(b"junk".to_vec())));

        assert_eq!(tally.rejected(), 1);
        assert_eq!(tally.identifiers(), 0);
        assert!(tally.summary().unwrap().contains("1 rejected"));
    }
}
