use crate::sync::{ItemStatus, SyncEvent};
use covid_core::WorkKey;
use std::collections::{HashMap, VecDeque};
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct TransferSnapshot {
    /// Items scheduled for fetching.
    pub total_items: u64,
    /// Expected files already on disk, never scheduled.
    pub present_items: u64,
    pub written_items: u64,
    pub skipped_items: u64,
    pub failed_items: u64,
    pub written_bytes: u64,
    /// Moving average over the last few half-second ticks.
    pub speed_bps: u64,
    pub in_flight: Vec<WorkKey>,
}

impl TransferSnapshot {
    pub fn completed_items(&self) -> u64 {
        self.written_items + self.skipped_items + self.failed_items
    }
}

/// Folds [`SyncEvent`]s into a snapshot suitable for a progress display.
pub struct ProgressTracker {
    in_flight: HashMap<usize, WorkKey>,
    total_items: u64,
    present_items: u64,
    written_items: u64,
    skipped_items: u64,
    failed_items: u64,
    written_bytes: u64,
    last_tick: Instant,
    bytes_since_last_tick: u64,
    speed_bps: u64,
    history: VecDeque<u64>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
            total_items: 0,
            present_items: 0,
            written_items: 0,
            skipped_items: 0,
            failed_items: 0,
            written_bytes: 0,
            last_tick: Instant::now(),
            bytes_since_last_tick: 0,
            speed_bps: 0,
            history: VecDeque::new(),
        }
    }

    pub fn update(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Planned { pending, present } => {
                self.total_items = pending as u64;
                self.present_items = present as u64;
            }
            SyncEvent::Started { id, key } => {
                self.in_flight.insert(id, key);
            }
            SyncEvent::Completed { id, status } => {
                self.in_flight.remove(&id);
                match status {
                    ItemStatus::Written { bytes } => {
                        self.written_items += 1;
                        self.written_bytes += bytes;
                        self.bytes_since_last_tick += bytes;
                    }
                    ItemStatus::Skipped => self.skipped_items += 1,
                    ItemStatus::Failed => self.failed_items += 1,
                }
            }
        }
    }

    pub fn get_snapshot(&mut self) -> TransferSnapshot {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_tick).as_secs_f64();

        if elapsed >= 0.5 {
            let current_bps = (self.bytes_since_last_tick as f64 / elapsed) as u64;
            self.history.push_back(current_bps);
            if self.history.len() > 5 {
                self.history.pop_front();
            }
            self.speed_bps =
                (self.history.iter().sum::<u64>() as f64 / self.history.len() as f64) as u64;
            self.last_tick = now;
            self.bytes_since_last_tick = 0;
        }

        let mut in_flight: Vec<WorkKey> = self.in_flight.values().cloned().collect();
        in_flight.sort_by_key(|k| k.to_string());

        TransferSnapshot {
            total_items: self.total_items,
            present_items: self.present_items,
            written_items: self.written_items,
            skipped_items: self.skipped_items,
            failed_items: self.failed_items,
            written_bytes: self.written_bytes,
            speed_bps: self.speed_bps,
            in_flight,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_follow_events() {
        let mut tracker = ProgressTracker::new();
        tracker.update(SyncEvent::Planned {
            pending: 3,
            present: 5,
        });
        tracker.update(SyncEvent::Started {
            id: 0,
            key: WorkKey::Name("a.csv".into()),
        });
        tracker.update(SyncEvent::Started {
            id: 1,
            key: WorkKey::Name("b.csv".into()),
        });
        tracker.update(SyncEvent::Completed {
            id: 0,
            status: ItemStatus::Written { bytes: 120 },
        });

        let snap = tracker.get_snapshot();
        assert_eq!(snap.total_items, 3);
        assert_eq!(snap.present_items, 5);
        assert_eq!(snap.written_items, 1);
        assert_eq!(snap.written_bytes, 120);
        assert_eq!(snap.in_flight, vec![WorkKey::Name("b.csv".into())]);

        tracker.update(SyncEvent::Completed {
            id: 1,
            status: ItemStatus::Failed,
        });
        let snap = tracker.get_snapshot();
        assert_eq!(snap.failed_items, 1);
        assert_eq!(snap.completed_items(), 2);
        assert!(snap.in_flight.is_empty());
    }

    #[test]
    fn speed_is_averaged_over_ticks() {
        let mut tracker = ProgressTracker::new();
        tracker.update(SyncEvent::Completed {
            id: 0,
            status: ItemStatus::Written { bytes: 4_000 },
        });
        // No tick has elapsed yet.
        assert_eq!(tracker.get_snapshot().speed_bps, 0);

        std::thread::sleep(std::time::Duration::from_millis(600));
        let first = tracker.get_snapshot().speed_bps;
        assert!(first > 0 && first <= 4_000 * 2, "speed {first}");

        // An idle tick pulls the average down.
        std::thread::sleep(std::time::Duration::from_millis(600));
        let second = tracker.get_snapshot().speed_bps;
        assert!(second < first, "speed {second} after {first}");
        assert_eq!(tracker.get_snapshot().written_bytes, 4_000);
    }
}
