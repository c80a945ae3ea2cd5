use std::{collections::VecDeque, sync::Arc};

use rand::seq::SliceRandom;

use crate::protocol::Track;

/// Bounded FIFO of pending tracks.
#[derive(Debug)]
pub struct TrackQueue {
    tracks: VecDeque<Arc<Track>>,
    capacity: usize,
}

impl TrackQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            tracks: VecDeque::new(),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tracks.len() >= self.capacity
    }

    /// Hands the track back when the queue is full.
    pub fn push(&mut self, track: Arc<Track>) -> Result<(), Arc<Track>> {
        if self.is_full() {
            return Err(track);
        }
        self.tracks.push_back(track);
        Ok(())
    }

    /// Appends regardless of capacity. Loop re-appends must never drop the
    /// finished track.
    pub fn push_back_force(&mut self, track: Arc<Track>) {
        self.tracks.push_back(track);
    }

    pub fn push_front(&mut self, track: Arc<Track>) {
        self.tracks.push_front(track);
    }

    pub fn pop_front(&mut self) -> Option<Arc<Track>> {
        self.tracks.pop_front()
    }

    /// Removes by 0-based position.
    pub fn remove(&mut self, index: usize) -> Option<Arc<Track>> {
        self.tracks.remove(index)
    }

    pub fn clear(&mut self) -> usize {
        let n = self.tracks.len();
        self.tracks.clear();
        n
    }

    pub fn shuffle(&mut self) {
        self.tracks
            .make_contiguous()
            .shuffle(&mut rand::thread_rng());
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Track>> {
        self.tracks.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TrackInfo;

    fn track(title: &str) -> Arc<Track> {
        Arc::new(Track::new(TrackInfo {
            title: title.into(),
            duration: 60,
            uri: title.into(),
            thumbnail: None,
            requester: None,
        }))
    }

    #[test]
    fn test_capacity_rejects_without_partial_insert() {
        let mut queue = TrackQueue::new(2);
        assert!(queue.push(track("a")).is_ok());
        assert!(queue.push(track("b")).is_ok());
        let rejected = queue.push(track("c"));
        assert_eq!(rejected.map_err(|t| t.title().to_string()), Err("c".into()));
        assert_eq!(queue.len(), 2);

        queue.push_back_force(track("loop"));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_fifo_order_and_remove() {
        let mut queue = TrackQueue::new(10);
        for t in ["a", "b", "c"] {
            queue.push(track(t)).ok();
        }
        assert_eq!(queue.remove(1).map(|t| t.title().to_string()), Some("b".into()));
        assert!(queue.remove(5).is_none());
        assert_eq!(queue.pop_front().map(|t| t.title().to_string()), Some("a".into()));
        assert_eq!(queue.pop_front().map(|t| t.title().to_string()), Some("c".into()));
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_shuffle_keeps_members() {
        let mut queue = TrackQueue::new(100);
        for i in 0..50 {
            queue.push(track(&i.to_string())).ok();
        }
        queue.shuffle();
        let mut titles: Vec<u32> = queue
            .iter()
            .filter_map(|t| t.title().parse().ok())
            .collect();
        titles.sort_unstable();
        assert_eq!(titles, (0..50).collect::<Vec<_>>());
    }
}
