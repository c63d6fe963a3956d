//! Upcoming queue and bounded play history.

use std::collections::VecDeque;

use jukebox_types::TrackDescriptor;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    items: VecDeque<TrackDescriptor>,
    /// Oldest at front, most recent at back.
    history: VecDeque<TrackDescriptor>,
    history_limit: usize,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl PlaybackQueue {
    pub fn new(history_limit: usize) -> Self {
        let history_limit = history_limit.max(1);
        Self {
            items: VecDeque::new(),
            history: VecDeque::with_capacity(history_limit),
            history_limit,
        }
    }

    /// Append to the tail and return the 1-based queue position.
    pub fn enqueue(&mut self, track: TrackDescriptor) -> usize {
        self.items.push_back(track);
        self.items.len()
    }

    /// Put a track back at the head, used when a dequeued start fails.
    pub fn requeue_front(&mut self, track: TrackDescriptor) {
        self.items.push_front(track);
    }

    pub fn dequeue_next(&mut self) -> Option<TrackDescriptor> {
        self.items.pop_front()
    }

    /// Remove the entry at a 0-based index.
    pub fn remove(&mut self, index: usize) -> Option<TrackDescriptor> {
        self.items.remove(index)
    }

    /// Empty the queue and return how many entries were dropped.
    ///
    /// History is left untouched.
    pub fn clear(&mut self) -> usize {
        let removed = self.items.len();
        self.items.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> Vec<TrackDescriptor> {
        self.items.iter().cloned().collect()
    }

    /// Record a played track, evicting the oldest beyond the limit.
    pub fn push_history(&mut self, track: TrackDescriptor) {
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(track);
    }

    /// Take the most recently recorded track.
    pub fn pop_history(&mut self) -> Option<TrackDescriptor> {
        self.history.pop_back()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// History, oldest first.
    pub fn history(&self) -> Vec<TrackDescriptor> {
        self.history.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jukebox_types::RequesterId;

    fn track(title: &str) -> TrackDescriptor {
        TrackDescriptor {
            title: title.to_string(),
            stream_reference: format!("ref:{title}"),
            duration_secs: 180,
            thumbnail_uri: None,
            requester: RequesterId(1),
        }
    }

    #[test]
    fn dequeue_preserves_insertion_order() {
        let mut queue = PlaybackQueue::default();
        assert_eq!(queue.enqueue(track("a")), 1);
        assert_eq!(queue.enqueue(track("b")), 2);
        queue.enqueue(track("c"));

        assert_eq!(queue.dequeue_next().unwrap().title, "a");
        assert_eq!(queue.dequeue_next().unwrap().title, "b");
        assert_eq!(queue.dequeue_next().unwrap().title, "c");
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let mut queue = PlaybackQueue::default();
        for i in 0..25 {
            queue.push_history(track(&format!("t{i}")));
            assert!(queue.history_len() <= DEFAULT_HISTORY_LIMIT);
        }
        let history = queue.history();
        assert_eq!(history.len(), DEFAULT_HISTORY_LIMIT);
        assert_eq!(history.first().unwrap().title, "t15");
        assert_eq!(history.last().unwrap().title, "t24");
    }

    #[test]
    fn pop_history_is_last_in_first_out() {
        let mut queue = PlaybackQueue::default();
        queue.push_history(track("a"));
        queue.push_history(track("b"));
        assert_eq!(queue.pop_history().unwrap().title, "b");
        assert_eq!(queue.pop_history().unwrap().title, "a");
        assert!(queue.pop_history().is_none());
    }

    #[test]
    fn clear_keeps_history() {
        let mut queue = PlaybackQueue::default();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        queue.push_history(track("old"));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.history_len(), 1);
    }

    #[test]
    fn requeue_front_restores_head() {
        let mut queue = PlaybackQueue::default();
        queue.enqueue(track("a"));
        queue.enqueue(track("b"));
        let head = queue.dequeue_next().unwrap();
        queue.requeue_front(head);
        assert_eq!(
            queue.items().iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn custom_history_limit_is_respected() {
        let mut queue = PlaybackQueue::new(2);
        queue.push_history(track("a"));
        queue.push_history(track("b"));
        queue.push_history(track("c"));
        assert_eq!(
            queue.history().iter().map(|t| t.title.as_str()).collect::<Vec<_>>(),
            vec!["b", "c"]
        );
    }
}
