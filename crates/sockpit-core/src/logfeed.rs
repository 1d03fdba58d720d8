use chrono::Local;
use std::collections::VecDeque;

pub const DEFAULT_LOCAL_CAP: usize = 100;
pub const DEFAULT_BACKEND_CAP: usize = 200;

/// Append-only view of the log pane. Backend batches and locally synthesized
/// lines share one buffer but are bounded separately: each append path trims
/// from the front against its own cap, so the effective bound depends on
/// which path appended last.
#[derive(Debug, Clone)]
pub struct LogFeed {
    lines: VecDeque<String>,
    local_cap: usize,
    backend_cap: usize,
}

impl Default for LogFeed {
    fn default() -> Self {
        Self::with_caps(DEFAULT_LOCAL_CAP, DEFAULT_BACKEND_CAP)
    }
}

impl LogFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_caps(local_cap: usize, backend_cap: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            local_cap,
            backend_cap,
        }
    }

    /// Merges a freshly fetched batch into the buffer. The backend re-sends a
    /// sliding window of recent lines on every poll, so each line is appended
    /// only if it is not already present anywhere in the buffer. Lines are
    /// kept in arrival order; nothing is re-sorted. Returns whether the
    /// buffer changed, which is the caller's cue to scroll to the newest
    /// entry.
    pub fn absorb(&mut self, incoming: &[String]) -> bool {
        let mut changed = false;
        for line in incoming {
            if !self.lines.contains(line) {
                self.lines.push_back(line.clone());
                changed = true;
            }
        }
        if changed {
            self.trim_to(self.backend_cap);
        }
        changed
    }

    /// Appends a locally synthesized `[HH:MM:SS] message` line for a
    /// UI-originated event.
    pub fn push_local(&mut self, message: &str) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.lines.push_back(line);
        self.trim_to(self.local_cap);
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    fn trim_to(&mut self, cap: usize) {
        while self.lines.len() > cap {
            self.lines.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| line.to_string()).collect()
    }

    fn contents(feed: &LogFeed) -> Vec<String> {
        feed.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn absorb_appends_only_unseen_lines() {
        let mut feed = LogFeed::new();
        assert!(!feed.absorb(&[]));

        assert!(feed.absorb(&batch(&["[10:00:01] accept", "[10:00:02] relay"])));
        assert!(feed.absorb(&batch(&["[10:00:02] relay", "[10:00:03] close"])));
        assert_eq!(
            contents(&feed),
            batch(&["[10:00:01] accept", "[10:00:02] relay", "[10:00:03] close"])
        );
    }

    #[test]
    fn absorbing_the_same_window_twice_changes_nothing() {
        let mut feed = LogFeed::new();
        let window = batch(&["[10:00:01] accept", "[10:00:02] relay"]);

        assert!(feed.absorb(&window));
        let before = contents(&feed);
        assert!(!feed.absorb(&window));
        assert_eq!(contents(&feed), before);
    }

    #[test]
    fn duplicates_inside_one_batch_collapse() {
        let mut feed = LogFeed::new();
        feed.absorb(&batch(&["same line", "same line", "other line"]));
        assert_eq!(contents(&feed), batch(&["same line", "other line"]));
    }

    #[test]
    fn backend_cap_keeps_the_newest_lines_in_arrival_order() {
        let mut feed = LogFeed::with_caps(3, 4);
        let lines: Vec<String> = (1..=6).map(|n| format!("line {n}")).collect();
        feed.absorb(&lines);

        assert_eq!(feed.len(), 4);
        assert_eq!(contents(&feed), batch(&["line 3", "line 4", "line 5", "line 6"]));
    }

    #[test]
    fn lines_are_not_reordered_by_timestamp() {
        let mut feed = LogFeed::new();
        feed.absorb(&batch(&["[10:00:05] late report", "[10:00:01] early report"]));
        assert_eq!(
            contents(&feed),
            batch(&["[10:00:05] late report", "[10:00:01] early report"])
        );
    }

    #[test]
    fn push_local_stamps_and_trims_to_local_cap() {
        let mut feed = LogFeed::with_caps(2, 10);
        feed.push_local("first");
        feed.push_local("second");
        feed.push_local("third");

        assert_eq!(feed.len(), 2);
        let lines = contents(&feed);
        assert!(lines[0].ends_with("] second"), "got {:?}", lines[0]);
        assert!(lines[1].ends_with("] third"), "got {:?}", lines[1]);
        assert!(lines[1].starts_with('['));
        // "[HH:MM:SS] " is a fixed 11-character prefix.
        assert_eq!(lines[1].len(), 11 + "third".len());
    }

    #[test]
    fn local_and_backend_lines_share_one_buffer() {
        let mut feed = LogFeed::with_caps(2, 4);
        feed.push_local("saved");
        feed.push_local("started");
        feed.absorb(&batch(&["b1", "b2", "b3"]));

        // The backend path trims against its own, larger cap, displacing the
        // oldest local line.
        assert_eq!(feed.len(), 4);
        let lines = contents(&feed);
        assert!(lines[0].ends_with("] started"));
        assert_eq!(&lines[1..], &batch(&["b1", "b2", "b3"])[..]);
    }
}
