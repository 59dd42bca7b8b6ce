//! In-memory, append-only record of the lines entered at the prompt.

use crate::error::HistoryError;

/// Ordered log of raw command lines, addressed by 1-based index.
///
/// Entries are never edited or removed, so the index handed out by
/// [`HistoryLog::record`] stays valid for the lifetime of the log.
#[derive(Debug, Clone, Default)]
pub struct HistoryLog {
    entries: Vec<String>,
}

impl HistoryLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `line` verbatim and return its 1-based index.
    pub fn record(&mut self, line: impl Into<String>) -> usize {
        self.entries.push(line.into());
        self.entries.len()
    }

    /// Number of recorded lines, which is also the newest index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` before the first line is recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `last_n` entries, oldest first, paired with their indices.
    ///
    /// Asking for more entries than exist yields the whole log.
    pub fn range(&self, last_n: usize) -> impl Iterator<Item = (usize, &str)> {
        let start = self.entries.len().saturating_sub(last_n);
        self.entries[start..]
            .iter()
            .enumerate()
            .map(move |(offset, line)| (start + offset + 1, line.as_str()))
    }

    /// Every entry, oldest first, paired with its index.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.range(self.entries.len())
    }

    /// Entry at 1-based `index`.
    pub fn get(&self, index: i64) -> Result<&str, HistoryError> {
        let out_of_range = HistoryError::OutOfRange {
            index,
            count: self.entries.len(),
        };
        let position = usize::try_from(index)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or_else(|| out_of_range.clone())?;
        self.entries
            .get(position)
            .map(String::as_str)
            .ok_or(out_of_range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_of(lines: &[&str]) -> HistoryLog {
        let mut log = HistoryLog::new();
        for line in lines {
            log.record(*line);
        }
        log
    }

    #[test]
    fn record_assigns_contiguous_indices() {
        let mut log = HistoryLog::new();
        assert_eq!(log.record("ls"), 1);
        assert_eq!(log.record("help"), 2);
        assert_eq!(log.record("cd .."), 3);
        let listed: Vec<_> = log.iter().collect();
        assert_eq!(listed, vec![(1, "ls"), (2, "help"), (3, "cd ..")]);
    }

    #[test]
    fn blank_lines_are_recorded_too() {
        let log = log_of(&["", "ls"]);
        assert_eq!(log.len(), 2);
        assert_eq!(log.get(1), Ok(""));
    }

    #[test]
    fn range_returns_most_recent_entries() {
        let log = log_of(&["a", "b", "c", "d"]);
        let tail: Vec<_> = log.range(2).collect();
        assert_eq!(tail, vec![(3, "c"), (4, "d")]);
    }

    #[test]
    fn range_clamps_to_available_entries() {
        let log = log_of(&["a", "b"]);
        assert_eq!(log.range(10).count(), 2);
        assert_eq!(log.range(0).count(), 0);
    }

    #[test]
    fn get_is_one_based() {
        let log = log_of(&["first", "second"]);
        assert_eq!(log.get(1), Ok("first"));
        assert_eq!(log.get(2), Ok("second"));
    }

    #[test]
    fn get_rejects_out_of_range_indices() {
        let log = log_of(&["only"]);
        for index in [0, -1, 2] {
            assert_eq!(
                log.get(index),
                Err(HistoryError::OutOfRange { index, count: 1 })
            );
        }
    }
}
