use crate::error::{Direction, ShellError};
use std::fmt;

/// A resolved URL that was handed to the proxy encoder. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryEntry(String);

impl HistoryEntry {
    pub fn new(url: impl Into<String>) -> Result<Self, ShellError> {
        let url = url.into();
        if url.is_empty() {
            return Err(ShellError::EmptyHistoryEntry);
        }
        Ok(Self(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for HistoryEntry {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Back/forward list with browser semantics: committing while the cursor
/// sits behind the tail discards the forward entries first.
///
/// The cursor moves only through [`commit`](Self::commit),
/// [`back`](Self::back) and [`forward`](Self::forward). Traversal reports the
/// entry to load; it never loads anything itself.
#[derive(Debug, Default, Clone)]
pub struct NavigationHistory {
    entries: Vec<HistoryEntry>,
    cursor: Option<usize>,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commit(&mut self, entry: HistoryEntry) {
        if let Some(cursor) = self.cursor {
            self.entries.truncate(cursor + 1);
        }
        self.entries.push(entry);
        self.cursor = Some(self.entries.len() - 1);
    }

    pub fn back(&mut self) -> Result<&HistoryEntry, ShellError> {
        match self.cursor {
            Some(cursor) if cursor > 0 => {
                self.cursor = Some(cursor - 1);
                Ok(&self.entries[cursor - 1])
            }
            _ => Err(ShellError::NoHistory(Direction::Back)),
        }
    }

    pub fn forward(&mut self) -> Result<&HistoryEntry, ShellError> {
        match self.cursor {
            Some(cursor) if cursor + 1 < self.entries.len() => {
                self.cursor = Some(cursor + 1);
                Ok(&self.entries[cursor + 1])
            }
            _ => Err(ShellError::NoHistory(Direction::Forward)),
        }
    }

    pub fn can_go_back(&self) -> bool {
        self.cursor.is_some_and(|cursor| cursor > 0)
    }

    pub fn can_go_forward(&self) -> bool {
        self.cursor
            .is_some_and(|cursor| cursor + 1 < self.entries.len())
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Index of the current entry, `None` while empty.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.map(|cursor| &self.entries[cursor])
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(url: &str) -> HistoryEntry {
        HistoryEntry::new(url).expect("non-empty url")
    }

    fn urls(history: &NavigationHistory) -> Vec<&str> {
        history.entries().iter().map(HistoryEntry::as_str).collect()
    }

    #[test]
    fn empty_history_has_no_cursor() {
        let history = NavigationHistory::new();
        assert_eq!(history.cursor(), None);
        assert!(history.current().is_none());
        assert!(!history.can_go_back());
        assert!(!history.can_go_forward());
    }

    #[test]
    fn empty_entry_is_rejected() {
        assert!(matches!(
            HistoryEntry::new(""),
            Err(ShellError::EmptyHistoryEntry)
        ));
    }

    #[test]
    fn commit_after_back_truncates_forward_entries() {
        let mut history = NavigationHistory::new();
        history.commit(entry("https://a.test"));
        history.commit(entry("https://b.test"));

        let previous = history.back().expect("back available").clone();
        assert_eq!(previous.as_str(), "https://a.test");
        assert!(history.can_go_forward());

        history.commit(entry("https://c.test"));
        assert!(!history.can_go_forward());
        assert_eq!(urls(&history), vec!["https://a.test", "https://c.test"]);
        assert_eq!(history.cursor(), Some(1));
    }

    #[test]
    fn back_back_forward_matches_browser_semantics() {
        let mut history = NavigationHistory::new();
        for url in ["https://1.test", "https://2.test", "https://3.test"] {
            history.commit(entry(url));
        }

        assert_eq!(history.back().unwrap().as_str(), "https://2.test");
        assert_eq!(history.back().unwrap().as_str(), "https://1.test");
        assert!(!history.can_go_back());
        assert_eq!(history.forward().unwrap().as_str(), "https://2.test");
        assert_eq!(history.cursor(), Some(1));
        assert!(history.can_go_back());
        assert!(history.can_go_forward());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn traversal_without_history_fails_deterministically() {
        let mut history = NavigationHistory::new();
        assert!(matches!(
            history.back(),
            Err(ShellError::NoHistory(Direction::Back))
        ));
        assert!(matches!(
            history.forward(),
            Err(ShellError::NoHistory(Direction::Forward))
        ));

        history.commit(entry("https://only.test"));
        assert!(matches!(
            history.back(),
            Err(ShellError::NoHistory(Direction::Back))
        ));
        assert!(matches!(
            history.forward(),
            Err(ShellError::NoHistory(Direction::Forward))
        ));
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn reset_clears_entries_and_cursor() {
        let mut history = NavigationHistory::new();
        history.commit(entry("https://a.test"));
        history.commit(entry("https://b.test"));
        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.cursor(), None);

        history.commit(entry("https://c.test"));
        assert_eq!(history.cursor(), Some(0));
    }

    #[test]
    fn long_random_walk_keeps_cursor_in_bounds() {
        let mut history = NavigationHistory::new();
        let mut mirror: Vec<String> = Vec::new();
        let mut position: usize = 0;

        for step in 0..200u32 {
            match step % 5 {
                0 | 3 => {
                    let url = format!("https://{step}.test");
                    if !mirror.is_empty() {
                        mirror.truncate(position + 1);
                    }
                    mirror.push(url.clone());
                    position = mirror.len() - 1;
                    history.commit(entry(&url));
                }
                1 | 4 => {
                    if position > 0 {
                        position -= 1;
                        assert_eq!(history.back().unwrap().as_str(), mirror[position]);
                    } else {
                        assert!(history.back().is_err());
                    }
                }
                _ => {
                    if position + 1 < mirror.len() {
                        position += 1;
                        assert_eq!(history.forward().unwrap().as_str(), mirror[position]);
                    } else {
                        assert!(history.forward().is_err());
                    }
                }
            }
            let cursor = history.cursor().expect("non-empty after first commit");
            assert!(cursor < history.len());
            assert_eq!(cursor, position);
        }
    }
}
