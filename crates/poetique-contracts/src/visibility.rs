use std::collections::BTreeMap;

/// Which model answers are expanded, keyed by zero-based question position.
///
/// Absent keys are hidden. Purely presentational; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerVisibility {
    shown: BTreeMap<usize, bool>,
}

/// Exact copy of a visibility map, used to undo a temporary override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilitySnapshot(BTreeMap<usize, bool>);

impl AnswerVisibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self, idx: usize) -> bool {
        self.shown.get(&idx).copied().unwrap_or(false)
    }

    /// Flips one question and returns its new visibility.
    pub fn toggle(&mut self, idx: usize) -> bool {
        let next = !self.is_visible(idx);
        self.shown.insert(idx, next);
        next
    }

    pub fn reveal_all(&mut self, count: usize) {
        self.shown = (0..count).map(|idx| (idx, true)).collect();
    }

    pub fn visible_indices(&self) -> Vec<usize> {
        self.shown
            .iter()
            .filter(|(_, visible)| **visible)
            .map(|(idx, _)| *idx)
            .collect()
    }

    pub fn snapshot(&self) -> VisibilitySnapshot {
        VisibilitySnapshot(self.shown.clone())
    }

    pub fn restore(&mut self, snapshot: VisibilitySnapshot) {
        self.shown = snapshot.0;
    }
}

#[cfg(test)]
mod tests {
    use super::AnswerVisibility;

    #[test]
    fn defaults_to_hidden_and_toggles_independently() {
        let mut visibility = AnswerVisibility::new();
        assert!(!visibility.is_visible(0));
        assert!(visibility.toggle(1));
        assert!(visibility.is_visible(1));
        assert!(!visibility.is_visible(0));
        assert!(!visibility.is_visible(2));
        assert!(!visibility.toggle(1));
        assert!(visibility.visible_indices().is_empty());
    }

    #[test]
    fn snapshot_restores_exact_map_after_reveal_all() {
        let mut visibility = AnswerVisibility::new();
        visibility.toggle(2);
        visibility.toggle(0);
        visibility.toggle(0);
        let before = visibility.clone();

        let snapshot = visibility.snapshot();
        visibility.reveal_all(3);
        assert_eq!(visibility.visible_indices(), vec![0, 1, 2]);

        visibility.restore(snapshot);
        assert_eq!(visibility, before);
    }

    #[test]
    fn reveal_all_with_no_questions_is_empty() {
        let mut visibility = AnswerVisibility::new();
        visibility.toggle(4);
        visibility.reveal_all(0);
        assert!(visibility.visible_indices().is_empty());
    }
}
