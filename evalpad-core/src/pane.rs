/// The slice of an editor widget the session depends on: read and write
/// the text and find out whether the user changed it since the last look.
pub trait TextPane {
    fn value(&self) -> &str;

    /// Replace the content programmatically. Does not count as a user edit.
    fn set_value(&mut self, value: String);

    /// `true` once after each user edit.
    fn take_changed(&mut self) -> bool;
}

/// In-memory pane. The UI edits [`buffer_mut`](Self::buffer_mut) directly
/// and reports edits with [`mark_changed`](Self::mark_changed).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferPane {
    text: String,
    changed: bool,
    read_only: bool,
}

impl BufferPane {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            changed: false,
            read_only: false,
        }
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Self::default()
        }
    }

    pub fn buffer_mut(&mut self) -> &mut String {
        &mut self.text
    }

    /// Simulates or records a user edit.
    pub fn edit(&mut self, text: impl Into<String>) {
        if self.read_only {
            return;
        }
        self.text = text.into();
        self.changed = true;
    }

    pub fn mark_changed(&mut self) {
        if !self.read_only {
            self.changed = true;
        }
    }
}

impl TextPane for BufferPane {
    fn value(&self) -> &str {
        &self.text
    }

    fn set_value(&mut self, value: String) {
        self.text = value;
    }

    fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_sets_changed_once() {
        let mut pane = BufferPane::new("a");
        pane.edit("ab");
        assert!(pane.take_changed());
        assert!(!pane.take_changed());
        assert_eq!(pane.value(), "ab");
    }

    #[test]
    fn test_programmatic_set_is_not_an_edit() {
        let mut pane = BufferPane::new("");
        pane.set_value("output".into());
        assert!(!pane.take_changed());
    }

    #[test]
    fn test_read_only_ignores_edits() {
        let mut pane = BufferPane::read_only();
        pane.edit("x");
        pane.mark_changed();
        assert_eq!(pane.value(), "");
        assert!(!pane.take_changed());
    }
}
