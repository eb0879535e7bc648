//! Keyboard navigation over the candidate list.
//!
//! The cursor is either on the input field or on a row. Up/Down walk the
//! rows and wrap through the input field at both ends; Enter on a row asks
//! for that row to be selected. Everything here is a pure function of
//! (cursor, key, row count).

/// Directional and confirm keys the list understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Enter,
}

/// Where keyboard focus is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Cursor {
    /// Focus on the input field, nothing highlighted
    #[default]
    Input,
    /// Row `n` highlighted
    Row(usize),
}

impl Cursor {
    /// Integer form: `-1` for the input field, the row index otherwise.
    #[cfg(test)]
    pub fn as_index(self) -> isize {
        match self {
            Cursor::Input => -1,
            Cursor::Row(row) => row as isize,
        }
    }

    #[cfg(test)]
    pub fn from_index(index: isize) -> Self {
        usize::try_from(index).map_or(Cursor::Input, Cursor::Row)
    }

    pub fn row(self) -> Option<usize> {
        match self {
            Cursor::Input => None,
            Cursor::Row(row) => Some(row),
        }
    }
}

/// Result of one key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub cursor: Cursor,
    /// Row to select, emitted by Enter on a highlighted row
    pub selected: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionIndex {
    cursor: Cursor,
}

impl SelectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Back to the input field; used whenever the list is replaced.
    pub fn reset(&mut self) {
        self.cursor = Cursor::Input;
    }

    /// Apply `key` and return the row to select, if any.
    pub fn apply(&mut self, key: NavKey, count: usize) -> Option<usize> {
        let transition = Self::step(self.cursor, key, count);
        self.cursor = transition.cursor;
        transition.selected
    }

    /// The transition table.
    pub fn step(cursor: Cursor, key: NavKey, count: usize) -> Transition {
        // A row past the end can only be left over from a shrunken list.
        let cursor = match cursor {
            Cursor::Row(row) if row >= count => Cursor::Input,
            other => other,
        };

        let moved = |cursor| Transition {
            cursor,
            selected: None,
        };

        match (key, cursor) {
            (NavKey::Up, Cursor::Row(0)) => moved(Cursor::Input),
            (NavKey::Up, Cursor::Row(row)) => moved(Cursor::Row(row - 1)),
            (NavKey::Up, Cursor::Input) if count > 0 => moved(Cursor::Row(count - 1)),
            (NavKey::Up, Cursor::Input) => moved(Cursor::Input),

            (NavKey::Down, Cursor::Input) if count > 0 => moved(Cursor::Row(0)),
            (NavKey::Down, Cursor::Input) => moved(Cursor::Input),
            (NavKey::Down, Cursor::Row(row)) if row + 1 < count => moved(Cursor::Row(row + 1)),
            (NavKey::Down, Cursor::Row(_)) => moved(Cursor::Input),

            (NavKey::Enter, Cursor::Row(row)) => Transition {
                cursor,
                selected: Some(row),
            },
            (NavKey::Enter, Cursor::Input) => moved(Cursor::Input),
        }
    }
}
