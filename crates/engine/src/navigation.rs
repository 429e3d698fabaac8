//! Keyboard navigation and inline editing for the grid.
//!
//! The cursor addresses visible positions (row in the filtered view, column
//! in header order). Edits capture the data row when they start, so a
//! re-sort while typing cannot redirect the commit.

use crate::cell::CellValue;
use crate::dataset::normalize_header;
use crate::grid::{Grid, GridError};

/// Columns whose editor accepts newlines (Ctrl+Enter commits)
pub const MULTILINE_COLUMNS: &[&str] = &["комментарий", "адрес"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: usize,
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub data_row: usize,
    pub column: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers { ctrl: false, shift: false };
    pub const CTRL: Modifiers = Modifiers { ctrl: true, shift: false };
    pub const CTRL_SHIFT: Modifiers = Modifiers { ctrl: true, shift: true };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Escape,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyInput {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyInput {
    pub fn plain(key: Key) -> Self {
        Self { key, modifiers: Modifiers::NONE }
    }

    pub fn ctrl(key: Key) -> Self {
        Self { key, modifiers: Modifiers::CTRL }
    }

    pub fn ctrl_shift(key: Key) -> Self {
        Self { key, modifiers: Modifiers::CTRL_SHIFT }
    }

    fn is_filter_shortcut(&self) -> bool {
        self.modifiers.ctrl
            && self.modifiers.shift
            && matches!(self.key, Key::Char(c) if c.eq_ignore_ascii_case(&'l'))
    }
}

/// What the front end should do after a key was handled
#[derive(Debug, Clone, PartialEq)]
pub enum GridAction {
    None,
    CursorMoved(Cursor),
    EditStarted { data_row: usize, column: String },
    EditChanged,
    EditCommitted { data_row: usize, column: String, previous: CellValue },
    EditCancelled,
    OpenFilter { column: String },
}

pub fn is_multiline_column(column: &str) -> bool {
    let name = normalize_header(column);
    MULTILINE_COLUMNS.iter().any(|c| name.contains(c))
}

impl Grid {
    pub fn handle_key(&mut self, input: KeyInput) -> Result<GridAction, GridError> {
        if input.is_filter_shortcut() {
            return Ok(match self.cursor_column() {
                Some(column) => GridAction::OpenFilter { column },
                None => GridAction::None,
            });
        }

        if self.edit.is_some() {
            return self.handle_edit_key(input);
        }

        match input.key {
            Key::Up => Ok(self.move_cursor(-1, 0)),
            Key::Down => Ok(self.move_cursor(1, 0)),
            Key::Left => Ok(self.move_cursor(0, -1)),
            Key::Right => Ok(self.move_cursor(0, 1)),
            Key::Enter => Ok(self.start_edit()),
            Key::Escape | Key::Backspace | Key::Char(_) => Ok(GridAction::None),
        }
    }

    fn handle_edit_key(&mut self, input: KeyInput) -> Result<GridAction, GridError> {
        let Some(edit) = self.edit.as_mut() else {
            return Ok(GridAction::None);
        };

        match input.key {
            Key::Escape => {
                self.edit = None;
                Ok(GridAction::EditCancelled)
            }
            Key::Enter if is_multiline_column(&edit.column) && !input.modifiers.ctrl => {
                edit.text.push('\n');
                Ok(GridAction::EditChanged)
            }
            Key::Enter => self.commit_edit(),
            Key::Backspace => {
                edit.text.pop();
                Ok(GridAction::EditChanged)
            }
            Key::Char(c) if !input.modifiers.ctrl => {
                edit.text.push(c);
                Ok(GridAction::EditChanged)
            }
            _ => Ok(GridAction::None),
        }
    }

    fn cursor_column(&self) -> Option<String> {
        self.headers().get(self.cursor.col).cloned()
    }

    fn move_cursor(&mut self, d_row: isize, d_col: isize) -> GridAction {
        let rows = self.visible_rows().len();
        let cols = self.headers().len();
        if rows == 0 || cols == 0 {
            return GridAction::None;
        }
        let before = self.cursor;
        self.cursor.row = step(self.cursor.row, d_row, rows);
        self.cursor.col = step(self.cursor.col, d_col, cols);
        if self.cursor == before {
            GridAction::None
        } else {
            GridAction::CursorMoved(self.cursor)
        }
    }

    fn start_edit(&mut self) -> GridAction {
        let Some(data_row) = self.view().nth_visible(self.cursor.row) else {
            return GridAction::None;
        };
        let Some(column) = self.cursor_column() else {
            return GridAction::None;
        };
        let text = self.dataset().row(data_row).map(|r| r.text(&column)).unwrap_or_default();
        self.edit = Some(EditBuffer { data_row, column: column.clone(), text });
        GridAction::EditStarted { data_row, column }
    }

    fn commit_edit(&mut self) -> Result<GridAction, GridError> {
        let Some(edit) = self.edit.take() else {
            return Ok(GridAction::None);
        };
        let previous = self.edit_cell(edit.data_row, &edit.column, &edit.text)?;
        Ok(GridAction::EditCommitted { data_row: edit.data_row, column: edit.column, previous })
    }
}

fn step(pos: usize, delta: isize, len: usize) -> usize {
    let max = len.saturating_sub(1);
    pos.saturating_add_signed(delta).min(max)
}
