use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CharPosition {
    pub line_number: i32,
    pub char_column: i32,
}

impl CharPosition {
    pub fn new(line_number: i32, char_column: i32) -> Self {
        Self {
            line_number,
            char_column,
        }
    }
}

/// Source span attached to every parse tree node and every diagnostic.
/// The core compiles a single file, so no file path is carried here;
/// the driver prepends the path when printing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TextLocation {
    pub start_pos: CharPosition,
    pub end_pos: CharPosition,
}

impl TextLocation {
    pub fn new(start: CharPosition, end: CharPosition) -> Self {
        Self {
            start_pos: start,
            end_pos: end,
        }
    }

}

impl PartialOrd for TextLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(
            (self.start_pos.line_number, self.start_pos.char_column).cmp(&(
                other.start_pos.line_number,
                other.start_pos.char_column,
            )),
        )
    }
}

impl fmt::Display for TextLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, column {}",
            self.start_pos.line_number, self.start_pos.char_column
        )
    }
}
