//! A1-notation cell coordinates.
//!
//! All sheet addressing (control-panel cells, ledger row ranges) goes through
//! [`CellAddress`] and [`CellRange`]. Rows and columns are 1-based, matching
//! the notation; [`CellAddress::row_index`] and [`CellAddress::column_index`]
//! give the 0-based positions into a [`Grid`].

use thiserror::Error;

use crate::Grid;

/// A1 notation could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid cell address '{0}'")]
pub struct InvalidCellAddress(pub String);

/// Converts a 1-based column number to its letters (`1` → `A`, `27` → `AA`).
pub fn column_letters(column: u32) -> String {
    let mut n = column;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Converts column letters to a 1-based column number (`AA` → `27`).
pub fn column_number(letters: &str) -> Option<u32> {
    if letters.is_empty() {
        return None;
    }
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = (c.to_ascii_uppercase() as u32) - ('A' as u32) + 1;
        acc.checked_mul(26)?.checked_add(digit)
    })
}

/// A single cell, e.g. `C8`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellAddress {
    row: u32,
    column: u32,
}

impl CellAddress {
    /// Creates an address from 1-based row and column numbers.
    pub fn new(row: u32, column: u32) -> Option<Self> {
        (row >= 1 && column >= 1).then_some(Self { row, column })
    }

    /// Builds a fixed address; both coordinates must be at least 1.
    pub(crate) const fn fixed(row: u32, column: u32) -> Self {
        Self { row, column }
    }

    /// Parses A1 notation (`"C8"`, `"aa12"`).
    pub fn parse(a1: &str) -> Result<Self, InvalidCellAddress> {
        let trimmed = a1.trim();
        let split = trimmed
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| InvalidCellAddress(a1.to_string()))?;
        let (letters, digits) = trimmed.split_at(split);
        let column = column_number(letters).ok_or_else(|| InvalidCellAddress(a1.to_string()))?;
        let row: u32 = digits
            .parse()
            .map_err(|_| InvalidCellAddress(a1.to_string()))?;
        Self::new(row, column).ok_or_else(|| InvalidCellAddress(a1.to_string()))
    }

    pub fn row(self) -> u32 {
        self.row
    }

    pub fn column(self) -> u32 {
        self.column
    }

    /// 0-based row position in a [`Grid`].
    pub fn row_index(self) -> usize {
        (self.row - 1) as usize
    }

    /// 0-based column position in a [`Grid`] row.
    pub fn column_index(self) -> usize {
        (self.column - 1) as usize
    }

    /// The cell `columns` to the right of this one.
    pub fn offset_columns(self, columns: u32) -> Self {
        Self {
            row: self.row,
            column: self.column + columns,
        }
    }
}

impl std::fmt::Display for CellAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", column_letters(self.column), self.row)
    }
}

/// A rectangular block of cells, e.g. `B5:J5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// The range covering `width` cells of one row, starting at `start`.
    ///
    /// A zero width is treated as one cell.
    pub fn row_span(start: CellAddress, width: usize) -> Self {
        let extra = width.saturating_sub(1) as u32;
        Self {
            start,
            end: start.offset_columns(extra),
        }
    }

    /// Number of columns covered.
    pub fn width(self) -> usize {
        (self.end.column - self.start.column + 1) as usize
    }
}

impl std::fmt::Display for CellRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// Returns the value at `cell`, or `""` when the grid does not reach it.
///
/// The spreadsheet service omits trailing empty cells and rows, so an
/// out-of-bounds read means "blank".
pub fn cell_value(grid: &Grid, cell: CellAddress) -> &str {
    grid.get(cell.row_index())
        .and_then(|row| row.get(cell.column_index()))
        .map(String::as_str)
        .unwrap_or("")
}
