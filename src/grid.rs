//! Loose text <-> 9x9 digit grid codec.
//!
//! Text is accepted either as nine lines of (at least) nine digits, with any
//! non-digit noise in between, or as one run of at least 81 digits.

use serde::Serialize;
use thiserror::Error;

pub const SIZE: usize = 9;
pub const CELLS: usize = SIZE * SIZE;

pub type Grid = [[u8; SIZE]; SIZE];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GridError {
    #[error("not enough digits: expected {CELLS}, found {found}")]
    NotEnoughDigits { found: usize },
}

/// Outcome of comparing two textual grids
#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum GridComparison {
    Ok,
    InvalidFormat {
        message: String,
    },
    Mismatch {
        row: usize,
        col: usize,
        expected: u8,
        actual: u8,
    },
}

pub fn parse_grid(text: &str) -> Result<Grid, GridError> {
    if let Some(grid) = parse_lines(text) {
        return Ok(grid);
    }
    parse_flat(text)
}

fn parse_lines(text: &str) -> Option<Grid> {
    let rows: Vec<Vec<u8>> = text
        .lines()
        .map(digits_of)
        .filter(|digits| !digits.is_empty())
        .take(SIZE)
        .collect();

    if rows.len() < SIZE || rows.iter().any(|r| r.len() < SIZE) {
        return None;
    }

    let mut grid = [[0u8; SIZE]; SIZE];
    for (r, row) in rows.iter().enumerate() {
        grid[r].copy_from_slice(&row[..SIZE]);
    }
    Some(grid)
}

fn parse_flat(text: &str) -> Result<Grid, GridError> {
    let digits = digits_of(text);
    if digits.len() < CELLS {
        return Err(GridError::NotEnoughDigits {
            found: digits.len(),
        });
    }

    let mut grid = [[0u8; SIZE]; SIZE];
    for (i, d) in digits.iter().take(CELLS).enumerate() {
        grid[i / SIZE][i % SIZE] = *d;
    }
    Ok(grid)
}

fn digits_of(s: &str) -> Vec<u8> {
    s.bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect()
}

/// Renders a grid as nine lines of nine digits, newline terminated
pub fn render_grid(grid: &Grid) -> String {
    let mut out = String::with_capacity(CELLS + SIZE);
    for row in grid {
        for d in row {
            out.push(char::from(b'0' + d));
        }
        out.push('\n');
    }
    out
}

pub fn compare_grids(expected: &str, actual: &str) -> GridComparison {
    let (expected, actual) = match (parse_grid(expected), parse_grid(actual)) {
        (Ok(e), Ok(a)) => (e, a),
        (Err(e), _) => {
            return GridComparison::InvalidFormat {
                message: format!("expected grid: {e}"),
            };
        }
        (_, Err(e)) => {
            return GridComparison::InvalidFormat {
                message: format!("actual grid: {e}"),
            };
        }
    };

    for row in 0..SIZE {
        for col in 0..SIZE {
            if expected[row][col] != actual[row][col] {
                return GridComparison::Mismatch {
                    row,
                    col,
                    expected: expected[row][col],
                    actual: actual[row][col],
                };
            }
        }
    }
    GridComparison::Ok
}
