//! A1-style cell references

use std::fmt;

/// Rows in an OOXML worksheet
pub const MAX_ROWS: u32 = 1 << 20;

/// Columns in an OOXML worksheet, `A` through `XFD`
pub const MAX_COLUMNS: u32 = 1 << 14;

/// Zero-based cell position, displayed in A1 notation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Parse `B7`, `b7` or `$B$7`. Positions outside the worksheet grid are
    /// rejected.
    pub fn parse(a1: &str) -> Option<Self> {
        let unmarked = a1.replace('$', "");
        let (letters, digits) = unmarked.split_at(unmarked.find(|c: char| c.is_ascii_digit())?);

        if letters.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let col = letters.bytes().try_fold(0u32, |acc, b| {
            if !b.is_ascii_alphabetic() {
                return None;
            }
            let acc = acc * 26 + u32::from(b.to_ascii_uppercase() - b'A') + 1;
            (acc <= MAX_COLUMNS).then_some(acc)
        })?;
        let row: u32 = digits.parse().ok()?;

        if !(1..=MAX_ROWS).contains(&row) {
            return None;
        }
        Some(Self::new(row - 1, col - 1))
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_label(self.col), u64::from(self.row) + 1)
    }
}

/// Letters for a zero-based column index (0 is `A`, 26 is `AA`)
pub fn column_label(col: u32) -> String {
    // Bijective base 26, A = 1 through Z = 26
    let mut n = u64::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        letters.push(char::from(b'A' + (n % 26) as u8));
        n /= 26;
    }
    letters.iter().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_in_a1_notation() {
        assert_eq!(CellRef::new(0, 0).to_string(), "A1");
        assert_eq!(CellRef::new(4, 25).to_string(), "Z5");
        assert_eq!(CellRef::new(0, 26).to_string(), "AA1");
        assert_eq!(CellRef::new(9, 52).to_string(), "BA10");
        assert_eq!(column_label(MAX_COLUMNS - 1), "XFD");
    }

    #[test]
    fn test_parse() {
        assert_eq!(CellRef::parse("A1"), Some(CellRef::new(0, 0)));
        assert_eq!(CellRef::parse("c7"), Some(CellRef::new(6, 2)));
        assert_eq!(CellRef::parse("$AB$12"), Some(CellRef::new(11, 27)));
        assert_eq!(CellRef::parse("XFD1048576"), Some(CellRef::new(MAX_ROWS - 1, MAX_COLUMNS - 1)));
    }

    #[test]
    fn test_parse_rejects_malformed_and_out_of_grid() {
        for addr in ["", "1A", "A0", "A", "A-1", "B2C", "XFE1", "A1048577", "ZZZZZZZ1", "A99999999999"] {
            assert!(CellRef::parse(addr).is_none(), "{addr} should be rejected");
        }
    }
}
