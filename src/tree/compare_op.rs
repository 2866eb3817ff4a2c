//! Comparison operators accepted by range queries.

use std::fmt;
use std::str::FromStr;

use crate::common::Error;

/// Operator of a [`BPlusTree::range`](super::BPlusTree::range) query.
///
/// Records match when `record_key <op> probe_key` holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
    Equal,
    NotEqual,
}

impl CompareOp {
    /// All operators, in the order their symbols are documented.
    pub const ALL: [CompareOp; 6] = [
        CompareOp::Less,
        CompareOp::LessOrEqual,
        CompareOp::Greater,
        CompareOp::GreaterOrEqual,
        CompareOp::Equal,
        CompareOp::NotEqual,
    ];

    /// The operator's symbol, e.g. `"<="`.
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Equal => "==",
            CompareOp::NotEqual => "!=",
        }
    }

    /// Whether `record_key <op> probe` holds.
    pub fn matches(self, record_key: &[u8], probe: &[u8]) -> bool {
        match self {
            CompareOp::Less => record_key < probe,
            CompareOp::LessOrEqual => record_key <= probe,
            CompareOp::Greater => record_key > probe,
            CompareOp::GreaterOrEqual => record_key >= probe,
            CompareOp::Equal => record_key == probe,
            CompareOp::NotEqual => record_key != probe,
        }
    }
}

impl FromStr for CompareOp {
    type Err = Error;

    /// Parse an operator symbol; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let symbol = s.trim();
        CompareOp::ALL
            .into_iter()
            .find(|op| op.symbol() == symbol)
            .ok_or_else(|| Error::UnsupportedOperator(symbol.to_string()))
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_symbols() {
        for op in CompareOp::ALL {
            assert_eq!(op.symbol().parse::<CompareOp>().unwrap(), op);
            assert_eq!(op.to_string(), op.symbol());
        }
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(" >= ".parse::<CompareOp>().unwrap(), CompareOp::GreaterOrEqual);
    }

    #[test]
    fn test_parse_rejects_unknown() {
        for bad in ["=", "=>", "<>", "", "lt"] {
            match bad.parse::<CompareOp>() {
                Err(Error::UnsupportedOperator(symbol)) => assert_eq!(symbol, bad.trim()),
                other => panic!("Expected UnsupportedOperator for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_matches() {
        assert!(CompareOp::Less.matches(b"a", b"b"));
        assert!(!CompareOp::Less.matches(b"b", b"b"));
        assert!(CompareOp::LessOrEqual.matches(b"b", b"b"));
        assert!(CompareOp::Greater.matches(b"c", b"b"));
        assert!(CompareOp::GreaterOrEqual.matches(b"b", b"b"));
        assert!(CompareOp::Equal.matches(b"b", b"b"));
        assert!(CompareOp::NotEqual.matches(b"a", b"b"));
        // byte-wise: a shorter prefix sorts first
        assert!(CompareOp::Less.matches(b"key", b"key0"));
    }
}
