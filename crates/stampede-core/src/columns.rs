//! Column-header index for delimited input streams

use std::collections::HashMap;

/// Maps `{%<header>}` tokens to zero-based column positions
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from a header line
    ///
    /// A header that appears twice maps to its last position.
    pub fn index(header_line: &str, delimiter: &str) -> Self {
        let positions = header_line
            .split(delimiter)
            .enumerate()
            .map(|(i, name)| (format!("{{%{}}}", name), i))
            .collect();
        Self { positions }
    }

    /// Whether any header has been indexed
    pub fn has_headers(&self) -> bool {
        !self.positions.is_empty()
    }

    /// Column position for a token
    pub fn lookup(&self, token: &str) -> Option<usize> {
        self.positions.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_headers() {
        let index = ColumnIndex::index("id,name,amount", ",");
        assert!(index.has_headers());
        assert_eq!(index.len(), 3);
        assert_eq!(index.lookup("{%id}"), Some(0));
        assert_eq!(index.lookup("{%name}"), Some(1));
        assert_eq!(index.lookup("{%amount}"), Some(2));
        assert_eq!(index.lookup("{%missing}"), None);
        assert_eq!(index.lookup("name"), None);
    }

    #[test]
    fn test_custom_delimiter_and_duplicates() {
        let index = ColumnIndex::index("a|b|a", "|");
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("{%a}"), Some(2));
        assert_eq!(index.lookup("{%b}"), Some(1));
    }

    #[test]
    fn test_empty_index() {
        let index = ColumnIndex::new();
        assert!(!index.has_headers());
        assert!(index.is_empty());
    }
}
