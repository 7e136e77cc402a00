//! Resolution of requested field names against the shape of the input.
//!
//! - Tabular input: names are matched case-insensitively against the header
//!   row and resolved once into column indices.
//! - Semi-structured input: names are used as exact-case object keys and
//!   looked up per record.
//!
//! Requested names that match nothing are ignored rather than rejected.
//!
//! # Module invariants
//!
//! - **No crypto dependencies.** This module must not import anything from
//!   `crate::crypto` or `crate::unwrap`.

use std::collections::HashSet;

/// Column indices to encrypt in every row of a tabular input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    /// Ascending, one entry per matching header cell.
    indices: Vec<usize>,
    /// Requested names that matched no header cell.
    unmatched: Vec<String>,
}

impl ColumnSelection {
    /// Resolve `requested` against the header row.
    ///
    /// Every header cell whose lower-cased name equals a lower-cased requested
    /// name is selected, so duplicate header names are all selected.
    pub fn resolve<'a, I>(requested: &[String], header: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let wanted: HashSet<String> = requested.iter().map(|f| f.to_lowercase()).collect();
        let mut seen: HashSet<String> = HashSet::new();
        let mut indices = Vec::new();

        for (index, name) in header.into_iter().enumerate() {
            let lowered = name.to_lowercase();
            if wanted.contains(&lowered) {
                indices.push(index);
                seen.insert(lowered);
            }
        }

        let mut unmatched = Vec::new();
        for name in requested {
            let lowered = name.to_lowercase();
            let reported = unmatched.iter().any(|u: &String| u.to_lowercase() == lowered);
            if !seen.contains(&lowered) && !reported {
                unmatched.push(name.clone());
            }
        }

        Self { indices, unmatched }
    }

    pub fn contains(&self, index: usize) -> bool {
        self.indices.binary_search(&index).is_ok()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn unmatched(&self) -> &[String] {
        &self.unmatched
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Exact-case object keys to encrypt in every JSON record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySelection {
    keys: Vec<String>,
}

impl KeySelection {
    /// Build the selection, dropping duplicate names.
    pub fn new(requested: &[String]) -> Self {
        let mut keys: Vec<String> = Vec::with_capacity(requested.len());
        for name in requested {
            if !keys.contains(name) {
                keys.push(name.clone());
            }
        }
        Self { keys }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn header_match_is_case_insensitive() {
        let sel = ColumnSelection::resolve(
            &names(&["Issuing Bank"]),
            ["Name", "issuing bank", "Card Type Full Name"],
        );
        assert_eq!(sel.indices(), &[1]);
        assert!(sel.unmatched().is_empty());
    }

    #[test]
    fn unmatched_names_are_ignored() {
        let sel = ColumnSelection::resolve(&names(&["Nope", "Name"]), ["Name", "Bank"]);
        assert_eq!(sel.indices(), &[0]);
        assert_eq!(sel.unmatched(), &["Nope".to_string()]);
    }

    #[test]
    fn only_unmatched_names_select_nothing() {
        let sel = ColumnSelection::resolve(&names(&["missing"]), ["a", "b"]);
        assert!(sel.is_empty());
        assert!(!sel.contains(0));
    }

    #[test]
    fn duplicate_headers_all_selected() {
        let sel = ColumnSelection::resolve(&names(&["card"]), ["Card", "name", "CARD"]);
        assert_eq!(sel.indices(), &[0, 2]);
        assert_eq!(sel.len(), 2);
        assert!(sel.contains(2));
        assert!(!sel.contains(1));
    }

    #[test]
    fn whitespace_is_significant() {
        let sel = ColumnSelection::resolve(&names(&[" Name"]), ["Name"]);
        assert!(sel.is_empty());
    }

    #[test]
    fn key_selection_is_exact_case() {
        let sel = KeySelection::new(&names(&["b", "B", "b"]));
        let keys: Vec<&str> = sel.keys().collect();
        assert_eq!(keys, vec!["b", "B"]);
    }
}
