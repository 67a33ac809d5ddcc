//! Page parsing contract and asset records.
//!
//! The driver never interprets menu text itself; it hands each sanitized
//! page to a [`PageParser`] and works with the structured result. Parsers
//! must be pure and must not panic on malformed input: unparseable text
//! yields an empty record list and no pagination, and the enumeration
//! loop's stall detection decides what happens next.

use regex::Regex;

/// One asset row scraped from a menu page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// Display name of the asset.
    pub name: String,
    /// Network address; the deduplication key.
    pub address: String,
}

impl AssetRecord {
    /// Create a new record.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Pagination metadata reported by the remote menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// The page the remote claims it just printed.
    pub current_page: u32,
    /// The total page count the remote claims.
    pub total_pages: u32,
}

/// The structured result of parsing one sanitized page.
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// Asset rows found on the page.
    pub records: Vec<AssetRecord>,
    /// Pagination metadata, when the page carried any.
    pub pagination: Option<Pagination>,
}

/// Converts one sanitized page of menu text into structured records.
///
/// Implementations must be pure (no I/O) and must never panic on malformed
/// input.
pub trait PageParser {
    /// Parse one page of sanitized text.
    fn parse_page(&self, text: &str) -> ParsedPage;
}

/// An insertion-ordered, address-unique collection of assets.
///
/// Assembled across pages during one enumeration; the first occurrence of
/// an address wins and later duplicates are ignored.
#[derive(Debug, Default)]
pub struct AssetSet {
    records: Vec<AssetRecord>,
    seen: std::collections::HashSet<String>,
}

impl AssetSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record, returning `true` if its address was new.
    pub fn insert(&mut self, record: AssetRecord) -> bool {
        if self.seen.contains(&record.address) {
            return false;
        }
        self.seen.insert(record.address.clone());
        self.records.push(record);
        true
    }

    /// Merge a page of records; returns how many were newly added.
    pub fn merge(&mut self, records: Vec<AssetRecord>) -> usize {
        records.into_iter().filter(|r| self.insert(r.clone())).count()
    }

    /// Number of unique assets collected.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// View the collected records in first-seen order.
    #[must_use]
    pub fn records(&self) -> &[AssetRecord] {
        &self.records
    }

    /// Consume the set, yielding records in first-seen order.
    #[must_use]
    pub fn into_records(self) -> Vec<AssetRecord> {
        self.records
    }
}

/// Reference parser for the common tabular bastion dialect.
///
/// Rows look like `1) web-01  10.0.0.1` (the leading index is optional),
/// and pagination, when present, looks like `Page 2/7` or `page: 2 of 7`.
pub struct TableParser {
    row: Regex,
    page: Regex,
}

impl TableParser {
    /// Create the reference parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            row: Regex::new(
                r"(?m)^\s*(?:\d+\)?[.)]?\s+)?(\S+)\s+((?:\d{1,3}\.){3}\d{1,3})\s*$",
            )
            .expect("row pattern is valid"),
            page: Regex::new(r"(?i)page\s*:?\s*(\d+)\s*(?:/|of)\s*(\d+)")
                .expect("page pattern is valid"),
        }
    }
}

impl Default for TableParser {
    fn default() -> Self {
        Self::new()
    }
}

impl PageParser for TableParser {
    fn parse_page(&self, text: &str) -> ParsedPage {
        let records = self
            .row
            .captures_iter(text)
            .map(|caps| AssetRecord::new(&caps[1], &caps[2]))
            .collect();

        let pagination = self.page.captures(text).and_then(|caps| {
            let current_page = caps[1].parse().ok()?;
            let total_pages = caps[2].parse().ok()?;
            Some(Pagination {
                current_page,
                total_pages,
            })
        });

        ParsedPage {
            records,
            pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_set_dedups_by_address() {
        let mut set = AssetSet::new();
        assert!(set.insert(AssetRecord::new("web-01", "10.0.0.1")));
        assert!(set.insert(AssetRecord::new("web-02", "10.0.0.2")));
        // Same address, different name: first-seen wins
        assert!(!set.insert(AssetRecord::new("web-01-alias", "10.0.0.1")));

        assert_eq!(set.len(), 2);
        assert_eq!(set.records()[0].name, "web-01");
        assert_eq!(set.records()[1].name, "web-02");
    }

    #[test]
    fn asset_set_merge_counts_new() {
        let mut set = AssetSet::new();
        let added = set.merge(vec![
            AssetRecord::new("a", "10.0.0.1"),
            AssetRecord::new("b", "10.0.0.2"),
        ]);
        assert_eq!(added, 2);

        let added = set.merge(vec![
            AssetRecord::new("a", "10.0.0.1"),
            AssetRecord::new("c", "10.0.0.3"),
        ]);
        assert_eq!(added, 1);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn table_parser_rows() {
        let parser = TableParser::new();
        let page = parser.parse_page(
            "1) web-01  10.0.0.1\n2) db-01   10.0.0.2\n[Host]> ",
        );
        assert_eq!(
            page.records,
            vec![
                AssetRecord::new("web-01", "10.0.0.1"),
                AssetRecord::new("db-01", "10.0.0.2"),
            ]
        );
        assert!(page.pagination.is_none());
    }

    #[test]
    fn table_parser_unnumbered_rows() {
        let parser = TableParser::new();
        let page = parser.parse_page("gateway 192.168.1.1\n");
        assert_eq!(page.records, vec![AssetRecord::new("gateway", "192.168.1.1")]);
    }

    #[test]
    fn table_parser_pagination() {
        let parser = TableParser::new();
        let page = parser.parse_page("1) web-01 10.0.0.1\nPage 2/7\n[Host]>");
        assert_eq!(
            page.pagination,
            Some(Pagination {
                current_page: 2,
                total_pages: 7
            })
        );

        let page = parser.parse_page("page: 3 of 5\n[Host]>");
        assert_eq!(
            page.pagination,
            Some(Pagination {
                current_page: 3,
                total_pages: 5
            })
        );
    }

    #[test]
    fn table_parser_malformed_input() {
        let parser = TableParser::new();
        let page = parser.parse_page("### garbage %% that matches nothing");
        assert!(page.records.is_empty());
        assert!(page.pagination.is_none());
    }
}
