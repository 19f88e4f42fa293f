//! Lookup request and result types
//!
//! A request is a non-empty ordered list of non-empty keys. Duplicates are
//! kept. A result carries exactly one entry per requested key, in request
//! order, with the value present only on a cache hit.

use crate::{RawValue, ValidationError};

/// Separator between keys in the transport's key parameter.
pub const KEY_SEPARATOR: char = ',';

/// A validated batch of keys to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    keys: Vec<String>,
}

impl LookupRequest {
    /// Build a request from already-split keys.
    pub fn new(keys: Vec<String>) -> Result<Self, ValidationError> {
        if keys.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        if let Some(position) = keys.iter().position(|k| k.is_empty()) {
            return Err(ValidationError::EmptyKey { position });
        }
        Ok(Self { keys })
    }

    /// Parse a comma-separated key list, enforcing an upper bound on batch size.
    pub fn parse(raw: &str, max_keys: usize) -> Result<Self, ValidationError> {
        if raw.is_empty() {
            return Err(ValidationError::EmptyBatch);
        }
        let keys: Vec<String> = raw.split(KEY_SEPARATOR).map(str::to_string).collect();
        if keys.len() > max_keys {
            return Err(ValidationError::TooManyKeys {
                count: keys.len(),
                max: max_keys,
            });
        }
        Self::new(keys)
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false for a constructed request; kept for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Resolution of a single requested key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupEntry {
    /// The requested key, verbatim.
    pub key: String,
    /// The cached value, or `None` on a miss.
    pub value: Option<RawValue>,
}

impl LookupEntry {
    pub fn hit(key: impl Into<String>, value: RawValue) -> Self {
        Self {
            key: key.into(),
            value: Some(value),
        }
    }

    pub fn miss(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_hit(&self) -> bool {
        self.value.is_some()
    }
}

/// Ordered results for a lookup batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LookupResult {
    pub entries: Vec<LookupEntry>,
}

impl LookupResult {
    pub fn new(entries: Vec<LookupEntry>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.entries.iter().filter(|e| e.is_hit()).count()
    }

    pub fn misses(&self) -> usize {
        self.len() - self.hits()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LookupEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_new_rejects_empty_batch() {
        assert_eq!(LookupRequest::new(vec![]), Err(ValidationError::EmptyBatch));
    }

    #[test]
    fn test_new_rejects_empty_key() {
        let err = LookupRequest::new(vec!["a".into(), String::new(), "b".into()]);
        assert_eq!(err, Err(ValidationError::EmptyKey { position: 1 }));
    }

    #[test]
    fn test_parse_preserves_order_and_duplicates() {
        let req = LookupRequest::parse("b,a,b", 10).expect("valid request");
        assert_eq!(req.keys(), &["b", "a", "b"]);
        assert_eq!(req.len(), 3);
        assert!(!req.is_empty());
    }

    #[test]
    fn test_parse_keeps_keys_verbatim() {
        let req = LookupRequest::parse("example.com/ad1, spaced", 10).expect("valid request");
        assert_eq!(req.keys(), &["example.com/ad1", " spaced"]);
    }

    #[test]
    fn test_parse_rejects_empty_and_trailing_separator() {
        assert_eq!(LookupRequest::parse("", 10), Err(ValidationError::EmptyBatch));
        assert_eq!(
            LookupRequest::parse("a,", 10),
            Err(ValidationError::EmptyKey { position: 1 })
        );
        assert_eq!(
            LookupRequest::parse(",", 10),
            Err(ValidationError::EmptyKey { position: 0 })
        );
    }

    #[test]
    fn test_parse_enforces_max_keys() {
        assert_eq!(
            LookupRequest::parse("a,b,c", 2),
            Err(ValidationError::TooManyKeys { count: 3, max: 2 })
        );
        assert!(LookupRequest::parse("a,b", 2).is_ok());
    }

    #[test]
    fn test_result_hit_miss_counts() {
        let result = LookupResult::new(vec![
            LookupEntry::hit("a", b"X".to_vec()),
            LookupEntry::miss("c"),
            LookupEntry::hit("b", b"Y".to_vec()),
        ]);
        assert_eq!(result.len(), 3);
        assert_eq!(result.hits(), 2);
        assert_eq!(result.misses(), 1);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Parsing a joined list of non-empty keys gives back the same keys.
        #[test]
        fn prop_parse_returns_keys_in_order(
            keys in prop::collection::vec("[a-z0-9./_-]{1,12}", 1..20)
        ) {
            let raw = keys.join(",");
            let req = LookupRequest::parse(&raw, 100).unwrap();
            prop_assert_eq!(req.keys(), keys.as_slice());
        }
    }
}
