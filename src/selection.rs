//! Micro-syntax parser for registry-backed option values.
//!
//! Registry-backed flags and test tokens share one value syntax:
//! `name[,k1=v1,...]`. The head token selects a registry entry; the remaining
//! comma-separated tokens become constructor arguments, keyword form when
//! they contain `=`, positional otherwise.

use std::collections::BTreeMap;

/// A parsed selection: registry key plus constructor arguments.
///
/// Produced once per registry-backed option value and consumed exactly once
/// by instantiation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectionSpec {
    pub name: String,
    pub positional: Vec<String>,
    pub keyword: BTreeMap<String, String>,
}

impl SelectionSpec {
    /// Parse an option value of the form `name[,k=v|v,...]`.
    ///
    /// Parsing never fails: empty tokens are skipped and a later keyword
    /// repeating an earlier key overwrites it.
    pub fn parse(value: &str) -> Self {
        let mut parts = value.split(',');
        let name = parts.next().unwrap_or_default().trim().to_string();

        let mut positional = Vec::new();
        let mut keyword = BTreeMap::new();
        for token in parts {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            match token.split_once('=') {
                Some((key, val)) => {
                    keyword.insert(key.trim().to_string(), val.trim().to_string());
                }
                None => positional.push(token.to_string()),
            }
        }

        SelectionSpec {
            name,
            positional,
            keyword,
        }
    }

    /// A spec selecting `name` with no constructor arguments.
    pub fn bare(name: &str) -> Self {
        SelectionSpec {
            name: name.to_string(),
            ..Default::default()
        }
    }
}
