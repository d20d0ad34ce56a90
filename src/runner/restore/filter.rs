//! Selection of the top-level documents to restore.

use crate::runner::RunnerError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// `field=value` conditions on the top-level fields of a parent document.
///
/// Values given for the same field are alternatives; different fields must
/// all match. Comparison ignores case. An array field matches when any of its
/// elements does, and `id` also matches the numeric part of a global ID.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreFilter {
    conditions: BTreeMap<String, Vec<String>>,
}

impl RestoreFilter {
    /// Parses `field=value` pairs.
    pub fn parse<I, S>(pairs: I) -> Result<Self, RunnerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut filter = Self::default();
        for pair in pairs {
            let pair = pair.as_ref();
            let (field, value) = pair
                .split_once('=')
                .map(|(field, value)| (field.trim(), value.trim()))
                .filter(|(field, value)| !field.is_empty() && !value.is_empty())
                .ok_or_else(|| RunnerError::InvalidFilter(pair.to_string()))?;
            filter
                .conditions
                .entry(field.to_string())
                .or_default()
                .push(value.to_lowercase());
        }
        Ok(filter)
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, document: &Value) -> bool {
        self.conditions.iter().all(|(field, wanted)| {
            let Some(actual) = document.get(field) else {
                return false;
            };
            wanted.iter().any(|want| field_matches(field, actual, want))
        })
    }
}

impl FromStr for RestoreFilter {
    type Err = RunnerError;

    /// Parses a comma separated list of `field=value` pairs.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s.split(',').filter(|pair| !pair.trim().is_empty()))
    }
}

fn field_matches(field: &str, actual: &Value, want: &str) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(|item| field_matches(field, item, want)),
        Value::String(s) => {
            let s = s.to_lowercase();
            s == want || (field == "id" && s.rsplit('/').next() == Some(want))
        }
        Value::Null => false,
        other => other.to_string().to_lowercase() == want,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product() -> Value {
        json!({
            "id": "gid://shopify/Product/8737843216608",
            "handle": "red-hat",
            "status": "ACTIVE",
            "tags": ["summer", "Sale"],
            "isGiftCard": false
        })
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = RestoreFilter::parse(Vec::<String>::new()).unwrap();
        assert!(filter.is_empty());
        assert!(filter.matches(&product()));
    }

    #[test]
    fn test_fields_are_and_values_are_or() {
        let filter = RestoreFilter::parse(["status=active", "handle=blue-hat", "handle=red-hat"]).unwrap();
        assert!(filter.matches(&product()));

        let filter = RestoreFilter::parse(["status=draft", "handle=red-hat"]).unwrap();
        assert!(!filter.matches(&product()));
    }

    #[test]
    fn test_arrays_match_any_element() {
        assert!(RestoreFilter::parse(["tags=sale"]).unwrap().matches(&product()));
        assert!(!RestoreFilter::parse(["tags=winter"]).unwrap().matches(&product()));
    }

    #[test]
    fn test_id_matches_numeric_part() {
        assert!(RestoreFilter::parse(["id=8737843216608"]).unwrap().matches(&product()));
        assert!(RestoreFilter::parse(["isGiftCard=false"]).unwrap().matches(&product()));
    }

    #[test]
    fn test_missing_field_does_not_match() {
        assert!(!RestoreFilter::parse(["vendor=acme"]).unwrap().matches(&product()));
    }

    #[test]
    fn test_malformed_pairs_are_rejected() {
        for bad in ["status", "=active", "status="] {
            assert!(matches!(
                RestoreFilter::parse([bad]),
                Err(RunnerError::InvalidFilter(pair)) if pair == bad
            ));
        }
        let parsed: RestoreFilter = "status=active, tags=sale".parse().unwrap();
        assert!(parsed.matches(&product()));
    }
}
