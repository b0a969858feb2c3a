//! `by (field[:bucket_size[, offset]], ...)` grouping fields (spec.md §4.D).

use crate::column::decode::to_float_string;
use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone)]
pub struct ByField {
    pub name: String,
    bucket_size: Option<f64>,
    bucket_offset: f64,
}

impl ByField {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bucket_size: None,
            bucket_offset: 0.0,
        }
    }

    pub fn with_bucket(
        name: impl Into<String>,
        bucket_size: &str,
        bucket_offset: Option<&str>,
    ) -> QueryResult<Self> {
        let size: f64 = bucket_size.parse().map_err(|_| QueryError::InvalidBucket {
            value: bucket_size.to_string(),
            reason: "not a number".to_string(),
        })?;
        if size <= 0.0 {
            return Err(QueryError::InvalidBucket {
                value: bucket_size.to_string(),
                reason: "bucket size must be positive".to_string(),
            });
        }
        let offset = match bucket_offset {
            Some(raw) => raw.parse().map_err(|_| QueryError::InvalidBucket {
                value: raw.to_string(),
                reason: "not a number".to_string(),
            })?,
            None => 0.0,
        };
        Ok(Self {
            name: name.into(),
            bucket_size: Some(size),
            bucket_offset: offset,
        })
    }

    /// Maps one raw rendered cell value to its group-key representation:
    /// unchanged if unbucketed or unparsable, else
    /// `floor((x-offset)/size)*size+offset`, rendered back to a canonical
    /// float string.
    pub fn bucket<'a>(&self, raw: &'a str) -> std::borrow::Cow<'a, str> {
        let Some(size) = self.bucket_size else {
            return std::borrow::Cow::Borrowed(raw);
        };
        match raw.parse::<f64>() {
            Ok(x) => {
                let bucketed = ((x - self.bucket_offset) / size).floor() * size + self.bucket_offset;
                std::borrow::Cow::Owned(to_float_string(bucketed))
            }
            Err(_) => std::borrow::Cow::Borrowed(raw),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbucketed_passes_through() {
        let f = ByField::new("level");
        assert_eq!(f.bucket("info"), "info");
    }

    #[test]
    fn buckets_numeric_values() {
        let f = ByField::with_bucket("duration", "10", None).unwrap();
        assert_eq!(f.bucket("23"), "20");
        assert_eq!(f.bucket("9.9"), "0");
        assert_eq!(f.bucket("30"), "30");
    }

    #[test]
    fn buckets_with_offset() {
        let f = ByField::with_bucket("duration", "10", Some("5")).unwrap();
        assert_eq!(f.bucket("16"), "15");
    }

    #[test]
    fn non_numeric_value_passes_through_unbucketed() {
        let f = ByField::with_bucket("duration", "10", None).unwrap();
        assert_eq!(f.bucket("n/a"), "n/a");
    }

    #[test]
    fn rejects_non_positive_bucket_size() {
        assert!(ByField::with_bucket("x", "0", None).is_err());
        assert!(ByField::with_bucket("x", "-5", None).is_err());
    }

    #[test]
    fn rejects_unparsable_bucket_size() {
        assert!(ByField::with_bucket("x", "abc", None).is_err());
    }
}
