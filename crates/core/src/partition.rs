//! Hive partition names.

use std::fmt;

/// An ordered partition specification parsed from a name like
/// `event_date=2024-01-01/event_hour=0`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PartitionSpec {
    columns: Vec<(String, String)>,
}

impl PartitionSpec {
    pub fn parse(name: &str) -> crate::Result<Self> {
        let invalid = |reason: &str| crate::Error::InvalidPartition(format!("{name}: {reason}"));

        if name.is_empty() {
            return Err(invalid("empty name"));
        }

        let columns = name
            .split('/')
            .map(|segment| {
                let (key, value) = segment
                    .split_once('=')
                    .ok_or_else(|| invalid("segment without '='"))?;
                if key.is_empty() {
                    return Err(invalid("empty partition column"));
                }
                Ok((key.to_string(), value.to_string()))
            })
            .collect::<crate::Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    /// Partition column names, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(k, _)| k.as_str())
    }

    /// Partition values, in column order.
    pub fn values(&self) -> Vec<String> {
        self.columns.iter().map(|(_, v)| v.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl fmt::Display for PartitionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.columns.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            write!(f, "{key}={value}")?;
        }
        Ok(())
    }
}
