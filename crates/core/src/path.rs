//! Object-store URIs.

use crate::SENTINEL_SUFFIX;
use std::fmt;

const SCHEMES: &[&str] = &["s3", "s3a", "s3n"];

/// A parsed object-store URI such as `s3://bucket/warehouse/db/table`.
///
/// Object stores have no real directories, so a path may name a single
/// object or a key prefix that behaves like a directory.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    scheme: String,
    bucket: String,
    key: String,
}

impl ObjectPath {
    /// Parse an object-store URI.
    ///
    /// The bucket and the key must both be non-empty; bucket roots are
    /// never valid cleanup targets.
    pub fn parse(uri: &str) -> crate::Result<Self> {
        let invalid = |reason: &str| crate::Error::InvalidPath(format!("{uri}: {reason}"));

        let (scheme, rest) = uri
            .split_once("://")
            .ok_or_else(|| invalid("missing scheme"))?;
        let scheme = scheme.to_ascii_lowercase();
        if !SCHEMES.contains(&scheme.as_str()) {
            return Err(invalid("unsupported scheme"));
        }

        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(invalid("empty bucket"));
        }
        if bucket.chars().any(char::is_whitespace) {
            return Err(invalid("bucket contains whitespace"));
        }

        let key = key.trim_start_matches('/');
        if key.trim_end_matches('/').is_empty() {
            return Err(invalid("empty key"));
        }

        Ok(Self {
            scheme,
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    /// Check whether a string parses as an object-store URI.
    pub fn is_valid(uri: &str) -> bool {
        Self::parse(uri).is_ok()
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The key exactly as given, without a leading separator.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the key was written with a trailing separator.
    pub fn is_directory_hint(&self) -> bool {
        self.key.ends_with('/')
    }

    /// The key without trailing separators.
    pub fn trimmed_key(&self) -> &str {
        self.key.trim_end_matches('/')
    }

    /// The key with exactly one trailing separator, for listing a directory's contents.
    pub fn directory_prefix(&self) -> String {
        format!("{}/", self.trimmed_key())
    }

    /// The folder-marker object that stands in for this directory.
    pub fn sentinel_key(&self) -> String {
        format!("{}{}", self.trimmed_key(), SENTINEL_SUFFIX)
    }

    /// Last segment of the key.
    pub fn name(&self) -> &str {
        let trimmed = self.trimmed_key();
        trimmed.rsplit_once('/').map_or(trimmed, |(_, name)| name)
    }

    /// The enclosing directory, or `None` when the key sits at the bucket root.
    pub fn parent(&self) -> Option<Self> {
        let (parent, _) = self.trimmed_key().rsplit_once('/')?;
        if parent.trim_end_matches('/').is_empty() {
            return None;
        }
        Some(Self {
            scheme: self.scheme.clone(),
            bucket: self.bucket.clone(),
            key: parent.trim_end_matches('/').to_string(),
        })
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}/{}", self.scheme, self.bucket, self.key)
    }
}

impl fmt::Debug for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({self})")
    }
}

impl std::str::FromStr for ObjectPath {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_bucket_and_key() {
        let path = ObjectPath::parse("s3://bucket/db/table/partition=1").unwrap();
        assert_eq!(path.bucket(), "bucket");
        assert_eq!(path.key(), "db/table/partition=1");
        assert_eq!(path.name(), "partition=1");
        assert_eq!(path.to_string(), "s3://bucket/db/table/partition=1");
    }

    #[test]
    fn test_parse_accepts_hadoop_schemes() {
        assert!(ObjectPath::is_valid("s3a://bucket/key"));
        assert!(ObjectPath::is_valid("S3N://bucket/key"));
    }

    #[test]
    fn test_parse_rejects_invalid_uris() {
        for uri in [
            "",
            "bucket/key",
            "hdfs://namenode/key",
            "s3://",
            "s3:///key",
            "s3://bucket",
            "s3://bucket/",
            "s3://bad bucket/key",
            "not a path",
        ] {
            assert!(ObjectPath::parse(uri).is_err(), "{uri} should be rejected");
        }
    }

    #[test]
    fn test_directory_helpers() {
        let path = ObjectPath::parse("s3://bucket/table/partition_1/").unwrap();
        assert!(path.is_directory_hint());
        assert_eq!(path.trimmed_key(), "table/partition_1");
        assert_eq!(path.directory_prefix(), "table/partition_1/");
        assert_eq!(path.sentinel_key(), "table/partition_1_$folder$");
    }

    #[test]
    fn test_parent_walks_to_bucket_root() {
        let path = ObjectPath::parse("s3://bucket/table/id1/partition=1").unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.key(), "table/id1");
        assert_eq!(parent.name(), "id1");

        let grandparent = parent.parent().unwrap();
        assert_eq!(grandparent.key(), "table");
        assert!(grandparent.parent().is_none());
    }
}
