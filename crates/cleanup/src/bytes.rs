//! Size bookkeeping for batch deletes.

use std::collections::HashMap;

/// Remembers listed object sizes so that only keys the store confirms as
/// deleted count towards freed bytes.
///
/// One accountant is scoped to a single `clean` call.
#[derive(Debug, Default)]
pub struct BytesAccountant {
    sizes: HashMap<String, u64>,
}

impl BytesAccountant {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key's size as seen at listing time.
    pub fn remember_size(&mut self, key: impl Into<String>, size: u64) {
        self.sizes.insert(key.into(), size);
    }

    /// Sum the sizes of confirmed keys and forget them.
    ///
    /// Keys that were never remembered contribute zero.
    pub fn settle<S: AsRef<str>>(&mut self, confirmed: &[S]) -> u64 {
        confirmed
            .iter()
            .filter_map(|key| self.sizes.remove(key.as_ref()))
            .sum()
    }

    /// Number of keys remembered but not yet settled.
    pub fn pending(&self) -> usize {
        self.sizes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_counts_only_confirmed_keys() {
        let mut accountant = BytesAccountant::new();
        accountant.remember_size("dir/a", 10);
        accountant.remember_size("dir/b", 20);
        accountant.remember_size("dir/c", 30);

        let freed = accountant.settle(&["dir/a", "dir/c", "dir/unknown"]);

        assert_eq!(freed, 40);
        assert_eq!(accountant.pending(), 1);
    }

    #[test]
    fn test_settled_keys_are_not_counted_twice() {
        let mut accountant = BytesAccountant::new();
        accountant.remember_size("dir/a", 10);

        assert_eq!(accountant.settle(&["dir/a"]), 10);
        assert_eq!(accountant.settle(&["dir/a"]), 0);
    }
}
