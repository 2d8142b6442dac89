use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Where a player finds a recording's bytes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "href", rename_all = "lowercase")]
pub enum Locator {
    /// Temporary handle to bytes held in memory, `mem:<uuid>`
    Memory(String),
    /// Persistent storage path, e.g. `/uploads/recording-1-1.webm`
    Remote(String),
}

impl Locator {
    /// A fresh, unique in-memory handle
    pub fn memory() -> Self {
        Self::Memory(format!("mem:{}", Uuid::new_v4()))
    }

    pub fn remote(path: impl Into<String>) -> Self {
        Self::Remote(path.into())
    }

    pub fn href(&self) -> &str {
        match self {
            Self::Memory(href) | Self::Remote(href) => href,
        }
    }

    /// Whether the handle dies with the process
    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Memory(_))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.href())
    }
}

/// Live in-memory locators and the bytes behind them
///
/// A locator resolves until it is revoked. Revoking twice is a no-op and is
/// not counted again.
#[derive(Debug, Default)]
pub struct LocatorTable {
    live: HashMap<Locator, Arc<[u8]>>,
    revocations: usize,
}

impl LocatorTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `payload` under a new memory locator
    pub fn mint(&mut self, payload: Arc<[u8]>) -> Locator {
        let locator = Locator::memory();
        self.live.insert(locator.clone(), payload);
        locator
    }

    pub fn resolve(&self, locator: &Locator) -> Option<Arc<[u8]>> {
        self.live.get(locator).cloned()
    }

    /// Release a locator; returns false if it was not live
    pub fn revoke(&mut self, locator: &Locator) -> bool {
        if self.live.remove(locator).is_some() {
            self.revocations += 1;
            debug!("Revoked locator {}", locator);
            true
        } else {
            false
        }
    }

    /// Release every live locator, returning how many were released
    pub fn revoke_all(&mut self) -> usize {
        let released = self.live.len();
        self.live.clear();
        self.revocations += released;
        released
    }

    /// Total releases so far
    pub fn revocations(&self) -> usize {
        self.revocations
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_locators_are_unique() {
        let a = Locator::memory();
        let b = Locator::memory();
        assert_ne!(a, b);
        assert!(a.href().starts_with("mem:"));
        assert!(a.is_temporary());
        assert!(!Locator::remote("/uploads/a.webm").is_temporary());
    }

    #[test]
    fn test_revoke_counts_once() {
        let mut table = LocatorTable::new();
        let locator = table.mint(Arc::from(vec![1u8, 2, 3]));
        assert_eq!(table.resolve(&locator).as_deref(), Some(&[1u8, 2, 3][..]));

        assert!(table.revoke(&locator));
        assert!(!table.revoke(&locator));
        assert_eq!(table.revocations(), 1);
        assert!(table.resolve(&locator).is_none());
    }

    #[test]
    fn test_remote_locators_are_never_live() {
        let mut table = LocatorTable::new();
        assert!(!table.revoke(&Locator::remote("/uploads/x.webm")));
        assert_eq!(table.revocations(), 0);
    }
}
