//! Domain registry: host → routing/policy configuration.
//!
//! Read on every request, written rarely (management interface or domains
//! file reload). The table is an immutable snapshot behind an `ArcSwap`:
//! readers never take a lock and never observe a partially-written entry;
//! writers copy the map, apply the change, and swap the whole snapshot.

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::rules::SecurityLevel;

/// Configuration for one protected domain.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct DomainConfig {
    /// Unique hostname key. Case-insensitive, no wildcards.
    pub domain_name: String,

    /// Absolute URL of the backend origin.
    pub target_url: String,

    /// Which rule categories are active and how strict the patterns are.
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Max requests per rolling window per client IP.
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,

    /// Inactive domains are not routed (treated as unknown host).
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_rate_limit() -> u32 {
    1000
}

fn default_active() -> bool {
    true
}

/// On-disk shape of the persisted domain table.
#[derive(Debug, Default, Deserialize, Serialize)]
struct DomainsFile {
    domains: Vec<DomainConfig>,
}

/// Error type for registry mutations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("domain '{0}' already exists")]
    Duplicate(String),
    #[error("domain '{0}' not found")]
    NotFound(String),
    #[error("failed to persist domain table: {0}")]
    Persist(#[from] std::io::Error),
    #[error("failed to parse domains file: {0}")]
    Parse(#[from] toml::de::Error),
}

type Snapshot = HashMap<String, Arc<DomainConfig>>;

/// Lock-free registry of protected domains.
///
/// Lookups never take a lock. Mutations serialize on `write_lock` so the
/// read-copy-persist-swap sequence of one writer can never discard the
/// snapshot another writer just stored.
pub struct DomainRegistry {
    table: ArcSwap<Snapshot>,
    write_lock: Mutex<()>,
    persist_path: Option<PathBuf>,
}

impl DomainRegistry {
    /// Build a registry from initial entries. Names are lowercased; a later
    /// entry with the same name replaces an earlier one.
    pub fn new(domains: Vec<DomainConfig>, persist_path: Option<PathBuf>) -> Self {
        let mut table = Snapshot::new();
        for mut domain in domains {
            domain.domain_name = domain.domain_name.to_ascii_lowercase();
            table.insert(domain.domain_name.clone(), Arc::new(domain));
        }
        Self {
            table: ArcSwap::from_pointee(table),
            write_lock: Mutex::new(()),
            persist_path,
        }
    }

    /// Load persisted entries from `path` and merge inline entries over
    /// them, keeping `path` for later persistence.
    pub fn load(path: PathBuf, inline: Vec<DomainConfig>) -> Result<Self, RegistryError> {
        let mut domains = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            let file: DomainsFile = toml::from_str(&content)?;
            file.domains
        } else {
            Vec::new()
        };
        domains.extend(inline);
        Ok(Self::new(domains, Some(path)))
    }

    /// Resolve an incoming host to its domain config.
    ///
    /// Case-insensitive exact match with any `:port` suffix stripped.
    /// Returns `None` for unknown hosts and for inactive domains; the
    /// pipeline treats both as unrouted traffic.
    pub fn resolve(&self, host: &str) -> Option<Arc<DomainConfig>> {
        let name = host.split(':').next().unwrap_or(host).to_ascii_lowercase();
        let snapshot = self.table.load();
        snapshot
            .get(&name)
            .filter(|d| d.is_active)
            .cloned()
    }

    /// All configured domains, active or not (management interface reads).
    pub fn list(&self) -> Vec<Arc<DomainConfig>> {
        let snapshot = self.table.load();
        let mut domains: Vec<_> = snapshot.values().cloned().collect();
        domains.sort_by(|a, b| a.domain_name.cmp(&b.domain_name));
        domains
    }

    /// Counts of (total, active) domains.
    pub fn counts(&self) -> (usize, usize) {
        let snapshot = self.table.load();
        let active = snapshot.values().filter(|d| d.is_active).count();
        (snapshot.len(), active)
    }

    /// Add a new domain. Fails if the name is already registered.
    pub fn insert(&self, mut domain: DomainConfig) -> Result<(), RegistryError> {
        domain.domain_name = domain.domain_name.to_ascii_lowercase();
        let _write = self.write_lock.lock().expect("registry write lock poisoned");
        let current = self.table.load_full();
        if current.contains_key(&domain.domain_name) {
            return Err(RegistryError::Duplicate(domain.domain_name));
        }
        let mut next = (*current).clone();
        next.insert(domain.domain_name.clone(), Arc::new(domain));
        self.swap_and_persist(next)
    }

    /// Replace an existing domain's config.
    pub fn update(&self, name: &str, mut domain: DomainConfig) -> Result<(), RegistryError> {
        let name = name.to_ascii_lowercase();
        domain.domain_name = name.clone();
        let _write = self.write_lock.lock().expect("registry write lock poisoned");
        let current = self.table.load_full();
        if !current.contains_key(&name) {
            return Err(RegistryError::NotFound(name));
        }
        let mut next = (*current).clone();
        next.insert(name, Arc::new(domain));
        self.swap_and_persist(next)
    }

    /// Remove a domain.
    pub fn remove(&self, name: &str) -> Result<(), RegistryError> {
        let name = name.to_ascii_lowercase();
        let _write = self.write_lock.lock().expect("registry write lock poisoned");
        let current = self.table.load_full();
        if !current.contains_key(&name) {
            return Err(RegistryError::NotFound(name));
        }
        let mut next = (*current).clone();
        next.remove(&name);
        self.swap_and_persist(next)
    }

    /// Replace the whole table (domains file reload). Does not persist:
    /// the file on disk is already the source of this snapshot.
    pub fn replace_all(&self, domains: Vec<DomainConfig>) {
        let mut table = Snapshot::new();
        for mut domain in domains {
            domain.domain_name = domain.domain_name.to_ascii_lowercase();
            table.insert(domain.domain_name.clone(), Arc::new(domain));
        }
        let _write = self.write_lock.lock().expect("registry write lock poisoned");
        self.table.store(Arc::new(table));
    }

    /// Parse a domains file into entries (used by the reload watcher).
    pub fn parse_file(path: &std::path::Path) -> Result<Vec<DomainConfig>, RegistryError> {
        let content = std::fs::read_to_string(path)?;
        let file: DomainsFile = toml::from_str(&content)?;
        Ok(file.domains)
    }

    fn swap_and_persist(&self, next: Snapshot) -> Result<(), RegistryError> {
        // Persist before swap: if the write fails, lookups keep serving
        // the old snapshot and the caller sees the error.
        if let Some(path) = &self.persist_path {
            let mut domains: Vec<DomainConfig> =
                next.values().map(|d| (**d).clone()).collect();
            domains.sort_by(|a, b| a.domain_name.cmp(&b.domain_name));
            let file = DomainsFile { domains };
            let content = toml::to_string_pretty(&file)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
            std::fs::write(path, content)?;
        }
        self.table.store(Arc::new(next));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domain(name: &str, active: bool) -> DomainConfig {
        DomainConfig {
            domain_name: name.to_string(),
            target_url: "http://127.0.0.1:3000".to_string(),
            security_level: SecurityLevel::Moderate,
            rate_limit: 100,
            is_active: active,
        }
    }

    #[test]
    fn resolve_is_case_insensitive_and_strips_port() {
        let registry = DomainRegistry::new(vec![domain("Example.com", true)], None);
        assert!(registry.resolve("example.com").is_some());
        assert!(registry.resolve("EXAMPLE.COM:8080").is_some());
        assert!(registry.resolve("other.example").is_none());
    }

    #[test]
    fn inactive_domains_resolve_to_none() {
        let registry = DomainRegistry::new(vec![domain("example.com", false)], None);
        assert!(registry.resolve("example.com").is_none());
        // Still visible to the management interface.
        assert_eq!(registry.list().len(), 1);
        assert_eq!(registry.counts(), (1, 0));
    }

    #[test]
    fn repeated_lookups_return_identical_config() {
        let registry = DomainRegistry::new(vec![domain("example.com", true)], None);
        let a = registry.resolve("example.com").unwrap();
        let b = registry.resolve("example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn insert_rejects_duplicates() {
        let registry = DomainRegistry::new(vec![domain("example.com", true)], None);
        let err = registry.insert(domain("EXAMPLE.com", true)).unwrap_err();
        assert!(matches!(err, RegistryError::Duplicate(_)));
    }

    #[test]
    fn update_is_visible_to_subsequent_lookups() {
        let registry = DomainRegistry::new(vec![domain("example.com", true)], None);
        let mut updated = domain("example.com", true);
        updated.rate_limit = 5;
        registry.update("example.com", updated).unwrap();
        assert_eq!(registry.resolve("example.com").unwrap().rate_limit, 5);
    }

    #[test]
    fn concurrent_inserts_all_survive() {
        use std::sync::Barrier;

        for _ in 0..50 {
            let registry = Arc::new(DomainRegistry::new(vec![], None));
            let barrier = Arc::new(Barrier::new(8));
            let mut handles = Vec::new();
            for i in 0..8 {
                let registry = registry.clone();
                let barrier = barrier.clone();
                handles.push(std::thread::spawn(move || {
                    barrier.wait();
                    registry.insert(domain(&format!("d{i}.example"), true)).unwrap();
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(registry.counts().0, 8);
        }
    }

    #[test]
    fn remove_unknown_is_an_error() {
        let registry = DomainRegistry::new(vec![], None);
        assert!(matches!(
            registry.remove("ghost.example"),
            Err(RegistryError::NotFound(_))
        ));
    }
}
