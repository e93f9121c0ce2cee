//! Named, lazily built data sources.
//!
//! Sources are registered as factories and built on first lookup; later
//! lookups return the same instance. Names are matched case-insensitively
//! against canonical names and aliases.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, warn};

use crate::adapter::DataSource;

/// Builds a data source on first use.
pub type SourceFactory = Box<dyn Fn() -> Arc<dyn DataSource> + Send + Sync>;

struct Registration {
    name: String,
    aliases: Vec<String>,
    factory: SourceFactory,
}

/// Data sources keyed by name, in registration order.
pub struct SourceRegistry {
    default_name: String,
    registrations: Vec<Registration>,
    instances: Mutex<HashMap<String, Arc<dyn DataSource>>>,
}

impl SourceRegistry {
    /// `default_name` is used when a requested name is unknown.
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into().trim().to_ascii_lowercase(),
            registrations: Vec::new(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a lazily built source. Re-registering a name replaces it.
    pub fn register<F>(&mut self, name: &str, aliases: &[&str], factory: F)
    where
        F: Fn() -> Arc<dyn DataSource> + Send + Sync + 'static,
    {
        let name = name.trim().to_ascii_lowercase();
        self.registrations.retain(|r| r.name != name);
        self.lock_instances().remove(&name);
        self.registrations.push(Registration {
            name,
            aliases: aliases.iter().map(|a| a.to_ascii_lowercase()).collect(),
            factory: Box::new(factory),
        });
    }

    /// Registers an already built source under its own name.
    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        let name = source.name().to_ascii_lowercase();
        self.register(&name, &[], move || Arc::clone(&source));
        self
    }

    fn lock_instances(&self) -> MutexGuard<'_, HashMap<String, Arc<dyn DataSource>>> {
        self.instances.lock().unwrap_or_else(|poisoned| {
            warn!("Source registry mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Canonical names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.registrations.iter().map(|r| r.name.clone()).collect()
    }

    /// Canonical name for `name` or one of its aliases, if registered.
    pub fn canonical_name(&self, name: &str) -> Option<&str> {
        let name = name.trim().to_ascii_lowercase();
        self.registrations
            .iter()
            .find(|r| r.name == name || r.aliases.iter().any(|a| *a == name))
            .map(|r| r.name.as_str())
    }

    /// Like [`canonical_name`](Self::canonical_name), but unknown names fall
    /// back to the default source.
    pub fn resolve_name(&self, name: &str) -> String {
        match self.canonical_name(name) {
            Some(canonical) => canonical.to_string(),
            None => {
                warn!(
                    "Unknown data source '{}', using default '{}'",
                    name, self.default_name
                );
                self.default_name.clone()
            }
        }
    }

    /// The source registered as `name` (or an alias), built on first use.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DataSource>> {
        let canonical = self.canonical_name(name)?;
        let mut instances = self.lock_instances();
        if let Some(source) = instances.get(canonical) {
            return Some(Arc::clone(source));
        }

        let registration = self.registrations.iter().find(|r| r.name == canonical)?;
        debug!("Initializing data source '{}'", canonical);
        let source = (registration.factory)();
        instances.insert(canonical.to_string(), Arc::clone(&source));
        Some(source)
    }

    /// Sources that have been built so far.
    pub fn initialized(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock_instances().keys().cloned().collect();
        names.sort();
        names
    }
}
