//! Named module registry.
//!
//! The host builds a [`Registry`] at startup, registers the modules it
//! offers and selects one per share by name. Dropping the registry tears
//! the modules down.

use crate::error::{Error, Result};
use crate::options::Options;
use crate::vfs::{RDirect, VfsOps};

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

/// Name the direct-read module registers under.
pub const MODULE_NAME: &str = "rdirect";

/// Registry of VFS modules keyed by name.
#[derive(Default)]
pub struct Registry {
    modules: HashMap<String, Arc<dyn VfsOps>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ops` under `name`. Fails if the name is taken.
    pub fn register(&mut self, name: &str, ops: Arc<dyn VfsOps>) -> Result<()> {
        if self.modules.contains_key(name) {
            return Err(Error::AlreadyRegistered(name.to_string()));
        }
        info!(module = name, "registered vfs module");
        self.modules.insert(name.to_string(), ops);
        Ok(())
    }

    /// Look up a module by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn VfsOps>> {
        self.modules.get(name).cloned()
    }

    /// Remove a module, returning it if it was registered.
    pub fn unregister(&mut self, name: &str) -> Option<Arc<dyn VfsOps>> {
        self.modules.remove(name)
    }

    /// Names of all registered modules, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Drop every registered module.
    pub fn clear(&mut self) {
        self.modules.clear();
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("modules", &self.names()).finish()
    }
}

/// Register the direct-read module over the system-call layer.
pub fn register_rdirect(registry: &mut Registry, options: Options) -> Result<()> {
    let module = RDirect::new(options)?;
    registry.register(MODULE_NAME, Arc::new(module))
}
