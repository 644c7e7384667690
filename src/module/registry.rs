//! One module instance per service for the duration of a run.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{ModuleModes, SourceModule};
use crate::error::{Error, Result};

#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<String, Arc<dyn SourceModule>>,
}

impl ModuleRegistry {
    /// Register a module under its service name, replacing any previous one.
    pub fn register(&mut self, module: Arc<dyn SourceModule>) {
        let name = module.name().to_ascii_lowercase();
        tracing::debug!(module = %name, "Registered source module");
        self.modules.insert(name, module);
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Look a module up by service name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn SourceModule>> {
        self.modules
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::invalid_module(name))
    }

    /// Look a module up and check that it declares `mode`.
    pub fn require(&self, name: &str, mode: ModuleModes) -> Result<Arc<dyn SourceModule>> {
        let module = self.get(name)?;
        if !module.supports(mode) {
            return Err(Error::unsupported(module.name(), mode));
        }
        Ok(module)
    }

    /// Find the module serving a URL host. `www.` prefixes are ignored.
    pub fn by_netloc(&self, host: &str) -> Option<Arc<dyn SourceModule>> {
        let host = host.trim_start_matches("www.").to_ascii_lowercase();
        self.modules
            .values()
            .find(|m| {
                m.information()
                    .netlocs
                    .iter()
                    .any(|n| host == *n || host.ends_with(&format!(".{n}")))
            })
            .cloned()
    }
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.modules.keys()).finish()
    }
}
