//! Catalog - every known plugin descriptor, keyed by name

use std::collections::HashMap;

use crate::descriptor::PluginDescriptor;
use crate::error::PluginError;

/// Known descriptors, keyed by name, in insertion order.
///
/// Insertion order is the tie-break for independent plugins when the
/// whole catalog is loaded.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: HashMap<String, PluginDescriptor>,
    order: Vec<String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a descriptor. Fails if it is invalid or its name is taken.
    pub fn insert(&mut self, descriptor: PluginDescriptor) -> Result<(), PluginError> {
        descriptor.validate()?;
        if self.entries.contains_key(&descriptor.name) {
            return Err(PluginError::DuplicateName {
                name: descriptor.name,
            });
        }
        self.order.push(descriptor.name.clone());
        self.entries.insert(descriptor.name.clone(), descriptor);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<PluginDescriptor> {
        let removed = self.entries.remove(name)?;
        self.order.retain(|n| n != name);
        Some(removed)
    }

    pub fn get(&self, name: &str) -> Option<&PluginDescriptor> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

impl FromIterator<PluginDescriptor> for Catalog {
    /// Builds a catalog, keeping the first descriptor for a repeated name.
    fn from_iter<I: IntoIterator<Item = PluginDescriptor>>(iter: I) -> Self {
        let mut catalog = Catalog::new();
        for descriptor in iter {
            if let Err(e) = catalog.insert(descriptor) {
                tracing::debug!(error = %e, "Skipping catalog entry");
            }
        }
        catalog
    }
}
