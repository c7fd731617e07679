//! Lifecycle events delivered to manager observers

use std::sync::Arc;

/// Something that happened to a plugin
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// Descriptor added to the catalog
    Inserted { name: String },
    /// Plugin loaded and started
    Loaded { name: String },
    /// Plugin failed to load; it is now in the broken set
    LoadFailed { name: String, error: String },
    /// Plugin stopped and its library closed
    Unloaded { name: String },
    /// Descriptor removed from the catalog
    Removed { name: String },
}

impl PluginEvent {
    /// Name of the plugin the event is about.
    pub fn name(&self) -> &str {
        match self {
            Self::Inserted { name }
            | Self::Loaded { name }
            | Self::LoadFailed { name, .. }
            | Self::Unloaded { name }
            | Self::Removed { name } => name,
        }
    }
}

/// Identifies a subscription, for [`crate::PluginManager::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub(crate) u64);

/// Callback invoked for every event
pub type Observer = Arc<dyn Fn(&PluginEvent) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_name() {
        let event = PluginEvent::LoadFailed {
            name: "te.da.pgis".to_string(),
            error: "boom".to_string(),
        };
        assert_eq!(event.name(), "te.da.pgis");
        assert_eq!(
            PluginEvent::Removed {
                name: "ogr".to_string()
            }
            .name(),
            "ogr"
        );
    }
}
