use log::info;
use std::sync::{ Arc, RwLock };

/// A default model together with the number of times it has been replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultModel {
    pub model: String,
    pub version: u64,
}

/// Runtime-settable default model. Owned by the service state and handed to
/// whoever needs it, so each instance is isolated from every other.
#[derive(Debug)]
pub struct ModelDefaults {
    current: RwLock<Arc<DefaultModel>>,
}

impl ModelDefaults {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            current: RwLock::new(Arc::new(DefaultModel { model: model.into(), version: 0 })),
        }
    }

    pub fn current(&self) -> Arc<DefaultModel> {
        let guard = self.current.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Swaps in a new default and returns `(previous, current)`.
    pub fn set(&self, model: impl Into<String>) -> (Arc<DefaultModel>, Arc<DefaultModel>) {
        let mut guard = self.current.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = Arc::clone(&guard);
        let next = Arc::new(DefaultModel {
            model: model.into(),
            version: previous.version + 1,
        });
        *guard = Arc::clone(&next);
        info!("Default model changed: {} -> {} (v{})", previous.model, next.model, next.version);
        (previous, next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_bumps_version_and_returns_previous() {
        let defaults = ModelDefaults::new("gpt-3.5-turbo");
        assert_eq!(defaults.current().version, 0);

        let (previous, current) = defaults.set("gpt-4o-mini");
        assert_eq!(previous.model, "gpt-3.5-turbo");
        assert_eq!(current.model, "gpt-4o-mini");
        assert_eq!(current.version, 1);
        assert_eq!(*defaults.current(), *current);
    }

    #[test]
    fn snapshots_are_unaffected_by_later_swaps() {
        let defaults = ModelDefaults::new("a");
        let snapshot = defaults.current();
        defaults.set("b");
        assert_eq!(snapshot.model, "a");
        assert_eq!(defaults.current().model, "b");
    }

    #[test]
    fn separate_instances_do_not_share_state() {
        let first = ModelDefaults::new("a");
        let second = ModelDefaults::new("a");
        first.set("b");
        assert_eq!(second.current().model, "a");
    }
}
