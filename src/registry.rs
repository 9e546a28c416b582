use crate::block::{Block, BlockKey};
use crate::error::RegistrationError;
use crate::protocol::{ClickEvent, I3Block};
use std::collections::HashMap;
use std::sync::Arc;

/// Registered blocks in output order
#[derive(Default)]
pub struct Registry {
    blocks: Vec<Arc<dyn Block>>,
    index: HashMap<BlockKey, usize>,
}

impl Registry {
    /// Appends a block, refusing keys that are already taken
    ///
    /// # Errors
    /// Fails with [`RegistrationError::Duplicate`] when the key exists
    pub fn insert(&mut self, block: Arc<dyn Block>) -> Result<(), RegistrationError> {
        let key = block.key().clone();
        if self.index.contains_key(&key) {
            return Err(RegistrationError::Duplicate {
                name: key.name,
                instance: key.instance,
            });
        }
        self.index.insert(key, self.blocks.len());
        self.blocks.push(block);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, key: &BlockKey) -> Option<&Arc<dyn Block>> {
        self.index.get(key).map(|&i| &self.blocks[i])
    }

    /// Finds the block a click event is addressed to
    #[must_use]
    pub fn resolve(&self, event: &ClickEvent) -> Option<&Arc<dyn Block>> {
        let name = event.name.as_ref()?;
        self.get(&BlockKey::new(name.as_str(), event.instance.as_deref()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Block>> {
        self.blocks.iter()
    }

    /// Current content of every block, in registration order
    #[must_use]
    pub fn snapshot(&self) -> Vec<I3Block> {
        self.blocks.iter().map(|block| block.result()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockState, StaticBlock, Update};

    fn block(name: &str, instance: &str, text: &str) -> Arc<dyn Block> {
        Arc::new(StaticBlock::new(
            BlockState::new(name).with_instance(instance),
            Update::new(text),
        ))
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut registry = Registry::default();
        registry.insert(block("Disk", "/home", "first")).unwrap();
        let err = registry.insert(block("Disk", "/home", "second")).unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::Duplicate { ref name, ref instance } if name == "Disk" && instance == "/home"
        ));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.snapshot()[0].full_text, "first");
    }

    #[test]
    fn same_name_other_instance_is_fine() {
        let mut registry = Registry::default();
        registry.insert(block("Disk", "/home", "a")).unwrap();
        registry.insert(block("Disk", "/var", "b")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn snapshot_keeps_registration_order() {
        let mut registry = Registry::default();
        for name in ["C", "A", "B"] {
            registry.insert(block(name, "default", name)).unwrap();
        }
        let names: Vec<_> = registry.snapshot().into_iter().map(|b| b.name).collect();
        assert_eq!(names, ["C", "A", "B"]);
    }

    #[test]
    fn click_events_resolve_by_name_and_instance() {
        let mut registry = Registry::default();
        registry.insert(block("Disk", "/home", "home")).unwrap();
        registry.insert(block("Load", "default", "load")).unwrap();

        let event = ClickEvent {
            name: Some("Disk".to_owned()),
            instance: Some("/home".to_owned()),
            ..ClickEvent::default()
        };
        assert_eq!(registry.resolve(&event).unwrap().result().full_text, "home");

        let other = ClickEvent {
            instance: Some("/var".to_owned()),
            ..event
        };
        assert!(registry.resolve(&other).is_none());

        let without_instance = ClickEvent {
            name: Some("Load".to_owned()),
            ..ClickEvent::default()
        };
        assert!(registry.resolve(&without_instance).is_some());
        assert!(registry.resolve(&ClickEvent::default()).is_none());
    }
}
