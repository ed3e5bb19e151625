//! The field registry: the target schema that source columns are mapped onto.
//!
//! Fields are declared by external, dynamically mounted collaborators, so the
//! registry must tolerate rapid register/unregister churn without duplicating
//! or leaking entries. Replacement is keyed by name and preserves position;
//! removal is keyed by identity, so a stale unregister arriving after the
//! same name re-registered under a new identity is a no-op.

use log::debug;

/// Stable identity handed out per registration. Never reused within one
/// registry, even for the same field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub id: FieldId,
    /// Unique key; also the record key in emitted rows.
    pub name: String,
    /// Display label shown while mapping.
    pub label: String,
    pub optional: bool,
}

#[derive(Debug, Default)]
pub struct FieldRegistry {
    entries: Vec<FieldDescriptor>,
    next_id: u64,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a field and returns its identity. Re-registering an existing
    /// name replaces the descriptor in place, keeping the original position;
    /// a new name appends.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        label: impl Into<String>,
        optional: bool,
    ) -> FieldId {
        let id = FieldId(self.next_id);
        self.next_id += 1;
        let descriptor = FieldDescriptor {
            id,
            name: name.into(),
            label: label.into(),
            optional,
        };
        match self
            .entries
            .iter_mut()
            .find(|entry| entry.name == descriptor.name)
        {
            Some(existing) => {
                debug!("Replacing field '{}' in place", descriptor.name);
                *existing = descriptor;
            }
            None => {
                debug!("Registering field '{}'", descriptor.name);
                self.entries.push(descriptor);
            }
        }
        id
    }

    /// Removes the entry with this identity. Returns `false` when the
    /// identity is no longer live, which is the expected outcome for a stale
    /// unregister after a remount.
    pub fn unregister(&mut self, id: FieldId) -> bool {
        match self.entries.iter().position(|entry| entry.id == id) {
            Some(index) => {
                let removed = self.entries.remove(index);
                debug!("Unregistered field '{}'", removed.name);
                true
            }
            None => false,
        }
    }

    /// Live descriptors in first-registration order.
    pub fn current(&self) -> &[FieldDescriptor] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
