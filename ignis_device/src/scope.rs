use crate::uniform::UniformValue;
use crate::version::{Version, VersionCounter, VersionedObject};
use std::collections::HashMap;

/// Index of a named variable inside a [`ScopeSpace`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
pub struct ScopeVariable {
    name: String,
    value: Option<UniformValue>,
    versioned: VersionedObject,
}

impl ScopeVariable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> Option<&UniformValue> {
        self.value.as_ref()
    }

    pub fn version(&self) -> Version {
        self.versioned.version()
    }
}

/// Named slots that feed program inputs.
///
/// Resolving a name is a hash lookup; hot paths resolve once and keep the [`ScopeId`].
#[derive(Debug, Default)]
pub struct ScopeSpace {
    counter: VersionCounter,
    variables: Vec<ScopeVariable>,
    by_name: HashMap<String, ScopeId>,
}

impl ScopeSpace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `name`, creating an unset variable on first use.
    pub fn resolve(&mut self, name: &str) -> ScopeId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = ScopeId(self.variables.len() as u32);
        self.variables.push(ScopeVariable {
            name: name.to_string(),
            value: None,
            versioned: VersionedObject::new(&mut self.counter),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn find(&self, name: &str) -> Option<ScopeId> {
        self.by_name.get(name).copied()
    }

    pub fn set_value(&mut self, id: ScopeId, value: impl Into<UniformValue>) {
        let Some(variable) = self.variables.get_mut(id.index()) else {
            ignis_utils::debug_panic!("Scope id {id:?} does not belong to this scope");
            return;
        };
        variable.value = Some(value.into());
        variable.versioned.increment();
    }

    /// Resolves and sets in one step. Prefer [`ScopeSpace::set_value`] in per-draw code.
    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) -> ScopeId {
        let id = self.resolve(name);
        self.set_value(id, value);
        id
    }

    pub fn variable(&self, id: ScopeId) -> Option<&ScopeVariable> {
        self.variables.get(id.index())
    }

    pub fn value(&self, id: ScopeId) -> Option<&UniformValue> {
        self.variable(id).and_then(ScopeVariable::value)
    }

    pub fn version(&self, id: ScopeId) -> Option<Version> {
        self.variable(id).map(ScopeVariable::version)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::assert_gt;

    #[test]
    fn resolve_is_idempotent() {
        let mut scope = ScopeSpace::new();
        let a = scope.resolve("matrix_model");
        let b = scope.resolve("matrix_model");
        let c = scope.resolve("matrix_view");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(scope.len(), 2);
        assert_eq!(scope.find("matrix_view"), Some(c));
        assert_eq!(scope.find("missing"), None);
    }

    #[test]
    fn unset_variables_hold_no_value() {
        let mut scope = ScopeSpace::new();
        let id = scope.resolve("fog_color");
        assert!(scope.value(id).is_none());
    }

    #[test]
    fn identical_assignments_still_bump_revision() {
        let mut scope = ScopeSpace::new();
        let id = scope.resolve("exposure");
        let initial = scope.version(id).unwrap();

        scope.set_value(id, 1.0f32);
        let first = scope.version(id).unwrap();
        scope.set_value(id, 1.0f32);
        let second = scope.version(id).unwrap();

        assert_gt!(first.revision, initial.revision);
        assert_gt!(second.revision, first.revision);
        assert_eq!(first.global_id, second.global_id);
        assert_eq!(scope.value(id), Some(&UniformValue::Float(1.0)));
    }

    #[test]
    fn variables_get_distinct_identities() {
        let mut scope = ScopeSpace::new();
        let a = scope.resolve("a");
        let b = scope.resolve("b");
        assert_ne!(
            scope.version(a).unwrap().global_id,
            scope.version(b).unwrap().global_id
        );
    }
}
