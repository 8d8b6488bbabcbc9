//! Identity + revision pairs used to skip redundant uniform uploads.
//!
//! Every versioned variable receives a unique id when it is created and bumps its
//! revision on each assignment. A consumer remembers the last pair it committed and
//! only does real work when the pair differs.

/// The (identity, revision) pair of a versioned variable.
///
/// `Version::default()` is never handed out by a [`VersionCounter`], so it can be
/// used as the "never committed" marker.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    pub global_id: u32,
    pub revision: u32,
}

/// Monotonic id source for versioned variables. Ids start at 1.
#[derive(Debug, Default)]
pub struct VersionCounter {
    last: u32,
}

impl VersionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> u32 {
        self.last += 1;
        self.last
    }

    pub fn issued(&self) -> u32 {
        self.last
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedObject {
    version: Version,
}

impl VersionedObject {
    pub fn new(counter: &mut VersionCounter) -> Self {
        Self {
            version: Version {
                global_id: counter.next_id(),
                revision: 0,
            },
        }
    }

    /// Marks an assignment. This tracks "was assigned", not "value changed".
    pub fn increment(&mut self) {
        self.version.revision = self.version.revision.wrapping_add(1);
    }

    pub fn version(&self) -> Version {
        self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_and_non_default() {
        let mut counter = VersionCounter::new();
        let a = VersionedObject::new(&mut counter);
        let b = VersionedObject::new(&mut counter);

        assert_ne!(a.version().global_id, b.version().global_id);
        assert_ne!(a.version(), Version::default());
        assert_eq!(counter.issued(), 2);
    }

    #[test]
    fn every_increment_changes_the_version() {
        let mut counter = VersionCounter::new();
        let mut object = VersionedObject::new(&mut counter);
        let first = object.version();

        object.increment();
        let second = object.version();
        object.increment();
        let third = object.version();

        assert!(second.revision > first.revision);
        assert!(third.revision > second.revision);
        assert_eq!(first.global_id, third.global_id);
    }
}
