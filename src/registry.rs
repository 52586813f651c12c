use ahash::AHashMap;

/// An integer-keyed store of live resources.
///
/// Handles are supplied by the producer side and are opaque here;
/// each resource kind gets its own registry and key space. The
/// registry is not synchronized; the bridge funnels every mutating
/// call through the rendering thread.
#[derive(Debug)]
pub struct Registry<T> {
    entries: AHashMap<u32, T>,
    kind: &'static str,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            entries: AHashMap::new(),
            kind,
        }
    }

    /// Maps `handle` to `resource`. If the slot was occupied the prior
    /// occupant is returned so the caller can release it; the override
    /// is logged as a warning.
    pub fn put(&mut self, handle: u32, resource: T) -> Option<T> {
        let old = self.entries.insert(handle, resource);
        if old.is_some() {
            log::warn!(
                "{} {} already registered, overriding the old instance",
                self.kind,
                handle
            );
        }
        old
    }

    /// Re-inserts a resource that was temporarily taken out with
    /// [`remove`](Self::remove). Does not warn.
    pub(crate) fn restore(&mut self, handle: u32, resource: T) {
        self.entries.insert(handle, resource);
    }

    pub fn get(&self, handle: u32) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: u32) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn contains(&self, handle: u32) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn remove(&mut self, handle: u32) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// Empties the registry, yielding every entry for teardown.
    pub fn drain(&mut self) -> impl Iterator<Item = (u32, T)> + '_ {
        self.entries.drain()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_returns_prior_occupant() {
        let mut registry = Registry::new("canvas");
        assert!(registry.put(7, "a").is_none());
        assert_eq!(registry.put(7, "b"), Some("a"));
        assert_eq!(registry.get(7), Some(&"b"));
    }

    #[test]
    fn remove_unmaps() {
        let mut registry = Registry::new("canvas");
        registry.put(1, 10);
        assert_eq!(registry.remove(1), Some(10));
        assert_eq!(registry.remove(1), None);
        assert!(!registry.contains(1));
    }

    #[test]
    fn drain_empties() {
        let mut registry = Registry::new("image");
        registry.put(1, ());
        registry.put(2, ());
        assert_eq!(registry.drain().count(), 2);
        assert!(registry.is_empty());
    }
}
