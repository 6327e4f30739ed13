//! Value caches threaded along the control-flow graph.
//!
//! A [`Cache`] pairs the pure cache (computations keyed by opcode, result type
//! and argument representatives) with the heap cache (location contents keyed
//! by base representative, owner type and field or element descriptor).
//!
//! Both maps are persistent ordered maps ([`imbl::OrdMap`]). Handing a cache to
//! several successors shares its structure, and a later insertion or removal
//! only copies the path to the changed node, so siblings never observe each
//! other's updates. Iteration follows key order, which keeps merging and
//! parameter synthesis deterministic.

use imbl::OrdMap;

use crate::analysis::{EffectLocation, FieldRef, Opcode, Operand, SsaType, WriteEffects};

/// Key of a pure computation.
///
/// `args` holds representatives only. For calls to elidable functions the
/// callee constant is the first argument, so the callee is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PureKey {
    /// The operation computing the value.
    pub opcode: Opcode,
    /// The static type of the result.
    pub result_type: SsaType,
    /// Argument representatives.
    pub args: Vec<Operand>,
}

impl PureKey {
    /// Creates a key from already resolved argument representatives.
    #[must_use]
    pub fn new(opcode: Opcode, result_type: SsaType, args: Vec<Operand>) -> Self {
        Self {
            opcode,
            result_type,
            args,
        }
    }

    /// Returns the first argument, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Operand> {
        self.args.first()
    }

    /// Returns a copy of the key with the first argument replaced.
    #[must_use]
    pub fn with_first(&self, first: Operand) -> Self {
        let mut key = self.clone();
        if let Some(slot) = key.args.first_mut() {
            *slot = first;
        }
        key
    }
}

/// What part of an aggregate a heap key designates.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeapDescriptor {
    /// A named field of a struct.
    Field(FieldRef),
    /// An array element at the given index representative.
    Item(Operand),
}

/// Key of a heap location.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeapKey {
    /// Representative of the aggregate.
    pub base: Operand,
    /// Static type of the aggregate as seen by the accessing operation.
    pub owner: SsaType,
    /// Field or element.
    pub descriptor: HeapDescriptor,
}

impl HeapKey {
    /// Creates a key for a struct field.
    #[must_use]
    pub fn field(base: Operand, owner: SsaType, field: FieldRef) -> Self {
        Self {
            base,
            owner,
            descriptor: HeapDescriptor::Field(field),
        }
    }

    /// Creates a key for an array element.
    #[must_use]
    pub fn item(base: Operand, owner: SsaType, index: Operand) -> Self {
        Self {
            base,
            owner,
            descriptor: HeapDescriptor::Item(index),
        }
    }

    /// Returns a copy of the key with another base.
    #[must_use]
    pub fn with_base(&self, base: Operand) -> Self {
        Self {
            base,
            owner: self.owner.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Returns the abstract location effects are reported against.
    ///
    /// All elements of an array type share one location, since any two
    /// indices may be equal at run time.
    #[must_use]
    pub fn location(&self) -> EffectLocation {
        match &self.descriptor {
            HeapDescriptor::Field(field) => EffectLocation::Field(self.owner.clone(), *field),
            HeapDescriptor::Item(_) => EffectLocation::ArrayItems(self.owner.clone()),
        }
    }
}

/// The pure and heap caches valid at one program point.
///
/// # Examples
///
/// ```rust
/// use cseflow::analysis::{ConstValue, FieldRef, Opcode, Operand, SsaType, SsaVarId, WriteEffects};
/// use cseflow::compiler::{Cache, HeapKey, PureKey};
///
/// let x: Operand = SsaVarId::new(0).into();
/// let mut cache = Cache::new();
/// cache.insert_pure(
///     PureKey::new(Opcode::IntNeg, SsaType::I64, vec![x.clone()]),
///     SsaVarId::new(1).into(),
/// );
/// cache.insert_heap(
///     HeapKey::field(x.clone(), SsaType::I64, FieldRef::new(0)),
///     ConstValue::I64(4).into(),
/// );
///
/// let sibling = cache.clone();
/// cache.purge(&WriteEffects::Top);
/// assert_eq!(cache.heap_len(), 0);
/// assert_eq!(cache.pure_len(), 1);
/// assert_eq!(sibling.heap_len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cache {
    pure: OrdMap<PureKey, Operand>,
    heap: OrdMap<HeapKey, Operand>,
}

impl Cache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value known to be computed by `key`.
    #[must_use]
    pub fn pure(&self, key: &PureKey) -> Option<&Operand> {
        self.pure.get(key)
    }

    /// Records the value computed by `key`, replacing any earlier entry.
    pub fn insert_pure(&mut self, key: PureKey, value: Operand) {
        self.pure.insert(key, value);
    }

    /// Returns the value known to be stored at `key`.
    #[must_use]
    pub fn heap(&self, key: &HeapKey) -> Option<&Operand> {
        self.heap.get(key)
    }

    /// Records the value stored at `key`, replacing any earlier entry.
    pub fn insert_heap(&mut self, key: HeapKey, value: Operand) {
        self.heap.insert(key, value);
    }

    /// Iterates over the pure entries in key order.
    pub fn pure_entries(&self) -> impl Iterator<Item = (&PureKey, &Operand)> + '_ {
        self.pure.iter()
    }

    /// Iterates over the heap entries in key order.
    pub fn heap_entries(&self) -> impl Iterator<Item = (&HeapKey, &Operand)> + '_ {
        self.heap.iter()
    }

    /// Returns the number of pure entries.
    #[must_use]
    pub fn pure_len(&self) -> usize {
        self.pure.len()
    }

    /// Returns the number of heap entries.
    #[must_use]
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if both maps are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pure.is_empty() && self.heap.is_empty()
    }

    /// Drops every heap entry of `owner` whose descriptor has the same kind and,
    /// for fields, the same field as `descriptor`, whatever its base.
    ///
    /// Returns the number of entries removed.
    pub fn clear_location(&mut self, owner: &SsaType, descriptor: &HeapDescriptor) -> usize {
        let matches = |key: &HeapKey| {
            key.owner == *owner
                && match (&key.descriptor, descriptor) {
                    (HeapDescriptor::Field(a), HeapDescriptor::Field(b)) => a == b,
                    (HeapDescriptor::Item(_), HeapDescriptor::Item(_)) => true,
                    _ => false,
                }
        };
        self.retain_heap(|key| !matches(key))
    }

    /// Drops every heap entry whose location `effects` may write.
    ///
    /// Returns the number of entries removed.
    pub fn purge(&mut self, effects: &WriteEffects) -> usize {
        if self.heap.is_empty() {
            return 0;
        }
        if effects.is_top() {
            let removed = self.heap.len();
            self.heap = OrdMap::new();
            return removed;
        }
        if effects.is_bottom() {
            return 0;
        }
        self.retain_heap(|key| !effects.contains(&key.location()))
    }

    fn retain_heap<F>(&mut self, keep: F) -> usize
    where
        F: Fn(&HeapKey) -> bool,
    {
        let doomed: Vec<HeapKey> = self
            .heap
            .keys()
            .filter(|key| !keep(key))
            .cloned()
            .collect();
        for key in &doomed {
            self.heap.remove(key);
        }
        doomed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ConstValue, SsaVarId, TypeRef};

    fn var(n: usize) -> Operand {
        SsaVarId::new(n).into()
    }

    fn node() -> SsaType {
        SsaType::Object(TypeRef::new(1))
    }

    fn array() -> SsaType {
        SsaType::Array(Box::new(SsaType::I64))
    }

    #[test]
    fn test_copy_on_write() {
        let mut a = Cache::new();
        a.insert_pure(PureKey::new(Opcode::IntNeg, SsaType::I64, vec![var(0)]), var(1));
        let b = a.clone();
        a.insert_pure(PureKey::new(Opcode::IntNeg, SsaType::I64, vec![var(2)]), var(3));
        assert_eq!(a.pure_len(), 2);
        assert_eq!(b.pure_len(), 1);
    }

    #[test]
    fn test_purge_leaves_fork_intact() {
        let mut a = Cache::new();
        for n in 0..64 {
            a.insert_heap(HeapKey::field(var(n), node(), FieldRef::new(n as u32 % 2)), var(n + 100));
        }
        let b = a.clone();

        assert_eq!(a.clear_location(&node(), &HeapDescriptor::Field(FieldRef::new(0))), 32);
        assert_eq!(a.heap_len(), 32);
        assert_eq!(b.heap_len(), 64);
        assert_eq!(
            b.heap(&HeapKey::field(var(0), node(), FieldRef::new(0))),
            Some(&var(100))
        );
        let keys: Vec<&HeapKey> = a.heap_entries().map(|(key, _)| key).collect();
        assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_clear_location_field_any_base() {
        let mut cache = Cache::new();
        cache.insert_heap(HeapKey::field(var(0), node(), FieldRef::new(1)), var(5));
        cache.insert_heap(HeapKey::field(var(1), node(), FieldRef::new(1)), var(6));
        cache.insert_heap(HeapKey::field(var(0), node(), FieldRef::new(2)), var(7));

        let removed = cache.clear_location(&node(), &HeapDescriptor::Field(FieldRef::new(1)));
        assert_eq!(removed, 2);
        assert_eq!(cache.heap_len(), 1);
    }

    #[test]
    fn test_clear_location_items_any_index() {
        let mut cache = Cache::new();
        cache.insert_heap(HeapKey::item(var(0), array(), ConstValue::I64(0).into()), var(5));
        cache.insert_heap(HeapKey::item(var(1), array(), var(2)), var(6));
        cache.insert_heap(HeapKey::field(var(0), node(), FieldRef::new(0)), var(7));

        let removed = cache.clear_location(&array(), &HeapDescriptor::Item(var(9)));
        assert_eq!(removed, 2);
        assert_eq!(cache.heap_len(), 1);
    }

    #[test]
    fn test_purge_by_location() {
        let mut cache = Cache::new();
        cache.insert_heap(HeapKey::field(var(0), node(), FieldRef::new(1)), var(5));
        cache.insert_heap(HeapKey::item(var(1), array(), var(2)), var(6));

        let effects = WriteEffects::single(EffectLocation::ArrayItems(array()));
        assert_eq!(cache.purge(&effects), 1);
        assert!(cache.heap(&HeapKey::field(var(0), node(), FieldRef::new(1))).is_some());
        assert_eq!(cache.purge(&WriteEffects::bottom()), 0);
        assert_eq!(cache.purge(&WriteEffects::Top), 1);
        assert_eq!(cache.heap_len(), 0);
    }

    #[test]
    fn test_with_first_and_with_base() {
        let key = PureKey::new(Opcode::IntAdd, SsaType::I64, vec![var(0), var(1)]);
        assert_eq!(key.with_first(var(4)).args, vec![var(4), var(1)]);

        let heap = HeapKey::field(var(0), node(), FieldRef::new(3));
        let moved = heap.with_base(var(8));
        assert_eq!(moved.base, var(8));
        assert_eq!(moved.location(), heap.location());
    }
}
