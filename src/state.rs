//! Pooled, reference-counted handles to zone-graph states.
//!
//! The consumer of a Kripke structure sees states as small copyable
//! [`StateRef`] handles. Each handle designates a slot of a [`StatePool`]
//! holding the engine state, its hash (computed once, when the state is
//! wrapped) and a reference count. Cloning a handle bumps the count;
//! releasing it decrements the count, and the slot returns to the pool's
//! free list when the count reaches zero.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;

use log::debug;

use crate::table::Table;
use crate::zg::ZgStateRc;

/// Handle to a pooled state.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct StateRef(u32);

impl StateRef {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StateRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Default)]
struct Slot {
    hash: u64,
    refs: u32,
    state: Option<ZgStateRc>,
}

pub struct StatePool {
    slots: RefCell<Table<Slot>>,
    num_wrapped: Cell<usize>,
    num_freed: Cell<usize>,
}

impl fmt::Debug for StatePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatePool")
            .field("live", &self.num_live())
            .field("wrapped", &self.num_wrapped.get())
            .field("freed", &self.num_freed.get())
            .finish()
    }
}

impl Default for StatePool {
    fn default() -> Self {
        Self::new(10)
    }
}

impl StatePool {
    /// Pool with room for `2^bits` live states before growing.
    pub fn new(bits: usize) -> Self {
        Self {
            slots: RefCell::new(Table::new(bits)),
            num_wrapped: Cell::new(0),
            num_freed: Cell::new(0),
        }
    }

    /// Wrap `state` into a fresh handle with one reference.
    pub fn wrap(&self, state: ZgStateRc) -> StateRef {
        let slot = Slot {
            hash: state.canonical_hash(),
            refs: 1,
            state: Some(state),
        };
        let index = self.slots.borrow_mut().add(slot);
        self.num_wrapped.set(self.num_wrapped.get() + 1);
        StateRef(index as u32)
    }

    /// Add a reference to `s` and return the same handle.
    pub fn clone_ref(&self, s: StateRef) -> StateRef {
        self.slots.borrow_mut()[s.index()].refs += 1;
        s
    }

    /// Drop a reference to `s`. Returns `true` if that was the last one, in
    /// which case the slot is back in the pool and `s` is dangling.
    pub fn release(&self, s: StateRef) -> bool {
        let mut slots = self.slots.borrow_mut();
        let slot = &mut slots[s.index()];
        assert!(slot.refs > 0, "state {} released too many times", s);
        slot.refs -= 1;
        if slot.refs > 0 {
            return false;
        }
        // The engine state is dropped with the slot contents.
        let Slot { state, .. } = slots.take(s.index());
        drop(slots);
        drop(state);
        self.num_freed.set(self.num_freed.get() + 1);
        debug!("release: {} returned to the pool", s);
        true
    }

    pub fn hash(&self, s: StateRef) -> u64 {
        self.slots.borrow()[s.index()].hash
    }

    pub fn ref_count(&self, s: StateRef) -> u32 {
        self.slots.borrow()[s.index()].refs
    }

    pub fn is_live(&self, s: StateRef) -> bool {
        s.0 != 0 && self.slots.borrow().is_occupied(s.index())
    }

    /// The wrapped engine state.
    pub fn get(&self, s: StateRef) -> ZgStateRc {
        match &self.slots.borrow()[s.index()].state {
            Some(state) => state.clone(),
            None => unreachable!("occupied slot {} holds no state", s),
        }
    }

    /// Order two states: equal handles are equal, otherwise cached hashes
    /// decide.
    ///
    /// On a hash tie the engine can only tell whether the states differ, so
    /// differing states compare as [`Ordering::Greater`] in both directions.
    /// This is an equality test with a hash prefilter, not a total order.
    pub fn compare(&self, a: StateRef, b: StateRef) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        let (ha, hb) = (self.hash(a), self.hash(b));
        if ha != hb {
            return ha.cmp(&hb);
        }
        if self.get(a).differs(self.get(b).as_ref()) {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }

    /// Number of handles currently alive.
    pub fn num_live(&self) -> usize {
        self.slots.borrow().real_size()
    }

    /// Number of states wrapped since creation.
    pub fn num_wrapped(&self) -> usize {
        self.num_wrapped.get()
    }

    /// Number of slots returned to the pool since creation.
    pub fn num_freed(&self) -> usize {
        self.num_freed.get()
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::rc::Rc;

    use test_log::test;

    use super::*;
    use crate::zg::ZgState;

    #[derive(Debug)]
    struct Fake {
        id: u32,
        hash: u64,
    }

    impl ZgState for Fake {
        fn location(&self, _pid: u32) -> u32 {
            self.id
        }
        fn int_value(&self, _var: u32) -> i32 {
            0
        }
        fn canonical_hash(&self) -> u64 {
            self.hash
        }
        fn differs(&self, other: &dyn ZgState) -> bool {
            other.location(0) != self.id
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    fn fake(id: u32, hash: u64) -> ZgStateRc {
        Rc::new(Fake { id, hash })
    }

    #[test]
    fn test_freed_exactly_when_count_reaches_zero() {
        let pool = StatePool::new(2);
        let engine_state = fake(1, 7);
        let s = pool.wrap(engine_state.clone());
        assert_eq!(Rc::strong_count(&engine_state), 2);

        // Interleave clones and releases: three clones, four releases.
        assert_eq!(pool.clone_ref(s), s);
        assert!(!pool.release(s));
        pool.clone_ref(s);
        pool.clone_ref(s);
        assert_eq!(pool.ref_count(s), 3);
        assert!(!pool.release(s));
        assert!(!pool.release(s));
        assert!(pool.is_live(s));
        assert!(pool.release(s));

        assert!(!pool.is_live(s));
        assert_eq!(pool.num_live(), 0);
        assert_eq!(pool.num_freed(), 1);
        assert_eq!(Rc::strong_count(&engine_state), 1);
    }

    #[test]
    fn test_slots_are_reused() {
        let pool = StatePool::new(2);
        let a = pool.wrap(fake(1, 1));
        pool.release(a);
        let b = pool.wrap(fake(2, 2));
        assert_eq!(a, b);
        assert_eq!(pool.hash(b), 2);
        assert_eq!(pool.num_wrapped(), 2);
    }

    #[test]
    #[should_panic(expected = "is not occupied")]
    fn test_release_after_free_panics() {
        let pool = StatePool::new(2);
        let a = pool.wrap(fake(1, 1));
        pool.release(a);
        pool.release(a);
    }

    #[test]
    fn test_compare() {
        let pool = StatePool::new(2);
        let a = pool.wrap(fake(1, 10));
        let b = pool.wrap(fake(2, 20));
        let c = pool.wrap(fake(3, 10));
        let a2 = pool.wrap(fake(1, 10));

        assert_eq!(pool.compare(a, a), Ordering::Equal);
        assert_eq!(pool.compare(a, b), Ordering::Less);
        assert_eq!(pool.compare(b, a), Ordering::Greater);
        // Same hash, same content, different handles.
        assert_eq!(pool.compare(a, a2), Ordering::Equal);
        // Same hash, different content: not antisymmetric.
        assert_eq!(pool.compare(a, c), Ordering::Greater);
        assert_eq!(pool.compare(c, a), Ordering::Greater);
    }

    #[test]
    fn test_hash_is_cached() {
        let pool = StatePool::new(2);
        let s = pool.wrap(fake(4, 99));
        assert_eq!(pool.hash(s), 99);
        assert_eq!(pool.get(s).location(0), 4);
    }
}
