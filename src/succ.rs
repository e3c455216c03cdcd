//! Successor iteration over pooled states.

use std::rc::Rc;

use crate::reference::Ref;
use crate::state::{StatePool, StateRef};
use crate::zg::{Outgoing, Transition};

/// External iterator over the successors of one state.
///
/// In the normal mode it walks the engine's outgoing cursor and wraps every
/// destination into a fresh pooled handle. In the self-loop mode it yields
/// exactly one successor, the source state itself, whatever the engine
/// cursor holds. Either way every edge carries the same condition.
///
/// ```text
/// if it.first() {
///     loop {
///         let dst = it.dst();
///         ...
///         if !it.next() { break; }
///     }
/// }
/// ```
#[derive(Debug)]
pub struct SuccIter {
    pool: Rc<StatePool>,
    outgoing: Outgoing,
    cond: Ref,
    self_loop: Option<StateRef>,
    looped: bool,
}

impl SuccIter {
    /// The iterator owns one reference to `self_loop`, released on drop.
    pub fn new(pool: Rc<StatePool>, outgoing: Outgoing, cond: Ref, self_loop: Option<StateRef>) -> Self {
        Self {
            pool,
            outgoing,
            cond,
            self_loop,
            looped: false,
        }
    }

    pub(crate) fn pool(&self) -> &Rc<StatePool> {
        &self.pool
    }

    /// Restart on a new triple, as if freshly constructed.
    pub fn recycle(&mut self, outgoing: Outgoing, cond: Ref, self_loop: Option<StateRef>) {
        if let Some(s) = self.self_loop.take() {
            self.pool.release(s);
        }
        self.outgoing = outgoing;
        self.cond = cond;
        self.self_loop = self_loop;
        self.looped = false;
    }

    /// Move to the first successor and report whether there is one.
    pub fn first(&mut self) -> bool {
        if self.self_loop.is_some() {
            self.looped = false;
            return true;
        }
        self.outgoing.rewind();
        !self.outgoing.at_end()
    }

    /// Move to the next successor and report whether there is one.
    pub fn next(&mut self) -> bool {
        if self.self_loop.is_some() {
            self.looped = true;
            return false;
        }
        self.outgoing.advance();
        !self.outgoing.at_end()
    }

    pub fn done(&self) -> bool {
        if self.self_loop.is_some() {
            return self.looped;
        }
        self.outgoing.at_end()
    }

    /// Destination of the current edge, as a new reference the caller must
    /// release.
    pub fn dst(&self) -> StateRef {
        assert!(!self.done(), "dst() called on an exhausted iterator");
        match self.self_loop {
            Some(s) => self.pool.clone_ref(s),
            None => self.pool.wrap(self.outgoing.current().0.clone()),
        }
    }

    /// Condition of the current edge.
    pub fn cond(&self) -> Ref {
        self.cond
    }

    /// Engine transition of the current edge, `None` on a self-loop.
    pub fn transition(&self) -> Option<&Transition> {
        if self.self_loop.is_some() || self.outgoing.at_end() {
            return None;
        }
        Some(self.outgoing.current().1)
    }

    pub fn is_self_loop(&self) -> bool {
        self.self_loop.is_some()
    }
}

impl Drop for SuccIter {
    fn drop(&mut self) {
        if let Some(s) = self.self_loop.take() {
            self.pool.release(s);
        }
    }
}
