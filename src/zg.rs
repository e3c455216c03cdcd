//! What the adapter needs from a zone-graph engine.
//!
//! An engine hands out immutable, shared states ([`ZgStateRc`]) and, for each
//! state, an [`Outgoing`] cursor over its successors. Discrete accessors on
//! the state are all the proposition evaluator reads.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::model::Model;
use crate::semantics::ZoneSemantics;

/// A state produced by a zone-graph engine.
///
/// States never change after creation. Engines may only compare them for
/// inequality, which is why there is no ordering here.
pub trait ZgState: fmt::Debug {
    /// Current location of process `pid`.
    fn location(&self, pid: u32) -> u32;

    /// Value of integer variable `var`.
    fn int_value(&self, var: u32) -> i32;

    fn canonical_hash(&self) -> u64;

    fn differs(&self, other: &dyn ZgState) -> bool;

    fn as_any(&self) -> &dyn Any;
}

pub type ZgStateRc = Rc<dyn ZgState>;

/// Edges fired together by one step of the system.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Transition {
    pub edges: Vec<u32>,
}

impl Transition {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Resettable cursor over the successors of one state.
#[derive(Debug, Default)]
pub struct Outgoing {
    items: Vec<(ZgStateRc, Transition)>,
    pos: usize,
}

impl Outgoing {
    pub fn new(items: Vec<(ZgStateRc, Transition)>) -> Self {
        Self { items, pos: 0 }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.items.len()
    }

    pub fn advance(&mut self) {
        if !self.at_end() {
            self.pos += 1;
        }
    }

    /// Destination and transition under the cursor.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is at the end.
    pub fn current(&self) -> (&ZgStateRc, &Transition) {
        let (state, transition) = &self.items[self.pos];
        (state, transition)
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Exploration interface of a zone-graph engine.
///
/// Every zone semantics exposes this same contract, so the adapter never
/// knows which one it drives.
pub trait ZoneGraph {
    fn semantics(&self) -> ZoneSemantics;

    fn model(&self) -> &Model;

    /// All initial states. The adapter only accepts exactly one.
    fn initial(&self) -> Result<Vec<ZgStateRc>>;

    fn outgoing(&self, state: &dyn ZgState) -> Outgoing;

    fn format_state(&self, state: &dyn ZgState) -> String;

    /// Keep every state the engine has produced until resumed.
    fn pause_reclamation(&self);

    fn resume_reclamation(&self);
}

/// A shared engine, so that callers can keep a handle on the engine they
/// give to [`Kripke::with_graph`](crate::kripke::Kripke::with_graph).
impl<G: ZoneGraph + ?Sized> ZoneGraph for Rc<G> {
    fn semantics(&self) -> ZoneSemantics {
        (**self).semantics()
    }

    fn model(&self) -> &Model {
        (**self).model()
    }

    fn initial(&self) -> Result<Vec<ZgStateRc>> {
        (**self).initial()
    }

    fn outgoing(&self, state: &dyn ZgState) -> Outgoing {
        (**self).outgoing(state)
    }

    fn format_state(&self, state: &dyn ZgState) -> String {
        (**self).format_state(state)
    }

    fn pause_reclamation(&self) {
        (**self).pause_reclamation()
    }

    fn resume_reclamation(&self) {
        (**self).resume_reclamation()
    }
}
