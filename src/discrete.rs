//! Clock-abstracting zone-graph engine.
//!
//! [`DiscreteGraph`] explores the discrete part of a [`Model`]: location
//! vectors and integer valuations. Every clock constraint is treated as
//! satisfiable and clock resets are dropped, so each zone semantics yields
//! the same graph, an over-approximation of the timed behaviours.
//!
//! States are interned: asking twice for the same configuration returns the
//! same shared state as long as someone still refers to it. Interned states
//! nobody refers to any more are dropped by [`DiscreteGraph::collect`],
//! unless reclamation is paused.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::rc::Rc;

use log::{debug, warn};

use crate::error::Result;
use crate::expr::{EvalError, Update};
use crate::model::{Edge, Model};
use crate::semantics::ZoneSemantics;
use crate::utils::hash_words;
use crate::zg::{Outgoing, Transition, ZgState, ZgStateRc, ZoneGraph};

const INITIAL_RECLAIM_THRESHOLD: usize = 1 << 12;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DiscreteState {
    locations: Vec<u32>,
    ints: Vec<i32>,
    hash: u64,
}

impl DiscreteState {
    pub fn new(locations: Vec<u32>, ints: Vec<i32>) -> Self {
        let hash = hash_words(
            locations
                .iter()
                .map(|&l| l as u64)
                .chain([u64::MAX])
                .chain(ints.iter().map(|&v| v as u32 as u64)),
        );
        Self { locations, ints, hash }
    }

    pub fn locations(&self) -> &[u32] {
        &self.locations
    }

    pub fn ints(&self) -> &[i32] {
        &self.ints
    }
}

impl ZgState for DiscreteState {
    fn location(&self, pid: u32) -> u32 {
        self.locations[pid as usize]
    }

    fn int_value(&self, var: u32) -> i32 {
        self.ints[var as usize]
    }

    fn canonical_hash(&self) -> u64 {
        self.hash
    }

    fn differs(&self, other: &dyn ZgState) -> bool {
        match other.as_any().downcast_ref::<DiscreteState>() {
            Some(other) => self != other,
            None => {
                (0..self.locations.len()).any(|pid| other.location(pid as u32) != self.locations[pid])
                    || (0..self.ints.len()).any(|var| other.int_value(var as u32) != self.ints[var])
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct DiscreteGraph {
    model: Rc<Model>,
    semantics: ZoneSemantics,
    interned: RefCell<HashMap<u64, Vec<Rc<DiscreteState>>>>,
    num_interned: Cell<usize>,
    reclaim_threshold: Cell<usize>,
    paused: Cell<usize>,
}

impl std::fmt::Debug for DiscreteGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscreteGraph")
            .field("system", &self.model.name())
            .field("semantics", &self.semantics)
            .field("num_interned", &self.num_interned.get())
            .field("paused", &self.paused.get())
            .finish()
    }
}

impl DiscreteGraph {
    pub fn new(model: Rc<Model>, semantics: ZoneSemantics) -> Self {
        if !model.clocks().is_empty() {
            warn!(
                "system `{}' has {} clock(s): clock constraints are abstracted, timing is not explored",
                model.name(),
                model.clocks().len()
            );
        }
        Self {
            model,
            semantics,
            interned: RefCell::new(HashMap::new()),
            num_interned: Cell::new(0),
            reclaim_threshold: Cell::new(INITIAL_RECLAIM_THRESHOLD),
            paused: Cell::new(0),
        }
    }

    /// Number of states currently interned.
    pub fn num_interned(&self) -> usize {
        self.num_interned.get()
    }

    pub fn is_paused(&self) -> bool {
        self.paused.get() > 0
    }

    /// Drop interned states nobody else refers to, and return how many.
    ///
    /// Does nothing while reclamation is paused.
    pub fn collect(&self) -> usize {
        if self.is_paused() {
            return 0;
        }
        let mut interned = self.interned.borrow_mut();
        let before = self.num_interned.get();
        interned.retain(|_, bucket| {
            bucket.retain(|s| Rc::strong_count(s) > 1);
            !bucket.is_empty()
        });
        let after = interned.values().map(Vec::len).sum();
        self.num_interned.set(after);
        debug!("collect: {} -> {} interned states", before, after);
        before - after
    }

    fn intern(&self, state: DiscreteState) -> ZgStateRc {
        let mut interned = self.interned.borrow_mut();
        let bucket = interned.entry(state.hash).or_default();
        if let Some(existing) = bucket.iter().find(|s| ***s == state) {
            return existing.clone();
        }
        let state = Rc::new(state);
        bucket.push(state.clone());
        self.num_interned.set(self.num_interned.get() + 1);
        state
    }

    fn maybe_collect(&self) {
        if self.is_paused() || self.num_interned.get() < self.reclaim_threshold.get() {
            return;
        }
        self.collect();
        self.reclaim_threshold
            .set((2 * self.num_interned.get()).max(INITIAL_RECLAIM_THRESHOLD));
    }

    fn invariants_hold(&self, locations: &[u32], ints: &[i32]) -> std::result::Result<bool, EvalError> {
        for &loc in locations {
            if !self.model.locations()[loc as usize].invariant.holds(ints)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn to_discrete(&self, state: &dyn ZgState) -> DiscreteState {
        match state.as_any().downcast_ref::<DiscreteState>() {
            Some(s) => s.clone(),
            None => DiscreteState::new(
                (0..self.model.processes().len() as u32).map(|pid| state.location(pid)).collect(),
                (0..self.model.variables().len() as u32).map(|var| state.int_value(var)).collect(),
            ),
        }
    }

    /// Fire `edges` together from `source`.
    ///
    /// Returns `None` when a guard is false, an update leaves a variable's
    /// domain, or a target invariant is false.
    fn fire(&self, source: &DiscreteState, edges: &[&Edge]) -> std::result::Result<Option<DiscreteState>, EvalError> {
        for edge in edges {
            if !edge.guard.holds(&source.ints)? {
                return Ok(None);
            }
        }
        let mut ints = source.ints.clone();
        for edge in edges {
            for update in &edge.updates {
                if let Update::Int(var, value) = update {
                    let value = value.eval(&ints)?;
                    if !self.model.intvar(*var).contains(value) {
                        return Ok(None);
                    }
                    ints[*var as usize] = value as i32;
                }
            }
        }
        let mut locations = source.locations.clone();
        for edge in edges {
            locations[edge.pid as usize] = edge.tgt;
        }
        if !self.invariants_hold(&locations, &ints)? {
            return Ok(None);
        }
        Ok(Some(DiscreteState::new(locations, ints)))
    }

    /// Candidate edge tuples of `source`, in a fixed order: asynchronous
    /// edges by process, then synchronisations in declaration order.
    fn candidates<'a>(&'a self, source: &DiscreteState) -> Vec<Vec<&'a Edge>> {
        let model = &*self.model;
        let mut result = Vec::new();

        for (pid, &loc) in source.locations.iter().enumerate() {
            for edge in model.outgoing_edges(loc) {
                if !model.is_synchronized(pid as u32, edge.event) {
                    result.push(vec![edge]);
                }
            }
        }

        for sync in model.syncs() {
            let mut tuples: Vec<Vec<&Edge>> = vec![Vec::new()];
            for &(pid, event) in &sync.constraints {
                let choices: Vec<&Edge> = model
                    .outgoing_edges(source.locations[pid as usize])
                    .filter(|e| e.event == event)
                    .collect();
                tuples = tuples
                    .into_iter()
                    .flat_map(|prefix| {
                        choices.iter().map(move |&e| {
                            let mut t = prefix.clone();
                            t.push(e);
                            t
                        })
                    })
                    .collect();
                if tuples.is_empty() {
                    break;
                }
            }
            result.extend(tuples);
        }

        let committed = |loc: u32| model.locations()[loc as usize].committed;
        if source.locations.iter().any(|&loc| committed(loc)) {
            result.retain(|tuple| tuple.iter().any(|e| committed(e.src)));
        }
        result
    }
}

impl ZoneGraph for DiscreteGraph {
    fn semantics(&self) -> ZoneSemantics {
        self.semantics
    }

    fn model(&self) -> &Model {
        &self.model
    }

    fn initial(&self) -> Result<Vec<ZgStateRc>> {
        let model = &*self.model;
        let ints: Vec<i32> = model.intvars().iter().map(|v| v.initial).collect();

        let mut vectors: Vec<Vec<u32>> = vec![Vec::new()];
        for (pid, _) in model.processes().iter() {
            let choices: Vec<u32> = model.initial_locations(pid).map(|l| l.id).collect();
            vectors = vectors
                .into_iter()
                .flat_map(|prefix| {
                    choices.iter().map(move |&loc| {
                        let mut v = prefix.clone();
                        v.push(loc);
                        v
                    })
                })
                .collect();
        }

        let mut states = Vec::with_capacity(vectors.len());
        for locations in vectors {
            match self.invariants_hold(&locations, &ints) {
                Ok(true) => states.push(self.intern(DiscreteState::new(locations, ints.clone()))),
                Ok(false) => {}
                Err(e) => debug!("initial: invariant of {:?} not evaluable: {}", locations, e),
            }
        }
        debug!("initial() -> {} state(s)", states.len());
        Ok(states)
    }

    fn outgoing(&self, state: &dyn ZgState) -> Outgoing {
        self.maybe_collect();
        let source = self.to_discrete(state);
        let mut items = Vec::new();
        for tuple in self.candidates(&source) {
            match self.fire(&source, &tuple) {
                Ok(Some(target)) => {
                    let transition = Transition {
                        edges: tuple.iter().map(|e| e.id).collect(),
                    };
                    items.push((self.intern(target), transition));
                }
                Ok(None) => {}
                Err(e) => debug!("outgoing: edges {:?} disabled: {}", tuple.iter().map(|e| e.id).collect::<Vec<_>>(), e),
            }
        }
        Outgoing::new(items)
    }

    fn format_state(&self, state: &dyn ZgState) -> String {
        let model = &*self.model;
        let mut s = String::from("<");
        for (pid, _) in model.processes().iter() {
            if pid > 0 {
                s.push(',');
            }
            s.push_str(&model.locations()[state.location(pid) as usize].name);
        }
        s.push('>');
        for (var, name) in model.variables().iter() {
            let sep = if var == 0 { ' ' } else { ',' };
            // Writing into a String cannot fail.
            let _ = write!(s, "{}{}={}", sep, name, state.int_value(var));
        }
        s
    }

    fn pause_reclamation(&self) {
        self.paused.set(self.paused.get() + 1);
        debug!("pause_reclamation: depth {}", self.paused.get());
    }

    fn resume_reclamation(&self) {
        assert!(self.paused.get() > 0, "reclamation is not paused");
        self.paused.set(self.paused.get() - 1);
        debug!("resume_reclamation: depth {}", self.paused.get());
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    const FLAG: &str = "
        system:flag
        event:set
        event:go
        int:1:0:1:0:f
        process:W
        location:W:idle{initial:}
        location:W:done{}
        edge:W:idle:done:go{provided: f==1}
        process:S
        location:S:s0{initial:}
        location:S:s1{}
        edge:S:s0:s1:set{do: f=1}
    ";

    fn graph(text: &str) -> DiscreteGraph {
        DiscreteGraph::new(Rc::new(Model::parse(text).unwrap()), ZoneSemantics::default())
    }

    fn successors(g: &DiscreteGraph, s: &dyn ZgState) -> Vec<String> {
        let mut out = g.outgoing(s);
        let mut result = Vec::new();
        while !out.at_end() {
            result.push(g.format_state(out.current().0.as_ref()));
            out.advance();
        }
        result
    }

    #[test]
    fn test_guards_and_updates() {
        let g = graph(FLAG);
        let init = g.initial().unwrap();
        assert_eq!(init.len(), 1);
        assert_eq!(g.format_state(init[0].as_ref()), "<idle,s0> f=0");

        assert_eq!(successors(&g, init[0].as_ref()), vec!["<idle,s1> f=1"]);
        let next = g.outgoing(init[0].as_ref()).current().0.clone();
        assert_eq!(successors(&g, next.as_ref()), vec!["<done,s1> f=1"]);
    }

    #[test]
    fn test_states_are_interned() {
        let g = graph(FLAG);
        let init = g.initial().unwrap();
        let again = g.initial().unwrap();
        assert!(Rc::ptr_eq(&init[0], &again[0]));
        assert!(!init[0].differs(again[0].as_ref()));
        assert_eq!(init[0].canonical_hash(), again[0].canonical_hash());
    }

    #[test]
    fn test_collect_respects_pause() {
        let g = graph(FLAG);
        let init = g.initial().unwrap();
        drop(g.outgoing(init[0].as_ref()));
        assert_eq!(g.num_interned(), 2);

        g.pause_reclamation();
        assert_eq!(g.collect(), 0);
        assert_eq!(g.num_interned(), 2);
        g.resume_reclamation();

        // Only the initial state is still referenced.
        assert_eq!(g.collect(), 1);
        assert_eq!(g.num_interned(), 1);
    }

    #[test]
    fn test_synchronisation() {
        let g = graph(
            "
            system:sync
            event:a
            process:P
            location:P:p0{initial:}
            location:P:p1{}
            edge:P:p0:p1:a
            process:Q
            location:Q:q0{initial:}
            location:Q:q1{}
            edge:Q:q0:q1:a
            sync:P@a:Q@a
            ",
        );
        let init = g.initial().unwrap();
        let mut out = g.outgoing(init[0].as_ref());
        assert_eq!(out.len(), 1);
        assert_eq!(out.current().1.edges, vec![0, 1]);
        out.advance();
        assert!(out.at_end());
    }

    #[test]
    fn test_committed_locations_take_priority() {
        let g = graph(
            "
            system:commit
            event:a
            process:P
            location:P:p0{initial: : committed:}
            location:P:p1{}
            edge:P:p0:p1:a
            process:Q
            location:Q:q0{initial:}
            location:Q:q1{}
            edge:Q:q0:q1:a
            ",
        );
        let init = g.initial().unwrap();
        assert_eq!(successors(&g, init[0].as_ref()), vec!["<p1,q0>"]);
    }

    #[test]
    fn test_out_of_bounds_update_disables_edge() {
        let g = graph(
            "
            system:bounds
            event:inc
            int:1:0:1:1:v
            process:P
            location:P:p{initial:}
            edge:P:p:p:inc{do: v=v+1}
            ",
        );
        let init = g.initial().unwrap();
        assert!(g.outgoing(init[0].as_ref()).is_empty());
    }

    #[test]
    fn test_clock_guards_are_abstracted() {
        let g = graph(
            "
            system:clocks
            event:tick
            clock:1:x
            process:P
            location:P:a{initial: : invariant: x<=3}
            location:P:b{}
            edge:P:a:b:tick{provided: x>=5 : do: x=0}
            ",
        );
        let init = g.initial().unwrap();
        assert_eq!(successors(&g, init[0].as_ref()), vec!["<b>"]);
    }

    #[test]
    fn test_multiple_initial_states() {
        let g = graph(
            "
            system:two
            process:P
            location:P:a{initial:}
            location:P:b{initial:}
            ",
        );
        assert_eq!(g.initial().unwrap().len(), 2);
    }
}
