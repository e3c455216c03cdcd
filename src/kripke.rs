//! Kripke structure over a zone graph.
//!
//! [`Kripke`] is what a product or emptiness search drives: it hands out an
//! initial state, successor iterators and per-state conditions, all computed
//! on demand from the underlying [`ZoneGraph`]. States are [`StateRef`]
//! handles into a shared [`StatePool`]; the consumer owns every handle it
//! receives and gives it back with [`Kripke::release_state`].
//!
//! # Dead states
//!
//! A state without successors ends every run through it. The [`DeadPolicy`]
//! decides how such finite runs are seen:
//!
//! - [`DeadPolicy::Ignore`]: dead states have no successor at all.
//! - [`DeadPolicy::LoopUnlabeled`]: dead states loop on themselves, and the
//!   loop is indistinguishable from any other edge.
//! - [`DeadPolicy::LoopLabeled`]: dead states loop on themselves with the
//!   named proposition true; every other edge has it false.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use log::debug;

use crate::dict::{BddDict, OwnerId};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::prop::PropositionList;
use crate::reference::Ref;
use crate::semantics::{self, ZoneSemantics};
use crate::state::{StatePool, StateRef};
use crate::succ::SuccIter;
use crate::zg::{Outgoing, ZoneGraph};

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum DeadPolicy {
    Ignore,
    LoopUnlabeled,
    LoopLabeled(String),
}

impl Default for DeadPolicy {
    fn default() -> Self {
        DeadPolicy::LoopUnlabeled
    }
}

impl FromStr for DeadPolicy {
    type Err = Infallible;

    /// `"false"` ignores dead states, `"true"` loops on them, and any other
    /// text names the proposition labelling the loops.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "false" => DeadPolicy::Ignore,
            "true" => DeadPolicy::LoopUnlabeled,
            name => DeadPolicy::LoopLabeled(name.to_string()),
        })
    }
}

impl fmt::Display for DeadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeadPolicy::Ignore => f.write_str("false"),
            DeadPolicy::LoopUnlabeled => f.write_str("true"),
            DeadPolicy::LoopLabeled(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KripkeConfig {
    pub dead: DeadPolicy,
    pub semantics: ZoneSemantics,
    pub pool_bits: usize,
    pub iterator_cache: bool,
}

impl Default for KripkeConfig {
    fn default() -> Self {
        Self {
            dead: DeadPolicy::default(),
            semantics: ZoneSemantics::default(),
            pool_bits: 10,
            iterator_cache: true,
        }
    }
}

impl KripkeConfig {
    pub fn with_dead(mut self, dead: DeadPolicy) -> Self {
        self.dead = dead;
        self
    }

    pub fn with_semantics(mut self, semantics: ZoneSemantics) -> Self {
        self.semantics = semantics;
        self
    }

    pub fn with_pool_bits(mut self, bits: usize) -> Self {
        self.pool_bits = bits;
        self
    }

    pub fn with_iterator_cache(mut self, enabled: bool) -> Self {
        self.iterator_cache = enabled;
        self
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Phase {
    Constructed,
    Exploring,
}

pub struct Kripke {
    graph: Box<dyn ZoneGraph>,
    dict: Rc<BddDict>,
    owner: OwnerId,
    props: PropositionList,
    aps: RefCell<Vec<String>>,
    pool: Rc<StatePool>,
    policy: DeadPolicy,
    alive: Ref,
    dead: Ref,
    iterator_cache: bool,
    cached_iter: RefCell<Option<SuccIter>>,
    sessions: Cell<usize>,
}

impl fmt::Debug for Kripke {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kripke")
            .field("system", &self.graph.model().name())
            .field("semantics", &self.graph.semantics())
            .field("dead", &self.policy)
            .field("propositions", &self.props.len())
            .field("pool", &self.pool)
            .field("phase", &self.phase())
            .finish()
    }
}

/// Exploration session of a [`Kripke`] structure.
///
/// Engine reclamation stays paused while the session is alive.
#[must_use]
pub struct Session<'a> {
    kripke: &'a Kripke,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.kripke.graph.resume_reclamation();
        self.kripke.sessions.set(self.kripke.sessions.get() - 1);
        debug!("session ended");
    }
}

impl Kripke {
    /// Build the structure of `model` observing `aps`, with the engine
    /// selected by `config.semantics`.
    pub fn new<'a>(
        model: Rc<Model>,
        aps: impl IntoIterator<Item = &'a str>,
        dict: Rc<BddDict>,
        config: KripkeConfig,
    ) -> Result<Self> {
        let graph = semantics::instantiate(model, config.semantics);
        Self::with_graph(graph, aps, dict, config)
    }

    /// Build the structure over an already constructed engine.
    pub fn with_graph<'a>(
        graph: Box<dyn ZoneGraph>,
        aps: impl IntoIterator<Item = &'a str>,
        dict: Rc<BddDict>,
        config: KripkeConfig,
    ) -> Result<Self> {
        let aps: Vec<&str> = aps.into_iter().collect();
        let dead_name = match &config.dead {
            DeadPolicy::LoopLabeled(name) => Some(name.as_str()),
            _ => None,
        };
        let props = PropositionList::compile(aps.iter().copied(), graph.model(), dict.clone(), dead_name)?;

        let owner = dict.new_owner();
        let bdd = dict.bdd();
        let (alive, dead) = match &config.dead {
            DeadPolicy::Ignore => (bdd.one(), bdd.zero()),
            DeadPolicy::LoopUnlabeled => (bdd.one(), bdd.one()),
            DeadPolicy::LoopLabeled(name) => {
                let v = bdd.mk_var(dict.register_proposition(name, owner));
                (-v, v)
            }
        };

        let kripke = Self {
            graph,
            dict: dict.clone(),
            owner,
            props,
            aps: RefCell::new(Vec::new()),
            pool: Rc::new(StatePool::new(config.pool_bits)),
            policy: config.dead.clone(),
            alive,
            dead,
            iterator_cache: config.iterator_cache,
            cached_iter: RefCell::new(None),
            sessions: Cell::new(0),
        };
        for ap in aps {
            kripke.register_ap(ap);
        }
        if let Some(name) = dead_name {
            kripke.register_ap(name);
        }
        debug!(
            "Kripke::with_graph(system = {}, semantics = {}, dead = {}) observing {:?}",
            kripke.graph.model().name(),
            kripke.graph.semantics(),
            kripke.policy,
            kripke.aps.borrow()
        );
        Ok(kripke)
    }

    /// Declare `name` as observed by this structure and return its variable.
    pub fn register_ap(&self, name: &str) -> u32 {
        let var = self.dict.register_proposition(name, self.owner);
        let mut aps = self.aps.borrow_mut();
        if !aps.iter().any(|ap| ap == name) {
            aps.push(name.to_string());
        }
        var
    }

    /// Observed propositions, in registration order.
    pub fn aps(&self) -> Vec<String> {
        self.aps.borrow().clone()
    }

    pub fn model(&self) -> &Model {
        self.graph.model()
    }

    pub fn graph(&self) -> &dyn ZoneGraph {
        self.graph.as_ref()
    }

    pub fn dict(&self) -> &Rc<BddDict> {
        &self.dict
    }

    pub fn pool(&self) -> &StatePool {
        &self.pool
    }

    pub fn propositions(&self) -> &PropositionList {
        &self.props
    }

    pub fn dead_policy(&self) -> &DeadPolicy {
        &self.policy
    }

    pub fn semantics(&self) -> ZoneSemantics {
        self.graph.semantics()
    }

    /// Condition carried by edges leaving states with successors.
    pub fn alive_marker(&self) -> Ref {
        self.alive
    }

    /// Condition carried by the loops on dead states.
    pub fn dead_marker(&self) -> Ref {
        self.dead
    }

    pub fn phase(&self) -> Phase {
        if self.sessions.get() > 0 {
            Phase::Exploring
        } else {
            Phase::Constructed
        }
    }

    /// Pause engine reclamation until the returned session is dropped.
    pub fn start_session(&self) -> Session<'_> {
        self.graph.pause_reclamation();
        self.sessions.set(self.sessions.get() + 1);
        debug!("session started");
        Session { kripke: self }
    }

    /// The unique initial state, as a handle owned by the caller.
    pub fn initial_state(&self) -> Result<StateRef> {
        let mut initial = self.graph.initial()?;
        if initial.len() > 1 {
            return Err(Error::MultipleInitialStates);
        }
        let state = initial.pop().ok_or(Error::NoInitialState)?;
        let s = self.pool.wrap(state);
        debug!("initial_state() -> {}", s);
        Ok(s)
    }

    /// One literal per compiled proposition, positive when it holds on `s`.
    pub fn state_condition(&self, s: StateRef) -> Ref {
        self.props.condition(self.pool.get(s).as_ref())
    }

    /// Successors of `s`.
    ///
    /// Edges leaving a state with engine successors carry its condition and
    /// the alive marker. A dead state gets a single loop carrying its
    /// condition and the dead marker, unless that conjunction is false, in
    /// which case it gets nothing.
    pub fn succ_iter(&self, s: StateRef) -> SuccIter {
        let zs = self.pool.get(s);
        let outgoing = self.graph.outgoing(zs.as_ref());
        let bdd = self.dict.bdd();
        let mut cond = self.props.condition(zs.as_ref());

        let (outgoing, self_loop) = if !outgoing.is_empty() {
            cond = bdd.apply_and(cond, self.alive);
            (outgoing, None)
        } else {
            cond = bdd.apply_and(cond, self.dead);
            let want_loop = !bdd.is_zero(cond);
            (Outgoing::empty(), want_loop.then(|| self.pool.clone_ref(s)))
        };
        debug!(
            "succ_iter({}) -> {} successor(s), self-loop: {}",
            s,
            outgoing.len(),
            self_loop.is_some()
        );

        match self.cached_iter.borrow_mut().take() {
            Some(mut it) => {
                it.recycle(outgoing, cond, self_loop);
                it
            }
            None => SuccIter::new(self.pool.clone(), outgoing, cond, self_loop),
        }
    }

    /// Give an iterator back. One is kept for the next [`Kripke::succ_iter`].
    ///
    /// An iterator made by another structure is dropped, not cached.
    pub fn release_iter(&self, mut it: SuccIter) {
        if !self.iterator_cache {
            return;
        }
        if !Rc::ptr_eq(it.pool(), &self.pool) {
            debug!("release_iter: dropping an iterator of another structure");
            return;
        }
        let mut cached = self.cached_iter.borrow_mut();
        if cached.is_none() {
            it.recycle(Outgoing::empty(), self.dict.bdd().zero(), None);
            *cached = Some(it);
        }
    }

    pub fn clone_state(&self, s: StateRef) -> StateRef {
        self.pool.clone_ref(s)
    }

    pub fn release_state(&self, s: StateRef) {
        self.pool.release(s);
    }

    pub fn state_hash(&self, s: StateRef) -> u64 {
        self.pool.hash(s)
    }

    /// See [`StatePool::compare`] for the meaning of the result.
    pub fn compare(&self, a: StateRef, b: StateRef) -> Ordering {
        self.pool.compare(a, b)
    }

    pub fn format_state(&self, s: StateRef) -> String {
        self.graph.format_state(self.pool.get(s).as_ref())
    }

    pub fn format_condition(&self, cond: Ref) -> String {
        self.dict.format_condition(cond)
    }
}

impl Drop for Kripke {
    fn drop(&mut self) {
        let n = self.dict.unregister_all(self.owner);
        debug!("drop Kripke: unregistered {} variable(s)", n);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::discrete::DiscreteGraph;

    // `v' counts up to 2, then the process is stuck in `end'.
    const COUNTER: &str = "
        system:counter
        event:inc
        event:stop
        int:1:0:2:0:v
        process:C
        location:C:run{initial:}
        location:C:end{}
        edge:C:run:run:inc{provided: v<2 : do: v=v+1}
        edge:C:run:end:stop{provided: v==2}
    ";

    fn kripke(aps: &[&str], dead: &str) -> Kripke {
        let model = Rc::new(Model::parse(COUNTER).unwrap());
        let config = KripkeConfig::default().with_dead(dead.parse().unwrap());
        Kripke::new(model, aps.iter().copied(), Rc::new(BddDict::default()), config).unwrap()
    }

    /// Follow the first successor `n` times.
    fn walk(k: &Kripke, n: usize) -> StateRef {
        let mut s = k.initial_state().unwrap();
        for _ in 0..n {
            let mut it = k.succ_iter(s);
            assert!(it.first());
            let next = it.dst();
            k.release_iter(it);
            k.release_state(s);
            s = next;
        }
        s
    }

    fn successors(k: &Kripke, s: StateRef) -> Vec<(StateRef, String)> {
        let mut it = k.succ_iter(s);
        let mut result = Vec::new();
        if it.first() {
            loop {
                result.push((it.dst(), k.format_condition(it.cond())));
                if !it.next() {
                    break;
                }
            }
        }
        k.release_iter(it);
        result
    }

    #[test]
    fn test_dead_policy_from_str() {
        assert_eq!("false".parse::<DeadPolicy>().unwrap(), DeadPolicy::Ignore);
        assert_eq!("true".parse::<DeadPolicy>().unwrap(), DeadPolicy::LoopUnlabeled);
        assert_eq!(
            "dead".parse::<DeadPolicy>().unwrap(),
            DeadPolicy::LoopLabeled("dead".to_string())
        );
        assert_eq!(DeadPolicy::LoopLabeled("x".to_string()).to_string(), "x");
    }

    #[test]
    fn test_markers() {
        let k = kripke(&[], "false");
        assert_eq!(k.format_condition(k.alive_marker()), "1");
        assert_eq!(k.format_condition(k.dead_marker()), "0");

        let k = kripke(&[], "true");
        assert_eq!(k.format_condition(k.alive_marker()), "1");
        assert_eq!(k.format_condition(k.dead_marker()), "1");

        let k = kripke(&[], "dead");
        assert_eq!(k.dead_marker(), -k.alive_marker());
        assert_eq!(k.format_condition(k.dead_marker()), "dead");
    }

    #[test]
    fn test_dead_state_ignored() {
        let k = kripke(&["v==2"], "false");
        let end = walk(&k, 3);
        assert_eq!(k.format_state(end), "<end> v=2");
        assert!(successors(&k, end).is_empty());
    }

    #[test]
    fn test_dead_state_loops_unlabeled() {
        let k = kripke(&["v==2"], "true");
        let end = walk(&k, 3);
        let succ = successors(&k, end);
        assert_eq!(succ.len(), 1);
        assert_eq!(succ[0].0, end);
        assert_eq!(k.compare(succ[0].0, end), Ordering::Equal);
        assert_eq!(succ[0].1, "v==2");
    }

    #[test]
    fn test_dead_state_loops_labeled() {
        let k = kripke(&["v==2", "dead"], "dead");
        let init = k.initial_state().unwrap();
        for (s, cond) in successors(&k, init) {
            assert_eq!(cond, "!v==2 & !dead");
            k.release_state(s);
        }

        let end = walk(&k, 3);
        let succ = successors(&k, end);
        assert_eq!(succ.len(), 1);
        assert_eq!(succ[0].0, end);
        assert_eq!(succ[0].1, "v==2 & dead");
    }

    #[test]
    fn test_initial_state_and_conditions() {
        let k = kripke(&["v", "C.run", "v>=1"], "true");
        let init = k.initial_state().unwrap();
        assert_eq!(k.format_state(init), "<run> v=0");
        assert_eq!(k.format_condition(k.state_condition(init)), "C.run & !v & !v>=1");

        let one = walk(&k, 1);
        assert_eq!(k.format_condition(k.state_condition(one)), "C.run & v & v>=1");
        assert_ne!(k.compare(init, one), Ordering::Equal);
    }

    #[test]
    fn test_identical_states_get_equal_hashes() {
        let k = kripke(&[], "true");
        let a = k.initial_state().unwrap();
        let b = k.initial_state().unwrap();
        assert_ne!(a, b);
        assert_eq!(k.state_hash(a), k.state_hash(b));
        assert_eq!(k.compare(a, b), Ordering::Equal);
    }

    #[test]
    fn test_iterator_cache_is_transparent() {
        let model = Rc::new(Model::parse(COUNTER).unwrap());
        let dict = Rc::new(BddDict::default());
        let with = Kripke::new(model.clone(), ["v"], dict.clone(), KripkeConfig::default()).unwrap();
        let without = Kripke::new(
            model,
            ["v"],
            dict,
            KripkeConfig::default().with_iterator_cache(false),
        )
        .unwrap();

        for k in [&with, &without] {
            let mut s = k.initial_state().unwrap();
            let mut trace = Vec::new();
            for _ in 0..5 {
                let succ = successors(k, s);
                trace.push(succ.iter().map(|(d, c)| (k.format_state(*d), c.clone())).collect::<Vec<_>>());
                k.release_state(s);
                s = succ[0].0;
                for &(d, _) in &succ[1..] {
                    k.release_state(d);
                }
            }
            k.release_state(s);
            assert_eq!(k.pool().num_live(), 0);
            assert_eq!(
                trace[2],
                vec![("<end> v=2".to_string(), "v".to_string())]
            );
        }
    }

    #[test]
    fn test_sessions() {
        let k = kripke(&[], "true");
        assert_eq!(k.phase(), Phase::Constructed);
        {
            let _session = k.start_session();
            assert_eq!(k.phase(), Phase::Exploring);
        }
        assert_eq!(k.phase(), Phase::Constructed);
    }

    #[test]
    fn test_sessions_pause_engine_reclamation() {
        let model = Rc::new(Model::parse(COUNTER).unwrap());
        let graph = Rc::new(DiscreteGraph::new(model, ZoneSemantics::default()));
        let k = Kripke::with_graph(
            Box::new(graph.clone()),
            ["v"],
            Rc::new(BddDict::default()),
            KripkeConfig::default(),
        )
        .unwrap();
        assert!(!graph.is_paused());

        let session = k.start_session();
        assert!(graph.is_paused());
        let s = walk(&k, 2);
        assert_eq!(k.format_state(s), "<run> v=2");
        k.release_state(s);
        assert_eq!(k.pool().num_live(), 0);
        assert_eq!(graph.num_interned(), 3);
        assert_eq!(graph.collect(), 0);
        assert_eq!(graph.num_interned(), 3);

        drop(session);
        assert!(!graph.is_paused());
        assert_eq!(graph.collect(), 3);
        assert_eq!(graph.num_interned(), 0);
    }

    #[test]
    fn test_foreign_iterator_is_not_cached() {
        let a = kripke(&["v"], "true");
        let b = kripke(&["v"], "true");
        let sa = a.initial_state().unwrap();
        let sb = b.initial_state().unwrap();

        let it = a.succ_iter(sa);
        b.release_iter(it);

        let mut it = b.succ_iter(sb);
        assert!(it.first());
        let d = it.dst();
        b.release_iter(it);
        assert_eq!(b.format_state(d), "<run> v=1");
        assert_eq!(b.pool().num_live(), 2);
        assert_eq!(a.pool().num_live(), 1);

        b.release_state(d);
        b.release_state(sb);
        a.release_state(sa);
        assert_eq!(a.pool().num_live(), 0);
        assert_eq!(b.pool().num_live(), 0);
    }

    #[test]
    fn test_multiple_initial_states_rejected() {
        let model = Rc::new(Model::parse("system:s\nprocess:P\nlocation:P:a{initial:}\nlocation:P:b{initial:}\n").unwrap());
        let k = Kripke::new(model, [], Rc::new(BddDict::default()), KripkeConfig::default()).unwrap();
        assert!(matches!(k.initial_state(), Err(Error::MultipleInitialStates)));
    }

    #[test]
    fn test_teardown_unregisters_everything() {
        let model = Rc::new(Model::parse(COUNTER).unwrap());
        let dict = Rc::new(BddDict::default());
        let config = KripkeConfig::default().with_dead(DeadPolicy::LoopLabeled("dead".to_string()));
        let k = Kripke::new(model, ["v==1", "C.end"], dict.clone(), config).unwrap();
        assert_eq!(dict.num_registered(), 3);
        assert_eq!(k.aps(), vec!["v==1", "C.end", "dead"]);
        drop(k);
        assert_eq!(dict.num_registered(), 0);
    }

    #[test]
    fn test_compile_error_leaves_dictionary_clean() {
        let model = Rc::new(Model::parse(COUNTER).unwrap());
        let dict = Rc::new(BddDict::default());
        let result = Kripke::new(model, ["v==1", "foo"], dict.clone(), KripkeConfig::default());
        assert!(matches!(result, Err(Error::Propositions(_))));
        assert_eq!(dict.num_registered(), 0);
    }
}
