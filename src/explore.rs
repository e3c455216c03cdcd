//! Breadth-first exploration of a Kripke structure.
//!
//! This is a consumer of the [`Kripke`] interface, written the way a product
//! search would use it: states are told apart with [`Kripke::state_hash`]
//! and [`Kripke::compare`], and every handle received is released.

use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use log::debug;

use crate::error::Result;
use crate::kripke::Kripke;
use crate::state::StateRef;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExploredState {
    pub label: String,
    pub condition: String,
    pub dead: bool,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ExploredEdge {
    pub src: usize,
    pub dst: usize,
    pub condition: String,
}

/// States reachable from the initial one, numbered in visiting order.
#[derive(Debug, Clone, Default)]
pub struct Exploration {
    pub name: String,
    pub states: Vec<ExploredState>,
    pub edges: Vec<ExploredEdge>,
    /// Whether the state limit stopped the exploration early.
    pub truncated: bool,
}

impl Exploration {
    pub fn num_dead(&self) -> usize {
        self.states.iter().filter(|s| s.dead).count()
    }
}

struct Visited<'a> {
    kripke: &'a Kripke,
    buckets: HashMap<u64, Vec<(StateRef, usize)>>,
}

impl Visited<'_> {
    fn find(&self, s: StateRef) -> Option<usize> {
        let bucket = self.buckets.get(&self.kripke.state_hash(s))?;
        bucket
            .iter()
            .find(|&&(t, _)| self.kripke.compare(s, t) == Ordering::Equal)
            .map(|&(_, i)| i)
    }

    fn insert(&mut self, s: StateRef, index: usize) {
        let hash = self.kripke.state_hash(s);
        self.buckets.entry(hash).or_default().push((s, index));
    }
}

impl Drop for Visited<'_> {
    fn drop(&mut self) {
        for (s, _) in self.buckets.drain().flat_map(|(_, bucket)| bucket) {
            self.kripke.release_state(s);
        }
    }
}

/// Explore `kripke` breadth-first, visiting at most `limit` states.
pub fn explore(kripke: &Kripke, limit: Option<usize>) -> Result<Exploration> {
    let _session = kripke.start_session();
    let mut result = Exploration {
        name: kripke.model().name().to_string(),
        ..Exploration::default()
    };
    let mut visited = Visited {
        kripke,
        buckets: HashMap::new(),
    };
    let mut queue = VecDeque::new();

    let init = kripke.initial_state()?;
    visited.insert(kripke.clone_state(init), 0);
    result.states.push(ExploredState {
        label: kripke.format_state(init),
        condition: kripke.format_condition(kripke.state_condition(init)),
        dead: false,
    });
    queue.push_back((init, 0));

    while let Some((s, index)) = queue.pop_front() {
        let mut it = kripke.succ_iter(s);
        let mut has_succ = it.first();
        result.states[index].dead = it.is_self_loop() || !has_succ;
        while has_succ {
            let d = it.dst();
            let condition = kripke.format_condition(it.cond());
            let target = match visited.find(d) {
                Some(t) => {
                    kripke.release_state(d);
                    Some(t)
                }
                None if limit.is_some_and(|n| result.states.len() >= n) => {
                    result.truncated = true;
                    kripke.release_state(d);
                    None
                }
                None => {
                    let t = result.states.len();
                    visited.insert(kripke.clone_state(d), t);
                    result.states.push(ExploredState {
                        label: kripke.format_state(d),
                        condition: kripke.format_condition(kripke.state_condition(d)),
                        dead: false,
                    });
                    queue.push_back((d, t));
                    Some(t)
                }
            };
            if let Some(dst) = target {
                result.edges.push(ExploredEdge {
                    src: index,
                    dst,
                    condition,
                });
            }
            has_succ = it.next();
        }
        kripke.release_iter(it);
        kripke.release_state(s);
    }

    debug!(
        "explore: {} states, {} edges, {} dead, truncated: {}",
        result.states.len(),
        result.edges.len(),
        result.num_dead(),
        result.truncated
    );
    Ok(result)
}
