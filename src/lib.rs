//! # ta-kripke: timed automata as Kripke structures
//!
//! **`ta-kripke`** exposes the state space of a timed-automaton network as an
//! explicit, lazily built Kripke structure, ready to be driven by an
//! automata-theoretic model checker (product construction, emptiness check).
//!
//! ## How it fits together
//!
//! - A [`Model`][crate::model::Model] is loaded from a system declaration.
//! - A zone-graph engine ([`ZoneGraph`][crate::zg::ZoneGraph]) explores it under
//!   one of eighteen [`ZoneSemantics`][crate::semantics::ZoneSemantics].
//! - Atomic propositions such as `id == 1` or `arbiter1.req` are compiled into
//!   a [`PropositionList`][crate::prop::PropositionList], each bound to a
//!   boolean variable of a shared [`BddDict`][crate::dict::BddDict].
//! - The [`Kripke`][crate::kripke::Kripke] adapter hands out pooled state
//!   handles, successor iterators and per-state conditions on demand.
//!
//! Every operation goes through a manager object ([`Bdd`][crate::bdd::Bdd],
//! [`StatePool`][crate::state::StatePool], [`Kripke`][crate::kripke::Kripke])
//! and every value handed out is a small copyable handle
//! ([`Ref`][crate::reference::Ref], [`StateRef`][crate::state::StateRef]).
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use ta_kripke::dict::BddDict;
//! use ta_kripke::kripke::{DeadPolicy, Kripke, KripkeConfig};
//! use ta_kripke::model::Model;
//!
//! // 1. Load a system
//! let model = Model::parse("
//!     system:toggle
//!     event:flip
//!     int:1:0:1:0:on
//!     process:T
//!     location:T:idle{initial:}
//!     edge:T:idle:idle:flip{provided: on==0 : do: on=1}
//! ").unwrap();
//!
//! // 2. Build the Kripke structure observing two propositions
//! let dict = Rc::new(BddDict::default());
//! let config = KripkeConfig::default().with_dead(DeadPolicy::LoopLabeled("dead".into()));
//! let kripke = Kripke::new(Rc::new(model), ["on", "T.idle"], dict.clone(), config).unwrap();
//!
//! // 3. Explore it the way a model checker does
//! let _session = kripke.start_session();
//! let init = kripke.initial_state().unwrap();
//! assert_eq!(kripke.format_condition(kripke.state_condition(init)), "T.idle & !on");
//!
//! let mut it = kripke.succ_iter(init);
//! assert!(it.first());
//! let next = it.dst();
//! assert_eq!(kripke.format_state(next), "<idle> on=1");
//! assert!(!it.next());
//! kripke.release_iter(it);
//!
//! // The second state is dead: it loops on itself with `dead` true.
//! let mut it = kripke.succ_iter(next);
//! assert!(it.first());
//! assert_eq!(kripke.format_condition(it.cond()), "T.idle & on & dead");
//! kripke.release_iter(it);
//!
//! kripke.release_state(next);
//! kripke.release_state(init);
//! ```
//!
//! ## Core Components
//!
//! - **[`kripke`]**: the adapter, dead-state policies and configuration.
//! - **[`prop`]**: the atomic proposition compiler.
//! - **[`state`]** and **[`succ`]**: pooled state handles and successor iterators.
//! - **[`discrete`]**: the bundled engine. It explores the discrete part of
//!   the system and abstracts clock constraints.
//! - **[`bdd`]** and **[`dict`]**: the decision diagrams used for conditions.

pub mod bdd;
pub mod cache;
pub mod dict;
pub mod discrete;
pub mod dot;
pub mod error;
pub mod explore;
pub mod expr;
pub mod kripke;
pub mod loader;
pub mod model;
pub mod prop;
pub mod reference;
pub mod sat;
pub mod semantics;
pub mod state;
pub mod succ;
pub mod table;
pub mod utils;
pub mod zg;
