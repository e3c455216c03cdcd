//! Zone semantics variants and the engine constructor table.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use log::debug;

use crate::discrete::DiscreteGraph;
use crate::error::Error;
use crate::model::Model;
use crate::zg::ZoneGraph;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Timing {
    Elapsed,
    NonElapsed,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Extrapolation {
    None,
    ExtraM,
    ExtraMPlus,
    ExtraLU,
    ExtraLUPlus,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Scope {
    Global,
    Local,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ZoneSemantics {
    ElapsedNoExtrapolation,
    ElapsedExtraLUGlobal,
    ElapsedExtraLULocal,
    ElapsedExtraLUPlusGlobal,
    ElapsedExtraLUPlusLocal,
    ElapsedExtraMGlobal,
    ElapsedExtraMLocal,
    ElapsedExtraMPlusGlobal,
    ElapsedExtraMPlusLocal,
    NonElapsedNoExtrapolation,
    NonElapsedExtraLUGlobal,
    NonElapsedExtraLULocal,
    NonElapsedExtraLUPlusGlobal,
    NonElapsedExtraLUPlusLocal,
    NonElapsedExtraMGlobal,
    NonElapsedExtraMLocal,
    NonElapsedExtraMPlusGlobal,
    NonElapsedExtraMPlusLocal,
}

impl Default for ZoneSemantics {
    fn default() -> Self {
        ZoneSemantics::ElapsedExtraLUPlusLocal
    }
}

type Constructor = fn(Rc<Model>, ZoneSemantics) -> Box<dyn ZoneGraph>;

fn discrete(model: Rc<Model>, semantics: ZoneSemantics) -> Box<dyn ZoneGraph> {
    Box::new(DiscreteGraph::new(model, semantics))
}

use Extrapolation as X;
use Scope as S;
use Timing as T;
use ZoneSemantics as Z;

#[rustfmt::skip]
static TABLE: [(ZoneSemantics, &str, Timing, Extrapolation, Option<Scope>, Constructor); 18] = [
    (Z::ElapsedNoExtrapolation,      "elapsed_no_extrapolation",        T::Elapsed,    X::None,        None, discrete),
    (Z::ElapsedExtraLUGlobal,        "elapsed_extraLU_global",          T::Elapsed,    X::ExtraLU,     Some(S::Global), discrete),
    (Z::ElapsedExtraLULocal,         "elapsed_extraLU_local",           T::Elapsed,    X::ExtraLU,     Some(S::Local),  discrete),
    (Z::ElapsedExtraLUPlusGlobal,    "elapsed_extraLUplus_global",      T::Elapsed,    X::ExtraLUPlus, Some(S::Global), discrete),
    (Z::ElapsedExtraLUPlusLocal,     "elapsed_extraLUplus_local",       T::Elapsed,    X::ExtraLUPlus, Some(S::Local),  discrete),
    (Z::ElapsedExtraMGlobal,         "elapsed_extraM_global",           T::Elapsed,    X::ExtraM,      Some(S::Global), discrete),
    (Z::ElapsedExtraMLocal,          "elapsed_extraM_local",            T::Elapsed,    X::ExtraM,      Some(S::Local),  discrete),
    (Z::ElapsedExtraMPlusGlobal,     "elapsed_extraMplus_global",       T::Elapsed,    X::ExtraMPlus,  Some(S::Global), discrete),
    (Z::ElapsedExtraMPlusLocal,      "elapsed_extraMplus_local",        T::Elapsed,    X::ExtraMPlus,  Some(S::Local),  discrete),
    (Z::NonElapsedNoExtrapolation,   "non_elapsed_no_extrapolation",    T::NonElapsed, X::None,        None, discrete),
    (Z::NonElapsedExtraLUGlobal,     "non_elapsed_extraLU_global",      T::NonElapsed, X::ExtraLU,     Some(S::Global), discrete),
    (Z::NonElapsedExtraLULocal,      "non_elapsed_extraLU_local",       T::NonElapsed, X::ExtraLU,     Some(S::Local),  discrete),
    (Z::NonElapsedExtraLUPlusGlobal, "non_elapsed_extraLUplus_global",  T::NonElapsed, X::ExtraLUPlus, Some(S::Global), discrete),
    (Z::NonElapsedExtraLUPlusLocal,  "non_elapsed_extraLUplus_local",   T::NonElapsed, X::ExtraLUPlus, Some(S::Local),  discrete),
    (Z::NonElapsedExtraMGlobal,      "non_elapsed_extraM_global",       T::NonElapsed, X::ExtraM,      Some(S::Global), discrete),
    (Z::NonElapsedExtraMLocal,       "non_elapsed_extraM_local",        T::NonElapsed, X::ExtraM,      Some(S::Local),  discrete),
    (Z::NonElapsedExtraMPlusGlobal,  "non_elapsed_extraMplus_global",   T::NonElapsed, X::ExtraMPlus,  Some(S::Global), discrete),
    (Z::NonElapsedExtraMPlusLocal,   "non_elapsed_extraMplus_local",    T::NonElapsed, X::ExtraMPlus,  Some(S::Local),  discrete),
];

impl ZoneSemantics {
    pub fn all() -> impl Iterator<Item = ZoneSemantics> {
        TABLE.iter().map(|entry| entry.0)
    }

    fn entry(self) -> &'static (ZoneSemantics, &'static str, Timing, Extrapolation, Option<Scope>, Constructor) {
        // The table lists the variants in declaration order.
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.entry().1
    }

    pub fn timing(self) -> Timing {
        self.entry().2
    }

    pub fn extrapolation(self) -> Extrapolation {
        self.entry().3
    }

    /// `None` for the variants without extrapolation.
    pub fn scope(self) -> Option<Scope> {
        self.entry().4
    }
}

impl fmt::Display for ZoneSemantics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ZoneSemantics {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TABLE
            .iter()
            .find(|entry| entry.1 == s)
            .map(|entry| entry.0)
            .ok_or_else(|| Error::UnknownSemantics(s.to_string()))
    }
}

/// Build the engine exploring `model` under `semantics`.
pub fn instantiate(model: Rc<Model>, semantics: ZoneSemantics) -> Box<dyn ZoneGraph> {
    debug!("instantiate(system = {}, semantics = {})", model.name(), semantics);
    (semantics.entry().5)(model, semantics)
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_table_matches_variants() {
        assert_eq!(ZoneSemantics::all().count(), 18);
        for (i, sem) in ZoneSemantics::all().enumerate() {
            assert_eq!(sem as usize, i);
            assert_eq!(sem.name().parse::<ZoneSemantics>().unwrap(), sem);
        }
    }

    #[test]
    fn test_components() {
        let sem: ZoneSemantics = "non_elapsed_extraMplus_global".parse().unwrap();
        assert_eq!(sem, ZoneSemantics::NonElapsedExtraMPlusGlobal);
        assert_eq!(sem.timing(), Timing::NonElapsed);
        assert_eq!(sem.extrapolation(), Extrapolation::ExtraMPlus);
        assert_eq!(sem.scope(), Some(Scope::Global));

        let sem = ZoneSemantics::ElapsedNoExtrapolation;
        assert_eq!(sem.extrapolation(), Extrapolation::None);
        assert_eq!(sem.scope(), None);
    }

    #[test]
    fn test_default_and_unknown() {
        assert_eq!(ZoneSemantics::default().name(), "elapsed_extraLUplus_local");
        assert!(matches!(
            "elapsed_extraX_local".parse::<ZoneSemantics>(),
            Err(Error::UnknownSemantics(_))
        ));
    }

    #[test]
    fn test_instantiate_every_variant() {
        let model = Rc::new(Model::parse("system:s\nprocess:P\nlocation:P:a{initial:}\n").unwrap());
        for sem in ZoneSemantics::all() {
            let graph = instantiate(model.clone(), sem);
            assert_eq!(graph.semantics(), sem);
            assert_eq!(graph.initial().unwrap().len(), 1);
        }
    }
}
