//! Compilation of atomic propositions into per-state predicates.
//!
//! A proposition is either `NAME`, `NAME OP INTEGER` with `OP` one of `==`,
//! `!=`, `<`, `<=`, `>`, `>=`, or `PROC.LOC`. Blanks are ignored everywhere
//! except inside names; a bare `NAME` means `NAME != 0`. Names are first
//! looked up as integer variables, and only then split at their last dot
//! into a process and one of its locations.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::rc::Rc;

use log::debug;

use crate::dict::{BddDict, OwnerId};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::reference::Ref;
use crate::zg::ZgState;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Comparator {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    AtLocation,
}

/// One compiled proposition.
///
/// For [`Comparator::AtLocation`] the subject is a process id and the value
/// a location id; otherwise they are a variable id and an integer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PropositionRecord {
    pub subject: u32,
    pub cmp: Comparator,
    pub value: i32,
    pub var: u32,
}

impl PropositionRecord {
    pub fn holds(&self, state: &dyn ZgState) -> bool {
        if self.cmp == Comparator::AtLocation {
            return state.location(self.subject) == self.value as u32;
        }
        let val = state.int_value(self.subject);
        match self.cmp {
            Comparator::Eq => val == self.value,
            Comparator::Ne => val != self.value,
            Comparator::Lt => val < self.value,
            Comparator::Gt => val > self.value,
            Comparator::Le => val <= self.value,
            Comparator::Ge => val >= self.value,
            Comparator::AtLocation => unreachable!(),
        }
    }
}

/// Compiled propositions and the dictionary registrations backing them.
///
/// Dropping the list unregisters every variable it registered.
#[derive(Debug)]
pub struct PropositionList {
    dict: Rc<BddDict>,
    owner: OwnerId,
    records: Vec<PropositionRecord>,
}

fn is_blank(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn skip_blanks(s: &[u8], mut i: usize) -> usize {
    while i < s.len() && is_blank(s[i]) {
        i += 1;
    }
    i
}

/// Parse a signed decimal integer, without the leading blanks. Returns the
/// value and the position after it. Literals outside `i32` are rejected.
fn parse_integer(s: &[u8], start: usize) -> Option<(i32, usize)> {
    let mut i = start;
    if matches!(s.get(i), Some(b'-' | b'+')) {
        i += 1;
    }
    let digits = i;
    while i < s.len() && s[i].is_ascii_digit() {
        i += 1;
    }
    if i == digits {
        return None;
    }
    let value = std::str::from_utf8(&s[start..i]).ok()?.parse::<i32>().ok()?;
    Some((value, i))
}

/// Outcome of parsing one proposition, before registration.
enum Parsed {
    Record { subject: u32, cmp: Comparator, value: i32 },
    Error(String),
}

fn parse_one(text: &str, model: &Model) -> Parsed {
    let s = text.as_bytes();
    let mut i = skip_blanks(s, 0);
    if i == s.len() {
        return Parsed::Error(format!("Proposition `{}' cannot be parsed.", text));
    }

    // Subject token, blanks removed, up to the first comparator character.
    let mut name = String::new();
    let mut last_dot = None;
    while i < s.len() && !matches!(s[i], b'=' | b'<' | b'!' | b'>') {
        if !is_blank(s[i]) {
            if s[i] == b'.' {
                last_dot = Some(name.len());
            }
            // Bytes are copied whole, so multi-byte characters survive.
            let start = i;
            let end = text[start..].chars().next().map_or(start + 1, |c| start + c.len_utf8());
            name.push_str(&text[start..end]);
            i = end;
        } else {
            i += 1;
        }
    }
    if name.is_empty() {
        return Parsed::Error(format!("Proposition `{}' cannot be parsed.", text));
    }

    let Some(var) = model.variables().key(&name) else {
        let process = last_dot.and_then(|dot| {
            let pid = model.processes().key(&name[..dot])?;
            Some((pid, &name[..dot], &name[dot + 1..]))
        });
        let Some((pid, process, location)) = process else {
            return Parsed::Error(format!(
                "No variable or process `{}' found in model (for proposition `{}').",
                last_dot.map_or(name.as_str(), |dot| &name[..dot]),
                text
            ));
        };
        let Some(loc) = model.location(pid, location) else {
            return Parsed::Error(format!(
                "No location `{}' known for process `{}'.",
                location, process
            ));
        };
        if i < s.len() {
            return Parsed::Error(format!(
                "Trailing garbage `{}' at end of proposition `{}'.",
                &text[i..],
                text
            ));
        }
        return Parsed::Record {
            subject: pid,
            cmp: Comparator::AtLocation,
            value: loc as i32,
        };
    };

    if i == s.len() {
        return Parsed::Record {
            subject: var,
            cmp: Comparator::Ne,
            value: 0,
        };
    }

    let unexpected = |at: usize| {
        Parsed::Error(format!(
            "Unexpected `{}' while parsing atomic proposition `{}'.",
            &text[at..],
            text
        ))
    };
    let next = s.get(i + 1).copied();
    let (cmp, width) = match (s[i], next) {
        (b'!', Some(b'=')) => (Comparator::Ne, 2),
        (b'=', Some(b'=')) => (Comparator::Eq, 2),
        (b'<', Some(b'=')) => (Comparator::Le, 2),
        (b'<', _) => (Comparator::Lt, 1),
        (b'>', Some(b'=')) => (Comparator::Ge, 2),
        (b'>', _) => (Comparator::Gt, 1),
        _ => return unexpected(i),
    };
    i = skip_blanks(s, i + width);

    let Some((value, end)) = parse_integer(s, i) else {
        return Parsed::Error(format!("Failed to parse `{}' as an integer.", &text[i..]));
    };
    i = skip_blanks(s, end);
    if i < s.len() {
        return unexpected(i);
    }
    Parsed::Record {
        subject: var,
        cmp,
        value,
    }
}

impl PropositionList {
    /// Compile `aps` against the namespaces of `model`.
    ///
    /// `dead` names the proposition handled by the adapter itself; it is
    /// skipped. Propositions are deduplicated and compiled in name order.
    /// All failures are reported together, and on failure nothing stays
    /// registered in `dict`.
    pub fn compile<'a>(
        aps: impl IntoIterator<Item = &'a str>,
        model: &Model,
        dict: Rc<BddDict>,
        dead: Option<&str>,
    ) -> Result<Self> {
        let owner = dict.new_owner();
        let mut list = Self {
            dict,
            owner,
            records: Vec::new(),
        };
        let mut errors = String::new();

        let aps: BTreeSet<&str> = aps.into_iter().collect();
        for ap in aps {
            if Some(ap) == dead {
                continue;
            }
            match parse_one(ap, model) {
                Parsed::Record { subject, cmp, value } => {
                    let var = list.dict.register_proposition(ap, owner);
                    list.records.push(PropositionRecord {
                        subject,
                        cmp,
                        value,
                        var,
                    });
                }
                Parsed::Error(message) => {
                    debug!("compile: rejected {:?}: {}", ap, message);
                    // Writing into a String cannot fail.
                    let _ = writeln!(errors, "{}", message);
                }
            }
        }

        if !errors.is_empty() {
            // Dropping `list` unregisters what was registered so far.
            drop(list);
            return Err(Error::Propositions(errors));
        }
        debug!("compile: {} proposition(s) as {}", list.records.len(), owner);
        Ok(list)
    }

    pub fn records(&self) -> &[PropositionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Conjunction of one literal per proposition, positive when it holds on
    /// `state`.
    pub fn condition(&self, state: &dyn ZgState) -> Ref {
        let bdd = self.dict.bdd();
        bdd.apply_and_many(self.records.iter().map(|record| {
            let lit = bdd.mk_var(record.var);
            if record.holds(state) {
                lit
            } else {
                -lit
            }
        }))
    }
}

impl Drop for PropositionList {
    fn drop(&mut self) {
        let n = self.dict.unregister_all(self.owner);
        debug!("drop PropositionList: unregistered {} variable(s)", n);
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;
    use crate::discrete::DiscreteState;

    const MODEL: &str = "
        system:props
        event:e
        int:1:-5:5:0:p
        int:1:0:1:0:q
        int:1:0:1:0:P.x
        process:P
        location:P:loc1{initial:}
        location:P:loc2{}
        process:Q
        location:Q:idle{initial:}
    ";

    fn model() -> Model {
        Model::parse(MODEL).unwrap()
    }

    fn compile(aps: &[&str], model: &Model, dict: &Rc<BddDict>) -> Result<PropositionList> {
        PropositionList::compile(aps.iter().copied(), model, dict.clone(), None)
    }

    fn record(text: &str) -> PropositionRecord {
        let model = model();
        let dict = Rc::new(BddDict::default());
        compile(&[text], &model, &dict).unwrap().records()[0]
    }

    fn error(text: &str) -> String {
        let model = model();
        let dict = Rc::new(BddDict::default());
        match compile(&[text], &model, &dict) {
            Err(Error::Propositions(message)) => message,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_grammar() {
        let r = record("p==3");
        assert_eq!((r.subject, r.cmp, r.value), (0, Comparator::Eq, 3));
        let r = record("  p   <=  -2 ");
        assert_eq!((r.cmp, r.value), (Comparator::Le, -2));
        let r = record("p<+4");
        assert_eq!((r.cmp, r.value), (Comparator::Lt, 4));
        let r = record("p>1");
        assert_eq!(r.cmp, Comparator::Gt);
        let r = record("p >= 1");
        assert_eq!(r.cmp, Comparator::Ge);
        let r = record("p != 1");
        assert_eq!(r.cmp, Comparator::Ne);
        let r = record(" q ");
        assert_eq!((r.subject, r.cmp, r.value), (1, Comparator::Ne, 0));
        let r = record("p > -2147483648");
        assert_eq!((r.cmp, r.value), (Comparator::Gt, i32::MIN));
        let r = record("p <= 2147483647");
        assert_eq!((r.cmp, r.value), (Comparator::Le, i32::MAX));
    }

    #[test]
    fn test_blanks_inside_names_are_removed() {
        let r = record("P . loc2");
        assert_eq!((r.subject, r.cmp, r.value), (0, Comparator::AtLocation, 1));
    }

    #[test]
    fn test_variables_win_over_locations() {
        // `P.x' is a variable name, not process P at location x.
        let r = record("P.x == 1");
        assert_eq!((r.subject, r.cmp), (2, Comparator::Eq));
    }

    #[test]
    fn test_errors() {
        assert_eq!(error("   "), "Proposition `   ' cannot be parsed.\n");
        assert_eq!(error("==3"), "Proposition `==3' cannot be parsed.\n");
        assert_eq!(
            error("foo"),
            "No variable or process `foo' found in model (for proposition `foo').\n"
        );
        assert_eq!(
            error("R.loc1"),
            "No variable or process `R' found in model (for proposition `R.loc1').\n"
        );
        assert_eq!(error("P.nowhere"), "No location `nowhere' known for process `P'.\n");
        assert_eq!(
            error("P.loc1 == 1"),
            "Trailing garbage `== 1' at end of proposition `P.loc1 == 1'.\n"
        );
        assert_eq!(
            error("p = 3"),
            "Unexpected `= 3' while parsing atomic proposition `p = 3'.\n"
        );
        assert_eq!(error("p == x"), "Failed to parse `x' as an integer.\n");
        assert_eq!(
            error("p == 4294967296"),
            "Failed to parse `4294967296' as an integer.\n"
        );
        assert_eq!(
            error("p < -2147483649 "),
            "Failed to parse `-2147483649 ' as an integer.\n"
        );
        assert_eq!(
            error("p == 3 4"),
            "Unexpected `4' while parsing atomic proposition `p == 3 4'.\n"
        );
    }

    #[test]
    fn test_failure_rolls_back_registrations() {
        let model = model();
        let dict = Rc::new(BddDict::default());
        let result = compile(&["p==3", "foo", "q", "P.zzz"], &model, &dict);
        match result {
            Err(Error::Propositions(message)) => assert_eq!(message.lines().count(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(dict.num_registered(), 0);
    }

    #[test]
    fn test_drop_unregisters() {
        let model = model();
        let dict = Rc::new(BddDict::default());
        let list = compile(&["p==3", "q", "q", "P.loc1"], &model, &dict).unwrap();
        assert_eq!(list.len(), 3);
        assert_eq!(dict.num_registered(), 3);
        drop(list);
        assert_eq!(dict.num_registered(), 0);
    }

    #[test]
    fn test_dead_proposition_is_skipped() {
        let model = model();
        let dict = Rc::new(BddDict::default());
        let list = PropositionList::compile(["dead", "q"], &model, dict.clone(), Some("dead")).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(dict.var_of("dead"), None);
    }

    #[test]
    fn test_condition() {
        let model = model();
        let dict = Rc::new(BddDict::default());
        let list = compile(&["p==3", "q", "P.loc1"], &model, &dict).unwrap();

        let state = DiscreteState::new(vec![0, 2], vec![3, 0, 0]);
        assert_eq!(dict.format_condition(list.condition(&state)), "P.loc1 & p==3 & !q");

        let state = DiscreteState::new(vec![1, 2], vec![2, 1, 0]);
        assert_eq!(dict.format_condition(list.condition(&state)), "!P.loc1 & !p==3 & q");
    }
}
