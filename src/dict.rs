//! Shared dictionary of boolean identifiers.
//!
//! Every atomic proposition observed on a Kripke structure is represented by
//! one BDD variable. Several parties (the compiled proposition list, the
//! adapter itself, a property translator) may ask for the same proposition;
//! they all get the same variable, and the dictionary remembers who
//! registered it so that each party can later drop exactly its own
//! registrations with [`BddDict::unregister_all`].

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use log::debug;

use crate::bdd::Bdd;
use crate::reference::Ref;

/// Identity of a party registering variables.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct OwnerId(u64);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "owner#{}", self.0)
    }
}

#[derive(Debug)]
struct VarEntry {
    name: String,
    owners: BTreeSet<OwnerId>,
}

#[derive(Debug, Default)]
struct Registry {
    by_name: HashMap<String, u32>,
    vars: BTreeMap<u32, VarEntry>,
    next_var: u32,
    next_owner: u64,
}

#[derive(Debug)]
pub struct BddDict {
    bdd: Bdd,
    registry: RefCell<Registry>,
}

impl Default for BddDict {
    fn default() -> Self {
        Self::new(Bdd::default())
    }
}

impl BddDict {
    pub fn new(bdd: Bdd) -> Self {
        Self {
            bdd,
            registry: RefCell::new(Registry {
                next_var: 1,
                ..Registry::default()
            }),
        }
    }

    pub fn bdd(&self) -> &Bdd {
        &self.bdd
    }

    pub fn new_owner(&self) -> OwnerId {
        let mut registry = self.registry.borrow_mut();
        registry.next_owner += 1;
        OwnerId(registry.next_owner)
    }

    /// Return the variable of proposition `name`, registering `owner` as one
    /// of its users.
    pub fn register_proposition(&self, name: &str, owner: OwnerId) -> u32 {
        let mut registry = self.registry.borrow_mut();
        let var = match registry.by_name.get(name).copied() {
            Some(var) => var,
            None => {
                let var = registry.next_var;
                registry.next_var += 1;
                registry.by_name.insert(name.to_string(), var);
                var
            }
        };
        registry
            .vars
            .entry(var)
            .or_insert_with(|| VarEntry {
                name: name.to_string(),
                owners: BTreeSet::new(),
            })
            .owners
            .insert(owner);
        debug!("register_proposition(name = {:?}, owner = {}) -> {}", name, owner, var);
        var
    }

    /// Drop the registration of `var` by `owner`.
    ///
    /// A variable without owners is forgotten; registering its name again
    /// yields a fresh variable.
    pub fn unregister_variable(&self, var: u32, owner: OwnerId) {
        let mut registry = self.registry.borrow_mut();
        let Some(entry) = registry.vars.get_mut(&var) else {
            return;
        };
        if !entry.owners.remove(&owner) || !entry.owners.is_empty() {
            return;
        }
        let name = std::mem::take(&mut entry.name);
        registry.vars.remove(&var);
        registry.by_name.remove(&name);
        debug!("unregister_variable: {} ({:?}) has no owner left", var, name);
    }

    /// Drop every registration made by `owner` and return how many there were.
    pub fn unregister_all(&self, owner: OwnerId) -> usize {
        let vars: Vec<u32> = self
            .registry
            .borrow()
            .vars
            .iter()
            .filter(|(_, entry)| entry.owners.contains(&owner))
            .map(|(&var, _)| var)
            .collect();
        for &var in &vars {
            self.unregister_variable(var, owner);
        }
        debug!("unregister_all(owner = {}) -> {}", owner, vars.len());
        vars.len()
    }

    pub fn var_of(&self, name: &str) -> Option<u32> {
        self.registry.borrow().by_name.get(name).copied()
    }

    pub fn name_of(&self, var: u32) -> Option<String> {
        self.registry.borrow().vars.get(&var).map(|e| e.name.clone())
    }

    /// Number of variables with at least one owner.
    pub fn num_registered(&self) -> usize {
        self.registry.borrow().vars.len()
    }

    /// Render a conjunction of literals as `a & !b`.
    ///
    /// Constants render as `1` and `0`. Only one satisfying path is shown,
    /// which is the whole function when `cond` is a cube.
    pub fn format_condition(&self, cond: Ref) -> String {
        let Some(path) = self.bdd.one_sat(cond) else {
            return "0".to_string();
        };
        if path.is_empty() {
            return "1".to_string();
        }
        path.iter()
            .map(|&lit| {
                let var = lit.unsigned_abs();
                let name = self.name_of(var).unwrap_or_else(|| format!("x{}", var));
                if lit < 0 {
                    format!("!{}", name)
                } else {
                    name
                }
            })
            .collect::<Vec<_>>()
            .join(" & ")
    }
}
