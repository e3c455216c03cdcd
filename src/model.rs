//! In-memory timed-automaton system.
//!
//! A [`Model`] is a network of processes, each a set of locations connected
//! by edges labelled with events. Processes interact through bounded integer
//! variables and synchronisation vectors. Names of variables, processes,
//! events and clocks live in [`Index`]es, which is what atomic propositions
//! are resolved against.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};

use num_bigint::BigUint;

use crate::expr::{Expr, Symbol, Update};

/// Bidirectional map between names and dense ids.
#[derive(Debug, Default, Clone)]
pub struct Index {
    names: Vec<String>,
    ids: HashMap<String, u32>,
}

impl Index {
    pub fn add(&mut self, name: &str) -> Result<u32, String> {
        if self.ids.contains_key(name) {
            return Err(format!("`{}' is declared twice", name));
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn key(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    pub fn value(&self, id: u32) -> &str {
        &self.names[id as usize]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.names.iter().enumerate().map(|(i, n)| (i as u32, n.as_str()))
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct IntVar {
    pub min: i32,
    pub max: i32,
    pub initial: i32,
}

impl IntVar {
    pub fn contains(&self, value: i64) -> bool {
        (self.min as i64..=self.max as i64).contains(&value)
    }
}

#[derive(Debug, Clone)]
pub struct Location {
    pub id: u32,
    pub pid: u32,
    pub name: String,
    pub initial: bool,
    pub committed: bool,
    pub invariant: Expr,
}

#[derive(Debug, Clone)]
pub struct Edge {
    pub id: u32,
    pub pid: u32,
    pub src: u32,
    pub tgt: u32,
    pub event: u32,
    pub guard: Expr,
    pub updates: Vec<Update>,
}

/// Events that must be taken together, one per listed process.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SyncVector {
    pub constraints: Vec<(u32, u32)>,
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    name: String,
    events: Index,
    processes: Index,
    variables: Index,
    intvars: Vec<IntVar>,
    clocks: Index,
    locations: Vec<Location>,
    locations_by_process: Vec<HashMap<String, u32>>,
    edges: Vec<Edge>,
    outgoing: Vec<Vec<u32>>,
    syncs: Vec<SyncVector>,
    synchronized: HashSet<(u32, u32)>,
}

impl Model {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn events(&self) -> &Index {
        &self.events
    }
    pub fn processes(&self) -> &Index {
        &self.processes
    }
    pub fn variables(&self) -> &Index {
        &self.variables
    }
    pub fn clocks(&self) -> &Index {
        &self.clocks
    }
    pub fn intvar(&self, id: u32) -> &IntVar {
        &self.intvars[id as usize]
    }
    pub fn intvars(&self) -> &[IntVar] {
        &self.intvars
    }
    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
    pub fn syncs(&self) -> &[SyncVector] {
        &self.syncs
    }

    /// Id of location `name` of process `pid`.
    pub fn location(&self, pid: u32, name: &str) -> Option<u32> {
        self.locations_by_process.get(pid as usize)?.get(name).copied()
    }

    /// Edges leaving location `loc`, in declaration order.
    pub fn outgoing_edges(&self, loc: u32) -> impl Iterator<Item = &Edge> {
        self.outgoing[loc as usize].iter().map(|&e| &self.edges[e as usize])
    }

    pub fn initial_locations(&self, pid: u32) -> impl Iterator<Item = &Location> {
        self.locations.iter().filter(move |l| l.pid == pid && l.initial)
    }

    /// Whether `event` of process `pid` only fires through a sync vector.
    pub fn is_synchronized(&self, pid: u32, event: u32) -> bool {
        self.synchronized.contains(&(pid, event))
    }

    pub fn resolve(&self, name: &str) -> Option<Symbol> {
        self.variables
            .key(name)
            .map(Symbol::Int)
            .or_else(|| self.clocks.key(name).map(Symbol::Clock))
    }

    pub fn add_event(&mut self, name: &str) -> Result<u32, String> {
        self.events.add(name)
    }

    pub fn add_intvar(&mut self, name: &str, var: IntVar) -> Result<u32, String> {
        if var.min > var.max || !var.contains(var.initial as i64) {
            return Err(format!(
                "initial value {} of `{}' is outside {}..{}",
                var.initial, name, var.min, var.max
            ));
        }
        if self.clocks.key(name).is_some() {
            return Err(format!("`{}' is already a clock", name));
        }
        let id = self.variables.add(name)?;
        self.intvars.push(var);
        Ok(id)
    }

    pub fn add_clock(&mut self, name: &str) -> Result<u32, String> {
        if self.variables.key(name).is_some() {
            return Err(format!("`{}' is already an integer variable", name));
        }
        self.clocks.add(name)
    }

    pub fn add_process(&mut self, name: &str) -> Result<u32, String> {
        let pid = self.processes.add(name)?;
        self.locations_by_process.push(HashMap::new());
        Ok(pid)
    }

    pub fn add_location(&mut self, mut location: Location) -> Result<u32, String> {
        let by_name = self
            .locations_by_process
            .get_mut(location.pid as usize)
            .ok_or_else(|| format!("unknown process #{}", location.pid))?;
        if by_name.contains_key(&location.name) {
            return Err(format!(
                "location `{}' of process `{}' is declared twice",
                location.name,
                self.processes.value(location.pid)
            ));
        }
        let id = self.locations.len() as u32;
        by_name.insert(location.name.clone(), id);
        location.id = id;
        self.locations.push(location);
        self.outgoing.push(Vec::new());
        Ok(id)
    }

    pub fn add_edge(&mut self, mut edge: Edge) -> Result<u32, String> {
        for loc in [edge.src, edge.tgt] {
            if self.locations.get(loc as usize).map(|l| l.pid) != Some(edge.pid) {
                return Err(format!("location #{} does not belong to process #{}", loc, edge.pid));
            }
        }
        let id = self.edges.len() as u32;
        edge.id = id;
        self.outgoing[edge.src as usize].push(id);
        self.edges.push(edge);
        Ok(id)
    }

    pub fn add_sync(&mut self, sync: SyncVector) -> Result<(), String> {
        let mut seen = HashSet::new();
        for &(pid, event) in &sync.constraints {
            if !seen.insert(pid) {
                return Err(format!(
                    "process `{}' appears twice in a synchronisation",
                    self.processes.value(pid)
                ));
            }
            self.synchronized.insert((pid, event));
        }
        self.syncs.push(sync);
        Ok(())
    }

    /// List the names usable in atomic propositions.
    pub fn dump_info(&self, out: &mut impl Write) -> io::Result<()> {
        if !self.locations.is_empty() {
            writeln!(out, "The following location(s) may be used in the formula:")?;
            for loc in &self.locations {
                writeln!(out, "- {}.{}", self.processes.value(loc.pid), loc.name)?;
            }
        }
        if !self.variables.is_empty() {
            writeln!(out, "The following variable(s) may be used in the formula:")?;
            for (id, name) in self.variables.iter() {
                let var = self.intvar(id);
                writeln!(out, "- {} ({}..{})", name, var.min, var.max)?;
            }
        }
        Ok(())
    }

    /// Upper bound on the number of discrete configurations: the product of
    /// the location counts of all processes and of all variable domains.
    pub fn discrete_bound(&self) -> BigUint {
        let mut bound = BigUint::from(1u32);
        for by_name in &self.locations_by_process {
            bound *= by_name.len();
        }
        for var in &self.intvars {
            bound *= (var.max as i64 - var.min as i64 + 1) as u64;
        }
        bound
    }
}
