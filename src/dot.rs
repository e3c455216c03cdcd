//! Exploration to DOT (Graphviz) conversion.
//!
//! # DOT Format
//!
//! The generated DOT output follows these conventions:
//! - **States** are boxes labelled with the state and its condition
//! - **The initial state** is pointed to by an edge from an invisible node
//! - **Dead states** are drawn with a double border
//! - **Edges** are labelled with their condition
//!
//! # Examples
//!
//! ```
//! use std::rc::Rc;
//!
//! use ta_kripke::dict::BddDict;
//! use ta_kripke::explore::explore;
//! use ta_kripke::kripke::{Kripke, KripkeConfig};
//! use ta_kripke::model::Model;
//!
//! let model = Model::parse("system:s\nprocess:P\nlocation:P:a{initial:}\n").unwrap();
//! let kripke = Kripke::new(Rc::new(model), ["P.a"], Rc::new(BddDict::default()), KripkeConfig::default()).unwrap();
//! let dot = explore(&kripke, None).unwrap().to_dot().unwrap();
//! // Render with: dot -Tpng output.dot -o output.png
//! assert!(dot.starts_with("digraph \"s\" {"));
//! ```

use std::fmt::Write as _;

use crate::explore::Exploration;

/// Configuration options for DOT output generation.
#[derive(Debug, Clone)]
pub struct DotConfig {
    /// Shape for states (default: "box")
    pub state_shape: &'static str,
    /// Border count of dead states (default: 2)
    pub dead_peripheries: u32,
    /// Whether state labels include the state condition (default: true)
    pub show_conditions: bool,
    /// Graph direction (default: "TB")
    pub rankdir: &'static str,
}

impl Default for DotConfig {
    fn default() -> Self {
        Self {
            state_shape: "box",
            dead_peripheries: 2,
            show_conditions: true,
            rankdir: "TB",
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl Exploration {
    pub fn to_dot(&self) -> Result<String, std::fmt::Error> {
        self.to_dot_with_config(&DotConfig::default())
    }

    pub fn to_dot_with_config(&self, config: &DotConfig) -> Result<String, std::fmt::Error> {
        let mut dot = String::new();
        writeln!(dot, "digraph \"{}\" {{", escape(&self.name))?;
        writeln!(dot, "rankdir={};", config.rankdir)?;
        writeln!(dot, "label=\"{}\";", escape(&self.name))?;
        writeln!(dot, "labelloc=\"t\";")?;
        writeln!(dot, "node [shape={}];", config.state_shape)?;

        if !self.states.is_empty() {
            writeln!(dot, "I [label=\"\", style=invis, width=0];")?;
            writeln!(dot, "I -> 0;")?;
        }

        for (i, state) in self.states.iter().enumerate() {
            let label = if config.show_conditions {
                format!("{}\\n{}", escape(&state.label), escape(&state.condition))
            } else {
                escape(&state.label)
            };
            if state.dead {
                writeln!(dot, "{} [label=\"{}\", peripheries={}];", i, label, config.dead_peripheries)?;
            } else {
                writeln!(dot, "{} [label=\"{}\"];", i, label)?;
            }
        }

        for edge in &self.edges {
            writeln!(
                dot,
                "{} -> {} [label=\"{}\"];",
                edge.src,
                edge.dst,
                escape(&edge.condition)
            )?;
        }

        if self.truncated {
            writeln!(dot, "T [label=\"...\", shape=plaintext];")?;
        }

        writeln!(dot, "}}")?;
        Ok(dot)
    }
}
