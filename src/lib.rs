//! Finite automata built from user-defined machines or regular expressions, then epsilon
//! eliminated, pruned, minimized and determinized.
//!
//! Analyses never edit an automaton. They return a `Transformation`, and a `View` pairs
//! the automaton with the transformations composed so far.

pub mod automaton;
pub mod config;
pub mod dfa;
pub mod epsilon;
pub mod error;
pub mod explore;
pub mod minimize;
pub mod nfa;
pub mod reach;
pub mod regex;
pub mod transform;
pub mod view;

pub use automaton::{Automaton, Outcome};
pub use config::Limits;
pub use dfa::determinize;
pub use error::{Error, Result};
pub use explore::{explore, Definition, Explorer, Machine};
pub use minimize::equivalence_merge;
pub use nfa::{Epsilon, EpsilonFree, EpsilonNfa, Nfa, Phase, StateId, Symbol};
pub use regex::{Ast, Regex};
pub use transform::Transformation;
pub use view::{Stats, View};
