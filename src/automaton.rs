use std::collections::BTreeSet;

use serde::Serialize;

use crate::nfa::{Nfa, Phase, StateId, Symbol};

/// Set-based simulation shared by automata and views.
///
/// Every step reads a group of symbols that are active at the same time; the next active
/// set is the union of the successors on all of them.
pub trait Automaton {
    fn alphabet(&self) -> &[Symbol];

    /// Active set before any input, epsilon-closed.
    fn initial(&self) -> BTreeSet<StateId>;

    /// Successors of `active` on any of `symbols`, epsilon-closed.
    fn step(&self, active: &BTreeSet<StateId>, symbols: &[Symbol]) -> BTreeSet<StateId>;

    fn is_accepting(&self, active: &BTreeSet<StateId>) -> bool;

    fn trace<I>(&self, input: I) -> Trace<'_, Self, I::IntoIter>
        where Self: Sized,
              I: IntoIterator,
              I::Item: AsRef<[Symbol]>
    {
        Trace {
            aut: self,
            input: input.into_iter(),
            active: None,
        }
    }

    /// `trace[i]` is the active set after `i` steps. The trace ends early at the first
    /// empty set.
    fn run<I>(&self, input: I) -> Outcome
        where Self: Sized,
              I: IntoIterator,
              I::Item: AsRef<[Symbol]>
    {
        let trace: Vec<_> = self.trace(input).collect();
        let accepted = trace.last().is_some_and(|active| self.is_accepting(active));
        Outcome { accepted, trace }
    }

    /// Runs `word` one character per step.
    fn accepts(&self, word: &str) -> bool
        where Self: Sized
    {
        self.run(word.chars().map(|c| [c])).accepted
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Outcome {
    pub accepted: bool,
    pub trace: Vec<BTreeSet<StateId>>,
}

/// Iterator over the active sets of a run, starting with the initial set.
#[derive(Debug)]
pub struct Trace<'a, A: 'a, I> {
    aut: &'a A,
    input: I,
    active: Option<BTreeSet<StateId>>,
}

impl<'a, A, I> Iterator for Trace<'a, A, I>
    where A: Automaton,
          I: Iterator,
          I::Item: AsRef<[Symbol]>
{
    type Item = BTreeSet<StateId>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = match &self.active {
            None => self.aut.initial(),
            // Stop once stuck.
            Some(active) if active.is_empty() => return None,
            Some(active) => {
                let symbols = self.input.next()?;
                self.aut.step(active, symbols.as_ref())
            }
        };
        self.active = Some(next.clone());
        Some(next)
    }
}

impl<P: Phase> Automaton for Nfa<P> {
    fn alphabet(&self) -> &[Symbol] {
        self.symbols()
    }

    fn initial(&self) -> BTreeSet<StateId> {
        self.close(self.start_states().iter())
    }

    fn step(&self, active: &BTreeSet<StateId>, symbols: &[Symbol]) -> BTreeSet<StateId> {
        let indices: Vec<usize> = symbols.iter().filter_map(|&s| self.symbol_index(s)).collect();
        let mut next = BTreeSet::new();
        for &state in active {
            for &symbol in &indices {
                if let Some(targets) = self.targets(state, symbol) {
                    next.extend(targets.iter().copied());
                }
            }
        }
        self.close(next)
    }

    fn is_accepting(&self, active: &BTreeSet<StateId>) -> bool {
        active.iter().any(|&s| self.is_accept(s))
    }
}
