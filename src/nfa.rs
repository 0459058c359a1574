//! The automaton store: states, labels, symbol-indexed transitions, start and accept sets.
//!
//! States get dense ids in creation order and are never removed in place; removal and
//! merging are expressed with a `Transformation`. The `P` parameter records whether the
//! automaton may still carry epsilon edges.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;

use bit_set::BitSet;
use once_cell::unsync::OnceCell;

use crate::error::{Error, Result};
use crate::transform::Transformation;

pub type StateId = usize;
pub type Symbol = char;

mod sealed {
    pub trait Sealed {}
}

/// Construction stage of an automaton.
pub trait Phase: sealed::Sealed + Copy + fmt::Debug + 'static {}

/// Stage in which epsilon edges may still be added.
#[derive(Clone, Copy, Debug)]
pub enum Epsilon {}

/// Stage reached after epsilon elimination. No epsilon edges exist.
#[derive(Clone, Copy, Debug)]
pub enum EpsilonFree {}

impl sealed::Sealed for Epsilon {}
impl sealed::Sealed for EpsilonFree {}
impl Phase for Epsilon {}
impl Phase for EpsilonFree {}

pub type EpsilonNfa = Nfa<Epsilon>;

#[derive(Clone, Debug)]
pub struct Nfa<P: Phase = EpsilonFree> {
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) labels: Vec<String>,
    // state -> symbol index -> targets
    pub(crate) transitions: Vec<Vec<BTreeSet<StateId>>>,
    // state -> targets, all empty once epsilon free
    pub(crate) epsilon: Vec<BTreeSet<StateId>>,
    pub(crate) start: BitSet,
    pub(crate) accept: BitSet,
    // sorted closure members per state
    pub(crate) closures: OnceCell<Vec<Vec<StateId>>>,
    pub(crate) dead: OnceCell<Transformation>,
    phase: PhantomData<P>,
}

impl<P: Phase> Nfa<P> {
    /// Empty automaton over `symbols`. Repeated symbols keep their first position.
    pub fn new<I>(symbols: I) -> Self
        where I: IntoIterator<Item = Symbol>
    {
        let mut alphabet = Vec::new();
        for symbol in symbols {
            if !alphabet.contains(&symbol) {
                alphabet.push(symbol);
            }
        }
        Nfa {
            symbols: alphabet,
            labels: Vec::new(),
            transitions: Vec::new(),
            epsilon: Vec::new(),
            start: BitSet::new(),
            accept: BitSet::new(),
            closures: OnceCell::new(),
            dead: OnceCell::new(),
            phase: PhantomData,
        }
    }

    pub(crate) fn into_phase<Q: Phase>(self) -> Nfa<Q> {
        Nfa {
            symbols: self.symbols,
            labels: self.labels,
            transitions: self.transitions,
            epsilon: self.epsilon,
            start: self.start,
            accept: self.accept,
            closures: OnceCell::new(),
            dead: OnceCell::new(),
            phase: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn check(&self, id: StateId) -> Result<()> {
        if id < self.len() {
            Ok(())
        } else {
            Err(Error::UnknownState {
                id,
                len: self.len(),
            })
        }
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbol_index(&self, symbol: Symbol) -> Option<usize> {
        self.symbols.iter().position(|&s| s == symbol)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Allocates the next id.
    pub fn add_state<L: Into<String>>(&mut self, label: L) -> StateId {
        let id = self.labels.len();
        self.labels.push(label.into());
        self.transitions.push(vec![BTreeSet::new(); self.symbols.len()]);
        self.epsilon.push(BTreeSet::new());
        // A fresh state has no epsilon edges, so cached closures stay valid.
        if let Some(closures) = self.closures.get_mut() {
            closures.push(vec![id]);
        }
        self.dead.take();
        id
    }

    /// Returns whether `id` was not a start state before.
    pub fn add_start(&mut self, id: StateId) -> Result<bool> {
        self.check(id)?;
        Ok(self.start.insert(id))
    }

    /// Returns whether `id` was not accepting before.
    pub fn add_accept(&mut self, id: StateId) -> Result<bool> {
        self.check(id)?;
        let added = self.accept.insert(id);
        if added {
            self.dead.take();
        }
        Ok(added)
    }

    /// Returns whether the edge is new.
    pub fn add_transition(&mut self, from: StateId, to: StateId, symbol: usize) -> Result<bool> {
        self.check(from)?;
        self.check(to)?;
        if symbol >= self.symbols.len() {
            return Err(Error::PreconditionViolation(format!(
                "symbol index {} out of range for an alphabet of {}",
                symbol,
                self.symbols.len()
            )));
        }
        let added = self.transitions[from][symbol].insert(to);
        if added {
            self.dead.take();
        }
        Ok(added)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn label(&self, id: StateId) -> Option<&str> {
        self.labels.get(id).map(String::as_str)
    }

    pub fn start_states(&self) -> &BitSet {
        &self.start
    }

    pub fn accept_states(&self) -> &BitSet {
        &self.accept
    }

    #[inline]
    pub fn is_start(&self, id: StateId) -> bool {
        self.start.contains(id)
    }

    #[inline]
    pub fn is_accept(&self, id: StateId) -> bool {
        self.accept.contains(id)
    }

    /// Targets of `id` on the symbol at `symbol`.
    pub fn targets(&self, id: StateId, symbol: usize) -> Option<&BTreeSet<StateId>> {
        self.transitions.get(id).and_then(|row| row.get(symbol))
    }

    pub fn epsilon_targets(&self, id: StateId) -> Option<&BTreeSet<StateId>> {
        self.epsilon.get(id)
    }

    /// Outgoing edges of `id` grouped by target, each with its sorted symbols.
    pub fn transitions_from(&self, id: StateId) -> BTreeMap<StateId, Vec<Symbol>> {
        let mut grouped: BTreeMap<StateId, Vec<Symbol>> = BTreeMap::new();
        if let Some(row) = self.transitions.get(id) {
            for (symbol, targets) in row.iter().enumerate() {
                for &to in targets {
                    grouped.entry(to).or_default().push(self.symbols[symbol]);
                }
            }
        }
        for symbols in grouped.values_mut() {
            symbols.sort_unstable();
            symbols.dedup();
        }
        grouped
    }

    /// Every `(from, symbol index, to)` edge, ordered by source, symbol and target.
    pub fn edges(&self) -> impl Iterator<Item = (StateId, usize, StateId)> + '_ {
        self.transitions.iter().enumerate().flat_map(|(from, row)| {
            row.iter()
                .enumerate()
                .flat_map(move |(symbol, targets)| targets.iter().map(move |&to| (from, symbol, to)))
        })
    }

    pub fn epsilon_edges(&self) -> impl Iterator<Item = (StateId, StateId)> + '_ {
        self.epsilon
            .iter()
            .enumerate()
            .flat_map(|(from, targets)| targets.iter().map(move |&to| (from, to)))
    }

    pub fn has_epsilon_edges(&self) -> bool {
        self.epsilon.iter().any(|targets| !targets.is_empty())
    }

    fn skeleton(&self) -> Self {
        let mut nfa = Nfa::new(self.symbols.iter().copied());
        for label in &self.labels {
            nfa.add_state(label.clone());
        }
        nfa
    }

    /// Every edge flipped and the start and accept roles swapped.
    pub fn reverse(&self) -> Self {
        let mut rev = self.skeleton();
        for (from, symbol, to) in self.edges() {
            rev.transitions[to][symbol].insert(from);
        }
        for (from, to) in self.epsilon_edges() {
            rev.epsilon[to].insert(from);
        }
        rev.start = self.accept.clone();
        rev.accept = self.start.clone();
        rev
    }

    /// Materializes the canonical states of `t`, renumbered densely in ascending order.
    pub fn apply_transformation(&self, t: &Transformation) -> Result<Self> {
        if t.len() != self.len() {
            return Err(Error::PreconditionViolation(format!(
                "transformation over {} states applied to an automaton of {}",
                t.len(),
                self.len()
            )));
        }
        Ok(self.materialize(t))
    }

    pub(crate) fn materialize(&self, t: &Transformation) -> Self {
        let mut dense = vec![None; self.len()];
        let mut nfa = Nfa::new(self.symbols.iter().copied());
        for c in t.canonical_states() {
            dense[c] = Some(nfa.add_state(self.labels[c].clone()));
        }
        let new_id = |id: StateId| t.get(id).and_then(|c| dense[c]);

        for id in 0..self.len() {
            let Some(from) = new_id(id) else { continue };
            for (symbol, targets) in self.transitions[id].iter().enumerate() {
                nfa.transitions[from][symbol].extend(targets.iter().filter_map(|&to| new_id(to)));
            }
            nfa.epsilon[from].extend(self.epsilon[id].iter().filter_map(|&to| new_id(to)));
            if self.start.contains(id) {
                nfa.start.insert(from);
            }
            if self.accept.contains(id) {
                nfa.accept.insert(from);
            }
        }
        nfa
    }
}

impl Nfa<Epsilon> {
    /// Fails once epsilon closures have been cached on this automaton.
    pub fn add_epsilon_transition(&mut self, from: StateId, to: StateId) -> Result<bool> {
        self.check(from)?;
        self.check(to)?;
        if self.closures.get().is_some() {
            return Err(Error::PreconditionViolation(format!(
                "epsilon edge {} -> {} added after epsilon closures were computed",
                from, to
            )));
        }
        let added = self.epsilon[from].insert(to);
        if added {
            self.dead.take();
        }
        Ok(added)
    }
}

impl Nfa<EpsilonFree> {
    /// Re-enters the epsilon stage, e.g. to splice in more epsilon-linked fragments.
    pub fn into_epsilon(self) -> Nfa<Epsilon> {
        self.into_phase()
    }
}

impl<P: Phase> fmt::Display for Nfa<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in 0..self.len() {
            write!(f, "{} {:?}", id, self.labels[id])?;
            if self.is_start(id) {
                write!(f, " (start)")?;
            }
            write!(f, " -> [")?;
            let grouped = self.transitions_from(id);
            if !grouped.is_empty() || !self.epsilon[id].is_empty() {
                writeln!(f)?;
            }
            for (to, symbols) in &grouped {
                let symbols: String = symbols.iter().collect();
                writeln!(f, "  {} -> {},", symbols, to)?;
            }
            for to in &self.epsilon[id] {
                writeln!(f, "  ε -> {},", to)?;
            }
            write!(f, "]")?;
            if self.is_accept(id) {
                write!(f, " -- final state")?;
            }
            writeln!(f, ",")?;
        }
        Ok(())
    }
}
