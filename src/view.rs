//! Read-only overlays of an automaton and a transformation.
//!
//! A view never edits the automaton it borrows. Canonical-state queries, merged transitions
//! and statistics are derived once, when the view is built.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::automaton::Automaton;
use crate::dfa;
use crate::epsilon;
use crate::error::{Error, Result};
use crate::minimize::equivalence_merge;
use crate::nfa::{EpsilonFree, Nfa, Phase, StateId, Symbol};
use crate::transform::Transformation;

/// Counts over the canonical states of a view.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub start: usize,
    pub accept: usize,
    pub live: usize,
    pub dead: usize,
}

#[derive(Clone, Debug)]
pub struct View<'a, P: Phase = EpsilonFree> {
    nfa: &'a Nfa<P>,
    transform: Transformation,
    members: BTreeMap<StateId, Vec<StateId>>,
    // canonical state -> symbol index -> canonical targets; other rows stay empty
    edges: Vec<Vec<BTreeSet<StateId>>>,
    epsilon: Vec<BTreeSet<StateId>>,
    start: BTreeSet<StateId>,
    accept: BTreeSet<StateId>,
}

impl<'a, P: Phase> View<'a, P> {
    pub fn new(nfa: &'a Nfa<P>, transform: Transformation) -> Result<Self> {
        if transform.len() != nfa.len() {
            return Err(Error::PreconditionViolation(format!(
                "transformation over {} states used with an automaton of {}",
                transform.len(),
                nfa.len()
            )));
        }
        Ok(View::build(nfa, transform))
    }

    fn build(nfa: &'a Nfa<P>, transform: Transformation) -> Self {
        let n = nfa.len();
        let mut edges = vec![Vec::new(); n];
        let mut epsilon = vec![BTreeSet::new(); n];
        let mut start = BTreeSet::new();
        let mut accept = BTreeSet::new();
        let members = transform.groups();

        for (&c, sources) in &members {
            let mut row = vec![BTreeSet::new(); nfa.symbols.len()];
            for &id in sources {
                for (symbol, targets) in nfa.transitions[id].iter().enumerate() {
                    row[symbol].extend(targets.iter().filter_map(|&t| transform.get(t)));
                }
                epsilon[c].extend(
                    nfa.epsilon[id].iter().filter_map(|&t| transform.get(t)).filter(|&t| t != c),
                );
                if nfa.is_start(id) {
                    start.insert(c);
                }
                if nfa.is_accept(id) {
                    accept.insert(c);
                }
            }
            edges[c] = row;
        }

        View {
            nfa,
            transform,
            members,
            edges,
            epsilon,
            start,
            accept,
        }
    }

    pub fn identity(nfa: &'a Nfa<P>) -> Self {
        View::build(nfa, Transformation::identity(nfa.len()))
    }

    /// Hides the states that cannot reach an accept state.
    pub fn pruned(nfa: &'a Nfa<P>) -> Self {
        View::build(nfa, nfa.dead_states().clone())
    }

    /// Hides unreachable and dead states.
    pub fn trimmed(nfa: &'a Nfa<P>) -> Self {
        let t = nfa.unreachable_states().compose(nfa.dead_states());
        View::build(nfa, t)
    }

    /// A view of the same automaton with `next` applied after this view's transformation.
    pub fn then(&self, next: &Transformation) -> Result<View<'a, P>> {
        if next.len() != self.nfa.len() {
            return Err(Error::PreconditionViolation(format!(
                "transformation over {} states composed with a view of {}",
                next.len(),
                self.nfa.len()
            )));
        }
        Ok(View::build(self.nfa, self.transform.compose(next)))
    }

    /// Merges behaviourally equivalent canonical states.
    pub fn minimized(&self) -> View<'a, P> {
        let merge = equivalence_merge(self);
        View::build(self.nfa, self.transform.compose(&merge))
    }

    /// Copies the canonical states into a new, densely numbered automaton.
    pub fn materialize(&self) -> Nfa<P> {
        self.nfa.materialize(&self.transform)
    }

    pub fn nfa(&self) -> &'a Nfa<P> {
        self.nfa
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transform
    }

    /// Canonical states in ascending order.
    pub fn states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.members.keys().copied()
    }

    /// Number of canonical states.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    #[inline]
    pub fn is_canonical(&self, id: StateId) -> bool {
        self.transform.is_canonical(id)
    }

    #[inline]
    pub fn canonical_of(&self, id: StateId) -> Option<StateId> {
        self.transform.get(id)
    }

    /// Source states merged into `c`, empty unless `c` is canonical.
    pub fn members(&self, c: StateId) -> &[StateId] {
        self.members.get(&c).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn start_states(&self) -> &BTreeSet<StateId> {
        &self.start
    }

    pub fn accept_states(&self) -> &BTreeSet<StateId> {
        &self.accept
    }

    #[inline]
    pub fn is_start(&self, c: StateId) -> bool {
        self.start.contains(&c)
    }

    #[inline]
    pub fn is_accept(&self, c: StateId) -> bool {
        self.accept.contains(&c)
    }

    /// Whether `c` is canonical and none of its members can reach an accept state.
    ///
    /// Reachability is judged on the underlying automaton, not on this view's edges: a state
    /// whose only way to an accept state runs through a deleted state still counts as live.
    pub fn is_dead(&self, c: StateId) -> bool {
        let dead = self.nfa.dead_states();
        self.members
            .get(&c)
            .is_some_and(|sources| sources.iter().all(|&id| dead.is_deleted(id)))
    }

    pub(crate) fn targets(&self, c: StateId, symbol: usize) -> Option<&BTreeSet<StateId>> {
        self.edges.get(c).and_then(|row| row.get(symbol))
    }

    /// Outgoing edges of `c` keyed by canonical target, each with its sorted symbols.
    pub fn transitions_from(&self, c: StateId) -> BTreeMap<StateId, Vec<Symbol>> {
        let mut grouped: BTreeMap<StateId, Vec<Symbol>> = BTreeMap::new();
        if let Some(row) = self.edges.get(c) {
            for (symbol, targets) in row.iter().enumerate() {
                for &to in targets {
                    grouped.entry(to).or_default().push(self.nfa.symbols[symbol]);
                }
            }
        }
        for symbols in grouped.values_mut() {
            symbols.sort_unstable();
        }
        grouped
    }

    pub fn epsilon_from(&self, c: StateId) -> Option<&BTreeSet<StateId>> {
        self.epsilon.get(c)
    }

    pub fn has_epsilon_edges(&self) -> bool {
        self.epsilon.iter().any(|targets| !targets.is_empty())
    }

    pub fn stats(&self) -> Stats {
        let dead = self.states().filter(|&c| self.is_dead(c)).count();
        Stats {
            total: self.len(),
            start: self.start.len(),
            accept: self.accept.len(),
            live: self.len() - dead,
            dead,
        }
    }

    /// Source states of this view behind state `id` of a DFA built from it.
    pub fn resolve_sources(&self, dfa: &Nfa, id: StateId) -> Result<BTreeSet<StateId>> {
        let mut sources = BTreeSet::new();
        for c in dfa::resolve_sources(dfa, id)? {
            sources.extend(self.members(c).iter().copied());
        }
        Ok(sources)
    }
}

impl<'a, P: Phase> Automaton for View<'a, P> {
    fn alphabet(&self) -> &[Symbol] {
        self.nfa.symbols()
    }

    fn initial(&self) -> BTreeSet<StateId> {
        epsilon::close(&self.epsilon, self.start.iter().copied())
    }

    fn step(&self, active: &BTreeSet<StateId>, symbols: &[Symbol]) -> BTreeSet<StateId> {
        let indices: Vec<usize> = symbols.iter().filter_map(|&s| self.nfa.symbol_index(s)).collect();
        let mut next = BTreeSet::new();
        for &c in active {
            for &symbol in &indices {
                if let Some(targets) = self.targets(c, symbol) {
                    next.extend(targets.iter().copied());
                }
            }
        }
        epsilon::close(&self.epsilon, next)
    }

    fn is_accepting(&self, active: &BTreeSet<StateId>) -> bool {
        active.iter().any(|c| self.accept.contains(c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::Epsilon;

    // 0 -a-> 1, 0 -a-> 2, 1 -b-> 3, 2 -b-> 3 (accept), 0 -b-> 4 (dead), 5 unreachable
    fn sample() -> Nfa {
        let mut nfa = Nfa::new("ab".chars());
        for id in 0..6 {
            nfa.add_state(format!("q{}", id));
        }
        nfa.add_start(0).unwrap();
        nfa.add_accept(3).unwrap();
        nfa.add_accept(5).unwrap();
        nfa.add_transition(0, 1, 0).unwrap();
        nfa.add_transition(0, 2, 0).unwrap();
        nfa.add_transition(1, 3, 1).unwrap();
        nfa.add_transition(2, 3, 1).unwrap();
        nfa.add_transition(0, 4, 1).unwrap();
        nfa
    }

    #[test]
    fn identity_view_mirrors_automaton() {
        let nfa = sample();
        let view = View::identity(&nfa);
        assert_eq!(view.len(), 6);
        assert_eq!(view.transitions_from(0), nfa.transitions_from(0));
        assert_eq!(
            view.stats(),
            Stats { total: 6, start: 1, accept: 2, live: 5, dead: 1 }
        );
        assert!(view.is_dead(4));
        assert!(!view.is_dead(5));
    }

    #[test]
    fn pruned_and_trimmed_views() {
        let nfa = sample();
        let pruned = View::pruned(&nfa);
        assert!(!pruned.is_canonical(4));
        assert!(pruned.transitions_from(0).get(&4).is_none());
        assert_eq!(pruned.stats().total, 5);

        let trimmed = View::trimmed(&nfa);
        assert_eq!(trimmed.states().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(trimmed.stats(), Stats { total: 4, start: 1, accept: 1, live: 4, dead: 0 });
    }

    #[test]
    fn merged_states_union_their_edges() {
        let nfa = sample();
        let t = Transformation::from_remap(vec![Some(0), Some(1), Some(1), Some(3), None, None])
            .unwrap();
        let view = View::new(&nfa, t).unwrap();
        assert_eq!(view.members(1), &[1, 2]);
        assert!(view.members(2).is_empty());
        assert_eq!(view.canonical_of(2), Some(1));
        let from0 = view.transitions_from(0);
        assert_eq!(from0.len(), 1);
        assert_eq!(from0[&1], vec!['a']);
        assert!(view.accepts("ab"));
        assert!(!view.accepts("b"));
    }

    #[test]
    fn minimized_view_merges_equivalent_branches() {
        let nfa = sample();
        let trimmed = View::trimmed(&nfa);
        let min = trimmed.minimized();
        assert_eq!(min.len(), 3);
        assert_eq!(min.canonical_of(2), Some(1));
        assert_eq!(min.members(1), &[1, 2]);
        for word in ["ab", "a", "abb", "b", ""] {
            assert_eq!(min.accepts(word), nfa.accepts(word), "{:?}", word);
        }
        let dense = min.materialize();
        assert_eq!(dense.len(), 3);
        assert_eq!(dense.labels(), &["q0", "q1", "q3"]);
    }

    #[test]
    fn liveness_comes_from_the_automaton() {
        let nfa = sample();
        let view = View::new(&nfa, Transformation::deletion(6, vec![1, 2])).unwrap();
        // 0 reaches 3 only through the deleted 1 and 2.
        assert!(view.transitions_from(0).keys().all(|&t| t == 4));
        assert!(!view.is_dead(0));
        assert!(view.is_dead(4));
        assert_eq!(view.stats(), Stats { total: 4, start: 1, accept: 2, live: 3, dead: 1 });
    }

    #[test]
    fn mismatched_transformation_is_rejected() {
        let nfa = sample();
        assert!(View::new(&nfa, Transformation::identity(2)).is_err());
        let view = View::identity(&nfa);
        assert!(view.then(&Transformation::identity(7)).is_err());
        let dropped = view.then(&Transformation::deletion(6, vec![0])).unwrap();
        assert!(dropped.start_states().is_empty());
    }

    #[test]
    fn epsilon_view_simulates_closures() {
        let mut nfa: Nfa<Epsilon> = Nfa::new("a".chars());
        for id in 0..3 {
            nfa.add_state(id.to_string());
        }
        nfa.add_start(0).unwrap();
        nfa.add_accept(2).unwrap();
        nfa.add_epsilon_transition(0, 1).unwrap();
        nfa.add_transition(1, 2, 0).unwrap();
        let view = View::identity(&nfa);
        assert!(view.has_epsilon_edges());
        assert_eq!(view.initial(), BTreeSet::from([0, 1]));
        assert!(view.accepts("a"));
        assert!(!nfa.closures_cached());
    }
}
