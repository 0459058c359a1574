//! Epsilon closures and their elimination.

use std::collections::BTreeSet;

use bit_vec::BitVec;
use log::debug;

use crate::error::Result;
use crate::nfa::{Epsilon, EpsilonFree, Nfa, Phase, StateId};

/// Closure of every state over `epsilon`, each sorted and inclusive of the state itself.
///
/// A state whose closure is already known is unioned in instead of walked again, which
/// stays correct on cycles because a finished closure is transitively complete. Rows hold
/// only their members, and one shared `seen` vector is reset after each state.
pub(crate) fn closures(epsilon: &[BTreeSet<StateId>]) -> Vec<Vec<StateId>> {
    let n = epsilon.len();
    let mut done: Vec<Vec<StateId>> = Vec::with_capacity(n);
    let mut seen = BitVec::from_elem(n, false);
    for state in 0..n {
        let mut closure = Vec::new();
        let mut stack = vec![state];
        while let Some(s) = stack.pop() {
            if seen[s] {
                continue;
            }
            seen.set(s, true);
            closure.push(s);
            if let Some(known) = done.get(s) {
                for &k in known {
                    if !seen[k] {
                        seen.set(k, true);
                        closure.push(k);
                    }
                }
                continue;
            }
            stack.extend(epsilon[s].iter().copied().filter(|&t| !seen[t]));
        }
        for &s in &closure {
            seen.set(s, false);
        }
        closure.sort_unstable();
        done.push(closure);
    }
    done
}

/// Closure of a set of states over `epsilon`, computed without caching.
pub(crate) fn close<I>(epsilon: &[BTreeSet<StateId>], seeds: I) -> BTreeSet<StateId>
    where I: IntoIterator<Item = StateId>
{
    let mut closure = BTreeSet::new();
    let mut stack: Vec<StateId> = seeds.into_iter().collect();
    while let Some(s) = stack.pop() {
        if closure.insert(s) {
            if let Some(targets) = epsilon.get(s) {
                stack.extend(targets.iter().copied().filter(|t| !closure.contains(t)));
            }
        }
    }
    closure
}

impl<P: Phase> Nfa<P> {
    pub(crate) fn closure_table(&self) -> &[Vec<StateId>] {
        self.closures.get_or_init(|| {
            let table = closures(&self.epsilon);
            debug!("cached epsilon closures for {} states", table.len());
            table
        })
    }

    /// Epsilon closure of `id`. The first call caches closures for every state; from then on
    /// `add_epsilon_transition` is refused.
    pub fn epsilon_closure(&self, id: StateId) -> Result<&[StateId]> {
        self.check(id)?;
        Ok(&self.closure_table()[id])
    }

    /// Union of the closures of `states`.
    pub fn close<I>(&self, states: I) -> BTreeSet<StateId>
        where I: IntoIterator<Item = StateId>
    {
        let table = self.closure_table();
        let mut closed = BTreeSet::new();
        for state in states {
            if let Some(closure) = table.get(state) {
                closed.extend(closure.iter().copied());
            }
        }
        closed
    }

    pub fn closures_cached(&self) -> bool {
        self.closures.get().is_some()
    }
}

impl Nfa<Epsilon> {
    /// Folds every epsilon move into start states, ordinary transitions and accept flags.
    ///
    /// Start states grow to the union of their closures, every `from -a-> to` gains
    /// `from -a-> c` for each `c` in the closure of `to`, and a state accepts when anything
    /// in its closure does. State ids and labels are unchanged.
    pub fn eliminate_epsilons(mut self) -> Nfa<EpsilonFree> {
        let table = match self.closures.take() {
            Some(table) => table,
            None => closures(&self.epsilon),
        };

        let starts: Vec<StateId> = self.start.iter().collect();
        for s in starts {
            for &c in &table[s] {
                self.start.insert(c);
            }
        }

        let mut added = 0;
        for row in &mut self.transitions {
            for targets in row.iter_mut() {
                let reached: Vec<StateId> = targets.iter().flat_map(|&t| table[t].iter().copied()).collect();
                let before = targets.len();
                targets.extend(reached);
                added += targets.len() - before;
            }
        }

        let accepting: Vec<StateId> = (0..self.len())
            .filter(|&id| table[id].iter().any(|&c| self.accept.contains(c)))
            .collect();
        for id in accepting {
            self.accept.insert(id);
        }

        let removed: usize = self.epsilon.iter().map(BTreeSet::len).sum();
        for targets in &mut self.epsilon {
            targets.clear();
        }
        debug!(
            "eliminated {} epsilon edges over {} states, {} transitions added",
            removed,
            self.len(),
            added
        );
        self.into_phase()
    }
}
