//! Forward reachability and dead-state detection.

use std::collections::VecDeque;

use bit_set::BitSet;
use bit_vec::BitVec;
use log::debug;

use crate::nfa::{Nfa, Phase, StateId};
use crate::transform::Transformation;

impl<P: Phase> Nfa<P> {
    /// States reachable from a start state over transitions and epsilon edges.
    pub fn reachable(&self) -> BitSet {
        let mut seen = BitVec::from_elem(self.len(), false);
        let mut queue: VecDeque<StateId> = VecDeque::new();
        for s in self.start.iter() {
            seen.set(s, true);
            queue.push_back(s);
        }
        while let Some(state) = queue.pop_front() {
            let successors = self.transitions[state]
                .iter()
                .flatten()
                .chain(self.epsilon[state].iter());
            for &to in successors {
                if !seen[to] {
                    seen.set(to, true);
                    queue.push_back(to);
                }
            }
        }
        BitSet::from_bit_vec(seen)
    }

    /// Deletes the states no start state reaches.
    pub fn unreachable_states(&self) -> Transformation {
        let reachable = self.reachable();
        Transformation::deletion(self.len(), (0..self.len()).filter(|&id| !reachable.contains(id)))
    }

    /// Deletes the states from which no accept state can be reached.
    ///
    /// Computed once, as forward reachability on the reversed automaton (whose start states
    /// are our accept states), and cached until the automaton is edited.
    pub fn dead_states(&self) -> &Transformation {
        self.dead.get_or_init(|| {
            let live = self.reverse().reachable();
            let dead: Vec<StateId> = (0..self.len()).filter(|&id| !live.contains(id)).collect();
            debug!("{} of {} states are dead", dead.len(), self.len());
            Transformation::deletion(self.len(), dead)
        })
    }

    #[inline]
    pub fn is_dead(&self, id: StateId) -> bool {
        id < self.len() && self.dead_states().is_deleted(id)
    }
}

#[cfg(test)]
mod tests {
    use crate::nfa::{Epsilon, Nfa};

    // 0 -a-> 1 -a-> 2 (accept), 0 -b-> 3 -a-> 3, 4 -ε-> 2, 5 isolated
    fn sample() -> Nfa<Epsilon> {
        let mut nfa = Nfa::new("ab".chars());
        for id in 0..6 {
            nfa.add_state(id.to_string());
        }
        nfa.add_start(0).unwrap();
        nfa.add_accept(2).unwrap();
        nfa.add_transition(0, 1, 0).unwrap();
        nfa.add_transition(1, 2, 0).unwrap();
        nfa.add_transition(0, 3, 1).unwrap();
        nfa.add_transition(3, 3, 0).unwrap();
        nfa.add_epsilon_transition(4, 2).unwrap();
        nfa
    }

    #[test]
    fn forward_reachability() {
        let nfa = sample();
        let reachable: Vec<_> = nfa.reachable().iter().collect();
        assert_eq!(reachable, vec![0, 1, 2, 3]);
        assert_eq!(nfa.unreachable_states().to_signed(), vec![0, 1, 2, 3, -1, -1]);
    }

    #[test]
    fn dead_states_cannot_reach_accept() {
        let nfa = sample();
        assert_eq!(nfa.dead_states().to_signed(), vec![0, 1, 2, -1, 4, -1]);
        assert!(nfa.is_dead(3));
        assert!(!nfa.is_dead(4));
        assert!(!nfa.is_dead(17));
    }

    #[test]
    fn dead_cache_resets_on_edit() {
        let mut nfa = sample();
        assert!(nfa.is_dead(5));
        nfa.add_transition(5, 2, 1).unwrap();
        assert!(!nfa.is_dead(5));
    }

    #[test]
    fn everything_is_dead_without_accept_states() {
        let mut nfa: Nfa = Nfa::new("a".chars());
        let s = nfa.add_state("s");
        nfa.add_start(s).unwrap();
        nfa.add_transition(s, s, 0).unwrap();
        assert!(nfa.is_dead(s));
        assert_eq!(nfa.dead_states().canonical_states().count(), 0);
    }
}
