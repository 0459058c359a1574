//! Equivalence minimization by partition refinement.

use bit_vec::BitVec;
use log::debug;
use rustc_hash::FxHashMap;

use crate::automaton::Automaton;
use crate::nfa::{Phase, StateId};
use crate::transform::Transformation;
use crate::view::View;

type Signature = (usize, Vec<(usize, usize)>, Vec<usize>);

/// Merges the canonical states of `view` that no input can tell apart.
///
/// Blocks start out split by acceptance. Each round a state's signature is its current
/// block plus the set of `(symbol, target block)` moves and epsilon target blocks it has,
/// and states are regrouped by signature until the block count stops growing. Every block
/// maps onto its smallest member.
///
/// The result covers the automaton's whole id space; ids that are not canonical in `view`
/// map to themselves, so `view.transformation().compose(&merge)` is the merged view.
pub fn equivalence_merge<P: Phase>(view: &View<'_, P>) -> Transformation {
    let n = view.nfa().len();
    let symbols = view.alphabet().len();
    let states: Vec<StateId> = view.states().collect();

    let mut accepting = BitVec::from_elem(n, false);
    for &c in &states {
        if view.is_accept(c) {
            accepting.set(c, true);
        }
    }

    let mut block = vec![usize::MAX; n];
    let mut first: [Option<usize>; 2] = [None, None];
    let mut count = 0;
    for &c in &states {
        let flag = accepting[c] as usize;
        block[c] = *first[flag].get_or_insert_with(|| {
            count += 1;
            count - 1
        });
    }

    let mut rounds = 0;
    loop {
        rounds += 1;
        let mut signatures: FxHashMap<Signature, usize> = FxHashMap::default();
        let mut next = vec![usize::MAX; n];
        for &c in &states {
            let mut moves: Vec<(usize, usize)> = Vec::new();
            for symbol in 0..symbols {
                if let Some(targets) = view.targets(c, symbol) {
                    moves.extend(targets.iter().map(|&t| (symbol, block[t])));
                }
            }
            moves.sort_unstable();
            moves.dedup();

            let mut silent: Vec<usize> = view
                .epsilon_from(c)
                .into_iter()
                .flatten()
                .map(|&t| block[t])
                .collect();
            silent.sort_unstable();
            silent.dedup();

            let fresh = signatures.len();
            next[c] = *signatures.entry((block[c], moves, silent)).or_insert(fresh);
        }
        block = next;
        if signatures.len() == count {
            break;
        }
        count = signatures.len();
    }

    let mut representative: Vec<Option<StateId>> = vec![None; count];
    let mut remap: Vec<Option<StateId>> = (0..n).map(Some).collect();
    for &c in &states {
        remap[c] = Some(*representative[block[c]].get_or_insert(c));
    }
    debug!(
        "merged {} canonical states into {} blocks in {} rounds",
        states.len(),
        count,
        rounds
    );
    Transformation::from_parts(remap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nfa::{Epsilon, Nfa};

    // Two copies of "a then b" hanging off the start state.
    fn forked() -> Nfa {
        let mut nfa = Nfa::new("ab".chars());
        for id in 0..5 {
            nfa.add_state(id.to_string());
        }
        nfa.add_start(0).unwrap();
        nfa.add_accept(2).unwrap();
        nfa.add_accept(4).unwrap();
        nfa.add_transition(0, 1, 0).unwrap();
        nfa.add_transition(1, 2, 1).unwrap();
        nfa.add_transition(0, 3, 0).unwrap();
        nfa.add_transition(3, 4, 1).unwrap();
        nfa
    }

    #[test]
    fn merges_identical_branches() {
        let nfa = forked();
        let view = View::identity(&nfa);
        let merge = equivalence_merge(&view);
        assert_eq!(merge.to_signed(), vec![0, 1, 2, 1, 2]);
    }

    #[test]
    fn distinguishes_by_future_behaviour() {
        let mut nfa = forked();
        // 4 can now continue on 'a', 2 cannot.
        nfa.add_transition(4, 4, 0).unwrap();
        let view = View::identity(&nfa);
        let merge = equivalence_merge(&view);
        assert_eq!(merge.to_signed(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn respects_existing_deletions() {
        let nfa = forked();
        let view = View::new(&nfa, Transformation::deletion(5, vec![3])).unwrap();
        let merge = equivalence_merge(&view);
        // 3 is outside the view and maps to itself; 4 behaves like 2.
        assert_eq!(merge.to_signed(), vec![0, 1, 2, 3, 2]);
        let combined = view.transformation().compose(&merge);
        assert_eq!(combined.to_signed(), vec![0, 1, 2, -1, 2]);
    }

    #[test]
    fn merges_self_loops_of_equal_shape() {
        // 0 -a-> 1 -a-> 1, 0 -b-> 2 -a-> 2, all accepting
        let mut nfa: Nfa = Nfa::new("ab".chars());
        for id in 0..3 {
            let s = nfa.add_state(id.to_string());
            nfa.add_accept(s).unwrap();
        }
        nfa.add_start(0).unwrap();
        nfa.add_transition(0, 1, 0).unwrap();
        nfa.add_transition(1, 1, 0).unwrap();
        nfa.add_transition(0, 2, 1).unwrap();
        nfa.add_transition(2, 2, 0).unwrap();
        let merge = equivalence_merge(&View::identity(&nfa));
        assert_eq!(merge.to_signed(), vec![0, 1, 1]);
    }

    #[test]
    fn epsilon_edges_are_part_of_the_signature() {
        let mut nfa: Nfa<Epsilon> = Nfa::new("a".chars());
        for id in 0..4 {
            nfa.add_state(id.to_string());
        }
        nfa.add_start(0).unwrap();
        nfa.add_accept(3).unwrap();
        nfa.add_epsilon_transition(1, 3).unwrap();
        nfa.add_transition(0, 1, 0).unwrap();
        nfa.add_transition(0, 2, 0).unwrap();
        let merge = equivalence_merge(&View::identity(&nfa));
        assert_ne!(merge.get(1), merge.get(2));
    }
}
