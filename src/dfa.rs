//! Subset construction: determinizing an epsilon-free view.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::automaton::Automaton;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::nfa::{EpsilonFree, Nfa, Phase, StateId};
use crate::view::View;

/// Builds a DFA equivalent to `view`.
///
/// Each DFA state is a set of canonical states of the view, interned by its sorted member
/// list and labelled with that list comma-joined (see `resolve_sources`). Subsets are
/// explored first in, first out, so DFA ids follow breadth-first discovery order. Symbols
/// on which a subset has no successor get no transition.
///
/// Only epsilon-free automata can be determinized; call `eliminate_epsilons` first.
pub fn determinize(view: &View<'_, EpsilonFree>, limits: &Limits) -> Result<Nfa> {
    let symbols = view.alphabet().len();
    let mut dfa: Nfa = Nfa::new(view.alphabet().iter().copied());
    // Insertion order doubles as the worklist and as DFA id order.
    let mut subsets: IndexMap<Vec<StateId>, StateId> = IndexMap::new();

    let start: Vec<StateId> = view.start_states().iter().copied().collect();
    if start.is_empty() {
        return Ok(dfa);
    }
    let start = intern(&mut dfa, &mut subsets, view, start, limits)?;
    dfa.add_start(start)?;

    let mut head = 0;
    while head < subsets.len() {
        let members = match subsets.get_index(head) {
            Some((members, _)) => members.clone(),
            None => break,
        };
        trace!("expanding subset {} = {:?}", head, members);
        for symbol in 0..symbols {
            let mut reached = BTreeSet::new();
            for &m in &members {
                if let Some(targets) = view.targets(m, symbol) {
                    reached.extend(targets.iter().copied());
                }
            }
            if reached.is_empty() {
                continue;
            }
            let key: Vec<StateId> = reached.into_iter().collect();
            let to = match subsets.get(&key) {
                Some(&id) => id,
                None => intern(&mut dfa, &mut subsets, view, key, limits)?,
            };
            dfa.add_transition(head, to, symbol)?;
        }
        head += 1;
    }

    debug!(
        "subset construction built {} states from {} canonical states",
        dfa.len(),
        view.len()
    );
    Ok(dfa)
}

fn intern(
    dfa: &mut Nfa,
    subsets: &mut IndexMap<Vec<StateId>, StateId>,
    view: &View<'_, EpsilonFree>,
    members: Vec<StateId>,
    limits: &Limits,
) -> Result<StateId> {
    if !limits.admits(dfa.len()) {
        return Err(Error::StateLimitExceeded {
            limit: limits.max_states,
        });
    }
    let label = members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let id = dfa.add_state(label);
    if members.iter().any(|&m| view.is_accept(m)) {
        dfa.add_accept(id)?;
    }
    subsets.insert(members, id);
    Ok(id)
}

/// The source state ids recorded in the label of DFA state `id`.
pub fn resolve_sources(dfa: &Nfa, id: StateId) -> Result<Vec<StateId>> {
    dfa.check(id)?;
    let label = &dfa.labels[id];
    label
        .split(',')
        .map(|part| {
            part.trim().parse::<StateId>().map_err(|_| Error::InvalidStateValue {
                value: label.clone(),
                reason: "not a subset label",
            })
        })
        .collect()
}

/// At most one start state, no epsilon edges, at most one target per state and symbol.
pub fn is_deterministic<P: Phase>(nfa: &Nfa<P>) -> bool {
    nfa.start_states().len() <= 1
        && !nfa.has_epsilon_edges()
        && nfa.transitions.iter().flatten().all(|targets| targets.len() <= 1)
}
