//! Breadth-first state-space exploration of a user-defined machine.
//!
//! A machine is any `Definition`: a transition function, an acceptance predicate and an
//! optional epsilon function over opaque JSON state values. Exploration interns every
//! value it meets under a canonical encoding, so structurally equal values (objects with
//! the same fields in any order included) are the same state.

use std::collections::VecDeque;

use log::{debug, trace};
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::config::Limits;
use crate::error::{CallableError, Error, Result};
use crate::nfa::{Epsilon, Nfa, StateId, Symbol};

/// The three callables of a machine.
///
/// Results are read as successor lists: `null` means none, an array lists several
/// (its `null` entries are skipped) and anything else is a single successor.
pub trait Definition {
    fn transition(&self, state: &Value, symbol: Symbol) -> Result<Value, CallableError>;

    fn accept(&self, state: &Value) -> Result<bool, CallableError>;

    /// States reachable without consuming input. None by default.
    fn epsilon(&self, _state: &Value) -> Result<Value, CallableError> {
        Ok(Value::Null)
    }
}

type TransitionFn = Box<dyn Fn(&Value, Symbol) -> Result<Value, CallableError>>;
type AcceptFn = Box<dyn Fn(&Value) -> Result<bool, CallableError>>;
type EpsilonFn = Box<dyn Fn(&Value) -> Result<Value, CallableError>>;

/// A `Definition` assembled from closures.
pub struct Machine {
    transition: TransitionFn,
    accept: AcceptFn,
    epsilon: Option<EpsilonFn>,
}

impl Machine {
    pub fn new<T, A>(transition: T, accept: A) -> Self
        where T: Fn(&Value, Symbol) -> Result<Value, CallableError> + 'static,
              A: Fn(&Value) -> Result<bool, CallableError> + 'static
    {
        Machine {
            transition: Box::new(transition),
            accept: Box::new(accept),
            epsilon: None,
        }
    }

    pub fn with_epsilon<E>(mut self, epsilon: E) -> Self
        where E: Fn(&Value) -> Result<Value, CallableError> + 'static
    {
        self.epsilon = Some(Box::new(epsilon));
        self
    }
}

impl Definition for Machine {
    fn transition(&self, state: &Value, symbol: Symbol) -> Result<Value, CallableError> {
        (self.transition)(state, symbol)
    }

    fn accept(&self, state: &Value) -> Result<bool, CallableError> {
        (self.accept)(state)
    }

    fn epsilon(&self, state: &Value) -> Result<Value, CallableError> {
        match self.epsilon {
            Some(ref epsilon) => epsilon(state),
            None => Ok(Value::Null),
        }
    }
}

/// Canonical encoding of a state value: JSON with object keys sorted at every level.
pub fn state_key(value: &Value) -> Result<String> {
    fn sorted(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut entries: Vec<_> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Value::Object(entries.into_iter().map(|(k, v)| (k.clone(), sorted(v))).collect())
            }
            Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
            other => other.clone(),
        }
    }
    Ok(serde_json::to_string(&sorted(value))?)
}

/// Reads a callable result (or a start value) as a list of states.
fn successors(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| {
                if item.is_array() {
                    Err(Error::InvalidStateValue {
                        value: item.to_string(),
                        reason: "an array cannot be a state",
                    })
                } else {
                    Ok(item)
                }
            })
            .collect(),
        single => Ok(vec![single]),
    }
}

pub struct Explorer<'d, D: ?Sized> {
    definition: &'d D,
    symbols: Vec<Symbol>,
    limits: Limits,
}

impl<'d, D: Definition + ?Sized> Explorer<'d, D> {
    pub fn new<I>(definition: &'d D, symbols: I) -> Self
        where I: IntoIterator<Item = Symbol>
    {
        Explorer {
            definition,
            symbols: symbols.into_iter().collect(),
            limits: Limits::default(),
        }
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Explores everything reachable from `start` (an array means several start states).
    ///
    /// Ids follow first-in, first-out discovery order, so identical definitions always
    /// produce identical automata. Each dequeued state calls `transition` once per symbol,
    /// in alphabet order, and then `epsilon` once.
    pub fn explore(&self, start: &Value) -> Result<Nfa<Epsilon>> {
        let mut builder = Builder {
            definition: self.definition,
            nfa: Nfa::new(self.symbols.iter().copied()),
            ids: FxHashMap::default(),
            queue: VecDeque::new(),
            limits: self.limits,
        };
        for value in successors(start.clone())? {
            let id = builder.intern(value)?;
            builder.nfa.add_start(id)?;
        }
        builder.run()?;
        let nfa = builder.nfa;
        debug!(
            "explored {} states, {} transitions, {} epsilon edges",
            nfa.len(),
            nfa.edges().count(),
            nfa.epsilon_edges().count()
        );
        Ok(nfa)
    }
}

/// Shorthand for `Explorer::new(definition, symbols).with_limits(limits).explore(start)`.
pub fn explore<D, I>(definition: &D, start: &Value, symbols: I, limits: Limits) -> Result<Nfa<Epsilon>>
    where D: Definition + ?Sized,
          I: IntoIterator<Item = Symbol>
{
    Explorer::new(definition, symbols).with_limits(limits).explore(start)
}

struct Builder<'d, D: ?Sized> {
    definition: &'d D,
    nfa: Nfa<Epsilon>,
    ids: FxHashMap<String, StateId>,
    queue: VecDeque<(StateId, Value)>,
    limits: Limits,
}

impl<'d, D: Definition + ?Sized> Builder<'d, D> {
    fn intern(&mut self, value: Value) -> Result<StateId> {
        let key = state_key(&value)?;
        if let Some(&id) = self.ids.get(&key) {
            return Ok(id);
        }
        if !self.limits.admits(self.nfa.len()) {
            return Err(Error::StateLimitExceeded {
                limit: self.limits.max_states,
            });
        }
        let accepting = self.definition.accept(&value).map_err(|source| Error::Callable {
            callable: "accept",
            state: key.clone(),
            symbol: None,
            source,
        })?;
        let id = self.nfa.add_state(key.clone());
        if accepting {
            self.nfa.add_accept(id)?;
        }
        self.ids.insert(key, id);
        self.queue.push_back((id, value));
        Ok(id)
    }

    fn run(&mut self) -> Result<()> {
        let symbols = self.nfa.symbols().to_vec();
        while let Some((id, value)) = self.queue.pop_front() {
            trace!("visiting state {} = {}", id, self.nfa.labels[id]);
            for (index, &symbol) in symbols.iter().enumerate() {
                let result = self.definition.transition(&value, symbol).map_err(|source| Error::Callable {
                    callable: "transition",
                    state: self.nfa.labels[id].clone(),
                    symbol: Some(symbol),
                    source,
                })?;
                for next in successors(result)? {
                    let to = self.intern(next)?;
                    self.nfa.add_transition(id, to, index)?;
                }
            }
            let result = self.definition.epsilon(&value).map_err(|source| Error::Callable {
                callable: "epsilon",
                state: self.nfa.labels[id].clone(),
                symbol: None,
                source,
            })?;
            for next in successors(result)? {
                let to = self.intern(next)?;
                self.nfa.add_epsilon_transition(id, to)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::automaton::Automaton;

    fn counter(limit: i64) -> Machine {
        Machine::new(
            move |s, _| {
                let n = s.as_i64().ok_or("not a number")?;
                Ok(if n < limit { json!(n + 1) } else { Value::Null })
            },
            move |s| Ok(s.as_i64() == Some(limit)),
        )
    }

    #[test]
    fn ids_follow_bfs_order() {
        // Binary tree of depth two, encoded as strings.
        let tree = Machine::new(
            |s, c| {
                let path = s.as_str().unwrap_or_default();
                Ok(if path.len() < 2 { json!(format!("{}{}", path, c)) } else { Value::Null })
            },
            |s| Ok(s.as_str().map_or(false, |p| p.len() == 2)),
        );
        let nfa = Explorer::new(&tree, "lr".chars()).explore(&json!("")).unwrap();
        let labels: Vec<&str> = nfa.labels().iter().map(String::as_str).collect();
        assert_eq!(
            labels,
            vec!["\"\"", "\"l\"", "\"r\"", "\"ll\"", "\"lr\"", "\"rl\"", "\"rr\""]
        );
        assert_eq!(nfa.accept_states().len(), 4);
        assert!(nfa.is_start(0));
    }

    #[test]
    fn structurally_equal_values_share_a_state() {
        let flip = Machine::new(
            |s, _| {
                let x = s["x"].as_i64().unwrap_or(0);
                // Alternate field order on purpose.
                Ok(if x == 0 { json!({"y": 1, "x": 1}) } else { json!({"x": 0, "y": 1}) })
            },
            |_| Ok(true),
        );
        let nfa = Explorer::new(&flip, "a".chars()).explore(&json!({"x": 0, "y": 1})).unwrap();
        assert_eq!(nfa.len(), 2);
        assert_eq!(nfa.label(1), Some("{\"x\":1,\"y\":1}"));
        assert!(nfa.targets(1, 0).unwrap().contains(&0));
    }

    #[test]
    fn arrays_fan_out_and_start_several_states() {
        let fan = Machine::new(
            |s, _| {
                let n = s.as_i64().unwrap_or(0);
                Ok(if n == 0 { json!([1, 2, null]) } else { Value::Null })
            },
            |s| Ok(s.as_i64() == Some(2)),
        );
        let nfa = explore(&fan, &json!([0, 5]), "a".chars(), Limits::default()).unwrap();
        assert_eq!(nfa.labels(), &["0", "5", "1", "2"]);
        assert_eq!(nfa.start_states().iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(nfa.targets(0, 0).unwrap().len(), 2);
        assert!(nfa.accepts("a"));
    }

    #[test]
    fn nested_arrays_are_rejected() {
        let bad = Machine::new(|_, _| Ok(json!([[1, 2]])), |_| Ok(false));
        let err = Explorer::new(&bad, "a".chars()).explore(&json!(0)).unwrap_err();
        assert!(matches!(err, Error::InvalidStateValue { .. }));

        let err = Explorer::new(&bad, "a".chars()).explore(&json!([[0]])).unwrap_err();
        assert!(matches!(err, Error::InvalidStateValue { .. }));
    }

    #[test]
    fn state_limit_stops_runaway_machines() {
        let endless = Machine::new(
            |s, _| Ok(json!(s.as_i64().unwrap_or(0) + 1)),
            |_| Ok(false),
        );
        let err = Explorer::new(&endless, "a".chars())
            .with_limits(Limits::new(100))
            .explore(&json!(0))
            .unwrap_err();
        assert!(matches!(err, Error::StateLimitExceeded { limit: 100 }));

        let nfa = Explorer::new(&counter(99), "a".chars())
            .with_limits(Limits::new(100))
            .explore(&json!(0))
            .unwrap();
        assert_eq!(nfa.len(), 100);
    }

    #[test]
    fn callable_failures_name_the_state() {
        let err = Explorer::new(&counter(3), "a".chars()).explore(&json!("x")).unwrap_err();
        match err {
            Error::Callable { callable, state, symbol, source } => {
                assert_eq!(callable, "transition");
                assert_eq!(state, "\"x\"");
                assert_eq!(symbol, Some('a'));
                assert_eq!(source.to_string(), "not a number");
            }
            other => panic!("unexpected error {:?}", other),
        }

        let picky = Machine::new(|_, _| Ok(Value::Null), |_| Err("no opinion".into()));
        let err = Explorer::new(&picky, "a".chars()).explore(&json!(1)).unwrap_err();
        assert!(matches!(err, Error::Callable { callable: "accept", symbol: None, .. }));
    }

    #[test]
    fn epsilon_called_once_per_state() {
        let calls: Rc<RefCell<BTreeMap<String, usize>>> = Rc::default();
        let seen = Rc::clone(&calls);
        let machine = Machine::new(
            |s, _| Ok(json!((s.as_i64().unwrap_or(0) + 1) % 3)),
            |s| Ok(s.as_i64() == Some(2)),
        )
        .with_epsilon(move |s| {
            *seen.borrow_mut().entry(s.to_string()).or_default() += 1;
            Ok(if s.as_i64() == Some(0) { json!(2) } else { Value::Null })
        });
        let nfa = Explorer::new(&machine, "a".chars()).explore(&json!(0)).unwrap();
        assert_eq!(nfa.len(), 3);
        assert!(nfa.epsilon_targets(0).unwrap().contains(&2));
        assert!(calls.borrow().values().all(|&n| n == 1));
        assert_eq!(calls.borrow().len(), 3);
        assert!(nfa.accepts(""));
    }

    #[test]
    fn exploration_is_deterministic() {
        let build = || Explorer::new(&counter(5), "ab".chars()).explore(&json!(0)).unwrap();
        let (a, b) = (build(), build());
        assert_eq!(a.labels(), b.labels());
        assert_eq!(a.edges().collect::<Vec<_>>(), b.edges().collect::<Vec<_>>());
        assert_eq!(a.start_states(), b.start_states());
        assert_eq!(a.accept_states(), b.accept_states());
    }

    #[test]
    fn null_start_gives_empty_automaton() {
        let nfa = Explorer::new(&counter(1), "a".chars()).explore(&Value::Null).unwrap();
        assert!(nfa.is_empty());
    }
}
