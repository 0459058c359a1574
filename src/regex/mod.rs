//! Regular expressions compiled to automata by Thompson construction.
//!
//! Supported syntax: literals, `.`, bracket classes with ranges and `^` negation,
//! groups, `|`, and the quantifiers `*`, `+`, `?`, `{m}`, `{m,}` and `{m,n}`. A backslash
//! makes the next character literal, inside classes too.
//!
//! Classes are resolved against the alphabet handed to `compile`: a negated class matches
//! every alphabet symbol outside it, so `.` (and `[^]`) is any symbol and `[]` is none.

mod parse;

use std::collections::BTreeSet;

use log::debug;
use serde::Serialize;

use crate::automaton::Automaton;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::nfa::{Epsilon, Nfa, StateId, Symbol};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Ast {
    Charset { symbols: BTreeSet<Symbol>, negated: bool },
    /// Empty concatenation matches the empty string.
    Concat(Vec<Ast>),
    Alternate(Vec<Ast>),
    /// `max == None` is unbounded.
    Quantifier { child: Box<Ast>, min: u32, max: Option<u32> },
}

impl Ast {
    pub fn parse(pattern: &str) -> Result<Ast> {
        parse::parse(pattern)
    }

    pub fn literal(symbol: Symbol) -> Ast {
        Ast::Charset {
            symbols: BTreeSet::from([symbol]),
            negated: false,
        }
    }

    /// Matches any one symbol of the alphabet.
    pub fn any() -> Ast {
        Ast::Charset {
            symbols: BTreeSet::new(),
            negated: true,
        }
    }
}

/// Compiles `ast` over `symbols`, eliminating the construction's epsilon edges.
///
/// Labels are the ids of the construction's states, which the returned automaton keeps.
/// Repetition is unrolled, so `limits` caps the construction's state count.
pub fn compile<I>(ast: &Ast, symbols: I, limits: &Limits) -> Result<Nfa>
    where I: IntoIterator<Item = Symbol>
{
    let mut thompson = Thompson {
        nfa: Nfa::new(symbols),
        limits: *limits,
    };
    let (start, accept) = thompson.fragment(ast)?;
    let mut nfa = thompson.nfa;
    nfa.add_start(start)?;
    nfa.add_accept(accept)?;
    debug!(
        "thompson construction: {} states, {} epsilon edges",
        nfa.len(),
        nfa.epsilon_edges().count()
    );
    Ok(nfa.eliminate_epsilons())
}

struct Thompson {
    nfa: Nfa<Epsilon>,
    limits: Limits,
}

impl Thompson {
    fn state(&mut self) -> Result<StateId> {
        let id = self.nfa.len();
        if !self.limits.admits(id) {
            return Err(Error::StateLimitExceeded {
                limit: self.limits.max_states,
            });
        }
        Ok(self.nfa.add_state(id.to_string()))
    }

    fn link(&mut self, from: StateId, to: StateId) -> Result<()> {
        self.nfa.add_epsilon_transition(from, to)?;
        Ok(())
    }

    /// Builds `ast` as a fragment with one entry and one exit state.
    fn fragment(&mut self, ast: &Ast) -> Result<(StateId, StateId)> {
        match ast {
            Ast::Charset { symbols, negated } => {
                let (start, accept) = (self.state()?, self.state()?);
                let matching: Vec<usize> = self
                    .nfa
                    .symbols()
                    .iter()
                    .enumerate()
                    .filter(|&(_, s)| symbols.contains(s) != *negated)
                    .map(|(i, _)| i)
                    .collect();
                for symbol in matching {
                    self.nfa.add_transition(start, accept, symbol)?;
                }
                Ok((start, accept))
            }
            Ast::Concat(parts) => {
                let start = self.state()?;
                let mut end = start;
                for part in parts {
                    let (s, a) = self.fragment(part)?;
                    self.link(end, s)?;
                    end = a;
                }
                Ok((start, end))
            }
            Ast::Alternate(options) => {
                let (start, accept) = (self.state()?, self.state()?);
                for option in options {
                    let (s, a) = self.fragment(option)?;
                    self.link(start, s)?;
                    self.link(a, accept)?;
                }
                Ok((start, accept))
            }
            Ast::Quantifier { child, min, max } => {
                let start = self.state()?;
                let mut end = start;
                for _ in 0..*min {
                    let (s, a) = self.fragment(child)?;
                    self.link(end, s)?;
                    end = a;
                }
                let exit = self.state()?;
                match *max {
                    Some(max) => {
                        // Each optional copy may be skipped straight to the exit.
                        for _ in *min..max {
                            let (s, a) = self.fragment(child)?;
                            self.link(end, s)?;
                            self.link(end, exit)?;
                            end = a;
                        }
                    }
                    None => {
                        let (s, a) = self.fragment(child)?;
                        self.link(end, s)?;
                        self.link(a, s)?;
                        self.link(a, exit)?;
                    }
                }
                self.link(end, exit)?;
                Ok((start, exit))
            }
        }
    }
}

/// A parsed and compiled pattern.
#[derive(Clone, Debug)]
pub struct Regex {
    pattern: String,
    ast: Ast,
    nfa: Nfa,
}

impl Regex {
    /// Compiles under the default `Limits`.
    pub fn new<I>(pattern: &str, symbols: I) -> Result<Regex>
        where I: IntoIterator<Item = Symbol>
    {
        Regex::with_limits(pattern, symbols, &Limits::default())
    }

    pub fn with_limits<I>(pattern: &str, symbols: I, limits: &Limits) -> Result<Regex>
        where I: IntoIterator<Item = Symbol>
    {
        let ast = Ast::parse(pattern)?;
        let nfa = compile(&ast, symbols, limits)?;
        Ok(Regex {
            pattern: pattern.to_string(),
            ast,
            nfa,
        })
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub fn nfa(&self) -> &Nfa {
        &self.nfa
    }

    pub fn into_nfa(self) -> Nfa {
        self.nfa
    }

    /// Whole-word match. Characters outside the alphabet never match.
    pub fn is_match(&self, word: &str) -> bool {
        self.nfa.accepts(word)
    }
}
