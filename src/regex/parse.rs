//! Recursive-descent parser for the pattern language.
//!
//! Positions in errors are character offsets into the pattern.

use std::collections::BTreeSet;

use super::Ast;
use crate::error::{Error, Result};

pub(super) fn parse(pattern: &str) -> Result<Ast> {
    let mut parser = Parser {
        chars: pattern.chars().collect(),
        pos: 0,
    };
    let ast = parser.alternation()?;
    match parser.peek() {
        None => Ok(ast),
        Some(')') => Err(Error::pattern(parser.pos, "unmatched ')'")),
        Some(c) => Err(Error::pattern(parser.pos, format!("unexpected {:?}", c))),
    }
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn alternation(&mut self) -> Result<Ast> {
        let mut options = vec![self.sequence()?];
        while self.eat('|') {
            options.push(self.sequence()?);
        }
        Ok(if options.len() == 1 {
            options.swap_remove(0)
        } else {
            Ast::Alternate(options)
        })
    }

    fn sequence(&mut self) -> Result<Ast> {
        let mut parts = Vec::new();
        while let Some(c) = self.peek() {
            if c == '|' || c == ')' {
                break;
            }
            parts.push(self.quantified()?);
        }
        Ok(if parts.len() == 1 {
            parts.swap_remove(0)
        } else {
            Ast::Concat(parts)
        })
    }

    fn quantified(&mut self) -> Result<Ast> {
        let mut ast = self.primary()?;
        loop {
            let (min, max) = match self.peek() {
                Some('{') => {
                    self.pos += 1;
                    self.bounds()?
                }
                Some('*') => {
                    self.pos += 1;
                    (0, None)
                }
                Some('+') => {
                    self.pos += 1;
                    (1, None)
                }
                Some('?') => {
                    self.pos += 1;
                    (0, Some(1))
                }
                _ => return Ok(ast),
            };
            ast = Ast::Quantifier {
                child: Box::new(ast),
                min,
                max,
            };
        }
    }

    /// `m}`, `m,}` or `m,n}` after an opening brace.
    fn bounds(&mut self) -> Result<(u32, Option<u32>)> {
        let open = self.pos - 1;
        let min = self.number()?;
        let max = if self.eat(',') {
            match self.peek() {
                Some('}') => None,
                _ => Some(self.number()?),
            }
        } else {
            Some(min)
        };
        if !self.eat('}') {
            return Err(Error::pattern(open, "unterminated repetition"));
        }
        if let Some(max) = max {
            if max < min {
                return Err(Error::pattern(
                    open,
                    format!("repetition bound {} is less than {}", max, min),
                ));
            }
        }
        Ok((min, max))
    }

    fn number(&mut self) -> Result<u32> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(Error::pattern(start, "expected repetition count"));
        }
        let digits: String = self.chars[start..self.pos].iter().collect();
        digits
            .parse()
            .map_err(|_| Error::pattern(start, "repetition count too large"))
    }

    fn primary(&mut self) -> Result<Ast> {
        let at = self.pos;
        match self.bump() {
            None => Err(Error::pattern(at, "unexpected end of pattern")),
            Some('(') => {
                let inner = self.alternation()?;
                if !self.eat(')') {
                    return Err(Error::pattern(at, "unclosed group"));
                }
                Ok(inner)
            }
            Some('[') => self.class(at),
            Some('.') => Ok(Ast::any()),
            Some('\\') => Ok(Ast::literal(self.escaped()?)),
            Some(c @ ('*' | '+' | '?' | '{')) => {
                Err(Error::pattern(at, format!("nothing to repeat before {:?}", c)))
            }
            Some(c) => Ok(Ast::literal(c)),
        }
    }

    fn escaped(&mut self) -> Result<char> {
        let at = self.pos;
        self.bump().ok_or_else(|| Error::pattern(at, "trailing backslash"))
    }

    /// Body of a bracket class, after `[`.
    fn class(&mut self, open: usize) -> Result<Ast> {
        let negated = self.eat('^');
        let mut symbols = BTreeSet::new();
        loop {
            let at = self.pos;
            let lo = match self.bump() {
                None => return Err(Error::pattern(open, "unclosed character class")),
                Some(']') => break,
                Some('\\') => self.escaped()?,
                Some(c) => c,
            };
            let ranged = self.peek() == Some('-')
                && !matches!(self.chars.get(self.pos + 1), None | Some(']'));
            if !ranged {
                symbols.insert(lo);
                continue;
            }
            self.pos += 1;
            let hi = match self.bump() {
                Some('\\') => self.escaped()?,
                Some(c) => c,
                None => return Err(Error::pattern(open, "unclosed character class")),
            };
            if hi < lo {
                return Err(Error::pattern(at, format!("invalid range {}-{}", lo, hi)));
            }
            symbols.extend(lo..=hi);
        }
        Ok(Ast::Charset { symbols, negated })
    }
}
