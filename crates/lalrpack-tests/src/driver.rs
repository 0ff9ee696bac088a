//! A minimal table-driven parser for checking the generated tables.

use lalrpack::Grammar;
use lalrpack_runtime::{ParseAction, ParseTable};
use std::fmt;

/// The derivation tree built by `parse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tree {
    Leaf(u16),
    Node { production: u16, children: Vec<Tree> },
}

impl Tree {
    /// Render the tree as an S-expression with the symbol names of `g`.
    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        lalrpack::util::display_fn(move |f| self.fmt_with(g, f))
    }

    fn fmt_with(&self, g: &Grammar, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leaf(t) => {
                let id = lalrpack::grammar::TerminalID::from_raw(*t);
                f.write_str(g.terminal(id).name())
            }
            Self::Node {
                production,
                children,
            } => {
                let id = lalrpack::grammar::ProductionID::from_raw(*production);
                let left = g.production(id).left();
                write!(f, "({}", g.nonterminal(left).name())?;
                for child in children {
                    f.write_str(" ")?;
                    child.fmt_with(g, f)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No action for the lookahead symbol; `None` is the end of input.
    Unexpected { state: u32, lookahead: Option<u16> },
    /// The tables asked for something the stacks cannot satisfy.
    Corrupted,
}

/// Run the shift-reduce automaton over `tokens` and build the tree of the
/// accept production.
pub fn parse<T>(table: T, tokens: &[u16]) -> Result<Tree, ParseError>
where
    T: ParseTable<State = u32, Symbol = u16, Reduce = u16>,
{
    let mut states = vec![table.initial_state()];
    let mut values: Vec<Tree> = vec![];
    let mut input = tokens.iter().copied().peekable();

    loop {
        let current = *states.last().ok_or(ParseError::Corrupted)?;
        let lookahead = input.peek().copied();
        match table.action(current, lookahead) {
            ParseAction::Shift(next) => {
                let token = lookahead.ok_or(ParseError::Corrupted)?;
                input.next();
                states.push(next);
                values.push(Tree::Leaf(token));
            }
            ParseAction::Reduce(production, lhs, len) => {
                let children = pop(&mut states, &mut values, len)?;
                let top = *states.last().ok_or(ParseError::Corrupted)?;
                let next = table.goto(top, lhs).ok_or(ParseError::Corrupted)?;
                states.push(next);
                values.push(Tree::Node {
                    production,
                    children,
                });
            }
            ParseAction::Accept(production, len) => {
                let children = pop(&mut states, &mut values, len)?;
                return Ok(Tree::Node {
                    production,
                    children,
                });
            }
            ParseAction::Error(..) => {
                return Err(ParseError::Unexpected {
                    state: current,
                    lookahead,
                })
            }
            _ => return Err(ParseError::Corrupted),
        }
    }
}

fn pop(states: &mut Vec<u32>, values: &mut Vec<Tree>, len: usize) -> Result<Vec<Tree>, ParseError> {
    if len >= states.len() || len > values.len() {
        return Err(ParseError::Corrupted);
    }
    states.truncate(states.len() - len);
    Ok(values.split_off(values.len() - len))
}

/// Translate terminal names into the token ids of `g`.
pub fn tokens(g: &Grammar, names: &[&str]) -> Vec<u16> {
    names
        .iter()
        .map(|name| match g.terminal_id(name) {
            Some(id) => id.into_raw(),
            None => panic!("unknown terminal `{}'", name),
        })
        .collect()
}
