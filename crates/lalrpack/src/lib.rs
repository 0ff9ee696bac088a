//! LALR(1) parser tables generator.

pub mod automaton;
pub mod compile;
pub mod compress;
pub mod first_sets;
pub mod grammar;
pub mod item;
pub mod lookahead;
pub mod table;
pub mod types;
pub mod util;

pub use crate::{
    compile::{compile, CompileError, Config, Diagnostics, Output},
    grammar::{Assoc, Grammar, GrammarDef, GrammarDefError, RhsItemDef, RuleOptions},
};
pub use lalrpack_runtime as runtime;
