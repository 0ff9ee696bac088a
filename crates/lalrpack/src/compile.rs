//! The pipeline from a grammar to the packed parse tables.

use crate::{
    automaton::Automaton,
    compress::{self, CompressOptions, CompressionError},
    grammar::{Grammar, ProductionID},
    table::{self, ActionTable, Conflict, ConflictPolicy},
    util::display_fn,
};
use lalrpack_runtime::ParseTables;
use std::fmt;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CompileError {
    #[error("{} unresolved conflict(s) in the grammar", .conflicts.len())]
    Conflicts { conflicts: Vec<Conflict> },

    #[error("failed to compress the action table")]
    Compression(
        #[from]
        #[source]
        CompressionError,
    ),
}

#[derive(Debug, Clone)]
pub struct Config {
    policy: ConflictPolicy,
    ignore_conflicts: bool,
    compress: CompressOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub const fn new() -> Self {
        Self {
            policy: ConflictPolicy::Report,
            ignore_conflicts: false,
            compress: CompressOptions {
                default_reductions: true,
                refine: true,
            },
        }
    }

    /// Resolve the shift/reduce conflicts that precedences cannot decide as shifts.
    pub fn prefer_shift(&mut self) -> &mut Self {
        self.policy = ConflictPolicy::PreferShift;
        self
    }

    /// Emit the best-effort tables even if unresolved conflicts remain.
    ///
    /// The conflicts are still recorded in the diagnostics.
    pub fn ignore_conflicts(&mut self) -> &mut Self {
        self.ignore_conflicts = true;
        self
    }

    /// Keep every reduction as an explicit entry of the packed tables.
    pub fn without_default_reductions(&mut self) -> &mut Self {
        self.compress.default_reductions = false;
        self
    }

    /// Pack the tables with a single group per state.
    pub fn without_refinement(&mut self) -> &mut Self {
        self.compress.refine = false;
        self
    }

    #[tracing::instrument(skip_all)]
    pub fn compile(&self, g: &Grammar) -> Result<Output, CompileError> {
        let automaton = Automaton::compute(g);

        let (mut table, conflicts) = table::build(g, &automaton, self.policy);
        if !self.ignore_conflicts && conflicts.iter().any(|c| c.is_unresolved()) {
            let conflicts = conflicts.into_iter().filter(|c| c.is_unresolved()).collect();
            return Err(CompileError::Conflicts { conflicts });
        }

        let tables = compress::compress(g, &mut table, self.compress)?;
        tracing::debug!(
            "{} states, {} packed entries, {} offsets",
            tables.state_count(),
            tables.actions.len(),
            tables.offsets.len()
        );

        let unreducible = table::unreducible_productions(g, &table);
        for p in &unreducible {
            tracing::warn!(
                "production `{}' is never reduced",
                g.production(*p).display(g)
            );
        }

        Ok(Output {
            automaton,
            table,
            tables,
            diagnostics: Diagnostics {
                conflicts,
                unreducible,
            },
        })
    }
}

/// Compile the grammar with the default configuration.
pub fn compile(g: &Grammar) -> Result<Output, CompileError> {
    Config::new().compile(g)
}

#[derive(Debug)]
pub struct Output {
    pub automaton: Automaton,
    pub table: ActionTable,
    pub tables: ParseTables,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    /// The conflicts that precedences did not decide, in state order.
    pub conflicts: Vec<Conflict>,
    /// The productions that no action reduces, in declaration order.
    pub unreducible: Vec<ProductionID>,
}

impl Diagnostics {
    pub fn unresolved(&self) -> impl Iterator<Item = &Conflict> + '_ {
        self.conflicts.iter().filter(|c| c.is_unresolved())
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty() && self.unreducible.is_empty()
    }

    pub fn display<'g>(&'g self, g: &'g Grammar) -> impl fmt::Display + 'g {
        display_fn(move |f| {
            for conflict in &self.conflicts {
                write!(f, "{}", conflict.display(g))?;
            }
            for p in &self.unreducible {
                writeln!(f, "unreducible production: {}", g.production(*p).display(g))?;
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dangling_else() -> Grammar {
        Grammar::define(|g| {
            g.literal("IF", "if")?;
            g.literal("ELSE", "else")?;
            g.terminal("EXPR")?;
            g.terminal("OTHER")?;
            g.rule("S", ["IF", "EXPR", "S"])?;
            g.rule("S", ["IF", "EXPR", "S", "ELSE", "S"])?;
            g.rule("S", ["OTHER"])?;
            Ok(())
        })
        .unwrap()
    }

    #[test]
    fn conflicts_are_fatal_by_default() {
        crate::util::init_tracing();
        let g = dangling_else();
        match compile(&g) {
            Err(CompileError::Conflicts { conflicts }) => assert_eq!(conflicts.len(), 1),
            other => panic!("unexpected result: {:?}", other.map(|o| o.diagnostics)),
        }
    }

    #[test]
    fn ignored_conflicts_stay_in_diagnostics() {
        crate::util::init_tracing();
        let g = dangling_else();
        let output = Config::new().ignore_conflicts().compile(&g).unwrap();
        assert_eq!(output.diagnostics.unresolved().count(), 1);
        assert!(!output.diagnostics.is_clean());
        eprintln!("{}", output.diagnostics.display(&g));
    }

    #[test]
    fn reductions_settled_by_precedence_compile() {
        crate::util::init_tracing();
        let g = Grammar::define(|g| {
            g.terminal("X")?;
            g.terminal("LOW")?;
            g.terminal("HIGH")?;
            g.precedence(crate::Assoc::Nonassoc, ["LOW"])?;
            g.precedence(crate::Assoc::Nonassoc, ["HIGH"])?;
            g.rule("S", ["A"])?;
            g.rule("S", ["B"])?;
            g.rule("S", ["C"])?;
            for (left, prec) in [("A", "LOW"), ("B", "LOW"), ("C", "HIGH")] {
                g.rule_with(
                    left,
                    ["X"],
                    crate::RuleOptions {
                        precedence: Some(prec),
                        ..Default::default()
                    },
                )?;
            }
            Ok(())
        })
        .unwrap();
        let output = compile(&g).unwrap();
        assert!(output.diagnostics.conflicts.is_empty());
        assert_eq!(output.diagnostics.unreducible.len(), 2);
    }

    #[test]
    fn prefer_shift_resolves() {
        crate::util::init_tracing();
        let g = dangling_else();
        let output = Config::new().prefer_shift().compile(&g).unwrap();
        assert_eq!(output.diagnostics.conflicts.len(), 1);
        assert_eq!(output.diagnostics.unresolved().count(), 0);
        assert!(output.diagnostics.unreducible.is_empty());
    }
}
