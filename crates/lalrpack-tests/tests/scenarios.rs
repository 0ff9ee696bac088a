use lalrpack::{
    grammar::{ProductionID, SymbolID},
    table::{Action, ConflictKind, Resolution},
    CompileError, Config, Grammar,
};
use lalrpack_tests::{
    driver::{parse, tokens, ParseError},
    grammars,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn parse_names(g: &Grammar, config: &Config, names: &[&str]) -> String {
    let output = config.compile(g).unwrap();
    let tree = parse(&output.tables, &tokens(g, names)).unwrap();
    let s = tree.display(g).to_string();
    s
}

#[test]
fn arithmetic_grouping() {
    init_tracing();
    let g = Grammar::define(grammars::arithmetic).unwrap();
    assert_eq!(
        parse_names(&g, &Config::new(), &["NUM", "PLUS", "NUM", "STAR", "NUM"]),
        "($goal (EXPR (EXPR (TERM (FACTOR NUM))) PLUS (TERM (TERM (FACTOR NUM)) STAR (FACTOR NUM))))"
    );
    assert_eq!(
        parse_names(
            &g,
            &Config::new(),
            &["LPAREN", "NUM", "PLUS", "NUM", "RPAREN", "STAR", "NUM"]
        ),
        "($goal (EXPR (TERM (TERM (FACTOR LPAREN (EXPR (EXPR (TERM (FACTOR NUM))) PLUS (TERM (FACTOR NUM))) RPAREN)) STAR (FACTOR NUM))))"
    );
}

#[test]
fn precedence_grouping() {
    init_tracing();
    let g = Grammar::define(grammars::arithmetic_prec).unwrap();
    let output = Config::new().compile(&g).unwrap();
    assert!(output.diagnostics.conflicts.is_empty());
    assert!(output.diagnostics.unreducible.is_empty());

    for config in [Config::new(), Config::new().without_default_reductions().clone()] {
        let check = |names: &[&str], expected: &str| {
            assert_eq!(parse_names(&g, &config, names), expected);
        };
        check(
            &["NUM", "PLUS", "NUM", "STAR", "NUM"],
            "($goal (EXPR (EXPR NUM) PLUS (EXPR (EXPR NUM) STAR (EXPR NUM))))",
        );
        check(
            &["NUM", "STAR", "NUM", "PLUS", "NUM"],
            "($goal (EXPR (EXPR (EXPR NUM) STAR (EXPR NUM)) PLUS (EXPR NUM)))",
        );
        check(
            &["NUM", "MINUS", "NUM", "MINUS", "NUM"],
            "($goal (EXPR (EXPR (EXPR NUM) MINUS (EXPR NUM)) MINUS (EXPR NUM)))",
        );
        check(
            &["NUM", "CARET", "NUM", "CARET", "NUM"],
            "($goal (EXPR (EXPR NUM) CARET (EXPR (EXPR NUM) CARET (EXPR NUM))))",
        );
        check(
            &["MINUS", "NUM", "CARET", "NUM"],
            "($goal (EXPR MINUS (EXPR (EXPR NUM) CARET (EXPR NUM))))",
        );
        check(
            &["MINUS", "NUM", "STAR", "NUM"],
            "($goal (EXPR (EXPR MINUS (EXPR NUM)) STAR (EXPR NUM)))",
        );
    }
}

#[test]
fn dangling_else_is_reported() {
    init_tracing();
    let g = Grammar::define(grammars::dangling_else).unwrap();
    let else_ = g.terminal_id("ELSE").unwrap();

    let conflicts = match Config::new().compile(&g) {
        Err(CompileError::Conflicts { conflicts }) => conflicts,
        other => panic!("expected conflicts: {:?}", other.map(|o| o.diagnostics)),
    };
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].lookahead, else_);
    assert_eq!(conflicts[0].kind, ConflictKind::ShiftReduce);
    assert!(matches!(conflicts[0].actions[..], [Action::Shift(..), Action::Reduce(..)]));

    // the best-effort tables keep the shift.
    let output = Config::new().ignore_conflicts().compile(&g).unwrap();
    assert_eq!(output.diagnostics.unresolved().count(), 1);
    let state = output.diagnostics.conflicts[0].state;
    assert!(matches!(
        output.table.row(state).get(SymbolID::T(else_)),
        Some(Action::Shift(..))
    ));
}

#[test]
fn dangling_else_prefer_shift() {
    init_tracing();
    let g = Grammar::define(grammars::dangling_else).unwrap();
    let mut config = Config::new();
    config.prefer_shift();

    let output = config.compile(&g).unwrap();
    assert_eq!(output.diagnostics.conflicts.len(), 1);
    assert_eq!(
        output.diagnostics.conflicts[0].resolution,
        Resolution::PreferShift
    );
    assert_eq!(output.diagnostics.unresolved().count(), 0);

    // `else` belongs to the innermost `if`.
    assert_eq!(
        parse_names(
            &g,
            &config,
            &["IF", "COND", "IF", "COND", "OTHER", "ELSE", "OTHER"]
        ),
        "($goal (STMT IF COND (STMT IF COND (STMT OTHER) ELSE (STMT OTHER))))"
    );
}

#[test]
fn unreducible_production() {
    init_tracing();
    let g = Grammar::define(grammars::unreducible).unwrap();
    let output = Config::new().compile(&g).unwrap();
    assert!(output.diagnostics.conflicts.is_empty());

    let b = g.nonterminal_id("B").unwrap();
    let unreducible: Vec<_> = output
        .diagnostics
        .unreducible
        .iter()
        .map(|p| g.production(*p).left())
        .collect();
    assert_eq!(unreducible, [b]);
    // `B = x` always loses against `A = x`, the higher one.
    assert_eq!(output.diagnostics.unreducible, [ProductionID::from_raw(3)]);
}

#[test]
fn lalr_merge_conflicts() {
    init_tracing();
    let g = Grammar::define(grammars::lr1_not_lalr).unwrap();
    let conflicts = match Config::new().prefer_shift().compile(&g) {
        Err(CompileError::Conflicts { conflicts }) => conflicts,
        other => panic!("expected conflicts: {:?}", other.map(|o| o.diagnostics)),
    };
    // the state merged from `A E` and `B E` reduces both `X` and `Y` on C and D.
    assert_eq!(conflicts.len(), 2);
    assert!(conflicts.iter().all(|c| c.kind == ConflictKind::ReduceReduce));
    assert_eq!(conflicts[0].state, conflicts[1].state);
}

#[test]
fn lalr_but_not_slr() {
    let g = Grammar::define(grammars::lalr_not_slr).unwrap();
    let output = lalrpack::compile(&g).unwrap();
    assert!(output.diagnostics.is_clean());
    assert_eq!(
        parse_names(&g, &Config::new(), &["STAR", "ID", "EQUAL", "ID"]),
        "($goal (S (L STAR (R (L ID))) EQUAL (R (L ID))))"
    );
}

#[test]
fn json_documents() {
    let g = Grammar::define(grammars::json).unwrap();
    let output = lalrpack::compile(&g).unwrap();
    assert!(output.diagnostics.is_clean());

    let input = tokens(
        &g,
        &[
            "LBRACE", "STRING", "COLON", "LBRACKET", "NUMBER", "COMMA", "TRUE", "RBRACKET",
            "COMMA", "STRING", "COLON", "NULL", "RBRACE",
        ],
    );
    assert!(parse(&output.tables, &input).is_ok());

    let input = tokens(&g, &["LBRACE", "STRING", "COMMA", "RBRACE"]);
    assert!(matches!(
        parse(&output.tables, &input),
        Err(ParseError::Unexpected { .. })
    ));
}

#[test]
fn error_symbol_has_gotos() {
    let g = Grammar::define(grammars::error_recovery).unwrap();
    assert!(!g.is_augmented());
    let output = lalrpack::compile(&g).unwrap();
    assert!(output.diagnostics.is_clean());

    let error = g.error_symbol().into_raw();
    assert_eq!(output.tables.error_symbol, error);
    assert!(output.tables.lookup(0, error) > 0);

    assert_eq!(
        parse_names(&g, &Config::new(), &["EXPR", "SEMI", "EXPR", "SEMI"]),
        "(PROGRAM (STMTS (STMTS (STMT EXPR SEMI)) (STMT EXPR SEMI)))"
    );
    let expr = g.terminal_id("EXPR").unwrap().into_raw();
    assert!(matches!(
        parse(&output.tables, &[expr, expr]),
        Err(ParseError::Unexpected { lookahead: Some(t), .. }) if t == expr
    ));
}

#[test]
fn nullable_rules() {
    let g = Grammar::define(grammars::with_nullable).unwrap();
    let config = Config::new();
    assert_eq!(parse_names(&g, &config, &["C"]), "(S (X) (Y) C)");
    assert_eq!(
        parse_names(&g, &config, &["A", "B", "B", "C"]),
        "(S (X A) (Y B (Y B (Y))) C)"
    );
}

#[test]
fn conflicts_are_never_silent() {
    init_tracing();
    let g = Grammar::define(grammars::min_caml).unwrap();
    let output = Config::new().ignore_conflicts().compile(&g).unwrap();
    let unresolved = output.diagnostics.unresolved().count();
    match Config::new().compile(&g) {
        Ok(output) => {
            assert_eq!(unresolved, 0);
            assert_eq!(output.diagnostics.unresolved().count(), 0);
        }
        Err(CompileError::Conflicts { conflicts }) => {
            assert!(unresolved > 0);
            assert_eq!(conflicts.len(), unresolved);
        }
        Err(err) => panic!("unexpected error: {}", err),
    }
}
