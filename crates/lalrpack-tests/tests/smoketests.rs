use lalrpack::{
    automaton::StateID,
    grammar::SymbolID,
    item::Kernel,
    runtime::ParseTables,
    table::Action,
    types::Set,
    Config, Grammar, Output,
};
use lalrpack_tests::grammars;

/// Every (state, symbol) lookup of the packed tables agrees with the
/// uncompressed action table.
fn check_lookups(g: &Grammar, output: &Output) {
    let tables = &output.tables;
    for (i, row) in output.table.rows().iter().enumerate() {
        let state = StateID::from_raw(i as u32);
        for symbol in g.symbols().iter().map(|s| s.id()) {
            let expected = match (row.get(symbol), symbol, row.default_reduce) {
                (Some(action), ..) => action.code(g),
                (None, SymbolID::T(..), Some(p)) => Action::Reduce(p).code(g),
                (None, ..) => 0,
            };
            assert_eq!(
                tables.lookup(state.into_raw(), symbol.index() as u16),
                expected,
                "{:?} on `{}'",
                state,
                g.symbol(symbol).name()
            );
        }
    }
}

fn check_kernels(output: &Output) {
    let kernels: Set<&Kernel> = output
        .automaton
        .states()
        .iter()
        .map(|s| s.item_set().kernel())
        .collect();
    assert_eq!(kernels.len(), output.automaton.states().len());
}

fn check_roundtrip(tables: &ParseTables) {
    let bytes = tables.to_bytes();
    assert_eq!(bytes.len(), tables.serialized_size());
    let decoded = ParseTables::from_bytes(&bytes).unwrap();
    assert_eq!(&decoded, tables);
}

macro_rules! define_tests {
    ($($name:ident),*$(,)?) => {$(
        #[test]
        fn $name() {
            let grammar = Grammar::define(grammars::$name).unwrap();
            eprintln!("grammar:\n{}", grammar);

            let mut outputs = vec![];
            for config in [
                Config::new().ignore_conflicts().clone(),
                Config::new().ignore_conflicts().without_default_reductions().clone(),
                Config::new().ignore_conflicts().without_refinement().clone(),
            ] {
                let output = config.compile(&grammar).unwrap();
                check_kernels(&output);
                check_lookups(&grammar, &output);
                check_roundtrip(&output.tables);
                outputs.push(output);
            }

            let output = &outputs[0];
            eprintln!("automaton:\n---\n{}", output.automaton.display(&grammar));
            eprintln!("diagnostics:\n---\n{}", output.diagnostics.display(&grammar));
            assert_eq!(output.tables.state_count(), output.automaton.states().len());
            assert_eq!(
                output.tables.error_symbol,
                grammar.error_symbol().into_raw()
            );
            // the configurations only change the packing, never the actions.
            for other in &outputs[1..] {
                assert_eq!(
                    other.diagnostics.conflicts.len(),
                    output.diagnostics.conflicts.len()
                );
                assert_eq!(other.table.rows().len(), output.table.rows().len());
            }
        }
    )*};
}

define_tests! {
    arithmetic,
    arithmetic_prec,
    dangling_else,
    with_nullable,
    lalr_not_slr,
    lr1_not_lalr,
    unreducible,
    error_recovery,
    json,
    min_caml,
}
