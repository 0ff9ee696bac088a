//! Grammar definition for integration tests.

use lalrpack::{
    grammar::{Assoc, GrammarDef, GrammarDefError, RuleOptions},
    RhsItemDef,
};

type Result = std::result::Result<(), GrammarDefError>;

const EMPTY: [&str; 0] = [];

/// The unambiguous expression grammar.
pub fn arithmetic(g: &mut GrammarDef) -> Result {
    g.literal("PLUS", "+")?;
    g.literal("STAR", "*")?;
    g.literal("LPAREN", "(")?;
    g.literal("RPAREN", ")")?;
    g.terminal("NUM")?;

    g.rule("EXPR", ["EXPR", "PLUS", "TERM"])?;
    g.rule("EXPR", ["TERM"])?;
    g.rule("TERM", ["TERM", "STAR", "FACTOR"])?;
    g.rule("TERM", ["FACTOR"])?;
    g.rule("FACTOR", ["NUM"])?;
    g.rule("FACTOR", ["LPAREN", "EXPR", "RPAREN"])?;
    Ok(())
}

/// The ambiguous expression grammar disambiguated with precedences.
pub fn arithmetic_prec(g: &mut GrammarDef) -> Result {
    g.literal("PLUS", "+")?;
    g.literal("MINUS", "-")?;
    g.literal("STAR", "*")?;
    g.literal("SLASH", "/")?;
    g.literal("CARET", "^")?;
    g.literal("LPAREN", "(")?;
    g.literal("RPAREN", ")")?;
    g.terminal("NUM")?;
    // only used as the precedence of the unary minus.
    g.terminal("UMINUS")?;

    g.precedence(Assoc::Left, ["PLUS", "MINUS"])?;
    g.precedence(Assoc::Left, ["STAR", "SLASH"])?;
    g.precedence(Assoc::Right, ["UMINUS"])?;
    g.precedence(Assoc::Right, ["CARET"])?;

    g.rule(
        "EXPR",
        [
            RhsItemDef::bound("lhs", "EXPR"),
            "PLUS".into(),
            RhsItemDef::bound("rhs", "EXPR"),
        ],
    )?;
    g.rule("EXPR", ["EXPR", "MINUS", "EXPR"])?;
    g.rule("EXPR", ["EXPR", "STAR", "EXPR"])?;
    g.rule("EXPR", ["EXPR", "SLASH", "EXPR"])?;
    g.rule("EXPR", ["EXPR", "CARET", "EXPR"])?;
    g.rule_with(
        "EXPR",
        ["MINUS", "EXPR"],
        RuleOptions {
            name: Some("negate"),
            precedence: Some("UMINUS"),
        },
    )?;
    g.rule("EXPR", ["LPAREN", "EXPR", "RPAREN"])?;
    g.rule("EXPR", ["NUM"])?;
    Ok(())
}

pub fn dangling_else(g: &mut GrammarDef) -> Result {
    g.literal("IF", "if")?;
    g.literal("ELSE", "else")?;
    g.terminal("COND")?;
    g.terminal("OTHER")?;

    g.rule("STMT", ["IF", "COND", "STMT"])?;
    g.rule("STMT", ["IF", "COND", "STMT", "ELSE", "STMT"])?;
    g.rule("STMT", ["OTHER"])?;
    Ok(())
}

pub fn with_nullable(g: &mut GrammarDef) -> Result {
    g.terminal("A")?;
    g.terminal("B")?;
    g.terminal("C")?;

    g.rule("S", ["X", "Y", "C"])?;
    g.rule("X", ["A"])?;
    g.rule("X", EMPTY)?;
    g.rule("Y", ["B", "Y"])?;
    g.rule("Y", EMPTY)?;
    Ok(())
}

/// LALR(1) but not SLR(1).
pub fn lalr_not_slr(g: &mut GrammarDef) -> Result {
    g.literal("EQUAL", "=")?;
    g.literal("STAR", "*")?;
    g.terminal("ID")?;

    g.rule("S", ["L", "EQUAL", "R"])?;
    g.rule("S", ["R"])?;
    g.rule("L", ["STAR", "R"])?;
    g.rule("L", ["ID"])?;
    g.rule("R", ["L"])?;
    Ok(())
}

/// LR(1) but not LALR(1): merging the states after `A E` and `B E`
/// introduces reduce/reduce conflicts.
pub fn lr1_not_lalr(g: &mut GrammarDef) -> Result {
    g.terminal("A")?;
    g.terminal("B")?;
    g.terminal("C")?;
    g.terminal("D")?;
    g.terminal("E")?;

    g.rule("S", ["A", "X", "C"])?;
    g.rule("S", ["A", "Y", "D"])?;
    g.rule("S", ["B", "Y", "C"])?;
    g.rule("S", ["B", "X", "D"])?;
    g.rule("X", ["E"])?;
    g.rule("Y", ["E"])?;
    Ok(())
}

/// `B = x` loses every reduce/reduce conflict against `A = x`.
pub fn unreducible(g: &mut GrammarDef) -> Result {
    g.terminal("x")?;
    g.terminal("LOW")?;
    g.terminal("HIGH")?;
    g.precedence(Assoc::Nonassoc, ["LOW"])?;
    g.precedence(Assoc::Nonassoc, ["HIGH"])?;

    g.rule("S", ["A"])?;
    g.rule("S", ["B"])?;
    g.rule_with(
        "A",
        ["x"],
        RuleOptions {
            precedence: Some("HIGH"),
            ..Default::default()
        },
    )?;
    g.rule_with(
        "B",
        ["x"],
        RuleOptions {
            precedence: Some("LOW"),
            ..Default::default()
        },
    )?;
    Ok(())
}

/// Statements with an error recovery production.
pub fn error_recovery(g: &mut GrammarDef) -> Result {
    g.literal("SEMI", ";")?;
    g.terminal("EXPR")?;

    g.rule("PROGRAM", ["STMTS"])?;
    g.rule("STMTS", ["STMTS", "STMT"])?;
    g.rule("STMTS", ["STMT"])?;
    g.rule("STMT", ["EXPR", "SEMI"])?;
    g.rule("STMT", ["error", "SEMI"])?;
    Ok(())
}

pub fn json(g: &mut GrammarDef) -> Result {
    g.literal("LBRACE", "{")?;
    g.literal("RBRACE", "}")?;
    g.literal("LBRACKET", "[")?;
    g.literal("RBRACKET", "]")?;
    g.literal("COMMA", ",")?;
    g.literal("COLON", ":")?;
    g.literal("TRUE", "true")?;
    g.literal("FALSE", "false")?;
    g.literal("NULL", "null")?;
    g.terminal("STRING")?;
    g.terminal("NUMBER")?;

    g.start_symbol("VALUE")?;

    for alt in ["OBJECT", "ARRAY", "STRING", "NUMBER", "TRUE", "FALSE", "NULL"] {
        g.rule("VALUE", [alt])?;
    }
    g.rule("OBJECT", ["LBRACE", "RBRACE"])?;
    g.rule("OBJECT", ["LBRACE", "MEMBERS", "RBRACE"])?;
    g.rule("MEMBERS", ["MEMBER"])?;
    g.rule("MEMBERS", ["MEMBERS", "COMMA", "MEMBER"])?;
    g.rule("MEMBER", ["STRING", "COLON", "VALUE"])?;
    g.rule("ARRAY", ["LBRACKET", "RBRACKET"])?;
    g.rule("ARRAY", ["LBRACKET", "ELEMENTS", "RBRACKET"])?;
    g.rule("ELEMENTS", ["VALUE"])?;
    g.rule("ELEMENTS", ["ELEMENTS", "COMMA", "VALUE"])?;
    Ok(())
}

/// The syntax of MinCaml.
pub fn min_caml(g: &mut GrammarDef) -> Result {
    for (name, text) in [
        ("LPAREN", "("),
        ("RPAREN", ")"),
        ("TRUE", "true"),
        ("FALSE", "false"),
        ("NOT", "not"),
        ("PLUS", "+"),
        ("PLUS_DOT", "+."),
        ("MINUS", "-"),
        ("MINUS_DOT", "-."),
        ("STAR_DOT", "*."),
        ("SLASH_DOT", "/."),
        ("EQUAL", "="),
        ("LESS_GREATER", "<>"),
        ("LESS", "<"),
        ("GREATER", ">"),
        ("LESS_EQUAL", "<="),
        ("GREATER_EQUAL", ">="),
        ("LESS_MINUS", "<-"),
        ("COMMA", ","),
        ("SEMICOLON", ";"),
        ("IF", "if"),
        ("THEN", "then"),
        ("ELSE", "else"),
        ("LET", "let"),
        ("REC", "rec"),
        ("IN", "in"),
        ("ARRAY_MAKE", "Array.make"),
        ("DOT", "."),
    ] {
        g.literal(name, text)?;
    }
    g.terminal("INTEGER")?;
    g.terminal("FLOAT")?;
    g.terminal("IDENT")?;

    g.start_symbol("EXP")?;

    g.rule("SIMPLE_EXP", ["LPAREN", "EXP", "RPAREN"])?;
    g.rule("SIMPLE_EXP", ["LPAREN", "RPAREN"])?;
    g.rule("SIMPLE_EXP", ["TRUE"])?;
    g.rule("SIMPLE_EXP", ["FALSE"])?;
    g.rule("SIMPLE_EXP", ["INTEGER"])?;
    g.rule("SIMPLE_EXP", ["FLOAT"])?;
    g.rule("SIMPLE_EXP", ["IDENT"])?;
    g.rule("SIMPLE_EXP", ["SIMPLE_EXP", "DOT", "LPAREN", "EXP", "RPAREN"])?;

    g.rule("APP_EXP", ["SIMPLE_EXP"])?;
    g.rule("APP_EXP", ["SIMPLE_EXP", "ACTUAL_ARGS"])?;
    g.rule("APP_EXP", ["ARRAY_MAKE", "SIMPLE_EXP", "SIMPLE_EXP"])?;
    g.rule("APP_EXP", ["NOT", "APP_EXP"])?;

    g.rule("NEG_EXP", ["APP_EXP"])?;
    g.rule("NEG_EXP", ["MINUS", "NEG_EXP"])?;
    g.rule("NEG_EXP", ["MINUS_DOT", "NEG_EXP"])?;

    g.rule("MULT_EXP", ["NEG_EXP"])?;
    g.rule("MULT_EXP", ["MULT_EXP", "STAR_DOT", "NEG_EXP"])?;
    g.rule("MULT_EXP", ["MULT_EXP", "SLASH_DOT", "NEG_EXP"])?;

    g.rule("ADD_EXP", ["MULT_EXP"])?;
    for op in ["PLUS", "MINUS", "PLUS_DOT", "MINUS_DOT"] {
        g.rule("ADD_EXP", ["ADD_EXP", op, "MULT_EXP"])?;
    }

    g.rule("REL_EXP", ["ADD_EXP"])?;
    for op in [
        "EQUAL",
        "LESS_GREATER",
        "LESS",
        "GREATER",
        "LESS_EQUAL",
        "GREATER_EQUAL",
    ] {
        g.rule("REL_EXP", ["REL_EXP", op, "ADD_EXP"])?;
    }

    g.rule("TUPLE_EXP", ["REL_EXP"])?;
    g.rule("TUPLE_EXP", ["REL_EXP", "COMMA", "TUPLE_EXP_REST"])?;
    g.rule("TUPLE_EXP_REST", ["REL_EXP"])?;
    g.rule("TUPLE_EXP_REST", ["REL_EXP", "COMMA", "TUPLE_EXP_REST"])?;

    g.rule("PUT_EXP", ["TUPLE_EXP"])?;
    g.rule(
        "PUT_EXP",
        ["SIMPLE_EXP", "DOT", "LPAREN", "EXP", "RPAREN", "LESS_MINUS", "EXP"],
    )?;

    g.rule("IF_EXP", ["PUT_EXP"])?;
    g.rule("IF_EXP", ["IF", "EXP", "THEN", "EXP", "ELSE", "EXP"])?;

    g.rule("LET_EXP", ["LET", "IDENT", "EQUAL", "EXP", "IN", "EXP"])?;
    g.rule("LET_EXP", ["LET", "REC", "FUNDEF", "IN", "EXP"])?;
    g.rule(
        "LET_EXP",
        ["LET", "LPAREN", "PAT", "RPAREN", "EQUAL", "EXP", "IN", "EXP"],
    )?;

    g.rule("FUNDEF", ["IDENT", "FORMAL_ARGS", "EQUAL", "EXP"])?;
    g.rule("FORMAL_ARGS", ["IDENT", "FORMAL_ARGS"])?;
    g.rule("FORMAL_ARGS", ["IDENT"])?;
    g.rule("ACTUAL_ARGS", ["ACTUAL_ARGS", "SIMPLE_EXP"])?;
    g.rule("ACTUAL_ARGS", ["SIMPLE_EXP"])?;
    g.rule("PAT", ["PAT", "COMMA", "IDENT"])?;
    g.rule("PAT", ["IDENT", "COMMA", "IDENT"])?;

    g.rule("EXP", ["IF_EXP"])?;
    g.rule("EXP", ["IF_EXP", "SEMICOLON", "EXP"])?;
    g.rule("EXP", ["LET_EXP"])?;
    Ok(())
}
