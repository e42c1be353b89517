#[test]
fn leak_check() {
    let src = "while (true) { var ; }\nbreak;";
    let (tokens, lerr) = lexer::lex(src, "t.jpl");
    assert!(lerr.is_empty(), "unexpected lex errors: {lerr:?}");
    let (ast, perr) = parser::parse(&tokens, "t.jpl");
    println!("parse errors: {:?}", perr);
    println!("ast: {:?}", ast.iter().map(|n| &n.kind).collect::<Vec<_>>());
    // Expect TWO errors: the malformed 'var' decl inside the while body,
    // AND 'break' outside any loop at top level.
    assert_eq!(perr.len(), 2, "expected 2 parse errors, got {perr:?}");
}
