//! End-to-end pipeline tests: the parse tree goes in as JSON exactly the
//! way the external parser delivers it, and the lowered module comes out
//! the way the target emitters pick it up.

use ago::Compiler;
use ago::compiler::compiler_errors::{CompilerMessages, ErrorType};
use ago::compiler::datatypes::TypeTag;
use ago::compiler::lir::nodes::{Inst, LirModule, Operand, RuntimeCall};
use ago::compiler::parsers::ast_nodes::{
    AstNode, Expression, ExpressionKind, NodeKind, Operator,
};
use ago::compiler::parsers::tokens::TextLocation;
use ago::compiler::runtime::value::Value;
use ago::file_output::write_lir_files;
use ago::settings::Config;
use std::fs;

fn loc() -> TextLocation {
    TextLocation::default()
}

fn declaration(name: &str, value: Expression) -> AstNode {
    AstNode::new(
        NodeKind::Declaration {
            name: name.to_string(),
            value,
        },
        loc(),
    )
}

fn call(callee: &str, args: Vec<Expression>) -> AstNode {
    AstNode::new(
        NodeKind::Expression(Expression::new(
            ExpressionKind::Call {
                callee: callee.to_string(),
                args,
            },
            loc(),
        )),
        loc(),
    )
}

/// Serialize the program the way the external parser would, then run the
/// whole pipeline on the JSON.
fn compile_json(program: &[AstNode]) -> (LirModule, CompilerMessages) {
    let json = serde_json::to_string(program).unwrap();
    let config = Config::default();
    let compiler = Compiler::new(&config);
    let parsed = compiler.json_to_parse_tree(&json).unwrap();
    compiler.parse_tree_to_lir(&parsed)
}

#[test]
fn json_program_lowers_to_an_entry_function() {
    // na := 5
    // dici(nes)
    let program = vec![
        declaration("na", Expression::int(5, loc())),
        call("dici", vec![Expression::identifier("nes", loc())]),
    ];

    let (module, messages) = compile_json(&program);
    assert!(!messages.has_errors(), "{:?}", messages.errors);

    let entry = module.entry().unwrap();
    assert_eq!(entry.name, "main");
    assert_eq!(entry.id.as_u32(), 0);

    // The Int binding read through -es folds to its String rendering,
    // and dici picks the print symbol from the argument's tag.
    assert!(entry.body.iter().any(|inst| matches!(
        inst,
        Inst::CallRuntime {
            call: RuntimeCall::Print(TypeTag::String),
            args,
            ..
        } if args == &[Operand::Const(Value::String("5".to_string()))]
    )));
}

#[test]
fn malformed_json_is_rejected_with_one_syntax_error() {
    let config = Config::default();
    let compiler = Compiler::new(&config);
    let result = compiler.json_to_parse_tree("dici(");

    let error = result.unwrap_err();
    assert_eq!(error.error_type, ErrorType::Syntax);
    // serde's reported position survives into the diagnostic
    assert_eq!(error.location.start_pos.line_number, 1);
}

#[test]
fn functions_survive_the_module_serialization_round_trip() {
    // des dupla(xa)
    //     redeo xa * 2
    // fin
    // resulta := dupla(21)
    let body = vec![AstNode::new(
        NodeKind::Return(Some(Expression::new(
            ExpressionKind::BinaryOp {
                op: Operator::Multiply,
                left: Box::new(Expression::identifier("xa", loc())),
                right: Box::new(Expression::int(2, loc())),
            },
            loc(),
        ))),
        loc(),
    )];
    let program = vec![
        AstNode::new(
            NodeKind::FunctionDef {
                name: "dupla".to_string(),
                params: vec!["xa".to_string()],
                body,
            },
            loc(),
        ),
        declaration(
            "resulta",
            Expression::new(
                ExpressionKind::Call {
                    callee: "dupla".to_string(),
                    args: vec![Expression::int(21, loc())],
                },
                loc(),
            ),
        ),
    ];

    let (module, messages) = compile_json(&program);
    assert!(!messages.has_errors(), "{:?}", messages.errors);
    assert_eq!(module.functions.len(), 2);

    let json = serde_json::to_string(&module).unwrap();
    let round_trip: LirModule = serde_json::from_str(&json).unwrap();

    assert_eq!(round_trip.functions.len(), 2);
    assert_eq!(round_trip.entry().unwrap().name, "main");
    let dupla = round_trip.table.lookup("dupla").unwrap();
    assert_eq!(dupla.return_tag, Some(TypeTag::Int));
    assert_eq!(dupla.params.len(), 1);
}

#[test]
fn lowering_errors_come_back_as_a_batch() {
    // Two independent mistakes in one program should both be reported.
    let program = vec![
        declaration("x", Expression::int(1, loc())), // no recognized suffix
        AstNode::new(NodeKind::Break, loc()),        // not inside a loop
    ];

    let (_, messages) = compile_json(&program);
    assert_eq!(messages.errors.len(), 2);
    assert_eq!(messages.errors[0].error_type, ErrorType::Resolution);
    assert_eq!(messages.errors[1].error_type, ErrorType::Rule);
}

#[test]
fn build_writes_both_output_files_from_a_parse_tree_on_disk() {
    let program = vec![
        declaration("salvees", Expression::string("salve", loc())),
        call("dici", vec![Expression::identifier("salvees", loc())]),
    ];

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("programma.json");
    fs::write(&input, serde_json::to_string(&program).unwrap()).unwrap();

    let config = Config::default();
    let compiler = Compiler::new(&config);
    let source = fs::read_to_string(&input).unwrap();
    let parsed = compiler.json_to_parse_tree(&source).unwrap();
    let (module, messages) = compiler.parse_tree_to_lir(&parsed);
    assert!(!messages.has_errors(), "{:?}", messages.errors);

    let output = dir.path().join("out").join("programma");
    write_lir_files(&module, &output).unwrap();

    let json = fs::read_to_string(output.with_extension("lir.json")).unwrap();
    let round_trip: LirModule = serde_json::from_str(&json).unwrap();
    assert_eq!(round_trip.functions.len(), module.functions.len());

    let text = fs::read_to_string(output.with_extension("lir.txt")).unwrap();
    assert!(text.contains("main"));
    assert!(text.contains("ago_print_string"));
}
