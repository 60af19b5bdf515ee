pub mod file_output;
pub mod settings;

pub mod compiler {
    pub mod parsers {
        pub mod ast_nodes;
        pub mod tokens;
    }

    pub mod runtime {
        pub mod cast;
        pub mod collections;
        pub mod fault;
        pub mod operators;
        pub mod value;
    }

    pub mod lir;

    pub mod compiler_dev_logging;
    pub mod compiler_errors;
    pub mod datatypes;
    pub mod stem_resolver;
    pub mod string_interning;
}

use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::lir::lower_parse_tree;
use crate::compiler::lir::nodes::LirModule;
use crate::compiler::parsers::ast_nodes::AstNode;
use crate::compiler::parsers::tokens::{CharPosition, TextLocation};
use crate::settings::Config;

/// The compiler pipeline, one method per stage. The surface grammar
/// lives outside this crate: the external parser hands a finished tree
/// over as JSON, and the target emitters pick the lowered module up the
/// same way.
pub struct Compiler<'a> {
    project_config: &'a Config,
}

impl<'a> Compiler<'a> {
    pub fn new(project_config: &'a Config) -> Self {
        Self { project_config }
    }

    pub fn config(&self) -> &Config {
        self.project_config
    }

    /// -----------------------------
    /// PARSE TREE INPUT
    /// -----------------------------
    /// Deserialize the external parser's JSON into the node contract.
    /// Malformed JSON (or a tree that does not match the contract) is
    /// one Syntax error at serde's reported position; there is nothing
    /// useful to collect beyond it.
    pub fn json_to_parse_tree(&self, source: &str) -> Result<Vec<AstNode>, CompileError> {
        serde_json::from_str(source).map_err(|e| {
            let at = CharPosition::new(e.line() as i32, e.column() as i32);
            CompileError::new_syntax_error(
                format!("malformed parse tree: {e}"),
                TextLocation::new(at, at),
            )
        })
    }

    /// -----------------------------
    /// LOWERING
    /// -----------------------------
    /// Signature pass, then body pass: stem resolution, operator
    /// selection and cast insertion per expression, drop insertion per
    /// scope. Diagnostics come back as one batch either way; a module
    /// accompanied by errors must not be emitted.
    pub fn parse_tree_to_lir(&self, program: &[AstNode]) -> (LirModule, CompilerMessages) {
        lower_parse_tree(program)
    }
}
