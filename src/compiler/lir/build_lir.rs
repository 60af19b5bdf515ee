//! Lowering entry point.
//!
//! Two strictly ordered passes over the parse tree:
//!
//! 1. the SIGNATURE pass walks every function definition and fills the
//!    global function table from identifier suffixes alone, so bodies
//!    can call forward and mutually-recursive functions;
//! 2. the BODY pass lowers statements into flat instruction lists, one
//!    [LirFunction] per definition plus a synthesized entry (id 0)
//!    holding the program's top-level statements.
//!
//! Errors are collected, not thrown: lowering always runs to completion
//! of the current pass so the user sees every diagnostic in one batch.
//! The only early halt is between the passes, when a malformed signature
//! would poison every call site.

use crate::compiler::compiler_errors::{CompileError, CompilerMessages};
use crate::compiler::datatypes::{TypeTag, split_identifier, valid_suffix_list};
use crate::compiler::lir::nodes::{
    FunctionId, FunctionInfo, FunctionTable, Inst, LabelId, LirFunction, LirModule, LocalId, Param,
};
use crate::compiler::lir::statements::lower_statements;
use crate::compiler::parsers::ast_nodes::{AstNode, Expression, ExpressionKind, NodeKind};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::stem_resolver::StemResolver;
use crate::compiler::string_interning::StringTable;
use crate::settings::STATEMENT_TO_INSTRUCTION_RATIO;
use crate::sig_log;

pub fn lower_parse_tree(program: &[AstNode]) -> (LirModule, CompilerMessages) {
    let mut ctx = LoweringContext::new();

    // Entry takes id 0 before any signature is registered
    let entry_id = ctx.allocate_function_id();

    collect_signatures(&mut ctx, program);
    if ctx.messages.has_errors() {
        // A malformed signature poisons every call site, so stop here
        // with the diagnostics gathered so far
        let module = LirModule {
            functions: Vec::new(),
            table: ctx.table,
        };
        return (module, ctx.messages);
    }

    let mut entry = FunctionBuilder::new(entry_id, "main", Vec::new(), None, program.len());
    entry.enter_drop_scope();
    lower_statements(&mut ctx, &mut entry, program);
    entry.exit_drop_scope();
    if !matches!(entry.body.last(), Some(Inst::Return(_))) {
        entry.emit(Inst::Return(None));
    }
    ctx.push_function(entry.finish());

    let mut functions = ctx.lowered;
    functions.sort_by_key(|f| f.id.as_u32());

    let module = LirModule {
        functions,
        table: ctx.table,
    };
    (module, ctx.messages)
}

// ---------------------------------------------------------------------
// Signature pass
// ---------------------------------------------------------------------

/// Function definitions may appear at top level or nested inside any
/// statement body; every one of them lands in the same global table.
fn collect_signatures(ctx: &mut LoweringContext, nodes: &[AstNode]) {
    for node in nodes {
        match &node.kind {
            NodeKind::FunctionDef { name, params, body } => {
                register_signature(ctx, name, params, node.location);
                collect_signatures(ctx, body);
            }
            NodeKind::If {
                branches,
                else_body,
            } => {
                for branch in branches {
                    collect_signatures_in_expression(ctx, &branch.condition);
                    collect_signatures(ctx, &branch.body);
                }
                if let Some(else_body) = else_body {
                    collect_signatures(ctx, else_body);
                }
            }
            NodeKind::While { condition, body } => {
                collect_signatures_in_expression(ctx, condition);
                collect_signatures(ctx, body);
            }
            NodeKind::For { iterable, body, .. } => {
                collect_signatures_in_expression(ctx, iterable);
                collect_signatures(ctx, body);
            }
            NodeKind::Declaration { value, .. } | NodeKind::Reassignment { value, .. } => {
                collect_signatures_in_expression(ctx, value);
            }
            NodeKind::Return(Some(value)) => collect_signatures_in_expression(ctx, value),
            NodeKind::Expression(expr) => collect_signatures_in_expression(ctx, expr),
            NodeKind::Return(None) | NodeKind::Break | NodeKind::Continue | NodeKind::Pass => {}
        }
    }
}

/// Lambda bodies hide inside expression trees, and a `des` written in
/// one is still a global definition. Walk every subexpression so those
/// bodies reach the table too.
fn collect_signatures_in_expression(ctx: &mut LoweringContext, expr: &Expression) {
    match &expr.kind {
        ExpressionKind::Lambda { body, .. } => collect_signatures(ctx, body),
        ExpressionKind::BinaryOp { left, right, .. } => {
            collect_signatures_in_expression(ctx, left);
            collect_signatures_in_expression(ctx, right);
        }
        ExpressionKind::UnaryOp { operand, .. } => {
            collect_signatures_in_expression(ctx, operand);
        }
        ExpressionKind::Call { args, .. } => {
            for arg in args {
                collect_signatures_in_expression(ctx, arg);
            }
        }
        ExpressionKind::Index { base, index } => {
            collect_signatures_in_expression(ctx, base);
            collect_signatures_in_expression(ctx, index);
        }
        ExpressionKind::MethodChain { base, calls } => {
            collect_signatures_in_expression(ctx, base);
            for call in calls {
                for arg in &call.args {
                    collect_signatures_in_expression(ctx, arg);
                }
            }
        }
        ExpressionKind::ListLiteral(elements) => {
            for element in elements {
                collect_signatures_in_expression(ctx, element);
            }
        }
        ExpressionKind::StructLiteral(fields) => {
            for field in fields {
                collect_signatures_in_expression(ctx, &field.value);
            }
        }
        ExpressionKind::Range { start, end, .. } => {
            collect_signatures_in_expression(ctx, start);
            collect_signatures_in_expression(ctx, end);
        }
        ExpressionKind::Literal(_) | ExpressionKind::Identifier(_) => {}
    }
}

fn register_signature(
    ctx: &mut LoweringContext,
    name: &str,
    params: &[String],
    location: TextLocation,
) {
    let Some((_, name_tag)) = split_identifier(name) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!(
                "function name '{name}' has no recognized type suffix (expected one of: {})",
                valid_suffix_list()
            ),
            location,
        ));
        return;
    };

    // The name's own suffix declares the return type; -i means none
    let return_tag = if name_tag == TypeTag::NoReturn {
        None
    } else {
        Some(name_tag)
    };

    let mut param_infos = Vec::with_capacity(params.len());
    for param in params {
        match split_identifier(param) {
            Some((_, TypeTag::NoReturn)) => {
                ctx.messages.errors.push(CompileError::new_rule_error(
                    format!("parameter '{param}' may not use the -i suffix"),
                    location,
                ));
            }
            Some((_, tag)) => param_infos.push(Param {
                name: param.clone(),
                tag,
            }),
            None => {
                ctx.messages.errors.push(CompileError::new_resolution_error(
                    format!("parameter '{param}' has no recognized type suffix"),
                    location,
                ));
            }
        }
    }

    let id = ctx.allocate_function_id();
    sig_log!(
        "signature: {} ({} params) -> {:?} as {:?}",
        name,
        param_infos.len(),
        return_tag,
        id
    );
    let info = FunctionInfo {
        id,
        name: name.to_string(),
        params: param_infos,
        return_tag,
        location,
    };
    if let Err(_existing) = ctx.table.insert(info) {
        ctx.messages.errors.push(CompileError::new_rule_error(
            format!("function '{name}' is already defined"),
            location,
        ));
    }
}

// ---------------------------------------------------------------------
// Shared lowering state
// ---------------------------------------------------------------------

pub(super) struct LoweringContext {
    pub table: FunctionTable,
    pub strings: StringTable,
    pub messages: CompilerMessages,
    pub resolver: StemResolver,
    lowered: Vec<LirFunction>,
    next_function_id: u32,
}

impl LoweringContext {
    fn new() -> Self {
        LoweringContext {
            table: FunctionTable::new(),
            strings: StringTable::new(),
            messages: CompilerMessages::new(),
            resolver: StemResolver::new(),
            lowered: Vec::new(),
            next_function_id: 0,
        }
    }

    pub(super) fn allocate_function_id(&mut self) -> FunctionId {
        let id = FunctionId::from_u32(self.next_function_id);
        self.next_function_id += 1;
        id
    }

    pub(super) fn push_function(&mut self, function: LirFunction) {
        self.lowered.push(function);
    }

    /// Lambdas register under their written name when it is free, with a
    /// numeric tiebreak otherwise (two lambdas may share a stem).
    pub(super) fn unique_function_name(&self, base: &str) -> String {
        if self.table.lookup(base).is_none() {
            return base.to_string();
        }
        let mut counter = 2;
        loop {
            let candidate = format!("{base}#{counter}");
            if self.table.lookup(&candidate).is_none() {
                return candidate;
            }
            counter += 1;
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(super) struct LoopLabels {
    /// `continue` target: the loop's step/re-test point.
    pub continue_label: LabelId,
    /// `break` target: the first instruction after the loop.
    pub exit_label: LabelId,
    /// Drop-scope depth at loop entry, so break/continue can free the
    /// scopes they jump out of.
    pub scope_depth: usize,
}

/// Per-function lowering state: the instruction list under construction
/// plus local/label allocators, the loop stack and the scope drop lists.
pub(super) struct FunctionBuilder {
    pub id: FunctionId,
    pub name: String,
    pub params: Vec<Param>,
    pub return_tag: Option<TypeTag>,
    pub body: Vec<Inst>,
    pub loop_stack: Vec<LoopLabels>,
    pub(super) drop_scopes: Vec<Vec<(LocalId, TypeTag)>>,
    next_local: u32,
    next_label: u32,
}

impl FunctionBuilder {
    pub(super) fn new(
        id: FunctionId,
        name: impl Into<String>,
        params: Vec<Param>,
        return_tag: Option<TypeTag>,
        statement_count: usize,
    ) -> Self {
        // Params occupy the first local slots
        let next_local = params.len() as u32;
        FunctionBuilder {
            id,
            name: name.into(),
            params,
            return_tag,
            body: Vec::with_capacity(statement_count * STATEMENT_TO_INSTRUCTION_RATIO),
            loop_stack: Vec::new(),
            drop_scopes: Vec::new(),
            next_local,
            next_label: 0,
        }
    }

    pub(super) fn emit(&mut self, inst: Inst) {
        self.body.push(inst);
    }

    pub(super) fn new_local(&mut self) -> LocalId {
        let id = LocalId::from_u32(self.next_local);
        self.next_local += 1;
        id
    }

    pub(super) fn new_label(&mut self) -> LabelId {
        let id = LabelId::from_u32(self.next_label);
        self.next_label += 1;
        id
    }

    pub(super) fn finish(self) -> LirFunction {
        LirFunction {
            id: self.id,
            name: self.name,
            params: self.params,
            return_tag: self.return_tag,
            local_count: self.next_local,
            body: self.body,
        }
    }
}
