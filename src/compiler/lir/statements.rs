//! Statement lowering.
//!
//! Statements lower in program order into the flat instruction list.
//! Every block body opens a resolver scope and a drop scope together;
//! loop and branch bodies additionally open a dynamic region so the
//! resolver stops trusting compile-time constants inside them.

use crate::compiler::compiler_errors::{CompileError, CompilerWarning};
use crate::compiler::datatypes::{TypeTag, split_identifier, valid_suffix_list};
use crate::compiler::lir::build_lir::{FunctionBuilder, LoopLabels, LoweringContext};
use crate::compiler::lir::expressions::{coerce_operand, lower_expression};
use crate::compiler::lir::nodes::{
    FunctionId, Inst, LirFunction, LocalId, Operand, Param, RuntimeCall,
};
use crate::compiler::parsers::ast_nodes::{
    AstNode, Expression, ExpressionKind, IfBranch, NodeKind,
};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::runtime::value::Value;
use crate::compiler::stem_resolver::Binding;
use crate::compiler::string_interning::StringId;

pub(super) fn lower_statements(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    nodes: &[AstNode],
) {
    let mut warned_unreachable = false;
    for (index, node) in nodes.iter().enumerate() {
        lower_statement(ctx, f, node);
        // Statements after redeo/frange/perge in the same block never
        // run; still lowered so their own diagnostics surface
        if !warned_unreachable
            && matches!(
                node.kind,
                NodeKind::Return(_) | NodeKind::Break | NodeKind::Continue
            )
        {
            if let Some(next) = nodes.get(index + 1) {
                ctx.messages.warnings.push(CompilerWarning::new(
                    "statements after this point can never run",
                    next.location,
                ));
            }
            warned_unreachable = true;
        }
    }
}

fn lower_statement(ctx: &mut LoweringContext, f: &mut FunctionBuilder, node: &AstNode) {
    match &node.kind {
        NodeKind::Declaration { name, value } => {
            lower_declaration(ctx, f, name, value, node.location)
        }
        NodeKind::Reassignment { name, value } => {
            lower_reassignment(ctx, f, name, value, node.location)
        }
        NodeKind::FunctionDef { name, body, .. } => {
            lower_function_def(ctx, name, body);
        }
        NodeKind::If {
            branches,
            else_body,
        } => lower_if(ctx, f, branches, else_body.as_deref()),
        NodeKind::While { condition, body } => lower_while(ctx, f, condition, body, node.location),
        NodeKind::For {
            binding,
            iterable,
            body,
        } => lower_for(ctx, f, binding, iterable, body, node.location),
        NodeKind::Return(value) => lower_return(ctx, f, value.as_ref(), node.location),
        NodeKind::Break => lower_break(ctx, f, node.location),
        NodeKind::Continue => lower_continue(ctx, f, node.location),
        NodeKind::Pass => {}
        NodeKind::Expression(expr) => {
            // Evaluated for side effects; an unconsumed heap temp stays
            // on the drop list and is freed at scope end
            let _ = lower_expression(ctx, f, expr);
        }
    }
}

/// `:=` declares in the current scope, replacing both the declared type
/// and the value of any same-stem binding already there.
fn lower_declaration(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    name: &str,
    value: &Expression,
    location: TextLocation,
) {
    let Some((stem_text, declared)) = split_identifier(name) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!(
                "'{name}' has no recognized type suffix (expected one of: {})",
                valid_suffix_list()
            ),
            location,
        ));
        return;
    };
    if declared == TypeTag::NoReturn {
        ctx.messages.errors.push(CompileError::new_rule_error(
            format!("'{name}': the -i suffix is only legal on function names"),
            location,
        ));
        return;
    }

    let (operand, tag) = lower_expression(ctx, f, value);
    let operand = coerce_operand(ctx, f, operand, tag, declared, location);

    let slot = f.new_local();
    f.emit(Inst::Store {
        dst: slot,
        src: operand.clone(),
    });
    // The binding slot takes over ownership of a fresh heap value
    f.transfer_operand(&operand);
    f.register_heap(slot, declared);

    let constant = match &operand {
        Operand::Const(value) => Some(value.clone()),
        _ => None,
    };
    let stem = ctx.strings.intern(stem_text);
    ctx.resolver.declare(stem, declared, slot, constant);
}

/// Bare `=` assigns to an existing binding. The right-hand side is cast
/// to the binding's CURRENT declared type; the type itself never changes
/// through `=`.
fn lower_reassignment(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    name: &str,
    value: &Expression,
    location: TextLocation,
) {
    let Some((stem_text, _)) = split_identifier(name) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!("'{name}' has no recognized type suffix"),
            location,
        ));
        return;
    };
    let stem = ctx.strings.intern(stem_text);
    let Some(binding) = ctx.resolver.lookup(stem) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!("cannot assign to '{name}': stem '{stem_text}' is not declared"),
            location,
        ));
        return;
    };
    let (slot, declared) = (binding.slot, binding.declared);

    let (operand, tag) = lower_expression(ctx, f, value);
    let operand = coerce_operand(ctx, f, operand, tag, declared, location);

    f.emit(Inst::Store {
        dst: slot,
        src: operand.clone(),
    });
    f.transfer_operand(&operand);

    let constant = match &operand {
        Operand::Const(value) => Some(value.clone()),
        _ => None,
    };
    ctx.resolver.assign(stem, constant);
}

fn lower_function_def(ctx: &mut LoweringContext, name: &str, body: &[AstNode]) {
    // The signature pass registers every definition before bodies lower
    let Some(info) = ctx.table.lookup(name) else {
        ctx.messages.errors.push(CompileError::compiler_error(format!(
            "definition of '{name}' was never registered by the signature pass"
        )));
        return;
    };
    let (id, params, return_tag, location) = (
        info.id,
        info.params.clone(),
        info.return_tag,
        info.location,
    );
    let function = lower_function_body(
        ctx,
        id,
        name.to_string(),
        params,
        return_tag,
        Vec::new(),
        body,
        location,
    );
    ctx.push_function(function);
}

/// Lower one function body into its own frame. Used for `des`
/// definitions and lambdas; `extra_bindings` carries a lambda's
/// copy-captured stems, already rehomed to this frame's leading slots.
#[allow(clippy::too_many_arguments)]
pub(super) fn lower_function_body(
    ctx: &mut LoweringContext,
    id: FunctionId,
    name: String,
    params: Vec<Param>,
    return_tag: Option<TypeTag>,
    extra_bindings: Vec<(StringId, Binding)>,
    body: &[AstNode],
    location: TextLocation,
) -> LirFunction {
    let mut f = FunctionBuilder::new(id, name, params.clone(), return_tag, body.len());

    ctx.resolver.enter_function_scope(Vec::new());
    for (index, param) in params.iter().enumerate() {
        if let Some((stem_text, _)) = split_identifier(&param.name) {
            let stem = ctx.strings.intern(stem_text);
            ctx.resolver
                .declare(stem, param.tag, LocalId::from_u32(index as u32), None);
        }
    }
    // Captures re-declare over their param slots, restoring any known
    // constant from the snapshot
    for (stem, binding) in extra_bindings {
        ctx.resolver
            .declare(stem, binding.declared, binding.slot, binding.constant);
    }

    f.enter_drop_scope();
    lower_statements(ctx, &mut f, body);
    f.exit_drop_scope();
    ctx.resolver.exit_scope();

    if !matches!(f.body.last(), Some(Inst::Return(_))) {
        match return_tag {
            None => f.emit(Inst::Return(None)),
            Some(tag) => match Value::empty_of(tag) {
                // Falling off the end behaves like an empty redeo
                Ok(empty) => f.emit(Inst::Return(Some(Operand::Const(empty)))),
                Err(_) => {
                    ctx.messages.errors.push(CompileError::new_rule_error(
                        format!("function '{}' must end with a redeo carrying a value", f.name),
                        location,
                    ));
                    f.emit(Inst::Return(None));
                }
            },
        }
    }

    f.finish()
}

/// `si`/`aliter si`/`aliter`: a linear chain of conditional branches
/// sharing one merge label. Each condition lowers immediately before its
/// own branch instruction.
fn lower_if(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    branches: &[IfBranch],
    else_body: Option<&[AstNode]>,
) {
    let merge = f.new_label();
    ctx.resolver.enter_dynamic_region();

    for branch in branches {
        let (condition, tag) = lower_expression(ctx, f, &branch.condition);
        check_condition_tag(ctx, tag, branch.condition.location);

        let next = f.new_label();
        f.emit(Inst::Branch {
            condition,
            if_false: next,
        });

        lower_block(ctx, f, &branch.body);
        f.emit(Inst::Jump(merge));
        f.emit(Inst::Label(next));
    }

    if let Some(else_body) = else_body {
        lower_block(ctx, f, else_body);
    }
    f.emit(Inst::Label(merge));
    ctx.resolver.exit_dynamic_region();
}

fn lower_while(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    condition: &Expression,
    body: &[AstNode],
    location: TextLocation,
) {
    ctx.resolver.enter_dynamic_region();

    let header = f.new_label();
    let exit = f.new_label();
    let scope_depth = f.drop_scope_depth();

    // Header re-evaluates the condition on every pass
    f.emit(Inst::Label(header));
    let (condition_op, tag) = lower_expression(ctx, f, condition);
    check_condition_tag(ctx, tag, location);
    f.emit(Inst::Branch {
        condition: condition_op,
        if_false: exit,
    });

    f.loop_stack.push(LoopLabels {
        continue_label: header,
        exit_label: exit,
        scope_depth,
    });
    lower_block(ctx, f, body);
    f.loop_stack.pop();

    f.emit(Inst::Jump(header));
    f.emit(Inst::Label(exit));
    ctx.resolver.exit_dynamic_region();
}

fn lower_for(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    binding: &str,
    iterable: &Expression,
    body: &[AstNode],
    location: TextLocation,
) {
    let Some((stem_text, binding_tag)) = split_identifier(binding) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!("loop binding '{binding}' has no recognized type suffix"),
            location,
        ));
        return;
    };
    let stem = ctx.strings.intern(stem_text);

    // A syntactic range lowers to a counting loop over its endpoints
    if let ExpressionKind::Range {
        start,
        end,
        inclusive,
    } = &iterable.kind
    {
        if !matches!(binding_tag, TypeTag::Int | TypeTag::Any) {
            ctx.messages.errors.push(CompileError::new_type_error(
                format!("a range loop binding must be Int, '{binding}' declares {binding_tag}"),
                location,
            ));
            return;
        }
        let (start_op, start_tag) = lower_expression(ctx, f, start);
        let start_op = coerce_operand(ctx, f, start_op, start_tag, TypeTag::Int, start.location);
        let (end_op, end_tag) = lower_expression(ctx, f, end);
        let end_op = coerce_operand(ctx, f, end_op, end_tag, TypeTag::Int, end.location);
        lower_counting_loop(ctx, f, stem, start_op, end_op, *inclusive, body);
        return;
    }

    let (iterable_op, iterable_tag) = lower_expression(ctx, f, iterable);
    let (list_op, element_tag) = match iterable_tag {
        tag if tag.is_list() => (iterable_op, tag.element_tag().unwrap_or(TypeTag::Any)),
        // A range VALUE (not a syntactic range) materializes to a list
        TypeTag::Range => (
            coerce_operand(
                ctx,
                f,
                iterable_op,
                TypeTag::Range,
                TypeTag::IntList,
                location,
            ),
            TypeTag::Int,
        ),
        TypeTag::Any => (iterable_op, TypeTag::Any),
        other => {
            ctx.messages.errors.push(CompileError::new_type_error(
                format!("cannot iterate over a value of type {other}"),
                location,
            ));
            return;
        }
    };

    if binding_tag != element_tag && binding_tag != TypeTag::Any && element_tag != TypeTag::Any {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!(
                "loop binding '{binding}' declares {binding_tag} but the list holds {element_tag}"
            ),
            location,
        ));
        return;
    }

    ctx.resolver.enter_dynamic_region();
    let scope_depth = f.drop_scope_depth();

    // Pin the list and read its length ONCE at entry; mutating the list
    // while iterating is undefined behavior
    let list_slot = f.new_local();
    f.emit(Inst::Store {
        dst: list_slot,
        src: list_op,
    });
    let length = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(length),
        call: RuntimeCall::ListLength,
        args: vec![Operand::Local(list_slot)],
    });
    let index = f.new_local();
    f.emit(Inst::Store {
        dst: index,
        src: Operand::Const(Value::Int(0)),
    });

    let header = f.new_label();
    let continue_label = f.new_label();
    let exit = f.new_label();

    f.emit(Inst::Label(header));
    let in_bounds = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(in_bounds),
        call: RuntimeCall::LessThan,
        args: vec![Operand::Local(index), Operand::Local(length)],
    });
    f.emit(Inst::Branch {
        condition: Operand::Local(in_bounds),
        if_false: exit,
    });

    let element = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(element),
        call: RuntimeCall::ListGet,
        args: vec![Operand::Local(list_slot), Operand::Local(index)],
    });

    ctx.resolver.enter_scope();
    ctx.resolver.declare(stem, element_tag, element, None);
    f.loop_stack.push(LoopLabels {
        continue_label,
        exit_label: exit,
        scope_depth,
    });
    f.enter_drop_scope();
    lower_statements(ctx, f, body);
    f.exit_drop_scope();
    f.loop_stack.pop();
    ctx.resolver.exit_scope();

    f.emit(Inst::Label(continue_label));
    let stepped = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(stepped),
        call: RuntimeCall::Add,
        args: vec![Operand::Local(index), Operand::Const(Value::Int(1))],
    });
    f.emit(Inst::Store {
        dst: index,
        src: Operand::Local(stepped),
    });
    f.emit(Inst::Jump(header));
    f.emit(Inst::Label(exit));

    ctx.resolver.exit_dynamic_region();
}

fn lower_counting_loop(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    stem: StringId,
    start_op: Operand,
    end_op: Operand,
    inclusive: bool,
    body: &[AstNode],
) {
    ctx.resolver.enter_dynamic_region();
    let scope_depth = f.drop_scope_depth();

    let counter = f.new_local();
    f.emit(Inst::Store {
        dst: counter,
        src: start_op,
    });
    // The bound is captured once; user code cannot move the goalposts
    let bound = f.new_local();
    f.emit(Inst::Store {
        dst: bound,
        src: end_op,
    });

    let header = f.new_label();
    let continue_label = f.new_label();
    let exit = f.new_label();

    f.emit(Inst::Label(header));
    let in_bounds = f.new_local();
    let compare = if inclusive {
        RuntimeCall::LessEqual
    } else {
        RuntimeCall::LessThan
    };
    f.emit(Inst::CallRuntime {
        dst: Some(in_bounds),
        call: compare,
        args: vec![Operand::Local(counter), Operand::Local(bound)],
    });
    f.emit(Inst::Branch {
        condition: Operand::Local(in_bounds),
        if_false: exit,
    });

    ctx.resolver.enter_scope();
    ctx.resolver.declare(stem, TypeTag::Int, counter, None);
    f.loop_stack.push(LoopLabels {
        continue_label,
        exit_label: exit,
        scope_depth,
    });
    f.enter_drop_scope();
    lower_statements(ctx, f, body);
    f.exit_drop_scope();
    f.loop_stack.pop();
    ctx.resolver.exit_scope();

    f.emit(Inst::Label(continue_label));
    let stepped = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(stepped),
        call: RuntimeCall::Add,
        args: vec![Operand::Local(counter), Operand::Const(Value::Int(1))],
    });
    f.emit(Inst::Store {
        dst: counter,
        src: Operand::Local(stepped),
    });
    f.emit(Inst::Jump(header));
    f.emit(Inst::Label(exit));

    ctx.resolver.exit_dynamic_region();
}

/// `redeo` casts its operand to the function's declared return type and
/// unwinds every open scope. A `-i` function (and the top level) must
/// not return a value.
fn lower_return(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    value: Option<&Expression>,
    location: TextLocation,
) {
    match f.return_tag {
        None => {
            if value.is_some() {
                ctx.messages.errors.push(CompileError::new_rule_error(
                    format!("'{}' returns nothing; redeo must not carry a value here", f.name),
                    location,
                ));
                return;
            }
            f.emit_frees_for_return(None);
            f.emit(Inst::Return(None));
        }
        Some(tag) => {
            let operand = match value {
                Some(expr) => {
                    let (operand, value_tag) = lower_expression(ctx, f, expr);
                    coerce_operand(ctx, f, operand, value_tag, tag, expr.location)
                }
                // Empty redeo coerces to the return type's empty value
                None => match Value::empty_of(tag) {
                    Ok(empty) => Operand::Const(empty),
                    Err(fault) => {
                        ctx.messages.errors.push(CompileError::new_rule_error(
                            fault.to_string(),
                            location,
                        ));
                        return;
                    }
                },
            };
            let keep = match &operand {
                Operand::Local(local) => Some(*local),
                _ => None,
            };
            f.transfer_operand(&operand);
            f.emit_frees_for_return(keep);
            f.emit(Inst::Return(Some(operand)));
        }
    }
}

fn lower_break(ctx: &mut LoweringContext, f: &mut FunctionBuilder, location: TextLocation) {
    let Some(labels) = f.loop_stack.last().copied() else {
        ctx.messages.errors.push(CompileError::new_rule_error(
            "frange is only legal inside a loop",
            location,
        ));
        return;
    };
    f.emit_frees_down_to(labels.scope_depth);
    f.emit(Inst::Jump(labels.exit_label));
}

fn lower_continue(ctx: &mut LoweringContext, f: &mut FunctionBuilder, location: TextLocation) {
    let Some(labels) = f.loop_stack.last().copied() else {
        ctx.messages.errors.push(CompileError::new_rule_error(
            "perge is only legal inside a loop",
            location,
        ));
        return;
    };
    f.emit_frees_down_to(labels.scope_depth);
    f.emit(Inst::Jump(labels.continue_label));
}

/// Open a nested block: resolver scope plus drop scope, closed together.
fn lower_block(ctx: &mut LoweringContext, f: &mut FunctionBuilder, body: &[AstNode]) {
    ctx.resolver.enter_scope();
    f.enter_drop_scope();
    lower_statements(ctx, f, body);
    f.exit_drop_scope();
    ctx.resolver.exit_scope();
}

fn check_condition_tag(ctx: &mut LoweringContext, tag: TypeTag, location: TextLocation) {
    if !matches!(tag, TypeTag::Bool | TypeTag::Any) {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!("a condition must be Bool, found {tag}"),
            location,
        ));
    }
}
