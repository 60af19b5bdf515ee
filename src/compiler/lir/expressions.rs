//! Expression lowering.
//!
//! Every expression lowers to (operand, static tag). Constants fold at
//! compile time through the same runtime semantics the generated program
//! uses; anything dynamic becomes a temp local fed by one runtime call.
//! Operator selection consults the operator library's static domain
//! rules first, so a statically-impossible operation is a compile error
//! rather than a generated fault.

use crate::compiler::compiler_errors::CompileError;
use crate::compiler::datatypes::{SUFFIX_TO_TYPE, TypeTag, split_identifier, valid_suffix_list};
use crate::compiler::lir::build_lir::{FunctionBuilder, LoweringContext};
use crate::compiler::lir::nodes::{Inst, LocalId, Operand, Param, RuntimeCall};
use crate::compiler::lir::statements::lower_function_body;
use crate::compiler::parsers::ast_nodes::{
    AstNode, Expression, ExpressionKind, Literal, MethodCall, Operator, StructField, UnaryOperator,
};
use crate::compiler::parsers::tokens::TextLocation;
use crate::compiler::runtime::cast::cast;
use crate::compiler::runtime::collections::{ListValue, string_get};
use crate::compiler::runtime::operators;
use crate::compiler::runtime::value::{StructValue, Value};
use crate::compiler::stem_resolver::Binding;
use crate::compiler::string_interning::StringId;
use crate::lower_log;

/// Placeholder result after an error has been reported. Downstream
/// lowering continues so the batch collects every diagnostic.
pub(super) fn poison() -> (Operand, TypeTag) {
    (Operand::Const(Value::Null), TypeTag::Any)
}

pub(super) fn lower_expression(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    expr: &Expression,
) -> (Operand, TypeTag) {
    match &expr.kind {
        ExpressionKind::Literal(literal) => lower_literal(literal),
        ExpressionKind::Identifier(name) => lower_identifier(ctx, f, name, expr.location),
        ExpressionKind::BinaryOp { op, left, right } => {
            lower_binary(ctx, f, *op, left, right, expr.location)
        }
        ExpressionKind::UnaryOp { op, operand } => {
            lower_unary(ctx, f, *op, operand, expr.location)
        }
        ExpressionKind::Call { callee, args } => lower_call(ctx, f, callee, args, expr.location),
        ExpressionKind::Index { base, index } => lower_index(ctx, f, base, index, expr.location),
        ExpressionKind::MethodChain { base, calls } => lower_method_chain(ctx, f, base, calls),
        ExpressionKind::ListLiteral(elements) => {
            lower_list_literal(ctx, f, elements, expr.location)
        }
        ExpressionKind::StructLiteral(fields) => lower_struct_literal(ctx, f, fields, expr.location),
        ExpressionKind::Lambda {
            name,
            params,
            captures,
            body,
        } => lower_lambda(ctx, f, name, params, captures, body, expr.location),
        ExpressionKind::Range {
            start,
            end,
            inclusive,
        } => lower_range(ctx, f, start, end, *inclusive, expr.location),
    }
}

fn lower_literal(literal: &Literal) -> (Operand, TypeTag) {
    let value = match literal {
        Literal::Int(v) => Value::Int(*v),
        Literal::Float(v) => Value::Float(*v),
        Literal::Bool(v) => Value::Bool(*v),
        Literal::String(v) => Value::String(v.clone()),
        Literal::Null => Value::Null,
    };
    let tag = value.tag();
    (Operand::Const(value), tag)
}

fn lower_identifier(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    name: &str,
    location: TextLocation,
) -> (Operand, TypeTag) {
    let Some((stem_text, requested)) = split_identifier(name) else {
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!(
                "'{name}' has no recognized type suffix (expected one of: {})",
                valid_suffix_list()
            ),
            location,
        ));
        return poison();
    };

    let stem = ctx.strings.intern(stem_text);
    let Some(reference) = ctx
        .resolver
        .reference(stem, requested, location, &mut ctx.messages)
    else {
        // Not a binding: a bare function name evaluates to a Function
        // value with no captures
        if let Some(info) = ctx.table.lookup(name) {
            let dst = f.new_local();
            f.emit(Inst::MakeClosure {
                dst,
                function: info.id,
                captures: Vec::new(),
            });
            return (Operand::Local(dst), TypeTag::Function);
        }
        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!("no binding for stem '{stem_text}' (referenced as '{name}')"),
            location,
        ));
        return poison();
    };

    // Cast-on-reference already recomputed the constant when one is known
    if let Some(constant) = reference.constant {
        return (Operand::Const(constant), requested);
    }
    if reference.declared == requested || requested == TypeTag::Any {
        let tag = if requested == TypeTag::Any {
            TypeTag::Any
        } else {
            reference.declared
        };
        return (Operand::Local(reference.slot), tag);
    }

    // Dynamic value read through a different suffix: emit the cast now,
    // for this access only
    let result = emit_runtime_call(
        f,
        RuntimeCall::Cast(requested),
        vec![Operand::Local(reference.slot)],
        requested,
    );
    (result, requested)
}

fn lower_binary(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    op: Operator,
    left: &Expression,
    right: &Expression,
    location: TextLocation,
) -> (Operand, TypeTag) {
    if matches!(op, Operator::And | Operator::Or) {
        return lower_short_circuit(ctx, f, op, left, right, location);
    }

    let (left_op, left_tag) = lower_expression(ctx, f, left);
    let (right_op, right_tag) = lower_expression(ctx, f, right);

    let result_tag = match operators::binary_domain(op, left_tag, right_tag) {
        Ok(tag) => tag,
        Err(msg) => {
            ctx.messages
                .errors
                .push(CompileError::new_type_error(msg, location));
            return poison();
        }
    };

    // Both sides known: fold through the same semantics the runtime uses
    if let (Operand::Const(l), Operand::Const(r)) = (&left_op, &right_op) {
        match operators::apply_binary(op, l, r) {
            Ok(value) => {
                let tag = value.tag();
                return (Operand::Const(value), tag);
            }
            Err(fault) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(fault.to_string(), location));
                return poison();
            }
        }
    }

    let call = runtime_call_for(op);
    let result = emit_runtime_call(f, call, vec![left_op, right_op], result_tag);
    (result, result_tag)
}

/// `et`/`vel` lower to branch structure, never to an eager call pair:
/// the right operand's instructions sit strictly after the branch on the
/// left operand, so they only execute when the left side demands it.
fn lower_short_circuit(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    op: Operator,
    left: &Expression,
    right: &Expression,
    location: TextLocation,
) -> (Operand, TypeTag) {
    let (left_op, left_tag) = lower_expression(ctx, f, left);
    if !matches!(left_tag, TypeTag::Bool | TypeTag::Any) {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!("et/vel need Bool operands, found {left_tag}"),
            location,
        ));
        return poison();
    }

    let result = f.new_local();
    f.emit(Inst::Store {
        dst: result,
        src: left_op,
    });
    let end = f.new_label();

    match op {
        Operator::And => {
            // Left false: skip the right side, result is already false
            f.emit(Inst::Branch {
                condition: Operand::Local(result),
                if_false: end,
            });
        }
        Operator::Or => {
            // Left true: skip the right side, result is already true
            let rhs = f.new_label();
            f.emit(Inst::Branch {
                condition: Operand::Local(result),
                if_false: rhs,
            });
            f.emit(Inst::Jump(end));
            f.emit(Inst::Label(rhs));
        }
        _ => unreachable!("only et/vel reach short-circuit lowering"),
    }

    let (right_op, right_tag) = lower_expression(ctx, f, right);
    if !matches!(right_tag, TypeTag::Bool | TypeTag::Any) {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!("et/vel need Bool operands, found {right_tag}"),
            location,
        ));
    }
    f.emit(Inst::Store {
        dst: result,
        src: right_op,
    });
    f.emit(Inst::Label(end));

    (Operand::Local(result), TypeTag::Bool)
}

fn lower_unary(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    op: UnaryOperator,
    operand: &Expression,
    location: TextLocation,
) -> (Operand, TypeTag) {
    let (operand_op, operand_tag) = lower_expression(ctx, f, operand);

    let result_tag = match operators::unary_domain(op, operand_tag) {
        Ok(tag) => tag,
        Err(msg) => {
            ctx.messages
                .errors
                .push(CompileError::new_type_error(msg, location));
            return poison();
        }
    };

    if let Operand::Const(value) = &operand_op {
        match operators::apply_unary(op, value) {
            Ok(folded) => {
                let tag = folded.tag();
                return (Operand::Const(folded), tag);
            }
            Err(fault) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(fault.to_string(), location));
                return poison();
            }
        }
    }

    match op {
        // Already domain-checked; nothing to compute
        UnaryOperator::Plus => (operand_op, result_tag),
        UnaryOperator::Negate => {
            let result = emit_runtime_call(f, RuntimeCall::Negate, vec![operand_op], result_tag);
            (result, result_tag)
        }
        UnaryOperator::Not => {
            let result = emit_runtime_call(f, RuntimeCall::Not, vec![operand_op], result_tag);
            (result, result_tag)
        }
    }
}

fn lower_call(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    callee: &str,
    args: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    // Builtins first; they are not table entries
    match callee {
        "dici" => return lower_dici(ctx, f, args, location),
        "audies" => return lower_audies(ctx, f, args, location),
        "exei" => return lower_exei(ctx, f, args, location),
        "insero" => return lower_insero(ctx, f, args, location),
        _ => {}
    }

    if let Some(info) = ctx.table.lookup(callee) {
        let (id, return_tag) = (info.id, info.return_tag);
        let params: Vec<Param> = info.params.clone();
        if params.len() != args.len() {
            ctx.messages.errors.push(CompileError::new_arity_error(
                format!(
                    "function '{callee}' expects {} argument(s), found {}",
                    params.len(),
                    args.len()
                ),
                location,
            ));
            return poison();
        }

        let mut arg_ops = Vec::with_capacity(args.len());
        for (arg, param) in args.iter().zip(&params) {
            let (operand, tag) = lower_expression(ctx, f, arg);
            arg_ops.push(coerce_operand(ctx, f, operand, tag, param.tag, arg.location));
        }

        lower_log!("call: {} -> {:?}", callee, return_tag);
        return match return_tag {
            Some(tag) => {
                let dst = f.new_local();
                f.emit(Inst::Call {
                    dst: Some(dst),
                    function: id,
                    args: arg_ops,
                });
                f.register_heap(dst, tag);
                (Operand::Local(dst), tag)
            }
            None => {
                f.emit(Inst::Call {
                    dst: None,
                    function: id,
                    args: arg_ops,
                });
                (Operand::Const(Value::Null), TypeTag::NoReturn)
            }
        };
    }

    // A Function-typed binding called by name: indirect dispatch
    if let Some((stem_text, TypeTag::Function)) = split_identifier(callee) {
        let stem = ctx.strings.intern(stem_text);
        if let Some(reference) =
            ctx.resolver
                .reference(stem, TypeTag::Function, location, &mut ctx.messages)
        {
            let callee_op = match reference.constant {
                Some(value) => Operand::Const(value),
                None => Operand::Local(reference.slot),
            };
            let mut arg_ops = Vec::with_capacity(args.len());
            for arg in args {
                let (operand, _) = lower_expression(ctx, f, arg);
                arg_ops.push(operand);
            }
            let dst = f.new_local();
            f.emit(Inst::CallIndirect {
                dst: Some(dst),
                callee: callee_op,
                args: arg_ops,
            });
            // The target is only known at runtime, so the result tag is too
            return (Operand::Local(dst), TypeTag::Any);
        }
    }

    ctx.messages.errors.push(CompileError::new_resolution_error(
        format!("no function or callable binding named '{callee}'"),
        location,
    ));
    poison()
}

/// `dici(x, ...)` prints each argument; the runtime print symbol is
/// picked per argument from its static tag.
fn lower_dici(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    args: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    if args.is_empty() {
        ctx.messages.errors.push(CompileError::new_arity_error(
            "dici needs at least one argument",
            location,
        ));
        return poison();
    }
    for arg in args {
        let (operand, tag) = lower_expression(ctx, f, arg);
        if tag == TypeTag::NoReturn {
            ctx.messages.errors.push(CompileError::new_type_error(
                "dici cannot print this argument: the expression produces no value",
                arg.location,
            ));
            continue;
        }
        f.emit(Inst::CallRuntime {
            dst: None,
            call: RuntimeCall::Print(tag),
            args: vec![operand],
        });
    }
    (Operand::Const(Value::Null), TypeTag::NoReturn)
}

fn lower_audies(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    args: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    if !args.is_empty() {
        ctx.messages.errors.push(CompileError::new_arity_error(
            "audies takes no arguments",
            location,
        ));
        return poison();
    }
    let result = emit_runtime_call(f, RuntimeCall::ReadLine, Vec::new(), TypeTag::String);
    (result, TypeTag::String)
}

fn lower_exei(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    args: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    let code = match args {
        [] => Operand::Const(Value::Int(0)),
        [arg] => {
            let (operand, tag) = lower_expression(ctx, f, arg);
            coerce_operand(ctx, f, operand, tag, TypeTag::Int, arg.location)
        }
        _ => {
            ctx.messages.errors.push(CompileError::new_arity_error(
                "exei takes at most one argument",
                location,
            ));
            return poison();
        }
    };
    f.emit(Inst::CallRuntime {
        dst: None,
        call: RuntimeCall::Exit,
        args: vec![code],
    });
    (Operand::Const(Value::Null), TypeTag::NoReturn)
}

/// `insero(listaem, x)` appends in place; the value is cast to the
/// list's element tag first.
fn lower_insero(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    args: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    let [list_arg, value_arg] = args else {
        ctx.messages.errors.push(CompileError::new_arity_error(
            format!("insero expects 2 arguments (list, value), found {}", args.len()),
            location,
        ));
        return poison();
    };

    let (list_op, list_tag) = lower_expression(ctx, f, list_arg);
    let element_tag = match list_tag.element_tag() {
        Some(tag) => tag,
        None if list_tag == TypeTag::Any => TypeTag::Any,
        None => {
            ctx.messages.errors.push(CompileError::new_type_error(
                format!("insero needs a list as its first argument, found {list_tag}"),
                list_arg.location,
            ));
            return poison();
        }
    };

    let (value_op, value_tag) = lower_expression(ctx, f, value_arg);
    let value_op = coerce_operand(ctx, f, value_op, value_tag, element_tag, value_arg.location);

    f.emit(Inst::CallRuntime {
        dst: None,
        call: RuntimeCall::ListAppend,
        args: vec![list_op, value_op],
    });
    (Operand::Const(Value::Null), TypeTag::NoReturn)
}

fn lower_index(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    base: &Expression,
    index: &Expression,
    location: TextLocation,
) -> (Operand, TypeTag) {
    let (base_op, base_tag) = lower_expression(ctx, f, base);
    let (index_op, index_tag) = lower_expression(ctx, f, index);

    // Fold a constant lookup through the collection runtime itself
    if let (Operand::Const(base_value), Operand::Const(index_value)) = (&base_op, &index_op) {
        match fold_index(base_value, index_value) {
            Ok(Some(value)) => {
                let tag = value.tag();
                return (Operand::Const(value), tag);
            }
            Ok(None) => {}
            Err(msg) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(msg, location));
                return poison();
            }
        }
    }

    match base_tag {
        tag if tag.is_list() => {
            if !matches!(index_tag, TypeTag::Int | TypeTag::Any) {
                ctx.messages.errors.push(CompileError::new_type_error(
                    format!("list index must be Int, found {index_tag}"),
                    index.location,
                ));
                return poison();
            }
            let elem = tag.element_tag().unwrap_or(TypeTag::Any);
            let result = emit_runtime_call(f, RuntimeCall::ListGet, vec![base_op, index_op], elem);
            (result, elem)
        }
        TypeTag::String => {
            if !matches!(index_tag, TypeTag::Int | TypeTag::Any) {
                ctx.messages.errors.push(CompileError::new_type_error(
                    format!("string index must be Int, found {index_tag}"),
                    index.location,
                ));
                return poison();
            }
            let result = emit_runtime_call(
                f,
                RuntimeCall::StringGet,
                vec![base_op, index_op],
                TypeTag::String,
            );
            (result, TypeTag::String)
        }
        TypeTag::Struct => {
            if !matches!(index_tag, TypeTag::String | TypeTag::Any) {
                ctx.messages.errors.push(CompileError::new_type_error(
                    format!("struct key must be String, found {index_tag}"),
                    index.location,
                ));
                return poison();
            }
            let result = emit_runtime_call(
                f,
                RuntimeCall::StructGet,
                vec![base_op, index_op],
                TypeTag::Any,
            );
            (result, TypeTag::Any)
        }
        // Shape only known at runtime: dispatch on the index tag
        TypeTag::Any => {
            let (call, result_tag) = match index_tag {
                TypeTag::String => (RuntimeCall::StructGet, TypeTag::Any),
                _ => (RuntimeCall::ListGet, TypeTag::Any),
            };
            let result = emit_runtime_call(f, call, vec![base_op, index_op], result_tag);
            (result, result_tag)
        }
        other => {
            ctx.messages.errors.push(CompileError::new_type_error(
                format!("cannot index a value of type {other}"),
                location,
            ));
            poison()
        }
    }
}

/// Ok(Some) on a successful fold, Ok(None) when the pair is not foldable
/// (left for runtime dispatch), Err for a statically-certain fault.
fn fold_index(base: &Value, index: &Value) -> Result<Option<Value>, String> {
    match (base, index) {
        (Value::List(list), Value::Int(i)) => match list.get(*i) {
            Ok(value) => Ok(Some(value.clone())),
            Err(fault) => Err(fault.to_string()),
        },
        (Value::String(s), Value::Int(i)) => match string_get(s, *i) {
            Ok(ch) => Ok(Some(Value::String(ch))),
            Err(fault) => Err(fault.to_string()),
        },
        (Value::Struct(entries), Value::String(key)) => match entries.get(key) {
            Some(value) => Ok(Some(value.clone())),
            None => Err(format!("struct has no field \"{key}\"")),
        },
        _ => Ok(None),
    }
}

fn lower_method_chain(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    base: &Expression,
    calls: &[MethodCall],
) -> (Operand, TypeTag) {
    // Steps consume left to right; each result feeds the next call
    let (mut current_op, mut current_tag) = lower_expression(ctx, f, base);

    for call in calls {
        if let Some(target) = suffix_as_cast(&call.name) {
            if !call.args.is_empty() {
                ctx.messages.errors.push(CompileError::new_arity_error(
                    format!(".{}() takes no arguments", call.name),
                    call.location,
                ));
                return poison();
            }
            current_op = coerce_operand(ctx, f, current_op, current_tag, target, call.location);
            current_tag = target;
            continue;
        }

        ctx.messages.errors.push(CompileError::new_resolution_error(
            format!(
                "unknown method '{}'; methods are the bare type suffixes ({})",
                call.name,
                valid_suffix_list()
            ),
            call.location,
        ));
        return poison();
    }

    (current_op, current_tag)
}

/// A bare suffix used as a method name (`.a()`, `.es()`, ...) is a cast
/// to that suffix's type.
fn suffix_as_cast(name: &str) -> Option<TypeTag> {
    SUFFIX_TO_TYPE
        .iter()
        .find(|(suffix, _)| *suffix == name)
        .map(|(_, tag)| *tag)
}

fn lower_list_literal(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    elements: &[Expression],
    location: TextLocation,
) -> (Operand, TypeTag) {
    let mut lowered = Vec::with_capacity(elements.len());
    for element in elements {
        lowered.push(lower_expression(ctx, f, element));
    }

    // Element tag: unanimous tag, or Any for a mixed literal
    let element_tag = match lowered.first() {
        None => TypeTag::Any,
        Some((_, first_tag)) => {
            if lowered.iter().all(|(_, tag)| tag == first_tag) {
                *first_tag
            } else {
                TypeTag::Any
            }
        }
    };
    let Some(list_tag) = TypeTag::list_of(element_tag) else {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!("a list cannot hold elements of type {element_tag}"),
            location,
        ));
        return poison();
    };

    if lowered
        .iter()
        .all(|(operand, _)| matches!(operand, Operand::Const(_)))
    {
        let values: Vec<Value> = lowered
            .into_iter()
            .map(|(operand, _)| match operand {
                Operand::Const(value) => value,
                _ => unreachable!("checked all-const above"),
            })
            .collect();
        return match ListValue::from_values(element_tag, values) {
            Ok(list) => (Operand::Const(Value::List(list)), list_tag),
            Err(fault) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(fault.to_string(), location));
                poison()
            }
        };
    }

    let dst = f.new_local();
    f.emit(Inst::Alloc {
        dst,
        tag: list_tag,
        capacity: elements.len(),
    });
    f.register_heap(dst, list_tag);
    for (operand, tag) in lowered {
        let operand = coerce_operand(ctx, f, operand, tag, element_tag, location);
        f.emit(Inst::CallRuntime {
            dst: None,
            call: RuntimeCall::ListAppend,
            args: vec![Operand::Local(dst), operand],
        });
    }
    (Operand::Local(dst), list_tag)
}

/// Struct literal keys are suffixed identifiers like any other name;
/// each field value is cast to its key's declared type.
fn lower_struct_literal(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    fields: &[StructField],
    location: TextLocation,
) -> (Operand, TypeTag) {
    let mut lowered = Vec::with_capacity(fields.len());
    for field in fields {
        let Some((_, declared)) = split_identifier(&field.key) else {
            ctx.messages.errors.push(CompileError::new_resolution_error(
                format!("struct key '{}' has no recognized type suffix", field.key),
                location,
            ));
            return poison();
        };
        let (operand, tag) = lower_expression(ctx, f, &field.value);
        let operand = coerce_operand(ctx, f, operand, tag, declared, field.value.location);
        lowered.push((field.key.clone(), operand));
    }

    if lowered
        .iter()
        .all(|(_, operand)| matches!(operand, Operand::Const(_)))
    {
        let mut value = StructValue::new();
        for (key, operand) in lowered {
            if let Operand::Const(field_value) = operand {
                value.set(key, field_value);
            }
        }
        return (Operand::Const(Value::Struct(value)), TypeTag::Struct);
    }

    let dst = f.new_local();
    f.emit(Inst::Alloc {
        dst,
        tag: TypeTag::Struct,
        capacity: fields.len(),
    });
    f.register_heap(dst, TypeTag::Struct);
    for (key, operand) in lowered {
        f.emit(Inst::CallRuntime {
            dst: None,
            call: RuntimeCall::StructSet,
            args: vec![
                Operand::Local(dst),
                Operand::Const(Value::String(key)),
                operand,
            ],
        });
    }
    (Operand::Local(dst), TypeTag::Struct)
}

fn lower_lambda(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    name: &str,
    params: &[String],
    captures: &[String],
    body: &[AstNode],
    location: TextLocation,
) -> (Operand, TypeTag) {
    // Resolve captures in the CURRENT scope; the snapshot happens here
    let mut capture_bindings: Vec<(StringId, Binding)> = Vec::with_capacity(captures.len());
    let mut capture_operands = Vec::with_capacity(captures.len());
    let mut inner_params = Vec::with_capacity(captures.len() + params.len());

    for (slot_index, capture) in captures.iter().enumerate() {
        let Some((stem_text, _)) = split_identifier(capture) else {
            ctx.messages.errors.push(CompileError::new_resolution_error(
                format!("capture '{capture}' has no recognized type suffix"),
                location,
            ));
            return poison();
        };
        let stem = ctx.strings.intern(stem_text);
        let Some(binding) = ctx.resolver.lookup(stem).cloned() else {
            ctx.messages.errors.push(CompileError::new_resolution_error(
                format!("cannot capture '{capture}': no such binding"),
                location,
            ));
            return poison();
        };

        capture_operands.push(match &binding.constant {
            Some(value) => Operand::Const(value.clone()),
            None => Operand::Local(binding.slot),
        });
        inner_params.push(Param {
            name: capture.clone(),
            tag: binding.declared,
        });
        // Inside the lambda the capture lives in its own frame slot
        capture_bindings.push((
            stem,
            Binding {
                declared: binding.declared,
                slot: LocalId::from_u32(slot_index as u32),
                constant: binding.constant,
            },
        ));
    }

    for param in params {
        let Some((_, tag)) = split_identifier(param) else {
            ctx.messages.errors.push(CompileError::new_resolution_error(
                format!("parameter '{param}' has no recognized type suffix"),
                location,
            ));
            return poison();
        };
        inner_params.push(Param {
            name: param.clone(),
            tag,
        });
    }

    let id = ctx.allocate_function_id();
    let function_name = ctx.unique_function_name(name);

    // Lambda bodies return dynamically typed values: the call site only
    // sees a Function value, never a static signature
    let inner = lower_function_body(
        ctx,
        id,
        function_name,
        inner_params,
        Some(TypeTag::Any),
        capture_bindings,
        body,
        location,
    );
    ctx.push_function(inner);

    let dst = f.new_local();
    f.emit(Inst::MakeClosure {
        dst,
        function: id,
        captures: capture_operands,
    });
    (Operand::Local(dst), TypeTag::Function)
}

fn lower_range(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    start: &Expression,
    end: &Expression,
    inclusive: bool,
    location: TextLocation,
) -> (Operand, TypeTag) {
    let (start_op, start_tag) = lower_expression(ctx, f, start);
    let (end_op, end_tag) = lower_expression(ctx, f, end);

    for tag in [start_tag, end_tag] {
        if !matches!(tag, TypeTag::Int | TypeTag::Any) {
            ctx.messages.errors.push(CompileError::new_type_error(
                format!("range ends must be Int, found {tag}"),
                location,
            ));
            return poison();
        }
    }

    if let (Operand::Const(s), Operand::Const(e)) = (&start_op, &end_op) {
        match operators::make_range(s, e, inclusive) {
            Ok(value) => return (Operand::Const(value), TypeTag::Range),
            Err(fault) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(fault.to_string(), location));
                return poison();
            }
        }
    }

    let call = if inclusive {
        RuntimeCall::Range
    } else {
        RuntimeCall::RangeExclusive
    };
    let result = emit_runtime_call(f, call, vec![start_op, end_op], TypeTag::Range);
    (result, TypeTag::Range)
}

// ---------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------

pub(super) fn emit_runtime_call(
    f: &mut FunctionBuilder,
    call: RuntimeCall,
    args: Vec<Operand>,
    result_tag: TypeTag,
) -> Operand {
    let dst = f.new_local();
    f.emit(Inst::CallRuntime {
        dst: Some(dst),
        call,
        args,
    });
    f.register_heap(dst, result_tag);
    Operand::Local(dst)
}

/// Bring an operand to the target tag: identity when it already fits,
/// compile-time fold for constants, a runtime cast call otherwise. Pairs
/// the cast engine can never satisfy are compile errors right here.
pub(super) fn coerce_operand(
    ctx: &mut LoweringContext,
    f: &mut FunctionBuilder,
    operand: Operand,
    from: TypeTag,
    to: TypeTag,
    location: TextLocation,
) -> Operand {
    if from == to || to == TypeTag::Any {
        return operand;
    }

    if let Operand::Const(value) = &operand {
        // Range literals bound to a list-typed name materialize eagerly
        if let (Value::Range(range), TypeTag::IntList) = (value, to) {
            return Operand::Const(Value::List(range.to_int_list()));
        }
        return match cast(value, to) {
            Ok(folded) => Operand::Const(folded),
            Err(fault) => {
                ctx.messages
                    .errors
                    .push(CompileError::new_type_error(fault.to_string(), location));
                operand
            }
        };
    }

    if !static_cast_possible(from, to) {
        ctx.messages.errors.push(CompileError::new_type_error(
            format!("a value of type {from} can never be cast to {to}"),
            location,
        ));
        return operand;
    }

    emit_runtime_call(f, RuntimeCall::Cast(to), vec![operand], to)
}

/// Whether ANY value of `from` could survive a cast to `to`. Pairs that
/// fail for every possible value are rejected at compile time.
fn static_cast_possible(from: TypeTag, to: TypeTag) -> bool {
    use TypeTag::*;
    if from == Any || to == Any || from == to {
        return true;
    }
    matches!(
        (from, to),
        (Int, Float)
            | (Float, Int)
            | (Int, String)
            | (String, Int)
            | (Float, String)
            | (String, Float)
            | (Bool, String)
            | (String, Bool)
            | (Range, IntList)
    ) || (from.is_list() && to == AnyList)
        || (from == AnyList && to.is_list())
}

fn runtime_call_for(op: Operator) -> RuntimeCall {
    match op {
        Operator::Add => RuntimeCall::Add,
        Operator::Subtract => RuntimeCall::Subtract,
        Operator::Multiply => RuntimeCall::Multiply,
        Operator::Divide => RuntimeCall::Divide,
        Operator::Modulo => RuntimeCall::Modulo,
        Operator::GreaterThan => RuntimeCall::GreaterThan,
        Operator::GreaterEqual => RuntimeCall::GreaterEqual,
        Operator::LessThan => RuntimeCall::LessThan,
        Operator::LessEqual => RuntimeCall::LessEqual,
        Operator::Equal => RuntimeCall::Equal,
        Operator::NotEqual => RuntimeCall::NotEqual,
        Operator::BitAnd => RuntimeCall::BitAnd,
        Operator::BitOr => RuntimeCall::BitOr,
        Operator::BitXor => RuntimeCall::BitXor,
        Operator::In => RuntimeCall::In,
        Operator::Elvis => RuntimeCall::Elvis,
        Operator::And | Operator::Or => {
            unreachable!("et/vel lower to branch structure before call selection")
        }
    }
}
