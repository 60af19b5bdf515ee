//! LIR pretty-printing.
//!
//! Human-readable rendering of a lowered module for debugging and for
//! the driver's text output mode. The JSON form is the machine contract;
//! this one is for eyes.

use crate::compiler::lir::nodes::{
    FunctionTable, Inst, LirFunction, LirModule, LocalId, Operand, Param,
};

pub fn display_lir(module: &LirModule) -> String {
    let mut output = String::new();

    output.push_str("=== Ago LIR Module ===\n\n");

    if !module.table.is_empty() {
        output.push_str("--- Function table ---\n");
        output.push_str(&display_function_table(&module.table));
        output.push('\n');
    }

    for function in &module.functions {
        output.push_str(&display_lir_function(function));
        output.push('\n');
    }

    output
}

pub fn display_function_table(table: &FunctionTable) -> String {
    let mut output = String::new();
    for info in table.infos() {
        let params: Vec<String> = info.params.iter().map(display_param).collect();
        let returns = match info.return_tag {
            Some(tag) => tag.to_string(),
            None => "nothing".to_string(),
        };
        output.push_str(&format!(
            "  #{} {}({}) -> {}\n",
            info.id.as_u32(),
            info.name,
            params.join(", "),
            returns
        ));
    }
    output
}

pub fn display_lir_function(function: &LirFunction) -> String {
    let mut output = String::new();

    let params: Vec<String> = function.params.iter().map(display_param).collect();
    let returns = match function.return_tag {
        Some(tag) => tag.to_string(),
        None => "nothing".to_string(),
    };
    output.push_str(&format!(
        "fn #{} {}({}) -> {} [{} locals] {{\n",
        function.id.as_u32(),
        function.name,
        params.join(", "),
        returns,
        function.local_count
    ));
    for inst in &function.body {
        output.push_str(&display_inst(inst));
    }
    output.push_str("}\n");
    output
}

fn display_param(param: &Param) -> String {
    format!("{}: {}", param.name, param.tag)
}

pub fn display_inst(inst: &Inst) -> String {
    match inst {
        // Labels sit flush left so jump targets stand out
        Inst::Label(label) => format!("L{}:\n", label.as_u32()),
        Inst::Jump(label) => format!("  jump L{}\n", label.as_u32()),
        Inst::Branch {
            condition,
            if_false,
        } => format!(
            "  branch {} else L{}\n",
            display_operand(condition),
            if_false.as_u32()
        ),
        Inst::Store { dst, src } => {
            format!("  l{} := {}\n", dst.as_u32(), display_operand(src))
        }
        Inst::Call {
            dst,
            function,
            args,
        } => format!(
            "  {}call #{}({})\n",
            display_dst(dst),
            function.as_u32(),
            display_operands(args)
        ),
        Inst::CallIndirect { dst, callee, args } => format!(
            "  {}call_indirect {}({})\n",
            display_dst(dst),
            display_operand(callee),
            display_operands(args)
        ),
        Inst::CallRuntime { dst, call, args } => format!(
            "  {}{}({})\n",
            display_dst(dst),
            call.name(),
            display_operands(args)
        ),
        Inst::Alloc { dst, tag, capacity } => {
            format!("  l{} := alloc {tag} capacity {capacity}\n", dst.as_u32())
        }
        Inst::Free { target, tag } => format!("  free l{} ({tag})\n", target.as_u32()),
        Inst::MakeClosure {
            dst,
            function,
            captures,
        } => format!(
            "  l{} := closure #{} [{}]\n",
            dst.as_u32(),
            function.as_u32(),
            display_operands(captures)
        ),
        Inst::Return(None) => "  return\n".to_string(),
        Inst::Return(Some(operand)) => format!("  return {}\n", display_operand(operand)),
    }
}

fn display_dst(dst: &Option<LocalId>) -> String {
    match dst {
        Some(local) => format!("l{} := ", local.as_u32()),
        None => String::new(),
    }
}

fn display_operands(operands: &[Operand]) -> String {
    let rendered: Vec<String> = operands.iter().map(display_operand).collect();
    rendered.join(", ")
}

pub fn display_operand(operand: &Operand) -> String {
    match operand {
        Operand::Const(value) => value.describe(),
        Operand::Local(local) => format!("l{}", local.as_u32()),
        Operand::FunctionRef(function) => format!("#{}", function.as_u32()),
    }
}
