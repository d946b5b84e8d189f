use crate::chunk::{Constant, Function};
use crate::expr::{format_number, quote};
use crate::opcode::{Format, Instruction, Op};
use crate::registers::RK_BIAS;

/// Instruction listing of `function` and, after it, of every nested
/// function. `path` names the function in the headers (`main`, `main/0`, ...).
pub fn disassemble(function: &Function, path: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "function {} <{}:{}-{}> (params={}, upvalues={}, stack={}, vararg={})\n",
        path,
        function.source.as_deref().unwrap_or("?"),
        function.line_defined,
        function.last_line_defined,
        function.num_params,
        function.upvalue_names.len().max(function.num_upvalues as usize),
        function.max_stack_size,
        function.is_vararg
    ));

    if !function.constants.is_empty() {
        out.push_str("constants:\n");
        for (i, k) in function.constants.iter().enumerate() {
            out.push_str(&format!("{:05} {}\n", i, constant_text(k)));
        }
    }
    if !function.locals.is_empty() {
        out.push_str("locals:\n");
        for local in &function.locals {
            out.push_str(&format!(
                "      {:<18} {}-{}\n",
                local.name, local.start_pc, local.end_pc
            ));
        }
    }

    out.push_str("bytecode:\n");
    for (pc, ins) in function.code.iter().enumerate() {
        let line = pc + 1;
        out.push_str(&format!("{:05} {:<18} {}", pc, ins.op.name(), operands(ins)));
        let source_line = function.source_line(line);
        if source_line >= 0 {
            out.push_str(&format!(" [{source_line}]"));
        }
        if let Some(note) = annotation(function, ins, line) {
            out.push_str(" ; ");
            out.push_str(&note);
        }
        out.push('\n');
    }

    for (i, child) in function.functions.iter().enumerate() {
        out.push('\n');
        out.push_str(&disassemble(child, &format!("{path}/{i}")));
    }
    out
}

fn operands(ins: &Instruction) -> String {
    match ins.op.format() {
        Format::ABC => format!("{} {} {}", ins.a, ins.b, ins.c),
        Format::ABx => format!("{} {}", ins.a, ins.bx),
        Format::AsBx => format!("{} {}", ins.a, ins.sbx),
        // 5.1 `TFORLOOP A C` and 5.2 `TFORLOOP A sBx` share the opcode name
        Format::AsBxOr51 => format!("{} {} {}", ins.a, ins.sbx, ins.c),
        Format::Ax => format!("{}", ins.ax()),
    }
}

fn constant_text(constant: &Constant) -> String {
    match constant {
        Constant::Nil => "nil".to_owned(),
        Constant::Boolean(b) => b.to_string(),
        Constant::Number(n) => format_number(*n),
        Constant::String(bytes) => quote(bytes),
    }
}

fn rk_text(function: &Function, operand: u32) -> Option<String> {
    if operand < RK_BIAS {
        return None;
    }
    function
        .constants
        .get((operand - RK_BIAS) as usize)
        .map(constant_text)
}

fn annotation(function: &Function, ins: &Instruction, line: usize) -> Option<String> {
    let note = match ins.op {
        Op::LoadK | Op::GetGlobal | Op::SetGlobal => {
            constant_text(function.constants.get(ins.bx as usize)?)
        }
        Op::GetUpval | Op::SetUpval => function.upvalue_name(ins.b as usize),
        Op::GetTabUp => {
            let key = rk_text(function, ins.c).unwrap_or_else(|| format!("R{}", ins.c));
            format!("{}[{}]", function.upvalue_name(ins.b as usize), key)
        }
        Op::SetTabUp => {
            let key = rk_text(function, ins.b).unwrap_or_else(|| format!("R{}", ins.b));
            format!("{}[{}]", function.upvalue_name(ins.a as usize), key)
        }
        Op::Jmp | Op::ForLoop | Op::ForPrep => format!("to {}", ins.jump_target(line) - 1),
        Op::Closure => format!("function {}", ins.bx),
        Op::GetTable
        | Op::SetTable
        | Op::SelfOp
        | Op::Add
        | Op::Sub
        | Op::Mul
        | Op::Div
        | Op::Mod
        | Op::Pow
        | Op::Eq
        | Op::Lt
        | Op::Le => {
            let notes: Vec<String> = [ins.b, ins.c]
                .into_iter()
                .filter_map(|operand| rk_text(function, operand))
                .collect();
            if notes.is_empty() {
                return None;
            }
            notes.join(" ")
        }
        _ => return None,
    };
    Some(note)
}
