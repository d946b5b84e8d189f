use std::rc::Rc;

use log::debug;

use crate::chunk::{Constant, Function};
use crate::decl::{DeclId, Declarations};
use crate::error::{DecompileError, Result};
use crate::expr::{BinOp, Closure, Expression, FunctionCall, TableLiteral, UnOp, is_identifier};
use crate::opcode::{Instruction, Op};
use crate::operation::{BlockScope, DeferredOperation, Operation};
use crate::registers::{RK_BIAS, Registers};
use crate::statement::{Assignment, Statement};
use crate::target::Target;
use crate::version::Version;

mod structure;

/// Array slots stored per `SETLIST` batch.
const FIELDS_PER_FLUSH: usize = 50;

/// Decompiles one function (and, recursively, its closures) into a
/// statement list.
pub fn decompile_function(function: &Function, version: Version) -> Result<Vec<Statement>> {
    debug!(
        "decompiling function at line {} ({} instructions, {} constants)",
        function.line_defined,
        function.code.len(),
        function.constants.len()
    );
    let decls = declarations(function, version);
    let registers = Registers::new(
        function.max_stack_size as usize,
        &decls,
        &function.constants,
    );
    let mut pass = FunctionDecompiler {
        function,
        version,
        decls: &decls,
        registers,
        top: None,
        pending_functions: Vec::new(),
        last_assignment: None,
    };
    pass.run()
}

/// Parameter names of `function`, from debug info or as placeholders.
pub fn parameter_names(function: &Function) -> Vec<String> {
    (0..function.num_params as usize)
        .map(|i| {
            function
                .locals
                .get(i)
                .filter(|local| local.start_pc == 0)
                .map(|local| local.name.clone())
                .unwrap_or_else(|| format!("arg{i}"))
        })
        .collect()
}

fn declarations(function: &Function, version: Version) -> Declarations {
    let mut decls = if function.locals.is_empty() {
        Declarations::with_parameters(function.num_params as usize, function.code.len())
    } else {
        Declarations::from_locals(&function.locals)
    };
    for (pc, ins) in function.code.iter().enumerate() {
        let line = pc + 1;
        match ins.op {
            Op::ForPrep => decls.mark_loop_variables(ins.a as usize + 3, 1, line),
            Op::Jmp => {
                let tfor = ins
                    .jump_target(line)
                    .checked_sub(1)
                    .and_then(|pc| function.code.get(pc))
                    .filter(|target| target.op == version.tfor_target());
                if let Some(tfor) = tfor {
                    decls.mark_loop_variables(tfor.a as usize + 3, tfor.c as usize, line);
                }
            }
            _ => {}
        }
    }
    decls
}

/// Line and value timestamp of the last plain assignment, for folding
/// `a, b = x, y` back together.
#[derive(Debug, Clone, Copy)]
struct LastAssignment {
    line: usize,
    updated: usize,
}

pub(crate) struct FunctionDecompiler<'a> {
    function: &'a Function,
    version: Version,
    decls: &'a Declarations,
    registers: Registers<'a>,
    /// Register holding an open multi-result value (`CALL ... 0`, `VARARG
    /// ... 0`), consumed by the next `B == 0` instruction.
    top: Option<usize>,
    /// `local function` declarations waiting for their `CLOSURE`.
    pending_functions: Vec<DeclId>,
    last_assignment: Option<LastAssignment>,
}

impl<'a> FunctionDecompiler<'a> {
    fn run(&mut self) -> Result<Vec<Statement>> {
        let length = self.function.code.len() as isize;
        let end = (length + 1 + self.version.outer_scope_adjustment()).max(1) as usize;
        let num_params = self.function.num_params as usize;

        let mut out = Vec::new();
        let initial: Vec<DeclId> = self
            .decls
            .iter()
            .filter(|(_, d)| d.begin == 0 && d.register >= num_params && !d.for_loop)
            .map(|(id, _)| id)
            .collect();
        let (functions, plain): (Vec<DeclId>, Vec<DeclId>) =
            initial.into_iter().partition(|id| self.is_local_function(*id));
        self.pending_functions.extend(functions);
        if !plain.is_empty() {
            let locals = plain.iter().map(|id| self.registers.local_ref(*id)).collect();
            let op = Operation::Deferred(DeferredOperation::DeclareLocals { line: 0, locals });
            if let Some(statement) = op.process(&mut self.registers, &BlockScope::default())? {
                out.push(statement);
            }
        }
        out.extend(self.block(1, end, &BlockScope::default())?);
        Ok(out)
    }

    fn instruction_at(&self, line: usize) -> Option<&'a Instruction> {
        let code: &'a [Instruction] = &self.function.code;
        line.checked_sub(1).and_then(|pc| code.get(pc))
    }

    fn instruction(&self, line: usize) -> Result<&'a Instruction> {
        self.instruction_at(line)
            .ok_or_else(|| DecompileError::shape(line, "control flow leaves the function"))
    }

    fn block(&mut self, begin: usize, end: usize, scope: &BlockScope) -> Result<Vec<Statement>> {
        let mut out = Vec::new();
        let mut line = begin;
        while line < end {
            line = match self.structured(line, end, scope, &mut out)? {
                Some(next) => next,
                None => self.straight(line, scope, &mut out)?,
            };
        }
        Ok(out)
    }

    fn straight(
        &mut self,
        line: usize,
        scope: &BlockScope,
        out: &mut Vec<Statement>,
    ) -> Result<usize> {
        let mark = out.len();
        let source = self.value_source(line);
        let (ops, next) = self.translate(line, scope)?;
        for op in ops {
            if let Some(statement) = op.process(&mut self.registers, scope)? {
                self.emit(out, statement, line, source);
            }
        }
        for consumed in line..next {
            self.declare_new_locals(consumed, out, mark);
        }
        Ok(next)
    }

    fn emit(
        &mut self,
        out: &mut Vec<Statement>,
        statement: Statement,
        line: usize,
        source: Option<usize>,
    ) {
        let Statement::Assignment(mut assignment) = statement else {
            self.last_assignment = None;
            out.push(statement);
            return;
        };
        self.claim_local_function(&mut assignment);
        let updated = source.map(|register| (register, self.registers.get_updated(register, line)));
        if let Some((register, updated)) = updated {
            if !assignment.is_declaration() && self.continues_assignment(out, line, register, updated) {
                if let (Some(Statement::Assignment(previous)), Some((target, value))) =
                    (out.last_mut(), assignment.clone().into_single())
                {
                    let shared = value.is_multiple_source()
                        && self.last_assignment.is_some_and(|l| l.updated == updated);
                    if shared {
                        previous.add_first_target(target);
                    } else {
                        previous.add_first(target, value);
                    }
                    self.last_assignment = Some(LastAssignment { line, updated });
                    return;
                }
            }
        }
        self.last_assignment = if assignment.is_declaration() {
            None
        } else {
            Some(LastAssignment {
                line,
                updated: updated.map_or(line, |(_, u)| u),
            })
        };
        out.push(Statement::Assignment(assignment));
    }

    // A store whose value was computed before the previous store belongs to
    // the same multiple assignment.
    fn continues_assignment(
        &self,
        out: &[Statement],
        line: usize,
        register: usize,
        updated: usize,
    ) -> bool {
        let Some(last) = self.last_assignment else {
            return false;
        };
        last.line + 1 == line
            && updated < last.line
            && !self.registers.is_local(register, line - 1)
            && matches!(out.last(), Some(Statement::Assignment(a)) if !a.is_declaration())
    }

    fn claim_local_function(&mut self, assignment: &mut Assignment) {
        let [Target::Variable(local)] = assignment.targets() else {
            return;
        };
        let id = local.id;
        if let Some(pos) = self.pending_functions.iter().position(|p| *p == id) {
            self.pending_functions.remove(pos);
            assignment.declare();
        }
    }

    /// A local opening one line before the `CLOSURE` that fills its
    /// register.
    fn is_local_function(&self, id: DeclId) -> bool {
        let decl = self.decls.get(id);
        self.instruction_at(decl.begin + 1)
            .is_some_and(|ins| ins.op == Op::Closure && ins.a as usize == decl.register)
    }

    /// Turns the assignments of `line` to locals opening there into one
    /// `local` statement.
    fn declare_new_locals(&mut self, line: usize, out: &mut Vec<Statement>, mark: usize) {
        let new_locals = self.registers.new_locals(line);
        if new_locals.is_empty() {
            return;
        }
        let (functions, ids): (Vec<DeclId>, Vec<DeclId>) = new_locals
            .into_iter()
            .partition(|id| self.is_local_function(*id));
        self.pending_functions.extend(functions);
        if ids.is_empty() {
            return;
        }

        let mark = mark.min(out.len());
        let emitted = out.split_off(mark);
        out.extend(emitted.into_iter().filter(|statement| match statement {
            Statement::Assignment(a) => !a
                .targets()
                .iter()
                .all(|t| t.local().is_some_and(|id| ids.contains(&id))),
            _ => true,
        }));

        let mut values: Vec<Expression> = Vec::with_capacity(ids.len());
        let mut previous: Option<(usize, bool)> = None;
        for id in &ids {
            let register = self.registers.register_of(*id);
            let value = self.registers.value_at(register, line);
            let updated = self.registers.get_updated(register, line);
            let multiple = value.is_multiple_source();
            if multiple && previous == Some((updated, true)) {
                continue;
            }
            previous = Some((updated, multiple));
            values.push(value);
        }
        while values.len() > 1 && values.last().is_some_and(Expression::is_nil) {
            values.pop();
        }
        let targets = ids
            .iter()
            .map(|id| Target::Variable(self.registers.local_ref(*id)))
            .collect();
        self.last_assignment = None;
        out.push(Statement::Assignment(Assignment::declaration(targets, values)));
    }

    fn value_source(&self, line: usize) -> Option<usize> {
        let ins = self.instruction_at(line)?;
        let register = match ins.op {
            Op::Move => ins.b,
            Op::SetGlobal | Op::SetUpval => ins.a,
            Op::SetTable | Op::SetTabUp => ins.c,
            _ => return None,
        };
        (register < RK_BIAS).then_some(register as usize)
    }

    fn expr(&self, register: u32, line: usize) -> Expression {
        self.registers.get_expression(register as usize, line)
    }

    fn rk(&self, operand: u32, line: usize) -> Result<Expression> {
        self.registers.get_k_expression(operand, line)
    }

    /// `_ENV.name` in 5.2 reads as a global.
    fn env_global(&self, upvalue: u32, key: u32) -> Option<String> {
        if key < RK_BIAS || self.function.upvalue_name(upvalue as usize) != "_ENV" {
            return None;
        }
        match self.function.constants.get((key - RK_BIAS) as usize) {
            Some(constant @ Constant::String(_)) => {
                constant.as_str().filter(|s| is_identifier(s)).map(str::to_owned)
            }
            _ => None,
        }
    }

    fn take_top(&mut self, line: usize) -> Result<usize> {
        self.top
            .take()
            .ok_or_else(|| DecompileError::shape(line, "open operand count without a multi-result value"))
    }

    /// Operations of the instruction at `line`, and the first line after the
    /// instructions it consumed.
    fn translate(&mut self, line: usize, scope: &BlockScope) -> Result<(Vec<Operation>, usize)> {
        let ins = *self.instruction(line)?;
        let a = ins.a as usize;
        let mut next = line + 1;
        let set = |register: usize, value: Expression| Operation::RegisterSet {
            line,
            register,
            value,
        };
        let ops = match ins.op {
            Op::Move => vec![set(a, self.expr(ins.b, line))],
            Op::LoadK => vec![set(a, self.registers.constant(ins.bx as usize)?)],
            Op::LoadKx => {
                let extra = self.instruction(line + 1)?;
                next += 1;
                vec![set(a, self.registers.constant(extra.ax() as usize)?)]
            }
            Op::LoadBool => {
                if ins.c != 0 {
                    return Err(DecompileError::shape(line, "LOADBOOL skip outside of a comparison"));
                }
                vec![set(a, Expression::boolean(ins.b != 0))]
            }
            Op::LoadNil => {
                let range = self.version.loadnil_range(ins.a, ins.b);
                let (first, last) = (*range.start() as usize, *range.end() as usize);
                if first == last {
                    vec![set(a, Expression::nil())]
                } else {
                    vec![Operation::MultipleRegisterSet {
                        line,
                        first,
                        last,
                        value: Expression::nil(),
                    }]
                }
            }
            Op::GetUpval => vec![set(
                a,
                Expression::Upvalue(self.function.upvalue_name(ins.b as usize)),
            )],
            Op::GetGlobal => vec![set(
                a,
                Expression::Global(self.registers.constant_name(ins.bx as usize)?),
            )],
            Op::GetTabUp => {
                let value = match self.env_global(ins.b, ins.c) {
                    Some(name) => Expression::Global(name),
                    None => Expression::index(
                        Expression::Upvalue(self.function.upvalue_name(ins.b as usize)),
                        self.rk(ins.c, line)?,
                    ),
                };
                vec![set(a, value)]
            }
            Op::GetTable => vec![set(
                a,
                Expression::index(self.expr(ins.b, line), self.rk(ins.c, line)?),
            )],
            Op::SetGlobal => vec![Operation::GlobalSet {
                line,
                name: self.registers.constant_name(ins.bx as usize)?,
                value: self.expr(ins.a, line),
            }],
            Op::SetTabUp => {
                let value = self.rk(ins.c, line)?;
                match self.env_global(ins.a, ins.b) {
                    Some(name) => vec![Operation::GlobalSet { line, name, value }],
                    None => vec![Operation::TableSet {
                        line,
                        table: Expression::Upvalue(self.function.upvalue_name(a)),
                        table_register: None,
                        index: self.rk(ins.b, line)?,
                        value,
                        is_list: false,
                        timestamp: line,
                    }],
                }
            }
            Op::SetUpval => vec![Operation::UpvalueSet {
                line,
                name: self.function.upvalue_name(ins.b as usize),
                value: self.expr(ins.a, line),
            }],
            Op::SetTable => vec![Operation::TableSet {
                line,
                table: self.expr(ins.a, line),
                table_register: Some(a),
                index: self.rk(ins.b, line)?,
                value: self.rk(ins.c, line)?,
                is_list: false,
                timestamp: line,
            }],
            Op::NewTable => vec![set(a, Expression::Table(TableLiteral::default()))],
            Op::SelfOp => {
                let object = self.expr(ins.b, line);
                let method = Expression::Method {
                    object: Box::new(object.clone()),
                    key: Box::new(self.rk(ins.c, line)?),
                };
                vec![set(a + 1, object), set(a, method)]
            }
            Op::Add | Op::Sub | Op::Mul | Op::Div | Op::Mod | Op::Pow => {
                let op = match ins.op {
                    Op::Add => BinOp::Add,
                    Op::Sub => BinOp::Sub,
                    Op::Mul => BinOp::Mul,
                    Op::Div => BinOp::Div,
                    Op::Mod => BinOp::Mod,
                    _ => BinOp::Pow,
                };
                vec![set(
                    a,
                    Expression::binary(op, self.rk(ins.b, line)?, self.rk(ins.c, line)?),
                )]
            }
            Op::Unm | Op::Not | Op::Len => {
                let op = match ins.op {
                    Op::Unm => UnOp::Neg,
                    Op::Not => UnOp::Not,
                    _ => UnOp::Len,
                };
                vec![set(a, Expression::unary(op, self.expr(ins.b, line)))]
            }
            Op::Concat => {
                let mut value = self.expr(ins.c, line);
                for register in (ins.b..ins.c).rev() {
                    value = Expression::binary(BinOp::Concat, self.expr(register, line), value);
                }
                vec![set(a, value)]
            }
            Op::Jmp => {
                let target = ins.jump_target(line);
                if target == line + 1 {
                    vec![]
                } else if scope.loop_exit == Some(target) {
                    vec![Operation::Deferred(DeferredOperation::Break { line })]
                } else {
                    return Err(DecompileError::shape(line, format!("unstructured jump to {target}")));
                }
            }
            Op::Eq | Op::Lt | Op::Le | Op::Test | Op::TestSet => {
                return Err(DecompileError::shape(line, "condition outside of a recognized block"));
            }
            Op::Call | Op::TailCall => {
                let call = self.call(&ins, line)?;
                if ins.op == Op::TailCall {
                    if self.instruction_at(next).is_some_and(|i| i.op == Op::Return) {
                        next += 1;
                    }
                    let call = FunctionCall {
                        multiple: true,
                        ..call
                    };
                    vec![Operation::Return {
                        line,
                        values: vec![Expression::Call(call)],
                    }]
                } else {
                    match ins.c {
                        0 => {
                            self.top = Some(a);
                            vec![set(a, Expression::Call(call))]
                        }
                        1 => vec![Operation::Call { line, call }],
                        2 => vec![set(a, Expression::Call(call))],
                        c => vec![Operation::MultipleRegisterSet {
                            line,
                            first: a,
                            last: a + c as usize - 2,
                            value: Expression::Call(call),
                        }],
                    }
                }
            }
            Op::Return => {
                let last = match ins.b {
                    0 => Some(self.take_top(line)?),
                    1 => None,
                    b => Some(a + b as usize - 2),
                };
                if last.is_none() && line == self.function.code.len() {
                    vec![]
                } else {
                    let values = match last {
                        Some(last) => (a..=last).map(|r| self.expr(r as u32, line)).collect(),
                        None => Vec::new(),
                    };
                    vec![Operation::Return { line, values }]
                }
            }
            Op::ForLoop | Op::ForPrep | Op::TForLoop | Op::TForCall => {
                return Err(DecompileError::shape(line, "loop instruction outside of a loop"));
            }
            Op::SetList => {
                let count = match ins.b {
                    0 => self.take_top(line)?.saturating_sub(a),
                    b => b as usize,
                };
                let batch = match ins.c {
                    0 => {
                        next += 1;
                        self.instruction(line + 1)?.ax() as usize
                    }
                    c => c as usize,
                };
                let table = self.expr(ins.a, line);
                (1..=count)
                    .map(|j| Operation::TableSet {
                        line,
                        table: table.clone(),
                        table_register: Some(a),
                        index: Expression::number((batch.saturating_sub(1) * FIELDS_PER_FLUSH + j) as f64),
                        value: self.registers.get_expression(a + j, line),
                        is_list: true,
                        timestamp: self.registers.get_updated(a + j, line),
                    })
                    .collect()
            }
            Op::Close | Op::ExtraArg => vec![],
            Op::Closure => {
                let (closure, consumed) = self.closure(&ins, line)?;
                next += consumed;
                vec![set(a, Expression::Closure(Rc::new(closure)))]
            }
            Op::Vararg => match ins.b {
                0 => {
                    self.top = Some(a);
                    vec![set(a, Expression::Vararg { multiple: true })]
                }
                1 => vec![],
                2 => vec![set(a, Expression::Vararg { multiple: false })],
                b => vec![Operation::MultipleRegisterSet {
                    line,
                    first: a,
                    last: a + b as usize - 2,
                    value: Expression::Vararg { multiple: true },
                }],
            },
        };
        Ok((ops, next))
    }

    fn call(&mut self, ins: &Instruction, line: usize) -> Result<FunctionCall> {
        let a = ins.a as usize;
        let last = match ins.b {
            0 => self.take_top(line)?,
            b => a + b as usize - 1,
        };
        let args = (a + 1..=last)
            .map(|r| self.registers.get_expression(r, line))
            .collect();
        Ok(FunctionCall {
            function: Box::new(self.expr(ins.a, line)),
            args,
            multiple: ins.c == 0,
        })
    }

    /// Decompiles the nested function of a `CLOSURE` and returns it with the
    /// number of upvalue pseudo-instructions that follow it.
    fn closure(&self, ins: &Instruction, line: usize) -> Result<(Closure, usize)> {
        let child = self
            .function
            .functions
            .get(ins.bx as usize)
            .ok_or(DecompileError::Unsupported("closure index out of range"))?;
        let mut registers = Vec::new();
        let mut consumed = 0;
        if self.version.upvalues_inline() {
            consumed = child.num_upvalues as usize;
            for k in 1..=consumed {
                let pseudo = self.instruction(line + k)?;
                if pseudo.op == Op::Move {
                    registers.push(pseudo.b as usize);
                }
            }
        } else {
            registers.extend(
                child
                    .upvalues
                    .iter()
                    .filter(|u| u.in_stack)
                    .map(|u| u.index as usize),
            );
        }
        // The closure's own register is the local it initializes, whose
        // scope opens once the upvalue instructions are done.
        let opened = line + consumed;
        let captured = registers
            .into_iter()
            .filter_map(|register| {
                let at = if register == ins.a as usize { opened } else { line };
                self.registers.get_declaration(register, at)
            })
            .collect();
        let body = decompile_function(child, self.version)?;
        let closure = Closure {
            params: parameter_names(child),
            is_vararg: child.is_vararg,
            body,
            captured,
        };
        Ok((closure, consumed))
    }

    /// Registers written by a side-effect-free instruction, or `None` when
    /// the instruction does more than write registers.
    fn pure_writes(&self, line: usize) -> Option<Vec<usize>> {
        let ins = self.instruction_at(line)?;
        let a = ins.a as usize;
        let writes = match ins.op {
            Op::Move
            | Op::LoadK
            | Op::GetUpval
            | Op::GetGlobal
            | Op::GetTabUp
            | Op::GetTable
            | Op::NewTable
            | Op::Add
            | Op::Sub
            | Op::Mul
            | Op::Div
            | Op::Mod
            | Op::Pow
            | Op::Unm
            | Op::Not
            | Op::Len
            | Op::Concat => vec![a],
            Op::LoadBool if ins.c == 0 => vec![a],
            Op::Call if ins.c == 2 => vec![a],
            Op::Vararg if ins.b == 2 => vec![a],
            Op::SelfOp => vec![a, a + 1],
            Op::LoadNil => self
                .version
                .loadnil_range(ins.a, ins.b)
                .map(|r| r as usize)
                .collect(),
            _ => return None,
        };
        Some(writes)
    }

    /// Computes temporaries only, so it can sit inside a condition.
    fn is_filler(&self, line: usize) -> bool {
        self.pure_writes(line).is_some_and(|writes| {
            writes
                .iter()
                .all(|r| !self.registers.is_assignable(*r, line))
        }) && self.registers.new_locals(line).is_empty()
    }

    fn absorb(&mut self, line: usize) -> Result<()> {
        let (ops, _) = self.translate(line, &BlockScope::default())?;
        for op in ops {
            if op.process(&mut self.registers, &BlockScope::default())?.is_some() {
                return Err(DecompileError::shape(line, "statement inside a condition"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LocalVar;
    use crate::output::Output;

    fn function(code: Vec<Instruction>, constants: Vec<Constant>, locals: &[(&str, usize, usize)]) -> Function {
        Function {
            source: None,
            line_defined: 0,
            last_line_defined: 0,
            num_upvalues: 0,
            num_params: 0,
            is_vararg: true,
            max_stack_size: 8,
            code,
            constants,
            functions: vec![],
            upvalues: vec![],
            line_info: vec![],
            locals: locals
                .iter()
                .map(|(name, start_pc, end_pc)| LocalVar {
                    name: name.to_string(),
                    start_pc: *start_pc,
                    end_pc: *end_pc,
                })
                .collect(),
            upvalue_names: vec![],
        }
    }

    fn source(function: &Function) -> String {
        let body = decompile_function(function, Version::Lua51).unwrap();
        let mut text = String::new();
        let mut out = Output::new(&mut text, 2);
        Statement::print_sequence(&mut out, &body);
        text
    }

    fn s(value: &str) -> Constant {
        Constant::String(value.as_bytes().to_vec())
    }

    #[test]
    fn equality_guarded_assignment() {
        // local a, b; if a == 1 then b = 2 end
        let f = function(
            vec![
                Instruction::abc(Op::LoadNil, 0, 1, 0),
                Instruction::abc(Op::Eq, 0, 0, RK_BIAS),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::LoadK, 1, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![Constant::Number(1.0), Constant::Number(2.0)],
            &[("a", 1, 5), ("b", 1, 5)],
        );
        assert_eq!(source(&f), "local a, b\nif a == 1 then\n  b = 2\nend\n");
    }

    #[test]
    fn global_calls_and_multiple_assignment() {
        // x, y = 1, 2; print(x)
        let f = function(
            vec![
                Instruction::abx(Op::LoadK, 0, 2),
                Instruction::abx(Op::LoadK, 1, 3),
                Instruction::abx(Op::SetGlobal, 1, 1),
                Instruction::abx(Op::SetGlobal, 0, 0),
                Instruction::abx(Op::GetGlobal, 0, 4),
                Instruction::abx(Op::GetGlobal, 1, 0),
                Instruction::abc(Op::Call, 0, 2, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("x"), s("y"), Constant::Number(1.0), Constant::Number(2.0), s("print")],
            &[],
        );
        assert_eq!(source(&f), "x, y = 1, 2\nprint(x)\n");
    }

    #[test]
    fn method_calls_and_table_literals() {
        // local t = {1, 2, n = 3}; t:go()
        let f = function(
            vec![
                Instruction::abc(Op::NewTable, 0, 2, 1),
                Instruction::abx(Op::LoadK, 1, 0),
                Instruction::abx(Op::LoadK, 2, 1),
                Instruction::abc(Op::SetTable, 0, RK_BIAS + 2, RK_BIAS + 3),
                Instruction::abc(Op::SetList, 0, 2, 1),
                Instruction::abc(Op::SelfOp, 1, 0, RK_BIAS + 4),
                Instruction::abc(Op::Call, 1, 2, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![
                Constant::Number(1.0),
                Constant::Number(2.0),
                s("n"),
                Constant::Number(3.0),
                s("go"),
            ],
            &[("t", 5, 8)],
        );
        assert_eq!(source(&f), "local t = {\n  1,\n  2,\n  n = 3\n}\nt:go()\n");
    }
}
