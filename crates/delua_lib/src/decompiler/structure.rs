//! Block recovery: loops, `if` chains and short-circuit values, read off
//! the jump layout the Lua compilers produce.

use log::{debug, trace, warn};

use super::FunctionDecompiler;
use crate::branch::{Branch, Link, Range, fold_chain};
use crate::chunk::Constant;
use crate::error::{DecompileError, Result};
use crate::expr::Expression;
use crate::opcode::Op;
use crate::operation::{BlockScope, Operation};
use crate::statement::Statement;

/// One `TEST`/`TESTSET` of a short-circuit value and its jump.
struct ValueLeaf {
    line: usize,
    test: usize,
    target: usize,
    testset: bool,
    /// Jumps when the tested value is true.
    or: bool,
    landing: usize,
}

struct ValueChain {
    register: usize,
    exit: usize,
}

struct ValueOperands<'a> {
    leaves: &'a [ValueLeaf],
    /// First line of each operand; the last one ends at `exit`.
    starts: &'a [usize],
    register: usize,
    exit: usize,
}

impl ValueOperands<'_> {
    fn operand(&self, index: usize, tail: &Branch) -> Branch {
        match self.leaves.get(index) {
            Some(leaf) => Branch::TestSet {
                test: leaf.test,
                target: self.register,
                invert: leaf.or,
                range: Range::new(leaf.line, leaf.line, self.exit),
            },
            None => tail.clone(),
        }
    }
}

// Operands `first..=last` as one `and`/`or` tree. A true value leaving the
// tree goes to `on_true`, a false one to `on_false`. The split leaf of
// `x or y` jumps to `on_true`, and inside `x` a false value goes on to `y`;
// `x and y` is the mirror image.
fn value_tree(
    operands: &ValueOperands<'_>,
    first: usize,
    last: usize,
    on_true: usize,
    on_false: usize,
    tail: &Branch,
) -> Option<Branch> {
    if first == last {
        return Some(operands.operand(first, tail));
    }
    for split in (first + 1..=last).rev() {
        let leaf = &operands.leaves[split - 1];
        let next = operands.starts[split];
        let left = if leaf.or {
            if leaf.landing != on_true {
                continue;
            }
            value_tree(operands, first, split - 1, on_true, next, tail)
        } else {
            if leaf.landing != on_false {
                continue;
            }
            value_tree(operands, first, split - 1, next, on_false, tail)
        };
        let Some(left) = left else {
            continue;
        };
        let Some(right) = value_tree(operands, split, last, on_true, on_false, tail) else {
            continue;
        };
        return Some(if leaf.or {
            Branch::or(left, right)
        } else {
            Branch::and(left, right)
        });
    }
    None
}

impl FunctionDecompiler<'_> {
    /// Recovers the construct opening at `line`, if any, and returns the
    /// line after it.
    pub(super) fn structured(
        &mut self,
        line: usize,
        end: usize,
        scope: &BlockScope,
        out: &mut Vec<Statement>,
    ) -> Result<Option<usize>> {
        if let Some(back) = self.back_jump(line, end) {
            return self.repeat_or_while(line, back, out).map(Some);
        }
        let ins = *self.instruction(line)?;
        match ins.op {
            Op::ForPrep => self.numeric_for(line, out).map(Some),
            Op::Jmp if self.is_generic_for(line) => self.generic_for(line, out).map(Some),
            op if op.is_condition() => self.condition(line, end, scope, out).map(Some),
            _ => Ok(None),
        }
    }

    /// Last `JMP` in `(head, end)` jumping back to `head`.
    fn back_jump(&self, head: usize, end: usize) -> Option<usize> {
        (head + 1..end).rev().find(|&j| {
            self.instruction_at(j)
                .is_some_and(|ins| ins.op == Op::Jmp && ins.jump_target(j) == head)
        })
    }

    fn repeat_or_while(&mut self, head: usize, back: usize, out: &mut Vec<Statement>) -> Result<usize> {
        let exit = back + 1;
        let scope = BlockScope::in_loop(exit);
        let closes_with_condition = back
            .checked_sub(1)
            .and_then(|l| self.instruction_at(l))
            .is_some_and(|ins| ins.op.is_condition());

        if closes_with_condition {
            if let Some((start, link)) = self.until_condition(head, back)? {
                let body = self.block(head, start, &scope)?;
                self.absorb_link(&link)?;
                let condition = link.branch.as_expression(&self.registers)?;
                self.emit(out, Statement::Repeat { body, condition }, head, None);
                return Ok(exit);
            }
        }

        let mut first = head;
        while first < back && self.is_filler(first) {
            first += 1;
        }
        let is_condition = self
            .instruction_at(first)
            .is_some_and(|ins| ins.op.is_condition());
        if is_condition {
            let links = self.collect_links(first, back);
            if let Some((_, link)) = self.fold_prefix(&links, |l| l.target == exit)? {
                for filler in head..first {
                    self.absorb(filler)?;
                }
                self.absorb_link(&link)?;
                let condition = link.branch.as_expression(&self.registers)?;
                let body = self.block(link.fall, back, &scope)?;
                self.emit(out, Statement::While { condition, body }, head, None);
                return Ok(exit);
            }
        }

        debug!("loop at line {head} has no exit condition, reading it as `while true`");
        let condition = Branch::True {
            register: 0,
            invert: false,
            range: Range::new(head, head, exit),
        }
        .as_expression(&self.registers)?;
        let body = self.block(head, back, &scope)?;
        self.emit(out, Statement::While { condition, body }, head, None);
        Ok(exit)
    }

    // The `until` chain is the longest run of conditions closing the loop
    // whose jumps all fall out of it or go back to its head.
    fn until_condition(&mut self, head: usize, back: usize) -> Result<Option<(usize, Link)>> {
        for start in head..back {
            let starts_chain = self
                .instruction_at(start)
                .is_some_and(|ins| ins.op.is_condition());
            if !starts_chain {
                continue;
            }
            let links = self.collect_links(start, back + 1);
            if links.last().is_none_or(|l| l.fall != back + 1) {
                continue;
            }
            let count = links.len();
            if let Some(link) = fold_chain(links)? {
                if link.target == head {
                    trace!("until condition at lines {start}..={back} ({count} links)");
                    return Ok(Some((start, link)));
                }
            }
        }
        Ok(None)
    }

    fn numeric_for(&mut self, line: usize, out: &mut Vec<Statement>) -> Result<usize> {
        let ins = *self.instruction(line)?;
        let loop_line = ins.jump_target(line);
        let closing = self.instruction(loop_line)?;
        if closing.op != Op::ForLoop {
            return Err(DecompileError::shape(line, "FORPREP without a matching FORLOOP"));
        }
        let a = ins.a as usize;
        let start = self.registers.get_value(a, line);
        let limit = self.registers.get_value(a + 1, line);
        let step = self.registers.get_value(a + 2, line);
        let step = match &step {
            Expression::Constant(Constant::Number(n)) if *n == 1.0 => None,
            _ => Some(step),
        };
        let variable = self.loop_variable_name(a + 3, line)?;
        let body = self.block(line + 1, loop_line, &BlockScope::in_loop(loop_line + 1))?;
        self.emit(
            out,
            Statement::NumericFor {
                variable,
                start,
                limit,
                step,
                body,
            },
            line,
            None,
        );
        Ok(loop_line + 1)
    }

    fn is_generic_for(&self, line: usize) -> bool {
        self.instruction_at(line)
            .map(|ins| ins.jump_target(line))
            .and_then(|target| self.instruction_at(target))
            .is_some_and(|ins| ins.op == self.version.tfor_target())
    }

    fn generic_for(&mut self, line: usize, out: &mut Vec<Statement>) -> Result<usize> {
        let call_line = self.instruction(line)?.jump_target(line);
        let call = *self.instruction(call_line)?;
        let closing = *self.instruction(call_line + 1)?;
        let loops_back = self.version.is_breakable_loop_end(closing.op)
            && closing.jump_target(call_line + 1) == line + 1;
        if !loops_back {
            return Err(DecompileError::shape(line, "generic for without its back jump"));
        }

        let a = call.a as usize;
        let mut values: Vec<Expression> = Vec::with_capacity(3);
        let mut previous: Option<usize> = None;
        for register in a..a + 3 {
            let value = self.registers.get_value(register, line);
            let updated = self.registers.get_updated(register, line - 1);
            if value.is_multiple_source() && previous == Some(updated) {
                continue;
            }
            previous = value.is_multiple_source().then_some(updated);
            values.push(value);
        }
        while values.len() > 1 && values.last().is_some_and(Expression::is_nil) {
            values.pop();
        }

        let variables = (0..call.c as usize)
            .map(|i| self.loop_variable_name(a + 3 + i, line))
            .collect::<Result<Vec<_>>>()?;
        let exit = call_line + 2;
        let body = self.block(line + 1, call_line, &BlockScope::in_loop(exit))?;
        self.emit(
            out,
            Statement::GenericFor {
                variables,
                values,
                body,
            },
            line,
            None,
        );
        Ok(exit)
    }

    fn loop_variable_name(&self, register: usize, line: usize) -> Result<String> {
        self.registers
            .get_declaration(register, line)
            .map(|id| self.decls.get(id).name.clone())
            .ok_or_else(|| DecompileError::shape(line, "loop variable without debug information"))
    }

    fn condition(
        &mut self,
        line: usize,
        end: usize,
        scope: &BlockScope,
        out: &mut Vec<Statement>,
    ) -> Result<usize> {
        if let Some(next) = self.boolean_value(line, end, out)? {
            return Ok(next);
        }
        if let Some(next) = self.short_circuit_value(line, end, out)? {
            return Ok(next);
        }

        let links = self.collect_links(line, end);
        if let Some(exit) = scope.loop_exit {
            if let Some((_, link)) = self.fold_prefix(&links, |l| l.target == exit)? {
                self.absorb_link(&link)?;
                let condition = link.branch.clone().invert()?.as_expression(&self.registers)?;
                self.emit(
                    out,
                    Statement::If {
                        condition,
                        body: vec![Statement::Break],
                    },
                    line,
                    None,
                );
                return Ok(link.fall);
            }
        }

        let Some((_, link)) = self.fold_prefix(&links, |l| l.target >= l.fall && l.target <= end)?
        else {
            return Err(DecompileError::shape(line, "condition does not guard a block"));
        };
        self.absorb_link(&link)?;
        let condition = link.branch.as_expression(&self.registers)?;
        debug!("if at line {line}, condition spans lines {}..{}", link.start, link.fall);
        let (then_end, else_end) = (link.target, self.else_end(link.fall, link.target, end, scope));

        let statement = match else_end {
            Some(else_end) => {
                let then_body = self.block(link.fall, then_end - 1, scope)?;
                let else_body = self.block(then_end, else_end, scope)?;
                self.emit(
                    out,
                    Statement::IfElse {
                        condition,
                        then_body,
                        else_body,
                    },
                    line,
                    None,
                );
                return Ok(else_end);
            }
            None => Statement::If {
                condition,
                body: self.block(link.fall, then_end, scope)?,
            },
        };
        self.emit(out, statement, line, None);
        Ok(then_end)
    }

    // The then-branch of an `if ... else` closes with a jump over the else
    // block. A jump leaving the enclosing block entirely was chained by the
    // compiler to the block's own exit, so the else block runs to `end`.
    fn else_end(
        &self,
        then_start: usize,
        then_end: usize,
        end: usize,
        scope: &BlockScope,
    ) -> Option<usize> {
        let jump_line = then_end.checked_sub(1)?;
        let ins = self.instruction_at(jump_line)?;
        if ins.op != Op::Jmp || then_end >= end {
            return None;
        }
        let target = ins.jump_target(jump_line);
        if scope.loop_exit == Some(target) || target == then_end {
            return None;
        }
        if target > then_end && target <= end {
            return Some(target);
        }
        let leaves_block = target > end || target < then_start;
        leaves_block.then(|| {
            warn!("jump at line {jump_line} leaves the block, else runs to line {end}");
            end
        })
    }

    /// `x = a < b`: the comparison picks one of two `LOADBOOL`s.
    fn boolean_value(
        &mut self,
        line: usize,
        end: usize,
        out: &mut Vec<Statement>,
    ) -> Result<Option<usize>> {
        let links = self.collect_links(line, end);
        let accept = |l: &Link| self.loadbool_pair(l.fall).is_some() && l.target == l.fall + 1;
        let Some((_, link)) = self.fold_prefix(&links, accept)? else {
            return Ok(None);
        };
        let Some(register) = self.loadbool_pair(link.fall) else {
            return Ok(None);
        };
        self.absorb_link(&link)?;
        let value = link.branch.clone().invert()?.as_expression(&self.registers)?;
        let true_line = link.fall + 1;
        let mark = out.len();
        let op = Operation::RegisterSet {
            line: true_line,
            register,
            value,
        };
        if let Some(statement) = op.process(&mut self.registers, &BlockScope::default())? {
            self.emit(out, statement, true_line, None);
        }
        self.declare_new_locals(link.fall, out, mark);
        self.declare_new_locals(true_line, out, mark);
        Ok(Some(true_line + 1))
    }

    /// Register written by `LOADBOOL R 0 1` at `line` followed by
    /// `LOADBOOL R 1 0`.
    fn loadbool_pair(&self, line: usize) -> Option<usize> {
        let low = self.instruction_at(line)?;
        let high = self.instruction_at(line + 1)?;
        let pair = low.op == Op::LoadBool
            && high.op == Op::LoadBool
            && low.a == high.a
            && low.b == 0
            && low.c != 0
            && high.b != 0
            && high.c == 0;
        pair.then_some(low.a as usize)
    }

    /// `x = a and b or c`: a run of `TEST`/`TESTSET` jumps that either land
    /// on the start of a later operand or right after the last one.
    fn short_circuit_value(
        &mut self,
        line: usize,
        end: usize,
        out: &mut Vec<Statement>,
    ) -> Result<Option<usize>> {
        let mut leaves = Vec::new();
        let mut starts = vec![line];
        let mut cursor = line;
        loop {
            while cursor < end && self.is_filler(cursor) {
                cursor += 1;
            }
            let Some(&ins) = self.instruction_at(cursor) else {
                break;
            };
            if !matches!(ins.op, Op::Test | Op::TestSet) {
                break;
            }
            let Some(jump) = self.instruction_at(cursor + 1).filter(|j| j.op == Op::Jmp) else {
                break;
            };
            let landing = jump.jump_target(cursor + 1);
            if landing <= cursor + 2 {
                break;
            }
            let testset = ins.op == Op::TestSet;
            leaves.push(ValueLeaf {
                line: cursor,
                test: if testset { ins.b as usize } else { ins.a as usize },
                target: ins.a as usize,
                testset,
                or: ins.c != 0,
                landing,
            });
            cursor += 2;
            starts.push(cursor);
        }
        let Some(first) = leaves.first() else {
            return Ok(None);
        };
        let opens_with_testset = first.testset;

        for count in (1..=leaves.len()).rev() {
            let Some(chain) = self.value_chain(&leaves[..count], &starts[..=count], end) else {
                continue;
            };
            let ValueChain { register, exit } = chain;
            let last = exit - 1;
            let tail = Branch::Assign {
                register,
                expr: Expression::nil(),
                range: Range::new(last, last, exit),
            };
            let operands = ValueOperands {
                leaves: &leaves[..count],
                starts: &starts[..=count],
                register,
                exit,
            };
            if value_tree(&operands, 0, count, exit, exit, &tail).is_none() {
                if !opens_with_testset {
                    warn!("value chain at line {line} does not nest, reading it as a condition");
                }
                continue;
            }

            trace!("short-circuit value in register {register} at lines {line}..{exit}");
            for filler in line..last {
                if self.pure_writes(filler).is_some() {
                    self.absorb(filler)?;
                }
            }
            let (ops, _) = self.translate(last, &BlockScope::default())?;
            for op in ops {
                op.process(&mut self.registers, &BlockScope::default())?;
            }
            let tail = Branch::Assign {
                register,
                expr: self.registers.value_at(register, last),
                range: Range::new(last, last, exit),
            };
            let Some(tree) = value_tree(&operands, 0, count, exit, exit, &tail) else {
                return Err(DecompileError::shape(line, "value chain changed shape"));
            };
            let value = tree.as_expression(&self.registers)?;

            let mark = out.len();
            let op = Operation::RegisterSet {
                line: last,
                register,
                value,
            };
            if let Some(statement) = op.process(&mut self.registers, &BlockScope::default())? {
                self.emit(out, statement, last, None);
            }
            self.declare_new_locals(last, out, mark);
            return Ok(Some(exit));
        }

        if opens_with_testset {
            return Err(DecompileError::shape(line, "TESTSET chain does not form a value"));
        }
        Ok(None)
    }

    // Jumps out of the chain must keep their value in the register the last
    // operand computes. Jumps into later operands only test.
    fn value_chain(&self, leaves: &[ValueLeaf], starts: &[usize], end: usize) -> Option<ValueChain> {
        let exit = leaves.iter().map(|l| l.landing).max()?;
        let last_start = *starts.last()?;
        if exit > end || exit <= last_start {
            return None;
        }
        let last = exit - 1;

        let mut register = None;
        for leaf in leaves {
            if leaf.landing != exit {
                if leaf.testset {
                    return None;
                }
                continue;
            }
            let keeps_value =
                leaf.testset || !self.registers.is_assignable(leaf.test, leaf.line);
            if !keeps_value || register.is_some_and(|r| r != leaf.target) {
                return None;
            }
            register = Some(leaf.target);
        }
        let register = register?;

        let computes_result = (last_start..last).all(|l| self.is_filler(l))
            && self
                .pure_writes(last)
                .is_some_and(|writes| writes.contains(&register));
        if !computes_result {
            return None;
        }
        let tests_only = leaves.iter().all(|l| !l.testset);
        if tests_only {
            // `if a then local x = b end`
            let scoped_to_branch = self
                .registers
                .get_declaration(register, last)
                .is_some_and(|id| self.decls.get(id).end < exit);
            if scoped_to_branch {
                return None;
            }
        }
        Some(ValueChain { register, exit })
    }

    /// Condition/jump pairs from `start`, with operand computations in
    /// between, as long as the jump stays before `limit`.
    fn collect_links(&self, start: usize, limit: usize) -> Vec<Link> {
        let mut links = Vec::new();
        let mut link_start = start;
        loop {
            let mut line = link_start;
            while line < limit && self.is_filler(line) {
                line += 1;
            }
            if line + 1 >= limit {
                break;
            }
            let (Some(ins), Some(jump)) = (self.instruction_at(line), self.instruction_at(line + 1))
            else {
                break;
            };
            if jump.op != Op::Jmp {
                break;
            }
            let target = jump.jump_target(line + 1);
            let Some(branch) = Branch::from_instruction(ins, line, target) else {
                break;
            };
            links.push(Link {
                branch,
                start: link_start,
                fall: line + 2,
                target,
            });
            link_start = line + 2;
        }
        links
    }

    /// Longest prefix of `links` folding into one condition that `accept`
    /// takes.
    fn fold_prefix(
        &self,
        links: &[Link],
        accept: impl Fn(&Link) -> bool,
    ) -> Result<Option<(usize, Link)>> {
        for count in (1..=links.len()).rev() {
            if let Some(link) = fold_chain(links[..count].to_vec())? {
                if accept(&link) {
                    return Ok(Some((count, link)));
                }
            }
        }
        Ok(None)
    }

    fn absorb_link(&mut self, link: &Link) -> Result<()> {
        for line in link.start..link.fall {
            if self.pure_writes(line).is_some() {
                self.absorb(line)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::chunk::{Constant, Function, LocalVar};
    use crate::decompiler::decompile_function;
    use crate::error::DecompileError;
    use crate::opcode::{Instruction, Op};
    use crate::output::Output;
    use crate::registers::RK_BIAS;
    use crate::statement::Statement;
    use crate::version::Version;

    const K: u32 = RK_BIAS;

    fn function(code: Vec<Instruction>, constants: Vec<Constant>, locals: &[(&str, usize, usize)]) -> Function {
        Function {
            source: None,
            line_defined: 0,
            last_line_defined: 0,
            num_upvalues: 0,
            num_params: 0,
            is_vararg: true,
            max_stack_size: 10,
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

    fn source(function: &Function, version: Version) -> String {
        let body = decompile_function(function, version).unwrap();
        let mut text = String::new();
        let mut out = Output::new(&mut text, 2);
        Statement::print_sequence(&mut out, &body);
        text
    }

    fn s(value: &str) -> Constant {
        Constant::String(value.as_bytes().to_vec())
    }

    fn n(value: f64) -> Constant {
        Constant::Number(value)
    }

    #[test]
    fn if_else() {
        // local a; if a then a = 1 else a = 2 end
        let f = function(
            vec![
                Instruction::abc(Op::LoadNil, 0, 0, 0),
                Instruction::abc(Op::Test, 0, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 2),
                Instruction::abx(Op::LoadK, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::LoadK, 0, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![n(1.0), n(2.0)],
            &[("a", 1, 7)],
        );
        assert_eq!(
            source(&f, Version::Lua51),
            "local a\nif a then\n  a = 1\nelse\n  a = 2\nend\n"
        );
    }

    #[test]
    fn while_with_break() {
        // local i = 0; while i < 10 do i = i + 1; if i == 5 then break end end
        let f = function(
            vec![
                Instruction::abx(Op::LoadK, 0, 0),
                Instruction::abc(Op::Lt, 0, 0, K + 1),
                Instruction::asbx(Op::Jmp, 0, 5),
                Instruction::abc(Op::Add, 0, 0, K + 2),
                Instruction::abc(Op::Eq, 0, 0, K + 3),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::asbx(Op::Jmp, 0, -7),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![n(0.0), n(10.0), n(1.0), n(5.0)],
            &[("i", 1, 9)],
        );
        assert_eq!(
            source(&f, Version::Lua51),
            "local i = 0\nwhile i < 10 do\n  i = i + 1\n  if i == 5 then\n    break\n  end\nend\n"
        );
    }

    #[test]
    fn repeat_until() {
        // local i = 0; repeat i = i + 1 until i >= 3
        let f = function(
            vec![
                Instruction::abx(Op::LoadK, 0, 0),
                Instruction::abc(Op::Add, 0, 0, K + 1),
                Instruction::abc(Op::Le, 0, K + 2, 0),
                Instruction::asbx(Op::Jmp, 0, -3),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![n(0.0), n(1.0), n(3.0)],
            &[("i", 1, 5)],
        );
        assert_eq!(
            source(&f, Version::Lua51),
            "local i = 0\nrepeat\n  i = i + 1\nuntil i >= 3\n"
        );
    }

    #[test]
    fn numeric_for() {
        // for i = 1, 3 do print(i) end
        let f = function(
            vec![
                Instruction::abx(Op::LoadK, 0, 0),
                Instruction::abx(Op::LoadK, 1, 1),
                Instruction::abx(Op::LoadK, 2, 0),
                Instruction::asbx(Op::ForPrep, 0, 3),
                Instruction::abx(Op::GetGlobal, 4, 2),
                Instruction::abc(Op::Move, 5, 3, 0),
                Instruction::abc(Op::Call, 4, 2, 1),
                Instruction::asbx(Op::ForLoop, 0, -4),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![n(1.0), n(3.0), s("print")],
            &[
                ("(for index)", 3, 8),
                ("(for limit)", 3, 8),
                ("(for step)", 3, 8),
                ("i", 4, 7),
            ],
        );
        assert_eq!(source(&f, Version::Lua51), "for i = 1, 3 do\n  print(i)\nend\n");
    }

    #[test]
    fn generic_for_in_lua52() {
        // for k, v in pairs(t) do end  (t global)
        let f = function(
            vec![
                Instruction::abc(Op::GetTabUp, 0, 0, K),
                Instruction::abc(Op::GetTabUp, 1, 0, K + 1),
                Instruction::abc(Op::Call, 0, 2, 4),
                Instruction::asbx(Op::Jmp, 0, 0),
                Instruction::abc(Op::TForCall, 0, 0, 2),
                Instruction::asbx(Op::TForLoop, 2, -2),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("pairs"), s("t")],
            &[
                ("(for generator)", 3, 6),
                ("(for state)", 3, 6),
                ("(for control)", 3, 6),
                ("k", 4, 4),
                ("v", 4, 4),
            ],
        );
        let mut f = f;
        f.upvalue_names = vec!["_ENV".into()];
        assert_eq!(
            source(&f, Version::Lua52),
            "for k, v in pairs(t) do\nend\n"
        );
    }

    #[test]
    fn comparison_values() {
        // local b = x < 1
        let f = function(
            vec![
                Instruction::abx(Op::GetGlobal, 0, 0),
                Instruction::abc(Op::Lt, 1, 0, K + 1),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abc(Op::LoadBool, 0, 0, 1),
                Instruction::abc(Op::LoadBool, 0, 1, 0),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("x"), n(1.0)],
            &[("b", 5, 6)],
        );
        assert_eq!(source(&f, Version::Lua51), "local b = x < 1\n");
    }

    #[test]
    fn short_circuit_values() {
        // local v = a or b
        let f = function(
            vec![
                Instruction::abx(Op::GetGlobal, 0, 0),
                Instruction::abc(Op::Test, 0, 0, 1),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::GetGlobal, 0, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("a"), s("b")],
            &[("v", 4, 5)],
        );
        assert_eq!(source(&f, Version::Lua51), "local v = a or b\n");
    }

    #[test]
    fn mixed_value_chains() {
        // y = a and b or c
        let f = function(
            vec![
                Instruction::abx(Op::GetGlobal, 0, 0),
                Instruction::abc(Op::Test, 0, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 3),
                Instruction::abx(Op::GetGlobal, 0, 1),
                Instruction::abc(Op::Test, 0, 0, 1),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::GetGlobal, 0, 2),
                Instruction::abx(Op::SetGlobal, 0, 3),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("a"), s("b"), s("c"), s("y")],
            &[],
        );
        assert_eq!(source(&f, Version::Lua51), "y = a and b or c\n");

        // y = a or b and c
        let f = function(
            vec![
                Instruction::abx(Op::GetGlobal, 0, 0),
                Instruction::abc(Op::Test, 0, 0, 1),
                Instruction::asbx(Op::Jmp, 0, 4),
                Instruction::abx(Op::GetGlobal, 0, 1),
                Instruction::abc(Op::Test, 0, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::GetGlobal, 0, 2),
                Instruction::abx(Op::SetGlobal, 0, 3),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("a"), s("b"), s("c"), s("y")],
            &[],
        );
        assert_eq!(source(&f, Version::Lua51), "y = a or b and c\n");
    }

    #[test]
    fn testset_chains_over_locals() {
        // local p, q; local x = p and q or r
        let f = function(
            vec![
                Instruction::abc(Op::LoadNil, 0, 1, 0),
                Instruction::abc(Op::Test, 0, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 2),
                Instruction::abc(Op::TestSet, 2, 1, 1),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::GetGlobal, 2, 0),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("r")],
            &[("p", 1, 7), ("q", 1, 7), ("x", 6, 7)],
        );
        assert_eq!(
            source(&f, Version::Lua51),
            "local p, q\nlocal x = p and q or r\n"
        );
    }

    #[test]
    fn testset_jumping_over_a_store_is_rejected() {
        let f = function(
            vec![
                Instruction::abc(Op::LoadNil, 0, 1, 0),
                Instruction::abc(Op::TestSet, 2, 0, 1),
                Instruction::asbx(Op::Jmp, 0, 2),
                Instruction::abx(Op::GetGlobal, 2, 0),
                Instruction::abx(Op::SetGlobal, 2, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![s("r"), s("s")],
            &[("p", 1, 6), ("q", 1, 6)],
        );
        assert!(matches!(
            decompile_function(&f, Version::Lua51),
            Err(DecompileError::UnsupportedShape { line: 2, .. })
        ));
    }

    #[test]
    fn compound_conditions() {
        // local a, b; if a and b then a = 1 end
        let f = function(
            vec![
                Instruction::abc(Op::LoadNil, 0, 1, 0),
                Instruction::abc(Op::Test, 0, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 3),
                Instruction::abc(Op::Test, 1, 0, 0),
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abx(Op::LoadK, 0, 0),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![n(1.0)],
            &[("a", 1, 7), ("b", 1, 7)],
        );
        assert_eq!(
            source(&f, Version::Lua51),
            "local a, b\nif a and b then\n  a = 1\nend\n"
        );
    }

    #[test]
    fn stray_jumps_are_rejected() {
        let f = function(
            vec![
                Instruction::asbx(Op::Jmp, 0, 1),
                Instruction::abc(Op::Return, 0, 1, 0),
                Instruction::abc(Op::Return, 0, 1, 0),
            ],
            vec![],
            &[],
        );
        assert!(matches!(
            decompile_function(&f, Version::Lua51),
            Err(DecompileError::UnsupportedShape { line: 1, .. })
        ));
    }
}
