use crate::error::{DecompileError, Result};
use crate::expr::{BinOp, Expression, UnOp};
use crate::opcode::{Instruction, Op};
use crate::registers::{RK_BIAS, Registers};

/// Source line and the program-counter span a condition occupies. `begin`
/// and `end` trade places when the condition is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    pub line: usize,
    pub begin: usize,
    pub end: usize,
}

impl Range {
    pub fn new(line: usize, begin: usize, end: usize) -> Self {
        Self { line, begin, end }
    }

    fn mirrored(self) -> Self {
        Self {
            line: self.line,
            begin: self.end,
            end: self.begin,
        }
    }
}

/// Boolean condition recovered from conditional jumps.
///
/// A leaf states the condition under which control falls through its
/// `JMP`. Comparison operands are raw `RK` operands resolved against the
/// register state of the leaf's own line.
#[derive(Debug, Clone)]
pub enum Branch {
    Eq {
        left: u32,
        right: u32,
        invert: bool,
        range: Range,
    },
    Lt {
        left: u32,
        right: u32,
        invert: bool,
        range: Range,
    },
    Le {
        left: u32,
        right: u32,
        invert: bool,
        range: Range,
    },
    Test {
        register: usize,
        invert: bool,
        range: Range,
    },
    /// `TESTSET`: the tested value is also stored into `target`.
    TestSet {
        test: usize,
        target: usize,
        invert: bool,
        range: Range,
    },
    True {
        register: usize,
        invert: bool,
        range: Range,
    },
    Not(Box<Branch>),
    Or(Box<Branch>, Box<Branch>),
    And(Box<Branch>, Box<Branch>),
    /// A pending value, not a condition.
    Assign {
        register: usize,
        expr: Expression,
        range: Range,
    },
}

impl Branch {
    /// Fall-through condition of the conditional instruction at `line`,
    /// whose paired `JMP` lands on `target`.
    pub fn from_instruction(ins: &Instruction, line: usize, target: usize) -> Option<Self> {
        let range = Range::new(line, line, target);
        let branch = match ins.op {
            Op::Eq => Branch::Eq {
                left: ins.b,
                right: ins.c,
                invert: ins.a != 0,
                range,
            },
            Op::Lt => Branch::Lt {
                left: ins.b,
                right: ins.c,
                invert: ins.a != 0,
                range,
            },
            Op::Le => Branch::Le {
                left: ins.b,
                right: ins.c,
                invert: ins.a != 0,
                range,
            },
            Op::Test => Branch::Test {
                register: ins.a as usize,
                invert: ins.c != 0,
                range,
            },
            Op::TestSet => Branch::TestSet {
                test: ins.b as usize,
                target: ins.a as usize,
                invert: ins.c != 0,
                range,
            },
            _ => return None,
        };
        Some(branch)
    }

    pub fn not(branch: Branch) -> Self {
        Branch::Not(Box::new(branch))
    }

    pub fn or(left: Branch, right: Branch) -> Self {
        Branch::Or(Box::new(left), Box::new(right))
    }

    pub fn and(left: Branch, right: Branch) -> Self {
        Branch::And(Box::new(left), Box::new(right))
    }

    pub fn range(&self) -> Option<Range> {
        match self {
            Branch::Eq { range, .. }
            | Branch::Lt { range, .. }
            | Branch::Le { range, .. }
            | Branch::Test { range, .. }
            | Branch::TestSet { range, .. }
            | Branch::True { range, .. }
            | Branch::Assign { range, .. } => Some(*range),
            Branch::Not(_) | Branch::Or(..) | Branch::And(..) => None,
        }
    }

    /// Logical negation. Composites follow De Morgan and keep operand order.
    pub fn invert(self) -> Result<Branch> {
        Ok(match self {
            Branch::Eq {
                left,
                right,
                invert,
                range,
            } => Branch::Eq {
                left,
                right,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::Lt {
                left,
                right,
                invert,
                range,
            } => Branch::Lt {
                left,
                right,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::Le {
                left,
                right,
                invert,
                range,
            } => Branch::Le {
                left,
                right,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::Test {
                register,
                invert,
                range,
            } => Branch::Test {
                register,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::TestSet {
                test,
                target,
                invert,
                range,
            } => Branch::TestSet {
                test,
                target,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::True {
                register,
                invert,
                range,
            } => Branch::True {
                register,
                invert: !invert,
                range: range.mirrored(),
            },
            Branch::Not(inner) => *inner,
            Branch::Or(left, right) => Branch::and(left.invert()?, right.invert()?),
            Branch::And(left, right) => Branch::or(left.invert()?, right.invert()?),
            Branch::Assign { .. } => {
                return Err(DecompileError::Unsupported("invert on an assignment node"));
            }
        })
    }

    /// Register the condition leaves its value in, if any. Two sides of a
    /// composite only agree when both name the same register.
    pub fn register(&self) -> Result<Option<usize>> {
        match self {
            Branch::TestSet { target, .. } => Ok(Some(*target)),
            Branch::True { register, .. } => Ok(Some(*register)),
            Branch::Or(left, right) | Branch::And(left, right) => {
                let left = left.register()?;
                let right = right.register()?;
                Ok(if left == right { left } else { None })
            }
            Branch::Assign { .. } => {
                Err(DecompileError::Unsupported("register of an assignment node"))
            }
            _ => Ok(None),
        }
    }

    pub fn as_expression(&self, registers: &Registers<'_>) -> Result<Expression> {
        match self {
            Branch::Eq {
                left,
                right,
                invert,
                range,
            } => {
                let op = if *invert { BinOp::Ne } else { BinOp::Eq };
                Ok(Expression::binary(
                    op,
                    registers.get_k_expression(*left, range.line)?,
                    registers.get_k_expression(*right, range.line)?,
                ))
            }
            Branch::Lt {
                left,
                right,
                invert,
                range,
            } => ordering(registers, BinOp::Lt, BinOp::Gt, *left, *right, *invert, range.line),
            Branch::Le {
                left,
                right,
                invert,
                range,
            } => ordering(registers, BinOp::Le, BinOp::Ge, *left, *right, *invert, range.line),
            Branch::Test {
                register,
                invert,
                range,
            } => {
                let expr = registers.get_expression(*register, range.line);
                Ok(if *invert {
                    Expression::unary(UnOp::Not, expr)
                } else {
                    expr
                })
            }
            Branch::TestSet { test, range, .. } => Ok(registers.get_expression(*test, range.line)),
            Branch::True { invert, .. } => Ok(Expression::boolean(!invert)),
            Branch::Not(inner) => Ok(Expression::unary(UnOp::Not, inner.as_expression(registers)?)),
            Branch::Or(left, right) => Ok(Expression::binary(
                BinOp::Or,
                left.as_expression(registers)?,
                right.as_expression(registers)?,
            )),
            Branch::And(left, right) => Ok(Expression::binary(
                BinOp::And,
                left.as_expression(registers)?,
                right.as_expression(registers)?,
            )),
            Branch::Assign { expr, .. } => Ok(expr.clone()),
        }
    }
}

// Operands are swapped back to source order when the compiler evidently
// reversed them: for two registers the later-written one came first, and a
// constant on the left means `x > k` was compiled as `k < x`. This is a
// best-effort guess; hand-written bytecode can defeat it.
fn ordering(
    registers: &Registers<'_>,
    op: BinOp,
    transposed_op: BinOp,
    left: u32,
    right: u32,
    invert: bool,
    line: usize,
) -> Result<Expression> {
    let left_expr = registers.get_k_expression(left, line)?;
    let right_expr = registers.get_k_expression(right, line)?;
    let transpose = if left < RK_BIAS && right < RK_BIAS {
        registers.get_updated(left as usize, line) > registers.get_updated(right as usize, line)
    } else {
        constant_index(right) < constant_index(left)
    };
    let expr = if transpose {
        Expression::binary(transposed_op, right_expr, left_expr)
    } else {
        Expression::binary(op, left_expr, right_expr)
    };
    Ok(if invert {
        Expression::unary(UnOp::Not, expr)
    } else {
        expr
    })
}

fn constant_index(operand: u32) -> i64 {
    if operand >= RK_BIAS {
        (operand - RK_BIAS) as i64
    } else {
        -1
    }
}

/// One condition of a short-circuit chain together with the jump that
/// follows it.
#[derive(Debug, Clone)]
pub struct Link {
    pub branch: Branch,
    pub start: usize,
    /// Line reached when `branch` holds.
    pub fall: usize,
    /// Line reached when it does not.
    pub target: usize,
}

/// Folds adjacent links into `and`/`or` trees until one link remains.
/// Returns `None` when the jumps do not describe a boolean expression.
pub fn fold_chain(mut links: Vec<Link>) -> Result<Option<Link>> {
    while links.len() > 1 {
        let Some(i) = (0..links.len() - 1).rev().find(|&i| mergeable(&links, i)) else {
            return Ok(None);
        };
        let y = links.remove(i + 1);
        let x = links.remove(i);
        let branch = if x.target == y.target {
            Branch::and(x.branch, y.branch)
        } else {
            Branch::or(x.branch.invert()?, y.branch)
        };
        links.insert(
            i,
            Link {
                branch,
                start: x.start,
                fall: y.fall,
                target: y.target,
            },
        );
    }
    Ok(links.pop())
}

fn mergeable(links: &[Link], i: usize) -> bool {
    let (x, y) = (&links[i], &links[i + 1]);
    if x.fall != y.start || links.iter().any(|l| l.target == y.start) {
        return false;
    }
    x.target == y.target || x.target == y.fall
}
