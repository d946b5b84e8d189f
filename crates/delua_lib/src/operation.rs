use crate::error::{DecompileError, Result};
use crate::expr::{Expression, FunctionCall, LocalRef, TableEntry};
use crate::registers::Registers;
use crate::statement::{Assignment, Statement};
use crate::target::Target;

/// What the enclosing block allows.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockScope {
    /// First line after the innermost enclosing loop.
    pub loop_exit: Option<usize>,
}

impl BlockScope {
    pub fn in_loop(exit: usize) -> Self {
        Self {
            loop_exit: Some(exit),
        }
    }

    pub fn is_breakable(&self) -> bool {
        self.loop_exit.is_some()
    }
}

/// Constructs emitted by block recovery rather than by a single instruction.
#[derive(Debug, Clone)]
pub enum DeferredOperation {
    DeclareLocals { line: usize, locals: Vec<LocalRef> },
    Break { line: usize },
}

/// The effect of one instruction.
#[derive(Debug, Clone)]
pub enum Operation {
    GlobalSet {
        line: usize,
        name: String,
        value: Expression,
    },
    UpvalueSet {
        line: usize,
        name: String,
        value: Expression,
    },
    TableSet {
        line: usize,
        table: Expression,
        /// Register holding the table, when it may still be a literal.
        table_register: Option<usize>,
        index: Expression,
        value: Expression,
        is_list: bool,
        timestamp: usize,
    },
    RegisterSet {
        line: usize,
        register: usize,
        value: Expression,
    },
    /// One value spread over `first..=last`, as from a multi-result call.
    MultipleRegisterSet {
        line: usize,
        first: usize,
        last: usize,
        value: Expression,
    },
    Call {
        line: usize,
        call: FunctionCall,
    },
    Return {
        line: usize,
        values: Vec<Expression>,
    },
    Generic(Statement),
    Deferred(DeferredOperation),
}

impl Operation {
    pub fn line(&self) -> Option<usize> {
        match self {
            Operation::GlobalSet { line, .. }
            | Operation::UpvalueSet { line, .. }
            | Operation::TableSet { line, .. }
            | Operation::RegisterSet { line, .. }
            | Operation::MultipleRegisterSet { line, .. }
            | Operation::Call { line, .. }
            | Operation::Return { line, .. }
            | Operation::Deferred(DeferredOperation::DeclareLocals { line, .. })
            | Operation::Deferred(DeferredOperation::Break { line }) => Some(*line),
            Operation::Generic(_) => None,
        }
    }

    /// Applies the operation to `registers` and returns the statement it
    /// surfaces as, if any.
    pub fn process(
        self,
        registers: &mut Registers<'_>,
        scope: &BlockScope,
    ) -> Result<Option<Statement>> {
        let statement = match self {
            Operation::GlobalSet { name, value, .. } => {
                Some(assign(Target::Global(name), value))
            }
            Operation::UpvalueSet { name, value, .. } => {
                Some(assign(Target::Upvalue(name), value))
            }
            Operation::TableSet {
                line,
                table,
                table_register,
                index,
                value,
                is_list,
                timestamp,
            } => {
                let entry = TableEntry {
                    key: index.clone(),
                    value: value.clone(),
                    is_list,
                    timestamp,
                };
                let merged = table.is_table_literal()
                    && table_register
                        .is_some_and(|register| registers.push_table_entry(register, line, entry));
                if merged {
                    None
                } else {
                    Some(assign(Target::Table { table, index }, value))
                }
            }
            Operation::RegisterSet {
                line,
                register,
                value,
            } => {
                registers.set_value(register, line, value.clone());
                if registers.is_assignable(register, line) {
                    Some(assign(registers.get_target(register, line)?, value))
                } else {
                    None
                }
            }
            Operation::MultipleRegisterSet {
                line,
                first,
                last,
                value,
            } => {
                let mut assignment: Option<Assignment> = None;
                for register in first..=last {
                    registers.set_value(register, line, value.clone());
                    if !registers.is_assignable(register, line) {
                        continue;
                    }
                    let target = registers.get_target(register, line)?;
                    match assignment.as_mut() {
                        Some(a) => a.add_last(target, value.clone()),
                        None => assignment = Some(Assignment::new(target, value.clone())),
                    }
                }
                assignment.map(Statement::Assignment)
            }
            Operation::Call { call, .. } => Some(Statement::FunctionCall(call)),
            Operation::Return { values, .. } => Some(Statement::Return(values)),
            Operation::Generic(statement) => Some(statement),
            Operation::Deferred(DeferredOperation::DeclareLocals { locals, .. }) => {
                Some(Statement::Declare(locals))
            }
            Operation::Deferred(DeferredOperation::Break { line }) => {
                if !scope.is_breakable() {
                    return Err(DecompileError::shape(line, "break outside of a loop"));
                }
                Some(Statement::Break)
            }
        };
        Ok(statement)
    }
}

fn assign(target: Target, value: Expression) -> Statement {
    Statement::Assignment(Assignment::new(target, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::LocalVar;
    use crate::decl::Declarations;
    use crate::expr::TableLiteral;
    use crate::output::Output;

    fn render(statement: &Statement) -> String {
        let mut text = String::new();
        let mut out = Output::new(&mut text, 2);
        statement.print(&mut out);
        text
    }

    fn decls() -> Declarations {
        Declarations::from_locals(&[LocalVar {
            name: "x".into(),
            start_pc: 0,
            end_pc: 10,
        }])
    }

    #[test]
    fn temporaries_stay_silent() {
        let decls = decls();
        let mut registers = Registers::new(3, &decls, &[]);
        let op = Operation::RegisterSet {
            line: 1,
            register: 2,
            value: Expression::number(7.0),
        };
        let statement = op.process(&mut registers, &BlockScope::default()).unwrap();
        assert!(statement.is_none());
        assert_eq!(registers.get_expression(2, 2).to_source(), "7");
    }

    #[test]
    fn locals_surface_as_assignments() {
        let decls = decls();
        let mut registers = Registers::new(3, &decls, &[]);
        let op = Operation::RegisterSet {
            line: 1,
            register: 0,
            value: Expression::number(7.0),
        };
        let statement = op.process(&mut registers, &BlockScope::default()).unwrap().unwrap();
        assert_eq!(render(&statement), "x = 7");
    }

    #[test]
    fn table_sets_merge_into_literals() {
        let decls = decls();
        let mut registers = Registers::new(3, &decls, &[]);
        registers.set_value(1, 1, Expression::Table(TableLiteral::default()));
        let scope = BlockScope::default();
        for (line, key) in [(2, "a"), (3, "b")] {
            let op = Operation::TableSet {
                line,
                table: registers.get_expression(1, line),
                table_register: Some(1),
                index: Expression::string(key),
                value: Expression::number(line as f64),
                is_list: false,
                timestamp: line,
            };
            assert!(op.process(&mut registers, &scope).unwrap().is_none());
        }
        assert_eq!(registers.get_expression(1, 4).to_source(), "{\n  a = 2,\n  b = 3\n}");
    }

    #[test]
    fn table_sets_on_saved_tables_assign() {
        let decls = decls();
        let mut registers = Registers::new(3, &decls, &[]);
        let op = Operation::TableSet {
            line: 2,
            table: registers.get_expression(0, 2),
            table_register: Some(0),
            index: Expression::string("k"),
            value: Expression::boolean(true),
            is_list: false,
            timestamp: 2,
        };
        let statement = op.process(&mut registers, &BlockScope::default()).unwrap().unwrap();
        assert_eq!(render(&statement), "x.k = true");
    }

    #[test]
    fn multiple_sets_assign_only_locals() {
        let decls = decls();
        let mut registers = Registers::new(3, &decls, &[]);
        let op = Operation::MultipleRegisterSet {
            line: 3,
            first: 0,
            last: 2,
            value: Expression::Vararg { multiple: true },
        };
        let statement = op.process(&mut registers, &BlockScope::default()).unwrap().unwrap();
        assert_eq!(render(&statement), "x = ...");
        assert_eq!(registers.get_updated(2, 3), 3);
    }

    #[test]
    fn break_needs_a_loop() {
        let decls = decls();
        let mut registers = Registers::new(1, &decls, &[]);
        let brk = || Operation::Deferred(DeferredOperation::Break { line: 4 });
        assert!(matches!(
            brk().process(&mut registers, &BlockScope::default()),
            Err(DecompileError::UnsupportedShape { line: 4, .. })
        ));
        let statement = brk().process(&mut registers, &BlockScope::in_loop(9)).unwrap();
        assert!(matches!(statement, Some(Statement::Break)));
    }
}
