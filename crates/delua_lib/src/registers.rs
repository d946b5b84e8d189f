use crate::chunk::Constant;
use crate::decl::{DeclId, Declarations};
use crate::error::{DecompileError, Result};
use crate::expr::{Expression, LocalRef, TableEntry};
use crate::target::Target;

/// Operands at or above this bias name constants (`RK` operands).
pub const RK_BIAS: u32 = 256;

#[derive(Debug, Clone)]
struct Binding {
    line: usize,
    value: Expression,
    updated: usize,
}

/// Symbolic register file of one function.
///
/// Every write is kept with the line that produced it, so a query for
/// "register 3 at line 12" still answers after later lines overwrote it.
pub struct Registers<'a> {
    decls: &'a Declarations,
    constants: &'a [Constant],
    history: Vec<Vec<Binding>>,
}

impl<'a> Registers<'a> {
    pub fn new(count: usize, decls: &'a Declarations, constants: &'a [Constant]) -> Self {
        let mut registers = Self {
            decls,
            constants,
            history: Vec::new(),
        };
        registers.ensure(count.max(1) - 1);
        registers
    }

    fn ensure(&mut self, register: usize) {
        while self.history.len() <= register {
            self.history.push(vec![Binding {
                line: 0,
                value: Expression::nil(),
                updated: 0,
            }]);
        }
    }

    fn binding(&self, register: usize, line: usize) -> Option<&Binding> {
        self.history
            .get(register)?
            .iter()
            .rev()
            .find(|b| b.line <= line)
    }

    /// Binds `register` as of `line`, replacing an earlier write of the same
    /// line.
    pub fn set_value(&mut self, register: usize, line: usize, value: Expression) {
        self.ensure(register);
        let history = &mut self.history[register];
        history.retain(|b| b.line < line);
        history.push(Binding {
            line,
            value,
            updated: line,
        });
    }

    pub fn value_at(&self, register: usize, line: usize) -> Expression {
        self.binding(register, line)
            .map(|b| b.value.clone())
            .unwrap_or_else(Expression::nil)
    }

    /// Raw value seen by the instruction at `line`, ignoring declarations.
    pub fn get_value(&self, register: usize, line: usize) -> Expression {
        self.value_at(register, line.saturating_sub(1))
    }

    /// The expression an instruction at `line` reads from `register`.
    pub fn get_expression(&self, register: usize, line: usize) -> Expression {
        let before = line.saturating_sub(1);
        match self.decls.at(register, before) {
            Some(id) => Expression::Local(self.local_ref(id)),
            None => self.value_at(register, before),
        }
    }

    pub fn get_k_expression(&self, operand: u32, line: usize) -> Result<Expression> {
        if operand >= RK_BIAS {
            self.constant((operand - RK_BIAS) as usize)
        } else {
            Ok(self.get_expression(operand as usize, line))
        }
    }

    pub fn constant(&self, index: usize) -> Result<Expression> {
        self.constants
            .get(index)
            .cloned()
            .map(Expression::Constant)
            .ok_or(DecompileError::InvalidConstant(index))
    }

    pub fn constant_name(&self, index: usize) -> Result<String> {
        match self.constants.get(index) {
            Some(Constant::String(bytes)) => Ok(String::from_utf8_lossy(bytes).into_owned()),
            _ => Err(DecompileError::InvalidConstant(index)),
        }
    }

    /// Line of the write visible after `line`.
    pub fn get_updated(&self, register: usize, line: usize) -> usize {
        self.binding(register, line).map(|b| b.updated).unwrap_or(0)
    }

    pub fn is_local(&self, register: usize, line: usize) -> bool {
        self.decls.at(register, line).is_some()
    }

    /// A named, user-visible local occupies `register` at `line`.
    pub fn is_assignable(&self, register: usize, line: usize) -> bool {
        self.decls
            .at(register, line)
            .is_some_and(|id| !self.decls.get(id).for_loop)
    }

    pub fn is_new_local(&self, register: usize, line: usize) -> bool {
        self.decls.at(register, line).is_some_and(|id| {
            let d = self.decls.get(id);
            d.begin == line && !d.for_loop
        })
    }

    /// Locals whose scope opens at `line`, in register order.
    pub fn new_locals(&self, line: usize) -> Vec<DeclId> {
        let mut ids: Vec<DeclId> = self
            .decls
            .iter()
            .filter(|(_, d)| d.begin == line && !d.for_loop)
            .map(|(id, _)| id)
            .collect();
        ids.sort_by_key(|id| self.decls.get(*id).register);
        ids
    }

    pub fn get_declaration(&self, register: usize, line: usize) -> Option<DeclId> {
        self.decls.at(register, line)
    }

    pub fn register_of(&self, id: DeclId) -> usize {
        self.decls.get(id).register
    }

    pub fn local_ref(&self, id: DeclId) -> LocalRef {
        LocalRef {
            id,
            name: self.decls.get(id).name.clone(),
        }
    }

    pub fn get_target(&self, register: usize, line: usize) -> Result<Target> {
        self.decls
            .at(register, line)
            .map(|id| Target::Variable(self.local_ref(id)))
            .ok_or(DecompileError::Unsupported("assignment target is not a local"))
    }

    /// Appends to the table literal `register` holds before `line`. Returns
    /// false when the register does not hold a literal under construction.
    pub fn push_table_entry(&mut self, register: usize, line: usize, entry: TableEntry) -> bool {
        let before = line.saturating_sub(1);
        if self.is_local(register, before) {
            return false;
        }
        let Some(history) = self.history.get_mut(register) else {
            return false;
        };
        match history.iter_mut().rev().find(|b| b.line <= before) {
            Some(Binding {
                value: Expression::Table(table),
                ..
            }) => {
                table.push(entry);
                true
            }
            _ => false,
        }
    }
}
