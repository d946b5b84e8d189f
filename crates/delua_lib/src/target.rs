use crate::decl::DeclId;
use crate::error::{DecompileError, Result};
use crate::expr::{Expression, LocalRef};
use crate::output::Output;

/// Destination of an assignment.
#[derive(Debug, Clone)]
pub enum Target {
    Global(String),
    Upvalue(String),
    Variable(LocalRef),
    Table { table: Expression, index: Expression },
}

impl Target {
    pub fn print(&self, out: &mut Output<'_>) {
        match self {
            Target::Global(name) | Target::Upvalue(name) => out.print(name),
            Target::Variable(local) => out.print(&local.name),
            Target::Table { table, index } => {
                Expression::index(table.clone(), index.clone()).print(out)
            }
        }
    }

    /// Colon-call rendering, `a.b:name`, used by method definitions.
    pub fn print_method(&self, out: &mut Output<'_>) -> Result<()> {
        match self {
            Target::Table { table, index } => {
                let name = index
                    .as_identifier()
                    .ok_or(DecompileError::Unsupported("method name is not an identifier"))?;
                table.print_prefix(out);
                out.print(":");
                out.print(name);
                Ok(())
            }
            _ => Err(DecompileError::Unsupported("print_method on a non-table target")),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Target::Variable(_))
    }

    pub fn local(&self) -> Option<DeclId> {
        match self {
            Target::Variable(local) => Some(local.id),
            _ => None,
        }
    }

    /// Shapes allowed after `function`: names and dotted chains of names.
    pub fn is_function_name(&self) -> bool {
        match self {
            Target::Global(_) | Target::Upvalue(_) | Target::Variable(_) => true,
            Target::Table { table, index } => {
                index.as_identifier().is_some() && is_dotted_chain(table)
            }
        }
    }

    pub fn begins_with_paren(&self) -> bool {
        match self {
            Target::Table { table, index } => {
                Expression::index(table.clone(), index.clone()).begins_with_paren()
            }
            _ => false,
        }
    }
}

fn is_dotted_chain(expr: &Expression) -> bool {
    match expr {
        Expression::Global(_) | Expression::Local(_) | Expression::Upvalue(_) => true,
        Expression::Index { table, key } => key.as_identifier().is_some() && is_dotted_chain(table),
        _ => false,
    }
}
