use log::warn;

use crate::expr::{Expression, FunctionCall, LocalRef, print_list};
use crate::output::Output;
use crate::target::Target;

/// `targets = values`, possibly as a `local` declaration.
///
/// Targets and values pair up by position. A declaration may carry fewer
/// values than targets when the last value yields several results.
#[derive(Debug, Clone)]
pub struct Assignment {
    targets: Vec<Target>,
    values: Vec<Expression>,
    declare: bool,
    all_nil: bool,
}

impl Assignment {
    pub fn new(target: Target, value: Expression) -> Self {
        Self {
            targets: vec![target],
            values: vec![value],
            declare: false,
            all_nil: false,
        }
    }

    /// `local a, b = values`.
    pub fn declaration(targets: Vec<Target>, values: Vec<Expression>) -> Self {
        let all_nil = values.iter().all(Expression::is_nil);
        Self {
            targets,
            values,
            declare: true,
            all_nil,
        }
    }

    pub fn add_first(&mut self, target: Target, value: Expression) {
        self.targets.insert(0, target);
        self.values.insert(0, value);
        self.all_nil = false;
    }

    pub fn add_last(&mut self, target: Target, value: Expression) {
        self.targets.push(target);
        self.values.push(value);
        self.all_nil = false;
    }

    /// Adds a target fed by the same multi-result value as the first one.
    pub fn add_first_target(&mut self, target: Target) {
        self.targets.insert(0, target);
    }

    pub(crate) fn into_single(self) -> Option<(Target, Expression)> {
        if self.declare {
            return None;
        }
        let mut targets = self.targets.into_iter();
        let mut values = self.values.into_iter();
        match (targets.next(), values.next(), targets.next(), values.next()) {
            (Some(target), Some(value), None, None) => Some((target, value)),
            _ => None,
        }
    }

    pub fn declare(&mut self) {
        self.declare = true;
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn values(&self) -> &[Expression] {
        &self.values
    }

    pub fn is_declaration(&self) -> bool {
        self.declare
    }

    fn print(&self, out: &mut Output<'_>) {
        if self.print_function_sugar(out) {
            return;
        }
        if self.declare {
            out.print("local ");
        }
        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 {
                out.print(", ");
            }
            target.print(out);
        }
        if !(self.declare && self.all_nil) {
            out.print(" = ");
            print_list(out, &self.values);
        }
    }

    // `local function f` puts `f` in scope inside its own body, so a
    // declaration only takes the sugar when the closure captures the local.
    fn print_function_sugar(&self, out: &mut Output<'_>) -> bool {
        let ([target], [Expression::Closure(closure)]) = (&self.targets[..], &self.values[..])
        else {
            return false;
        };
        if !target.is_function_name() {
            return false;
        }
        if self.declare {
            if !target.local().is_some_and(|id| closure.is_upvalue_of(id)) {
                return false;
            }
            out.print("local function ");
            target.print(out);
            closure.print_signature(out, false);
            closure.print_body(out);
            return true;
        }
        if target.local().is_some_and(|id| closure.is_upvalue_of(id)) {
            return false;
        }
        out.print("function ");
        let is_method = closure.params.first().is_some_and(|p| p == "self")
            && target.print_method(out).is_ok();
        if !is_method {
            if closure.params.first().is_some_and(|p| p == "self") {
                warn!("`self` parameter on a non-field target, printing a plain function");
            }
            target.print(out);
        }
        closure.print_signature(out, is_method);
        closure.print_body(out);
        true
    }
}

#[derive(Debug, Clone)]
pub enum Statement {
    Assignment(Assignment),
    Return(Vec<Expression>),
    /// `local a, b` without values.
    Declare(Vec<LocalRef>),
    FunctionCall(FunctionCall),
    If {
        condition: Expression,
        body: Vec<Statement>,
    },
    IfElse {
        condition: Expression,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    While {
        condition: Expression,
        body: Vec<Statement>,
    },
    Repeat {
        body: Vec<Statement>,
        condition: Expression,
    },
    NumericFor {
        variable: String,
        start: Expression,
        limit: Expression,
        step: Option<Expression>,
        body: Vec<Statement>,
    },
    GenericFor {
        variables: Vec<String>,
        values: Vec<Expression>,
        body: Vec<Statement>,
    },
    Break,
}

impl Statement {
    /// Prints `statements` one per line.
    pub fn print_sequence(out: &mut Output<'_>, statements: &[Statement]) {
        for (i, statement) in statements.iter().enumerate() {
            statement.print(out);
            let next = statements.get(i + 1);
            // `f()` followed by `(g)()` would parse as one call chain
            if matches!(statement, Statement::FunctionCall(_))
                && next.is_some_and(Statement::begins_with_paren)
            {
                out.print(";");
            }
            if !matches!(statement, Statement::IfElse { .. }) {
                out.println();
            }
        }
    }

    pub fn begins_with_paren(&self) -> bool {
        match self {
            Statement::Assignment(assignment) => {
                !assignment.declare
                    && assignment
                        .targets
                        .first()
                        .is_some_and(Target::begins_with_paren)
            }
            Statement::FunctionCall(call) => {
                Expression::Call(call.clone()).begins_with_paren()
            }
            _ => false,
        }
    }

    pub fn print(&self, out: &mut Output<'_>) {
        match self {
            Statement::Assignment(assignment) => assignment.print(out),
            Statement::Return(values) => {
                out.print("return");
                if !values.is_empty() {
                    out.print(" ");
                    print_list(out, values);
                }
            }
            Statement::Declare(locals) => {
                out.print("local ");
                let names: Vec<&str> = locals.iter().map(|l| l.name.as_str()).collect();
                out.print(&names.join(", "));
            }
            Statement::FunctionCall(call) => call.print(out),
            Statement::If { condition, body } => {
                out.print("if ");
                condition.print(out);
                out.print(" then");
                print_block(out, body);
                out.print("end");
            }
            Statement::IfElse { .. } => {
                self.print_if_chain(out);
                out.print("end");
                out.println();
            }
            Statement::While { condition, body } => {
                out.print("while ");
                condition.print(out);
                out.print(" do");
                print_block(out, body);
                out.print("end");
            }
            Statement::Repeat { body, condition } => {
                out.print("repeat");
                print_block(out, body);
                out.print("until ");
                condition.print(out);
            }
            Statement::NumericFor {
                variable,
                start,
                limit,
                step,
                body,
            } => {
                out.print("for ");
                out.print(variable);
                out.print(" = ");
                start.print(out);
                out.print(", ");
                limit.print(out);
                if let Some(step) = step {
                    out.print(", ");
                    step.print(out);
                }
                out.print(" do");
                print_block(out, body);
                out.print("end");
            }
            Statement::GenericFor {
                variables,
                values,
                body,
            } => {
                out.print("for ");
                out.print(&variables.join(", "));
                out.print(" in ");
                print_list(out, values);
                out.print(" do");
                print_block(out, body);
                out.print("end");
            }
            Statement::Break => out.print("break"),
        }
    }

    // Prints `if ... then ... elseif ... else ...`, without the final `end`.
    fn print_if_chain(&self, out: &mut Output<'_>) {
        let mut current = self;
        out.print("if ");
        loop {
            match current {
                Statement::IfElse {
                    condition,
                    then_body,
                    else_body,
                } => {
                    condition.print(out);
                    out.print(" then");
                    print_block(out, then_body);
                    match &else_body[..] {
                        [nested @ (Statement::If { .. } | Statement::IfElse { .. })] => {
                            out.print("elseif ");
                            current = nested;
                        }
                        _ => {
                            out.print("else");
                            print_block(out, else_body);
                            return;
                        }
                    }
                }
                Statement::If { condition, body } => {
                    condition.print(out);
                    out.print(" then");
                    print_block(out, body);
                    return;
                }
                _ => return,
            }
        }
    }
}

fn print_block(out: &mut Output<'_>, body: &[Statement]) {
    out.println();
    out.indent();
    Statement::print_sequence(out, body);
    out.dedent();
}
