use std::rc::Rc;

use crate::chunk::Constant;
use crate::decl::DeclId;
use crate::output::Output;
use crate::statement::Statement;

/// Reference to a named local. Equality is identity of the declaration.
#[derive(Debug, Clone)]
pub struct LocalRef {
    pub id: DeclId,
    pub name: String,
}

impl PartialEq for LocalRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for LocalRef {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Concat,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "or",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::Ne => "~=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Concat => "..",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "^",
        }
    }

    pub fn precedence(self) -> Precedence {
        match self {
            BinOp::Or => Precedence::OR,
            BinOp::And => Precedence::AND,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                Precedence::COMPARE
            }
            BinOp::Concat => Precedence::CONCAT,
            BinOp::Add | BinOp::Sub => Precedence::ADD,
            BinOp::Mul | BinOp::Div | BinOp::Mod => Precedence::MUL,
            BinOp::Pow => Precedence::POW,
        }
    }

    fn right_associative(self) -> bool {
        matches!(self, BinOp::Concat | BinOp::Pow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
    Len,
}

impl UnOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnOp::Not => "not ",
            UnOp::Neg => "-",
            UnOp::Len => "#",
        }
    }
}

/// Operator precedence levels (higher = binds tighter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Precedence(pub u8);

impl Precedence {
    pub const OR: Self = Precedence(1);
    pub const AND: Self = Precedence(2);
    pub const COMPARE: Self = Precedence(3);
    pub const CONCAT: Self = Precedence(4);
    pub const ADD: Self = Precedence(5);
    pub const MUL: Self = Precedence(6);
    pub const UNARY: Self = Precedence(7);
    pub const POW: Self = Precedence(8);
    pub const ATOMIC: Self = Precedence(9);
}

#[derive(Debug, Clone)]
pub struct TableEntry {
    pub key: Expression,
    pub value: Expression,
    /// Positional entry written by `SETLIST`.
    pub is_list: bool,
    pub timestamp: usize,
}

#[derive(Debug, Clone, Default)]
pub struct TableLiteral {
    pub entries: Vec<TableEntry>,
}

impl TableLiteral {
    pub fn push(&mut self, entry: TableEntry) {
        self.entries.push(entry);
    }

    /// Entries in the order their values were produced.
    pub fn ordered(&self) -> Vec<&TableEntry> {
        let mut entries: Vec<&TableEntry> = self.entries.iter().collect();
        entries.sort_by_key(|e| e.timestamp);
        entries
    }
}

/// A nested function, decompiled by its own pass.
#[derive(Debug, Clone)]
pub struct Closure {
    pub params: Vec<String>,
    pub is_vararg: bool,
    pub body: Vec<Statement>,
    /// Locals of the enclosing function captured as upvalues.
    pub captured: Vec<DeclId>,
}

impl Closure {
    pub fn is_upvalue_of(&self, decl: DeclId) -> bool {
        self.captured.contains(&decl)
    }

    pub(crate) fn print_signature(&self, out: &mut Output<'_>, skip_self: bool) {
        let params = if skip_self { &self.params[1..] } else { &self.params[..] };
        out.print("(");
        out.print(&params.join(", "));
        if self.is_vararg {
            if !params.is_empty() {
                out.print(", ");
            }
            out.print("...");
        }
        out.print(")");
    }

    pub(crate) fn print_body(&self, out: &mut Output<'_>) {
        out.println();
        out.indent();
        Statement::print_sequence(out, &self.body);
        out.dedent();
        out.print("end");
    }
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub function: Box<Expression>,
    pub args: Vec<Expression>,
    /// Result count is open (`C == 0`): the call expands in last position.
    pub multiple: bool,
}

impl FunctionCall {
    pub fn print(&self, out: &mut Output<'_>) {
        let mut args = &self.args[..];
        match self.function.as_ref() {
            Expression::Method { object, key } if key.as_identifier().is_some() => {
                object.print_prefix(out);
                out.print(":");
                out.print(key.as_identifier().unwrap_or_default());
                args = args.get(1..).unwrap_or_default();
            }
            function => function.print_prefix(out),
        }
        out.print("(");
        print_list(out, args);
        out.print(")");
    }
}

#[derive(Debug, Clone)]
pub enum Expression {
    Constant(Constant),
    Vararg {
        multiple: bool,
    },
    Global(String),
    Local(LocalRef),
    Upvalue(String),
    Index {
        table: Box<Expression>,
        key: Box<Expression>,
    },
    /// Method lookup produced by `SELF`.
    Method {
        object: Box<Expression>,
        key: Box<Expression>,
    },
    Binary {
        op: BinOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expression>,
    },
    Table(TableLiteral),
    Closure(Rc<Closure>),
    Call(FunctionCall),
}

impl Expression {
    pub fn nil() -> Self {
        Expression::Constant(Constant::Nil)
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Constant(Constant::Boolean(value))
    }

    pub fn number(value: f64) -> Self {
        Expression::Constant(Constant::Number(value))
    }

    pub fn string(value: &str) -> Self {
        Expression::Constant(Constant::String(value.as_bytes().to_vec()))
    }

    pub fn binary(op: BinOp, left: Expression, right: Expression) -> Self {
        Expression::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnOp, operand: Expression) -> Self {
        Expression::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn index(table: Expression, key: Expression) -> Self {
        Expression::Index {
            table: Box::new(table),
            key: Box::new(key),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Expression::Constant(Constant::Nil))
    }

    pub fn is_table_literal(&self) -> bool {
        matches!(self, Expression::Table(_))
    }

    /// Expressions that can fill several registers at once.
    pub fn is_multiple_source(&self) -> bool {
        matches!(self, Expression::Call(_) | Expression::Vararg { .. })
    }

    /// String constants usable as a name (`t.name`, `{name = v}`).
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Constant(c) => c.as_str().filter(|s| is_identifier(s)),
            _ => None,
        }
    }

    pub fn precedence(&self) -> Precedence {
        match self {
            Expression::Binary { op, .. } => op.precedence(),
            Expression::Unary { .. } => Precedence::UNARY,
            Expression::Constant(Constant::Number(v)) if *v < 0.0 || v.is_nan() => {
                Precedence::UNARY
            }
            _ => Precedence::ATOMIC,
        }
    }

    /// Can be followed directly by `.name`, `[key]` or `(args)`.
    fn is_prefix(&self) -> bool {
        matches!(
            self,
            Expression::Global(_)
                | Expression::Local(_)
                | Expression::Upvalue(_)
                | Expression::Index { .. }
                | Expression::Method { .. }
                | Expression::Call(_)
        )
    }

    pub fn begins_with_paren(&self) -> bool {
        match self {
            Expression::Index { table, .. } => !table.is_prefix() || table.begins_with_paren(),
            Expression::Method { object, .. } => {
                !object.is_prefix() || object.begins_with_paren()
            }
            Expression::Call(call) => {
                !call.function.is_prefix() || call.function.begins_with_paren()
            }
            _ => false,
        }
    }

    /// Short enough to share a line inside a table constructor.
    pub fn is_brief(&self) -> bool {
        match self {
            Expression::Constant(_)
            | Expression::Global(_)
            | Expression::Local(_)
            | Expression::Upvalue(_)
            | Expression::Vararg { .. } => true,
            Expression::Unary { operand, .. } => operand.is_brief(),
            Expression::Table(t) => t.entries.is_empty(),
            _ => false,
        }
    }

    pub(crate) fn print_prefix(&self, out: &mut Output<'_>) {
        if self.is_prefix() {
            self.print(out);
        } else {
            out.print("(");
            self.print(out);
            out.print(")");
        }
    }

    fn print_grouped(&self, out: &mut Output<'_>, group: bool) {
        if group {
            out.print("(");
        }
        self.print(out);
        if group {
            out.print(")");
        }
    }

    pub fn print(&self, out: &mut Output<'_>) {
        match self {
            Expression::Constant(c) => print_constant(out, c),
            Expression::Vararg { .. } => out.print("..."),
            Expression::Global(name) | Expression::Upvalue(name) => out.print(name),
            Expression::Local(local) => out.print(&local.name),
            Expression::Index { table, key } | Expression::Method { object: table, key } => {
                table.print_prefix(out);
                match key.as_identifier() {
                    Some(name) => {
                        out.print(".");
                        out.print(name);
                    }
                    None => {
                        out.print("[");
                        key.print(out);
                        out.print("]");
                    }
                }
            }
            Expression::Binary { op, left, right } => {
                let prec = op.precedence();
                let left_group = left.precedence() < prec
                    || (left.precedence() == prec && op.right_associative());
                let right_group = right.precedence() < prec
                    || (right.precedence() == prec && !op.right_associative());
                left.print_grouped(out, left_group);
                out.print(" ");
                out.print(op.symbol());
                out.print(" ");
                right.print_grouped(out, right_group);
            }
            Expression::Unary { op, operand } => {
                out.print(op.symbol());
                let group = operand.precedence() < Precedence::UNARY;
                if *op == UnOp::Neg && !group && operand.prints_leading_minus() {
                    out.print(" ");
                }
                operand.print_grouped(out, group);
            }
            Expression::Table(table) => print_table(out, table),
            Expression::Closure(closure) => {
                out.print("function");
                closure.print_signature(out, false);
                closure.print_body(out);
            }
            Expression::Call(call) => call.print(out),
        }
    }

    fn prints_leading_minus(&self) -> bool {
        match self {
            Expression::Unary { op: UnOp::Neg, .. } => true,
            Expression::Constant(Constant::Number(v)) => v.is_sign_negative(),
            _ => false,
        }
    }

    /// Renders the expression on its own, mostly for diagnostics and tests.
    pub fn to_source(&self) -> String {
        let mut text = String::new();
        let mut out = Output::new(&mut text, 2);
        self.print(&mut out);
        text
    }
}

pub(crate) fn print_list(out: &mut Output<'_>, exprs: &[Expression]) {
    for (i, e) in exprs.iter().enumerate() {
        if i > 0 {
            out.print(", ");
        }
        e.print(out);
    }
}

fn print_table(out: &mut Output<'_>, table: &TableLiteral) {
    let entries = table.ordered();
    if entries.is_empty() {
        out.print("{}");
        return;
    }
    let inline = entries.len() <= 8 && entries.iter().all(|e| e.is_list && e.value.is_brief());
    out.print("{");
    if inline {
        for (i, entry) in entries.iter().enumerate() {
            if i > 0 {
                out.print(", ");
            }
            entry.value.print(out);
        }
        out.print("}");
        return;
    }
    out.println();
    out.indent();
    for (i, entry) in entries.iter().enumerate() {
        if !entry.is_list {
            match entry.key.as_identifier() {
                Some(name) => out.print(name),
                None => {
                    out.print("[");
                    entry.key.print(out);
                    out.print("]");
                }
            }
            out.print(" = ");
        }
        entry.value.print(out);
        if i + 1 < entries.len() {
            out.print(",");
        }
        out.println();
    }
    out.dedent();
    out.print("}");
}

fn print_constant(out: &mut Output<'_>, constant: &Constant) {
    match constant {
        Constant::Nil => out.print("nil"),
        Constant::Boolean(b) => out.print(if *b { "true" } else { "false" }),
        Constant::Number(v) => out.print(&format_number(*v)),
        Constant::String(bytes) => out.print(&quote(bytes)),
    }
}

pub fn format_number(v: f64) -> String {
    if v.is_nan() {
        return "0/0".into();
    }
    if v.is_infinite() {
        return if v > 0.0 { "1/0".into() } else { "-1/0".into() };
    }
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    if v.abs() >= 1e15 || v.abs() < 1e-4 {
        return format!("{v:e}");
    }
    format!("{v}")
}

pub fn quote(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() + 2);
    s.push('"');
    for &b in bytes {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            b'\n' => s.push_str("\\n"),
            b'\r' => s.push_str("\\r"),
            b'\t' => s.push_str("\\t"),
            0x07 => s.push_str("\\a"),
            0x08 => s.push_str("\\b"),
            0x0B => s.push_str("\\v"),
            0x0C => s.push_str("\\f"),
            0x20..=0x7E => s.push(b as char),
            _ => s.push_str(&format!("\\{b:03}")),
        }
    }
    s.push('"');
    s
}

const KEYWORDS: &[&str] = &[
    "and", "break", "do", "else", "elseif", "end", "false", "for", "function", "goto", "if",
    "in", "local", "nil", "not", "or", "repeat", "return", "then", "true", "until", "while",
];

pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_') && !KEYWORDS.contains(&s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(id: usize, name: &str) -> Expression {
        Expression::Local(LocalRef {
            id: DeclId(id),
            name: name.into(),
        })
    }

    #[test]
    fn precedence_groups_only_when_needed() {
        let a = local(0, "a");
        let b = local(1, "b");
        let c = local(2, "c");
        let sum = Expression::binary(BinOp::Add, a.clone(), b.clone());
        let e = Expression::binary(BinOp::Mul, sum.clone(), c.clone());
        assert_eq!(e.to_source(), "(a + b) * c");
        let e = Expression::binary(BinOp::Add, c.clone(), sum.clone());
        assert_eq!(e.to_source(), "c + (a + b)");
        let e = Expression::binary(BinOp::Add, sum, c.clone());
        assert_eq!(e.to_source(), "a + b + c");
    }

    #[test]
    fn right_associative_operators() {
        let a = local(0, "a");
        let b = local(1, "b");
        let c = local(2, "c");
        let bc = Expression::binary(BinOp::Concat, b.clone(), c.clone());
        assert_eq!(
            Expression::binary(BinOp::Concat, a.clone(), bc).to_source(),
            "a .. b .. c"
        );
        let ab = Expression::binary(BinOp::Pow, a, b);
        assert_eq!(Expression::binary(BinOp::Pow, ab, c).to_source(), "(a ^ b) ^ c");
    }

    #[test]
    fn unary_spacing_and_grouping() {
        let a = local(0, "a");
        let neg = Expression::unary(UnOp::Neg, a.clone());
        assert_eq!(Expression::unary(UnOp::Neg, neg).to_source(), "- -a");
        let sum = Expression::binary(BinOp::Add, a.clone(), Expression::number(1.0));
        assert_eq!(Expression::unary(UnOp::Not, sum).to_source(), "not (a + 1)");
        assert_eq!(Expression::unary(UnOp::Len, a).to_source(), "#a");
        let pow = Expression::binary(BinOp::Pow, Expression::number(-2.0), Expression::number(2.0));
        assert_eq!(pow.to_source(), "(-2) ^ 2");
    }

    #[test]
    fn constants() {
        assert_eq!(Expression::number(3.0).to_source(), "3");
        assert_eq!(Expression::number(0.5).to_source(), "0.5");
        assert_eq!(Expression::number(f64::INFINITY).to_source(), "1/0");
        assert_eq!(Expression::string("a\"b\n").to_source(), "\"a\\\"b\\n\"");
        assert_eq!(quote(&[0x01]), "\"\\001\"");
    }

    #[test]
    fn index_uses_dot_for_identifiers() {
        let t = Expression::Global("t".into());
        assert_eq!(Expression::index(t.clone(), Expression::string("x")).to_source(), "t.x");
        assert_eq!(
            Expression::index(t.clone(), Expression::string("end")).to_source(),
            "t[\"end\"]"
        );
        assert_eq!(Expression::index(t, Expression::number(1.0)).to_source(), "t[1]");
        let s = Expression::index(Expression::string("abc"), Expression::string("len"));
        assert_eq!(s.to_source(), "(\"abc\").len");
        assert!(s.begins_with_paren());
    }

    #[test]
    fn method_calls_drop_the_self_argument() {
        let obj = Expression::Global("obj".into());
        let call = FunctionCall {
            function: Box::new(Expression::Method {
                object: Box::new(obj.clone()),
                key: Box::new(Expression::string("run")),
            }),
            args: vec![obj, Expression::number(1.0)],
            multiple: false,
        };
        assert_eq!(Expression::Call(call).to_source(), "obj:run(1)");
    }

    #[test]
    fn table_literal_orders_entries_by_timestamp() {
        let mut t = TableLiteral::default();
        t.push(TableEntry {
            key: Expression::string("x"),
            value: Expression::number(2.0),
            is_list: false,
            timestamp: 3,
        });
        t.push(TableEntry {
            key: Expression::number(1.0),
            value: Expression::number(1.0),
            is_list: true,
            timestamp: 2,
        });
        assert_eq!(Expression::Table(t).to_source(), "{\n  1,\n  x = 2\n}");

        let mut t = TableLiteral::default();
        for i in 1..=3 {
            t.push(TableEntry {
                key: Expression::number(i as f64),
                value: Expression::number(i as f64),
                is_list: true,
                timestamp: i,
            });
        }
        assert_eq!(Expression::Table(t).to_source(), "{1, 2, 3}");
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("_x1"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier("while"));
        assert!(!is_identifier(""));
    }
}
