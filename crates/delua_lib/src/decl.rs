use crate::chunk::LocalVar;

/// Index of a declaration in its function's arena. Two variable references
/// denote the same local exactly when their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub name: String,
    /// First line (1-based pc) at which the register holds this local. This
    /// is the last instruction of the initializer.
    pub begin: usize,
    pub end: usize,
    pub register: usize,
    /// Loop control variables, never declared or assigned by statements.
    pub for_loop: bool,
}

impl Declaration {
    pub fn covers(&self, line: usize) -> bool {
        self.begin <= line && line <= self.end
    }
}

#[derive(Debug, Clone, Default)]
pub struct Declarations {
    decls: Vec<Declaration>,
}

impl Declarations {
    /// Builds the arena from the debug table, assigning each local the lowest
    /// register not already occupied at its first line.
    pub fn from_locals(locals: &[LocalVar]) -> Self {
        let mut decls: Vec<Declaration> = Vec::with_capacity(locals.len());
        for local in locals {
            let begin = local.start_pc;
            let mut register = 0;
            while decls
                .iter()
                .any(|d| d.register == register && d.covers(begin))
            {
                register += 1;
            }
            decls.push(Declaration {
                name: local.name.clone(),
                begin,
                end: local.end_pc,
                register,
                for_loop: local.name.starts_with('('),
            });
        }
        Self { decls }
    }

    /// Placeholder parameters for functions without debug information.
    pub fn with_parameters(num_params: usize, length: usize) -> Self {
        let decls = (0..num_params)
            .map(|i| Declaration {
                name: format!("arg{i}"),
                begin: 0,
                end: length,
                register: i,
                for_loop: false,
            })
            .collect();
        Self { decls }
    }

    pub fn get(&self, id: DeclId) -> &Declaration {
        &self.decls[id.0]
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (DeclId, &Declaration)> {
        self.decls.iter().enumerate().map(|(i, d)| (DeclId(i), d))
    }

    /// The declaration live in `register` at `line`.
    pub fn at(&self, register: usize, line: usize) -> Option<DeclId> {
        self.decls
            .iter()
            .rposition(|d| d.register == register && d.covers(line))
            .map(DeclId)
    }

    /// Marks the explicit variables of a loop as loop-controlled.
    pub fn mark_loop_variables(&mut self, first: usize, count: usize, begin: usize) {
        for d in &mut self.decls {
            if d.begin == begin && d.register >= first && d.register < first + count {
                d.for_loop = true;
            }
        }
    }
}
