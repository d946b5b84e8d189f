use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{DecompileError, Result};
use crate::version::Version;

/// Union of the Lua 5.1 and 5.2 instruction sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Op {
    Move,
    LoadK,
    LoadKx,
    LoadBool,
    LoadNil,
    GetUpval,
    GetGlobal,
    GetTabUp,
    GetTable,
    SetGlobal,
    SetTabUp,
    SetUpval,
    SetTable,
    NewTable,
    SelfOp,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForCall,
    TForLoop,
    SetList,
    Close,
    Closure,
    Vararg,
    ExtraArg,
}

pub(crate) const OPS_51: [Op; 38] = [
    Op::Move,
    Op::LoadK,
    Op::LoadBool,
    Op::LoadNil,
    Op::GetUpval,
    Op::GetGlobal,
    Op::GetTable,
    Op::SetGlobal,
    Op::SetUpval,
    Op::SetTable,
    Op::NewTable,
    Op::SelfOp,
    Op::Add,
    Op::Sub,
    Op::Mul,
    Op::Div,
    Op::Mod,
    Op::Pow,
    Op::Unm,
    Op::Not,
    Op::Len,
    Op::Concat,
    Op::Jmp,
    Op::Eq,
    Op::Lt,
    Op::Le,
    Op::Test,
    Op::TestSet,
    Op::Call,
    Op::TailCall,
    Op::Return,
    Op::ForLoop,
    Op::ForPrep,
    Op::TForLoop,
    Op::SetList,
    Op::Close,
    Op::Closure,
    Op::Vararg,
];

pub(crate) const OPS_52: [Op; 40] = [
    Op::Move,
    Op::LoadK,
    Op::LoadKx,
    Op::LoadBool,
    Op::LoadNil,
    Op::GetUpval,
    Op::GetTabUp,
    Op::GetTable,
    Op::SetTabUp,
    Op::SetUpval,
    Op::SetTable,
    Op::NewTable,
    Op::SelfOp,
    Op::Add,
    Op::Sub,
    Op::Mul,
    Op::Div,
    Op::Mod,
    Op::Pow,
    Op::Unm,
    Op::Not,
    Op::Len,
    Op::Concat,
    Op::Jmp,
    Op::Eq,
    Op::Lt,
    Op::Le,
    Op::Test,
    Op::TestSet,
    Op::Call,
    Op::TailCall,
    Op::Return,
    Op::ForLoop,
    Op::ForPrep,
    Op::TForCall,
    Op::TForLoop,
    Op::SetList,
    Op::Closure,
    Op::Vararg,
    Op::ExtraArg,
];

impl Op {
    pub fn name(self) -> &'static str {
        match self {
            Op::Move => "MOVE",
            Op::LoadK => "LOADK",
            Op::LoadKx => "LOADKX",
            Op::LoadBool => "LOADBOOL",
            Op::LoadNil => "LOADNIL",
            Op::GetUpval => "GETUPVAL",
            Op::GetGlobal => "GETGLOBAL",
            Op::GetTabUp => "GETTABUP",
            Op::GetTable => "GETTABLE",
            Op::SetGlobal => "SETGLOBAL",
            Op::SetTabUp => "SETTABUP",
            Op::SetUpval => "SETUPVAL",
            Op::SetTable => "SETTABLE",
            Op::NewTable => "NEWTABLE",
            Op::SelfOp => "SELF",
            Op::Add => "ADD",
            Op::Sub => "SUB",
            Op::Mul => "MUL",
            Op::Div => "DIV",
            Op::Mod => "MOD",
            Op::Pow => "POW",
            Op::Unm => "UNM",
            Op::Not => "NOT",
            Op::Len => "LEN",
            Op::Concat => "CONCAT",
            Op::Jmp => "JMP",
            Op::Eq => "EQ",
            Op::Lt => "LT",
            Op::Le => "LE",
            Op::Test => "TEST",
            Op::TestSet => "TESTSET",
            Op::Call => "CALL",
            Op::TailCall => "TAILCALL",
            Op::Return => "RETURN",
            Op::ForLoop => "FORLOOP",
            Op::ForPrep => "FORPREP",
            Op::TForCall => "TFORCALL",
            Op::TForLoop => "TFORLOOP",
            Op::SetList => "SETLIST",
            Op::Close => "CLOSE",
            Op::Closure => "CLOSURE",
            Op::Vararg => "VARARG",
            Op::ExtraArg => "EXTRAARG",
        }
    }

    /// Two-way tests that are always followed by a `JMP`.
    pub fn is_condition(self) -> bool {
        matches!(self, Op::Eq | Op::Lt | Op::Le | Op::Test | Op::TestSet)
    }

    pub(crate) fn format(self) -> Format {
        match self {
            Op::LoadK | Op::LoadKx | Op::GetGlobal | Op::SetGlobal | Op::Closure => Format::ABx,
            Op::Jmp | Op::ForLoop | Op::ForPrep => Format::AsBx,
            Op::TForLoop => Format::AsBxOr51,
            Op::ExtraArg => Format::Ax,
            _ => Format::ABC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Format {
    ABC,
    ABx,
    AsBx,
    /// `TFORLOOP` is `A C` in 5.1 and `A sBx` in 5.2.
    AsBxOr51,
    Ax,
}

const SIZE_OP: u32 = 6;
const POS_A: u32 = 6;
const POS_C: u32 = 14;
const POS_B: u32 = 23;
const POS_BX: u32 = 14;
const MASK_A: u32 = 0xFF;
const MASK_BC: u32 = 0x1FF;
const MASK_BX: u32 = 0x3FFFF;
const MAXARG_SBX: i32 = 131071;

/// A decoded instruction. All operand views are precomputed; which ones
/// are meaningful depends on the opcode's format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub op: Op,
    pub a: u32,
    pub b: u32,
    pub c: u32,
    pub bx: u32,
    pub sbx: i32,
}

impl Instruction {
    pub fn decode(raw: u32, version: Version, pc: usize) -> Result<Self> {
        let code = (raw & ((1 << SIZE_OP) - 1)) as u8;
        let op = version
            .decode_op(code)
            .ok_or(DecompileError::InvalidOpcode { op: code, pc })?;
        Ok(Self::from_raw(op, raw))
    }

    fn from_raw(op: Op, raw: u32) -> Self {
        let bx = (raw >> POS_BX) & MASK_BX;
        Self {
            op,
            a: (raw >> POS_A) & MASK_A,
            b: (raw >> POS_B) & MASK_BC,
            c: (raw >> POS_C) & MASK_BC,
            bx,
            sbx: bx as i32 - MAXARG_SBX,
        }
    }

    pub fn abc(op: Op, a: u32, b: u32, c: u32) -> Self {
        Self::from_raw(
            op,
            (a & MASK_A) << POS_A | (b & MASK_BC) << POS_B | (c & MASK_BC) << POS_C,
        )
    }

    pub fn abx(op: Op, a: u32, bx: u32) -> Self {
        Self::from_raw(op, (a & MASK_A) << POS_A | (bx & MASK_BX) << POS_BX)
    }

    pub fn asbx(op: Op, a: u32, sbx: i32) -> Self {
        Self::abx(op, a, (sbx + MAXARG_SBX) as u32)
    }

    /// Raw operand word following a 5.1 `SETLIST` with `C == 0`, carried as
    /// an `EXTRAARG` so both versions read it through [`Instruction::ax`].
    pub fn data(word: u32) -> Self {
        Self::from_raw(Op::ExtraArg, word << SIZE_OP)
    }

    pub fn ax(&self) -> u32 {
        self.bx << 8 | self.a
    }

    /// Re-encodes the instruction for `version`.
    pub fn encode(&self, version: Version) -> Option<u32> {
        let code = version.encode_op(self.op)? as u32;
        Some(code | (self.a & MASK_A) << POS_A | (self.bx & MASK_BX) << POS_BX)
    }

    /// Jump destination as a 1-based line, for `sBx`-format jumps at `line`.
    pub fn jump_target(&self, line: usize) -> usize {
        (line as i64 + 1 + self.sbx as i64) as usize
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op.format() {
            Format::ABC => write!(f, "{:<9} {} {} {}", self.op.name(), self.a, self.b, self.c),
            Format::ABx => write!(f, "{:<9} {} {}", self.op.name(), self.a, self.bx),
            Format::AsBx => write!(f, "{:<9} {} {}", self.op.name(), self.a, self.sbx),
            Format::AsBxOr51 => write!(
                f,
                "{:<9} {} {} {} {}",
                self.op.name(),
                self.a,
                self.sbx,
                self.b,
                self.c
            ),
            Format::Ax => write!(f, "{:<9} {}", self.op.name(), self.ax()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_fields() {
        // LOADK 1 2 in 5.1: op=1, A=1, Bx=2
        let raw = 1 | 1 << 6 | 2 << 14;
        let ins = Instruction::decode(raw, Version::Lua51, 0).unwrap();
        assert_eq!(ins.op, Op::LoadK);
        assert_eq!(ins.a, 1);
        assert_eq!(ins.bx, 2);
    }

    #[test]
    fn abc_and_encode_agree() {
        let ins = Instruction::abc(Op::Eq, 0, 0, 256);
        let raw = ins.encode(Version::Lua51).unwrap();
        let back = Instruction::decode(raw, Version::Lua51, 0).unwrap();
        assert_eq!(back, ins);
        assert_eq!(back.c, 256);
    }

    #[test]
    fn signed_jump() {
        let ins = Instruction::asbx(Op::Jmp, 0, -3);
        assert_eq!(ins.sbx, -3);
        assert_eq!(ins.jump_target(10), 8);
        let raw = ins.encode(Version::Lua52).unwrap();
        assert_eq!(Instruction::decode(raw, Version::Lua52, 0).unwrap().sbx, -3);
    }

    #[test]
    fn dialects_number_opcodes_differently() {
        assert_eq!(Version::Lua51.decode_op(5), Some(Op::GetGlobal));
        assert_eq!(Version::Lua52.decode_op(6), Some(Op::GetTabUp));
        assert_eq!(Version::Lua51.decode_op(38), None);
        assert!(Instruction::decode(63, Version::Lua51, 4).is_err());
    }
}
