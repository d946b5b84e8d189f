use serde::{Deserialize, Serialize};

use crate::error::{DecompileError, Result};
use crate::opcode::{OPS_51, OPS_52, Op};

/// Dialect policy. Everything that differs between the two supported
/// bytecode formats is answered here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    Lua51,
    Lua52,
}

impl Version {
    pub fn from_header_byte(byte: u8) -> Result<Self> {
        match byte {
            0x51 => Ok(Version::Lua51),
            0x52 => Ok(Version::Lua52),
            other => Err(DecompileError::UnsupportedVersion(other)),
        }
    }

    pub fn header_byte(self) -> u8 {
        match self {
            Version::Lua51 => 0x51,
            Version::Lua52 => 0x52,
        }
    }

    /// 5.2 appends `LUAC_TAIL` to the header.
    pub fn has_header_tail(self) -> bool {
        matches!(self, Version::Lua52)
    }

    /// Shift applied to the instruction count when laying out a function's
    /// outermost block (5.1 always ends in an implicit `RETURN`).
    pub fn outer_scope_adjustment(self) -> isize {
        match self {
            Version::Lua51 => -1,
            Version::Lua52 => 0,
        }
    }

    /// Opcode that the entry `JMP` of a generic `for` targets.
    pub fn tfor_target(self) -> Op {
        match self {
            Version::Lua51 => Op::TForLoop,
            Version::Lua52 => Op::TForCall,
        }
    }

    /// True when upvalues are declared by pseudo-instructions following
    /// `CLOSURE`; false when the nested function carries descriptors.
    pub fn upvalues_inline(self) -> bool {
        matches!(self, Version::Lua51)
    }

    /// Registers cleared by `LOADNIL A B`.
    pub fn loadnil_range(self, a: u32, b: u32) -> std::ops::RangeInclusive<u32> {
        match self {
            Version::Lua51 => a..=b,
            Version::Lua52 => a..=a + b,
        }
    }

    pub fn is_breakable_loop_end(self, op: Op) -> bool {
        match self {
            Version::Lua51 => matches!(op, Op::Jmp | Op::ForLoop),
            Version::Lua52 => matches!(op, Op::Jmp | Op::ForLoop | Op::TForLoop),
        }
    }

    pub fn decode_op(self, code: u8) -> Option<Op> {
        match self {
            Version::Lua51 => OPS_51.get(code as usize).copied(),
            Version::Lua52 => OPS_52.get(code as usize).copied(),
        }
    }

    pub fn encode_op(self, op: Op) -> Option<u8> {
        let table: &[Op] = match self {
            Version::Lua51 => &OPS_51,
            Version::Lua52 => &OPS_52,
        };
        table.iter().position(|&o| o == op).map(|p| p as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_byte_selects_dialect() {
        assert_eq!(Version::from_header_byte(0x51).unwrap(), Version::Lua51);
        assert_eq!(Version::from_header_byte(0x52).unwrap(), Version::Lua52);
        assert!(matches!(
            Version::from_header_byte(0x53),
            Err(DecompileError::UnsupportedVersion(0x53))
        ));
    }

    #[test]
    fn loadnil_encodings() {
        assert_eq!(Version::Lua51.loadnil_range(2, 4), 2..=4);
        assert_eq!(Version::Lua52.loadnil_range(2, 2), 2..=4);
    }

    #[test]
    fn policy_answers() {
        assert_eq!(Version::Lua51.tfor_target(), Op::TForLoop);
        assert_eq!(Version::Lua52.tfor_target(), Op::TForCall);
        assert!(Version::Lua51.upvalues_inline());
        assert!(!Version::Lua52.upvalues_inline());
        assert!(!Version::Lua51.is_breakable_loop_end(Op::TForLoop));
        assert!(Version::Lua52.is_breakable_loop_end(Op::TForLoop));
        assert_eq!(Version::Lua51.encode_op(Op::Vararg), Some(37));
        assert_eq!(Version::Lua52.encode_op(Op::GetGlobal), None);
    }
}
