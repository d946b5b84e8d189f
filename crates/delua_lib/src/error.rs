use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecompileError {
    #[error("unexpected end of input")]
    Eof,

    #[error("truncated chunk (wanted {wanted} bytes, got {got})")]
    Truncated { wanted: usize, got: usize },

    #[error("not a Lua binary chunk")]
    BadSignature,

    #[error("unsupported Lua bytecode version: 0x{0:02x}")]
    UnsupportedVersion(u8),

    #[error("unsupported chunk format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid opcode {op} at pc={pc}")]
    InvalidOpcode { op: u8, pc: usize },

    #[error("invalid constant index: {0}")]
    InvalidConstant(usize),

    #[error("unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("unsupported control flow at line {line}: {reason}")]
    UnsupportedShape { line: usize, reason: String },
}

impl DecompileError {
    pub(crate) fn shape(line: usize, reason: impl Into<String>) -> Self {
        DecompileError::UnsupportedShape {
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, DecompileError>;
