use log::debug;
use serde::{Deserialize, Serialize};

pub mod branch;
pub mod chunk;
pub mod decl;
pub mod decompiler;
pub mod disasm;
pub mod error;
pub mod expr;
pub mod opcode;
pub mod operation;
pub mod output;
pub mod registers;
pub mod statement;
pub mod stream;
pub mod target;
pub mod version;

pub use chunk::{Chunk, Constant, Function, LocalVar, UpvalueDesc};
pub use error::DecompileError;
pub use opcode::{Instruction, Op};
pub use output::{Output, OutputSink};
pub use statement::Statement;
pub use version::Version;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompileMode {
    Source,
    Disasm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecompileVersion {
    Auto,
    Lua51,
    Lua52,
}

impl DecompileVersion {
    fn forced(self) -> Option<Version> {
        match self {
            DecompileVersion::Auto => None,
            DecompileVersion::Lua51 => Some(Version::Lua51),
            DecompileVersion::Lua52 => Some(Version::Lua52),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecompileOptions {
    pub mode: DecompileMode,
    pub version: DecompileVersion,
    pub indent: usize,
}

impl Default for DecompileOptions {
    fn default() -> Self {
        Self {
            mode: DecompileMode::Source,
            version: DecompileVersion::Auto,
            indent: 2,
        }
    }
}

pub fn function_source(function: &Function, version: Version, indent: usize) -> Result<String, DecompileError> {
    let body = decompiler::decompile_function(function, version)?;
    let mut text = String::new();
    let mut out = Output::new(&mut text, indent);
    Statement::print_sequence(&mut out, &body);
    Ok(text)
}

pub fn decompile_with_options(bytecode: &[u8], options: DecompileOptions) -> Result<String, DecompileError> {
    let chunk = Chunk::parse(bytecode, options.version.forced())?;
    debug!(
        "parsed {:?} chunk ({} instructions in main, {} nested functions)",
        chunk.header.version,
        chunk.main.code.len(),
        chunk.main.functions.len()
    );
    match options.mode {
        DecompileMode::Source => function_source(&chunk.main, chunk.header.version, options.indent),
        DecompileMode::Disasm => Ok(disasm::disassemble(&chunk.main, "main")),
    }
}

pub fn decompile(bytecode: &[u8]) -> Result<String, DecompileError> {
    decompile_with_options(bytecode, DecompileOptions::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = DecompileOptions::default();
        assert_eq!(options.mode, DecompileMode::Source);
        assert_eq!(options.version, DecompileVersion::Auto);
        assert_eq!(options.indent, 2);
    }

    #[test]
    fn rejects_foreign_input() {
        assert!(matches!(
            decompile(b"\x7fELF\x02\x01\x01"),
            Err(DecompileError::BadSignature)
        ));
        assert!(matches!(decompile(b""), Err(DecompileError::BadSignature)));
    }
}
