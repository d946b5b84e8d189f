use serde::{Deserialize, Serialize};

use crate::error::{DecompileError, Result};
use crate::opcode::{Instruction, Op};
use crate::stream::ByteStream;
use crate::version::Version;

const SIGNATURE: &[u8] = b"\x1bLua";
const LUAC_TAIL: &[u8] = b"\x19\x93\r\n\x1a\n";

const TNIL: u8 = 0;
const TBOOLEAN: u8 = 1;
const TNUMBER: u8 = 3;
const TSTRING: u8 = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Constant {
    Nil,
    Boolean(bool),
    Number(f64),
    String(Vec<u8>),
}

impl Constant {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Constant::String(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVar {
    pub name: String,
    pub start_pc: usize,
    pub end_pc: usize,
}

/// 5.2 upvalue descriptor: captured from the enclosing function's stack
/// (`in_stack`) or from its upvalue list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpvalueDesc {
    pub in_stack: bool,
    pub index: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: Version,
    pub big_endian: bool,
    pub int_size: u8,
    pub size_t_size: u8,
    pub instruction_size: u8,
    pub number_size: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub source: Option<String>,
    pub line_defined: i64,
    pub last_line_defined: i64,
    pub num_upvalues: u8,
    pub num_params: u8,
    pub is_vararg: bool,
    pub max_stack_size: u8,
    #[serde(skip)]
    pub code: Vec<Instruction>,
    pub constants: Vec<Constant>,
    pub functions: Vec<Function>,
    pub upvalues: Vec<UpvalueDesc>,
    pub line_info: Vec<i64>,
    pub locals: Vec<LocalVar>,
    pub upvalue_names: Vec<String>,
}

impl Function {
    /// Source line of the instruction at 1-based `line`, or -1.
    pub fn source_line(&self, line: usize) -> i64 {
        line.checked_sub(1)
            .and_then(|pc| self.line_info.get(pc).copied())
            .unwrap_or(-1)
    }

    pub fn upvalue_name(&self, index: usize) -> String {
        self.upvalue_names
            .get(index)
            .cloned()
            .unwrap_or_else(|| format!("_UPVALUE{index}_"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub header: Header,
    pub main: Function,
}

impl Chunk {
    pub fn parse(bytes: &[u8], forced: Option<Version>) -> Result<Self> {
        let mut r = ByteStream::new(bytes, false);
        let header = read_header(&mut r, forced)?;
        let mut parser = FunctionParser { r, header };
        let main = parser.read_function(None)?;
        Ok(Chunk { header, main })
    }
}

fn read_header(r: &mut ByteStream<'_>, forced: Option<Version>) -> Result<Header> {
    if r.read_chars(SIGNATURE.len()) != SIGNATURE {
        return Err(DecompileError::BadSignature);
    }
    let version = Version::from_header_byte(r.read_u8()?)?;
    if let Some(forced) = forced {
        if forced != version {
            return Err(DecompileError::UnsupportedFormat(format!(
                "chunk is {:?}, but {:?} was requested",
                version, forced
            )));
        }
    }
    let format = r.read_u8()?;
    if format != 0 {
        return Err(DecompileError::UnsupportedFormat(format!("format {format}")));
    }
    let big_endian = r.read_u8()? == 0;
    r.set_big_endian(big_endian);
    let int_size = r.read_u8()?;
    let size_t_size = r.read_u8()?;
    let instruction_size = r.read_u8()?;
    let number_size = r.read_u8()?;
    let integral = r.read_u8()?;
    if instruction_size != 4 {
        return Err(DecompileError::UnsupportedFormat(format!(
            "instruction size {instruction_size}"
        )));
    }
    if integral != 0 || !matches!(number_size, 4 | 8) {
        return Err(DecompileError::UnsupportedFormat(format!(
            "number size {number_size} (integral={integral})"
        )));
    }
    if version.has_header_tail() && r.read_chars(LUAC_TAIL.len()) != LUAC_TAIL {
        return Err(DecompileError::BadSignature);
    }
    Ok(Header {
        version,
        big_endian,
        int_size,
        size_t_size,
        instruction_size,
        number_size,
    })
}

struct FunctionParser<'a> {
    r: ByteStream<'a>,
    header: Header,
}

impl<'a> FunctionParser<'a> {
    fn read_int(&mut self) -> Result<i64> {
        self.r.read_int(self.header.int_size)
    }

    fn read_count(&mut self) -> Result<usize> {
        let n = self.read_int()?;
        if n < 0 || n as usize > self.r.remaining() {
            return Err(DecompileError::Truncated {
                wanted: n.max(0) as usize,
                got: self.r.remaining(),
            });
        }
        Ok(n as usize)
    }

    fn read_string(&mut self) -> Result<Option<Vec<u8>>> {
        let len = self.r.read_size_t(self.header.size_t_size)? as usize;
        if len == 0 {
            return Ok(None);
        }
        let mut bytes = self.r.read_chars(len);
        if bytes.len() < len {
            return Err(DecompileError::Truncated {
                wanted: len,
                got: bytes.len(),
            });
        }
        bytes.pop(); // trailing NUL
        Ok(Some(bytes))
    }

    fn read_name(&mut self) -> Result<String> {
        Ok(self
            .read_string()?
            .map(|b| String::from_utf8_lossy(&b).into_owned())
            .unwrap_or_default())
    }

    fn read_number(&mut self) -> Result<f64> {
        match self.header.number_size {
            4 => self.r.read_float_as_double(),
            _ => self.r.read_f64(),
        }
    }

    fn read_function(&mut self, parent_source: Option<&str>) -> Result<Function> {
        let version = self.header.version;
        let mut source = None;
        if version == Version::Lua51 {
            source = self.read_string()?.map(|b| String::from_utf8_lossy(&b).into_owned());
        }
        let line_defined = self.read_int()?;
        let last_line_defined = self.read_int()?;
        let mut num_upvalues = 0;
        if version == Version::Lua51 {
            num_upvalues = self.r.read_u8()?;
        }
        let num_params = self.r.read_u8()?;
        let is_vararg = self.r.read_u8()? != 0;
        let max_stack_size = self.r.read_u8()?;

        let n = self.read_count()?;
        let mut code = Vec::with_capacity(n);
        for pc in 0..n {
            let raw = self.r.read_u32()?;
            let data_word = version == Version::Lua51
                && code
                    .last()
                    .is_some_and(|prev: &Instruction| prev.op == Op::SetList && prev.c == 0);
            if data_word {
                code.push(Instruction::data(raw));
            } else {
                code.push(Instruction::decode(raw, version, pc)?);
            }
        }

        let n = self.read_count()?;
        let mut constants = Vec::with_capacity(n);
        for _ in 0..n {
            let constant = match self.r.read_u8()? {
                TNIL => Constant::Nil,
                TBOOLEAN => Constant::Boolean(self.r.read_u8()? != 0),
                TNUMBER => Constant::Number(self.read_number()?),
                TSTRING => Constant::String(self.read_string()?.unwrap_or_default()),
                tag => {
                    return Err(DecompileError::UnsupportedFormat(format!(
                        "constant tag {tag}"
                    )));
                }
            };
            constants.push(constant);
        }

        let inherited = source.clone().or_else(|| parent_source.map(str::to_owned));
        let n = self.read_count()?;
        let mut functions = Vec::with_capacity(n);
        for _ in 0..n {
            functions.push(self.read_function(inherited.as_deref())?);
        }

        let mut upvalues = Vec::new();
        if version == Version::Lua52 {
            let n = self.read_count()?;
            for _ in 0..n {
                let in_stack = self.r.read_u8()? != 0;
                let index = self.r.read_u8()?;
                upvalues.push(UpvalueDesc { in_stack, index });
            }
            num_upvalues = upvalues.len() as u8;
            source = self.read_string()?.map(|b| String::from_utf8_lossy(&b).into_owned());
        }

        let n = self.read_count()?;
        let mut line_info = Vec::with_capacity(n);
        for _ in 0..n {
            line_info.push(self.read_int()?);
        }

        let n = self.read_count()?;
        let mut locals = Vec::with_capacity(n);
        for _ in 0..n {
            let name = self.read_name()?;
            let start_pc = self.read_int()?.max(0) as usize;
            let end_pc = self.read_int()?.max(0) as usize;
            locals.push(LocalVar {
                name,
                start_pc,
                end_pc,
            });
        }

        let n = self.read_count()?;
        let mut upvalue_names = Vec::with_capacity(n);
        for _ in 0..n {
            upvalue_names.push(self.read_name()?);
        }

        Ok(Function {
            source: source.or(inherited),
            line_defined,
            last_line_defined,
            num_upvalues,
            num_params,
            is_vararg,
            max_stack_size,
            code,
            constants,
            functions,
            upvalues,
            line_info,
            locals,
            upvalue_names,
        })
    }
}
