use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum, builder::{Styles, styling::{AnsiColor, Effects}}, crate_description, crate_name, crate_version};
use clap_complete::Shell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecompileModeCli {
    Source,
    Disasm,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DecompileVersionCli {
    Auto,
    Lua51,
    Lua52,
}

impl From<DecompileModeCli> for delua_lib::DecompileMode {
    fn from(mode: DecompileModeCli) -> Self {
        match mode {
            DecompileModeCli::Source => delua_lib::DecompileMode::Source,
            DecompileModeCli::Disasm => delua_lib::DecompileMode::Disasm,
        }
    }
}

impl From<DecompileVersionCli> for delua_lib::DecompileVersion {
    fn from(version: DecompileVersionCli) -> Self {
        match version {
            DecompileVersionCli::Auto => delua_lib::DecompileVersion::Auto,
            DecompileVersionCli::Lua51 => delua_lib::DecompileVersion::Lua51,
            DecompileVersionCli::Lua52 => delua_lib::DecompileVersion::Lua52,
        }
    }
}

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Decompiles a compiled Lua chunk
    Decompile {
        #[command(subcommand)]
        command: DecompileCommand,
    },
    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum DecompileCommand {
    /// Decompiles a luac output file
    File {
        /// Path to the compiled chunk
        path: PathBuf,

        /// Output mode
        #[arg(long, value_enum, default_value_t = DecompileModeCli::Source)]
        mode: DecompileModeCli,

        /// Select bytecode version (default: read from the header)
        #[arg(long, value_enum, default_value_t = DecompileVersionCli::Auto)]
        version: DecompileVersionCli,

        /// Spaces per indentation level
        #[arg(long, default_value_t = 2)]
        indent: usize,

        /// Log what the decompiler is doing to stderr
        #[arg(short, long, default_value_t = false)]
        verbose: bool,
    }
}
