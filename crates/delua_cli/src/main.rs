use clap::{CommandFactory, Parser};
use log::LevelFilter;

use crate::cli::{Cli, DecompileCommand, TopLevel};

mod cli;

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Decompile { command }) => match command {
            DecompileCommand::File {
                path,
                mode,
                version,
                indent,
                verbose,
            } => {
                env_logger::Builder::from_default_env()
                    .filter_level(if verbose { LevelFilter::Debug } else { LevelFilter::Warn })
                    .init();
                match std::fs::read(&path) {
                    Ok(bytes) => match delua_lib::decompile_with_options(
                        &bytes,
                        delua_lib::DecompileOptions {
                            mode: mode.into(),
                            version: version.into(),
                            indent,
                        },
                    ) {
                        Ok(out) => {
                            print!("{out}");
                        }
                        Err(e) => {
                            eprintln!("decompile error: {e}");
                            std::process::exit(1);
                        }
                    },
                    Err(e) => {
                        eprintln!("failed to read {path:?}: {e}");
                        std::process::exit(1);
                    }
                }
            }
        },
        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        }
        None => {
            if let Err(e) = Cli::command().print_help() {
                eprintln!("{e}");
                std::process::exit(1);
            }
        }
    }
}
