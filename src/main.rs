//! Sable Compiler CLI
//!
//! `sablec` compiles a queue of source files into one IL stream:
//! `sablec <input.src>... -o <out.il>`. Exit code 0 on success, 1 when
//! diagnostics were reported, 2 on I/O failure.

use clap::Parser;
use sable::driver::{CompileError, Driver, Options};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sablec")]
#[command(version = sable::VERSION)]
#[command(about = "The Sable compiler", long_about = None)]
struct Cli {
    /// Input source files, compiled as one set
    #[arg(value_name = "FILE", required = true)]
    inputs: Vec<PathBuf>,

    /// Output IL file
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Print each input's token stream
    #[arg(long)]
    dump_tokens: bool,

    /// Print each input's AST
    #[arg(long)]
    dump_ast: bool,

    /// Disable ANSI colors in diagnostics
    #[arg(long)]
    no_color: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let mut driver = Driver::new(Options {
        dump_tokens: cli.dump_tokens,
        dump_ast: cli.dump_ast,
    });
    for input in cli.inputs {
        driver.queue_file(input);
    }

    match driver.compile_write_binary(&cli.output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err @ CompileError::Diagnostics(_)) => {
            eprintln!("{}", err);
            ExitCode::from(1)
        }
        Err(CompileError::Io(err)) => {
            eprintln!("error: {}", err);
            ExitCode::from(2)
        }
    }
}
