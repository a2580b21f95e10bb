//! The interpreter binary: takes a source file and either dumps an
//! intermediate stage or runs the program end to end.
//!
//! Run with `--help` for more info.

use std::process::ExitCode;

use clap::Parser;

use dynlang::back::Vm;
use dynlang::error::InterpError;
use dynlang::eval::Evaluator;
use dynlang::front::{self, Lexer};
use dynlang::middle::lower;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the input file
    file: String,
    /// print the token stream and exit without executing
    #[arg(long)]
    output_lexer: bool,
    /// print the parsed tree and exit without executing
    #[arg(long)]
    output_parser: bool,
    /// print the lowered IR and exit without executing
    #[arg(long)]
    output_ir: bool,
    /// execute with the tree evaluator instead of the register VM
    #[arg(long)]
    tree_evaluate: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), InterpError> {
    let input = std::fs::read_to_string(&args.file)?;

    if args.output_lexer {
        for token in Lexer::new(&input).tokenize()? {
            println!("{token}");
        }
        return Ok(());
    }

    let program = front::parse(&input)?;

    if args.output_parser {
        println!("{program:#?}");
        return Ok(());
    }

    if args.output_ir {
        let ir = lower(&program)?;
        print!("{}", ir.render());
        return Ok(());
    }

    let mut stdout = std::io::stdout();
    if args.tree_evaluate {
        Evaluator::new().run(&program, &mut stdout)?;
    } else {
        let ir = lower(&program)?;
        Vm::new(ir).run(&mut stdout)?;
    }
    Ok(())
}
