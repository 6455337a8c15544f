//! lish - a lightweight batch-style command shell
//!
//! Usage:
//!   lish              Start the interactive shell
//!   lish script.lish  Run a script, then continue interactively

use lish::Shell;
use std::env;
use std::process::ExitCode;

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_help() {
    println!(
        r#"lish-{} A lightweight batch-style command shell

USAGE:
    lish                    Start the interactive shell
    lish <script.lish>      Run a script, then continue interactively
    lish --help             Show this help message
    lish --version          Show version

Scripts are spliced into the input stream and replayed as if typed.
Type `help` inside the shell for the builtin commands and control lines."#,
        VERSION
    );
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();

    match args.first().map(String::as_str) {
        Some("--help") | Some("-h") => {
            print_help();
            return ExitCode::SUCCESS;
        }
        Some("--version") | Some("-V") => {
            println!("lish {}", VERSION);
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let mut shell = match Shell::new() {
        Ok(shell) => shell,
        Err(err) => {
            eprintln!("lish: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = args.first() {
        if let Err(err) = shell.source(path) {
            eprintln!("lish: {path}: {err}");
            return ExitCode::FAILURE;
        }
    }

    match shell.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("lish: {err}");
            ExitCode::FAILURE
        }
    }
}
