//! Binary entry point for the imagedex CLI.

use clap::Parser;
use imagedex::cli::Cli;
use imagedex::error;

fn main() {
    let cli = Cli::parse();
    let json_errors = cli.json_errors;

    let code = match imagedex::run_app(cli) {
        Ok(code) => code,
        Err(err) => error::report_failure(&err, json_errors),
    };
    std::process::exit(code.as_i32());
}
