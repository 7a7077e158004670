use std::env;
use std::process::ExitCode;

mod app;

use app::CliCommand;

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match app::parse_args(&args) {
        Ok(CliCommand::Run(options)) => options,
        Ok(CliCommand::Help) => {
            println!("{}", app::usage_text());
            return ExitCode::SUCCESS;
        }
        Err(message) => {
            eprintln!("{message}\n\n{}", app::usage_text());
            return ExitCode::from(2);
        }
    };

    match app::build_app(options) {
        Ok(wiring) => app::run(wiring),
        Err(message) => {
            eprintln!("startup failed: {message}");
            ExitCode::FAILURE
        }
    }
}
