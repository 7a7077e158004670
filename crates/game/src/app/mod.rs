mod bootstrap;
mod gameplay;
mod loop_runner;

pub(crate) use bootstrap::{build_app, parse_args, usage_text, CliCommand};
pub(crate) use loop_runner::run;
