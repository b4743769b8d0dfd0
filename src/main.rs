use std::process::ExitCode;

use estlknet::{command, init_logging, parse_args, run};

fn main() -> ExitCode {
    let options = match parse_args(std::env::args_os()) {
        Ok(options) => options,
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                clap_err.exit();
            }
            eprintln!("Error: {:#}", err);
            return ExitCode::FAILURE;
        }
    };

    if options.source.is_none() {
        eprintln!("{}", command().render_help());
        return ExitCode::FAILURE;
    }

    // Initialize logging
    if let Err(err) = init_logging(options.verbose) {
        eprintln!("Error: {:#}", err);
    }
    tracing::debug!("Arguments: {:?}", std::env::args_os().collect::<Vec<_>>());

    match run(&options) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}
