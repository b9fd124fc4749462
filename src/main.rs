use std::io;
use std::process;

use authcheck::config::ArgsError;
use authcheck::{EXIT_ARGS_DECLINED, EXIT_INTERNAL, HttpTransport, SystemClock, check, parse_args};
use tracing::Level;

fn main() {
    let config = match parse_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ArgsError::Declined(e)) => {
            // clap renders help as well as usage errors. Logging is not set
            // up yet and we exit either way, so a failed write is dropped.
            let _ = e.print();
            process::exit(EXIT_ARGS_DECLINED);
        }
        Err(ArgsError::Invalid(e)) => {
            eprintln!("{}", e);
            process::exit(EXIT_INTERNAL);
        }
    };

    // Logs go to stderr so stdout only carries the verdict.
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(if config.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    let outcome = check(
        &config,
        &HttpTransport,
        &SystemClock,
        &mut io::stdout(),
        &mut io::stderr(),
    );
    match outcome {
        Ok(outcome) => process::exit(outcome.verdict.exit_code()),
        Err(e) => {
            tracing::error!("Could not write output: {}", e);
            process::exit(EXIT_INTERNAL);
        }
    }
}
