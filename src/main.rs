use log::{debug, warn};

use clap::Parser;
use snafu::ErrorCompat;
use voter_import::Notice;

mod args;
mod importer;

use crate::args::Args;
use crate::importer::{print_notice, ImportError};

fn report(e: &ImportError) {
    let mut cause = match e {
        // The operator gets the same message as in the web dialog, the details go to the log.
        ImportError::Pipeline { source } => {
            print_notice(&Notice::from(source));
            std::error::Error::source(source)
        }
        _ => {
            eprintln!("An error occured: {}", e);
            std::error::Error::source(e)
        }
    };
    while let Some(c) = cause {
        warn!("caused by: {}", c);
        cause = c.source();
    }
    if let Some(bt) = ErrorCompat::backtrace(e) {
        debug!("trace: {}", bt);
    }
}

fn main() {
    let args = Args::parse();
    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    debug!("args: {:?}", args);

    if let Err(e) = importer::run_import(&args) {
        report(&e);
        std::process::exit(1);
    }
}
