use clap::Parser;
use log::{error, info, LevelFilter};
use std::error::Error;
use std::path::{Path, PathBuf};

mod args;
mod cunli;

use crate::args::Args;
use crate::cunli::config_reader::{read_config, CunliConfig, RunSettings};
use crate::cunli::CunliResult;

// Command line values take precedence over the configuration file.
fn settings_from_args(args: &Args) -> CunliResult<RunSettings> {
    let (config, root) = match &args.config {
        Some(p) => {
            let config = read_config(p)?;
            let root = Path::new(p)
                .parent()
                .map(|x| x.to_path_buf())
                .unwrap_or_default();
            (config, root)
        }
        None => (CunliConfig::default(), PathBuf::new()),
    };
    let mut settings = config.settings(&root)?;
    if let Some(x) = &args.input {
        settings.input_pattern = x.clone();
    }
    if let Some(x) = &args.reference {
        settings.reference_path = PathBuf::from(x);
    }
    if let Some(x) = &args.overrides {
        settings.overrides_path = PathBuf::from(x);
    }
    if let Some(x) = &args.out {
        settings.output_directory = PathBuf::from(x);
    }
    Ok(settings)
}

fn run(args: &Args) -> CunliResult<()> {
    let settings = settings_from_args(args)?;
    cunli::run_conversion(&settings)?;
    if let Some(reference) = &args.compare {
        cunli::compare_summary(&settings.output_directory, reference)?;
    }
    info!(
        "Finished, outputs in {}",
        settings.output_directory.display()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    if let Err(e) = run(&args) {
        error!("{}", e);
        let mut source = e.source();
        while let Some(s) = source {
            error!("  caused by: {}", s);
            source = s.source();
        }
        std::process::exit(1);
    }
}
