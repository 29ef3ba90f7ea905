use clap::Parser;

/// Converts the recall election spreadsheets into one JSON file per village (cunli), named by VILLCODE.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. Relative paths inside the file are interpreted
    /// relative to the directory of the configuration file. For more information about the file format,
    /// read the documentation of the `manual` module.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (glob pattern, default raw/*.xlsx) The spreadsheets to process. Setting this option overrides the
    /// pattern that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (file path) The reference geographic dataset (GeoJSON with VILLCODE properties).
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, default missing_villcode_mapping.json) The table of manually filled VILLCODEs.
    /// Villages that cannot be resolved are appended to it with an empty code.
    #[clap(long, value_parser)]
    pub overrides: Option<String>,

    /// (directory, default docs/cunli_json) Where the JSON files are written.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path) A previously generated cunli_summary.json. If provided, the run fails when the new
    /// summary differs from it, and the differences are printed.
    #[clap(long, value_parser)]
    pub compare: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
