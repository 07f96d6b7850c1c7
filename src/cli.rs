use clap::{Parser, Subcommand};

const DEFAULT_DATA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/data");

#[derive(Parser, Debug)]
#[command(name = "dermbill-backend")]
#[command(about = "Dermatology billing recommendation backend", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the HTTP API.
    Serve(ServeArgs),
    /// Analyze a clinical note from a file (or stdin) and print the result.
    Analyze(AnalyzeArgs),
    /// Look up a CPT/HCPCS code in the reference tables.
    Lookup(LookupArgs),
}

#[derive(clap::Args, Debug, Clone)]
pub struct ServeArgs {
    /// Reference data directory (codes.csv, modifiers.csv, categories.csv,
    /// scenarios/).
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,

    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, default_value_t = 8787)]
    pub port: u16,
}

#[derive(clap::Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Path to a clinical note text file; reads stdin when omitted.
    pub note_file: Option<String>,

    /// Print the full analysis as JSON instead of a summary.
    #[arg(long)]
    pub json: bool,

    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,
}

#[derive(clap::Args, Debug, Clone)]
pub struct LookupArgs {
    /// The CPT/HCPCS code to look up (e.g. 17000).
    pub code: String,

    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,
}
