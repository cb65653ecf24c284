use clap::Parser;
use std::path::PathBuf;

/// Batch processor for a partially persistent red-black tree
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Input file with one statement per line; stdin when absent
    #[arg(short, long, value_name = "INPUT_FILE")]
    pub input: Option<PathBuf>,

    /// Output file for SUC/IMP responses; stdout when absent
    #[arg(short, long, value_name = "OUTPUT_FILE")]
    pub output: Option<PathBuf>,
}
