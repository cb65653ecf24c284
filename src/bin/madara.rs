use std::{
    fs::{self, File},
    io::{self, Read, Write},
};

use anyhow::{Context, Result};
use clap::Parser;
use kansai::madara::{
    cli::Cli,
    parser::{self, Parser as _},
    processor::Processor,
};

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let buf = match cli.input {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("reading statements from {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("reading statements from stdin")?;
            buf
        }
    };

    let mut writer: Box<dyn Write> = match cli.output {
        Some(path) => Box::new(
            File::create(&path)
                .with_context(|| format!("creating output file {}", path.display()))?,
        ),
        None => Box::new(io::stdout()),
    };

    let parser = parser::ParserArretado::default();
    let statements = parser.parse_lines(&buf)?;
    log::debug!("parsed {} statements", statements.len());

    let mut processor = Processor::new();
    let output = processor.run(&statements)?;
    log::debug!(
        "processed batch, final version {}",
        processor.tree().current_version()
    );

    writer.write_all(output.as_bytes())?;

    Ok(())
}
