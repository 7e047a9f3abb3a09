//! lineseek - Random-Access Line Reading for Huge Files
//!
//! Small CLI front end: index a file and print a requested line window.

use anyhow::Result;
use clap::{Arg, Command};
use lineseek::{LineReader, ReaderFactory, ReaderOptions};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging for development
    env_logger::init();

    // Parse command-line arguments
    let matches = Command::new("lineseek")
        .version(lineseek::VERSION)
        .about("Random-access line reading over very large files")
        .long_about(
            "lineseek indexes a file's line boundaries in one chunked pass, then \
             serves arbitrary line windows without decoding anything else.",
        )
        .arg(
            Arg::new("file")
                .help("Path to the file to read")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("start")
                .long("start")
                .short('s')
                .help("First line to print (zero-based)")
                .default_value("0"),
        )
        .arg(
            Arg::new("count")
                .long("count")
                .short('n')
                .help("Number of lines to print")
                .default_value("10"),
        )
        .get_matches();

    let file_path = PathBuf::from(
        matches
            .get_one::<String>("file")
            .expect("file argument is required"),
    );
    let start: u64 = matches
        .get_one::<String>("start")
        .expect("start has a default")
        .parse()
        .map_err(|_| anyhow::anyhow!("--start must be a non-negative integer"))?;
    let count: u64 = matches
        .get_one::<String>("count")
        .expect("count has a default")
        .parse()
        .map_err(|_| anyhow::anyhow!("--count must be a positive integer"))?;

    if !file_path.exists() {
        anyhow::bail!("File does not exist: {}", file_path.display());
    }

    if !file_path.is_file() {
        anyhow::bail!("Path is not a regular file: {}", file_path.display());
    }

    let factory = ReaderFactory::new().with_options(ReaderOptions::default());
    let reader = factory.line_range_reader_from_path(&file_path)?;
    reader.loaded().await;

    log::info!(
        "indexed {} lines over {} bytes",
        reader.total_lines()?,
        reader.source_size()
    );

    let result = reader.read_lines(start, count).await?;
    for line in &result.lines {
        print!("{line}");
    }

    factory.shutdown().await;

    Ok(())
}
