//! lone-embed: bundle a module blob into an interpreter image
//!
//! Appends the blob at the page-aligned end of the file and repurposes
//! two spare `PT_NULL` program headers, left behind by the linker, into
//! the `PT_LOAD`/`PT_LONE` pair the interpreter looks for at startup.
//! The blob is the textual serialization of a table from canonical
//! module names to their source.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use lone_runtime::elf;

#[derive(Parser)]
#[command(name = "lone-embed")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Embed a lisp module blob into a lone interpreter ELF", long_about = None)]
struct Cli {
    /// Interpreter image to patch in place
    interpreter: PathBuf,

    /// File holding the serialized module table
    blob: PathBuf,

    /// Page size the loader will map with
    #[arg(long, default_value_t = 4096)]
    page_size: u64,
}

fn run(cli: Cli) -> Result<(), lone_runtime::Error> {
    let mut image = std::fs::read(&cli.interpreter)?;
    let blob = std::fs::read(&cli.blob)?;

    elf::embed(&mut image, &blob, cli.page_size)?;

    std::fs::write(&cli.interpreter, image)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("lone-embed: {}", error);
        process::exit(1);
    }
}
