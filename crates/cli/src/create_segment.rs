//! create-lone-segment: reserve a PT_LONE placeholder in a fresh ELF
//!
//! Converts a single spare `PT_NULL` program header, or the optional
//! `PT_PHDR` entry, of a freshly linked image into an empty `PT_LONE`
//! placeholder that lone-embed can patch later.

use std::path::PathBuf;
use std::process;

use clap::Parser;

use lone_runtime::elf;

#[derive(Parser)]
#[command(name = "create-lone-segment")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Convert a spare program header into a PT_LONE placeholder", long_about = None)]
struct Cli {
    /// Image to patch in place
    elf: PathBuf,

    /// Convert the PT_PHDR entry instead of a PT_NULL
    #[arg(long)]
    phdr: bool,
}

fn run(cli: Cli) -> Result<(), lone_runtime::Error> {
    let mut image = std::fs::read(&cli.elf)?;
    elf::create_placeholder(&mut image, cli.phdr)?;
    std::fs::write(&cli.elf, image)?;
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("create-lone-segment: {}", error);
        process::exit(1);
    }
}
