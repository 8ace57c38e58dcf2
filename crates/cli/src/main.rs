//! The lone interpreter binary
//!
//! Reads lisp source from a script file, a `-e` expression or standard
//! input and evaluates it in the null module until end of input. Exits
//! zero on clean end of input and non-zero on the first fatal error.

use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lone_runtime::interpreter::Options;
use lone_runtime::intrinsics::linux::random_seed;
use lone_runtime::modules;
use lone_runtime::{Error, Interpreter};

#[derive(Parser)]
#[command(name = "lone")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "The lone lisp interpreter", long_about = None)]
struct Cli {
    /// Script to run instead of standard input
    script: Option<PathBuf>,

    /// Evaluate this expression instead of reading a script
    #[arg(short, long, value_name = "EXPRESSION", conflicts_with = "script")]
    evaluate: Option<String>,

    /// Additional module search path entries, highest priority first
    #[arg(long = "module-path", value_name = "DIR")]
    module_path: Vec<PathBuf>,

    /// Arena size in bytes
    #[arg(long, default_value_t = lone_runtime::interpreter::MEMORY_SIZE)]
    memory: usize,
}

fn module_search_path(cli: &Cli) -> Vec<PathBuf> {
    let mut path = cli.module_path.clone();
    path.push(PathBuf::from("."));
    if let Some(user) = home::home_dir() {
        path.push(user.join(".lone/modules"));
        path.push(user.join(".local/lib/lone/modules"));
    }
    path.push(PathBuf::from("/usr/lib/lone/modules"));
    path
}

fn run(cli: Cli) -> Result<(), Error> {
    let options = Options {
        memory_size: cli.memory,
        hash_seed: random_seed(),
        module_path: module_search_path(&cli),
    };
    let mut interpreter = Interpreter::with_options(options)?;
    modules::install_embedded_from_executable(&mut interpreter)?;

    let source: Box<dyn Read> = match (&cli.evaluate, &cli.script) {
        (Some(expression), _) => Box::new(std::io::Cursor::new(expression.clone())),
        (None, Some(script)) => Box::new(File::open(script)?),
        (None, None) => Box::new(std::io::stdin()),
    };

    interpreter.load_null_from_source(source)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("lone: {}", error);
        process::exit(1);
    }
}
