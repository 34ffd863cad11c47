use std::fs::File;
use std::io::{self, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use clap::Subcommand;
use env_logger::Builder;
use log::{debug, info};
use memmap2::Mmap;

use lunac as luna;

use luna::backend::EventLog;
use luna::error::CompileError;
use luna::parser::Parser;
use luna::scanner::Scanner;

#[derive(ClapParser, Debug)]
#[command(version, about = "Semantic analyzer for a small typed Lua dialect", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    commands: Commands,

    /// Enable logging to app.log
    #[arg(long, global = true)]
    log: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Tokenizes input, printing each token
    Tokenize { filename: Option<PathBuf> },

    /// Analyzes a program and reports the first error, if any
    Check { filename: Option<PathBuf> },

    /// Analyzes a program and prints the semantic events it produces
    Events {
        filename: Option<PathBuf>,

        /// Print events as JSON instead of one per line
        #[arg(long)]
        json: bool,
    },
}

/// Source bytes, either memory-mapped from a file or read from stdin.
enum Input {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl Input {
    fn as_bytes(&self) -> &[u8] {
        match self {
            Input::Mapped(map) => &map[..],
            Input::Buffered(buf) => &buf[..],
        }
    }
}

fn read_input(filename: Option<PathBuf>) -> luna::error::Result<Input> {
    match filename {
        Some(filename) => {
            info!("Mapping file: {:?}", filename);
            let file = File::open(&filename)?;

            // SAFETY: the map is read-only and lives only for this run.
            let map = unsafe { Mmap::map(&file) }?;

            info!("Mapped {} bytes from {:?}", map.len(), filename);

            Ok(Input::Mapped(map))
        }

        None => {
            info!("Reading program from stdin");
            let mut buf = Vec::new();

            let bytes = io::stdin().lock().read_to_end(&mut buf)?;

            info!("Read {} bytes from stdin", bytes);

            Ok(Input::Buffered(buf))
        }
    }
}

fn init_logger() -> Result<()> {
    let log_file = File::create("app.log").context("Failed to create app.log")?;

    Builder::new()
        .format(|buf, record| {
            // Strip 'lunac::' from module path
            let module = record
                .module_path()
                .unwrap_or("<unnamed>")
                .strip_prefix("lunac::")
                .unwrap_or(record.module_path().unwrap_or("<unnamed>"));
            writeln!(
                buf,
                "{} [{}:{}] - {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                module,
                record.line().unwrap_or(0),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter(None, log::LevelFilter::Debug) // Default to Debug, override with RUST_LOG
        .init();

    info!("Logger initialized, writing to app.log");
    Ok(())
}

fn fail(e: CompileError) -> ! {
    debug!("Failing with exit code {}: {}", e.exit_code(), e);
    eprintln!("{}", e);
    std::process::exit(e.exit_code());
}

fn analyze(src: &[u8]) -> EventLog {
    let mut parser = Parser::from_source(src, EventLog::new());

    match parser.parse() {
        Ok(()) => {
            info!("Program accepted");
            parser.into_backend()
        }
        Err(e) => fail(e),
    }
}

fn main() -> Result<()> {
    let args: Cli = Cli::parse();

    // Initialize logger only if --log flag is provided
    if args.log {
        init_logger()?;
    } else {
        env_logger::Builder::new()
            .filter_level(log::LevelFilter::Off)
            .init();
    }

    info!("CLI arguments: {:?}", args);

    match args.commands {
        Commands::Tokenize { filename } => {
            info!("Running Tokenize subcommand");
            let input = read_input(filename).unwrap_or_else(|e| fail(e));

            for token in Scanner::new(input.as_bytes()) {
                match token {
                    Ok(token) => {
                        debug!("Scanned token: {}", token);
                        println!("{}", token);
                    }
                    Err(e) => fail(e),
                }
            }

            info!("Tokenization completed successfully");
        }

        Commands::Check { filename } => {
            info!("Running Check subcommand");
            let input = read_input(filename).unwrap_or_else(|e| fail(e));

            let log = analyze(input.as_bytes());
            info!("Check produced {} events", log.events().len());
        }

        Commands::Events { filename, json } => {
            info!("Running Events subcommand");
            let input = read_input(filename).unwrap_or_else(|e| fail(e));

            let log = analyze(input.as_bytes());

            if json {
                println!("{}", log.to_json().context("Failed to serialize events")?);
            } else {
                print!("{}", log);
            }

            info!("Events subcommand completed");
        }
    }

    Ok(())
}
