// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! CLI tool for building and inspecting constant databases

use clap::{ArgAction, Parser, Subcommand};
use constdb::{Backpressure, Config};
use humansize::{SizeFormatter, BINARY};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
    registry::Registry,
};

macro_rules! die {
    ($fmt:literal, $($arg:tt)*) => {{
        eprintln!($fmt, $($arg)*);
        std::process::exit(1);
    }};

    ($msg:literal) => {{
        eprintln!($msg);
        std::process::exit(1);
    }};
}

#[allow(unused_imports)]
use tracing::{debug, error, info, trace, warn};

pub fn init_tracing(quiet: bool, verbose: u8) -> LevelFilter {
    let level_filter = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::WARN,
            1 => LevelFilter::INFO,
            2 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };

    // Bridge log crate macros to tracing (for library code that uses log::*)
    tracing_log::LogTracer::init().expect("Failed to set log tracer");

    let env_filter = EnvFilter::builder()
        .with_default_directive(level_filter.into())
        .with_env_var("CONSTDB_LOG")
        .from_env_lossy();

    let subscriber = Registry::default().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .compact(),
    );

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        die!("INTERNAL ERROR: setting default tracing::subscriber failed");
    }

    level_filter
}

/// CLI tool for building and inspecting constant databases
#[derive(Parser, Debug)]
#[command(name = "constdb")]
#[command(about = "CLI tool for building and inspecting constant databases")]
struct ToolArgs {
    /// Suppress all output except for errors. This overrides the -v flag.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Turn on verbose output. Supply -v multiple times to increase verbosity.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Use the extended (64-bit) profile
    #[arg(short, long, global = true, default_value_t = false)]
    extended: bool,

    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(Subcommand, Debug, Clone)]
enum ToolCommand {
    /// Build a database from `key<TAB>value` lines
    Build {
        /// Database file to create (truncated if it exists)
        file: PathBuf,

        /// Read lines from this file instead of stdin
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Print the value of a key
    Get {
        /// Database file
        file: PathBuf,

        /// The key to look up
        key: String,

        /// Print every value of the key, in write order
        #[arg(short, long, default_value_t = false)]
        all: bool,
    },

    /// Print all records in write order
    Dump {
        /// Database file
        file: PathBuf,
    },

    /// Print database statistics
    Stats {
        /// Database file
        file: PathBuf,
    },
}

fn build(config: &Config, file: &Path, input: Option<&Path>) -> constdb::Result<u64> {
    let lines: Box<dyn BufRead> = match input {
        Some(path) => Box::new(BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(io::stdin().lock()),
    };

    let mut writer = config.create(file)?;

    for (idx, line) in lines.lines().enumerate() {
        let line = line?;

        let Some((key, value)) = line.split_once('\t') else {
            warn!("Skipping line {} without a tab separator", idx + 1);
            continue;
        };

        if writer.put(key, value)? == Backpressure::Drain {
            writer.drain()?;
        }
    }

    writer.close()?;

    Ok(writer.len())
}

fn print_value(out: &mut impl Write, value: &[u8]) -> io::Result<()> {
    out.write_all(value)?;
    out.write_all(b"\n")
}

fn run(config: &Config, command: ToolCommand) -> constdb::Result<()> {
    let mut out = io::stdout().lock();

    match command {
        ToolCommand::Build { file, input } => {
            let count = build(config, &file, input.as_deref())?;
            info!("Wrote {count} records to {}", file.display());
        }
        ToolCommand::Get { file, key, all } => {
            let mut reader = config.open(&file)?;

            if all {
                let mut found = false;

                for value in reader.get_all(&key) {
                    print_value(&mut out, &value?)?;
                    found = true;
                }

                if !found {
                    die!("Key not found: {key}");
                }
            } else {
                match reader.get(&key)? {
                    Some(value) => print_value(&mut out, &value)?,
                    None => die!("Key not found: {key}"),
                }
            }

            reader.close()?;
        }
        ToolCommand::Dump { file } => {
            let mut reader = config.open(&file)?;

            for item in reader.iter() {
                let (key, value) = item?;
                out.write_all(&key)?;
                out.write_all(b"\t")?;
                print_value(&mut out, &value)?;
            }

            reader.close()?;
        }
        ToolCommand::Stats { file } => {
            let file_size = std::fs::metadata(&file)?.len();
            let reader = config.open(&file)?;

            let header = reader.header();
            let used_buckets = header.iter().filter(|entry| !entry.is_empty()).count();
            let longest_table = header
                .iter()
                .map(|entry| entry.slot_count)
                .max()
                .unwrap_or_default();

            writeln!(out, "profile:        {:?}", reader.profile())?;
            writeln!(out, "records:        {}", reader.len())?;
            writeln!(out, "used buckets:   {used_buckets}/{}", header.len())?;
            writeln!(out, "longest table:  {longest_table} slots")?;
            writeln!(
                out,
                "data region:    {}",
                SizeFormatter::new(header.data_region_end(), BINARY),
            )?;
            writeln!(out, "file size:      {}", SizeFormatter::new(file_size, BINARY))?;

            reader.close()?;
        }
    }

    out.flush()?;

    Ok(())
}

fn main() {
    let args = ToolArgs::parse();

    init_tracing(args.quiet, args.verbose);

    let config = if args.extended {
        Config::extended()
    } else {
        Config::new()
    };

    debug!("Using {config:?}");

    if let Err(e) = run(&config, args.command) {
        error!("{e}");
        die!("Error: {e}");
    }
}
