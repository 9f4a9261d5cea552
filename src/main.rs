use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::info;

use scriptc::{CompileOptions, Target, compile, logging};

#[derive(Parser, Debug)]
#[command(
    name = "scriptc",
    about = "Compiles a script to pseudo-assembly, MIPS or Python",
    version
)]
struct Cli {
    /// Source file to compile
    path: PathBuf,
    /// Output target
    #[arg(short, long, value_enum, default_value_t = Target::Asm)]
    target: Target,
    /// Number of general-purpose registers (defaults to the target's)
    #[arg(short, long)]
    registers: Option<usize>,
    /// Overwrite an existing output file without asking
    #[arg(short, long, default_value_t = false)]
    force: bool,
    /// Run the compiled program afterwards, feeding it stdin
    #[arg(long, default_value_t = false)]
    run: bool,
    /// Log level for the compiler passes, or full filter directives; falls back to RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn confirm_overwrite(path: &Path) -> Result<bool> {
    eprint!("{} already exists. Overwrite? [y/N] ", path.display());
    io::stderr().flush().context("Flushing prompt")?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("Reading confirmation")?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;

    let source = fs::read_to_string(&cli.path)
        .with_context(|| format!("Reading {}", cli.path.display()))?;
    let options = CompileOptions {
        target: cli.target,
        registers: cli.registers,
    };
    let code = compile(&source, &options)?;

    let backend = cli.target.backend();
    let output = cli.path.with_extension(backend.extension());
    if output == cli.path {
        bail!("Output would overwrite the source file {}", output.display());
    }
    if output.exists() && !cli.force && !confirm_overwrite(&output)? {
        bail!("Not overwriting {}", output.display());
    }
    fs::write(&output, &code).with_context(|| format!("Writing {}", output.display()))?;
    info!(path = %output.display(), target = backend.name(), "wrote program");

    if cli.run {
        let mut input = String::new();
        io::stdin()
            .read_to_string(&mut input)
            .context("Reading stdin")?;
        let printed = backend.run(&code, &input)?;
        if !printed.is_empty() {
            println!("{printed}");
        }
    }
    Ok(())
}
