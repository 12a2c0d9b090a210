use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use anylang_core::config::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
use anylang_core::sources::SOURCE_EXTENSION;
use anylang_core::{
    ApiKey, Artifacts, Emit, Pipeline, PipelineOptions, Platform, Stage, SystemRunner, Toolchain,
    TranslatorConfig, VertexTranslator, load_dotenv,
};
use clap::{ArgAction, Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

/// Translate Anylang sources to LLVM IR with a language model, then build and run them.
#[derive(Parser, Debug)]
#[command(name = "anylang", version, about, long_about = None)]
struct Cli {
    #[arg(long, value_name = "DIR", default_value = ".", help = "Directory searched for .any files")]
    root: PathBuf,

    #[arg(long, value_name = "STEM", default_value = "out", help = "File stem of the build artifacts")]
    out: String,

    #[arg(long, value_name = "DIR", help = "Directory for the build artifacts (defaults to the working directory)")]
    out_dir: Option<PathBuf>,

    #[arg(long, env = "ANYLANG_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    #[arg(long, default_value_t = DEFAULT_TEMPERATURE)]
    temperature: f32,

    #[arg(long, env = "ANYLANG_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    #[arg(long, value_name = "SECS", help = "Request timeout (no timeout by default)")]
    timeout: Option<u64>,

    #[arg(long, value_name = "PATH", default_value = "llc")]
    llc: PathBuf,

    #[arg(long, value_name = "PATH", default_value = "clang", help = "C compiler used to assemble and link")]
    cc: PathBuf,

    #[arg(long, value_enum, default_value_t = EmitArg::Exe, help = "Last artifact to produce")]
    emit: EmitArg,

    #[arg(long, help = "Build the executable without running it")]
    no_run: bool,

    #[arg(short, long, action = ArgAction::Count, help = "Increase log verbosity (-v, -vv)")]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmitArg {
    Ir,
    Asm,
    Exe,
}

impl From<EmitArg> for Emit {
    fn from(value: EmitArg) -> Self {
        match value {
            EmitArg::Ir => Emit::Ir,
            EmitArg::Asm => Emit::Asm,
            EmitArg::Exe => Emit::Exe,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    execute(cli)
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn execute(cli: Cli) -> Result<()> {
    load_dotenv()?;
    let key = ApiKey::from_env()?;

    let config = TranslatorConfig {
        endpoint: cli.endpoint,
        model: cli.model,
        temperature: cli.temperature,
        timeout: cli.timeout.map(Duration::from_secs),
        ..TranslatorConfig::default()
    };
    let translator =
        VertexTranslator::new(config, key).context("failed to create the HTTP client")?;

    let platform = Platform::current();
    let out_dir = cli.out_dir.unwrap_or_default();
    let options = PipelineOptions {
        root: cli.root,
        extension: SOURCE_EXTENSION.into(),
        platform,
        artifacts: Artifacts::new(&out_dir, &cli.out, platform),
        toolchain: Toolchain {
            llc: cli.llc,
            cc: cli.cc,
            ..Toolchain::default()
        },
        emit: cli.emit.into(),
        run: !cli.no_run,
    };

    let mut status = StatusLine::default();
    let result = Pipeline::new(options, translator, SystemRunner).run(|stage| status.update(stage));
    status.clear();
    let report = result?;

    match report.exit {
        Some(outcome) => match outcome.code {
            Some(code) => println!("anylang exited with code {code}"),
            None => println!("anylang was terminated by a signal"),
        },
        None => {
            let last = match cli.emit {
                EmitArg::Ir => &report.artifacts.ir,
                EmitArg::Asm => &report.artifacts.asm,
                EmitArg::Exe => &report.artifacts.exe,
            };
            eprintln!("wrote {}", last.display());
        }
    }
    Ok(())
}

/// Single overwritten progress line on stderr.
#[derive(Default)]
struct StatusLine {
    width: usize,
}

impl StatusLine {
    fn update(&mut self, stage: Stage) {
        match stage {
            Stage::Thinking => self.show("Thinking..."),
            Stage::Writing => self.show("Writing..."),
            // Child processes share the terminal from here on.
            Stage::Written { .. } | Stage::Assembling | Stage::Linking | Stage::Running => {
                self.clear()
            }
            Stage::Discovered { .. } => {}
        }
    }

    fn show(&mut self, message: &str) {
        let pad = self.width.saturating_sub(message.len());
        eprint!("\r{message}{}", " ".repeat(pad));
        let _ = io::stderr().flush();
        self.width = message.len();
    }

    fn clear(&mut self) {
        if self.width == 0 {
            return;
        }
        eprint!("\r{}\r", " ".repeat(self.width));
        let _ = io::stderr().flush();
        self.width = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_pads_over_previous_message() {
        let mut status = StatusLine::default();
        status.update(Stage::Thinking);
        assert_eq!(status.width, "Thinking...".len());
        status.update(Stage::Writing);
        assert_eq!(status.width, "Writing...".len());
        status.update(Stage::Written { bytes: 3 });
        assert_eq!(status.width, 0);
    }
}
