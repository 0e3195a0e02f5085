use std::{
    io::{BufRead, IsTerminal},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::Parser;
use j_installer::{config, installer::describe, logging, RunOptions};
use tracing::error;

#[derive(Debug, Parser)]
#[command(name = "j-install", version, about = "Install the J language toolchain for the current user")]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory to search for the built toolchain (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    source_dir: Option<PathBuf>,

    /// Skip running the installed executable afterwards
    #[arg(long)]
    no_verify: bool,

    /// Exit without waiting for Enter
    #[arg(long)]
    no_pause: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let code = match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    if !cli.no_pause && std::io::stdin().is_terminal() {
        println!("\nPress Enter to exit...");
        let _ = std::io::stdin().lock().read_line(&mut String::new());
    }
    ExitCode::from(code)
}

fn run(cli: &Cli) -> Result<u8> {
    let log_file = logging::init(&logging::create_log_path(), cli.verbose)?;

    let source_dir = match &cli.source_dir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let opts = RunOptions {
        source_dir,
        verify: !cli.no_verify,
    };

    println!("Installing {}...", config::DISPLAY_NAME);
    match j_installer::run(&opts) {
        Ok(report) => {
            println!("Installed {} to {}", config::DISPLAY_NAME, report.layout.root.display());
            println!("  executable: {}", report.deployment.executable.display());
            if let Some(examples) = &report.deployment.examples {
                println!("  examples:   {}", examples.display());
            }
            println!(
                "  {} files open with {}",
                report.association.extension, report.deployment.executable.display()
            );
            if report.is_degraded() {
                println!("Completed with warnings:");
                for d in &report.degraded {
                    println!("  - {}", describe(d));
                }
            }
            println!("Open a new terminal and run `j --version` to get started.");
            Ok(0)
        }
        Err(err) => {
            error!(phase = %err.phase(), "{err}");
            eprintln!("Installation failed while {}: {err}", err.phase());
            if let Some(log_file) = &log_file {
                eprintln!("Log: {}", log_file.display());
            }
            Ok(u8::try_from(err.exit_code()).unwrap_or(1))
        }
    }
}
