//! `rvcc` CLI: read a source file (or stdin), emit RV64I assembly to a file
//! (or stdout).

use std::io::Write as _;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rvcc::CompileError;

/// Ahead-of-time compiler for a small C-like dialect, targeting RISC-V (RV64I) assembly.
#[derive(ClapParser, Debug)]
#[command(name = "rvcc", disable_help_flag = true)]
struct Cli {
    /// Input source file, or "-" for stdin.
    file: String,

    /// Output path, or "-"/omitted for stdout.
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    #[arg(short = 'h', long = "help", action = clap::ArgAction::SetTrue)]
    help: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // clap already rendered its own error/usage text.
            eprint!("{e}");
            return ExitCode::from(2);
        }
    };

    if cli.help {
        use clap::CommandFactory;
        eprintln!("{}", Cli::command().render_help());
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: &Cli) -> Result<(), CompileError> {
    tracing::debug!(file = %cli.file, "compiling");
    let asm = rvcc::compile_file(&cli.file)?;

    match cli.output.as_deref() {
        None | Some("-") => {
            print!("{asm}");
        }
        Some(path) => {
            std::fs::write(path, asm).map_err(|e| {
                CompileError::Io(format!("cannot write output '{path}': {e}"))
            })?;
        }
    }
    std::io::stdout().flush().ok();
    Ok(())
}
