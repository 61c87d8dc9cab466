mod commands;
mod helpers;

use clap::Parser;
use snid_core::SnidError;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().collect();
    match parse_and_dispatch(args) {
        Ok(code) => code,
        Err(error) => {
            let error = error.as_snid_error();
            eprintln!("{}", error.diagnostic_line());
            eprintln!("{}", error.fatal_exit_line());
            error.exit_code()
        }
    }
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(err) => {
            return match err.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    print!("{err}");
                    Ok(0)
                }
                _ => Err(CliError::Usage(err.to_string())),
            };
        }
    };

    helpers::init_tracing(cli.verbose);
    match cli.command {
        CliCommand::Identify(args) => commands::run_identify_command(args),
        CliCommand::Library(args) => commands::run_library_command(args),
        CliCommand::Template(args) => commands::run_template_command(args),
    }
}

#[derive(Parser)]
#[command(name = "snid-rs", version, about = "Supernova spectrum identification")]
struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Classify a spectrum against a template library
    Identify(commands::IdentifyArgs),
    /// Summarize a template library
    Library(commands::LibraryArgs),
    /// Preprocess a spectrum and append it to a library as a template
    Template(commands::TemplateArgs),
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(SnidError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    pub(super) fn compute(error: impl Into<SnidError>) -> Self {
        Self::Compute(error.into())
    }

    fn as_snid_error(&self) -> SnidError {
        match self {
            Self::Usage(message) => SnidError::input_validation("INPUT.CLI_USAGE", message.clone()),
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => SnidError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}
