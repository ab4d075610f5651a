mod isready;
mod start;
mod version;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "tablegraph command-line interface and server", bin_name = "tablegraph")]
#[command(disable_version_flag = true, arg_required_else_help = true)]
struct Cli {
	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	#[command(about = "Start the GraphQL API server")]
	Start(start::StartCommandArguments),
	#[command(about = "Check if the server is ready to serve requests")]
	Isready(isready::IsReadyCommandArguments),
	#[command(about = "Output the command-line tool version information")]
	Version,
}

pub async fn init() -> ExitCode {
	let cli = Cli::parse();

	let output = match cli.command {
		Commands::Start(args) => start::init(args).await,
		Commands::Isready(args) => isready::init(args).await,
		Commands::Version => version::init(),
	};

	if let Err(e) = output {
		error!("{}", e);
		return ExitCode::FAILURE;
	}

	ExitCode::SUCCESS
}
