use clap::Args;

use crate::err::Error;
use crate::telemetry;

#[derive(Args, Debug)]
pub struct IsReadyCommandArguments {
	#[arg(help = "The url of the server to check")]
	#[arg(env = "TABLEGRAPH_ENDPOINT", short = 'e', long = "endpoint")]
	#[arg(default_value = "http://127.0.0.1:3000")]
	endpoint: String,
}

pub async fn init(
	IsReadyCommandArguments {
		endpoint,
	}: IsReadyCommandArguments,
) -> Result<(), Error> {
	// Initialize logging
	telemetry::builder().with_log_level("error").init();
	// Ask the server whether all of its components are ready
	let url = format!("{}/ready", endpoint.trim_end_matches('/'));
	let response = reqwest::get(&url).await?;
	if !response.status().is_success() {
		return Err(Error::ServerNotReady);
	}
	println!("OK");
	Ok(())
}
