//! Library entrypoints for embedding the tablegraph server inside another
//! Rust application. Exposes the same init() used by the `tablegraph` binary
//! so external apps can start the server within their own `main()`.

#[macro_use]
extern crate tracing;

#[macro_use]
mod mac;

mod cli;

pub mod cnf;
pub mod dbs;
pub mod err;
pub mod gql;
pub mod health;
pub mod net;
pub mod telemetry;

use std::future::Future;
use std::process::ExitCode;

/// Initialize the CLI/server with the same behavior as the `tablegraph`
/// binary. This spins up a Tokio runtime with a larger stack size and then
/// runs the CLI entrypoint (which starts the server when the `start`
/// subcommand is used).
pub fn init() -> ExitCode {
	with_enough_stack(cli::init())
}

/// Rust's default thread stack size of 2MiB doesn't allow sufficient recursion depth.
fn with_enough_stack(fut: impl Future<Output = ExitCode> + Send) -> ExitCode {
	// Start a Tokio runtime with custom configuration
	let mut b = tokio::runtime::Builder::new_multi_thread();
	b.enable_all().thread_stack_size(*cnf::RUNTIME_STACK_SIZE).thread_name("tablegraph-worker");
	// Build the runtime and execute the future. If runtime creation fails
	// (e.g., insufficient system resources), the application cannot start.
	match b.build() {
		Ok(b) => b.block_on(fut),
		Err(e) => {
			error!("Failed to build runtime: {}", e);
			ExitCode::FAILURE
		}
	}
}
