use std::time::Duration;

use axum_server::Handle;
use tokio::task::JoinHandle;

use crate::cnf;
use crate::err::Error;

/// Start a graceful shutdown:
/// * Signal the Axum Handle when a shutdown signal is received.
/// * Drop remaining connections after the configured shutdown timeout.
///
/// A second signal will force an immediate shutdown.
pub fn graceful_shutdown(http_handle: Handle) -> JoinHandle<()> {
	tokio::spawn(async move {
		let result = listen().await.expect("Failed to listen to shutdown signal");
		info!(target: super::LOG, "{} received. Waiting for graceful shutdown... A second signal will force an immediate shutdown", result);

		tokio::select! {
			// Start a normal graceful shutdown, bounded by the shutdown timeout
			_ = async {
				// First stop accepting new HTTP requests
				http_handle.graceful_shutdown(Some(Duration::from_millis(*cnf::SHUTDOWN_TIMEOUT)));

				// Wait for all existing connections to finish their requests
				while http_handle.connection_count() > 0 {
					tokio::time::sleep(Duration::from_millis(100)).await;
				}
			} => (),
			// Force an immediate shutdown if a second signal is received
			_ = async {
				if let Ok(signal) = listen().await {
					warn!(target: super::LOG, "{} received during graceful shutdown. Terminate immediately...", signal);
				} else {
					error!(target: super::LOG, "Failed to listen to shutdown signal. Terminate immediately...");
				}

				// Force an immediate shutdown
				http_handle.shutdown();
			} => (),
		}
	})
}

/// Wait for the next termination request from the operating system,
/// returning the name of the signal which was received.
#[cfg(unix)]
pub async fn listen() -> Result<String, Error> {
	use tokio::signal::unix::{signal, SignalKind};
	// SIGHUP requests termination too, as there is no configuration to reload
	let mut hangup = signal(SignalKind::hangup())?;
	let mut interrupt = signal(SignalKind::interrupt())?;
	let mut quit = signal(SignalKind::quit())?;
	let mut terminate = signal(SignalKind::terminate())?;
	let name = tokio::select! {
		_ = hangup.recv() => "SIGHUP",
		_ = interrupt.recv() => "SIGINT",
		_ = quit.recv() => "SIGQUIT",
		_ = terminate.recv() => "SIGTERM",
	};
	Ok(name.to_owned())
}

/// Wait for the next termination request from the operating system,
/// returning the name of the console event which was received.
#[cfg(windows)]
pub async fn listen() -> Result<String, Error> {
	use tokio::signal::windows;
	let mut ctrl_c = windows::ctrl_c()?;
	let mut ctrl_break = windows::ctrl_break()?;
	let mut ctrl_close = windows::ctrl_close()?;
	let mut ctrl_shutdown = windows::ctrl_shutdown()?;
	let name = tokio::select! {
		_ = ctrl_c.recv() => "CTRL-C",
		_ = ctrl_break.recv() => "CTRL-BREAK",
		_ = ctrl_close.recv() => "CTRL-CLOSE",
		_ = ctrl_shutdown.recv() => "CTRL-SHUTDOWN",
	};
	Ok(name.to_owned())
}
