use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Default, Debug, Clone)]
pub struct Builder {
	log_level: Option<String>,
}

pub fn builder() -> Builder {
	Builder::default()
}

impl Builder {
	/// Set the log level on the builder
	pub fn with_log_level(mut self, log_level: &str) -> Self {
		self.log_level = Some(log_level.to_string());
		self
	}

	/// Build a tracing dispatcher with the fmt subscriber (logs)
	pub fn build(self) -> Box<dyn Subscriber + Send + Sync + 'static> {
		let registry = tracing_subscriber::registry();
		let registry = registry.with(self.log_level.map(|level| {
			tracing_subscriber::fmt::layer()
				.compact()
				.with_ansi(true)
				.with_span_events(FmtSpan::NONE)
				.with_writer(std::io::stderr)
				.with_filter(filter_from_value(&level))
				.boxed()
		}));
		Box::new(registry)
	}

	/// Install the built subscriber as the global default
	pub fn init(self) {
		self.build().init()
	}
}

fn filter_from_value(v: &str) -> EnvFilter {
	match v {
		// Don't show any logs at all
		"none" => EnvFilter::default(),
		// Otherwise, only show errors
		"error" => EnvFilter::default().add_directive(Level::ERROR.into()),
		// Otherwise, show warnings and errors
		"warn" => EnvFilter::default().add_directive(Level::WARN.into()),
		// For any other level, show server and middleware logs at that level.
		// The values are restricted by the CLI, so the directives always parse.
		level => EnvFilter::default()
			.add_directive(Level::ERROR.into())
			.add_directive(
				format!("tablegraph={level}").parse().expect("a valid tracing directive"),
			)
			.add_directive(
				format!("tower_http={level}").parse().expect("a valid tracing directive"),
			),
	}
}

#[cfg(test)]
mod tests {
	use tracing::Level;
	use tracing_subscriber::util::SubscriberInitExt;

	use crate::telemetry;

	#[test]
	fn log_level_filtering() {
		let _guard = telemetry::builder().with_log_level("debug").build().set_default();
		assert!(tracing::enabled!(target: "tablegraph::net", Level::DEBUG));
		assert!(!tracing::enabled!(target: "tablegraph::net", Level::TRACE));
		assert!(!tracing::enabled!(target: "hyper", Level::INFO));
	}
}
