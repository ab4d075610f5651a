//! A process-wide view of subsystem health, backing the liveness, readiness
//! and health endpoints. Subsystems register named async probes at startup;
//! every report is computed fresh by running all probes concurrently.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture};
use serde::Serialize;

/// The result of a single probe invocation. A probe which fails outright
/// should return an error instead; the registry converts it into an
/// unhealthy component carrying the error message.
#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
	pub healthy: bool,
	pub latency_ms: Option<u64>,
	pub error: Option<String>,
}

impl ProbeResult {
	pub fn healthy() -> Self {
		Self {
			healthy: true,
			..Default::default()
		}
	}

	pub fn unhealthy(error: impl Into<String>) -> Self {
		Self {
			healthy: false,
			error: Some(error.into()),
			..Default::default()
		}
	}

	pub fn with_latency(mut self, latency_ms: u64) -> Self {
		self.latency_ms = Some(latency_ms);
		self
	}
}

type Probe = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<ProbeResult>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
	Healthy,
	Degraded,
	Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
	pub name: String,
	pub status: Status,
	#[serde(rename = "latencyMs", skip_serializing_if = "Option::is_none")]
	pub latency_ms: Option<u64>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
	pub status: Status,
	pub timestamp: DateTime<Utc>,
	pub uptime: u64,
	pub components: Vec<ComponentHealth>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Liveness {
	pub alive: bool,
	pub uptime: u64,
}

#[derive(Debug, Clone)]
pub struct Readiness {
	pub ready: bool,
	pub components: Vec<String>,
}

/// The registry of named health probes. Constructed once at startup and
/// shared by reference with every subsystem that registers or queries
/// probes. Registration happens at subsystem startup and shutdown, never in
/// the request hot path, so a plain read-write lock is sufficient.
pub struct HealthRegistry {
	started: Instant,
	checks: RwLock<HashMap<String, Probe>>,
}

impl Default for HealthRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl HealthRegistry {
	pub fn new() -> Self {
		Self {
			started: Instant::now(),
			checks: RwLock::new(HashMap::new()),
		}
	}

	/// Insert or overwrite the named probe. The last registration wins.
	pub fn register<F, Fut>(&self, name: impl Into<String>, probe: F)
	where
		F: Fn() -> Fut + Send + Sync + 'static,
		Fut: Future<Output = anyhow::Result<ProbeResult>> + Send + 'static,
	{
		let name = name.into();
		let boxed: Probe = Arc::new(move || Box::pin(probe()));
		self.checks.write().unwrap().insert(name.clone(), boxed);
		debug!(component = %name, "Health check registered");
	}

	/// Remove the named probe, returning whether it existed.
	pub fn unregister(&self, name: &str) -> bool {
		self.checks.write().unwrap().remove(name).is_some()
	}

	/// Seconds since this registry was created, from a monotonic clock.
	pub fn uptime(&self) -> u64 {
		self.started.elapsed().as_secs()
	}

	/// Run every registered probe concurrently and reduce the results into
	/// a single report. The report is always computed fresh, never cached.
	pub async fn run(&self) -> HealthReport {
		// Snapshot the probes so the lock is not held across await points
		let probes: Vec<(String, Probe)> = self
			.checks
			.read()
			.unwrap()
			.iter()
			.map(|(name, probe)| (name.clone(), Arc::clone(probe)))
			.collect();
		// Fire all probes at once, then wait for every one of them
		let results = join_all(probes.into_iter().map(|(name, probe)| async move {
			(name, probe().await)
		}))
		.await;
		let components: Vec<ComponentHealth> = results
			.into_iter()
			.map(|(name, result)| match result {
				Ok(result) => ComponentHealth {
					name,
					status: if result.healthy {
						Status::Healthy
					} else {
						Status::Unhealthy
					},
					latency_ms: result.latency_ms,
					error: result.error,
				},
				Err(error) => ComponentHealth {
					name,
					status: Status::Unhealthy,
					latency_ms: None,
					error: Some(error.to_string()),
				},
			})
			.collect();
		HealthReport {
			status: overall_status(&components),
			timestamp: Utc::now(),
			uptime: self.uptime(),
			components,
		}
	}

	/// A pure process-liveness signal. Does not consult the probes at all;
	/// as long as this executes, the process is alive.
	pub fn liveness(&self) -> Liveness {
		Liveness {
			alive: true,
			uptime: self.uptime(),
		}
	}

	/// Whether the process should receive traffic. A degraded process still
	/// counts as ready; the names of unhealthy components are reported for
	/// diagnostics regardless of the outcome.
	pub async fn readiness(&self) -> Readiness {
		let report = self.run().await;
		Readiness {
			ready: report.status != Status::Unhealthy,
			components: report
				.components
				.into_iter()
				.filter(|c| c.status == Status::Unhealthy)
				.map(|c| c.name)
				.collect(),
		}
	}
}

/// Healthy only when no component is unhealthy (vacuously with zero
/// components), unhealthy only when no component is healthy and at least
/// one ran, degraded otherwise.
fn overall_status(components: &[ComponentHealth]) -> Status {
	let any_unhealthy = components.iter().any(|c| c.status == Status::Unhealthy);
	let any_healthy = components.iter().any(|c| c.status == Status::Healthy);
	match (any_unhealthy, any_healthy) {
		(false, _) => Status::Healthy,
		(true, true) => Status::Degraded,
		(true, false) => Status::Unhealthy,
	}
}
