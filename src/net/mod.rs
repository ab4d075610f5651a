mod gql;
mod health;
mod signals;
mod version;

pub mod limiter;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Extension, Router};
use axum_server::Handle;
use deadpool_postgres::Pool;
use http::header::{self, HeaderValue};
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::cnf;
use crate::dbs;
use crate::err::Error;
use crate::health::HealthRegistry;
use limiter::Limiter;

const LOG: &str = "tablegraph::net";

/// Shared state available to every request handler.
#[derive(Clone)]
pub struct AppState {
	pub registry: Arc<HealthRegistry>,
	pub pool: Pool,
	pub limiter: Arc<Limiter>,
}

pub async fn init(
	registry: Arc<HealthRegistry>,
	pool: Pool,
	schema: async_graphql::dynamic::Schema,
	bind: &str,
) -> Result<(), Error> {
	let addr: SocketAddr = bind.parse()?;

	let state = AppState {
		registry,
		pool: pool.clone(),
		limiter: Arc::new(Limiter::new()),
	};

	let service = ServiceBuilder::new()
		// Tag every request with an id, and hand it back to the client
		.layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
		.layer(TraceLayer::new_for_http())
		.layer(PropagateRequestIdLayer::x_request_id())
		.layer(CompressionLayer::new())
		.layer(SetResponseHeaderLayer::overriding(
			header::SERVER,
			HeaderValue::from_static(cnf::PKG_NAME),
		));

	let axum_app = Router::new()
		// Version endpoint
		.merge(version::router())
		// Health endpoints
		.merge(health::router())
		// GraphQL endpoint
		.merge(gql::router(schema))
		// Per-client rate limiting
		.layer(middleware::from_fn_with_state(state.clone(), limiter::check))
		// Request middleware
		.layer(service)
		// Shared handler state
		.layer(Extension(state));

	// Setup the graceful shutdown handler
	let handle = Handle::new();
	let signal_task = signals::graceful_shutdown(handle.clone());

	info!(target: LOG, "Started web server on {}", addr);

	axum_server::bind(addr)
		.handle(handle)
		.serve(axum_app.into_make_service_with_connect_info::<SocketAddr>())
		.await?;

	// New requests are no longer accepted, so release the pool
	dbs::close(&pool);

	signal_task.abort();

	info!(target: LOG, "Web server stopped. Bye!");

	Ok(())
}
