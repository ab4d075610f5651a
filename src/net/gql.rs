use async_graphql::dynamic::Schema;
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::GraphQL;
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post_service};
use axum::Router;

pub(super) fn router(schema: Schema) -> Router {
	let service = GraphQL::new(schema);
	match std::env::var("TABLEGRAPH_ENABLE_GRAPHIQL").as_deref() {
		Ok("true") => {
			warn!("GraphiQL is enabled. This is not recommended for production use.");
			Router::new().route("/graphql", get(graphiql).post_service(service))
		}
		_ => Router::new().route("/graphql", post_service(service)),
	}
}

pub async fn graphiql() -> impl IntoResponse {
	Html(GraphiQLSource::build().endpoint("/graphql").finish())
}
