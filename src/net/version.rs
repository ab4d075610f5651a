use axum::routing::get;
use axum::Router;

use crate::cnf::{PKG_NAME, PKG_VERSION};

pub(super) fn router() -> Router {
	Router::new().route("/version", get(handler))
}

async fn handler() -> String {
	format!("{PKG_NAME}-{}", *PKG_VERSION)
}

#[cfg(test)]
mod tests {
	use axum::body::Body;
	use http::{Request, StatusCode};
	use http_body_util::BodyExt;
	use tower::ServiceExt;

	use super::*;

	#[tokio::test]
	async fn version_reports_the_package_version() {
		let response = router()
			.oneshot(Request::builder().uri("/version").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);
		let bytes = response.into_body().collect().await.unwrap().to_bytes();
		let body = String::from_utf8(bytes.to_vec()).unwrap();
		assert!(body.starts_with("tablegraph-"));
	}
}
