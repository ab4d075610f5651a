//! The request-pipeline hook for the complexity checks. Installed as a
//! schema extension so the document parsed by async-graphql is validated
//! before the framework's own validation and before any resolver runs.

use std::sync::{Arc, Mutex};

use async_graphql::extensions::{
	Extension, ExtensionContext, ExtensionFactory, NextParseQuery, NextValidation,
};
use async_graphql::parser::types::ExecutableDocument;
use async_graphql::{ServerError, ServerResult, ValidationResult, Variables};
use async_trait::async_trait;

use super::complexity::{validate_query, Limits, Validation};

/// Rejects queries whose nesting depth or estimated execution cost exceed
/// the configured limits.
pub struct QueryGuard {
	limits: Limits,
}

impl QueryGuard {
	pub fn new(limits: Limits) -> Self {
		Self {
			limits,
		}
	}
}

impl ExtensionFactory for QueryGuard {
	fn create(&self) -> Arc<dyn Extension> {
		Arc::new(QueryGuardExtension {
			limits: self.limits,
			document: Mutex::new(None),
		})
	}
}

struct QueryGuardExtension {
	limits: Limits,
	document: Mutex<Option<ExecutableDocument>>,
}

#[async_trait]
impl Extension for QueryGuardExtension {
	async fn parse_query(
		&self,
		ctx: &ExtensionContext<'_>,
		query: &str,
		variables: &Variables,
		next: NextParseQuery<'_>,
	) -> ServerResult<ExecutableDocument> {
		let document = next.run(ctx, query, variables).await?;
		// Keep the parsed document around for the validation stage
		*self.document.lock().unwrap() = Some(document.clone());
		Ok(document)
	}

	async fn validation(
		&self,
		ctx: &ExtensionContext<'_>,
		next: NextValidation<'_>,
	) -> Result<ValidationResult, Vec<ServerError>> {
		let document = self.document.lock().unwrap().take();
		if let Some(document) = document {
			let validation = validate_query(&document, self.limits);
			if !validation.valid {
				warn!(
					depth = validation.depth,
					cost = validation.cost,
					max_depth = self.limits.max_depth,
					max_cost = self.limits.max_cost,
					"Rejecting query which exceeds the complexity limits"
				);
				// Each violated threshold becomes its own error
				return Err(validation
					.errors
					.iter()
					.map(|message| complexity_error(message, &validation, self.limits))
					.collect());
			}
		}
		next.run(ctx).await
	}
}

fn complexity_error(message: &str, validation: &Validation, limits: Limits) -> ServerError {
	let mut error = ServerError::new(message, None);
	let extensions = error.extensions.get_or_insert_with(Default::default);
	extensions.set("code", "QUERY_COMPLEXITY_EXCEEDED");
	extensions.set("depth", validation.depth as u64);
	extensions.set("cost", validation.cost);
	extensions.set("maxDepth", limits.max_depth as u64);
	extensions.set("maxCost", limits.max_cost);
	error
}

#[cfg(test)]
mod tests {
	use async_graphql::dynamic::{Field, FieldFuture, Object, Schema, TypeRef};
	use async_graphql::Value as GqlValue;
	use serde_json::json;

	use super::*;

	fn test_schema(limits: Limits) -> Schema {
		let query = Object::new("Query").field(Field::new(
			"value",
			TypeRef::named_nn(TypeRef::INT),
			|_| FieldFuture::new(async move { Ok(Some(GqlValue::from(1))) }),
		));
		Schema::build("Query", None, None)
			.register(query)
			.extension(QueryGuard::new(limits))
			.finish()
			.unwrap()
	}

	#[tokio::test]
	async fn admitted_queries_execute_normally() {
		let schema = test_schema(Limits {
			max_depth: 10,
			max_cost: 1_000,
		});
		let response = schema.execute("{ value }").await;
		assert!(response.errors.is_empty());
		assert_eq!(response.data.into_json().unwrap(), json!({ "value": 1 }));
	}

	#[tokio::test]
	async fn deep_queries_are_rejected_before_validation() {
		let schema = test_schema(Limits {
			max_depth: 2,
			max_cost: 1_000,
		});
		// The fields don't exist in the schema, which proves the rejection
		// happens before the framework's own validation sees the query
		let response = schema.execute("{ a { b { c } } }").await;
		let body = serde_json::to_value(&response).unwrap();
		let errors = body["errors"].as_array().unwrap();
		assert_eq!(errors.len(), 1);
		let message = errors[0]["message"].as_str().unwrap();
		assert!(message.contains("depth of 3"));
		assert!(message.contains("depth of 2"));
		assert_eq!(errors[0]["extensions"]["code"], json!("QUERY_COMPLEXITY_EXCEEDED"));
		assert_eq!(errors[0]["extensions"]["depth"], json!(3));
		assert_eq!(errors[0]["extensions"]["maxDepth"], json!(2));
	}

	#[tokio::test]
	async fn each_violation_is_a_distinct_error() {
		let schema = test_schema(Limits {
			max_depth: 1,
			max_cost: 10,
		});
		let response = schema.execute("{ widgets { name } }").await;
		let body = serde_json::to_value(&response).unwrap();
		let errors = body["errors"].as_array().unwrap();
		assert_eq!(errors.len(), 2);
		assert!(errors[0]["message"].as_str().unwrap().contains("depth"));
		assert!(errors[1]["message"].as_str().unwrap().contains("cost"));
		for error in errors {
			assert_eq!(error["extensions"]["code"], json!("QUERY_COMPLEXITY_EXCEEDED"));
		}
	}

	#[tokio::test]
	async fn cost_rejections_carry_the_measured_cost() {
		let schema = test_schema(Limits {
			max_depth: 10,
			max_cost: 50,
		});
		let response = schema.execute("{ widgets(first: 20) }").await;
		let body = serde_json::to_value(&response).unwrap();
		let errors = body["errors"].as_array().unwrap();
		assert_eq!(errors.len(), 1);
		assert_eq!(errors[0]["extensions"]["cost"], json!(200));
		assert_eq!(errors[0]["extensions"]["maxCost"], json!(50));
	}
}
