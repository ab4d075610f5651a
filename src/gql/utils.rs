use async_graphql::Value as GqlValue;

/// Conversions from GraphQL argument values which async-graphql does not
/// provide directly.
pub(super) trait GqlValueUtils {
	fn as_i64(&self) -> Option<i64>;
	fn as_id(&self) -> Option<String>;
}

impl GqlValueUtils for GqlValue {
	fn as_i64(&self) -> Option<i64> {
		if let GqlValue::Number(n) = self {
			n.as_i64()
		} else {
			None
		}
	}

	// ID inputs arrive as strings, but integer literals are also accepted
	fn as_id(&self) -> Option<String> {
		match self {
			GqlValue::String(s) => Some(s.to_owned()),
			GqlValue::Number(n) => Some(n.to_string()),
			_ => None,
		}
	}
}
