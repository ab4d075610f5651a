use thiserror::Error;

#[derive(Debug, Error)]
pub enum GqlError {
	#[error("Database error: {0}")]
	Db(String),
	#[error("Error generating schema: {0}")]
	Schema(String),
	#[error("Error resolving request: {0}")]
	Resolver(String),
	#[error("Internal Error: {0}")]
	Internal(String),
}

pub fn schema_error(msg: impl Into<String>) -> GqlError {
	GqlError::Schema(msg.into())
}

pub fn resolver_error(msg: impl Into<String>) -> GqlError {
	GqlError::Resolver(msg.into())
}

pub fn internal_error(msg: impl Into<String>) -> GqlError {
	let msg = msg.into();
	error!("{}", msg);
	GqlError::Internal(msg)
}

impl From<tokio_postgres::Error> for GqlError {
	fn from(value: tokio_postgres::Error) -> Self {
		GqlError::Db(value.to_string())
	}
}

impl From<deadpool_postgres::PoolError> for GqlError {
	fn from(value: deadpool_postgres::PoolError) -> Self {
		GqlError::Db(value.to_string())
	}
}
