use thiserror::Error;

use crate::gql::error::GqlError;

#[derive(Debug, Error)]
pub enum Error {
	#[error("There was a problem with the network: {0}")]
	Io(#[from] std::io::Error),

	#[error("Couldn't parse the address to listen on: {0}")]
	InvalidBindAddress(#[from] std::net::AddrParseError),

	#[error("Couldn't create the database connection pool: {0}")]
	CreatePool(#[from] deadpool_postgres::CreatePoolError),

	#[error("There was a problem with the GraphQL schema: {0}")]
	Gql(#[from] GqlError),

	#[error("There was a problem connecting to the server: {0}")]
	Request(#[from] reqwest::Error),

	#[error("The server is not ready to serve requests")]
	ServerNotReady,
}
