use once_cell::sync::Lazy;

pub const LOGO: &str = r"
 _         _     _                                  _
| |_  __ _| |__ | | ___  __ _ _ __ __ _ _ __  | |__
| __|/ _` | '_ \| |/ _ \/ _` | '__/ _` | '_ \ | '_ \
| |_| (_| | |_) | |  __/ (_| | | | (_| | |_) || | | |
 \__|\__,_|_.__/|_|\___|\__, |_|  \__,_| .__/ |_| |_|
                        |___/          |_|
";

/// The publicly visible name of the server
pub const PKG_NAME: &str = "tablegraph";

/// What is the runtime thread memory stack size (defaults to 10MiB)
pub static RUNTIME_STACK_SIZE: Lazy<usize> =
	lazy_env_parse_or_else!("TABLEGRAPH_RUNTIME_STACK_SIZE", usize, || {
		// Stack frames are generally larger in debug mode
		if cfg!(debug_assertions) {
			20 * 1024 * 1024 // 20MiB in debug mode
		} else {
			10 * 1024 * 1024 // 10MiB in release mode
		}
	});

/// The database schemas from which the GraphQL API is derived (defaults to `public`)
pub static DATABASE_SCHEMAS: Lazy<String> =
	lazy_env_parse_or_else!("TABLEGRAPH_DATABASE_SCHEMAS", String, || String::from("public"));

/// How many connections the database pool may hold open (defaults to 20)
pub static DATABASE_POOL_MAX: Lazy<usize> =
	lazy_env_parse!("TABLEGRAPH_DATABASE_POOL_MAX", usize, 20);

/// How long to wait for a database connection, in milliseconds (defaults to 5 seconds)
pub static DATABASE_CONNECT_TIMEOUT: Lazy<u64> =
	lazy_env_parse!("TABLEGRAPH_DATABASE_CONNECT_TIMEOUT", u64, 5_000);

/// The maximum nesting depth allowed for a single GraphQL query (defaults to 10)
pub static GRAPHQL_MAX_DEPTH: Lazy<usize> =
	lazy_env_parse!("TABLEGRAPH_GRAPHQL_MAX_DEPTH", usize, 10);

/// The maximum estimated cost allowed for a single GraphQL query (defaults to 1000)
pub static GRAPHQL_MAX_COST: Lazy<u64> =
	lazy_env_parse!("TABLEGRAPH_GRAPHQL_MAX_COST", u64, 1_000);

/// How many sustained requests per second each client is allowed (defaults to 50)
pub static RATE_LIMIT: Lazy<u64> = lazy_env_parse!("TABLEGRAPH_RATE_LIMIT", u64, 50);

/// How many requests a client may burst above the sustained rate (defaults to 25)
pub static RATE_LIMIT_BURST: Lazy<usize> =
	lazy_env_parse!("TABLEGRAPH_RATE_LIMIT_BURST", usize, 25);

/// How long a graceful shutdown may take before connections are dropped,
/// in milliseconds (defaults to 10 seconds)
pub static SHUTDOWN_TIMEOUT: Lazy<u64> =
	lazy_env_parse!("TABLEGRAPH_SHUTDOWN_TIMEOUT", u64, 10_000);

/// The version identifier of this build
pub static PKG_VERSION: Lazy<String> = Lazy::new(|| match option_env!("TABLEGRAPH_BUILD_METADATA") {
	Some(metadata) if !metadata.trim().is_empty() => {
		let version = env!("CARGO_PKG_VERSION");
		format!("{version}+{metadata}")
	}
	_ => env!("CARGO_PKG_VERSION").to_owned(),
});
