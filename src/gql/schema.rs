//! Derives the GraphQL schema from the tables of the connected database.
//! Each base table in the configured schemas becomes an object type with one
//! field per column, a list query field with pagination and ordering
//! arguments, and a primary-key lookup field. Execution itself is delegated
//! to async-graphql; this module only maps tables to types and resolvers.

use std::collections::HashMap;

use async_graphql::dynamic::{
	Enum, Field, FieldFuture, InputObject, InputValue, Object, Scalar, Schema, Type, TypeRef,
};
use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Value as GqlValue};
use deadpool_postgres::Pool;
use tokio_postgres::Row;

use super::complexity::Limits;
use super::error::{internal_error, resolver_error, schema_error, GqlError};
use super::guard::QueryGuard;
use super::utils::GqlValueUtils;
use crate::cnf;

macro_rules! limit_input {
	() => {
		InputValue::new("limit", TypeRef::named(TypeRef::INT))
	};
}

macro_rules! start_input {
	() => {
		InputValue::new("start", TypeRef::named(TypeRef::INT))
	};
}

macro_rules! id_input {
	() => {
		InputValue::new("id", TypeRef::named_nn(TypeRef::ID))
	};
}

/// How a column is fetched from the database and surfaced in GraphQL.
/// Anything without a lossless scalar mapping is projected as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
	Int,
	Float,
	Bool,
	Json,
	Text,
}

#[derive(Debug, Clone)]
struct Column {
	name: String,
	kind: ColumnKind,
	nullable: bool,
}

#[derive(Debug, Clone)]
struct Table {
	schema: String,
	name: String,
	columns: Vec<Column>,
	/// Set only when the table has a single-column primary key
	primary_key: Option<String>,
}

/// Generate the full schema for the configured database schemas, with the
/// complexity guard installed.
pub async fn generate_schema(pool: &Pool, limits: Limits) -> Result<Schema, GqlError> {
	let schemas: Vec<String> = cnf::DATABASE_SCHEMAS
		.split(',')
		.map(|s| s.trim().to_string())
		.filter(|s| !s.is_empty())
		.collect();

	let tables = introspect(pool, &schemas).await?;
	if tables.is_empty() {
		return Err(schema_error("no tables found in database"));
	}

	info!(?schemas, tables = tables.len(), "generating schema");

	let mut query = Object::new("Query");
	let mut types: Vec<Type> = vec![Type::Scalar(Scalar::new("JSON"))];

	for table in tables {
		trace!("Adding table: {}", table.name);

		let table_orderable_name = format!("_orderable_{}", table.name);
		let mut table_orderable = Enum::new(&table_orderable_name);
		for column in &table.columns {
			table_orderable = table_orderable.item(&column.name);
		}
		let table_order_name = format!("_order_{}", table.name);
		let table_order = InputObject::new(&table_order_name)
			.field(InputValue::new("asc", TypeRef::named(&table_orderable_name)))
			.field(InputValue::new("desc", TypeRef::named(&table_orderable_name)));

		let list_table = table.clone();
		let list_pool = pool.clone();
		query = query.field(
			Field::new(
				table.name.clone(),
				TypeRef::named_nn_list_nn(table.name.clone()),
				move |ctx| {
					let table = list_table.clone();
					let pool = list_pool.clone();
					FieldFuture::new(async move {
						let args = ctx.args.as_index_map();

						let limit = args.get("limit").and_then(GqlValueUtils::as_i64);
						let start = args.get("start").and_then(GqlValueUtils::as_i64);
						let order = match args.get("order") {
							Some(value) => order_clause(&table, value)?,
							None => None,
						};

						let sql = select_sql(&table, order.as_deref(), limit, start);
						trace!("generated query: {}", sql);

						let client = pool.get().await.map_err(GqlError::from)?;
						let rows = client.query(sql.as_str(), &[]).await.map_err(GqlError::from)?;
						let out = rows
							.iter()
							.map(|row| row_to_gql(row, &table.columns))
							.collect::<Result<Vec<GqlValue>, GqlError>>()?;

						Ok(Some(GqlValue::List(out)))
					})
				},
			)
			.argument(limit_input!())
			.argument(start_input!())
			.argument(InputValue::new("order", TypeRef::named(&table_order_name))),
		);

		if let Some(primary_key) = table.primary_key.clone() {
			let get_table = table.clone();
			let get_pool = pool.clone();
			query = query.field(
				Field::new(
					format!("_get_{}", table.name),
					TypeRef::named(table.name.clone()),
					move |ctx| {
						let table = get_table.clone();
						let pool = get_pool.clone();
						let primary_key = primary_key.clone();
						FieldFuture::new(async move {
							let args = ctx.args.as_index_map();
							// async-graphql should validate that this is present as it is non-null
							let id = match args.get("id").and_then(GqlValueUtils::as_id) {
								Some(id) => id,
								None => {
									return Err(internal_error(
										"Schema validation failed: No id found in _get_",
									)
									.into());
								}
							};

							// Primary keys of any type are compared textually
							let sql = format!(
								"{} WHERE {}::text = $1 LIMIT 1",
								select_sql(&table, None, None, None),
								quote_ident(&primary_key)
							);
							trace!("generated query: {}", sql);

							let client = pool.get().await.map_err(GqlError::from)?;
							let rows =
								client.query(sql.as_str(), &[&id]).await.map_err(GqlError::from)?;
							match rows.first() {
								Some(row) => Ok(Some(row_to_gql(row, &table.columns)?)),
								None => Ok(None),
							}
						})
					},
				)
				.argument(id_input!()),
			);
		}

		let mut table_ty_obj = Object::new(&table.name);
		for column in &table.columns {
			let field_name = Name::new(&column.name);
			table_ty_obj = table_ty_obj.field(Field::new(
				&column.name,
				column_type(column),
				move |ctx| {
					let field_name = field_name.clone();
					FieldFuture::new(async move {
						let record = ctx
							.parent_value
							.as_value()
							.ok_or_else(|| internal_error("record should be a resolved value"))?;
						let GqlValue::Object(record_map) = record else {
							return Err(internal_error(format!(
								"record should be an object, but found: {record:?}"
							))
							.into());
						};
						Ok(record_map.get(&field_name).cloned())
					})
				},
			));
		}

		types.push(Type::Object(table_ty_obj));
		types.push(Type::InputObject(table_order));
		types.push(Type::Enum(table_orderable));
	}

	let mut schema = Schema::build("Query", None, None)
		.register(query)
		.extension(QueryGuard::new(limits));
	for ty in types {
		schema = schema.register(ty);
	}
	schema.finish().map_err(|e| schema_error(e.to_string()))
}

/// Read the tables, columns and primary keys of the given schemas from
/// information_schema. Tables whose names would not be valid GraphQL
/// identifiers are skipped with a warning.
async fn introspect(pool: &Pool, schemas: &[String]) -> Result<Vec<Table>, GqlError> {
	let client = pool.get().await?;
	let schemas = schemas.to_vec();

	let mut tables: Vec<Table> = Vec::new();
	let mut index: HashMap<(String, String), usize> = HashMap::new();

	let rows = client
		.query(
			"SELECT t.table_schema::text, t.table_name::text \
			 FROM information_schema.tables t \
			 WHERE t.table_type = 'BASE TABLE' AND t.table_schema::text = ANY($1) \
			 ORDER BY t.table_schema, t.table_name",
			&[&schemas],
		)
		.await?;
	for row in rows {
		let schema: String = row.try_get(0)?;
		let name: String = row.try_get(1)?;
		if !valid_graphql_name(&name) {
			warn!("Skipping table with a name unrepresentable in GraphQL: {}", name);
			continue;
		}
		index.insert((schema.clone(), name.clone()), tables.len());
		tables.push(Table {
			schema,
			name,
			columns: Vec::new(),
			primary_key: None,
		});
	}

	let rows = client
		.query(
			"SELECT c.table_schema::text, c.table_name::text, c.column_name::text, \
			        c.data_type::text, c.is_nullable::text \
			 FROM information_schema.columns c \
			 WHERE c.table_schema::text = ANY($1) \
			 ORDER BY c.table_schema, c.table_name, c.ordinal_position",
			&[&schemas],
		)
		.await?;
	for row in rows {
		let schema: String = row.try_get(0)?;
		let table: String = row.try_get(1)?;
		let name: String = row.try_get(2)?;
		let data_type: String = row.try_get(3)?;
		let nullable: String = row.try_get(4)?;
		let Some(&idx) = index.get(&(schema, table)) else {
			continue;
		};
		if !valid_graphql_name(&name) {
			warn!("Skipping column with a name unrepresentable in GraphQL: {}", name);
			continue;
		}
		tables[idx].columns.push(Column {
			name,
			kind: column_kind(&data_type),
			nullable: nullable == "YES",
		});
	}

	let rows = client
		.query(
			"SELECT kcu.table_schema::text, kcu.table_name::text, kcu.column_name::text \
			 FROM information_schema.table_constraints tc \
			 JOIN information_schema.key_column_usage kcu \
			   ON tc.constraint_name = kcu.constraint_name \
			  AND tc.table_schema = kcu.table_schema \
			 WHERE tc.constraint_type = 'PRIMARY KEY' AND tc.table_schema::text = ANY($1)",
			&[&schemas],
		)
		.await?;
	let mut keys: HashMap<(String, String), Vec<String>> = HashMap::new();
	for row in rows {
		let schema: String = row.try_get(0)?;
		let table: String = row.try_get(1)?;
		let column: String = row.try_get(2)?;
		keys.entry((schema, table)).or_default().push(column);
	}
	for (key, columns) in keys {
		if let (Some(&idx), [column]) = (index.get(&key), columns.as_slice()) {
			tables[idx].primary_key = Some(column.clone());
		}
	}

	// A table with no usable columns cannot become an object type
	tables.retain(|table| !table.columns.is_empty());

	Ok(tables)
}

fn column_kind(data_type: &str) -> ColumnKind {
	match data_type {
		"smallint" | "integer" => ColumnKind::Int,
		"real" | "double precision" => ColumnKind::Float,
		"boolean" => ColumnKind::Bool,
		"json" | "jsonb" => ColumnKind::Json,
		// bigint and numeric don't fit the 32-bit Int scalar, and temporal,
		// uuid, array and user-defined types have no scalar of their own
		_ => ColumnKind::Text,
	}
}

fn column_type(column: &Column) -> TypeRef {
	let name = match column.kind {
		ColumnKind::Int => TypeRef::INT,
		ColumnKind::Float => TypeRef::FLOAT,
		ColumnKind::Bool => TypeRef::BOOLEAN,
		ColumnKind::Json => "JSON",
		ColumnKind::Text => TypeRef::STRING,
	};
	if column.nullable {
		TypeRef::named(name)
	} else {
		TypeRef::named_nn(name)
	}
}

/// The select-list expression for a column, cast so that every kind decodes
/// through one known wire type.
fn projection(column: &Column) -> String {
	let ident = quote_ident(&column.name);
	match column.kind {
		ColumnKind::Int => format!("{ident}::int4 AS {ident}"),
		ColumnKind::Float => format!("{ident}::float8 AS {ident}"),
		ColumnKind::Bool | ColumnKind::Json => ident,
		ColumnKind::Text => format!("{ident}::text AS {ident}"),
	}
}

fn select_sql(table: &Table, order: Option<&str>, limit: Option<i64>, start: Option<i64>) -> String {
	let projection = table.columns.iter().map(projection).collect::<Vec<_>>().join(", ");
	let mut sql = format!(
		"SELECT {projection} FROM {}.{}",
		quote_ident(&table.schema),
		quote_ident(&table.name)
	);
	if let Some(order) = order {
		sql.push(' ');
		sql.push_str(order);
	}
	if let Some(limit) = limit {
		sql.push_str(&format!(" LIMIT {}", limit.max(0)));
	}
	if let Some(start) = start {
		sql.push_str(&format!(" OFFSET {}", start.max(0)));
	}
	sql
}

/// Translate the `order` argument into an ORDER BY clause. The orderable
/// enum restricts values to real column names, but they are verified again
/// before being quoted into the statement.
fn order_clause(table: &Table, value: &GqlValue) -> Result<Option<String>, GqlError> {
	let GqlValue::Object(object) = value else {
		return Ok(None);
	};
	let (column, direction) = match (object.get("asc"), object.get("desc")) {
		(Some(_), Some(_)) => return Err(resolver_error("Found both asc and desc in order")),
		(Some(GqlValue::Enum(column)), None) => (column.as_str(), "ASC"),
		(None, Some(GqlValue::Enum(column))) => (column.as_str(), "DESC"),
		_ => return Ok(None),
	};
	if !table.columns.iter().any(|c| c.name == column) {
		return Err(resolver_error(format!("cannot order by unknown column: {column}")));
	}
	Ok(Some(format!("ORDER BY {} {direction}", quote_ident(column))))
}

/// Convert one result row into a GraphQL object, using the column metadata
/// captured at introspection time.
fn row_to_gql(row: &Row, columns: &[Column]) -> Result<GqlValue, GqlError> {
	let mut map = IndexMap::new();
	for (idx, column) in columns.iter().enumerate() {
		let value = match column.kind {
			ColumnKind::Int => row.try_get::<_, Option<i32>>(idx)?.map(GqlValue::from),
			ColumnKind::Float => row.try_get::<_, Option<f64>>(idx)?.map(GqlValue::from),
			ColumnKind::Bool => row.try_get::<_, Option<bool>>(idx)?.map(GqlValue::from),
			ColumnKind::Json => row
				.try_get::<_, Option<serde_json::Value>>(idx)?
				.map(GqlValue::from_json)
				.transpose()
				.map_err(|e| {
					internal_error(format!("JSON column {} is not representable: {e}", column.name))
				})?,
			ColumnKind::Text => row.try_get::<_, Option<String>>(idx)?.map(GqlValue::from),
		};
		map.insert(Name::new(&column.name), value.unwrap_or(GqlValue::Null));
	}
	Ok(GqlValue::Object(map))
}

fn quote_ident(ident: &str) -> String {
	format!("\"{}\"", ident.replace('"', "\"\""))
}

fn valid_graphql_name(name: &str) -> bool {
	let mut chars = name.chars();
	match chars.next() {
		Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
		_ => return false,
	}
	chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
	use super::*;

	fn table() -> Table {
		Table {
			schema: "public".to_string(),
			name: "users".to_string(),
			columns: vec![
				Column {
					name: "id".to_string(),
					kind: ColumnKind::Int,
					nullable: false,
				},
				Column {
					name: "name".to_string(),
					kind: ColumnKind::Text,
					nullable: true,
				},
			],
			primary_key: Some("id".to_string()),
		}
	}

	#[test]
	fn idents_are_quoted_and_escaped() {
		assert_eq!(quote_ident("users"), "\"users\"");
		assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
	}

	#[test]
	fn select_projects_each_column_with_casts() {
		let sql = select_sql(&table(), None, Some(5), Some(10));
		assert_eq!(
			sql,
			"SELECT \"id\"::int4 AS \"id\", \"name\"::text AS \"name\" \
			 FROM \"public\".\"users\" LIMIT 5 OFFSET 10"
		);
	}

	#[test]
	fn negative_pagination_is_clamped() {
		let sql = select_sql(&table(), None, Some(-1), None);
		assert!(sql.ends_with("LIMIT 0"));
	}

	#[test]
	fn order_uses_known_columns_only() {
		let table = table();
		let mut object = IndexMap::new();
		object.insert(Name::new("asc"), GqlValue::Enum(Name::new("name")));
		let clause = order_clause(&table, &GqlValue::Object(object)).unwrap();
		assert_eq!(clause.as_deref(), Some("ORDER BY \"name\" ASC"));

		let mut object = IndexMap::new();
		object.insert(Name::new("desc"), GqlValue::Enum(Name::new("nope")));
		assert!(order_clause(&table, &GqlValue::Object(object)).is_err());
	}

	#[test]
	fn order_rejects_conflicting_directions() {
		let table = table();
		let mut object = IndexMap::new();
		object.insert(Name::new("asc"), GqlValue::Enum(Name::new("id")));
		object.insert(Name::new("desc"), GqlValue::Enum(Name::new("name")));
		assert!(order_clause(&table, &GqlValue::Object(object)).is_err());
	}

	#[test]
	fn data_types_map_to_scalar_kinds() {
		assert_eq!(column_kind("integer"), ColumnKind::Int);
		assert_eq!(column_kind("double precision"), ColumnKind::Float);
		assert_eq!(column_kind("boolean"), ColumnKind::Bool);
		assert_eq!(column_kind("jsonb"), ColumnKind::Json);
		// Wider-than-Int and exotic types fall back to text
		assert_eq!(column_kind("bigint"), ColumnKind::Text);
		assert_eq!(column_kind("numeric"), ColumnKind::Text);
		assert_eq!(column_kind("timestamp with time zone"), ColumnKind::Text);
	}

	#[test]
	fn graphql_name_validity() {
		assert!(valid_graphql_name("users"));
		assert!(valid_graphql_name("_private"));
		assert!(!valid_graphql_name("2fast"));
		assert!(!valid_graphql_name("with space"));
		assert!(!valid_graphql_name(""));
	}
}
