//! Admission control for GraphQL queries. Computes the nesting depth and an
//! estimated execution cost of an already-parsed document, so that abusive
//! queries are rejected before any resolver runs.

use std::collections::HashMap;

use async_graphql::parser::types::{
	ExecutableDocument, Field, FragmentDefinition, Selection, SelectionSet,
};
use async_graphql::{Name, Positioned, Value as GqlValue};

use crate::cnf;

/// Base cost of resolving a list or connection field.
const LIST_BASE_COST: u64 = 10;
/// Multiplier applied to list fields without a bounded page size.
const UNBOUNDED_LIST_MULTIPLIER: u64 = 10;
/// Page size arguments above this no longer increase the cost.
const PAGE_SIZE_CAP: u64 = 100;

type Fragments = HashMap<Name, Positioned<FragmentDefinition>>;

/// Thresholds applied when admitting a query for execution.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
	pub max_depth: usize,
	pub max_cost: u64,
}

impl Default for Limits {
	fn default() -> Self {
		Self {
			max_depth: *cnf::GRAPHQL_MAX_DEPTH,
			max_cost: *cnf::GRAPHQL_MAX_COST,
		}
	}
}

/// The outcome of checking a single document against the configured limits.
/// Depth and cost are always populated, even when the document is rejected,
/// so they can be logged and returned to the client for diagnostics.
#[derive(Debug, Clone)]
pub struct Validation {
	pub valid: bool,
	pub depth: usize,
	pub cost: u64,
	pub errors: Vec<String>,
}

/// The maximum nesting depth across all operations in the document.
pub fn calculate_query_depth(document: &ExecutableDocument) -> usize {
	let mut depth = 0;
	for (_, operation) in document.operations.iter() {
		depth = depth.max(selection_set_depth(
			&operation.node.selection_set.node,
			&document.fragments,
			0,
		));
	}
	depth
}

fn selection_set_depth(set: &SelectionSet, fragments: &Fragments, current: usize) -> usize {
	set.items
		.iter()
		.map(|selection| selection_depth(&selection.node, fragments, current))
		.max()
		.unwrap_or(current)
}

fn selection_depth(selection: &Selection, fragments: &Fragments, current: usize) -> usize {
	match selection {
		// A field reaches one level further down, whether or not it selects
		// anything below itself
		Selection::Field(field) => {
			let set = &field.node.selection_set.node;
			if set.items.is_empty() {
				current + 1
			} else {
				selection_set_depth(set, fragments, current + 1)
			}
		}
		// Fragments are transparent containers and stay at the current depth
		Selection::InlineFragment(inline) => {
			selection_set_depth(&inline.node.selection_set.node, fragments, current)
		}
		Selection::FragmentSpread(spread) => {
			match fragments.get(&spread.node.fragment_name.node) {
				Some(fragment) => {
					selection_set_depth(&fragment.node.selection_set.node, fragments, current)
				}
				// An unresolved spread selects nothing
				None => current,
			}
		}
	}
}

/// The estimated cost of executing the document. Scalar fields cost 1,
/// list and connection fields cost 10 multiplied by their declared page
/// size, and nested selections add their own cost on top.
pub fn estimate_query_cost(document: &ExecutableDocument) -> u64 {
	document
		.operations
		.iter()
		.map(|(_, operation)| {
			selection_set_cost(&operation.node.selection_set.node, &document.fragments)
		})
		.sum()
}

fn selection_set_cost(set: &SelectionSet, fragments: &Fragments) -> u64 {
	set.items.iter().map(|selection| selection_cost(&selection.node, fragments)).sum()
}

fn selection_cost(selection: &Selection, fragments: &Fragments) -> u64 {
	match selection {
		Selection::Field(field) => {
			let field = &field.node;
			let name = field.name.node.as_str();
			// Collections are far more expensive to resolve than scalars.
			// Plural field names and relay-style connections are treated as
			// collections.
			let own = if name.ends_with("Connection") || name.ends_with('s') {
				match page_size(field) {
					Some(size) => LIST_BASE_COST * size.min(PAGE_SIZE_CAP),
					None => LIST_BASE_COST * UNBOUNDED_LIST_MULTIPLIER,
				}
			} else {
				1
			};
			own + selection_set_cost(&field.selection_set.node, fragments)
		}
		Selection::InlineFragment(inline) => {
			selection_set_cost(&inline.node.selection_set.node, fragments)
		}
		Selection::FragmentSpread(spread) => {
			match fragments.get(&spread.node.fragment_name.node) {
				Some(fragment) => {
					selection_set_cost(&fragment.node.selection_set.node, fragments)
				}
				None => 0,
			}
		}
	}
}

/// The declared page size of a list field, taken from its `first` or `last`
/// argument. `first` wins when both carry integers; a value which is not a
/// plain non-negative integer is ignored.
fn page_size(field: &Field) -> Option<u64> {
	["first", "last"].into_iter().find_map(|key| {
		field
			.arguments
			.iter()
			.find(|(name, _)| name.node.as_str() == key)
			.and_then(|(_, value)| value.node.clone().into_const())
			.and_then(|value| match value {
				GqlValue::Number(n) => n.as_u64(),
				_ => None,
			})
	})
}

/// Check the document against the given limits. Depth and cost are computed
/// independently, in two passes, since they compose differently (depth as a
/// maximum, cost additively) and stay independently testable that way.
/// Violations are reported as data, never as errors of this function.
pub fn validate_query(document: &ExecutableDocument, limits: Limits) -> Validation {
	let depth = calculate_query_depth(document);
	let cost = estimate_query_cost(document);

	let mut errors = Vec::new();
	if depth > limits.max_depth {
		errors.push(format!(
			"Query depth of {depth} exceeds maximum allowed depth of {}",
			limits.max_depth
		));
	}
	if cost > limits.max_cost {
		errors.push(format!(
			"Query cost of {cost} exceeds maximum allowed cost of {}",
			limits.max_cost
		));
	}

	Validation {
		valid: errors.is_empty(),
		depth,
		cost,
		errors,
	}
}

#[cfg(test)]
mod tests {
	use async_graphql::parser::parse_query;

	use super::*;

	fn doc(query: &str) -> ExecutableDocument {
		parse_query(query).unwrap()
	}

	#[test]
	fn depth_of_flat_selections_is_one() {
		assert_eq!(calculate_query_depth(&doc("{ a b c }")), 1);
	}

	#[test]
	fn depth_counts_nested_fields() {
		assert_eq!(calculate_query_depth(&doc("{ a { b { c } } }")), 3);
	}

	#[test]
	fn inline_fragments_are_transparent() {
		assert_eq!(calculate_query_depth(&doc("{ a { ... on T { b { c } } } }")), 3);
	}

	#[test]
	fn fragment_spreads_are_transparent() {
		let document = doc("query { a { ...f } } fragment f on T { b { c } }");
		assert_eq!(calculate_query_depth(&document), 3);
	}

	#[test]
	fn missing_fragments_add_no_depth() {
		assert_eq!(calculate_query_depth(&doc("{ a { ...missing } }")), 1);
	}

	#[test]
	fn depth_is_the_maximum_across_operations() {
		let document = doc("query A { a { b } } query B { c }");
		assert_eq!(calculate_query_depth(&document), 2);
	}

	#[test]
	fn scalar_fields_cost_one() {
		assert_eq!(estimate_query_cost(&doc("{ user }")), 1);
	}

	#[test]
	fn unbounded_lists_get_the_flat_multiplier() {
		// 10 base x 10 unbounded
		assert_eq!(estimate_query_cost(&doc("{ widgets }")), 100);
	}

	#[test]
	fn first_bounds_the_list_cost() {
		assert_eq!(estimate_query_cost(&doc("{ widgets(first: 5) }")), 50);
	}

	#[test]
	fn page_size_is_capped() {
		assert_eq!(estimate_query_cost(&doc("{ widgets(first: 500) }")), 1000);
	}

	#[test]
	fn last_is_used_when_first_is_absent() {
		assert_eq!(estimate_query_cost(&doc("{ widgets(last: 3) }")), 30);
	}

	#[test]
	fn first_takes_precedence_over_last() {
		assert_eq!(estimate_query_cost(&doc("{ widgets(first: 5, last: 50) }")), 50);
	}

	#[test]
	fn non_integer_first_falls_through_to_last() {
		let document = doc("query($n: Int) { widgets(first: $n, last: 7) }");
		assert_eq!(estimate_query_cost(&document), 70);
	}

	#[test]
	fn negative_page_sizes_are_ignored() {
		// A negative page size cannot bound the cost, so the unbounded
		// multiplier applies
		assert_eq!(estimate_query_cost(&doc("{ widgets(first: -5) }")), 100);
		// A negative first still yields to a usable last
		assert_eq!(estimate_query_cost(&doc("{ widgets(first: -5, last: 3) }")), 30);
	}

	#[test]
	fn connection_suffix_is_a_list() {
		// postConnection: 10 x 2, edges: 10 x 10 unbounded
		assert_eq!(estimate_query_cost(&doc("{ postConnection(first: 2) { edges } }")), 120);
	}

	#[test]
	fn nested_cost_is_additive() {
		// users: 10 x 2, posts: 10 x 3, title: 1
		let document = doc("{ users(first: 2) { posts(first: 3) { title } } }");
		assert_eq!(estimate_query_cost(&document), 51);
	}

	#[test]
	fn fragments_cost_their_contents_only() {
		let document = doc("query { a { ...f } } fragment f on T { b }");
		assert_eq!(estimate_query_cost(&document), 2);
	}

	#[test]
	fn missing_fragments_cost_nothing() {
		assert_eq!(estimate_query_cost(&doc("{ a { ...missing } }")), 1);
	}

	#[test]
	fn depth_violations_name_both_values() {
		let limits = Limits {
			max_depth: 2,
			max_cost: 1_000,
		};
		let validation = validate_query(&doc("{ a { b { c } } }"), limits);
		assert!(!validation.valid);
		assert_eq!(validation.depth, 3);
		assert_eq!(validation.errors.len(), 1);
		assert!(validation.errors[0].contains('3'));
		assert!(validation.errors[0].contains('2'));
	}

	#[test]
	fn both_thresholds_can_be_violated_at_once() {
		let limits = Limits {
			max_depth: 1,
			max_cost: 10,
		};
		let validation = validate_query(&doc("{ widgets { name } }"), limits);
		assert!(!validation.valid);
		assert_eq!(validation.errors.len(), 2);
		assert!(validation.errors[0].contains("depth"));
		assert!(validation.errors[1].contains("cost"));
	}

	#[test]
	fn admitted_queries_still_report_their_measurements() {
		let validation = validate_query(&doc("{ a { b } }"), Limits::default());
		assert!(validation.valid);
		assert!(validation.errors.is_empty());
		assert_eq!(validation.depth, 2);
		assert_eq!(validation.cost, 2);
	}
}
