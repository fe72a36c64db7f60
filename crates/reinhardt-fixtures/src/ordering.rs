//! Dependency ordering of tables over their foreign-key graph.
//!
//! The orderer scans tables left to right. When a table references a table
//! placed after it, the referenced table is spliced in front of the
//! referencing one and the scan restarts. Self references and references to
//! tables outside the input set do not constrain the order.
//!
//! On an acyclic graph the prefix before the first violation never moves
//! again and grows at least once every `n` splices, so at most `n²` splices
//! happen. A cyclic graph can splice forever; the loop stops at that budget
//! and keeps the order reached so far.

use std::collections::HashSet;

use crate::schema::{SchemaCatalog, Table};

/// Orders tables so that every table referenced by a foreign key precedes
/// the tables referencing it.
///
/// Duplicate identifiers keep their first occurrence. Never fails.
///
/// # Example
///
/// ```
/// use reinhardt_fixtures::ordering::order;
/// use reinhardt_fixtures::schema::{Column, Table};
///
/// let author = Table::new("bookstore.Author", "author").with_column(Column::primary_key("id"));
/// let book = Table::new("bookstore.Book", "book")
///     .with_column(Column::primary_key("id"))
///     .with_column(Column::foreign_key("author_id", "bookstore.Author", "id"));
///
/// let ordered: Vec<_> = order(vec![&book, &author]).iter().map(|t| t.id.as_str()).collect();
/// assert_eq!(ordered, vec!["bookstore.Author", "bookstore.Book"]);
/// ```
pub fn order<'a>(tables: impl IntoIterator<Item = &'a Table>) -> Vec<&'a Table> {
	order_by(tables, |table, other| references(table, &other.id))
}

/// Orders tables like [`order`], and also places a table after every table
/// inheriting from a table it references.
///
/// A child row owns a mirror row in each concrete ancestor, so a foreign
/// key to an ancestor may point at a row created through a child table.
pub fn order_in<'a>(
	tables: impl IntoIterator<Item = &'a Table>,
	catalog: &dyn SchemaCatalog,
) -> Vec<&'a Table> {
	order_by(tables, |table, other| {
		references(table, &other.id)
			|| catalog
				.concrete_ancestors(&other.id)
				.iter()
				.any(|ancestor| references(table, &ancestor.id))
	})
}

fn order_by<'a>(
	tables: impl IntoIterator<Item = &'a Table>,
	depends_on: impl Fn(&Table, &Table) -> bool,
) -> Vec<&'a Table> {
	let mut seen = HashSet::new();
	let mut ordered: Vec<&Table> = tables
		.into_iter()
		.filter(|table| seen.insert(table.id.as_str()))
		.collect();

	let budget = ordered.len() * ordered.len();
	let mut splices = 0;

	while let Some((from, to)) = first_backward_edge(&ordered, &depends_on) {
		if splices == budget {
			tracing::warn!(
				tables = ordered.len(),
				"Foreign-key graph is cyclic, keeping a partial dependency order"
			);
			break;
		}
		let related = ordered.remove(from);
		ordered.insert(to, related);
		splices += 1;
	}

	tracing::debug!(splices, "Computed table dependency order");
	ordered
}

/// Finds the first table depending on a table placed after it.
///
/// Returns `(position of the dependency, position of the dependent table)`.
fn first_backward_edge(
	ordered: &[&Table],
	depends_on: &impl Fn(&Table, &Table) -> bool,
) -> Option<(usize, usize)> {
	ordered.iter().enumerate().find_map(|(position, table)| {
		ordered[position + 1..]
			.iter()
			.position(|other| depends_on(table, other))
			.map(|offset| (position + 1 + offset, position))
	})
}

fn references(table: &Table, id: &str) -> bool {
	table.foreign_keys().any(|(_, fk)| fk.table == id)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::schema::{Column, Schema};
	use rstest::rstest;

	fn table(id: &str, references: &[&str]) -> Table {
		references.iter().enumerate().fold(
			Table::new(id, id.to_lowercase()).with_column(Column::primary_key("id")),
			|table, (i, target)| {
				table.with_column(Column::foreign_key(format!("fk_{i}"), *target, "id"))
			},
		)
	}

	fn ids<'a>(tables: &[&'a Table]) -> Vec<&'a str> {
		tables.iter().map(|t| t.id.as_str()).collect()
	}

	#[rstest]
	fn test_dependency_moves_before_dependent() {
		let book = table("Book", &["Author"]);
		let author = table("Author", &[]);
		assert_eq!(ids(&order(vec![&book, &author])), vec!["Author", "Book"]);
	}

	#[rstest]
	fn test_chain_reversed_input() {
		let c = table("C", &["B"]);
		let b = table("B", &["A"]);
		let a = table("A", &[]);
		assert_eq!(ids(&order(vec![&c, &b, &a])), vec!["A", "B", "C"]);
	}

	#[rstest]
	fn test_already_ordered_input_is_stable() {
		let author = table("Author", &[]);
		let tag = table("Tag", &[]);
		let book = table("Book", &["Author"]);
		assert_eq!(
			ids(&order(vec![&author, &tag, &book])),
			vec!["Author", "Tag", "Book"]
		);
	}

	#[rstest]
	fn test_self_reference_ignored() {
		let category = table("Category", &["Category"]);
		let product = table("Product", &["Category"]);
		assert_eq!(
			ids(&order(vec![&product, &category])),
			vec!["Category", "Product"]
		);
	}

	#[rstest]
	fn test_reference_outside_input_ignored() {
		let book = table("Book", &["Publisher"]);
		let tag = table("Tag", &[]);
		assert_eq!(ids(&order(vec![&book, &tag])), vec!["Book", "Tag"]);
	}

	#[rstest]
	fn test_duplicates_removed() {
		let author = table("Author", &[]);
		assert_eq!(ids(&order(vec![&author, &author])), vec!["Author"]);
	}

	#[rstest]
	fn test_cycle_terminates() {
		let a = table("A", &["B"]);
		let b = table("B", &["A"]);
		let ordered = order(vec![&a, &b]);
		assert_eq!(ordered.len(), 2);
	}

	#[rstest]
	fn test_middle_table_after_both_endpoints() {
		let book_tag = table("BookTag", &["Book", "Tag"]);
		let tag = table("Tag", &[]);
		let book = table("Book", &["Author"]);
		let author = table("Author", &[]);

		let ordered = ids(&order(vec![&book_tag, &tag, &book, &author]));
		let position = |id: &str| ordered.iter().position(|t| *t == id).unwrap();
		assert!(position("Author") < position("Book"));
		assert!(position("Book") < position("BookTag"));
		assert!(position("Tag") < position("BookTag"));
	}

	#[rstest]
	fn test_reference_to_ancestor_follows_descendants() {
		let catalog = Schema::new(vec![
			table("Review", &["Person"]),
			table("Person", &[]),
			table("Editor", &[]).with_parent("Person"),
		])
		.unwrap();
		let tables = catalog.tables();

		let ordered = ids(&order_in(tables.iter().copied(), &catalog));
		let position = |id: &str| ordered.iter().position(|t| *t == id).unwrap();
		assert!(position("Person") < position("Review"));
		assert!(position("Editor") < position("Review"));

		assert_eq!(
			ids(&order(tables.iter().copied())),
			vec!["Person", "Review", "Editor"]
		);
	}
}
