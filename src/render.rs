//! Plain-text output for the command-line tool.

use admin_lists::api::PaginationMeta;
use admin_lists::resources::{Record, Resource};
use admin_lists::tree::Tree;

/// Widest a table cell may get before it is truncated
const MAX_CELL: usize = 32;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Records as an aligned table with one column per field
pub fn table(columns: &[&str], rows: &[Record]) -> String {
  let cells: Vec<Vec<String>> = rows
    .iter()
    .map(|row| {
      columns
        .iter()
        .map(|column| truncate(&row.display(column), MAX_CELL))
        .collect()
    })
    .collect();

  let widths: Vec<usize> = columns
    .iter()
    .enumerate()
    .map(|(i, column)| {
      cells
        .iter()
        .map(|row| row[i].chars().count())
        .chain(std::iter::once(column.len()))
        .max()
        .unwrap_or_default()
    })
    .collect();

  let mut out = String::new();
  let header: Vec<String> = columns.iter().map(|c| c.to_uppercase()).collect();
  push_row(&mut out, &header, &widths);
  for row in &cells {
    push_row(&mut out, row, &widths);
  }
  out
}

fn push_row(out: &mut String, row: &[String], widths: &[usize]) {
  let line: Vec<String> = row
    .iter()
    .zip(widths)
    .map(|(cell, &width)| format!("{:<width$}", cell, width = width))
    .collect();
  out.push_str(line.join("  ").trim_end());
  out.push('\n');
}

pub fn pagination_summary(meta: &PaginationMeta) -> String {
  match (meta.from, meta.to) {
    (Some(from), Some(to)) if meta.total > 0 => format!(
      "Showing {}-{} of {} (page {}/{})",
      from, to, meta.total, meta.current_page, meta.last_page
    ),
    _ => "No results".to_string(),
  }
}

/// Indented outline of a record tree, labelled by `field`
pub fn outline(tree: &Tree<Record>, field: &str) -> String {
  let mut out = String::new();
  for node in tree.flatten() {
    out.push_str(&"  ".repeat(node.depth));
    out.push_str(&format!("{} (#{})\n", node.item.display(field), node.id));
  }
  out
}

pub fn resource_list(resources: &[Resource]) -> String {
  let width = resources.iter().map(|r| r.name.len()).max().unwrap_or_default();
  let mut out = String::new();
  for resource in resources {
    out.push_str(&format!(
      "{:<width$}  {}  [{}]\n",
      resource.name,
      resource.description,
      resource.aliases.join(", "),
      width = width
    ));
  }
  out
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(value: serde_json::Value) -> Record {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Zürich Großhandel", 9), "Zürich...");
  }

  #[test]
  fn test_table_alignment() {
    let rows = vec![
      record(json!({"id": 1, "name": "Ann"})),
      record(json!({"id": 12, "name": "Bartholomew"})),
    ];
    assert_eq!(
      table(&["id", "name"], &rows),
      "ID  NAME\n1   Ann\n12  Bartholomew\n"
    );
  }

  #[test]
  fn test_pagination_summary() {
    let mut meta = PaginationMeta::empty(10);
    assert_eq!(pagination_summary(&meta), "No results");

    meta.from = Some(11);
    meta.to = Some(20);
    meta.total = 47;
    meta.current_page = 2;
    meta.last_page = 5;
    assert_eq!(pagination_summary(&meta), "Showing 11-20 of 47 (page 2/5)");
  }

  #[test]
  fn test_outline() {
    let tree = Tree::build(
      vec![
        record(json!({"id": 1, "name": "Electronics"})),
        record(json!({"id": 2, "name": "Phones", "parent_id": 1})),
      ],
      |r: &Record| admin_lists::crud::Identifiable::item_id(r),
      Record::parent_id,
    )
    .unwrap();
    assert_eq!(outline(&tree, "name"), "Electronics (#1)\n  Phones (#2)\n");
  }
}
