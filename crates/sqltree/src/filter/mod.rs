//! Filter conditions parsed from `field__operator` keys.
//!
//! A key names a column and, after the grammar's separator, an operator:
//! `"age__ge"`, `"id__in"`, `"name"` (plain equality). Keys are resolved
//! against an explicit [`FilterGrammar`] when the filter is built, so unknown
//! operators and malformed operands fail before any SQL is emitted.
//!
//! ```ignore
//! use sqltree::{filters, FilterGrammar, FilterNode};
//!
//! let grammar = FilterGrammar::default();
//! let node = FilterNode::parse(&grammar, filters! {
//!     "name" => "Alice",
//!     "age__between" => [18, 65],
//! })?;
//! let (sql, values) = node.render().unwrap();
//! assert_eq!(sql, "name = ? OR (age between ? AND ?)");
//! ```

mod condition;
mod grammar;
mod node;

pub use condition::{FilterCondition, FilterValue};
pub use grammar::{FilterGrammar, FilterGrammarBuilder, Operator};
pub use node::{Conjunction, FilterNode, FilterScope};

#[cfg(test)]
mod tests;
