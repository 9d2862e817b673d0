//! SQL/JSON path evaluation over JSON documents.
//!
//! The crate evaluates compiled jsonpath programs ([`path::PathExpr`])
//! against `serde_json` documents: a recursive walker with lax/strict
//! unwrapping, tri-valued predicates, arbitrary-precision arithmetic and
//! the cross-type datetime comparison ladder, plus the `JSON_TABLE` row
//! driver composed on top of it.
//!
//! Entry points: the `path_*` functions in [`query`] (existence, match,
//! query), the SQL/JSON standard forms (`json_exists`, `json_query`,
//! `json_value`), and [`table::TableExec`] for row streams.

pub mod datetime;
pub mod error;
pub mod item;
mod num;
pub mod path;
pub mod query;
pub mod table;
pub mod vars;

pub use datetime::{Datetime, DatetimeKind};
pub use error::{Error, ErrorCode};
pub use item::{Container, Item, ItemList};
pub use path::exec::{ExecResult, Outcome, Truth, execute, execute_with_cancel};
pub use path::{ArithOp, CmpOp, NodeKind, PathExpr, PathMode, PathNode, Subscript, UnaryOp};
pub use query::{
    Wrapper, json_exists, json_query, json_value, path_exists, path_match, path_query,
    path_query_array, path_query_first,
};
pub use table::{ColumnKind, ColumnValue, TableColumn, TableExec, TablePlan};
pub use vars::{Binding, BindingValue, BindingVars, JsonVars, NoVars, Variables};
