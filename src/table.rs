/// JSON_TABLE: turn a row-pattern jsonpath plus NESTED/SIBLING sub-plans
/// into a relational row stream.
///
/// The executor state mirrors the plan tree. A path scan evaluates its
/// row pattern once per installed document (or per parent row, for nested
/// plans) and steps through the result sequence; nested plans OUTER-join
/// against the current parent row, and sibling joins concatenate left
/// rows before right rows. A scan's ordinal counts only its own rows and
/// restarts whenever its pattern is re-evaluated.
use std::rc::Rc;

use log::debug;
use serde_json::Value as Json;

use crate::error::Error;
use crate::item::{Item, ItemList};
use crate::path::PathExpr;
use crate::path::exec::execute;
use crate::query::{Wrapper, json_exists, json_query, json_value};
use crate::vars::BindingVars;

/// One output column of a scan node.
#[derive(Debug, Clone)]
pub struct TableColumn {
    pub name: String,
    pub kind: ColumnKind,
}

#[derive(Debug, Clone)]
pub enum ColumnKind {
    /// 1-based row counter of the owning scan.
    Ordinal,
    /// JSON_VALUE semantics: a single scalar.
    Value(PathExpr),
    /// JSON_QUERY semantics under the given wrapper.
    Query(PathExpr, Wrapper),
    /// JSON_EXISTS semantics: a boolean.
    Exists(PathExpr),
}

impl TableColumn {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        TableColumn {
            name: name.into(),
            kind,
        }
    }
}

/// The plan tree handed to [`TableExec::new`].
#[derive(Debug, Clone)]
pub enum TablePlan {
    PathScan {
        path: PathExpr,
        columns: Vec<TableColumn>,
        child: Option<Box<TablePlan>>,
        /// Raise row-pattern errors instead of yielding no rows.
        error_on_error: bool,
    },
    SiblingJoin {
        left: Box<TablePlan>,
        right: Box<TablePlan>,
    },
}

enum PlanState {
    Scan(ScanState),
    Join {
        left: Box<PlanState>,
        right: Box<PlanState>,
    },
}

struct ScanState {
    path: PathExpr,
    columns: Vec<TableColumn>,
    col_min: usize,
    col_max: usize,
    passing: Rc<BindingVars>,
    error_on_error: bool,
    /// Row-pattern results for the current document / parent row.
    found: Vec<Json>,
    next_row: usize,
    current: Option<Json>,
    ordinal: i64,
    nested: Option<Box<PlanState>>,
}

/// Column value returned by [`TableExec::get_value`]; `Null` is SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Null,
    Ordinal(i64),
    Json(Json),
    Bool(bool),
}

/// Executor for one JSON_TABLE invocation. Lifecycle: construct, then per
/// document `set_document` followed by `fetch_row`/`get_value` until
/// `fetch_row` returns false.
pub struct TableExec {
    root: PlanState,
    column_count: usize,
}

impl TableExec {
    /// Instantiate the plan tree; columns are numbered depth-first, scans
    /// before their nested children, join left before right.
    pub fn new(plan: &TablePlan, passing: BindingVars) -> TableExec {
        let passing = Rc::new(passing);
        let mut next_col = 0;
        let root = init_plan(plan, &passing, &mut next_col);
        TableExec {
            root,
            column_count: next_col,
        }
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn column_name(&self, colnum: usize) -> Option<&str> {
        find_scan(&self.root, colnum).map(|scan| scan.columns[colnum - scan.col_min].name.as_str())
    }

    /// Install a new input document: evaluate the root row pattern and
    /// reset every iterator and ordinal.
    pub fn set_document(&mut self, doc: &Json) -> Result<(), Error> {
        reset_plan(&mut self.root, doc)?;
        if let PlanState::Scan(scan) = &self.root {
            debug!("json_table: document installed, {} root rows", scan.found.len());
        }
        Ok(())
    }

    /// Advance to the next row. False when the stream is exhausted.
    pub fn fetch_row(&mut self) -> Result<bool, Error> {
        next_row(&mut self.root)
    }

    /// Value of column `colnum` for the current row.
    pub fn get_value(&self, colnum: usize) -> Result<ColumnValue, Error> {
        let Some(scan) = find_scan(&self.root, colnum) else {
            return Err(Error::Internal("column number out of range"));
        };
        let Some(row) = &scan.current else {
            // this scan produced no row for the current join tuple
            return Ok(ColumnValue::Null);
        };
        let silent = !scan.error_on_error;
        let column = &scan.columns[colnum - scan.col_min];
        match &column.kind {
            ColumnKind::Ordinal => Ok(ColumnValue::Ordinal(scan.ordinal)),
            ColumnKind::Value(path) => Ok(json_value(row, path, &scan.passing, silent)?
                .map_or(ColumnValue::Null, ColumnValue::Json)),
            ColumnKind::Query(path, wrapper) => {
                Ok(json_query(row, path, &scan.passing, *wrapper, silent)?
                    .map_or(ColumnValue::Null, ColumnValue::Json))
            }
            ColumnKind::Exists(path) => Ok(json_exists(row, path, &scan.passing, silent)?
                .map_or(ColumnValue::Null, ColumnValue::Bool)),
        }
    }
}

fn init_plan(plan: &TablePlan, passing: &Rc<BindingVars>, next_col: &mut usize) -> PlanState {
    match plan {
        TablePlan::PathScan {
            path,
            columns,
            child,
            error_on_error,
        } => {
            let col_min = *next_col;
            *next_col += columns.len();
            let col_max = *next_col;
            let nested = child
                .as_ref()
                .map(|c| Box::new(init_plan(c, passing, next_col)));
            PlanState::Scan(ScanState {
                path: path.clone(),
                columns: columns.clone(),
                col_min,
                col_max,
                passing: Rc::clone(passing),
                error_on_error: *error_on_error,
                found: Vec::new(),
                next_row: 0,
                current: None,
                ordinal: 0,
                nested,
            })
        }
        TablePlan::SiblingJoin { left, right } => PlanState::Join {
            left: Box::new(init_plan(left, passing, next_col)),
            right: Box::new(init_plan(right, passing, next_col)),
        },
    }
}

fn find_scan(state: &PlanState, colnum: usize) -> Option<&ScanState> {
    match state {
        PlanState::Scan(scan) => {
            if colnum >= scan.col_min && colnum < scan.col_max {
                return Some(scan);
            }
            scan.nested.as_deref().and_then(|n| find_scan(n, colnum))
        }
        PlanState::Join { left, right } => {
            find_scan(left, colnum).or_else(|| find_scan(right, colnum))
        }
    }
}

/// Re-evaluate a plan's row pattern against a new context item, resetting
/// its iterator, ordinal and current row.
fn reset_plan(state: &mut PlanState, doc: &Json) -> Result<(), Error> {
    match state {
        PlanState::Scan(scan) => reset_row_pattern(scan, doc),
        PlanState::Join { left, right } => {
            reset_plan(left, doc)?;
            reset_plan(right, doc)
        }
    }
}

fn reset_row_pattern(scan: &mut ScanState, doc: &Json) -> Result<(), Error> {
    let mut list = ItemList::new();
    let res = execute(
        &scan.path,
        doc,
        scan.passing.as_ref(),
        scan.error_on_error,
        Some(&mut list),
        true,
    )?;
    scan.found = if res.is_error() {
        Vec::new()
    } else {
        list.iter().map(Item::to_json).collect()
    };
    scan.next_row = 0;
    scan.current = None;
    scan.ordinal = 0;
    Ok(())
}

fn next_row(state: &mut PlanState) -> Result<bool, Error> {
    match state {
        PlanState::Scan(_) => scan_next_row(state),
        PlanState::Join { left, right } => {
            // all left rows, then all right rows
            if next_row(left)? {
                return Ok(true);
            }
            next_row(right)
        }
    }
}

fn scan_next_row(state: &mut PlanState) -> Result<bool, Error> {
    let PlanState::Scan(scan) = state else {
        return Err(Error::Internal("expected a path scan plan"));
    };

    // with an active row, try to advance the nested plan first: that is
    // the OUTER join over the current parent row
    if scan.current.is_some() {
        if let Some(nested) = &mut scan.nested {
            if next_row(nested)? {
                return Ok(true);
            }
        }
    }

    let Some(row) = scan.found.get(scan.next_row).cloned() else {
        scan.current = None;
        return Ok(false);
    };
    scan.next_row += 1;
    scan.ordinal += 1;
    scan.current = Some(row.clone());

    if let Some(nested) = &mut scan.nested {
        // re-evaluate the nested pattern against the new parent row and
        // prime its first row; an empty pattern still joins as NULLs
        reset_plan(nested, &row)?;
        next_row(nested)?;
    }

    Ok(true)
}
