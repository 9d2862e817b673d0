/// Public single-call operations over a document and a compiled path.
///
/// The `path_*` family takes bindings as an optional JSON object and a
/// `silent` flag; with `silent` set no recoverable error reaches the
/// caller, presenting as a null verdict or an empty result instead.
/// The `json_*` family is the SQL/JSON standard surface: typed binding
/// lists, timezone support enabled, and the wrapper/scalar disciplines of
/// JSON_QUERY and JSON_VALUE.
use serde_json::Value as Json;

use crate::error::Error;
use crate::item::{Item, ItemList};
use crate::path::PathExpr;
use crate::path::exec::{Outcome, execute};
use crate::vars::{BindingVars, JsonVars};

/// Result-wrapping behavior of [`json_query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Wrapper {
    /// Never wrap; more than one result item is an error.
    #[default]
    None,
    /// Wrap only when there is more than one result item.
    Conditional,
    /// Always wrap the results in an array.
    Unconditional,
}

/// Does the document match the path at least once? Returns None for the
/// Unknown verdict (a suppressed error).
pub fn path_exists(
    doc: &Json,
    path: &PathExpr,
    vars: Option<&Json>,
    silent: bool,
    use_tz: bool,
) -> Result<Option<bool>, Error> {
    let vars = JsonVars::new(vars)?;
    match execute(path, doc, &vars, !silent, None, use_tz)? {
        Outcome::Ok => Ok(Some(true)),
        Outcome::NotFound => Ok(Some(false)),
        Outcome::Error => Ok(None),
    }
}

/// Evaluate a predicate path expecting a single boolean result; null (or
/// a suppressed error, with `silent`) maps to None.
pub fn path_match(
    doc: &Json,
    path: &PathExpr,
    vars: Option<&Json>,
    silent: bool,
    use_tz: bool,
) -> Result<Option<bool>, Error> {
    let vars = JsonVars::new(vars)?;
    let mut found = ItemList::new();
    execute(path, doc, &vars, !silent, Some(&mut found), use_tz)?;

    if found.len() == 1 {
        match found.head() {
            Some(Item::Bool(b)) => return Ok(Some(*b)),
            Some(Item::Null) => return Ok(None),
            _ => {}
        }
    }

    if !silent {
        return Err(Error::SingleBooleanExpected);
    }
    Ok(None)
}

/// Evaluate the path and return every result item, in order.
pub fn path_query(
    doc: &Json,
    path: &PathExpr,
    vars: Option<&Json>,
    silent: bool,
    use_tz: bool,
) -> Result<Vec<Json>, Error> {
    let vars = JsonVars::new(vars)?;
    let mut found = ItemList::new();
    let res = execute(path, doc, &vars, !silent, Some(&mut found), use_tz)?;
    if res.is_error() {
        return Ok(Vec::new());
    }
    Ok(found.iter().map(Item::to_json).collect())
}

/// Like [`path_query`], wrapping the results in a JSON array; None when a
/// suppressed error occurred.
pub fn path_query_array(
    doc: &Json,
    path: &PathExpr,
    vars: Option<&Json>,
    silent: bool,
    use_tz: bool,
) -> Result<Option<Json>, Error> {
    let vars = JsonVars::new(vars)?;
    let mut found = ItemList::new();
    let res = execute(path, doc, &vars, !silent, Some(&mut found), use_tz)?;
    if res.is_error() {
        return Ok(None);
    }
    Ok(Some(Json::Array(found.iter().map(Item::to_json).collect())))
}

/// First result item, or None when there is none (or on a suppressed
/// error).
pub fn path_query_first(
    doc: &Json,
    path: &PathExpr,
    vars: Option<&Json>,
    silent: bool,
    use_tz: bool,
) -> Result<Option<Json>, Error> {
    let vars = JsonVars::new(vars)?;
    let mut found = ItemList::new();
    let res = execute(path, doc, &vars, !silent, Some(&mut found), use_tz)?;
    if res.is_error() {
        return Ok(None);
    }
    Ok(found.head().map(Item::to_json))
}

/// JSON_EXISTS: existence with typed bindings; timezone usage enabled.
pub fn json_exists(
    doc: &Json,
    path: &PathExpr,
    vars: &BindingVars,
    silent: bool,
) -> Result<Option<bool>, Error> {
    match execute(path, doc, vars, !silent, None, true)? {
        Outcome::Ok => Ok(Some(true)),
        Outcome::NotFound => Ok(Some(false)),
        Outcome::Error => Ok(None),
    }
}

/// JSON_QUERY: results under the requested wrapper discipline. None means
/// an empty result (or a suppressed error).
pub fn json_query(
    doc: &Json,
    path: &PathExpr,
    vars: &BindingVars,
    wrapper: Wrapper,
    silent: bool,
) -> Result<Option<Json>, Error> {
    let mut found = ItemList::new();
    let res = execute(path, doc, vars, !silent, Some(&mut found), true)?;
    if res.is_error() {
        return Ok(None);
    }

    let count = found.len();
    if count == 0 {
        return Ok(None);
    }
    let wrap = match wrapper {
        Wrapper::None => false,
        Wrapper::Unconditional => true,
        Wrapper::Conditional => count > 1,
    };
    if wrap {
        return Ok(Some(Json::Array(found.iter().map(Item::to_json).collect())));
    }

    if count > 1 {
        if silent {
            return Ok(None);
        }
        return Err(Error::MoreThanOneItem);
    }
    Ok(found.head().map(Item::to_json))
}

/// JSON_VALUE: a single scalar result; SQL null and empty results are both
/// None.
pub fn json_value(
    doc: &Json,
    path: &PathExpr,
    vars: &BindingVars,
    silent: bool,
) -> Result<Option<Json>, Error> {
    let mut found = ItemList::new();
    let res = execute(path, doc, vars, !silent, Some(&mut found), true)?;
    if res.is_error() {
        return Ok(None);
    }

    match found.len() {
        0 => Ok(None),
        1 => match found.head() {
            Some(Item::Binary(_)) => {
                if silent {
                    Ok(None)
                } else {
                    Err(Error::ScalarRequired)
                }
            }
            Some(Item::Null) | None => Ok(None),
            Some(item) => Ok(Some(item.to_json())),
        },
        _ => {
            if silent {
                Ok(None)
            } else {
                Err(Error::MoreThanOneItem)
            }
        }
    }
}
