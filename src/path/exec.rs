/// The recursive jsonpath walker.
///
/// Evaluation runs in an [`ExecContext`] threaded through every function.
/// Each step takes one input item and produces a sequence of output items;
/// each output is fed to the step's `next` link, and when there is no next
/// the item lands in the caller's `found` list. When `found` is absent the
/// caller only wants an existence verdict and the walker stops at the
/// first hit, except in strict mode, which must enumerate fully so that
/// every error in the candidate set is observed.
///
/// Recoverable errors travel as [`Outcome::Error`] when errors are
/// suppressed and as `Err` when they are not; failures that no flag can
/// suppress (undefined variables, missing-timezone casts, depth and
/// cancellation trips) are always `Err`.
use std::borrow::Cow;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Mutex, OnceLock};

use bigdecimal::{BigDecimal, ToPrimitive};
use log::debug;
use regex::{Regex, RegexBuilder};
use serde_json::Value as Json;

use crate::datetime::{self, DatetimeKind};
use crate::error::Error;
use crate::item::{Container, Item, ItemList};
use crate::num;
use crate::path::compare::compare_items;
use crate::path::{ANY_UNBOUNDED, ArithOp, NodeKind, PathExpr, PathNode, Subscript, UnaryOp};
use crate::vars::Variables;

/// Walker nesting limit; generous for deeply nested documents while still
/// failing before the thread stack does.
const MAX_EXEC_DEPTH: u32 = 512;

/// Status of one evaluation: items found, nothing found, or a suppressed
/// recoverable error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    NotFound,
    Error,
}

impl Outcome {
    pub fn is_error(self) -> bool {
        self == Outcome::Error
    }
}

pub type ExecResult = Result<Outcome, Error>;

/// Kleene tri-valued truth. The derived order (False < Unknown < True)
/// makes AND the minimum and OR the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Truth {
    False,
    Unknown,
    True,
}

impl Truth {
    pub fn from_bool(b: bool) -> Truth {
        if b { Truth::True } else { Truth::False }
    }

    pub fn and(self, other: Truth) -> Truth {
        self.min(other)
    }

    pub fn or(self, other: Truth) -> Truth {
        self.max(other)
    }

    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }
}

/// Reborrow an optional result list for one more call.
fn reborrow<'x, 'a>(found: &'x mut Option<&mut ItemList<'a>>) -> Option<&'x mut ItemList<'a>> {
    found.as_mut().map(|list| &mut **list)
}

/// Evaluate a compiled path program against a document.
///
/// The document, the program, and the variable source must all outlive the
/// call; result items may borrow from any of them.
pub fn execute<'a>(
    path: &'a PathExpr,
    doc: &'a Json,
    vars: &'a dyn Variables,
    throw_errors: bool,
    found: Option<&mut ItemList<'a>>,
    use_tz: bool,
) -> ExecResult {
    execute_with_cancel(path, doc, vars, throw_errors, found, use_tz, None)
}

/// Like [`execute`], with a cooperative cancellation flag checked at every
/// recursion entry.
pub fn execute_with_cancel<'a>(
    path: &'a PathExpr,
    doc: &'a Json,
    vars: &'a dyn Variables,
    throw_errors: bool,
    found: Option<&mut ItemList<'a>>,
    use_tz: bool,
    cancel: Option<&'a AtomicBool>,
) -> ExecResult {
    let lax = path.is_lax();
    debug!(
        "executing jsonpath: mode={:?} throw_errors={} use_tz={}",
        path.mode, throw_errors, use_tz
    );

    let root = Item::from_json(doc);
    let mut cxt = ExecContext {
        vars,
        root: root.clone(),
        current: root.clone(),
        base_object_id: 0,
        last_generated_object_id: 1 + vars.count() as i64,
        container_offsets: HashMap::new(),
        next_container_offset: 0,
        innermost_array_size: -1,
        lax_mode: lax,
        ignore_structural_errors: lax,
        throw_errors,
        use_tz,
        depth: 0,
        cancel,
    };

    if cxt.strict_absence_of_errors() && found.is_none() {
        // strict existence must see the complete value list so that every
        // error is surfaced; emptiness downgrades to NotFound
        let mut vals = ItemList::new();
        let res = cxt.exec_item(&path.first, &root, Some(&mut vals))?;
        if res.is_error() {
            return Ok(res);
        }
        return Ok(if vals.is_empty() {
            Outcome::NotFound
        } else {
            Outcome::Ok
        });
    }

    cxt.exec_item(&path.first, &root, found)
}

pub(crate) struct ExecContext<'a> {
    vars: &'a dyn Variables,
    root: Item<'a>,
    current: Item<'a>,
    /// Base object id for `.keyvalue()`; 0 is the root document.
    base_object_id: i64,
    /// Next id handed to a generated object; starts past the variables.
    last_generated_object_id: i64,
    /// Synthetic byte offsets: each container gets an offset on first
    /// sight and reserves one slot per pair, which keeps every emitted
    /// `.keyvalue()` id distinct within the evaluation.
    container_offsets: HashMap<usize, i64>,
    next_container_offset: i64,
    /// Size of the array being subscripted, for `last`; −1 outside.
    innermost_array_size: i32,
    lax_mode: bool,
    ignore_structural_errors: bool,
    throw_errors: bool,
    use_tz: bool,
    depth: u32,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> ExecContext<'a> {
    fn auto_unwrap(&self) -> bool {
        self.lax_mode
    }

    fn auto_wrap(&self) -> bool {
        self.lax_mode
    }

    fn strict_absence_of_errors(&self) -> bool {
        !self.lax_mode
    }

    /// Raise or suppress a recoverable error depending on the context.
    fn recoverable(&self, err: Error) -> ExecResult {
        if self.throw_errors {
            Err(err)
        } else {
            Ok(Outcome::Error)
        }
    }

    fn check_limits(&self) -> Result<(), Error> {
        if self.depth >= MAX_EXEC_DEPTH {
            return Err(Error::StackDepthExceeded);
        }
        if let Some(flag) = self.cancel {
            if flag.load(AtomicOrdering::Relaxed) {
                return Err(Error::Canceled);
            }
        }
        Ok(())
    }

    /// Execute one step with automatic target unwrapping in lax mode.
    fn exec_item(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let unwrap = self.auto_unwrap();
        self.exec_item_target(node, input, found, unwrap)
    }

    fn exec_item_target(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
        unwrap: bool,
    ) -> ExecResult {
        self.check_limits()?;
        self.depth += 1;
        let res = self.dispatch(node, input, found, unwrap);
        self.depth -= 1;
        res
    }

    /// The main dispatch: one path item against one input item.
    fn dispatch(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        mut found: Option<&mut ItemList<'a>>,
        unwrap: bool,
    ) -> ExecResult {
        let next = node.next_step();
        match &node.kind {
            NodeKind::Null
            | NodeKind::Bool(_)
            | NodeKind::Numeric(_)
            | NodeKind::String(_)
            | NodeKind::Variable(_) => {
                // literal chain tails can be skipped in existence mode;
                // variables still resolve so a missing one fails
                if next.is_none()
                    && found.is_none()
                    && !matches!(node.kind, NodeKind::Variable(_))
                {
                    return Ok(Outcome::Ok);
                }
                let saved_base = self.base_object_id;
                let v = self.item_from_node(node)?;
                let res = self.exec_next(next, v, reborrow(&mut found));
                self.base_object_id = saved_base;
                res
            }

            NodeKind::And(..)
            | NodeKind::Or(..)
            | NodeKind::Not(..)
            | NodeKind::IsUnknown(..)
            | NodeKind::Compare(..)
            | NodeKind::StartsWith(..)
            | NodeKind::LikeRegex { .. }
            | NodeKind::Exists(..) => {
                let st = self.exec_bool(node, input, true)?;
                self.append_bool_result(node, found, st)
            }

            NodeKind::Arith(op, l, r) => {
                self.exec_binary_arith(node, *op, l, r, input, found)
            }
            NodeKind::Unary(op, arg) => self.exec_unary_arith(node, *op, arg, input, found),

            NodeKind::AnyArray => match input {
                Item::Binary(c) if c.is_array() => {
                    let unwrap_elements = self.auto_unwrap();
                    self.exec_any(next, c, found, 1, 1, 1, false, unwrap_elements)
                }
                _ if self.auto_wrap() => self.exec_next(next, input.clone(), found),
                _ if !self.ignore_structural_errors => {
                    self.recoverable(Error::WildcardArrayNotArray)
                }
                _ => Ok(Outcome::NotFound),
            },

            NodeKind::AnyKey => match input {
                Item::Binary(c) if c.is_object() => {
                    let unwrap_next = self.auto_unwrap();
                    self.exec_any(next, c, found, 1, 1, 1, false, unwrap_next)
                }
                Item::Binary(c) if unwrap && c.is_array() => {
                    self.exec_unwrap_array(Some(node), c, found, false)
                }
                _ if !self.ignore_structural_errors => {
                    self.recoverable(Error::WildcardMemberNotObject)
                }
                _ => Ok(Outcome::NotFound),
            },

            NodeKind::IndexArray(subs) => {
                if input.is_array() || self.auto_wrap() {
                    let saved = self.innermost_array_size;
                    let res = self.exec_index_array(next, subs, input, found);
                    self.innermost_array_size = saved;
                    res
                } else if !self.ignore_structural_errors {
                    self.recoverable(Error::ArrayAccessorNotArray)
                } else {
                    Ok(Outcome::NotFound)
                }
            }

            NodeKind::Any { first, last } => {
                let mut res = Outcome::NotFound;
                if *first == 0 {
                    // try the input itself, with zero intermediate steps;
                    // structural errors are ignored while descending
                    let saved = self.ignore_structural_errors;
                    self.ignore_structural_errors = true;
                    let r = self.exec_next(next, input.clone(), reborrow(&mut found));
                    self.ignore_structural_errors = saved;
                    res = r?;
                    if res == Outcome::Ok && found.is_none() {
                        return Ok(res);
                    }
                }
                if let Item::Binary(c) = input {
                    res = self.exec_any(next, c, found, 1, *first, *last, true, self.auto_unwrap())?;
                }
                Ok(res)
            }

            NodeKind::Key(name) => match input {
                Item::Binary(c) if c.is_object() => match c.member(name) {
                    Some(v) => self.exec_next(next, v, found),
                    None if !self.ignore_structural_errors => {
                        self.recoverable(Error::KeyNotFound(name.clone()))
                    }
                    None => Ok(Outcome::NotFound),
                },
                Item::Binary(c) if unwrap && c.is_array() => {
                    self.exec_unwrap_array(Some(node), c, found, false)
                }
                _ if !self.ignore_structural_errors => self.recoverable(Error::MemberNotObject),
                _ => Ok(Outcome::NotFound),
            },

            NodeKind::Current => {
                let v = self.current.clone();
                self.exec_next(next, v, found)
            }

            NodeKind::Root => {
                let saved_base = self.base_object_id;
                self.base_object_id = 0;
                let v = self.root.clone();
                let res = self.exec_next(next, v, found);
                self.base_object_id = saved_base;
                res
            }

            NodeKind::Filter(pred) => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                let st = self.exec_nested_bool(pred, input)?;
                if st != Truth::True {
                    Ok(Outcome::NotFound)
                } else {
                    self.exec_next(next, input.clone(), found)
                }
            }

            NodeKind::Type => {
                let v = Item::String(Cow::Borrowed(input.type_name()));
                self.exec_next(next, v, found)
            }

            NodeKind::Size => {
                let size = match input.array_len() {
                    Some(n) => n as i64,
                    None => {
                        if !self.auto_wrap() {
                            if !self.ignore_structural_errors {
                                return self.recoverable(Error::SizeNotArray);
                            }
                            return Ok(Outcome::NotFound);
                        }
                        1
                    }
                };
                self.exec_next(next, Item::Number(BigDecimal::from(size)), found)
            }

            NodeKind::Abs => self.exec_numeric_method(node, input, found, unwrap, "abs", num::abs),
            NodeKind::Floor => {
                self.exec_numeric_method(node, input, found, unwrap, "floor", num::floor)
            }
            NodeKind::Ceiling => {
                self.exec_numeric_method(node, input, found, unwrap, "ceiling", num::ceiling)
            }

            NodeKind::Double => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                let value = match input {
                    Item::Number(d) => {
                        let f = num::decimal_to_f64(d).unwrap_or(f64::INFINITY);
                        if !f.is_finite() {
                            return self.recoverable(Error::NanOrInfinity { method: "double" });
                        }
                        f
                    }
                    Item::String(s) => {
                        let Ok(f) = s.trim().parse::<f64>() else {
                            return self.recoverable(Error::InvalidArgumentForType {
                                method: "double",
                                ty: "double precision",
                                arg: s.to_string(),
                            });
                        };
                        if !f.is_finite() {
                            return self.recoverable(Error::NanOrInfinity { method: "double" });
                        }
                        f
                    }
                    _ => {
                        return self.recoverable(Error::MethodTypeMismatch {
                            method: "double",
                            expected: "a string or numeric value",
                        });
                    }
                };
                let Some(d) = num::decimal_from_f64(value) else {
                    return self.recoverable(Error::NanOrInfinity { method: "double" });
                };
                self.exec_next(next, Item::Number(d), found)
            }

            NodeKind::DatetimeFunc(_)
            | NodeKind::Date
            | NodeKind::Time(_)
            | NodeKind::TimeTz(_)
            | NodeKind::Timestamp(_)
            | NodeKind::TimestampTz(_) => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                self.exec_datetime_method(node, input, found)
            }

            NodeKind::KeyValue => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                self.exec_keyvalue(node, input, found)
            }

            NodeKind::Last => {
                if self.innermost_array_size < 0 {
                    return Err(Error::Internal(
                        "LAST is allowed only inside array subscripts",
                    ));
                }
                if next.is_none() && found.is_none() {
                    return Ok(Outcome::Ok);
                }
                let last = self.innermost_array_size as i64 - 1;
                self.exec_next(next, Item::Number(BigDecimal::from(last)), found)
            }

            NodeKind::Integer => self.exec_integer_method(node, input, found, unwrap, false),
            NodeKind::Bigint => self.exec_integer_method(node, input, found, unwrap, true),

            NodeKind::BooleanFunc => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                let b = match input {
                    Item::Bool(b) => *b,
                    Item::Number(d) => {
                        // the canonical rendering through a strict integer
                        // parse rejects non-integral numerics
                        match d.to_string().parse::<i32>() {
                            Ok(i) => i != 0,
                            Err(_) => {
                                return self.recoverable(Error::InvalidArgumentForType {
                                    method: "boolean",
                                    ty: "boolean",
                                    arg: d.to_string(),
                                });
                            }
                        }
                    }
                    Item::String(s) => match parse_bool(s) {
                        Some(b) => b,
                        None => {
                            return self.recoverable(Error::InvalidArgumentForType {
                                method: "boolean",
                                ty: "boolean",
                                arg: s.to_string(),
                            });
                        }
                    },
                    _ => {
                        return self.recoverable(Error::MethodTypeMismatch {
                            method: "boolean",
                            expected: "a boolean, string, or numeric value",
                        });
                    }
                };
                self.exec_next(next, Item::Bool(b), found)
            }

            NodeKind::NumberFunc | NodeKind::Decimal { .. } => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                let method = match node.kind {
                    NodeKind::Decimal { .. } => "decimal",
                    _ => "number",
                };
                let d = match input {
                    // a decimal has no NaN or Infinity form, so numeric
                    // inputs need no rejection here
                    Item::Number(d) => d.clone(),
                    Item::String(s) => match BigDecimal::from_str(s.trim()) {
                        Ok(d) => d,
                        Err(_) => {
                            return self.recoverable(Error::InvalidArgumentForType {
                                method,
                                ty: "numeric",
                                arg: s.to_string(),
                            });
                        }
                    },
                    _ => {
                        return self.recoverable(Error::MethodTypeMismatch {
                            method,
                            expected: "a string or numeric value",
                        });
                    }
                };
                let d = if let NodeKind::Decimal {
                    precision: Some(p),
                    scale,
                } = &node.kind
                {
                    match num::apply_typmod(&d, *p, scale.unwrap_or(0)) {
                        Ok(d) => d,
                        Err(()) => {
                            return self.recoverable(Error::InvalidArgumentForType {
                                method: "decimal",
                                ty: "numeric",
                                arg: d.to_string(),
                            });
                        }
                    }
                } else {
                    d
                };
                self.exec_next(next, Item::Number(d), found)
            }

            NodeKind::StringFunc => {
                if let Item::Binary(c) = input {
                    if unwrap && c.is_array() {
                        return self.exec_unwrap_array(Some(node), c, found, false);
                    }
                }
                let s = match input {
                    Item::String(s) => s.to_string(),
                    Item::Number(d) => d.to_string(),
                    Item::Bool(b) => if *b { "true" } else { "false" }.to_string(),
                    Item::Datetime(dt) => dt.encode(),
                    _ => {
                        return self.recoverable(Error::MethodTypeMismatch {
                            method: "string",
                            expected: "a boolean, string, numeric, or datetime value",
                        });
                    }
                };
                self.exec_next(next, Item::String(Cow::Owned(s)), found)
            }
        }
    }

    /// Resolve a literal or variable node into an item. Variables update
    /// the base object; the caller restores it.
    fn item_from_node(&mut self, node: &'a PathNode) -> Result<Item<'a>, Error> {
        match &node.kind {
            NodeKind::Null => Ok(Item::Null),
            NodeKind::Bool(b) => Ok(Item::Bool(*b)),
            NodeKind::Numeric(d) => Ok(Item::Number(d.clone())),
            NodeKind::String(s) => Ok(Item::String(Cow::Borrowed(s.as_str()))),
            NodeKind::Variable(name) => {
                let var = self
                    .vars
                    .lookup(name)
                    .ok_or_else(|| Error::UndefinedVariable(name.clone()))?;
                if var.base_id > 0 {
                    self.base_object_id = var.base_id;
                }
                Ok(var.value)
            }
            _ => Err(Error::Internal("expected a literal path item")),
        }
    }

    /// Run the next step if there is one, otherwise deliver the item.
    fn exec_next(
        &mut self,
        next: Option<&'a PathNode>,
        v: Item<'a>,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        match next {
            Some(n) => self.exec_item(n, &v, found),
            None => {
                if let Some(list) = found {
                    list.append(v);
                }
                Ok(Outcome::Ok)
            }
        }
    }

    /// Re-apply `node` to every element of an array (or, with `node`
    /// absent, spill the elements into `found`).
    fn exec_unwrap_array(
        &mut self,
        node: Option<&'a PathNode>,
        c: &Container<'a>,
        found: Option<&mut ItemList<'a>>,
        unwrap_elements: bool,
    ) -> ExecResult {
        self.exec_any(node, c, found, 1, 1, 1, false, unwrap_elements)
    }

    /// Result-side unwrapping: evaluate a sub-program, then in lax mode
    /// flatten any array results one level. This is a separate layer from
    /// target unwrapping; it applies to operands, not accessors.
    fn exec_item_result(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        unwrap: bool,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        match found {
            Some(list) if unwrap && self.auto_unwrap() => {
                let mut seq = ItemList::new();
                let res = self.exec_item(node, input, Some(&mut seq))?;
                if res.is_error() {
                    return Ok(res);
                }
                for item in seq.into_vec() {
                    match &item {
                        Item::Binary(c) if c.is_array() => {
                            self.exec_unwrap_array(None, c, Some(&mut *list), false)?;
                        }
                        _ => list.append(item),
                    }
                }
                Ok(Outcome::Ok)
            }
            other => self.exec_item(node, input, other),
        }
    }

    /// Same with error suppression: predicate operands never throw.
    fn exec_item_result_silent(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        unwrap: bool,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let saved = self.throw_errors;
        self.throw_errors = false;
        let res = self.exec_item_result(node, input, unwrap, found);
        self.throw_errors = saved;
        res
    }

    /// Evaluate a boolean-valued path item.
    fn exec_bool(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        can_have_next: bool,
    ) -> Result<Truth, Error> {
        self.check_limits()?;
        self.depth += 1;
        let res = self.exec_bool_inner(node, input, can_have_next);
        self.depth -= 1;
        res
    }

    fn exec_bool_inner(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        can_have_next: bool,
    ) -> Result<Truth, Error> {
        if !can_have_next && node.next.is_some() {
            return Err(Error::Internal("boolean jsonpath item cannot have next item"));
        }
        match &node.kind {
            NodeKind::And(l, r) => {
                let lres = self.exec_bool(l, input, false)?;
                if lres == Truth::False {
                    return Ok(Truth::False);
                }
                // an Unknown left side still evaluates the right side
                let rres = self.exec_bool(r, input, false)?;
                Ok(lres.and(rres))
            }
            NodeKind::Or(l, r) => {
                let lres = self.exec_bool(l, input, false)?;
                if lres == Truth::True {
                    return Ok(Truth::True);
                }
                let rres = self.exec_bool(r, input, false)?;
                Ok(lres.or(rres))
            }
            NodeKind::Not(arg) => Ok(self.exec_bool(arg, input, false)?.not()),
            NodeKind::IsUnknown(arg) => {
                let res = self.exec_bool(arg, input, false)?;
                Ok(Truth::from_bool(res == Truth::Unknown))
            }

            NodeKind::Compare(op, l, r) => {
                let op = *op;
                let tz = self.use_tz;
                self.exec_predicate(l, Some(r), input, true, &mut |lv, rv| {
                    let Some(rv) = rv else {
                        return Err(Error::Internal("comparison without right operand"));
                    };
                    compare_items(op, lv, rv, tz)
                })
            }

            NodeKind::StartsWith(whole, prefix) => {
                self.exec_predicate(whole, Some(prefix), input, false, &mut |lv, rv| {
                    let Some(rv) = rv else {
                        return Err(Error::Internal("starts with without right operand"));
                    };
                    Ok(match (lv.as_str(), rv.as_str()) {
                        (Some(w), Some(p)) => {
                            Truth::from_bool(w.as_bytes().starts_with(p.as_bytes()))
                        }
                        _ => Truth::Unknown,
                    })
                })
            }

            NodeKind::LikeRegex {
                expr,
                pattern,
                flags,
            } => self.exec_predicate(expr, None, input, false, &mut |lv, _| {
                let Some(s) = lv.as_str() else {
                    return Ok(Truth::Unknown);
                };
                let re = cached_regex(pattern, flags)?;
                Ok(Truth::from_bool(re.is_match(s)))
            }),

            NodeKind::Exists(arg) => {
                if self.strict_absence_of_errors() {
                    // full enumeration, so any error downgrades to Unknown
                    let mut vals = ItemList::new();
                    let res = self.exec_item_result_silent(arg, input, false, Some(&mut vals))?;
                    if res.is_error() {
                        return Ok(Truth::Unknown);
                    }
                    Ok(Truth::from_bool(!vals.is_empty()))
                } else {
                    let res = self.exec_item_result_silent(arg, input, false, None)?;
                    Ok(match res {
                        Outcome::Ok => Truth::True,
                        Outcome::NotFound => Truth::False,
                        Outcome::Error => Truth::Unknown,
                    })
                }
            }

            _ => Err(Error::Internal("invalid boolean jsonpath item type")),
        }
    }

    /// Evaluate a filter predicate with `@` rebound to the filtered item.
    fn exec_nested_bool(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
    ) -> Result<Truth, Error> {
        let saved = std::mem::replace(&mut self.current, input.clone());
        let res = self.exec_bool(node, input, false);
        self.current = saved;
        res
    }

    /// Existence semantics over the cross product of the operand
    /// sequences: True on any satisfying pair. Lax mode returns on the
    /// first True; strict mode examines every pair so errors are seen.
    fn exec_predicate(
        &mut self,
        larg: &'a PathNode,
        rarg: Option<&'a PathNode>,
        input: &Item<'a>,
        unwrap_right: bool,
        pred: &mut dyn FnMut(&Item<'a>, Option<&Item<'a>>) -> Result<Truth, Error>,
    ) -> Result<Truth, Error> {
        let mut lseq = ItemList::new();
        // the left operand is always unwrapped
        let res = self.exec_item_result_silent(larg, input, true, Some(&mut lseq))?;
        if res.is_error() {
            return Ok(Truth::Unknown);
        }

        let mut rseq = ItemList::new();
        if let Some(r) = rarg {
            let res = self.exec_item_result_silent(r, input, unwrap_right, Some(&mut rseq))?;
            if res.is_error() {
                return Ok(Truth::Unknown);
            }
        }

        let rvals: Vec<Option<&Item<'a>>> = match rarg {
            Some(_) => rseq.iter().map(Some).collect(),
            None => vec![None],
        };

        let mut error = false;
        let mut found_true = false;
        for lval in lseq.iter() {
            for rval in &rvals {
                match pred(lval, *rval)? {
                    Truth::Unknown => {
                        if self.strict_absence_of_errors() {
                            return Ok(Truth::Unknown);
                        }
                        error = true;
                    }
                    Truth::True => {
                        if !self.strict_absence_of_errors() {
                            return Ok(Truth::True);
                        }
                        found_true = true;
                    }
                    Truth::False => {}
                }
            }
        }

        if found_true {
            return Ok(Truth::True);
        }
        if error {
            return Ok(Truth::Unknown);
        }
        Ok(Truth::False)
    }

    /// `.*`, `[*]` and `.**`: walk a container's children depth-first in
    /// stored order, applying `node` (or delivering the child) inside the
    /// `[first, last]` depth band.
    #[allow(clippy::too_many_arguments)]
    fn exec_any(
        &mut self,
        node: Option<&'a PathNode>,
        c: &Container<'a>,
        found: Option<&mut ItemList<'a>>,
        level: u32,
        first: u32,
        last: u32,
        ignore_structural: bool,
        unwrap_next: bool,
    ) -> ExecResult {
        self.check_limits()?;
        self.depth += 1;
        let res = self.exec_any_inner(
            node,
            c,
            found,
            level,
            first,
            last,
            ignore_structural,
            unwrap_next,
        );
        self.depth -= 1;
        res
    }

    #[allow(clippy::too_many_arguments)]
    fn exec_any_inner(
        &mut self,
        node: Option<&'a PathNode>,
        c: &Container<'a>,
        mut found: Option<&mut ItemList<'a>>,
        level: u32,
        first: u32,
        last: u32,
        ignore_structural: bool,
        unwrap_next: bool,
    ) -> ExecResult {
        let mut res = Outcome::NotFound;
        if level > last {
            return Ok(res);
        }

        for child in c.children() {
            let deeper = if level < last {
                match &child {
                    Item::Binary(cc) => Some(cc.clone()),
                    _ => None,
                }
            } else {
                None
            };

            let is_leaf = !matches!(child, Item::Binary(_));
            let in_band = level >= first
                || (first == ANY_UNBOUNDED && last == ANY_UNBOUNDED && is_leaf);
            if in_band {
                match node {
                    Some(n) => {
                        let r = if ignore_structural {
                            let saved = self.ignore_structural_errors;
                            self.ignore_structural_errors = true;
                            let r = self.exec_item_target(
                                n,
                                &child,
                                reborrow(&mut found),
                                unwrap_next,
                            );
                            self.ignore_structural_errors = saved;
                            r?
                        } else {
                            self.exec_item_target(n, &child, reborrow(&mut found), unwrap_next)?
                        };
                        res = r;
                        if res == Outcome::Error {
                            return Ok(res);
                        }
                        if res == Outcome::Ok && found.is_none() {
                            return Ok(res);
                        }
                    }
                    None => match &mut found {
                        Some(list) => list.append(child.clone()),
                        None => return Ok(Outcome::Ok),
                    },
                }
            }

            if let Some(cc) = deeper {
                let r = self.exec_any(
                    node,
                    &cc,
                    reborrow(&mut found),
                    level + 1,
                    first,
                    last,
                    ignore_structural,
                    unwrap_next,
                )?;
                res = r;
                if res == Outcome::Error {
                    return Ok(res);
                }
                if res == Outcome::Ok && found.is_none() {
                    return Ok(res);
                }
            }
        }

        Ok(res)
    }

    fn exec_index_array(
        &mut self,
        next: Option<&'a PathNode>,
        subs: &'a [Subscript],
        input: &Item<'a>,
        mut found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let (size, singleton) = match input.array_len() {
            Some(n) => (n as i32, false),
            None => (1, true), // auto-wrapped non-array
        };
        self.innermost_array_size = size; // for LAST

        let mut res = Outcome::NotFound;
        for sub in subs {
            let index_from = match self.array_index(&sub.from, input)? {
                Ok(i) => i,
                Err(o) => return Ok(o),
            };
            let index_to = match &sub.to {
                Some(to) => match self.array_index(to, input)? {
                    Ok(i) => i,
                    Err(o) => return Ok(o),
                },
                None => index_from,
            };

            if !self.ignore_structural_errors
                && (index_from < 0 || index_from > index_to || index_to >= size)
            {
                return self.recoverable(Error::SubscriptOutOfBounds);
            }

            let from = index_from.max(0);
            let to = index_to.min(size - 1);
            res = Outcome::NotFound;

            for index in from..=to {
                let v = if singleton {
                    input.clone()
                } else {
                    let Item::Binary(c) = input else {
                        return Err(Error::Internal("array item is not a container"));
                    };
                    match c.element(index as usize) {
                        Some(v) => v,
                        None => continue,
                    }
                };

                if next.is_none() && found.is_none() {
                    return Ok(Outcome::Ok);
                }

                res = self.exec_next(next, v, reborrow(&mut found))?;
                if res == Outcome::Error {
                    return Ok(res);
                }
                if res == Outcome::Ok && found.is_none() {
                    return Ok(res);
                }
            }
        }

        Ok(res)
    }

    /// Evaluate one subscript bound: a singleton numeric, truncated toward
    /// zero, range-checked to a 32-bit index.
    fn array_index(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
    ) -> Result<Result<i32, Outcome>, Error> {
        let mut seq = ItemList::new();
        let res = self.exec_item(node, input, Some(&mut seq))?;
        if res.is_error() {
            return Ok(Err(res));
        }

        let scalar = if seq.len() == 1 {
            seq.head().and_then(|i| i.as_number())
        } else {
            None
        };
        let Some(d) = scalar else {
            let o = self.recoverable(Error::SubscriptNotNumeric)?;
            return Ok(Err(o));
        };

        match num::trunc(d).to_i32() {
            Some(i) => Ok(Ok(i)),
            None => {
                let o = self.recoverable(Error::SubscriptOutOfRange)?;
                Ok(Err(o))
            }
        }
    }

    fn exec_binary_arith(
        &mut self,
        node: &'a PathNode,
        op: ArithOp,
        lnode: &'a PathNode,
        rnode: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        // operands of every binary operator unwrap, not just the
        // multiplicative ones
        let mut lseq = ItemList::new();
        let res = self.exec_item_result(lnode, input, true, Some(&mut lseq))?;
        if res.is_error() {
            return Ok(res);
        }
        let mut rseq = ItemList::new();
        let res = self.exec_item_result(rnode, input, true, Some(&mut rseq))?;
        if res.is_error() {
            return Ok(res);
        }

        let lval = match (lseq.len(), lseq.head().and_then(|i| i.as_number())) {
            (1, Some(d)) => d,
            _ => {
                return self.recoverable(Error::ArithOperandNotNumeric {
                    op: op.name(),
                    side: "left",
                });
            }
        };
        let rval = match (rseq.len(), rseq.head().and_then(|i| i.as_number())) {
            (1, Some(d)) => d,
            _ => {
                return self.recoverable(Error::ArithOperandNotNumeric {
                    op: op.name(),
                    side: "right",
                });
            }
        };

        let func: num::ArithFn = match op {
            ArithOp::Add => num::add,
            ArithOp::Sub => num::sub,
            ArithOp::Mul => num::mul,
            ArithOp::Div => num::div,
            ArithOp::Mod => num::rem,
        };
        let result = match func(lval, rval) {
            Ok(d) => d,
            Err(e) => return self.recoverable(e),
        };

        let next = node.next_step();
        if next.is_none() && found.is_none() {
            return Ok(Outcome::Ok);
        }
        self.exec_next(next, Item::Number(result), found)
    }

    /// Unary arithmetic applies to every numeric item of the operand
    /// sequence; a non-numeric item is an error unless the caller only
    /// wants existence.
    fn exec_unary_arith(
        &mut self,
        node: &'a PathNode,
        op: UnaryOp,
        arg: &'a PathNode,
        input: &Item<'a>,
        mut found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let mut seq = ItemList::new();
        let res = self.exec_item_result(arg, input, true, Some(&mut seq))?;
        if res.is_error() {
            return Ok(res);
        }

        let next = node.next_step();
        let has_next = next.is_some();
        let mut res = Outcome::NotFound;

        for val in seq.into_vec() {
            match val {
                Item::Number(d) => {
                    if found.is_none() && !has_next {
                        return Ok(Outcome::Ok);
                    }
                    let d = match op {
                        UnaryOp::Plus => d,
                        UnaryOp::Minus => -d,
                    };
                    let r = self.exec_next(next, Item::Number(d), reborrow(&mut found))?;
                    if r == Outcome::Error {
                        return Ok(r);
                    }
                    if r == Outcome::Ok {
                        if found.is_none() {
                            return Ok(r);
                        }
                        res = Outcome::Ok;
                    }
                }
                _ => {
                    if found.is_none() && !has_next {
                        continue; // skip non-numerics in existence mode
                    }
                    return self.recoverable(Error::UnaryOperandNotNumeric { op: op.name() });
                }
            }
        }

        Ok(res)
    }

    fn exec_numeric_method(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
        unwrap: bool,
        method: &'static str,
        f: fn(&BigDecimal) -> BigDecimal,
    ) -> ExecResult {
        if let Item::Binary(c) = input {
            if unwrap && c.is_array() {
                return self.exec_unwrap_array(Some(node), c, found, false);
            }
        }
        let Some(d) = input.as_number() else {
            return self.recoverable(Error::MethodTypeMismatch {
                method,
                expected: "a numeric value",
            });
        };
        self.exec_next(node.next_step(), Item::Number(f(d)), found)
    }

    fn exec_integer_method(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
        unwrap: bool,
        want_i64: bool,
    ) -> ExecResult {
        if let Item::Binary(c) = input {
            if unwrap && c.is_array() {
                return self.exec_unwrap_array(Some(node), c, found, false);
            }
        }
        let (method, ty) = if want_i64 {
            ("bigint", "bigint")
        } else {
            ("integer", "integer")
        };
        let value: i64 = match input {
            Item::Number(d) => {
                let v = if want_i64 {
                    num::to_i64_rounded(d)
                } else {
                    num::to_i32_rounded(d).map(i64::from)
                };
                match v {
                    Some(v) => v,
                    None => {
                        return self.recoverable(Error::InvalidArgumentForType {
                            method,
                            ty,
                            arg: d.to_string(),
                        });
                    }
                }
            }
            Item::String(s) => {
                let v = if want_i64 {
                    s.trim().parse::<i64>().ok()
                } else {
                    s.trim().parse::<i32>().ok().map(i64::from)
                };
                match v {
                    Some(v) => v,
                    None => {
                        return self.recoverable(Error::InvalidArgumentForType {
                            method,
                            ty,
                            arg: s.to_string(),
                        });
                    }
                }
            }
            _ => {
                return self.recoverable(Error::MethodTypeMismatch {
                    method,
                    expected: "a string or numeric value",
                });
            }
        };
        self.exec_next(node.next_step(), Item::Number(BigDecimal::from(value)), found)
    }

    /// `.datetime()` and the typed shorthands: parse the input string,
    /// then cast to the asked-for kind and apply any precision.
    fn exec_datetime_method(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let (method, target, precision) = match &node.kind {
            NodeKind::DatetimeFunc(_) => ("datetime", None, None),
            NodeKind::Date => ("date", Some(DatetimeKind::Date), None),
            NodeKind::Time(p) => ("time", Some(DatetimeKind::Time), *p),
            NodeKind::TimeTz(p) => ("time_tz", Some(DatetimeKind::TimeTz), *p),
            NodeKind::Timestamp(p) => ("timestamp", Some(DatetimeKind::Timestamp), *p),
            NodeKind::TimestampTz(p) => ("timestamp_tz", Some(DatetimeKind::TimestampTz), *p),
            _ => return Err(Error::Internal("expected a datetime method")),
        };

        let Some(s) = input.as_str() else {
            return self.recoverable(Error::DatetimeNotString { method });
        };

        let parsed = match &node.kind {
            NodeKind::DatetimeFunc(Some(template)) => datetime::parse_with_template(template, s),
            _ => datetime::parse_iso(s),
        };
        let Some(value) = parsed else {
            return self.recoverable(Error::DatetimeFormatNotRecognized {
                method,
                arg: s.to_string(),
            });
        };

        let value = match target {
            Some(kind) => match datetime::cast_to_kind(value, kind, self.use_tz)? {
                Some(v) => v,
                None => {
                    return self.recoverable(Error::DatetimeFormatNotRecognized {
                        method,
                        arg: s.to_string(),
                    });
                }
            },
            None => value,
        };
        let value = match precision {
            Some(p) => datetime::adjust_precision(value, p),
            None => value,
        };

        self.exec_next(node.next_step(), Item::Datetime(value), found)
    }

    /// `.keyvalue()`: emit `{"key": K, "value": V, "id": I}` per pair, in
    /// stored order. Each emitted object becomes the base object for its
    /// own down-chain, under a freshly generated id.
    fn exec_keyvalue(
        &mut self,
        node: &'a PathNode,
        input: &Item<'a>,
        mut found: Option<&mut ItemList<'a>>,
    ) -> ExecResult {
        let c = match input {
            Item::Binary(c) if c.is_object() => c,
            _ => return self.recoverable(Error::KeyValueNotObject),
        };
        if c.is_empty() {
            return Ok(Outcome::NotFound);
        }

        let next = node.next_step();
        let has_next = next.is_some();
        let base_offset = self.container_offset(c);

        let mut res = Outcome::NotFound;
        for (idx, (key, value)) in c.entries().into_iter().enumerate() {
            res = Outcome::Ok;
            if !has_next && found.is_none() {
                break;
            }

            let id = self.base_object_id * 10_000_000_000 + base_offset + idx as i64;
            let mut obj = serde_json::Map::new();
            obj.insert("key".to_string(), Json::String(key.into_owned()));
            obj.insert("value".to_string(), value.to_json());
            obj.insert("id".to_string(), Json::Number(serde_json::Number::from(id)));
            let pair = Item::from_owned_json(Json::Object(obj));

            let saved_base = self.base_object_id;
            self.base_object_id = self.last_generated_object_id;
            self.last_generated_object_id += 1;
            let r = self.exec_next(next, pair, reborrow(&mut found));
            self.base_object_id = saved_base;

            res = r?;
            if res == Outcome::Error {
                return Ok(res);
            }
            if res == Outcome::Ok && found.is_none() {
                break;
            }
        }

        Ok(res)
    }

    /// Synthetic stand-in for a container's byte offset inside the
    /// document: assigned on first sight, spaced by pair count.
    fn container_offset(&mut self, c: &Container<'a>) -> i64 {
        let ident = c.ident();
        if let Some(off) = self.container_offsets.get(&ident) {
            return *off;
        }
        let off = self.next_container_offset;
        self.container_offsets.insert(ident, off);
        self.next_container_offset = off + c.len().max(1) as i64;
        off
    }

    /// Lift a predicate verdict into a value: True/False become JSON
    /// booleans, Unknown becomes JSON null.
    fn append_bool_result(
        &mut self,
        node: &'a PathNode,
        found: Option<&mut ItemList<'a>>,
        res: Truth,
    ) -> ExecResult {
        let next = node.next_step();
        if next.is_none() && found.is_none() {
            return Ok(Outcome::Ok); // the verdict itself is the match
        }
        let v = match res {
            Truth::Unknown => Item::Null,
            t => Item::Bool(t == Truth::True),
        };
        self.exec_next(next, v, found)
    }
}

/// Boolean text forms: unique prefixes of true/false/yes/no, exact on/off
/// and 1/0, case-insensitive, surrounding space ignored.
fn parse_bool(s: &str) -> Option<bool> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let lower = t.to_ascii_lowercase();
    let l = lower.as_str();
    match l {
        "1" | "on" => Some(true),
        "0" => Some(false),
        _ if "true".starts_with(l) || "yes".starts_with(l) => Some(true),
        _ if l.len() >= 2 && "off".starts_with(l) => Some(false),
        _ if "false".starts_with(l) || "no".starts_with(l) => Some(false),
        _ => None,
    }
}

/// Process-wide cache of compiled regexes keyed by (pattern, flags); the
/// store only grows and can be read from concurrent evaluations.
fn cached_regex(pattern: &str, flags: &str) -> Result<Regex, Error> {
    static CACHE: OnceLock<Mutex<HashMap<(String, String), Regex>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));

    let key = (pattern.to_string(), flags.to_string());
    if let Ok(guard) = cache.lock() {
        if let Some(re) = guard.get(&key) {
            return Ok(re.clone());
        }
    }

    let re = build_regex(pattern, flags)?;
    if let Ok(mut guard) = cache.lock() {
        guard.entry(key).or_insert_with(|| re.clone());
    }
    Ok(re)
}

/// Convert jsonpath regex flag letters into host regex options. The `q`
/// flag quotes the whole pattern; combined with it only `i` still applies.
fn build_regex(pattern: &str, flags: &str) -> Result<Regex, Error> {
    let mut icase = false;
    let mut dotall = false;
    let mut mline = false;
    let mut wspace = false;
    let mut quote = false;
    for c in flags.chars() {
        match c {
            'i' => icase = true,
            's' => dotall = true,
            'm' => mline = true,
            'x' => wspace = true,
            'q' => quote = true,
            other => {
                return Err(Error::InvalidRegex(format!(
                    "unsupported flag \"{other}\""
                )));
            }
        }
    }

    let source = if quote {
        regex::escape(pattern)
    } else {
        pattern.to_string()
    };
    let mut builder = RegexBuilder::new(&source);
    builder.case_insensitive(icase);
    if !quote {
        builder
            .dot_matches_new_line(dotall)
            .multi_line(mline)
            .ignore_whitespace(wspace);
    }
    builder
        .build()
        .map_err(|e| Error::InvalidRegex(e.to_string()))
}
