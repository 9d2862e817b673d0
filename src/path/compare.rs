/// Tri-valued comparison of two SQL/JSON items.
///
/// Null compares equal only to null; a null against anything else is False
/// for every operator except `!=`. Non-null items of different kinds are
/// not comparable and yield Unknown, as do arrays and objects. Strings are
/// UTF-8 throughout this crate, so codepoint order is plain byte order.
use std::cmp::Ordering;

use crate::datetime::compare_datetime;
use crate::error::Error;
use crate::item::Item;
use crate::path::CmpOp;
use crate::path::exec::Truth;

pub(crate) fn compare_items(
    op: CmpOp,
    a: &Item,
    b: &Item,
    use_tz: bool,
) -> Result<Truth, Error> {
    let ord = match (a, b) {
        (Item::Null, Item::Null) => Some(Ordering::Equal),
        (Item::Null, _) | (_, Item::Null) => {
            return Ok(Truth::from_bool(op == CmpOp::Ne));
        }
        (Item::Bool(x), Item::Bool(y)) => Some(x.cmp(y)),
        (Item::Number(x), Item::Number(y)) => Some(x.cmp(y)),
        (Item::String(x), Item::String(y)) => {
            if op == CmpOp::Eq || op == CmpOp::Ne {
                // equality can short-circuit on length
                let equal = x.len() == y.len() && x.as_bytes() == y.as_bytes();
                return Ok(Truth::from_bool(equal == (op == CmpOp::Eq)));
            }
            Some(compare_strings(x, y))
        }
        (Item::Datetime(x), Item::Datetime(y)) => match compare_datetime(x, y, use_tz)? {
            Some(ord) => Some(ord),
            None => return Ok(Truth::Unknown),
        },
        // non-scalars and mixed kinds are not comparable
        _ => None,
    };

    let Some(ord) = ord else {
        return Ok(Truth::Unknown);
    };

    let res = match op {
        CmpOp::Eq => ord == Ordering::Equal,
        CmpOp::Ne => ord != Ordering::Equal,
        CmpOp::Lt => ord == Ordering::Less,
        CmpOp::Le => ord != Ordering::Greater,
        CmpOp::Gt => ord == Ordering::Greater,
        CmpOp::Ge => ord != Ordering::Less,
    };
    Ok(Truth::from_bool(res))
}

/// Binary codepoint comparison; valid for UTF-8, where byte order and
/// codepoint order agree.
fn compare_strings(a: &str, b: &str) -> Ordering {
    a.as_bytes().cmp(b.as_bytes())
}
