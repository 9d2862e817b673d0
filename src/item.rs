/// SQL/JSON items: the values path steps pass to one another.
///
/// Scalars are always decoded before the walker sees them; `Binary` holds
/// only arrays and objects. A `Binary` container is usually a borrowed
/// pointer into the caller's document, which must stay live for the whole
/// evaluation; objects generated mid-flight (`.keyvalue()`) are reference
/// counted instead so the chain after them can keep navigating.
use std::borrow::Cow;
use std::rc::Rc;

use bigdecimal::BigDecimal;
use serde_json::Value as Json;

use crate::datetime::Datetime;
use crate::num;

#[derive(Debug, Clone)]
pub enum Item<'a> {
    Null,
    Bool(bool),
    Number(BigDecimal),
    String(Cow<'a, str>),
    Datetime(Datetime),
    Binary(Container<'a>),
}

#[derive(Debug, Clone)]
pub enum Container<'a> {
    /// Borrowed from the caller's document.
    Doc(&'a Json),
    /// Generated during evaluation.
    Gen(Rc<Json>),
}

impl<'a> Item<'a> {
    /// Decode a document node into an item: scalars by value, containers
    /// as borrowed binaries.
    pub fn from_json(v: &'a Json) -> Item<'a> {
        match v {
            Json::Null => Item::Null,
            Json::Bool(b) => Item::Bool(*b),
            Json::Number(n) => Item::Number(num::decimal_from_json(n)),
            Json::String(s) => Item::String(Cow::Borrowed(s)),
            Json::Array(_) | Json::Object(_) => Item::Binary(Container::Doc(v)),
        }
    }

    /// Same decoding for a value produced during evaluation.
    pub fn from_owned_json(v: Json) -> Item<'a> {
        match v {
            Json::Null => Item::Null,
            Json::Bool(b) => Item::Bool(b),
            Json::Number(n) => Item::Number(num::decimal_from_json(&n)),
            Json::String(s) => Item::String(Cow::Owned(s)),
            other => Item::Binary(Container::Gen(Rc::new(other))),
        }
    }

    /// Convert back to an owned JSON value; datetimes serialize to their
    /// ISO string form.
    pub fn to_json(&self) -> Json {
        match self {
            Item::Null => Json::Null,
            Item::Bool(b) => Json::Bool(*b),
            Item::Number(d) => Json::Number(num::json_number_from_decimal(d)),
            Item::String(s) => Json::String(s.to_string()),
            Item::Datetime(dt) => Json::String(dt.encode()),
            Item::Binary(c) => c.json().clone(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Item::Null => "null",
            Item::Bool(_) => "boolean",
            Item::Number(_) => "number",
            Item::String(_) => "string",
            Item::Datetime(dt) => dt.kind().type_name(),
            Item::Binary(c) => {
                if c.is_array() {
                    "array"
                } else {
                    "object"
                }
            }
        }
    }

    pub fn as_number(&self) -> Option<&BigDecimal> {
        match self {
            Item::Number(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Item::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Item::Binary(c) if c.is_array())
    }

    /// Array length, or None for anything that is not an array.
    pub fn array_len(&self) -> Option<usize> {
        match self {
            Item::Binary(c) => match c.json() {
                Json::Array(a) => Some(a.len()),
                _ => None,
            },
            _ => None,
        }
    }
}

impl<'a> Container<'a> {
    pub(crate) fn json(&self) -> &Json {
        match self {
            Container::Doc(v) => v,
            Container::Gen(rc) => rc,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.json(), Json::Array(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self.json(), Json::Object(_))
    }

    /// Number of elements or key-value pairs.
    pub fn len(&self) -> usize {
        match self.json() {
            Json::Array(a) => a.len(),
            Json::Object(o) => o.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stable identity of this container within one evaluation.
    pub(crate) fn ident(&self) -> usize {
        match self {
            Container::Doc(v) => *v as *const Json as usize,
            Container::Gen(rc) => Rc::as_ptr(rc) as usize,
        }
    }

    /// Array element at `idx`.
    pub fn element(&self, idx: usize) -> Option<Item<'a>> {
        match self {
            Container::Doc(v) => {
                let v: &'a Json = *v;
                match v {
                    Json::Array(a) => a.get(idx).map(Item::from_json),
                    _ => None,
                }
            }
            Container::Gen(rc) => match rc.as_ref() {
                Json::Array(a) => a.get(idx).map(|v| Item::from_owned_json(v.clone())),
                _ => None,
            },
        }
    }

    /// Object member mapped to `key`.
    pub fn member(&self, key: &str) -> Option<Item<'a>> {
        match self {
            Container::Doc(v) => {
                let v: &'a Json = *v;
                match v {
                    Json::Object(o) => o.get(key).map(Item::from_json),
                    _ => None,
                }
            }
            Container::Gen(rc) => match rc.as_ref() {
                Json::Object(o) => o.get(key).map(|v| Item::from_owned_json(v.clone())),
                _ => None,
            },
        }
    }

    /// Array elements or object member values, in stored order.
    pub fn children(&self) -> Vec<Item<'a>> {
        match self {
            Container::Doc(v) => {
                let v: &'a Json = *v;
                match v {
                    Json::Array(a) => a.iter().map(Item::from_json).collect(),
                    Json::Object(o) => o.values().map(Item::from_json).collect(),
                    _ => Vec::new(),
                }
            }
            Container::Gen(rc) => match rc.as_ref() {
                Json::Array(a) => a
                    .iter()
                    .map(|v| Item::from_owned_json(v.clone()))
                    .collect(),
                Json::Object(o) => o
                    .values()
                    .map(|v| Item::from_owned_json(v.clone()))
                    .collect(),
                _ => Vec::new(),
            },
        }
    }

    /// Object entries in stored order.
    pub fn entries(&self) -> Vec<(Cow<'a, str>, Item<'a>)> {
        match self {
            Container::Doc(v) => {
                let v: &'a Json = *v;
                match v {
                    Json::Object(o) => o
                        .iter()
                        .map(|(k, v)| (Cow::Borrowed(k.as_str()), Item::from_json(v)))
                        .collect(),
                    _ => Vec::new(),
                }
            }
            Container::Gen(rc) => match rc.as_ref() {
                Json::Object(o) => o
                    .iter()
                    .map(|(k, v)| {
                        (
                            Cow::<str>::Owned(k.clone()),
                            Item::from_owned_json(v.clone()),
                        )
                    })
                    .collect(),
                _ => Vec::new(),
            },
        }
    }
}

/// Ordered item sequence with the singleton shortcut: no heap list is
/// allocated until the second append.
#[derive(Debug, Default)]
pub enum ItemList<'a> {
    #[default]
    Empty,
    Single(Item<'a>),
    Many(Vec<Item<'a>>),
}

impl<'a> ItemList<'a> {
    pub fn new() -> Self {
        ItemList::Empty
    }

    pub fn append(&mut self, item: Item<'a>) {
        match std::mem::take(self) {
            ItemList::Empty => *self = ItemList::Single(item),
            ItemList::Single(first) => *self = ItemList::Many(vec![first, item]),
            ItemList::Many(mut v) => {
                v.push(item);
                *self = ItemList::Many(v);
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ItemList::Empty => 0,
            ItemList::Single(_) => 1,
            ItemList::Many(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, ItemList::Empty)
    }

    pub fn head(&self) -> Option<&Item<'a>> {
        self.as_slice().first()
    }

    pub fn as_slice(&self) -> &[Item<'a>] {
        match self {
            ItemList::Empty => &[],
            ItemList::Single(item) => std::slice::from_ref(item),
            ItemList::Many(v) => v,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item<'a>> {
        self.as_slice().iter()
    }

    pub fn into_vec(self) -> Vec<Item<'a>> {
        match self {
            ItemList::Empty => Vec::new(),
            ItemList::Single(item) => vec![item],
            ItemList::Many(v) => v,
        }
    }
}
