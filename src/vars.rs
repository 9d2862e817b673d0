/// Variable bindings consulted by the walker through a two-call protocol:
/// lookup by name and count. Two standard sources are provided: a JSON
/// object whose top-level keys are the variables, and an explicit list of
/// typed bindings the way the SQL/JSON functions pass them.
use bigdecimal::BigDecimal;
use serde_json::Value as Json;

use crate::datetime::Datetime;
use crate::error::Error;
use crate::item::Item;
use crate::num;

/// A resolved variable: its value and the id of the base object it belongs
/// to (0 when the variable contributes no base object).
pub struct Var<'a> {
    pub value: Item<'a>,
    pub base_id: i64,
}

pub trait Variables {
    fn lookup<'a>(&'a self, name: &str) -> Option<Var<'a>>;
    /// Number of base objects the bindings contribute; seeds the generated
    /// object-id counter.
    fn count(&self) -> usize;
}

/// No bindings at all.
pub struct NoVars;

impl Variables for NoVars {
    fn lookup<'a>(&'a self, _name: &str) -> Option<Var<'a>> {
        None
    }

    fn count(&self) -> usize {
        0
    }
}

/// Bindings drawn from a JSON object: each top-level key is a variable,
/// and the object as a whole is the single base object with id 1.
#[derive(Debug)]
pub struct JsonVars<'v> {
    obj: Option<&'v serde_json::Map<String, Json>>,
}

impl<'v> JsonVars<'v> {
    pub fn new(vars: Option<&'v Json>) -> Result<Self, Error> {
        match vars {
            None | Some(Json::Null) => Ok(JsonVars { obj: None }),
            Some(Json::Object(map)) => Ok(JsonVars { obj: Some(map) }),
            Some(_) => Err(Error::VarsNotObject),
        }
    }
}

impl Variables for JsonVars<'_> {
    fn lookup<'a>(&'a self, name: &str) -> Option<Var<'a>> {
        let v = self.obj?.get(name)?;
        Some(Var {
            value: Item::from_json(v),
            base_id: 1,
        })
    }

    fn count(&self) -> usize {
        usize::from(self.obj.is_some())
    }
}

/// A typed value passed into an evaluation, mirroring the host types the
/// SQL/JSON functions can hand over.
#[derive(Debug, Clone)]
pub enum BindingValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Numeric(BigDecimal),
    Text(String),
    Json(Json),
    Datetime(Datetime),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub name: String,
    pub value: BindingValue,
}

impl Binding {
    pub fn new(name: impl Into<String>, value: BindingValue) -> Self {
        Binding {
            name: name.into(),
            value,
        }
    }
}

/// An explicit binding list; each binding is its own base object, with ids
/// assigned 1..N in list order.
#[derive(Debug, Clone, Default)]
pub struct BindingVars {
    bindings: Vec<Binding>,
}

impl BindingVars {
    pub fn new(bindings: Vec<Binding>) -> Self {
        BindingVars { bindings }
    }
}

impl Variables for BindingVars {
    fn lookup<'a>(&'a self, name: &str) -> Option<Var<'a>> {
        let (pos, binding) = self
            .bindings
            .iter()
            .enumerate()
            .find(|(_, b)| b.name == name)?;
        let id = pos as i64 + 1;
        let var = match &binding.value {
            BindingValue::Null => Var {
                value: Item::Null,
                base_id: 0,
            },
            BindingValue::Bool(b) => Var {
                value: Item::Bool(*b),
                base_id: id,
            },
            BindingValue::Int(i) => Var {
                value: Item::Number(BigDecimal::from(*i)),
                base_id: id,
            },
            BindingValue::Float(f) => Var {
                // NaN and infinities have no decimal form; they bind as null
                value: num::decimal_from_f64(*f)
                    .map(Item::Number)
                    .unwrap_or(Item::Null),
                base_id: id,
            },
            BindingValue::Numeric(d) => Var {
                value: Item::Number(d.clone()),
                base_id: id,
            },
            BindingValue::Text(s) => Var {
                value: Item::String(std::borrow::Cow::Borrowed(s)),
                base_id: id,
            },
            BindingValue::Json(v) => Var {
                value: Item::from_json(v),
                base_id: id,
            },
            BindingValue::Datetime(dt) => Var {
                value: Item::Datetime(dt.clone()),
                base_id: id,
            },
        };
        Some(var)
    }

    fn count(&self) -> usize {
        self.bindings.len()
    }
}
