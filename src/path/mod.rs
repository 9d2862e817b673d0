/// The compiled jsonpath program.
///
/// A program is a chain of [`PathNode`]s linked through `next`; each node
/// carries its kind-specific payload and zero or more child programs
/// (predicate operands, filter bodies, subscript bounds). The text parser
/// that would produce this structure lives outside this crate; programs
/// are built directly through [`builder`].
pub mod compare;
pub mod exec;

use bigdecimal::BigDecimal;

/// Lax mode wraps, unwraps and swallows structural errors; strict mode
/// surfaces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    Lax,
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl ArithOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Minus,
}

impl UnaryOp {
    pub(crate) fn name(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
        }
    }
}

/// One array subscript: a single index or an inclusive `from..to` range.
/// Bounds are full path programs, evaluated against the subscripted value.
#[derive(Debug, Clone)]
pub struct Subscript {
    pub from: PathNode,
    pub to: Option<PathNode>,
}

/// Depth band for recursive descent; `u32::MAX` means unbounded.
pub const ANY_UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, Clone)]
pub enum NodeKind {
    // context
    Root,
    Current,
    Last,

    // literals and variables
    Null,
    Bool(bool),
    Numeric(BigDecimal),
    String(String),
    Variable(String),

    // navigation
    Key(String),
    AnyKey,
    AnyArray,
    IndexArray(Vec<Subscript>),
    Any { first: u32, last: u32 },
    Filter(Box<PathNode>),

    // predicates
    And(Box<PathNode>, Box<PathNode>),
    Or(Box<PathNode>, Box<PathNode>),
    Not(Box<PathNode>),
    IsUnknown(Box<PathNode>),
    Compare(CmpOp, Box<PathNode>, Box<PathNode>),
    StartsWith(Box<PathNode>, Box<PathNode>),
    LikeRegex {
        expr: Box<PathNode>,
        pattern: String,
        flags: String,
    },
    Exists(Box<PathNode>),

    // arithmetic
    Arith(ArithOp, Box<PathNode>, Box<PathNode>),
    Unary(UnaryOp, Box<PathNode>),

    // item methods
    Type,
    Size,
    Abs,
    Floor,
    Ceiling,
    Double,
    Integer,
    Bigint,
    NumberFunc,
    Decimal {
        precision: Option<i32>,
        scale: Option<i32>,
    },
    BooleanFunc,
    StringFunc,
    KeyValue,
    DatetimeFunc(Option<String>),
    Date,
    Time(Option<u32>),
    TimeTz(Option<u32>),
    Timestamp(Option<u32>),
    TimestampTz(Option<u32>),
}

#[derive(Debug, Clone)]
pub struct PathNode {
    pub kind: NodeKind,
    pub next: Option<Box<PathNode>>,
}

impl PathNode {
    pub fn new(kind: NodeKind) -> Self {
        PathNode { kind, next: None }
    }

    /// Append a step at the end of this chain.
    pub fn then(mut self, next: PathNode) -> PathNode {
        self.next = Some(Box::new(match self.next.take() {
            Some(tail) => tail.then(next),
            None => next,
        }));
        self
    }

    pub(crate) fn next_step(&self) -> Option<&PathNode> {
        self.next.as_deref()
    }
}

/// A complete program: evaluation mode plus the first step.
#[derive(Debug, Clone)]
pub struct PathExpr {
    pub mode: PathMode,
    pub first: PathNode,
}

impl PathExpr {
    pub fn lax(first: PathNode) -> Self {
        PathExpr {
            mode: PathMode::Lax,
            first,
        }
    }

    pub fn strict(first: PathNode) -> Self {
        PathExpr {
            mode: PathMode::Strict,
            first,
        }
    }

    pub fn is_lax(&self) -> bool {
        self.mode == PathMode::Lax
    }
}

/// Free-function constructors for building programs by hand.
pub mod builder {
    use super::*;
    use std::str::FromStr;

    fn node(kind: NodeKind) -> PathNode {
        PathNode::new(kind)
    }

    pub fn root() -> PathNode {
        node(NodeKind::Root)
    }

    pub fn current() -> PathNode {
        node(NodeKind::Current)
    }

    pub fn last() -> PathNode {
        node(NodeKind::Last)
    }

    pub fn null_lit() -> PathNode {
        node(NodeKind::Null)
    }

    pub fn bool_lit(b: bool) -> PathNode {
        node(NodeKind::Bool(b))
    }

    pub fn num(n: i64) -> PathNode {
        node(NodeKind::Numeric(BigDecimal::from(n)))
    }

    /// Numeric literal from its decimal rendering; invalid text panics, so
    /// this is for hand-written programs only.
    pub fn num_dec(s: &str) -> PathNode {
        node(NodeKind::Numeric(
            BigDecimal::from_str(s).expect("valid decimal literal"),
        ))
    }

    pub fn string_lit(s: impl Into<String>) -> PathNode {
        node(NodeKind::String(s.into()))
    }

    pub fn var(name: impl Into<String>) -> PathNode {
        node(NodeKind::Variable(name.into()))
    }

    pub fn key(name: impl Into<String>) -> PathNode {
        node(NodeKind::Key(name.into()))
    }

    pub fn any_key() -> PathNode {
        node(NodeKind::AnyKey)
    }

    pub fn any_array() -> PathNode {
        node(NodeKind::AnyArray)
    }

    pub fn index(i: i64) -> PathNode {
        subscripts(vec![Subscript {
            from: num(i),
            to: None,
        }])
    }

    pub fn index_range(from: PathNode, to: PathNode) -> PathNode {
        subscripts(vec![Subscript {
            from,
            to: Some(to),
        }])
    }

    pub fn index_expr(from: PathNode) -> PathNode {
        subscripts(vec![Subscript { from, to: None }])
    }

    pub fn subscripts(subs: Vec<Subscript>) -> PathNode {
        node(NodeKind::IndexArray(subs))
    }

    /// Recursive descent over the whole subtree.
    pub fn descend() -> PathNode {
        descend_between(0, ANY_UNBOUNDED)
    }

    pub fn descend_between(first: u32, last: u32) -> PathNode {
        node(NodeKind::Any { first, last })
    }

    pub fn filter(pred: PathNode) -> PathNode {
        node(NodeKind::Filter(Box::new(pred)))
    }

    pub fn and(l: PathNode, r: PathNode) -> PathNode {
        node(NodeKind::And(Box::new(l), Box::new(r)))
    }

    pub fn or(l: PathNode, r: PathNode) -> PathNode {
        node(NodeKind::Or(Box::new(l), Box::new(r)))
    }

    pub fn not(p: PathNode) -> PathNode {
        node(NodeKind::Not(Box::new(p)))
    }

    pub fn is_unknown(p: PathNode) -> PathNode {
        node(NodeKind::IsUnknown(Box::new(p)))
    }

    pub fn cmp(op: CmpOp, l: PathNode, r: PathNode) -> PathNode {
        node(NodeKind::Compare(op, Box::new(l), Box::new(r)))
    }

    pub fn eq(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Eq, l, r)
    }

    pub fn ne(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Ne, l, r)
    }

    pub fn lt(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Lt, l, r)
    }

    pub fn le(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Le, l, r)
    }

    pub fn gt(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Gt, l, r)
    }

    pub fn ge(l: PathNode, r: PathNode) -> PathNode {
        cmp(CmpOp::Ge, l, r)
    }

    pub fn starts_with(whole: PathNode, prefix: PathNode) -> PathNode {
        node(NodeKind::StartsWith(Box::new(whole), Box::new(prefix)))
    }

    pub fn like_regex(
        expr: PathNode,
        pattern: impl Into<String>,
        flags: impl Into<String>,
    ) -> PathNode {
        node(NodeKind::LikeRegex {
            expr: Box::new(expr),
            pattern: pattern.into(),
            flags: flags.into(),
        })
    }

    pub fn exists(p: PathNode) -> PathNode {
        node(NodeKind::Exists(Box::new(p)))
    }

    pub fn arith(op: ArithOp, l: PathNode, r: PathNode) -> PathNode {
        node(NodeKind::Arith(op, Box::new(l), Box::new(r)))
    }

    pub fn add(l: PathNode, r: PathNode) -> PathNode {
        arith(ArithOp::Add, l, r)
    }

    pub fn sub(l: PathNode, r: PathNode) -> PathNode {
        arith(ArithOp::Sub, l, r)
    }

    pub fn mul(l: PathNode, r: PathNode) -> PathNode {
        arith(ArithOp::Mul, l, r)
    }

    pub fn div(l: PathNode, r: PathNode) -> PathNode {
        arith(ArithOp::Div, l, r)
    }

    pub fn modulo(l: PathNode, r: PathNode) -> PathNode {
        arith(ArithOp::Mod, l, r)
    }

    pub fn plus(p: PathNode) -> PathNode {
        node(NodeKind::Unary(UnaryOp::Plus, Box::new(p)))
    }

    pub fn neg(p: PathNode) -> PathNode {
        node(NodeKind::Unary(UnaryOp::Minus, Box::new(p)))
    }

    pub fn type_of() -> PathNode {
        node(NodeKind::Type)
    }

    pub fn size() -> PathNode {
        node(NodeKind::Size)
    }

    pub fn abs() -> PathNode {
        node(NodeKind::Abs)
    }

    pub fn floor() -> PathNode {
        node(NodeKind::Floor)
    }

    pub fn ceiling() -> PathNode {
        node(NodeKind::Ceiling)
    }

    pub fn double() -> PathNode {
        node(NodeKind::Double)
    }

    pub fn integer() -> PathNode {
        node(NodeKind::Integer)
    }

    pub fn bigint() -> PathNode {
        node(NodeKind::Bigint)
    }

    pub fn number() -> PathNode {
        node(NodeKind::NumberFunc)
    }

    pub fn decimal(precision: Option<i32>, scale: Option<i32>) -> PathNode {
        node(NodeKind::Decimal { precision, scale })
    }

    pub fn boolean() -> PathNode {
        node(NodeKind::BooleanFunc)
    }

    pub fn stringify() -> PathNode {
        node(NodeKind::StringFunc)
    }

    pub fn keyvalue() -> PathNode {
        node(NodeKind::KeyValue)
    }

    pub fn datetime(template: Option<&str>) -> PathNode {
        node(NodeKind::DatetimeFunc(template.map(str::to_owned)))
    }

    pub fn date() -> PathNode {
        node(NodeKind::Date)
    }

    pub fn time(precision: Option<u32>) -> PathNode {
        node(NodeKind::Time(precision))
    }

    pub fn time_tz(precision: Option<u32>) -> PathNode {
        node(NodeKind::TimeTz(precision))
    }

    pub fn timestamp(precision: Option<u32>) -> PathNode {
        node(NodeKind::Timestamp(precision))
    }

    pub fn timestamp_tz(precision: Option<u32>) -> PathNode {
        node(NodeKind::TimestampTz(precision))
    }
}
