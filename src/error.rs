/// Errors raised during jsonpath evaluation.
///
/// Every variant maps to a stable [`ErrorCode`], the wire-visible error
/// class. Whether an error is *recoverable* (suppressible by silent mode)
/// is decided at the raise site, not by the variant: the walker routes
/// recoverable errors through its status channel and reserves `Err` for
/// errors that must reach the caller.
use thiserror::Error;

/// Wire-visible error class, one per SQLSTATE the engine can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    SqlJsonMemberNotFound,
    SqlJsonArrayNotFound,
    SqlJsonObjectNotFound,
    InvalidSqlJsonSubscript,
    SingletonSqlJsonItemRequired,
    SqlJsonNumberNotFound,
    NonNumericSqlJsonItem,
    InvalidArgumentForSqlJsonDatetimeFunction,
    SqlJsonScalarRequired,
    MoreThanOneSqlJsonItem,
    FeatureNotSupported,
    UndefinedObject,
    DivisionByZero,
    InvalidParameterValue,
    InvalidRegularExpression,
    StatementTooComplex,
    QueryCanceled,
    InternalError,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("JSON object does not contain key \"{0}\"")]
    KeyNotFound(String),

    #[error("jsonpath member accessor can only be applied to an object")]
    MemberNotObject,

    #[error("jsonpath wildcard member accessor can only be applied to an object")]
    WildcardMemberNotObject,

    #[error("jsonpath item method .keyvalue() can only be applied to an object")]
    KeyValueNotObject,

    #[error("jsonpath wildcard array accessor can only be applied to an array")]
    WildcardArrayNotArray,

    #[error("jsonpath array accessor can only be applied to an array")]
    ArrayAccessorNotArray,

    #[error("jsonpath item method .size() can only be applied to an array")]
    SizeNotArray,

    #[error("jsonpath array subscript is out of bounds")]
    SubscriptOutOfBounds,

    #[error("jsonpath array subscript is not a single numeric value")]
    SubscriptNotNumeric,

    #[error("jsonpath array subscript is out of integer range")]
    SubscriptOutOfRange,

    #[error("{side} operand of jsonpath operator {op} is not a single numeric value")]
    ArithOperandNotNumeric {
        op: &'static str,
        side: &'static str,
    },

    #[error("operand of unary jsonpath operator {op} is not a numeric value")]
    UnaryOperandNotNumeric { op: &'static str },

    #[error("single boolean result is expected")]
    SingleBooleanExpected,

    #[error("argument \"{arg}\" of jsonpath item method .{method}() is invalid for type {ty}")]
    InvalidArgumentForType {
        method: &'static str,
        ty: &'static str,
        arg: String,
    },

    #[error("NaN or Infinity is not allowed for jsonpath item method .{method}()")]
    NanOrInfinity { method: &'static str },

    #[error("jsonpath item method .{method}() can only be applied to {expected}")]
    MethodTypeMismatch {
        method: &'static str,
        expected: &'static str,
    },

    #[error("jsonpath item method .{method}() can only be applied to a string")]
    DatetimeNotString { method: &'static str },

    #[error("{method} format is not recognized: \"{arg}\"")]
    DatetimeFormatNotRecognized {
        method: &'static str,
        arg: String,
    },

    #[error("JSON path expression must return single scalar item")]
    ScalarRequired,

    #[error("JSON path expression must return single item when no wrapper is requested")]
    MoreThanOneItem,

    #[error("cannot convert value from {from} to {to} without time zone usage")]
    TimezoneUsage {
        from: &'static str,
        to: &'static str,
    },

    #[error("could not find jsonpath variable \"{0}\"")]
    UndefinedVariable(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("\"vars\" argument is not an object")]
    VarsNotObject,

    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),

    #[error("jsonpath evaluation exceeded the maximum nesting depth")]
    StackDepthExceeded,

    #[error("jsonpath evaluation was canceled")]
    Canceled,

    #[error("internal jsonpath error: {0}")]
    Internal(&'static str),
}

impl Error {
    /// The wire-visible class of this error.
    pub fn code(&self) -> ErrorCode {
        use Error::*;
        match self {
            KeyNotFound(_) | MemberNotObject => ErrorCode::SqlJsonMemberNotFound,
            WildcardArrayNotArray | ArrayAccessorNotArray | SizeNotArray => {
                ErrorCode::SqlJsonArrayNotFound
            }
            WildcardMemberNotObject | KeyValueNotObject => ErrorCode::SqlJsonObjectNotFound,
            SubscriptOutOfBounds | SubscriptNotNumeric | SubscriptOutOfRange => {
                ErrorCode::InvalidSqlJsonSubscript
            }
            ArithOperandNotNumeric { .. } | SingleBooleanExpected => {
                ErrorCode::SingletonSqlJsonItemRequired
            }
            UnaryOperandNotNumeric { .. } => ErrorCode::SqlJsonNumberNotFound,
            InvalidArgumentForType { .. } | NanOrInfinity { .. } | MethodTypeMismatch { .. } => {
                ErrorCode::NonNumericSqlJsonItem
            }
            DatetimeNotString { .. } | DatetimeFormatNotRecognized { .. } => {
                ErrorCode::InvalidArgumentForSqlJsonDatetimeFunction
            }
            ScalarRequired => ErrorCode::SqlJsonScalarRequired,
            MoreThanOneItem => ErrorCode::MoreThanOneSqlJsonItem,
            TimezoneUsage { .. } => ErrorCode::FeatureNotSupported,
            UndefinedVariable(_) => ErrorCode::UndefinedObject,
            DivisionByZero => ErrorCode::DivisionByZero,
            VarsNotObject => ErrorCode::InvalidParameterValue,
            InvalidRegex(_) => ErrorCode::InvalidRegularExpression,
            StackDepthExceeded => ErrorCode::StatementTooComplex,
            Canceled => ErrorCode::QueryCanceled,
            Internal(_) => ErrorCode::InternalError,
        }
    }
}
