/// End-to-end tests for the public path operations: navigation, filters,
/// methods, arithmetic, datetimes and the silent/strict error contract.
use jpq::path::builder::*;
use jpq::{
    Binding, BindingValue, BindingVars, Error, ErrorCode, PathExpr, Wrapper, json_exists,
    json_query, json_value, path_exists, path_match, path_query, path_query_array,
    path_query_first,
};
use proptest::prelude::*;
use serde_json::{Value as Json, json};

fn q(doc: &Json, path: &PathExpr) -> Vec<Json> {
    path_query(doc, path, None, false, false).expect("query should succeed")
}

fn q_err(doc: &Json, path: &PathExpr) -> Error {
    path_query(doc, path, None, false, false).expect_err("query should fail")
}

fn q_silent(doc: &Json, path: &PathExpr) -> Vec<Json> {
    path_query(doc, path, None, true, false).expect("silent query never fails recoverably")
}

// --- Navigation ---

#[test]
fn member_and_wildcard() {
    let doc = json!({"a": {"b": 42}});
    assert_eq!(q(&doc, &PathExpr::lax(root().then(key("a")).then(key("b")))), vec![json!(42)]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(any_key()))),
        vec![json!({"b": 42})]
    );
}

#[test]
fn wildcard_array_in_order() {
    let doc = json!([1, "x", true, null]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(any_array()))),
        vec![json!(1), json!("x"), json!(true), json!(null)]
    );
}

#[test]
fn member_on_array_unwraps_in_lax() {
    let doc = json!([{"a": 1}, {"a": 2}, {"b": 3}]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(key("a")))),
        vec![json!(1), json!(2)]
    );
}

#[test]
fn strict_member_on_array_is_an_error() {
    // same path, both modes: strict raises where lax yields nothing
    let doc = json!([1, 2, 3]);
    let strict = PathExpr::strict(root().then(key("a")));
    assert_eq!(q_err(&doc, &strict).code(), ErrorCode::SqlJsonMemberNotFound);
    let lax = PathExpr::lax(root().then(key("a")));
    assert_eq!(q(&doc, &lax), Vec::<Json>::new());
}

#[test]
fn strict_missing_member() {
    let doc = json!({"b": 1});
    let strict = PathExpr::strict(root().then(key("a")));
    let err = q_err(&doc, &strict);
    assert_eq!(err.code(), ErrorCode::SqlJsonMemberNotFound);
    assert!(err.to_string().contains("\"a\""));
}

#[test]
fn array_index_and_range() {
    let doc = json!([10, 20, 30, 40]);
    assert_eq!(q(&doc, &PathExpr::lax(root().then(index(1)))), vec![json!(20)]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(index_range(num(1), num(2))))),
        vec![json!(20), json!(30)]
    );
}

#[test]
fn array_index_last() {
    let doc = json!([10, 20, 30]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(index_expr(last())))),
        vec![json!(30)]
    );
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(index_expr(sub(last(), num(1)))))),
        vec![json!(20)]
    );
}

#[test]
fn out_of_bounds_subscript() {
    let doc = json!([1, 2]);
    let strict = PathExpr::strict(root().then(index(5)));
    assert_eq!(q_err(&doc, &strict).code(), ErrorCode::InvalidSqlJsonSubscript);
    // lax clips the range instead
    assert_eq!(q(&doc, &PathExpr::lax(root().then(index(5)))), Vec::<Json>::new());
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(index_range(num(1), num(9))))),
        vec![json!(2)]
    );
}

#[test]
fn lax_auto_wraps_scalar_subscript() {
    let doc = json!(42);
    assert_eq!(q(&doc, &PathExpr::lax(root().then(index(0)))), vec![json!(42)]);
}

#[test]
fn recursive_descent() {
    let doc = json!({"a": {"b": 1}, "c": 2});
    let all = q(&doc, &PathExpr::lax(root().then(descend())));
    assert_eq!(
        all,
        vec![json!({"a": {"b": 1}, "c": 2}), json!({"b": 1}), json!(1), json!(2)]
    );
    // depth band: only direct children
    let level1 = q(&doc, &PathExpr::lax(root().then(descend_between(1, 1))));
    assert_eq!(level1, vec![json!({"b": 1}), json!(2)]);
}

#[test]
fn recursive_descent_leaves_only() {
    let doc = json!({"a": {"b": 1}, "c": 2});
    let leaves = q(
        &doc,
        &PathExpr::lax(root().then(descend_between(u32::MAX, u32::MAX))),
    );
    assert_eq!(leaves, vec![json!(1), json!(2)]);
}

// --- Filters and predicates ---

#[test]
fn filter_comparison_over_array() {
    let doc = json!({"a": [1, 2, 3]});
    let path = PathExpr::lax(
        root()
            .then(key("a"))
            .then(any_array())
            .then(filter(gt(current(), num(1)))),
    );
    assert_eq!(q(&doc, &path), vec![json!(2), json!(3)]);
}

#[test]
fn filter_disjunction() {
    let path = PathExpr::lax(root().then(filter(or(
        eq(current().then(key("x")), num(1)),
        eq(current().then(key("y")), num(2)),
    ))));
    assert_eq!(q(&json!({"x": 1}), &path), vec![json!({"x": 1})]);
    assert_eq!(q(&json!({"y": 2}), &path), vec![json!({"y": 2})]);
    assert_eq!(q(&json!({"z": 3}), &path), Vec::<Json>::new());
}

#[test]
fn filter_conjunction_and_not() {
    let doc = json!([{"a": 1, "b": 1}, {"a": 1, "b": 2}]);
    let path = PathExpr::lax(root().then(any_array()).then(filter(and(
        eq(current().then(key("a")), num(1)),
        not(eq(current().then(key("b")), num(1))),
    ))));
    assert_eq!(q(&doc, &path), vec![json!({"a": 1, "b": 2})]);
}

#[test]
fn unknown_comparison_is_dropped_by_filter() {
    // number against string is not comparable: Unknown, so the filter
    // drops the item without erroring
    let doc = json!([1, "x", 3]);
    let path = PathExpr::lax(
        root()
            .then(any_array())
            .then(filter(gt(current(), num(1)))),
    );
    assert_eq!(q(&doc, &path), vec![json!(3)]);
}

#[test]
fn is_unknown_catches_errors() {
    let doc = json!({"y": 2});
    let path = PathExpr::strict(root().then(filter(is_unknown(eq(
        current().then(key("x")),
        num(1),
    )))));
    assert_eq!(q(&doc, &path), vec![json!({"y": 2})]);
}

#[test]
fn exists_predicate() {
    let docs = [json!({"a": 1}), json!({"b": 2})];
    let path = PathExpr::lax(root().then(filter(exists(current().then(key("a"))))));
    assert_eq!(q(&docs[0], &path), vec![json!({"a": 1})]);
    assert_eq!(q(&docs[1], &path), Vec::<Json>::new());
}

#[test]
fn starts_with_predicate() {
    let doc = json!(["banana", "apple", 7]);
    let path = PathExpr::lax(
        root()
            .then(any_array())
            .then(filter(starts_with(current(), string_lit("ba")))),
    );
    assert_eq!(q(&doc, &path), vec![json!("banana")]);
}

#[test]
fn like_regex_predicate() {
    let doc = json!(["Apple", "banana", "apricot"]);
    let path = PathExpr::lax(
        root()
            .then(any_array())
            .then(filter(like_regex(current(), "^a", "i"))),
    );
    assert_eq!(q(&doc, &path), vec![json!("Apple"), json!("apricot")]);
}

#[test]
fn predicate_in_value_position() {
    // a top-level predicate lifts to a JSON boolean; Unknown lifts to null
    let doc = json!({"a": 1});
    assert_eq!(
        q(&doc, &PathExpr::lax(eq(root().then(key("a")), num(1)))),
        vec![json!(true)]
    );
    assert_eq!(
        q(&doc, &PathExpr::lax(eq(root().then(key("a")), string_lit("x")))),
        vec![json!(null)]
    );
}

// --- Arithmetic ---

#[test]
fn binary_arithmetic() {
    let doc = json!({"a": 10, "b": 4});
    let a = || root().then(key("a"));
    let b = || root().then(key("b"));
    assert_eq!(q(&doc, &PathExpr::lax(add(a(), b()))), vec![json!(14)]);
    assert_eq!(q(&doc, &PathExpr::lax(sub(a(), b()))), vec![json!(6)]);
    assert_eq!(q(&doc, &PathExpr::lax(mul(a(), b()))), vec![json!(40)]);
    assert_eq!(q(&doc, &PathExpr::lax(div(a(), b()))), vec![json!(2.5)]);
    assert_eq!(q(&doc, &PathExpr::lax(modulo(a(), b()))), vec![json!(2)]);
}

#[test]
fn division_by_zero() {
    let doc = json!({"a": 1, "b": 0});
    let path = PathExpr::lax(div(root().then(key("a")), root().then(key("b"))));
    assert_eq!(q_err(&doc, &path).code(), ErrorCode::DivisionByZero);
    assert_eq!(q_silent(&doc, &path), Vec::<Json>::new());
}

#[test]
fn arithmetic_requires_numeric_singletons() {
    let doc = json!({"a": [1, 2], "b": 3});
    // lax unwraps the array operand, but two items is not a singleton
    let path = PathExpr::lax(add(root().then(key("a")), root().then(key("b"))));
    assert_eq!(
        q_err(&doc, &path).code(),
        ErrorCode::SingletonSqlJsonItemRequired
    );
}

#[test]
fn unary_minus_distributes() {
    let doc = json!([1, 2, 3]);
    let path = PathExpr::lax(neg(root().then(any_array())));
    assert_eq!(q(&doc, &path), vec![json!(-1), json!(-2), json!(-3)]);
}

// --- Item methods ---

#[test]
fn type_names() {
    assert_eq!(
        q(&json!({"s": "x"}), &PathExpr::lax(root().then(key("s")).then(type_of()))),
        vec![json!("string")]
    );
    assert_eq!(
        q(&json!([1]), &PathExpr::lax(root().then(type_of()))),
        vec![json!("array")]
    );
    assert_eq!(
        q(&json!(1), &PathExpr::lax(root().then(type_of()))),
        vec![json!("number")]
    );
}

#[test]
fn size_method() {
    assert_eq!(
        q(&json!({"a": [1, 2, 3]}), &PathExpr::lax(root().then(key("a")).then(size()))),
        vec![json!(3)]
    );
    // lax wraps non-arrays; strict refuses them
    assert_eq!(q(&json!(7), &PathExpr::lax(root().then(size()))), vec![json!(1)]);
    assert_eq!(
        q_err(&json!(7), &PathExpr::strict(root().then(size()))).code(),
        ErrorCode::SqlJsonArrayNotFound
    );
}

#[test]
fn numeric_methods() {
    let doc = json!([2.7, -2.7]);
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(any_array()).then(floor()))),
        vec![json!(2), json!(-3)]
    );
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(any_array()).then(ceiling()))),
        vec![json!(3), json!(-2)]
    );
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(any_array()).then(abs()))),
        vec![json!(2.7), json!(2.7)]
    );
}

#[test]
fn double_method() {
    let doc = json!(["1.5", 2]);
    let path = PathExpr::lax(root().then(any_array()).then(double()));
    assert_eq!(q(&doc, &path), vec![json!(1.5), json!(2.0)]);
}

#[test]
fn double_on_junk_string_fails_even_in_lax() {
    // a value error, not a structural one: lax does not suppress it
    let doc = json!([1, "x", 3]);
    let path = PathExpr::lax(root().then(any_array()).then(double()));
    assert_eq!(q_err(&doc, &path).code(), ErrorCode::NonNumericSqlJsonItem);
    assert_eq!(q_silent(&doc, &path), Vec::<Json>::new());
}

#[test]
fn integer_and_bigint_methods() {
    assert_eq!(
        q(&json!("42"), &PathExpr::lax(root().then(integer()))),
        vec![json!(42)]
    );
    assert_eq!(
        q(&json!(2.5), &PathExpr::lax(root().then(integer()))),
        vec![json!(3)]
    );
    assert_eq!(
        q_err(&json!(2147483648i64), &PathExpr::lax(root().then(integer()))).code(),
        ErrorCode::NonNumericSqlJsonItem
    );
    assert_eq!(
        q(&json!(2147483648i64), &PathExpr::lax(root().then(bigint()))),
        vec![json!(2147483648i64)]
    );
}

#[test]
fn number_and_decimal_methods() {
    assert_eq!(
        q(&json!("12.345"), &PathExpr::lax(root().then(number()))),
        vec![json!(12.345)]
    );
    assert_eq!(
        q(&json!(12.345), &PathExpr::lax(root().then(decimal(Some(5), Some(2))))),
        vec![json!(12.35)]
    );
    assert_eq!(
        q_err(&json!(123.45), &PathExpr::lax(root().then(decimal(Some(4), Some(2))))).code(),
        ErrorCode::NonNumericSqlJsonItem
    );
}

#[test]
fn boolean_method() {
    assert_eq!(q(&json!("yes"), &PathExpr::lax(root().then(boolean()))), vec![json!(true)]);
    assert_eq!(q(&json!(0), &PathExpr::lax(root().then(boolean()))), vec![json!(false)]);
    assert_eq!(q(&json!(7), &PathExpr::lax(root().then(boolean()))), vec![json!(true)]);
    // non-integral numerics are rejected
    assert_eq!(
        q_err(&json!(0.5), &PathExpr::lax(root().then(boolean()))).code(),
        ErrorCode::NonNumericSqlJsonItem
    );
}

#[test]
fn string_method() {
    assert_eq!(q(&json!(true), &PathExpr::lax(root().then(stringify()))), vec![json!("true")]);
    assert_eq!(q(&json!(1.5), &PathExpr::lax(root().then(stringify()))), vec![json!("1.5")]);
    assert_eq!(
        q_err(&json!([1]), &PathExpr::strict(root().then(stringify()))).code(),
        ErrorCode::NonNumericSqlJsonItem
    );
}

// --- keyvalue ---

#[test]
fn keyvalue_emits_pairs_with_distinct_ids() {
    let doc = json!({"a": 1, "b": 2});
    let out = q(&doc, &PathExpr::lax(root().then(keyvalue())));
    assert_eq!(out.len(), 2);
    assert_eq!(out[0]["key"], json!("a"));
    assert_eq!(out[0]["value"], json!(1));
    assert_eq!(out[1]["key"], json!("b"));
    assert_eq!(out[1]["value"], json!(2));
    assert_ne!(out[0]["id"], out[1]["id"]);
}

#[test]
fn keyvalue_ids_unique_across_objects() {
    let doc = json!({"a": {"x": 1}, "b": {"y": 2, "z": 3}});
    let out = q(&doc, &PathExpr::lax(root().then(any_key()).then(keyvalue())));
    let ids: Vec<_> = out.iter().map(|o| o["id"].clone()).collect();
    let mut dedup = ids.clone();
    dedup.sort_by_key(|v| v.to_string());
    dedup.dedup();
    assert_eq!(ids.len(), 3);
    assert_eq!(dedup.len(), ids.len(), "ids must be distinct: {ids:?}");
}

#[test]
fn keyvalue_chains_into_fields() {
    let doc = json!({"a": 1, "b": 2});
    let keys = q(&doc, &PathExpr::lax(root().then(keyvalue()).then(key("key"))));
    assert_eq!(keys, vec![json!("a"), json!("b")]);
    let vals = q(&doc, &PathExpr::lax(root().then(keyvalue()).then(key("value"))));
    assert_eq!(vals, vec![json!(1), json!(2)]);
}

#[test]
fn keyvalue_requires_an_object() {
    assert_eq!(
        q_err(&json!([1]), &PathExpr::strict(root().then(keyvalue()))).code(),
        ErrorCode::SqlJsonObjectNotFound
    );
}

// --- Datetimes ---

#[test]
fn date_method_parses_iso() {
    let doc = json!({"t": "2024-01-15"});
    let out = path_query_first(
        &doc,
        &PathExpr::lax(root().then(key("t")).then(date())),
        None,
        false,
        false,
    )
    .unwrap();
    assert_eq!(out, Some(json!("2024-01-15")));
}

#[test]
fn datetime_method_classifies_by_shape() {
    let path = |m| PathExpr::lax(root().then(m));
    assert_eq!(
        q(&json!("12:34:56"), &path(datetime(None))),
        vec![json!("12:34:56")]
    );
    assert_eq!(
        q(&json!("2024-01-15T08:00:00"), &path(datetime(None))),
        vec![json!("2024-01-15T08:00:00")]
    );
}

#[test]
fn datetime_type_names() {
    let doc = json!("2024-01-15");
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(date()).then(type_of()))),
        vec![json!("date")]
    );
    let doc = json!("12:00:00");
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(time(None)).then(type_of()))),
        vec![json!("time without time zone")]
    );
}

#[test]
fn datetime_with_template() {
    let doc = json!("15-01-2024");
    let out = q(&doc, &PathExpr::lax(root().then(datetime(Some("DD-MM-YYYY")))));
    assert_eq!(out, vec![json!("2024-01-15")]);
}

#[test]
fn timestamp_cast_to_date() {
    let doc = json!("2024-01-15 08:30:00");
    assert_eq!(
        q(&doc, &PathExpr::lax(root().then(date()))),
        vec![json!("2024-01-15")]
    );
}

#[test]
fn time_precision_rounds() {
    let doc = json!("12:34:56.789");
    let out = q(&doc, &PathExpr::lax(root().then(time(Some(2)))));
    let s = out[0].as_str().unwrap();
    assert!(s.starts_with("12:34:56.79"), "got {s}");
}

#[test]
fn unrecognized_datetime_input() {
    let doc = json!("not a date");
    let err = q_err(&doc, &PathExpr::lax(root().then(date())));
    assert_eq!(err.code(), ErrorCode::InvalidArgumentForSqlJsonDatetimeFunction);
}

#[test]
fn datetime_comparison_gates_on_tz() {
    // date against timestamptz needs timezone usage: a hard error that
    // even silent mode does not swallow
    let doc = json!({"x": "2024-01-15", "y": "2024-01-16 12:00:00+02:00"});
    let pred = filter(lt(
        current().then(key("x")).then(datetime(None)),
        current().then(key("y")).then(datetime(None)),
    ));
    let path = PathExpr::lax(root().then(pred));
    let err = path_query(&doc, &path, None, true, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::FeatureNotSupported);

    let out = path_query(&doc, &path, None, false, true).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn same_kind_datetime_comparison_needs_no_tz() {
    let doc = json!({"a": "2024-01-15", "b": "2024-02-01"});
    let path = PathExpr::lax(root().then(filter(lt(
        current().then(key("a")).then(date()),
        current().then(key("b")).then(date()),
    ))));
    assert_eq!(q(&doc, &path).len(), 1);
}

// --- Variables ---

#[test]
fn variables_from_json_object() {
    let doc = json!([1, 5, 9]);
    let vars = json!({"min": 4});
    let path = PathExpr::lax(
        root()
            .then(any_array())
            .then(filter(gt(current(), var("min")))),
    );
    let out = path_query(&doc, &path, Some(&vars), false, false).unwrap();
    assert_eq!(out, vec![json!(5), json!(9)]);
}

#[test]
fn undefined_variable_fails_even_when_silent() {
    let doc = json!(1);
    let path = PathExpr::lax(var("missing"));
    let err = path_query(&doc, &path, None, true, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UndefinedObject);
}

#[test]
fn vars_must_be_an_object() {
    let doc = json!(1);
    let path = PathExpr::lax(root());
    let err = path_query(&doc, &path, Some(&json!([1])), true, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParameterValue);
}

// --- Public operation shapes ---

#[test]
fn exists_verdicts() {
    let path_a = PathExpr::lax(root().then(key("a")));
    assert_eq!(path_exists(&json!({"a": 1}), &path_a, None, false, false).unwrap(), Some(true));
    assert_eq!(path_exists(&json!({"b": 1}), &path_a, None, false, false).unwrap(), Some(false));

    // strict: the missing member errors; silent turns that into Unknown
    let strict = PathExpr::strict(root().then(key("a")));
    assert_eq!(path_exists(&json!({"b": 1}), &strict, None, true, false).unwrap(), None);
    assert!(path_exists(&json!({"b": 1}), &strict, None, false, false).is_err());
}

#[test]
fn match_expects_single_boolean() {
    let doc = json!({"a": 1});
    let yes = PathExpr::lax(eq(root().then(key("a")), num(1)));
    assert_eq!(path_match(&doc, &yes, None, false, false).unwrap(), Some(true));
    let no = PathExpr::lax(eq(root().then(key("a")), num(2)));
    assert_eq!(path_match(&doc, &no, None, false, false).unwrap(), Some(false));
    let unknown = PathExpr::lax(eq(root().then(key("a")), string_lit("x")));
    assert_eq!(path_match(&doc, &unknown, None, false, false).unwrap(), None);

    let not_bool = PathExpr::lax(root());
    let err = path_match(&doc, &not_bool, None, false, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SingletonSqlJsonItemRequired);
    assert_eq!(path_match(&doc, &not_bool, None, true, false).unwrap(), None);
}

#[test]
fn query_array_and_first() {
    let doc = json!({"a": [1, 2]});
    let path = PathExpr::lax(root().then(key("a")).then(any_array()));
    assert_eq!(
        path_query_array(&doc, &path, None, false, false).unwrap(),
        Some(json!([1, 2]))
    );
    assert_eq!(
        path_query_first(&doc, &path, None, false, false).unwrap(),
        Some(json!(1))
    );
    let empty = PathExpr::lax(root().then(key("zz")));
    assert_eq!(path_query_first(&doc, &empty, None, false, false).unwrap(), None);
}

// --- SQL/JSON standard forms ---

#[test]
fn json_exists_with_typed_bindings() {
    let doc = json!({"scores": [3, 8]});
    let vars = BindingVars::new(vec![Binding::new("cut", BindingValue::Int(5))]);
    let path = PathExpr::lax(
        root()
            .then(key("scores"))
            .then(any_array())
            .then(filter(gt(current(), var("cut")))),
    );
    assert_eq!(json_exists(&doc, &path, &vars, false).unwrap(), Some(true));

    let vars = BindingVars::new(vec![Binding::new("cut", BindingValue::Int(50))]);
    assert_eq!(json_exists(&doc, &path, &vars, false).unwrap(), Some(false));
}

#[test]
fn json_query_wrapper_modes() {
    let doc = json!({"a": [1, 2]});
    let many = PathExpr::lax(root().then(key("a")).then(any_array()));
    let vars = BindingVars::default();

    assert_eq!(
        json_query(&doc, &many, &vars, Wrapper::Unconditional, false).unwrap(),
        Some(json!([1, 2]))
    );
    assert_eq!(
        json_query(&doc, &many, &vars, Wrapper::Conditional, false).unwrap(),
        Some(json!([1, 2]))
    );
    let err = json_query(&doc, &many, &vars, Wrapper::None, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MoreThanOneSqlJsonItem);
    assert_eq!(
        json_query(&doc, &many, &vars, Wrapper::None, true).unwrap(),
        None
    );

    let one = PathExpr::lax(root().then(key("a")));
    assert_eq!(
        json_query(&doc, &one, &vars, Wrapper::None, false).unwrap(),
        Some(json!([1, 2]))
    );
    assert_eq!(
        json_query(&doc, &one, &vars, Wrapper::Conditional, false).unwrap(),
        Some(json!([1, 2]))
    );
}

#[test]
fn json_value_returns_scalars_only() {
    let doc = json!({"a": 1, "arr": [1, 2], "n": null});
    let vars = BindingVars::default();

    assert_eq!(
        json_value(&doc, &PathExpr::lax(root().then(key("a"))), &vars, false).unwrap(),
        Some(json!(1))
    );
    assert_eq!(
        json_value(&doc, &PathExpr::lax(root().then(key("n"))), &vars, false).unwrap(),
        None
    );
    assert_eq!(
        json_value(&doc, &PathExpr::lax(root().then(key("zz"))), &vars, false).unwrap(),
        None
    );
    let err =
        json_value(&doc, &PathExpr::lax(root().then(key("arr"))), &vars, false).unwrap_err();
    assert_eq!(err.code(), ErrorCode::SqlJsonScalarRequired);
}

// --- Properties ---

proptest! {
    #[test]
    fn wildcard_preserves_array_order(xs in proptest::collection::vec(-1000i64..1000, 0..24)) {
        let doc = json!(xs);
        let path = PathExpr::lax(root().then(any_array()));
        let out = path_query(&doc, &path, None, false, false).unwrap();
        let expected: Vec<Json> = xs.iter().map(|x| json!(x)).collect();
        prop_assert_eq!(out, expected);
    }

    #[test]
    fn lax_wrap_is_idempotent_on_scalars(x in any::<i64>()) {
        // [*] over a non-array behaves exactly like the identity path
        let doc = json!(x);
        let wrapped = path_query(&doc, &PathExpr::lax(root().then(any_array())), None, false, false).unwrap();
        let plain = path_query(&doc, &PathExpr::lax(root()), None, false, false).unwrap();
        prop_assert_eq!(wrapped, plain);
    }
}
