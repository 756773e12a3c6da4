//! Integration tests for the evaluation engine.

use std::io;
use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;
use setql_core::model::{
    multiset_to_json, BindingExpr, Expr, Label, MultiSetVal, ObjectTp, OrderSpec, ResultTp, Shape,
    Tp, Val, CARD_ANY, CARD_AT_MOST_ONE, CARD_ONE,
};
use setql_core::{
    AmbiguityPolicy, DBSchema, Database, Engine, EngineConfig, EvalError, FuncDef, FuncParam,
    FuncSignature, MemoryDatabase,
};

struct TestContext {
    engine: Engine<MemoryDatabase>,
}

impl TestContext {
    fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    fn with_config(config: EngineConfig) -> Self {
        Self::with_schema(fixture_schema(), config)
    }

    fn with_schema(schema: DBSchema, config: EngineConfig) -> Self {
        init_tracing();
        Self {
            engine: Engine::new(MemoryDatabase::new(schema), config),
        }
    }

    fn run(&mut self, expr: &Expr) -> MultiSetVal {
        self.engine.execute(expr).unwrap()
    }

    fn run_err(&mut self, expr: &Expr) -> EvalError {
        self.engine.execute(expr).unwrap_err()
    }

    fn insert_person(&mut self, name: &str) {
        self.run(&insert("Person", vec![("name", Expr::lit(name))]));
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Collects formatted log lines written by a scoped subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn person_fields() -> ObjectTp {
    let friends = Tp::LinkProp {
        subject: Box::new(Tp::named("default::Person")),
        linkprop: ObjectTp::empty().with_field("since", ResultTp::new(Tp::int(), CARD_AT_MOST_ONE)),
    };
    let age = Tp::Default {
        tp: Box::new(Tp::int()),
        default: BindingExpr::new("p", Expr::lit(0i64)),
    };
    let shout = Tp::UncheckedComputable(BindingExpr::new(
        "p",
        Expr::call("str_upper", vec![Expr::proj(Expr::var("p"), "name")]),
    ));
    ObjectTp::empty()
        .with_field("name", ResultTp::new(Tp::str(), CARD_ONE))
        .with_field("age", ResultTp::new(age, CARD_ONE))
        .with_field("friends", ResultTp::new(friends, CARD_ANY))
        .with_field("shout", ResultTp::new(shout, CARD_ONE))
}

fn fixture_schema() -> DBSchema {
    DBSchema::with_std()
        .with_type("default::Person", person_fields())
        .with_type(
            "default::Student",
            person_fields().with_field("school", ResultTp::new(Tp::str(), CARD_AT_MOST_ONE)),
        )
        .with_subtype("default::Student", "default::Person")
}

fn insert(tname: &str, fields: Vec<(&str, Expr)>) -> Expr {
    Expr::Insert {
        tname: tname.into(),
        fields: fields
            .into_iter()
            .map(|(label, e)| (label.to_string(), e))
            .collect(),
    }
}

/// `select Person filter .name = <name>`
fn person_named(name: &str) -> Expr {
    Expr::filter(
        Expr::type_name("Person"),
        BindingExpr::new(
            "p",
            Expr::call("=", vec![Expr::proj(Expr::var("p"), "name"), Expr::lit(name)]),
        ),
    )
}

fn count(e: Expr) -> Expr {
    Expr::call("count", vec![e])
}

fn strs(m: &MultiSetVal) -> Vec<String> {
    m.vals()
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn strs_lit(items: &[&str]) -> Expr {
    Expr::MultiSet(items.iter().map(|s| Expr::lit(*s)).collect())
}

// ============== Tests ==============

#[test]
fn test_insert_then_scan_in_same_statement() {
    let mut ctx = TestContext::new();

    let stmt = Expr::with(
        insert("Person", vec![("name", Expr::lit("Ann"))]),
        "p",
        Expr::union(
            Expr::type_name("Person"),
            Expr::call(
                "=",
                vec![
                    Expr::proj(Expr::var("p"), "id"),
                    Expr::call("assert_single", vec![Expr::proj(Expr::type_name("Person"), "id")]),
                ],
            ),
        ),
    );
    let result = ctx.run(&stmt);
    let vals = result.vals();
    assert_eq!(vals.len(), 2);
    assert!(vals[0].is_ref());
    assert_eq!(vals[1], Val::bool(true));
}

#[test]
fn test_materialized_multiset_keeps_stale_reference() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.insert_person("Bob");

    let stmt = Expr::with(
        Expr::type_name("Person"),
        "everyone",
        Expr::with(Expr::Delete(Box::new(person_named("Ann"))), "gone", Expr::var("everyone")),
    );
    assert_eq!(ctx.run(&stmt).len(), 2);
    assert_eq!(ctx.run(&count(Expr::type_name("Person"))), MultiSetVal::singleton(Val::int(1)));
}

#[test]
fn test_deleting_a_stale_reference_is_a_no_op() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.insert_person("Bob");

    let twice = Expr::with(
        person_named("Ann"),
        "p",
        Expr::union(
            Expr::Delete(Box::new(Expr::var("p"))),
            Expr::Delete(Box::new(Expr::var("p"))),
        ),
    );
    assert_eq!(ctx.run(&twice).len(), 2);

    let everyone_after_delete = Expr::with(
        Expr::type_name("Person"),
        "everyone",
        Expr::with(
            Expr::Delete(Box::new(person_named("Bob"))),
            "gone",
            Expr::Delete(Box::new(Expr::var("everyone"))),
        ),
    );
    assert_eq!(ctx.run(&everyone_after_delete).len(), 1);
    assert_eq!(ctx.run(&count(Expr::type_name("Person"))), MultiSetVal::singleton(Val::int(0)));
}

#[test]
fn test_optional_for_runs_body_once_over_empty_bound() {
    let mut ctx = TestContext::new();
    let over = |bound: Expr| Expr::OptionalFor {
        bound: Box::new(bound),
        next: BindingExpr::new("x", count(Expr::var("x"))),
    };
    assert_eq!(ctx.run(&over(Expr::empty_set())), MultiSetVal::singleton(Val::int(0)));
    assert_eq!(
        ctx.run(&over(Expr::union(Expr::lit(1i64), Expr::lit(2i64)))),
        MultiSetVal::from(vec![Val::int(1), Val::int(1)])
    );
}

#[test]
fn test_if_else_selects_a_branch_per_condition_value() {
    let mut ctx = TestContext::new();
    let conditions = Expr::MultiSet(vec![Expr::lit(true), Expr::lit(false), Expr::lit(true)]);
    let stmt = Expr::if_else(conditions, Expr::lit(1i64), Expr::lit(2i64));
    assert_eq!(
        ctx.run(&stmt),
        MultiSetVal::from(vec![Val::int(1), Val::int(2), Val::int(1)])
    );
}

#[test]
fn test_if_else_rejects_non_boolean_condition() {
    let stmt = Expr::if_else(Expr::lit(1i64), Expr::lit("a"), Expr::lit("b"));

    let mut unchecked = TestContext::with_config(EngineConfig::default().type_check(false));
    assert!(unchecked.run_err(&stmt).is_usage());

    let mut checked = TestContext::new();
    assert!(checked.run_err(&stmt).is_usage());
}

#[test]
fn test_projection_on_deleted_object_fails() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");

    let stmt = Expr::with(
        person_named("Ann"),
        "ann",
        Expr::with(
            Expr::Delete(Box::new(Expr::var("ann"))),
            "gone",
            Expr::proj(Expr::var("ann"), "name"),
        ),
    );
    assert!(matches!(ctx.run_err(&stmt), EvalError::Database(_)));
    // The failed statement's delete was rolled back.
    assert_eq!(ctx.run(&count(Expr::type_name("Person"))), MultiSetVal::singleton(Val::int(1)));
}

#[test]
fn test_offset_and_limit() {
    let mut ctx = TestContext::new();

    let sliced = Expr::offset_limit(
        strs_lit(&["a", "b", "c", "d"]),
        Some(Expr::lit(2i64)),
        Some(Expr::lit(1i64)),
    );
    assert_eq!(strs(&ctx.run(&sliced)), vec!["c"]);

    let tail = Expr::offset_limit(strs_lit(&["a", "b", "c"]), Some(Expr::lit(1i64)), None);
    assert_eq!(strs(&ctx.run(&tail)), vec!["b", "c"]);

    let negative = Expr::offset_limit(strs_lit(&["a"]), Some(Expr::lit(-1i64)), None);
    assert!(ctx.run_err(&negative).is_usage());

    let ambiguous = Expr::offset_limit(
        strs_lit(&["a"]),
        None,
        Some(Expr::union(Expr::lit(1i64), Expr::lit(2i64))),
    );
    assert!(ctx.run_err(&ambiguous).is_usage());
}

#[test]
fn test_order_by_with_empty_keys() {
    let mut ctx = TestContext::new();
    for name in ["Cid", "Ann", "Bob"] {
        ctx.insert_person(name);
    }
    ctx.run(&insert(
        "Student",
        vec![("name", Expr::lit("Sam")), ("school", Expr::lit("MIT"))],
    ));

    let by_name_desc = Expr::FilterOrder {
        subject: Box::new(Expr::type_name("Person")),
        filter: BindingExpr::new("p", Expr::lit(true)),
        order: vec![OrderSpec::desc(BindingExpr::new(
            "p",
            Expr::proj(Expr::var("p"), "name"),
        ))],
    };
    let names = Expr::for_each(by_name_desc, "p", Expr::proj(Expr::var("p"), "name"));
    assert_eq!(strs(&ctx.run(&names)), vec!["Sam", "Cid", "Bob", "Ann"]);

    let sorted_students = |ctx: &mut TestContext, spec: OrderSpec| {
        let ordered = Expr::FilterOrder {
            subject: Box::new(Expr::type_name("Student")),
            filter: BindingExpr::new("s", Expr::lit(true)),
            order: vec![
                spec,
                OrderSpec::asc(BindingExpr::new("s", Expr::proj(Expr::var("s"), "name"))),
            ],
        };
        strs(&ctx.run(&Expr::for_each(ordered, "s", Expr::proj(Expr::var("s"), "name"))))
    };
    let school = || BindingExpr::new("s", Expr::proj(Expr::var("s"), "school"));
    ctx.run(&insert("Student", vec![("name", Expr::lit("Vic"))]));
    ctx.run(&insert(
        "Student",
        vec![("name", Expr::lit("Una")), ("school", Expr::lit("Yale"))],
    ));
    ctx.run(&insert("Student", vec![("name", Expr::lit("Tia"))]));

    // Empty keys go last in both directions.
    assert_eq!(
        sorted_students(&mut ctx, OrderSpec::asc(school()).empty_last()),
        vec!["Sam", "Una", "Tia", "Vic"]
    );
    assert_eq!(
        sorted_students(&mut ctx, OrderSpec::desc(school()).empty_last()),
        vec!["Una", "Sam", "Tia", "Vic"]
    );
    // Empty first flips with the direction.
    assert_eq!(
        sorted_students(&mut ctx, OrderSpec::asc(school())),
        vec!["Tia", "Vic", "Sam", "Una"]
    );
    assert_eq!(
        sorted_students(&mut ctx, OrderSpec::desc(school())),
        vec!["Una", "Sam", "Tia", "Vic"]
    );
}

#[test]
fn test_conditional_dedup() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.insert_person("Bob");

    let refs = Expr::with(
        person_named("Ann"),
        "a",
        Expr::with(
            person_named("Bob"),
            "b",
            Expr::ConditionalDedup(Box::new(Expr::MultiSet(vec![
                Expr::var("a"),
                Expr::var("a"),
                Expr::var("b"),
            ]))),
        ),
    );
    assert_eq!(ctx.run(&refs).len(), 2);

    let mixed = Expr::with(
        person_named("Ann"),
        "a",
        Expr::ConditionalDedup(Box::new(Expr::MultiSet(vec![
            Expr::var("a"),
            Expr::var("a"),
            Expr::lit(5i64),
        ]))),
    );
    assert_eq!(ctx.run(&mixed).len(), 3);
}

fn ambiguous_schema() -> DBSchema {
    let sig = || {
        FuncSignature::new(
            vec![FuncParam::singleton("x", Tp::Any)],
            ResultTp::new(Tp::str(), CARD_ONE),
        )
    };
    fixture_schema()
        .with_function("default::describe", FuncDef::defined(sig(), Expr::lit("first")))
        .with_function("default::describe", FuncDef::defined(sig(), Expr::lit("second")))
}

#[test]
fn test_ambiguous_overload_picks_first() {
    let mut ctx = TestContext::with_schema(ambiguous_schema(), EngineConfig::default());
    let call = Expr::call("describe", vec![Expr::lit(1i64)]);
    assert_eq!(strs(&ctx.run(&call)), vec!["first"]);
    // Deterministic across runs.
    assert_eq!(strs(&ctx.run(&call)), vec!["first"]);
}

#[test]
fn test_ambiguous_overload_logs_warning() {
    let mut ctx = TestContext::with_schema(ambiguous_schema(), EngineConfig::default());
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        ctx.run(&Expr::call("describe", vec![Expr::lit(1i64)]))
    });
    assert_eq!(strs(&result), vec!["first"]);

    let output = logs.contents();
    assert!(output.contains("WARN"), "{}", output);
    assert!(output.contains("ambiguous call"), "{}", output);
    assert!(output.contains("function=default::describe"), "{}", output);
    assert!(output.contains("candidates=2"), "{}", output);
}

#[test]
fn test_ambiguous_overload_rejected_when_configured() {
    let config = EngineConfig::default().ambiguity(AmbiguityPolicy::Reject);
    let mut ctx = TestContext::with_schema(ambiguous_schema(), config);
    let err = ctx.run_err(&Expr::call("describe", vec![Expr::lit(1i64)]));
    match err {
        EvalError::OverloadResolution {
            function,
            candidates,
            ..
        } => {
            assert_eq!(function, "default::describe");
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn test_user_defined_function_binds_parameters() {
    let double = FuncDef::defined(
        FuncSignature::new(
            vec![FuncParam::singleton("n", Tp::int())],
            ResultTp::new(Tp::int(), CARD_ONE),
        ),
        Expr::call("+", vec![Expr::var("n"), Expr::var("n")]),
    );
    let schema = fixture_schema().with_function("default::double", double);
    let mut ctx = TestContext::with_schema(schema, EngineConfig::default());

    // The caller's `n` does not leak into the body.
    let stmt = Expr::with(
        Expr::lit(100i64),
        "n",
        Expr::call("double", vec![Expr::union(Expr::lit(1i64), Expr::lit(2i64))]),
    );
    assert_eq!(ctx.run(&stmt), MultiSetVal::from(vec![Val::int(2), Val::int(4)]));
}

#[test]
fn test_pure_queries_are_idempotent() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.insert_person("Bob");

    let query = Expr::for_each(person_named("Bob"), "p", Expr::proj(Expr::var("p"), "name"));
    let first = ctx.run(&query);
    let second = ctx.run(&query);
    assert_eq!(first, second);
    assert_eq!(strs(&first), vec!["Bob"]);
}

#[test]
fn test_links_link_properties_and_backlinks() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");

    let friend = Expr::shaped(
        person_named("Ann"),
        Shape::new()
            .with_field(Label::link_prop("since"), BindingExpr::new("f", Expr::lit(2020i64))),
    );
    ctx.run(&insert("Person", vec![("name", Expr::lit("Bob")), ("friends", friend)]));

    let since = Expr::for_each(
        person_named("Bob"),
        "b",
        Expr::LinkPropProj {
            subject: Box::new(Expr::proj(Expr::var("b"), "friends")),
            linkprop: "since".into(),
        },
    );
    assert_eq!(ctx.run(&since), MultiSetVal::singleton(Val::int(2020)));

    let fans = Expr::proj(
        Expr::BackLink {
            subject: Box::new(person_named("Ann")),
            label: "friends".into(),
        },
        "name",
    );
    assert_eq!(strs(&ctx.run(&fans)), vec!["Bob"]);

    let missing = Expr::for_each(
        person_named("Bob"),
        "b",
        Expr::LinkPropProj {
            subject: Box::new(Expr::var("b")),
            linkprop: "since".into(),
        },
    );
    assert!(ctx.engine.execute(&missing).is_err());
}

#[test]
fn test_subtype_scan_and_intersection() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.run(&insert(
        "Student",
        vec![("name", Expr::lit("Sam")), ("school", Expr::lit("MIT"))],
    ));

    assert_eq!(ctx.run(&count(Expr::type_name("Person"))), MultiSetVal::singleton(Val::int(2)));
    assert_eq!(ctx.run(&count(Expr::type_name("Student"))), MultiSetVal::singleton(Val::int(1)));

    let students = Expr::proj(
        Expr::TpIntersect {
            subject: Box::new(Expr::type_name("Person")),
            tp: "Student".into(),
        },
        "name",
    );
    assert_eq!(strs(&ctx.run(&students)), vec!["Sam"]);
}

#[test]
fn test_defaults_and_computed_fields() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");

    let age = Expr::for_each(person_named("Ann"), "p", Expr::proj(Expr::var("p"), "age"));
    assert_eq!(ctx.run(&age), MultiSetVal::singleton(Val::int(0)));

    let shout = Expr::for_each(person_named("Ann"), "p", Expr::proj(Expr::var("p"), "shout"));
    assert_eq!(strs(&ctx.run(&shout)), vec!["ANN"]);
}

#[test]
fn test_update_writes_visible_shape_fields() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");

    let rename = Expr::Update {
        subject: Box::new(person_named("Ann")),
        shape: Shape::new().with_field(
            Label::str("name"),
            BindingExpr::new(
                "p",
                Expr::call("++", vec![Expr::proj(Expr::var("p"), "name"), Expr::lit("a")]),
            ),
        ),
    };
    let updated = ctx.run(&rename);
    assert_eq!(multiset_to_json(&updated), json!([{ "name": "Anna" }]));

    let names = Expr::proj(Expr::type_name("Person"), "name");
    assert_eq!(strs(&ctx.run(&names)), vec!["Anna"]);
}

#[test]
fn test_shape_on_scalar_is_usage_error() {
    let mut ctx = TestContext::new();
    let stmt = Expr::shaped(
        Expr::lit(1i64),
        Shape::new().with_field(Label::str("x"), BindingExpr::new("v", Expr::lit(2i64))),
    );
    assert!(ctx.run_err(&stmt).is_usage());
}

#[test]
fn test_failed_statement_discards_writes() {
    let mut ctx = TestContext::new();
    let failing = Expr::with(
        insert("Person", vec![("name", Expr::lit("Zed"))]),
        "p",
        Expr::call("assert_exists", vec![Expr::empty_set()]),
    );
    let outcome = ctx.engine.execute_all(&[
        insert("Person", vec![("name", Expr::lit("Ann"))]),
        failing,
        insert("Person", vec![("name", Expr::lit("Never"))]),
    ]);
    assert_eq!(outcome.results.len(), 1);
    let (idx, err) = outcome.error.expect("second statement fails");
    assert_eq!(idx, 1);
    assert!(err.is_usage());
    assert_eq!(ctx.engine.db().committed_len(), 1);
    assert_eq!(ctx.engine.db().query_ids_for_a_type(&"default::Person".into()).unwrap().len(), 1);
}

#[test]
fn test_trace_records_nested_evaluation() {
    let mut ctx = TestContext::with_config(EngineConfig::default().trace(true));
    let result = ctx.run(&Expr::call("+", vec![Expr::lit(1i64), Expr::lit(2i64)]));
    assert_eq!(result, MultiSetVal::singleton(Val::int(3)));

    let trace = ctx.engine.last_trace().expect("tracing enabled");
    assert_eq!(trace.roots().len(), 1);
    let root = &trace.roots()[0];
    assert_eq!(root.expr.kind_name(), "FunApp");
    assert_eq!(root.children.len(), 2);
    assert_eq!(root.result, Some(MultiSetVal::singleton(Val::int(3))));
}

#[test]
fn test_trace_is_cleared_when_a_statement_fails_type_checking() {
    let mut ctx = TestContext::with_config(EngineConfig::default().trace(true));
    ctx.run(&Expr::lit(1i64));
    assert!(ctx.engine.last_trace().is_some());

    assert!(ctx.run_err(&Expr::var("missing")).is_usage());
    assert!(ctx.engine.last_trace().is_none());
}

#[test]
fn test_trace_is_off_by_default() {
    let mut ctx = TestContext::new();
    ctx.run(&Expr::lit(1i64));
    assert!(ctx.engine.last_trace().is_none());
}

#[test]
fn test_run_time_resolution_without_type_check() {
    let mut ctx = TestContext::with_config(EngineConfig::default().type_check(false));
    ctx.insert_person("Ann");

    let sum = Expr::call("+", vec![Expr::lit(1.5f64), Expr::lit(2.5f64)]);
    assert_eq!(ctx.run(&sum), MultiSetVal::singleton(Val::float(4.0)));

    let single = Expr::call("assert_single", vec![Expr::lit(1i64)]);
    assert_eq!(ctx.run(&single), MultiSetVal::singleton(Val::int(1)));

    let upper = Expr::for_each(
        Expr::type_name("Person"),
        "p",
        Expr::call("str_upper", vec![Expr::proj(Expr::var("p"), "name")]),
    );
    assert_eq!(strs(&ctx.run(&upper)), vec!["ANN"]);

    let bad = Expr::call("+", vec![Expr::lit("a"), Expr::lit(1i64)]);
    assert!(matches!(ctx.run_err(&bad), EvalError::OverloadResolution { .. }));
}

#[test]
fn test_unresolved_cast_is_internal_error_without_type_check() {
    let mut ctx = TestContext::with_config(EngineConfig::default().type_check(false));
    let cast = Expr::TypeCast {
        tp: Tp::str(),
        arg: Box::new(Expr::lit(1i64)),
    };
    assert!(matches!(ctx.run_err(&cast), EvalError::InternalInvariant(_)));

    let mut checked = TestContext::new();
    assert_eq!(strs(&checked.run(&cast)), vec!["1"]);
}

#[test]
fn test_json_rendering_of_shaped_results() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");
    ctx.insert_person("Bob");

    let shaped = Expr::shaped(
        Expr::FilterOrder {
            subject: Box::new(Expr::type_name("Person")),
            filter: BindingExpr::new("p", Expr::lit(true)),
            order: vec![OrderSpec::asc(BindingExpr::new(
                "p",
                Expr::proj(Expr::var("p"), "name"),
            ))],
        },
        Shape::new()
            .with_field(
                Label::str("name"),
                BindingExpr::new("p", Expr::proj(Expr::var("p"), "name")),
            )
            .with_field(
                Label::str("upper"),
                BindingExpr::new(
                    "p",
                    Expr::call("str_upper", vec![Expr::proj(Expr::var("p"), "name")]),
                ),
            ),
    );
    assert_eq!(
        multiset_to_json(&ctx.run(&shaped)),
        json!([
            { "name": "Ann", "upper": "ANN" },
            { "name": "Bob", "upper": "BOB" }
        ])
    );
}

#[test]
fn test_shaped_fields_render_in_shape_order() {
    let mut ctx = TestContext::new();
    ctx.insert_person("Ann");

    let shaped = Expr::shaped(
        Expr::type_name("Person"),
        Shape::new()
            .with_field(
                Label::str("upper"),
                BindingExpr::new(
                    "p",
                    Expr::call("str_upper", vec![Expr::proj(Expr::var("p"), "name")]),
                ),
            )
            .with_field(
                Label::str("name"),
                BindingExpr::new("p", Expr::proj(Expr::var("p"), "name")),
            ),
    );
    assert_eq!(
        multiset_to_json(&ctx.run(&shaped)).to_string(),
        r#"[{"upper":"ANN","name":"Ann"}]"#
    );
}

#[test]
fn test_config_and_schema_from_json() {
    let config =
        EngineConfig::from_json_str(r#"{ "trace": true, "ambiguity": "reject" }"#).unwrap();
    assert!(config.trace);
    assert!(config.type_check);
    assert_eq!(config.ambiguity, AmbiguityPolicy::Reject);

    let schema = DBSchema::from_json_str(
        r#"{
            "types": {
                "default::Tag": {
                    "label": {
                        "tp": { "Scalar": "std::str" },
                        "mode": { "lower": "One", "upper": "One" }
                    }
                }
            }
        }"#,
    )
    .unwrap();
    let mut ctx = TestContext::with_schema(schema, EngineConfig::default());
    ctx.run(&insert("Tag", vec![("label", Expr::lit("red"))]));
    assert_eq!(strs(&ctx.run(&Expr::proj(Expr::type_name("Tag"), "label"))), vec!["red"]);
}
