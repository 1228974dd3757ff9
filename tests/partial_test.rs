use serde_json::json;
use ubars::{Engine, TplError, partial_assets};

#[test]
fn test_registered_partial() {
    let engine = Engine::new();
    engine.register_partial("greeting", "hi");
    assert_eq!(engine.render("{{> greeting}}", &json!({})).unwrap(), "hi");
}

#[test]
fn test_partial_sees_current_scope() {
    let engine = Engine::new();
    engine.register_partial("row", "<td>{{name}}#{{@index}}</td>");
    let out = engine
        .render(
            "{{#each users}}{{> row}}{{/each}}",
            &json!({"users": [{"name": "a"}, {"name": "b"}]}),
        )
        .unwrap();
    assert_eq!(out, "<td>a#0</td><td>b#1</td>");
}

#[test]
fn test_partial_context_is_merged() {
    let engine = Engine::new();
    engine.register_partial("card", "{{title}} by {{author}}");
    let ctx = json!({"title": "outer", "author": "Ada", "post": {"title": "inner"}});

    assert_eq!(engine.render("{{> card post}}", &ctx).unwrap(), "inner by Ada");
    // a non-map argument keeps the current scope
    assert_eq!(engine.render("{{> card author}}", &ctx).unwrap(), "outer by Ada");
}

#[test]
fn test_nested_partials() {
    let engine = Engine::builder()
        .partial("layout", "<main>{{> body}}</main>")
        .partial("body", "<p>{{text}}</p>")
        .build();
    let out = engine.render("{{> layout}}", &json!({"text": "x"})).unwrap();
    assert_eq!(out, "<main><p>x</p></main>");
}

#[test]
fn test_same_partial_twice_is_not_a_cycle() {
    let engine = Engine::new();
    engine.register_partial("dot", ".");
    engine.register_partial("dots", "{{> dot}}{{> dot}}");
    assert_eq!(engine.render("{{> dots}}{{> dot}}", &json!({})).unwrap(), "...");
}

#[test]
fn test_partial_cycle_is_detected() {
    let engine = Engine::new();
    engine.register_partial("a", "A{{> b}}");
    engine.register_partial("b", "B{{> a}}");

    let err = engine.render("{{> a}}", &json!({})).unwrap_err();
    match err {
        TplError::Render { name, message, .. } => {
            assert_eq!(name, "a");
            assert_eq!(message, "partial cycle detected: a");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    engine.register_partial("self", "{{> self}}");
    let err = engine.render("{{> self}}", &json!({})).unwrap_err();
    assert!(err.to_string().contains("partial cycle detected: self"));
}

#[test]
fn test_register_partial_overwrites() {
    let engine = Engine::new();
    engine.register_partial("p", "old");
    engine.register_partial("p", "new");
    assert_eq!(engine.render("{{> p}}", &json!({})).unwrap(), "new");
}

#[test]
fn test_load_partials_from_glob() {
    let engine = Engine::new();
    let count = engine
        .load_partials(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/partials/*.hbs"))
        .unwrap();
    assert_eq!(count, 2);
    assert!(engine.has_partial("greeting"));
    assert!(engine.has_partial("card"));

    let out = engine
        .render("{{> greeting}} {{> card}}", &json!({"name": "Ada", "title": "T"}))
        .unwrap();
    assert_eq!(out, "hi Ada <div class=\"card\">T</div>");
}

#[test]
fn test_load_partials_missing_dir_registers_nothing() {
    let engine = Engine::new();
    let count = engine.load_partials("no/such/dir/*.hbs").unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_embedded_partial_assets() {
    let engine = Engine::new();
    let count = engine
        .register_partial_assets(partial_assets!("tests/partials/*.hbs"))
        .unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        engine.render("{{> greeting}}", &json!({"name": "Bob"})).unwrap(),
        "hi Bob"
    );
}
