use serde_json::json;
use std::thread;
use ubars::{Engine, Helper, Value};

#[test]
fn test_shared_engine_across_threads() {
    let engine = Engine::new();
    engine.register_partial("item", "<{{this}}>");
    let src = "{{#each items}}{{> item}}{{/each}}";

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let engine = engine.clone();
            thread::spawn(move || {
                let ctx = json!({"items": [t, t + 1]});
                for _ in 0..50 {
                    let out = engine.render(src, &ctx).unwrap();
                    assert_eq!(out, format!("&lt;{}&gt;&lt;{}&gt;", t, t + 1));
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let stats = engine.cache_stats();
    // the template and the partial
    assert_eq!(stats.size, 2);
    assert_eq!(stats.total_usage, 8 * 50 * 3);
}

#[test]
fn test_register_while_rendering() {
    let engine = Engine::new();
    let writer = {
        let engine = engine.clone();
        thread::spawn(move || {
            for i in 0..100 {
                engine.register_helper(
                    format!("h{}", i),
                    Helper::inline(move |_| Ok(Value::I64(i))),
                );
                engine.register_partial(format!("p{}", i), format!("{}", i));
            }
        })
    };
    for _ in 0..100 {
        engine.render("{{#if x}}{{x}}{{/if}}", &json!({"x": 1})).unwrap();
    }
    writer.join().unwrap();

    assert!(engine.has_helper("h99"));
    assert_eq!(engine.render("{{h42 x}}-{{> p7}}", &json!({"x": 0})).unwrap(), "42-7");
}
