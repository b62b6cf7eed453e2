use std::collections::HashSet;
use std::thread;
use stylebind::{compile, Config, Number, Session, TaggedValue};

fn scaled_session(factor: f64) -> Session {
    let mut session = Session::new();
    session
        .register("scale($n)", move |ctx| {
            let n: Number = ctx.unmarshal()?;
            ctx.return_value(&Number::new(n.value * factor, n.unit))?;
            Ok(())
        })
        .unwrap();
    session
}

#[test]
fn test_sessions_have_distinct_ids() {
    let ids: HashSet<u64> = (0..16).map(|_| Session::new().info().id).collect();
    assert_eq!(ids.len(), 16);
}

#[test]
fn test_registries_are_isolated() {
    let mut doubling = scaled_session(2.0);
    let mut plain = Session::new();

    assert_eq!(
        doubling.compile("a { w: scale(4px); }").unwrap(),
        "a {\n  w: 8px;\n}\n"
    );
    // Not registered here, so printed as a plain function
    assert_eq!(
        plain.compile("a { w: scale(4px); }").unwrap(),
        "a {\n  w: scale(4px);\n}\n"
    );
    assert_eq!(plain.registry().stats().calls, 0);
}

#[test]
fn test_concurrent_sessions() {
    let handles: Vec<_> = (1..=8usize)
        .map(|factor| {
            thread::spawn(move || {
                let mut session = scaled_session(factor as f64);
                let mut outputs = Vec::new();
                for i in 0..50 {
                    let source = format!("a {{ w: scale({}px); }}", i);
                    outputs.push(compile(&source, &mut session).unwrap());
                }
                (factor, session.info().id, session.registry().stats().calls, outputs)
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        let (factor, id, calls, outputs) = handle.join().unwrap();
        assert!(ids.insert(id));
        assert_eq!(calls, 50);
        for (i, css) in outputs.iter().enumerate() {
            assert_eq!(css, &format!("a {{\n  w: {}px;\n}}\n", i * factor));
        }
    }
}

#[test]
fn test_session_info_reaches_callbacks() {
    let mut config = Config::default();
    config.compile.source_name = "widgets.scss".to_string();
    let mut session = Session::with_config(config);
    let id = session.info().id;

    session
        .register("origin()", |ctx| {
            let origin = format!("{}#{}", ctx.session().source_name, ctx.session().id);
            ctx.set_output(TaggedValue::quoted(origin));
            Ok(())
        })
        .unwrap();

    let css = session.compile("a { content: origin(); }").unwrap();
    assert_eq!(css, format!("a {{\n  content: \"widgets.scss#{}\";\n}}\n", id));
}
