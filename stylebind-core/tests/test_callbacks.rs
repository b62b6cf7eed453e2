use parking_lot::Mutex;
use std::sync::Arc;
use stylebind::{CallState, NativeValue, Number, Session, Severity, TaggedValue, TargetShape};
use stylebind_runtime::interop::{NativeFn, Rgba};

/// Register `signature` with a callback that stores what `decode` produced
fn capture<T, D>(session: &mut Session, signature: &str, decode: D) -> Arc<Mutex<Option<T>>>
where
    T: Send + 'static,
    D: Fn(&stylebind::CallContext<'_>) -> T + Send + 'static,
{
    let slot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    session
        .register(signature, move |ctx| {
            *sink.lock() = Some(decode(ctx));
            Ok(())
        })
        .unwrap();
    slot
}

#[test]
fn test_mixed_arguments_decode_element_wise() {
    let mut session = Session::new();
    let seen = capture(&mut session, "foo($null, $num, $str, $bool)", |ctx| {
        ctx.unmarshal::<(NativeValue, Number, String, bool)>().unwrap()
    });

    let css = session
        .compile(
            "// line comment\n\
             div {\n  a: foo(null, 3px, \"asdf\", false);\n}",
        )
        .unwrap();
    assert_eq!(css, "");

    let (null, num, text, flag) = seen.lock().take().unwrap();
    assert_eq!(null, NativeValue::Null);
    assert_eq!(null.to_string(), "<nil>");
    assert_eq!(num, Number::new(3.0, "px"));
    assert_eq!(text, "asdf");
    assert!(!flag);
}

#[test]
fn test_color_argument_has_full_alpha() {
    let mut session = Session::new();
    let seen = capture(&mut session, "foo($color)", |ctx| ctx.unmarshal::<Rgba>().unwrap());

    session.compile("div { a: foo(#005500); }").unwrap();

    assert_eq!(seen.lock().take(), Some(Rgba::new(0, 0x55, 0, 255)));
}

#[test]
fn test_single_list_argument_decodes_as_any() {
    let mut session = Session::new();
    let seen = capture(&mut session, "foo($list)", |ctx| {
        (ctx.arity(), ctx.decode(&TargetShape::Any).unwrap())
    });

    session.compile("div { a: foo((a, b, 1mm, #003300)); }").unwrap();

    let (arity, value) = seen.lock().take().unwrap();
    assert_eq!(arity, 1);
    assert_eq!(
        value,
        NativeValue::Seq(vec![
            NativeValue::str("a"),
            NativeValue::str("b"),
            NativeValue::number(1.0, "mm"),
            NativeValue::Color(Rgba::opaque(0, 0x33, 0)),
        ])
    );
}

#[test]
fn test_arity_mismatch_diagnostic() {
    let mut session = Session::new();
    session.register("foo()", |_| Ok(())).unwrap();

    let err = session
        .compile("div {\n  color: red(blue);\n  background: foo(1pt, 2cm);\n}")
        .unwrap_err();

    assert_eq!(err.severity, Severity::Error);
    assert_eq!(err.message, "function foo only takes 0 arguments; given 2");
    assert_eq!(err.line, 3);
    assert_eq!(
        err.render(),
        "Error > stdin:3\n\
         function foo only takes 0 arguments; given 2\n  \
         color: red(blue);\n  \
         background: foo(1pt, 2cm);\n\
         }\n"
    );
    assert_eq!(err.to_string(), err.render());
    assert_eq!(session.registry().stats().arity_failures, 1);
    assert_eq!(session.registry().stats().calls, 0);
}

#[test]
fn test_reregistration_replaces_callback() {
    let mut session = Session::new();
    let old_calls = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&old_calls);

    session
        .register("foo()", move |ctx| {
            *counter.lock() += 1;
            ctx.set_output(TaggedValue::unquoted("old"));
            Ok(())
        })
        .unwrap();
    let replaced = session
        .register("foo()", |ctx| {
            ctx.set_output(TaggedValue::unquoted("new"));
            Ok(())
        })
        .unwrap();
    assert_eq!(replaced.map(|sig| sig.name().to_string()), Some("foo".to_string()));

    let css = session.compile("a { b: foo(); }").unwrap();
    assert_eq!(css, "a {\n  b: new;\n}\n");
    assert_eq!(*old_calls.lock(), 0);
}

#[test]
fn test_unencodable_return_aborts_without_output() {
    let mut session = Session::new();
    session
        .register("leak()", |ctx| {
            // Error ignored on purpose; the failure is still reported
            let _ = ctx.return_native(&NativeValue::Function(NativeFn::new(|_| NativeValue::Null)));
            Ok(())
        })
        .unwrap();

    let err = session
        .compile("a { b: c; }\nd { e: leak(); }")
        .unwrap_err();
    assert_eq!(
        err.message,
        "function leak returned an unsupported value: unsupported native type: function"
    );
    assert_eq!(err.line, 2);
    assert_eq!(
        session.registry().get("leak").map(|r| r.state()),
        Some(CallState::Faulted)
    );
}

#[test]
fn test_return_values_are_printed() {
    let mut session = Session::new();
    session
        .register("pair($a, $b)", |ctx| {
            let (a, b): (Number, Number) = ctx.unmarshal()?;
            ctx.return_value(&vec![
                Number::new(a.value + b.value, a.unit.clone()),
                Number::new(a.value * b.value, a.unit),
            ])?;
            Ok(())
        })
        .unwrap();
    session
        .register("shade($c)", |ctx| {
            let c: Rgba = ctx.unmarshal()?;
            ctx.return_value(&Rgba::new(c.r / 2, c.g / 2, c.b / 2, 128))?;
            Ok(())
        })
        .unwrap();

    let css = session
        .compile("a { b: pair(2px, 3); c: shade(#ff8040); }")
        .unwrap();
    assert_eq!(
        css,
        "a {\n  b: 5px, 6px;\n  c: rgba(127, 64, 32, 0.50196);\n}\n"
    );
}

#[test]
fn test_decode_failure_is_a_callback_error() {
    let mut session = Session::new();
    session
        .register("needs_color($c)", |ctx| {
            let _: Rgba = ctx.unmarshal()?;
            Ok(())
        })
        .unwrap();

    let err = session.compile("a { b: needs_color(3px); }").unwrap_err();
    assert!(err.message.starts_with("error in function needs_color: "));
}

#[test]
fn test_fallback_after_failed_encode_is_emitted() {
    let mut session = Session::new();
    session
        .register("pick()", |ctx| {
            let native = NativeValue::Function(NativeFn::new(|_| NativeValue::Null));
            if ctx.return_native(&native).is_err() {
                ctx.set_output(TaggedValue::unquoted("fallback"));
            }
            Ok(())
        })
        .unwrap();

    let css = session.compile("a { b: pick(); }").unwrap();
    assert_eq!(css, "a {\n  b: fallback;\n}\n");
}
