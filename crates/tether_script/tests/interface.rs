use std::sync::Arc;
use tether_core::{Depot, ErrorKind, HostValue, MarshalError, TypeDescriptor};
use tether_script::{ScriptError, ScriptRuntime};

const SCRIPT: &str = r#"
var greeter = {
    prefix: 'Hi ',
    closed: false,
    greet(name) { return this.prefix + name; },
    add(a, b) { return a + b; },
    close() { this.closed = true; },
};

var factory = {
    make(prefix) {
        return { prefix: prefix, greet(name) { return this.prefix + name; }, add(a, b) { return a - b; } };
    },
};

function isGreeter(g) { return g === greeter; }
"#;

fn greeter() -> TypeDescriptor {
    TypeDescriptor::interface("Greeter")
        .method("greet", vec![TypeDescriptor::String], TypeDescriptor::String)
        .method("add", vec![TypeDescriptor::Int, TypeDescriptor::Int], TypeDescriptor::Int)
        .method("close", Vec::new(), TypeDescriptor::Void)
        .build()
}

fn factory() -> TypeDescriptor {
    TypeDescriptor::interface("Factory")
        .method("make", vec![TypeDescriptor::String], greeter())
        .build()
}

fn runtime(inline_limit: usize) -> ScriptRuntime {
    let depot = Depot::builder().inline_limit(inline_limit).build();
    let rt = ScriptRuntime::with_depot(Arc::new(depot)).unwrap();
    rt.execute(SCRIPT).unwrap();
    rt
}

fn text(s: &str) -> HostValue {
    HostValue::String(s.into())
}

#[test]
fn test_methods_run_with_object_as_this() {
    let rt = runtime(8192);
    let greeter = rt.evaluate_object("greeter", &greeter()).unwrap();
    assert_eq!(rt.handles().len(), 1);

    assert_eq!(greeter.call("greet", &[text("Ada")]).unwrap(), text("Hi Ada"));
    assert_eq!(
        greeter.call("add", &[HostValue::Int(2), HostValue::Int(40)]).unwrap(),
        HostValue::Int(42)
    );

    // State changes on the script side are visible through the same handle
    rt.execute("greeter.prefix = 'Hello ';").unwrap();
    assert_eq!(greeter.call("greet", &[text("Ada")]).unwrap(), text("Hello Ada"));

    drop(greeter);
    assert!(rt.handles().is_empty());
}

#[test]
fn test_call_checks_signature() {
    let rt = runtime(8192);
    let greeter = rt.get_object("greeter", &greeter()).unwrap();

    let err = greeter.call("add", &[HostValue::Int(1)]).unwrap_err();
    assert_eq!(
        err.as_marshal(),
        Some(&MarshalError::ArityMismatch {
            method: "add".into(),
            expected: 2,
            found: 1
        })
    );

    let err = greeter.call("shout", &[]).unwrap_err();
    assert_eq!(
        err.as_marshal(),
        Some(&MarshalError::NoMethod {
            interface: "Greeter".into(),
            method: "shout".into()
        })
    );

    let err = greeter.call("greet", &[HostValue::Int(1)]).unwrap_err();
    assert_eq!(err.as_marshal().map(MarshalError::kind), Some(ErrorKind::TypeMismatch));
}

#[test]
fn test_result_of_wrong_kind() {
    let rt = runtime(8192);
    rt.execute("greeter.add = function () { return 'oops'; };").unwrap();
    let greeter = rt.evaluate_object("greeter", &greeter()).unwrap();

    let err = greeter.call("add", &[HostValue::Int(1), HostValue::Int(2)]).unwrap_err();
    assert_eq!(err.as_marshal().map(MarshalError::kind), Some(ErrorKind::TypeMismatch));
}

#[test]
fn test_missing_script_method_is_engine_error() {
    let rt = runtime(8192);
    let greeter = rt.evaluate_object("({ greet(n) { return n; } })", &greeter()).unwrap();
    let err = greeter.call("add", &[HostValue::Int(1), HostValue::Int(2)]).unwrap_err();
    assert!(matches!(err, ScriptError::Engine(_)));
}

#[test]
fn test_close_calls_script_and_releases() {
    let rt = runtime(8192);
    let greeter = rt.evaluate_object("greeter", &greeter()).unwrap();
    greeter.close().unwrap();

    assert!(rt.evaluate::<bool>("greeter.closed").unwrap());
    assert!(rt.handles().is_empty());
}

#[test]
fn test_non_object_is_rejected() {
    let rt = runtime(8192);
    let err = rt.evaluate_object("42", &greeter()).unwrap_err();
    assert_eq!(err.as_marshal().map(MarshalError::kind), Some(ErrorKind::TypeMismatch));
    assert!(rt.handles().is_empty());
}

#[test]
fn test_methods_returning_objects() {
    let rt = runtime(8192);
    let factory = rt.evaluate_object("factory", &factory()).unwrap();

    let made = factory.call("make", &[text("Yo ")]).unwrap();
    let made = rt.adopt(&greeter(), made).unwrap();
    assert_eq!(made.call("greet", &[text("Bo")]).unwrap(), text("Yo Bo"));
    assert_eq!(
        made.call("add", &[HostValue::Int(5), HostValue::Int(3)]).unwrap(),
        HostValue::Int(2)
    );
    assert_eq!(rt.handles().len(), 2);
}

#[test]
fn test_handles_pass_back_by_identity() {
    for limit in [8192, 0] {
        let rt = runtime(limit);
        let object = rt.evaluate_object("greeter", &greeter()).unwrap();

        let same = rt
            .call_function_as("isGreeter", &[(greeter(), object.to_host())], &TypeDescriptor::Boolean)
            .unwrap();
        assert_eq!(same, HostValue::Bool(true));

        let holder = TypeDescriptor::record("Holder")
            .field("label", TypeDescriptor::String)
            .field("target", greeter())
            .build();
        let value = rt
            .evaluate_as("({ label: 'main', target: greeter })", &holder)
            .unwrap();
        assert_eq!(value.field("label"), Some(&text("main")));

        rt.set_as("copy", &holder, &value).unwrap();
        assert!(rt.evaluate::<bool>("copy.target === greeter").unwrap());

        let target = value.field("target").cloned().unwrap();
        let target = rt.adopt(&greeter(), target).unwrap();
        assert_eq!(target.call("greet", &[text("Cy")]).unwrap(), text("Hi Cy"));
    }
}

#[test]
fn test_adopt_requires_handle() {
    let rt = runtime(8192);
    let err = rt.adopt(&greeter(), HostValue::Int(3)).unwrap_err();
    assert_eq!(
        err.as_marshal(),
        Some(&MarshalError::HostMismatch {
            found: "int",
            expected: "handle"
        })
    );
}
