//! Dispatch table registry, constant injection and object handles.

mod common;

use std::ffi::c_void;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use skald::{NativeFn, RegistryError, ScriptArg, ScriptOut, Value};

fn const_fn(n: f64) -> NativeFn {
    Rc::new(move |_vm, _args| Ok(Value::Num(n)))
}

#[test]
fn module_functions_are_callable_from_scripts() {
    let (mut rt, _, _) = common::test_runtime();
    rt.register_module("host", &[("ping", const_fn(1.0))]);
    rt.load_source("t", "r = host.ping()").unwrap();
    assert_eq!(rt.vm().get_global("r"), Some(Value::Num(1.0)));
}

#[test]
fn extend_overwrites_last_registration_wins() {
    let (mut rt, _, _) = common::test_runtime();
    rt.register_module("host", &[("ping", const_fn(1.0))]);

    let mut out = 0i32;
    rt.call("host", "ping", ":d", &[], &mut [ScriptOut::Int(&mut out)])
        .unwrap();
    assert_eq!(out, 1);

    rt.extend_module("host", &[("ping", const_fn(2.0)), ("pong", const_fn(3.0))])
        .unwrap();

    rt.call("host", "ping", ":d", &[], &mut [ScriptOut::Int(&mut out)])
        .unwrap();
    assert_eq!(out, 2);
    rt.call("host", "pong", ":d", &[], &mut [ScriptOut::Int(&mut out)])
        .unwrap();
    assert_eq!(out, 3);

    rt.extend_module("host", &[("ping", const_fn(4.0))]).unwrap();
    rt.call("host", "ping", ":d", &[], &mut [ScriptOut::Int(&mut out)])
        .unwrap();
    assert_eq!(out, 4);
}

#[test]
fn extending_a_missing_module_is_a_recoverable_error() {
    let (mut rt, _, _) = common::test_runtime();
    let err = rt
        .extend_module("ghost", &[("f", const_fn(0.0))])
        .unwrap_err();
    assert_eq!(err, RegistryError::UnknownModule("ghost".to_string()));
}

#[test]
fn global_constants() {
    let (mut rt, _, _) = common::test_runtime();
    rt.register_consts("", &[("MAX_THINGS", 77), ("MIN_THINGS", -3)]);
    rt.load_source("t", "a = MAX_THINGS\nb = MIN_THINGS").unwrap();
    assert_eq!(rt.vm().get_global("a"), Some(Value::Num(77.0)));
    assert_eq!(rt.vm().get_global("b"), Some(Value::Num(-3.0)));
}

#[test]
fn module_constants_create_or_reuse_the_table() {
    let (mut rt, _, _) = common::test_runtime();

    // absent module table: created
    rt.register_consts("limits", &[("HIGH", 10)]);
    rt.load_source("t1", "a = limits.HIGH").unwrap();
    assert_eq!(rt.vm().get_global("a"), Some(Value::Num(10.0)));

    // existing module table: merged alongside its functions
    rt.register_module("host", &[("ping", const_fn(1.0))]);
    rt.register_consts("host", &[("RETRIES", 5)]);
    rt.load_source("t2", "b = host.RETRIES\nc = host.ping()").unwrap();
    assert_eq!(rt.vm().get_global("b"), Some(Value::Num(5.0)));
    assert_eq!(rt.vm().get_global("c"), Some(Value::Num(1.0)));
}

struct Widget {
    side: f64,
}

fn widget_area() -> NativeFn {
    Rc::new(|_vm, args| {
        let ptr = args
            .first()
            .and_then(|v| v.object_ptr())
            .ok_or_else(|| skald::RuntimeError::new("area: receiver is not an object"))?;
        let widget = unsafe { &*(ptr as *const Widget) };
        Ok(Value::Num(widget.side * widget.side))
    })
}

#[test]
fn wrap_is_lazy_and_survives_late_registration() {
    let (mut rt, _, _) = common::test_runtime();

    let mut w = Widget { side: 4.0 };
    let ptr = &mut w as *mut Widget as *mut c_void;
    let handle = rt.wrap(ptr, "Widget");
    rt.vm_mut().set_global("w", handle);

    // type not registered yet: field access resolves to nil, no error
    rt.load_source("probe1", "before = w.area == nil").unwrap();
    assert_eq!(rt.vm().get_global("before"), Some(Value::Bool(true)));

    rt.register_module("Widget", &[("area", widget_area())]);

    // the same handle resolves now, without re-wrapping
    rt.load_source("probe2", "after = w:area()").unwrap();
    assert_eq!(rt.vm().get_global("after"), Some(Value::Num(16.0)));
}

#[test]
fn object_arguments_delegate_by_type_name() {
    let (mut rt, _, _) = common::test_runtime();
    rt.register_module("Widget", &[("area", widget_area())]);
    rt.load_source("t", "function measure(obj) return obj:area() end")
        .unwrap();

    let mut w = Widget { side: 3.0 };
    let ptr = &mut w as *mut Widget as *mut c_void;

    let mut out = 0i32;
    rt.call(
        "",
        "measure",
        "p:d",
        &[ScriptArg::Obj(ptr, "Widget")],
        &mut [ScriptOut::Int(&mut out)],
    )
    .unwrap();
    assert_eq!(out, 9);
}

#[test]
fn bare_pointers_delegate_through_the_global_table() {
    let (mut rt, _, _) = common::test_runtime();
    rt.register_global(&[("tag", const_fn(99.0))]);
    rt.load_source("t", "function probe(p) return p:tag() end").unwrap();

    let mut x = 0u8;
    let ptr = &mut x as *mut u8 as *mut c_void;
    let mut out = 0i32;
    rt.call(
        "",
        "probe",
        "P:d",
        &[ScriptArg::Ptr(ptr)],
        &mut [ScriptOut::Int(&mut out)],
    )
    .unwrap();
    assert_eq!(out, 99);
}
