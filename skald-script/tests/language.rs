//! End-to-end language semantics: compile source, run it, inspect globals.

use std::rc::Rc;

use pretty_assertions::assert_eq;

use skald_script::{compile, NativeFn, RuntimeError, Table, Value, Vm};

fn run(vm: &mut Vm, src: &str) {
    let func = compile(src, "test").expect("compile");
    vm.exec(func).expect("exec");
}

fn run_err(vm: &mut Vm, src: &str) -> RuntimeError {
    let func = compile(src, "test").expect("compile");
    vm.exec(func).expect_err("should raise")
}

fn num(vm: &Vm, name: &str) -> f64 {
    match vm.get_global(name) {
        Some(Value::Num(n)) => n,
        other => panic!("global {} is {:?}", name, other),
    }
}

fn text(vm: &Vm, name: &str) -> String {
    match vm.get_global(name) {
        Some(Value::Str(s)) => s.to_string(),
        other => panic!("global {} is {:?}", name, other),
    }
}

#[test]
fn arithmetic_precedence() {
    let mut vm = Vm::new();
    run(&mut vm, "x = 1 + 2 * 3 - 4 / 2");
    assert_eq!(num(&vm, "x"), 5.0);
}

#[test]
fn concat_coerces_numbers() {
    let mut vm = Vm::new();
    run(&mut vm, r#"s = "v=" .. 2 .. "!""#);
    assert_eq!(text(&vm, "s"), "v=2!");
}

#[test]
fn branches() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
function grade(n)
  if n >= 90 then
    return "a"
  elseif n >= 60 then
    return "b"
  else
    return "c"
  end
end
g1 = grade(95)
g2 = grade(70)
g3 = grade(10)
"#,
    );
    assert_eq!(text(&vm, "g1"), "a");
    assert_eq!(text(&vm, "g2"), "b");
    assert_eq!(text(&vm, "g3"), "c");
}

#[test]
fn while_loop_with_locals() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
local i = 1
total = 0
while i <= 10 do
  total = total + i
  i = i + 1
end
"#,
    );
    assert_eq!(num(&vm, "total"), 55.0);
}

#[test]
fn locals_shadow_globals() {
    let mut vm = Vm::new();
    run(&mut vm, "x = 1\nlocal x = 2\ny = x");
    assert_eq!(num(&vm, "x"), 1.0);
    assert_eq!(num(&vm, "y"), 2.0);
}

#[test]
fn function_calls() {
    let mut vm = Vm::new();
    run(&mut vm, "function add(a, b) return a + b end\nr = add(3, 4)");
    assert_eq!(num(&vm, "r"), 7.0);
}

#[test]
fn missing_arguments_become_nil() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        "function probe(a, b) return a == nil, b == nil end\nx = probe(1)",
    );
    // expression calls take the first result only
    assert_eq!(vm.get_global("x"), Some(Value::Bool(false)));
}

#[test]
fn multi_return_through_pcall() -> anyhow::Result<()> {
    let mut vm = Vm::new();
    run(&mut vm, "function pair() return 1, 2 end");
    let pair = vm.get_global("pair").expect("pair");
    vm.push(pair);
    vm.pcall(0, 2)?;
    assert_eq!(vm.depth(), 2);
    assert_eq!(vm.get(0), Some(&Value::Num(1.0)));
    assert_eq!(vm.get(1), Some(&Value::Num(2.0)));
    Ok(())
}

#[test]
fn pcall_pads_missing_results_with_nil() {
    let mut vm = Vm::new();
    run(&mut vm, "function one() return 1 end");
    let one = vm.get_global("one").expect("one");
    vm.push(one);
    vm.pcall(0, 3).expect("pcall");
    assert_eq!(vm.depth(), 3);
    assert_eq!(vm.get(2), Some(&Value::Nil));
}

#[test]
fn table_constructor_and_fields() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
config = { width = 1024, title = "hello" }
config.height = 768
w = config.width
h = config.height
t = config.title
missing = config.nope == nil
"#,
    );
    assert_eq!(num(&vm, "w"), 1024.0);
    assert_eq!(num(&vm, "h"), 768.0);
    assert_eq!(text(&vm, "t"), "hello");
    assert_eq!(vm.get_global("missing"), Some(Value::Bool(true)));
}

#[test]
fn method_call_passes_receiver() {
    let mut vm = Vm::new();
    let second: NativeFn = Rc::new(|_vm, args| {
        // args[0] is the receiver
        Ok(args.get(1).cloned().unwrap_or(Value::Nil))
    });
    let mut table = Table::new();
    table.set("second", Value::Native(second));
    vm.set_global("m", Value::Table(table.into_ref()));
    run(&mut vm, "r = m:second(21)");
    assert_eq!(num(&vm, "r"), 21.0);
}

#[test]
fn and_or_short_circuit() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
function mark()
  flag = true
  return true
end
a = false and mark()
b = nil or 7
"#,
    );
    assert_eq!(vm.get_global("a"), Some(Value::Bool(false)));
    assert_eq!(num(&vm, "b"), 7.0);
    // rhs of the `and` never ran
    assert_eq!(vm.get_global("flag"), None);
}

#[test]
fn comparisons() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
a = 1 < 2
b = "a" < "b"
c = 2 <= 2
d = 3 != 4
e = not nil
"#,
    );
    for name in ["a", "b", "c", "d", "e"] {
        assert_eq!(vm.get_global(name), Some(Value::Bool(true)), "{}", name);
    }
}

#[test]
fn error_builtin_carries_traceback() {
    let mut vm = Vm::new();
    run(
        &mut vm,
        r#"
function boom()
  error("kaboom")
end
function outer()
  boom()
end
"#,
    );
    let outer = vm.get_global("outer").expect("outer");
    vm.push(outer);
    let err = vm.pcall(0, 0).expect_err("should raise");
    assert_eq!(err.message, "kaboom");
    let rendered = err.to_string();
    assert!(rendered.contains("stack traceback"), "{}", rendered);
    assert!(rendered.contains("boom"), "{}", rendered);
    assert!(rendered.contains("outer"), "{}", rendered);
}

#[test]
fn pcall_restores_stack_on_error() {
    let mut vm = Vm::new();
    run(&mut vm, "function boom() error(\"x\") end");
    vm.push(Value::Num(99.0));
    let boom = vm.get_global("boom").expect("boom");
    vm.push(boom);
    assert!(vm.pcall(0, 1).is_err());
    assert_eq!(vm.depth(), 1);
    assert_eq!(vm.peek(0), Some(&Value::Num(99.0)));
}

#[test]
fn calling_a_number_fails() {
    let mut vm = Vm::new();
    let err = run_err(&mut vm, "x = 5\nx()");
    assert!(err.message.contains("attempt to call a number value"));
}

#[test]
fn indexing_a_number_fails() {
    let mut vm = Vm::new();
    let err = run_err(&mut vm, "y = 5\nz = y.field");
    assert!(err.message.contains("attempt to index a number value"));
}

#[test]
fn runaway_recursion_is_an_error_not_a_crash() {
    let mut vm = Vm::new();
    let err = run_err(&mut vm, "function f() f() end\nf()");
    assert!(err.message.contains("call stack overflow"));
}

#[test]
fn object_delegation_is_lazy_and_by_name() {
    let mut vm = Vm::new();
    let obj = Value::Object {
        ptr: std::ptr::null_mut(),
        type_name: Rc::from("Widget"),
    };

    // nothing registered yet: resolves to nil, no error
    assert_eq!(vm.get_field(&obj, "area").unwrap(), Value::Nil);

    let area: NativeFn = Rc::new(|_vm, _args| Ok(Value::Num(6.0)));
    let mut table = Table::new();
    table.set("area", Value::Native(area));
    vm.register_type("Widget", table.into_ref());

    // same handle resolves now, without re-wrapping
    assert!(vm.get_field(&obj, "area").unwrap().is_callable());
    assert_eq!(vm.get_field(&obj, "missing").unwrap(), Value::Nil);
}

#[test]
fn bare_pointer_delegates_through_the_no_name_table() {
    let mut vm = Vm::new();
    let tag: NativeFn = Rc::new(|_vm, _args| Ok(Value::Num(99.0)));
    let mut table = Table::new();
    table.set("tag", Value::Native(tag));
    vm.register_type("", table.into_ref());

    let p = Value::Ptr(std::ptr::null_mut());
    assert!(vm.get_field(&p, "tag").unwrap().is_callable());
}
