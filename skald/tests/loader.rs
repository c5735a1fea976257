//! Script loading from files and directories, plus the typed config reader.

mod common;

use pretty_assertions::assert_eq;

use skald::{LoadError, Value};

#[test]
fn recursive_directory_load_covers_subdirectories() -> anyhow::Result<()> {
    let (mut rt, diags, _) = common::test_runtime();
    rt.load_dir("tree", true)?;
    assert_eq!(rt.vm().get_global("alpha_loaded"), Some(Value::Bool(true)));
    assert_eq!(rt.vm().get_global("beta_loaded"), Some(Value::Bool(true)));
    assert!(diags.contains("succeed"));
    Ok(())
}

#[test]
fn flat_directory_load_skips_subdirectories() {
    let (mut rt, _, _) = common::test_runtime();
    rt.load_dir("tree", false).unwrap();
    assert_eq!(rt.vm().get_global("alpha_loaded"), Some(Value::Bool(true)));
    assert_eq!(rt.vm().get_global("beta_loaded"), None);
}

#[test]
fn directory_load_stops_at_first_failure() {
    let (mut rt, diags, _) = common::test_runtime();
    let err = rt.load_dir("badtree", true).unwrap_err();
    match err {
        LoadError::Exec { path, message } => {
            assert!(path.ends_with("b_boom.skd"), "{}", path.display());
            assert!(message.contains("top level boom"), "{}", message);
        }
        other => panic!("unexpected {:?}", other),
    }
    // the file before the failure ran, the one after did not
    assert_eq!(rt.vm().get_global("first_loaded"), Some(Value::Bool(true)));
    assert_eq!(rt.vm().get_global("last_loaded"), None);
    assert!(diags.contains("top level boom"));
}

#[test]
fn missing_file_is_an_io_error() {
    let (mut rt, _, _) = common::test_runtime();
    let err = rt.load_file("nothere.skd").unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }));
}

#[test]
fn parse_failure_reports_the_line() {
    let (mut rt, diags, _) = common::test_runtime();
    let err = rt.load_source("broken", "x = 1\ny = ").unwrap_err();
    match err {
        LoadError::Parse { source, .. } => assert_eq!(source.line, 2),
        other => panic!("unexpected {:?}", other),
    }
    assert!(diags.contains("broken"));
}

#[test]
fn loaded_functions_are_callable() {
    let (mut rt, _, _) = common::test_runtime();
    rt.load_dir("tree", true).unwrap();

    let mut s = String::new();
    rt.call(
        "",
        "tree_greet",
        "s:s",
        &[skald::ScriptArg::Str("bob")],
        &mut [skald::ScriptOut::Str(&mut s)],
    )
    .unwrap();
    assert_eq!(s, "hi bob");
}

#[test]
fn config_reader_reads_and_defaults() -> anyhow::Result<()> {
    let (mut rt, _, _) = common::test_runtime();
    rt.load_file("config.skd")?;

    assert_eq!(rt.read_i32("config", "width", 0), 1024);
    assert_eq!(rt.read_u32("config", "height", 0), 768);
    assert_eq!(rt.read_f32("config", "scale", 0.0), 1.5);
    assert_eq!(rt.read_str("config", "title", "?"), "skald demo");

    // numbers coerce to strings, like the marshaling 's' rule
    assert_eq!(rt.read_str("config", "width", "?"), "1024");

    // missing key, missing table, wrong dynamic type: default wins
    assert_eq!(rt.read_i32("config", "missing", 7), 7);
    assert_eq!(rt.read_i32("nothere", "width", 3), 3);
    assert_eq!(rt.read_i32("config", "title", 9), 9);
    assert_eq!(rt.read_str("config", "vsync", "fallback"), "fallback");
    Ok(())
}
