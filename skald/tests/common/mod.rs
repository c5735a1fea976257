//! Shared helpers for the bridge integration tests.
#![allow(dead_code)] // each test binary uses a different subset

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use skald::{LogSink, Runtime, RuntimeConfig};

/// Sink that records every line it receives, tagged with its level.
#[derive(Default)]
pub struct CaptureSink {
    lines: Mutex<Vec<(&'static str, String)>>,
}

impl CaptureSink {
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .any(|(_, m)| m.contains(needle))
    }

    fn push(&self, level: &'static str, msg: &str) {
        self.lines.lock().unwrap().push((level, msg.to_string()));
    }
}

impl LogSink for CaptureSink {
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn trace(&self, msg: &str) {
        self.push("trace", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
}

pub fn testcase_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testcase")
}

/// Runtime wired to capturing sinks, rooted at the fixture directory.
pub fn test_runtime() -> (Runtime, Arc<CaptureSink>, Arc<CaptureSink>) {
    let diagnostics = Arc::new(CaptureSink::default());
    let script_output = Arc::new(CaptureSink::default());
    let rt = Runtime::new(RuntimeConfig {
        diagnostics: diagnostics.clone(),
        script_output: script_output.clone(),
        search_root: testcase_root(),
    });
    (rt, diagnostics, script_output)
}
