//! Script-side logging bridge.
//!
//! Installs `print`, `LOG` and the `LOG_*` level constants into the global
//! namespace. Output is concatenated into one bounded buffer and forwarded
//! to the host-supplied sink; the sink is captured by the native closures at
//! install time rather than resolved through shared global state.

use std::rc::Rc;
use std::sync::Arc;

use skald_script::{fmt_num, NativeFn, RuntimeError, Value, Vm};

/// Leveled sink for log lines crossing the script/native boundary.
pub trait LogSink {
    fn debug(&self, msg: &str);
    fn trace(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// Forwards to the `tracing` macros under the `script` target.
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, msg: &str) {
        tracing::debug!(target: "script", "{}", msg);
    }
    fn trace(&self, msg: &str) {
        tracing::trace!(target: "script", "{}", msg);
    }
    fn error(&self, msg: &str) {
        tracing::error!(target: "script", "{}", msg);
    }
}

pub(crate) const LEVEL_DEBUG: i32 = 1;
pub(crate) const LEVEL_TRACE: i32 = 2;
pub(crate) const LEVEL_ERROR: i32 = 3;

/// Concatenated log lines are capped here; overflow truncates, never errors.
pub(crate) const LOG_BUFFER_CAP: usize = 1024;

pub(crate) fn install(vm: &mut Vm, sink: Arc<dyn LogSink>) {
    vm.set_global("LOG_DEBUG", Value::Num(LEVEL_DEBUG as f64));
    vm.set_global("LOG_TRACE", Value::Num(LEVEL_TRACE as f64));
    vm.set_global("LOG_ERROR", Value::Num(LEVEL_ERROR as f64));

    let s = sink.clone();
    let log_fn: NativeFn = Rc::new(move |_vm, args| {
        if args.len() < 2 {
            return Err(RuntimeError::new("no enough arguments (2 at least)"));
        }
        let level = args[0].as_num().map(|n| n as i32).unwrap_or(LEVEL_DEBUG);
        let msg = concat_args(&args[1..]);
        forward(&*s, level, &msg);
        Ok(Value::Nil)
    });
    vm.set_global("LOG", Value::Native(log_fn));

    let s = sink;
    let print_fn: NativeFn = Rc::new(move |_vm, args| {
        if args.is_empty() {
            return Err(RuntimeError::new("no enough argument (1 at least)"));
        }
        s.debug(&concat_args(args));
        Ok(Value::Nil)
    });
    vm.set_global("print", Value::Native(print_fn));
}

fn forward(sink: &dyn LogSink, level: i32, msg: &str) {
    match level {
        LEVEL_ERROR => sink.error(msg),
        LEVEL_TRACE => sink.trace(msg),
        _ => sink.debug(msg),
    }
}

/// Concatenate values into one line: numbers via the VM's numeric-to-string
/// rule, everything else via default string coercion. Truncates at
/// [`LOG_BUFFER_CAP`] bytes (on a char boundary).
fn concat_args(args: &[Value]) -> String {
    let mut buf = String::new();
    for v in args {
        if buf.len() >= LOG_BUFFER_CAP {
            break;
        }
        let piece = match v {
            Value::Num(n) => fmt_num(*n),
            other => other.to_string(),
        };
        let room = LOG_BUFFER_CAP - buf.len();
        if piece.len() > room {
            let mut cut = room;
            while !piece.is_char_boundary(cut) {
                cut -= 1;
            }
            buf.push_str(&piece[..cut]);
            break;
        }
        buf.push_str(&piece);
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_formats_numbers_like_the_vm() {
        let line = concat_args(&[Value::str("x="), Value::Num(42.0), Value::Num(3.5)]);
        assert_eq!(line, "x=423.5");
    }

    #[test]
    fn concat_truncates_at_cap() {
        let long = "a".repeat(2 * LOG_BUFFER_CAP);
        let line = concat_args(&[Value::str(&long), Value::str("tail")]);
        assert_eq!(line.len(), LOG_BUFFER_CAP);
        assert!(!line.contains("tail"));
    }
}
