//! Signature-driven call marshaling: invoking a script function from native
//! code with typed arguments and typed output parameters.
//!
//! The signature string is the wire contract: `<args>:<results>`, one
//! character per value. `b` boolean, `d` signed integer, `u` unsigned
//! integer, `f` float, `s` string, `P` bare pointer, `p` wrapped object
//! (pointer + type name); only `b`/`d`/`u`/`f`/`s` are legal after the `:`.
//! The native side supplies tagged variants instead of raw varargs, so a
//! tag/argument disagreement is caught before any script code runs.

use std::ffi::c_void;
use std::rc::Rc;

use skald_script::Value;

use crate::error::CallError;
use crate::runtime::Runtime;

const ARG_TAGS: &str = "bdufsPp";
const RESULT_TAGS: &str = "bdufs";

/// One marshaled argument.
#[derive(Debug, Clone, Copy)]
pub enum ScriptArg<'a> {
    Bool(bool),
    Int(i32),
    Uint(u32),
    Float(f64),
    Str(&'a str),
    /// Bare foreign pointer (`P` tag); delegates through the no-name table.
    Ptr(*mut c_void),
    /// Pointer plus dispatch-type name (`p` tag); arrives script-side as a
    /// wrapped object handle.
    Obj(*mut c_void, &'a str),
}

impl ScriptArg<'_> {
    fn kind(&self) -> &'static str {
        match self {
            ScriptArg::Bool(_) => "bool",
            ScriptArg::Int(_) => "int",
            ScriptArg::Uint(_) => "uint",
            ScriptArg::Float(_) => "float",
            ScriptArg::Str(_) => "str",
            ScriptArg::Ptr(_) => "ptr",
            ScriptArg::Obj(..) => "obj",
        }
    }
}

/// One typed output parameter. Results round-trip through the VM's `f64`
/// representation, so integer outputs are subject to its precision.
#[derive(Debug)]
pub enum ScriptOut<'a> {
    Bool(&'a mut bool),
    Int(&'a mut i32),
    Uint(&'a mut u32),
    Float(&'a mut f64),
    Str(&'a mut String),
}

impl ScriptOut<'_> {
    fn matches_tag(&self, tag: char) -> bool {
        matches!(
            (tag, self),
            ('b', ScriptOut::Bool(_))
                | ('d', ScriptOut::Int(_))
                | ('u', ScriptOut::Uint(_))
                | ('f', ScriptOut::Float(_))
                | ('s', ScriptOut::Str(_))
        )
    }

    /// Type-check the returned value against this slot and write it through.
    /// `false` means a dynamic-type mismatch; the slot is left untouched.
    fn write(&mut self, value: &Value) -> bool {
        match self {
            ScriptOut::Bool(slot) => match value {
                Value::Bool(b) => {
                    **slot = *b;
                    true
                }
                _ => false,
            },
            ScriptOut::Int(slot) => match value.as_num() {
                Some(n) => {
                    **slot = n as i32;
                    true
                }
                None => false,
            },
            ScriptOut::Uint(slot) => match value.as_num() {
                Some(n) => {
                    **slot = n as u32;
                    true
                }
                None => false,
            },
            ScriptOut::Float(slot) => match value.as_num() {
                Some(n) => {
                    **slot = n;
                    true
                }
                None => false,
            },
            // string-coercible: strings pass through, numbers format
            ScriptOut::Str(slot) => match value.coerce_str() {
                Some(s) => {
                    **slot = s;
                    true
                }
                None => false,
            },
        }
    }
}

impl Runtime {
    /// Resolve `(module, func)`, push `args` per the signature, invoke under
    /// protection, and pull typed results back into `outs`.
    ///
    /// On any failure the value stack is back at its pre-call depth and the
    /// runtime stays usable. Output parameters written before a
    /// [`CallError::ResultTypeError`] keep their new values (outputs are
    /// written left to right as results are consumed, not atomically).
    pub fn call(
        &mut self,
        module: &str,
        func: &str,
        signature: &str,
        args: &[ScriptArg<'_>],
        outs: &mut [ScriptOut<'_>],
    ) -> Result<(), CallError> {
        let display = display_name(module, func);

        // resolution: no stack effects on failure
        let callee = if module.is_empty() {
            self.vm.get_global(func)
        } else {
            match self.vm.get_global(module) {
                Some(Value::Table(t)) => t.borrow().get(func),
                _ => None,
            }
        };
        let callee = match callee {
            Some(v) if v.is_callable() => v,
            _ => {
                self.diagnostics
                    .error(&format!("call [{}] error: no function", display));
                return Err(CallError::FunctionNotFound { name: display });
            }
        };

        let (arg_tags, ret_tags) = match signature.split_once(':') {
            Some((a, r)) => (a, r),
            None => (signature, ""),
        };
        let ret_tags: Vec<char> = ret_tags.chars().collect();

        // result signature is validated up front: nothing runs on a bad one
        if ret_tags.len() != outs.len() {
            return Err(self.signature_error(
                &display,
                signature,
                format!(
                    "{} result tags but {} output parameters",
                    ret_tags.len(),
                    outs.len()
                ),
            ));
        }
        for (i, (&tag, out)) in ret_tags.iter().zip(outs.iter()).enumerate() {
            if !RESULT_TAGS.contains(tag) {
                return Err(self.signature_error(
                    &display,
                    signature,
                    format!("unrecognized result tag '{}'", tag),
                ));
            }
            if !out.matches_tag(tag) {
                return Err(self.signature_error(
                    &display,
                    signature,
                    format!("output parameter #{} does not match tag '{}'", i + 1, tag),
                ));
            }
        }

        // argument phase: push left to right, roll back on the first bad tag
        let entry_depth = self.vm.depth();
        self.vm.push(callee);
        let mut supplied = args.iter();
        let mut argc = 0usize;
        for (i, tag) in arg_tags.chars().enumerate() {
            if !ARG_TAGS.contains(tag) {
                self.vm.truncate(entry_depth);
                return Err(self.signature_error(
                    &display,
                    signature,
                    format!("unrecognized tag '{}'", tag),
                ));
            }
            let Some(arg) = supplied.next() else {
                self.vm.truncate(entry_depth);
                return Err(self.signature_error(
                    &display,
                    signature,
                    format!("tag '{}' has no matching argument", tag),
                ));
            };
            let value = match (tag, arg) {
                ('b', ScriptArg::Bool(b)) => Value::Bool(*b),
                ('d', ScriptArg::Int(n)) => Value::Num(f64::from(*n)),
                ('u', ScriptArg::Uint(n)) => Value::Num(f64::from(*n)),
                ('f', ScriptArg::Float(x)) => Value::Num(*x),
                ('s', ScriptArg::Str(s)) => Value::str(s),
                ('P', ScriptArg::Ptr(p)) => Value::Ptr(*p),
                ('p', ScriptArg::Obj(p, ty)) => Value::Object {
                    ptr: *p,
                    type_name: Rc::from(*ty),
                },
                (tag, arg) => {
                    self.vm.truncate(entry_depth);
                    return Err(self.signature_error(
                        &display,
                        signature,
                        format!("argument #{} is {}, tag '{}' disagrees", i + 1, arg.kind(), tag),
                    ));
                }
            };
            self.vm.push(value);
            argc += 1;
        }
        if supplied.next().is_some() {
            self.vm.truncate(entry_depth);
            return Err(self.signature_error(
                &display,
                signature,
                format!("more than {} arguments supplied", argc),
            ));
        }

        // protected invocation; the stack is unwound by pcall on failure
        if let Err(e) = self.vm.pcall(argc, ret_tags.len()) {
            self.diagnostics
                .error(&format!("call [{}] error: {}", display, e));
            return Err(CallError::ScriptRuntime {
                name: display,
                message: e.to_string(),
            });
        }

        // result phase: outputs are written as results are consumed; a later
        // mismatch does not roll back earlier writes
        for (i, &tag) in ret_tags.iter().enumerate() {
            let value = self.vm.get(entry_depth + i).cloned().unwrap_or(Value::Nil);
            if !outs[i].write(&value) {
                self.diagnostics.error(&format!(
                    "call [{}] error: return need '{}'#{}",
                    display,
                    tag,
                    i + 1
                ));
                self.vm.truncate(entry_depth);
                return Err(CallError::ResultTypeError {
                    tag,
                    position: i + 1,
                });
            }
        }
        self.vm.truncate(entry_depth);
        Ok(())
    }

    fn signature_error(&self, display: &str, signature: &str, detail: String) -> CallError {
        self.diagnostics.error(&format!(
            "call [{}] error: bad signature \"{}\": {}",
            display, signature, detail
        ));
        CallError::SignatureError {
            signature: signature.to_string(),
            detail,
        }
    }
}

fn display_name(module: &str, func: &str) -> String {
    if module.is_empty() {
        func.to_string()
    } else {
        format!("{}.{}", module, func)
    }
}
