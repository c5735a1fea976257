use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt;
use std::rc::Rc;

use crate::bytecode::Function;
use crate::error::RuntimeError;
use crate::vm::Vm;

/// Native entry point callable from scripts.
///
/// Arguments arrive as a slice in call order, the same shape the syscall
/// dispatch uses; a single value (or `Nil`) goes back.
pub type NativeFn = Rc<dyn Fn(&mut Vm, &[Value]) -> Result<Value, RuntimeError>>;

pub type TableRef = Rc<RefCell<Table>>;

/// Flat string-keyed table. Used both for script-created tables and for the
/// dispatch tables native modules register.
#[derive(Debug, Default)]
pub struct Table {
    entries: HashMap<String, Value>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_ref(self) -> TableRef {
        Rc::new(RefCell::new(self))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).cloned()
    }

    /// Insert or overwrite; last write wins.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A VM value.
///
/// The single numeric representation is `f64`: every native integer that
/// crosses the boundary widens to it, with the precision that implies.
/// Pointer-carrying variants are non-owning views; the native side is
/// responsible for keeping the pointee alive.
#[derive(Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Num(f64),
    Str(Rc<str>),
    Table(TableRef),
    Func(Rc<Function>),
    Native(NativeFn),
    /// Bare foreign pointer. Field access delegates through the no-name
    /// dispatch table (registered under `""`).
    Ptr(*mut c_void),
    /// Wrapped native object. Field access delegates through the dispatch
    /// table registered under `type_name`, resolved at access time.
    Object {
        ptr: *mut c_void,
        type_name: Rc<str>,
    },
}

/// The VM's numeric-to-string rule: integral values print without a
/// fractional part (`42`, not `42.0`).
pub fn fmt_num(n: f64) -> String {
    format!("{}", n)
}

impl Value {
    pub fn str(s: &str) -> Value {
        Value::Str(Rc::from(s))
    }

    pub fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Num(_) => "number",
            Value::Str(_) => "string",
            Value::Table(_) => "table",
            Value::Func(_) | Value::Native(_) => "function",
            Value::Ptr(_) => "pointer",
            Value::Object { .. } => "object",
        }
    }

    pub fn as_num(&self) -> Option<f64> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// String coercion: strings pass through, numbers format per [`fmt_num`].
    pub fn coerce_str(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Num(n) => Some(fmt_num(*n)),
            _ => None,
        }
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Func(_) | Value::Native(_))
    }

    /// Recover the raw pointer from a wrapped object or a bare pointer.
    pub fn object_ptr(&self) -> Option<*mut c_void> {
        match self {
            Value::Ptr(p) => Some(*p),
            Value::Object { ptr, .. } => Some(*ptr),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Num(a), Value::Num(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Reference types compare by identity.
            (Value::Table(a), Value::Table(b)) => Rc::ptr_eq(a, b),
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            (Value::Native(a), Value::Native(b)) => Rc::ptr_eq(a, b),
            (Value::Ptr(a), Value::Ptr(b)) => a == b,
            (Value::Object { ptr: a, .. }, Value::Object { ptr: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Num(n) => write!(f, "{}", fmt_num(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Table(t) => write!(f, "table: {:p}", Rc::as_ptr(t)),
            Value::Func(func) => write!(f, "function: '{}'", func.name),
            Value::Native(n) => write!(f, "function: {:p}", Rc::as_ptr(n)),
            Value::Ptr(p) => write!(f, "pointer: {:p}", *p),
            Value::Object { ptr, type_name } => write!(f, "{}: {:p}", type_name, *ptr),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}
