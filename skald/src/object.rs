//! Object handle wrapping.
//!
//! A handle is a non-owning view of a native pointer: the host must keep the
//! pointee alive for as long as any script-side reference exists. Wrapping
//! is O(1) and never touches the type registry — delegation resolves by
//! name at field-access time, so a type registered after wrapping still
//! applies to existing handles.

use std::ffi::c_void;
use std::rc::Rc;

use skald_script::Value;

use crate::runtime::Runtime;

impl Runtime {
    /// Wrap a native pointer as an opaque script value delegating to the
    /// dispatch table registered under `type_name`.
    ///
    /// If `type_name` is not (yet) registered, every field access on the
    /// handle resolves to `nil` — no error at wrap time.
    pub fn wrap(&self, ptr: *mut c_void, type_name: &str) -> Value {
        Value::Object {
            ptr,
            type_name: Rc::from(type_name),
        }
    }
}
