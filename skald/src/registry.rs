//! Dispatch table registry: named tables of native functions and constants.
//!
//! All operations permanently mutate VM-global registry state; there is no
//! unregistration. Re-adding a name overwrites deterministically (last
//! registration wins).

use skald_script::{NativeFn, Table, Value};

use crate::error::RegistryError;
use crate::runtime::Runtime;

impl Runtime {
    /// Install `funcs` as the no-name dispatch table: the delegation target
    /// for bare pointer values pushed with the `P` tag.
    pub fn register_global(&mut self, funcs: &[(&str, NativeFn)]) {
        let table = make_table(funcs);
        self.vm.register_type("", table);
    }

    /// Create a named dispatch table holding exactly `funcs`.
    ///
    /// The table is registered under `name` for object-handle delegation and
    /// published as the global `name`, so scripts call `name.func(...)` and
    /// handles wrapped with `name` resolve methods through the same table.
    pub fn register_module(&mut self, name: &str, funcs: &[(&str, NativeFn)]) {
        let table = make_table(funcs);
        self.vm.register_type(name, table.clone());
        self.vm.set_global(name, Value::Table(table));
    }

    /// Merge `funcs` into the existing module table `name`. New entries
    /// overwrite same-named existing entries.
    pub fn extend_module(
        &mut self,
        name: &str,
        funcs: &[(&str, NativeFn)],
    ) -> Result<(), RegistryError> {
        let table = self
            .vm
            .type_table(name)
            .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;
        let mut t = table.borrow_mut();
        for (fname, f) in funcs {
            t.set(*fname, Value::Native(f.clone()));
        }
        Ok(())
    }

    /// Write numeric constants into the global namespace (`module` empty) or
    /// into the named module table, created if absent. Values widen to the
    /// VM's `f64` representation.
    pub fn register_consts(&mut self, module: &str, consts: &[(&str, i32)]) {
        if module.is_empty() {
            for (name, value) in consts {
                self.vm.set_global(*name, Value::Num(*value as f64));
            }
            return;
        }
        let table = match self.vm.type_table(module) {
            Some(t) => t,
            None => {
                let t = Table::new().into_ref();
                self.vm.register_type(module, t.clone());
                self.vm.set_global(module, Value::Table(t.clone()));
                t
            }
        };
        let mut t = table.borrow_mut();
        for (name, value) in consts {
            t.set(*name, Value::Num(*value as f64));
        }
    }
}

fn make_table(funcs: &[(&str, NativeFn)]) -> skald_script::TableRef {
    let mut table = Table::new();
    for (name, f) in funcs {
        table.set(*name, Value::Native(f.clone()));
    }
    table.into_ref()
}
