use std::path::PathBuf;
use std::sync::Arc;

use skald_script::Vm;

use crate::logging::{self, LogSink};

/// Everything a [`Runtime`] needs from the host, passed in explicitly.
pub struct RuntimeConfig {
    /// Sink for the bridge's own diagnostics (load failures, call errors).
    pub diagnostics: Arc<dyn LogSink>,
    /// Sink for script-side `print`/`LOG` output.
    pub script_output: Arc<dyn LogSink>,
    /// Directory that relative script paths resolve against.
    pub search_root: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            diagnostics: Arc::new(logging::TracingSink),
            script_output: Arc::new(logging::TracingSink),
            search_root: PathBuf::from("."),
        }
    }
}

/// The embedding runtime: owns one VM instance for its whole lifetime.
///
/// Created once at startup; dropping it releases the VM and all registry
/// state unconditionally. Not `Send`: a runtime belongs to exactly one
/// logical thread of control, and a host with multiple script-driving
/// threads needs one runtime per thread (or its own serialization).
pub struct Runtime {
    pub(crate) vm: Vm,
    pub(crate) diagnostics: Arc<dyn LogSink>,
    pub(crate) search_root: PathBuf,
}

impl Runtime {
    pub fn new(config: RuntimeConfig) -> Self {
        let mut vm = Vm::new();
        logging::install(&mut vm, config.script_output);
        Self {
            vm,
            diagnostics: config.diagnostics,
            search_root: config.search_root,
        }
    }

    /// Direct access to the underlying VM (stack adapter, globals, type
    /// registry). The bridge covers the common paths; this is the escape
    /// hatch for hosts that need more.
    pub fn vm(&self) -> &Vm {
        &self.vm
    }

    pub fn vm_mut(&mut self) -> &mut Vm {
        &mut self.vm
    }
}
