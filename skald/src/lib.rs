//! skald
//!
//! Host embedding layer over the `skald-script` VM. The host registers
//! native modules, constants and wrapped object types at startup, loads
//! script files, and then drives script functions through a signature-driven
//! marshaling protocol; loaded scripts call back into the registered native
//! functions through the same value stack.
//!
//! The runtime is strictly single-threaded: one [`Runtime`] per logical
//! thread of control, no internal locking.
//!
//! ```no_run
//! use std::sync::Arc;
//! use skald::{Runtime, RuntimeConfig, ScriptArg, ScriptOut, TracingSink};
//!
//! let mut rt = Runtime::new(RuntimeConfig {
//!     diagnostics: Arc::new(TracingSink),
//!     script_output: Arc::new(TracingSink),
//!     search_root: "scripts".into(),
//! });
//! rt.load_dir("", true).unwrap();
//!
//! let mut ok = false;
//! rt.call(
//!     "game",
//!     "on_start",
//!     "du:b",
//!     &[ScriptArg::Int(7), ScriptArg::Uint(123)],
//!     &mut [ScriptOut::Bool(&mut ok)],
//! )
//! .unwrap();
//! ```

mod call;
mod error;
mod loader;
mod logging;
mod object;
mod reader;
mod registry;
mod runtime;

pub use call::{ScriptArg, ScriptOut};
pub use error::{CallError, LoadError, RegistryError};
pub use loader::SCRIPT_EXTENSION;
pub use logging::{LogSink, TracingSink};
pub use runtime::{Runtime, RuntimeConfig};

// Re-export the substrate types that appear in this crate's API.
pub use skald_script::{NativeFn, RuntimeError, Table, TableRef, Value, Vm};
