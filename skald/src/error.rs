use std::path::PathBuf;

use thiserror::Error;

use skald_script::ParseError;

/// A script file failed to load.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse {}: {}", .path.display(), .source)]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error("run {}: {}", .path.display(), .message)]
    Exec { path: PathBuf, message: String },
}

/// A marshaled call into script code failed.
///
/// None of these are fatal: the runtime stays usable and the value stack is
/// restored to its pre-call depth (modulo output parameters already written,
/// see [`CallError::ResultTypeError`]).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CallError {
    /// The (module, function) pair did not resolve to a callable value.
    #[error("no function [{name}]")]
    FunctionNotFound { name: String },

    /// The signature string and the supplied arguments/outputs disagree:
    /// unknown tag, variant mismatch, or count mismatch. Detected before any
    /// script code runs.
    #[error("bad signature \"{signature}\": {detail}")]
    SignatureError { signature: String, detail: String },

    /// The invoked function raised; the message carries the script traceback.
    #[error("script error in [{name}]: {message}")]
    ScriptRuntime { name: String, message: String },

    /// A returned value's dynamic type disagrees with its tag. Output
    /// parameters written before `position` keep their new values; the rest
    /// are untouched.
    #[error("return value #{position} does not match tag '{tag}'")]
    ResultTypeError { tag: char, position: usize },
}

/// A dispatch-table registry operation violated its contract.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unknown module table '{0}'")]
    UnknownModule(String),
}
