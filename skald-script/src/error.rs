use std::fmt;

use thiserror::Error;

/// Source-level failure: the chunk could not be tokenized or parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// One level of the script call stack, recorded while an error unwinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub name: String,
    pub line: u32,
}

/// An error raised while running script code.
///
/// The trace is appended frame by frame as the interpreter unwinds, so every
/// error that escapes a protected call already carries its traceback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeError {
    pub message: String,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            trace: Vec::new(),
        }
    }

    pub fn with_frame(mut self, name: &str, line: u32) -> Self {
        self.trace.push(TraceFrame {
            name: name.to_string(),
            line,
        });
        self
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.trace.is_empty() {
            write!(f, "\nstack traceback:")?;
            for frame in &self.trace {
                write!(f, "\n  in '{}' (line {})", frame.name, frame.line)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}
