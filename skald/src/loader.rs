//! Script source loading.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::LoadError;
use crate::runtime::Runtime;

/// Files with this extension are picked up by [`Runtime::load_dir`].
pub const SCRIPT_EXTENSION: &str = "skd";

impl Runtime {
    /// Compile and run a source string as a top-level chunk.
    ///
    /// `chunk_name` shows up in tracebacks; file loading passes the path.
    pub fn load_source(&mut self, chunk_name: &str, src: &str) -> Result<(), LoadError> {
        let path = PathBuf::from(chunk_name);
        let func = skald_script::compile(src, chunk_name).map_err(|e| {
            self.diagnostics
                .error(&format!("load file [{}] error: {}", chunk_name, e));
            LoadError::Parse { path: path.clone(), source: e }
        })?;
        self.vm.exec(func).map_err(|e| {
            self.diagnostics
                .error(&format!("load file [{}] error: {}", chunk_name, e));
            LoadError::Exec {
                path,
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// Load one script file. Relative paths resolve against the configured
    /// search root.
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<(), LoadError> {
        let path = self.resolve(path.as_ref());
        let src = fs::read_to_string(&path).map_err(|e| {
            self.diagnostics
                .error(&format!("load file [{}] error: {}", path.display(), e));
            LoadError::Io {
                path: path.clone(),
                source: e,
            }
        })?;
        self.load_source(&path.display().to_string(), &src)?;
        self.diagnostics
            .trace(&format!("load file [{}] succeed", path.display()));
        Ok(())
    }

    /// Load every `*.skd` file under a directory, in sorted path order,
    /// stopping at and reporting the first failure.
    pub fn load_dir(&mut self, path: impl AsRef<Path>, recursive: bool) -> Result<(), LoadError> {
        let root = self.resolve(path.as_ref());
        let pattern = if recursive {
            root.join("**").join(format!("*.{}", SCRIPT_EXTENSION))
        } else {
            root.join(format!("*.{}", SCRIPT_EXTENSION))
        };
        let pattern = pattern.to_string_lossy().into_owned();
        let entries = glob::glob(&pattern).map_err(|e| LoadError::Io {
            path: root.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
        })?;

        let mut files: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
        files.sort();
        for file in files {
            self.load_file(file)?;
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.search_root.join(path)
        }
    }
}
