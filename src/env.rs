use anyhow::Context;
use std::env as stdenv;
use std::path::{Component, Path, PathBuf};

/// The shell's view of its working directory.
///
/// Builtins never consult `std::env::current_dir()` directly; they go through
/// this type so that a single owner decides where relative paths point.
/// Forked children inherit a copy, and changes they make stay in the child.
#[derive(Debug, Clone)]
pub struct Environment {
    current_dir: PathBuf,
}

impl Environment {
    /// Capture the working directory of the running process.
    pub fn new() -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        Self { current_dir }
    }

    /// An environment rooted at `dir` without touching the process state.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self {
            current_dir: dir.into(),
        }
    }

    /// Directory that relative paths and spawned programs start from.
    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    /// Make `path` absolute against the current directory and drop `.`
    /// components and duplicate separators.
    ///
    /// `..` is kept as-is so that the kernel, not string surgery, decides
    /// where it leads when symbolic links are involved.
    pub fn resolve(&self, path: impl AsRef<Path>) -> PathBuf {
        let path = path.as_ref();
        let joined = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.current_dir.join(path)
        };
        joined
            .components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect()
    }

    /// Change the working directory of both this environment and the process.
    pub fn change_dir(&mut self, target: impl AsRef<Path>) -> anyhow::Result<()> {
        let new_dir = self.resolve(target);
        let canonical = std::fs::canonicalize(&new_dir)
            .with_context(|| format!("cd: {}", new_dir.display()))?;
        stdenv::set_current_dir(&canonical)
            .with_context(|| format!("cd: {}", canonical.display()))?;
        tracing::debug!(dir = %canonical.display(), "changed working directory");
        self.current_dir = canonical;
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}
