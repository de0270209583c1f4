//! Per-request scratch directory mounted into the isolated environment.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// Exclusively owned directory holding the source and stdin files.
///
/// The directory is deleted when the workspace is dropped, whichever path
/// the request takes out of the orchestrator (including unwinding).
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates an empty workspace, under `root` when given.
    ///
    /// `root` matters when the orchestrator itself runs inside a container:
    /// the bind-mounted path must be visible to the Docker host.
    pub fn create(root: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("oj-sandbox-");
        let dir = match root {
            Some(root) => {
                fs::create_dir_all(root).with_context(|| {
                    format!("Failed to create workspace root: {}", root.display())
                })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .context("Failed to create workspace directory")?;

        debug!("Created workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Host path of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file into the workspace, returning its host path.
    pub fn write(&self, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.dir.path().join(name);
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_removed_on_drop() {
        let workspace = Workspace::create(None).unwrap();
        let path = workspace.path().to_path_buf();
        workspace.write("main.py", "print(1)").unwrap();
        assert!(path.join("main.py").exists());

        drop(workspace);
        assert!(!path.exists());
    }

    #[test]
    fn test_workspace_under_root() {
        let root = tempdir().unwrap();
        let nested = root.path().join("jobs");
        let workspace = Workspace::create(Some(&nested)).unwrap();

        assert!(workspace.path().starts_with(&nested));
        let written = workspace.write("input.txt", "5\n").unwrap();
        assert_eq!(fs::read_to_string(written).unwrap(), "5\n");
    }
}
