use std::path::PathBuf;

use super::error::ToolError;
use super::path::resolve_path_under;

/// Maximum body size for a read or write.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Sandboxed file operations over a single workspace root, collapsed from
/// one-trait-object-per-tool into plain async methods since the tool
/// surface is a small fixed set rather than an open LLM-facing registry.
pub struct ToolExecutor {
    workspace_root: PathBuf,
}

impl ToolExecutor {
    pub fn new(workspace_root: PathBuf) -> Self {
        Self { workspace_root }
    }

    pub fn workspace_root(&self) -> &std::path::Path {
        &self.workspace_root
    }

    pub async fn read_file(&self, path: &str) -> Result<String, ToolError> {
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        tracing::info!(path, "tool: read_file");
        let metadata = tokio::fs::metadata(&resolved)
            .await
            .map_err(|e| map_io_error(path, &e))?;
        if metadata.is_dir() {
            return Err(ToolError::IoFailure(format!("{path} is a directory, not a file")));
        }
        if metadata.len() as usize > MAX_BODY_BYTES {
            return Err(ToolError::TooLarge(metadata.len() as usize, MAX_BODY_BYTES));
        }
        let content = tokio::fs::read_to_string(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        tracing::info!(path, bytes = content.len(), "tool: read_file ok");
        Ok(content)
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<(), ToolError> {
        if content.len() > MAX_BODY_BYTES {
            return Err(ToolError::TooLarge(content.len(), MAX_BODY_BYTES));
        }
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        tracing::info!(path, bytes = content.len(), "tool: write_file");
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| map_io_error(path, &e))?;
        }
        tokio::fs::write(&resolved, content).await.map_err(|e| map_io_error(path, &e))?;
        tracing::info!(path, "tool: write_file ok");
        Ok(())
    }

    pub async fn list_directory(&self, path: Option<&str>) -> Result<Vec<DirEntry>, ToolError> {
        let path = path.unwrap_or("");
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        tracing::info!(path, "tool: list_directory");
        let mut reader = tokio::fs::read_dir(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| map_io_error(path, &e))? {
            let is_dir = entry.file_type().await.map_err(|e| map_io_error(path, &e))?.is_dir();
            entries.push(DirEntry { name: entry.file_name().to_string_lossy().into_owned(), is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        tracing::info!(path, count = entries.len(), "tool: list_directory ok");
        Ok(entries)
    }

    pub async fn create_directory(&self, path: &str) -> Result<(), ToolError> {
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        tracing::info!(path, "tool: create_directory");
        tokio::fs::create_dir_all(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        tracing::info!(path, "tool: create_directory ok");
        Ok(())
    }

    pub async fn delete_file(&self, path: &str) -> Result<(), ToolError> {
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        tracing::info!(path, "tool: delete_file");
        let metadata = tokio::fs::metadata(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        } else {
            tokio::fs::remove_file(&resolved).await.map_err(|e| map_io_error(path, &e))?;
        }
        tracing::info!(path, "tool: delete_file ok");
        Ok(())
    }

    pub async fn file_exists(&self, path: &str) -> Result<bool, ToolError> {
        let resolved = resolve_path_under(&self.workspace_root, path)?;
        Ok(tokio::fs::metadata(&resolved).await.is_ok())
    }
}

fn map_io_error(path: &str, err: &std::io::Error) -> ToolError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ToolError::NotFound(path.to_string())
    } else {
        ToolError::IoFailure(format!("{path}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn executor() -> (ToolExecutor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        (ToolExecutor::new(root), dir)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (executor, _dir) = executor().await;
        executor.write_file("notes/a.txt", "hello").await.unwrap();
        let content = executor.read_file("notes/a.txt").await.unwrap();
        assert_eq!(content, "hello");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let (executor, _dir) = executor().await;
        assert!(matches!(executor.read_file("missing.txt").await, Err(ToolError::NotFound(_))));
    }

    #[tokio::test]
    async fn write_outside_workspace_is_rejected() {
        let (executor, _dir) = executor().await;
        assert!(matches!(
            executor.write_file("../escape.txt", "x").await,
            Err(ToolError::PathOutsideWorkspace(_))
        ));
    }

    #[tokio::test]
    async fn list_directory_sorts_entries_by_name() {
        let (executor, _dir) = executor().await;
        executor.write_file("b.txt", "").await.unwrap();
        executor.write_file("a.txt", "").await.unwrap();
        executor.create_directory("c_dir").await.unwrap();
        let entries = executor.list_directory(None).await.unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c_dir"]);
        assert!(entries.iter().find(|e| e.name == "c_dir").unwrap().is_dir);
    }

    #[tokio::test]
    async fn delete_file_removes_it() {
        let (executor, _dir) = executor().await;
        executor.write_file("gone.txt", "x").await.unwrap();
        executor.delete_file("gone.txt").await.unwrap();
        assert!(!executor.file_exists("gone.txt").await.unwrap());
    }

    #[tokio::test]
    async fn write_rejects_bodies_over_the_limit() {
        let (executor, _dir) = executor().await;
        let oversized = "x".repeat(MAX_BODY_BYTES + 1);
        assert!(matches!(executor.write_file("big.txt", &oversized).await, Err(ToolError::TooLarge(_, _))));
    }
}
