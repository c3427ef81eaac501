// Filesystem store adapter
//
// Recursive walk under a configured root with a glob on file names.
// Matched files are returned with their content, capped to keep payloads
// bounded. Unreadable entries are skipped rather than failing the search.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::common::{OperationKind, StoreKind};
use crate::error::StoreError;
use crate::planner::operation::OperationParams;

use super::{glob_match, AdapterPayload, AdapterResponse, FileRecord, HealthStatus, StoreAdapter};

/// Maximum bytes of file content carried into a result.
const CONTENT_CAP_BYTES: usize = 64 * 1024;

/// Maximum entries counted for the health size hint.
const SIZE_HINT_CAP: usize = 10_000;

/// Filesystem store rooted at a directory.
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn count_files(dir: &Path, budget: &mut usize) -> usize {
        let mut count = 0;
        let Ok(entries) = fs::read_dir(dir) else {
            return 0;
        };
        for entry in entries.flatten() {
            if *budget == 0 {
                break;
            }
            let path = entry.path();
            if path.is_dir() {
                count += Self::count_files(&path, budget);
            } else {
                count += 1;
                *budget -= 1;
            }
        }
        count
    }

    fn walk(&self, dir: &Path, pattern: &str, limit: usize, hits: &mut Vec<FileRecord>) {
        if hits.len() >= limit {
            return;
        }
        let Ok(entries) = fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<PathBuf> = entries.flatten().map(|e| e.path()).collect();
        entries.sort();

        for path in entries {
            if hits.len() >= limit {
                return;
            }
            if path.is_dir() {
                self.walk(&path, pattern, limit, hits);
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !glob_match(pattern, name) {
                continue;
            }

            let metadata = fs::metadata(&path).ok();
            let modified: Option<DateTime<Utc>> = metadata
                .as_ref()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from);
            let content = fs::read_to_string(&path).ok().map(|mut text| {
                if text.len() > CONTENT_CAP_BYTES {
                    text.truncate(CONTENT_CAP_BYTES);
                }
                text
            });

            hits.push(FileRecord {
                name: Some(name.to_string()),
                path: path.to_string_lossy().into_owned(),
                content,
                size_bytes: metadata.map(|m| m.len()).unwrap_or(0),
                modified,
            });
        }
    }
}

#[async_trait]
impl StoreAdapter for FilesystemStore {
    fn kind(&self) -> StoreKind {
        StoreKind::Filesystem
    }

    async fn health(&self) -> HealthStatus {
        if !self.root.is_dir() {
            return HealthStatus::unhealthy();
        }
        let mut budget = SIZE_HINT_CAP;
        HealthStatus::healthy(Self::count_files(&self.root, &mut budget))
    }

    async fn execute(
        &self,
        op: OperationKind,
        params: &OperationParams,
    ) -> Result<AdapterResponse, StoreError> {
        if op != OperationKind::FileSearch {
            return Err(StoreError::Syntax(format!(
                "filesystem store does not implement {}",
                op
            )));
        }
        let params = match params {
            OperationParams::Filesystem(p) => p,
            _ => {
                return Err(StoreError::Syntax(
                    "file search requires filesystem parameters".into(),
                ))
            }
        };

        let base = if Path::new(&params.path).is_absolute() {
            PathBuf::from(&params.path)
        } else {
            self.root.join(&params.path)
        };
        if !base.is_dir() {
            return Err(StoreError::Unavailable(format!(
                "search path '{}' is not a directory",
                base.display()
            )));
        }

        let mut hits = Vec::new();
        self.walk(&base, &params.pattern, params.limit, &mut hits);
        Ok(AdapterResponse::new(AdapterPayload::Files(hits)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::operation::FilesystemParams;
    use std::io::Write;

    fn params(path: &str, pattern: &str, limit: usize) -> OperationParams {
        OperationParams::Filesystem(FilesystemParams {
            path: path.into(),
            pattern: pattern.into(),
            limit,
        })
    }

    fn seeded_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("temp dir");
        fs::create_dir(dir.path().join("docs")).expect("subdir");
        let mut readme = fs::File::create(dir.path().join("README.md")).expect("file");
        writeln!(readme, "project readme").expect("write");
        let mut guide = fs::File::create(dir.path().join("docs/guide.md")).expect("file");
        writeln!(guide, "user guide").expect("write");
        fs::File::create(dir.path().join("notes.txt")).expect("file");
        dir
    }

    #[tokio::test]
    async fn glob_search_finds_nested_files() {
        let dir = seeded_dir();
        let store = FilesystemStore::new(dir.path());
        let response = store
            .execute(OperationKind::FileSearch, &params(".", "*.md", 10))
            .await
            .unwrap();
        match response.payload {
            AdapterPayload::Files(files) => {
                assert_eq!(files.len(), 2);
                assert!(files.iter().any(|f| f.name.as_deref() == Some("README.md")));
                assert!(files.iter().any(|f| f.name.as_deref() == Some("guide.md")));
            }
            other => panic!("expected files, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn limit_caps_the_walk() {
        let dir = seeded_dir();
        let store = FilesystemStore::new(dir.path());
        let response = store
            .execute(OperationKind::FileSearch, &params(".", "*", 1))
            .await
            .unwrap();
        assert_eq!(response.payload.len(), 1);
    }

    #[tokio::test]
    async fn missing_path_is_unavailable() {
        let dir = seeded_dir();
        let store = FilesystemStore::new(dir.path());
        let err = store
            .execute(OperationKind::FileSearch, &params("no-such-dir", "*", 10))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn health_reports_file_count() {
        let dir = seeded_dir();
        let store = FilesystemStore::new(dir.path());
        let health = store.health().await;
        assert!(health.healthy);
        assert_eq!(health.size_hint, 3);

        let missing = FilesystemStore::new(dir.path().join("ghost"));
        assert!(!missing.health().await.healthy);
    }
}
