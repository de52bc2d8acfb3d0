use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use threadkeeper_core::dates::{file_date, parse_file_date};
use threadkeeper_core::{CommentList, CoreError, PostCategory, StorageError};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ARTIFACT_EXTENSION: &str = ".txt";

/// Directory of per-post comment files. A file's presence is the only
/// record that a post has been harvested.
#[derive(Debug, Clone)]
pub struct CommentStore {
    dir: PathBuf,
}

impl CommentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<prefix><MM-DD-YYYY>.txt`
    pub fn file_name(category: PostCategory, date: NaiveDate) -> String {
        format!(
            "{}{}{}",
            category.file_prefix(),
            file_date(date),
            ARTIFACT_EXTENSION
        )
    }

    pub fn artifact_path(&self, category: PostCategory, date: NaiveDate) -> PathBuf {
        self.dir.join(Self::file_name(category, date))
    }

    /// Dates of `category` that already have an artifact. A missing
    /// directory holds nothing.
    pub async fn stored_dates(
        &self,
        category: PostCategory,
    ) -> Result<BTreeSet<NaiveDate>, CoreError> {
        let unreadable = || StorageError::DirectoryUnreadable {
            path: self.dir.display().to_string(),
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeSet::new()),
            Err(e) => {
                warn!("Cannot list {}: {}", self.dir.display(), e);
                return Err(unreadable().into());
            }
        };

        let mut dates = BTreeSet::new();
        while let Some(entry) = entries.next_entry().await.map_err(|_| unreadable())? {
            let name = entry.file_name();
            if let Some(date) = name.to_str().and_then(|n| parse_artifact_name(n, category)) {
                dates.insert(date);
            }
        }
        Ok(dates)
    }

    pub async fn already_stored(
        &self,
        category: PostCategory,
        date: NaiveDate,
    ) -> Result<bool, CoreError> {
        Ok(self.stored_dates(category).await?.contains(&date))
    }

    /// Writes one comment per line; newlines inside a comment are written
    /// as-is. The content goes to a private temporary file first and is
    /// hard-linked into place only if no artifact exists, so a crash never
    /// leaves a truncated artifact behind and an existing one is never
    /// replaced. On filesystems without hard links (FAT, some network
    /// shares) the artifact is created exclusively and written directly.
    pub async fn write(
        &self,
        category: PostCategory,
        date: NaiveDate,
        comments: &CommentList,
    ) -> Result<PathBuf, CoreError> {
        let path = self.artifact_path(category, date);
        let path_text = path.display().to_string();
        let write_failed = |source: std::io::Error| StorageError::WriteFailed {
            path: path_text.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(write_failed)?;

        let mut content = String::new();
        for body in comments.iter() {
            content.push_str(body);
            content.push('\n');
        }

        let temp_path = self.dir.join(format!(
            ".{}.{}.partial",
            Self::file_name(category, date),
            Uuid::new_v4()
        ));
        tokio::fs::write(&temp_path, content.as_bytes())
            .await
            .map_err(write_failed)?;

        let placed = match tokio::fs::hard_link(&temp_path, &path).await {
            Err(e) if links_unsupported(&e) => {
                warn!(
                    "{} does not support hard links ({}); writing {} directly",
                    self.dir.display(),
                    e,
                    path.display()
                );
                write_exclusive(&path, content.as_bytes()).await
            }
            linked => linked,
        };
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            debug!("Could not remove {}: {}", temp_path.display(), e);
        }

        match placed {
            Ok(()) => {
                info!(
                    "Wrote {} comments to {}",
                    comments.len(),
                    path.display()
                );
                Ok(path)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(StorageError::AlreadyExists { path: path_text }.into())
            }
            Err(e) => Err(write_failed(e).into()),
        }
    }
}

fn links_unsupported(error: &std::io::Error) -> bool {
    matches!(
        error.kind(),
        ErrorKind::Unsupported | ErrorKind::PermissionDenied
    )
}

/// Creates `path` only if it does not exist yet. A failed write removes the
/// partial file again.
async fn write_exclusive(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(content).await?;
        file.sync_all().await
    }
    .await;

    if written.is_err() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!("Could not remove partial {}: {}", path.display(), e);
        }
    }
    written
}

fn parse_artifact_name(name: &str, category: PostCategory) -> Option<NaiveDate> {
    let date_text = name
        .strip_prefix(category.file_prefix())?
        .strip_suffix(ARTIFACT_EXTENSION)?;
    parse_file_date(date_text)
}
