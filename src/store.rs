use crate::model::FollowerSnapshot;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;

pub const FILENAME_SEPARATOR: &str = "_";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Error accessing snapshot file: {0}")]
    Io(
        #[source]
        #[from]
        std::io::Error,
    ),
    #[error("Error encoding snapshot record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed snapshot record in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Snapshot file exists but contains no records: {0}")]
    Empty(PathBuf),
}

/// Append-only store of follower snapshots, one JSON-lines file per user.
/// Files are only ever appended to; the last line is the most recent record.
pub struct SnapshotStore {
    out_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// Deterministic per-user file path, e.g. `42_Some_User_followers_ids.json`.
    pub fn path_for(&self, user_id: u64, user_name: &str) -> PathBuf {
        let file_name = format!(
            "{user_id}{FILENAME_SEPARATOR}{}{FILENAME_SEPARATOR}followers_ids.json",
            user_name.replace(' ', "_")
        );
        self.out_dir.join(file_name)
    }

    /// The most recently appended snapshot for the user, or `None` when no
    /// file exists yet (first run).
    pub async fn read_last(
        &self,
        user_id: u64,
        user_name: &str,
    ) -> Result<Option<FollowerSnapshot>, StoreError> {
        let path = self.path_for(user_id, user_name);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let last = contents
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .ok_or_else(|| StoreError::Empty(path.clone()))?;
        let snapshot =
            serde_json::from_str(last).map_err(|source| StoreError::Malformed { path, source })?;
        Ok(Some(snapshot))
    }

    /// Append one record, creating the output directory and file on first use.
    pub async fn append(&self, snapshot: &FollowerSnapshot) -> Result<(), StoreError> {
        fs::create_dir_all(&self.out_dir).await?;
        let path = self.path_for(snapshot.user_id, &snapshot.user_name);
        let mut line = serde_json::to_string(snapshot).map_err(StoreError::Encode)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
