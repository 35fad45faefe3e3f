//! JSON file store: `{"case-id": best_score, ...}`

use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use clinsim_core::{ScoreBook, SimError};

use super::ScoreStore;

pub struct FileScoreStore {
    path: PathBuf,
}

impl FileScoreStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ScoreStore for FileScoreStore {
    async fn load(&self) -> Result<ScoreBook, SimError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ScoreBook::new()),
            Err(e) => return Err(SimError::Storage(format!("Failed to read scores: {}", e))),
        };

        match serde_json::from_slice(&bytes) {
            Ok(book) => Ok(book),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Unreadable score file, starting empty");
                Ok(ScoreBook::new())
            }
        }
    }

    async fn save(&self, book: &ScoreBook) -> Result<(), SimError> {
        let json = serde_json::to_vec_pretty(book)
            .map_err(|e| SimError::Storage(format!("Failed to encode scores: {}", e)))?;

        // write-then-rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SimError::Storage(format!("Failed to write scores: {}", e)))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SimError::Storage(format!("Failed to write scores: {}", e)))
    }

    async fn ping(&self) -> Result<(), SimError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::metadata(&dir)
            .await
            .map(|_| ())
            .map_err(|e| SimError::Storage(format!("Score directory unavailable: {}", e)))
    }

    fn backend(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileScoreStore::new(dir.path().join("scores.json"));
        assert_eq!(store.load().await.unwrap(), ScoreBook::new());
        store.ping().await.unwrap();
    }

    #[tokio::test]
    async fn saved_book_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");

        let mut book = ScoreBook::new();
        book.record("cardio-001", 82);
        book.record("cardio-002", 64);
        FileScoreStore::new(&path).save(&book).await.unwrap();

        let reloaded = FileScoreStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded.get("cardio-001"), Some(82));
        assert_eq!(reloaded.total_score(), 146);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["cardio-002"], 64);
    }

    #[tokio::test]
    async fn corrupt_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scores.json");
        std::fs::write(&path, "not json").unwrap();

        let book = FileScoreStore::new(&path).load().await.unwrap();
        assert_eq!(book.cases_completed(), 0);
    }
}
