use async_trait::async_trait;
use clinsim_core::{ScoreBook, SimError};
use tokio::sync::Mutex;

use super::ScoreStore;

/// Volatile store, used when no persistence is configured and in tests
#[derive(Default)]
pub struct MemoryScoreStore {
    book: Mutex<ScoreBook>,
}

impl MemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryScoreStore {
    async fn load(&self) -> Result<ScoreBook, SimError> {
        Ok(self.book.lock().await.clone())
    }

    async fn save(&self, book: &ScoreBook) -> Result<(), SimError> {
        *self.book.lock().await = book.clone();
        Ok(())
    }

    async fn ping(&self) -> Result<(), SimError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
