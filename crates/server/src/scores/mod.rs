//! Persistence of the learner's best score per case

mod file;
mod memory;
mod postgres;

pub use file::FileScoreStore;
pub use memory::MemoryScoreStore;
pub use postgres::{PgScoreStore, create_pool};

use async_trait::async_trait;
use clinsim_core::{ScoreBook, SimError};

/// Where the score book lives between restarts
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Load the whole book. A store with nothing saved yields an empty book.
    async fn load(&self) -> Result<ScoreBook, SimError>;

    /// Persist the whole book
    async fn save(&self, book: &ScoreBook) -> Result<(), SimError>;

    /// Check the backend is reachable
    async fn ping(&self) -> Result<(), SimError>;

    fn backend(&self) -> &'static str;
}
