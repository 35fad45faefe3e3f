//! In-memory registry of live sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use clinsim_core::SimError;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::SessionHandle;
use super::state::SessionState;

/// Sessions untouched for this long are dropped
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

struct Slot {
    handle: SessionHandle,
    /// Milliseconds since the registry epoch
    last_seen: AtomicU64,
}

/// Live sessions keyed by id. Cheap to clone.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<Uuid, Slot>>>,
    idle_ttl: Duration,
    epoch: Instant,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_idle_ttl(DEFAULT_IDLE_TTL)
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle_ttl(idle_ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            idle_ttl,
            epoch: Instant::now(),
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.idle_ttl
    }

    fn stamp(&self, at: Instant) -> u64 {
        u64::try_from(at.saturating_duration_since(self.epoch).as_millis()).unwrap_or(u64::MAX)
    }

    pub async fn insert(&self, state: SessionState) -> SessionHandle {
        self.evict_idle().await;

        let id = state.id();
        let handle = Arc::new(Mutex::new(state));
        let slot = Slot {
            handle: handle.clone(),
            last_seen: AtomicU64::new(self.stamp(Instant::now())),
        };
        self.sessions.write().await.insert(id, slot);
        handle
    }

    /// Look up a session and mark it as seen
    pub async fn get(&self, id: Uuid) -> Result<SessionHandle, SimError> {
        let sessions = self.sessions.read().await;
        let slot = sessions
            .get(&id)
            .ok_or_else(|| SimError::SessionNotFound(id.to_string()))?;
        slot.last_seen
            .store(self.stamp(Instant::now()), Ordering::Relaxed);
        Ok(slot.handle.clone())
    }

    /// Remove and end the session. Late model results are discarded.
    pub async fn remove(&self, id: Uuid) -> Result<SessionHandle, SimError> {
        let slot = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or_else(|| SimError::SessionNotFound(id.to_string()))?;
        slot.handle.lock().await.end();
        Ok(slot.handle)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop sessions idle past the TTL. Returns how many were evicted.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    /// Eviction as of `now`. Sessions with a model call outstanding or
    /// autopilot running are kept.
    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let cutoff = self.stamp(now).saturating_sub(
            u64::try_from(self.idle_ttl.as_millis()).unwrap_or(u64::MAX),
        );
        let mut sessions = self.sessions.write().await;

        let expired: Vec<Uuid> = sessions
            .iter()
            .filter(|(_, slot)| slot.last_seen.load(Ordering::Relaxed) < cutoff)
            .filter(|(_, slot)| {
                slot.handle
                    .try_lock()
                    .map(|state| state.is_quiescent())
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(slot) = sessions.remove(id) {
                if let Ok(mut state) = slot.handle.try_lock() {
                    state.end();
                }
                tracing::info!(session_id = %id, "Idle session evicted");
            }
        }
        expired.len()
    }

    /// Periodically evict idle sessions in the background
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                let evicted = registry.evict_idle().await;
                if evicted > 0 {
                    metrics::counter!("sessions_evicted_total").increment(evicted as u64);
                }
            }
        })
    }
}
