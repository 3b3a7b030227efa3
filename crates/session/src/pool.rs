//! Keyed store of live sessions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::Connection;
use crate::error::SessionError;

/// Sessions keyed by host.
///
/// Creation is serialized per host through a slot lock, so two callers
/// asking for the same host never both run a handshake while lookups for
/// other hosts go straight through. The entry map lock is only held for
/// map reads and writes.
pub struct ConnectionPool<T> {
    entries: Mutex<HashMap<String, Arc<Connection<T>>>>,
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<T> Default for ConnectionPool<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<T> ConnectionPool<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live session for `host`, creating it with `create` on a
    /// miss. Closed entries count as misses.
    ///
    /// The boolean is true when a new session was inserted. A failed
    /// `create` leaves no entry behind.
    pub async fn get_or_try_insert_with<F, Fut>(
        &self,
        host: &str,
        create: F,
    ) -> Result<(Arc<Connection<T>>, bool), SessionError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Connection<T>, SessionError>>,
    {
        if let Some(conn) = self.live(host).await {
            return Ok((conn, false));
        }

        let slot = self.slots.lock().await.entry(host.to_string()).or_default().clone();
        let _creating = slot.lock().await;

        // Another caller may have finished creating while we queued.
        if let Some(conn) = self.live(host).await {
            return Ok((conn, false));
        }

        let result = create().await;
        let conn = match result {
            Ok(conn) => Arc::new(conn),
            Err(e) => {
                self.release_slot(host, &slot).await;
                return Err(e);
            }
        };
        self.entries
            .lock()
            .await
            .insert(host.to_string(), conn.clone());
        self.release_slot(host, &slot).await;
        Ok((conn, true))
    }

    /// Live entry for `host`; a closed one is dropped from the map.
    async fn live(&self, host: &str) -> Option<Arc<Connection<T>>> {
        let mut entries = self.entries.lock().await;
        match entries.get(host) {
            Some(conn) if !conn.is_closed() => Some(conn.clone()),
            Some(_) => {
                entries.remove(host);
                None
            }
            None => None,
        }
    }

    /// Forgets `host`'s slot unless another caller is queued on it.
    async fn release_slot(&self, host: &str, slot: &Arc<Mutex<()>>) {
        let mut slots = self.slots.lock().await;
        if let Some(current) = slots.get(host)
            && Arc::ptr_eq(current, slot)
            && Arc::strong_count(slot) <= 2
        {
            slots.remove(host);
        }
    }

    pub async fn get(&self, host: &str) -> Option<Arc<Connection<T>>> {
        self.entries.lock().await.get(host).cloned()
    }

    pub async fn remove(&self, host: &str) -> Option<Arc<Connection<T>>> {
        self.entries.lock().await.remove(host)
    }

    /// Removes the entry for `conn`'s host only if it still is `conn`.
    ///
    /// A replacement created after `conn` failed stays in place.
    pub async fn remove_exact(&self, conn: &Arc<Connection<T>>) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.get(conn.host()) {
            Some(current) if Arc::ptr_eq(current, conn) => {
                entries.remove(conn.host());
                true
            }
            _ => false,
        }
    }

    /// Empties the pool, returning every session it held.
    ///
    /// Creations in progress finish first and their sessions are included.
    pub async fn drain(&self) -> Vec<Arc<Connection<T>>> {
        let mut slots: Vec<_> = self
            .slots
            .lock()
            .await
            .iter()
            .map(|(host, slot)| (host.clone(), slot.clone()))
            .collect();
        // Fixed order so concurrent drains cannot deadlock.
        slots.sort_by(|a, b| a.0.cmp(&b.0));
        let mut held = Vec::with_capacity(slots.len());
        for (_, slot) in &slots {
            held.push(slot.lock().await);
        }
        let drained = self.entries.lock().await.drain().map(|(_, c)| c).collect();
        drop(held);
        drained
    }

    pub async fn snapshot(&self) -> Vec<Arc<Connection<T>>> {
        self.entries.lock().await.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhremote_protocol::SessionFingerprint;

    use crate::memory::{MemoryConnector, MemoryTransport};
    use crate::types::SessionConfig;

    /// Connector whose peers accept every handshake.
    fn accepting_connector() -> MemoryConnector {
        let (connector, mut peers) = MemoryConnector::new();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(mut peer) = peers.recv().await {
                peer.accept_connect(SessionFingerprint([9; 32]))
                    .await
                    .unwrap();
                held.push(peer);
            }
        });
        connector
    }

    #[tokio::test]
    async fn hit_returns_same_instance() {
        let connector = accepting_connector();
        let pool: ConnectionPool<MemoryTransport> = ConnectionPool::new();
        let config = SessionConfig::default();

        let (a, created_a) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();
        let (b, created_b) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();

        assert!(created_a);
        assert!(!created_b);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.opened(), 1);
    }

    #[tokio::test]
    async fn failed_create_leaves_no_entry() {
        let pool: ConnectionPool<MemoryTransport> = ConnectionPool::new();
        let result = pool
            .get_or_try_insert_with("h", || async { Err(SessionError::Timeout) })
            .await;
        assert!(result.is_err());
        assert!(pool.get("h").await.is_none());
    }

    #[tokio::test]
    async fn closed_entry_is_replaced() {
        let connector = accepting_connector();
        let pool: ConnectionPool<MemoryTransport> = ConnectionPool::new();
        let config = SessionConfig::default();

        let (first, _) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();
        first.close();
        let (second, created) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();

        assert!(created);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.opened(), 2);
    }

    #[tokio::test]
    async fn remove_exact_keeps_replacement() {
        let connector = accepting_connector();
        let pool: ConnectionPool<MemoryTransport> = ConnectionPool::new();
        let config = SessionConfig::default();

        let (stale, _) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();
        stale.close();
        let (fresh, _) = pool
            .get_or_try_insert_with("h", || Connection::connect(&connector, "h", &config))
            .await
            .unwrap();

        assert!(!pool.remove_exact(&stale).await);
        assert!(pool.get("h").await.is_some());
        assert!(pool.remove_exact(&fresh).await);
        assert!(pool.snapshot().await.is_empty());
    }
}
