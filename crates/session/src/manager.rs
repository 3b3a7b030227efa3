//! Two-tier session pool manager.
//!
//! Keeps one pool for short interactive requests and one for bulk
//! transfers, each keyed by remote host, and tells an observer whenever
//! membership changes.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};

use crate::connection::Connection;
use crate::error::SessionError;
use crate::pool::ConnectionPool;
use crate::transport::Connector;
use crate::types::{PoolEvent, PoolKind, SessionConfig, SessionInfo};

const EVENT_CAPACITY: usize = 64;

/// Shared handle to a pooled session.
pub type SharedConnection<C> = Arc<Connection<<C as Connector>::Transport>>;

/// Owns the fast and long-term session pools.
pub struct PoolManager<C: Connector> {
    connector: C,
    config: SessionConfig,
    fast: ConnectionPool<C::Transport>,
    long_term: ConnectionPool<C::Transport>,
    events_tx: mpsc::Sender<PoolEvent>,
    events_rx: Mutex<Option<mpsc::Receiver<PoolEvent>>>,
}

impl<C: Connector> PoolManager<C> {
    pub fn new(connector: C, config: SessionConfig) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            connector,
            config,
            fast: ConnectionPool::new(),
            long_term: ConnectionPool::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Takes the event receiver. Can only be called once.
    pub async fn take_events(&self) -> Option<mpsc::Receiver<PoolEvent>> {
        self.events_rx.lock().await.take()
    }

    fn pool(&self, kind: PoolKind) -> &ConnectionPool<C::Transport> {
        match kind {
            PoolKind::Fast => &self.fast,
            PoolKind::LongTerm => &self.long_term,
        }
    }

    /// Returns the session for `host` in the `kind` pool, connecting on a
    /// miss.
    ///
    /// A failed handshake leaves the pool unchanged and is returned to the
    /// caller; nothing is retried.
    pub async fn get_or_create(
        &self,
        host: &str,
        kind: PoolKind,
    ) -> Result<SharedConnection<C>, SessionError> {
        let (conn, created) = self
            .pool(kind)
            .get_or_try_insert_with(host, || {
                Connection::connect(&self.connector, host, &self.config)
            })
            .await?;

        if created {
            info!(host, pool = %kind, fingerprint = %conn.fingerprint(), "remote session opened");
            self.emit(PoolEvent::Opened(SessionInfo {
                kind,
                host: host.to_string(),
                fingerprint: conn.fingerprint(),
            }));
        }
        Ok(conn)
    }

    /// Returns the pooled session for `host` without connecting.
    pub async fn get(&self, host: &str, kind: PoolKind) -> Option<SharedConnection<C>> {
        self.pool(kind).get(host).await
    }

    /// Closes `conn` and removes it from the `kind` pool.
    ///
    /// A newer session for the same host is left untouched.
    pub async fn evict(&self, kind: PoolKind, conn: &SharedConnection<C>) {
        conn.close();
        if self.pool(kind).remove_exact(conn).await {
            warn!(host = %conn.host(), pool = %kind, "remote session evicted");
            self.emit(PoolEvent::Closed {
                kind,
                host: conn.host().to_string(),
            });
        }
    }

    /// Closes and removes the session for `host`, if any.
    pub async fn close(&self, host: &str, kind: PoolKind) -> bool {
        match self.pool(kind).remove(host).await {
            Some(conn) => {
                conn.close();
                debug!(host, pool = %kind, "remote session closed by request");
                self.emit(PoolEvent::Closed {
                    kind,
                    host: host.to_string(),
                });
                true
            }
            None => false,
        }
    }

    /// Closes every session in both pools and empties them.
    ///
    /// Creations already in progress finish first; sessions they insert are
    /// closed with the rest.
    pub async fn close_all(&self) {
        let mut closed = 0usize;
        for kind in [PoolKind::Fast, PoolKind::LongTerm] {
            for conn in self.pool(kind).drain().await {
                conn.close();
                closed += 1;
            }
        }
        info!(closed, "all remote sessions closed");
        self.emit(PoolEvent::AllClosed);
    }

    /// Lists the sessions currently pooled.
    pub async fn sessions(&self) -> Vec<SessionInfo> {
        let mut out = Vec::new();
        for kind in [PoolKind::Fast, PoolKind::LongTerm] {
            for conn in self.pool(kind).snapshot().await {
                out.push(SessionInfo {
                    kind,
                    host: conn.host().to_string(),
                    fingerprint: conn.fingerprint(),
                });
            }
        }
        out.sort_by(|a, b| (a.kind as u8, &a.host).cmp(&(b.kind as u8, &b.host)));
        out
    }

    fn emit(&self, event: PoolEvent) {
        if let Err(e) = self.events_tx.try_send(event) {
            debug!("pool event dropped: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rhremote_protocol::SessionFingerprint;
    use tokio::sync::oneshot;

    use crate::memory::{MemoryConnector, MemoryPeer};

    fn manager() -> (
        PoolManager<MemoryConnector>,
        mpsc::UnboundedReceiver<MemoryPeer>,
    ) {
        let (connector, peers) = MemoryConnector::new();
        (PoolManager::new(connector, SessionConfig::default()), peers)
    }

    /// Accepts every handshake, counting them.
    fn serve_accepting(mut peers: mpsc::UnboundedReceiver<MemoryPeer>) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Some(mut peer) = peers.recv().await {
                let n = seen.fetch_add(1, Ordering::SeqCst) as u8;
                peer.accept_connect(SessionFingerprint([n; 32]))
                    .await
                    .unwrap();
                held.push(peer);
            }
        });
        count
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (mgr, peers) = manager();
        let handshakes = serve_accepting(peers);

        let a = mgr.get_or_create("10.0.0.1", PoolKind::Fast).await.unwrap();
        let b = mgr.get_or_create("10.0.0.1", PoolKind::Fast).await.unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pools_are_independent() {
        let (mgr, peers) = manager();
        let handshakes = serve_accepting(peers);

        let fast = mgr.get_or_create("h", PoolKind::Fast).await.unwrap();
        let long = mgr.get_or_create("h", PoolKind::LongTerm).await.unwrap();

        assert!(!Arc::ptr_eq(&fast, &long));
        assert_eq!(handshakes.load(Ordering::SeqCst), 2);
        assert_eq!(mgr.sessions().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_handshake() {
        let (mgr, peers) = manager();
        let handshakes = serve_accepting(peers);
        let mgr = Arc::new(mgr);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let mgr = mgr.clone();
                tokio::spawn(async move { mgr.get_or_create("h", PoolKind::LongTerm).await })
            })
            .collect();
        let mut conns = Vec::new();
        for t in tasks {
            conns.push(t.await.unwrap().unwrap());
        }

        assert!(conns.iter().all(|c| Arc::ptr_eq(c, &conns[0])));
        assert_eq!(handshakes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_handshake_leaves_no_entry() {
        let (mgr, mut peers) = manager();
        tokio::spawn(async move {
            let mut peer = peers.recv().await.unwrap();
            peer.reject_connect(1).await.unwrap();
        });

        let err = mgr.get_or_create("h", PoolKind::Fast).await.unwrap_err();
        assert!(matches!(err, SessionError::Rejected { status: 1 }));
        assert!(mgr.get("h", PoolKind::Fast).await.is_none());
        assert!(mgr.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_roothelper_is_io_error() {
        let (mgr, peers) = manager();
        drop(peers);
        let err = mgr.get_or_create("h", PoolKind::Fast).await.unwrap_err();
        assert!(matches!(err, SessionError::Io(_)));
    }

    #[tokio::test]
    async fn evict_then_reconnect() {
        let (mgr, peers) = manager();
        let handshakes = serve_accepting(peers);

        let first = mgr.get_or_create("h", PoolKind::LongTerm).await.unwrap();
        mgr.evict(PoolKind::LongTerm, &first).await;
        assert!(first.is_closed());
        assert!(mgr.get("h", PoolKind::LongTerm).await.is_none());

        let second = mgr.get_or_create("h", PoolKind::LongTerm).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn close_single_host() {
        let (mgr, peers) = manager();
        serve_accepting(peers);

        let conn = mgr.get_or_create("h", PoolKind::Fast).await.unwrap();
        assert!(mgr.close("h", PoolKind::Fast).await);
        assert!(!mgr.close("h", PoolKind::Fast).await);
        assert!(conn.is_closed());
    }

    #[tokio::test]
    async fn close_all_empties_both_pools() {
        let (mgr, peers) = manager();
        serve_accepting(peers);

        let a = mgr.get_or_create("a", PoolKind::Fast).await.unwrap();
        let b = mgr.get_or_create("b", PoolKind::LongTerm).await.unwrap();
        mgr.close_all().await;
        mgr.close_all().await;

        assert!(a.is_closed());
        assert!(b.is_closed());
        assert!(mgr.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn close_all_waits_for_creation_in_progress() {
        let (mgr, mut peers) = manager();
        let mgr = Arc::new(mgr);
        let (started_tx, started_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let mut peer = peers.recv().await.unwrap();
            peer.read_connect().await.unwrap();
            started_tx.send(()).unwrap();
            release_rx.await.unwrap();
            tokio::io::AsyncWriteExt::write_all(&mut peer, &[0u8; 33])
                .await
                .unwrap();
            peer
        });

        let creating = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.get_or_create("slow", PoolKind::Fast).await })
        };
        started_rx.await.unwrap();

        let closing = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.close_all().await })
        };
        release_tx.send(()).unwrap();

        let conn = creating.await.unwrap().unwrap();
        closing.await.unwrap();

        assert!(conn.is_closed());
        assert!(mgr.sessions().await.is_empty());
    }

    #[tokio::test]
    async fn stalled_handshake_does_not_block_other_hosts() {
        let (mgr, mut peers) = manager();
        let mgr = Arc::new(mgr);
        let (stalled_tx, stalled_rx) = oneshot::channel();

        tokio::spawn(async move {
            let mut held = Vec::new();
            let mut stalled_tx = Some(stalled_tx);
            while let Some(mut peer) = peers.recv().await {
                let (host, _) = peer.read_connect().await.unwrap();
                if host == "dead-host" {
                    if let Some(tx) = stalled_tx.take() {
                        tx.send(()).unwrap();
                    }
                } else {
                    tokio::io::AsyncWriteExt::write_all(&mut peer, &[0u8; 33])
                        .await
                        .unwrap();
                }
                held.push(peer);
            }
        });

        let live = mgr.get_or_create("live-host", PoolKind::Fast).await.unwrap();
        let stalled = {
            let mgr = mgr.clone();
            tokio::spawn(async move { mgr.get_or_create("dead-host", PoolKind::Fast).await })
        };
        stalled_rx.await.unwrap();

        let hit = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            mgr.get_or_create("live-host", PoolKind::Fast),
        )
        .await
        .expect("pooled hit waited on another host's handshake")
        .unwrap();
        assert!(Arc::ptr_eq(&live, &hit));

        let fresh = tokio::time::timeout(
            std::time::Duration::from_millis(500),
            mgr.get_or_create("other-host", PoolKind::Fast),
        )
        .await
        .expect("new host waited on another host's handshake")
        .unwrap();
        assert_eq!(fresh.host(), "other-host");
        assert!(!stalled.is_finished());
        stalled.abort();
    }

    #[tokio::test]
    async fn membership_events() {
        let (mgr, peers) = manager();
        serve_accepting(peers);
        let mut events = mgr.take_events().await.unwrap();
        assert!(mgr.take_events().await.is_none());

        let conn = mgr.get_or_create("h", PoolKind::Fast).await.unwrap();
        mgr.get_or_create("h", PoolKind::Fast).await.unwrap();
        mgr.evict(PoolKind::Fast, &conn).await;
        mgr.evict(PoolKind::Fast, &conn).await;
        mgr.close_all().await;

        match events.recv().await.unwrap() {
            PoolEvent::Opened(info) => {
                assert_eq!(info.host, "h");
                assert_eq!(info.kind, PoolKind::Fast);
                assert_eq!(info.fingerprint, conn.fingerprint());
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert_eq!(
            events.recv().await.unwrap(),
            PoolEvent::Closed {
                kind: PoolKind::Fast,
                host: "h".into()
            }
        );
        assert_eq!(events.recv().await.unwrap(), PoolEvent::AllClosed);
        assert!(events.try_recv().is_err());
    }
}
