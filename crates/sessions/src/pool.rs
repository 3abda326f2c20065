use std::{
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use {
    parley_auto_reply::Dispatcher,
    parley_channels::{Connected, Connector, Credential, Error, Result, Session},
    tokio::{
        sync::OnceCell,
        task::JoinHandle,
        time::{Instant, MissedTickBehavior},
    },
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, gauge, sessions as session_metrics};

/// Idle eviction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolConfig {
    /// Sessions unused for longer than this are torn down by the sweep.
    pub idle_timeout: Duration,
    /// How often the sweeper runs.
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

type Slot = Arc<OnceCell<Arc<Session>>>;

/// Floor for the sweep period; `interval` panics on zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

enum Claim {
    Ready,
    Closed,
    Superseded,
}

/// Owns the credential → session map.
///
/// Each credential fingerprint has one slot; concurrent callers for the same
/// credential wait on the slot, so only one connection is ever made. Slots
/// stay in creation order.
pub struct SessionPool {
    connector: Arc<dyn Connector>,
    dispatcher: Arc<Dispatcher>,
    config: PoolConfig,
    slots: Mutex<Vec<(String, Slot)>>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SessionPool {
    pub fn new(
        connector: Arc<dyn Connector>,
        dispatcher: Arc<Dispatcher>,
        config: PoolConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            connector,
            dispatcher,
            config,
            slots: Mutex::new(Vec::new()),
            sweeper: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Return the live session for `credential`, connecting and
    /// authenticating on first use.
    pub async fn get_or_create(&self, credential: &Credential) -> Result<Arc<Session>> {
        if credential.is_empty() {
            return Err(Error::invalid_input("a bot token is required"));
        }
        let key = credential.fingerprint();

        loop {
            let slot = self.slot(key);
            let session = match slot.get_or_try_init(|| self.connect(credential)).await {
                Ok(session) => Arc::clone(session),
                Err(e) => {
                    self.remove_slot(key, &slot);
                    return Err(e);
                },
            };

            match self.claim(key, &slot, &session) {
                Claim::Ready => {
                    self.record_active();
                    return Ok(session);
                },
                // Torn down between lookup and use: start over with a fresh slot.
                Claim::Closed => continue,
                // Initialized on a slot a failed attempt already discarded.
                Claim::Superseded => {
                    session.close().await;
                    continue;
                },
            }
        }
    }

    /// Look up an existing session without creating one.
    pub fn get(&self, credential: &Credential) -> Option<Arc<Session>> {
        let key = credential.fingerprint();
        let slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let session = slots
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, slot)| slot.get())
            .filter(|s| !s.is_closed())?;
        session.touch();
        Some(Arc::clone(session))
    }

    /// Live sessions in creation order.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|(_, slot)| slot.get())
            .filter(|s| !s.is_closed())
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tear down sessions idle past the threshold. Returns how many went.
    pub async fn evict_idle(&self) -> usize {
        self.evict_idle_at(Instant::now()).await
    }

    pub async fn evict_idle_at(&self, now: Instant) -> usize {
        let threshold = self.config.idle_timeout;
        let expired: Vec<Arc<Session>> = self
            .sessions()
            .into_iter()
            .filter(|s| s.idle_for(now) > threshold)
            .collect();

        let mut evicted = 0;
        for session in expired {
            let idle_ms = session.idle_for(now).as_millis() as u64;
            // Earlier teardowns await; a session handed out meanwhile stays.
            if !self.detach(&session, |s| s.idle_for(now) > threshold) {
                debug!(
                    credential = %session.credential_hint(),
                    "session used again before eviction"
                );
                continue;
            }
            session.finish_close().await;
            self.record_active();
            evicted += 1;
            info!(
                credential = %session.credential_hint(),
                idle_ms,
                "evicted idle session"
            );

            #[cfg(feature = "metrics")]
            counter!(session_metrics::EVICTED_TOTAL).increment(1);
        }
        evicted
    }

    /// Tear down one credential's session. A missing or already destroyed
    /// session is a no-op.
    pub async fn destroy(&self, credential: &Credential) -> bool {
        match self.find(credential.fingerprint()) {
            Some(session) => self.teardown(&session).await,
            None => false,
        }
    }

    /// Tear down every session and stop the sweeper.
    pub async fn destroy_all(&self) {
        self.stop_sweeper();
        let sessions = self.sessions();
        let count = sessions.len();
        for session in sessions {
            self.teardown(&session).await;
        }
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.record_active();
        info!(count, "all sessions destroyed");
    }

    /// Start the periodic idle sweep. The task only holds a weak reference
    /// and ends once the pool is dropped.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            debug!("session sweeper already running");
            return;
        }

        let pool: Weak<Self> = Arc::downgrade(self);
        let mut period = self.config.sweep_interval;
        if period.is_zero() {
            warn!(
                min_secs = MIN_SWEEP_INTERVAL.as_secs_f64(),
                "sweep interval is zero, using the minimum"
            );
            period = MIN_SWEEP_INTERVAL;
        }
        *sweeper = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(pool) = pool.upgrade() else {
                    break;
                };
                let evicted = pool.evict_idle().await;
                debug!(evicted, remaining = pool.len(), "idle sweep finished");
            }
        }));
        info!(
            interval_secs = period.as_secs_f64(),
            idle_timeout_secs = self.config.idle_timeout.as_secs_f64(),
            "session sweeper started"
        );
    }

    pub fn stop_sweeper(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            handle.abort();
            debug!("session sweeper stopped");
        }
    }

    async fn connect(&self, credential: &Credential) -> Result<Arc<Session>> {
        debug!(credential = %credential.hint(), "opening session");
        let Connected {
            connection,
            inbound,
        } = self.connector.open(credential).await?;

        let bot = match connection.authenticate().await {
            Ok(bot) => bot,
            Err(e) => {
                connection.shutdown().await;
                warn!(credential = %credential.hint(), error = %e, "authentication failed");

                #[cfg(feature = "metrics")]
                counter!(session_metrics::AUTH_FAILURES_TOTAL).increment(1);

                return Err(Error::AuthenticationFailed {
                    credential: credential.hint(),
                    reason: e.to_string(),
                });
            },
        };

        let session = Arc::new(Session::new(credential.clone(), connection, bot));
        self.dispatcher.attach(&session, inbound);
        info!(
            credential = %credential.hint(),
            bot = %session.bot().username,
            "session ready"
        );

        #[cfg(feature = "metrics")]
        counter!(session_metrics::CREATED_TOTAL).increment(1);

        Ok(session)
    }

    /// Teardown path shared by destroy and destroy_all.
    async fn teardown(&self, session: &Arc<Session>) -> bool {
        let claimed = self.detach(session, |_| true);
        if claimed {
            session.finish_close().await;
        }
        self.record_active();
        claimed
    }

    /// Unlink `session` and claim its teardown, provided `evictable` still
    /// holds. Runs under the slot lock, which [`SessionPool::claim`] also
    /// takes before touching a session, so a session cannot be handed out
    /// and closed at the same time.
    fn detach(&self, session: &Arc<Session>, evictable: impl FnOnce(&Session) -> bool) -> bool {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if !session.is_closed() && !evictable(session) {
            return false;
        }
        slots.retain(|(_, slot)| !slot.get().is_some_and(|s| Arc::ptr_eq(s, session)));
        session.mark_closed()
    }

    /// Hand out `session` from `slot` and refresh its idle clock.
    fn claim(&self, key: &str, slot: &Slot, session: &Session) -> Claim {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if session.is_closed() {
            slots.retain(|(k, s)| !(k == key && Arc::ptr_eq(s, slot)));
            return Claim::Closed;
        }
        match slots.iter().find(|(k, _)| k == key) {
            Some((_, current)) if !Arc::ptr_eq(current, slot) => return Claim::Superseded,
            Some(_) => {},
            None => slots.push((key.to_string(), Arc::clone(slot))),
        }
        session.touch();
        Claim::Ready
    }

    fn slot(&self, key: &str) -> Slot {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((_, slot)) = slots.iter().find(|(k, _)| k == key) {
            return Arc::clone(slot);
        }
        let slot: Slot = Arc::new(OnceCell::new());
        slots.push((key.to_string(), Arc::clone(&slot)));
        slot
    }

    fn find(&self, key: &str) -> Option<Arc<Session>> {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, slot)| slot.get().cloned())
            .filter(|s| !s.is_closed())
    }

    fn remove_slot(&self, key: &str, slot: &Slot) {
        self.slots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|(k, s)| !(k == key && Arc::ptr_eq(s, slot)));
    }

    fn record_active(&self) {
        #[cfg(feature = "metrics")]
        gauge!(session_metrics::ACTIVE).set(self.len() as f64);
    }
}

impl Drop for SessionPool {
    fn drop(&mut self) {
        self.stop_sweeper();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        parley_auto_reply::HandlerRegistry,
        parley_channels::testing::{FakeConnection, FakeConnector},
    };

    fn pool_with(
        factory: impl Fn(&Credential) -> FakeConnection + Send + Sync + 'static,
        config: PoolConfig,
    ) -> (Arc<SessionPool>, Arc<FakeConnector>) {
        let connector = Arc::new(FakeConnector::new(factory));
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(HandlerRegistry::with_builtins())));
        let pool = SessionPool::new(connector.clone(), dispatcher, config);
        (pool, connector)
    }

    fn short_idle() -> PoolConfig {
        PoolConfig {
            idle_timeout: Duration::from_millis(1000),
            sweep_interval: Duration::from_millis(250),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_creation_shares_one_session() {
        let (pool, connector) = pool_with(
            |_| FakeConnection::new().auth_delay(Duration::from_millis(50)),
            PoolConfig::default(),
        );
        let credential = Credential::new("token-concurrent-0001");

        let (a, b) = tokio::join!(
            pool.get_or_create(&credential),
            pool.get_or_create(&credential)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(connector.open_count(), 1);
        assert_eq!(pool.len(), 1);
        assert!(a.dispatcher_attached());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_sessions() {
        let (pool, connector) = pool_with(|_| FakeConnection::new(), short_idle());
        let a = Credential::new("token-session-aaaa");
        let b = Credential::new("token-session-bbbb");
        pool.get_or_create(&a).await.unwrap();
        pool.get_or_create(&b).await.unwrap();

        tokio::time::advance(Duration::from_millis(1000)).await;
        pool.get_or_create(&b).await.unwrap();
        tokio::time::advance(Duration::from_millis(500)).await;

        assert_eq!(pool.evict_idle().await, 1);
        assert!(pool.get(&a).is_none());
        assert!(pool.get(&b).is_some());
        assert_eq!(pool.len(), 1);

        let opened = connector.opened();
        assert_eq!(opened[0].shutdown_count(), 1);
        assert_eq!(opened[1].shutdown_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_keeps_creation_order() {
        let (pool, _) = pool_with(|_| FakeConnection::new(), short_idle());
        let creds: Vec<_> = ["t-one-1111", "t-two-2222", "t-three-3333"]
            .into_iter()
            .map(Credential::new)
            .collect();
        for c in &creds {
            pool.get_or_create(c).await.unwrap();
        }
        tokio::time::advance(Duration::from_millis(1500)).await;
        pool.get_or_create(&creds[0]).await.unwrap();
        pool.get_or_create(&creds[2]).await.unwrap();

        assert_eq!(pool.evict_idle().await, 1);
        let remaining: Vec<_> = pool
            .sessions()
            .iter()
            .map(|s| s.credential_hint())
            .collect();
        assert_eq!(remaining, vec!["…1111", "…3333"]);
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_runs_on_interval() {
        let (pool, _) = pool_with(|_| FakeConnection::new(), short_idle());
        pool.get_or_create(&Credential::new("token-sweeper-0001"))
            .await
            .unwrap();
        pool.start_sweeper();
        pool.start_sweeper();

        tokio::time::sleep(Duration::from_millis(800)).await;
        assert_eq!(pool.len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(pool.is_empty());
        pool.stop_sweeper();
    }

    #[tokio::test]
    async fn failed_authentication_leaves_no_entry() {
        let (pool, connector) = pool_with(
            |_| FakeConnection::new().rejecting_auth("401 Unauthorized"),
            PoolConfig::default(),
        );
        let credential = Credential::new("super-secret-token-XYZW");

        let err = pool.get_or_create(&credential).await.unwrap_err();
        assert!(matches!(err, Error::AuthenticationFailed { .. }));
        let text = err.to_string();
        assert!(text.contains("…XYZW"));
        assert!(!text.contains("super-secret"));

        assert!(pool.is_empty());
        assert!(pool.get(&credential).is_none());
        assert_eq!(connector.last().unwrap().shutdown_count(), 1);

        assert!(pool.get_or_create(&credential).await.is_err());
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test]
    async fn empty_credential_is_rejected() {
        let (pool, connector) = pool_with(|_| FakeConnection::new(), PoolConfig::default());
        let err = pool.get_or_create(&Credential::new("  ")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test]
    async fn destroy_is_idempotent_and_allows_recreation() {
        let (pool, connector) = pool_with(|_| FakeConnection::new(), PoolConfig::default());
        let credential = Credential::new("token-destroy-0001");
        let first = pool.get_or_create(&credential).await.unwrap();

        assert!(pool.destroy(&credential).await);
        assert!(!pool.destroy(&credential).await);
        assert!(first.is_closed());
        assert_eq!(connector.opened()[0].shutdown_count(), 1);

        let second = pool.get_or_create(&credential).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(connector.open_count(), 2);
    }

    #[tokio::test]
    async fn destroy_all_closes_everything() {
        let (pool, connector) = pool_with(|_| FakeConnection::new(), PoolConfig::default());
        let a = pool
            .get_or_create(&Credential::new("token-all-aaaa"))
            .await
            .unwrap();
        let b = pool
            .get_or_create(&Credential::new("token-all-bbbb"))
            .await
            .unwrap();

        pool.destroy_all().await;
        assert!(pool.is_empty());
        assert!(a.is_closed() && b.is_closed());
        assert!(connector.opened().iter().all(|c| c.shutdown_count() == 1));

        pool.destroy_all().await;
        assert!(connector.opened().iter().all(|c| c.shutdown_count() == 1));
    }

    #[tokio::test]
    async fn get_does_not_create() {
        let (pool, connector) = pool_with(|_| FakeConnection::new(), PoolConfig::default());
        assert!(pool.get(&Credential::new("token-get-0001")).is_none());
        assert_eq!(connector.open_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_reused_during_sweep_is_not_evicted() {
        let (pool, connector) = pool_with(
            |_| FakeConnection::new().shutdown_delay(Duration::from_millis(100)),
            short_idle(),
        );
        let a = Credential::new("token-race-aaaa");
        let b = Credential::new("token-race-bbbb");
        pool.get_or_create(&a).await.unwrap();
        let first_b = pool.get_or_create(&b).await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;

        let sweep = tokio::spawn({
            let pool = Arc::clone(&pool);
            async move { pool.evict_idle().await }
        });
        // The sweep is now awaiting the first session's shutdown.
        tokio::time::sleep(Duration::from_millis(10)).await;
        let reused = pool.get_or_create(&b).await.unwrap();

        assert_eq!(sweep.await.unwrap(), 1);
        assert!(Arc::ptr_eq(&first_b, &reused));
        assert!(!reused.is_closed());
        assert!(reused.dispatcher_attached());
        assert_eq!(pool.len(), 1);
        assert!(pool.get(&a).is_none());
        assert_eq!(connector.open_count(), 2);
        assert_eq!(connector.opened()[0].shutdown_count(), 1);
        assert_eq!(connector.opened()[1].shutdown_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_sweep_interval_uses_the_minimum() {
        let (pool, _) = pool_with(|_| FakeConnection::new(), PoolConfig {
            idle_timeout: Duration::from_millis(100),
            sweep_interval: Duration::ZERO,
        });
        pool.get_or_create(&Credential::new("token-zero-0001"))
            .await
            .unwrap();
        pool.start_sweeper();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(pool.len(), 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(pool.is_empty());
        pool.stop_sweeper();
    }
}
