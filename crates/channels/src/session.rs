//! One authenticated connection plus the listeners attached to it.

use std::{
    fmt,
    sync::{
        Arc, Mutex, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use {
    tokio::{task::AbortHandle, time::Instant},
    tracing::{debug, info},
};

use crate::{
    connection::ChatConnection,
    credential::Credential,
    error::{Error, Result},
    listener::{Listener, ListenerSnapshot},
    types::BotIdentity,
};

/// A live, authenticated session for one credential.
///
/// Listener storage is mutated only through [`Session::add_listener`] and
/// [`Session::remove_listener`]; readers get clones or snapshots.
pub struct Session {
    credential: Credential,
    connection: Arc<dyn ChatConnection>,
    bot: BotIdentity,
    created_at: Instant,
    last_used: Mutex<Instant>,
    listeners: RwLock<Vec<Listener>>,
    dispatcher_attached: AtomicBool,
    dispatch_task: Mutex<Option<AbortHandle>>,
    closed: AtomicBool,
}

impl Session {
    pub fn new(
        credential: Credential,
        connection: Arc<dyn ChatConnection>,
        bot: BotIdentity,
    ) -> Self {
        let now = Instant::now();
        Self {
            credential,
            connection,
            bot,
            created_at: now,
            last_used: Mutex::new(now),
            listeners: RwLock::new(Vec::new()),
            dispatcher_attached: AtomicBool::new(false),
            dispatch_task: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Pool key: the credential fingerprint.
    pub fn key(&self) -> &str {
        self.credential.fingerprint()
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn credential_hint(&self) -> String {
        self.credential.hint()
    }

    pub fn connection(&self) -> &Arc<dyn ChatConnection> {
        &self.connection
    }

    pub fn bot(&self) -> &BotIdentity {
        &self.bot
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Refresh the idle clock.
    pub fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner()) = Instant::now();
    }

    pub fn last_used(&self) -> Instant {
        *self.last_used.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_used())
    }

    /// Store a listener. Fails once the session has been closed.
    pub fn add_listener(&self, listener: Listener) -> Result<String> {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        // `close` clears under the same lock after setting the flag.
        if self.is_closed() {
            return Err(Error::SessionClosed {
                credential: self.credential.hint(),
            });
        }
        let id = listener.id.clone();
        debug!(
            credential = %self.credential.hint(),
            listener_id = %id,
            handler_id = %listener.handler_id,
            "listener added"
        );
        listeners.push(listener);
        Ok(id)
    }

    /// Remove a listener by ID. Returns whether it was owned by this session.
    pub fn remove_listener(&self, id: &str) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let Some(pos) = listeners.iter().position(|l| l.id == id) else {
            return false;
        };
        listeners.remove(pos);
        debug!(credential = %self.credential.hint(), listener_id = %id, "listener removed");
        true
    }

    /// Current listeners in insertion order.
    pub fn listeners(&self) -> Vec<Listener> {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn listener_snapshots(&self) -> Vec<ListenerSnapshot> {
        let hint = self.credential.hint();
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|l| l.snapshot(&hint))
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Claim the single dispatcher slot. Returns `false` if already claimed.
    pub fn mark_dispatcher_attached(&self) -> bool {
        !self.dispatcher_attached.swap(true, Ordering::SeqCst)
    }

    pub fn dispatcher_attached(&self) -> bool {
        self.dispatcher_attached.load(Ordering::SeqCst)
    }

    /// Record the dispatch task so teardown can stop it.
    pub fn set_dispatch_task(&self, handle: AbortHandle) {
        let mut slot = self.dispatch_task.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            handle.abort();
            return;
        }
        *slot = Some(handle);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Tear the session down: stop dispatch, drop listeners, shut the
    /// connection. Only the first call does anything; returns whether this
    /// call performed the teardown.
    pub async fn close(&self) -> bool {
        if !self.mark_closed() {
            return false;
        }
        self.finish_close().await;
        true
    }

    /// Flip the session to closed without awaiting anything. Returns `true`
    /// for the caller that won; that caller must then run
    /// [`Session::finish_close`].
    pub fn mark_closed(&self) -> bool {
        !self.closed.swap(true, Ordering::SeqCst)
    }

    /// Release what a session holds. Call once, after winning
    /// [`Session::mark_closed`].
    pub async fn finish_close(&self) {
        let task = self
            .dispatch_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = task {
            task.abort();
        }
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.connection.shutdown().await;
        info!(credential = %self.credential.hint(), "session closed");
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("credential", &self.credential)
            .field("bot", &self.bot)
            .field("listeners", &self.listener_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}
