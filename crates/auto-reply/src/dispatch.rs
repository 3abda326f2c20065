//! Per-session inbound dispatch.
//!
//! Each session gets exactly one dispatch task. The task drains the session's
//! inbound stream in arrival order and evaluates every listener for a message
//! before taking the next one.

use std::{any::Any, panic::AssertUnwindSafe, sync::Arc};

use {
    futures::FutureExt,
    parley_channels::{ChatMessage, Error, InboundReceiver, Session},
    serde::Serialize,
    tracing::{debug, error, trace, warn},
};

#[cfg(feature = "metrics")]
use parley_metrics::{counter, histogram, labels, listeners as listener_metrics};

use crate::handler::HandlerRegistry;

/// Outcome counts for one dispatched message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    /// Listeners looked at.
    pub evaluated: usize,
    /// Listeners whose scope and keywords matched.
    pub matched: usize,
    /// Handlers actually called.
    pub invoked: usize,
    /// Missing handlers plus handler errors and panics.
    pub failed: usize,
}

pub struct Dispatcher {
    handlers: Arc<HandlerRegistry>,
}

impl Dispatcher {
    pub fn new(handlers: Arc<HandlerRegistry>) -> Self {
        Self { handlers }
    }

    pub fn handlers(&self) -> &Arc<HandlerRegistry> {
        &self.handlers
    }

    /// Start dispatching `inbound` for `session`.
    ///
    /// Returns `false` without consuming anything if the session already has
    /// a dispatcher.
    pub fn attach(self: &Arc<Self>, session: &Arc<Session>, mut inbound: InboundReceiver) -> bool {
        if !session.mark_dispatcher_attached() {
            debug!(
                credential = %session.credential_hint(),
                "dispatcher already attached, ignoring"
            );
            return false;
        }

        let dispatcher = Arc::clone(self);
        let weak = Arc::downgrade(session);
        let credential = session.credential_hint();
        let task = tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                let Some(session) = weak.upgrade() else {
                    break;
                };
                if session.is_closed() {
                    break;
                }
                dispatcher.dispatch(&session, &message).await;
            }
            debug!(credential = %credential, "dispatch loop finished");
        });
        session.set_dispatch_task(task.abort_handle());
        debug!(credential = %session.credential_hint(), "dispatcher attached");
        true
    }

    /// Run one message through every listener of `session`.
    pub async fn dispatch(&self, session: &Session, message: &ChatMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        if message.author.id == session.bot().user_id {
            trace!(message_id = %message.id, "ignoring own message");
            return report;
        }

        #[cfg(feature = "metrics")]
        counter!(listener_metrics::MESSAGES_EVALUATED_TOTAL).increment(1);

        for listener in session.listeners() {
            report.evaluated += 1;
            if !listener.matches(message) {
                continue;
            }
            report.matched += 1;

            #[cfg(feature = "metrics")]
            counter!(
                listener_metrics::MATCHES_TOTAL,
                labels::HANDLER => listener.handler_id.clone()
            )
            .increment(1);

            let Some(handler) = self.handlers.get(&listener.handler_id) else {
                let err = Error::HandlerNotFound {
                    handler_id: listener.handler_id.clone(),
                };
                error!(
                    credential = %session.credential_hint(),
                    listener_id = %listener.id,
                    error = %err,
                    "listener matched but its handler is missing"
                );
                report.failed += 1;

                #[cfg(feature = "metrics")]
                counter!(
                    listener_metrics::HANDLER_FAILURES_TOTAL,
                    labels::HANDLER => listener.handler_id.clone()
                )
                .increment(1);
                continue;
            };

            report.invoked += 1;
            #[cfg(feature = "metrics")]
            let start = std::time::Instant::now();

            // A panicking handler counts as a failure; the dispatch task lives on.
            let result = match AssertUnwindSafe(handler.invoke(
                message,
                session,
                &listener.handler_options,
            ))
            .catch_unwind()
            .await
            {
                Ok(result) => result,
                Err(payload) => Err(anyhow::anyhow!(
                    "handler panicked: {}",
                    panic_message(payload.as_ref())
                )),
            };

            #[cfg(feature = "metrics")]
            histogram!(
                listener_metrics::HANDLER_DURATION_SECONDS,
                labels::HANDLER => listener.handler_id.clone()
            )
            .record(start.elapsed().as_secs_f64());

            match result {
                Ok(()) => {
                    debug!(
                        listener_id = %listener.id,
                        handler_id = %listener.handler_id,
                        message_id = %message.id,
                        "handler completed"
                    );
                },
                Err(e) => {
                    let err = Error::handler_failed(listener.handler_id.clone(), e);
                    warn!(
                        credential = %session.credential_hint(),
                        listener_id = %listener.id,
                        error = %err,
                        "handler failed"
                    );
                    report.failed += 1;

                    #[cfg(feature = "metrics")]
                    counter!(
                        listener_metrics::HANDLER_FAILURES_TOTAL,
                        labels::HANDLER => listener.handler_id.clone()
                    )
                    .increment(1);
                },
            }
        }

        report
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
