use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::dispatch::RelayDispatcher;
use crate::events::InboundEvent;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

/// Inbound update stream, decoded into [`InboundEvent`]s by the concrete
/// transport (webhook receiver or long polling; not this crate's concern).
#[async_trait]
pub trait UpdateTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

/// Transport that yields nothing. Keeps the binary runnable without
/// platform credentials.
#[derive(Default)]
pub struct NoopTransport;

#[async_trait]
impl UpdateTransport for NoopTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<InboundEvent>, TransportError> {
        Ok(None)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Pumps events from the transport into the dispatcher until the stream
/// closes, reconnecting with bounded backoff. Per-event failures never
/// crash the process.
pub struct PollRunner {
    transport: Arc<dyn UpdateTransport>,
    dispatcher: Arc<RelayDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl PollRunner {
    pub fn new(
        transport: Arc<dyn UpdateTransport>,
        dispatcher: Arc<RelayDispatcher>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher, reconnect_policy }
    }

    pub async fn start(&self) -> Result<()> {
        for attempt in 0..=self.reconnect_policy.max_retries {
            match self.connect_and_pump(attempt).await {
                Ok(()) => return Ok(()),
                Err(transport_error) => {
                    warn!(
                        attempt,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %transport_error,
                        "update transport failed"
                    );

                    if attempt >= self.reconnect_policy.max_retries {
                        warn!(
                            max_retries = self.reconnect_policy.max_retries,
                            "update transport retries exhausted; continuing process without crash"
                        );
                        return Ok(());
                    }

                    let delay = self.reconnect_policy.backoff(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        Ok(())
    }

    async fn connect_and_pump(&self, attempt: u32) -> Result<(), TransportError> {
        info!(attempt, "opening update transport connection");
        self.transport.connect().await?;
        info!(attempt, "update transport connected");

        loop {
            let Some(event) = self.transport.next_event().await? else {
                info!(attempt, "update transport stream closed");
                self.transport.disconnect().await?;
                return Ok(());
            };

            info!(
                event_name = "ingress.update_received",
                update_id = event.update_id,
                user_id = event.sender.user_id.0,
                chat_id = event.chat.id.0,
                chat_kind = event.chat.kind.as_str(),
                "received inbound event"
            );

            let disposition = self.dispatcher.handle(&event).await;

            info!(
                event_name = "ingress.update_handled",
                update_id = event.update_id,
                user_id = event.sender.user_id.0,
                chat_id = event.chat.id.0,
                disposition = ?disposition,
                "event handled"
            );
        }
    }
}
