//! Ticket-based token exchange.
//!
//! A ticket is created for an OAuth client, the user authorizes it in a browser,
//! then the ticket is exchanged for an access token.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, sleep, timeout_at};
use tracing::{debug, info};

use super::auth::SecureString;
use super::registry::{CREATE_TICKET, EXCHANGE_TICKET, SHOW_TICKET};
use super::{ApiClient, ApiClientError};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(3_600_000);

/// An authorization ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    /// The ticket id.
    pub id: String,
    /// `true` once the user granted access.
    #[serde(default)]
    pub authorized: bool,
    /// Every other field returned by the server.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Response of the ticket exchange.
#[derive(Clone, PartialEq, Deserialize, derive_more::Debug)]
pub struct AccessTokenResponse {
    /// The issued access token.
    #[debug(ignore)]
    pub access_token: String,
    /// Every other field returned by the server.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Polling configuration for [`ApiClient::get_access_token`].
///
/// Defaults to polling every second for at most one hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TicketExchangeOptions {
    poll_interval: Duration,
    timeout: Duration,
}

impl Default for TicketExchangeOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl TicketExchangeOptions {
    /// Sets the delay between two polls.
    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Sets the overall deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The delay between two polls.
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// The overall deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ApiClient {
    /// Creates a ticket for the OAuth application `client_id`.
    pub async fn create_ticket(&self, client_id: &str) -> Result<Ticket, ApiClientError> {
        self.operation(CREATE_TICKET)?
            .with_param("client_id", client_id)
            .await?
            .as_json()
    }

    /// Fetches the current state of a ticket.
    pub async fn show_ticket(&self, ticket_id: &str) -> Result<Ticket, ApiClientError> {
        self.operation(SHOW_TICKET)?
            .with_param("ticket_id", ticket_id)
            .await?
            .as_json()
    }

    /// Exchanges an authorized ticket for an access token.
    ///
    /// The token is returned but not stored, see [`ApiClient::get_access_token`].
    pub async fn exchange_ticket(
        &self,
        ticket_id: &str,
    ) -> Result<AccessTokenResponse, ApiClientError> {
        self.operation(EXCHANGE_TICKET)?
            .with_param("ticket_id", ticket_id)
            .await?
            .as_json()
    }

    /// Waits for the ticket to be authorized, then exchanges it for an access token.
    ///
    /// The ticket is polled every `poll_interval` until it is authorized or the
    /// `timeout` elapses; polls never overlap. The token is then stored on the client,
    /// so subsequent calls send it as `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::Timeout`] if the ticket is not authorized in time; the
    ///   exchange is not attempted.
    /// - Any error of the poll or exchange calls.
    pub async fn get_access_token(
        &mut self,
        ticket: &Ticket,
        options: TicketExchangeOptions,
    ) -> Result<SecureString, ApiClientError> {
        let authorized = self.wait_for_authorization(&ticket.id, options).await?;

        let response = self.exchange_ticket(&authorized.id).await?;
        let token = SecureString::new(response.access_token);
        self.set_access_token(Some(token.clone()));

        Ok(token)
    }

    async fn wait_for_authorization(
        &self,
        ticket_id: &str,
        options: TicketExchangeOptions,
    ) -> Result<Ticket, ApiClientError> {
        let TicketExchangeOptions {
            poll_interval,
            timeout,
        } = options;
        let deadline = Instant::now() + timeout;
        let mut polls = 0_u32;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            sleep(poll_interval.min(remaining)).await;
            if Instant::now() >= deadline {
                return Err(ApiClientError::Timeout { timeout, polls });
            }

            polls += 1;
            let Ok(polled) = timeout_at(deadline, self.show_ticket(ticket_id)).await else {
                return Err(ApiClientError::Timeout { timeout, polls });
            };
            let polled = polled?;

            if polled.authorized {
                info!(ticket_id, polls, "ticket authorized");
                return Ok(polled);
            }
            debug!(ticket_id, polls, "ticket not yet authorized");
        }
    }
}
