use std::num::NonZeroU32;
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::DeliveryError;
use crate::gateway::MessagingGateway;

/// Bot API allows ~30 messages/s overall; stay under it.
const TELEGRAM_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(25u32);

pub struct TelegramGateway {
    client: reqwest::Client,
    send_message_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct SendMessageResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramGateway {
    pub fn new(api_base: &str, bot_token: &str) -> Self {
        let quota = Quota::per_second(TELEGRAM_REQUESTS_PER_SECOND);
        Self {
            client: reqwest::Client::new(),
            send_message_url: format!(
                "{}/bot{}/sendMessage",
                api_base.trim_end_matches('/'),
                bot_token
            ),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }
}

impl MessagingGateway for TelegramGateway {
    fn send(&self, chat_id: i64, text: &str) -> BoxFuture<'_, Result<(), Report<DeliveryError>>> {
        let payload = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });

        Box::pin(async move {
            self.rate_limiter.until_ready().await;

            let response = self
                .client
                .post(&self.send_message_url)
                .json(&payload)
                .send()
                .await
                .change_context(DeliveryError::Transport)?;

            let status = response.status();
            let body: SendMessageResponse = response
                .json()
                .await
                .change_context(DeliveryError::Transport)
                .attach_with(|| format!("HTTP status: {status}"))?;

            if !body.ok {
                return Err(Report::new(DeliveryError::Rejected).attach(format!(
                    "HTTP status: {status}, description: {}",
                    body.description.as_deref().unwrap_or("none")
                )));
            }

            debug!(chat_id, "telegram message delivered");
            Ok(())
        })
    }
}
