pub mod telegram;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::DeliveryError;

/// Outbound message delivery to a user's external messaging identity.
pub trait MessagingGateway: Send + Sync {
    fn send(&self, chat_id: i64, text: &str) -> BoxFuture<'_, Result<(), Report<DeliveryError>>>;
}
