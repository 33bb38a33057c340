pub mod sqlite;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::HoldingsError;
use crate::model::{Holding, UserRef};

/// Read-side view of the holdings store.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn HoldingsStore`).
pub trait HoldingsStore: Send + Sync {
    /// List users that have at least one active holding.
    fn list_users_with_holdings(&self) -> BoxFuture<'_, Result<Vec<UserRef>, Report<HoldingsError>>>;

    /// List a user's holdings, optionally restricted to active ones.
    fn list_holdings(
        &self,
        user_id: i64,
        active_only: bool,
    ) -> BoxFuture<'_, Result<Vec<Holding>, Report<HoldingsError>>>;

    /// Resolve the external messaging identity (Telegram chat id) for a user,
    /// if one is on file.
    fn resolve_messaging_identity(
        &self,
        user_id: i64,
    ) -> BoxFuture<'_, Result<Option<i64>, Report<HoldingsError>>>;
}
