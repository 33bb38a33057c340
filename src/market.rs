pub mod moex;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::MarketDataError;
use crate::model::PriceSnapshot;

/// Abstraction over a market data source.
///
/// A ticker may yield zero or more snapshots from different providers;
/// callers use the first. Lookup calls carry their own timeout/retry
/// policy; none is imposed here.
pub trait MarketDataAggregator: Send + Sync {
    fn get_snapshots(
        &self,
        ticker: &str,
    ) -> BoxFuture<'_, Result<Vec<PriceSnapshot>, Report<MarketDataError>>>;
}
