use std::collections::HashMap;
use std::sync::Arc;

use error_stack::Report;
use tracing::{debug, info, warn};

use crate::error::HoldingsError;
use crate::history::PriceHistory;
use crate::holdings::HoldingsStore;
use crate::market::MarketDataAggregator;
use crate::model::{Holding, PriceChange, SecurityKey, UserRef, percent_change};

/// Detects significant price movements across all user portfolios.
///
/// Owns the price history; a cycle never overlaps with the next, so the
/// history sees strictly sequential reads and writes.
pub struct PriceMonitor {
    holdings: Arc<dyn HoldingsStore>,
    market: Arc<dyn MarketDataAggregator>,
    history: PriceHistory,
    threshold_pct: f64,
}

impl PriceMonitor {
    pub fn new(
        holdings: Arc<dyn HoldingsStore>,
        market: Arc<dyn MarketDataAggregator>,
        threshold_pct: f64,
    ) -> Self {
        Self {
            holdings,
            market,
            history: PriceHistory::new(),
            threshold_pct,
        }
    }

    #[allow(dead_code)]
    pub fn history(&self) -> &PriceHistory {
        &self.history
    }

    /// Run one monitoring pass over every user's active holdings.
    ///
    /// Per-user and per-holding failures are logged and skipped; only a
    /// failure to enumerate the users themselves aborts the cycle. The
    /// history entry for a holding is updated after every successful price
    /// lookup, whether or not the move was significant.
    pub async fn check_changes(&mut self) -> Result<Vec<PriceChange>, Report<HoldingsError>> {
        info!(threshold_pct = self.threshold_pct, "starting price change check");

        let users = self.holdings.list_users_with_holdings().await?;
        debug!(users = users.len(), "users with active holdings");

        let mut changes = Vec::new();

        for user in users {
            let holdings = match self.holdings.list_holdings(user.id, true).await {
                Ok(holdings) => holdings,
                Err(e) => {
                    warn!(user_id = user.id, error = ?e, "failed to list holdings, skipping user");
                    continue;
                }
            };

            debug!(user_id = user.id, holdings = holdings.len(), "checking user holdings");

            for holding in holdings {
                if let Some(change) = self.check_holding(&user, &holding).await {
                    changes.push(change);
                }
            }
        }

        info!(changes = changes.len(), "price change check complete");
        Ok(changes)
    }

    async fn check_holding(&mut self, user: &UserRef, holding: &Holding) -> Option<PriceChange> {
        let ticker = holding.ticker.as_deref()?;

        let snapshots = match self.market.get_snapshots(ticker).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(ticker, error = ?e, "price lookup failed, skipping holding");
                return None;
            }
        };

        let Some(snapshot) = snapshots.into_iter().next() else {
            warn!(ticker, "no market data for holding");
            return None;
        };

        let current = match snapshot.last_price {
            Some(price) if price > 0.0 => price,
            other => {
                warn!(ticker, price = ?other, "unusable price for holding");
                return None;
            }
        };

        let key = SecurityKey::new(ticker, holding.isin.as_deref());

        let change = self.history.get(&key, user.id).and_then(|prior| {
            let change_pct = percent_change(prior, current);
            if change_pct.abs() >= self.threshold_pct {
                info!(
                    ticker,
                    user_id = user.id,
                    change_pct,
                    "significant price change detected"
                );
                Some(PriceChange {
                    user_id: user.id,
                    ticker: ticker.to_owned(),
                    name: holding.name.clone(),
                    security_type: holding.security_type,
                    old_price: prior,
                    new_price: current,
                    change_pct,
                    isin: holding.isin.clone(),
                    provider: Some(snapshot.provider.clone()),
                })
            } else {
                None
            }
        });

        self.history.set(key, user.id, current);
        change
    }

    /// Best-effort current price per ticker for one user's active holdings.
    /// Holdings whose lookup fails are simply absent from the result.
    // Consumed by portfolio views, not by the scheduled pipeline.
    #[allow(dead_code)]
    pub async fn get_user_portfolio_prices(&self, user_id: i64) -> HashMap<String, f64> {
        let holdings = match self.holdings.list_holdings(user_id, true).await {
            Ok(holdings) => holdings,
            Err(e) => {
                warn!(user_id, error = ?e, "failed to list holdings for portfolio prices");
                return HashMap::new();
            }
        };

        let mut prices = HashMap::new();

        for holding in holdings {
            let Some(ticker) = holding.ticker.as_deref() else {
                continue;
            };

            match self.market.get_snapshots(ticker).await {
                Ok(snapshots) => {
                    let usable = snapshots
                        .first()
                        .and_then(|s| s.last_price)
                        .filter(|price| *price > 0.0);
                    if let Some(price) = usable {
                        prices.insert(ticker.to_owned(), price);
                    }
                }
                Err(e) => {
                    warn!(ticker, error = ?e, "price lookup failed for portfolio prices");
                }
            }
        }

        prices
    }
}
