use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::Utc;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use nonzero_ext::nonzero;
use serde::Deserialize;
use tracing::debug;

use crate::error::MarketDataError;
use crate::market::MarketDataAggregator;
use crate::model::PriceSnapshot;

const PROVIDER: &str = "moex";
/// Board lookup order: the main share board first, then the common bond boards.
const BOARDS: &[(&str, &str)] = &[
    ("shares", "TQBR"),
    ("bonds", "TQCB"),
    ("bonds", "TQOB"),
];
/// ISS has no published hard limit; stay conservative.
const MOEX_REQUESTS_PER_SECOND: NonZeroU32 = nonzero!(5u32);

pub struct MoexAggregator {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl MoexAggregator {
    pub fn new(base_url: &str) -> Self {
        let quota = Quota::per_second(MOEX_REQUESTS_PER_SECOND);
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn fetch_board(
        &self,
        market: &str,
        board: &str,
        ticker: &str,
    ) -> Result<IssResponse, Report<MarketDataError>> {
        self.rate_limiter.until_ready().await;

        let url = format!(
            "{}/iss/engines/stock/markets/{}/boards/{}/securities/{}.json",
            self.base_url, market, board, ticker
        );

        let response = self
            .client
            .get(&url)
            .query(&[
                ("iss.meta", "off"),
                ("iss.only", "securities,marketdata"),
            ])
            .send()
            .await
            .change_context(MarketDataError::Request {
                provider: PROVIDER.into(),
            })?;

        if !response.status().is_success() {
            return Err(Report::new(MarketDataError::Request {
                provider: PROVIDER.into(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        response
            .json()
            .await
            .change_context(MarketDataError::ResponseParse {
                provider: PROVIDER.into(),
            })
    }
}

impl MarketDataAggregator for MoexAggregator {
    fn get_snapshots(
        &self,
        ticker: &str,
    ) -> BoxFuture<'_, Result<Vec<PriceSnapshot>, Report<MarketDataError>>> {
        let ticker = ticker.to_owned();
        Box::pin(async move {
            for (market, board) in BOARDS {
                let body = self.fetch_board(market, board, &ticker).await?;

                if let Some(snapshot) = body.into_snapshot(&ticker) {
                    debug!(
                        ticker = %ticker,
                        market,
                        board,
                        price = ?snapshot.last_price,
                        "moex snapshot resolved"
                    );
                    return Ok(vec![snapshot]);
                }
            }

            debug!(ticker = %ticker, "ticker not found on any known board");
            Ok(Vec::new())
        })
    }
}

// ── ISS response types ────────────────────────────────────────────────────────
//
// ISS returns column-oriented tables: a `columns` name array plus row arrays
// in `data`.

#[derive(Debug, Deserialize)]
struct IssResponse {
    securities: IssTable,
    marketdata: IssTable,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IssTable {
    columns: Vec<String>,
    data: Vec<Vec<serde_json::Value>>,
}

impl IssTable {
    fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn first_f64(&self, name: &str) -> Option<f64> {
        let idx = self.column(name)?;
        self.data.first()?.get(idx)?.as_f64()
    }
}

impl IssResponse {
    /// Build a snapshot when the ticker is listed on this board.
    ///
    /// A listed security with a null `LAST` (market closed, no trades yet)
    /// still yields a snapshot; the caller decides whether it is usable.
    fn into_snapshot(self, ticker: &str) -> Option<PriceSnapshot> {
        if self.securities.data.is_empty() {
            return None;
        }

        Some(PriceSnapshot {
            ticker: ticker.to_owned(),
            last_price: self.marketdata.first_f64("LAST"),
            provider: PROVIDER.to_owned(),
            fetched_at: Utc::now(),
        })
    }
}
