use derive_more::{Display, Error};

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display("failed to read config file")]
    ReadFile,
    #[display("failed to parse config: {reason}")]
    Parse { reason: String },
    #[display("invalid config: {field}")]
    Validation { field: String },
}

#[derive(Debug, Display, Error)]
pub enum HoldingsError {
    #[display("holdings database migration failed")]
    Migration,
    #[display("failed to query holdings data")]
    Query,
}

#[derive(Debug, Display, Error)]
pub enum MarketDataError {
    #[display("request to {provider} failed")]
    Request { provider: String },
    #[display("failed to parse response from {provider}")]
    ResponseParse { provider: String },
}

#[derive(Debug, Display, Error)]
pub enum DeliveryError {
    #[display("failed to reach messaging gateway")]
    Transport,
    #[display("messaging gateway rejected the message")]
    Rejected,
}
