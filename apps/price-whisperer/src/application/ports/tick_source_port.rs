//! Tick Source Port (Driven Port)
//!
//! Interface for subscribing to the external price feed. The transport
//! behind it is opaque: adapters hand back an asynchronous sequence of raw
//! ticks whose prices are still encoded as decimal strings.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::pricing::{Instrument, PriceSample};

/// Price payload of a tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickPrice {
    /// Decimal-encoded price.
    pub amount: String,
    /// Quote currency, if the feed reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

/// One tick as delivered by the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTick {
    /// Encoded price.
    pub price: TickPrice,
    /// Feed timestamp; ticks without one are stamped on arrival.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl RawTick {
    /// Create a tick with the given encoded amount and no timestamp.
    #[must_use]
    pub fn new(amount: impl Into<String>) -> Self {
        Self {
            price: TickPrice {
                amount: amount.into(),
                currency: None,
            },
            timestamp: None,
        }
    }

    /// Decode the price into a sample.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::MalformedPrice`] if the amount is not a decimal
    /// number.
    pub fn to_sample(&self) -> Result<PriceSample, FeedError> {
        let amount = self.price.amount.trim();
        let value = Decimal::from_str(amount)
            .or_else(|_| Decimal::from_scientific(amount))
            .map_err(|_| FeedError::MalformedPrice {
                amount: self.price.amount.clone(),
            })?;

        Ok(PriceSample::new(
            value,
            self.timestamp.unwrap_or_else(Utc::now),
        ))
    }
}

/// Asynchronous sequence of ticks for one subscription.
pub type TickStream = BoxStream<'static, Result<RawTick, FeedError>>;

/// Price feed error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// Subscription could not be opened.
    #[error("price feed connection failed: {0}")]
    Connect(String),

    /// Transport failed mid-stream.
    #[error("price feed transport error: {0}")]
    Transport(String),

    /// A message could not be decoded.
    #[error("price feed decode error: {0}")]
    Decode(String),

    /// The feed reported an error.
    #[error("price feed reported an error: {0}")]
    Upstream(String),

    /// A tick carried a price that is not a number.
    #[error("malformed price: {amount:?}")]
    MalformedPrice {
        /// The offending amount.
        amount: String,
    },
}

impl FeedError {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Connect(_) => "connect",
            Self::Transport(_) => "transport",
            Self::Decode(_) => "decode",
            Self::Upstream(_) => "upstream",
            Self::MalformedPrice { .. } => "malformed_price",
        }
    }
}

/// Port for subscribing to price ticks.
#[async_trait]
pub trait TickSource: Send + Sync {
    /// Open a subscription for one instrument.
    async fn subscribe(&self, instrument: &Instrument) -> Result<TickStream, FeedError>;
}
