//! Order Request Types
//!
//! Venue-neutral order description handed from handlers to a connector's
//! order executor.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    /// Execute immediately at the best available price.
    Market,
    /// Execute at the given price or better.
    Limit,
    /// Market order triggered at a stop price.
    StopLoss,
    /// Limit order triggered at a stop price.
    StopLossLimit,
    /// Market order triggered at a profit target.
    TakeProfit,
    /// Limit order triggered at a profit target.
    TakeProfitLimit,
    /// Limit order rejected if it would take liquidity.
    LimitMaker,
}

impl OrderType {
    /// Venue wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Market => "MARKET",
            Self::Limit => "LIMIT",
            Self::StopLoss => "STOP_LOSS",
            Self::StopLossLimit => "STOP_LOSS_LIMIT",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
            Self::LimitMaker => "LIMIT_MAKER",
        }
    }

    /// Whether the order carries a limit price.
    #[must_use]
    pub const fn requires_price(&self) -> bool {
        matches!(
            self,
            Self::Limit | Self::StopLossLimit | Self::TakeProfitLimit | Self::LimitMaker
        )
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    /// Buy the base asset.
    Buy,
    /// Sell the base asset.
    Sell,
}

impl OrderSide {
    /// Venue wire name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order to place on a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Order type.
    pub order_type: OrderType,
    /// Order side.
    pub side: OrderSide,
    /// Trading pair symbol.
    pub trading_pair: String,
    /// Quantity of the base asset.
    pub amount: f64,
    /// Limit price (ignored for market-style orders).
    pub price: f64,
}

impl OrderRequest {
    /// Create a new order request.
    #[must_use]
    pub fn new(
        order_type: OrderType,
        side: OrderSide,
        trading_pair: impl Into<String>,
        amount: f64,
        price: f64,
    ) -> Self {
        Self {
            order_type,
            side,
            trading_pair: trading_pair.into(),
            amount,
            price,
        }
    }
}
