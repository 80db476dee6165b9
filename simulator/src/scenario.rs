//! Named checkout scenarios.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single checkout: debit an account, reserve stock, optionally place an
/// order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    pub description: String,
    /// Starting account balance.
    pub balance: Decimal,
    /// Amount the checkout deducts.
    pub amount: Decimal,
    /// Starting stock.
    pub stock: i64,
    /// Quantity the checkout reserves.
    pub quantity: i64,
    /// Add an order participant after account and inventory.
    pub with_order: bool,
    /// Make the order's Confirm fail with this message.
    pub order_confirm_failure: Option<String>,
}

impl Scenario {
    /// Names accepted by [`Scenario::load`].
    pub const NAMES: &'static [&'static str] = &[
        "checkout-success",
        "insufficient-balance",
        "order-confirm-failure",
        "inventory-shortage",
    ];

    /// Load a scenario by name.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "checkout-success" => Ok(Self::checkout_success()),
            "insufficient-balance" => Ok(Self::insufficient_balance()),
            "order-confirm-failure" => Ok(Self::order_confirm_failure()),
            "inventory-shortage" => Ok(Self::inventory_shortage()),
            _ => Err(anyhow::anyhow!(
                "Unknown scenario: {} (expected one of {})",
                name,
                Self::NAMES.join(", ")
            )),
        }
    }

    fn checkout_success() -> Self {
        Self {
            name: "checkout-success".to_string(),
            description: "Balance and stock both suffice; the checkout commits".to_string(),
            balance: Decimal::from(1000),
            amount: Decimal::from(500),
            stock: 10,
            quantity: 2,
            with_order: false,
            order_confirm_failure: None,
        }
    }

    fn insufficient_balance() -> Self {
        Self {
            name: "insufficient-balance".to_string(),
            description: "Try fails on the account; stock is released again".to_string(),
            balance: Decimal::from(100),
            amount: Decimal::from(500),
            stock: 10,
            quantity: 2,
            with_order: false,
            order_confirm_failure: None,
        }
    }

    fn order_confirm_failure() -> Self {
        Self {
            name: "order-confirm-failure".to_string(),
            description: "Order Confirm fails after account and stock confirmed".to_string(),
            balance: Decimal::from(1000),
            amount: Decimal::from(500),
            stock: 10,
            quantity: 2,
            with_order: true,
            order_confirm_failure: Some("order confirm failed".to_string()),
        }
    }

    fn inventory_shortage() -> Self {
        Self {
            name: "inventory-shortage".to_string(),
            description: "Try fails on the inventory after the account reserved".to_string(),
            balance: Decimal::from(1000),
            amount: Decimal::from(500),
            stock: 1,
            quantity: 2,
            with_order: true,
            order_confirm_failure: None,
        }
    }

    /// Check if every Try can succeed and no failure is injected.
    pub fn expect_commit(&self) -> bool {
        self.amount <= self.balance
            && self.quantity <= self.stock
            && self.order_confirm_failure.is_none()
    }
}
