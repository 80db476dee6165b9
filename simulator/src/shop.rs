//! Participants for one simulated checkout.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use tcc_common::{ParticipantError, ParticipantResult, SharedParticipant};
use tcc_services::{
    AccountService, AccountSnapshot, InventoryService, InventorySnapshot, OrderService,
    OrderStatus,
};

use crate::scenario::Scenario;

/// Participants of one checkout, kept so their final state can be inspected.
pub struct Checkout {
    pub account: Arc<AccountService>,
    pub inventory: Arc<InventoryService>,
    pub order: Option<Arc<OrderService>>,
}

/// Final state of a checkout's participants.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutSummary {
    pub account: AccountSnapshot,
    pub inventory: InventorySnapshot,
    pub order: Option<OrderStatus>,
}

impl Checkout {
    /// Build and configure participants for `scenario`.
    pub fn from_scenario(scenario: &Scenario, id: usize) -> ParticipantResult<Self> {
        Self::build(
            id,
            scenario.balance,
            scenario.amount,
            scenario.stock,
            scenario.quantity,
            scenario.with_order,
            scenario.order_confirm_failure.clone(),
        )
    }

    /// Build a plain checkout with an order that confirms normally.
    pub fn random(
        id: usize,
        balance: Decimal,
        amount: Decimal,
        stock: i64,
        quantity: i64,
    ) -> ParticipantResult<Self> {
        Self::build(id, balance, amount, stock, quantity, true, None)
    }

    fn build(
        id: usize,
        balance: Decimal,
        amount: Decimal,
        stock: i64,
        quantity: i64,
        with_order: bool,
        order_confirm_failure: Option<String>,
    ) -> ParticipantResult<Self> {
        let account = AccountService::new(format!("ACCT_{}", id), balance);
        account.prepare_try(amount)?;

        let inventory = InventoryService::new(format!("SKU_{}", id), stock);
        inventory.prepare_try(quantity)?;

        let order = with_order.then(|| {
            let order = OrderService::new(format!("ORDER_{}", id));
            let order = match order_confirm_failure {
                Some(message) => order
                    .with_confirm_hook(move |_| Err(ParticipantError::failed(message.clone()))),
                None => order,
            };
            Arc::new(order)
        });

        Ok(Self {
            account: Arc::new(account),
            inventory: Arc::new(inventory),
            order,
        })
    }

    /// Participants in protocol order: account, inventory, order.
    pub fn participants(&self) -> Vec<SharedParticipant> {
        let account: SharedParticipant = self.account.clone();
        let inventory: SharedParticipant = self.inventory.clone();
        let mut participants = vec![account, inventory];
        if let Some(order) = &self.order {
            participants.push(order.clone());
        }
        participants
    }

    /// Check if any participant still holds a reservation.
    pub fn has_frozen(&self) -> bool {
        !self.account.frozen().is_zero() || self.inventory.frozen() != 0
    }

    /// Capture the final state.
    pub fn summary(&self) -> CheckoutSummary {
        CheckoutSummary {
            account: self.account.snapshot(),
            inventory: self.inventory.snapshot(),
            order: self.order.as_ref().map(|o| o.status()),
        }
    }
}
