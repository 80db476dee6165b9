//! Stock reservation participant.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tcc_common::{
    Participant, ParticipantError, ParticipantResult, Reservation, ReservationState, TxContext,
};

#[derive(Debug)]
struct StockState {
    quantity: i64,
    frozen: i64,
    deduct_quantity: i64,
    reservation: Reservation,
}

/// Point-in-time view of a product's stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub product_id: String,
    pub quantity: i64,
    pub frozen: i64,
    pub state: ReservationState,
}

/// Reserves a preconfigured quantity of one product.
///
/// Only the execution whose Try reserved stock can give it back.
#[derive(Debug)]
pub struct InventoryService {
    product_id: String,
    inner: Mutex<StockState>,
}

impl InventoryService {
    /// Create stock for `product_id`.
    pub fn new(product_id: impl Into<String>, quantity: i64) -> Self {
        Self {
            product_id: product_id.into(),
            inner: Mutex::new(StockState {
                quantity,
                frozen: 0,
                deduct_quantity: 0,
                reservation: Reservation::new(),
            }),
        }
    }

    /// Configure the quantity the next transaction reserves.
    pub fn prepare_try(&self, quantity: i64) -> ParticipantResult<()> {
        if quantity < 0 {
            return Err(ParticipantError::InvalidAmount(quantity.to_string()));
        }

        let mut inner = self.inner.lock();
        inner.reservation.reset()?;
        inner.deduct_quantity = quantity;
        Ok(())
    }

    /// Product identifier.
    pub fn product_id(&self) -> &str {
        &self.product_id
    }

    /// Available quantity.
    pub fn quantity(&self) -> i64 {
        self.inner.lock().quantity
    }

    /// Quantity currently reserved.
    pub fn frozen(&self) -> i64 {
        self.inner.lock().frozen
    }

    /// Reservation lifecycle state.
    pub fn state(&self) -> ReservationState {
        self.inner.lock().reservation.state()
    }

    /// Get a consistent view of the stock.
    pub fn snapshot(&self) -> InventorySnapshot {
        let inner = self.inner.lock();
        InventorySnapshot {
            product_id: self.product_id.clone(),
            quantity: inner.quantity,
            frozen: inner.frozen,
            state: inner.reservation.state(),
        }
    }
}

#[async_trait]
impl Participant for InventoryService {
    async fn try_reserve(&self, ctx: &TxContext) -> ParticipantResult<()> {
        ctx.check()?;

        let mut inner = self.inner.lock();
        inner.reservation.ensure("try", ReservationState::Tried)?;
        if inner.deduct_quantity > inner.quantity {
            return Err(ParticipantError::InsufficientInventory {
                required: inner.deduct_quantity.to_string(),
                available: inner.quantity.to_string(),
            });
        }

        inner.reservation.hold(ctx.id())?;
        let quantity = inner.deduct_quantity;
        inner.quantity -= quantity;
        inner.frozen = quantity;

        debug!(product_id = %self.product_id, quantity, "Stock reserved");
        Ok(())
    }

    async fn confirm(&self, _ctx: &TxContext) -> ParticipantResult<()> {
        let mut inner = self.inner.lock();
        inner.reservation.confirm()?;
        inner.frozen = 0;

        debug!(product_id = %self.product_id, "Stock reservation confirmed");
        Ok(())
    }

    async fn cancel(&self, ctx: &TxContext) -> ParticipantResult<()> {
        let mut inner = self.inner.lock();
        if !inner.reservation.is_held_by(ctx.id()) {
            debug!(
                product_id = %self.product_id,
                holder = ?inner.reservation.holder(),
                "Nothing to cancel"
            );
            return Ok(());
        }

        let restored = match inner.reservation.state() {
            ReservationState::Confirmed => inner.deduct_quantity,
            _ => inner.frozen,
        };
        inner.reservation.cancel()?;
        inner.quantity += restored;
        inner.frozen = 0;

        debug!(product_id = %self.product_id, restored, "Stock reservation canceled");
        Ok(())
    }

    fn name(&self) -> String {
        format!("inventory:{}", self.product_id)
    }
}
