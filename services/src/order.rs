//! Order status participant.

use std::fmt;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tcc_common::{Participant, ParticipantResult, Reservation, ReservationState, TxContext};

/// Order lifecycle as seen by customers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Not yet part of a transaction.
    Pending,
    /// Created provisionally by Try.
    Trying,
    /// Placed for good.
    Confirmed,
    /// Withdrawn by compensation.
    Canceled,
}

impl From<ReservationState> for OrderStatus {
    fn from(state: ReservationState) -> Self {
        match state {
            ReservationState::Pending => OrderStatus::Pending,
            ReservationState::Tried => OrderStatus::Trying,
            ReservationState::Confirmed => OrderStatus::Confirmed,
            ReservationState::Canceled => OrderStatus::Canceled,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Trying => "trying",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

type ConfirmHook = Box<dyn Fn(&TxContext) -> ParticipantResult<()> + Send + Sync>;

/// Creates an order provisionally and places it on Confirm.
pub struct OrderService {
    order_id: String,
    reservation: Mutex<Reservation>,
    confirm_hook: Option<ConfirmHook>,
}

impl OrderService {
    /// Create a pending order.
    pub fn new(order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            reservation: Mutex::new(Reservation::new()),
            confirm_hook: None,
        }
    }

    /// Run `hook` before placing the order on Confirm. An error from the
    /// hook fails Confirm and leaves the order in `Trying`.
    pub fn with_confirm_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&TxContext) -> ParticipantResult<()> + Send + Sync + 'static,
    {
        self.confirm_hook = Some(Box::new(hook));
        self
    }

    /// Order identifier.
    pub fn order_id(&self) -> &str {
        &self.order_id
    }

    /// Current status.
    pub fn status(&self) -> OrderStatus {
        self.reservation.lock().state().into()
    }
}

impl fmt::Debug for OrderService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderService")
            .field("order_id", &self.order_id)
            .field("status", &self.status())
            .field("confirm_hook", &self.confirm_hook.is_some())
            .finish()
    }
}

#[async_trait]
impl Participant for OrderService {
    async fn try_reserve(&self, ctx: &TxContext) -> ParticipantResult<()> {
        ctx.check()?;

        self.reservation.lock().hold(ctx.id())?;

        debug!(order_id = %self.order_id, "Order created");
        Ok(())
    }

    async fn confirm(&self, ctx: &TxContext) -> ParticipantResult<()> {
        let mut reservation = self.reservation.lock();
        reservation.ensure("confirm", ReservationState::Confirmed)?;

        if let Some(hook) = &self.confirm_hook {
            hook(ctx)?;
        }
        reservation.confirm()?;

        debug!(order_id = %self.order_id, "Order confirmed");
        Ok(())
    }

    async fn cancel(&self, ctx: &TxContext) -> ParticipantResult<()> {
        let mut reservation = self.reservation.lock();
        if !reservation.is_held_by(ctx.id()) {
            debug!(
                order_id = %self.order_id,
                holder = ?reservation.holder(),
                "Nothing to cancel"
            );
            return Ok(());
        }
        reservation.cancel()?;

        debug!(order_id = %self.order_id, "Order canceled");
        Ok(())
    }

    fn name(&self) -> String {
        format!("order:{}", self.order_id)
    }
}
