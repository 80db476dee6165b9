//! Account balance participant.

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use tcc_common::{
    Participant, ParticipantError, ParticipantResult, Reservation, ReservationState, TxContext,
};

#[derive(Debug)]
struct AccountState {
    /// Spendable balance. Already excludes `frozen`.
    balance: Decimal,
    /// Amount held between Try and Confirm/Cancel.
    frozen: Decimal,
    /// Amount the next Try deducts.
    deduct_amount: Decimal,
    reservation: Reservation,
}

/// Point-in-time view of an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balance: Decimal,
    pub frozen: Decimal,
    pub state: ReservationState,
}

/// Deducts a preconfigured amount from a balance.
///
/// Try freezes the amount, Confirm releases the freeze and keeps the
/// deduction, Cancel gives the money back. Cancel after Confirm refunds the
/// confirmed deduction. Cancel from an execution other than the one whose
/// Try succeeded changes nothing.
#[derive(Debug)]
pub struct AccountService {
    account_id: String,
    inner: Mutex<AccountState>,
}

impl AccountService {
    /// Create an account holding `balance`.
    pub fn new(account_id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            inner: Mutex::new(AccountState {
                balance,
                frozen: Decimal::ZERO,
                deduct_amount: Decimal::ZERO,
                reservation: Reservation::new(),
            }),
        }
    }

    /// Configure the amount the next transaction deducts.
    ///
    /// Fails for a negative amount or while a reservation is outstanding.
    pub fn prepare_try(&self, amount: Decimal) -> ParticipantResult<()> {
        if amount.is_sign_negative() {
            return Err(ParticipantError::InvalidAmount(amount.to_string()));
        }

        let mut inner = self.inner.lock();
        inner.reservation.reset()?;
        inner.deduct_amount = amount;
        Ok(())
    }

    /// Account identifier.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Spendable balance.
    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    /// Amount currently frozen.
    pub fn frozen(&self) -> Decimal {
        self.inner.lock().frozen
    }

    /// Reservation lifecycle state.
    pub fn state(&self) -> ReservationState {
        self.inner.lock().reservation.state()
    }

    /// Get a consistent view of the account.
    pub fn snapshot(&self) -> AccountSnapshot {
        let inner = self.inner.lock();
        AccountSnapshot {
            account_id: self.account_id.clone(),
            balance: inner.balance,
            frozen: inner.frozen,
            state: inner.reservation.state(),
        }
    }
}

#[async_trait]
impl Participant for AccountService {
    async fn try_reserve(&self, ctx: &TxContext) -> ParticipantResult<()> {
        ctx.check()?;

        let mut inner = self.inner.lock();
        inner.reservation.ensure("try", ReservationState::Tried)?;
        if inner.deduct_amount > inner.balance {
            return Err(ParticipantError::InsufficientBalance {
                required: inner.deduct_amount.to_string(),
                available: inner.balance.to_string(),
            });
        }

        inner.reservation.hold(ctx.id())?;
        let amount = inner.deduct_amount;
        inner.balance -= amount;
        inner.frozen = amount;

        debug!(account_id = %self.account_id, amount = %amount, "Balance frozen");
        Ok(())
    }

    async fn confirm(&self, _ctx: &TxContext) -> ParticipantResult<()> {
        let mut inner = self.inner.lock();
        inner.reservation.confirm()?;
        inner.frozen = Decimal::ZERO;

        debug!(account_id = %self.account_id, "Deduction confirmed");
        Ok(())
    }

    async fn cancel(&self, ctx: &TxContext) -> ParticipantResult<()> {
        let mut inner = self.inner.lock();
        if !inner.reservation.is_held_by(ctx.id()) {
            debug!(
                account_id = %self.account_id,
                holder = ?inner.reservation.holder(),
                "Nothing to cancel"
            );
            return Ok(());
        }

        let refund = match inner.reservation.state() {
            ReservationState::Confirmed => inner.deduct_amount,
            _ => inner.frozen,
        };
        inner.reservation.cancel()?;
        inner.balance += refund;
        inner.frozen = Decimal::ZERO;

        debug!(account_id = %self.account_id, refund = %refund, "Deduction canceled");
        Ok(())
    }

    fn name(&self) -> String {
        format!("account:{}", self.account_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn account(balance: Decimal, amount: Decimal) -> AccountService {
        let account = AccountService::new("FanOne", balance);
        account.prepare_try(amount).unwrap();
        account
    }

    #[tokio::test]
    async fn test_try_then_confirm() {
        let account = account(dec!(1000), dec!(500));
        let ctx = TxContext::new();

        account.try_reserve(&ctx).await.unwrap();
        assert_eq!(account.balance(), dec!(500));
        assert_eq!(account.frozen(), dec!(500));

        account.confirm(&ctx).await.unwrap();
        assert_eq!(account.balance(), dec!(500));
        assert_eq!(account.frozen(), Decimal::ZERO);
        assert_eq!(account.state(), ReservationState::Confirmed);
    }

    #[tokio::test]
    async fn test_insufficient_balance_leaves_balance_untouched() {
        let account = account(dec!(100), dec!(500));

        let err = account.try_reserve(&TxContext::new()).await.unwrap_err();

        assert!(err.to_string().contains("insufficient balance"));
        assert_eq!(account.balance(), dec!(100));
        assert_eq!(account.frozen(), Decimal::ZERO);
        assert_eq!(account.state(), ReservationState::Pending);
    }

    #[tokio::test]
    async fn test_cancel_returns_frozen_amount() {
        let account = account(dec!(1000), dec!(250.50));
        let ctx = TxContext::new();

        account.try_reserve(&ctx).await.unwrap();
        account.cancel(&ctx).await.unwrap();

        assert_eq!(account.balance(), dec!(1000));
        assert_eq!(account.frozen(), Decimal::ZERO);
        assert_eq!(account.state(), ReservationState::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_after_confirm_refunds() {
        let account = account(dec!(1000), dec!(500));
        let ctx = TxContext::new();

        account.try_reserve(&ctx).await.unwrap();
        account.confirm(&ctx).await.unwrap();
        account.cancel(&ctx).await.unwrap();

        assert_eq!(account.balance(), dec!(1000));
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let account = account(dec!(1000), dec!(500));
        let ctx = TxContext::new();

        account.cancel(&ctx).await.unwrap();
        assert_eq!(account.balance(), dec!(1000));
        assert_eq!(account.state(), ReservationState::Pending);

        account.try_reserve(&ctx).await.unwrap();
        account.cancel(&ctx).await.unwrap();
        account.cancel(&ctx).await.unwrap();
        assert_eq!(account.balance(), dec!(1000));
        assert_eq!(account.state(), ReservationState::Canceled);
    }

    #[tokio::test]
    async fn test_cancel_from_other_execution_keeps_commit() {
        let account = account(dec!(1000), dec!(500));
        let first = TxContext::new();
        account.try_reserve(&first).await.unwrap();
        account.confirm(&first).await.unwrap();

        let second = TxContext::new();
        let err = account.try_reserve(&second).await.unwrap_err();
        account.cancel(&second).await.unwrap();

        assert_eq!(
            err,
            ParticipantError::InvalidState {
                operation: "try",
                state: ReservationState::Confirmed,
            }
        );
        assert_eq!(account.balance(), dec!(500));
        assert_eq!(account.state(), ReservationState::Confirmed);
    }

    #[tokio::test]
    async fn test_cancel_from_other_execution_keeps_hold() {
        let account = account(dec!(1000), dec!(500));
        let holder = TxContext::new();
        account.try_reserve(&holder).await.unwrap();

        account.cancel(&TxContext::new()).await.unwrap();
        assert_eq!(account.frozen(), dec!(500));

        account.confirm(&holder).await.unwrap();
        assert_eq!(account.balance(), dec!(500));
    }

    #[tokio::test]
    async fn test_confirm_requires_try() {
        let account = account(dec!(1000), dec!(500));

        let err = account.confirm(&TxContext::new()).await.unwrap_err();

        assert_eq!(
            err,
            ParticipantError::InvalidState {
                operation: "confirm",
                state: ReservationState::Pending,
            }
        );
    }

    #[tokio::test]
    async fn test_try_honors_cancelled_context() {
        let account = account(dec!(1000), dec!(500));
        let ctx = TxContext::new();
        ctx.cancel();

        let err = account.try_reserve(&ctx).await.unwrap_err();

        assert_eq!(err, ParticipantError::ContextCancelled);
        assert_eq!(account.balance(), dec!(1000));
    }

    #[test]
    fn test_prepare_rejects_negative_amount() {
        let account = AccountService::new("FanOne", dec!(10));
        assert!(matches!(
            account.prepare_try(dec!(-1)),
            Err(ParticipantError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_prepare_rejects_outstanding_reservation() {
        let account = account(dec!(1000), dec!(500));
        tokio_test::block_on(account.try_reserve(&TxContext::new())).unwrap();

        assert!(account.prepare_try(dec!(1)).is_err());
        assert_eq!(account.snapshot().frozen, dec!(500));
    }
}
