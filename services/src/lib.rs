//! TCC Reference Participants
//!
//! Resource managers that implement the participant contract over state they
//! own exclusively: an account balance, a stock count and an order status.
//! Each keeps its reservation lifecycle locally so that Cancel is well
//! defined in every state the coordinator can reach.

pub mod account;
pub mod inventory;
pub mod order;

pub use account::{AccountService, AccountSnapshot};
pub use inventory::{InventoryService, InventorySnapshot};
pub use order::{OrderService, OrderStatus};
