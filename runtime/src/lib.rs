//! Shared plumbing for the memoriae settlement engine's managers.
//!
//! Every `actors/*` crate and the `node` dispatcher depend on this crate for
//! the address type, the arbitrary-precision amount type, the closed error
//! set, the balance table, and the pluggable clock. Grounded on the
//! teacher's `fil_actors_runtime` crate, which plays the same role (shared
//! `ActorError`, dispatch helpers, HAMT-backed map types) for the Filecoin
//! builtin actors.

pub mod address;
pub mod amount;
pub mod balance_table;
pub mod clock;
pub mod error;

pub use address::Address;
pub use amount::Amount;
pub use balance_table::BalanceTable;
pub use clock::{Clock, FixedClock, Seconds, SystemClock};
pub use error::{AsManagerError, ErrorKind, ManagerContext, ManagerError};
