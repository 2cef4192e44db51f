//! Session state shared by every consumer in the process: who is logged in,
//! with which role and abilities, whether an operation is in flight, and what
//! the last auth failure was.

mod state;
mod store;
mod user;

pub use state::{SessionPhase, SessionSnapshot, REFRESH_THRESHOLD_SECS};
pub use store::{Operation, OperationGuard, SessionStore};
pub use user::{is_truthy, Abilities, Role, RoleRef, User, UserId};
