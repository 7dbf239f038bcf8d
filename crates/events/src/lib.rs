//! Synthpop event bus and notification infrastructure.
//!
//! Building blocks for telling the outside world about job lifecycle
//! transitions:
//!
//! - [`EventBus`] — in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`JobEvent`] — the canonical job lifecycle event envelope.
//! - [`delivery`] — external delivery channels (SMTP email).

pub mod bus;
pub mod delivery;

pub use bus::{EventBus, JobEvent, EVENT_JOB_FAILED, EVENT_JOB_READY};
pub use delivery::email::{EmailConfig, EmailDelivery};
