//! Notification delivery pipeline: the dispatcher resolves recipients
//! and fans deliveries out over the configured channels; failed
//! deliveries enter an exponentially backed-off retry chain with a
//! bounded attempt count and wall-clock window, escalating to admins
//! when a critical notification fails permanently.

pub mod channel;
pub mod delivery;
pub mod dispatcher;
pub mod failure;
pub mod retry;
