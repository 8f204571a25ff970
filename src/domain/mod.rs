//! Domain types, pure pricing rules and the ports the orchestrators depend on.

pub mod booking;
pub mod cancel_token;
pub mod correlation;
pub mod money;
pub mod notification;
pub mod payment;
pub mod ports;
