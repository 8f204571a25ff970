//! Orchestrators: booking lifecycle, charge lifecycle, company onboarding and the
//! background email queue they share.

pub mod booking;
pub mod notifications;
pub mod onboarding;
pub mod payment;
