pub mod mfa_challenges;
pub mod mfa_methods;
pub mod mfa_settings;
pub mod outbox_events;
pub mod users;
