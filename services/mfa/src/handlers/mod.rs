pub mod backup;
pub mod challenge;
pub mod status;
pub mod totp;
pub mod validate;
