// Services module - Business logic

pub mod accounts;
pub mod billing;
pub mod engagement;
pub mod mailer;
pub mod moderation;
pub mod otp;
pub mod password;
pub mod qr;
pub mod redemption;
pub mod reporting;
pub mod spin;
pub mod voucher;
