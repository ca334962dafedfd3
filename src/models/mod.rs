// Models module - Database entity representations

pub mod admin;
pub mod business;
pub mod category;
pub mod city;
pub mod deal;
pub mod location;
pub mod saved_deal;
pub mod spin_prize;
pub mod ticket;
pub mod university;
pub mod user;
pub mod verification_code;
pub mod voucher;

pub use admin::Admin;
pub use business::{Business, BusinessStatus};
pub use category::{Category, ListingStatus};
pub use city::City;
pub use deal::{Deal, DealStatus};
pub use location::BusinessLocation;
pub use saved_deal::SavedDeal;
pub use spin_prize::{PrizeType, SpinPrize, SpinRecord};
pub use ticket::{Ticket, TicketStatus};
pub use university::{Campus, University};
pub use user::User;
pub use verification_code::VerificationCode;
pub use voucher::Voucher;
