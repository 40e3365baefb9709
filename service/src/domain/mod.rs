//! Domain definitions.

pub mod allocation;
pub mod booking;
pub mod chat;
pub mod item;
pub mod lender;
pub mod payment;
pub mod refund;
pub mod user;

pub use self::{
    booking::Booking, item::Item, lender::Listing, payment::Payment,
    user::User,
};
