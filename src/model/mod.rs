pub mod chat;
pub mod job;
pub mod note;
pub mod pricing;
pub mod role;
pub mod step;
pub mod unit;
pub mod user;
