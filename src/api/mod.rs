pub mod admin;
pub mod chat;
pub mod dashboard;
pub mod job;
pub mod po;
pub mod report;
pub mod unit;
