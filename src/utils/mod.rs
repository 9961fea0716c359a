pub mod display;
pub mod flash;
pub mod upload;
pub mod username_index;
