pub mod assignment;
pub mod driver;
pub mod event;
pub mod id;
pub mod order;
pub mod party;
