pub mod application;
pub mod link;
