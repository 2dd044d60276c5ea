pub mod auth;
pub mod geometry;
pub mod property;
