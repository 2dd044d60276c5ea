pub mod auth;
pub mod geometry;
pub mod identity;
pub mod map_controller;
