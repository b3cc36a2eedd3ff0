//! API handlers

pub mod auth;
pub mod health;
pub mod movies;
pub mod oauth;
pub mod reviews;
pub mod users;
