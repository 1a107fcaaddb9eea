pub mod admin;
pub mod auth;
pub mod complaints;
pub mod departments;
pub mod error;
pub mod middleware;
