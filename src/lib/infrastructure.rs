//! Configuration, email services and layouts

pub mod config;
pub mod email;
pub mod templates;
