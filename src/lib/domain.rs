//! Domain types and contracts

pub mod email;
