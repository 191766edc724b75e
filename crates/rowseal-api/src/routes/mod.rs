//! # Route Modules

pub mod admin;
