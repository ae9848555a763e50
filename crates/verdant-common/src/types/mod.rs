//! Core data types shared across Verdant crates

pub mod amount;
pub mod events;
pub mod user_id;
