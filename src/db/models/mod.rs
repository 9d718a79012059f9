//! Database models split into domain-specific modules.

pub mod code;
pub mod user;

pub use code::*;
pub use user::*;
