pub mod entities;
pub mod error;
pub mod keys;
pub mod types;
