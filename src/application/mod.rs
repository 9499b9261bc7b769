pub mod convert;
pub mod documents;
pub mod error;
pub mod render;
pub mod repos;
pub mod store;
