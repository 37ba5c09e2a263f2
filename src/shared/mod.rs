pub mod error;
pub mod position;
pub mod regex_cache;
pub mod result;
pub mod security;

pub use result::Result;
