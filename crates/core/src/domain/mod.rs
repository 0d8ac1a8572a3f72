pub mod candidate;
pub mod comparable;
pub mod error;
pub mod opportunity;
