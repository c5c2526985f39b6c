pub mod adk;
pub mod mapping;
pub mod normalized;
