pub mod benefits;
pub mod centers;
pub mod health;
pub mod types;
