pub mod prelude;

pub mod benefits;
pub mod centers;
