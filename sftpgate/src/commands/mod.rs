pub mod check;
mod common;
pub mod run;
pub mod test_target;
