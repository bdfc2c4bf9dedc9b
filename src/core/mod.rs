pub mod actions;
pub mod catalog;
pub mod run;
pub mod run_cache;
pub mod session;
