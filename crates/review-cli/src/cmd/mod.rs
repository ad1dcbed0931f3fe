pub mod config;
pub mod review;
pub mod rules;
pub mod session;
