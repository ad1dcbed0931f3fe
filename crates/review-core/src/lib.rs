pub mod checklist;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod extract;
pub mod glob;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod publish;
pub mod report;
pub mod request;
pub mod rules;
pub mod scope;
pub mod session;
pub mod types;
pub mod vcs;

pub use error::{Result, ReviewError};
