pub mod backend;
pub mod poller;

pub use reqwest::StatusCode;
