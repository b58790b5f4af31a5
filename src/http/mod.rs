//! HTTP client module

pub mod client;
pub use client::{FetchedPage, HttpClient};
