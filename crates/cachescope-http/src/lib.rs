//! # cachescope-http
//!
//! HTTP implementation of the cachescope backend traits.
//!
//! ## Endpoints
//! - `GET {base}{prefix}/{id}`: lookup, server time in the `x-server-timems` header
//! - `DELETE {base}{prefix}/cache/{id}`: evict one key
//! - `DELETE {base}{prefix}/cache`: evict every key

#![warn(missing_docs)]

mod client;
mod config;
mod error;

pub use client::{HttpBackend, SERVER_TIME_HEADER};
pub use config::HttpConfig;
pub use error::{Error, Result};
