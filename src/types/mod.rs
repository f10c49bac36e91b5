//! # Types Module
//!
//! Request and response types shared by the cache, the interceptor and the
//! transport.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`FetchRequest`] | Outbound request: method, URL, params, credentials |
//! | [`Method`] | HTTP method; only reads are cacheable |
//! | [`FetchResponse`] | Status, headers and JSON body of a successful response |

pub mod request;
pub mod response;

pub use request::{FetchRequest, Method};
pub use response::FetchResponse;
