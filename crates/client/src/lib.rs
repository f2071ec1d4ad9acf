//! apicheck HTTP transports
//!
//! Three interchangeable ways to send a request, all behind
//! [`HttpTransport`]:
//!
//! - [`DirectClient`]: `reqwest` blocking client
//! - [`BrowserClient`]: Playwright `APIRequestContext` through Node.js
//! - [`FluentClient`]: given/when/then style client with inline assertions

pub mod browser;
pub mod call;
pub mod direct;
pub mod fluent;
pub mod transport;

pub use browser::BrowserClient;
pub use call::{HttpCall, HttpResult, HttpVerb};
pub use direct::DirectClient;
pub use fluent::{FluentClient, RequestBuilder, RequestSpec, ValidatableResponse};
pub use transport::{transport_for, ClientSettings, HttpTransport, TransportKind, DEFAULT_HEADERS};
