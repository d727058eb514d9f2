//! # Gatehouse
//!
//! `gatehouse` decides who is making an HTTP request. It runs an ordered list of
//! **authenticators** against a request; each one extracts credentials from its own
//! location (form body, session, cookie, header, server environment) and hands them
//! to shared **identifiers**, which look the identity up in a backing store.
//!
//! The first authenticator to produce a valid [`AuthResult`] wins and the
//! [`AuthenticationService`] remembers it, together with the aliases of the
//! authenticator and identifier that produced it.
//!
//! ## Stateful and stateless authenticators
//!
//! - **Persistence:** session and cookie authenticators can store an identity after
//!   login and clear it on logout. The service fans both operations out to every
//!   authenticator that supports them, in order.
//! - **Challenges:** HTTP Basic and Digest are stateless. When every authenticator
//!   failed they raise [`Error::Challenge`] carrying the `401` response headers, which
//!   the host turns into a response.
//!
//! ## Configuration
//!
//! Components are referenced by name through a [`Registry`]. A [`ServiceConfig`]
//! lists identifiers and authenticators in run order, each with an optional alias and
//! a JSON config object:
//!
//! ```json
//! {
//!   "identifiers": [{"name": "Password"}],
//!   "authenticators": [{"name": "Session"}, {"name": "Form", "config": {"loginUrl": "/login"}}]
//! }
//! ```
//!
//! Unknown names, components loaded under the wrong capability and unknown config keys
//! are rejected while the service is built.

pub mod authenticator;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod hasher;
pub mod http;
pub mod identifier;
pub mod identity;
pub mod nonce;
pub mod registry;
pub mod resolver;
pub mod result;
pub mod service;
pub mod token;
pub mod url_matcher;

pub use credentials::Credentials;
pub use error::{ConfigError, Error};
pub use identity::{Identity, IdentityData};
pub use registry::{Dependencies, Registry};
pub use result::{AuthResult, Status};
pub use service::{AuthenticationService, ServiceBuilder, ServiceConfig};
