//! Owned request/response carriers the pipeline reads from and writes to.

mod challenge;
mod cookie;
mod request;
mod response;
mod session;

pub use challenge::Challenge;
pub use cookie::Cookie;
pub use request::{
    Attribute, Request, AUTH_DIGEST, AUTH_PW, AUTH_USER, HTTPS, HTTP_HOST, ORIGINAL_REQUEST_METHOD,
    REQUEST_METHOD, REQUEST_URI, SERVER_NAME,
};
pub use response::Response;
pub use session::{MemorySession, Session};
