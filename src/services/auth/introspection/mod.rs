pub mod client;
pub mod credential;
pub mod discovery;
pub mod types;

pub use client::{IntrospectionClient, IntrospectionError, TokenIntrospector};
pub use credential::ServiceCredential;
pub use types::{IntrospectionResponse, IntrospectionResult};
