pub mod bearer;
pub mod factory;
pub mod gate;
pub mod introspection;

pub use bearer::{BearerToken, MissingCredential, extract_bearer};
pub use factory::build_gate;
pub use gate::{AuthorizationDecision, AuthorizationGate, DenyReason};
