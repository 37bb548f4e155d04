pub mod single_flight;
pub mod verification;

pub use single_flight::{FlightAbandoned, SingleFlight};
pub use verification::{CachePolicy, VerificationCache};
