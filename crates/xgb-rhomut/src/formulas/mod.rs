//! Closed-form R-mu-T relationships
//!
//! Pure functions mapping ductility, period and corner periods (or a
//! categorical case selector) to a strength ratio or a ductility demand.
//! Categorical selectors parse case-insensitively and reject anything
//! outside their published domain with
//! [`RhomutError::InvalidArgument`](crate::RhomutError::InvalidArgument).

pub mod ec8;
pub mod guerrini;
pub mod krawinkler_nassar;
pub mod miranda;
pub mod newmark_hall;
pub mod vidic;

pub use guerrini::HysteresisCase;
pub use krawinkler_nassar::HardeningBucket;
pub use miranda::SiteType;
