pub mod model;
pub mod service;

pub use model::AuthPrincipal;
pub use service::{CachedIdentityResolver, IdentityCache, IdentityError, IdentityResolver};
