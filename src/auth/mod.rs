pub mod jwt;
pub mod principal;

pub use jwt::{generate_token, verify_token, Claims};
pub use principal::{AuthError, AuthenticatedPrincipal, MaybeAuthenticated};
