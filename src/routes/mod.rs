/// Router Module Index
///
/// Routes are grouped by the access they require. Authentication is declared by
/// which group a route is registered in: `create_router` wraps the authenticated and
/// admin groups in the auth middleware and leaves the public group bare.

/// Routes open to anonymous clients.
pub mod public;

/// Routes that need a valid bearer token.
pub mod authenticated;

/// Routes that need a valid bearer token and the `admin` role.
pub mod admin;
