/// Identity and authorization
///
/// # Modules
///
/// - [`jwt`]: HS256 token issuance and validation
/// - [`middleware`]: Axum layer producing an [`middleware::AuthContext`]
/// - [`authorization`]: assignment policy and task permissions
///
/// Credentials (passwords, login flows) are handled outside this system;
/// tokens are minted by the identity provider or by [`jwt::create_token`]
/// in tooling and tests.

pub mod authorization;
pub mod jwt;
pub mod middleware;
