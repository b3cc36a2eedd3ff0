//! Authentication and authorization module
//!
//! JWT-based authentication with the following components:
//! - Access/refresh token issuance and validation
//! - Password hashing with bcrypt
//! - Middleware for request authentication and role gates
//! - Authentication service for registration, login and sessions
//! - Google OAuth client
//! - Repository layer for accounts and the refresh-token ledger

pub mod jwt;
pub mod middleware;
pub mod models;
pub mod oauth;
pub mod password;
pub mod repository;
pub mod service;

pub use jwt::{validate_access_token, Claims, JwtConfig};
pub use middleware::{
    auth_middleware, optional_auth_middleware, require_role, AuthError, AuthenticatedUser,
};
pub use models::{Account, AccountPublic, RefreshToken};
pub use oauth::{GoogleOAuthClient, OAuthError, OAuthProvider};
pub use password::{hash_password, verify_password, PasswordConfig};
pub use repository::{AccountRepository, RefreshTokenRepository, RepositoryError};
pub use service::{
    AuthResponse, AuthService, AuthServiceError, LoginRequest, LogoutRequest, RefreshRequest,
    RegisterRequest, SocialProfile, UserInfo,
};
