//! Authentication module for VolunteerHub

pub mod cookie;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod sessions;

pub use cookie::{refresh_cookie, removal_cookie, REFRESH_COOKIE_NAME};
pub use jwt::{Claims, JwtManager, RefreshClaims, TokenError, TokenType};
pub use middleware::{authenticate, require_auth, AuthError, AuthState, AuthUser};
pub use password::{hash_password, verify_password};
pub use sessions::{IssuedSession, LoginRequest, ProfileUpdate, Registration, SessionManager};
