pub mod auth;
pub mod rate_limit;
pub mod response;
pub mod sanitize;

pub use auth::{jwt_auth_middleware, require_admin, require_framework, AuthUser};
pub use rate_limit::{rate_limit_middleware, RateLimit};
pub use response::{ApiResponse, ApiResult, Pagination};
pub use sanitize::JsonBody;
