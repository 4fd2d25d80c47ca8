pub mod auth;
pub mod response;

pub use auth::{jwt_auth_middleware, require_admin, require_student, require_teacher, AuthUser};
pub use response::{ApiResponse, ApiResult};
