pub mod auth;
pub mod error_handler;
pub mod extract;
pub mod response;

pub use auth::{protect, restrict_to, AllowedRoles, CurrentUser};
pub use error_handler::{handle_errors, route_not_found};
pub use extract::{parse_object_id, validate_ids, JsonBody, ObjectIdPath, ValidJson};
pub use response::{ApiResponse, ApiResult};
