pub mod password;
pub mod token;

pub use password::{hash_reset_token, PasswordError, PasswordHasher, PasswordResetToken};
pub use token::{Claims, TokenError, TokenService};
