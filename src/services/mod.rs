pub mod email;

pub use email::{mailer_from_config, LogMailer, MailError, Mailer, PasswordResetEmail, ResendMailer};
