pub mod actor;
pub mod config;
pub mod database;
pub mod mail;

pub use actor::mailer::{Dispatcher, Mailer, MailerHandle, MailerStopped};
