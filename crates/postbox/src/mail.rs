//! Building blocks of outbound mail: the message model, templates, CSS
//! inlining and the SMTP transport.

use std::path::PathBuf;

pub mod inline;
pub mod message;
pub mod settings;
pub mod template;
pub mod transport;

pub use inline::CssInliner;
pub use message::{DataMap, Message};
pub use settings::{Encryption, MailerSettings, Sender};
pub use template::{EmbeddedTemplates, Format, TemplateError, TemplatePair, TemplateStore};
pub use transport::{Attachment, Connection, Email, SmtpTransport, Transport};

/// Why a single message could not be delivered, tagged with the failing stage.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("failed to render email: {0}")]
    Render(#[from] TemplateError),
    #[error("failed to inline css: {0}")]
    Inline(#[from] css_inline::InlineError),
    #[error("failed to read attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to connect to the smtp server: {0}")]
    Connect(#[source] mail_send::Error),
    #[error("failed to transmit email: {0}")]
    Transmit(#[source] mail_send::Error),
}
