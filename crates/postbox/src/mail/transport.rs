use std::{path::Path, time::Duration};

use mail_send::{
    Credentials, SmtpClient, SmtpClientBuilder,
    mail_builder::{
        MessageBuilder,
        headers::{address::Address, content_type::ContentType},
    },
};
use mime::Mime;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use super::{
    MailError,
    settings::{Encryption, MailerSettings},
};

/// Applies to connecting as well as to every SMTP command afterwards.
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: Mime,
    pub contents: Vec<u8>,
}

impl Attachment {
    pub async fn read(path: &Path) -> Result<Self, MailError> {
        let contents = tokio::fs::read(path)
            .await
            .map_err(|source| MailError::Attachment {
                path: path.to_owned(),
                source,
            })?;

        Ok(Self {
            file_name: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            content_type: mime_guess::from_path(path).first_or_octet_stream(),
            contents,
        })
    }
}

/// A fully rendered email, ready to hand to a [`Connection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
    pub attachments: Vec<Attachment>,
}

impl Email {
    /// Plain text is the primary body, HTML the alternative.
    pub fn into_message(self) -> MessageBuilder<'static> {
        let from_name = (!self.from_name.is_empty()).then_some(self.from_name);

        let mut message = MessageBuilder::new()
            .from(Address::new_address(from_name, self.from))
            .to(Address::new_address(None::<String>, self.to))
            .subject(self.subject)
            .text_body(self.text)
            .html_body(self.html);

        for attachment in self.attachments {
            message = message.attachment(
                ContentType::new(attachment.content_type.essence_str().to_owned()),
                attachment.file_name,
                attachment.contents,
            );
        }

        message
    }
}

/// Opens connections to a mail server.
pub trait Transport: Send + Sync + 'static {
    type Connection: Connection;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, MailError>> + Send;
}

/// A single-use connection: it is closed once the email has been sent.
pub trait Connection: Send {
    fn send(self, email: Email) -> impl Future<Output = Result<(), MailError>> + Send;
}

#[derive(Clone)]
pub struct SmtpTransport {
    domain: String,
    host: String,
    port: u16,
    credentials: Option<Credentials<String>>,
    encryption: Encryption,
}

impl SmtpTransport {
    pub fn new(settings: &MailerSettings) -> Self {
        let credentials = (!settings.username.is_empty()).then(|| {
            Credentials::new(settings.username.clone(), settings.password.clone())
        });

        Self {
            domain: settings.domain.clone(),
            host: settings.host.clone(),
            port: settings.port,
            credentials,
            encryption: settings.encryption,
        }
    }

    pub fn encryption(&self) -> Encryption {
        self.encryption
    }

    fn builder(&self) -> SmtpClientBuilder<String> {
        let builder = SmtpClientBuilder::new(self.host.clone(), self.port)
            .helo_host(self.domain.as_str())
            .implicit_tls(self.encryption.implicit_tls())
            .timeout(SMTP_TIMEOUT);

        match &self.credentials {
            Some(credentials) => builder.credentials(credentials.clone()),
            None => builder,
        }
    }
}

impl Transport for SmtpTransport {
    type Connection = SmtpConnection;

    async fn connect(&self) -> Result<SmtpConnection, MailError> {
        tracing::debug!(host = %self.host, port = self.port, encryption = %self.encryption, "connecting to smtp server");

        let connection = match self.encryption {
            Encryption::None => self
                .builder()
                .connect_plain()
                .await
                .map(SmtpConnection::Plain),
            Encryption::StartTls | Encryption::ImplicitTls => {
                self.builder().connect().await.map(SmtpConnection::Tls)
            }
        };

        connection.map_err(MailError::Connect)
    }
}

pub enum SmtpConnection {
    Tls(SmtpClient<TlsStream<TcpStream>>),
    Plain(SmtpClient<TcpStream>),
}

impl Connection for SmtpConnection {
    async fn send(self, email: Email) -> Result<(), MailError> {
        let message = email.into_message();

        match self {
            Self::Tls(smtp) => send_then_quit(smtp, message).await,
            Self::Plain(smtp) => send_then_quit(smtp, message).await,
        }
    }
}

// The session is closed with QUIT whether or not the transaction succeeded.
async fn send_then_quit<S>(
    mut smtp: SmtpClient<S>,
    message: MessageBuilder<'static>,
) -> Result<(), MailError>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let result = smtp.send(message).await.map_err(MailError::Transmit);

    _ = smtp.quit().await.inspect_err(
        |error| tracing::warn!(%error, "failed to send quit message to the smtp server"),
    );

    result
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::mail::settings::Sender;

    fn settings(encryption: &str, username: &str) -> MailerSettings {
        MailerSettings {
            domain: "example.com".to_owned(),
            host: "smtp.example.com".to_owned(),
            port: 2525,
            username: username.to_owned(),
            password: "secret".to_owned(),
            encryption: Encryption::resolve(encryption),
            sender: Sender {
                address: "noreply@example.com".to_owned(),
                name: String::new(),
            },
        }
    }

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("templates").join(name)
    }

    #[test]
    fn transport_resolves_encryption_from_settings() {
        assert_eq!(SmtpTransport::new(&settings("tls", "")).encryption(), Encryption::StartTls);
        assert_eq!(SmtpTransport::new(&settings("ssl", "")).encryption(), Encryption::ImplicitTls);
        assert_eq!(SmtpTransport::new(&settings("none", "")).encryption(), Encryption::None);
        assert_eq!(SmtpTransport::new(&settings("bogus", "")).encryption(), Encryption::StartTls);
    }

    #[test]
    fn credentials_only_with_username() {
        assert!(SmtpTransport::new(&settings("tls", "")).credentials.is_none());
        assert!(SmtpTransport::new(&settings("tls", "mailer")).credentials.is_some());
    }

    #[tokio::test]
    async fn attachment_reads_file_and_guesses_type() {
        let attachment = Attachment::read(&fixture("mail.html")).await.unwrap();

        assert_eq!(attachment.file_name, "mail.html");
        assert_eq!(attachment.content_type, mime::TEXT_HTML);
        assert!(!attachment.contents.is_empty());
    }

    #[tokio::test]
    async fn missing_attachment_is_reported_with_its_path() {
        let path = fixture("does-not-exist.pdf");
        let error = Attachment::read(&path).await.unwrap_err();

        assert!(matches!(error, MailError::Attachment { path: ref failed, .. } if *failed == path));
    }

    #[test]
    fn message_carries_both_bodies_and_attachments_in_order() {
        let email = Email {
            from: "noreply@example.com".to_owned(),
            from_name: "Example".to_owned(),
            to: "a@example.com".to_owned(),
            subject: "Hi".to_owned(),
            text: "plain body".to_owned(),
            html: "<p>html body</p>".to_owned(),
            attachments: vec![
                Attachment {
                    file_name: "first.txt".to_owned(),
                    content_type: mime::TEXT_PLAIN,
                    contents: b"one".to_vec(),
                },
                Attachment {
                    file_name: "second.txt".to_owned(),
                    content_type: mime::TEXT_PLAIN,
                    contents: b"two".to_vec(),
                },
            ],
        };

        let raw = email.into_message().write_to_string().unwrap();

        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("plain body"));
        assert!(raw.contains("<p>html body</p>"));

        let first = raw.find("first.txt").unwrap();
        let second = raw.find("second.txt").unwrap();
        assert!(first < second);
    }
}
