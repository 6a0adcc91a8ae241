use std::fmt;

/// Transport security used for the SMTP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encryption {
    /// Plain connection upgraded with `STARTTLS` after the greeting.
    #[default]
    StartTls,
    /// TLS from the first byte (usually port 465).
    ImplicitTls,
    /// No encryption at all.
    None,
}

impl Encryption {
    /// Maps a configured mode onto a transport setting.
    ///
    /// Every input resolves to something: unknown values fall back to
    /// [`Encryption::StartTls`].
    pub fn resolve(mode: &str) -> Self {
        match mode {
            "tls" => Self::StartTls,
            "ssl" => Self::ImplicitTls,
            "none" => Self::None,
            _ => Self::StartTls,
        }
    }

    pub fn implicit_tls(self) -> bool {
        matches!(self, Self::ImplicitTls)
    }
}

impl fmt::Display for Encryption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::StartTls => "starttls",
            Self::ImplicitTls => "ssl",
            Self::None => "none",
        })
    }
}

/// The identity mail is sent from when a message does not name one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub address: String,
    pub name: String,
}

#[derive(Clone)]
pub struct MailerSettings {
    pub domain: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub encryption: Encryption,
    pub sender: Sender,
}

// Keep the password out of logs.
impl fmt::Debug for MailerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailerSettings")
            .field("domain", &self.domain)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("encryption", &self.encryption)
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}
