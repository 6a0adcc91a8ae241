use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::{
    sync::CancellationToken,
    task::{TaskTracker, task_tracker::TaskTrackerToken},
};

use crate::mail::{
    Attachment, Connection, CssInliner, DataMap, Email, EmbeddedTemplates, Format, MailError,
    Message, Sender, SmtpTransport, TemplateStore, Transport,
};

pub const MAIL_QUEUE_CAPACITY: usize = 64;
pub const ERROR_QUEUE_CAPACITY: usize = 64;

/// Everything a send needs, shared read-only between all in-flight sends.
pub struct Mailer<T = SmtpTransport, S = EmbeddedTemplates> {
    sender: Sender,
    templates: S,
    transport: T,
    inliner: CssInliner,
}

impl<T: Transport, S: TemplateStore> Mailer<T, S> {
    pub fn new(sender: Sender, templates: S, transport: T) -> Self {
        Self {
            sender,
            templates,
            transport,
            inliner: CssInliner::new(),
        }
    }

    /// Creates the intake and error channels.
    ///
    /// The returned [`Dispatcher`] has to be spawned for mail to go out; it
    /// runs until `shutdown` is cancelled or every handle is dropped.
    pub fn start(self, shutdown: CancellationToken) -> (MailerHandle, Dispatcher<T, S>) {
        let (mail_tx, mail_rx) = mpsc::channel(MAIL_QUEUE_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_QUEUE_CAPACITY);
        let in_flight = TaskTracker::new();

        let handle = MailerHandle {
            mail_tx,
            shutdown: shutdown.clone(),
            in_flight,
        };

        let dispatcher = Dispatcher {
            mailer: Arc::new(self),
            shutdown,
            mail_rx,
            error_tx,
            error_rx,
        };

        (handle, dispatcher)
    }

    /// Renders and transmits a single message.
    ///
    /// Stops at the first failing step, so at most one error comes back and
    /// nothing reaches the smtp server unless both variants rendered and every
    /// attachment could be read.
    pub async fn deliver(&self, message: Message) -> Result<(), MailError> {
        let message = message.with_defaults(&self.sender);
        let data = DataMap::wrap(message.data);

        let html = self
            .templates
            .render(&message.template, Format::Html, &data)
            .await?;
        let text = self
            .templates
            .render(&message.template, Format::Plain, &data)
            .await?;

        let html = self.inliner.inline(&html)?;

        let mut attachments = Vec::with_capacity(message.attachments.len());
        for path in &message.attachments {
            attachments.push(Attachment::read(path).await?);
        }

        let connection = self.transport.connect().await?;

        let email = Email {
            from: message.from,
            from_name: message.from_name,
            to: message.to,
            subject: message.subject,
            text,
            html,
            attachments,
        };

        connection.send(email).await
    }
}

/// A queued message together with its share of the in-flight count.
pub struct Envelope {
    message: Message,
    completion: TaskTrackerToken,
}

/// The caller's side of the mailer.
#[derive(Clone)]
pub struct MailerHandle {
    mail_tx: mpsc::Sender<Envelope>,
    shutdown: CancellationToken,
    in_flight: TaskTracker,
}

#[derive(Debug, thiserror::Error)]
#[error("the mailer is no longer accepting messages")]
pub struct MailerStopped(pub Message);

impl MailerHandle {
    /// Queues a message for background delivery.
    ///
    /// The message counts as in flight from this point until its send
    /// finishes, whatever the outcome.
    pub async fn send(&self, message: Message) -> Result<(), MailerStopped> {
        let envelope = Envelope {
            message,
            completion: self.in_flight.token(),
        };

        self.mail_tx
            .send(envelope)
            .await
            .map_err(|mpsc::error::SendError(envelope)| MailerStopped(envelope.message))
    }

    /// Stops the dispatcher. Sends that already started are left to finish.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits until every queued message has been handled.
    ///
    /// Messages can still be queued afterwards, but a second drain is needed
    /// to wait for them.
    pub async fn drain(&self) {
        self.in_flight.close();
        self.in_flight.wait().await;
        self.in_flight.reopen();
    }
}

pub struct Dispatcher<T = SmtpTransport, S = EmbeddedTemplates> {
    mailer: Arc<Mailer<T, S>>,
    shutdown: CancellationToken,
    mail_rx: mpsc::Receiver<Envelope>,
    error_tx: mpsc::Sender<MailError>,
    error_rx: mpsc::Receiver<MailError>,
}

impl<T: Transport, S: TemplateStore> Dispatcher<T, S> {
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => break,
                // Ahead of intake, so send tasks never wait on a full error queue.
                Some(error) = self.error_rx.recv() => {
                    tracing::error!(%error, "failed to send email");
                }
                envelope = self.mail_rx.recv() => {
                    let Some(envelope) = envelope else {
                        break;
                    };

                    tokio::spawn(send_mail(
                        self.mailer.clone(),
                        envelope,
                        self.error_tx.clone(),
                    ));
                }
            }
        }

        tracing::info!("shutting down");
    }
}

/// Delivers one message and reports a failure on `errors`.
///
/// The envelope's completion token is released when this returns, on every
/// path.
pub async fn send_mail<T: Transport, S: TemplateStore>(
    mailer: Arc<Mailer<T, S>>,
    envelope: Envelope,
    errors: mpsc::Sender<MailError>,
) {
    let Envelope {
        message,
        completion,
    } = envelope;

    let to = message.to.clone();

    match mailer.deliver(message).await {
        Ok(()) => tracing::info!(%to, "sent email"),
        Err(error) => {
            if let Err(mpsc::error::SendError(error)) = errors.send(error).await {
                tracing::error!(%error, %to, "failed to send email after the mailer stopped");
            }
        }
    }

    drop(completion);
}
