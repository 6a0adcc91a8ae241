use color_eyre::eyre::Context;
use postbox::{
    Mailer,
    config::Settings,
    database,
    mail::{EmbeddedTemplates, SmtpTransport},
};
use tokio::signal::unix::SignalKind;
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let (journald, journald_error) = match tracing_journald::layer() {
        Ok(layer) => (Some(layer), None),
        Err(error) => (None, Some(error)),
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(journald)
        .with(ErrorLayer::default())
        .with(EnvFilter::from_default_env())
        .init();

    if let Some(error) = journald_error {
        tracing::warn!(%error, "journald is unavailable, logging to stdout only");
    }

    let settings = Settings::from_env().wrap_err("unable to read settings")?;

    let database = database::connect(&settings.dsn)
        .await
        .wrap_err("can't connect to database")?;

    let shutdown = CancellationToken::new();

    let tasks = TaskTracker::new();

    let transport = SmtpTransport::new(&settings.mailer);
    let (mailer, dispatcher) = Mailer::new(
        settings.mailer.sender.clone(),
        EmbeddedTemplates::default(),
        transport,
    )
    .start(shutdown.clone());

    let mut dispatcher_task = tasks.spawn(dispatcher.run());

    tracing::info!(
        host = %settings.mailer.host,
        port = settings.mailer.port,
        encryption = %settings.mailer.encryption,
        "mailer listening for messages"
    );

    // Shutdown signals
    let mut sigint_task = tokio::signal::unix::signal(SignalKind::interrupt())
        .wrap_err("unable to listen for SIGINT")?;
    let mut sigquit_task =
        tokio::signal::unix::signal(SignalKind::quit()).wrap_err("unable to listen for SIGQUIT")?;
    let mut sighup_task = tokio::signal::unix::signal(SignalKind::hangup())
        .wrap_err("unable to listen for SIGHUP")?;
    let mut sigterm_task = tokio::signal::unix::signal(SignalKind::terminate())
        .wrap_err("unable to listen for SIGTERM")?;

    let mut shutdown_signal = async move || {
        tokio::select! {
            Some(_) = sigint_task.recv() => {
                tracing::info!("Received signal INTERRUPT");
            },
            Some(_) = sigquit_task.recv() => {
                tracing::info!("Received signal QUIT");
            },
            Some(_) = sighup_task.recv() => {
                tracing::info!("Received signal HANGUP");
            },
            Some(_) = sigterm_task.recv() => {
                tracing::info!("Received signal TERMINATE");
            },
        }
    };

    tokio::select! {
        result = &mut dispatcher_task => tracing::error!(?result, "mail dispatcher exited"),
        _ = shutdown_signal() => tracing::warn!("User requested exit"),
    }

    shutdown.cancel();
    tasks.close();

    tracing::info!(in_flight = mailer.in_flight(), "Performing clean shutdown");

    // Wait for outstanding mail, or next interrupt
    tokio::select! {
        () = async {
            tasks.wait().await;
            mailer.drain().await;
        } => tracing::info!("exited gracefully"),
        _ = shutdown_signal() => tracing::warn!("user sent second exit request during clean shutown"),
    }

    database
        .close()
        .await
        .wrap_err("failed to close database connection")?;

    Ok(())
}
