use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use codespace_client::{CodespaceConnector, RemoteConnector, RemoteEnvironments};
use respawn_core::{
    ChannelNotifier, Notification, Notifier, Reconciler, Settings, TenantStore, TracingNotifier,
};
use respawn_server::state::AppState;
use tokio::sync::mpsc::UnboundedReceiver;

#[derive(Parser)]
#[command(
    name = "respawn",
    about = "Codespace reconciler — brings stopped codespaces back to a running state",
    version,
    propagate_version = true
)]
struct Cli {
    /// Settings file (YAML); a missing file means defaults
    #[arg(long, global = true, env = "RESPAWN_CONFIG", default_value = "respawn.yaml")]
    config: PathBuf,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and liveness server until interrupted
    Serve {
        /// Override the listen port from settings
        #[arg(long)]
        port: Option<u16>,
    },

    /// Register a tenant and reconcile their codespaces immediately
    Register {
        tenant_id: String,
        /// Notification target the front end delivers to
        chat_id: i64,
        /// Remote-access token
        token: String,
    },

    /// List registered tenants (credentials redacted)
    Tenants,

    /// Run a single reconciliation pass and exit
    Pass,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Serve { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let settings = Settings::load(&cli.config)
        .with_context(|| format!("cannot load settings from {}", cli.config.display()))?;

    match cli.command {
        Commands::Serve { port } => run_serve(settings, port).await,
        Commands::Register {
            tenant_id,
            chat_id,
            token,
        } => run_register(settings, &tenant_id, chat_id, &token, cli.json).await,
        Commands::Tenants => run_tenants(&settings, cli.json),
        Commands::Pass => run_pass(settings).await,
    }
}

fn build_reconciler(
    settings: Settings,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<Arc<Reconciler>> {
    let store = TenantStore::new(&settings.store_path);
    let connector = Arc::new(CodespaceConnector::new(
        &settings.api_base,
        settings.request_timeout(),
    )?) as Arc<dyn RemoteConnector>;
    Ok(Arc::new(Reconciler::new(settings, store, connector, notifier)))
}

/// Drain notifications queued during a one-off command and print them.
fn print_notifications(rx: &mut UnboundedReceiver<Notification>) {
    while let Ok(note) = rx.try_recv() {
        println!("[chat {}] {}", note.chat_id, note.text);
    }
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

async fn run_serve(settings: Settings, port: Option<u16>) -> anyhow::Result<()> {
    let port = port.unwrap_or(settings.server.port);
    let reconciler = build_reconciler(settings, Arc::new(TracingNotifier))?;
    let state = AppState::new(Arc::clone(&reconciler));

    let scheduler = tokio::spawn(Arc::clone(&reconciler).run_scheduler());

    tokio::select! {
        result = respawn_server::serve(state, port) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
    }
    // In-flight tenant work is abandoned cleanly: the loop never writes the
    // tenant store, so there is nothing to corrupt.
    scheduler.abort();
    Ok(())
}

// ---------------------------------------------------------------------------
// register
// ---------------------------------------------------------------------------

async fn run_register(
    settings: Settings,
    tenant_id: &str,
    chat_id: i64,
    token: &str,
    json: bool,
) -> anyhow::Result<()> {
    // Resolve the credential's owner first: fails fast on a bad token.
    let connector = CodespaceConnector::new(&settings.api_base, settings.request_timeout())?;
    let login = connector
        .client_for(token)
        .authenticated_user()
        .await
        .context("credential validation failed")?;

    let (notifier, mut rx) = ChannelNotifier::new();
    let reconciler = build_reconciler(settings, Arc::new(notifier))?;
    let tenant = reconciler.register_tenant(tenant_id, chat_id, token).await?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "tenant_id": tenant.tenant_id,
                "chat_id": tenant.chat_id,
                "token": tenant.redacted_token(),
                "login": login,
            })
        );
    } else {
        println!(
            "registered tenant {} ({} on the remote)",
            tenant.tenant_id, login
        );
    }
    print_notifications(&mut rx);
    Ok(())
}

// ---------------------------------------------------------------------------
// tenants
// ---------------------------------------------------------------------------

fn run_tenants(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let store = TenantStore::new(&settings.store_path);
    let tenants = store.list()?;

    if json {
        let rendered: Vec<_> = tenants
            .iter()
            .map(|t| {
                serde_json::json!({
                    "tenant_id": t.tenant_id,
                    "chat_id": t.chat_id,
                    "token": t.redacted_token(),
                    "active": t.is_active(),
                    "registered_at": t.registered_at.to_rfc3339(),
                })
            })
            .collect();
        println!("{}", serde_json::Value::Array(rendered));
        return Ok(());
    }

    if tenants.is_empty() {
        println!("no tenants registered");
        return Ok(());
    }
    for t in tenants {
        println!(
            "{}  chat {}  token {}  registered {}",
            t.tenant_id,
            t.chat_id,
            t.redacted_token(),
            t.registered_at.to_rfc3339()
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// pass
// ---------------------------------------------------------------------------

async fn run_pass(settings: Settings) -> anyhow::Result<()> {
    let (notifier, mut rx) = ChannelNotifier::new();
    let reconciler = build_reconciler(settings, Arc::new(notifier))?;
    reconciler.run_pass().await;
    print_notifications(&mut rx);
    println!("pass complete");
    Ok(())
}
