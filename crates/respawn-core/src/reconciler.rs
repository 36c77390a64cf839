//! The periodic scan-and-repair loop.
//!
//! Each pass takes a snapshot of the tenant store, fans out one task per
//! active tenant, and joins them all before the pass is declared complete.
//! Within a tenant, environments are handled one at a time so that tenant's
//! notification stream stays ordered; tenants are mutually independent and
//! one tenant's failures never touch another's pass.
//!
//! No state is carried between passes: every pass re-reads the store and the
//! remote system, and the store itself is only ever written through the
//! atomic `put` — never by this loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use codespace_client::{
    ClientError, EnvironmentSnapshot, RemoteConnector, RemoteEnvironments,
};
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};
use crate::event::{Action, ReconcileEvent, StepOutcome};
use crate::notify::{Notification, Notifier, Severity};
use crate::patch::apply_startup_hook;
use crate::settings::Settings;
use crate::store::{Tenant, TenantStore};

/// Bound on read-patch-write attempts when the config write keeps hitting
/// optimistic-concurrency conflicts.
const MAX_WRITE_ATTEMPTS: usize = 3;

pub struct Reconciler {
    settings: Settings,
    store: TenantStore,
    connector: Arc<dyn RemoteConnector>,
    notifier: Arc<dyn Notifier>,
    running: Arc<AtomicBool>,
}

impl Reconciler {
    pub fn new(
        settings: Settings,
        store: TenantStore,
        connector: Arc<dyn RemoteConnector>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Reconciler {
            settings,
            store,
            connector,
            notifier,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn store(&self) -> &TenantStore {
        &self.store
    }

    /// Readiness flag: set once the scheduler has started. Shared with the
    /// liveness endpoint; nothing else is exposed.
    pub fn readiness(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    // -----------------------------------------------------------------------
    // Scheduling
    // -----------------------------------------------------------------------

    /// Drive reconciliation passes forever at the configured interval. The
    /// first pass runs immediately. Cancellation is external (dropping the
    /// future / aborting the task): in-flight remote calls are abandoned
    /// cleanly since the loop never writes the store.
    pub async fn run_scheduler(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.settings.interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        self.running.store(true, Ordering::SeqCst);
        info!(
            interval_secs = self.settings.interval_secs,
            "reconciliation scheduler started"
        );
        loop {
            ticker.tick().await;
            Arc::clone(&self).run_pass().await;
        }
    }

    /// One full pass over all tenants.
    pub async fn run_pass(self: Arc<Self>) {
        let tenants = match self.store.list() {
            Ok(tenants) => tenants,
            Err(e) => {
                warn!("cannot read tenant store, skipping pass: {e}");
                return;
            }
        };
        debug!(tenants = tenants.len(), "starting reconciliation pass");

        let mut handles = Vec::new();
        for tenant in tenants {
            if !tenant.is_active() {
                debug!(tenant = %tenant.tenant_id, "skipping tenant with empty credential");
                continue;
            }
            let this = Arc::clone(&self);
            handles.push(tokio::spawn(async move {
                this.reconcile_tenant(&tenant).await;
            }));
        }
        // Join barrier: the pass is complete only once every tenant task is.
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!("tenant task failed to complete: {e}");
            }
        }
        debug!("reconciliation pass complete");
    }

    // -----------------------------------------------------------------------
    // Registration boundary
    // -----------------------------------------------------------------------

    /// Persist a tenant record and reconcile that tenant once before
    /// returning, so a fresh registration gets immediate feedback.
    pub async fn register_tenant(
        &self,
        tenant_id: &str,
        chat_id: i64,
        token: &str,
    ) -> Result<Tenant> {
        if token.trim().is_empty() {
            return Err(CoreError::EmptyCredential(tenant_id.to_string()));
        }
        let tenant = self.store.put(tenant_id, chat_id, token)?;
        self.reconcile_tenant(&tenant).await;
        Ok(tenant)
    }

    // -----------------------------------------------------------------------
    // Per-tenant pass
    // -----------------------------------------------------------------------

    /// Reconcile every environment of one tenant. All failures end here as
    /// notifications; nothing propagates to the caller.
    pub async fn reconcile_tenant(&self, tenant: &Tenant) {
        let client = self.connector.client_for(&tenant.token);
        let snapshots = match client.list_environments().await {
            Ok(snapshots) => snapshots,
            Err(ClientError::Auth) => {
                // Credential is dead: abort this tenant's pass, report once.
                self.send(
                    tenant,
                    "🚫 Credential rejected. Save a fresh token to resume monitoring.".to_string(),
                    Severity::Error,
                );
                return;
            }
            Err(e) => {
                // Transient and everything else: report, let the next
                // scheduled pass retry naturally.
                self.send(
                    tenant,
                    format!("❗ Error checking codespaces: {e}"),
                    Severity::Warning,
                );
                return;
            }
        };

        if snapshots.is_empty() {
            self.send(
                tenant,
                "ℹ️ No codespaces found for your account.".to_string(),
                Severity::Info,
            );
            return;
        }

        for snapshot in snapshots {
            let event = self.reconcile_environment(client.as_ref(), tenant, snapshot).await;
            debug!(
                tenant = %event.tenant_id,
                environment = %event.environment,
                action = event.action.as_str(),
                "environment reconciled"
            );
            self.send(tenant, event.render(), event.severity());
        }
    }

    /// Decide and apply the action for one environment.
    async fn reconcile_environment(
        &self,
        client: &dyn RemoteEnvironments,
        tenant: &Tenant,
        snapshot: EnvironmentSnapshot,
    ) -> ReconcileEvent {
        if !snapshot.state.needs_recovery() {
            return ReconcileEvent::healthy(&tenant.tenant_id, &snapshot.name, snapshot.raw_state);
        }

        // Stopped or unknown: patch (best effort), then start. The two
        // sub-steps are independent — a patch failure must not stop the
        // restart attempt.
        let patch = if self.settings.patch_on_start {
            Some(self.patch_step(client, &snapshot).await)
        } else {
            None
        };

        let start = match client.start_environment(&snapshot.name).await {
            Ok(()) => StepOutcome::Succeeded,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };

        let action = if patch.is_some() {
            Action::PatchAndStart
        } else {
            Action::Start
        };
        ReconcileEvent {
            tenant_id: tenant.tenant_id.clone(),
            environment: snapshot.name,
            observed: snapshot.state,
            raw_state: snapshot.raw_state,
            action,
            patch,
            start: Some(start),
        }
    }

    /// Resolve the owning repository, then run the patch-and-write sequence.
    async fn patch_step(
        &self,
        client: &dyn RemoteEnvironments,
        snapshot: &EnvironmentSnapshot,
    ) -> StepOutcome {
        let repo = match &snapshot.repository {
            Some(repo) => repo.clone(),
            None => match client.environment_details(&snapshot.name).await {
                Ok(details) => match details.repository {
                    Some(repo) => repo,
                    None => return StepOutcome::Skipped("owning repository unknown".to_string()),
                },
                Err(ClientError::NotFound(_)) => {
                    // The environment disappeared between list and details;
                    // the set of environments changes over time.
                    return StepOutcome::Skipped("environment no longer exists".to_string());
                }
                Err(e) => return StepOutcome::Failed(e.to_string()),
            },
        };
        self.ensure_startup_hook(client, &repo, &snapshot.name).await
    }

    /// Read-patch-write with optimistic-concurrency retry.
    ///
    /// A `Conflict` means someone edited the document between our read and
    /// write; re-read and try again, up to `MAX_WRITE_ATTEMPTS` whole
    /// sequences. An unchanged document is not written at all — that is what
    /// keeps the patch idempotent across passes.
    async fn ensure_startup_hook(
        &self,
        client: &dyn RemoteEnvironments,
        repo: &str,
        environment: &str,
    ) -> StepOutcome {
        let hook = &self.settings.hook;
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let doc = match client.read_config_document(repo, &hook.config_path).await {
                Ok(doc) => doc,
                Err(ClientError::NotFound(_)) => {
                    return StepOutcome::Skipped(format!("no {} in {repo}", hook.config_path));
                }
                Err(e) => return StepOutcome::Failed(e.to_string()),
            };

            let patched = apply_startup_hook(&doc.content, &hook.command);
            if patched == doc.content {
                return StepOutcome::Skipped("startup hook already configured".to_string());
            }

            let message = format!("{} for {environment}", hook.commit_message);
            match client
                .write_config_document(repo, &hook.config_path, &patched, &doc.version, &message)
                .await
            {
                Ok(_) => return StepOutcome::Succeeded,
                Err(ClientError::Conflict) => {
                    debug!(repo, attempt, "config write conflicted, re-reading");
                    continue;
                }
                Err(e) => return StepOutcome::Failed(e.to_string()),
            }
        }
        StepOutcome::Failed(format!(
            "config write conflicted {MAX_WRITE_ATTEMPTS} times, giving up"
        ))
    }

    // -----------------------------------------------------------------------
    // Notification delivery
    // -----------------------------------------------------------------------

    fn send(&self, tenant: &Tenant, text: String, severity: Severity) {
        let note = Notification {
            chat_id: tenant.chat_id,
            text,
            severity,
        };
        if let Err(e) = self.notifier.notify(note) {
            // Delivery is best-effort; reconciliation continues regardless.
            warn!(tenant = %tenant.tenant_id, "{e}");
        }
    }
}
