use anyhow::{Context, Result};
use tracing::debug;

use ketovital_core::service::VitalService;
use ketovital_core::sync::{SyncConfig, SyncEngine, SyncOutcome};

use crate::config::RemoteSettings;
use crate::remote::HttpTransport;

pub(crate) async fn run_sync(svc: &VitalService, settings: &RemoteSettings) -> Result<SyncOutcome> {
    let engine = SyncEngine::new(
        HttpTransport::new(settings.timeout)?,
        SyncConfig::new(settings.endpoint.clone()),
    );
    svc.sync(&engine, settings.token.as_deref())
        .await
        .context("Sync failed")
}

pub(crate) async fn cmd_sync(svc: &VitalService, settings: &RemoteSettings, json: bool) -> Result<()> {
    let outcome = run_sync(svc, settings).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    match outcome {
        SyncOutcome::NothingToSync => println!("Nothing to sync."),
        SyncOutcome::AlreadyRunning => println!("A sync is already in progress."),
        SyncOutcome::Pushed(report) => {
            println!("Pushed {} entries.", report.total());
            for kind in &report.pushed {
                println!("  {}: {}", kind.kind, kind.ids.len());
            }
        }
    }
    Ok(())
}

/// Runs one cycle after a logging command when auto-sync is on. Never fails
/// the caller; problems are printed as warnings.
pub(crate) async fn try_auto_sync(svc: &VitalService, settings: &RemoteSettings, json: bool) {
    if !settings.auto_sync {
        return;
    }
    if !settings.can_sync() {
        debug!("auto-sync enabled but endpoint or credential missing");
        return;
    }

    match run_sync(svc, settings).await {
        Ok(SyncOutcome::Pushed(report)) if !json => {
            eprintln!("Synced {} entries.", report.total());
        }
        Ok(_) => {}
        Err(e) => eprintln!("Warning: auto-sync failed, entries will be retried: {e:#}"),
    }
}
