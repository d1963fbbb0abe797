//! Background verification refresh.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use super::domains::DomainService;
use super::verification::CheckOptions;

/// Run `refresh_all` every `interval` until `shutdown` flips to `true`.
///
/// The first run starts immediately. A run that overlaps the next tick
/// delays it instead of queueing extra runs.
pub fn spawn_refresh_task(
    service: DomainService,
    interval: Duration,
    options: CheckOptions,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(interval_secs = interval.as_secs(), "Background verification started");

        loop {
            tokio::select! {
                _ = ticker.tick() => run_once(&service, options).await,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Background verification stopped");
    })
}

async fn run_once(service: &DomainService, options: CheckOptions) {
    match service.refresh_all(options).await {
        Ok(outcomes) if outcomes.is_empty() => {}
        Ok(outcomes) => {
            let verified = outcomes.iter().filter(|o| o.is_verified()).count();
            info!(
                checked = outcomes.len(),
                verified,
                failed = outcomes.len() - verified,
                "Background verification run complete"
            );
        }
        Err(e) => {
            error!(error = %e, "Background verification run failed");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use storeforge_core::{DomainStatus, OwnerId};

    use super::*;
    use crate::config::VerificationConfig;
    use crate::db::MemoryStore;
    use crate::gateway::{ScriptedCheck, ScriptedGateway};

    #[tokio::test]
    async fn test_task_verifies_and_stops_on_shutdown() {
        let store = MemoryStore::new();
        let gateway = ScriptedGateway::new();
        let service = DomainService::new(
            Arc::new(store.clone()),
            Arc::new(gateway.clone()),
            &VerificationConfig::default(),
        );
        let domain = service
            .add_domain(OwnerId::new(1), "shop.example.com")
            .await
            .unwrap();
        gateway.set_check("shop.example.com", ScriptedCheck::Verified);

        let (tx, rx) = watch::channel(false);
        let handle = spawn_refresh_task(
            service.clone(),
            Duration::from_millis(10),
            CheckOptions::default(),
            rx,
        );

        let mut status = DomainStatus::Pending;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            status = service.get_domain(OwnerId::new(1), domain.id).await.unwrap().status;
            if status == DomainStatus::Verified {
                break;
            }
        }
        assert_eq!(status, DomainStatus::Verified);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
