//! Background expiry of admissions

use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::controller::AdmissionController;

/// Run [`AdmissionController::sweep`] every `sweep_interval` until the task is aborted
pub fn spawn_sweeper<C>(controller: Arc<AdmissionController<C>>) -> JoinHandle<()>
where
    C: Clock + 'static,
{
    let period = controller.config().sweep_interval;
    info!("Starting admission sweeper every {:?}", period);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let report = controller.sweep();
            debug!(
                expired = report.expired,
                evicted = report.evicted,
                tracked = controller.tracked_identities(),
                "admission sweep tick"
            );
        }
    })
}
