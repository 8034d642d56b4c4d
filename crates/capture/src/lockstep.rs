//! Lockstep guard
//!
//! Synchronous mode is a process-wide simulator resource: while it is on, the
//! server blocks waiting for ticks. The guard is the only way to tick, and
//! must be released on every exit path. `release` is the normal path; `Drop`
//! only schedules a best-effort revert for guards leaked by a panic or an
//! early return.

use actor_factory::{CarlaClient, SimulationMode};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;

/// Synchronous-mode guard
pub struct Lockstep<C: CarlaClient + Clone + 'static> {
    client: C,
    fixed_delta_seconds: f64,
    ticks: u64,
    engaged: bool,
}

impl<C: CarlaClient + Clone + 'static> Lockstep<C> {
    /// Switch the simulator to fixed-step synchronous mode
    #[instrument(name = "lockstep_engage", skip(client))]
    pub async fn engage(client: C, fixed_delta_seconds: f64) -> Result<Self> {
        client
            .set_simulation_mode(SimulationMode::Synchronous {
                fixed_delta_seconds,
            })
            .await?;
        info!("synchronous mode engaged");
        Ok(Self {
            client,
            fixed_delta_seconds,
            ticks: 0,
            engaged: true,
        })
    }

    /// Advance exactly one simulation step
    pub async fn tick(&mut self) -> Result<u64> {
        let frame = self.client.tick().await?;
        self.ticks += 1;
        observability::record_tick(frame);
        Ok(frame)
    }

    /// Ticks issued through this guard
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn fixed_delta_seconds(&self) -> f64 {
        self.fixed_delta_seconds
    }

    /// Return the simulator to asynchronous mode
    ///
    /// If the switch fails the guard stays engaged and `Drop` retries once.
    #[instrument(name = "lockstep_release", skip(self), fields(ticks = self.ticks))]
    pub async fn release(mut self) -> Result<()> {
        self.client
            .set_simulation_mode(SimulationMode::Asynchronous)
            .await?;
        self.engaged = false;
        info!("synchronous mode released");
        Ok(())
    }
}

impl<C: CarlaClient + Clone + 'static> Drop for Lockstep<C> {
    fn drop(&mut self) {
        if !self.engaged {
            return;
        }

        warn!("lockstep guard dropped while engaged, reverting to asynchronous mode");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let client = self.client.clone();
                handle.spawn(async move {
                    match client.set_simulation_mode(SimulationMode::Asynchronous).await {
                        Ok(()) => debug!("asynchronous mode restored from drop"),
                        Err(e) => warn!(error = %e, "failed to restore asynchronous mode"),
                    }
                });
            }
            Err(_) => warn!("no runtime available, simulator left in synchronous mode"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actor_factory::{MockCarlaClient, MockConfig};
    use std::time::Duration;

    #[tokio::test]
    async fn test_engage_tick_release() {
        let client = MockCarlaClient::connected(MockConfig::default());
        let mut lockstep = Lockstep::engage(client.clone(), 0.1).await.unwrap();
        assert!(client.simulation_mode().is_synchronous());

        assert_eq!(lockstep.tick().await.unwrap(), 1);
        assert_eq!(lockstep.tick().await.unwrap(), 2);
        assert_eq!(lockstep.ticks(), 2);

        lockstep.release().await.unwrap();
        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
    }

    #[tokio::test]
    async fn test_drop_reverts_mode() {
        let client = MockCarlaClient::connected(MockConfig::default());
        {
            let _lockstep = Lockstep::engage(client.clone(), 0.05).await.unwrap();
            assert!(client.simulation_mode().is_synchronous());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.simulation_mode(), SimulationMode::Asynchronous);
    }

    #[tokio::test]
    async fn test_engage_fails_when_disconnected() {
        let client = MockCarlaClient::new();
        assert!(Lockstep::engage(client, 0.1).await.is_err());
    }
}
