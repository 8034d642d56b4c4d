//! Chunked batch lifecycle
//!
//! Large create/destroy requests are split into fixed-size chunks, one batch
//! call per chunk, because the simulator faults when a single call carries too
//! many commands. Outcomes are concatenated in request order.

use contracts::{ActorId, BatchCommand, CommandError, CommandOutcome, PedestrianUnit};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::client::CarlaClient;
use crate::error::{ActorFactoryError, Result};

/// Pedestrian spawn result plus the speed its controller will be given
#[derive(Debug, Clone)]
pub struct WalkerSpawn {
    pub outcome: CommandOutcome,
    pub max_speed: f32,
}

/// Result of pairing pedestrians with controllers
#[derive(Debug, Clone, Default)]
pub struct PairingOutcome {
    /// Complete pairs, in pedestrian order
    pub units: Vec<PedestrianUnit>,
    /// Every pedestrian that spawned, paired or not
    pub walkers: Vec<ActorId>,
    /// Every controller that spawned
    pub controllers: Vec<ActorId>,
}

impl PairingOutcome {
    /// Pedestrians left without a controller
    pub fn unpaired_walkers(&self) -> impl Iterator<Item = ActorId> + '_ {
        self.walkers
            .iter()
            .copied()
            .filter(|w| !self.units.iter().any(|u| u.walker == *w))
    }
}

/// Chunked create/destroy against the batch command API
pub struct BatchLifecycleManager<C> {
    client: C,
    chunk_size: usize,
}

impl<C: CarlaClient> BatchLifecycleManager<C> {
    /// A zero chunk size is treated as 1
    pub fn new(client: C, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Apply spawn commands, one batch call per chunk
    ///
    /// # Errors
    /// A failed batch call aborts the whole operation; chunks already applied
    /// stay applied and their outcomes travel in the error.
    #[instrument(name = "fleet_create_many", skip(self, commands), fields(count = commands.len(), chunk_size = self.chunk_size))]
    pub async fn create_many(&self, commands: &[BatchCommand]) -> Result<Vec<CommandOutcome>> {
        let outcomes = self.apply_chunked(commands).await?;
        let failed = outcomes.iter().filter(|o| o.is_err()).count();
        counter!("carla_capture_actors_spawned_total").increment((outcomes.len() - failed) as u64);
        if failed > 0 {
            counter!("carla_capture_actor_spawn_failures_total").increment(failed as u64);
            debug!(failed, "some spawn commands failed");
        }
        Ok(outcomes)
    }

    /// Destroy actors, one batch call per chunk
    #[instrument(name = "fleet_destroy_many", skip(self, ids), fields(count = ids.len(), chunk_size = self.chunk_size))]
    pub async fn destroy_many(&self, ids: &[ActorId]) -> Result<Vec<CommandOutcome>> {
        let commands: Vec<_> = ids.iter().map(|id| BatchCommand::DestroyActor(*id)).collect();
        let outcomes = self.apply_chunked(&commands).await?;
        for (id, outcome) in ids.iter().zip(&outcomes) {
            if let Err(e) = outcome {
                warn!(actor_id = id, error = %e, "destroy command failed");
            }
        }
        Ok(outcomes)
    }

    /// Spawn one controller per successfully spawned pedestrian and keep only
    /// complete pairs
    ///
    /// `controller_for` builds the spawn command for a pedestrian id.
    #[instrument(name = "fleet_pair_walkers", skip_all, fields(walkers = walkers.len()))]
    pub async fn pair_walkers_with_controllers<F>(
        &self,
        walkers: &[WalkerSpawn],
        mut controller_for: F,
    ) -> Result<PairingOutcome>
    where
        F: FnMut(ActorId) -> BatchCommand,
    {
        let spawned: Vec<(ActorId, f32)> = walkers
            .iter()
            .filter_map(|w| w.outcome.as_ref().ok().map(|id| (*id, w.max_speed)))
            .collect();

        let commands: Vec<_> = spawned.iter().map(|(id, _)| controller_for(*id)).collect();
        let outcomes = self.apply_chunked(&commands).await?;

        let mut pairing = PairingOutcome {
            walkers: spawned.iter().map(|(id, _)| *id).collect(),
            ..Default::default()
        };
        for ((walker, max_speed), outcome) in spawned.into_iter().zip(outcomes) {
            match outcome {
                Ok(controller) => {
                    pairing.controllers.push(controller);
                    pairing.units.push(PedestrianUnit {
                        walker,
                        controller,
                        max_speed,
                    });
                }
                Err(e) => {
                    warn!(walker, error = %e, "controller spawn failed, pedestrian left unpaired");
                }
            }
        }
        Ok(pairing)
    }

    async fn apply_chunked(&self, commands: &[BatchCommand]) -> Result<Vec<CommandOutcome>> {
        let mut outcomes = Vec::with_capacity(commands.len());

        for (chunk_index, chunk) in commands.chunks(self.chunk_size).enumerate() {
            counter!("carla_capture_batch_calls_total").increment(1);
            let chunk_outcomes = match self.client.apply_batch(chunk).await {
                Ok(chunk_outcomes) => chunk_outcomes,
                Err(e) => {
                    counter!("carla_capture_batch_failures_total").increment(1);
                    return Err(ActorFactoryError::BatchFailed {
                        chunk: chunk_index,
                        size: chunk.len(),
                        message: e.to_string(),
                        applied: outcomes,
                    });
                }
            };

            if chunk_outcomes.len() != chunk.len() {
                let message = format!(
                    "response has {} items for {} commands",
                    chunk_outcomes.len(),
                    chunk.len()
                );
                // Ids in a malformed response cannot be correlated but still exist
                outcomes.extend(chunk_outcomes.into_iter().filter(|o| o.is_ok()));
                return Err(ActorFactoryError::BatchFailed {
                    chunk: chunk_index,
                    size: chunk.len(),
                    message,
                    applied: outcomes,
                });
            }
            outcomes.extend(chunk_outcomes);
        }

        Ok(outcomes)
    }
}

/// Ids of the successful outcomes, order preserved
pub fn succeeded(outcomes: &[CommandOutcome]) -> Vec<ActorId> {
    outcomes.iter().filter_map(|o| o.as_ref().ok().copied()).collect()
}

/// Errors of the failed outcomes with their request index
pub fn failures(outcomes: &[CommandOutcome]) -> Vec<(usize, &CommandError)> {
    outcomes
        .iter()
        .enumerate()
        .filter_map(|(i, o)| o.as_ref().err().map(|e| (i, e)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock_client::{MockCarlaClient, MockConfig};
    use contracts::Transform;

    fn spawn(blueprint: &str) -> BatchCommand {
        BatchCommand::spawn(blueprint, Transform::default())
    }

    #[tokio::test]
    async fn test_chunking_call_count_and_order() {
        let client = MockCarlaClient::connected(MockConfig {
            max_batch_size: Some(4),
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 4);

        let commands: Vec<_> = (0..10).map(|_| spawn("vehicle.audi.a2")).collect();
        let outcomes = manager.create_many(&commands).await.unwrap();

        assert_eq!(outcomes.len(), 10);
        assert_eq!(client.batch_call_count(), 3);
        let ids = succeeded(&outcomes);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_per_item_failure_keeps_position() {
        let client = MockCarlaClient::connected(MockConfig {
            fail_blueprints: vec!["vehicle.citroen.c3".into()],
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client, 2);
        let commands = vec![
            spawn("vehicle.audi.a2"),
            spawn("vehicle.audi.a2"),
            spawn("vehicle.citroen.c3"),
            spawn("vehicle.audi.a2"),
        ];
        let outcomes = manager.create_many(&commands).await.unwrap();

        let failed = failures(&outcomes);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, 2);
        assert_eq!(succeeded(&outcomes).len(), 3);
    }

    #[tokio::test]
    async fn test_transport_failure_aborts() {
        let client = MockCarlaClient::connected(MockConfig {
            max_batch_size: Some(3),
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 5);
        let commands: Vec<_> = (0..5).map(|_| spawn("vehicle.audi.a2")).collect();

        let err = manager.create_many(&commands).await.unwrap_err();
        assert!(matches!(err, ActorFactoryError::BatchFailed { chunk: 0, size: 5, .. }));
        assert_eq!(client.batch_call_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_chunk_reports_applied_outcomes() {
        let client = MockCarlaClient::connected(MockConfig {
            fail_batch_calls: vec![2],
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 3);
        let commands: Vec<_> = (0..7).map(|_| spawn("vehicle.audi.a2")).collect();

        let err = manager.create_many(&commands).await.unwrap_err();
        assert!(matches!(err, ActorFactoryError::BatchFailed { chunk: 1, size: 3, .. }));
        assert_eq!(succeeded(err.applied_outcomes()), vec![1000, 1001, 1002]);
        assert_eq!(client.actor_count(), 3);
        assert_eq!(client.batch_call_count(), 2);
    }

    #[tokio::test]
    async fn test_destroy_many_reports_missing() {
        let client = MockCarlaClient::connected(MockConfig::default());
        let manager = BatchLifecycleManager::new(client.clone(), 9);
        let created = manager
            .create_many(&[spawn("vehicle.audi.a2"), spawn("vehicle.audi.a2")])
            .await
            .unwrap();
        let mut ids = succeeded(&created);
        ids.push(99_999);

        let outcomes = manager.destroy_many(&ids).await.unwrap();
        assert!(outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        assert!(outcomes[2].is_err());
        assert_eq!(client.actor_count(), 0);
    }

    #[tokio::test]
    async fn test_pairing_drops_failed_controller() {
        let client = MockCarlaClient::connected(MockConfig {
            // First actor id allocated is 1000, the second walker is 1001
            fail_parents: vec![1001],
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client, 2);

        let walker_outcomes = manager
            .create_many(&[
                spawn("walker.pedestrian.0001"),
                spawn("walker.pedestrian.0002"),
                spawn("walker.pedestrian.0003"),
            ])
            .await
            .unwrap();
        let walkers: Vec<_> = walker_outcomes
            .into_iter()
            .map(|outcome| WalkerSpawn {
                outcome,
                max_speed: 1.4,
            })
            .collect();

        let pairing = manager
            .pair_walkers_with_controllers(&walkers, |walker| {
                spawn("controller.ai.walker").attached_to(walker)
            })
            .await
            .unwrap();

        assert_eq!(pairing.walkers, vec![1000, 1001, 1002]);
        assert_eq!(pairing.units.len(), 2);
        assert!(pairing.units.iter().all(|u| u.walker != 1001));
        assert_eq!(pairing.controllers.len(), 2);
        assert_eq!(pairing.unpaired_walkers().collect::<Vec<_>>(), vec![1001]);
    }

    #[tokio::test]
    async fn test_failed_walkers_are_skipped() {
        let client = MockCarlaClient::connected(MockConfig::default());
        let manager = BatchLifecycleManager::new(client.clone(), 4);
        let walkers = vec![
            WalkerSpawn {
                outcome: Err(CommandError::new("collision")),
                max_speed: 1.4,
            },
            WalkerSpawn {
                outcome: Ok(1234),
                max_speed: 3.0,
            },
        ];
        // 1234 does not exist in the mock, so its controller fails too
        let pairing = manager
            .pair_walkers_with_controllers(&walkers, |walker| {
                spawn("controller.ai.walker").attached_to(walker)
            })
            .await
            .unwrap();
        assert_eq!(client.batch_call_count(), 1);
        assert!(pairing.units.is_empty());
        assert_eq!(pairing.walkers, vec![1234]);
    }
}
