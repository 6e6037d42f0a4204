use crate::config::SimConfig;
use crate::driver::stats::{Outcome, RunReport};
use crate::event::{Effect, EventRunner};
use crate::model::{IdAllocator, Store, StoreId};
use crate::pd::{ControlPlaneClient, ControlPlaneError, RpcControlPlaneClient};
use crate::raft_engine::{EngineError, EngineOptions, RaftEngine};
use crate::scenarios::{self, Scenario};
use crate::server::EmbeddedControlPlane;
use crate::store_node::{self, StoreNode, TaskCounts};
use std::collections::BTreeMap;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const EMBEDDED_CLUSTER_ID: u64 = 6_000_001;
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("Unknown case {0:?}")]
    UnknownCase(String),
    #[error("Failed to start embedded control plane: {0}")]
    Serve(#[from] io::Error),
    #[error("Failed to connect to control plane: {0}")]
    Connect(#[source] ControlPlaneError),
    #[error("Failed to bootstrap cluster: {0}")]
    Bootstrap(#[source] ControlPlaneError),
    #[error("Case has no region covering the start of the key space")]
    NoFirstRegion,
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Driver runs cases one at a time. It owns logical time: every tick applies events, steps the
/// engine, ticks the store nodes and evaluates the case's checker.
pub struct Driver {
    logger: slog::Logger,
    config: SimConfig,
    control_plane_address: Option<String>,
}

impl Driver {
    /// With `control_plane_address` None every run starts its own embedded control plane.
    pub fn new(logger: slog::Logger, config: SimConfig, control_plane_address: Option<String>) -> Self {
        Driver {
            logger,
            config,
            control_plane_address,
        }
    }

    pub async fn run(&self, case: &str, cancel: CancellationToken) -> Result<RunReport, DriverError> {
        let scenario =
            scenarios::load(case, &self.config).ok_or_else(|| DriverError::UnknownCase(case.to_string()))?;
        let logger = self.logger.new(slog::o!("case" => case.to_string()));
        slog::info!(
            logger,
            "Starting with {} stores, {} regions and {} events",
            scenario.stores.len(),
            scenario.regions.len(),
            scenario.events.len()
        );

        let mut run = self.start(logger, scenario, cancel.child_token()).await?;
        let started = Instant::now();
        let outcome = run.tick_until_done(&cancel).await;
        let elapsed = started.elapsed();

        Ok(run.finish(outcome, elapsed).await)
    }

    async fn start(
        &self,
        logger: slog::Logger,
        mut scenario: Scenario,
        workers_cancel: CancellationToken,
    ) -> Result<Run, DriverError> {
        let ids = Arc::new(IdAllocator::new(max_seeded_id(&scenario), self.config.id_budget));
        let engine = Arc::new(RaftEngine::new(
            logger.clone(),
            ids.clone(),
            scenario.stores.clone(),
            scenario.regions.clone(),
            EngineOptions {
                need_split: scenario.need_split.clone(),
                merge_policy: scenario.merge_policy,
            },
        )?);

        let (client, embedded) = self.connect(&logger, &scenario).await?;

        // Bootstrap with the first store and the region starting the key space, then register the
        // rest. The control plane must never hand out an id this process may still allocate.
        let first_region = engine.search_region(b"").ok_or(DriverError::NoFirstRegion)?;
        let mut stores = scenario.stores.iter();
        if let Some(first_store) = stores.next() {
            client
                .bootstrap(first_store, &first_region, ids.limit() + 1)
                .await
                .map_err(DriverError::Bootstrap)?;
        }
        for store in stores {
            client.put_store(store).await.map_err(DriverError::Bootstrap)?;
        }
        slog::info!(logger, "Cluster bootstrapped, id floor {}", ids.limit() + 1);

        let events = std::mem::take(&mut scenario.events);
        let mut run = Run {
            events: EventRunner::new(
                logger.clone(),
                events,
                self.config.seed,
                self.config.store_capacity_bytes(),
            ),
            logger,
            config: self.config.clone(),
            scenario,
            engine,
            client,
            embedded,
            nodes: BTreeMap::new(),
            workers_cancel,
            finished_counts: BTreeMap::new(),
            ticks: 0,
        };
        for store in run.engine.get_stores() {
            if store.is_up() {
                run.add_node(store.id());
            }
        }

        Ok(run)
    }

    async fn connect(
        &self,
        logger: &slog::Logger,
        scenario: &Scenario,
    ) -> Result<(Arc<dyn ControlPlaneClient>, Option<EmbeddedControlPlane>), DriverError> {
        let timeout = self.config.rpc_timeout();
        match &self.control_plane_address {
            Some(address) => {
                let client = RpcControlPlaneClient::connect(logger.clone(), address, timeout)
                    .await
                    .map_err(DriverError::Connect)?;
                Ok((Arc::new(client), None))
            }
            None => {
                let mut config = self.config.control_plane.clone();
                config.apply(&scenario.control_plane);
                let embedded = EmbeddedControlPlane::start(logger.clone(), config, EMBEDDED_CLUSTER_ID).await?;
                let client = RpcControlPlaneClient::connect(logger.clone(), &embedded.address().to_string(), timeout)
                    .await
                    .map_err(DriverError::Connect)?;
                Ok((Arc::new(client), Some(embedded)))
            }
        }
    }
}

struct NodeHandle {
    node: StoreNode,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

/// State of one case while it runs.
struct Run {
    logger: slog::Logger,
    config: SimConfig,
    scenario: Scenario,
    engine: Arc<RaftEngine>,
    events: EventRunner,
    client: Arc<dyn ControlPlaneClient>,
    embedded: Option<EmbeddedControlPlane>,
    nodes: BTreeMap<StoreId, NodeHandle>,
    workers_cancel: CancellationToken,
    // Task counts of nodes that were already stopped.
    finished_counts: BTreeMap<&'static str, TaskCounts>,
    ticks: u64,
}

impl Run {
    async fn tick_until_done(&mut self, cancel: &CancellationToken) -> Outcome {
        let interval = tick_interval(&self.config, self.embedded.is_some());
        let max_ticks = self.config.max_ticks;

        loop {
            if cancel.is_cancelled() {
                return Outcome::Cancelled;
            }
            if let Some(max) = max_ticks {
                if self.ticks >= max {
                    slog::warn!(self.logger, "Reached tick limit {}", max);
                    return Outcome::TickLimit;
                }
            }

            self.ticks += 1;
            self.tick().await;

            let scenario = &self.scenario;
            let engine = self.engine.as_ref();
            match panic::catch_unwind(AssertUnwindSafe(|| scenario.check(engine))) {
                Ok(true) => {
                    slog::info!(self.logger, "Checker passed at tick {}", self.ticks);
                    return Outcome::Converged;
                }
                Ok(false) => {}
                Err(_) => {
                    slog::error!(self.logger, "Checker panicked at tick {}", self.ticks);
                    return Outcome::CheckerPanicked;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Outcome::Cancelled,
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }

    async fn tick(&mut self) {
        self.engine.reset_written_bytes();

        for effect in self.events.step(self.ticks, &self.engine) {
            match effect {
                Effect::StoreAdded(store_id) => {
                    self.add_node(store_id);
                    self.report_store(store_id).await;
                }
                Effect::StoreKilled(store_id) => {
                    self.stop_node(store_id).await;
                    self.report_store(store_id).await;
                }
            }
        }

        self.engine.step_regions();

        for handle in self.nodes.values_mut() {
            handle.node.tick();
        }
    }

    fn add_node(&mut self, store_id: StoreId) {
        let (node, worker) = store_node::create(self.logger.clone(), store_id, self.engine.clone(), &self.config);
        let cancel = self.workers_cancel.child_token();
        let worker = tokio::spawn(worker.run(self.client.clone(), cancel.clone()));
        self.nodes.insert(store_id, NodeHandle { node, cancel, worker });
    }

    async fn stop_node(&mut self, store_id: StoreId) {
        if let Some(handle) = self.nodes.remove(&store_id) {
            merge_counts(&mut self.finished_counts, handle.node.task_counts());
            handle.cancel.cancel();
            drop(handle.node);
            if handle.worker.await.is_err() {
                slog::warn!(self.logger, "Heartbeat worker of {:?} did not exit cleanly", store_id);
            }
        }
    }

    async fn report_store(&self, store_id: StoreId) {
        let store: Store = match self.engine.get_store(store_id) {
            Some(store) => store,
            None => return,
        };
        if let Err(e) = self.client.put_store(&store).await {
            slog::warn!(self.logger, "Failed to report {:?} as {:?}: {}", store_id, store.status(), e);
        }
    }

    async fn finish(mut self, outcome: Outcome, elapsed: Duration) -> RunReport {
        let mut task_counts = std::mem::take(&mut self.finished_counts);
        for handle in self.nodes.values() {
            merge_counts(&mut task_counts, handle.node.task_counts());
        }

        let control_plane = match &self.embedded {
            Some(embedded) => match embedded.summary().await {
                Ok(summary) => Some(summary),
                Err(e) => {
                    slog::warn!(self.logger, "Failed to read control plane summary: {}", e);
                    None
                }
            },
            None => None,
        };

        let report = RunReport {
            case: self.scenario.name.clone(),
            outcome,
            ticks: self.ticks,
            elapsed,
            task_counts,
            stores: RunReport::store_reports(&self.engine),
            counters: self.engine.counters(),
            control_plane,
        };

        self.workers_cancel.cancel();
        let workers: Vec<JoinHandle<()>> = std::mem::take(&mut self.nodes)
            .into_iter()
            .map(|(_, handle)| handle.worker)
            .collect();
        for worker in workers {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, worker).await.is_err() {
                slog::warn!(self.logger, "Heartbeat worker did not stop within {:?}", SHUTDOWN_TIMEOUT);
            }
        }
        if let Some(embedded) = self.embedded.take() {
            if tokio::time::timeout(SHUTDOWN_TIMEOUT, embedded.shutdown()).await.is_err() {
                slog::warn!(self.logger, "Embedded control plane did not stop within {:?}", SHUTDOWN_TIMEOUT);
            }
        }

        slog::info!(self.logger, "Finished after {} ticks: {:?}", report.ticks, report.outcome);
        report
    }
}

/// Wall clock pacing of the tick loop. An external control plane is paced at simulated time.
fn tick_interval(config: &SimConfig, embedded: bool) -> Duration {
    if embedded {
        config.sim_tick_interval()
    } else {
        config.norm_tick_interval()
    }
}

fn merge_counts(into: &mut BTreeMap<&'static str, TaskCounts>, from: &BTreeMap<&'static str, TaskCounts>) {
    for (kind, counts) in from {
        into.entry(*kind).or_default().merge(counts);
    }
}

fn max_seeded_id(scenario: &Scenario) -> u64 {
    let stores = scenario.stores.iter().map(|s| s.id().as_u64());
    let regions = scenario
        .regions
        .iter()
        .flat_map(|r| std::iter::once(r.id().as_u64()).chain(r.peers().iter().map(|p| p.id().as_u64())));
    stores.chain(regions).max().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaseOverrides;

    fn test_logger() -> slog::Logger {
        slog::Logger::root(slog::Discard, slog::o!())
    }

    fn fast_config() -> SimConfig {
        SimConfig {
            sim_tick_interval_ms: 1,
            store_heartbeat_interval_ticks: 1,
            region_heartbeat_interval_ticks: 1,
            max_ticks: Some(500),
            ..SimConfig::default()
        }
    }

    #[test]
    fn seeded_ids_cover_every_object() {
        let scenario = scenarios::load("balance-leader", &SimConfig::default()).unwrap();

        let max_id = max_seeded_id(&scenario);

        // 4 stores, 40 regions, 3 peers each.
        assert_eq!(4 + 40 + 120, max_id);
    }

    #[test]
    fn tick_interval_follows_control_plane_kind() {
        let config = SimConfig {
            sim_tick_interval_ms: 20,
            norm_tick_interval_ms: 1000,
            ..SimConfig::default()
        };

        assert_eq!(Duration::from_millis(20), tick_interval(&config, true));
        assert_eq!(Duration::from_millis(1000), tick_interval(&config, false));
    }

    #[tokio::test]
    async fn unknown_case_is_an_error() {
        let driver = Driver::new(test_logger(), SimConfig::default(), None);

        let result = driver.run("no-such-case", CancellationToken::new()).await;

        assert!(matches!(result, Err(DriverError::UnknownCase(_))));
    }

    #[tokio::test]
    async fn cancelled_run_fails() {
        // -- setup --
        let driver = Driver::new(test_logger(), fast_config(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        // -- execute --
        let report = driver.run("balance-leader", cancel).await.unwrap();

        // -- verify --
        assert_eq!(Outcome::Cancelled, report.outcome);
        assert_eq!(0, report.ticks);
        assert!(!report.passed());
    }

    #[tokio::test]
    async fn unreachable_replica_count_hits_tick_limit() {
        // -- setup --
        let mut config = fast_config();
        config.max_ticks = Some(20);
        config.cases.insert(
            "balance-region-small".to_string(),
            CaseOverrides {
                store_count: Some(1),
                region_count: Some(4),
                replicas: Some(3),
                ..CaseOverrides::default()
            },
        );
        let driver = Driver::new(test_logger(), config, None);

        // -- execute --
        let report = driver.run("balance-region-small", CancellationToken::new()).await.unwrap();

        // -- verify --
        assert_eq!(Outcome::TickLimit, report.outcome);
        assert_eq!(20, report.ticks);
        assert_eq!(1, report.stores.len());
    }
}
