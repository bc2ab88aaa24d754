use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{debug, info};

use tripwire_engine::{
    Activation, DomainId, EngineError, MemoryHost, SharedServices, TickMode, TriggerManager,
    DEFAULT_STATE,
};

use crate::scenario::{Scenario, Step};

/// An activation together with where in the timeline it happened
#[derive(Debug, Clone)]
pub struct ActivationRecord {
    /// 0 for the initial mount, otherwise the 1-based step number
    pub step: usize,
    /// Shared timer seconds at the time of the activation
    pub elapsed: u64,
    pub activation: Activation,
}

#[derive(Debug, Clone, Default)]
pub struct ScenarioReport {
    pub activations: Vec<ActivationRecord>,
    pub steps_run: usize,
}

impl ScenarioReport {
    /// Ids of activated triggers, in order
    pub fn activated_ids(&self) -> Vec<&str> {
        self.activations
            .iter()
            .map(|record| record.activation.trigger_id().as_str())
            .collect()
    }
}

/// Replays a scenario against an in-memory host.
///
/// The shared timer only advances on `tick` steps, so runs are
/// deterministic.
pub struct ScenarioRunner {
    scenario: Scenario,
    host: Arc<MemoryHost>,
    services: SharedServices,
}

impl ScenarioRunner {
    pub fn new(scenario: Scenario) -> Self {
        let host = Arc::new(MemoryHost::with_theme(scenario.theme.clone()));
        let services = SharedServices::with_tick_mode(host.clone(), TickMode::Manual);
        Self {
            scenario,
            host,
            services,
        }
    }

    pub fn host(&self) -> &Arc<MemoryHost> {
        &self.host
    }

    pub async fn run(self) -> Result<ScenarioReport, EngineError> {
        info!("Running {}", self.scenario.display_name());

        let (activation_tx, mut activation_rx) = unbounded_channel();
        let manager = TriggerManager::new(
            DomainId::new(self.scenario.domain.clone()),
            self.host.clone(),
            self.services.clone(),
            &self.scenario.engine,
            self.scenario.triggers.clone(),
            activation_tx,
        );

        let mut report = ScenarioReport::default();
        manager.attach()?;
        let mounted = manager.setup(None).await;
        info!("{} ({} listener(s) mounted)", manager.trigger_count_message(), mounted);
        self.collect(&mut activation_rx, 0, &mut report);

        for (i, step) in self.scenario.steps.iter().enumerate() {
            debug!("Step {}: {}", i + 1, step);
            match step {
                Step::Tick { count } => {
                    for _ in 0..*count {
                        self.services.timer.tick();
                        self.collect(&mut activation_rx, i + 1, &mut report);
                    }
                }
                _ => {
                    self.apply(&manager, step).await;
                    self.collect(&mut activation_rx, i + 1, &mut report);
                }
            }
            report.steps_run += 1;
        }

        manager.detach().await;
        Ok(report)
    }

    async fn apply(&self, manager: &TriggerManager, step: &Step) {
        let host = &self.host;
        match step {
            Step::Select {
                field,
                values,
                state,
            } => {
                let values: Vec<&str> = values.iter().map(String::as_str).collect();
                host.select_in(state.as_deref().unwrap_or(DEFAULT_STATE), field, &values);
            }
            Step::ClearField { field, state } => {
                host.clear_field_in(state.as_deref().unwrap_or(DEFAULT_STATE), field);
            }
            Step::ClearAll { state } => {
                host.clear_all(state.as_deref().unwrap_or(DEFAULT_STATE));
            }
            Step::SetVariable { name, value } => host.set_variable(name, value),
            Step::SetTheme { theme } => host.set_theme(theme),
            Step::SetExpression { trigger, value } => host.set_expression(trigger, value),
            Step::SetActiveState { state } => {
                manager.set_active_state(state.clone()).await;
            }
            // Ticks are advanced one at a time by `run`
            Step::Tick { .. } => {}
            Step::SetEditing { editing } => manager.set_editing(*editing),
            Step::UpdateTriggers { triggers } => {
                let changes = manager.update_triggers(triggers.clone()).await;
                debug!(
                    "Trigger update removed {:?}, added {:?}",
                    changes.to_remove, changes.to_add
                );
            }
            Step::Reset => {
                manager.reset().await;
            }
        }
    }

    fn collect(
        &self,
        rx: &mut UnboundedReceiver<Activation>,
        step: usize,
        report: &mut ScenarioReport,
    ) {
        let elapsed = self.services.timer.elapsed();
        while let Ok(activation) = rx.try_recv() {
            report.activations.push(ActivationRecord {
                step,
                elapsed,
                activation,
            });
        }
    }
}

/// Run a scenario in one go
pub async fn run_scenario(scenario: Scenario) -> Result<ScenarioReport, EngineError> {
    ScenarioRunner::new(scenario).run().await
}
