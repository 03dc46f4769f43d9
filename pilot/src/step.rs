//! Orchestration for a single agent step.

use anyhow::Result;
use tracing::{debug, info, instrument, warn};

use crate::core::goal_rules::{BurstFired, GoalContext, run_scripted_burst, update_goal_status};
use crate::core::goals::{CompletionOutcome, GoalTracker};
use crate::core::memory::{AgentMemory, MemoryUpdate};
use crate::core::observation::Observation;
use crate::core::types::Action;
use crate::decision::{Decision, DecisionInputs, EngineState, decide};
use crate::io::config::AgentConfig;
use crate::io::oracle::Oracle;
use crate::io::prompt::PromptEngine;
use crate::io::state_store::{PersistedState, load_state, save_state};
use crate::io::telemetry::{StepRecord, Telemetry};
use crate::perception::{Classification, classify};

/// Result of a single step.
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Step number (1-indexed).
    pub step: u64,
    pub classification: Classification,
    pub memory: MemoryUpdate,
    /// Completion requests made this step, in order.
    pub completions: Vec<CompletionOutcome>,
    pub burst: Option<BurstFired>,
    pub decision: Decision,
    /// Active goal after the decision.
    pub active_goal: Option<String>,
}

/// The perceive → remember → track goals → decide pipeline.
pub struct Agent<O> {
    config: AgentConfig,
    oracle: O,
    prompts: PromptEngine,
    telemetry: Telemetry,
    state: EngineState,
    step: u64,
    last_action: Option<Action>,
}

impl<O: Oracle> Agent<O> {
    /// Builds an agent from persisted state at `config.state_path`.
    pub fn load(config: AgentConfig, oracle: O) -> Result<Self> {
        let (tracker, memory) = load_state(&config.state_path).into_parts();
        Self::with_state(config, oracle, tracker, memory)
    }

    pub fn with_state(
        config: AgentConfig,
        oracle: O,
        tracker: GoalTracker,
        memory: AgentMemory,
    ) -> Result<Self> {
        let telemetry = Telemetry::new(&config.telemetry_path);
        Ok(Self {
            prompts: PromptEngine::new()?,
            telemetry,
            state: EngineState::new(tracker, memory),
            step: 0,
            last_action: None,
            config,
            oracle,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut EngineState {
        &mut self.state
    }

    pub fn steps_taken(&self) -> u64 {
        self.step
    }

    /// Runs one step. Never fails: every error degrades to a safe action.
    #[instrument(skip_all, fields(step = tracing::field::Empty))]
    pub fn step(&mut self, obs: &Observation) -> StepOutcome {
        self.step += 1;
        tracing::Span::current().record("step", self.step);
        let classification = classify(obs, &self.oracle, &self.prompts);
        let scene = &classification.result;

        let memory = self
            .state
            .memory
            .update(obs, self.last_action, &mut self.state.queue);
        if let Some((from, to)) = &memory.location_changed {
            info!(from = ?from, to = %to, cleared = memory.queue_cleared, "location changed");
        }
        if let Some((at, direction)) = memory.movement_failure {
            debug!(at = %at, direction = direction.as_str(), "movement failed");
        }

        let ctx = GoalContext {
            scene,
            location: obs.location(),
            position: obs.position(),
            party_size: obs.party_size(),
        };
        let mut completions = Vec::new();
        if let Some(outcome) = update_goal_status(&mut self.state.tracker, &ctx) {
            log_completion(&outcome);
            completions.push(outcome);
        }
        let burst = run_scripted_burst(
            &mut self.state.tracker,
            &ctx,
            &mut self.state.flags.bursts_fired,
            &mut self.state.queue,
        );
        if let Some(fired) = &burst {
            info!(goal = %fired.goal_id, len = fired.buttons.len(), "scripted burst queued");
            log_completion(&fired.completion);
            completions.push(fired.completion.clone());
        }

        let decision = decide(
            &DecisionInputs {
                obs,
                scene,
                dialogue: &self.config.dialogue,
                navigation: &self.config.navigation,
                oracle: &self.oracle,
                prompts: &self.prompts,
            },
            &mut self.state,
        );
        let active_goal = self.state.tracker.current_id().map(str::to_string);
        debug!(
            scene = %scene.scene_type,
            action = decision.action.as_str(),
            reason = decision.reason.as_str(),
            queued = self.state.queue.len(),
            "decided"
        );

        self.telemetry.record(&StepRecord::new(
            self.step,
            scene,
            obs,
            decision.action.as_str(),
            decision.reason.as_str(),
            active_goal.as_deref(),
        ));
        self.last_action = Some(decision.action);

        StepOutcome {
            step: self.step,
            classification,
            memory,
            completions,
            burst,
            decision,
            active_goal,
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        PersistedState::capture(&self.state.tracker, &self.state.memory)
    }

    /// Persists goals and memory to `config.state_path`.
    pub fn save(&self) -> Result<()> {
        save_state(&self.config.state_path, &self.snapshot())
    }

    /// Like [`Agent::save`], but only logs failures.
    pub fn save_best_effort(&self) {
        if let Err(err) = self.save() {
            warn!(err = %format!("{err:#}"), "failed to save state");
        }
    }
}

fn log_completion(outcome: &CompletionOutcome) {
    match outcome {
        CompletionOutcome::Completed { completed, next } => {
            info!(completed = %completed, next = ?next, "goal completed");
        }
        CompletionOutcome::Rejected { requested, active } => {
            warn!(requested = %requested, active = ?active, "rejected completion of non-active goal");
        }
    }
}
