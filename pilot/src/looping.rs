//! Multi-step control loop for `pilot replay`.

use anyhow::{Context, Result};
use tracing::info;

use crate::io::observations::{InputSink, ObservationSource};
use crate::io::oracle::Oracle;
use crate::step::{Agent, StepOutcome};

/// Reason why `run_loop` stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStop {
    /// The observation source has no more observations.
    SourceExhausted,
    /// The configured step limit was reached.
    MaxSteps,
}

/// Summary of a loop invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub steps_executed: u64,
    pub stop: LoopStop,
}

/// Steps the agent over `source`, pressing each decision into `sink`.
///
/// State is saved every `save_every_steps` steps and once more on exit; save
/// failures are logged and do not stop the loop. Source and sink errors stop
/// it after a final save attempt.
pub fn run_loop<O, S, I, F>(
    agent: &mut Agent<O>,
    source: &mut S,
    sink: &mut I,
    max_steps: Option<u64>,
    mut on_step: F,
) -> Result<LoopOutcome>
where
    O: Oracle,
    S: ObservationSource,
    I: InputSink,
    F: FnMut(&StepOutcome),
{
    let save_every = u64::from(agent.config().save_every_steps.max(1));
    let mut steps_executed = 0u64;
    let result = loop {
        if max_steps.is_some_and(|max| steps_executed >= max) {
            break Ok(LoopStop::MaxSteps);
        }
        let obs = match source.next_observation().context("next observation") {
            Ok(Some(obs)) => obs,
            Ok(None) => break Ok(LoopStop::SourceExhausted),
            Err(err) => break Err(err),
        };

        let outcome = agent.step(&obs);
        steps_executed += 1;
        if let Err(err) = sink.press(outcome.decision.action).context("press action") {
            break Err(err);
        }
        on_step(&outcome);

        if steps_executed % save_every == 0 {
            agent.save_best_effort();
        }
    };

    agent.save_best_effort();
    let stop = result?;
    info!(steps_executed, stop = ?stop, "loop finished");
    Ok(LoopOutcome {
        steps_executed,
        stop,
    })
}
