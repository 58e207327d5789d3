use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};
use transat::engine::progress::{CancellationFlag, Progress, ProgressCallback};

const SPINNER_TICK_MS: u64 = 100;
const NULL_DISTRIBUTION: &str = "Null Distribution";
const TRUE_HELIX_PVALUES: &str = "True Helix P-values";
const BP_FEATURES: &str = "Base-pair Features";

/// What one step of a counted task is, given the workflow phase it runs in.
fn step_unit(phase: Option<&str>) -> &'static str {
    match phase {
        Some(NULL_DISTRIBUTION | TRUE_HELIX_PVALUES) => "trials",
        Some(BP_FEATURES) => "rows",
        // Grow-mode likelihood rows and simulated positions.
        _ => "columns",
    }
}

struct BarState {
    bar: ProgressBar,
    phase: Option<&'static str>,
    /// Counted tasks started in the current phase; one per sampled true helix
    /// in the per-true-helix phase.
    tasks_in_phase: usize,
    abandoned: bool,
}

impl BarState {
    fn task_label(&self) -> String {
        match self.phase {
            Some(TRUE_HELIX_PVALUES) => format!("True helix null #{}", self.tasks_in_phase),
            Some(phase) => phase.to_string(),
            None => "Simulation".to_string(),
        }
    }

    fn abandon(&mut self) {
        if !self.abandoned {
            self.abandoned = true;
            self.bar.disable_steady_tick();
            let label = self.phase.unwrap_or("Run");
            self.bar.abandon_with_message(format!("{label}: cancelled"));
        }
    }
}

/// Renders analysis progress on stderr: a spinner per workflow phase and a counted
/// bar for helix-detection rows, Monte Carlo trials and feature rows.
///
/// Once the run's [`CancellationFlag`] is raised the bar is abandoned with a
/// cancellation notice instead of being completed.
#[derive(Clone)]
pub struct CliProgressHandler {
    state: Arc<Mutex<BarState>>,
    cancel: CancellationFlag,
}

impl CliProgressHandler {
    pub fn new(cancel: CancellationFlag) -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr(), cancel)
    }

    /// A handler that draws nowhere.
    pub fn hidden(cancel: CancellationFlag) -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden(), cancel)
    }

    fn with_draw_target(target: ProgressDrawTarget, cancel: CancellationFlag) -> Self {
        let bar = ProgressBar::with_draw_target(None, target).with_style(phase_style());
        Self {
            state: Arc::new(Mutex::new(BarState {
                bar,
                phase: None,
                tasks_in_phase: 0,
                abandoned: false,
            })),
            cancel,
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let state = self.state.clone();
        let cancel = self.cancel.clone();

        Box::new(move |progress: Progress| {
            let Ok(mut state) = state.lock() else {
                warn!("Progress state mutex was poisoned; dropping progress event.");
                return;
            };
            if cancel.is_cancelled() {
                state.abandon();
                return;
            }
            match progress {
                Progress::PhaseStart { name } => {
                    debug!(phase = name, "Phase started.");
                    state.phase = Some(name);
                    state.tasks_in_phase = 0;
                    state.bar.reset();
                    state.bar.unset_length();
                    state.bar.set_style(phase_style());
                    state.bar.set_message(name);
                    state.bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
                }
                Progress::PhaseFinish => {
                    state.bar.disable_steady_tick();
                    let name = state.phase.take().unwrap_or("Phase");
                    state.bar.finish_with_message(format!("{name}: done"));
                }
                Progress::TaskStart { total_steps } => {
                    state.tasks_in_phase += 1;
                    let label = state.task_label();
                    state.bar.disable_steady_tick();
                    state.bar.reset();
                    state.bar.set_length(total_steps);
                    state.bar.set_style(task_style(step_unit(state.phase)));
                    state.bar.set_message(label);
                }
                Progress::TaskIncrement { amount } => state.bar.inc(amount),
                Progress::TaskFinish => {
                    if let Some(length) = state.bar.length() {
                        state.bar.set_position(length);
                    }
                }
                Progress::Message(msg) => state.bar.println(format!("  {msg}")),
            }
        })
    }

    /// Settles the display after the workflow returns: abandoned if the run was
    /// interrupted, cleared otherwise.
    pub fn finish(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if self.cancel.is_cancelled() {
            state.abandon();
        } else if !state.bar.is_finished() {
            state.bar.finish_and_clear();
        }
    }
}

fn phase_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn task_style(unit: &str) -> ProgressStyle {
    let template = format!("{{msg:<24}} [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} ({{eta}})");
    ProgressStyle::with_template(&template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn step_units_follow_the_phase() {
        assert_eq!(step_unit(Some(NULL_DISTRIBUTION)), "trials");
        assert_eq!(step_unit(Some(TRUE_HELIX_PVALUES)), "trials");
        assert_eq!(step_unit(Some(BP_FEATURES)), "rows");
        assert_eq!(step_unit(Some("Helix Detection")), "columns");
        assert_eq!(step_unit(None), "columns");
    }

    #[test]
    fn phases_and_trial_tasks_drive_the_bar() {
        let handler = CliProgressHandler::hidden(CancellationFlag::new());
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: "Helix Detection",
        });
        assert_eq!(handler.state.lock().unwrap().bar.message(), "Helix Detection");
        callback(Progress::PhaseFinish);
        {
            let state = handler.state.lock().unwrap();
            assert!(state.bar.is_finished());
            assert_eq!(state.bar.message(), "Helix Detection: done");
        }

        callback(Progress::PhaseStart {
            name: TRUE_HELIX_PVALUES,
        });
        for _ in 0..2 {
            callback(Progress::TaskStart { total_steps: 50 });
            callback(Progress::TaskIncrement { amount: 20 });
        }
        {
            let state = handler.state.lock().unwrap();
            assert_eq!(state.bar.message(), "True helix null #2");
            assert_eq!(state.bar.length(), Some(50));
            assert_eq!(state.bar.position(), 20);
        }
        callback(Progress::TaskFinish);
        assert_eq!(handler.state.lock().unwrap().bar.position(), 50);
        callback(Progress::PhaseFinish);
        assert_eq!(
            handler.state.lock().unwrap().bar.message(),
            "True Helix P-values: done"
        );
    }

    #[test]
    fn cancellation_abandons_the_bar() {
        let cancel = CancellationFlag::new();
        let handler = CliProgressHandler::hidden(cancel.clone());
        let callback = handler.get_callback();

        callback(Progress::PhaseStart {
            name: NULL_DISTRIBUTION,
        });
        callback(Progress::TaskStart { total_steps: 500 });
        callback(Progress::TaskIncrement { amount: 7 });
        cancel.cancel();
        callback(Progress::TaskIncrement { amount: 1 });
        handler.finish();

        let state = handler.state.lock().unwrap();
        assert!(state.abandoned);
        assert_eq!(state.bar.position(), 7);
        assert_eq!(state.bar.message(), "Null Distribution: cancelled");
    }

    #[test]
    fn finish_clears_an_uninterrupted_run() {
        let handler = CliProgressHandler::hidden(CancellationFlag::new());
        let callback = handler.get_callback();
        callback(Progress::TaskStart { total_steps: 4 });
        assert_eq!(handler.state.lock().unwrap().bar.message(), "Simulation");
        handler.finish();
        let state = handler.state.lock().unwrap();
        assert!(state.bar.is_finished());
        assert!(!state.abandoned);
    }

    #[test]
    fn events_from_worker_threads_are_applied() {
        let handler = CliProgressHandler::hidden(CancellationFlag::new());
        let callback = Arc::new(handler.get_callback());
        callback(Progress::TaskStart { total_steps: 8 });

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let callback = callback.clone();
                thread::spawn(move || {
                    callback(Progress::TaskIncrement { amount: 1 });
                    callback(Progress::TaskIncrement { amount: 1 });
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(handler.state.lock().unwrap().bar.position(), 8);
    }
}
