//! The sensing loop: one reading per interval, fanned out to both agents

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rfl_rl::Comparison;

use crate::config::Config;
use crate::report::{comparison_table, RunReport, StopReason};
use crate::spectrum::{self, SpectrumSource};

pub struct Runner {
    config: Config,
    comparison: Comparison,
    source: Box<dyn SpectrumSource>,
    run_id: Uuid,
}

impl Runner {
    /// Build agents and the spectrum source from configuration
    pub fn new(config: Config) -> Result<Self> {
        let source = spectrum::from_config(&config)?;
        Self::with_source(config, source)
    }

    pub fn with_source(config: Config, source: Box<dyn SpectrumSource>) -> Result<Self> {
        config.validate()?;
        if source.num_channels() != config.agent.num_channels {
            bail!(
                "{} source produces {} channels, agents expect {}",
                source.name(),
                source.num_channels(),
                config.agent.num_channels
            );
        }

        let mut comparison = Comparison::with_config(config.agent.clone(), config.run.seed)
            .context("Failed to create agents")?;

        if config.run.load_snapshot {
            comparison
                .learner_mut()
                .load_snapshot(&config.run.snapshot_path);
        }

        Ok(Self {
            config,
            comparison,
            source,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn comparison(&self) -> &Comparison {
        &self.comparison
    }

    fn limit_reached(&self, started: Instant) -> Option<StopReason> {
        let run = &self.config.run;
        if run.max_episodes > 0 && self.comparison.episodes() >= run.max_episodes {
            info!("Reached maximum episodes: {}", run.max_episodes);
            return Some(StopReason::EpisodeLimit);
        }
        if run.max_duration_seconds > 0
            && started.elapsed() >= Duration::from_secs(run.max_duration_seconds)
        {
            info!("Reached maximum time: {}s", run.max_duration_seconds);
            return Some(StopReason::TimeLimit);
        }
        None
    }

    /// Step until a limit is hit or `shutdown` resolves, then wrap up.
    ///
    /// Wrap-up (snapshot, final table, report) runs on every exit path,
    /// including a failed step.
    pub async fn run<F>(mut self, shutdown: F) -> Result<RunReport>
    where
        F: Future<Output = ()>,
    {
        let started_at = Utc::now();
        let started = Instant::now();
        info!(
            "Starting run {} ({} source, max episodes {}, max time {}s)",
            self.run_id,
            self.source.name(),
            self.config.run.max_episodes,
            self.config.run.max_duration_seconds
        );
        let learner = self.comparison.learner();
        info!("{} params: {}", learner.name(), learner.policy().params());

        tokio::pin!(shutdown);
        let outcome = self.drive(shutdown, started).await;

        let stop_reason = outcome.as_ref().map_or(StopReason::Failed, |reason| *reason);
        let report = self.finish(started_at, started, stop_reason);
        outcome?;
        report
    }

    async fn drive<F>(&mut self, mut shutdown: Pin<&mut F>, started: Instant) -> Result<StopReason>
    where
        F: Future<Output = ()>,
    {
        let interval = Duration::from_millis(self.config.run.sensing_interval_ms);
        let report_interval = self.config.run.report_interval;

        loop {
            if let Some(reason) = self.limit_reached(started) {
                return Ok(reason);
            }

            let reading = self.source.next_reading()?;
            let step = self.comparison.step(&reading)?;
            debug!("Episode {} state {}", step.episode, step.state);

            if report_interval > 0 && step.episode % report_interval == 0 {
                println!("\n{}", comparison_table(&self.comparison, started.elapsed()));
            }

            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested, stopping...");
                    return Ok(StopReason::Shutdown);
                }
                () = tokio::time::sleep(interval) => {}
            }
        }
    }

    fn finish(
        &self,
        started_at: DateTime<Utc>,
        started: Instant,
        stop_reason: StopReason,
    ) -> Result<RunReport> {
        let run = &self.config.run;

        if run.save_snapshot {
            if let Err(e) = self
                .comparison
                .learner()
                .save_snapshot(&run.snapshot_path)
            {
                warn!("Failed to save snapshot to {:?}: {}", run.snapshot_path, e);
            }
        }

        println!("\n{}", comparison_table(&self.comparison, started.elapsed()));

        let report = RunReport::new(
            self.run_id,
            started_at,
            stop_reason,
            &self.config,
            &self.comparison,
        );
        if let Some(path) = &run.report_path {
            report.write(path)?;
            info!("Run report written to {}", path.display());
        }

        info!(
            "Run {} finished after {} episodes",
            self.run_id,
            self.comparison.episodes()
        );
        Ok(report)
    }
}
