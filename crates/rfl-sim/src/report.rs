//! Run summaries: the periodic console table and the JSON run report

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use rfl_rl::{Agent, Comparison, EpisodeHistory, Statistics};

use crate::config::Config;

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EpisodeLimit,
    TimeLimit,
    Shutdown,
    Failed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EpisodeLimit => write!(f, "episode limit reached"),
            Self::TimeLimit => write!(f, "time limit reached"),
            Self::Shutdown => write!(f, "shutdown requested"),
            Self::Failed => write!(f, "step failed"),
        }
    }
}

/// Final numbers for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub name: String,
    pub statistics: Statistics,
    pub channel_usage: Vec<u64>,
    pub history: EpisodeHistory,
}

impl AgentReport {
    pub fn from_agent(agent: &Agent) -> Self {
        Self {
            name: agent.name().to_string(),
            statistics: agent.statistics(),
            channel_usage: agent.channel_usage(),
            history: agent.history().clone(),
        }
    }
}

/// Everything a plotting tool needs from one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stop_reason: StopReason,
    pub episodes: u64,
    pub config: Config,
    pub learner: AgentReport,
    pub baseline: AgentReport,
}

impl RunReport {
    pub fn new(
        run_id: Uuid,
        started_at: DateTime<Utc>,
        stop_reason: StopReason,
        config: &Config,
        comparison: &Comparison,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stop_reason,
            episodes: comparison.episodes(),
            config: config.clone(),
            learner: AgentReport::from_agent(comparison.learner()),
            baseline: AgentReport::from_agent(comparison.baseline()),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create report {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self).context("Failed to write report")?;
        writer.flush()?;
        Ok(())
    }
}

const WIDTH: usize = 60;

/// Side-by-side statistics of the learner and the baseline
pub fn comparison_table(comparison: &Comparison, runtime: Duration) -> String {
    let learner = comparison.learner().statistics();
    let baseline = comparison.baseline().statistics();
    let rule = "=".repeat(WIDTH);

    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Episode: {}", comparison.episodes());
    let _ = writeln!(out, "Runtime: {:.1}s", runtime.as_secs_f64());
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "{:<20} {:<15} {:<15}", "Metric", "Q-Agent", "Random Agent");
    let _ = writeln!(out, "{}", "-".repeat(WIDTH));
    let _ = writeln!(
        out,
        "{:<20} {:<15.2} {:<15.2}",
        "Total Reward", learner.total_reward, baseline.total_reward
    );
    let _ = writeln!(
        out,
        "{:<20} {:<15.3} {:<15.3}",
        "Collision Rate", learner.collision_rate, baseline.collision_rate
    );
    let _ = writeln!(
        out,
        "{:<20} {:<15.3} {:<15.3}",
        "Success Rate", learner.success_rate, baseline.success_rate
    );
    let _ = writeln!(
        out,
        "{:<20} {:<15.3} {:<15.3}",
        "Defer Rate", learner.defer_rate, baseline.defer_rate
    );
    if let Some(epsilon) = learner.exploration_rate {
        let _ = writeln!(out, "{:<20} {:<15.3} {:<15}", "Q-Agent Epsilon", epsilon, "N/A");
    }
    let _ = write!(out, "{rule}");
    out
}
