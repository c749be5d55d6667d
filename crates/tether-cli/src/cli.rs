//! Command handlers bridging parsed arguments to the engine.
//!
//! `Cli` owns one [`Engine`] and one [`TerminalRenderer`] and turns each
//! subcommand into an engine call plus a rendered report. The hook entry
//! point lives here too, as a free function, because it must work (and
//! exit 0) even when the engine itself cannot be built.

use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use jiff::Timestamp;
use log::warn;
use serde_json::json;
use tether_core::{
    params::{
        Checkpoint, CreateFeature, HookInput, Id, ListFeatures, SessionsQuery, StatusQuery,
        SyncPlan,
    },
    sessions::GrouperConfig,
    Engine, EngineBuilder, SeenEvents, SessionGroupList, SessionGrouper,
};

use crate::args::{PlanArgs, SessionsArgs};
use crate::renderer::TerminalRenderer;

/// Handles CLI command execution with rendered output.
pub struct Cli {
    engine: Engine,
    renderer: TerminalRenderer,
}

impl Cli {
    pub fn new(engine: Engine, renderer: TerminalRenderer) -> Self {
        Self { engine, renderer }
    }

    /// Show the active feature, progress counts, and current step.
    pub async fn status(&self, params: &StatusQuery) -> Result<()> {
        let report = self.engine.status(params).await?;
        self.renderer.render(&report.to_string())
    }

    /// Show the active feature's plan, optionally re-declaring it first.
    pub async fn plan(&self, args: PlanArgs) -> Result<()> {
        if !args.declare.is_empty() {
            let progress = self
                .engine
                .sync_plan(&SyncPlan {
                    feature_id: None,
                    project: args.project,
                    steps: args.declare.into_iter().map(Into::into).collect(),
                })
                .await?;
            return self.renderer.render(&progress.to_string());
        }

        let query = StatusQuery {
            project: args.project,
        };
        match self.engine.plan(&query).await? {
            Some(progress) => self.renderer.render(&progress.to_string()),
            None => self
                .renderer
                .render("No active feature. Declare one with `tether feature add`.\n"),
        }
    }

    /// Record a checkpoint report and show what it changed.
    pub async fn checkpoint(&self, params: &Checkpoint) -> Result<()> {
        let outcome = self.engine.checkpoint(params).await?;
        self.renderer.render(&outcome.to_string())
    }

    /// Declare a new feature.
    pub async fn add_feature(&self, params: &CreateFeature) -> Result<()> {
        let feature = self.engine.create_feature(params).await?;
        let marker = if params.activate { " (active)" } else { "" };
        self.renderer.render(&format!(
            "Declared feature #{}: {}{marker}\n",
            feature.id, feature.description
        ))
    }

    /// List the project's features.
    pub async fn list_features(&self, params: &ListFeatures) -> Result<()> {
        let list = self.engine.list_features(params).await?;
        self.renderer.render(&list.to_string())
    }

    /// Make a feature the project's active one.
    pub async fn activate_feature(&self, params: &Id) -> Result<()> {
        let feature = self.engine.activate_feature(params).await?;
        self.renderer.render(&format!(
            "Activated feature #{}: {}\n",
            feature.id, feature.description
        ))
    }

    /// Mark a feature complete.
    pub async fn complete_feature(&self, params: &Id) -> Result<()> {
        let feature = self.engine.complete_feature(params).await?;
        self.renderer.render(&format!(
            "Completed feature #{}: {}\n",
            feature.id, feature.description
        ))
    }

    /// Show grouped session activity, once or as a polled watch view.
    pub async fn sessions(&self, args: &SessionsArgs) -> Result<()> {
        if args.watch {
            return self.watch_sessions(args).await;
        }
        let groups = self.engine.session_groups(&SessionsQuery::from(args)).await?;
        self.renderer.render(&groups.to_string())
    }

    /// Poll the store and refresh the session view as events arrive.
    ///
    /// Events are deduplicated and folded incrementally, so each tick only
    /// pays for what changed since the last one. Ctrl-C ends the loop.
    async fn watch_sessions(&self, args: &SessionsArgs) -> Result<()> {
        let query = SessionsQuery::from(args);
        let grouper_config = GrouperConfig::default();
        let mut seen = SeenEvents::default();
        let mut grouper = SessionGrouper::new();
        let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));

        self.renderer
            .render("Watching sessions; press Ctrl-C to stop.\n")?;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                _ = ticker.tick() => {}
            }

            let events = self
                .engine
                .events_for_grouping(query.project.clone(), query.limit)
                .await?;

            let mut changed = false;
            for event in &events {
                if seen.insert(&event.id) {
                    grouper.fold(event);
                    changed = true;
                }
            }

            if changed {
                let now = Timestamp::now();
                let list = SessionGroupList {
                    now,
                    groups: grouper.groups(now, &grouper_config),
                };
                self.renderer.clear();
                self.renderer.render(&list.to_string())?;
            }
        }

        Ok(())
    }
}

/// Hook entry point: observe one payload from stdin.
///
/// This path must never block the calling agent. Unreadable input, an
/// unopenable store, and engine failures all degrade to silence; the only
/// output is an additional-context payload when there are advisories, and
/// the exit code is always 0.
pub async fn run_hook(database_file: Option<PathBuf>) -> Result<()> {
    let input = read_hook_input();
    let event_name = input
        .hook_event_name
        .clone()
        .unwrap_or_else(|| "PostToolUse".to_string());

    let engine = match EngineBuilder::new()
        .with_database_path(database_file)
        .build()
        .await
    {
        Ok(engine) => engine,
        Err(e) => {
            warn!("hook: store unavailable, observation skipped: {e}");
            return Ok(());
        }
    };

    let observation = engine.observe(input).await;
    if !observation.advisories.is_empty() {
        let payload = json!({
            "hookSpecificOutput": {
                "hookEventName": event_name,
                "additionalContext": observation.advisories.join("\n"),
            }
        });
        println!("{payload}");
    }

    Ok(())
}

fn read_hook_input() -> HookInput {
    let mut raw = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut raw) {
        warn!("hook: failed to read stdin: {e}");
        return HookInput::default();
    }
    match serde_json::from_str(&raw) {
        Ok(input) => input,
        Err(e) => {
            warn!("hook: unparseable payload, observing as empty: {e}");
            HookInput::default()
        }
    }
}
