//! Mapping platform stage data onto the deployment state machine.
//!
//! `Queued → Building → Deploying → {Success | Failure}`. The platform's
//! stage vocabulary is loosely specified, so anything unrecognized lands
//! on `Queued` rather than failing.

use pagedrop_protocol::{Deployment, Stage, StageStatus};
use serde::Serialize;

/// Internal deployment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployState {
    Queued,
    Building,
    Deploying,
    Success,
    Failure,
}

impl DeployState {
    /// Coarse progress indicator derived from the state.
    pub fn progress(self) -> u8 {
        match self {
            Self::Queued => 0,
            Self::Building => 50,
            Self::Deploying => 80,
            Self::Success | Self::Failure => 100,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Normalized snapshot of a deployment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentStatus {
    pub state: DeployState,
    pub progress: u8,
    /// Stage log lines, newest last.
    pub logs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl DeploymentStatus {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

fn state_for_stage_name(name: &str) -> Option<DeployState> {
    match name {
        "queued" | "initialize" => Some(DeployState::Queued),
        "clone_repo" | "build" => Some(DeployState::Building),
        "deploy" => Some(DeployState::Deploying),
        _ => None,
    }
}

/// The stage that describes where the deployment currently is.
///
/// Prefers the platform's own `latest_stage`; otherwise the last stage that
/// has left `idle`.
pub fn current_stage(deployment: &Deployment) -> Option<&Stage> {
    if let Some(stage) = &deployment.latest_stage {
        return Some(stage);
    }
    deployment
        .stages
        .iter()
        .rev()
        .find(|s| has_started(s))
}

pub(crate) fn has_started(stage: &Stage) -> bool {
    !matches!(stage.status, None | Some(StageStatus::Idle))
}

/// Maps a single stage to a state.
///
/// `success` on an earlier known stage keeps that stage's state, since the
/// deployment itself is not finished yet.
pub fn map_stage(stage: Option<&Stage>) -> DeployState {
    let Some(stage) = stage else {
        return DeployState::Queued;
    };
    let by_name = state_for_stage_name(&stage.name);

    match stage.status {
        Some(StageStatus::Failure | StageStatus::Canceled) => DeployState::Failure,
        Some(StageStatus::Success) => match by_name {
            Some(DeployState::Deploying) | None => DeployState::Success,
            Some(state) => state,
        },
        Some(StageStatus::Idle | StageStatus::Active | StageStatus::Skipped) => {
            by_name.unwrap_or(DeployState::Queued)
        }
        Some(StageStatus::Unknown) | None => DeployState::Queued,
    }
}

/// One log line for a stage: `name: status [@ started_on]`.
pub fn stage_log_line(stage: &Stage) -> String {
    let name = if stage.name.is_empty() {
        "unknown"
    } else {
        &stage.name
    };
    let status = stage.status.unwrap_or(StageStatus::Unknown);
    match stage.started_on {
        Some(ts) => format!("{name}: {status} @ {}", ts.to_rfc3339()),
        None => format!("{name}: {status}"),
    }
}

/// Builds a status snapshot from one deployment response.
pub fn map_deployment(deployment: &Deployment) -> DeploymentStatus {
    let stage = current_stage(deployment);
    let state = map_stage(stage);

    let error_message = match (state, stage) {
        (DeployState::Failure, Some(s)) => Some(format!(
            "deployment {} stage {}",
            s.name,
            s.status.unwrap_or(StageStatus::Unknown)
        )),
        _ => None,
    };

    DeploymentStatus {
        state,
        progress: state.progress(),
        logs: deployment
            .stages
            .iter()
            .filter(|s| has_started(s))
            .map(stage_log_line)
            .collect(),
        url: deployment.url.clone(),
        error_message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, status: Option<StageStatus>) -> Stage {
        Stage {
            name: name.into(),
            status,
            started_on: None,
            ended_on: None,
        }
    }

    fn deployment(latest: Option<Stage>, stages: Vec<Stage>) -> Deployment {
        Deployment {
            id: "d1".into(),
            url: None,
            environment: None,
            stages,
            latest_stage: latest,
            created_on: None,
        }
    }

    #[test]
    fn progress_values() {
        assert_eq!(DeployState::Queued.progress(), 0);
        assert_eq!(DeployState::Building.progress(), 50);
        assert_eq!(DeployState::Deploying.progress(), 80);
        assert_eq!(DeployState::Success.progress(), 100);
        assert_eq!(DeployState::Failure.progress(), 100);
    }

    #[test]
    fn success_is_terminal() {
        let d = deployment(Some(stage("deploy", Some(StageStatus::Success))), vec![]);
        let status = map_deployment(&d);
        assert_eq!(status.state, DeployState::Success);
        assert_eq!(status.progress, 100);
        assert!(status.is_terminal());
        assert!(status.error_message.is_none());
    }

    #[test]
    fn failure_and_canceled_are_failures() {
        for s in [StageStatus::Failure, StageStatus::Canceled] {
            let d = deployment(Some(stage("build", Some(s))), vec![]);
            let status = map_deployment(&d);
            assert_eq!(status.state, DeployState::Failure);
            assert_eq!(status.progress, 100);
            assert_eq!(
                status.error_message.as_deref(),
                Some(format!("deployment build stage {s}").as_str())
            );
        }
    }

    #[test]
    fn absent_stage_is_queued() {
        let status = map_deployment(&deployment(None, vec![]));
        assert_eq!(status.state, DeployState::Queued);
        assert_eq!(status.progress, 0);
        assert!(status.logs.is_empty());
    }

    #[test]
    fn unrecognized_stage_is_queued() {
        let d = deployment(Some(stage("warp_drive", Some(StageStatus::Active))), vec![]);
        assert_eq!(map_deployment(&d).state, DeployState::Queued);

        let d = deployment(Some(stage("build", Some(StageStatus::Unknown))), vec![]);
        assert_eq!(map_deployment(&d).state, DeployState::Queued);

        let d = deployment(Some(stage("build", None)), vec![]);
        assert_eq!(map_deployment(&d).progress, 0);
    }

    #[test]
    fn active_stages_map_by_name() {
        let cases = [
            ("queued", DeployState::Queued),
            ("initialize", DeployState::Queued),
            ("clone_repo", DeployState::Building),
            ("build", DeployState::Building),
            ("deploy", DeployState::Deploying),
        ];
        for (name, expected) in cases {
            let d = deployment(Some(stage(name, Some(StageStatus::Active))), vec![]);
            assert_eq!(map_stage(current_stage(&d)), expected, "stage {name}");
        }
    }

    #[test]
    fn intermediate_success_is_not_terminal() {
        let d = deployment(Some(stage("build", Some(StageStatus::Success))), vec![]);
        assert_eq!(map_deployment(&d).state, DeployState::Building);
    }

    #[test]
    fn falls_back_to_last_started_stage() {
        let d = deployment(
            None,
            vec![
                stage("queued", Some(StageStatus::Success)),
                stage("build", Some(StageStatus::Active)),
                stage("deploy", Some(StageStatus::Idle)),
            ],
        );
        assert_eq!(current_stage(&d).unwrap().name, "build");
        let status = map_deployment(&d);
        assert_eq!(status.state, DeployState::Building);
        assert_eq!(status.logs, vec!["queued: success", "build: active"]);
    }

    #[test]
    fn log_line_includes_timestamp() {
        let mut s = stage("build", Some(StageStatus::Active));
        s.started_on = Some("2024-05-01T10:00:00Z".parse().unwrap());
        assert_eq!(stage_log_line(&s), "build: active @ 2024-05-01T10:00:00+00:00");
    }

    #[test]
    fn url_is_carried() {
        let mut d = deployment(None, vec![]);
        d.url = Some("https://abc.site.pages.dev".into());
        assert_eq!(
            map_deployment(&d).url.as_deref(),
            Some("https://abc.site.pages.dev")
        );
    }
}
