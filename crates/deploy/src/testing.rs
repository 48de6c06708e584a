//! In-memory platform used by the pipeline tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::sync::Mutex;
use std::time::Duration;

use pagedrop_manifest::{BuiltManifest, ManifestOptions, build_manifest};
use pagedrop_pages_api::{ApiError, ApiFuture, PagesPlatform};
use pagedrop_protocol::{
    Deployment, Manifest, Project, Stage, StageStatus, UploadPayloadItem, UploadResult,
    UploadToken,
};
use tempfile::TempDir;
use tokio::time::Instant;

/// Rejects a key on every upload.
pub const ALWAYS: u32 = u32::MAX;

#[derive(Default)]
struct State {
    stored: HashSet<String>,
    projects: HashSet<String>,
    rejected_keys: HashMap<String, u32>,
    failures: HashMap<&'static str, (u16, u32)>,
    script: VecDeque<Deployment>,
    upload_delay: Option<Duration>,

    created_projects: Vec<String>,
    upload_token_calls: usize,
    check_missing_batches: Vec<Vec<String>>,
    upload_batches: Vec<Vec<String>>,
    uploads_in_flight: usize,
    peak_uploads_in_flight: usize,
    completed_uploads: usize,
    completed_before_upload: Vec<usize>,
    uploaded_items: Vec<UploadPayloadItem>,
    upserted: Vec<String>,
    created: Vec<Manifest>,
    created_at: Option<Instant>,
    get_deployment_calls: usize,
    first_poll_at: Option<Instant>,
}

impl State {
    /// Consumes one scripted failure for `op`, if any is left.
    fn take_failure(&mut self, op: &'static str) -> Result<(), ApiError> {
        if let Some((status, remaining)) = self.failures.get_mut(op) {
            if *remaining > 0 {
                if *remaining != ALWAYS {
                    *remaining -= 1;
                }
                return Err(ApiError::Api {
                    status: *status,
                    message: format!("scripted {op} failure"),
                });
            }
        }
        Ok(())
    }
}

pub struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn store<'a>(&self, hashes: impl IntoIterator<Item = &'a str>) {
        let mut state = self.state();
        state.stored.extend(hashes.into_iter().map(String::from));
    }

    pub fn is_stored(&self, hash: &str) -> bool {
        self.state().stored.contains(hash)
    }

    pub fn add_project(&self, name: &str) {
        self.state().projects.insert(name.to_string());
    }

    /// Reports `key` as unsuccessful on its next `times` uploads.
    pub fn reject_key(&self, key: &str, times: u32) {
        self.state().rejected_keys.insert(key.to_string(), times);
    }

    fn fail(&self, op: &'static str, status: u16, times: u32) {
        self.state().failures.insert(op, (status, times));
    }

    pub fn fail_get_project(&self, status: u16) {
        self.fail("get_project", status, ALWAYS);
    }

    pub fn fail_upload_token(&self, status: u16, times: u32) {
        self.fail("upload_token", status, times);
    }

    pub fn fail_check_missing(&self, status: u16, times: u32) {
        self.fail("check_missing", status, times);
    }

    pub fn fail_upload(&self, status: u16, times: u32) {
        self.fail("upload", status, times);
    }

    pub fn fail_upsert_hashes(&self, status: u16) {
        self.fail("upsert_hashes", status, ALWAYS);
    }

    pub fn fail_create_deployment(&self, status: u16) {
        self.fail("create_deployment", status, 1);
    }

    pub fn fail_get_deployment(&self, status: u16, times: u32) {
        self.fail("get_deployment", status, times);
    }

    /// Responses for successive `get_deployment` calls. The last one repeats.
    pub fn script_deployments(&self, deployments: Vec<Deployment>) {
        self.state().script = deployments.into();
    }

    /// Holds every upload request open for `delay` before answering.
    pub fn delay_uploads(&self, delay: Duration) {
        self.state().upload_delay = Some(delay);
    }

    pub fn created_projects(&self) -> Vec<String> {
        self.state().created_projects.clone()
    }

    pub fn upload_token_calls(&self) -> usize {
        self.state().upload_token_calls
    }

    pub fn check_missing_batches(&self) -> Vec<Vec<String>> {
        self.state().check_missing_batches.clone()
    }

    pub fn upload_batches(&self) -> Vec<Vec<String>> {
        self.state().upload_batches.clone()
    }

    pub fn uploads_in_flight(&self) -> usize {
        self.state().uploads_in_flight
    }

    pub fn peak_uploads_in_flight(&self) -> usize {
        self.state().peak_uploads_in_flight
    }

    pub fn completed_uploads(&self) -> usize {
        self.state().completed_uploads
    }

    /// For each upload request, how many had completed when it started.
    pub fn completed_before_upload(&self) -> Vec<usize> {
        self.state().completed_before_upload.clone()
    }

    pub fn uploaded_items(&self) -> Vec<UploadPayloadItem> {
        self.state().uploaded_items.clone()
    }

    pub fn upserted(&self) -> Vec<String> {
        self.state().upserted.clone()
    }

    pub fn created_manifests(&self) -> Vec<Manifest> {
        self.state().created.clone()
    }

    pub fn created_at(&self) -> Option<Instant> {
        self.state().created_at
    }

    pub fn get_deployment_calls(&self) -> usize {
        self.state().get_deployment_calls
    }

    pub fn first_poll_at(&self) -> Option<Instant> {
        self.state().first_poll_at
    }
}

impl PagesPlatform for FakePlatform {
    fn get_project<'a>(&'a self, name: &'a str) -> ApiFuture<'a, Option<Project>> {
        Box::pin(async move {
            let mut state = self.state();
            state.take_failure("get_project")?;
            Ok(state.projects.contains(name).then(|| project(name)))
        })
    }

    fn create_project<'a>(
        &'a self,
        name: &'a str,
        _production_branch: &'a str,
    ) -> ApiFuture<'a, Project> {
        Box::pin(async move {
            let mut state = self.state();
            state.take_failure("create_project")?;
            state.projects.insert(name.to_string());
            state.created_projects.push(name.to_string());
            Ok(project(name))
        })
    }

    fn upload_token<'a>(&'a self, project: &'a str) -> ApiFuture<'a, UploadToken> {
        Box::pin(async move {
            let mut state = self.state();
            state.upload_token_calls += 1;
            state.take_failure("upload_token")?;
            Ok(UploadToken::new(format!("jwt-{project}")))
        })
    }

    fn check_missing<'a>(
        &'a self,
        _token: &'a UploadToken,
        hashes: &'a [String],
    ) -> ApiFuture<'a, Vec<String>> {
        Box::pin(async move {
            let mut state = self.state();
            state.check_missing_batches.push(hashes.to_vec());
            state.take_failure("check_missing")?;
            Ok(hashes
                .iter()
                .filter(|h| !state.stored.contains(*h))
                .cloned()
                .collect())
        })
    }

    fn upload<'a>(
        &'a self,
        _token: &'a UploadToken,
        payload: &'a [UploadPayloadItem],
    ) -> ApiFuture<'a, UploadResult> {
        Box::pin(async move {
            let delay = {
                let mut state = self.state();
                state
                    .upload_batches
                    .push(payload.iter().map(|i| i.key.clone()).collect());
                let completed = state.completed_uploads;
                state.completed_before_upload.push(completed);
                state.uploads_in_flight += 1;
                state.peak_uploads_in_flight =
                    state.peak_uploads_in_flight.max(state.uploads_in_flight);
                state.upload_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let mut state = self.state();
            state.uploads_in_flight -= 1;
            state.completed_uploads += 1;
            state.uploaded_items.extend(payload.iter().cloned());
            state.take_failure("upload")?;

            let mut result = UploadResult::default();
            for item in payload {
                if let Some(remaining) = state.rejected_keys.get_mut(&item.key) {
                    if *remaining > 0 {
                        if *remaining != ALWAYS {
                            *remaining -= 1;
                        }
                        result.unsuccessful_keys.push(item.key.clone());
                        continue;
                    }
                }
                state.stored.insert(item.key.clone());
                result.successful_key_count += 1;
            }
            Ok(result)
        })
    }

    fn upsert_hashes<'a>(
        &'a self,
        _token: &'a UploadToken,
        hashes: &'a [String],
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            state.upserted.extend(hashes.iter().cloned());
            state.take_failure("upsert_hashes")
        })
    }

    fn create_deployment<'a>(
        &'a self,
        project: &'a str,
        manifest: &'a Manifest,
    ) -> ApiFuture<'a, Deployment> {
        Box::pin(async move {
            let mut state = self.state();
            state.created.push(manifest.clone());
            state.created_at = Some(Instant::now());
            state.take_failure("create_deployment")?;

            let id = format!("dep-{}", state.created.len());
            let mut created = deployment(vec![stage("queued", StageStatus::Active)]);
            created.url = Some(format!("https://{id}.{project}.pages.dev"));
            created.id = id;
            Ok(created)
        })
    }

    fn get_deployment<'a>(&'a self, _project: &'a str, id: &'a str) -> ApiFuture<'a, Deployment> {
        Box::pin(async move {
            let mut state = self.state();
            state.get_deployment_calls += 1;
            state.first_poll_at.get_or_insert_with(Instant::now);
            state.take_failure("get_deployment")?;

            let mut next = if state.script.len() > 1 {
                state.script.pop_front()
            } else {
                state.script.front().cloned()
            }
            .unwrap_or_else(|| deployment(vec![stage("queued", StageStatus::Active)]));
            next.id = id.to_string();
            Ok(next)
        })
    }
}

fn project(name: &str) -> Project {
    Project {
        name: name.to_string(),
        id: None,
        subdomain: Some(format!("{name}.pages.dev")),
        production_branch: Some("main".into()),
        created_on: None,
    }
}

pub fn stage(name: &str, status: StageStatus) -> Stage {
    Stage {
        name: name.to_string(),
        status: Some(status),
        started_on: None,
        ended_on: None,
    }
}

pub fn deployment(stages: Vec<Stage>) -> Deployment {
    Deployment {
        id: "dep-1".into(),
        url: None,
        environment: Some("production".into()),
        stages,
        latest_stage: None,
        created_on: None,
    }
}

/// Writes `files` under a fresh temp dir.
pub fn write_site(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for (path, contents) in files {
        let full = dir.path().join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, contents).unwrap();
    }
    dir
}

/// Writes `files` and builds their manifest with default options.
pub fn site(files: &[(&str, &str)]) -> (TempDir, BuiltManifest) {
    let dir = write_site(files);
    let built = build_manifest(dir.path(), &ManifestOptions::default()).unwrap();
    (dir, built)
}
