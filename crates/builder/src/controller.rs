//! Build instruction controller
//!
//! Owns one build request end-to-end: validation, configuration
//! resolution, repository preparation under the per-remote resource lock,
//! work-unit generation, the claim queue served to workers, and the
//! exactly-once publish/cleanup pipeline.

use crate::deliverable::{BuildParam, Deliverable};
use crate::notify::{Notification, Notifier};
use crate::publish::{publish_steps, removal_steps, PublishContext, PublishStep};
use crate::queue::{Claim, DeliverableQueue};
use crate::stitch::{run_stitch, ResolvedDocset, StitchedConfig};
use crate::ExternalCommand;
use docbuild_config::{Config, TargetConfig};
use docbuild_errors::{BuildError, Error};
use docbuild_events::{AppEvent, BuildEvent, EventEmitter, EventSender, PublishEvent};
use docbuild_resources::ResourceLockRegistry;
use docbuild_types::{
    resource_to_filename, BuildRequest, DeliverableStatus, DeliverableSummary, InstructionSnapshot,
    InstructionState,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use uuid::Uuid;

/// Controller for one build instruction.
///
/// The owner drives [`prepare`](Self::prepare) to completion, serves
/// workers through [`claim_next`](Self::claim_next) and
/// [`complete`](Self::complete), and must always finish with
/// [`cleanup`](Self::cleanup) - on the success path, after an error from
/// `prepare`, and before discarding the controller.
pub struct BuildInstructionController {
    request: BuildRequest,
    config: Arc<Config>,
    registry: Arc<ResourceLockRegistry>,
    notifier: Arc<dyn Notifier>,
    events: Option<EventSender>,

    state: StdMutex<InstructionState>,
    queue: DeliverableQueue,
    summaries: StdMutex<HashMap<String, DeliverableSummary>>,
    /// Guards the cleanup body. Non-blocking try-acquire: a second caller
    /// backs off immediately instead of waiting behind an in-progress
    /// cleanup.
    cleanup_done: Mutex<bool>,

    // Resolved while preparing; read-only afterwards.
    target_config: Option<TargetConfig>,
    resolved: Option<ResolvedDocset>,
    stitched: Option<StitchedConfig>,
    stitch_file: Option<PathBuf>,
    repo_build_dir: Option<PathBuf>,
    build_source_dir: Option<PathBuf>,
    staging_root: Option<PathBuf>,
    staging_path: Option<PathBuf>,
    relative_path: Option<PathBuf>,
    commit: Option<String>,
}

impl EventEmitter for BuildInstructionController {
    fn event_sender(&self) -> Option<&EventSender> {
        self.events.as_ref()
    }
}

impl BuildInstructionController {
    #[must_use]
    pub fn new(
        request: BuildRequest,
        config: Arc<Config>,
        registry: Arc<ResourceLockRegistry>,
        notifier: Arc<dyn Notifier>,
        events: Option<EventSender>,
    ) -> Self {
        let summaries = request.deliverables.clone();
        Self {
            request,
            config,
            registry,
            notifier,
            events,
            state: StdMutex::new(InstructionState::Validating),
            queue: DeliverableQueue::new(),
            summaries: StdMutex::new(summaries),
            cleanup_done: Mutex::new(false),
            target_config: None,
            resolved: None,
            stitched: None,
            stitch_file: None,
            repo_build_dir: None,
            build_source_dir: None,
            staging_root: None,
            staging_path: None,
            relative_path: None,
            commit: None,
        }
    }

    #[must_use]
    pub fn request(&self) -> &BuildRequest {
        &self.request
    }

    #[must_use]
    pub fn state(&self) -> InstructionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Commit hash of the materialized branch, once resolved
    #[must_use]
    pub fn commit(&self) -> Option<&str> {
        self.commit.as_deref()
    }

    fn set_state(&self, state: InstructionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.emit(AppEvent::Build(BuildEvent::StateChanged {
            id: self.request.id.clone(),
            state,
        }));
    }

    /// Drive the instruction from validation through work-unit
    /// generation. On success the controller is in `Serving` and workers
    /// may start claiming; on error it is in `Aborted` and the caller
    /// must still invoke [`cleanup`](Self::cleanup).
    ///
    /// # Errors
    ///
    /// Propagates rejection, configuration resolution, and repository
    /// preparation failures per the taxonomy in `docbuild-errors`.
    pub async fn prepare(&mut self) -> Result<(), Error> {
        let result = self.prepare_inner().await;
        match &result {
            Ok(()) => self.set_state(InstructionState::Serving),
            Err(_) => self.set_state(InstructionState::Aborted),
        }
        result
    }

    async fn prepare_inner(&mut self) -> Result<(), Error> {
        self.validate()?;
        self.set_state(InstructionState::ConfigResolving);
        self.resolve_config().await?;
        self.set_state(InstructionState::RepoPreparing);
        self.prepare_repo().await?;
        self.set_state(InstructionState::Generating);
        self.generate_deliverables().await?;
        Ok(())
    }

    /// Validate completeness of the request. No resources are acquired
    /// before this passes.
    fn validate(&self) -> Result<(), Error> {
        if let Err(e) = self.request.validate() {
            self.emit(AppEvent::Build(BuildEvent::InstructionRejected {
                id: self.request.id.clone(),
                reason: e.to_string(),
            }));
            return Err(e.into());
        }
        self.emit(AppEvent::Build(BuildEvent::InstructionValidated {
            id: self.request.id.clone(),
        }));
        Ok(())
    }

    /// Stitch and parse the per-target configuration, extract everything
    /// this instruction needs, and apply the lifecycle policy gate.
    async fn resolve_config(&mut self) -> Result<(), Error> {
        let target_name = self.request.target.clone();
        let target = match self.config.target(&target_name) {
            Ok(t) => t.clone(),
            Err(e) => {
                self.emit(AppEvent::Build(BuildEvent::InstructionRejected {
                    id: self.request.id.clone(),
                    reason: e.to_string(),
                }));
                return Err(e.into());
            }
        };

        let (stitched, stitch_file) =
            match run_stitch(&self.config, &target_name, &target).await {
                Ok(r) => r,
                Err(e) => {
                    // Stitching failures are operator configuration
                    // issues: logged, never mailed.
                    self.emit_warning_with_context(
                        format!("stitching for target '{target_name}' failed"),
                        e.to_string(),
                    );
                    return Err(e);
                }
            };

        let resolved =
            stitched.resolve(&self.request.product, &self.request.docset, &self.request.lang)?;

        // Policy gate, not an error: unpublished docsets never reach a
        // non-internal target.
        if !resolved.lifecycle.publishable_on(target.internal) {
            let err = BuildError::LifecycleNotPublishable {
                product: self.request.product.clone(),
                docset: self.request.docset.clone(),
                lifecycle: resolved.lifecycle.to_string(),
                target: target_name.clone(),
            };
            self.emit(AppEvent::Build(BuildEvent::InstructionRejected {
                id: self.request.id.clone(),
                reason: err.to_string(),
            }));
            return Err(err.into());
        }

        let repo_build_dir = self
            .config
            .server
            .temp_repo_dir
            .join(Uuid::new_v4().simple().to_string());
        self.build_source_dir = Some(match &resolved.subdir {
            Some(subdir) => repo_build_dir.join(subdir),
            None => repo_build_dir.clone(),
        });
        self.repo_build_dir = Some(repo_build_dir);

        self.emit(AppEvent::Build(BuildEvent::ConfigStitched {
            id: self.request.id.clone(),
            target: target_name,
        }));

        self.target_config = Some(target);
        self.stitch_file = Some(stitch_file);
        self.stitched = Some(stitched);
        self.resolved = Some(resolved);
        Ok(())
    }

    /// Update the shared mirror of the remote and materialize the branch
    /// into the instruction-private working directory, serialized per
    /// remote through the resource lock registry. Then resolve the commit
    /// hash for provenance.
    async fn prepare_repo(&mut self) -> Result<(), Error> {
        let resolved = self.resolved.as_ref().ok_or_else(|| self.not_initialized())?;
        let repo_build_dir = self
            .repo_build_dir
            .as_ref()
            .ok_or_else(|| self.not_initialized())?;

        let lock_key = resource_to_filename(&resolved.remote);
        let mirror_dir = self.config.server.repo_dir.join(&lock_key);
        let copy_cmd = ExternalCommand::new(
            self.config.server.bin_dir.join("docbuild-git-copy-branch"),
        )
        .arg(&resolved.remote)
        .path_arg(&mirror_dir)
        .arg(&resolved.branch)
        .path_arg(repo_build_dir);

        let guard = self
            .registry
            .acquire(&lock_key, &self.request.id, self.events.as_ref())
            .await;
        let output = copy_cmd.run().await;
        // Release immediately after the external operation completes,
        // regardless of outcome.
        drop(guard);

        match output {
            Ok(out) if out.success => {}
            Ok(out) => {
                self.emit_warning(format!(
                    "repository preparation failed with exit code {:?} for '{}'",
                    out.exit_code,
                    copy_cmd.display()
                ));
                self.mail_failure(&copy_cmd.display(), &out.stdout, &out.stderr)
                    .await;
                return Err(BuildError::ExternalOperationFailed {
                    command: copy_cmd.display(),
                    exit_code: out.exit_code,
                    stderr: out.stderr,
                }
                .into());
            }
            Err(e) => {
                self.mail_failure(&copy_cmd.display(), "", &e.to_string()).await;
                return Err(e.into());
            }
        }

        self.emit(AppEvent::Build(BuildEvent::RepoPrepared {
            id: self.request.id.clone(),
            remote: resolved.remote.clone(),
            branch: resolved.branch.clone(),
        }));

        // Read-only provenance query against the fresh working copy.
        let commit = ExternalCommand::new(&self.config.server.git_command)
            .arg("-C")
            .path_arg(repo_build_dir)
            .args(["log", "--format=%H", "-n", "1"])
            .run_checked()
            .await
            .map_err(|e| BuildError::CommitResolutionFailed {
                directory: repo_build_dir.display().to_string(),
                message: e.to_string(),
            })?;
        let commit = commit.stdout.trim().to_string();
        self.emit(AppEvent::Build(BuildEvent::CommitResolved {
            id: self.request.id.clone(),
            commit: commit.clone(),
        }));
        self.commit = Some(commit);
        Ok(())
    }

    /// Create the isolated staging directory, evict stale cache entries
    /// for this tuple, and expand the stitched deliverable definitions
    /// into work units. The stitched document is discarded afterwards.
    async fn generate_deliverables(&mut self) -> Result<(), Error> {
        let resolved = self.resolved.as_ref().ok_or_else(|| self.not_initialized())?;
        let build_source_dir = self
            .build_source_dir
            .clone()
            .ok_or_else(|| self.not_initialized())?;

        let prefix = format!(
            "docbuild_deliverable_{}_{}_{}_",
            self.request.product, self.request.docset, self.request.lang
        );
        let staging_root = tempfile::Builder::new()
            .prefix(&prefix)
            .tempdir()
            .map_err(|e| BuildError::WorkspaceFailed {
                message: e.to_string(),
            })?
            .keep();

        let relative_path = PathBuf::from(&self.request.lang)
            .join(&self.request.product)
            .join(&self.request.docset);
        let staging_path = staging_root.join(&relative_path);
        tokio::fs::create_dir_all(&staging_path)
            .await
            .map_err(|e| BuildError::WorkspaceFailed {
                message: e.to_string(),
            })?;

        // Evict stale cache entries for this exact tuple so navigation
        // generation never sees leftovers from a previous failed run.
        let cache_dir = self
            .config
            .deliverable_cache_dir(&self.request.target)
            .join(&relative_path);
        if let Err(e) = tokio::fs::remove_dir_all(&cache_dir).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(BuildError::WorkspaceFailed {
                    message: format!("cache eviction at {}: {e}", cache_dir.display()),
                }
                .into());
            }
        }

        // Several definitions may build the same document in the same
        // format with different subdeliverable or parameter sets; a
        // per-pair running salt keeps their unit ids distinct.
        let mut repeats: HashMap<(String, String), u32> = HashMap::new();
        let mut count = 0usize;
        for def in &resolved.deliverables {
            for (format, enabled) in &def.formats {
                if !*enabled {
                    continue;
                }
                let salt = repeats
                    .entry((def.dc.clone(), format.clone()))
                    .or_insert(0);
                let deliverable = Deliverable::new(
                    def.dc.clone(),
                    format.clone(),
                    def.subdeliverables.clone(),
                    def.params.iter().cloned().map(BuildParam::from).collect(),
                    build_source_dir.clone(),
                    staging_path.clone(),
                    self.config.server.bin_dir.clone(),
                    *salt,
                );
                *salt += 1;
                self.summaries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(
                        deliverable.id().to_string(),
                        deliverable.summary(DeliverableStatus::Open),
                    );
                self.queue.insert(deliverable);
                count += 1;
            }
        }

        self.staging_root = Some(staging_root);
        self.staging_path = Some(staging_path);
        self.relative_path = Some(relative_path);
        // The stitched tree is no longer needed once units exist.
        self.stitched = None;

        self.emit(AppEvent::Build(BuildEvent::DeliverablesGenerated {
            id: self.request.id.clone(),
            count,
        }));
        Ok(())
    }

    /// Claim the next open work unit for execution, or report queue
    /// status. Safe for any number of concurrent workers.
    pub fn claim_next(&self) -> Claim {
        match self.queue.claim_next() {
            Claim::Ready(deliverable) => {
                if let Some(summary) = self
                    .summaries
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .get_mut(deliverable.id())
                {
                    summary.status = DeliverableStatus::Building;
                }
                self.emit(AppEvent::Build(BuildEvent::DeliverableClaimed {
                    id: self.request.id.clone(),
                    deliverable: deliverable.id().to_string(),
                }));
                Claim::Ready(deliverable)
            }
            other => other,
        }
    }

    /// Report a claimed unit finished. Success and failure both remove
    /// the id from the building set; a failed unit is not resubmitted.
    pub fn complete(&self, id: &str, success: bool) {
        if !self.queue.complete(id) {
            return;
        }
        if let Some(summary) = self
            .summaries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            summary.status = if success {
                DeliverableStatus::Success
            } else {
                DeliverableStatus::Failed
            };
        }
        self.emit(AppEvent::Build(BuildEvent::DeliverableCompleted {
            id: self.request.id.clone(),
            deliverable: id.to_string(),
            success,
        }));
        if self.queue.is_drained() {
            self.emit(AppEvent::Build(BuildEvent::QueueDrained {
                id: self.request.id.clone(),
            }));
        }
    }

    /// Point-in-time status view: the request augmented with queue state,
    /// per-deliverable summaries, and the resolved commit.
    #[must_use]
    pub fn snapshot(&self) -> InstructionSnapshot {
        // The live summaries supersede any carried in the request; empty
        // the embedded copy so the flattened serialization produces a
        // single `deliverables` key.
        let mut request = self.request.clone();
        request.deliverables = HashMap::new();
        InstructionSnapshot {
            request,
            open: self.queue.open_ids(),
            building: self.queue.building_ids(),
            deliverables: self
                .summaries
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            commit: self.commit.clone(),
        }
    }

    /// Run the terminal publish/cleanup pipeline.
    ///
    /// Idempotent and exactly-once: the body executes on the first call;
    /// concurrent callers back off immediately and later callers return
    /// without re-running anything. Individual step failures are logged,
    /// mailed to the maintainers, and never abort the remaining steps.
    ///
    /// Returns `true` once cleanup has run (on this or an earlier call),
    /// `false` when another caller currently holds the guard.
    pub async fn cleanup(&self) -> bool {
        let Ok(mut done) = self.cleanup_done.try_lock() else {
            return false;
        };
        if *done {
            return true;
        }

        self.set_state(InstructionState::Cleaning);
        self.emit_debug(format!("cleaning up instruction {}", self.request.id));

        let mut steps: Vec<PublishStep> = Vec::new();
        if self.has_staged_output() {
            match self.compose_publish_steps() {
                Ok(publish) => steps.extend(publish),
                Err(message) => self.emit_warning(message),
            }
        }
        steps.extend(removal_steps(
            self.staging_root.as_deref(),
            self.repo_build_dir.as_deref(),
        ));

        if steps.is_empty() {
            self.emit(AppEvent::Publish(PublishEvent::PipelineSkipped {
                id: self.request.id.clone(),
            }));
            *done = true;
            self.set_state(InstructionState::Terminated);
            return true;
        }

        let count = steps.len();
        for step in steps {
            self.emit(AppEvent::Publish(PublishEvent::StepStarted {
                id: self.request.id.clone(),
                step: step.name.to_string(),
                command: step.command.display(),
            }));
            match step.command.run().await {
                Ok(out) if out.success => {
                    self.emit(AppEvent::Publish(PublishEvent::StepCompleted {
                        id: self.request.id.clone(),
                        step: step.name.to_string(),
                    }));
                }
                Ok(out) => {
                    self.emit_warning(format!(
                        "cleanup step '{}' failed with exit code {:?} for '{}'",
                        step.name,
                        out.exit_code,
                        step.command.display()
                    ));
                    self.mail_failure(&step.command.display(), &out.stdout, &out.stderr)
                        .await;
                    self.emit(AppEvent::Publish(PublishEvent::StepFailed {
                        id: self.request.id.clone(),
                        step: step.name.to_string(),
                        command: step.command.display(),
                        exit_code: out.exit_code,
                    }));
                }
                Err(e) => {
                    self.emit_warning(format!("cleanup step '{}' failed: {e}", step.name));
                    self.mail_failure(&step.command.display(), "", &e.to_string())
                        .await;
                    self.emit(AppEvent::Publish(PublishEvent::StepFailed {
                        id: self.request.id.clone(),
                        step: step.name.to_string(),
                        command: step.command.display(),
                        exit_code: None,
                    }));
                }
            }
        }

        self.emit(AppEvent::Publish(PublishEvent::PipelineCompleted {
            id: self.request.id.clone(),
            steps: count,
        }));
        *done = true;
        self.set_state(InstructionState::Terminated);
        true
    }

    fn has_staged_output(&self) -> bool {
        self.staging_path.as_deref().is_some_and(|path| {
            std::fs::read_dir(path)
                .map(|mut entries| entries.next().is_some())
                .unwrap_or(false)
        })
    }

    fn compose_publish_steps(&self) -> Result<Vec<PublishStep>, String> {
        let (Some(target), Some(resolved), Some(stitch_file), Some(relative), Some(root), Some(path)) = (
            self.target_config.as_ref(),
            self.resolved.as_ref(),
            self.stitch_file.as_deref(),
            self.relative_path.as_deref(),
            self.staging_root.as_deref(),
            self.staging_path.as_deref(),
        ) else {
            return Err("staged output present but instruction state is incomplete".to_string());
        };

        let nav_tmp = tempfile::Builder::new()
            .prefix("docbuild_navigation_")
            .tempdir()
            .map_err(|e| format!("navigation temp directory: {e}"))?
            .keep();

        Ok(publish_steps(&PublishContext {
            config: &self.config,
            target_name: &self.request.target,
            target,
            product: &self.request.product,
            docset: &self.request.docset,
            lang: &self.request.lang,
            lifecycle: resolved.lifecycle,
            relative_path: relative,
            staging_root: root,
            staging_path: path,
            nav_tmp: &nav_tmp,
            stitch_file,
        }))
    }

    /// Compose and send the external-operation failure mail. Delivery
    /// problems are logged, never escalated.
    async fn mail_failure(&self, command: &str, stdout: &str, stderr: &str) {
        let Some(resolved) = self.resolved.as_ref() else {
            return;
        };
        let notification = Notification {
            product: self.request.product.clone(),
            docset: self.request.docset.clone(),
            lang: self.request.lang.clone(),
            target: self.request.target.clone(),
            remote: resolved.remote.clone(),
            branch: resolved.branch.clone(),
            command: command.to_string(),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            recipients: resolved.maintainers.clone(),
        };
        if let Err(e) = self.notifier.send(&notification).await {
            self.emit_warning_with_context("failed to notify maintainers", e.to_string());
        }
    }

    fn not_initialized(&self) -> Error {
        BuildError::NotInitialized {
            id: self.request.id.clone(),
        }
        .into()
    }

    /// Paths the cleanup pipeline will remove; exposed for integration
    /// tests that assert on workspace lifetime.
    #[must_use]
    pub fn staging_root(&self) -> Option<&Path> {
        self.staging_root.as_deref()
    }
}
