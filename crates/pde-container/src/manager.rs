use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use pde_classpath::{
    ClasspathContext, ClasspathEntry, ClasspathError, ClasspathResolver, ContainerUpdate,
    ResolveMode, REQUIRED_PLUGINS_CONTAINER,
};
use pde_config::ContainerConfig;
use pde_model::SubscriptionId;
use pde_scheduler::{
    check_cancelled, BlockingTask, CancellationToken, Cancelled, KeyedDebouncedHandle,
    KeyedDebouncer, PoolKind, Scheduler, WorkspaceLock,
};

use crate::listener::ContainerListener;
use crate::snapshot::SnapshotStore;
use crate::{ContainerError, FailureCause, ProjectFailure};

const LOCK_HOLDER: &str = "classpath-containers";
const VM_CHANGE_KEY: &str = "vm-change";

/// Where a project's latest request stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    Queued,
    Resolving,
    Unchanged,
    Updated,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRequest {
    pub project: String,
    /// Baseline to compare against; the persisted snapshot is used when absent.
    pub previous: Option<Vec<ClasspathEntry>>,
}

/// What one drained pass did, per project, in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub unchanged: Vec<String>,
    pub updated: Vec<String>,
    /// Closed or missing projects.
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

enum Outcome {
    Skipped,
    Unchanged,
    Updated(Vec<ClasspathEntry>),
}

/// Clears the running flag however the worker exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ContainerManager {
    ctx: ClasspathContext,
    store: SnapshotStore,
    scheduler: Scheduler,
    lock: WorkspaceLock,
    queue: Mutex<VecDeque<ContainerRequest>>,
    states: Mutex<HashMap<String, RequestState>>,
    running: AtomicBool,
    vm_debouncer: KeyedDebouncer<&'static str>,
}

impl ContainerManager {
    pub fn new(
        ctx: ClasspathContext,
        store: SnapshotStore,
        scheduler: Scheduler,
        lock: WorkspaceLock,
        vm_change_delay: Duration,
    ) -> Arc<Self> {
        let vm_debouncer = KeyedDebouncer::new(scheduler.clone(), PoolKind::Background, vm_change_delay);
        Arc::new(Self {
            ctx,
            store,
            scheduler,
            lock,
            queue: Mutex::new(VecDeque::new()),
            states: Mutex::new(HashMap::new()),
            running: AtomicBool::new(false),
            vm_debouncer,
        })
    }

    pub fn from_config(
        ctx: ClasspathContext,
        config: &ContainerConfig,
        workspace_root: &Path,
        scheduler: Scheduler,
        lock: WorkspaceLock,
    ) -> Arc<Self> {
        let store = SnapshotStore::new(
            config.state_dir_for(workspace_root),
            config.compress_snapshots,
        );
        Self::new(ctx, store, scheduler, lock, config.vm_change_debounce())
    }

    pub fn context(&self) -> &ClasspathContext {
        &self.ctx
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Subscribes to universe changes. The subscription does not keep the manager alive.
    pub fn attach(self: &Arc<Self>) -> SubscriptionId {
        self.ctx.universe.subscribe(Arc::new(ContainerListener {
            manager: Arc::downgrade(self),
        }))
    }

    pub fn request(&self, project: &str) {
        self.enqueue(ContainerRequest {
            project: project.to_string(),
            previous: None,
        });
    }

    /// Queues `request`. A project already in the queue keeps its position; a supplied
    /// baseline replaces the queued one.
    pub fn enqueue(&self, request: ContainerRequest) {
        let mut queue = self.queue.lock();
        match queue.iter_mut().find(|queued| queued.project == request.project) {
            Some(queued) => {
                if request.previous.is_some() {
                    queued.previous = request.previous;
                }
            }
            None => {
                self.states
                    .lock()
                    .insert(request.project.clone(), RequestState::Queued);
                queue.push_back(request);
            }
        }
    }

    /// Queues every workspace plug-in project; returns the queue length afterwards.
    pub fn request_all(&self) -> usize {
        for model in self.ctx.universe.workspace_models() {
            if let Some(project) = model.project() {
                self.request(project);
            }
        }
        self.queue.lock().len()
    }

    pub fn pending(&self) -> Vec<String> {
        self.queue.lock().iter().map(|r| r.project.clone()).collect()
    }

    pub fn state(&self, project: &str) -> Option<RequestState> {
        self.states.lock().get(project).copied()
    }

    /// Drops everything known about a deleted project, its snapshot included.
    pub fn forget(&self, project: &str) {
        self.queue.lock().retain(|r| r.project != project);
        self.states.lock().remove(project);
        if self.store.remove(project) {
            tracing::debug!(target = "pde.container", project, "deleted container snapshot");
        }
    }

    fn set_state(&self, project: &str, state: RequestState) {
        self.states.lock().insert(project.to_string(), state);
    }

    /// Starts a background pass unless one is running or there is nothing to do.
    pub fn schedule(self: &Arc<Self>) -> Option<BlockingTask<Result<PassReport, ContainerError>>> {
        if self.queue.lock().is_empty() {
            return None;
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return None;
        }
        let this = Arc::clone(self);
        Some(self.scheduler.spawn_background(move |token| {
            let result = {
                let _running = RunningGuard(&this.running);
                this.run(&token)
            };
            if !token.is_cancelled() {
                // Requests that raced with the end of the pass.
                this.schedule();
            }
            match result {
                Err(ContainerError::Cancelled) => Err(Cancelled),
                other => Ok(other),
            }
        }))
    }

    /// Drains the queue on the calling thread while holding the workspace lock.
    ///
    /// Cancellation is checked between projects. A cancelled pass persists and pushes nothing
    /// and puts the projects it had already resolved back at the front of the queue.
    pub fn run(&self, token: &CancellationToken) -> Result<PassReport, ContainerError> {
        let _guard = self.lock.acquire(LOCK_HOLDER);
        let progress = self
            .scheduler
            .progress()
            .start("Updating classpath containers", self.queue.lock().len() as u64);

        let mut report = PassReport::default();
        let mut batch: Vec<ContainerUpdate> = Vec::new();
        let mut failures: Vec<ProjectFailure> = Vec::new();
        let mut done: u64 = 0;

        loop {
            if check_cancelled(token).is_err() {
                self.requeue_front(&batch);
                progress.finish(Some("cancelled".to_string()));
                tracing::debug!(
                    target = "pde.container",
                    resolved = batch.len(),
                    "container pass cancelled"
                );
                return Err(ContainerError::Cancelled);
            }

            let (request, remaining) = {
                let mut queue = self.queue.lock();
                let Some(request) = queue.pop_front() else { break };
                (request, queue.len() as u64)
            };
            progress.set_total(done + 1 + remaining);

            let project = request.project.clone();
            self.set_state(&project, RequestState::Resolving);
            match self.resolve(&request) {
                Ok(Outcome::Skipped) => {
                    self.states.lock().remove(&project);
                    report.skipped.push(project.clone());
                }
                Ok(Outcome::Unchanged) => {
                    self.set_state(&project, RequestState::Unchanged);
                    report.unchanged.push(project.clone());
                }
                Ok(Outcome::Updated(entries)) => {
                    batch.retain(|update| update.project != project);
                    batch.push(ContainerUpdate {
                        project: project.clone(),
                        entries,
                    });
                }
                Err(err) => {
                    tracing::error!(
                        target = "pde.container",
                        project = %project,
                        error = %err,
                        "classpath container resolution failed"
                    );
                    self.set_state(&project, RequestState::Failed);
                    report.failed.push(project.clone());
                    failures.push(ProjectFailure {
                        project: project.clone(),
                        cause: FailureCause::Classpath(err),
                    });
                }
            }
            done += 1;
            progress.worked(1, Some(project));
        }

        for update in &batch {
            match self.store.save(&update.project, &update.entries) {
                Ok(()) => {
                    self.set_state(&update.project, RequestState::Updated);
                    report.updated.push(update.project.clone());
                }
                Err(err) => {
                    tracing::error!(
                        target = "pde.container",
                        project = %update.project,
                        error = %err,
                        "failed to persist container snapshot"
                    );
                    self.set_state(&update.project, RequestState::Failed);
                    report.failed.push(update.project.clone());
                    failures.push(ProjectFailure {
                        project: update.project.clone(),
                        cause: FailureCause::Storage(err),
                    });
                }
            }
        }
        if !batch.is_empty() {
            if let Err(err) = self.ctx.java.set_container_entries(batch) {
                // The saved snapshots describe contents the Java model never received.
                for project in &report.updated {
                    self.store.remove(project);
                    self.set_state(project, RequestState::Failed);
                }
                progress.finish(Some("failed".to_string()));
                tracing::error!(
                    target = "pde.container",
                    projects = report.updated.len(),
                    error = %err,
                    "failed to push container updates"
                );
                return Err(err.into());
            }
        }
        progress.finish(None);

        tracing::info!(
            target = "pde.container",
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "container pass finished"
        );

        match failures.len() {
            0 => Ok(report),
            1 => {
                let failure = failures.remove(0);
                Err(ContainerError::Project {
                    project: failure.project,
                    source: failure.cause,
                })
            }
            _ => Err(ContainerError::Multiple(failures)),
        }
    }

    fn requeue_front(&self, batch: &[ContainerUpdate]) {
        let mut queue = self.queue.lock();
        let mut states = self.states.lock();
        for update in batch.iter().rev() {
            if queue.iter().any(|r| r.project == update.project) {
                continue;
            }
            states.insert(update.project.clone(), RequestState::Queued);
            queue.push_front(ContainerRequest {
                project: update.project.clone(),
                previous: None,
            });
        }
    }

    fn resolve(&self, request: &ContainerRequest) -> Result<Outcome, ClasspathError> {
        let project = request.project.as_str();
        if !self.ctx.workspace.is_open(project) {
            tracing::debug!(target = "pde.container", project, "skipping closed or missing project");
            return Ok(Outcome::Skipped);
        }
        let plugin = self
            .ctx
            .universe
            .find_by_project(project)
            .filter(|plugin| plugin.loaded)
            .ok_or_else(|| ClasspathError::NoPlugin {
                project: project.to_string(),
            })?;

        let entries = ClasspathResolver::new(&self.ctx).required_plugin_entries(&plugin);
        let previous = match &request.previous {
            Some(previous) => Some(previous.clone()),
            None => self.store.load(project),
        };
        if previous.as_deref() == Some(entries.as_slice()) {
            return Ok(Outcome::Unchanged);
        }
        Ok(Outcome::Updated(entries))
    }

    /// Shows each open project's last snapshot as its container value until a pass replaces it.
    ///
    /// Projects that already have container contents are left alone. Returns how many were
    /// restored.
    pub fn restore_placeholders(&self) -> Result<usize, ContainerError> {
        let mut updates = Vec::new();
        for model in self.ctx.universe.workspace_models() {
            let Some(project) = model.project() else { continue };
            if !self.ctx.workspace.is_open(project)
                || self.ctx.java.container_entries(project).is_some()
            {
                continue;
            }
            if let Some(entries) = self.store.load(project) {
                updates.push(ContainerUpdate {
                    project: project.to_string(),
                    entries,
                });
            }
        }
        let restored = updates.len();
        if restored > 0 {
            self.ctx.java.set_container_entries(updates)?;
        }
        tracing::debug!(target = "pde.container", restored, "restored container placeholders");
        Ok(restored)
    }

    /// Reacts to a VM install change. Bursts collapse into one job that refreshes every
    /// plug-in project's raw classpath and then re-resolves all containers.
    pub fn vm_changed(self: &Arc<Self>) -> KeyedDebouncedHandle {
        let this = Arc::clone(self);
        self.vm_debouncer.debounce(VM_CHANGE_KEY, move |token| {
            check_cancelled(&token)?;
            this.refresh_raw_classpaths(&token)?;
            this.request_all();
            this.schedule();
            Ok(())
        })
    }

    fn refresh_raw_classpaths(&self, token: &CancellationToken) -> Result<(), Cancelled> {
        let _guard = self.lock.acquire(LOCK_HOLDER);
        let resolver = ClasspathResolver::new(&self.ctx);
        for model in self.ctx.universe.workspace_models() {
            check_cancelled(token)?;
            let Some(project) = model.project() else { continue };
            let Some(raw) = self.ctx.java.raw_classpath(project) else { continue };
            let dynamic = raw
                .iter()
                .any(|entry| entry.path.as_str() == REQUIRED_PLUGINS_CONTAINER);
            let mode = if dynamic {
                ResolveMode::Dynamic
            } else {
                ResolveMode::Explicit
            };
            if let Err(err) = resolver.refresh_classpath(project, mode) {
                tracing::warn!(
                    target = "pde.container",
                    project,
                    error = %err,
                    "failed to refresh classpath after VM change"
                );
            }
        }
        Ok(())
    }
}
