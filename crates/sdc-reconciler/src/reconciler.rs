//! The reconciliation state machine for `Resource` objects.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sdc_api::{
    reason, ConditionStatus, Resource, READY_CONDITION, RECONCILING_CONDITION, STALLED_CONDITION,
};
use sdc_model::Identity;
use sdc_sandbox::SandboxError;

use crate::error::ReconcileError;
use crate::materialize::{materialize, WorkingDirectory};
use crate::pipeline::MiddlewarePipeline;
use crate::resolver::find_descriptor;
use crate::snapshot::generate_snapshot_name;
use crate::status::{mark_as_stalled, mark_not_ready};
use crate::traits::{ClusterClient, EventRecorder, ModelClient, Severity, SnapshotWriter};

/// Scheduling decision returned by a reconciliation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Re-run immediately, without waiting for the poll interval.
    pub requeue: bool,
    /// Re-run after this delay. `None` with `requeue` unset means the
    /// object is parked until its spec changes.
    pub requeue_after: Option<Duration>,
}

impl Outcome {
    /// Park the object; nothing schedules another attempt.
    pub fn none() -> Self {
        Self {
            requeue: false,
            requeue_after: None,
        }
    }

    /// Re-run as soon as possible.
    pub fn requeue_now() -> Self {
        Self {
            requeue: true,
            requeue_after: None,
        }
    }

    /// Re-run after `delay`, the shape of a successful attempt.
    pub fn after(delay: Duration) -> Self {
        Self {
            requeue: false,
            requeue_after: Some(delay),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    /// Requeue interval used when an object does not declare one.
    pub default_requeue: Duration,
    /// Defensive cap on reference path length.
    pub max_reference_depth: usize,
}

impl Default for ReconcilerOptions {
    fn default() -> Self {
        Self {
            default_requeue: Duration::from_secs(600),
            max_reference_depth: 30,
        }
    }
}

/// Drives a `Resource` object towards a published snapshot of its
/// declared content.
///
/// One call to [`ResourceReconciler::reconcile`] is one attempt. The
/// caller owns scheduling; the returned [`Outcome`] says when to come
/// back.
pub struct ResourceReconciler {
    cluster: Arc<dyn ClusterClient>,
    model: Arc<dyn ModelClient>,
    snapshots: Arc<dyn SnapshotWriter>,
    recorder: Arc<dyn EventRecorder>,
    pipeline: MiddlewarePipeline,
    options: ReconcilerOptions,
}

impl ResourceReconciler {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        model: Arc<dyn ModelClient>,
        snapshots: Arc<dyn SnapshotWriter>,
        recorder: Arc<dyn EventRecorder>,
        options: ReconcilerOptions,
    ) -> Result<Self, SandboxError> {
        Ok(Self {
            cluster,
            model,
            snapshots,
            recorder,
            pipeline: MiddlewarePipeline::new()?,
            options,
        })
    }

    /// Run one reconciliation attempt against `object`, mutating its
    /// status in place and persisting it before returning.
    pub fn reconcile(&self, object: &mut Resource) -> Result<Outcome, ReconcileError> {
        if object.spec.suspend {
            tracing::info!(
                name = %object.name,
                namespace = %object.namespace,
                "object is suspended, skipping reconciliation"
            );
            return Ok(Outcome::none());
        }

        // A freshly created object first gets its stable snapshot
        // identity persisted, then re-enters for the real attempt.
        if object.status.snapshot_name.is_empty() {
            object.status.snapshot_name =
                generate_snapshot_name(&object.name, &object.namespace);
            return self.finalize(object, Ok(Outcome::requeue_now()));
        }

        let attempt = self.reconcile_object(object);
        self.finalize(object, attempt)
    }

    fn reconcile_object(&self, object: &mut Resource) -> Result<Outcome, ReconcileError> {
        object
            .status
            .conditions
            .mark_reconciling(reason::PROGRESSING, "reconciliation in progress");
        if object.generation != object.status.observed_generation {
            object.status.conditions.mark_reconciling(
                reason::PROGRESSING,
                format!(
                    "processing object: new generation {} -> {}",
                    object.status.observed_generation, object.generation
                ),
            );
        }
        // A new attempt starts from a clean slate: Stalled is cleared
        // and Ready is re-derived during finalization, so a stale
        // verdict from the previous attempt never leaks through.
        object.status.conditions.delete(STALLED_CONDITION);
        object.status.conditions.delete(READY_CONDITION);

        let namespace = object
            .spec
            .source_ref
            .namespace
            .clone()
            .unwrap_or_else(|| object.namespace.clone());
        let name = object.spec.source_ref.name.clone();

        let component = match self.cluster.get_component(&namespace, &name) {
            Ok(Some(component)) => component,
            Ok(None) => {
                let err = ReconcileError::GetComponent {
                    namespace,
                    name,
                    source: anyhow::anyhow!("component object not found"),
                };
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_RESOURCE_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
            Err(source) => {
                let err = ReconcileError::GetComponent {
                    namespace,
                    name,
                    source,
                };
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_RESOURCE_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
        };

        // Context creation failure is soft. The condition records it
        // and the attempt proceeds unauthenticated.
        let context = match self.model.create_authenticated_context(&component) {
            Ok(context) => Some(context),
            Err(err) => {
                let message = format!("failed to create authenticated client: {err}");
                tracing::warn!(%message, "continuing without authenticated context");
                object.status.conditions.mark_false(
                    READY_CONDITION,
                    reason::AUTHENTICATED_CONTEXT_CREATION_FAILED,
                    message,
                );
                None
            }
        };

        let component_version = match self
            .model
            .get_component_version(context.as_deref(), &component)
        {
            Ok(component_version) => component_version,
            Err(source) => {
                let err = ReconcileError::GetComponentVersion(source);
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_RESOURCE_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
        };

        let resource_ref = object.spec.source_ref.resource_ref.clone();
        let resource = match component_version.get_resource(&resource_ref.name) {
            Ok(resource) => resource,
            Err(source) => {
                let err = ReconcileError::GetResource(source);
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_RESOURCE_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
        };

        let workdir = match WorkingDirectory::create() {
            Ok(workdir) => workdir,
            Err(source) => {
                let err = ReconcileError::from(source);
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_RESOURCE_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
        };
        if let Err(source) = materialize(resource.as_ref(), workdir.path()) {
            let err = ReconcileError::from(source);
            mark_not_ready(
                self.recorder.as_ref(),
                object,
                reason::GET_RESOURCE_FAILED,
                &err.to_string(),
            );
            return Err(err);
        }

        if let Err(source) = self.pipeline.run(
            context.as_deref(),
            &object.spec.middleware,
            workdir.path(),
            &component_version,
        ) {
            let err = ReconcileError::from(source);
            mark_not_ready(
                self.recorder.as_ref(),
                object,
                reason::GET_RESOURCE_FAILED,
                &err.to_string(),
            );
            return Err(err);
        }

        let descriptor = match find_descriptor(
            self.cluster.as_ref(),
            &resource_ref.reference_path,
            &component.status.component_descriptor,
            self.options.max_reference_depth,
        ) {
            Ok(Some(descriptor)) => descriptor,
            Ok(None) => {
                let message = format!(
                    "couldn't find component descriptor for reference '{:?}' or any root components",
                    resource_ref.reference_path
                );
                mark_as_stalled(
                    self.recorder.as_ref(),
                    object,
                    reason::COMPONENT_DESCRIPTOR_NOT_FOUND,
                    &message,
                );
                return Ok(Outcome::none());
            }
            Err(err) => {
                mark_not_ready(
                    self.recorder.as_ref(),
                    object,
                    reason::GET_COMPONENT_DESCRIPTOR_FAILED,
                    &err.to_string(),
                );
                return Err(err);
            }
        };

        let version = resource_ref
            .version
            .clone()
            .unwrap_or_else(|| "latest".to_string());
        let mut identity = Identity::new(
            &descriptor.name,
            &descriptor.version,
            &resource_ref.name,
            &version,
        );
        for (key, value) in &resource_ref.extra_identity {
            identity.insert(key, value);
        }

        if object.status.snapshot_name.is_empty() {
            return Err(ReconcileError::MissingSnapshotName);
        }

        if let Err(source) = self.snapshots.write(object, workdir.path(), &identity) {
            let err = ReconcileError::WriteSnapshot(source);
            mark_not_ready(
                self.recorder.as_ref(),
                object,
                reason::GET_RESOURCE_FAILED,
                &err.to_string(),
            );
            return Err(err);
        }

        object.status.last_applied_resource_version = version;
        object.status.last_applied_component_version =
            component.status.reconciled_version.clone();
        object.status.observed_generation = object.generation;

        tracing::info!(
            name = %object.name,
            namespace = %object.namespace,
            snapshot = %object.status.snapshot_name,
            "successfully reconciled resource"
        );
        Ok(Outcome::after(self.interval(object)))
    }

    /// Summarize conditions and persist status. Runs for every
    /// attempt, whatever its result, except the suspend no-op.
    fn finalize(
        &self,
        object: &mut Resource,
        attempt: Result<Outcome, ReconcileError>,
    ) -> Result<Outcome, ReconcileError> {
        let (outcome, mut error) = match attempt {
            Ok(outcome) => (outcome, None),
            Err(err) => (Outcome::none(), Some(err)),
        };

        // Stalled and Reconciling are mutually exclusive.
        if object.status.conditions.is_true(STALLED_CONDITION) {
            object.status.conditions.delete(RECONCILING_CONDITION);
        }

        let interval = self.interval(object);
        let success_shape =
            error.is_none() && !outcome.requeue && outcome.requeue_after == Some(interval);

        if success_shape {
            object.status.conditions.delete(RECONCILING_CONDITION);
            // A clean outcome with Ready=False is a contradiction;
            // surface the recorded failure as the attempt error.
            if let Some(ready) = object.status.conditions.get(READY_CONDITION) {
                if ready.status == ConditionStatus::False
                    && !object.status.conditions.is_true(STALLED_CONDITION)
                {
                    error = Some(ReconcileError::NotReady(ready.message.clone()));
                }
            }
        }

        // A Reconciling condition surviving to this point means the
        // attempt ended early and will be retried.
        if let Some(reconciling) = object.status.conditions.get(RECONCILING_CONDITION) {
            let mut updated = reconciling.clone();
            updated.reason = reason::PROGRESSING_WITH_RETRY.to_string();
            object.status.conditions.set(updated);
        }

        if !object.status.conditions.has(RECONCILING_CONDITION)
            && !object.status.conditions.is_true(STALLED_CONDITION)
            && error.is_none()
            && outcome.requeue_after == Some(interval)
        {
            object.status.conditions.mark_true(
                READY_CONDITION,
                reason::SUCCEEDED,
                "Reconciliation success",
            );
        }

        // Terminal states have fully processed the current spec.
        if object.status.conditions.is_true(STALLED_CONDITION)
            || object.status.conditions.is_true(READY_CONDITION)
        {
            object.status.observed_generation = object.generation;
        }

        if error.is_none()
            && (object.status.conditions.is_true(STALLED_CONDITION)
                || object.status.conditions.is_true(READY_CONDITION))
        {
            let mut metadata = BTreeMap::new();
            metadata.insert(
                "resourceVersion".to_string(),
                object.status.last_applied_resource_version.clone(),
            );
            self.recorder.event(
                object,
                Severity::Info,
                &format!("Reconciliation finished, next run in {interval:?}"),
                Some(metadata),
            );
        }

        if let Err(patch) = self.cluster.patch_status(object) {
            error = Some(match error {
                Some(attempt) => ReconcileError::StatusPatchCombined {
                    attempt: Box::new(attempt),
                    patch,
                },
                None => ReconcileError::StatusPatch(patch),
            });
        }

        match error {
            Some(err) => Err(err),
            None => Ok(outcome),
        }
    }

    fn interval(&self, object: &Resource) -> Duration {
        if object.spec.interval_seconds == 0 {
            self.options.default_requeue
        } else {
            object.requeue_after()
        }
    }
}
