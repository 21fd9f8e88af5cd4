//! The middleware pipeline: sandboxed transformation plugins applied
//! to the working directory in declared order.

use std::path::Path;
use std::sync::Arc;

use sdc_api::MiddlewareSpec;
use sdc_model::dereference;
use sdc_sandbox::{HostCall, HostCallError, InvokeRequest, PluginRuntime, SandboxError};

use crate::error::PipelineError;
use crate::traits::{ComponentVersion, ModelContext};

/// Binding name plugins use to reach the host API.
pub const HOST_BINDING: &str = "sdc.dev";

/// Entry operation every plugin must handle.
const HANDLER_OPERATION: &str = "handler";

pub(crate) struct MiddlewarePipeline {
    runtime: PluginRuntime,
}

impl MiddlewarePipeline {
    pub(crate) fn new() -> Result<Self, SandboxError> {
        Ok(Self {
            runtime: PluginRuntime::new()?,
        })
    }

    /// Apply every middleware entry to the working directory, in
    /// declared order. The first faulting entry aborts the run and
    /// later entries never execute.
    pub(crate) fn run(
        &self,
        context: Option<&dyn ModelContext>,
        middleware: &[MiddlewareSpec],
        workdir: &Path,
        component_version: &Arc<dyn ComponentVersion>,
    ) -> Result<(), PipelineError> {
        for entry in middleware {
            let context = context
                .ok_or_else(|| PipelineError::MissingContext(entry.name.clone()))?;

            let (hosting_name, hosting_version) = entry
                .component
                .split_once(':')
                .ok_or_else(|| PipelineError::InvalidComponentRef(entry.component.clone()))?;

            let hosting = context
                .lookup_component_version(&entry.registry, hosting_name, hosting_version)
                .map_err(|source| PipelineError::Resolve {
                    component: entry.component.clone(),
                    source,
                })?;

            let plugin = hosting
                .get_resource(&entry.name)
                .and_then(|resource| resource.get())
                .map_err(|source| PipelineError::FetchPlugin {
                    name: entry.name.clone(),
                    source,
                })?;

            let payload = serde_json::to_vec(&entry.values)?;
            let host = Box::new(ModelHostApi {
                component_version: component_version.clone(),
            });

            let response = self
                .runtime
                .invoke(
                    &plugin,
                    InvokeRequest {
                        operation: HANDLER_OPERATION,
                        payload: &payload,
                        mount: workdir,
                    },
                    host,
                )
                .map_err(|source| PipelineError::Sandbox {
                    name: entry.name.clone(),
                    source,
                })?;

            if !response.stdout.is_empty() {
                tracing::debug!(
                    middleware = %entry.name,
                    stdout = %String::from_utf8_lossy(&response.stdout),
                    "plugin stdout"
                );
            }
            if !response.stderr.is_empty() {
                tracing::debug!(
                    middleware = %entry.name,
                    stderr = %String::from_utf8_lossy(&response.stderr),
                    "plugin stderr"
                );
            }
            tracing::info!(middleware = %entry.name, "middleware applied");
        }
        Ok(())
    }
}

/// Host API reachable from plugins. A strict allow-list: one binding,
/// one operation.
struct ModelHostApi {
    component_version: Arc<dyn ComponentVersion>,
}

impl HostCall for ModelHostApi {
    fn call(
        &mut self,
        binding: &str,
        namespace: &str,
        operation: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, HostCallError> {
        if binding != HOST_BINDING {
            return Err(HostCallError::UnrecognisedBinding(binding.to_string()));
        }
        match (namespace, operation) {
            ("get", "resource") => {
                let name = std::str::from_utf8(payload)
                    .map_err(|_| HostCallError::Failed("resource name is not valid utf-8".into()))?;
                let resource = self
                    .component_version
                    .get_resource(name)
                    .map_err(|err| HostCallError::Failed(err.to_string()))?;
                let access = resource
                    .access()
                    .map_err(|err| HostCallError::Failed(err.to_string()))?;
                let reference = dereference(&access)
                    .map_err(|err| HostCallError::Failed(err.to_string()))?;
                Ok(reference.into_bytes())
            }
            _ => Err(HostCallError::UnrecognisedOperation {
                namespace: namespace.to_string(),
                operation: operation.to_string(),
            }),
        }
    }
}
