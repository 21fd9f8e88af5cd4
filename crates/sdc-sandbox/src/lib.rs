//! Sandboxed execution of middleware plugin modules.
//!
//! Each invocation gets a fresh, memory-isolated instance whose only
//! filesystem view is the working directory, mounted read/write at
//! [`GUEST_MOUNT`]. Plugins talk to the host exclusively through the
//! waPC-style call protocol in [`protocol`]; the set of host
//! operations reachable through it is decided by the [`HostCall`]
//! implementation the caller supplies, not by this crate.

mod protocol;

use std::path::Path;

use thiserror::Error;
use wasmtime::{Config, Engine, Linker, Module, Store};
use wasmtime_wasi::p2::pipe::MemoryOutputPipe;
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::{DirPerms, FilePerms, WasiCtxBuilder};

pub use protocol::HostCallError;

/// Guest path the working directory is mounted at.
pub const GUEST_MOUNT: &str = "/data";

/// Entry export every plugin must provide.
pub const GUEST_CALL_EXPORT: &str = "__guest_call";

/// Cap on captured stdout/stderr per invocation.
const MAX_CAPTURED_OUTPUT: usize = 256 * 1024;

/// Synchronous callback surface the guest can reach through
/// `__host_call`. Implementations are expected to be explicit
/// allow-lists keyed on (binding, namespace, operation).
pub trait HostCall: Send {
    fn call(
        &mut self,
        binding: &str,
        namespace: &str,
        operation: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, HostCallError>;
}

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to configure sandbox engine: {0}")]
    Engine(#[source] wasmtime::Error),
    #[error("failed to compile plugin module: {0}")]
    Compile(#[source] wasmtime::Error),
    #[error("failed to mount working directory: {0}")]
    Mount(#[source] wasmtime::Error),
    #[error("failed to link host imports: {0}")]
    Link(#[source] wasmtime::Error),
    #[error("failed to instantiate plugin module: {0}")]
    Instantiate(#[source] wasmtime::Error),
    #[error("plugin does not export '{0}'")]
    MissingExport(&'static str),
    #[error("plugin invocation faulted: {0}")]
    Invoke(#[source] wasmtime::Error),
    #[error("plugin reported failure: {0}")]
    Guest(String),
}

/// One invocation of a plugin's entry capability.
#[derive(Debug, Clone, Copy)]
pub struct InvokeRequest<'a> {
    /// Entry operation name, `handler` for middleware plugins.
    pub operation: &'a str,
    /// Opaque configuration payload handed to the guest.
    pub payload: &'a [u8],
    /// Host directory mounted read/write at [`GUEST_MOUNT`].
    pub mount: &'a Path,
}

/// Result of a successful invocation, including captured stdio for
/// diagnostics.
#[derive(Debug)]
pub struct InvokeResponse {
    pub payload: Vec<u8>,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

pub(crate) struct GuestState {
    wasi: WasiP1Ctx,
    call: protocol::CallState,
    host: Box<dyn HostCall>,
}

/// Wasmtime wrapper that runs one plugin invocation per instance.
///
/// The engine is shared across invocations; modules, stores and
/// instances are not — nothing survives from one middleware entry to
/// the next except the mounted directory's file contents.
pub struct PluginRuntime {
    engine: Engine,
}

impl PluginRuntime {
    /// Build a runtime with deterministic configuration (no threads,
    /// no fuel, no debug info). Wall-clock access stays ambient.
    pub fn new() -> Result<Self, SandboxError> {
        let mut cfg = Config::new();
        cfg.wasm_multi_value(true);
        cfg.wasm_threads(false);
        cfg.wasm_reference_types(true);
        cfg.consume_fuel(false);
        cfg.debug_info(false);
        cfg.cranelift_nan_canonicalization(true);
        let engine = Engine::new(&cfg).map_err(SandboxError::Engine)?;
        Ok(Self { engine })
    }

    /// Load `wasm`, mount the request's directory, and call the
    /// guest's entry export exactly once. The instance and module are
    /// torn down before this returns.
    pub fn invoke(
        &self,
        wasm: &[u8],
        request: InvokeRequest<'_>,
        host: Box<dyn HostCall>,
    ) -> Result<InvokeResponse, SandboxError> {
        let module = Module::new(&self.engine, wasm).map_err(SandboxError::Compile)?;

        let stdout = MemoryOutputPipe::new(MAX_CAPTURED_OUTPUT);
        let stderr = MemoryOutputPipe::new(MAX_CAPTURED_OUTPUT);

        let mut builder = WasiCtxBuilder::new();
        builder.stdout(stdout.clone());
        builder.stderr(stderr.clone());
        builder
            .preopened_dir(request.mount, GUEST_MOUNT, DirPerms::all(), FilePerms::all())
            .map_err(SandboxError::Mount)?;
        let wasi = builder.build_p1();

        let state = GuestState {
            wasi,
            call: protocol::CallState::new(request.operation, request.payload),
            host,
        };

        let mut linker: Linker<GuestState> = Linker::new(&self.engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |state: &mut GuestState| {
            &mut state.wasi
        })
        .map_err(SandboxError::Link)?;
        protocol::add_to_linker(&mut linker).map_err(SandboxError::Link)?;

        let mut store = Store::new(&self.engine, state);
        let instance = linker
            .instantiate(&mut store, &module)
            .map_err(SandboxError::Instantiate)?;

        // Reactor-style modules initialise before the first call.
        if let Ok(initialize) = instance.get_typed_func::<(), ()>(&mut store, "_initialize") {
            initialize.call(&mut store, ()).map_err(SandboxError::Invoke)?;
        }

        let guest_call = instance
            .get_typed_func::<(i32, i32), i32>(&mut store, GUEST_CALL_EXPORT)
            .map_err(|_| SandboxError::MissingExport(GUEST_CALL_EXPORT))?;

        let operation_len = request.operation.len() as i32;
        let payload_len = request.payload.len() as i32;
        let success = guest_call
            .call(&mut store, (operation_len, payload_len))
            .map_err(SandboxError::Invoke)?;

        let state = store.into_data();
        let stdout = stdout.contents().to_vec();
        let stderr = stderr.contents().to_vec();

        if success == 1 {
            Ok(InvokeResponse {
                payload: state.call.take_guest_response(),
                stdout,
                stderr,
            })
        } else {
            let detail = state
                .call
                .take_guest_error()
                .unwrap_or_else(|| "guest call failed without error detail".to_string());
            log::debug!("plugin stderr: {}", String::from_utf8_lossy(&stderr));
            Err(SandboxError::Guest(detail))
        }
    }
}
