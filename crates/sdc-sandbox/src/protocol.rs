//! waPC-style guest call protocol.
//!
//! The host passes the operation name and payload to the guest through
//! `__guest_request`, the guest hands back a response or error through
//! `__guest_response` / `__guest_error`, and may issue synchronous
//! callbacks through `__host_call` while the invocation is running.
//! All functions live in the `wapc` import namespace.

use crate::GuestState;
use thiserror::Error;
use wasmtime::{Caller, Extern, Linker, Memory};

const IMPORT_MODULE: &str = "wapc";

/// Failure modes of a host callback, distinguished so the sandbox can
/// report an allow-list rejection differently from an operation that
/// was accepted but failed.
#[derive(Debug, Error)]
pub enum HostCallError {
    #[error("unrecognised binding '{0}'")]
    UnrecognisedBinding(String),
    #[error("unrecognised operation '{namespace}/{operation}'")]
    UnrecognisedOperation { namespace: String, operation: String },
    #[error("{0}")]
    Failed(String),
}

/// Per-invocation buffers shared between host functions.
pub(crate) struct CallState {
    operation: Vec<u8>,
    payload: Vec<u8>,
    guest_response: Option<Vec<u8>>,
    guest_error: Option<String>,
    host_response: Vec<u8>,
    host_error: Option<String>,
}

impl CallState {
    pub(crate) fn new(operation: &str, payload: &[u8]) -> Self {
        Self {
            operation: operation.as_bytes().to_vec(),
            payload: payload.to_vec(),
            guest_response: None,
            guest_error: None,
            host_response: Vec::new(),
            host_error: None,
        }
    }

    pub(crate) fn take_guest_response(mut self) -> Vec<u8> {
        self.guest_response.take().unwrap_or_default()
    }

    pub(crate) fn take_guest_error(mut self) -> Option<String> {
        self.guest_error.take()
    }
}

fn guest_memory(caller: &mut Caller<'_, GuestState>) -> Result<Memory, wasmtime::Error> {
    caller
        .get_export("memory")
        .and_then(Extern::into_memory)
        .ok_or_else(|| anyhow::anyhow!("guest does not export 'memory'"))
}

fn read_bytes(
    caller: &mut Caller<'_, GuestState>,
    memory: &Memory,
    ptr: i32,
    len: i32,
) -> Result<Vec<u8>, wasmtime::Error> {
    let ptr = usize::try_from(ptr).map_err(|_| anyhow::anyhow!("negative guest pointer"))?;
    let len = usize::try_from(len).map_err(|_| anyhow::anyhow!("negative guest length"))?;
    // Bounds-check before allocating; the guest picks `len`.
    let size = memory.data_size(&mut *caller);
    if ptr.checked_add(len).is_none_or(|end| end > size) {
        anyhow::bail!("guest range {ptr}+{len} is outside linear memory");
    }
    let mut buf = vec![0u8; len];
    memory.read(&mut *caller, ptr, &mut buf)?;
    Ok(buf)
}

fn read_string(
    caller: &mut Caller<'_, GuestState>,
    memory: &Memory,
    ptr: i32,
    len: i32,
) -> Result<String, wasmtime::Error> {
    let bytes = read_bytes(caller, memory, ptr, len)?;
    String::from_utf8(bytes).map_err(|_| anyhow::anyhow!("guest string is not valid utf-8"))
}

fn write_bytes(
    caller: &mut Caller<'_, GuestState>,
    memory: &Memory,
    ptr: i32,
    bytes: &[u8],
) -> Result<(), wasmtime::Error> {
    let ptr = usize::try_from(ptr).map_err(|_| anyhow::anyhow!("negative guest pointer"))?;
    memory.write(&mut *caller, ptr, bytes)?;
    Ok(())
}

/// Register the protocol's host functions on the linker.
pub(crate) fn add_to_linker(linker: &mut Linker<GuestState>) -> Result<(), wasmtime::Error> {
    linker.func_wrap(
        IMPORT_MODULE,
        "__guest_request",
        |mut caller: Caller<'_, GuestState>, operation_ptr: i32, payload_ptr: i32| {
            let memory = guest_memory(&mut caller)?;
            let operation = caller.data().call.operation.clone();
            let payload = caller.data().call.payload.clone();
            write_bytes(&mut caller, &memory, operation_ptr, &operation)?;
            write_bytes(&mut caller, &memory, payload_ptr, &payload)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__guest_response",
        |mut caller: Caller<'_, GuestState>, ptr: i32, len: i32| {
            let memory = guest_memory(&mut caller)?;
            let response = read_bytes(&mut caller, &memory, ptr, len)?;
            caller.data_mut().call.guest_response = Some(response);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__guest_error",
        |mut caller: Caller<'_, GuestState>, ptr: i32, len: i32| {
            let memory = guest_memory(&mut caller)?;
            let message = read_string(&mut caller, &memory, ptr, len)?;
            caller.data_mut().call.guest_error = Some(message);
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__host_call",
        |mut caller: Caller<'_, GuestState>,
         binding_ptr: i32,
         binding_len: i32,
         namespace_ptr: i32,
         namespace_len: i32,
         operation_ptr: i32,
         operation_len: i32,
         payload_ptr: i32,
         payload_len: i32|
         -> Result<i32, wasmtime::Error> {
            let memory = guest_memory(&mut caller)?;
            let binding = read_string(&mut caller, &memory, binding_ptr, binding_len)?;
            let namespace = read_string(&mut caller, &memory, namespace_ptr, namespace_len)?;
            let operation = read_string(&mut caller, &memory, operation_ptr, operation_len)?;
            let payload = read_bytes(&mut caller, &memory, payload_ptr, payload_len)?;

            let state = caller.data_mut();
            match state.host.call(&binding, &namespace, &operation, &payload) {
                Ok(response) => {
                    state.call.host_error = None;
                    state.call.host_response = response;
                    Ok(1)
                }
                Err(err) => {
                    log::debug!(
                        "host call {binding}/{namespace}/{operation} rejected: {err}"
                    );
                    state.call.host_response.clear();
                    state.call.host_error = Some(err.to_string());
                    Ok(0)
                }
            }
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__host_response_len",
        |caller: Caller<'_, GuestState>| -> i32 {
            caller.data().call.host_response.len() as i32
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__host_response",
        |mut caller: Caller<'_, GuestState>, ptr: i32| {
            let memory = guest_memory(&mut caller)?;
            let response = caller.data().call.host_response.clone();
            write_bytes(&mut caller, &memory, ptr, &response)?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__host_error_len",
        |caller: Caller<'_, GuestState>| -> i32 {
            caller
                .data()
                .call
                .host_error
                .as_ref()
                .map(|e| e.len() as i32)
                .unwrap_or(0)
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__host_error",
        |mut caller: Caller<'_, GuestState>, ptr: i32| {
            let memory = guest_memory(&mut caller)?;
            let error = caller
                .data()
                .call
                .host_error
                .clone()
                .unwrap_or_default();
            write_bytes(&mut caller, &memory, ptr, error.as_bytes())?;
            Ok(())
        },
    )?;

    linker.func_wrap(
        IMPORT_MODULE,
        "__console_log",
        |mut caller: Caller<'_, GuestState>, ptr: i32, len: i32| {
            let memory = guest_memory(&mut caller)?;
            let message = read_string(&mut caller, &memory, ptr, len)?;
            log::info!("plugin: {message}");
            Ok(())
        },
    )?;

    Ok(())
}
