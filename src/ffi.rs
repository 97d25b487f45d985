use crate::Message::Router;
use crate::Message::Structs::MessageBuffer::MessageBuffer;
use crate::config::NodeConfig;
use crate::error::RouterError;
use std::ptr;
use tracing::warn;

// Status codes. Failures use `RouterError::code()`.
pub const HDF_ROUTER_SUCCESS: i32 = 0;

fn to_code(result: Result<(), RouterError>) -> i32 {
    match result {
        Ok(()) => HDF_ROUTER_SUCCESS,
        Err(e) => e.code(),
    }
}

// -----------------------------------------------------------------------------
// Lifecycle API
// -----------------------------------------------------------------------------

/// Start the message router.
///
/// # Arguments
/// * `node_config` - `NodeConfig` bits; unknown bits are ignored.
///
/// # Returns
/// * 0 on success, negative error code otherwise.
#[no_mangle]
pub extern "C" fn hdf_router_start(node_config: u32) -> i32 {
    let config = NodeConfig::from_bits_truncate(node_config) | NodeConfig::LOCAL;
    to_code(Router::start_message_router(config))
}

/// Create the default dispatcher.
#[no_mangle]
pub extern "C" fn hdf_router_enable_default_dispatcher() -> i32 {
    to_code(Router::enable_default_dispatcher())
}

/// Stop the message router, releasing every service and dispatcher.
#[no_mangle]
pub extern "C" fn hdf_router_shutdown() -> i32 {
    to_code(Router::shutdown_message_router())
}

// -----------------------------------------------------------------------------
// Dispatch API
// -----------------------------------------------------------------------------

/// Invoke a command by its encoded id and wait for the response.
///
/// # Arguments
/// * `client_handle` - Opaque caller identity, visible to the handler.
/// * `encoded_id` - Service id in the high bits, command id in the low 16 bits.
/// * `req` - Request bytes (may be NULL when `req_len` is 0).
/// * `req_len` - Length of the request.
/// * `rsp` - Buffer to write the response into (may be NULL to query the size).
/// * `rsp_len` - Input: size of `rsp`, Output: size of the response.
///
/// # Returns
/// * 0 on success.
/// * The handler's status or a routing error code if the call failed.
///   Nothing is copied into `rsp`.
/// * `RouterError::ResourceExhausted` code if the call succeeded but `rsp`
///   is too small; `*rsp_len` then holds the needed size.
#[no_mangle]
pub extern "C" fn hdf_router_dispatch(
    client_handle: u64,
    encoded_id: u32,
    req: *const u8,
    req_len: usize,
    rsp: *mut u8,
    rsp_len: *mut usize,
) -> i32 {
    if rsp_len.is_null() || (req.is_null() && req_len != 0) {
        return RouterError::NullInput.code();
    }

    let request = if req_len == 0 {
        MessageBuffer::new()
    } else {
        let slice = unsafe { std::slice::from_raw_parts(req, req_len) };
        MessageBuffer::from(slice)
    };
    let max_len = unsafe { *rsp_len };

    let mut response = MessageBuffer::new();
    let status = Router::dispatch_to_message(
        client_handle,
        encoded_id,
        Some(&request),
        Some(&mut response),
    );

    let data = response.as_bytes();
    unsafe { *rsp_len = data.len() };
    if status.is_err() {
        return to_code(status);
    }
    if data.len() > max_len {
        warn!(needed = data.len(), available = max_len, "dispatch response truncated");
        return RouterError::ResourceExhausted.code();
    }
    if !rsp.is_null() && !data.is_empty() {
        unsafe {
            ptr::copy_nonoverlapping(data.as_ptr(), rsp, data.len());
        }
    }
    HDF_ROUTER_SUCCESS
}
