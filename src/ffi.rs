//! FFI bindings for Health Metrics Core
//!
//! C-compatible entry points so host plugins (Kotlin/Swift) can call the
//! consolidation core directly. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `hm_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::consolidate::consolidate_if_needed;
use crate::records::RecordEncoder;
use crate::types::{MetricType, MobilePlatform, Sample};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Consolidate a JSON array of samples and return the consolidated array.
///
/// Input element shape: `{"source_id", "start_time", "end_time", "value"}`
/// with RFC 3339 instants.
///
/// # Safety
/// - `json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `hm_free_string`.
/// - Returns NULL on error; call `hm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hm_consolidate_samples(json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let samples: Vec<Sample> = match serde_json::from_str(&json_str) {
        Ok(samples) => samples,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let consolidated = consolidate_if_needed(samples);
    match serde_json::to_string(&consolidated) {
        Ok(out) => string_to_cstr(&out),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Consolidate samples and encode them as an outbound metrics payload.
///
/// `metric` is a backend metric name (e.g., "STEP"), `platform` is
/// "ANDROID" or "IOS".
///
/// # Safety
/// - `json`, `metric`, and `platform` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `hm_free_string`.
/// - Returns NULL on error; call `hm_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn hm_samples_to_payload(
    json: *const c_char,
    metric: *const c_char,
    platform: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return ptr::null_mut();
        }
    };

    let metric = match cstr_to_string(metric).as_deref().map(MetricType::parse) {
        Some(Ok(metric)) => metric,
        Some(Err(e)) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
        None => {
            set_last_error("Invalid metric string pointer");
            return ptr::null_mut();
        }
    };

    let platform = match cstr_to_string(platform).as_deref() {
        Some("ANDROID") => MobilePlatform::Android,
        Some("IOS") => MobilePlatform::Ios,
        Some(other) => {
            set_last_error(&format!("Unknown platform: {other}"));
            return ptr::null_mut();
        }
        None => {
            set_last_error("Invalid platform string pointer");
            return ptr::null_mut();
        }
    };

    let samples: Vec<Sample> = match serde_json::from_str(&json_str) {
        Ok(samples) => samples,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let consolidated = consolidate_if_needed(samples);
    let payload = RecordEncoder::new(platform).payload(metric, &consolidated);
    match serde_json::to_string(&payload) {
        Ok(out) => string_to_cstr(&out),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by this library.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a library function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn hm_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next library call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn hm_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn hm_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
