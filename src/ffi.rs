//! FFI bindings for CardioZone
//!
//! This module provides C-compatible functions so a host UI (mobile or desktop)
//! can compute zones and drive a workout session from its own 1-second timer.
//! All functions use C strings (null-terminated) and return allocated memory that
//! must be freed by the caller using `cz_free_string`.
//!
//! The host is responsible for speech: `cz_session_tick` returns the tick report
//! as JSON, including any announcement the session decided on.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use serde::Serialize;

use crate::config::SessionConfig;
use crate::error::WorkoutError;
use crate::session::WorkoutSession;
use crate::types::{Gender, HeartRateZone};
use crate::zones::{calculate_zones, max_heart_rate};

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

/// Serialize a value into a newly allocated C string, recording failures
fn json_to_cstr<T: Serialize>(value: &T) -> *mut c_char {
    match serde_json::to_string(value) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Map a unit result onto the 0 / -1 convention
fn status(result: Result<(), WorkoutError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Zone Calculation
// ============================================================================

#[derive(Serialize)]
struct ZoneTable {
    max_heart_rate: i32,
    zones: Vec<HeartRateZone>,
}

/// Compute the training zones for an age and gender ("M" or "F").
///
/// Returns `{"max_heart_rate": N, "zones": [...]}`.
///
/// # Safety
/// - `gender` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `cz_free_string`.
/// - Returns NULL on error; call `cz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cz_zones_json(age: u32, gender: *const c_char) -> *mut c_char {
    clear_last_error();

    let gender: Gender = match cstr_to_string(gender).map(|g| g.parse()) {
        Some(Ok(g)) => g,
        Some(Err(e)) => {
            set_last_error(&e);
            return ptr::null_mut();
        }
        None => {
            set_last_error("Invalid gender string pointer");
            return ptr::null_mut();
        }
    };

    let table = max_heart_rate(age, gender).and_then(|max| {
        Ok(ZoneTable {
            max_heart_rate: max,
            zones: calculate_zones(age, gender)?,
        })
    });

    match table {
        Ok(table) => json_to_cstr(&table),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Workout Session API
// ============================================================================

/// Opaque handle to a WorkoutSession
pub struct CzSessionHandle {
    session: WorkoutSession,
}

/// Create an idle workout session.
///
/// # Safety
/// - `config_json` may be NULL (defaults) or a valid null-terminated C string.
/// - Returns a pointer that must be freed with `cz_session_free`.
/// - Returns NULL on error; call `cz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cz_session_new(config_json: *const c_char) -> *mut CzSessionHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        Ok(SessionConfig::default())
    } else {
        match cstr_to_string(config_json) {
            Some(json) => SessionConfig::from_json(&json),
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        }
    };

    match config.and_then(WorkoutSession::new) {
        Ok(session) => Box::into_raw(Box::new(CzSessionHandle { session })),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a workout session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cz_session_free(handle: *mut CzSessionHandle) {
    if !handle.is_null() {
        let mut handle = Box::from_raw(handle);
        handle.session.close();
    }
}

/// Start the session against a target zone (JSON `HeartRateZone`).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - `zone_json` may be NULL (rejected as a missing zone) or a valid C string.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn cz_session_start(
    handle: *mut CzSessionHandle,
    zone_json: *const c_char,
    max_heart_rate: i32,
) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    let zone = match cstr_to_string(zone_json) {
        Some(json) => match serde_json::from_str::<HeartRateZone>(&json) {
            Ok(zone) => Some(zone),
            Err(e) => {
                set_last_error(&e.to_string());
                return -1;
            }
        },
        None => None,
    };

    status(handle.session.start(zone, max_heart_rate))
}

/// Pause or resume the session.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns 1 when now running, 0 when now paused, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn cz_session_toggle_running(handle: *mut CzSessionHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    match handle.session.toggle_running() {
        Ok(_) => i32::from(handle.session.is_running()),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Change the effort level by `delta` (clamped to 0-100).
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns the new effort level, or -1 on error.
#[no_mangle]
pub unsafe extern "C" fn cz_session_adjust_effort(handle: *mut CzSessionHandle, delta: i32) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    match handle.session.adjust_effort(delta) {
        Ok(level) => i32::from(level),
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Mute or unmute voice feedback.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn cz_session_set_muted(handle: *mut CzSessionHandle, muted: bool) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    status(handle.session.set_muted(muted))
}

/// Run one session step.
///
/// Returns the tick report as JSON, or `null` when the session is not active.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns a newly allocated string that must be freed with `cz_free_string`.
/// - Returns NULL on error; call `cz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cz_session_tick(handle: *mut CzSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &mut *handle;

    json_to_cstr(&handle.session.tick())
}

/// Current session snapshot as JSON.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns a newly allocated string that must be freed with `cz_free_string`.
/// - Returns NULL on error; call `cz_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn cz_session_snapshot(handle: *const CzSessionHandle) -> *mut c_char {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return ptr::null_mut();
    }
    let handle = &*handle;

    json_to_cstr(&handle.session.snapshot())
}

/// Close the session. Safe to call repeatedly.
///
/// # Safety
/// - `handle` must be a valid pointer returned by `cz_session_new`.
/// - Returns 0 on success, -1 on a NULL handle.
#[no_mangle]
pub unsafe extern "C" fn cz_session_close(handle: *mut CzSessionHandle) -> i32 {
    clear_last_error();

    if handle.is_null() {
        set_last_error("Null session pointer");
        return -1;
    }
    let handle = &mut *handle;

    handle.session.close();
    0
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by CardioZone functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a CardioZone function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn cz_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next CardioZone call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn cz_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the CardioZone library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn cz_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe fn take_string(ptr: *mut c_char) -> String {
        assert!(!ptr.is_null());
        let s = CStr::from_ptr(ptr).to_str().unwrap().to_string();
        cz_free_string(ptr);
        s
    }

    unsafe fn last_error() -> String {
        let error = cz_last_error();
        assert!(!error.is_null());
        CStr::from_ptr(error).to_str().unwrap().to_string()
    }

    fn aerobic_zone_json() -> CString {
        CString::new(
            r#"{
                "id": "aerobic",
                "name": "Aerobic",
                "min_percent": 0.6,
                "max_percent": 0.8,
                "min_bpm": 114,
                "max_bpm": 152,
                "is_target": true
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_ffi_zones_json() {
        let gender = CString::new("M").unwrap();
        unsafe {
            let json = take_string(cz_zones_json(30, gender.as_ptr()));
            let table: serde_json::Value = serde_json::from_str(&json).unwrap();

            assert_eq!(table["max_heart_rate"], 190);
            assert_eq!(table["zones"].as_array().unwrap().len(), 4);
            assert_eq!(table["zones"][2]["id"], "aerobic");
            assert_eq!(table["zones"][2]["is_target"], true);
        }
    }

    #[test]
    fn test_ffi_zones_error_handling() {
        let gender = CString::new("M").unwrap();
        let bad_gender = CString::new("X").unwrap();
        unsafe {
            assert!(cz_zones_json(10, gender.as_ptr()).is_null());
            assert!(last_error().contains("Invalid age"));

            assert!(cz_zones_json(30, bad_gender.as_ptr()).is_null());
            assert!(last_error().contains("unknown gender"));
        }
    }

    #[test]
    fn test_ffi_session_lifecycle() {
        let config = CString::new(r#"{ "seed": 42 }"#).unwrap();
        let zone = aerobic_zone_json();

        unsafe {
            let handle = cz_session_new(config.as_ptr());
            assert!(!handle.is_null());

            // Not started yet: tick reports null
            assert_eq!(take_string(cz_session_tick(handle)), "null");

            assert_eq!(cz_session_start(handle, zone.as_ptr(), 190), 0);
            assert_eq!(cz_session_adjust_effort(handle, 1000), 100);
            assert_eq!(cz_session_set_muted(handle, true), 0);

            for _ in 0..3 {
                let report: serde_json::Value =
                    serde_json::from_str(&take_string(cz_session_tick(handle))).unwrap();
                assert!(report["bpm"].is_number());
                assert!(report["announcement"].is_null());
            }

            assert_eq!(cz_session_toggle_running(handle), 0);
            assert_eq!(take_string(cz_session_tick(handle)), "null");
            assert_eq!(cz_session_toggle_running(handle), 1);

            let snapshot: serde_json::Value =
                serde_json::from_str(&take_string(cz_session_snapshot(handle))).unwrap();
            assert_eq!(snapshot["elapsed_seconds"], 3);
            assert_eq!(snapshot["effort_level"], 100);
            assert_eq!(snapshot["is_muted"], true);

            assert_eq!(cz_session_close(handle), 0);
            assert_eq!(cz_session_close(handle), 0);
            assert_eq!(cz_session_adjust_effort(handle, 10), -1);

            cz_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_start_without_zone_is_rejected() {
        unsafe {
            let handle = cz_session_new(ptr::null());
            assert!(!handle.is_null());

            assert_eq!(cz_session_start(handle, ptr::null(), 190), -1);
            assert!(last_error().contains("target zone"));

            let zone = aerobic_zone_json();
            assert_eq!(cz_session_start(handle, zone.as_ptr(), 0), -1);
            assert!(last_error().contains("max heart rate"));

            let snapshot: serde_json::Value =
                serde_json::from_str(&take_string(cz_session_snapshot(handle))).unwrap();
            assert_eq!(snapshot["phase"], "idle");

            cz_session_free(handle);
        }
    }

    #[test]
    fn test_ffi_invalid_config() {
        let config = CString::new(r#"{ "tick_period_ms": 0 }"#).unwrap();
        unsafe {
            assert!(cz_session_new(config.as_ptr()).is_null());
            assert!(last_error().contains("tick_period_ms"));
        }
    }

    #[test]
    fn test_ffi_rejects_unbounded_jitter() {
        let config = CString::new(r#"{ "simulator": { "jitter_bpm": 1e308 } }"#).unwrap();
        unsafe {
            assert!(cz_session_new(config.as_ptr()).is_null());
            assert!(last_error().contains("jitter_bpm"));
        }
    }

    #[test]
    fn test_ffi_null_handle() {
        unsafe {
            assert_eq!(cz_session_close(ptr::null_mut()), -1);
            assert!(cz_session_tick(ptr::null_mut()).is_null());
            assert!(last_error().contains("Null session pointer"));
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = cz_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
