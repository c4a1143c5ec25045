//! FFI bindings for AeroGuard Prep
//!
//! This module provides C-compatible functions for calling the scorer and the
//! inference-time scaler from the serving backend. All functions use C strings
//! (null-terminated) and return allocated memory that must be freed by the
//! caller using `aeroguard_free_string`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;

use crate::error::PrepError;
use crate::exposure::ExposureScorer;
use crate::scaler::{FeatureScaler, ScalerParams};
use crate::types::ExposureProfile;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

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

fn score_exposure_json(profile_json: &str) -> Result<String, PrepError> {
    let profile: ExposureProfile = serde_json::from_str(profile_json)?;
    let scores = ExposureScorer::score(&profile)?;
    Ok(serde_json::to_string(&scores)?)
}

fn scale_rows_json(params_json: &str, rows_json: &str) -> Result<String, PrepError> {
    let params = ScalerParams::from_json(params_json)?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(rows_json)?;
    let scaled = FeatureScaler::apply(&rows, &params)?;
    Ok(serde_json::to_string(&scaled)?)
}

// ============================================================================
// Scoring and scaling
// ============================================================================

/// Score an exposure profile and return the risk scores as JSON.
///
/// # Safety
/// - `profile_json` must be a valid null-terminated C string.
/// - Returns a newly allocated string that must be freed with `aeroguard_free_string`.
/// - Returns NULL on error; call `aeroguard_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn aeroguard_score_exposure(profile_json: *const c_char) -> *mut c_char {
    clear_last_error();

    let json_str = match cstr_to_string(profile_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid profile string pointer");
            return ptr::null_mut();
        }
    };

    match score_exposure_json(&json_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Scale a JSON array of feature rows with persisted scaler parameters.
///
/// # Safety
/// - `params_json` and `rows_json` must be valid null-terminated C strings.
/// - Returns a newly allocated string that must be freed with `aeroguard_free_string`.
/// - Returns NULL on error; call `aeroguard_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn aeroguard_scale_rows(
    params_json: *const c_char,
    rows_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    let params_str = match cstr_to_string(params_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid scaler params string pointer");
            return ptr::null_mut();
        }
    };

    let rows_str = match cstr_to_string(rows_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid rows string pointer");
            return ptr::null_mut();
        }
    };

    match scale_rows_json(&params_str, &rows_str) {
        Ok(result) => string_to_cstr(&result),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a string returned by an AeroGuard function.
///
/// # Safety
/// - `ptr` must be a pointer returned by an AeroGuard function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn aeroguard_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next AeroGuard call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn aeroguard_last_error() -> *const c_char {
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
pub unsafe extern "C" fn aeroguard_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ffi_score_exposure() {
        let profile = CString::new(
            r#"{"avg_pm25": 35.0, "peak_pm25": 50.0, "hours_unhealthy": 100.0, "duration_days": 5}"#,
        )
        .unwrap();

        unsafe {
            let result = aeroguard_score_exposure(profile.as_ptr());
            assert!(!result.is_null());

            let result_str = CStr::from_ptr(result).to_str().unwrap();
            let scores: serde_json::Value = serde_json::from_str(result_str).unwrap();
            assert_eq!(scores["asthma_risk"], 62.5);
            assert_eq!(scores["copd_risk"], 32.17);

            aeroguard_free_string(result);
        }
    }

    #[test]
    fn test_ffi_negative_exposure_sets_error() {
        let profile = CString::new(
            r#"{"avg_pm25": 35.0, "peak_pm25": 50.0, "hours_unhealthy": -4.0, "duration_days": 5}"#,
        )
        .unwrap();

        unsafe {
            let result = aeroguard_score_exposure(profile.as_ptr());
            assert!(result.is_null());

            let error = aeroguard_last_error();
            assert!(!error.is_null());
            let error_str = CStr::from_ptr(error).to_str().unwrap();
            assert!(error_str.contains("hours_unhealthy"));
        }
    }

    #[test]
    fn test_ffi_scale_rows() {
        let params = CString::new(
            r#"{
                "schema_version": "aeroguard.scaler_params.v1",
                "min": [0.0, 10.0],
                "max": [200.0, 10.0],
                "feature_names": ["aqi_calculated", "iaq_score"]
            }"#,
        )
        .unwrap();
        let rows = CString::new("[[50.0, 10.0], [200.0, 12.0]]").unwrap();

        unsafe {
            let result = aeroguard_scale_rows(params.as_ptr(), rows.as_ptr());
            assert!(!result.is_null());

            let scaled: Vec<Vec<f64>> =
                serde_json::from_str(CStr::from_ptr(result).to_str().unwrap()).unwrap();
            assert_eq!(scaled, vec![vec![0.25, 0.0], vec![1.0, 0.0]]);

            aeroguard_free_string(result);
        }
    }

    #[test]
    fn test_ffi_null_pointer() {
        unsafe {
            let result = aeroguard_score_exposure(ptr::null());
            assert!(result.is_null());
            assert!(!aeroguard_last_error().is_null());
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = aeroguard_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert!(!version_str.is_empty());
        }
    }
}
