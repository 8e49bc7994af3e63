//! C-compatible API used by the screening form host.
//!
//! Strings returned by this module are owned by Rust and must be released
//! with [`screening_free_str`]. Service handles are released with
//! [`screening_service_close`].

use std::error::Error;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::path::Path;

use serde_json::json;
use tracing::error;

use crate::common::config::AppCfg;
use crate::common::error::{ErrorCode, TrainingError};
use crate::common::log;
use crate::data::domain::RawRecord;
use crate::data::repo_fs::{read_csv, CsvOptions};
use crate::inference::service::InferenceService;
use crate::training::domain::{ArtifactSelector, TrainingPlan};
use crate::training::repo_fs::FsArtifactRepo;
use crate::training::service::train_and_store;

/// Opaque service handle passed across the boundary.
pub struct ServiceHandle {
    service: InferenceService,
    repo: FsArtifactRepo,
}

impl ServiceHandle {
    /// Open the latest artifact under `cfg`. Always yields a handle; a missing
    /// or corrupt artifact leaves the service in the failed state.
    pub fn open(cfg: &AppCfg) -> Self {
        let repo = FsArtifactRepo::new(cfg);
        let service = InferenceService::load(&repo, ArtifactSelector::Latest);
        Self { service, repo }
    }

    pub fn service(&self) -> &InferenceService {
        &self.service
    }

    pub fn reload(&self) -> ErrorCode {
        match self.service.reload(&self.repo, ArtifactSelector::Latest) {
            Ok(_) => ErrorCode::Ok,
            Err(err) => err.code(),
        }
    }

    /// Predict for a JSON object of field name to raw value; always answers in JSON.
    pub fn predict_json(&self, record_json: &str) -> String {
        let record: RawRecord = match serde_json::from_str(record_json) {
            Ok(record) => record,
            Err(err) => {
                return json!({
                    "ok": false,
                    "code": ErrorCode::InvalidInput as u32,
                    "error": format!("record is not a JSON object of field values: {err}"),
                })
                .to_string()
            }
        };

        match self.service.predict(&record) {
            Ok(result) => json!({
                "ok": true,
                "label": result.label,
                "raw_score": result.raw_score,
                "version": result.version,
            })
            .to_string(),
            Err(err) => json!({
                "ok": false,
                "code": err.code() as u32,
                "field": err.field(),
                "error": describe(&err),
            })
            .to_string(),
        }
    }
}

/// Train from a CSV file and a JSON [`TrainingPlan`]; returns the new version.
pub fn train_from_csv(cfg: &AppCfg, csv_path: &Path, plan_json: &str) -> Result<u64, TrainingError> {
    let plan = TrainingPlan::parse(plan_json)?;
    let dataset = read_csv(csv_path, &CsvOptions::default())?;
    let repo = FsArtifactRepo::new(cfg);
    Ok(train_and_store(&repo, &dataset, &plan)?.version)
}

/// Error message followed by its chain of causes.
fn describe(err: &dyn Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

/// ABI version to coordinate with the host.
#[no_mangle]
pub extern "C" fn screening_api_version() -> u32 {
    1
}

/// Train the next artifact from a CSV path and a JSON training plan.
///
/// Returns the new artifact version, or 0 on failure (the cause is logged).
#[no_mangle]
pub extern "C" fn screening_train(csv_path: *const c_char, plan_json: *const c_char) -> u64 {
    let (Some(path), Some(plan)) = (read_c_str(csv_path), read_c_str(plan_json)) else {
        return 0;
    };
    let cfg = AppCfg::load();
    log::init(&cfg);

    match train_from_csv(&cfg, Path::new(&path), &plan) {
        Ok(version) => version,
        Err(err) => {
            let code = err.code() as u32;
            error!(code, error = %describe(&err), "training failed");
            0
        }
    }
}

/// Open a service on the latest artifact. Never returns null.
#[no_mangle]
pub extern "C" fn screening_service_open() -> *mut ServiceHandle {
    let cfg = AppCfg::load();
    log::init(&cfg);
    Box::into_raw(Box::new(ServiceHandle::open(&cfg)))
}

/// Reload the latest artifact into an open service; returns an [`ErrorCode`].
#[no_mangle]
pub extern "C" fn screening_service_reload(handle: *const ServiceHandle) -> u32 {
    // SAFETY: the host only passes handles obtained from `screening_service_open`.
    match unsafe { handle.as_ref() } {
        Some(handle) => handle.reload() as u32,
        None => ErrorCode::Internal as u32,
    }
}

/// Predict for a JSON record and return a JSON reply (caller must free).
#[no_mangle]
pub extern "C" fn screening_predict(
    handle: *const ServiceHandle,
    record_json: *const c_char,
) -> *mut c_char {
    // SAFETY: see `screening_service_reload`.
    let Some(handle) = (unsafe { handle.as_ref() }) else {
        return error_reply(ErrorCode::Internal, "null service handle");
    };
    let Some(record) = read_c_str(record_json) else {
        return error_reply(ErrorCode::InvalidInput, "null or non-UTF-8 record");
    };
    string_to_raw(handle.predict_json(&record))
}

/// Release a handle from `screening_service_open`.
#[no_mangle]
pub extern "C" fn screening_service_close(handle: *mut ServiceHandle) {
    if handle.is_null() {
        return;
    }
    // SAFETY: ownership returns to Rust exactly once, per the ABI contract.
    unsafe {
        drop(Box::from_raw(handle));
    }
}

/// Free strings allocated by Rust.
#[no_mangle]
pub extern "C" fn screening_free_str(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: `ptr` came from `CString::into_raw` in this module.
    unsafe {
        drop(CString::from_raw(ptr));
    }
}

fn read_c_str(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    // SAFETY: non-null pointers from the host are NUL-terminated strings.
    unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(str::to_string)
}

fn error_reply(code: ErrorCode, msg: &str) -> *mut c_char {
    string_to_raw(json!({ "ok": false, "code": code as u32, "error": msg }).to_string())
}

fn string_to_raw(s: String) -> *mut c_char {
    // serde_json escapes control characters, so interior NULs cannot occur.
    CString::new(s).unwrap_or_default().into_raw()
}
