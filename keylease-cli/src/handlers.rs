use serde::{Deserialize, Serialize};

use keylease_core::config::LockConfig;
use keylease_core::types::LockRecord;

// ─── Validation Helpers ─────────────────────────────────────────────────────

pub fn validate_lock_key(lock_key: &str) -> Result<(), String> {
    if lock_key.trim().is_empty() {
        return Err("lock_key is required".to_string());
    }
    if lock_key.len() > 512 {
        return Err(format!(
            "lock_key is {} bytes long, the limit is 512",
            lock_key.len()
        ));
    }
    Ok(())
}

// ─── Request Types ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AcquireLockRequest {
    pub lock_key: String,
    /// Diagnostic holder id; generated when absent
    #[serde(default)]
    pub request_id: Option<String>,
}

impl AcquireLockRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_lock_key(&self.lock_key)?;
        if let Some(request_id) = &self.request_id {
            if request_id.len() > 256 {
                return Err("request_id must be at most 256 bytes".to_string());
            }
        }
        Ok(())
    }

    pub fn holder_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("")
    }
}

#[derive(Deserialize)]
pub struct ReleaseQuery {
    /// Only release if this holder created the lock
    pub holder: Option<String>,
}

// ─── Response Types ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
        }
    }
}

#[derive(Serialize, Debug, PartialEq)]
pub struct LockInfo {
    pub lock_key: String,
    pub holder_id: String,
    pub expires_at: u64,
    pub remaining_ms: u64,
    pub expired: bool,
}

impl LockInfo {
    pub fn from_record(record: &LockRecord, now: u64) -> Self {
        Self {
            lock_key: record.lock_key.clone(),
            holder_id: record.holder_id.clone(),
            expires_at: record.expires_at,
            remaining_ms: record.remaining_ms(now),
            expired: record.is_expired(now),
        }
    }
}

#[derive(Serialize)]
pub struct LockStatusResponse {
    pub lock_key: String,
    pub locked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock: Option<LockInfo>,
}

#[derive(Serialize)]
pub struct ReleaseResponse {
    pub lock_key: String,
    pub released: bool,
}

#[derive(Serialize)]
pub struct WaitResponse {
    pub lock_key: String,
    pub released: bool,
}

#[derive(Serialize)]
pub struct SweepResponse {
    pub deleted: usize,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub stored_locks: usize,
    pub version: String,
    pub config: LockConfig,
}
