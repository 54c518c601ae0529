// Error types for the GDI resource subsystem
//
// Native failures and usage errors share one enum; whether a usage error is
// fatal is decided by `ManagerConfig::strict_usage`.

use thiserror::Error;

use crate::types::{DcHandle, ObjectCategory, RawHandle};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GdiError {
    #[error("native call {0} failed")]
    NativeCallFailed(&'static str),

    #[error("{0} is not registered")]
    UnknownContext(DcHandle),

    #[error("stock object {0} must not be deleted")]
    StockObject(RawHandle),

    #[error("object {handle} is a {actual}, expected a {expected}")]
    CategoryMismatch {
        handle: RawHandle,
        expected: ObjectCategory,
        actual: ObjectCategory,
    },

    #[error("pool slot {0} is free-listed but still marked used")]
    SlotInUse(usize),

    #[error("{0} is not checked out from the pool")]
    NotPooled(RawHandle),

    #[error("bitmap {0} is owned by the bitmap pool; release it instead")]
    PooledBitmap(RawHandle),

    #[error("{0} does not accept bitmaps")]
    BitmapNotSelectable(DcHandle),

    #[error("resource manager has been shut down")]
    ShutDown,

    #[error("configuration error: {0}")]
    Config(String),
}

impl GdiError {
    /// 是否属于调用方违反跟踪约定的用法错误
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            GdiError::UnknownContext(_)
                | GdiError::StockObject(_)
                | GdiError::CategoryMismatch { .. }
                | GdiError::SlotInUse(_)
                | GdiError::NotPooled(_)
                | GdiError::PooledBitmap(_)
                | GdiError::BitmapNotSelectable(_)
        )
    }
}

impl From<serde_json::Error> for GdiError {
    fn from(err: serde_json::Error) -> Self {
        GdiError::Config(err.to_string())
    }
}

/// Result type alias for convenience
pub type GdiResult<T> = Result<T, GdiError>;
