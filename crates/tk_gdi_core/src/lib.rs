//! GDI 句柄缓存与安全删除
//!
//! - 兼容 DC 与位图的对象池
//! - 按设备上下文缓存选中对象与标量绘图状态，跳过冗余的原生调用
//! - 删除前自动从所有上下文取消选入
//! - 系统拒绝删除的调色板延迟回收
//!
//! 原生调用全部经过 [`GdiBackend`]；Windows 实现位于 `tk_gdi_windows`。

pub mod arena;
pub mod backend;
pub mod config;
mod deletion;
pub mod diagnostics;
pub mod error;
pub mod guard;
pub mod manager;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
mod palette;
pub mod pool;
pub mod registry;
mod scalar;
pub mod types;

pub use backend::GdiBackend;
pub use config::ManagerConfig;
pub use diagnostics::{Allocation, AllocationKind, Desync, LeakReport, LeakTracker};
pub use error::{GdiError, GdiResult};
pub use guard::{PooledBitmap, PooledDc};
pub use manager::ResourceManager;
pub use pool::PoolStats;
pub use registry::{ClipState, DeviceContextState};
pub use types::{
    BackgroundMode, BitmapSpec, Color, DcHandle, DcKind, DrawMode, FillMode, GdiObject,
    ObjectCategory, PaletteEntry, RawHandle, RegionType, ScalarField, ScalarState, StockObject,
};
