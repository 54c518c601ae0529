//! tk_gdi - GDI 句柄缓存与安全删除
//!
//! 平台无关的缓存逻辑位于 `tk_gdi_core`，Windows 上由 `tk_gdi_windows`
//! 提供原生后端。应用通常只需要：
//!
//! ```ignore
//! let manager = tk_gdi::native_manager(tk_gdi::ManagerConfig::default());
//! let dc = manager.checkout_dc()?;
//! ```

pub use tk_gdi_core::*;

#[cfg(windows)]
pub use tk_gdi_windows::Win32Gdi;

/// Windows 上的资源管理器
#[cfg(windows)]
pub type NativeManager = ResourceManager<Win32Gdi>;

/// 使用 Win32 后端创建资源管理器
#[cfg(windows)]
pub fn native_manager(config: ManagerConfig) -> NativeManager {
    log::info!(
        "GDI resource manager starting (verify_cache={}, strict_usage={}, track_allocations={})",
        config.verify_cache,
        config.strict_usage,
        config.track_allocations
    );
    ResourceManager::with_config(Win32Gdi::new(), config)
}

/// 从配置文件创建 Windows 资源管理器，文件缺失时使用缺省配置
#[cfg(windows)]
pub fn native_manager_from_file(path: &std::path::Path) -> NativeManager {
    native_manager(ManagerConfig::load(path))
}
