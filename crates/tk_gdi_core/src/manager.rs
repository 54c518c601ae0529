//! 资源管理器
//!
//! 每个渲染子系统实例拥有一个 [`ResourceManager`]，它持有 DC 池、位图池、
//! 上下文注册表、调色板回收表以及可选的泄漏跟踪器。每张表各有一把锁，
//! 锁只在插入/移除/扫描期间持有，从不跨越原生 GDI 调用。
//!
//! 同一个设备上下文上的选入与删除需要调用方自行排序；
//! 管理器不防护两个线程同时向同一个 DC 选入不同对象。

use std::panic::Location;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, error, warn};
use parking_lot::Mutex;

use crate::backend::GdiBackend;
use crate::config::ManagerConfig;
use crate::diagnostics::{AllocationKind, LeakTracker};
use crate::error::{GdiError, GdiResult};
use crate::palette::ReclaimList;
use crate::pool::{BitmapPool, DcPool};
use crate::registry::ContextRegistry;
use crate::types::RawHandle;

pub struct ResourceManager<B: GdiBackend> {
    pub(crate) backend: B,
    pub(crate) config: ManagerConfig,
    pub(crate) registry: Mutex<ContextRegistry>,
    pub(crate) dc_pool: Mutex<DcPool>,
    pub(crate) bitmap_pool: Mutex<BitmapPool>,
    pub(crate) reclaim: Mutex<ReclaimList>,
    pub(crate) tracker: Option<LeakTracker>,
    shut_down: AtomicBool,
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 使用缺省配置创建管理器
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, ManagerConfig::default())
    }

    pub fn with_config(backend: B, config: ManagerConfig) -> Self {
        let tracker = config.track_allocations.then(LeakTracker::new);
        debug!(
            "GDI resource manager up (verify_cache={}, strict_usage={}, tracking={})",
            config.verify_cache,
            config.strict_usage,
            tracker.is_some()
        );
        Self {
            backend,
            config,
            registry: Mutex::new(ContextRegistry::new()),
            dc_pool: Mutex::new(DcPool::new()),
            bitmap_pool: Mutex::new(BitmapPool::new()),
            reclaim: Mutex::new(ReclaimList::new()),
            tracker,
            shut_down: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// 关闭子系统
    ///
    /// 依次清空 DC 池和位图池、解除所有剩余上下文的选入、
    /// 重试调色板回收表，最后输出泄漏报告。重复调用无副作用。
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }

        self.drain_dc_pool();
        self.drain_bitmap_pool();

        let remaining = self.registry.lock().handles();
        for dc in remaining {
            let _ = self.unregister_context(dc);
        }

        self.sweep_reclaim_list();
        let stranded = self.reclaim.lock().len();
        if stranded > 0 {
            warn!("{stranded} palette(s) could not be reclaimed before shutdown");
        }

        if let Some(report) = self.leak_report() {
            if !report.is_empty() {
                warn!("GDI leak report at shutdown:\n{report}");
            }
        }
        debug!("GDI resource manager shut down");
    }

    pub(crate) fn ensure_running(&self) -> GdiResult<()> {
        if self.is_shut_down() {
            Err(GdiError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// 处理用法错误
    ///
    /// 严格模式下直接 panic：调用方绕过了跟踪约定，之后的行为无法验证。
    /// 否则记录日志并把错误交还给调用方，由调用方尽力继续。
    pub(crate) fn usage_error(&self, err: GdiError) -> GdiError {
        if self.config.strict_usage {
            panic!("GDI usage error: {err}");
        }
        error!("GDI usage error: {err}");
        err
    }

    pub(crate) fn note_created(
        &self,
        handle: RawHandle,
        kind: AllocationKind,
        origin: &'static Location<'static>,
    ) {
        if let Some(tracker) = &self.tracker {
            tracker.record(handle, kind, origin);
        }
    }

    pub(crate) fn note_destroyed(&self, handle: RawHandle) {
        if let Some(tracker) = &self.tracker {
            tracker.forget(handle);
        }
    }
}

impl<B: GdiBackend> Drop for ResourceManager<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
