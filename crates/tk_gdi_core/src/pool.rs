//! 兼容 DC 池与位图池
//!
//! 池只增长到同时借出资源数量的最高水位，释放的资源回到空闲表而不销毁。
//! 原生资源只在 `drain_*`（关闭时）或位图带 `delete_after_use` 释放时才销毁。

use std::collections::HashMap;
use std::panic::Location;

use log::{debug, warn};

use crate::arena::SlotArena;
use crate::backend::GdiBackend;
use crate::diagnostics::AllocationKind;
use crate::error::{GdiError, GdiResult};
use crate::manager::ResourceManager;
use crate::types::{BitmapSpec, DcHandle, DcKind, GdiObject, ObjectCategory, RawHandle};

/// 池统计信息
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// 当前槽位数
    pub slots: usize,
    /// 已借出的槽位数
    pub in_use: usize,
    /// 累计创建的原生资源数（含原位重建）
    pub created: usize,
    /// 原位重建的次数；DC 不会重建，DC 池恒为 0
    pub recreated: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct DcEntry {
    dc: DcHandle,
    used: bool,
}

#[derive(Debug, Default)]
pub(crate) struct DcPool {
    entries: SlotArena<DcEntry>,
    idle: Vec<usize>,
    by_handle: HashMap<DcHandle, usize>,
    created: usize,
}

/// 空闲表取出结果
enum Checkout<T> {
    Hit(usize, T),
    /// 空闲表中的槽位仍标记为已借出
    Corrupt(usize),
    Empty,
}

impl DcPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn checkout_idle(&mut self) -> Checkout<DcHandle> {
        let Some(index) = self.idle.pop() else {
            return Checkout::Empty;
        };
        match self.entries.get_mut(index) {
            Some(entry) if entry.used => Checkout::Corrupt(index),
            Some(entry) => {
                entry.used = true;
                Checkout::Hit(index, entry.dc)
            }
            None => Checkout::Corrupt(index),
        }
    }

    fn insert_used(&mut self, dc: DcHandle) -> usize {
        let index = self.entries.insert(DcEntry { dc, used: true });
        self.by_handle.insert(dc, index);
        self.created += 1;
        index
    }

    fn release(&mut self, dc: DcHandle) -> bool {
        let Some(&index) = self.by_handle.get(&dc) else {
            return false;
        };
        match self.entries.get_mut(index) {
            Some(entry) if entry.used => {
                entry.used = false;
                self.idle.push(index);
                true
            }
            _ => false,
        }
    }

    fn drain(&mut self) -> Vec<DcEntry> {
        self.idle.clear();
        self.by_handle.clear();
        self.entries.drain()
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            slots: self.entries.len(),
            in_use: self.entries.iter().filter(|(_, e)| e.used).count(),
            created: self.created,
            recreated: 0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BitmapEntry {
    bitmap: RawHandle,
    spec: BitmapSpec,
    used: bool,
    delete_after_use: bool,
}

#[derive(Debug, Default)]
pub(crate) struct BitmapPool {
    entries: SlotArena<BitmapEntry>,
    idle: Vec<usize>,
    by_handle: HashMap<RawHandle, usize>,
    created: usize,
    recreated: usize,
}

/// 位图归还结果
enum BitmapRelease {
    Pooled,
    /// 槽位已移除，原生位图需要立即销毁
    Evict(RawHandle),
    NotCheckedOut,
}

impl BitmapPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 从空闲表挑选一个槽位并标记为已借出
    ///
    /// 优先级：能直接满足请求的 > 同格式（需扩容）> 任意空闲槽位。
    fn checkout_idle(&mut self, request: &BitmapSpec) -> Checkout<BitmapEntry> {
        if self.idle.is_empty() {
            return Checkout::Empty;
        }

        let mut best: Option<(usize, u8)> = None;
        for (pos, &index) in self.idle.iter().enumerate() {
            let Some(entry) = self.entries.get(index) else {
                continue;
            };
            let rank = if entry.spec.covers(request) {
                0
            } else if entry.spec.same_format(request) {
                1
            } else {
                2
            };
            if best.is_none_or(|(_, r)| rank < r) {
                best = Some((pos, rank));
                if rank == 0 {
                    break;
                }
            }
        }

        let pos = best.map_or(self.idle.len() - 1, |(pos, _)| pos);
        let index = self.idle.swap_remove(pos);
        match self.entries.get_mut(index) {
            Some(entry) if entry.used => Checkout::Corrupt(index),
            Some(entry) => {
                entry.used = true;
                Checkout::Hit(index, *entry)
            }
            None => Checkout::Corrupt(index),
        }
    }

    fn insert_used(&mut self, bitmap: RawHandle, spec: BitmapSpec) -> usize {
        let index = self.entries.insert(BitmapEntry {
            bitmap,
            spec,
            used: true,
            delete_after_use: false,
        });
        self.by_handle.insert(bitmap, index);
        self.created += 1;
        index
    }

    /// 原位替换槽位中的原生位图
    fn replace(
        &mut self,
        index: usize,
        bitmap: RawHandle,
        spec: BitmapSpec,
        delete_after_use: bool,
    ) -> Option<RawHandle> {
        let entry = self.entries.get_mut(index)?;
        let old = entry.bitmap;
        entry.bitmap = bitmap;
        entry.spec = spec;
        entry.delete_after_use = delete_after_use;
        self.by_handle.remove(&old);
        self.by_handle.insert(bitmap, index);
        self.created += 1;
        self.recreated += 1;
        Some(old)
    }

    /// 撤销一次借出（重建失败时）
    fn abandon(&mut self, index: usize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.used = false;
            self.idle.push(index);
        }
    }

    fn release(&mut self, bitmap: RawHandle) -> BitmapRelease {
        let Some(&index) = self.by_handle.get(&bitmap) else {
            return BitmapRelease::NotCheckedOut;
        };
        let entry = match self.entries.get_mut(index) {
            Some(entry) if entry.used => entry,
            _ => return BitmapRelease::NotCheckedOut,
        };
        if entry.delete_after_use {
            self.entries.remove(index);
            self.by_handle.remove(&bitmap);
            return BitmapRelease::Evict(bitmap);
        }
        entry.used = false;
        self.idle.push(index);
        BitmapRelease::Pooled
    }

    /// 把槽位连同句柄一起移出池，不销毁原生位图
    fn evict(&mut self, bitmap: RawHandle) -> Option<BitmapEntry> {
        let index = self.by_handle.remove(&bitmap)?;
        self.idle.retain(|&idle| idle != index);
        self.entries.remove(index)
    }

    fn contains(&self, bitmap: RawHandle) -> bool {
        self.by_handle.contains_key(&bitmap)
    }

    fn spec_of(&self, bitmap: RawHandle) -> Option<BitmapSpec> {
        let index = *self.by_handle.get(&bitmap)?;
        self.entries.get(index).map(|entry| entry.spec)
    }

    fn drain(&mut self) -> Vec<BitmapEntry> {
        self.idle.clear();
        self.by_handle.clear();
        self.entries.drain()
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            slots: self.entries.len(),
            in_use: self.entries.iter().filter(|(_, e)| e.used).count(),
            created: self.created,
            recreated: self.recreated,
        }
    }
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 借出一个与屏幕兼容的内存 DC
    ///
    /// 新建的 DC 会注册到上下文注册表，并在池中常驻直到 [`drain_dc_pool`]。
    ///
    /// [`drain_dc_pool`]: ResourceManager::drain_dc_pool
    #[track_caller]
    pub fn acquire_pooled_dc(&self) -> GdiResult<DcHandle> {
        let origin = Location::caller();
        self.ensure_running()?;

        loop {
            let checkout = self.dc_pool.lock().checkout_idle();
            match checkout {
                Checkout::Hit(_, dc) => return Ok(dc),
                Checkout::Corrupt(index) => {
                    // 非严格模式下丢弃这个空闲下标，继续找下一个
                    self.usage_error(GdiError::SlotInUse(index));
                }
                Checkout::Empty => break,
            }
        }

        let dc = self
            .backend
            .create_compatible_dc(None)
            .ok_or(GdiError::NativeCallFailed("CreateCompatibleDC"))?;
        self.note_created(dc.handle(), AllocationKind::DeviceContext, origin);
        self.register_context(dc, DcKind::Memory)?;

        let mut pool = self.dc_pool.lock();
        pool.insert_used(dc);
        debug!("DC pool grew to {} slot(s)", pool.entries.len());
        Ok(dc)
    }

    /// 归还池化 DC（不销毁）
    pub fn release_pooled_dc(&self, dc: DcHandle) -> GdiResult<()> {
        if self.dc_pool.lock().release(dc) {
            Ok(())
        } else {
            Err(self.usage_error(GdiError::NotPooled(dc.handle())))
        }
    }

    /// 销毁池中所有 DC，先解除它们的全部选入
    pub fn drain_dc_pool(&self) {
        let entries = self.dc_pool.lock().drain();
        for entry in entries {
            if entry.used {
                warn!("draining {} while still checked out", entry.dc);
            }
            if self.is_registered(entry.dc) {
                let _ = self.unregister_context(entry.dc);
            }
            if self.backend.delete_dc(entry.dc) {
                self.note_destroyed(entry.dc.handle());
            } else {
                warn!("DeleteDC failed for {}", entry.dc);
            }
        }
    }

    pub fn dc_pool_stats(&self) -> PoolStats {
        self.dc_pool.lock().stats()
    }

    /// 借出满足 `request` 的位图
    ///
    /// 命中空闲槽位时：尺寸足够则直接复用；同格式但尺寸不足时按两者尺寸的
    /// 最大值原位重建（不会缩小）；格式不同时按请求的精确尺寸原位重建，
    /// 并在归还时销毁该槽位。
    #[track_caller]
    pub fn acquire_pooled_bitmap(&self, request: BitmapSpec) -> GdiResult<RawHandle> {
        let origin = Location::caller();
        self.ensure_running()?;

        let hit = loop {
            let checkout = self.bitmap_pool.lock().checkout_idle(&request);
            match checkout {
                Checkout::Hit(index, entry) => break Some((index, entry)),
                Checkout::Corrupt(index) => {
                    self.usage_error(GdiError::SlotInUse(index));
                }
                Checkout::Empty => break None,
            }
        };

        let Some((index, cached)) = hit else {
            let bitmap = self
                .backend
                .create_bitmap(&request)
                .ok_or(GdiError::NativeCallFailed("CreateBitmap"))?;
            self.note_created(
                bitmap,
                AllocationKind::Object(ObjectCategory::Bitmap),
                origin,
            );
            let mut pool = self.bitmap_pool.lock();
            pool.insert_used(bitmap, request);
            debug!(
                "bitmap pool grew to {} slot(s) for {request}",
                pool.entries.len()
            );
            return Ok(bitmap);
        };

        if cached.spec.covers(&request) {
            self.check_out_bitmap(cached.bitmap);
            return Ok(cached.bitmap);
        }

        let (target, delete_after_use) = if cached.spec.same_format(&request) {
            (cached.spec.grown_to(&request), false)
        } else {
            (request, true)
        };
        let Some(bitmap) = self.backend.create_bitmap(&target) else {
            self.bitmap_pool.lock().abandon(index);
            return Err(GdiError::NativeCallFailed("CreateBitmap"));
        };
        self.note_created(
            bitmap,
            AllocationKind::Object(ObjectCategory::Bitmap),
            origin,
        );
        debug!(
            "recreating pooled bitmap slot {index}: {} -> {target}",
            cached.spec
        );

        let old = self
            .bitmap_pool
            .lock()
            .replace(index, bitmap, target, delete_after_use);
        if let Some(old) = old {
            self.destroy_pool_bitmap(old);
        }
        Ok(bitmap)
    }

    /// 归还池化位图
    pub fn release_pooled_bitmap(&self, bitmap: RawHandle) -> GdiResult<()> {
        let outcome = self.bitmap_pool.lock().release(bitmap);
        match outcome {
            BitmapRelease::Pooled => Ok(()),
            BitmapRelease::Evict(bitmap) => {
                self.destroy_pool_bitmap(bitmap);
                Ok(())
            }
            BitmapRelease::NotCheckedOut => Err(self.usage_error(GdiError::NotPooled(bitmap))),
        }
    }

    /// 销毁池中所有位图，先把它们从所有上下文中取出
    pub fn drain_bitmap_pool(&self) {
        let entries = self.bitmap_pool.lock().drain();
        for entry in entries {
            if entry.used {
                warn!("draining pooled bitmap {} while still checked out", entry.bitmap);
            }
            self.destroy_pool_bitmap(entry.bitmap);
        }
    }

    /// 句柄是否属于位图池（无论是否借出）
    pub fn is_pooled_bitmap(&self, bitmap: RawHandle) -> bool {
        self.bitmap_pool.lock().contains(bitmap)
    }

    /// 让池放弃一张位图的所有权，之后由调用方负责销毁
    pub(crate) fn evict_pooled_bitmap(&self, bitmap: RawHandle) -> bool {
        let evicted = self.bitmap_pool.lock().evict(bitmap);
        if let Some(entry) = evicted {
            debug!("evicted bitmap {} ({}) from the pool", entry.bitmap, entry.spec);
        }
        evicted.is_some()
    }

    /// 池化位图当前的实际规格
    pub fn pooled_bitmap_spec(&self, bitmap: RawHandle) -> Option<BitmapSpec> {
        self.bitmap_pool.lock().spec_of(bitmap)
    }

    pub fn bitmap_pool_stats(&self) -> PoolStats {
        self.bitmap_pool.lock().stats()
    }

    fn destroy_pool_bitmap(&self, bitmap: RawHandle) {
        if let Err(err) = self.destroy_tracked(GdiObject::bitmap(bitmap)) {
            warn!("failed to destroy pooled bitmap {bitmap}: {err}");
        }
    }
}
