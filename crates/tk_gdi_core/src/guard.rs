//! 池化资源的 RAII 封装
//!
//! 借出的 DC / 位图在离开作用域时自动归还到池中（不销毁）。
//!
//! ## 使用示例
//! ```ignore
//! let dc = manager.checkout_dc()?;
//! let bitmap = manager.checkout_bitmap(BitmapSpec::new(64, 64, 1, 32))?;
//! manager.select_bitmap(dc.handle(), bitmap.handle())?;
//! // 绘制...
//! // 离开作用域时两者都回到池中
//! ```

use log::{debug, warn};

use crate::backend::GdiBackend;
use crate::error::GdiResult;
use crate::manager::ResourceManager;
use crate::types::{BitmapSpec, DcHandle, RawHandle};

/// 借出中的池化 DC
///
/// 当 `PooledDc` 离开作用域时，会自动调用 `release_pooled_dc`。
pub struct PooledDc<'a, B: GdiBackend> {
    manager: &'a ResourceManager<B>,
    dc: DcHandle,
}

impl<B: GdiBackend> PooledDc<'_, B> {
    /// 获取内部的 DC 句柄（不转移所有权）
    pub fn handle(&self) -> DcHandle {
        self.dc
    }

    /// 消费此封装并返回 DC 句柄
    ///
    /// 调用此方法后，调用者负责调用 `release_pooled_dc` 归还。
    pub fn into_raw(self) -> DcHandle {
        let dc = self.dc;
        std::mem::forget(self); // 阻止 Drop 被调用
        dc
    }
}

impl<B: GdiBackend> Drop for PooledDc<'_, B> {
    fn drop(&mut self) {
        // 关闭时池已清空，DC 已被销毁
        if self.manager.is_shut_down() {
            debug!("{} outlived shutdown; nothing to return", self.dc);
            return;
        }
        if let Err(err) = self.manager.release_pooled_dc(self.dc) {
            warn!("failed to return {} to the pool: {err}", self.dc);
        }
    }
}

/// 借出中的池化位图
pub struct PooledBitmap<'a, B: GdiBackend> {
    manager: &'a ResourceManager<B>,
    bitmap: RawHandle,
}

impl<B: GdiBackend> PooledBitmap<'_, B> {
    pub fn handle(&self) -> RawHandle {
        self.bitmap
    }

    /// 池中该位图的实际规格（可能大于请求的尺寸）
    pub fn spec(&self) -> Option<BitmapSpec> {
        self.manager.pooled_bitmap_spec(self.bitmap)
    }

    pub fn into_raw(self) -> RawHandle {
        let bitmap = self.bitmap;
        std::mem::forget(self);
        bitmap
    }
}

impl<B: GdiBackend> Drop for PooledBitmap<'_, B> {
    fn drop(&mut self) {
        if self.manager.is_shut_down() {
            debug!("bitmap {} outlived shutdown; nothing to return", self.bitmap);
            return;
        }
        if let Err(err) = self.manager.release_pooled_bitmap(self.bitmap) {
            warn!("failed to return bitmap {} to the pool: {err}", self.bitmap);
        }
    }
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 借出一个 DC，作用域结束时自动归还
    #[track_caller]
    pub fn checkout_dc(&self) -> GdiResult<PooledDc<'_, B>> {
        let dc = self.acquire_pooled_dc()?;
        Ok(PooledDc { manager: self, dc })
    }

    /// 借出一张位图，作用域结束时自动归还
    #[track_caller]
    pub fn checkout_bitmap(&self, request: BitmapSpec) -> GdiResult<PooledBitmap<'_, B>> {
        let bitmap = self.acquire_pooled_bitmap(request)?;
        Ok(PooledBitmap {
            manager: self,
            bitmap,
        })
    }
}

// ==================== 单元测试 ====================
