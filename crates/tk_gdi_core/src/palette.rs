//! 调色板延迟回收
//!
//! 即使已从所有跟踪的 DC 中取消选入，系统仍可能因为内部映射而拒绝删除
//! 调色板。这类句柄进入回收表，在另一个调色板删除成功后以及关闭时重试。

use log::{debug, warn};

use crate::backend::GdiBackend;
use crate::error::{GdiError, GdiResult};
use crate::manager::ResourceManager;
use crate::types::{DcHandle, GdiObject, ObjectCategory, PaletteEntry, RawHandle};

#[derive(Debug, Default)]
pub(crate) struct ReclaimList {
    palettes: Vec<RawHandle>,
}

impl ReclaimList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, palette: RawHandle) {
        if !self.palettes.contains(&palette) {
            self.palettes.push(palette);
        }
    }

    fn remove(&mut self, palette: RawHandle) -> bool {
        let before = self.palettes.len();
        self.palettes.retain(|&p| p != palette);
        self.palettes.len() != before
    }

    fn snapshot(&self) -> Vec<RawHandle> {
        self.palettes.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.palettes.len()
    }
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 安全删除调色板
    ///
    /// 原生删除失败时句柄进入回收表，调用方仍得到成功：
    /// 从子系统的角度看它已经被删除。删除成功后顺带重试回收表。
    pub fn try_delete_palette(&self, palette: RawHandle) -> GdiResult<()> {
        let object = GdiObject::palette(palette);
        if !self.admit_deletion(object) {
            return if self.backend.delete_object(palette) {
                Ok(())
            } else {
                Err(GdiError::NativeCallFailed("DeleteObject"))
            };
        }

        self.deselect_everywhere(object);
        if self.backend.delete_object(palette) {
            self.note_destroyed(palette);
            self.reclaim.lock().remove(palette);
            self.sweep_reclaim_list();
        } else {
            warn!("palette {palette} refused deletion; deferring");
            self.reclaim.lock().push(palette);
        }
        Ok(())
    }

    /// 重试回收表中的每个调色板，返回本次成功删除的数量
    pub fn sweep_reclaim_list(&self) -> usize {
        let pending = self.reclaim.lock().snapshot();
        if pending.is_empty() {
            return 0;
        }

        let mut reclaimed = Vec::new();
        for palette in pending {
            if self.backend.delete_object(palette) {
                self.note_destroyed(palette);
                reclaimed.push(palette);
            }
        }

        if !reclaimed.is_empty() {
            let mut list = self.reclaim.lock();
            for palette in &reclaimed {
                list.remove(*palette);
            }
            debug!(
                "reclaimed {} deferred palette(s), {} still pending",
                reclaimed.len(),
                list.len()
            );
        }
        reclaimed.len()
    }

    /// 等待重试删除的调色板
    pub fn pending_palettes(&self) -> Vec<RawHandle> {
        self.reclaim.lock().snapshot()
    }

    /// 修改调色板条目，并让选中它的上下文的 realize 状态失效
    pub fn set_palette_entries(
        &self,
        palette: RawHandle,
        start: u32,
        entries: &[PaletteEntry],
    ) -> GdiResult<u32> {
        let written = self.backend.set_palette_entries(palette, start, entries);
        if written == 0 && !entries.is_empty() {
            return Err(GdiError::NativeCallFailed("SetPaletteEntries"));
        }
        self.invalidate_realized(palette);
        Ok(written)
    }

    pub fn resize_palette(&self, palette: RawHandle, entries: u32) -> GdiResult<()> {
        if !self.backend.resize_palette(palette, entries) {
            return Err(GdiError::NativeCallFailed("ResizePalette"));
        }
        self.invalidate_realized(palette);
        Ok(())
    }

    /// RealizePalette；已 realize 且调色板未变时跳过
    pub fn realize_palette(&self, dc: DcHandle) -> GdiResult<u32> {
        let Some(state) = self.find_context(dc) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return self
                .backend
                .realize_palette(dc)
                .ok_or(GdiError::NativeCallFailed("RealizePalette"));
        };
        if state.palette_realized() {
            return Ok(0);
        }

        let mapped = self
            .backend
            .realize_palette(dc)
            .ok_or(GdiError::NativeCallFailed("RealizePalette"))?;
        let realized = state.selected(ObjectCategory::Palette);
        if let Some(state) = self.registry.lock().get_mut(dc) {
            // 期间换了调色板就保持失效
            if state.selected(ObjectCategory::Palette) == realized {
                state.palette_realized = true;
            }
        }
        Ok(mapped)
    }

    fn invalidate_realized(&self, palette: RawHandle) {
        let mut registry = self.registry.lock();
        for state in registry.iter_mut() {
            if state.selected(ObjectCategory::Palette) == palette {
                state.palette_realized = false;
            }
        }
    }
}
