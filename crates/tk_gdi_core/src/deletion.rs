//! 安全删除
//!
//! 删除一个 GDI 对象之前，先在注册表中找出所有选中了它的上下文，
//! 逐个换回该类别的缺省对象，最后才调用原生删除。

use log::{debug, warn};

use crate::backend::GdiBackend;
use crate::error::{GdiError, GdiResult};
use crate::manager::ResourceManager;
use crate::types::{DcHandle, GdiObject, ObjectCategory, RawHandle};

impl<B: GdiBackend> ResourceManager<B> {
    pub fn delete_pen(&self, pen: RawHandle) -> GdiResult<()> {
        self.delete_typed(GdiObject::pen(pen))
    }

    pub fn delete_brush(&self, brush: RawHandle) -> GdiResult<()> {
        self.delete_typed(GdiObject::brush(brush))
    }

    pub fn delete_font(&self, font: RawHandle) -> GdiResult<()> {
        self.delete_typed(GdiObject::font(font))
    }

    pub fn delete_bitmap(&self, bitmap: RawHandle) -> GdiResult<()> {
        self.delete_typed(GdiObject::bitmap(bitmap))
    }

    pub fn delete_region(&self, region: RawHandle) -> GdiResult<()> {
        self.delete_typed(GdiObject::region(region))
    }

    /// 删除调色板；系统拒绝删除时转入回收表，仍视为成功
    pub fn delete_palette(&self, palette: RawHandle) -> GdiResult<()> {
        self.try_delete_palette(palette)
    }

    /// 删除类别未知的对象，类别由系统查询得到
    pub fn delete_object(&self, object: RawHandle) -> GdiResult<()> {
        let category = self
            .backend
            .object_category(object)
            .ok_or(GdiError::NativeCallFailed("GetObjectType"))?;
        self.delete_typed(GdiObject::new(category, object))
    }

    /// 按带类别的对象删除
    pub fn delete_typed(&self, object: GdiObject) -> GdiResult<()> {
        if object.category == ObjectCategory::Palette {
            return self.try_delete_palette(object.handle);
        }
        if !self.admit_deletion(object) {
            return self.delete_untracked(object);
        }
        if object.category == ObjectCategory::Bitmap && self.is_pooled_bitmap(object.handle) {
            // 非严格模式下池放弃该槽位，避免之后借出已销毁的句柄
            self.usage_error(GdiError::PooledBitmap(object.handle));
            self.evict_pooled_bitmap(object.handle);
        }
        self.destroy_tracked(object)
    }

    /// 把位图从持有它的上下文中取出（不删除），返回该上下文
    ///
    /// Win32 的位图同一时间最多选入一个 DC。
    pub fn check_out_bitmap(&self, bitmap: RawHandle) -> Option<DcHandle> {
        self.check_out_bitmap_except(bitmap, None)
    }

    pub(crate) fn check_out_bitmap_except(
        &self,
        bitmap: RawHandle,
        except: Option<DcHandle>,
    ) -> Option<DcHandle> {
        let holders = self
            .registry
            .lock()
            .holders(GdiObject::bitmap(bitmap), except);
        if holders.len() > 1 {
            warn!("bitmap {bitmap} is cached as selected in {} contexts", holders.len());
        }

        let mut released = None;
        for (dc, default_bitmap) in holders {
            if self.restore_default(dc, ObjectCategory::Bitmap, bitmap, default_bitmap) {
                debug!("checked bitmap {bitmap} out of {dc}");
                released.get_or_insert(dc);
            }
        }
        released
    }

    /// 从所有上下文取消选入，返回被清理的上下文数
    pub(crate) fn deselect_everywhere(&self, object: GdiObject) -> usize {
        let holders = self.registry.lock().holders(object, None);
        let mut cleared = 0;
        for (dc, default_bitmap) in holders {
            if self.restore_default(dc, object.category, object.handle, default_bitmap) {
                cleared += 1;
            }
        }
        cleared
    }

    /// 取消全部选入后执行原生删除
    pub(crate) fn destroy_tracked(&self, object: GdiObject) -> GdiResult<()> {
        let cleared = self.deselect_everywhere(object);
        if cleared > 0 {
            debug!("deselected {object} from {cleared} context(s) before deletion");
        }
        if self.backend.delete_object(object.handle) {
            self.note_destroyed(object.handle);
            Ok(())
        } else {
            Err(GdiError::NativeCallFailed("DeleteObject"))
        }
    }

    /// 用法错误后的降级路径：不更新任何跟踪信息，只尝试原生删除
    fn delete_untracked(&self, object: GdiObject) -> GdiResult<()> {
        if self.backend.delete_object(object.handle) {
            Ok(())
        } else {
            Err(GdiError::NativeCallFailed("DeleteObject"))
        }
    }

    /// 删除前的检查：库存对象拒绝删除，校验模式下核对真实类别
    pub(crate) fn admit_deletion(&self, object: GdiObject) -> bool {
        if self.backend.is_stock_object(object.handle) {
            self.usage_error(GdiError::StockObject(object.handle));
            return false;
        }
        if self.config.verify_cache {
            if let Some(actual) = self.backend.object_category(object.handle) {
                if actual != object.category {
                    self.usage_error(GdiError::CategoryMismatch {
                        handle: object.handle,
                        expected: object.category,
                        actual,
                    });
                    return false;
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::mock::MockGdi;
    use crate::types::{BitmapSpec, DcKind, StockObject};

    fn manager(config: ManagerConfig) -> ResourceManager<MockGdi> {
        ResourceManager::with_config(MockGdi::new(), config)
    }

    fn screen(manager: &ResourceManager<MockGdi>) -> DcHandle {
        let dc = manager.backend().create_screen_dc();
        manager.register_context(dc, DcKind::Screen).unwrap();
        dc
    }

    #[test]
    fn test_brush_selected_in_two_contexts_is_deselected_then_deleted() {
        let manager = manager(ManagerConfig::diagnostic());
        let a = screen(&manager);
        let b = screen(&manager);
        let brush = manager.backend().create_brush();
        manager.select_brush(a, brush).unwrap();
        manager.select_brush(b, brush).unwrap();

        manager.delete_brush(brush).unwrap();

        let null_brush = manager.backend().stock_object(StockObject::NullBrush);
        for dc in [a, b] {
            assert_eq!(manager.backend().selected(dc, ObjectCategory::Brush), null_brush);
            assert_eq!(
                manager.find_context(dc).unwrap().selected(ObjectCategory::Brush),
                null_brush
            );
        }
        assert!(!manager.backend().is_alive(brush));
    }

    #[test]
    fn test_unselected_object_is_deleted_directly() {
        let manager = manager(ManagerConfig::diagnostic());
        let _dc = screen(&manager);
        let font = manager.backend().create_font();
        manager.delete_font(font).unwrap();
        assert!(!manager.backend().is_alive(font));
        assert_eq!(manager.backend().calls("SelectObject"), 0);
    }

    #[test]
    fn test_generic_delete_queries_category() {
        let manager = manager(ManagerConfig::diagnostic());
        let dc = screen(&manager);
        let pen = manager.backend().create_pen();
        manager.select_pen(dc, pen).unwrap();

        manager.delete_object(pen).unwrap();
        assert!(!manager.backend().is_alive(pen));
        assert_eq!(
            manager.backend().selected(dc, ObjectCategory::Pen),
            manager.backend().stock_object(StockObject::NullPen)
        );
    }

    #[test]
    fn test_generic_delete_of_invalid_handle_fails() {
        let manager = manager(ManagerConfig::diagnostic());
        assert_eq!(
            manager.delete_object(RawHandle::from_raw(0xdead)),
            Err(GdiError::NativeCallFailed("GetObjectType"))
        );
    }

    #[test]
    #[should_panic(expected = "must not be deleted")]
    fn test_deleting_stock_object_is_fatal_in_strict_mode() {
        let manager = manager(ManagerConfig::diagnostic());
        let stock = manager.backend().stock_object(StockObject::NullPen);
        let _ = manager.delete_pen(stock);
    }

    #[test]
    fn test_deleting_stock_object_is_harmless_when_lenient() {
        let manager = manager(ManagerConfig::release());
        let stock = manager.backend().stock_object(StockObject::NullPen);
        manager.delete_pen(stock).unwrap();
        assert!(manager.backend().is_alive(stock));
    }

    #[test]
    #[should_panic(expected = "must not be deleted")]
    fn test_deleting_default_pen_is_fatal_in_strict_mode() {
        let manager = manager(ManagerConfig::diagnostic());
        let dc = screen(&manager);
        let pen = manager.find_context(dc).unwrap().selected(ObjectCategory::Pen);
        assert_eq!(pen, manager.backend().default_pen());
        let _ = manager.delete_pen(pen);
    }

    #[test]
    fn test_deleting_default_pen_leaves_contexts_alone() {
        let manager = manager(ManagerConfig::release());
        let a = screen(&manager);
        let b = screen(&manager);
        let pen = manager.backend().default_pen();

        manager.delete_pen(pen).unwrap();

        assert_eq!(manager.backend().calls("SelectObject"), 0);
        for dc in [a, b] {
            assert_eq!(manager.backend().selected(dc, ObjectCategory::Pen), pen);
            assert_eq!(
                manager.find_context(dc).unwrap().selected(ObjectCategory::Pen),
                pen
            );
        }
        assert!(manager.backend().is_alive(pen));
    }

    #[test]
    #[should_panic(expected = "owned by the bitmap pool")]
    fn test_deleting_pooled_bitmap_is_fatal_in_strict_mode() {
        let manager = manager(ManagerConfig::diagnostic());
        let bitmap = manager
            .acquire_pooled_bitmap(BitmapSpec::new(4, 4, 1, 24))
            .unwrap();
        manager.release_pooled_bitmap(bitmap).unwrap();
        let _ = manager.delete_bitmap(bitmap);
    }

    #[test]
    fn test_deleted_pooled_bitmap_leaves_the_pool_when_lenient() {
        let manager = manager(ManagerConfig::release());
        let bitmap = manager
            .acquire_pooled_bitmap(BitmapSpec::new(4, 4, 1, 24))
            .unwrap();
        manager.release_pooled_bitmap(bitmap).unwrap();

        manager.delete_bitmap(bitmap).unwrap();
        assert!(!manager.is_pooled_bitmap(bitmap));
        assert!(!manager.backend().is_alive(bitmap));
        assert_eq!(manager.bitmap_pool_stats().slots, 0);

        let fresh = manager
            .acquire_pooled_bitmap(BitmapSpec::new(4, 4, 1, 24))
            .unwrap();
        assert_ne!(fresh, bitmap);
        assert!(manager.backend().is_alive(fresh));
    }

    #[test]
    #[should_panic(expected = "expected a brush")]
    fn test_category_mismatch_is_fatal_when_verifying() {
        let manager = manager(ManagerConfig::diagnostic());
        let pen = manager.backend().create_pen();
        let _ = manager.delete_brush(pen);
    }

    #[test]
    fn test_region_delete_clears_clip() {
        let manager = manager(ManagerConfig::diagnostic());
        let dc = screen(&manager);
        let region = manager.backend().create_region();
        manager.select_clip_region(dc, Some(region)).unwrap();
        manager.offset_clip_region(dc, 2, 2).unwrap();

        manager.delete_region(region).unwrap();
        let clip = manager.find_context(dc).unwrap().clip();
        assert_eq!(clip.region, None);
        assert_eq!(clip.offset, (0, 0));
        assert_eq!(manager.backend().clip_of(dc), (None, (0, 0)));
    }

    #[test]
    fn test_bitmap_delete_restores_default_bitmap() {
        let manager = manager(ManagerConfig::diagnostic());
        let dc = manager.acquire_pooled_dc().unwrap();
        let bitmap = manager.backend().create_bitmap_object(BitmapSpec::new(4, 4, 1, 24));
        manager.select_bitmap(dc, bitmap).unwrap();

        manager.delete_bitmap(bitmap).unwrap();
        assert_eq!(
            manager.backend().selected(dc, ObjectCategory::Bitmap),
            manager.backend().default_bitmap()
        );
        assert!(!manager.backend().is_alive(bitmap));
    }

    #[test]
    fn test_check_out_bitmap_does_not_destroy() {
        let manager = manager(ManagerConfig::diagnostic());
        let dc = manager.acquire_pooled_dc().unwrap();
        let bitmap = manager.backend().create_bitmap_object(BitmapSpec::new(4, 4, 1, 24));
        manager.select_bitmap(dc, bitmap).unwrap();

        assert_eq!(manager.check_out_bitmap(bitmap), Some(dc));
        assert!(manager.backend().is_alive(bitmap));
        assert_eq!(manager.check_out_bitmap(bitmap), None);
    }

    #[test]
    fn test_failed_delete_reports_native_failure() {
        let manager = manager(ManagerConfig::diagnostic());
        let pen = manager.backend().create_pen();
        manager.backend().fail("DeleteObject");
        assert_eq!(
            manager.delete_pen(pen),
            Err(GdiError::NativeCallFailed("DeleteObject"))
        );
        assert!(manager.backend().is_alive(pen));
    }
}
