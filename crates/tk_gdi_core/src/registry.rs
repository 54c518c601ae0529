//! 设备上下文注册表
//!
//! 每个已注册的 DC 对应一条 [`DeviceContextState`]，缓存各类别当前选中的
//! 对象、标量绘图状态与裁剪区域。选入调用在缓存命中时直接返回，
//! 不再调用原生接口。

use std::collections::HashMap;

use log::{trace, warn};

use crate::arena::SlotArena;
use crate::backend::GdiBackend;
use crate::error::{GdiError, GdiResult};
use crate::manager::ResourceManager;
use crate::types::{
    DcHandle, DcKind, GdiObject, ObjectCategory, RawHandle, RegionType, ScalarField, ScalarState,
    StockObject,
};

/// 裁剪区域记录
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ClipState {
    /// 最近一次选入的区域；`None` 表示没有裁剪
    pub region: Option<RawHandle>,
    pub region_type: RegionType,
    /// 相对所选区域最近一次应用的偏移
    pub offset: (i32, i32),
}

/// 单个设备上下文的缓存状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceContextState {
    dc: DcHandle,
    kind: DcKind,
    selected: [RawHandle; ObjectCategory::COUNT],
    default_bitmap: RawHandle,
    pub(crate) scalars: ScalarState,
    pub(crate) palette_realized: bool,
    pub(crate) clip: ClipState,
}

impl DeviceContextState {
    pub fn dc(&self) -> DcHandle {
        self.dc
    }

    pub fn kind(&self) -> DcKind {
        self.kind
    }

    /// 缓存中该类别当前选中的对象
    ///
    /// 裁剪区域返回最近选入的区域句柄，没有裁剪时为空句柄。
    pub fn selected(&self, category: ObjectCategory) -> RawHandle {
        self.selected[category.index()]
    }

    pub(crate) fn set_selected(&mut self, category: ObjectCategory, handle: RawHandle) {
        self.selected[category.index()] = handle;
        if category == ObjectCategory::Region {
            self.clip.region = (!handle.is_null()).then_some(handle);
        }
    }

    /// 用于取出位图的缺省位图（DC 创建时自带的那一张）
    pub fn default_bitmap(&self) -> RawHandle {
        self.default_bitmap
    }

    pub fn scalar(&self, field: ScalarField) -> u32 {
        self.scalars.get(field)
    }

    pub fn palette_realized(&self) -> bool {
        self.palette_realized
    }

    pub fn clip(&self) -> ClipState {
        self.clip
    }
}

#[derive(Debug, Default)]
pub(crate) struct ContextRegistry {
    states: SlotArena<DeviceContextState>,
    index: HashMap<DcHandle, usize>,
}

impl ContextRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, state: DeviceContextState) -> bool {
        if self.index.contains_key(&state.dc) {
            return false;
        }
        let dc = state.dc;
        let slot = self.states.insert(state);
        self.index.insert(dc, slot);
        true
    }

    fn remove(&mut self, dc: DcHandle) -> Option<DeviceContextState> {
        let slot = self.index.remove(&dc)?;
        self.states.remove(slot)
    }

    pub(crate) fn get(&self, dc: DcHandle) -> Option<&DeviceContextState> {
        self.states.get(*self.index.get(&dc)?)
    }

    pub(crate) fn get_mut(&mut self, dc: DcHandle) -> Option<&mut DeviceContextState> {
        self.states.get_mut(*self.index.get(&dc)?)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &DeviceContextState> {
        self.states.iter().map(|(_, state)| state)
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut DeviceContextState> {
        self.states.iter_mut().map(|(_, state)| state)
    }

    pub(crate) fn handles(&self) -> Vec<DcHandle> {
        self.iter().map(|state| state.dc).collect()
    }

    /// 缓存中选中了 `object` 的所有上下文（可排除一个）
    pub(crate) fn holders(
        &self,
        object: GdiObject,
        except: Option<DcHandle>,
    ) -> Vec<(DcHandle, RawHandle)> {
        self.iter()
            .filter(|state| Some(state.dc) != except)
            .filter(|state| state.selected(object.category) == object.handle)
            .map(|state| (state.dc, state.default_bitmap))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.states.len()
    }
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 注册一个设备上下文
    ///
    /// 缓存从原生 DC 的当前状态初始化，保证一开始就与系统一致。
    /// 重复注册同一个 DC 不会覆盖已有记录。
    pub fn register_context(&self, dc: DcHandle, kind: DcKind) -> GdiResult<()> {
        self.ensure_running()?;
        if self.is_registered(dc) {
            trace!("{dc} already registered");
            return Ok(());
        }

        let mut selected = [RawHandle::NULL; ObjectCategory::COUNT];
        for category in ObjectCategory::ALL {
            if category == ObjectCategory::Region {
                continue;
            }
            if category == ObjectCategory::Bitmap && !kind.accepts_bitmaps() {
                continue;
            }
            selected[category.index()] = self.backend.current_object(dc, category);
        }

        let mut scalars = ScalarState::default();
        for field in ScalarField::ALL {
            if let Some(value) = self.backend.scalar(dc, field) {
                scalars.set(field, value);
            }
        }

        let state = DeviceContextState {
            dc,
            kind,
            default_bitmap: selected[ObjectCategory::Bitmap.index()],
            selected,
            scalars,
            palette_realized: false,
            clip: ClipState {
                region: None,
                region_type: RegionType::Null,
                offset: (0, 0),
            },
        };

        if !self.registry.lock().insert(state) {
            trace!("{dc} registered concurrently");
        }
        Ok(())
    }

    /// 注销设备上下文
    ///
    /// 先把该 DC 上所有非缺省的选入恢复为缺省对象，被选入的对象之后才能安全删除。
    pub fn unregister_context(&self, dc: DcHandle) -> GdiResult<()> {
        let Some(state) = self.registry.lock().remove(dc) else {
            return Err(self.usage_error(GdiError::UnknownContext(dc)));
        };
        self.unwind_selections(&state);
        Ok(())
    }

    pub fn is_registered(&self, dc: DcHandle) -> bool {
        self.registry.lock().get(dc).is_some()
    }

    /// 上下文状态的快照
    pub fn find_context(&self, dc: DcHandle) -> Option<DeviceContextState> {
        self.registry.lock().get(dc).cloned()
    }

    pub fn registered_contexts(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn select_pen(&self, dc: DcHandle, pen: RawHandle) -> GdiResult<RawHandle> {
        self.select_object(dc, GdiObject::pen(pen))
    }

    pub fn select_brush(&self, dc: DcHandle, brush: RawHandle) -> GdiResult<RawHandle> {
        self.select_object(dc, GdiObject::brush(brush))
    }

    pub fn select_font(&self, dc: DcHandle, font: RawHandle) -> GdiResult<RawHandle> {
        self.select_object(dc, GdiObject::font(font))
    }

    pub fn select_bitmap(&self, dc: DcHandle, bitmap: RawHandle) -> GdiResult<RawHandle> {
        self.select_object(dc, GdiObject::bitmap(bitmap))
    }

    /// 选入调色板（前台模式）
    pub fn select_palette(&self, dc: DcHandle, palette: RawHandle) -> GdiResult<RawHandle> {
        self.select_palette_with(dc, palette, false)
    }

    /// 按类别选入对象，返回之前选中的对象
    ///
    /// 缓存命中时不调用原生接口；位图会先从其他上下文中取出。
    pub fn select_object(&self, dc: DcHandle, object: GdiObject) -> GdiResult<RawHandle> {
        match object.category {
            ObjectCategory::Palette => self.select_palette_with(dc, object.handle, false),
            ObjectCategory::Region => {
                let previous = self.find_context(dc).map(|s| s.selected(ObjectCategory::Region));
                let region = (!object.handle.is_null()).then_some(object.handle);
                self.select_clip_region(dc, region)?;
                Ok(previous.unwrap_or(RawHandle::NULL))
            }
            _ => self.select_tracked(dc, object),
        }
    }

    fn select_tracked(&self, dc: DcHandle, object: GdiObject) -> GdiResult<RawHandle> {
        let Some(state) = self.find_context(dc) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return self
                .backend
                .select_object(dc, object.handle)
                .ok_or(GdiError::NativeCallFailed("SelectObject"));
        };

        let cached = state.selected(object.category);
        if cached == object.handle && self.cache_holds(dc, object.category, cached) {
            trace!("{dc}: {object} already selected");
            return Ok(cached);
        }

        if object.category == ObjectCategory::Bitmap && !state.kind.accepts_bitmaps() {
            self.usage_error(GdiError::BitmapNotSelectable(dc));
            return self
                .backend
                .select_object(dc, object.handle)
                .ok_or(GdiError::NativeCallFailed("SelectObject"));
        }
        // 同一张位图不能同时选入两个 DC
        let released = match object.category {
            ObjectCategory::Bitmap => self.check_out_bitmap_except(object.handle, Some(dc)),
            _ => None,
        };

        let Some(previous) = self.backend.select_object(dc, object.handle) else {
            if let Some(holder) = released {
                self.return_bitmap(holder, object.handle);
            }
            return Err(GdiError::NativeCallFailed("SelectObject"));
        };

        let mut registry = self.registry.lock();
        if let Some(state) = registry.get_mut(dc) {
            state.set_selected(object.category, object.handle);
            if object.category == ObjectCategory::Bitmap && state.default_bitmap.is_null() {
                state.default_bitmap = previous;
            }
        }
        Ok(previous)
    }

    /// 选入失败后把位图放回被取出的上下文
    fn return_bitmap(&self, holder: DcHandle, bitmap: RawHandle) {
        if self.backend.select_object(holder, bitmap).is_none() {
            warn!("{holder}: could not reselect bitmap {bitmap}");
            return;
        }
        if let Some(state) = self.registry.lock().get_mut(holder) {
            state.set_selected(ObjectCategory::Bitmap, bitmap);
        }
    }

    /// 选入调色板；选入后需要重新 realize
    pub fn select_palette_with(
        &self,
        dc: DcHandle,
        palette: RawHandle,
        force_background: bool,
    ) -> GdiResult<RawHandle> {
        let Some(state) = self.find_context(dc) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return self
                .backend
                .select_palette(dc, palette, force_background)
                .ok_or(GdiError::NativeCallFailed("SelectPalette"));
        };

        let cached = state.selected(ObjectCategory::Palette);
        if cached == palette && self.cache_holds(dc, ObjectCategory::Palette, cached) {
            trace!("{dc}: palette {palette} already selected");
            return Ok(cached);
        }

        let previous = self
            .backend
            .select_palette(dc, palette, force_background)
            .ok_or(GdiError::NativeCallFailed("SelectPalette"))?;

        let mut registry = self.registry.lock();
        if let Some(state) = registry.get_mut(dc) {
            state.set_selected(ObjectCategory::Palette, palette);
            state.palette_realized = false;
        }
        Ok(previous)
    }

    /// 校验缓存命中是否仍与系统一致
    ///
    /// 只在 `verify_cache` 开启时查询原生状态；发现不一致时修正缓存并返回
    /// `false`，调用方随后执行真实的选入。
    fn cache_holds(&self, dc: DcHandle, category: ObjectCategory, cached: RawHandle) -> bool {
        if !self.config.verify_cache {
            return true;
        }
        let actual = self.backend.current_object(dc, category);
        if actual == cached {
            return true;
        }
        warn!("{dc}: cached {category} {cached} but {actual} is selected; resyncing");
        if let Some(state) = self.registry.lock().get_mut(dc) {
            state.set_selected(category, actual);
        }
        false
    }

    /// 选入裁剪区域；`None` 移除裁剪
    ///
    /// 相同区域且没有偏移时不调用原生接口。
    pub fn select_clip_region(
        &self,
        dc: DcHandle,
        region: Option<RawHandle>,
    ) -> GdiResult<RegionType> {
        let Some(state) = self.find_context(dc) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return native_region(self.backend.select_clip_region(dc, region), "SelectClipRgn");
        };

        let clip = state.clip;
        if clip.region == region && clip.offset == (0, 0) && !clip.region_type.is_error() {
            trace!("{dc}: clip region unchanged");
            return Ok(clip.region_type);
        }

        let region_type =
            native_region(self.backend.select_clip_region(dc, region), "SelectClipRgn")?;
        if let Some(state) = self.registry.lock().get_mut(dc) {
            state.set_selected(
                ObjectCategory::Region,
                region.unwrap_or(RawHandle::NULL),
            );
            state.clip.region_type = region_type;
            state.clip.offset = (0, 0);
        }
        Ok(region_type)
    }

    /// 把裁剪区域设为所选区域平移 `(x, y)` 之后的位置
    ///
    /// 偏移与缓存一致时不调用原生接口，但 `(0, 0)` 总会重新选入原区域，
    /// 用于强制恢复之前的选择。
    pub fn offset_clip_region(&self, dc: DcHandle, x: i32, y: i32) -> GdiResult<RegionType> {
        let Some(state) = self.find_context(dc) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return native_region(self.backend.offset_clip_region(dc, x, y), "OffsetClipRgn");
        };

        let clip = state.clip;
        if (x, y) != (0, 0) && clip.offset == (x, y) {
            trace!("{dc}: clip offset unchanged");
            return Ok(clip.region_type);
        }

        let mut region_type = clip.region_type;
        if clip.offset != (0, 0) || (x, y) == (0, 0) {
            region_type = native_region(
                self.backend.select_clip_region(dc, clip.region),
                "SelectClipRgn",
            )?;
        }
        if (x, y) != (0, 0) {
            region_type = native_region(self.backend.offset_clip_region(dc, x, y), "OffsetClipRgn")?;
        }

        if let Some(state) = self.registry.lock().get_mut(dc) {
            state.clip.region_type = region_type;
            state.clip.offset = (x, y);
        }
        Ok(region_type)
    }

    /// 把一个类别恢复为缺省对象并更新缓存
    ///
    /// 只有缓存仍指向 `current` 时才更新，避免覆盖别的调用刚写入的值。
    pub(crate) fn restore_default(
        &self,
        dc: DcHandle,
        category: ObjectCategory,
        current: RawHandle,
        default_bitmap: RawHandle,
    ) -> bool {
        let (ok, replacement) = match category {
            ObjectCategory::Region => {
                let ok = !self.backend.select_clip_region(dc, None).is_error();
                (ok, RawHandle::NULL)
            }
            ObjectCategory::Palette => {
                let stock = self.backend.stock_object(StockObject::DefaultPalette);
                (self.backend.select_palette(dc, stock, false).is_some(), stock)
            }
            ObjectCategory::Bitmap => {
                if default_bitmap.is_null() {
                    warn!("{dc} has no default bitmap to restore");
                    return false;
                }
                (self.backend.select_object(dc, default_bitmap).is_some(), default_bitmap)
            }
            ObjectCategory::Pen | ObjectCategory::Brush | ObjectCategory::Font => {
                let stock = self.backend.stock_object(default_stock(category));
                (self.backend.select_object(dc, stock).is_some(), stock)
            }
        };

        if !ok {
            warn!("{dc}: failed to deselect {category} {current}");
            return false;
        }

        let mut registry = self.registry.lock();
        if let Some(state) = registry.get_mut(dc) {
            if state.selected(category) == current {
                state.set_selected(category, replacement);
                match category {
                    ObjectCategory::Palette => state.palette_realized = false,
                    ObjectCategory::Region => {
                        state.clip.region_type = RegionType::Null;
                        state.clip.offset = (0, 0);
                    }
                    _ => {}
                }
            }
        }
        true
    }

    fn unwind_selections(&self, state: &DeviceContextState) {
        for category in ObjectCategory::ALL {
            let current = state.selected(category);
            if current.is_null() {
                continue;
            }
            let is_default = match category {
                ObjectCategory::Bitmap => current == state.default_bitmap,
                ObjectCategory::Region => false,
                _ => self.backend.is_stock_object(current),
            };
            if !is_default {
                self.restore_default(state.dc, category, current, state.default_bitmap);
            }
        }
    }
}

/// 各类别取消选入时使用的库存对象
pub(crate) fn default_stock(category: ObjectCategory) -> StockObject {
    match category {
        ObjectCategory::Pen => StockObject::NullPen,
        ObjectCategory::Brush => StockObject::NullBrush,
        ObjectCategory::Font => StockObject::SystemFont,
        _ => StockObject::DefaultPalette,
    }
}

fn native_region(region_type: RegionType, call: &'static str) -> GdiResult<RegionType> {
    if region_type.is_error() {
        Err(GdiError::NativeCallFailed(call))
    } else {
        Ok(region_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::mock::MockGdi;

    fn setup() -> (ResourceManager<MockGdi>, DcHandle) {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic());
        let dc = manager.backend().create_screen_dc();
        manager.register_context(dc, DcKind::Screen).unwrap();
        (manager, dc)
    }

    #[test]
    fn test_register_seeds_cache_from_native_state() {
        let (manager, dc) = setup();
        let state = manager.find_context(dc).unwrap();
        let native = manager.backend();

        assert_eq!(
            state.selected(ObjectCategory::Pen),
            native.selected(dc, ObjectCategory::Pen)
        );
        assert_eq!(
            state.scalar(ScalarField::DrawMode),
            native.scalar_value(dc, ScalarField::DrawMode)
        );
        assert!(state.default_bitmap().is_null());
        assert_eq!(state.clip().region, None);
    }

    #[test]
    fn test_memory_dc_records_default_bitmap() {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic());
        let dc = manager.acquire_pooled_dc().unwrap();
        let state = manager.find_context(dc).unwrap();
        assert_eq!(state.default_bitmap(), manager.backend().default_bitmap());
    }

    #[test]
    fn test_repeated_select_is_one_native_call() {
        let (manager, dc) = setup();
        let brush = manager.backend().create_brush();

        manager.select_brush(dc, brush).unwrap();
        manager.select_brush(dc, brush).unwrap();

        assert_eq!(manager.backend().calls("SelectObject"), 1);
        assert_eq!(manager.backend().selected(dc, ObjectCategory::Brush), brush);
    }

    #[test]
    fn test_desync_is_healed_when_verifying() {
        let (manager, dc) = setup();
        let pen = manager.backend().create_pen();
        let other = manager.backend().create_pen();
        manager.select_pen(dc, pen).unwrap();

        // 绕过管理器直接选入
        manager.backend().select_behind_cache(dc, other);
        manager.select_pen(dc, pen).unwrap();

        assert_eq!(manager.backend().selected(dc, ObjectCategory::Pen), pen);
        assert_eq!(
            manager.find_context(dc).unwrap().selected(ObjectCategory::Pen),
            pen
        );
    }

    #[test]
    fn test_failed_select_leaves_cache_untouched() {
        let (manager, dc) = setup();
        let before = manager.find_context(dc).unwrap();
        let font = manager.backend().create_font();

        manager.backend().fail("SelectObject");
        assert_eq!(
            manager.select_font(dc, font),
            Err(GdiError::NativeCallFailed("SelectObject"))
        );
        assert_eq!(manager.find_context(dc).unwrap(), before);
    }

    #[test]
    fn test_bitmap_moves_between_memory_dcs() {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic());
        let a = manager.acquire_pooled_dc().unwrap();
        let b = manager.acquire_pooled_dc().unwrap();
        let bitmap = manager
            .acquire_pooled_bitmap(crate::types::BitmapSpec::new(8, 8, 1, 24))
            .unwrap();

        manager.select_bitmap(a, bitmap).unwrap();
        manager.select_bitmap(b, bitmap).unwrap();

        let state_a = manager.find_context(a).unwrap();
        assert_eq!(state_a.selected(ObjectCategory::Bitmap), state_a.default_bitmap());
        assert_eq!(
            manager.find_context(b).unwrap().selected(ObjectCategory::Bitmap),
            bitmap
        );
        assert_eq!(manager.backend().selected(b, ObjectCategory::Bitmap), bitmap);
    }

    #[test]
    fn test_failed_bitmap_select_returns_it_to_previous_holder() {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic());
        let a = manager.acquire_pooled_dc().unwrap();
        let b = manager.acquire_pooled_dc().unwrap();
        let bitmap = manager
            .acquire_pooled_bitmap(crate::types::BitmapSpec::new(8, 8, 1, 24))
            .unwrap();
        manager.select_bitmap(a, bitmap).unwrap();

        manager.backend().reject_selections(b);
        assert_eq!(
            manager.select_bitmap(b, bitmap),
            Err(GdiError::NativeCallFailed("SelectObject"))
        );

        assert_eq!(
            manager.find_context(a).unwrap().selected(ObjectCategory::Bitmap),
            bitmap
        );
        assert_eq!(manager.backend().selected(a, ObjectCategory::Bitmap), bitmap);
        assert_ne!(
            manager.find_context(b).unwrap().selected(ObjectCategory::Bitmap),
            bitmap
        );
        assert!(manager.check_consistency().is_empty());
    }

    #[test]
    #[should_panic(expected = "does not accept bitmaps")]
    fn test_bitmap_into_screen_dc_is_usage_error() {
        let (manager, dc) = setup();
        let bitmap = manager
            .acquire_pooled_bitmap(crate::types::BitmapSpec::new(8, 8, 1, 24))
            .unwrap();
        let _ = manager.select_bitmap(dc, bitmap);
    }

    #[test]
    #[should_panic(expected = "is not registered")]
    fn test_select_into_unknown_dc_is_usage_error() {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::diagnostic());
        let dc = manager.backend().create_screen_dc();
        let pen = manager.backend().create_pen();
        let _ = manager.select_pen(dc, pen);
    }

    #[test]
    fn test_unknown_dc_still_selects_natively_when_lenient() {
        let manager = ResourceManager::with_config(MockGdi::new(), ManagerConfig::release());
        let dc = manager.backend().create_screen_dc();
        let pen = manager.backend().create_pen();
        manager.select_pen(dc, pen).unwrap();
        assert_eq!(manager.backend().selected(dc, ObjectCategory::Pen), pen);
        assert!(!manager.is_registered(dc));
    }

    #[test]
    fn test_palette_select_resets_realized_flag() {
        let (manager, dc) = setup();
        let palette = manager.backend().create_palette(16);
        manager.select_palette(dc, palette).unwrap();
        manager.realize_palette(dc).unwrap();
        assert!(manager.find_context(dc).unwrap().palette_realized());

        let other = manager.backend().create_palette(16);
        manager.select_palette(dc, other).unwrap();
        assert!(!manager.find_context(dc).unwrap().palette_realized());
    }

    #[test]
    fn test_clip_region_dedupe() {
        let (manager, dc) = setup();
        let region = manager.backend().create_region();

        assert_eq!(
            manager.select_clip_region(dc, Some(region)).unwrap(),
            RegionType::Simple
        );
        manager.select_clip_region(dc, Some(region)).unwrap();
        assert_eq!(manager.backend().calls("SelectClipRgn"), 1);

        manager.select_clip_region(dc, None).unwrap();
        assert_eq!(manager.backend().calls("SelectClipRgn"), 2);
        assert_eq!(manager.find_context(dc).unwrap().clip().region, None);
    }

    #[test]
    fn test_offset_dedupe_and_forced_reapply() {
        let (manager, dc) = setup();
        let region = manager.backend().create_region();
        manager.select_clip_region(dc, Some(region)).unwrap();

        manager.offset_clip_region(dc, 5, 7).unwrap();
        manager.offset_clip_region(dc, 5, 7).unwrap();
        assert_eq!(manager.backend().calls("OffsetClipRgn"), 1);
        assert_eq!(manager.backend().clip_of(dc), (Some(region), (5, 7)));

        // 新偏移相对原区域，而不是在上一次偏移上累加
        manager.offset_clip_region(dc, 1, 1).unwrap();
        assert_eq!(manager.backend().clip_of(dc), (Some(region), (1, 1)));

        let selects = manager.backend().calls("SelectClipRgn");
        manager.offset_clip_region(dc, 0, 0).unwrap();
        manager.offset_clip_region(dc, 0, 0).unwrap();
        assert_eq!(manager.backend().calls("SelectClipRgn"), selects + 2);
        assert_eq!(manager.backend().clip_of(dc), (Some(region), (0, 0)));
    }

    #[test]
    fn test_reselecting_offset_region_resets_offset() {
        let (manager, dc) = setup();
        let region = manager.backend().create_region();
        manager.select_clip_region(dc, Some(region)).unwrap();
        manager.offset_clip_region(dc, 3, 3).unwrap();

        manager.select_clip_region(dc, Some(region)).unwrap();
        assert_eq!(manager.backend().clip_of(dc), (Some(region), (0, 0)));
        assert_eq!(manager.find_context(dc).unwrap().clip().offset, (0, 0));
    }

    #[test]
    fn test_unregister_restores_defaults() {
        let (manager, dc) = setup();
        let pen = manager.backend().create_pen();
        let brush = manager.backend().create_brush();
        manager.select_pen(dc, pen).unwrap();
        manager.select_brush(dc, brush).unwrap();

        manager.unregister_context(dc).unwrap();

        let native = manager.backend();
        assert!(!manager.is_registered(dc));
        assert_eq!(
            native.selected(dc, ObjectCategory::Pen),
            native.stock_object(StockObject::NullPen)
        );
        assert_eq!(
            native.selected(dc, ObjectCategory::Brush),
            native.stock_object(StockObject::NullBrush)
        );
    }
}
