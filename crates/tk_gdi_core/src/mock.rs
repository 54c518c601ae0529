//! 内存中的 GDI 模拟，供测试和基准使用
//!
//! 模拟遵守与缓存策略相关的 Win32 规则：
//! - 位图同一时间只能选入一个内存 DC，屏幕 DC 不接受位图；
//! - 仍被选入的画笔/画刷/字体/位图/调色板删除失败；
//! - 删除库存对象返回成功但什么都不做；
//! - 裁剪区域由 DC 复制保存，删除区域不受选入影响。
//!
//! 每个原生调用都会计数，且可以通过 [`MockGdi::fail`] 注入失败。

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;

use crate::backend::GdiBackend;
use crate::types::{
    BitmapSpec, Color, DcHandle, DrawMode, ObjectCategory, PaletteEntry, RawHandle, RegionType,
    ScalarField, ScalarState, StockObject,
};

#[derive(Debug, Clone)]
struct MockObject {
    category: ObjectCategory,
    stock: bool,
    spec: Option<BitmapSpec>,
    selected_into: Option<DcHandle>,
    palette_size: u32,
}

impl MockObject {
    fn new(category: ObjectCategory) -> Self {
        Self {
            category,
            stock: false,
            spec: None,
            selected_into: None,
            palette_size: 0,
        }
    }
}

#[derive(Debug, Clone)]
struct MockDc {
    memory: bool,
    selected: [RawHandle; ObjectCategory::COUNT],
    clip: Option<RawHandle>,
    offset: (i32, i32),
    scalars: ScalarState,
}

#[derive(Debug, Clone, Copy)]
struct Stock {
    null_pen: RawHandle,
    null_brush: RawHandle,
    system_font: RawHandle,
    default_palette: RawHandle,
    black_pen: RawHandle,
    white_brush: RawHandle,
    default_bitmap: RawHandle,
}

#[derive(Debug)]
struct MockState {
    next_handle: usize,
    objects: HashMap<RawHandle, MockObject>,
    dcs: HashMap<DcHandle, MockDc>,
    stock: Stock,
    calls: HashMap<&'static str, usize>,
    failing: HashSet<&'static str>,
    refused: HashSet<RawHandle>,
    rejecting: HashSet<DcHandle>,
}

impl MockState {
    fn new() -> Self {
        let mut state = Self {
            next_handle: 0x100,
            objects: HashMap::new(),
            dcs: HashMap::new(),
            stock: Stock {
                null_pen: RawHandle::NULL,
                null_brush: RawHandle::NULL,
                system_font: RawHandle::NULL,
                default_palette: RawHandle::NULL,
                black_pen: RawHandle::NULL,
                white_brush: RawHandle::NULL,
                default_bitmap: RawHandle::NULL,
            },
            calls: HashMap::new(),
            failing: HashSet::new(),
            refused: HashSet::new(),
            rejecting: HashSet::new(),
        };
        state.stock = Stock {
            null_pen: state.add_stock(ObjectCategory::Pen),
            null_brush: state.add_stock(ObjectCategory::Brush),
            system_font: state.add_stock(ObjectCategory::Font),
            default_palette: state.add_stock(ObjectCategory::Palette),
            black_pen: state.add_stock(ObjectCategory::Pen),
            white_brush: state.add_stock(ObjectCategory::Brush),
            default_bitmap: state.add_stock(ObjectCategory::Bitmap),
        };
        state
    }

    fn next(&mut self) -> RawHandle {
        let handle = RawHandle::from_raw(self.next_handle);
        self.next_handle += 4;
        handle
    }

    fn add_object(&mut self, object: MockObject) -> RawHandle {
        let handle = self.next();
        self.objects.insert(handle, object);
        handle
    }

    fn add_stock(&mut self, category: ObjectCategory) -> RawHandle {
        let mut object = MockObject::new(category);
        object.stock = true;
        self.add_object(object)
    }

    fn add_dc(&mut self, memory: bool) -> DcHandle {
        let dc = DcHandle::from_raw(self.next().raw());
        let mut selected = [RawHandle::NULL; ObjectCategory::COUNT];
        selected[ObjectCategory::Pen.index()] = self.stock.black_pen;
        selected[ObjectCategory::Brush.index()] = self.stock.white_brush;
        selected[ObjectCategory::Font.index()] = self.stock.system_font;
        selected[ObjectCategory::Palette.index()] = self.stock.default_palette;
        if memory {
            selected[ObjectCategory::Bitmap.index()] = self.stock.default_bitmap;
        }

        let mut scalars = ScalarState::default();
        scalars.set(ScalarField::DrawMode, DrawMode::COPY_PEN.0 as u32);
        scalars.set(ScalarField::FillMode, 1);
        scalars.set(ScalarField::BackgroundMode, 2);
        scalars.set(ScalarField::BackgroundColor, Color::WHITE.0);
        scalars.set(ScalarField::TextColor, Color::BLACK.0);

        self.dcs.insert(
            dc,
            MockDc {
                memory,
                selected,
                clip: None,
                offset: (0, 0),
                scalars,
            },
        );
        dc
    }

    /// 计数并返回本次调用是否应当失败
    fn call(&mut self, op: &'static str) -> bool {
        *self.calls.entry(op).or_insert(0) += 1;
        self.failing.contains(op)
    }

    fn alive(&self, handle: RawHandle, category: ObjectCategory) -> bool {
        self.objects
            .get(&handle)
            .is_some_and(|object| object.category == category)
    }

    fn is_selected_anywhere(&self, handle: RawHandle, object: &MockObject) -> bool {
        match object.category {
            ObjectCategory::Region => false,
            ObjectCategory::Bitmap => object.selected_into.is_some(),
            category => self
                .dcs
                .values()
                .any(|dc| dc.selected[category.index()] == handle),
        }
    }

    fn select(&mut self, dc: DcHandle, handle: RawHandle) -> Option<RawHandle> {
        let object = self.objects.get(&handle)?.clone();
        let target = self.dcs.get(&dc)?;
        let category = object.category;
        if matches!(category, ObjectCategory::Palette | ObjectCategory::Region) {
            return None;
        }
        if category == ObjectCategory::Bitmap {
            if !target.memory {
                return None;
            }
            if !object.stock && object.selected_into.is_some_and(|other| other != dc) {
                return None;
            }
        }

        let previous = target.selected[category.index()];
        if let Some(target) = self.dcs.get_mut(&dc) {
            target.selected[category.index()] = handle;
        }
        if category == ObjectCategory::Bitmap {
            if let Some(old) = self.objects.get_mut(&previous) {
                if !old.stock {
                    old.selected_into = None;
                }
            }
            if let Some(new) = self.objects.get_mut(&handle) {
                if !new.stock {
                    new.selected_into = Some(dc);
                }
            }
        }
        Some(previous)
    }
}

/// 模拟的 GDI 后端
#[derive(Debug)]
pub struct MockGdi {
    state: Mutex<MockState>,
}

impl Default for MockGdi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGdi {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState::new()),
        }
    }

    /// 相当于 GetDC 得到的窗口 DC（不计入调用次数）
    pub fn create_screen_dc(&self) -> DcHandle {
        self.state.lock().add_dc(false)
    }

    pub fn create_pen(&self) -> RawHandle {
        self.state
            .lock()
            .add_object(MockObject::new(ObjectCategory::Pen))
    }

    pub fn create_brush(&self) -> RawHandle {
        self.state
            .lock()
            .add_object(MockObject::new(ObjectCategory::Brush))
    }

    pub fn create_font(&self) -> RawHandle {
        self.state
            .lock()
            .add_object(MockObject::new(ObjectCategory::Font))
    }

    pub fn create_region(&self) -> RawHandle {
        self.state
            .lock()
            .add_object(MockObject::new(ObjectCategory::Region))
    }

    pub fn create_palette(&self, entries: u32) -> RawHandle {
        let mut object = MockObject::new(ObjectCategory::Palette);
        object.palette_size = entries;
        self.state.lock().add_object(object)
    }

    /// 不经过池直接创建位图（不计入调用次数）
    pub fn create_bitmap_object(&self, spec: BitmapSpec) -> RawHandle {
        let mut object = MockObject::new(ObjectCategory::Bitmap);
        object.spec = Some(spec);
        self.state.lock().add_object(object)
    }

    /// 某个原生调用被执行的次数
    pub fn calls(&self, op: &str) -> usize {
        self.state.lock().calls.get(op).copied().unwrap_or(0)
    }

    pub fn reset_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// 让该原生调用持续失败，直到 [`clear_failure`](Self::clear_failure)
    pub fn fail(&self, op: &'static str) {
        self.state.lock().failing.insert(op);
    }

    pub fn clear_failure(&self, op: &'static str) {
        self.state.lock().failing.remove(op);
    }

    /// 模拟系统因内部引用而拒绝删除某个对象
    pub fn refuse_delete(&self, handle: RawHandle) {
        self.state.lock().refused.insert(handle);
    }

    pub fn allow_delete(&self, handle: RawHandle) {
        self.state.lock().refused.remove(&handle);
    }

    /// 让 SelectObject 只对这个 DC 失败
    pub fn reject_selections(&self, dc: DcHandle) {
        self.state.lock().rejecting.insert(dc);
    }

    /// 画笔和画刷的系统缺省库存对象（新 DC 上选中的那一支）
    pub fn default_pen(&self) -> RawHandle {
        self.state.lock().stock.black_pen
    }

    pub fn default_brush(&self) -> RawHandle {
        self.state.lock().stock.white_brush
    }

    pub fn is_alive(&self, handle: RawHandle) -> bool {
        self.state.lock().objects.contains_key(&handle)
    }

    /// 系统中该 DC 实际选中的对象
    pub fn selected(&self, dc: DcHandle, category: ObjectCategory) -> RawHandle {
        self.state
            .lock()
            .dcs
            .get(&dc)
            .map_or(RawHandle::NULL, |dc| dc.selected[category.index()])
    }

    pub fn scalar_value(&self, dc: DcHandle, field: ScalarField) -> u32 {
        self.state
            .lock()
            .dcs
            .get(&dc)
            .map_or(0, |dc| dc.scalars.get(field))
    }

    /// 绕过管理器直接选入（制造缓存不一致）
    pub fn select_behind_cache(&self, dc: DcHandle, handle: RawHandle) {
        self.state.lock().select(dc, handle);
    }

    pub fn set_scalar_behind_cache(&self, dc: DcHandle, field: ScalarField, value: u32) {
        if let Some(dc) = self.state.lock().dcs.get_mut(&dc) {
            dc.scalars.set(field, value);
        }
    }

    /// 每个内存 DC 创建时自带的 1x1 库存位图
    pub fn default_bitmap(&self) -> RawHandle {
        self.state.lock().stock.default_bitmap
    }

    pub fn bitmap_spec(&self, bitmap: RawHandle) -> Option<BitmapSpec> {
        self.state.lock().objects.get(&bitmap)?.spec
    }

    /// DC 的裁剪区域与累计偏移
    pub fn clip_of(&self, dc: DcHandle) -> (Option<RawHandle>, (i32, i32)) {
        self.state
            .lock()
            .dcs
            .get(&dc)
            .map_or((None, (0, 0)), |dc| (dc.clip, dc.offset))
    }

    pub fn live_dcs(&self) -> usize {
        self.state.lock().dcs.values().filter(|dc| dc.memory).count()
    }

    /// 存活的非库存位图数
    pub fn live_bitmaps(&self) -> usize {
        self.state
            .lock()
            .objects
            .values()
            .filter(|o| o.category == ObjectCategory::Bitmap && !o.stock)
            .count()
    }
}

impl GdiBackend for MockGdi {
    fn create_compatible_dc(&self, _reference: Option<DcHandle>) -> Option<DcHandle> {
        let mut state = self.state.lock();
        if state.call("CreateCompatibleDC") {
            return None;
        }
        Some(state.add_dc(true))
    }

    fn delete_dc(&self, dc: DcHandle) -> bool {
        let mut state = self.state.lock();
        if state.call("DeleteDC") {
            return false;
        }
        let Some(removed) = state.dcs.remove(&dc) else {
            return false;
        };
        let bitmap = removed.selected[ObjectCategory::Bitmap.index()];
        if let Some(object) = state.objects.get_mut(&bitmap) {
            if !object.stock {
                object.selected_into = None;
            }
        }
        true
    }

    fn create_bitmap(&self, spec: &BitmapSpec) -> Option<RawHandle> {
        let mut state = self.state.lock();
        if state.call("CreateBitmap") || spec.width <= 0 || spec.height <= 0 {
            return None;
        }
        let mut object = MockObject::new(ObjectCategory::Bitmap);
        object.spec = Some(*spec);
        Some(state.add_object(object))
    }

    fn delete_object(&self, object: RawHandle) -> bool {
        let mut state = self.state.lock();
        if state.call("DeleteObject") {
            return false;
        }
        let Some(found) = state.objects.get(&object).cloned() else {
            return false;
        };
        if found.stock {
            return true;
        }
        if state.refused.contains(&object) || state.is_selected_anywhere(object, &found) {
            return false;
        }
        state.objects.remove(&object);
        true
    }

    fn object_category(&self, object: RawHandle) -> Option<ObjectCategory> {
        let mut state = self.state.lock();
        if state.call("GetObjectType") {
            return None;
        }
        state.objects.get(&object).map(|o| o.category)
    }

    fn stock_object(&self, stock: StockObject) -> RawHandle {
        let state = self.state.lock();
        match stock {
            StockObject::NullPen => state.stock.null_pen,
            StockObject::NullBrush => state.stock.null_brush,
            StockObject::SystemFont => state.stock.system_font,
            StockObject::DefaultPalette => state.stock.default_palette,
        }
    }

    fn is_stock_object(&self, object: RawHandle) -> bool {
        self.state
            .lock()
            .objects
            .get(&object)
            .is_some_and(|o| o.stock)
    }

    fn select_object(&self, dc: DcHandle, object: RawHandle) -> Option<RawHandle> {
        let mut state = self.state.lock();
        if state.call("SelectObject") || state.rejecting.contains(&dc) {
            return None;
        }
        state.select(dc, object)
    }

    fn current_object(&self, dc: DcHandle, category: ObjectCategory) -> RawHandle {
        let mut state = self.state.lock();
        if state.call("GetCurrentObject") || category == ObjectCategory::Region {
            return RawHandle::NULL;
        }
        state
            .dcs
            .get(&dc)
            .map_or(RawHandle::NULL, |dc| dc.selected[category.index()])
    }

    fn select_palette(
        &self,
        dc: DcHandle,
        palette: RawHandle,
        _force_background: bool,
    ) -> Option<RawHandle> {
        let mut state = self.state.lock();
        if state.call("SelectPalette") || !state.alive(palette, ObjectCategory::Palette) {
            return None;
        }
        let target = state.dcs.get_mut(&dc)?;
        let slot = &mut target.selected[ObjectCategory::Palette.index()];
        Some(std::mem::replace(slot, palette))
    }

    fn realize_palette(&self, dc: DcHandle) -> Option<u32> {
        let mut state = self.state.lock();
        if state.call("RealizePalette") {
            return None;
        }
        let palette = state.dcs.get(&dc)?.selected[ObjectCategory::Palette.index()];
        state.objects.get(&palette).map(|o| o.palette_size)
    }

    fn select_clip_region(&self, dc: DcHandle, region: Option<RawHandle>) -> RegionType {
        let mut state = self.state.lock();
        if state.call("SelectClipRgn") {
            return RegionType::Error;
        }
        if let Some(region) = region {
            if !state.alive(region, ObjectCategory::Region) {
                return RegionType::Error;
            }
        }
        let Some(target) = state.dcs.get_mut(&dc) else {
            return RegionType::Error;
        };
        target.clip = region;
        target.offset = (0, 0);
        if region.is_some() {
            RegionType::Simple
        } else {
            RegionType::Null
        }
    }

    fn offset_clip_region(&self, dc: DcHandle, dx: i32, dy: i32) -> RegionType {
        let mut state = self.state.lock();
        if state.call("OffsetClipRgn") {
            return RegionType::Error;
        }
        let Some(target) = state.dcs.get_mut(&dc) else {
            return RegionType::Error;
        };
        if target.clip.is_none() {
            return RegionType::Null;
        }
        target.offset = (target.offset.0 + dx, target.offset.1 + dy);
        RegionType::Simple
    }

    fn scalar(&self, dc: DcHandle, field: ScalarField) -> Option<u32> {
        let op = match field {
            ScalarField::DrawMode => "GetROP2",
            ScalarField::FillMode => "GetPolyFillMode",
            ScalarField::BackgroundMode => "GetBkMode",
            ScalarField::BackgroundColor => "GetBkColor",
            ScalarField::TextColor => "GetTextColor",
        };
        let mut state = self.state.lock();
        if state.call(op) {
            return None;
        }
        state.dcs.get(&dc).map(|dc| dc.scalars.get(field))
    }

    fn set_scalar(&self, dc: DcHandle, field: ScalarField, value: u32) -> Option<u32> {
        let op = match field {
            ScalarField::DrawMode => "SetROP2",
            ScalarField::FillMode => "SetPolyFillMode",
            ScalarField::BackgroundMode => "SetBkMode",
            ScalarField::BackgroundColor => "SetBkColor",
            ScalarField::TextColor => "SetTextColor",
        };
        let mut state = self.state.lock();
        if state.call(op) {
            return None;
        }
        let target = state.dcs.get_mut(&dc)?;
        let previous = target.scalars.get(field);
        target.scalars.set(field, value);
        Some(previous)
    }

    fn set_palette_entries(
        &self,
        palette: RawHandle,
        _start: u32,
        entries: &[PaletteEntry],
    ) -> u32 {
        let mut state = self.state.lock();
        if state.call("SetPaletteEntries") || !state.alive(palette, ObjectCategory::Palette) {
            return 0;
        }
        entries.len() as u32
    }

    fn resize_palette(&self, palette: RawHandle, entries: u32) -> bool {
        let mut state = self.state.lock();
        if state.call("ResizePalette") {
            return false;
        }
        match state.objects.get_mut(&palette) {
            Some(object) if object.category == ObjectCategory::Palette => {
                object.palette_size = entries;
                true
            }
            _ => false,
        }
    }
}
