//! 原生 GDI 调用边界
//!
//! 子系统只通过 [`GdiBackend`] 访问操作系统。每个方法对应一个原生调用，
//! 返回值保留系统的失败约定：`None` / `false` / [`RegionType::Error`]
//! 即表示原生调用失败。

use crate::types::{
    BitmapSpec, DcHandle, ObjectCategory, PaletteEntry, RawHandle, RegionType, ScalarField,
    StockObject,
};

/// 子系统消费的原生 GDI 接口
///
/// 实现必须是 `Send + Sync`：管理器可能在任意渲染线程上被调用。
pub trait GdiBackend: Send + Sync {
    /// CreateCompatibleDC；`reference` 为 `None` 时与屏幕兼容
    fn create_compatible_dc(&self, reference: Option<DcHandle>) -> Option<DcHandle>;

    /// DeleteDC
    fn delete_dc(&self, dc: DcHandle) -> bool;

    /// CreateBitmap
    fn create_bitmap(&self, spec: &BitmapSpec) -> Option<RawHandle>;

    /// DeleteObject
    fn delete_object(&self, object: RawHandle) -> bool;

    /// GetObjectType；无效句柄或非可选对象返回 `None`
    fn object_category(&self, object: RawHandle) -> Option<ObjectCategory>;

    /// GetStockObject
    fn stock_object(&self, stock: StockObject) -> RawHandle;

    /// 是否是系统库存对象（库存对象绝不能被删除）
    fn is_stock_object(&self, object: RawHandle) -> bool;

    /// SelectObject，返回之前选中的对象
    ///
    /// 用于画笔、画刷、字体和位图。调色板与裁剪区域有各自的入口。
    fn select_object(&self, dc: DcHandle, object: RawHandle) -> Option<RawHandle>;

    /// GetCurrentObject；裁剪区域不适用
    fn current_object(&self, dc: DcHandle, category: ObjectCategory) -> RawHandle;

    /// SelectPalette，返回之前的调色板
    fn select_palette(
        &self,
        dc: DcHandle,
        palette: RawHandle,
        force_background: bool,
    ) -> Option<RawHandle>;

    /// RealizePalette，返回映射到系统调色板的条目数
    fn realize_palette(&self, dc: DcHandle) -> Option<u32>;

    /// SelectClipRgn；`None` 移除裁剪区域
    fn select_clip_region(&self, dc: DcHandle, region: Option<RawHandle>) -> RegionType;

    /// OffsetClipRgn（相对当前裁剪区域平移）
    fn offset_clip_region(&self, dc: DcHandle, dx: i32, dy: i32) -> RegionType;

    /// GetROP2 / GetPolyFillMode / GetBkMode / GetBkColor / GetTextColor
    fn scalar(&self, dc: DcHandle, field: ScalarField) -> Option<u32>;

    /// 对应的 Set* 调用，返回之前的值
    fn set_scalar(&self, dc: DcHandle, field: ScalarField, value: u32) -> Option<u32>;

    /// SetPaletteEntries，返回写入的条目数
    fn set_palette_entries(&self, palette: RawHandle, start: u32, entries: &[PaletteEntry])
    -> u32;

    /// ResizePalette
    fn resize_palette(&self, palette: RawHandle, entries: u32) -> bool;
}
