#![cfg(target_os = "windows")]

//! Win32 GDI 后端
//!
//! [`Win32Gdi`] 把 [`GdiBackend`] 的每个方法映射到一个 GDI 调用，
//! 句柄在 `windows` crate 的类型与 [`RawHandle`] 之间按指针值转换。

use std::ffi::c_void;

use log::debug;
use tk_gdi_core::{
    BitmapSpec, DcHandle, GdiBackend, ObjectCategory, PaletteEntry, RawHandle, RegionType,
    ScalarField, StockObject,
};
use windows::Win32::Foundation::COLORREF;
use windows::Win32::Graphics::Gdi::{
    BACKGROUND_MODE, CREATE_POLYGON_RGN_MODE, CreateBitmap, CreateCompatibleDC, DEFAULT_PALETTE,
    DeleteDC, DeleteObject, GET_STOCK_OBJECT_FLAGS, GetBkColor, GetBkMode, GetCurrentObject,
    GetObjectType, GetPolyFillMode, GetROP2, GetStockObject, GetTextColor, HBITMAP, HDC, HGDIOBJ, HPALETTE,
    HRGN, NULL_BRUSH, NULL_PEN, OBJ_BITMAP, OBJ_BRUSH, OBJ_FONT, OBJ_PAL, OBJ_PEN, OBJ_REGION,
    OBJ_TYPE, OffsetClipRgn, PALETTEENTRY, R2_MODE, RealizePalette, ResizePalette, SYSTEM_FONT,
    SelectClipRgn, SelectObject, SelectPalette, SetBkColor, SetBkMode, SetPaletteEntries,
    SetPolyFillMode, SetROP2, SetTextColor,
};

/// SetBkColor / SetTextColor 的失败值
const CLR_INVALID: u32 = 0xFFFF_FFFF;
/// RealizePalette 的失败值
const GDI_ERROR: u32 = 0xFFFF_FFFF;
/// GetStockObject 的索引范围 WHITE_BRUSH(0) ..= DC_PEN(19)，9 未定义
const STOCK_INDICES: std::ops::RangeInclusive<i32> = 0..=19;
const UNUSED_STOCK_INDEX: i32 = 9;

#[inline]
fn hdc(dc: DcHandle) -> HDC {
    HDC(dc.raw() as *mut c_void)
}

#[inline]
fn gdi_object(handle: RawHandle) -> HGDIOBJ {
    HGDIOBJ(handle.raw() as *mut c_void)
}

#[inline]
fn palette(handle: RawHandle) -> HPALETTE {
    HPALETTE(handle.raw() as *mut c_void)
}

#[inline]
fn raw(ptr: *mut c_void) -> RawHandle {
    RawHandle::from_raw(ptr as usize)
}

#[inline]
fn non_null(handle: RawHandle) -> Option<RawHandle> {
    (!handle.is_null()).then_some(handle)
}

fn object_type(category: ObjectCategory) -> OBJ_TYPE {
    match category {
        ObjectCategory::Pen => OBJ_PEN,
        ObjectCategory::Brush => OBJ_BRUSH,
        ObjectCategory::Font => OBJ_FONT,
        ObjectCategory::Bitmap => OBJ_BITMAP,
        ObjectCategory::Palette => OBJ_PAL,
        ObjectCategory::Region => OBJ_REGION,
    }
}

/// 基于 Win32 GDI 的原生后端
///
/// 只在创建时缓存全部库存对象句柄；其余句柄的生命周期由 `ResourceManager` 管理。
#[derive(Debug, Clone)]
pub struct Win32Gdi {
    stock: Vec<RawHandle>,
}

impl Default for Win32Gdi {
    fn default() -> Self {
        Self::new()
    }
}

impl Win32Gdi {
    pub fn new() -> Self {
        let stock = STOCK_INDICES
            .filter(|index| *index != UNUSED_STOCK_INDEX)
            // SAFETY: 库存对象由系统持有，进程内句柄不变
            .map(|index| raw(unsafe { GetStockObject(GET_STOCK_OBJECT_FLAGS(index)) }.0))
            .filter(|handle| !handle.is_null())
            .collect();
        Self { stock }
    }
}

impl GdiBackend for Win32Gdi {
    fn create_compatible_dc(&self, reference: Option<DcHandle>) -> Option<DcHandle> {
        // SAFETY: reference 为 None 时创建与屏幕兼容的 DC，否则由调用方保证其有效
        let dc = unsafe { CreateCompatibleDC(reference.map(hdc)) };
        let dc = DcHandle::from_raw(dc.0 as usize);
        (!dc.is_null()).then_some(dc)
    }

    fn delete_dc(&self, dc: DcHandle) -> bool {
        // SAFETY: 只删除由 create_compatible_dc 创建的 DC
        let deleted = unsafe { DeleteDC(hdc(dc)).as_bool() };
        if !deleted {
            debug!("DeleteDC({dc}) returned FALSE");
        }
        deleted
    }

    fn create_bitmap(&self, spec: &BitmapSpec) -> Option<RawHandle> {
        // SAFETY: 不传入初始像素数据
        let bitmap: HBITMAP =
            unsafe { CreateBitmap(spec.width, spec.height, spec.planes, spec.depth, None) };
        non_null(raw(bitmap.0))
    }

    fn delete_object(&self, object: RawHandle) -> bool {
        // SAFETY: 管理器在删除前已从所有跟踪的 DC 中取消选入
        let deleted = unsafe { DeleteObject(gdi_object(object)).as_bool() };
        if !deleted {
            debug!("DeleteObject({object}) returned FALSE");
        }
        deleted
    }

    fn object_category(&self, object: RawHandle) -> Option<ObjectCategory> {
        // SAFETY: GetObjectType 对无效句柄返回 0
        let kind = unsafe { GetObjectType(gdi_object(object)) };
        ObjectCategory::ALL
            .into_iter()
            .find(|category| object_type(*category).0 as u32 == kind)
    }

    fn stock_object(&self, stock: StockObject) -> RawHandle {
        let index = match stock {
            StockObject::NullPen => NULL_PEN,
            StockObject::NullBrush => NULL_BRUSH,
            StockObject::SystemFont => SYSTEM_FONT,
            StockObject::DefaultPalette => DEFAULT_PALETTE,
        };
        // SAFETY: 库存对象由系统持有，无需释放
        raw(unsafe { GetStockObject(index) }.0)
    }

    fn is_stock_object(&self, object: RawHandle) -> bool {
        self.stock.contains(&object)
    }

    fn select_object(&self, dc: DcHandle, object: RawHandle) -> Option<RawHandle> {
        // SAFETY: dc 与 object 由管理器跟踪，调用方保证仍然有效
        let previous = unsafe { SelectObject(hdc(dc), gdi_object(object)) };
        non_null(raw(previous.0))
    }

    fn current_object(&self, dc: DcHandle, category: ObjectCategory) -> RawHandle {
        if category == ObjectCategory::Region {
            return RawHandle::NULL;
        }
        // SAFETY: 只读查询
        raw(unsafe { GetCurrentObject(hdc(dc), object_type(category)) }.0)
    }

    fn select_palette(
        &self,
        dc: DcHandle,
        handle: RawHandle,
        force_background: bool,
    ) -> Option<RawHandle> {
        // SAFETY: 同 select_object
        let previous = unsafe { SelectPalette(hdc(dc), palette(handle), force_background) };
        non_null(raw(previous.0))
    }

    fn realize_palette(&self, dc: DcHandle) -> Option<u32> {
        // SAFETY: dc 有效
        let mapped = unsafe { RealizePalette(hdc(dc)) };
        (mapped != GDI_ERROR).then_some(mapped)
    }

    fn select_clip_region(&self, dc: DcHandle, region: Option<RawHandle>) -> RegionType {
        let region = region.map(|r| HRGN(r.raw() as *mut c_void));
        // SAFETY: SelectClipRgn 复制区域，调用后区域句柄仍归调用方所有
        RegionType::from_raw(unsafe { SelectClipRgn(hdc(dc), region) }.0)
    }

    fn offset_clip_region(&self, dc: DcHandle, dx: i32, dy: i32) -> RegionType {
        // SAFETY: dc 有效
        RegionType::from_raw(unsafe { OffsetClipRgn(hdc(dc), dx, dy) }.0)
    }

    fn scalar(&self, dc: DcHandle, field: ScalarField) -> Option<u32> {
        let dc = hdc(dc);
        // SAFETY: 只读查询
        unsafe {
            match field {
                ScalarField::DrawMode => nonzero(GetROP2(dc).0),
                ScalarField::FillMode => nonzero(GetPolyFillMode(dc)),
                ScalarField::BackgroundMode => nonzero(GetBkMode(dc)),
                ScalarField::BackgroundColor => color(GetBkColor(dc)),
                ScalarField::TextColor => color(GetTextColor(dc)),
            }
        }
    }

    fn set_scalar(&self, dc: DcHandle, field: ScalarField, value: u32) -> Option<u32> {
        let dc = hdc(dc);
        // SAFETY: dc 有效；取值由调用方保证属于对应枚举
        unsafe {
            match field {
                ScalarField::DrawMode => nonzero(SetROP2(dc, R2_MODE(value as _))),
                ScalarField::FillMode => {
                    nonzero(SetPolyFillMode(dc, CREATE_POLYGON_RGN_MODE(value as _)))
                }
                ScalarField::BackgroundMode => nonzero(SetBkMode(dc, BACKGROUND_MODE(value as _))),
                ScalarField::BackgroundColor => color(SetBkColor(dc, COLORREF(value))),
                ScalarField::TextColor => color(SetTextColor(dc, COLORREF(value))),
            }
        }
    }

    fn set_palette_entries(
        &self,
        handle: RawHandle,
        start: u32,
        entries: &[PaletteEntry],
    ) -> u32 {
        let native: Vec<PALETTEENTRY> = entries
            .iter()
            .map(|entry| PALETTEENTRY {
                peRed: entry.red,
                peGreen: entry.green,
                peBlue: entry.blue,
                peFlags: entry.flags,
            })
            .collect();
        // SAFETY: handle 是有效的调色板
        unsafe { SetPaletteEntries(palette(handle), start, &native) }
    }

    fn resize_palette(&self, handle: RawHandle, entries: u32) -> bool {
        // SAFETY: handle 是有效的调色板
        unsafe { ResizePalette(palette(handle), entries).as_bool() }
    }
}

/// Get*/Set* 模式类调用以 0 表示失败
#[inline]
fn nonzero(value: i32) -> Option<u32> {
    (value != 0).then_some(value as u32)
}

#[inline]
fn color(value: COLORREF) -> Option<u32> {
    (value.0 != CLR_INVALID).then_some(value.0)
}
