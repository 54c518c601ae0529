//! GDI 句柄、对象类别与缓存的标量状态类型

use std::fmt;

use serde::{Deserialize, Serialize};

/// 原生 GDI 句柄的整数表示
///
/// 值为 0 表示空句柄（对应 Win32 的 `NULL`）。
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct RawHandle(usize);

impl RawHandle {
    /// 空句柄
    pub const NULL: RawHandle = RawHandle(0);

    #[inline]
    pub const fn from_raw(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for RawHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// 设备上下文（HDC）句柄
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DcHandle(RawHandle);

impl DcHandle {
    #[inline]
    pub const fn from_raw(value: usize) -> Self {
        Self(RawHandle::from_raw(value))
    }

    #[inline]
    pub const fn raw(self) -> usize {
        self.0.raw()
    }

    #[inline]
    pub const fn handle(self) -> RawHandle {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for DcHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hdc {}", self.0)
    }
}

/// 可选入设备上下文的对象类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectCategory {
    Pen,
    Brush,
    Font,
    Bitmap,
    Palette,
    /// 裁剪区域
    Region,
}

impl ObjectCategory {
    pub const COUNT: usize = 6;

    pub const ALL: [ObjectCategory; Self::COUNT] = [
        ObjectCategory::Pen,
        ObjectCategory::Brush,
        ObjectCategory::Font,
        ObjectCategory::Bitmap,
        ObjectCategory::Palette,
        ObjectCategory::Region,
    ];

    /// 在每个上下文的选中数组中的下标
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ObjectCategory::Pen => 0,
            ObjectCategory::Brush => 1,
            ObjectCategory::Font => 2,
            ObjectCategory::Bitmap => 3,
            ObjectCategory::Palette => 4,
            ObjectCategory::Region => 5,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ObjectCategory::Pen => "pen",
            ObjectCategory::Brush => "brush",
            ObjectCategory::Font => "font",
            ObjectCategory::Bitmap => "bitmap",
            ObjectCategory::Palette => "palette",
            ObjectCategory::Region => "region",
        }
    }
}

impl fmt::Display for ObjectCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 带类别标签的 GDI 对象
///
/// 类别在调用点静态确定，删除时无需再向系统查询对象类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GdiObject {
    pub category: ObjectCategory,
    pub handle: RawHandle,
}

impl GdiObject {
    #[inline]
    pub const fn new(category: ObjectCategory, handle: RawHandle) -> Self {
        Self { category, handle }
    }

    pub const fn pen(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Pen, handle)
    }

    pub const fn brush(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Brush, handle)
    }

    pub const fn font(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Font, handle)
    }

    pub const fn bitmap(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Bitmap, handle)
    }

    pub const fn palette(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Palette, handle)
    }

    pub const fn region(handle: RawHandle) -> Self {
        Self::new(ObjectCategory::Region, handle)
    }
}

impl fmt::Display for GdiObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.category, self.handle)
    }
}

/// 设备上下文的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DcKind {
    /// 窗口/屏幕 DC（GetDC）
    Screen,
    /// 内存 DC（CreateCompatibleDC）
    Memory,
    Metafile,
    EnhancedMetafile,
}

impl DcKind {
    /// 该种类的 DC 是否可以选入位图
    pub const fn accepts_bitmaps(self) -> bool {
        matches!(self, DcKind::Memory)
    }
}

/// 系统共享的库存对象
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StockObject {
    NullPen,
    NullBrush,
    SystemFont,
    DefaultPalette,
}

/// 池化位图的规格
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BitmapSpec {
    pub width: i32,
    pub height: i32,
    pub planes: u32,
    pub depth: u32,
}

impl BitmapSpec {
    pub const fn new(width: i32, height: i32, planes: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            planes,
            depth,
        }
    }

    /// 位面数与位深是否一致
    #[inline]
    pub fn same_format(&self, other: &BitmapSpec) -> bool {
        self.planes == other.planes && self.depth == other.depth
    }

    /// 当前规格能否直接满足 `request`
    #[inline]
    pub fn covers(&self, request: &BitmapSpec) -> bool {
        self.same_format(request) && self.width >= request.width && self.height >= request.height
    }

    /// 同格式下取两者尺寸的最大值，避免之后反复扩容
    pub fn grown_to(&self, request: &BitmapSpec) -> BitmapSpec {
        BitmapSpec {
            width: self.width.max(request.width),
            height: self.height.max(request.height),
            planes: request.planes,
            depth: request.depth,
        }
    }
}

impl fmt::Display for BitmapSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} ({} plane(s), {} bpp)",
            self.width, self.height, self.planes, self.depth
        )
    }
}

/// 缓存的标量绘图状态字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarField {
    /// ROP2 绘制模式
    DrawMode,
    /// 多边形填充模式
    FillMode,
    BackgroundMode,
    BackgroundColor,
    TextColor,
}

impl ScalarField {
    pub const COUNT: usize = 5;

    pub const ALL: [ScalarField; Self::COUNT] = [
        ScalarField::DrawMode,
        ScalarField::FillMode,
        ScalarField::BackgroundMode,
        ScalarField::BackgroundColor,
        ScalarField::TextColor,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            ScalarField::DrawMode => 0,
            ScalarField::FillMode => 1,
            ScalarField::BackgroundMode => 2,
            ScalarField::BackgroundColor => 3,
            ScalarField::TextColor => 4,
        }
    }
}

/// 一个上下文全部标量状态的快照
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarState {
    values: [u32; ScalarField::COUNT],
}

impl ScalarState {
    #[inline]
    pub fn get(&self, field: ScalarField) -> u32 {
        self.values[field.index()]
    }

    #[inline]
    pub fn set(&mut self, field: ScalarField, value: u32) {
        self.values[field.index()] = value;
    }
}

/// COLORREF（0x00BBGGRR）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color(pub u32);

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Color((r as u32) | ((g as u32) << 8) | ((b as u32) << 16))
    }
}

/// ROP2 绘制模式（R2_*）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrawMode(pub i32);

impl DrawMode {
    pub const BLACK: DrawMode = DrawMode(1);
    pub const NOT: DrawMode = DrawMode(6);
    pub const XOR_PEN: DrawMode = DrawMode(7);
    pub const COPY_PEN: DrawMode = DrawMode(13);
    pub const WHITE: DrawMode = DrawMode(16);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FillMode {
    Alternate = 1,
    Winding = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackgroundMode {
    Transparent = 1,
    Opaque = 2,
}

/// SelectClipRgn / OffsetClipRgn 返回的区域类型
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionType {
    #[default]
    Error,
    Null,
    Simple,
    Complex,
}

impl RegionType {
    pub const fn from_raw(value: i32) -> Self {
        match value {
            1 => RegionType::Null,
            2 => RegionType::Simple,
            3 => RegionType::Complex,
            _ => RegionType::Error,
        }
    }

    #[inline]
    pub const fn is_error(self) -> bool {
        matches!(self, RegionType::Error)
    }
}

/// 调色板条目（PALETTEENTRY）
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub flags: u8,
}
