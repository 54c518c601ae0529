//! 诊断层：泄漏跟踪与缓存一致性检查
//!
//! 泄漏跟踪器是可选的观察者，开启与否都走同一条代码路径；
//! 记录的位置来自公开创建接口上的 `#[track_caller]`。

use std::collections::HashMap;
use std::fmt;
use std::panic::Location;

use parking_lot::Mutex;
use serde::Serialize;

use crate::backend::GdiBackend;
use crate::error::GdiResult;
use crate::manager::ResourceManager;
use crate::types::{DcHandle, GdiObject, ObjectCategory, RawHandle, ScalarField};

/// 被跟踪句柄的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AllocationKind {
    DeviceContext,
    Object(ObjectCategory),
}

impl fmt::Display for AllocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationKind::DeviceContext => f.write_str("device context"),
            AllocationKind::Object(category) => write!(f, "{category}"),
        }
    }
}

/// 一个仍存活的原生句柄及其创建位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub handle: RawHandle,
    pub kind: AllocationKind,
    pub file: &'static str,
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Default)]
pub struct LeakTracker {
    live: Mutex<HashMap<RawHandle, Allocation>>,
}

impl LeakTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &self,
        handle: RawHandle,
        kind: AllocationKind,
        origin: &'static Location<'static>,
    ) {
        self.live.lock().insert(
            handle,
            Allocation {
                handle,
                kind,
                file: origin.file(),
                line: origin.line(),
                column: origin.column(),
            },
        );
    }

    pub fn forget(&self, handle: RawHandle) -> bool {
        self.live.lock().remove(&handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 按句柄排序的存活分配
    pub fn snapshot(&self) -> Vec<Allocation> {
        let mut live: Vec<_> = self.live.lock().values().cloned().collect();
        live.sort_by_key(|allocation| allocation.handle);
        live
    }
}

/// 泄漏报告
#[derive(Debug, Clone, Default, Serialize)]
pub struct LeakReport {
    pub allocations: Vec<Allocation>,
}

impl LeakReport {
    pub fn is_empty(&self) -> bool {
        self.allocations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.allocations.len()
    }

    pub fn to_json(&self) -> GdiResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} live GDI handle(s)", self.allocations.len())?;
        for allocation in &self.allocations {
            writeln!(
                f,
                "  {} {} created at {}:{}:{}",
                allocation.kind,
                allocation.handle,
                allocation.file,
                allocation.line,
                allocation.column
            )?;
        }
        Ok(())
    }
}

/// 缓存与系统状态的一处不一致
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desync {
    Selection {
        dc: DcHandle,
        category: ObjectCategory,
        cached: RawHandle,
        actual: RawHandle,
    },
    Scalar {
        dc: DcHandle,
        field: ScalarField,
        cached: u32,
        actual: u32,
    },
}

impl fmt::Display for Desync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Desync::Selection {
                dc,
                category,
                cached,
                actual,
            } => write!(f, "{dc}: cached {category} {cached}, selected {actual}"),
            Desync::Scalar {
                dc,
                field,
                cached,
                actual,
            } => write!(f, "{dc}: cached {field:?} {cached:#x}, native {actual:#x}"),
        }
    }
}

impl<B: GdiBackend> ResourceManager<B> {
    /// 把外部创建的对象纳入泄漏跟踪，直到它被安全删除
    #[track_caller]
    pub fn track_object(&self, object: GdiObject) {
        self.note_created(
            object.handle,
            AllocationKind::Object(object.category),
            Location::caller(),
        );
    }

    /// 当前所有被跟踪的存活句柄；未开启跟踪时返回 `None`
    pub fn leak_report(&self) -> Option<LeakReport> {
        self.tracker.as_ref().map(|tracker| LeakReport {
            allocations: tracker.snapshot(),
        })
    }

    /// 对比每个已注册上下文的缓存与系统实际状态
    ///
    /// 只报告，不修正。裁剪区域由系统复制保存，不参与比较。
    pub fn check_consistency(&self) -> Vec<Desync> {
        let states: Vec<_> = self.registry.lock().iter().cloned().collect();
        let mut found = Vec::new();

        for state in states {
            let dc = state.dc();
            for category in ObjectCategory::ALL {
                if category == ObjectCategory::Region {
                    continue;
                }
                if category == ObjectCategory::Bitmap && !state.kind().accepts_bitmaps() {
                    continue;
                }
                let cached = state.selected(category);
                let actual = self.backend.current_object(dc, category);
                if cached != actual {
                    found.push(Desync::Selection {
                        dc,
                        category,
                        cached,
                        actual,
                    });
                }
            }

            for field in ScalarField::ALL {
                let cached = state.scalar(field);
                if let Some(actual) = self.backend.scalar(dc, field) {
                    if cached != actual {
                        found.push(Desync::Scalar {
                            dc,
                            field,
                            cached,
                            actual,
                        });
                    }
                }
            }
        }
        found
    }
}
