//! 标量绘图状态缓存（ROP2、填充模式、背景模式、背景色、文字颜色）
//!
//! 缓存的正确性依赖于所有对这些状态的修改都经过这里；
//! 绕过它直接调用原生接口正是 `verify_cache` 要捕获的不一致来源。

use log::{trace, warn};

use crate::backend::GdiBackend;
use crate::error::{GdiError, GdiResult};
use crate::manager::ResourceManager;
use crate::types::{BackgroundMode, Color, DcHandle, DrawMode, FillMode, ScalarField};

impl<B: GdiBackend> ResourceManager<B> {
    pub fn set_draw_mode(&self, dc: DcHandle, mode: DrawMode) -> GdiResult<DrawMode> {
        self.set_scalar(dc, ScalarField::DrawMode, mode.0 as u32)
            .map(|previous| DrawMode(previous as i32))
    }

    /// 返回之前的原生填充模式值
    pub fn set_fill_mode(&self, dc: DcHandle, mode: FillMode) -> GdiResult<u32> {
        self.set_scalar(dc, ScalarField::FillMode, mode as u32)
    }

    /// 返回之前的原生背景模式值
    pub fn set_background_mode(&self, dc: DcHandle, mode: BackgroundMode) -> GdiResult<u32> {
        self.set_scalar(dc, ScalarField::BackgroundMode, mode as u32)
    }

    pub fn set_background_color(&self, dc: DcHandle, color: Color) -> GdiResult<Color> {
        self.set_scalar(dc, ScalarField::BackgroundColor, color.0)
            .map(Color)
    }

    pub fn set_text_color(&self, dc: DcHandle, color: Color) -> GdiResult<Color> {
        self.set_scalar(dc, ScalarField::TextColor, color.0)
            .map(Color)
    }

    /// 缓存中的标量值
    pub fn cached_scalar(&self, dc: DcHandle, field: ScalarField) -> Option<u32> {
        self.registry.lock().get(dc).map(|state| state.scalar(field))
    }

    /// 设置标量状态，返回之前的值
    ///
    /// 与缓存相同时跳过原生调用；`verify_cache` 开启时先用原生 getter
    /// 确认系统状态没有在缓存背后被改动，若被改动则修正缓存并真正设置。
    pub fn set_scalar(&self, dc: DcHandle, field: ScalarField, value: u32) -> GdiResult<u32> {
        let Some(cached) = self.cached_scalar(dc, field) else {
            self.usage_error(GdiError::UnknownContext(dc));
            return self
                .backend
                .set_scalar(dc, field, value)
                .ok_or(GdiError::NativeCallFailed(setter_name(field)));
        };

        if cached == value && self.scalar_holds(dc, field, cached) {
            trace!("{dc}: {field:?} already {value:#x}");
            return Ok(cached);
        }

        let previous = self
            .backend
            .set_scalar(dc, field, value)
            .ok_or(GdiError::NativeCallFailed(setter_name(field)))?;
        if let Some(state) = self.registry.lock().get_mut(dc) {
            state.scalars.set(field, value);
        }
        Ok(previous)
    }

    fn scalar_holds(&self, dc: DcHandle, field: ScalarField, cached: u32) -> bool {
        if !self.config.verify_cache {
            return true;
        }
        match self.backend.scalar(dc, field) {
            Some(actual) if actual == cached => true,
            Some(actual) => {
                warn!("{dc}: cached {field:?} {cached:#x} but native is {actual:#x}; resyncing");
                if let Some(state) = self.registry.lock().get_mut(dc) {
                    state.scalars.set(field, actual);
                }
                false
            }
            None => true,
        }
    }
}

fn setter_name(field: ScalarField) -> &'static str {
    match field {
        ScalarField::DrawMode => "SetROP2",
        ScalarField::FillMode => "SetPolyFillMode",
        ScalarField::BackgroundMode => "SetBkMode",
        ScalarField::BackgroundColor => "SetBkColor",
        ScalarField::TextColor => "SetTextColor",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagerConfig;
    use crate::mock::MockGdi;
    use crate::types::DcKind;

    fn setup(config: ManagerConfig) -> (ResourceManager<MockGdi>, DcHandle) {
        let manager = ResourceManager::with_config(MockGdi::new(), config);
        let dc = manager.backend().create_screen_dc();
        manager.register_context(dc, DcKind::Screen).unwrap();
        (manager, dc)
    }

    #[test]
    fn test_unchanged_value_skips_native_call() {
        let (manager, dc) = setup(ManagerConfig::diagnostic());
        manager.set_text_color(dc, Color::rgb(255, 0, 0)).unwrap();
        manager.set_text_color(dc, Color::rgb(255, 0, 0)).unwrap();
        assert_eq!(manager.backend().calls("SetTextColor"), 1);

        manager.set_text_color(dc, Color::rgb(0, 255, 0)).unwrap();
        assert_eq!(manager.backend().calls("SetTextColor"), 2);
    }

    #[test]
    fn test_seeded_value_is_deduped() {
        let (manager, dc) = setup(ManagerConfig::release());
        let native = manager.backend().scalar_value(dc, ScalarField::DrawMode);
        manager.set_draw_mode(dc, DrawMode(native as i32)).unwrap();
        assert_eq!(manager.backend().calls("SetROP2"), 0);
    }

    #[test]
    fn test_returns_previous_value() {
        let (manager, dc) = setup(ManagerConfig::diagnostic());
        assert_eq!(
            manager.set_draw_mode(dc, DrawMode::XOR_PEN).unwrap(),
            DrawMode::COPY_PEN
        );
        assert_eq!(
            manager.set_background_color(dc, Color::BLACK).unwrap(),
            Color::WHITE
        );
    }

    #[test]
    fn test_verification_catches_change_behind_cache() {
        let (manager, dc) = setup(ManagerConfig::diagnostic());
        manager.set_fill_mode(dc, FillMode::Winding).unwrap();
        manager
            .backend()
            .set_scalar_behind_cache(dc, ScalarField::FillMode, FillMode::Alternate as u32);

        manager.set_fill_mode(dc, FillMode::Winding).unwrap();
        assert_eq!(
            manager.backend().scalar_value(dc, ScalarField::FillMode),
            FillMode::Winding as u32
        );
    }

    #[test]
    fn test_without_verification_cache_is_trusted() {
        let (manager, dc) = setup(ManagerConfig::release());
        manager
            .set_background_mode(dc, BackgroundMode::Transparent)
            .unwrap();
        manager.backend().set_scalar_behind_cache(
            dc,
            ScalarField::BackgroundMode,
            BackgroundMode::Opaque as u32,
        );

        manager
            .set_background_mode(dc, BackgroundMode::Transparent)
            .unwrap();
        assert_eq!(manager.backend().calls("SetBkMode"), 1);
        assert_eq!(
            manager.backend().scalar_value(dc, ScalarField::BackgroundMode),
            BackgroundMode::Opaque as u32
        );
    }

    #[test]
    fn test_native_failure_keeps_cache() {
        let (manager, dc) = setup(ManagerConfig::diagnostic());
        let before = manager.cached_scalar(dc, ScalarField::TextColor);
        manager.backend().fail("SetTextColor");
        assert_eq!(
            manager.set_text_color(dc, Color::rgb(1, 2, 3)),
            Err(GdiError::NativeCallFailed("SetTextColor"))
        );
        assert_eq!(manager.cached_scalar(dc, ScalarField::TextColor), before);
    }
}
