use crate::buffer::PixelAlphaBuffer;
use crate::error::{ControllerPhase, FogOfWarError};
use crate::reveal::{CirclePaint, RegionPaint, RevealEngine, query_alpha};
use crate::settings::{FogOfWarSettings, WorldMapping};
use crate::transition::TransitionPool;
use bevy::log::{debug, info};
use bevy::math::{Vec2, Vec3};
use bevy::prelude::Component;

/// A single operation against a fog of war volume.
/// 针对雾效体积的单个操作
#[derive(Debug, Clone, PartialEq)]
pub enum PaintOperation {
    PointCircular(CirclePaint),
    RegionElliptical(RegionPaint),
    /// Instantly clears a circle to fully visible.
    ClearCircle { center: Vec3, radius: f32 },
    /// Instantly clears a rectangle (`extents` = half size on X and Z).
    ClearRegion { center: Vec3, extents: Vec2 },
    ResetAll { alpha: u8 },
    QueryAlpha { world_position: Vec3 },
}

/// What [`FogOfWarController::apply`] produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperationOutcome {
    /// Number of pixels written or scheduled.
    Pixels(usize),
    /// Alpha in `[0, 1]` returned by a query.
    Alpha(f32),
}

/// State owned by an active controller.
#[derive(Debug, Clone)]
struct ActiveFog {
    buffer: PixelAlphaBuffer,
    pool: TransitionPool,
    mapping: WorldMapping,
    /// Time of the last tick or clock sync, used as the start time of new transitions.
    now: f32,
}

#[derive(Debug, Clone, Default)]
enum FogState {
    #[default]
    Uninitialized,
    Active(Box<ActiveFog>),
    Disposed,
}

/// Fog of war mask of one volume: buffer, transitions and world mapping.
/// 单个雾效体积的战争迷雾遮罩：缓冲区、过渡与世界映射
///
/// ```text
/// Uninitialized ──initialize──▶ Active ──dispose──▶ Disposed
///                                │  ▲
///                                └──┘ reset / tick / paint
/// ```
///
/// Every operation except [`FogOfWarController::initialize`] and
/// [`FogOfWarController::dispose`] requires the `Active` phase and otherwise
/// returns [`FogOfWarError::InvalidState`].
///
/// # Usage
/// ```rust
/// # use bevy_fow_mask::prelude::*;
/// # use bevy::math::Vec3;
/// # fn main() -> Result<(), FogOfWarError> {
/// let mut fog = FogOfWarController::new(FogOfWarSettings::default());
/// fog.initialize()?;
/// fog.reset(0)?;
///
/// let reveal = fog.settings().circle_paint(Vec3::ZERO, 32.0, 1.0, 0.5);
/// fog.paint_circle(&reveal)?;
/// fog.tick(1.0)?;
/// assert!(fog.query_alpha(Vec3::ZERO)? > 0.9);
/// # Ok(())
/// # }
/// ```
#[derive(Component, Debug, Clone)]
pub struct FogOfWarController {
    settings: FogOfWarSettings,
    state: FogState,
}

impl FogOfWarController {
    pub fn new(settings: FogOfWarSettings) -> Self {
        Self {
            settings,
            state: FogState::Uninitialized,
        }
    }

    pub fn settings(&self) -> &FogOfWarSettings {
        &self.settings
    }

    pub fn phase(&self) -> ControllerPhase {
        match self.state {
            FogState::Uninitialized => ControllerPhase::Uninitialized,
            FogState::Active(_) => ControllerPhase::Active,
            FogState::Disposed => ControllerPhase::Disposed,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, FogState::Active(_))
    }

    fn active(&self) -> Result<&ActiveFog, FogOfWarError> {
        match &self.state {
            FogState::Active(fog) => Ok(&**fog),
            _ => Err(FogOfWarError::InvalidState {
                phase: self.phase(),
            }),
        }
    }

    fn active_mut(&mut self) -> Result<&mut ActiveFog, FogOfWarError> {
        let phase = self.phase();
        match &mut self.state {
            FogState::Active(fog) => Ok(&mut **fog),
            _ => Err(FogOfWarError::InvalidState { phase }),
        }
    }

    /// Allocates the mask from the current settings, fully visible.
    /// 按当前设置分配遮罩，初始完全可见
    ///
    /// Calling it on an active controller reallocates the mask and drops all
    /// transitions.
    pub fn initialize(&mut self) -> Result<(), FogOfWarError> {
        self.settings.validate()?;
        let mapping = self.settings.world_mapping()?;
        self.initialize_with(self.settings.scaled_texture_size(), mapping)
    }

    /// Allocates a `grid_size × grid_size` mask over `mapping`.
    pub fn initialize_with(
        &mut self,
        grid_size: u32,
        mapping: WorldMapping,
    ) -> Result<(), FogOfWarError> {
        if let FogState::Disposed = self.state {
            return Err(FogOfWarError::InvalidState {
                phase: ControllerPhase::Disposed,
            });
        }
        let buffer = PixelAlphaBuffer::new(grid_size)?;
        let now = self.active().map_or(0.0, |fog| fog.now);
        self.settings.texture_size = grid_size;
        self.settings.center = mapping.center;
        self.settings.size = mapping.size();
        self.settings.is_local = mapping.is_local;
        self.state = FogState::Active(Box::new(ActiveFog {
            buffer,
            pool: TransitionPool::new(self.settings.max_transitions),
            mapping,
            now,
        }));
        info!(
            "Fog of war mask initialized: {}x{} pixels over {}",
            grid_size,
            grid_size,
            mapping.size()
        );
        Ok(())
    }

    /// Reallocates the mask at a new size; content is reset to fully visible.
    pub fn resize(&mut self, grid_size: u32) -> Result<(), FogOfWarError> {
        let mapping = self.active()?.mapping;
        self.initialize_with(grid_size, mapping)
    }

    /// Releases the mask. The controller cannot be used afterwards.
    /// 释放遮罩，之后控制器不可再使用
    pub fn dispose(&mut self) {
        if !matches!(self.state, FogState::Disposed) {
            debug!("Fog of war mask disposed");
        }
        self.state = FogState::Disposed;
    }

    /// Advances every transition to `now` and applies the resulting pixels.
    /// 将所有过渡推进到 `now` 并写入结果像素
    ///
    /// Returns the number of pixel updates applied.
    pub fn tick(&mut self, now: f32) -> Result<usize, FogOfWarError> {
        let fog = self.active_mut()?;
        fog.now = now;
        let updates = fog.pool.advance(now);
        for update in &updates {
            fog.buffer.set(update.coord.x, update.coord.y, update.alpha);
        }
        Ok(updates.len())
    }

    /// Sets the time stamped on transitions scheduled from now on, without
    /// advancing any of them.
    /// 设置之后调度的过渡所使用的开始时间，不推进现有过渡
    pub fn set_time(&mut self, now: f32) -> Result<(), FogOfWarError> {
        self.active_mut()?.now = now;
        Ok(())
    }

    /// Fills the mask with `alpha` and forgets every pending transition.
    pub fn reset(&mut self, alpha: u8) -> Result<(), FogOfWarError> {
        let fog = self.active_mut()?;
        fog.buffer.reset(alpha);
        fog.pool.clear();
        debug!("Fog of war mask reset to alpha {}", alpha);
        Ok(())
    }

    fn engine(&mut self) -> Result<RevealEngine<'_>, FogOfWarError> {
        let fog = self.active_mut()?;
        Ok(RevealEngine {
            buffer: &mut fog.buffer,
            pool: &mut fog.pool,
            mapping: &fog.mapping,
            now: fog.now,
        })
    }

    pub fn paint_circle(&mut self, paint: &CirclePaint) -> Result<usize, FogOfWarError> {
        Ok(self.engine()?.paint_circle(paint))
    }

    pub fn paint_region(&mut self, paint: &RegionPaint) -> Result<usize, FogOfWarError> {
        Ok(self.engine()?.paint_region(paint))
    }

    pub fn clear_circle_full(&mut self, center: Vec3, radius: f32) -> Result<usize, FogOfWarError> {
        Ok(self.engine()?.clear_circle_full(center, radius))
    }

    pub fn clear_region_full(
        &mut self,
        center: Vec3,
        extents: Vec2,
    ) -> Result<usize, FogOfWarError> {
        Ok(self.engine()?.clear_region_full(center, extents))
    }

    /// Alpha in `[0, 1]` at `world_pos`; `1.0` outside the mask.
    pub fn query_alpha(&self, world_pos: Vec3) -> Result<f32, FogOfWarError> {
        let fog = self.active()?;
        Ok(query_alpha(&fog.buffer, &fog.mapping, world_pos))
    }

    /// Dispatches a [`PaintOperation`].
    pub fn apply(&mut self, operation: &PaintOperation) -> Result<OperationOutcome, FogOfWarError> {
        let outcome = match operation {
            PaintOperation::PointCircular(paint) => {
                OperationOutcome::Pixels(self.paint_circle(paint)?)
            }
            PaintOperation::RegionElliptical(paint) => {
                OperationOutcome::Pixels(self.paint_region(paint)?)
            }
            PaintOperation::ClearCircle { center, radius } => {
                OperationOutcome::Pixels(self.clear_circle_full(*center, *radius)?)
            }
            PaintOperation::ClearRegion { center, extents } => {
                OperationOutcome::Pixels(self.clear_region_full(*center, *extents)?)
            }
            PaintOperation::ResetAll { alpha } => {
                self.reset(*alpha)?;
                let size = self.active()?.buffer.size() as usize;
                OperationOutcome::Pixels(size * size)
            }
            PaintOperation::QueryAlpha { world_position } => {
                OperationOutcome::Alpha(self.query_alpha(*world_position)?)
            }
        };
        Ok(outcome)
    }

    /// Moves the anchor followed by a local volume.
    pub fn set_anchor(&mut self, anchor: Vec3) -> Result<(), FogOfWarError> {
        self.active_mut()?.mapping.anchor = anchor;
        Ok(())
    }

    pub fn mapping(&self) -> Result<&WorldMapping, FogOfWarError> {
        Ok(&self.active()?.mapping)
    }

    pub fn buffer(&self) -> Result<&PixelAlphaBuffer, FogOfWarError> {
        Ok(&self.active()?.buffer)
    }

    pub fn transitions(&self) -> Result<&TransitionPool, FogOfWarError> {
        Ok(&self.active()?.pool)
    }

    /// Raw row-major alpha bytes of the mask.
    pub fn texture_data(&self) -> Result<&[u8], FogOfWarError> {
        Ok(self.active()?.buffer.as_bytes())
    }

    /// Replaces the mask content with raw alpha bytes and drops pending transitions.
    /// 用原始透明度数据替换遮罩内容，并清除进行中的过渡
    pub fn set_texture_data(&mut self, bytes: &[u8]) -> Result<(), FogOfWarError> {
        let fog = self.active_mut()?;
        fog.buffer.load_bytes(bytes)?;
        fog.pool.clear();
        Ok(())
    }

    /// Whether the mask changed since the last call; clears the flag.
    /// Inactive controllers never report changes.
    pub fn take_dirty(&mut self) -> bool {
        self.active_mut()
            .map(|fog| fog.buffer.take_dirty())
            .unwrap_or(false)
    }

    /// Time of the last tick or [`FogOfWarController::set_time`].
    pub fn current_time(&self) -> Result<f32, FogOfWarError> {
        Ok(self.active()?.now)
    }
}
