use crate::error::FogOfWarError;
use crate::reveal::{CirclePaint, RegionPaint};
use bevy::math::{Vec2, Vec3};

/// The maximum number of alpha transitions a single fog volume animates at once.
/// 单个雾效体积同时进行的最大透明度过渡数量。
pub const MAX_SIMULTANEOUS_TRANSITIONS: usize = 10_000;

/// Alpha of a fully visible (cleared) mask pixel.
/// 完全可见（已清除）像素的透明度
pub const ALPHA_VISIBLE: u8 = u8::MAX;

/// Per-volume configuration of the fog of war mask.
/// 每个雾效体积的战争迷雾遮罩配置
///
/// Every fog volume owns one copy of these settings; volumes never share state.
/// The paint helpers ([`FogOfWarSettings::circle_paint`],
/// [`FogOfWarSettings::region_paint`]) fill in the smoothness and restore
/// parameters from here, so most callers only pick a position and an alpha.
///
/// # Typical Configurations
///
/// **Regrowing fog** (revealed areas close again after a while):
/// ```rust
/// # use bevy_fow_mask::prelude::*;
/// let settings = FogOfWarSettings {
///     restore_delay: 5.0,     // seconds before regrowth starts
///     restore_duration: 2.0,  // seconds to fade back to the baseline
///     ..Default::default()
/// };
/// assert_eq!(settings.scaled_texture_size(), 256);
/// ```
///
/// **Local volume** (mask follows the owning entity):
/// ```rust
/// # use bevy_fow_mask::prelude::*;
/// # use bevy::math::Vec3;
/// let settings = FogOfWarSettings {
///     is_local: true,
///     size: Vec3::new(200.0, 0.0, 200.0),
///     texture_size: 130, // rounded down to 128
///     ..Default::default()
/// };
/// assert_eq!(settings.scaled_texture_size(), 128);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct FogOfWarSettings {
    /// Requested side length of the square mask in pixels.
    /// 请求的遮罩边长（像素）
    ///
    /// Rounded down to a multiple of four by [`Self::scaled_texture_size`].
    pub texture_size: u32,

    /// World-space center of the mask (relative to the anchor when `is_local`).
    /// 遮罩的世界空间中心
    pub center: Vec3,

    /// World-space extent covered by the mask. Only X and Z are used.
    /// 遮罩覆盖的世界空间范围，只使用 X 和 Z
    pub size: Vec3,

    /// When set, `center` is an offset from the owning entity's position.
    /// 是否跟随所属实体
    pub is_local: bool,

    /// Seconds before a concealed pixel starts growing back. Zero disables regrowth.
    /// 迷雾恢复延迟（秒），为 0 时不恢复
    pub restore_delay: f32,

    /// Seconds a regrowth transition takes to reach full alpha.
    /// 迷雾恢复持续时间（秒）
    pub restore_duration: f32,

    /// Width of the soft edge of paint operations, 0 = hard edge, 1 = full radius.
    /// 边缘平滑度
    pub smoothness: f32,

    /// Capacity of the transition pool.
    /// 过渡池容量
    pub max_transitions: usize,
}

impl Default for FogOfWarSettings {
    fn default() -> Self {
        Self {
            texture_size: 256,
            center: Vec3::ZERO,
            size: Vec3::new(1024.0, 0.0, 1024.0),
            is_local: false,
            restore_delay: 0.0,
            restore_duration: 2.0,
            smoothness: 1.0,
            max_transitions: MAX_SIMULTANEOUS_TRANSITIONS,
        }
    }
}

impl FogOfWarSettings {
    /// Texture side length actually allocated: rounded down to a multiple of 4, at least 4.
    /// 实际分配的纹理边长：向下取整为 4 的倍数，最小为 4
    pub fn scaled_texture_size(&self) -> u32 {
        (self.texture_size / 4).max(1) * 4
    }

    /// Checks the settings before a controller allocates anything.
    pub fn validate(&self) -> Result<(), FogOfWarError> {
        if self.texture_size < 1 {
            return Err(FogOfWarError::InvalidConfiguration(format!(
                "texture size must be at least 1, got {}",
                self.texture_size
            )));
        }
        WorldMapping::new(self.center, self.size).map(|_| ())
    }

    /// Builds the world mapping described by these settings.
    pub fn world_mapping(&self) -> Result<WorldMapping, FogOfWarError> {
        let mut mapping = WorldMapping::new(self.center, self.size)?;
        mapping.is_local = self.is_local;
        Ok(mapping)
    }

    /// A blended circular paint using this volume's smoothness and restore settings.
    /// 使用本体积平滑度与恢复设置的圆形绘制
    pub fn circle_paint(
        &self,
        center: Vec3,
        radius: f32,
        target_alpha: f32,
        duration: f32,
    ) -> CirclePaint {
        CirclePaint {
            center,
            radius,
            target_alpha,
            blend: true,
            duration,
            smoothness: self.smoothness,
            restore_delay: self.restore_delay,
            restore_duration: self.restore_duration,
        }
    }

    /// A blended rectangular paint using this volume's smoothness and restore settings.
    /// 使用本体积平滑度与恢复设置的矩形绘制
    pub fn region_paint(
        &self,
        center: Vec3,
        extents: Vec3,
        target_alpha: f32,
        duration: f32,
    ) -> RegionPaint {
        RegionPaint {
            center,
            extents,
            target_alpha,
            blend: true,
            duration,
            smoothness: self.smoothness,
            restore_delay: self.restore_delay,
            restore_duration: self.restore_duration,
        }
    }
}

/// Maps world positions on the XZ plane onto the mask.
/// 将 XZ 平面上的世界坐标映射到遮罩
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldMapping {
    /// 中心（本地模式下为相对锚点的偏移）
    pub center: Vec3,
    size: Vec3,
    /// 是否跟随锚点
    pub is_local: bool,
    /// 锚点位置，只在 `is_local` 时生效
    pub anchor: Vec3,
}

impl WorldMapping {
    /// Creates a global mapping. `size.x` and `size.z` must be positive.
    pub fn new(center: Vec3, size: Vec3) -> Result<Self, FogOfWarError> {
        if !(size.x > 0.0 && size.z > 0.0) {
            return Err(FogOfWarError::InvalidConfiguration(format!(
                "world size must be positive on X and Z, got {size}"
            )));
        }
        Ok(Self {
            center,
            size,
            is_local: false,
            anchor: Vec3::ZERO,
        })
    }

    pub fn size(&self) -> Vec3 {
        self.size
    }

    /// Center after applying the anchor of a local volume.
    /// 应用锚点之后的中心
    pub fn anchored_center(&self) -> Vec3 {
        if self.is_local {
            self.anchor + self.center
        } else {
            self.center
        }
    }

    /// Converts a world position to normalized mask coordinates.
    /// 将世界坐标转换为归一化的遮罩坐标
    ///
    /// `x` follows world X and `y` follows world Z. The result is not clamped:
    /// values outside `[0, 1]` lie outside the mask.
    ///
    /// ```rust
    /// # use bevy_fow_mask::prelude::*;
    /// # use bevy::math::{Vec2, Vec3};
    /// let mapping = WorldMapping::new(Vec3::ZERO, Vec3::new(4.0, 0.0, 4.0)).unwrap();
    /// assert_eq!(mapping.world_to_normalized(Vec3::ZERO), Vec2::splat(0.5));
    /// assert_eq!(mapping.world_to_normalized(Vec3::new(-2.0, 9.0, 2.0)), Vec2::new(0.0, 1.0));
    /// ```
    pub fn world_to_normalized(&self, world_pos: Vec3) -> Vec2 {
        let center = self.anchored_center();
        Vec2::new(
            (world_pos.x - center.x) / self.size.x + 0.5,
            (world_pos.z - center.z) / self.size.z + 0.5,
        )
    }

    /// Normalized coordinates, or `None` when the position is outside `[0, 1]²`.
    pub fn normalized_within(&self, world_pos: Vec3) -> Option<Vec2> {
        let uv = self.world_to_normalized(world_pos);
        let inside = (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y);
        inside.then_some(uv)
    }

    /// World length along Z converted to a mask length in pixels.
    pub fn z_length_to_pixels(&self, length: f32, height: u32) -> f32 {
        length / self.size.z * height as f32
    }

    /// World length along X converted to a mask length in pixels.
    pub fn x_length_to_pixels(&self, length: f32, width: u32) -> f32 {
        length / self.size.x * width as f32
    }
}
