//! Fog of war visibility mask for Bevy.
//! Bevy 的战争迷雾可见性遮罩
//!
//! Each fog volume owns a square grid of 8-bit alpha values mapped over the
//! XZ plane of a world-space box (`255` visible, `0` fully fogged). Game code
//! reveals or conceals areas with circular and elliptical brushes, optionally
//! animated and automatically restored after a delay. The plugin mirrors each
//! mask into an `R8Unorm` image for volumetric fog materials to sample.
//!
//! ```rust,ignore
//! use bevy::prelude::*;
//! use bevy_fow_mask::prelude::*;
//!
//! fn setup(mut commands: Commands) {
//!     commands.spawn(FogOfWarController::new(FogOfWarSettings::default()));
//! }
//!
//! fn reveal_around_player(
//!     player: Single<(&GlobalTransform, &Player)>,
//!     fog: Single<(Entity, &FogOfWarController)>,
//!     mut requests: EventWriter<FogPaintRequest>,
//! ) {
//!     let (entity, controller) = *fog;
//!     let paint = controller.settings().circle_paint(player.0.translation(), 20.0, 1.0, 0.3);
//!     requests.write(FogPaintRequest {
//!         target: entity,
//!         operation: PaintOperation::PointCircular(paint),
//!     });
//! }
//! ```

#[cfg(not(any(
    feature = "format-json",
    feature = "format-messagepack",
    feature = "format-bincode"
)))]
compile_error!(
    "enable at least one of the `format-json`, `format-messagepack` or `format-bincode` features"
);

use crate::persistence::FogOfWarPersistencePlugin;
use crate::systems::{
    FogOperationApplied, FogPaintRequest, ResetFogOfWarEvent, follow_fog_anchors,
    handle_fog_requests, initialize_fog_controllers, sync_fog_clocks, tick_fog_controllers,
};
use crate::texture::{FogOfWarTexture, attach_fog_textures, sync_fog_textures};
use bevy::app::{App, Plugin, Update};
use bevy::ecs::schedule::{IntoScheduleConfigs, SystemSet};

pub mod buffer;
pub mod controller;
pub mod error;
pub mod persistence;
pub mod persistence_utils;
pub mod prelude;
pub mod reveal;
pub mod settings;
pub mod systems;
pub mod texture;
pub mod transition;

/// 雾效系统集，按顺序在 `Update` 中运行
/// Fog of war system sets, run in order during `Update`.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum FogSystems {
    /// 初始化新控制器、跟随锚点并同步时间
    /// Initialize new controllers, follow anchors and sync clocks
    Initialize,
    /// 处理绘制与重置请求
    /// Apply paint and reset requests
    Requests,
    /// 推进过渡
    /// Advance transitions
    Tick,
    /// 保存与加载
    /// Save and load
    Persistence,
    /// 同步纹理
    /// Synchronize textures
    Sync,
}

pub struct FogOfWarPlugin;

impl Plugin for FogOfWarPlugin {
    fn build(&self, app: &mut App) {
        app.register_type::<FogOfWarTexture>()
            .add_event::<FogPaintRequest>()
            .add_event::<ResetFogOfWarEvent>()
            .add_event::<FogOperationApplied>()
            .configure_sets(
                Update,
                (
                    FogSystems::Initialize,
                    FogSystems::Requests,
                    FogSystems::Tick,
                    FogSystems::Persistence,
                    FogSystems::Sync,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    (
                        initialize_fog_controllers,
                        follow_fog_anchors,
                        sync_fog_clocks,
                        attach_fog_textures,
                    )
                        .chain()
                        .in_set(FogSystems::Initialize),
                    handle_fog_requests.in_set(FogSystems::Requests),
                    tick_fog_controllers.in_set(FogSystems::Tick),
                    sync_fog_textures.in_set(FogSystems::Sync),
                ),
            )
            .add_plugins(FogOfWarPersistencePlugin);
    }
}
