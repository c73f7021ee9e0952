//! Error types for the fog of war mask.

use std::fmt;
use thiserror::Error;

/// Lifecycle phase of a [`FogOfWarController`](crate::controller::FogOfWarController).
/// 控制器的生命周期阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    /// 尚未初始化
    Uninitialized,
    /// 正在运行
    Active,
    /// 已释放，不可再使用
    Disposed,
}

impl fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ControllerPhase::Uninitialized => "uninitialized",
            ControllerPhase::Active => "active",
            ControllerPhase::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Errors reported by the fog of war controller.
/// 雾效控制器错误类型
///
/// Positions outside the mask and a full transition pool are not errors: the
/// first is a no-op, the second silently drops the animation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FogOfWarError {
    /// The operation requires an active controller.
    /// 操作需要处于运行状态的控制器
    #[error("fog of war controller is {phase}, operation requires an active controller")]
    InvalidState { phase: ControllerPhase },

    /// A size, extent or buffer would leave the mask in an invalid state.
    /// 配置无效
    #[error("Invalid fog of war configuration: {0}")]
    InvalidConfiguration(String),
}
