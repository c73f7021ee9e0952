use crate::controller::{FogOfWarController, OperationOutcome, PaintOperation};
use crate::prelude::*;

/// 事件：对指定雾效体积执行一次操作
/// Event: apply one operation to a fog of war volume.
#[derive(Event, Debug, Clone)]
pub struct FogPaintRequest {
    pub target: Entity,
    pub operation: PaintOperation,
}

/// 事件：将遮罩填充为同一透明度并清除所有过渡
/// Event: fill masks with one alpha and drop their transitions.
///
/// `target: None` resets every fog volume.
///
/// Resets are applied before every [`FogPaintRequest`] of the same frame,
/// whatever order they were sent in. Use [`PaintOperation::ResetAll`] when a
/// reset must land between paints.
#[derive(Event, Debug, Clone)]
pub struct ResetFogOfWarEvent {
    pub target: Option<Entity>,
    pub alpha: u8,
}

/// 事件：[`FogPaintRequest`] 已执行
/// Event: sent once a [`FogPaintRequest`] has been applied.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct FogOperationApplied {
    pub target: Entity,
    pub outcome: OperationOutcome,
}

/// Initializes controllers added this frame that are still uninitialized.
/// 初始化本帧新增且尚未初始化的控制器
pub(crate) fn initialize_fog_controllers(
    mut controllers: Query<
        (Entity, &mut FogOfWarController, Option<&GlobalTransform>),
        Added<FogOfWarController>,
    >,
) {
    for (entity, mut controller, transform) in &mut controllers {
        if controller.phase() != ControllerPhase::Uninitialized {
            continue;
        }
        if let Err(e) = controller.initialize() {
            warn!("Failed to initialize fog of war on {:?}: {}", entity, e);
            continue;
        }
        if controller.settings().is_local
            && let Some(transform) = transform
            && let Err(e) = controller.set_anchor(transform.translation())
        {
            warn!("Failed to anchor fog of war on {:?}: {}", entity, e);
        }
    }
}

/// Local volumes follow their entity's transform.
/// 本地体积跟随实体的变换
pub(crate) fn follow_fog_anchors(
    mut controllers: Query<
        (Entity, &mut FogOfWarController, &GlobalTransform),
        Changed<GlobalTransform>,
    >,
) {
    for (entity, mut controller, transform) in &mut controllers {
        if !controller.settings().is_local || !controller.is_active() {
            continue;
        }
        let anchor = transform.translation();
        if controller.mapping().is_ok_and(|m| m.anchor == anchor) {
            continue;
        }
        if let Err(e) = controller.set_anchor(anchor) {
            warn!("Failed to anchor fog of war on {:?}: {}", entity, e);
        }
    }
}

/// Stamps the current time on active controllers so requests handled this
/// frame start their transitions now.
/// 为活动控制器设置当前时间，使本帧请求的过渡从此刻开始
pub(crate) fn sync_fog_clocks(
    time: Res<Time>,
    mut controllers: Query<(Entity, &mut FogOfWarController)>,
) {
    let now = time.elapsed_secs();
    for (entity, mut controller) in &mut controllers {
        if !controller.is_active() || controller.current_time().is_ok_and(|t| t == now) {
            continue;
        }
        if let Err(e) = controller.set_time(now) {
            warn!("Failed to set fog of war time on {:?}: {}", entity, e);
        }
    }
}

/// Applies resets, then paint requests, in the order each kind was sent.
/// 先处理重置，再按发送顺序处理绘制请求
pub(crate) fn handle_fog_requests(
    mut resets: EventReader<ResetFogOfWarEvent>,
    mut requests: EventReader<FogPaintRequest>,
    mut applied: EventWriter<FogOperationApplied>,
    mut controllers: Query<(Entity, &mut FogOfWarController)>,
) {
    for reset in resets.read() {
        for (entity, mut controller) in &mut controllers {
            if reset.target.is_some_and(|target| target != entity) {
                continue;
            }
            if let Err(e) = controller.reset(reset.alpha) {
                warn!("Failed to reset fog of war on {:?}: {}", entity, e);
            }
        }
    }

    for request in requests.read() {
        let Ok((_, mut controller)) = controllers.get_mut(request.target) else {
            warn!(
                "Fog operation targets {:?}, which has no fog of war",
                request.target
            );
            continue;
        };
        match controller.apply(&request.operation) {
            Ok(outcome) => {
                applied.write(FogOperationApplied {
                    target: request.target,
                    outcome,
                });
            }
            Err(e) => {
                warn!("Fog operation on {:?} failed: {}", request.target, e);
            }
        }
    }
}

/// Advances every active controller to the current elapsed time.
/// 将所有活动控制器推进到当前时间
pub(crate) fn tick_fog_controllers(
    time: Res<Time>,
    mut controllers: Query<&mut FogOfWarController>,
) {
    let now = time.elapsed_secs();
    for mut controller in &mut controllers {
        if !controller.is_active() {
            continue;
        }
        if let Ok(updated) = controller.tick(now)
            && updated > 0
        {
            trace!("Fog of war transitions updated {} pixels", updated);
        }
    }
}
