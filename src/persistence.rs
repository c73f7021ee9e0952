use crate::FogSystems;
use crate::controller::FogOfWarController;
use crate::error::FogOfWarError;
use crate::settings::FogOfWarSettings;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 序列化格式
/// Serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializationFormat {
    /// JSON格式 - 人类可读但体积较大
    /// JSON format - human readable but larger
    #[cfg(feature = "format-json")]
    Json,
    /// MessagePack格式 - 二进制高效格式
    /// MessagePack format - binary efficient format
    #[cfg(feature = "format-messagepack")]
    MessagePack,
    /// Bincode格式 - Rust原生二进制格式
    /// Bincode format - Rust native binary format
    #[cfg(feature = "format-bincode")]
    Bincode,
}

#[allow(clippy::needless_return)]
impl Default for SerializationFormat {
    fn default() -> Self {
        // 优先使用高效的二进制格式
        // Prefer efficient binary formats
        #[cfg(feature = "format-bincode")]
        return SerializationFormat::Bincode;

        #[cfg(all(not(feature = "format-bincode"), feature = "format-messagepack"))]
        return SerializationFormat::MessagePack;

        #[cfg(all(
            not(feature = "format-bincode"),
            not(feature = "format-messagepack"),
            feature = "format-json"
        ))]
        return SerializationFormat::Json;
    }
}

impl SerializationFormat {
    /// Guesses the format of encoded save data.
    /// 推测已编码数据的格式
    ///
    /// JSON documents start with `{`; anything else is assumed to be the
    /// default binary format.
    pub fn detect(data: &[u8]) -> Self {
        #[cfg(feature = "format-json")]
        if data.starts_with(b"{") {
            return SerializationFormat::Json;
        }
        let _ = data;
        SerializationFormat::default()
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, PersistenceError> {
        match self {
            #[cfg(feature = "format-json")]
            SerializationFormat::Json => serde_json::to_vec(value)
                .map_err(|e| PersistenceError::SerializationFailed(e.to_string())),
            #[cfg(feature = "format-messagepack")]
            SerializationFormat::MessagePack => rmp_serde::to_vec(value)
                .map_err(|e| PersistenceError::SerializationFailed(e.to_string())),
            #[cfg(feature = "format-bincode")]
            SerializationFormat::Bincode => {
                bincode::serde::encode_to_vec(value, bincode::config::standard())
                    .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
            }
        }
    }

    pub fn decode<T: for<'de> Deserialize<'de>>(self, data: &[u8]) -> Result<T, PersistenceError> {
        match self {
            #[cfg(feature = "format-json")]
            SerializationFormat::Json => serde_json::from_slice(data)
                .map_err(|e| PersistenceError::DeserializationFailed(e.to_string())),
            #[cfg(feature = "format-messagepack")]
            SerializationFormat::MessagePack => rmp_serde::from_slice(data)
                .map_err(|e| PersistenceError::DeserializationFailed(e.to_string())),
            #[cfg(feature = "format-bincode")]
            SerializationFormat::Bincode => {
                let (decoded, _): (T, usize) =
                    bincode::serde::decode_from_slice(data, bincode::config::standard())
                        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
                Ok(decoded)
            }
        }
    }
}

/// 雾效持久化保存数据
/// Fog of war persistence save data
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FogOfWarSaveData {
    /// 保存时间戳（Unix 秒）
    /// Save timestamp (Unix seconds)
    pub timestamp: u64,
    /// 遮罩边长（像素）
    /// Mask side length in pixels
    pub texture_size: u32,
    /// 行优先的透明度数据
    /// Row-major alpha bytes
    pub alpha: Vec<u8>,
    /// 元数据（可选）
    /// Metadata (optional)
    pub metadata: Option<SaveMetadata>,
}

/// 保存元数据
/// Save metadata
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct SaveMetadata {
    /// 插件版本
    /// Plugin version
    pub plugin_version: String,
    /// 雾效体积的世界尺寸（用于验证）
    /// World size of the fog volume (for validation)
    pub world_size: [f32; 3],
    /// 地图名称或 ID（可选）
    /// Map name or ID (optional)
    pub map_id: Option<String>,
}

impl FogOfWarSaveData {
    pub fn to_bytes(&self, format: SerializationFormat) -> Result<Vec<u8>, PersistenceError> {
        format.encode(self)
    }

    /// Decodes save data; `None` auto-detects the format.
    pub fn from_bytes(
        data: &[u8],
        format: Option<SerializationFormat>,
    ) -> Result<Self, PersistenceError> {
        let format = format.unwrap_or_else(|| SerializationFormat::detect(data));
        format.decode(data)
    }

    /// Differences with `settings` that do not prevent loading.
    /// 与当前设置之间不妨碍加载的差异
    pub fn compatibility_warnings(&self, settings: &FogOfWarSettings) -> Vec<String> {
        let mut warnings = Vec::new();
        let Some(metadata) = &self.metadata else {
            return warnings;
        };
        if metadata.plugin_version != env!("CARGO_PKG_VERSION") {
            warnings.push(format!(
                "Saved by plugin version {}, running {}",
                metadata.plugin_version,
                env!("CARGO_PKG_VERSION")
            ));
        }
        let world_size = settings.size.to_array();
        if metadata.world_size != world_size {
            warnings.push(format!(
                "Saved world size {:?} differs from current {:?}",
                metadata.world_size, world_size
            ));
        }
        warnings
    }
}

/// 雾效持久化错误
/// Fog of war persistence error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PersistenceError {
    /// 序列化失败
    /// Serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    /// 反序列化失败
    /// Deserialization failed
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),
    /// 无效的纹理尺寸
    /// Invalid texture size
    #[error("Invalid texture size: expected {expected}, found {found}")]
    InvalidTextureSize { expected: u32, found: u32 },
    #[error(transparent)]
    Fog(#[from] FogOfWarError),
}

impl FogOfWarController {
    /// Captures the mask content. Pending transitions are not saved.
    /// 捕获遮罩内容，不保存进行中的过渡
    pub fn snapshot(&self, map_id: Option<String>) -> Result<FogOfWarSaveData, PersistenceError> {
        let buffer = self.buffer()?;
        Ok(FogOfWarSaveData {
            timestamp: std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            texture_size: buffer.size(),
            alpha: buffer.as_bytes().to_vec(),
            metadata: Some(SaveMetadata {
                plugin_version: env!("CARGO_PKG_VERSION").to_string(),
                world_size: self.settings().size.to_array(),
                map_id,
            }),
        })
    }

    /// Replaces the mask with saved content and drops pending transitions.
    /// 用保存的内容替换遮罩并清除进行中的过渡
    pub fn restore(&mut self, data: &FogOfWarSaveData) -> Result<(), PersistenceError> {
        let expected = self.buffer()?.size();
        if data.texture_size != expected {
            return Err(PersistenceError::InvalidTextureSize {
                expected,
                found: data.texture_size,
            });
        }
        self.set_texture_data(&data.alpha)?;
        Ok(())
    }
}

/// 请求保存雾效数据的事件
/// Event to request saving fog of war data
#[derive(Event, Debug, Clone)]
pub struct SaveFogOfWarRequest {
    pub target: Entity,
    /// 序列化格式（None使用默认格式）
    /// Serialization format (None uses default)
    pub format: Option<SerializationFormat>,
    pub map_id: Option<String>,
}

/// 请求加载雾效数据的事件
/// Event to request loading fog of war data
#[derive(Event, Debug, Clone)]
pub struct LoadFogOfWarRequest {
    pub target: Entity,
    /// 要加载的序列化数据
    /// Serialized data to load
    pub data: Vec<u8>,
    /// 数据格式（None会尝试自动检测）
    /// Data format (None will try auto-detection)
    pub format: Option<SerializationFormat>,
}

/// 雾效数据保存完成事件
/// Event emitted when fog of war data is saved
#[derive(Event, Debug, Clone)]
pub struct FogOfWarSaved {
    pub target: Entity,
    /// 序列化的数据
    /// Serialized data
    pub data: Vec<u8>,
    /// 使用的序列化格式
    /// Serialization format used
    pub format: SerializationFormat,
    pub texture_size: u32,
}

/// 雾效数据加载完成事件
/// Event emitted when fog of war data is loaded
#[derive(Event, Debug, Clone)]
pub struct FogOfWarLoaded {
    pub target: Entity,
    pub texture_size: u32,
    /// 加载过程中的任何警告
    /// Any warnings during loading
    pub warnings: Vec<String>,
}

/// 系统：处理保存雾效数据的请求
/// System: Handle fog of war save requests
pub fn save_fog_of_war_system(
    mut save_events: EventReader<SaveFogOfWarRequest>,
    mut saved_events: EventWriter<FogOfWarSaved>,
    controllers: Query<&FogOfWarController>,
) {
    for event in save_events.read() {
        let Ok(controller) = controllers.get(event.target) else {
            warn!("Save requested for {:?}, which has no fog of war", event.target);
            continue;
        };
        let format = event.format.unwrap_or_default();
        let result = controller
            .snapshot(event.map_id.clone())
            .and_then(|save_data| Ok((save_data.to_bytes(format)?, save_data.texture_size)));

        match result {
            Ok((data, texture_size)) => {
                info!(
                    "Saved fog of war of {:?} using {:?} format: {} bytes",
                    event.target,
                    format,
                    data.len()
                );
                saved_events.write(FogOfWarSaved {
                    target: event.target,
                    data,
                    format,
                    texture_size,
                });
            }
            Err(e) => {
                error!("Failed to save fog of war of {:?}: {}", event.target, e);
            }
        }
    }
}

/// 系统：处理加载雾效数据的请求
/// System: Handle fog of war load requests
pub fn load_fog_of_war_system(
    mut load_events: EventReader<LoadFogOfWarRequest>,
    mut loaded_events: EventWriter<FogOfWarLoaded>,
    mut controllers: Query<&mut FogOfWarController>,
) {
    for event in load_events.read() {
        let Ok(mut controller) = controllers.get_mut(event.target) else {
            warn!("Load requested for {:?}, which has no fog of war", event.target);
            continue;
        };
        let result = FogOfWarSaveData::from_bytes(&event.data, event.format).and_then(|data| {
            controller.restore(&data)?;
            Ok(data)
        });

        match result {
            Ok(data) => {
                let warnings = data.compatibility_warnings(controller.settings());
                for warning in &warnings {
                    warn!("{}", warning);
                }
                info!(
                    "Loaded fog of war of {:?}: {}x{} pixels",
                    event.target, data.texture_size, data.texture_size
                );
                loaded_events.write(FogOfWarLoaded {
                    target: event.target,
                    texture_size: data.texture_size,
                    warnings,
                });
            }
            Err(e) => {
                error!("Failed to load fog of war of {:?}: {}", event.target, e);
            }
        }
    }
}

/// 插件扩展，用于添加持久化功能
/// Plugin extension for adding persistence functionality
pub struct FogOfWarPersistencePlugin;

impl Plugin for FogOfWarPersistencePlugin {
    fn build(&self, app: &mut App) {
        app.add_event::<SaveFogOfWarRequest>()
            .add_event::<LoadFogOfWarRequest>()
            .add_event::<FogOfWarSaved>()
            .add_event::<FogOfWarLoaded>()
            .add_systems(
                Update,
                (save_fog_of_war_system, load_fog_of_war_system)
                    .chain()
                    .in_set(FogSystems::Persistence),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::ALPHA_VISIBLE;

    fn controller(texture_size: u32) -> FogOfWarController {
        let mut controller = FogOfWarController::new(FogOfWarSettings {
            texture_size,
            size: Vec3::new(64.0, 0.0, 64.0),
            ..Default::default()
        });
        controller.initialize().unwrap();
        controller
    }

    #[test]
    fn snapshot_captures_mask_and_metadata() {
        let mut fog = controller(8);
        fog.reset(12).unwrap();
        let data = fog.snapshot(Some("cave".to_string())).unwrap();

        assert_eq!(data.texture_size, 8);
        assert_eq!(data.alpha.len(), 64);
        assert!(data.alpha.iter().all(|&a| a == 12));
        let metadata = data.metadata.unwrap();
        assert_eq!(metadata.world_size, [64.0, 0.0, 64.0]);
        assert_eq!(metadata.map_id.as_deref(), Some("cave"));
    }

    #[test]
    fn restore_replaces_mask_and_drops_transitions() {
        let mut source = controller(8);
        source.reset(0).unwrap();
        let saved = source.snapshot(None).unwrap();

        let mut target = controller(8);
        let reveal = target.settings().circle_paint(Vec3::ZERO, 8.0, 0.0, 1.0);
        assert!(target.paint_circle(&reveal).unwrap() > 0);
        target.take_dirty();

        target.restore(&saved).unwrap();
        assert_eq!(target.transitions().unwrap().active_count(), 0);
        assert!(target.take_dirty());
        assert_eq!(target.query_alpha(Vec3::ZERO).unwrap(), 0.0);
    }

    #[test]
    fn restore_rejects_other_sizes() {
        let saved = controller(8).snapshot(None).unwrap();
        let mut target = controller(16);
        assert_eq!(
            target.restore(&saved),
            Err(PersistenceError::InvalidTextureSize {
                expected: 16,
                found: 8
            })
        );
        assert!(target.buffer().unwrap().as_bytes().iter().all(|&a| a == ALPHA_VISIBLE));
    }

    #[test]
    fn restore_requires_active_controller() {
        let saved = controller(8).snapshot(None).unwrap();
        let mut fog = FogOfWarController::new(FogOfWarSettings::default());
        assert!(matches!(
            fog.restore(&saved),
            Err(PersistenceError::Fog(FogOfWarError::InvalidState { .. }))
        ));
    }

    #[test]
    fn encoded_data_survives_default_format() {
        let mut fog = controller(4);
        fog.set_texture_data(&(0..16).collect::<Vec<u8>>()).unwrap();
        let saved = fog.snapshot(None).unwrap();

        let bytes = saved.to_bytes(SerializationFormat::default()).unwrap();
        let decoded = FogOfWarSaveData::from_bytes(&bytes, None).unwrap();
        assert_eq!(decoded, saved);
    }

    #[cfg(feature = "format-json")]
    #[test]
    fn json_is_detected() {
        let saved = controller(4).snapshot(None).unwrap();
        let bytes = saved.to_bytes(SerializationFormat::Json).unwrap();
        assert_eq!(SerializationFormat::detect(&bytes), SerializationFormat::Json);
        assert_eq!(FogOfWarSaveData::from_bytes(&bytes, None).unwrap(), saved);
    }

    #[test]
    fn garbage_fails_to_decode() {
        let result = FogOfWarSaveData::from_bytes(&[0xff, 0x00, 0x13], None);
        assert!(matches!(
            result,
            Err(PersistenceError::DeserializationFailed(_))
        ));
    }

    #[test]
    fn warnings_report_world_size_mismatch() {
        let saved = controller(4).snapshot(None).unwrap();
        let settings = FogOfWarSettings {
            size: Vec3::new(128.0, 0.0, 128.0),
            ..Default::default()
        };
        let warnings = saved.compatibility_warnings(&settings);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("world size"));
    }
}
