//! File helpers for fog of war save data.
//! 雾效保存数据的文件工具
//!
//! [`FileFormat`] pairs a [`SerializationFormat`] with an optional compression
//! algorithm. Every variant is gated behind the cargo features it needs, and
//! each maps to a conventional file extension:
//!
//! ```text
//! Format                   Extension
//! ─────────────────────────────────────
//! JSON                   → .json
//! JSON + Gzip            → .json.gz
//! MessagePack + LZ4      → .msgpack.lz4
//! Bincode                → .bincode
//! Bincode + Zstd         → .bincode.zst
//! ```
//!
//! ```rust,ignore
//! use bevy_fow_mask::persistence_utils::*;
//!
//! let save_data = controller.snapshot(None)?;
//! save_fog_data(&save_data, "autosave.bincode.lz4", FileFormat::BincodeLz4)?;
//! let restored = load_fog_data("autosave.bincode.lz4", None)?;
//! ```

use crate::persistence::{FogOfWarSaveData, PersistenceError, SerializationFormat};
#[cfg(feature = "compression-gzip")]
use std::io::{Read, Write};
use std::path::Path;

/// Compression applied on top of a serialized payload.
/// 序列化数据之上的压缩算法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    #[cfg(feature = "compression-gzip")]
    Gzip,
    #[cfg(feature = "compression-lz4")]
    Lz4,
    #[cfg(feature = "compression-zstd")]
    Zstd,
}

impl Compression {
    /// Extension suffix, without the leading dot.
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => Some("gz"),
            #[cfg(feature = "compression-lz4")]
            Compression::Lz4 => Some("lz4"),
            #[cfg(feature = "compression-zstd")]
            Compression::Zstd => Some("zst"),
        }
    }

    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            #[cfg(feature = "compression-gzip")]
            "gz" => Some(Compression::Gzip),
            #[cfg(feature = "compression-lz4")]
            "lz4" => Some(Compression::Lz4),
            #[cfg(feature = "compression-zstd")]
            "zst" => Some(Compression::Zstd),
            _ => None,
        }
    }

    pub fn compress(self, data: Vec<u8>) -> Result<Vec<u8>, PersistenceError> {
        match self {
            Compression::None => Ok(data),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => {
                use flate2::write::GzEncoder;

                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder
                    .write_all(&data)
                    .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))?;
                encoder
                    .finish()
                    .map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
            }
            #[cfg(feature = "compression-lz4")]
            Compression::Lz4 => lz4::block::compress(&data, None, true)
                .map_err(|e| PersistenceError::SerializationFailed(e.to_string())),
            // 压缩级别3（平衡）
            // Compression level 3 (balanced)
            #[cfg(feature = "compression-zstd")]
            Compression::Zstd => zstd::encode_all(&data[..], 3)
                .map_err(|e| PersistenceError::SerializationFailed(e.to_string())),
        }
    }

    pub fn decompress(self, data: Vec<u8>) -> Result<Vec<u8>, PersistenceError> {
        match self {
            Compression::None => Ok(data),
            #[cfg(feature = "compression-gzip")]
            Compression::Gzip => {
                use flate2::read::GzDecoder;

                let mut decoder = GzDecoder::new(&data[..]);
                let mut decompressed = Vec::new();
                decoder
                    .read_to_end(&mut decompressed)
                    .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
                Ok(decompressed)
            }
            #[cfg(feature = "compression-lz4")]
            Compression::Lz4 => lz4::block::decompress(&data, None)
                .map_err(|e| PersistenceError::DeserializationFailed(e.to_string())),
            #[cfg(feature = "compression-zstd")]
            Compression::Zstd => zstd::decode_all(&data[..])
                .map_err(|e| PersistenceError::DeserializationFailed(e.to_string())),
        }
    }
}

/// A serialization format with optional compression, as stored on disk.
/// 磁盘上的文件格式：序列化格式加可选压缩
///
/// | Use case        | Format           |
/// |-----------------|------------------|
/// | Debugging       | `Json`           |
/// | Autosaves       | `BincodeLz4`     |
/// | Archival        | `BincodeZstd`    |
/// | Cross-language  | `MessagePackGzip`|
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    #[cfg(feature = "format-json")]
    Json,
    #[cfg(all(feature = "format-json", feature = "compression-gzip"))]
    JsonGzip,
    #[cfg(all(feature = "format-json", feature = "compression-lz4"))]
    JsonLz4,
    #[cfg(all(feature = "format-json", feature = "compression-zstd"))]
    JsonZstd,
    #[cfg(feature = "format-messagepack")]
    MessagePack,
    #[cfg(all(feature = "format-messagepack", feature = "compression-gzip"))]
    MessagePackGzip,
    #[cfg(all(feature = "format-messagepack", feature = "compression-lz4"))]
    MessagePackLz4,
    #[cfg(all(feature = "format-messagepack", feature = "compression-zstd"))]
    MessagePackZstd,
    #[cfg(feature = "format-bincode")]
    Bincode,
    #[cfg(all(feature = "format-bincode", feature = "compression-gzip"))]
    BincodeGzip,
    #[cfg(all(feature = "format-bincode", feature = "compression-lz4"))]
    BincodeLz4,
    #[cfg(all(feature = "format-bincode", feature = "compression-zstd"))]
    BincodeZstd,
}

#[allow(clippy::needless_return)]
impl Default for FileFormat {
    fn default() -> Self {
        #[cfg(feature = "format-bincode")]
        return FileFormat::Bincode;

        #[cfg(all(not(feature = "format-bincode"), feature = "format-messagepack"))]
        return FileFormat::MessagePack;

        #[cfg(all(
            not(feature = "format-bincode"),
            not(feature = "format-messagepack"),
            feature = "format-json"
        ))]
        return FileFormat::Json;
    }
}

impl FileFormat {
    /// Every format enabled by the current cargo features.
    pub const ALL: &'static [FileFormat] = &[
        #[cfg(feature = "format-json")]
        FileFormat::Json,
        #[cfg(all(feature = "format-json", feature = "compression-gzip"))]
        FileFormat::JsonGzip,
        #[cfg(all(feature = "format-json", feature = "compression-lz4"))]
        FileFormat::JsonLz4,
        #[cfg(all(feature = "format-json", feature = "compression-zstd"))]
        FileFormat::JsonZstd,
        #[cfg(feature = "format-messagepack")]
        FileFormat::MessagePack,
        #[cfg(all(feature = "format-messagepack", feature = "compression-gzip"))]
        FileFormat::MessagePackGzip,
        #[cfg(all(feature = "format-messagepack", feature = "compression-lz4"))]
        FileFormat::MessagePackLz4,
        #[cfg(all(feature = "format-messagepack", feature = "compression-zstd"))]
        FileFormat::MessagePackZstd,
        #[cfg(feature = "format-bincode")]
        FileFormat::Bincode,
        #[cfg(all(feature = "format-bincode", feature = "compression-gzip"))]
        FileFormat::BincodeGzip,
        #[cfg(all(feature = "format-bincode", feature = "compression-lz4"))]
        FileFormat::BincodeLz4,
        #[cfg(all(feature = "format-bincode", feature = "compression-zstd"))]
        FileFormat::BincodeZstd,
    ];

    /// Combines a serialization format and a compression, if that pair is enabled.
    pub fn new(serialization: SerializationFormat, compression: Compression) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.serialization() == serialization && f.compression() == compression)
    }

    pub fn serialization(self) -> SerializationFormat {
        match self {
            #[cfg(feature = "format-json")]
            FileFormat::Json => SerializationFormat::Json,
            #[cfg(all(feature = "format-json", feature = "compression-gzip"))]
            FileFormat::JsonGzip => SerializationFormat::Json,
            #[cfg(all(feature = "format-json", feature = "compression-lz4"))]
            FileFormat::JsonLz4 => SerializationFormat::Json,
            #[cfg(all(feature = "format-json", feature = "compression-zstd"))]
            FileFormat::JsonZstd => SerializationFormat::Json,
            #[cfg(feature = "format-messagepack")]
            FileFormat::MessagePack => SerializationFormat::MessagePack,
            #[cfg(all(feature = "format-messagepack", feature = "compression-gzip"))]
            FileFormat::MessagePackGzip => SerializationFormat::MessagePack,
            #[cfg(all(feature = "format-messagepack", feature = "compression-lz4"))]
            FileFormat::MessagePackLz4 => SerializationFormat::MessagePack,
            #[cfg(all(feature = "format-messagepack", feature = "compression-zstd"))]
            FileFormat::MessagePackZstd => SerializationFormat::MessagePack,
            #[cfg(feature = "format-bincode")]
            FileFormat::Bincode => SerializationFormat::Bincode,
            #[cfg(all(feature = "format-bincode", feature = "compression-gzip"))]
            FileFormat::BincodeGzip => SerializationFormat::Bincode,
            #[cfg(all(feature = "format-bincode", feature = "compression-lz4"))]
            FileFormat::BincodeLz4 => SerializationFormat::Bincode,
            #[cfg(all(feature = "format-bincode", feature = "compression-zstd"))]
            FileFormat::BincodeZstd => SerializationFormat::Bincode,
        }
    }

    pub fn compression(self) -> Compression {
        match self {
            #[cfg(feature = "format-json")]
            FileFormat::Json => Compression::None,
            #[cfg(feature = "format-messagepack")]
            FileFormat::MessagePack => Compression::None,
            #[cfg(feature = "format-bincode")]
            FileFormat::Bincode => Compression::None,
            #[cfg(all(feature = "format-json", feature = "compression-gzip"))]
            FileFormat::JsonGzip => Compression::Gzip,
            #[cfg(all(feature = "format-messagepack", feature = "compression-gzip"))]
            FileFormat::MessagePackGzip => Compression::Gzip,
            #[cfg(all(feature = "format-bincode", feature = "compression-gzip"))]
            FileFormat::BincodeGzip => Compression::Gzip,
            #[cfg(all(feature = "format-json", feature = "compression-lz4"))]
            FileFormat::JsonLz4 => Compression::Lz4,
            #[cfg(all(feature = "format-messagepack", feature = "compression-lz4"))]
            FileFormat::MessagePackLz4 => Compression::Lz4,
            #[cfg(all(feature = "format-bincode", feature = "compression-lz4"))]
            FileFormat::BincodeLz4 => Compression::Lz4,
            #[cfg(all(feature = "format-json", feature = "compression-zstd"))]
            FileFormat::JsonZstd => Compression::Zstd,
            #[cfg(all(feature = "format-messagepack", feature = "compression-zstd"))]
            FileFormat::MessagePackZstd => Compression::Zstd,
            #[cfg(all(feature = "format-bincode", feature = "compression-zstd"))]
            FileFormat::BincodeZstd => Compression::Zstd,
        }
    }

    /// Standard file extension, without the leading dot (`"json.gz"`).
    /// 标准文件扩展名，不含前导点
    pub fn extension(self) -> String {
        let base = match self.serialization() {
            #[cfg(feature = "format-json")]
            SerializationFormat::Json => "json",
            #[cfg(feature = "format-messagepack")]
            SerializationFormat::MessagePack => "msgpack",
            #[cfg(feature = "format-bincode")]
            SerializationFormat::Bincode => "bincode",
        };
        match self.compression().suffix() {
            Some(suffix) => format!("{base}.{suffix}"),
            None => base.to_string(),
        }
    }

    /// Infers the format from a path, including compound extensions like `.json.gz`.
    /// 从路径推断文件格式，支持 `.json.gz` 等复合扩展名
    ///
    /// Returns `None` for unknown extensions or formats disabled by features.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        let serialization = |name: &str| -> Option<SerializationFormat> {
            match name {
                #[cfg(feature = "format-json")]
                "json" => Some(SerializationFormat::Json),
                #[cfg(feature = "format-messagepack")]
                "msgpack" => Some(SerializationFormat::MessagePack),
                #[cfg(feature = "format-bincode")]
                "bincode" => Some(SerializationFormat::Bincode),
                _ => None,
            }
        };

        if let Some(compression) = Compression::from_suffix(ext) {
            let stem = Path::new(path.file_stem()?);
            let inner = stem.extension()?.to_str()?;
            return FileFormat::new(serialization(inner)?, compression);
        }
        FileFormat::new(serialization(ext)?, Compression::None)
    }

    /// Serializes then compresses `data`.
    pub fn encode(self, data: &FogOfWarSaveData) -> Result<Vec<u8>, PersistenceError> {
        self.compression().compress(data.to_bytes(self.serialization())?)
    }

    /// Decompresses then deserializes `bytes`.
    pub fn decode(self, bytes: Vec<u8>) -> Result<FogOfWarSaveData, PersistenceError> {
        let raw = self.compression().decompress(bytes)?;
        FogOfWarSaveData::from_bytes(&raw, Some(self.serialization()))
    }
}

/// Writes save data to `path` in `format`.
/// 以指定格式将保存数据写入文件
pub fn save_fog_data(
    data: &FogOfWarSaveData,
    path: impl AsRef<Path>,
    format: FileFormat,
) -> Result<(), PersistenceError> {
    let bytes = format.encode(data)?;
    std::fs::write(path, bytes).map_err(|e| PersistenceError::SerializationFailed(e.to_string()))
}

/// Reads save data from `path`; `None` infers the format from the extension,
/// falling back to [`FileFormat::default`].
/// 从文件读取保存数据；`None` 时根据扩展名推断格式
pub fn load_fog_data(
    path: impl AsRef<Path>,
    format: Option<FileFormat>,
) -> Result<FogOfWarSaveData, PersistenceError> {
    let path = path.as_ref();
    let format = format
        .or_else(|| FileFormat::from_extension(path))
        .unwrap_or_default();
    let bytes =
        std::fs::read(path).map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
    format.decode(bytes)
}

/// Human-readable size of the file at `path`.
/// 文件大小（人类可读）
pub fn get_file_size_info(path: impl AsRef<Path>) -> Result<String, PersistenceError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| PersistenceError::DeserializationFailed(e.to_string()))?;
    let size = metadata.len();

    let info = if size < 1024 {
        format!("{size} B")
    } else if size < 1024 * 1024 {
        format!("{:.2} KB", size as f64 / 1024.0)
    } else {
        format!("{:.2} MB", size as f64 / (1024.0 * 1024.0))
    };
    Ok(info)
}
