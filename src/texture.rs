use crate::controller::FogOfWarController;
use crate::prelude::*;
use bevy::asset::RenderAssetUsages;
use bevy::image::ImageSampler;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat, TextureUsages};

/// Handle to the `R8Unorm` image mirroring a fog volume's mask.
/// 镜像雾效体积遮罩的 `R8Unorm` 图像句柄
///
/// Added by the plugin when a [`FogOfWarController`] is initialized. The image
/// is rewritten whenever the mask is dirty, so materials can sample it
/// directly: `texture(uv).r` is the mask alpha, with `uv` mapped over the
/// volume's XZ extent as described by its
/// [`WorldMapping`](crate::settings::WorldMapping).
#[derive(Component, Debug, Clone, Reflect)]
#[reflect(Component)]
pub struct FogOfWarTexture {
    pub handle: Handle<Image>,
}

/// Builds an image from raw mask bytes.
/// 由原始遮罩数据创建图像
pub fn create_mask_image(size: u32, alpha: &[u8]) -> Image {
    let extent = Extent3d {
        width: size,
        height: size,
        ..default()
    };
    let mut image = Image::new_fill(
        extent,
        TextureDimension::D2,
        &[u8::MAX],
        TextureFormat::R8Unorm,
        RenderAssetUsages::RENDER_WORLD | RenderAssetUsages::MAIN_WORLD,
    );
    image.texture_descriptor.usage |= TextureUsages::COPY_DST | TextureUsages::TEXTURE_BINDING;
    image.sampler = ImageSampler::linear();
    if alpha.len() == (size as usize) * (size as usize) {
        image.data = Some(alpha.to_vec());
    }
    image
}

/// Attaches a [`FogOfWarTexture`] to active controllers that have none yet.
pub(crate) fn attach_fog_textures(
    mut commands: Commands,
    mut images: ResMut<Assets<Image>>,
    controllers: Query<(Entity, &FogOfWarController), Without<FogOfWarTexture>>,
) {
    for (entity, controller) in &controllers {
        let Ok(buffer) = controller.buffer() else {
            continue;
        };
        let handle = images.add(create_mask_image(buffer.size(), buffer.as_bytes()));
        debug!("Created fog of war texture {:?} for {:?}", handle.id(), entity);
        commands.entity(entity).insert(FogOfWarTexture { handle });
    }
}

/// Copies dirty masks into their images, recreating an image whose size changed.
/// 将已修改的遮罩复制到图像中；尺寸变化时重新创建图像
pub(crate) fn sync_fog_textures(
    mut images: ResMut<Assets<Image>>,
    mut controllers: Query<(&mut FogOfWarController, &mut FogOfWarTexture)>,
) {
    for (mut controller, mut texture) in &mut controllers {
        if !controller.take_dirty() {
            continue;
        }
        let Ok(buffer) = controller.buffer() else {
            continue;
        };
        let size = buffer.size();

        match images.get_mut(&texture.handle) {
            Some(image) if image.width() == size && image.height() == size => {
                image.data = Some(buffer.as_bytes().to_vec());
            }
            _ => {
                trace!("Recreating fog of war texture at {}x{}", size, size);
                texture.handle = images.add(create_mask_image(size, buffer.as_bytes()));
            }
        }
    }
}
