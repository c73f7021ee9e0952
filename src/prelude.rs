pub use crate::{
    FogOfWarPlugin, FogSystems,
    buffer::PixelAlphaBuffer,
    controller::{FogOfWarController, OperationOutcome, PaintOperation},
    error::{ControllerPhase, FogOfWarError},
    persistence::{
        FogOfWarLoaded, FogOfWarSaveData, FogOfWarSaved, LoadFogOfWarRequest, PersistenceError,
        SaveFogOfWarRequest, SaveMetadata, SerializationFormat,
    },
    persistence_utils::{FileFormat, load_fog_data, save_fog_data},
    reveal::{CirclePaint, RegionPaint},
    settings::{ALPHA_VISIBLE, FogOfWarSettings, MAX_SIMULTANEOUS_TRANSITIONS, WorldMapping},
    systems::{FogOperationApplied, FogPaintRequest, ResetFogOfWarEvent},
    texture::FogOfWarTexture,
    transition::{Restore, TransitionPool},
};
pub(crate) use bevy::prelude::*;
