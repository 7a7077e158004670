use std::path::{Path, PathBuf};

use engine::{
    compile_scene_layout, load_scene_layout, LayoutError, LayoutErrorCode, SceneKey, SceneLayout,
};
use tracing::info;

const EMBEDDED_BONE_FIELD: &str = include_str!("../../../../../assets/layouts/bone_field.xml");
const EMBEDDED_ASCENT: &str = include_str!("../../../../../assets/layouts/ascent.xml");

pub(crate) fn layout_file_name(key: SceneKey) -> String {
    format!("{}.xml", key.as_token())
}

pub(crate) fn layout_path(layouts_dir: &Path, key: SceneKey) -> PathBuf {
    layouts_dir.join(layout_file_name(key))
}

fn embedded_layout(key: SceneKey) -> Option<&'static str> {
    match key {
        SceneKey::BoneField => Some(EMBEDDED_BONE_FIELD),
        SceneKey::Ascent => Some(EMBEDDED_ASCENT),
        SceneKey::Repair => None,
    }
}

/// Loads the layout for `key`, preferring `<layouts_dir>/<token>.xml` when it
/// exists and falling back to the copy built into the binary.
pub(crate) fn load_layout(
    key: SceneKey,
    layouts_dir: Option<&Path>,
) -> Result<SceneLayout, LayoutError> {
    let on_disk = layouts_dir
        .map(|dir| layout_path(dir, key))
        .filter(|path| path.is_file());

    let layout = match on_disk {
        Some(path) => {
            let layout = load_scene_layout(&path)?;
            info!(scene = %key, path = %path.display(), "layout_loaded");
            layout
        }
        None => {
            let raw = embedded_layout(key).ok_or_else(|| LayoutError {
                code: LayoutErrorCode::ReadFile,
                message: format!("no layout available for scene '{key}'"),
                source_name: layout_file_name(key),
                location: None,
            })?;
            let layout = compile_scene_layout(&format!("embedded:{}", layout_file_name(key)), raw)?;
            info!(scene = %key, "layout_loaded_embedded");
            layout
        }
    };

    if layout.scene != key {
        return Err(LayoutError {
            code: LayoutErrorCode::InvalidValue,
            message: format!(
                "layout declares scene '{}' but was loaded for '{key}'",
                layout.scene
            ),
            source_name: layout_file_name(key),
            location: None,
        });
    }
    Ok(layout)
}
