use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use glam::Vec3;
use roxmltree::{Document, Node};
use tracing::warn;

use crate::app::SceneKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownElement,
    UnknownField,
    DuplicateElement,
    MissingField,
    InvalidValue,
}

#[derive(Debug, Clone)]
pub struct LayoutError {
    pub code: LayoutErrorCode,
    pub message: String,
    pub source_name: String,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (source={}, line={}, column={})",
                self.code, self.message, self.source_name, loc.line, loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (source={})",
                self.code, self.message, self.source_name
            ),
        }
    }
}

impl std::error::Error for LayoutError {}

/// A malformed entry that was repaired or skipped during compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutWarning {
    pub message: String,
    pub location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AgentSpawnDef {
    pub position: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectibleDef {
    pub id: u32,
    pub position: Vec3,
    pub progress: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortalDef {
    pub position: Vec3,
    pub radius: f32,
    pub target: SceneKey,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlatformDef {
    pub position: Vec3,
    pub size: Vec3,
    pub speed: f32,
    pub phase: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneLayout {
    pub scene: SceneKey,
    pub agent_spawn: AgentSpawnDef,
    pub collectibles: Vec<CollectibleDef>,
    pub portal: Option<PortalDef>,
    pub platforms: Vec<PlatformDef>,
    pub warnings: Vec<LayoutWarning>,
}

pub fn load_scene_layout(path: &Path) -> Result<SceneLayout, LayoutError> {
    let source_name = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|error| LayoutError {
        code: LayoutErrorCode::ReadFile,
        message: format!("failed to read layout file: {error}"),
        source_name: source_name.clone(),
        location: None,
    })?;
    compile_scene_layout(&source_name, &raw)
}

/// Compiles one `<SceneLayout>` document. Structural problems are errors;
/// duplicate collectible ids (first wins) and out-of-range progress (clamped)
/// are repaired and reported as warnings.
pub fn compile_scene_layout(source_name: &str, raw: &str) -> Result<SceneLayout, LayoutError> {
    let doc = Document::parse(raw).map_err(|error| LayoutError {
        code: LayoutErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        source_name: source_name.to_string(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let ctx = ParseContext {
        source_name,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "SceneLayout" {
        return Err(ctx.error_at(
            LayoutErrorCode::InvalidRoot,
            "root element must be <SceneLayout>".to_string(),
            root,
        ));
    }
    ctx.reject_unknown_attributes(root, &["scene"])?;
    let scene_token = ctx.required_attr(root, "scene")?;
    let scene = SceneKey::from_token(scene_token).ok_or_else(|| {
        ctx.error_at(
            LayoutErrorCode::InvalidValue,
            format!("unknown scene '{scene_token}'; allowed values: bone_field, repair, ascent"),
            root,
        )
    })?;

    let mut agent_spawn: Option<AgentSpawnDef> = None;
    let mut portal: Option<PortalDef> = None;
    let mut collectibles = Vec::<CollectibleDef>::new();
    let mut platforms = Vec::<PlatformDef>::new();
    let mut warnings = Vec::<LayoutWarning>::new();
    let mut seen_ids = HashSet::<u32>::new();

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "AgentSpawn" => {
                if agent_spawn.is_some() {
                    return Err(ctx.error_at(
                        LayoutErrorCode::DuplicateElement,
                        "a layout may declare <AgentSpawn> only once".to_string(),
                        child,
                    ));
                }
                ctx.reject_unknown_attributes(child, &["x", "y", "z"])?;
                agent_spawn = Some(AgentSpawnDef {
                    position: ctx.position(child)?,
                });
            }
            "Portal" => {
                if portal.is_some() {
                    return Err(ctx.error_at(
                        LayoutErrorCode::DuplicateElement,
                        "a layout may declare <Portal> only once".to_string(),
                        child,
                    ));
                }
                portal = Some(ctx.portal(child)?);
            }
            "Collectible" => {
                let (collectible, clamped) = ctx.collectible(child)?;
                if let Some(original) = clamped {
                    warnings.push(ctx.warning_at(
                        format!(
                            "collectible {} progress {original} clamped to {}",
                            collectible.id, collectible.progress
                        ),
                        child,
                    ));
                }
                if !seen_ids.insert(collectible.id) {
                    warnings.push(ctx.warning_at(
                        format!(
                            "duplicate collectible id {} ignored; first declaration wins",
                            collectible.id
                        ),
                        child,
                    ));
                    continue;
                }
                collectibles.push(collectible);
            }
            "Platform" => platforms.push(ctx.platform(child)?),
            other => {
                return Err(ctx.error_at(
                    LayoutErrorCode::UnknownElement,
                    format!(
                        "unknown element <{other}>; allowed: AgentSpawn, Portal, Collectible, Platform"
                    ),
                    child,
                ))
            }
        }
    }

    for warning in &warnings {
        warn!(
            source = source_name,
            line = warning.location.map(|loc| loc.line),
            message = warning.message.as_str(),
            "layout_entry_repaired"
        );
    }

    Ok(SceneLayout {
        scene,
        agent_spawn: agent_spawn.unwrap_or(AgentSpawnDef {
            position: Vec3::ZERO,
        }),
        collectibles,
        portal,
        platforms,
        warnings,
    })
}

struct ParseContext<'a, 'input> {
    source_name: &'a str,
    doc: &'a Document<'input>,
}

impl ParseContext<'_, '_> {
    fn portal(&self, node: Node<'_, '_>) -> Result<PortalDef, LayoutError> {
        self.reject_unknown_attributes(node, &["x", "y", "z", "radius", "target"])?;
        let radius = self.number_attr(node, "radius")?;
        if radius <= 0.0 {
            return Err(self.error_at(
                LayoutErrorCode::InvalidValue,
                "portal radius must be > 0".to_string(),
                node,
            ));
        }
        let target_token = self.required_attr(node, "target")?;
        let target = SceneKey::from_token(target_token).ok_or_else(|| {
            self.error_at(
                LayoutErrorCode::InvalidValue,
                format!("unknown portal target '{target_token}'"),
                node,
            )
        })?;
        Ok(PortalDef {
            position: self.position(node)?,
            radius,
            target,
        })
    }

    fn collectible(
        &self,
        node: Node<'_, '_>,
    ) -> Result<(CollectibleDef, Option<f32>), LayoutError> {
        self.reject_unknown_attributes(node, &["id", "x", "y", "z", "progress"])?;
        let raw_id = self.required_attr(node, "id")?;
        let id = raw_id.parse::<u32>().map_err(|_| {
            self.error_at(
                LayoutErrorCode::InvalidValue,
                format!("collectible id '{raw_id}' is not a non-negative integer"),
                node,
            )
        })?;
        let position = self.position(node)?;

        let mut clamped = None;
        let progress = match node.attribute("progress") {
            None => 0.0,
            Some(_) => {
                let value = self.number_attr(node, "progress")?;
                let bounded = value.clamp(0.0, 1.0);
                if bounded != value {
                    clamped = Some(value);
                }
                bounded
            }
        };

        Ok((
            CollectibleDef {
                id,
                position,
                progress,
            },
            clamped,
        ))
    }

    fn platform(&self, node: Node<'_, '_>) -> Result<PlatformDef, LayoutError> {
        self.reject_unknown_attributes(
            node,
            &["x", "y", "z", "width", "height", "depth", "speed", "phase"],
        )?;
        let size = Vec3::new(
            self.number_attr(node, "width")?,
            self.number_attr(node, "height")?,
            self.number_attr(node, "depth")?,
        );
        if size.min_element() <= 0.0 {
            return Err(self.error_at(
                LayoutErrorCode::InvalidValue,
                "platform width, height and depth must be > 0".to_string(),
                node,
            ));
        }
        Ok(PlatformDef {
            position: self.position(node)?,
            size,
            speed: self.optional_number_attr(node, "speed")?.unwrap_or(0.0),
            phase: self.optional_number_attr(node, "phase")?.unwrap_or(0.0),
        })
    }

    fn position(&self, node: Node<'_, '_>) -> Result<Vec3, LayoutError> {
        Ok(Vec3::new(
            self.number_attr(node, "x")?,
            self.optional_number_attr(node, "y")?.unwrap_or(0.0),
            self.number_attr(node, "z")?,
        ))
    }

    fn required_attr<'n>(&self, node: Node<'n, '_>, name: &str) -> Result<&'n str, LayoutError> {
        match node.attribute(name).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(self.error_at(
                LayoutErrorCode::MissingField,
                format!(
                    "missing required attribute '{name}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    fn number_attr(&self, node: Node<'_, '_>, name: &str) -> Result<f32, LayoutError> {
        let raw = self.required_attr(node, name)?;
        self.parse_number(node, name, raw)
    }

    fn optional_number_attr(
        &self,
        node: Node<'_, '_>,
        name: &str,
    ) -> Result<Option<f32>, LayoutError> {
        match node.attribute(name) {
            None => Ok(None),
            Some(raw) => self.parse_number(node, name, raw.trim()).map(Some),
        }
    }

    fn parse_number(&self, node: Node<'_, '_>, name: &str, raw: &str) -> Result<f32, LayoutError> {
        match raw.parse::<f32>() {
            Ok(value) if value.is_finite() => Ok(value),
            _ => Err(self.error_at(
                LayoutErrorCode::InvalidValue,
                format!("attribute '{name}' value '{raw}' is not a finite number"),
                node,
            )),
        }
    }

    fn reject_unknown_attributes(
        &self,
        node: Node<'_, '_>,
        allowed: &[&str],
    ) -> Result<(), LayoutError> {
        for attribute in node.attributes() {
            if !allowed.contains(&attribute.name()) {
                return Err(self.error_at(
                    LayoutErrorCode::UnknownField,
                    format!(
                        "unknown attribute '{}' on <{}>",
                        attribute.name(),
                        node.tag_name().name()
                    ),
                    node,
                ));
            }
        }
        Ok(())
    }

    fn location_of(&self, node: Node<'_, '_>) -> SourceLocation {
        let pos = self.doc.text_pos_at(node.range().start);
        SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        }
    }

    fn error_at(&self, code: LayoutErrorCode, message: String, node: Node<'_, '_>) -> LayoutError {
        LayoutError {
            code,
            message,
            source_name: self.source_name.to_string(),
            location: Some(self.location_of(node)),
        }
    }

    fn warning_at(&self, message: String, node: Node<'_, '_>) -> LayoutWarning {
        LayoutWarning {
            message,
            location: Some(self.location_of(node)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn compile(raw: &str) -> Result<SceneLayout, LayoutError> {
        compile_scene_layout("test.xml", raw)
    }

    #[test]
    fn valid_layout_compiles_all_elements() {
        let layout = compile(
            r#"<SceneLayout scene="bone_field">
                <AgentSpawn x="1" y="0" z="-2"/>
                <Portal x="-30" z="5" radius="7" target="ascent"/>
                <Collectible id="1" x="15" z="15"/>
                <Collectible id="2" x="-15" y="0.5" z="15" progress="0.25"/>
                <Platform x="0" y="-10" z="0" width="10" height="0.5" depth="4"/>
            </SceneLayout>"#,
        )
        .expect("compile");

        assert_eq!(layout.scene, SceneKey::BoneField);
        assert_eq!(layout.agent_spawn.position, Vec3::new(1.0, 0.0, -2.0));
        let portal = layout.portal.expect("portal");
        assert_eq!(portal.target, SceneKey::Ascent);
        assert_eq!(portal.position, Vec3::new(-30.0, 0.0, 5.0));
        assert_eq!(layout.collectibles.len(), 2);
        assert_eq!(layout.collectibles[1].progress, 0.25);
        assert_eq!(layout.platforms[0].speed, 0.0);
        assert!(layout.warnings.is_empty());
    }

    #[test]
    fn duplicate_collectible_ids_keep_first_and_warn() {
        let layout = compile(
            r#"<SceneLayout scene="bone_field">
                <Collectible id="3" x="1" z="1"/>
                <Collectible id="3" x="9" z="9"/>
            </SceneLayout>"#,
        )
        .expect("compile");

        assert_eq!(layout.collectibles.len(), 1);
        assert_eq!(layout.collectibles[0].position, Vec3::new(1.0, 0.0, 1.0));
        assert_eq!(layout.warnings.len(), 1);
        assert_eq!(layout.warnings[0].location.map(|loc| loc.line), Some(3));
    }

    #[test]
    fn out_of_range_progress_is_clamped_with_warning() {
        let layout = compile(
            r#"<SceneLayout scene="bone_field">
                <Collectible id="1" x="0" z="0" progress="1.7"/>
                <Collectible id="2" x="0" z="0" progress="-0.3"/>
            </SceneLayout>"#,
        )
        .expect("compile");

        assert_eq!(layout.collectibles[0].progress, 1.0);
        assert_eq!(layout.collectibles[1].progress, 0.0);
        assert_eq!(layout.warnings.len(), 2);
    }

    #[test]
    fn missing_spawn_defaults_to_origin() {
        let layout = compile(r#"<SceneLayout scene="ascent"/>"#).expect("compile");
        assert_eq!(layout.agent_spawn.position, Vec3::ZERO);
        assert!(layout.portal.is_none());
    }

    #[test]
    fn wrong_root_is_rejected() {
        let err = compile(r#"<Defs/>"#).expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::InvalidRoot);
        assert!(err.location.is_some());
    }

    #[test]
    fn unknown_element_and_attribute_are_rejected() {
        let err = compile(r#"<SceneLayout scene="ascent"><Lamp/></SceneLayout>"#).expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::UnknownElement);

        let err = compile(
            r#"<SceneLayout scene="ascent"><AgentSpawn x="0" z="0" w="1"/></SceneLayout>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::UnknownField);
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let err = compile(
            r#"<SceneLayout scene="bone_field"><Collectible id="1" x="abc" z="0"/></SceneLayout>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::InvalidValue);

        let err = compile(
            r#"<SceneLayout scene="bone_field"><Collectible id="-4" x="0" z="0"/></SceneLayout>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::InvalidValue);

        let err = compile(
            r#"<SceneLayout scene="bone_field"><Portal x="0" z="0" radius="0" target="ascent"/></SceneLayout>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::InvalidValue);
    }

    #[test]
    fn missing_attribute_reports_location() {
        let err = compile(
            "<SceneLayout scene=\"bone_field\">\n  <Collectible x=\"0\" z=\"0\"/>\n</SceneLayout>",
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::MissingField);
        assert_eq!(err.location, Some(SourceLocation { line: 2, column: 3 }));
        assert!(err.to_string().contains("source=test.xml"));
    }

    #[test]
    fn malformed_xml_reports_location() {
        let err = compile(r#"<SceneLayout scene="ascent"><Platform></SceneLayout>"#)
            .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::XmlMalformed);
        assert!(err.location.is_some());
    }

    #[test]
    fn duplicate_portal_is_rejected() {
        let err = compile(
            r#"<SceneLayout scene="bone_field">
                <Portal x="0" z="0" radius="1" target="ascent"/>
                <Portal x="1" z="0" radius="1" target="ascent"/>
            </SceneLayout>"#,
        )
        .expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::DuplicateElement);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = load_scene_layout(&PathBuf::from("definitely/not/here.xml")).expect_err("err");
        assert_eq!(err.code, LayoutErrorCode::ReadFile);
    }

    #[test]
    fn shipped_layouts_compile_cleanly() {
        let layouts_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("assets")
            .join("layouts");
        let bone_field = load_scene_layout(&layouts_dir.join("bone_field.xml")).expect("bone field");
        assert_eq!(bone_field.collectibles.len(), 20);
        assert!(bone_field.warnings.is_empty());
        let ascent = load_scene_layout(&layouts_dir.join("ascent.xml")).expect("ascent");
        assert_eq!(ascent.platforms.len(), 5);
    }
}
