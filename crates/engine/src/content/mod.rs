mod layout;

pub use layout::{
    compile_scene_layout, load_scene_layout, AgentSpawnDef, CollectibleDef, LayoutError,
    LayoutErrorCode, LayoutWarning, PlatformDef, PortalDef, SceneLayout, SourceLocation,
};
