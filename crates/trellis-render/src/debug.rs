//! Debug visualization modes.
//!
//! The mode travels to the fragment shader through the object push constants; the
//! settings travel with each frame in [`crate::FrameInfo`].

/// Debug visualization mode for rendering.
///
/// Press F3 to cycle through modes in the viewer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DebugMode {
    /// Lit and textured (default).
    #[default]
    Normal = 0,
    /// World-space normals as RGB.
    ShowNormals = 1,
    /// Texture coordinates as red/green.
    ShowUvs = 2,
    /// Fractional world position.
    ShowWorldPos = 3,
    /// Distance to the nearest point light.
    ShowLightDistance = 4,
    /// Direction to the nearest point light.
    ShowLightDirection = 5,
    /// Lambert term of the nearest point light.
    ShowDotProduct = 6,
    /// Albedo without lighting.
    TextureOnly = 7,
    /// Lighting on a white surface.
    LightingOnly = 8,
}

impl DebugMode {
    /// Every mode in cycling order.
    pub const ALL: [Self; 9] = [
        Self::Normal,
        Self::ShowNormals,
        Self::ShowUvs,
        Self::ShowWorldPos,
        Self::ShowLightDistance,
        Self::ShowLightDirection,
        Self::ShowDotProduct,
        Self::TextureOnly,
        Self::LightingOnly,
    ];

    /// Cycle to the next debug mode.
    #[must_use]
    pub fn next(self) -> Self {
        let index = Self::ALL.iter().position(|&m| m == self).unwrap_or(0);
        Self::ALL[(index + 1) % Self::ALL.len()]
    }

    /// Get the mode as an i32 for shader push constants.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Short label for overlays and logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::ShowNormals => "normals",
            Self::ShowUvs => "uvs",
            Self::ShowWorldPos => "world position",
            Self::ShowLightDistance => "light distance",
            Self::ShowLightDirection => "light direction",
            Self::ShowDotProduct => "n dot l",
            Self::TextureOnly => "texture only",
            Self::LightingOnly => "lighting only",
        }
    }
}

/// Per-frame debug toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugSettings {
    pub mode: DebugMode,
    pub wireframe: bool,
    pub show_physics: bool,
}

impl DebugSettings {
    /// Advance to the next visualization mode.
    pub fn cycle_mode(&mut self) {
        self.mode = self.mode.next();
        tracing::info!("Debug mode: {}", self.mode.label());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycling_visits_every_mode_once() {
        let mut mode = DebugMode::Normal;
        let mut seen = Vec::new();
        for _ in 0..DebugMode::ALL.len() {
            seen.push(mode.as_i32());
            mode = mode.next();
        }
        assert_eq!(mode, DebugMode::Normal);
        assert_eq!(seen, (0..9).collect::<Vec<_>>());
    }

    #[test]
    fn shader_values_match_declaration() {
        assert_eq!(DebugMode::TextureOnly.as_i32(), 7);
        assert_eq!(DebugMode::LightingOnly.as_i32(), 8);
        assert_eq!(DebugSettings::default().mode, DebugMode::Normal);
    }
}
