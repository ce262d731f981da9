//! Renderer configuration.

use crate::resources::MAX_TEXTURES_IN_SET;

/// Tunables for the frame loop and the global descriptor set.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Present with FIFO instead of MAILBOX/IMMEDIATE.
    pub vsync: bool,
    /// Colour the swapchain and offscreen passes clear to.
    pub clear_color: [f32; 4],
    /// Depth the passes clear to.
    pub clear_depth: f32,
    /// Upper bound on textures bound per global descriptor set.
    pub max_textures_in_set: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            clear_depth: 1.0,
            max_textures_in_set: MAX_TEXTURES_IN_SET,
        }
    }
}

impl RenderConfig {
    /// Default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable vsync.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.vsync = vsync;
        self
    }

    /// Set the clear colour.
    #[must_use]
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_color = color;
        self
    }

    /// Limit the number of textures per descriptor set (at least the fallback).
    #[must_use]
    pub fn with_max_textures_in_set(mut self, count: u32) -> Self {
        self.max_textures_in_set = count.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_limit_keeps_fallback() {
        assert_eq!(RenderConfig::new().with_max_textures_in_set(0).max_textures_in_set, 1);
        assert_eq!(RenderConfig::default().max_textures_in_set, 20);
    }
}
