//! Application configuration.

use trellis_render::RenderConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Target frames per second (None for unlimited).
    pub target_fps: Option<u32>,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Frame loop and descriptor settings.
    pub render: RenderConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "Trellis Engine".to_string(),
            width: 1280,
            height: 720,
            target_fps: None,
            validation: cfg!(debug_assertions),
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    #[must_use]
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the target FPS. Zero means unlimited.
    #[must_use]
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = (fps > 0).then_some(fps);
        self
    }

    /// Enable or disable vsync.
    #[must_use]
    pub fn with_vsync(mut self, vsync: bool) -> Self {
        self.render = self.render.with_vsync(vsync);
        self
    }

    /// Enable or disable validation layers.
    #[must_use]
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Replace the renderer settings.
    #[must_use]
    pub fn with_render_config(mut self, render: RenderConfig) -> Self {
        self.render = render;
        self
    }

    /// Minimum duration of one frame when a target FPS is set.
    pub fn target_frame_time(&self) -> Option<std::time::Duration> {
        self.target_fps
            .map(|fps| std::time::Duration::from_nanos(1_000_000_000 / u64::from(fps)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = AppConfig::new("demo")
            .with_size(640, 480)
            .with_target_fps(50)
            .with_vsync(false)
            .with_validation(true);
        assert_eq!(config.title, "demo");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(!config.render.vsync);
        assert!(config.validation);
        assert_eq!(config.target_frame_time(), Some(std::time::Duration::from_millis(20)));
    }

    #[test]
    fn zero_fps_is_unlimited() {
        assert_eq!(AppConfig::default().with_target_fps(0).target_frame_time(), None);
    }
}
