//! Bindless texture slot assignment.
//!
//! Slot 0 is the fallback texture; slot `i + 1` holds the i-th unique texture path in
//! discovery order. Lookups of unknown or empty paths resolve to the fallback.

use crate::scene::{ModelMaterials, Scene};
use std::collections::HashMap;

/// Slot of the always-resident fallback texture.
pub const FALLBACK_SLOT: u32 = 0;

/// Ordered, deduplicated texture paths.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextureTable {
    paths: Vec<String>,
    slots: HashMap<String, u32>,
}

impl TextureTable {
    /// Table holding only the fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the texture paths of every model in `scene`.
    pub fn from_scene(scene: &Scene) -> Self {
        Self::from_materials(scene.models().map(|(_, materials)| materials))
    }

    /// Collect texture paths from a sequence of models.
    pub fn from_materials<'a>(materials: impl IntoIterator<Item = &'a ModelMaterials>) -> Self {
        let mut table = Self::new();
        for model in materials {
            for path in &model.texture_paths {
                table.insert(path);
            }
        }
        tracing::debug!("Texture table: {} unique textures", table.paths.len());
        table
    }

    /// Add a path, returning its slot. Empty paths map to the fallback.
    pub fn insert(&mut self, path: &str) -> u32 {
        if path.is_empty() {
            return FALLBACK_SLOT;
        }
        if let Some(&slot) = self.slots.get(path) {
            return slot;
        }
        let slot = u32::try_from(self.paths.len() + 1).unwrap_or(u32::MAX);
        self.paths.push(path.to_string());
        self.slots.insert(path.to_string(), slot);
        slot
    }

    /// Slot of a path; unknown and empty paths give [`FALLBACK_SLOT`].
    pub fn slot(&self, path: &str) -> u32 {
        self.slots.get(path).copied().unwrap_or(FALLBACK_SLOT)
    }

    /// Unique paths in slot order, excluding the fallback.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Number of slots including the fallback.
    pub fn len(&self) -> usize {
        self.paths.len() + 1
    }

    /// Always false; the fallback slot exists in every table.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Slot lookup limited to the textures actually bound in the global set.
#[derive(Debug, Clone, Copy)]
pub struct TextureLookup<'a> {
    table: &'a TextureTable,
    bound: u32,
}

impl<'a> TextureLookup<'a> {
    /// `bound` is the number of array elements written, fallback included.
    pub fn new(table: &'a TextureTable, bound: u32) -> Self {
        Self {
            table,
            bound: bound.max(1),
        }
    }

    /// Shader index for a path; slots beyond the bound range fall back.
    pub fn slot(&self, path: &str) -> u32 {
        let slot = self.table.slot(path);
        if slot < self.bound {
            slot
        } else {
            FALLBACK_SLOT
        }
    }

    /// Shader index for a model's submesh.
    pub fn submesh_slot(&self, materials: &ModelMaterials, submesh: usize) -> u32 {
        materials
            .submesh_texture(submesh)
            .map_or(FALLBACK_SLOT, |path| self.slot(path))
    }

    /// Number of bound slots.
    pub fn bound(&self) -> u32 {
        self.bound
    }

    pub fn table(&self) -> &'a TextureTable {
        self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ObjectKind, PointLight, Transform};
    use glam::Vec3;

    fn model(paths: &[&str]) -> ModelMaterials {
        ModelMaterials {
            texture_paths: paths.iter().map(ToString::to_string).collect(),
            submesh_materials: (0..paths.len()).map(Some).collect(),
        }
    }

    #[test]
    fn paths_are_deduplicated_in_discovery_order() {
        let table = TextureTable::from_materials(&[
            model(&["wood.png", "", "stone.png"]),
            model(&["stone.png", "grass.png"]),
        ]);
        assert_eq!(table.paths(), ["wood.png", "stone.png", "grass.png"]);
        assert_eq!(table.len(), 4);
        assert_eq!(table.slot("wood.png"), 1);
        assert_eq!(table.slot("grass.png"), 3);
    }

    #[test]
    fn unknown_and_empty_paths_use_fallback() {
        let table = TextureTable::from_materials(&[model(&["wood.png"])]);
        assert_eq!(table.slot(""), FALLBACK_SLOT);
        assert_eq!(table.slot("missing.png"), FALLBACK_SLOT);
        assert_eq!(TextureTable::new().len(), 1);
    }

    #[test]
    fn scene_scan_ignores_lights() {
        let mut scene = Scene::new();
        scene.spawn("floor", Transform::default(), ObjectKind::Model(model(&["floor.png"])));
        scene.spawn_point_light("lamp", Vec3::Y, PointLight::default());
        scene.spawn("crate", Transform::default(), ObjectKind::Model(model(&["crate.png", "floor.png"])));
        let table = TextureTable::from_scene(&scene);
        assert_eq!(table.paths(), ["floor.png", "crate.png"]);
    }

    #[test]
    fn lookup_clamps_to_bound_textures() {
        let names: Vec<String> = (0..30).map(|i| format!("t{i}.png")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let table = TextureTable::from_materials(&[model(&refs)]);
        assert_eq!(table.len(), 31);

        let lookup = TextureLookup::new(&table, 20);
        assert_eq!(lookup.slot("t0.png"), 1);
        assert_eq!(lookup.slot("t18.png"), 19);
        assert_eq!(lookup.slot("t19.png"), FALLBACK_SLOT);
        assert_eq!(lookup.slot("t29.png"), FALLBACK_SLOT);
    }

    #[test]
    fn submesh_without_material_uses_fallback() {
        let materials = ModelMaterials {
            texture_paths: vec!["a.png".into()],
            submesh_materials: vec![None, Some(0)],
        };
        let table = TextureTable::from_materials([&materials]);
        let lookup = TextureLookup::new(&table, table.len() as u32);
        assert_eq!(lookup.submesh_slot(&materials, 0), FALLBACK_SLOT);
        assert_eq!(lookup.submesh_slot(&materials, 1), 1);
    }
}
