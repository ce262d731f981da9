//! Scene objects drawn by render systems.

use glam::{EulerRot, Mat3, Mat4, Quat, Vec3};
use std::collections::BTreeMap;

/// Stable object identifier, unique within a [`Scene`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u32);

/// Translation, Euler rotation (applied Y, then X, then Z) and scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    /// Radians around X (pitch), Y (yaw) and Z (roll).
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Transform at `translation` with no rotation and unit scale.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::default()
        }
    }

    fn orientation(&self) -> Quat {
        Quat::from_euler(EulerRot::YXZ, self.rotation.y, self.rotation.x, self.rotation.z)
    }

    /// Model matrix: translate * Ry * Rx * Rz * scale.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.orientation(), self.translation)
    }

    /// Inverse-transpose of the model's upper 3x3, for transforming normals.
    ///
    /// A zero scale axis yields a zero column instead of infinities.
    pub fn normal_matrix(&self) -> Mat3 {
        let inverse_scale = Vec3::new(
            recip_or_zero(self.scale.x),
            recip_or_zero(self.scale.y),
            recip_or_zero(self.scale.z),
        );
        Mat3::from_quat(self.orientation()) * Mat3::from_diagonal(inverse_scale)
    }
}

fn recip_or_zero(value: f32) -> f32 {
    if value.abs() <= f32::EPSILON {
        0.0
    } else {
        value.recip()
    }
}

/// Omnidirectional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Billboard radius used when drawing the light itself.
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 0.1,
        }
    }
}

/// Material description a model loader reports.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelMaterials {
    /// Texture paths in material order. Empty strings mean "no texture".
    pub texture_paths: Vec<String>,
    /// Material index per submesh, `None` when the submesh has none.
    pub submesh_materials: Vec<Option<usize>>,
}

impl ModelMaterials {
    /// A model whose single submesh uses one texture.
    pub fn single(path: impl Into<String>) -> Self {
        Self {
            texture_paths: vec![path.into()],
            submesh_materials: vec![Some(0)],
        }
    }

    /// Texture path of a submesh, if it has a non-empty one.
    pub fn submesh_texture(&self, submesh: usize) -> Option<&str> {
        let material = (*self.submesh_materials.get(submesh)?)?;
        self.texture_paths
            .get(material)
            .map(String::as_str)
            .filter(|path| !path.is_empty())
    }
}

/// What an object is.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Model(ModelMaterials),
    PointLight(PointLight),
}

/// One object of the scene.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub id: ObjectId,
    pub name: String,
    pub transform: Transform,
    pub kind: ObjectKind,
}

impl SceneObject {
    /// Model materials, if the object is a model.
    pub fn materials(&self) -> Option<&ModelMaterials> {
        match &self.kind {
            ObjectKind::Model(materials) => Some(materials),
            ObjectKind::PointLight(_) => None,
        }
    }

    /// Light parameters, if the object is a point light.
    pub fn point_light(&self) -> Option<&PointLight> {
        match &self.kind {
            ObjectKind::PointLight(light) => Some(light),
            ObjectKind::Model(_) => None,
        }
    }
}

/// Objects keyed by id, iterated in id order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    objects: BTreeMap<ObjectId, SceneObject>,
    next_id: u32,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object and return its id.
    pub fn spawn(&mut self, name: impl Into<String>, transform: Transform, kind: ObjectKind) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(
            id,
            SceneObject {
                id,
                name: name.into(),
                transform,
                kind,
            },
        );
        id
    }

    /// Add a point light at `position`.
    pub fn spawn_point_light(&mut self, name: impl Into<String>, position: Vec3, light: PointLight) -> ObjectId {
        self.spawn(name, Transform::from_translation(position), ObjectKind::PointLight(light))
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject> {
        self.objects.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneObject> {
        self.objects.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut SceneObject> {
        self.objects.values_mut()
    }

    /// Model objects with their materials.
    pub fn models(&self) -> impl Iterator<Item = (&SceneObject, &ModelMaterials)> {
        self.iter()
            .filter_map(|object| object.materials().map(|materials| (object, materials)))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_vec3_eq(a: Vec3, b: Vec3) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(a.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn matrix_applies_scale_then_rotation_then_translation() {
        let transform = Transform {
            translation: Vec3::new(1.0, 2.0, 3.0),
            rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
            scale: Vec3::new(2.0, 1.0, 1.0),
        };
        // (1,0,0) scaled to (2,0,0), yawed to (0,0,-2), then translated
        let point = transform.matrix().transform_point3(Vec3::X);
        assert_vec3_eq(point, Vec3::new(1.0, 2.0, 1.0));
    }

    #[test]
    fn rotation_order_is_yaw_pitch_roll() {
        let rotation = Vec3::new(0.4, -0.7, 1.2);
        let transform = Transform {
            rotation,
            ..Transform::default()
        };
        let expected = Mat4::from_rotation_y(rotation.y)
            * Mat4::from_rotation_x(rotation.x)
            * Mat4::from_rotation_z(rotation.z);
        for (a, b) in transform
            .matrix()
            .to_cols_array()
            .iter()
            .zip(expected.to_cols_array().iter())
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
    }

    #[test]
    fn normal_matrix_is_inverse_transpose() {
        let transform = Transform {
            translation: Vec3::new(5.0, 0.0, 0.0),
            rotation: Vec3::new(0.3, 0.9, -0.4),
            scale: Vec3::new(2.0, 0.5, 3.0),
        };
        let expected = Mat3::from_mat4(transform.matrix()).inverse().transpose();
        for (a, b) in transform
            .normal_matrix()
            .to_cols_array()
            .iter()
            .zip(expected.to_cols_array().iter())
        {
            assert_relative_eq!(*a, *b, epsilon = 1e-4);
        }
    }

    #[test]
    fn normal_matrix_tolerates_zero_scale() {
        let transform = Transform {
            scale: Vec3::new(1.0, 0.0, 1.0),
            ..Transform::default()
        };
        assert!(transform.normal_matrix().is_finite());
    }

    #[test]
    fn submesh_texture_skips_missing_and_empty() {
        let materials = ModelMaterials {
            texture_paths: vec!["a.png".into(), String::new()],
            submesh_materials: vec![Some(0), Some(1), None, Some(7)],
        };
        assert_eq!(materials.submesh_texture(0), Some("a.png"));
        assert_eq!(materials.submesh_texture(1), None);
        assert_eq!(materials.submesh_texture(2), None);
        assert_eq!(materials.submesh_texture(3), None);
        assert_eq!(materials.submesh_texture(9), None);
    }

    #[test]
    fn spawn_assigns_increasing_ids() {
        let mut scene = Scene::new();
        let cube = scene.spawn(
            "cube",
            Transform::default(),
            ObjectKind::Model(ModelMaterials::single("cube.png")),
        );
        let light = scene.spawn_point_light("light", Vec3::Y, PointLight::default());
        assert!(cube < light);
        assert_eq!(scene.models().count(), 1);
        assert!(scene.get(light).and_then(SceneObject::point_light).is_some());
        assert!(scene.remove(cube).is_some());
        assert_eq!(scene.len(), 1);
    }
}
