//! Descriptor set layouts, pools and writers.
//!
//! Layouts carry a validated [`DescriptorSetSchema`] so that pools and writers can check
//! allocations and writes against the declared bindings before touching the device.

use crate::error::{GpuError, Result};
use ash::vk;
use std::collections::HashMap;
use std::sync::Arc;

/// Default upper bound on sets per pool.
pub const DEFAULT_MAX_SETS: u32 = 1000;

/// One binding of a descriptor set layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingSpec {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub stage_flags: vk::ShaderStageFlags,
    /// Declared count; the capacity for variable-count bindings.
    pub count: u32,
    pub flags: vk::DescriptorBindingFlags,
}

impl BindingSpec {
    /// Whether the binding's length is chosen per allocation.
    pub fn is_variable(&self) -> bool {
        self.flags
            .contains(vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT)
    }
}

/// Validated bindings of a layout, sorted by binding number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescriptorSetSchema {
    bindings: Vec<BindingSpec>,
}

impl DescriptorSetSchema {
    /// All bindings in ascending order.
    pub fn bindings(&self) -> &[BindingSpec] {
        &self.bindings
    }

    /// Look up a binding.
    pub fn get(&self, binding: u32) -> Option<&BindingSpec> {
        self.bindings.iter().find(|spec| spec.binding == binding)
    }

    /// The variable-count binding, if any. Always the highest binding.
    pub fn variable_binding(&self) -> Option<&BindingSpec> {
        self.bindings.last().filter(|spec| spec.is_variable())
    }

    /// Descriptors one allocation consumes, per type.
    pub fn demand(&self, variable_count: u32) -> Vec<(vk::DescriptorType, u32)> {
        let mut demand: Vec<(vk::DescriptorType, u32)> = Vec::new();
        for spec in &self.bindings {
            let count = if spec.is_variable() {
                variable_count
            } else {
                spec.count
            };
            match demand.iter_mut().find(|(ty, _)| *ty == spec.descriptor_type) {
                Some((_, total)) => *total += count,
                None => demand.push((spec.descriptor_type, count)),
            }
        }
        demand
    }

    /// Check a requested variable count against the layout.
    pub fn check_variable_count(&self, variable_count: u32) -> Result<()> {
        match self.variable_binding() {
            Some(spec) if variable_count > spec.count => Err(GpuError::DescriptorWrite(format!(
                "Variable count {variable_count} exceeds capacity {} of binding {}",
                spec.count, spec.binding
            ))),
            None if variable_count > 0 => Err(GpuError::DescriptorWrite(format!(
                "Variable count {variable_count} requested for a layout without a variable binding"
            ))),
            _ => Ok(()),
        }
    }
}

/// Descriptor set layout builder.
#[derive(Debug, Clone, Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<BindingSpec>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a binding.
    pub fn binding(
        self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        self.binding_with_flags(
            binding,
            descriptor_type,
            stage_flags,
            count,
            vk::DescriptorBindingFlags::empty(),
        )
    }

    /// Add a binding with descriptor indexing flags.
    pub fn binding_with_flags(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
        flags: vk::DescriptorBindingFlags,
    ) -> Self {
        self.bindings.push(BindingSpec {
            binding,
            descriptor_type,
            stage_flags,
            count,
            flags,
        });
        self
    }

    /// Add a uniform buffer binding.
    pub fn uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags, 1)
    }

    /// Add a single combined image sampler binding.
    pub fn combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
            1,
        )
    }

    /// Add a partially bound, variable-length combined image sampler array.
    pub fn bindless_image_array(
        self,
        binding: u32,
        stage_flags: vk::ShaderStageFlags,
        capacity: u32,
    ) -> Self {
        self.binding_with_flags(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
            capacity,
            vk::DescriptorBindingFlags::PARTIALLY_BOUND
                | vk::DescriptorBindingFlags::VARIABLE_DESCRIPTOR_COUNT,
        )
    }

    /// Check the bindings and produce the schema.
    pub fn validate(&self) -> Result<DescriptorSetSchema> {
        let mut bindings = self.bindings.clone();
        bindings.sort_by_key(|spec| spec.binding);

        for pair in bindings.windows(2) {
            if pair[0].binding == pair[1].binding {
                return Err(GpuError::DescriptorLayout(format!(
                    "Binding {} declared twice",
                    pair[0].binding
                )));
            }
        }

        if let Some(spec) = bindings.iter().find(|spec| spec.count == 0) {
            return Err(GpuError::DescriptorLayout(format!(
                "Binding {} has zero descriptors",
                spec.binding
            )));
        }

        let variable: Vec<u32> = bindings
            .iter()
            .filter(|spec| spec.is_variable())
            .map(|spec| spec.binding)
            .collect();
        if variable.len() > 1 {
            return Err(GpuError::DescriptorLayout(format!(
                "Only one binding may have a variable count, found {variable:?}"
            )));
        }
        if let (Some(&variable), Some(highest)) = (variable.first(), bindings.last()) {
            if variable != highest.binding {
                return Err(GpuError::DescriptorLayout(format!(
                    "Variable-count binding {variable} must be the highest binding ({})",
                    highest.binding
                )));
            }
        }

        Ok(DescriptorSetSchema { bindings })
    }

    /// Validate and create the layout.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: Arc<ash::Device>) -> Result<DescriptorSetLayout> {
        let schema = self.validate()?;

        let bindings: Vec<vk::DescriptorSetLayoutBinding> = schema
            .bindings
            .iter()
            .map(|spec| {
                vk::DescriptorSetLayoutBinding::default()
                    .binding(spec.binding)
                    .descriptor_type(spec.descriptor_type)
                    .descriptor_count(spec.count)
                    .stage_flags(spec.stage_flags)
            })
            .collect();
        let binding_flags: Vec<vk::DescriptorBindingFlags> =
            schema.bindings.iter().map(|spec| spec.flags).collect();

        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&binding_flags);
        let layout_info = vk::DescriptorSetLayoutCreateInfo::default()
            .bindings(&bindings)
            .push_next(&mut flags_info);

        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None)? };

        Ok(DescriptorSetLayout {
            device,
            layout,
            schema,
        })
    }
}

/// Descriptor set layout, destroyed on drop.
pub struct DescriptorSetLayout {
    device: Arc<ash::Device>,
    layout: vk::DescriptorSetLayout,
    schema: DescriptorSetSchema,
}

impl DescriptorSetLayout {
    /// Raw layout handle.
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Bindings the layout was built from.
    pub fn schema(&self) -> &DescriptorSetSchema {
        &self.schema
    }

    /// The variable-count binding, if any.
    pub fn variable_binding(&self) -> Option<&BindingSpec> {
        self.schema.variable_binding()
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Host-side accounting of what a pool has handed out.
///
/// Exhaustion is reported here before the driver is asked, so callers see the same
/// answer on every implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolBudget {
    max_sets: u32,
    sets_in_use: u32,
    /// (type, capacity, in use)
    descriptors: Vec<(vk::DescriptorType, u32, u32)>,
}

impl PoolBudget {
    /// Budget for a pool with the given limits.
    pub fn new(max_sets: u32, pool_sizes: &[vk::DescriptorPoolSize]) -> Self {
        let mut descriptors: Vec<(vk::DescriptorType, u32, u32)> = Vec::new();
        for size in pool_sizes {
            match descriptors.iter_mut().find(|(ty, _, _)| *ty == size.ty) {
                Some((_, capacity, _)) => *capacity += size.descriptor_count,
                None => descriptors.push((size.ty, size.descriptor_count, 0)),
            }
        }
        Self {
            max_sets,
            sets_in_use: 0,
            descriptors,
        }
    }

    /// Whether one more set with this demand fits.
    pub fn can_fit(&self, demand: &[(vk::DescriptorType, u32)]) -> bool {
        if self.sets_in_use >= self.max_sets {
            return false;
        }
        demand.iter().all(|&(ty, count)| {
            count == 0
                || self
                    .descriptors
                    .iter()
                    .find(|(pool_ty, _, _)| *pool_ty == ty)
                    .is_some_and(|&(_, capacity, used)| used + count <= capacity)
        })
    }

    /// Record an allocation. Returns `false` and records nothing if it does not fit.
    pub fn reserve(&mut self, demand: &[(vk::DescriptorType, u32)]) -> bool {
        if !self.can_fit(demand) {
            return false;
        }
        self.sets_in_use += 1;
        for &(ty, count) in demand {
            if let Some(entry) = self.descriptors.iter_mut().find(|(t, _, _)| *t == ty) {
                entry.2 += count;
            }
        }
        true
    }

    /// Return a freed allocation's descriptors.
    pub fn release(&mut self, demand: &[(vk::DescriptorType, u32)]) {
        self.sets_in_use = self.sets_in_use.saturating_sub(1);
        for &(ty, count) in demand {
            if let Some(entry) = self.descriptors.iter_mut().find(|(t, _, _)| *t == ty) {
                entry.2 = entry.2.saturating_sub(count);
            }
        }
    }

    /// Forget every allocation.
    pub fn clear(&mut self) {
        self.sets_in_use = 0;
        for entry in &mut self.descriptors {
            entry.2 = 0;
        }
    }

    /// Number of live sets.
    pub fn sets_in_use(&self) -> u32 {
        self.sets_in_use
    }

    /// Descriptors of a type still available.
    pub fn remaining(&self, ty: vk::DescriptorType) -> u32 {
        self.descriptors
            .iter()
            .find(|(t, _, _)| *t == ty)
            .map_or(0, |&(_, capacity, used)| capacity - used)
    }
}

/// Builder for [`DescriptorPool`].
#[derive(Debug, Clone)]
pub struct DescriptorPoolBuilder {
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    flags: vk::DescriptorPoolCreateFlags,
}

impl Default for DescriptorPoolBuilder {
    fn default() -> Self {
        Self {
            max_sets: DEFAULT_MAX_SETS,
            pool_sizes: Vec::new(),
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }
}

impl DescriptorPoolBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maximum number of sets.
    pub fn max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Add capacity for a descriptor type.
    pub fn pool_size(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty,
            descriptor_count: count,
        });
        self
    }

    /// Pool creation flags.
    pub fn flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Create the pool.
    ///
    /// # Safety
    /// The device must be valid.
    pub unsafe fn build(self, device: Arc<ash::Device>) -> Result<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes)
            .flags(self.flags);

        let pool = unsafe { device.create_descriptor_pool(&create_info, None)? };

        Ok(DescriptorPool {
            device,
            pool,
            flags: self.flags,
            budget: PoolBudget::new(self.max_sets, &self.pool_sizes),
            live: HashMap::new(),
        })
    }
}

/// Descriptor pool, destroyed on drop together with its sets.
pub struct DescriptorPool {
    device: Arc<ash::Device>,
    pool: vk::DescriptorPool,
    flags: vk::DescriptorPoolCreateFlags,
    budget: PoolBudget,
    live: HashMap<vk::DescriptorSet, Vec<(vk::DescriptorType, u32)>>,
}

impl DescriptorPool {
    /// Raw pool handle.
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Current accounting.
    pub fn budget(&self) -> &PoolBudget {
        &self.budget
    }

    /// Allocate one set for `layout`.
    ///
    /// Returns `Ok(None)` when the pool is exhausted; any other failure is an error.
    ///
    /// # Safety
    /// The layout must belong to the pool's device.
    pub unsafe fn allocate(
        &mut self,
        layout: &DescriptorSetLayout,
        variable_count: u32,
    ) -> Result<Option<vk::DescriptorSet>> {
        unsafe { self.allocate_for(layout.handle(), layout.schema(), variable_count) }
    }

    unsafe fn allocate_for(
        &mut self,
        layout: vk::DescriptorSetLayout,
        schema: &DescriptorSetSchema,
        variable_count: u32,
    ) -> Result<Option<vk::DescriptorSet>> {
        schema.check_variable_count(variable_count)?;

        let demand = schema.demand(variable_count);
        if !self.budget.can_fit(&demand) {
            tracing::debug!(
                "Descriptor pool exhausted ({} sets in use)",
                self.budget.sets_in_use()
            );
            return Ok(None);
        }

        let layouts = [layout];
        let counts = [variable_count];
        let mut variable_info =
            vk::DescriptorSetVariableDescriptorCountAllocateInfo::default()
                .descriptor_counts(&counts);
        let mut alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);
        if schema.variable_binding().is_some() {
            alloc_info = alloc_info.push_next(&mut variable_info);
        }

        match unsafe { self.device.allocate_descriptor_sets(&alloc_info) } {
            Ok(sets) => {
                let Some(&set) = sets.first() else {
                    return Err(GpuError::Other("Driver returned no descriptor set".into()));
                };
                self.budget.reserve(&demand);
                self.live.insert(set, demand);
                Ok(Some(set))
            }
            Err(vk::Result::ERROR_OUT_OF_POOL_MEMORY | vk::Result::ERROR_FRAGMENTED_POOL) => {
                tracing::debug!("Driver reported descriptor pool exhaustion");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Return sets to the pool.
    ///
    /// # Safety
    /// The sets must come from this pool and not be referenced by pending work.
    pub unsafe fn free(&mut self, sets: &[vk::DescriptorSet]) -> Result<()> {
        if !self
            .flags
            .contains(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
        {
            return Err(GpuError::InvalidState(
                "Pool was created without FREE_DESCRIPTOR_SET".to_string(),
            ));
        }
        if sets.is_empty() {
            return Ok(());
        }
        unsafe { self.device.free_descriptor_sets(self.pool, sets)? };
        for set in sets {
            if let Some(demand) = self.live.remove(set) {
                self.budget.release(&demand);
            }
        }
        Ok(())
    }

    /// Return every set to the pool.
    ///
    /// # Safety
    /// No set from this pool may be referenced by pending work.
    pub unsafe fn reset(&mut self) -> Result<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(self.pool, vk::DescriptorPoolResetFlags::empty())?;
        }
        self.live.clear();
        self.budget.clear();
        Ok(())
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

#[derive(Debug, Clone)]
enum WritePayload {
    Buffer(vk::DescriptorBufferInfo),
    Images(Vec<vk::DescriptorImageInfo>),
}

#[derive(Debug, Clone)]
struct PendingWrite {
    binding: u32,
    descriptor_type: vk::DescriptorType,
    payload: WritePayload,
}

fn is_buffer_type(ty: vk::DescriptorType) -> bool {
    matches!(
        ty,
        vk::DescriptorType::UNIFORM_BUFFER
            | vk::DescriptorType::STORAGE_BUFFER
            | vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
            | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC
    )
}

fn is_image_type(ty: vk::DescriptorType) -> bool {
    matches!(
        ty,
        vk::DescriptorType::COMBINED_IMAGE_SAMPLER
            | vk::DescriptorType::SAMPLED_IMAGE
            | vk::DescriptorType::STORAGE_IMAGE
            | vk::DescriptorType::INPUT_ATTACHMENT
    )
}

/// Collects descriptor writes for one set and applies them in a single update.
pub struct DescriptorWriter<'a> {
    layout: vk::DescriptorSetLayout,
    schema: &'a DescriptorSetSchema,
    writes: Vec<PendingWrite>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start writing a set of `layout`.
    pub fn new(layout: &'a DescriptorSetLayout) -> Self {
        Self {
            layout: layout.handle(),
            schema: layout.schema(),
            writes: Vec::new(),
        }
    }

    /// Writer checked against a schema with no layout handle; for validation only.
    pub fn for_schema(schema: &'a DescriptorSetSchema) -> Self {
        Self {
            layout: vk::DescriptorSetLayout::null(),
            schema,
            writes: Vec::new(),
        }
    }

    fn target(&self, binding: u32) -> Result<BindingSpec> {
        let spec = *self.schema.get(binding).ok_or_else(|| {
            GpuError::DescriptorWrite(format!("Layout has no binding {binding}"))
        })?;
        if self.writes.iter().any(|w| w.binding == binding) {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} written twice"
            )));
        }
        Ok(spec)
    }

    /// Write a buffer to a single-descriptor binding.
    pub fn write_buffer(mut self, binding: u32, info: vk::DescriptorBufferInfo) -> Result<Self> {
        let spec = self.target(binding)?;
        if !is_buffer_type(spec.descriptor_type) {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} is {:?}, not a buffer",
                spec.descriptor_type
            )));
        }
        if spec.count != 1 {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} holds {} descriptors, expected a single one",
                spec.count
            )));
        }
        self.writes.push(PendingWrite {
            binding,
            descriptor_type: spec.descriptor_type,
            payload: WritePayload::Buffer(info),
        });
        Ok(self)
    }

    /// Write an image to a single-descriptor binding.
    pub fn write_image(mut self, binding: u32, info: vk::DescriptorImageInfo) -> Result<Self> {
        let spec = self.target(binding)?;
        if !is_image_type(spec.descriptor_type) {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} is {:?}, not an image",
                spec.descriptor_type
            )));
        }
        if spec.count != 1 {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} holds {} descriptors, use write_images",
                spec.count
            )));
        }
        self.writes.push(PendingWrite {
            binding,
            descriptor_type: spec.descriptor_type,
            payload: WritePayload::Images(vec![info]),
        });
        Ok(self)
    }

    /// Write consecutive array elements starting at element 0.
    pub fn write_images(mut self, binding: u32, infos: &[vk::DescriptorImageInfo]) -> Result<Self> {
        let spec = self.target(binding)?;
        if !is_image_type(spec.descriptor_type) {
            return Err(GpuError::DescriptorWrite(format!(
                "Binding {binding} is {:?}, not an image",
                spec.descriptor_type
            )));
        }
        if infos.is_empty() {
            return Err(GpuError::DescriptorWrite(format!(
                "Empty image write to binding {binding}"
            )));
        }
        if infos.len() > spec.count as usize {
            return Err(GpuError::DescriptorWrite(format!(
                "{} images exceed capacity {} of binding {binding}",
                infos.len(),
                spec.count
            )));
        }
        self.writes.push(PendingWrite {
            binding,
            descriptor_type: spec.descriptor_type,
            payload: WritePayload::Images(infos.to_vec()),
        });
        Ok(self)
    }

    /// Check that `variable_count` fits the layout and matches what was written.
    pub fn validate_variable_count(&self, variable_count: u32) -> Result<()> {
        self.schema.check_variable_count(variable_count)?;
        let Some(spec) = self.schema.variable_binding() else {
            return Ok(());
        };
        let written = self
            .writes
            .iter()
            .find(|w| w.binding == spec.binding)
            .map_or(0, |w| match &w.payload {
                WritePayload::Images(infos) => infos.len(),
                WritePayload::Buffer(_) => 1,
            });
        if written != variable_count as usize {
            return Err(GpuError::DescriptorWrite(format!(
                "Variable count {variable_count} differs from {written} images written to binding {}",
                spec.binding
            )));
        }
        Ok(())
    }

    /// Allocate a set from `pool` and apply the writes.
    ///
    /// Returns `Ok(None)` when the pool is exhausted.
    ///
    /// # Safety
    /// Every written buffer, view and sampler must be valid.
    pub unsafe fn build(
        self,
        pool: &mut DescriptorPool,
        variable_count: u32,
    ) -> Result<Option<vk::DescriptorSet>> {
        self.validate_variable_count(variable_count)?;
        let Some(set) = (unsafe { pool.allocate_for(self.layout, self.schema, variable_count)? })
        else {
            return Ok(None);
        };
        unsafe { self.overwrite(&pool.device, set) };
        Ok(Some(set))
    }

    /// Apply the writes to an existing set in one update call.
    ///
    /// # Safety
    /// The set must not be in use by pending work.
    pub unsafe fn overwrite(&self, device: &ash::Device, set: vk::DescriptorSet) {
        let writes: Vec<vk::WriteDescriptorSet> = self
            .writes
            .iter()
            .map(|write| {
                let base = vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(write.binding)
                    .dst_array_element(0)
                    .descriptor_type(write.descriptor_type);
                match &write.payload {
                    WritePayload::Buffer(info) => base.buffer_info(std::slice::from_ref(info)),
                    WritePayload::Images(infos) => base.image_info(infos),
                }
            })
            .collect();

        unsafe { device.update_descriptor_sets(&writes, &[]) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_builder() -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .bindless_image_array(1, vk::ShaderStageFlags::FRAGMENT, 64)
    }

    fn image_info() -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default().image_layout(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
    }

    #[test]
    fn global_layout_is_valid() {
        let schema = global_builder().validate().unwrap();
        assert_eq!(schema.bindings().len(), 2);
        let variable = schema.variable_binding().unwrap();
        assert_eq!(variable.binding, 1);
        assert_eq!(variable.count, 64);
    }

    #[test]
    fn variable_binding_must_be_highest() {
        let err = DescriptorSetLayoutBuilder::new()
            .bindless_image_array(0, vk::ShaderStageFlags::FRAGMENT, 64)
            .uniform_buffer(1, vk::ShaderStageFlags::ALL_GRAPHICS)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GpuError::DescriptorLayout(_)));
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let schema = DescriptorSetLayoutBuilder::new()
            .bindless_image_array(1, vk::ShaderStageFlags::FRAGMENT, 64)
            .uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .validate()
            .unwrap();
        assert_eq!(schema, global_builder().validate().unwrap());
    }

    #[test]
    fn only_one_variable_binding() {
        let err = DescriptorSetLayoutBuilder::new()
            .bindless_image_array(0, vk::ShaderStageFlags::FRAGMENT, 8)
            .bindless_image_array(1, vk::ShaderStageFlags::FRAGMENT, 8)
            .validate()
            .unwrap_err();
        assert!(matches!(err, GpuError::DescriptorLayout(_)));
    }

    #[test]
    fn duplicate_and_empty_bindings_rejected() {
        assert!(DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .combined_image_sampler(0, vk::ShaderStageFlags::FRAGMENT)
            .validate()
            .is_err());
        assert!(DescriptorSetLayoutBuilder::new()
            .binding(
                0,
                vk::DescriptorType::SAMPLED_IMAGE,
                vk::ShaderStageFlags::FRAGMENT,
                0
            )
            .validate()
            .is_err());
    }

    #[test]
    fn demand_uses_variable_count() {
        let schema = global_builder().validate().unwrap();
        let demand = schema.demand(5);
        assert!(demand.contains(&(vk::DescriptorType::UNIFORM_BUFFER, 1)));
        assert!(demand.contains(&(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 5)));
    }

    #[test]
    fn pool_budget_exhausts_and_recovers() {
        let mut budget = PoolBudget::new(
            4,
            &[
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::UNIFORM_BUFFER,
                    descriptor_count: 2,
                },
                vk::DescriptorPoolSize {
                    ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    descriptor_count: 128,
                },
            ],
        );
        let schema = global_builder().validate().unwrap();
        let demand = schema.demand(20);

        assert!(budget.reserve(&demand));
        assert!(budget.reserve(&demand));
        // Uniform buffers run out before the set limit
        assert!(!budget.reserve(&demand));
        assert_eq!(budget.sets_in_use(), 2);
        assert_eq!(
            budget.remaining(vk::DescriptorType::COMBINED_IMAGE_SAMPLER),
            88
        );

        budget.release(&demand);
        assert!(budget.can_fit(&demand));

        budget.clear();
        assert_eq!(budget.sets_in_use(), 0);
        assert_eq!(budget.remaining(vk::DescriptorType::UNIFORM_BUFFER), 2);
    }

    #[test]
    fn pool_budget_respects_max_sets() {
        let mut budget = PoolBudget::new(
            1,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 10,
            }],
        );
        let demand = [(vk::DescriptorType::UNIFORM_BUFFER, 1)];
        assert!(budget.reserve(&demand));
        assert!(!budget.reserve(&demand));
    }

    #[test]
    fn pool_budget_rejects_unknown_type() {
        let budget = PoolBudget::new(
            10,
            &[vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: 10,
            }],
        );
        assert!(!budget.can_fit(&[(vk::DescriptorType::STORAGE_IMAGE, 1)]));
        assert!(budget.can_fit(&[(vk::DescriptorType::STORAGE_IMAGE, 0)]));
    }

    #[test]
    fn writer_checks_descriptor_class() {
        let schema = global_builder().validate().unwrap();
        let buffer = vk::DescriptorBufferInfo::default().range(vk::WHOLE_SIZE);

        assert!(DescriptorWriter::for_schema(&schema)
            .write_buffer(1, buffer)
            .is_err());
        assert!(DescriptorWriter::for_schema(&schema)
            .write_images(0, &[image_info()])
            .is_err());
        assert!(DescriptorWriter::for_schema(&schema)
            .write_buffer(7, buffer)
            .is_err());
    }

    #[test]
    fn writer_requires_write_images_for_arrays() {
        let schema = global_builder().validate().unwrap();
        let err = DescriptorWriter::for_schema(&schema)
            .write_image(1, image_info())
            .err()
            .unwrap();
        assert!(matches!(err, GpuError::DescriptorWrite(_)));
    }

    #[test]
    fn writer_rejects_overfull_array() {
        let schema = DescriptorSetLayoutBuilder::new()
            .bindless_image_array(0, vk::ShaderStageFlags::FRAGMENT, 4)
            .validate()
            .unwrap();
        let infos = vec![image_info(); 5];
        assert!(DescriptorWriter::for_schema(&schema)
            .write_images(0, &infos)
            .is_err());
        assert!(DescriptorWriter::for_schema(&schema)
            .write_images(0, &infos[..4])
            .is_ok());
    }

    #[test]
    fn variable_count_must_match_written_images() {
        let schema = global_builder().validate().unwrap();
        let writer = DescriptorWriter::for_schema(&schema)
            .write_buffer(0, vk::DescriptorBufferInfo::default().range(vk::WHOLE_SIZE))
            .unwrap()
            .write_images(1, &[image_info(); 3])
            .unwrap();

        assert!(writer.validate_variable_count(3).is_ok());
        assert!(writer.validate_variable_count(2).is_err());
        assert!(writer.validate_variable_count(65).is_err());
    }

    #[test]
    fn variable_count_requires_written_images() {
        let schema = global_builder().validate().unwrap();
        let writer = DescriptorWriter::for_schema(&schema)
            .write_buffer(0, vk::DescriptorBufferInfo::default().range(vk::WHOLE_SIZE))
            .unwrap();

        assert!(writer.validate_variable_count(20).is_err());
        assert!(writer.validate_variable_count(1).is_err());
        assert!(writer.validate_variable_count(0).is_ok());
    }

    #[test]
    fn variable_count_needs_variable_binding() {
        let schema = DescriptorSetLayoutBuilder::new()
            .uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .validate()
            .unwrap();
        let writer = DescriptorWriter::for_schema(&schema);
        assert!(writer.validate_variable_count(0).is_ok());
        assert!(writer.validate_variable_count(1).is_err());
    }
}
