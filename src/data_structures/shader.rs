//! Shader programs built from a vertex/fragment WGSL file pair.
//!
//! Binding locations are resolved by name when the program is created, so
//! materials can look up `environment_map` instead of hardcoding group and
//! binding indices.

use std::{collections::HashMap, sync::Arc};

use anyhow::Context as _;
use naga::ShaderStage;
use thiserror::Error;

use crate::diagnostics::{ResourceKind, ResourceLedger, Tracked};

/// Entry point every vertex source must declare.
pub const VERTEX_ENTRY: &str = "vs_main";
/// Entry point every fragment source must declare.
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ShaderLocation {
    pub group: u32,
    pub binding: u32,
}

#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("{stage:?} source: {reason}")]
    Source { stage: ShaderStage, reason: String },
    #[error(
        "binding '{name}' is declared at {vertex:?} in the vertex stage but {fragment:?} in the fragment stage"
    )]
    Mismatch {
        name: String,
        vertex: ShaderLocation,
        fragment: ShaderLocation,
    },
}

impl ShaderError {
    /// The stage whose source file is at fault.
    pub fn stage(&self) -> ShaderStage {
        match self {
            ShaderError::Source { stage, .. } => *stage,
            ShaderError::Mismatch { .. } => ShaderStage::Fragment,
        }
    }
}

/// Resource bindings and entry points of one parsed WGSL source.
#[derive(Debug, Default, PartialEq)]
pub struct ShaderReflection {
    pub bindings: HashMap<String, ShaderLocation>,
    pub entry_points: Vec<(ShaderStage, String)>,
}

impl ShaderReflection {
    pub fn declares_entry_point(&self, stage: ShaderStage, name: &str) -> bool {
        self.entry_points
            .iter()
            .any(|(s, n)| *s == stage && n == name)
    }
}

/// A compiled vertex + fragment program.
#[derive(Debug)]
pub struct Shader {
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
    locations: HashMap<String, ShaderLocation>,
    label: String,
    _tracked: Tracked,
}

/// Parse `source` and check it declares `entry` for `stage`.
fn reflect_stage(source: &str, stage: ShaderStage, entry: &str) -> Result<ShaderReflection, ShaderError> {
    let fail = |reason: String| ShaderError::Source { stage, reason };
    if source.trim().is_empty() {
        return Err(fail("source is empty".to_string()));
    }
    let reflection = reflect(source).map_err(|e| fail(e.emit_to_string(source)))?;
    if !reflection.declares_entry_point(stage, entry) {
        return Err(fail(format!("no {:?} entry point named `{}`", stage, entry)));
    }
    Ok(reflection)
}

impl Shader {
    pub fn from_sources(
        device: &wgpu::Device,
        label: &str,
        vertex_source: &str,
        fragment_source: &str,
        ledger: &Arc<ResourceLedger>,
    ) -> Result<Self, ShaderError> {
        let vertex_reflection = reflect_stage(vertex_source, ShaderStage::Vertex, VERTEX_ENTRY)?;
        let fragment_reflection =
            reflect_stage(fragment_source, ShaderStage::Fragment, FRAGMENT_ENTRY)?;

        let mut locations = vertex_reflection.bindings;
        for (name, location) in fragment_reflection.bindings {
            match locations.get(&name) {
                Some(existing) if *existing != location => {
                    return Err(ShaderError::Mismatch {
                        name,
                        vertex: *existing,
                        fragment: location,
                    });
                }
                _ => {
                    locations.insert(name, location);
                }
            }
        }

        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} (vertex)", label)),
            source: wgpu::ShaderSource::Wgsl(vertex_source.into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{} (fragment)", label)),
            source: wgpu::ShaderSource::Wgsl(fragment_source.into()),
        });
        log::debug!("Shader '{}' bindings: {:?}", label, locations);

        Ok(Self {
            vertex,
            fragment,
            locations,
            label: label.to_string(),
            _tracked: ledger.track(ResourceKind::Shader, label),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn location(&self, name: &str) -> Option<ShaderLocation> {
        self.locations.get(name).copied()
    }

    pub fn require_location(&self, name: &str) -> anyhow::Result<ShaderLocation> {
        self.location(name)
            .with_context(|| format!("shader '{}' has no binding named '{}'", self.label, name))
    }

    pub fn locations(&self) -> &HashMap<String, ShaderLocation> {
        &self.locations
    }
}

/// Parse WGSL and collect its resource bindings and entry points.
pub fn reflect(source: &str) -> Result<ShaderReflection, naga::front::wgsl::ParseError> {
    let module = naga::front::wgsl::parse_str(source)?;

    let bindings = module
        .global_variables
        .iter()
        .filter_map(|(_, var)| {
            let name = var.name.as_ref()?;
            let binding = var.binding.as_ref()?;
            Some((
                name.clone(),
                ShaderLocation {
                    group: binding.group,
                    binding: binding.binding,
                },
            ))
        })
        .collect();
    let entry_points = module
        .entry_points
        .iter()
        .map(|entry| (entry.stage, entry.name.clone()))
        .collect();

    Ok(ShaderReflection {
        bindings,
        entry_points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKYBOX_FS: &str = r#"
@group(1) @binding(0)
var environment_map: texture_cube<f32>;
@group(1) @binding(1) var environment_sampler: sampler;
// @group(3) @binding(3) var commented_out: sampler;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) dir: vec3<f32>,
};

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(environment_map, environment_sampler, in.dir);
}
"#;

    #[test]
    fn finds_named_bindings() {
        let bindings = reflect(SKYBOX_FS).unwrap().bindings;
        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings["environment_map"],
            ShaderLocation {
                group: 1,
                binding: 0
            }
        );
        assert_eq!(
            bindings["environment_sampler"],
            ShaderLocation {
                group: 1,
                binding: 1
            }
        );
    }

    #[test]
    fn ignores_commented_declarations() {
        assert!(!reflect(SKYBOX_FS).unwrap().bindings.contains_key("commented_out"));
    }

    #[test]
    fn ignores_block_commented_bindings() {
        let source = "/*\n@group(1) @binding(0) var environment_map: texture_cube<f32>;\n*/\n\
                      @fragment\nfn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }\n";
        let reflection = reflect(source).unwrap();
        assert!(reflection.bindings.is_empty());
        assert!(reflection.declares_entry_point(ShaderStage::Fragment, FRAGMENT_ENTRY));
    }

    #[test]
    fn reads_address_space_and_reversed_attributes() {
        let source = "@binding(2) @group(0) var<uniform> face: vec4<u32>;\n\
                      @group(0) @binding(0) var<storage, read> data: array<f32>;";
        let bindings = reflect(source).unwrap().bindings;
        assert_eq!(
            bindings["face"],
            ShaderLocation {
                group: 0,
                binding: 2
            }
        );
        assert_eq!(
            bindings["data"],
            ShaderLocation {
                group: 0,
                binding: 0
            }
        );
    }

    #[test]
    fn finds_entry_points() {
        let reflection = reflect(SKYBOX_FS).unwrap();
        assert!(reflection.declares_entry_point(ShaderStage::Fragment, "fs_main"));
        assert!(!reflection.declares_entry_point(ShaderStage::Vertex, "fs_main"));

        let vertex = reflect(
            "@vertex\nfn vs_main(@builtin(vertex_index) i: u32) -> @builtin(position) vec4<f32> {\n    return vec4<f32>(0.0);\n}",
        )
        .unwrap();
        assert!(vertex.declares_entry_point(ShaderStage::Vertex, VERTEX_ENTRY));
        assert!(vertex.bindings.is_empty());
    }

    #[test]
    fn location_attributes_are_not_bindings() {
        let source = "struct Out { @location(0) colour: vec4<f32>, @builtin(position) pos: vec4<f32> }";
        let reflection = reflect(source).unwrap();
        assert!(reflection.bindings.is_empty());
        assert!(reflection.entry_points.is_empty());
    }

    #[test]
    fn broken_source_is_rejected() {
        assert!(reflect("@fragment fn fs_main( -> {").is_err());

        let err = reflect_stage("@fragment fn fs_main( -> {", ShaderStage::Fragment, FRAGMENT_ENTRY)
            .unwrap_err();
        assert_eq!(err.stage(), ShaderStage::Fragment);
    }

    #[test]
    fn missing_entry_point_names_the_stage() {
        let err = reflect_stage("// nothing here\n", ShaderStage::Vertex, VERTEX_ENTRY).unwrap_err();
        assert_eq!(err.stage(), ShaderStage::Vertex);
        assert!(err.to_string().contains(VERTEX_ENTRY));

        let err = reflect_stage("   ", ShaderStage::Fragment, FRAGMENT_ENTRY).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }
}
