use std::{fmt, path::Path, str::FromStr};

use anyhow::Context;
use serde::Deserialize;

use crate::rendering::batching::MAX_BATCH_SIZE;

const DEFAULT_CONFIG_FILE: &str = "demo.toml";
const CONFIG_PATH_VAR: &str = "FS_DEMO_CONFIG";
const TECHNIQUE_VAR: &str = "FS_TECHNIQUE";

/// Per-object matrices take one 256 byte uniform slot each on common devices, and
/// wgpu's default `max_buffer_size` is 256 MiB.
pub const MAX_INSTANCE_COUNT: u32 = 1 << 20;

/// How the per-instance transforms reach the vertex shader.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Technique {
    /// One draw per object, each reading its own dynamic uniform slot.
    PerObject,
    /// One draw per object, matrix picked from the batch by an instance-step vertex attribute.
    InstanceAttribute,
    /// One draw per object, matrix picked from the batch by a scalar uniform index.
    UniformIndex,
    /// One indexed, instanced draw per batch.
    #[default]
    IndexedBatch,
}

impl Technique {
    pub const ALL: [Technique; 4] = [
        Technique::PerObject,
        Technique::InstanceAttribute,
        Technique::UniformIndex,
        Technique::IndexedBatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Technique::PerObject => "per_object",
            Technique::InstanceAttribute => "instance_attribute",
            Technique::UniformIndex => "uniform_index",
            Technique::IndexedBatch => "indexed_batch",
        }
    }

    pub fn uses_batches(self) -> bool {
        !matches!(self, Technique::PerObject)
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Technique {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Technique::ALL
            .into_iter()
            .find(|technique| technique.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "Unknown technique '{}', expected one of: {}",
                    s,
                    Technique::ALL.map(Technique::name).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub technique: Technique,
    pub instance_count: u32,
    pub batch_size: u32,
    pub seed: u64,
    /// Upper bound of the random per-frame spin around each object's X axis.
    pub max_spin_degrees: f32,
    pub field_of_view_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            technique: Technique::default(),
            instance_count: 1024 * 4,
            batch_size: MAX_BATCH_SIZE,
            seed: 0x5eed,
            max_spin_degrees: 3.0,
            field_of_view_degrees: 60.0,
            z_near: 1.0,
            z_far: 2000.0,
        }
    }
}

impl DemoConfig {
    /// Reads `demo.toml` (or `$FS_DEMO_CONFIG`) if present, then applies `$FS_TECHNIQUE`.
    pub fn load() -> anyhow::Result<Self> {
        let explicit_path = std::env::var(CONFIG_PATH_VAR).ok();
        let path = explicit_path.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);

        let mut config = if explicit_path.is_some() || Path::new(path).exists() {
            log::info!("Loading configuration from {}", path);
            Self::from_file(Path::new(path))?
        } else {
            Self::default()
        };

        let technique = std::env::var(TECHNIQUE_VAR).ok();
        config.apply_overrides(technique.as_deref())?;
        config.validate()?;

        Ok(config)
    }

    /// Applies the `$FS_TECHNIQUE` override, if set.
    pub fn apply_overrides(&mut self, technique: Option<&str>) -> anyhow::Result<()> {
        if let Some(technique) = technique {
            self.technique = technique
                .parse()
                .with_context(|| format!("Invalid {}", TECHNIQUE_VAR))?;
        }

        Ok(())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&source)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        let config: DemoConfig = toml::from_str(source)?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.instance_count > MAX_INSTANCE_COUNT {
            anyhow::bail!(
                "instance_count must be at most {}, got {}",
                MAX_INSTANCE_COUNT,
                self.instance_count
            );
        }

        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            anyhow::bail!(
                "batch_size must be between 1 and {}, got {}",
                MAX_BATCH_SIZE,
                self.batch_size
            );
        }

        if !(self.max_spin_degrees >= 0.0 && self.max_spin_degrees.is_finite()) {
            anyhow::bail!("max_spin_degrees must be a non-negative number");
        }

        if !(self.field_of_view_degrees > 0.0 && self.field_of_view_degrees < 180.0) {
            anyhow::bail!(
                "field_of_view_degrees must be in (0, 180), got {}",
                self.field_of_view_degrees
            );
        }

        if !(self.z_near > 0.0 && self.z_far > self.z_near && self.z_far.is_finite()) {
            anyhow::bail!(
                "Clip planes must satisfy 0 < z_near < z_far < inf, got {} and {}",
                self.z_near,
                self.z_far
            );
        }

        Ok(())
    }
}
