//! Runtime configuration.
//!
//! Values come from an optional TOML file, then the process environment (after loading `.env`). Boolean switches are
//! enabled only when the variable is exactly `"1"`.

use std::{env, fs, net::SocketAddr, path::PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::pipelines::PipelineOptions;

/// Configuration of the demo server and the pipeline it loads.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DemoConfig {
	/// Upper bound for the width & height sliders.
	pub max_image_size: u32,
	/// Pre-generate the example prompts at startup.
	pub cache_examples: bool,
	/// Ask the pipeline to compile its denoising model.
	pub compile: bool,
	/// Ask the pipeline to offload weights to the CPU between uses.
	pub cpu_offload: bool,
	/// Root directory for generated images.
	pub output_dir: PathBuf,
	/// Maximum number of requests waiting for the generation worker.
	pub queue_max_size: usize,
	/// Address the HTTP server binds to.
	pub bind: SocketAddr
}

impl Default for DemoConfig {
	fn default() -> Self {
		Self {
			max_image_size: 1024,
			cache_examples: true,
			compile: false,
			cpu_offload: false,
			output_dir: PathBuf::from("outputs"),
			queue_max_size: 20,
			bind: SocketAddr::from(([127, 0, 0, 1], 7860))
		}
	}
}

impl DemoConfig {
	/// Loads the configuration from a TOML file. Keys missing from the file keep their defaults.
	pub fn from_file(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
		let path: PathBuf = path.into();
		let file = fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))?;
		let config: DemoConfig = toml::from_str(&file)?;
		Ok(config)
	}

	/// Loads the configuration from the environment on top of the defaults.
	pub fn from_env() -> anyhow::Result<Self> {
		Self::default().with_env()
	}

	/// Overrides fields with any of `MAX_IMAGE_SIZE`, `CACHE_EXAMPLES`, `USE_TORCH_COMPILE`, `ENABLE_CPU_OFFLOAD`,
	/// `OUTPUT_DIR`, `QUEUE_MAX_SIZE` & `BIND_ADDRESS` that are set.
	pub fn with_env(self) -> anyhow::Result<Self> {
		// a missing .env file is fine
		dotenv::dotenv().ok();
		self.with_vars(|key| env::var(key).ok())
	}

	fn with_vars<F>(mut self, var: F) -> anyhow::Result<Self>
	where
		F: Fn(&str) -> Option<String>
	{
		let switch = |key: &str| var(key).map(|v| v == "1");

		if let Some(v) = var("MAX_IMAGE_SIZE") {
			self.max_image_size = v.parse().with_context(|| format!("invalid MAX_IMAGE_SIZE {v:?}"))?;
		}
		if let Some(v) = switch("CACHE_EXAMPLES") {
			self.cache_examples = v;
		}
		if let Some(v) = switch("USE_TORCH_COMPILE") {
			self.compile = v;
		}
		if let Some(v) = switch("ENABLE_CPU_OFFLOAD") {
			self.cpu_offload = v;
		}
		if let Some(v) = var("OUTPUT_DIR") {
			self.output_dir = PathBuf::from(v);
		}
		if let Some(v) = var("QUEUE_MAX_SIZE") {
			self.queue_max_size = v.parse().with_context(|| format!("invalid QUEUE_MAX_SIZE {v:?}"))?;
		}
		if let Some(v) = var("BIND_ADDRESS") {
			self.bind = v.parse().with_context(|| format!("invalid BIND_ADDRESS {v:?}"))?;
		}
		Ok(self)
	}

	/// The load-time options to hand to the pipeline.
	pub fn pipeline_options(&self) -> PipelineOptions {
		PipelineOptions {
			compile: self.compile,
			cpu_offload: self.cpu_offload
		}
	}
}
