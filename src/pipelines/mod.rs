// Copyright 2022-2023 pyke.io
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// 	http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Text-to-image pipelines.
//!
//! The demo never runs a diffusion model itself; it hands prompts and parameters to an object implementing
//! [`TextToImagePipeline`] and gets one image back per call.

use std::fmt::Debug;

use image::DynamicImage;
use rand::{rngs::StdRng, RngCore, SeedableRng};

cfg_if::cfg_if! {
	if #[cfg(feature = "preview-pipeline")] {
		mod preview;
		pub use self::preview::LatentPreviewPipeline;
	}
}

/// A seeded pseudo-random generator handed to pipelines.
///
/// One generator is created per request and shared by every image of the batch, so images within a batch are drawn
/// from one continuous random stream rather than being seeded independently.
#[derive(Debug, Clone)]
pub struct Generator {
	seed: u64,
	rng: StdRng
}

impl Generator {
	/// Creates a generator seeded with `seed`.
	pub fn manual_seed(seed: u64) -> Self {
		Self { seed, rng: StdRng::seed_from_u64(seed) }
	}

	/// The seed this generator was created with.
	pub fn initial_seed(&self) -> u64 {
		self.seed
	}

	/// The underlying random number generator.
	pub fn rng(&mut self) -> &mut StdRng {
		&mut self.rng
	}

	/// Draws a fresh 32-bit seed from the stream, for pipelines that take an integer seed per call.
	pub fn next_seed(&mut self) -> u32 {
		self.rng.next_u32()
	}
}

/// The pixel format of images returned by a pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputType {
	/// 8-bit RGB.
	#[default]
	Rgb8,
	/// 32-bit float RGB, as produced by the decoder.
	Rgb32F
}

impl OutputType {
	/// Converts `image` into this output type.
	pub fn convert(self, image: DynamicImage) -> DynamicImage {
		match self {
			OutputType::Rgb8 => DynamicImage::ImageRgb8(image.into_rgb8()),
			OutputType::Rgb32F => DynamicImage::ImageRgb32F(image.into_rgb32f())
		}
	}
}

/// Parameters of a single pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineParams {
	/// The styled prompt.
	pub prompt: String,
	/// The styled negative prompt.
	pub negative_prompt: Option<String>,
	/// Image width in pixels.
	pub width: u32,
	/// Image height in pixels.
	pub height: u32,
	/// Classifier-free guidance scale.
	pub guidance_scale: f32,
	/// Number of denoising steps.
	pub num_inference_steps: usize,
	/// Pixel format of the returned image.
	pub output_type: OutputType
}

/// Load-time switches forwarded to a pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
	/// Compile the denoising model ahead of time.
	pub compile: bool,
	/// Keep model weights on the CPU and only move them to the accelerator while in use.
	pub cpu_offload: bool
}

/// A pretrained text-to-image pipeline.
///
/// Implementations are shared between threads behind an `Arc` and must not require `&mut self`; all per-request
/// state lives in the [`Generator`].
pub trait TextToImagePipeline: Send + Sync + Debug {
	/// Generates exactly one image.
	fn generate(&self, params: &PipelineParams, generator: &mut Generator) -> anyhow::Result<DynamicImage>;
}
