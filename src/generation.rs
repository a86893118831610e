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

use std::{path::PathBuf, sync::Arc, time::Instant};

use anyhow::bail;
use serde::Serialize;

use crate::{
	output::OutputManager,
	pipelines::{Generator, OutputType, PipelineParams, TextToImagePipeline},
	seed::resolve_seed,
	styles::{apply_style, DEFAULT_STYLE_NAME}
};

/// A text-to-image request as submitted by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
	/// The user's prompt, before styling.
	pub prompt: String,
	/// The user's negative prompt, if enabled.
	pub negative_prompt: Option<String>,
	/// Name of the style to apply. Unknown names fall back to the default style.
	pub style: String,
	/// Seed used when `randomize_seed` is not set.
	pub seed: u32,
	/// Draw a random seed instead of using `seed`.
	pub randomize_seed: bool,
	/// Image width in pixels.
	pub width: u32,
	/// Image height in pixels.
	pub height: u32,
	/// Classifier-free guidance scale.
	pub guidance_scale: f32,
	/// Number of denoising steps.
	pub num_inference_steps: usize,
	/// Number of images to generate.
	pub batch_size: usize
}

impl Default for GenerationRequest {
	fn default() -> Self {
		Self {
			prompt: String::new(),
			negative_prompt: None,
			style: DEFAULT_STYLE_NAME.to_string(),
			seed: 0,
			randomize_seed: false,
			width: 1024,
			height: 1024,
			guidance_scale: 4.5,
			num_inference_steps: 20,
			batch_size: 1
		}
	}
}

// builder for requests
impl GenerationRequest {
	/// Creates a request for `prompt` with default parameters.
	pub fn new(prompt: impl Into<String>) -> Self {
		Self { prompt: prompt.into(), ..Default::default() }
	}
	/// Set the negative prompt.
	pub fn with_negative_prompt(mut self, negative_prompt: impl Into<String>) -> Self {
		self.negative_prompt = Some(negative_prompt.into());
		self
	}
	/// Set the style by name.
	pub fn with_style(mut self, style: impl Into<String>) -> Self {
		self.style = style.into();
		self
	}
	/// Use a fixed seed.
	pub fn with_seed(mut self, seed: u32) -> Self {
		self.seed = seed;
		self.randomize_seed = false;
		self
	}
	/// Use a random seed, so that each run generates different images.
	pub fn with_random_seed(mut self) -> Self {
		self.randomize_seed = true;
		self
	}
	/// Set the size of the images.
	pub fn with_size(mut self, width: u32, height: u32) -> Self {
		self.width = width;
		self.height = height;
		self
	}
	/// Set the guidance scale.
	pub fn with_guidance_scale(mut self, guidance_scale: f32) -> Self {
		self.guidance_scale = guidance_scale;
		self
	}
	/// Set the number of denoising steps.
	pub fn with_steps(mut self, steps: usize) -> Self {
		self.num_inference_steps = steps;
		self
	}
	/// Set the number of images to generate.
	pub fn with_batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size;
		self
	}
}

/// The result of a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationOutput {
	/// Every image currently in the session directory.
	pub paths: Vec<PathBuf>,
	/// The seed the run actually used.
	pub seed: u32
}

/// Runs requests against a pipeline and stores the results.
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use std::sync::Arc;
///
/// use image::DynamicImage;
/// use pixart_demo::{Generator, GenerationRequest, Orchestrator, OutputManager, PipelineParams, TextToImagePipeline};
///
/// #[derive(Debug)]
/// struct BlankPipeline;
///
/// impl TextToImagePipeline for BlankPipeline {
/// 	fn generate(&self, params: &PipelineParams, _: &mut Generator) -> anyhow::Result<DynamicImage> {
/// 		Ok(DynamicImage::new_rgb8(params.width, params.height))
/// 	}
/// }
///
/// # let dir = tempfile::tempdir()?;
/// let orchestrator = Orchestrator::new(Arc::new(BlankPipeline), OutputManager::new(dir.path())?);
///
/// let output = orchestrator.generate(&GenerationRequest::new("a cat").with_style("Anime").with_size(256, 256).with_seed(7))?;
/// assert_eq!(output.seed, 7);
/// assert_eq!(output.paths.len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct Orchestrator {
	pipeline: Arc<dyn TextToImagePipeline>,
	outputs: OutputManager
}

impl Orchestrator {
	/// Creates an orchestrator driving `pipeline` and saving into `outputs`.
	pub fn new(pipeline: Arc<dyn TextToImagePipeline>, outputs: OutputManager) -> Self {
		Self { pipeline, outputs }
	}

	/// The output manager results are saved with.
	pub fn outputs(&self) -> &OutputManager {
		&self.outputs
	}

	/// Generates `request.batch_size` images and saves them.
	///
	/// The pipeline is invoked once per image, in sequence, with a single [`Generator`] seeded from the resolved seed
	/// and shared across the whole batch; only the request as a whole is reproducible from its seed.
	pub fn generate(&self, request: &GenerationRequest) -> anyhow::Result<GenerationOutput> {
		self.generate_with_progress(request, |_, _| true)
	}

	/// Like [`Orchestrator::generate`], calling `progress` after each image of the batch.
	///
	/// Function parameters:
	/// - **`done`** (usize): Number of images generated so far.
	/// - **`total`** (usize): The batch size.
	///
	/// Returning `false` cancels the request before anything is saved; the session directory is left untouched.
	pub fn generate_with_progress<F>(&self, request: &GenerationRequest, mut progress: F) -> anyhow::Result<GenerationOutput>
	where
		F: FnMut(usize, usize) -> bool
	{
		let seed = resolve_seed(request.seed, request.randomize_seed);
		let mut generator = Generator::manual_seed(seed as u64);

		let (prompt, negative_prompt) = apply_style(&request.style, &request.prompt, request.negative_prompt.as_deref());
		let params = PipelineParams {
			prompt,
			negative_prompt: Some(negative_prompt),
			width: request.width,
			height: request.height,
			guidance_scale: request.guidance_scale,
			num_inference_steps: request.num_inference_steps,
			output_type: OutputType::Rgb8
		};

		tracing::info!(seed, style = %request.style, batch = request.batch_size, "generating");
		let start = Instant::now();
		let mut images = Vec::with_capacity(request.batch_size);
		for i in 0..request.batch_size {
			images.push(self.pipeline.generate(&params, &mut generator)?);
			tracing::debug!("generated image {}/{}", i + 1, request.batch_size);
			if !progress(i + 1, request.batch_size) {
				bail!("generation cancelled after {}/{} images", i + 1, request.batch_size);
			}
		}
		tracing::info!("generated {} image(s) in {:?}", images.len(), start.elapsed());

		let paths = self.outputs.rotate_and_save(&images)?;
		Ok(GenerationOutput { paths, seed })
	}
}
