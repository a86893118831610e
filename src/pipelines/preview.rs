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

use image::{
	imageops::{self, FilterType},
	DynamicImage, Rgb32FImage
};
use ndarray::{Array1, Array2, Array4, ArrayView4, Axis};
use ndarray_rand::{rand_distr::StandardNormal, RandomExt};

use super::{Generator, PipelineOptions, PipelineParams, TextToImagePipeline};

const LATENT_CHANNELS: usize = 4;
const VAE_SCALE_FACTOR: u32 = 8;

/// A weight-free pipeline that renders latent previews.
///
/// Latents are sampled from the [`Generator`], pulled toward a guided conditioning vector derived from the prompts for
/// `num_inference_steps` steps, and decoded with the cheap latent-to-RGB approximation normally used for progress
/// previews. Output is deterministic for a given seed and prompt, which makes it suitable for running the demo without
/// model weights.
///
/// ```
/// # fn main() -> anyhow::Result<()> {
/// use pixart_demo::{Generator, LatentPreviewPipeline, OutputType, PipelineOptions, PipelineParams, TextToImagePipeline};
///
/// let pipeline = LatentPreviewPipeline::new(PipelineOptions::default())?;
/// let params = PipelineParams {
/// 	prompt: "photo of a red fox".to_string(),
/// 	negative_prompt: None,
/// 	width: 256,
/// 	height: 128,
/// 	guidance_scale: 4.5,
/// 	num_inference_steps: 20,
/// 	output_type: OutputType::Rgb8
/// };
/// let image = pipeline.generate(&params, &mut Generator::manual_seed(0))?;
/// assert_eq!((image.width(), image.height()), (256, 128));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LatentPreviewPipeline {
	options: PipelineOptions,
	latent_rgb: Array2<f32>
}

impl LatentPreviewPipeline {
	/// Creates a new preview pipeline.
	pub fn new(options: PipelineOptions) -> anyhow::Result<Self> {
		let latent_rgb =
			Array2::from_shape_vec((LATENT_CHANNELS, 3), vec![0.298, 0.207, 0.208, 0.187, 0.286, 0.173, -0.158, 0.189, 0.264, -0.184, -0.271, -0.473])?;

		if options.cpu_offload {
			tracing::info!("preview pipeline loaded with CPU offload");
		} else {
			tracing::info!("preview pipeline loaded on CPU");
		}
		if options.compile {
			tracing::info!("preview decoder compiled");
		}

		Ok(Self { options, latent_rgb })
	}

	/// The options this pipeline was loaded with.
	pub fn options(&self) -> PipelineOptions {
		self.options
	}

	fn decode_latents(&self, latents: ArrayView4<'_, f32>) -> anyhow::Result<DynamicImage> {
		let sample = latents.index_axis(Axis(0), 0);
		let (height, width) = (sample.shape()[1], sample.shape()[2]);

		let sample = sample.permuted_axes([1, 2, 0]).as_standard_layout().into_owned();
		let mut rgb = sample.into_shape((height * width, LATENT_CHANNELS))?.dot(&self.latent_rgb);
		rgb.par_mapv_inplace(|f| (f / 2.0 + 0.5).clamp(0.0, 1.0));

		let preview = Rgb32FImage::from_raw(width as _, height as _, rgb.into_raw_vec()).ok_or_else(|| anyhow::anyhow!("failed to construct image"))?;
		let image = imageops::resize(&preview, width as u32 * VAE_SCALE_FACTOR, height as u32 * VAE_SCALE_FACTOR, FilterType::Nearest);
		Ok(DynamicImage::ImageRgb32F(image))
	}
}

/// Folds a prompt into a small conditioning vector in `[-0.5, 0.5]`, one FNV-1a hash per latent channel.
fn embed_prompt(prompt: &str) -> Array1<f32> {
	Array1::from_iter((0..LATENT_CHANNELS as u32).map(|channel| {
		let hash = prompt
			.bytes()
			.fold(0x811c_9dc5_u32 ^ channel, |hash, byte| (hash ^ byte as u32).wrapping_mul(0x0100_0193));
		hash as f32 / u32::MAX as f32 - 0.5
	}))
}

impl TextToImagePipeline for LatentPreviewPipeline {
	fn generate(&self, params: &PipelineParams, generator: &mut Generator) -> anyhow::Result<DynamicImage> {
		if params.width == 0 || params.height == 0 || params.width % VAE_SCALE_FACTOR != 0 || params.height % VAE_SCALE_FACTOR != 0 {
			anyhow::bail!("`width` ({}) and `height` ({}) must be non-zero multiples of {VAE_SCALE_FACTOR}", params.width, params.height);
		}

		let latents_shape = (1, LATENT_CHANNELS, (params.height / VAE_SCALE_FACTOR) as usize, (params.width / VAE_SCALE_FACTOR) as usize);
		let mut latents = Array4::<f32>::random_using(latents_shape, StandardNormal, generator.rng());

		let cond = embed_prompt(&params.prompt);
		let uncond = embed_prompt(params.negative_prompt.as_deref().unwrap_or_default());
		let guided = &uncond + &((&cond - &uncond) * params.guidance_scale);
		let guided = guided.into_shape((1, LATENT_CHANNELS, 1, 1))?;

		let alpha = 1.0 / params.num_inference_steps.max(1) as f32;
		for _ in 0..params.num_inference_steps {
			latents.mapv_inplace(|f| f * (1.0 - alpha));
			latents.scaled_add(alpha, &guided);
		}

		let image = self.decode_latents(latents.view())?;
		Ok(params.output_type.convert(image))
	}
}
