//! Example prompts shown under the demo form, optionally pre-generated at startup.

use std::{path::PathBuf, sync::Arc};

use serde::Serialize;

use crate::{
	config::DemoConfig,
	generation::{GenerationRequest, Orchestrator},
	output::OutputManager,
	pipelines::TextToImagePipeline
};

/// Prompts offered as one-click examples.
pub const EXAMPLE_PROMPTS: &[&str] = &[
	"A small cactus with a happy face in the Sahara desert.",
	"Pirate ship trapped in a cosmic maelstrom nebula, rendered in cosmic beach whirlpool engine, volumetric lighting, spectacular, ambient lights, light pollution, cinematic atmosphere, art nouveau style, illustration art artwork by SenseiJaye, intricate detail.",
	"stars, water, brilliantly, gorgeous large scale scene, a little girl, in the style of dreamy realism, light gold and amber, blue and pink, brilliantly illuminated in the background.",
	"3d digital art of an adorable ghost, glowing within, holding a heart shaped pumpkin, Halloween, super cute, spooky haunted house background",
	"beautiful lady, freckles, big smile, blue eyes, short ginger hair, dark makeup, wearing a floral blue vest top, soft light, dark grey background",
	"professional portrait photo of an anthropomorphic cat wearing fancy gentleman hat and jacket walking in autumn forest.",
	"an astronaut sitting in a diner, eating fries, cinematic, analog film",
	"Albert Einstein in a surrealist Cyberpunk 2077 world, hyperrealistic"
];

/// An example prompt and, if it was cached, the images generated for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachedExample {
	/// The example prompt.
	pub prompt: String,
	/// Generated images, empty when caching is disabled.
	pub paths: Vec<PathBuf>,
	/// The seed used to generate `paths`.
	pub seed: Option<u32>
}

/// The example prompts, with their pre-generated results when caching is enabled.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExampleCache {
	examples: Vec<CachedExample>
}

impl ExampleCache {
	/// Lists the example prompts without generating anything.
	pub fn uncached() -> Self {
		Self {
			examples: EXAMPLE_PROMPTS
				.iter()
				.map(|prompt| CachedExample {
					prompt: prompt.to_string(),
					paths: Vec::new(),
					seed: None
				})
				.collect()
		}
	}

	/// The request every example is generated with: the form's initial values, which include a fixed seed of 0, so
	/// cached examples come out the same on every start.
	pub fn default_request(config: &DemoConfig) -> GenerationRequest {
		let defaults = GenerationRequest::default();
		let (width, height) = (defaults.width.min(config.max_image_size), defaults.height.min(config.max_image_size));
		defaults.with_size(width, height)
	}

	/// Generates every example once with `defaults` (prompt replaced), storing example `n` under `<root>/<n>/`.
	pub fn build(pipeline: &Arc<dyn TextToImagePipeline>, root: impl Into<PathBuf>, defaults: &GenerationRequest) -> anyhow::Result<Self> {
		let root: PathBuf = root.into();
		let mut examples = Vec::with_capacity(EXAMPLE_PROMPTS.len());
		for (i, prompt) in EXAMPLE_PROMPTS.iter().enumerate() {
			let orchestrator = Orchestrator::new(Arc::clone(pipeline), OutputManager::new(root.join(i.to_string()))?);
			let request = GenerationRequest { prompt: prompt.to_string(), ..defaults.clone() };
			let output = orchestrator.generate(&request)?;
			examples.push(CachedExample {
				prompt: request.prompt,
				paths: output.paths,
				seed: Some(output.seed)
			});
		}
		tracing::info!("cached {} examples in {}", examples.len(), root.display());
		Ok(Self { examples })
	}

	/// The examples in display order.
	pub fn examples(&self) -> &[CachedExample] {
		&self.examples
	}
}
