use std::{
	fs,
	sync::{Arc, Mutex}
};

use image::DynamicImage;
use pixart_demo::{Generator, GenerationRequest, Orchestrator, OutputManager, PipelineParams, TextToImagePipeline};

/// Records every call and returns a blank image of the requested size.
#[derive(Debug, Default)]
struct RecordingPipeline {
	calls: Mutex<Vec<(PipelineParams, u32)>>
}

impl TextToImagePipeline for RecordingPipeline {
	fn generate(&self, params: &PipelineParams, generator: &mut Generator) -> anyhow::Result<DynamicImage> {
		let draw = generator.next_seed();
		self.calls.lock().unwrap().push((params.clone(), draw));
		Ok(DynamicImage::new_rgb8(params.width, params.height))
	}
}

fn setup() -> (tempfile::TempDir, Arc<RecordingPipeline>, Orchestrator) {
	let dir = tempfile::tempdir().unwrap();
	let pipeline = Arc::new(RecordingPipeline::default());
	let orchestrator = Orchestrator::new(pipeline.clone(), OutputManager::new(dir.path()).unwrap());
	(dir, pipeline, orchestrator)
}

#[test]
fn batch_writes_one_png_per_image() {
	let (dir, _, orchestrator) = setup();
	let output = orchestrator
		.generate(&GenerationRequest::new("a cat").with_size(256, 320).with_batch_size(3).with_seed(42))
		.unwrap();

	assert_eq!(output.seed, 42);
	assert_eq!(output.paths.len(), 3);
	for path in &output.paths {
		assert_eq!(path.parent().unwrap(), dir.path().join("session"));
		assert_eq!(path.extension().unwrap(), "png");
		let image = image::open(path).unwrap();
		assert_eq!((image.width(), image.height()), (256, 320));
	}
}

#[test]
fn batch_shares_one_generator() {
	let (_dir, pipeline, orchestrator) = setup();
	orchestrator.generate(&GenerationRequest::new("a cat").with_size(256, 256).with_batch_size(2).with_seed(7)).unwrap();

	let calls = pipeline.calls.lock().unwrap();
	assert_eq!(calls.len(), 2);
	// consecutive draws from a single stream seeded with 7
	let mut expected = Generator::manual_seed(7);
	assert_eq!(calls[0].1, expected.next_seed());
	assert_eq!(calls[1].1, expected.next_seed());
	assert_ne!(calls[0].1, calls[1].1);
}

#[test]
fn same_seed_reproduces_request() {
	let (_dir, pipeline, orchestrator) = setup();
	let request = GenerationRequest::new("a cat").with_size(256, 256).with_batch_size(2).with_seed(99);
	orchestrator.generate(&request).unwrap();
	orchestrator.generate(&request).unwrap();

	let draws: Vec<u32> = pipeline.calls.lock().unwrap().iter().map(|(_, draw)| *draw).collect();
	assert_eq!(draws[..2], draws[2..]);
}

#[test]
fn randomized_seed_is_reported() {
	let (_dir, pipeline, orchestrator) = setup();
	let output = orchestrator.generate(&GenerationRequest::new("a cat").with_size(256, 256).with_random_seed()).unwrap();

	assert!(output.seed <= pixart_demo::MAX_SEED);
	let draw = pipeline.calls.lock().unwrap()[0].1;
	assert_eq!(draw, Generator::manual_seed(output.seed as u64).next_seed());
}

#[test]
fn styled_prompts_reach_the_pipeline() {
	let (_dir, pipeline, orchestrator) = setup();
	let request = GenerationRequest::new("a red fox")
		.with_style("Anime")
		.with_negative_prompt("blurry, ")
		.with_size(512, 256)
		.with_guidance_scale(7.0)
		.with_steps(30);
	orchestrator.generate(&request).unwrap();

	let calls = pipeline.calls.lock().unwrap();
	let (params, _) = &calls[0];
	assert_eq!(params.prompt, "anime artwork a red fox . anime style, key visual, vibrant, studio anime,  highly detailed");
	assert_eq!(
		params.negative_prompt.as_deref(),
		Some("blurry, photo, deformed, black and white, realism, disfigured, low contrast")
	);
	assert_eq!((params.width, params.height), (512, 256));
	assert_eq!(params.guidance_scale, 7.0);
	assert_eq!(params.num_inference_steps, 30);
}

#[test]
fn unknown_style_falls_back_to_plain_prompt() {
	let (_dir, pipeline, orchestrator) = setup();
	orchestrator.generate(&GenerationRequest::new("a red fox").with_style("Vaporwave").with_size(256, 256)).unwrap();

	let calls = pipeline.calls.lock().unwrap();
	assert_eq!(calls[0].0.prompt, "a red fox");
	assert_eq!(calls[0].0.negative_prompt.as_deref(), Some(""));
}

#[test]
fn previous_run_is_archived() {
	let (dir, _, orchestrator) = setup();
	let first = orchestrator.generate(&GenerationRequest::new("first").with_size(256, 256).with_batch_size(2)).unwrap();
	let second = orchestrator.generate(&GenerationRequest::new("second").with_size(256, 256)).unwrap();

	assert_eq!(second.paths.len(), 1);
	assert!(first.paths.iter().all(|p| !second.paths.contains(p)));

	let mut archived: Vec<_> = fs::read_dir(dir.path().join("old")).unwrap().map(|e| e.unwrap().file_name()).collect();
	archived.sort();
	let mut expected: Vec<_> = first.paths.iter().map(|p| p.file_name().unwrap().to_owned()).collect();
	expected.sort();
	assert_eq!(archived, expected);
}

#[test]
fn progress_reports_each_image() {
	let (_dir, _, orchestrator) = setup();
	let mut reported = Vec::new();
	let output = orchestrator
		.generate_with_progress(&GenerationRequest::new("a cat").with_size(256, 256).with_batch_size(3), |done, total| {
			reported.push((done, total));
			true
		})
		.unwrap();

	assert_eq!(output.paths.len(), 3);
	assert_eq!(reported, vec![(1, 3), (2, 3), (3, 3)]);
}

#[test]
fn cancelled_run_keeps_previous_session() {
	let (_dir, pipeline, orchestrator) = setup();
	let first = orchestrator.generate(&GenerationRequest::new("first").with_size(256, 256)).unwrap();

	let result = orchestrator.generate_with_progress(&GenerationRequest::new("second").with_size(256, 256).with_batch_size(4), |done, _| done < 2);
	assert!(result.unwrap_err().to_string().contains("cancelled"));
	// one call for the first run, two before cancelling the second
	assert_eq!(pipeline.calls.lock().unwrap().len(), 3);
	assert_eq!(orchestrator.outputs().session_files().unwrap(), first.paths);
}
