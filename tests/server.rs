use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use image::DynamicImage;
use pixart_demo::{
	server::{self, AppState, GenerationQueue, RunResponse},
	DemoConfig, ExampleCache, Generator, Orchestrator, OutputManager, PipelineParams, TextToImagePipeline
};
use serde_json::{json, Value};

#[derive(Debug)]
struct BlankPipeline;

impl TextToImagePipeline for BlankPipeline {
	fn generate(&self, params: &PipelineParams, _: &mut Generator) -> anyhow::Result<DynamicImage> {
		Ok(DynamicImage::new_rgb8(params.width, params.height))
	}
}

fn setup(max_image_size: u32) -> (tempfile::TempDir, TestServer) {
	let dir = tempfile::tempdir().unwrap();
	let config = DemoConfig {
		max_image_size,
		cache_examples: false,
		output_dir: dir.path().to_path_buf(),
		..Default::default()
	};
	let orchestrator = Orchestrator::new(Arc::new(BlankPipeline), OutputManager::new(&config.output_dir).unwrap());
	let queue = GenerationQueue::start(orchestrator, config.queue_max_size).unwrap();
	let state = AppState::new(queue, config, ExampleCache::uncached());
	(dir, TestServer::new(server::router(state)).unwrap())
}

#[tokio::test]
async fn serves_the_demo_page() {
	let (_dir, server) = setup(1024);
	let response = server.get("/").await;
	response.assert_status_ok();
	assert!(response.text().contains("<title>PixArt-Alpha 1024px</title>"));
}

#[tokio::test]
async fn lists_styles() {
	let (_dir, server) = setup(1024);
	let body: Value = server.get("/styles").await.json();
	assert_eq!(body["default"], "(No style)");
	let names: Vec<&str> = body["styles"].as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
	assert_eq!(names.len(), 10);
	assert_eq!(names[0], "(No style)");
	assert!(names.contains(&"Anime"));
}

#[tokio::test]
async fn reports_ui_bounds() {
	let (_dir, server) = setup(768);
	let body: Value = server.get("/config").await.json();
	assert_eq!(body["max_image_size"], 768);
	assert_eq!(body["max_seed"], 2147483647u32);
	assert_eq!(body["defaults"]["width"], 768);
	assert_eq!(body["defaults"]["randomize_seed"], true);
}

#[tokio::test]
async fn lists_uncached_examples() {
	let (_dir, server) = setup(1024);
	let body: Value = server.get("/examples").await.json();
	let examples = body.as_array().unwrap();
	assert_eq!(examples.len(), 8);
	assert!(examples.iter().all(|e| e["images"].as_array().unwrap().is_empty() && e["seed"].is_null()));
}

#[tokio::test]
async fn run_generates_and_serves_images() {
	let (dir, server) = setup(1024);
	let response = server
		.post("/run")
		.json(&json!({
			"prompt": "a cat",
			"batch": 2,
			"style": "Anime",
			"seed": 42,
			"width": 256,
			"height": 288
		}))
		.await;
	response.assert_status_ok();

	let body: RunResponse = response.json();
	assert_eq!(body.seed, 42);
	assert_eq!(body.images.len(), 2);
	assert!(body.paths.iter().all(|p| p.starts_with(dir.path().join("session"))));

	let image = server.get(&body.images[0]).await;
	image.assert_status_ok();
	let decoded = image::load_from_memory(image.as_bytes()).unwrap();
	assert_eq!((decoded.width(), decoded.height()), (256, 288));
}

#[tokio::test]
async fn run_rejects_out_of_range_parameters() {
	let (_dir, server) = setup(512);
	let response = server.post("/run").json(&json!({ "prompt": "a cat" })).expect_failure().await;
	response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
	let body: Value = response.json();
	assert!(body["error"].as_str().unwrap().contains("width"));

	let response = server
		.post("/run")
		.json(&json!({ "prompt": "a cat", "width": 256, "height": 256, "num_inference_steps": 5 }))
		.expect_failure()
		.await;
	response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
	let (_dir, server) = setup(1024);
	server.get("/queue/join").expect_failure().await.assert_status_not_found();
}

#[tokio::test]
async fn advertised_defaults_are_accepted_off_grid() {
	let (_dir, server) = setup(1000);
	let config: Value = server.get("/config").await.json();
	let mut defaults = config["defaults"].clone();
	assert_eq!(defaults["width"], 1000);
	defaults["prompt"] = json!("a cat");

	let response = server.post("/run").json(&defaults).await;
	response.assert_status_ok();
	let body: RunResponse = response.json();
	assert_eq!(body.images.len(), 1);
}

#[tokio::test]
async fn malformed_bodies_get_json_errors() {
	let (_dir, server) = setup(1024);
	let response = server.post("/run").json(&json!({ "prompt": "a cat", "seed": -1 })).expect_failure().await;
	response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
	let body: Value = response.json();
	assert!(body["error"].as_str().unwrap().starts_with("invalid request body"));

	let response = server.post("/run").json(&json!({ "prompt": "a cat", "batch": "two" })).expect_failure().await;
	response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
	assert!(response.json::<Value>()["error"].is_string());
}
