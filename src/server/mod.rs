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

//! The browser front-end: an HTML page plus a small JSON API.

use std::{
	net::SocketAddr,
	path::{Component, Path, PathBuf},
	sync::Arc
};

use axum::{
	extract::{rejection::JsonRejection, State},
	http::{Method, StatusCode, Uri},
	response::{Html, IntoResponse},
	routing::{get, post},
	Json, Router
};
use serde::{Deserialize, Serialize};
use tower_http::{services::ServeDir, trace::TraceLayer};

mod error;
mod queue;

pub use self::error::ApiError;
pub use self::queue::GenerationQueue;
use crate::{
	config::DemoConfig,
	example_cache::{CachedExample, ExampleCache},
	generation::GenerationRequest,
	seed::MAX_SEED,
	styles::{StyleEntry, DEFAULT_STYLE_NAME, STYLES}
};

/// Smallest width & height offered by the UI.
pub const MIN_IMAGE_SIZE: u32 = 256;
/// Width & height slider step.
pub const IMAGE_SIZE_STEP: u32 = 32;
/// Batch size slider bounds.
pub const BATCH_SIZE_RANGE: (usize, usize) = (1, 8);
/// Guidance scale slider bounds.
pub const GUIDANCE_SCALE_RANGE: (f32, f32) = (1.0, 20.0);
/// Inference step slider bounds.
pub const STEPS_RANGE: (usize, usize) = (10, 100);

const INDEX_HTML: &str = include_str!("index.html");

/// State shared by every handler.
#[derive(Debug, Clone)]
pub struct AppState {
	queue: GenerationQueue,
	config: Arc<DemoConfig>,
	examples: Arc<ExampleCache>
}

impl AppState {
	/// Creates the handler state.
	pub fn new(queue: GenerationQueue, config: DemoConfig, examples: ExampleCache) -> Self {
		Self {
			queue,
			config: Arc::new(config),
			examples: Arc::new(examples)
		}
	}
}

/// The body of `POST /run`. Field names and defaults follow the form on the demo page.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunRequest {
	/// The prompt.
	pub prompt: String,
	/// Number of images to generate.
	pub batch: usize,
	/// The negative prompt; ignored unless `use_negative_prompt` is set.
	pub negative_prompt: String,
	/// Style name.
	pub style: String,
	/// Whether to send `negative_prompt`.
	pub use_negative_prompt: bool,
	/// Seed, used unless `randomize_seed` is set.
	pub seed: u64,
	/// Image width.
	pub width: u32,
	/// Image height.
	pub height: u32,
	/// Guidance scale.
	pub guidance_scale: f32,
	/// Number of inference steps.
	pub num_inference_steps: usize,
	/// Draw a random seed.
	pub randomize_seed: bool
}

impl Default for RunRequest {
	fn default() -> Self {
		let defaults = GenerationRequest::default();
		Self {
			prompt: String::new(),
			batch: defaults.batch_size,
			negative_prompt: String::new(),
			style: defaults.style,
			use_negative_prompt: false,
			seed: defaults.seed as u64,
			width: defaults.width,
			height: defaults.height,
			guidance_scale: defaults.guidance_scale,
			num_inference_steps: defaults.num_inference_steps,
			randomize_seed: false
		}
	}
}

impl RunRequest {
	/// Checks the request against the UI's slider bounds and converts it into a [`GenerationRequest`].
	pub fn into_generation_request(self, max_image_size: u32) -> Result<GenerationRequest, ApiError> {
		let invalid = |msg: String| -> Result<GenerationRequest, ApiError> { Err(ApiError::InvalidParameter(msg)) };

		if !(BATCH_SIZE_RANGE.0..=BATCH_SIZE_RANGE.1).contains(&self.batch) {
			return invalid(format!("`batch` must be between {} and {}, got {}", BATCH_SIZE_RANGE.0, BATCH_SIZE_RANGE.1, self.batch));
		}
		if self.seed > MAX_SEED as u64 {
			return invalid(format!("`seed` must be at most {MAX_SEED}, got {}", self.seed));
		}
		for (name, value) in [("width", self.width), ("height", self.height)] {
			// the slider always reaches its maximum, even when it is off the step grid
			let in_range = (MIN_IMAGE_SIZE..=max_image_size).contains(&value);
			if !in_range || (value != max_image_size && (value - MIN_IMAGE_SIZE) % IMAGE_SIZE_STEP != 0) {
				return invalid(format!(
					"`{name}` must be between {MIN_IMAGE_SIZE} and {max_image_size} in steps of {IMAGE_SIZE_STEP}, got {value}"
				));
			}
		}
		if !(GUIDANCE_SCALE_RANGE.0..=GUIDANCE_SCALE_RANGE.1).contains(&self.guidance_scale) {
			return invalid(format!(
				"`guidance_scale` must be between {} and {}, got {}",
				GUIDANCE_SCALE_RANGE.0, GUIDANCE_SCALE_RANGE.1, self.guidance_scale
			));
		}
		if !(STEPS_RANGE.0..=STEPS_RANGE.1).contains(&self.num_inference_steps) {
			return invalid(format!(
				"`num_inference_steps` must be between {} and {}, got {}",
				STEPS_RANGE.0, STEPS_RANGE.1, self.num_inference_steps
			));
		}

		Ok(GenerationRequest {
			prompt: self.prompt,
			negative_prompt: self.use_negative_prompt.then_some(self.negative_prompt),
			style: self.style,
			seed: self.seed as u32,
			randomize_seed: self.randomize_seed,
			width: self.width,
			height: self.height,
			guidance_scale: self.guidance_scale,
			num_inference_steps: self.num_inference_steps,
			batch_size: self.batch
		})
	}
}

/// The body returned by `POST /run`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResponse {
	/// URLs of the images in the current session, for display.
	pub images: Vec<String>,
	/// File paths of the same images.
	pub paths: Vec<PathBuf>,
	/// The seed the run used.
	pub seed: u32
}

#[derive(Debug, Serialize)]
struct StylesResponse {
	default: &'static str,
	styles: &'static [StyleEntry]
}

#[derive(Debug, Serialize)]
struct UiConfig {
	max_image_size: u32,
	min_image_size: u32,
	image_size_step: u32,
	max_seed: u32,
	batch_size: (usize, usize),
	guidance_scale: (f32, f32),
	num_inference_steps: (usize, usize),
	defaults: RunRequest
}

#[derive(Debug, Serialize)]
struct ExampleResponse {
	prompt: String,
	images: Vec<String>,
	seed: Option<u32>
}

/// Builds the router serving the demo page, the JSON API, and generated images.
pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/", get(index))
		.route("/styles", get(styles))
		.route("/config", get(ui_config))
		.route("/examples", get(examples))
		.route("/run", post(run))
		.nest_service("/outputs", ServeDir::new(&state.config.output_dir))
		.fallback(catch_all)
		.layer(TraceLayer::new_for_http())
		.with_state(state)
}

/// Serves the demo on `bind` until `CTRL+C` is received.
pub async fn serve(state: AppState, bind: SocketAddr) -> anyhow::Result<()> {
	let listener = tokio::net::TcpListener::bind(bind).await?;
	tracing::info!("listening on http://{}", listener.local_addr()?);
	axum::serve(listener, router(state))
		.with_graceful_shutdown(async {
			while tokio::signal::ctrl_c().await.is_err() {}
			tracing::warn!("shutting down");
		})
		.await?;
	Ok(())
}

/// Maps a file under the output directory to the URL it is served at.
fn output_url(output_dir: &Path, path: &Path) -> String {
	let relative = path.strip_prefix(output_dir).unwrap_or(path);
	let mut url = String::from("/outputs");
	for component in relative.components() {
		if let Component::Normal(part) = component {
			url.push('/');
			url.push_str(&part.to_string_lossy());
		}
	}
	url
}

async fn index() -> Html<&'static str> {
	Html(INDEX_HTML)
}

async fn styles() -> Json<StylesResponse> {
	Json(StylesResponse { default: DEFAULT_STYLE_NAME, styles: STYLES })
}

async fn ui_config(State(state): State<AppState>) -> Json<UiConfig> {
	Json(UiConfig {
		max_image_size: state.config.max_image_size,
		min_image_size: MIN_IMAGE_SIZE,
		image_size_step: IMAGE_SIZE_STEP,
		max_seed: MAX_SEED,
		batch_size: BATCH_SIZE_RANGE,
		guidance_scale: GUIDANCE_SCALE_RANGE,
		num_inference_steps: STEPS_RANGE,
		defaults: RunRequest {
			width: state.config.max_image_size.min(RunRequest::default().width),
			height: state.config.max_image_size.min(RunRequest::default().height),
			randomize_seed: true,
			..Default::default()
		}
	})
}

async fn examples(State(state): State<AppState>) -> Json<Vec<ExampleResponse>> {
	let output_dir = &state.config.output_dir;
	Json(
		state
			.examples
			.examples()
			.iter()
			.map(|CachedExample { prompt, paths, seed }| ExampleResponse {
				prompt: prompt.clone(),
				images: paths.iter().map(|p| output_url(output_dir, p)).collect(),
				seed: *seed
			})
			.collect()
	)
}

async fn run(State(state): State<AppState>, request: Result<Json<RunRequest>, JsonRejection>) -> Result<Json<RunResponse>, ApiError> {
	let Json(request) = request?;
	let request = request.into_generation_request(state.config.max_image_size)?;
	let output = state.queue.submit(request).await?;
	Ok(Json(RunResponse {
		images: output.paths.iter().map(|p| output_url(&state.config.output_dir, p)).collect(),
		paths: output.paths,
		seed: output.seed
	}))
}

async fn catch_all(method: Method, uri: Uri) -> impl IntoResponse {
	tracing::warn!("unknown route requested: {} {}", method, uri);
	StatusCode::NOT_FOUND
}

#[cfg(test)]
mod tests {
	use std::path::Path;

	use super::{output_url, ApiError, RunRequest};

	#[test]
	fn test_output_url() {
		assert_eq!(output_url(Path::new("outputs"), Path::new("outputs/session/abc.png")), "/outputs/session/abc.png");
		assert_eq!(output_url(Path::new("/tmp/out"), Path::new("/tmp/out/examples/3/session/x.png")), "/outputs/examples/3/session/x.png");
	}

	#[test]
	fn test_negative_prompt_requires_toggle() {
		let request = RunRequest {
			negative_prompt: "blurry".to_string(),
			..Default::default()
		};
		assert_eq!(request.clone().into_generation_request(1024).unwrap().negative_prompt, None);
		let request = RunRequest { use_negative_prompt: true, ..request };
		assert_eq!(request.into_generation_request(1024).unwrap().negative_prompt.as_deref(), Some("blurry"));
	}

	#[test]
	fn test_bounds() {
		let ok = RunRequest::default();
		assert!(ok.clone().into_generation_request(1024).is_ok());
		for bad in [
			RunRequest { batch: 0, ..ok.clone() },
			RunRequest { batch: 9, ..ok.clone() },
			RunRequest { seed: 1 << 31, ..ok.clone() },
			RunRequest { width: 2048, ..ok.clone() },
			RunRequest { height: 300, ..ok.clone() },
			RunRequest { height: 1000, ..ok.clone() },
			RunRequest { width: 128, ..ok.clone() },
			RunRequest { guidance_scale: 0.5, ..ok.clone() },
			RunRequest { guidance_scale: f32::NAN, ..ok.clone() },
			RunRequest { num_inference_steps: 101, ..ok.clone() }
		] {
			assert!(matches!(bad.into_generation_request(1024), Err(ApiError::InvalidParameter(_))));
		}
		// the default 1024px size is rejected once the configured maximum is lower
		assert!(ok.into_generation_request(512).is_err());
	}

	#[test]
	fn test_off_grid_maximum() {
		let max = RunRequest { width: 1000, height: 1000, ..Default::default() };
		assert!(max.into_generation_request(1000).is_ok());
		let below = RunRequest { width: 999, height: 992, ..Default::default() };
		assert!(matches!(below.into_generation_request(1000), Err(ApiError::InvalidParameter(_))));
		let grid = RunRequest { width: 992, height: 256, ..Default::default() };
		assert!(grid.into_generation_request(1000).is_ok());
	}
}
