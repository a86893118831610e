//! `pixart-demo` is a browser front-end for pretrained text-to-image diffusion pipelines, modeled after the PixArt-α
//! demo.
//!
//! The crate does not implement a diffusion model. It applies [style presets](styles) to the user's prompt, resolves
//! the seed, calls a [`TextToImagePipeline`] once per image with a single shared [`Generator`], and stores results with
//! an [`OutputManager`] that archives the previous run before writing the new one:
//! ```ignore
//! use std::sync::Arc;
//!
//! use pixart_demo::{GenerationRequest, LatentPreviewPipeline, Orchestrator, OutputManager, PipelineOptions};
//!
//! let pipeline = Arc::new(LatentPreviewPipeline::new(PipelineOptions::default())?);
//! let orchestrator = Orchestrator::new(pipeline, OutputManager::new("outputs")?);
//!
//! let output = orchestrator.generate(&GenerationRequest::new("a red fox").with_style("Anime").with_batch_size(2))?;
//! println!("seed {}: {:?}", output.seed, output.paths);
//! ```
//!
//! See [`server`] for the HTTP front-end.

#![warn(missing_docs)]
#![warn(rustdoc::all)]
#![warn(clippy::correctness, clippy::suspicious, clippy::complexity, clippy::perf, clippy::style)]
#![allow(clippy::tabs_in_doc_comments)]

pub mod config;
pub mod example_cache;
mod generation;
pub mod output;
pub mod pipelines;
pub mod seed;
pub mod server;
pub mod styles;

pub use self::config::DemoConfig;
pub use self::example_cache::ExampleCache;
pub use self::generation::{GenerationOutput, GenerationRequest, Orchestrator};
pub use self::output::OutputManager;
pub use self::pipelines::*;
pub use self::seed::{resolve_seed, MAX_SEED};
pub use self::styles::{apply_style, StyleEntry, DEFAULT_STYLE_NAME};
