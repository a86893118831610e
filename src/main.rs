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

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use clap::{Parser, Subcommand};
use pixart_demo::{
	server::{self, AppState, GenerationQueue},
	styles, DemoConfig, ExampleCache, GenerationRequest, LatentPreviewPipeline, Orchestrator, OutputManager, TextToImagePipeline, MAX_SEED
};
use tracing_subscriber::{filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pixart-demo")]
#[command(about = "Styled text-to-image demo")]
#[command(version)]
struct Cli {
	/// TOML configuration file; environment variables override its values
	#[arg(short, long, global = true, env = "PIXART_DEMO_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Option<Command>
}

#[derive(Subcommand)]
enum Command {
	/// Serve the demo page (the default)
	Serve {
		/// Address to listen on
		#[arg(short, long)]
		bind: Option<SocketAddr>
	},

	/// Generate images once and print where they were saved
	Generate {
		/// Text prompt describing the desired image
		prompt: String,

		/// Style preset
		#[arg(short, long, default_value = styles::DEFAULT_STYLE_NAME)]
		style: String,

		/// Negative prompt (things to avoid)
		#[arg(short, long)]
		negative: Option<String>,

		/// Seed
		#[arg(long, default_value = "0", value_parser = clap::value_parser!(u32).range(..=MAX_SEED as i64))]
		seed: u32,

		/// Draw a random seed instead of using --seed
		#[arg(long)]
		randomize: bool,

		/// Number of images to generate
		#[arg(short, long, default_value = "1")]
		batch: usize,

		/// Image width
		#[arg(long, default_value = "1024")]
		width: u32,

		/// Image height
		#[arg(long, default_value = "1024")]
		height: u32,

		/// Guidance scale
		#[arg(long, default_value = "4.5")]
		guidance: f32,

		/// Number of inference steps
		#[arg(long, default_value = "20")]
		steps: usize
	},

	/// List the available styles
	Styles
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<DemoConfig> {
	match path {
		Some(path) => DemoConfig::from_file(path)?.with_env(),
		None => DemoConfig::from_env()
	}
}

fn load_pipeline(config: &DemoConfig) -> anyhow::Result<Arc<dyn TextToImagePipeline>> {
	Ok(Arc::new(LatentPreviewPipeline::new(config.pipeline_options())?))
}

fn main() -> anyhow::Result<()> {
	let format = tracing_subscriber::fmt::layer().compact();
	let filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::default().add_directive(LevelFilter::INFO.into()));
	tracing_subscriber::registry().with(format).with(filter).init();

	let cli = Cli::parse();
	match cli.command.unwrap_or(Command::Serve { bind: None }) {
		Command::Serve { bind } => {
			let config = load_config(cli.config)?;
			let bind = bind.unwrap_or(config.bind);
			let pipeline = load_pipeline(&config)?;

			let examples = if config.cache_examples {
				let defaults = ExampleCache::default_request(&config);
				ExampleCache::build(&pipeline, config.output_dir.join("examples"), &defaults).context("failed to cache examples")?
			} else {
				ExampleCache::uncached()
			};

			let orchestrator = Orchestrator::new(pipeline, OutputManager::new(&config.output_dir)?);
			let queue = GenerationQueue::start(orchestrator, config.queue_max_size)?;
			let state = AppState::new(queue, config, examples);

			tokio::runtime::Builder::new_multi_thread()
				.enable_all()
				.build()?
				.block_on(server::serve(state, bind))
		}
		Command::Generate {
			prompt,
			style,
			negative,
			seed,
			randomize,
			batch,
			width,
			height,
			guidance,
			steps
		} => {
			let config = load_config(cli.config)?;
			let orchestrator = Orchestrator::new(load_pipeline(&config)?, OutputManager::new(&config.output_dir)?);
			let mut request = GenerationRequest::new(prompt)
				.with_style(style)
				.with_seed(seed)
				.with_batch_size(batch)
				.with_size(width, height)
				.with_guidance_scale(guidance)
				.with_steps(steps);
			request.negative_prompt = negative;
			if randomize {
				request = request.with_random_seed();
			}

			let output = orchestrator.generate(&request)?;
			println!("{}", serde_json::to_string_pretty(&output)?);
			Ok(())
		}
		Command::Styles => {
			for name in styles::style_names() {
				println!("{name}");
			}
			Ok(())
		}
	}
}
