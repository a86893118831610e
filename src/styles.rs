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

//! Style presets used to bias generation toward a particular aesthetic.
//!
//! A style is a prompt template with a single [`PROMPT_PLACEHOLDER`] and a negative prompt suffix:
//! ```
//! # use pixart_demo::styles::apply_style;
//! let (prompt, negative) = apply_style("Pixel art", "a red fox", None);
//! assert_eq!(prompt, "pixel-art a red fox . low-res, blocky, pixel art style, 8-bit graphics");
//! assert!(negative.starts_with("sloppy, messy"));
//! ```

use std::collections::HashMap;

use lazy_static::lazy_static;
use serde::Serialize;

/// The token in a style's prompt template that is replaced with the user's prompt.
pub const PROMPT_PLACEHOLDER: &str = "{prompt}";

/// Name of the style used when no style, or an unknown style, is requested.
pub const DEFAULT_STYLE_NAME: &str = "(No style)";

/// A named prompt template & negative prompt suffix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleEntry {
	/// Display name of the style. Unique within the registry.
	pub name: &'static str,
	/// Prompt template containing exactly one [`PROMPT_PLACEHOLDER`].
	pub prompt_template: &'static str,
	/// Text added to the user's negative prompt.
	pub negative_prompt: &'static str
}

impl StyleEntry {
	const fn new(name: &'static str, prompt_template: &'static str, negative_prompt: &'static str) -> Self {
		Self { name, prompt_template, negative_prompt }
	}

	/// Substitutes `prompt` into this style's template.
	pub fn render_prompt(&self, prompt: &str) -> String {
		self.prompt_template.replacen(PROMPT_PLACEHOLDER, prompt, 1)
	}
}

/// Every available style, in display order. The first entry is the default.
pub const STYLES: &[StyleEntry] = &[
	StyleEntry::new(DEFAULT_STYLE_NAME, "{prompt}", ""),
	StyleEntry::new(
		"Cinematic",
		"cinematic still {prompt} . emotional, harmonious, vignette, highly detailed, high budget, bokeh, cinemascope, moody, epic, gorgeous, film grain, grainy",
		"anime, cartoon, graphic, text, painting, crayon, graphite, abstract, glitch, deformed, mutated, ugly, disfigured"
	),
	StyleEntry::new(
		"Photographic",
		"cinematic photo {prompt} . 35mm photograph, film, bokeh, professional, 4k, highly detailed",
		"drawing, painting, crayon, sketch, graphite, impressionist, noisy, blurry, soft, deformed, ugly"
	),
	StyleEntry::new(
		"Anime",
		"anime artwork {prompt} . anime style, key visual, vibrant, studio anime,  highly detailed",
		"photo, deformed, black and white, realism, disfigured, low contrast"
	),
	StyleEntry::new(
		"Manga",
		"manga style {prompt} . vibrant, high-energy, detailed, iconic, Japanese comic style",
		"ugly, deformed, noisy, blurry, low contrast, realism, photorealistic, Western comic style"
	),
	StyleEntry::new(
		"Digital Art",
		"concept art {prompt} . digital artwork, illustrative, painterly, matte painting, highly detailed",
		"photo, photorealistic, realism, ugly"
	),
	StyleEntry::new(
		"Pixel art",
		"pixel-art {prompt} . low-res, blocky, pixel art style, 8-bit graphics",
		"sloppy, messy, blurry, noisy, highly detailed, ultra textured, photo, realistic"
	),
	StyleEntry::new(
		"Fantasy art",
		"ethereal fantasy concept art of  {prompt} . magnificent, celestial, ethereal, painterly, epic, majestic, magical, fantasy art, cover art, dreamy",
		"photographic, realistic, realism, 35mm film, dslr, cropped, frame, text, deformed, glitch, noise, noisy, off-center, deformed, cross-eyed, closed eyes, bad anatomy, ugly, disfigured, sloppy, duplicate, mutated, black and white"
	),
	StyleEntry::new(
		"Neonpunk",
		"neonpunk style {prompt} . cyberpunk, vaporwave, neon, vibes, vibrant, stunningly beautiful, crisp, detailed, sleek, ultramodern, magenta highlights, dark purple shadows, high contrast, cinematic, ultra detailed, intricate, professional",
		"painting, drawing, illustration, glitch, deformed, mutated, cross-eyed, ugly, disfigured"
	),
	StyleEntry::new(
		"3D Model",
		"professional 3d model {prompt} . octane render, highly detailed, volumetric, dramatic lighting",
		"ugly, deformed, noisy, low poly, blurry, painting"
	)
];

lazy_static! {
	static ref STYLE_INDEX: HashMap<&'static str, &'static StyleEntry> = STYLES.iter().map(|style| (style.name, style)).collect();
}

/// Returns the names of all styles in display order.
pub fn style_names() -> impl Iterator<Item = &'static str> {
	STYLES.iter().map(|style| style.name)
}

/// The style applied to unknown style names.
pub fn default_style() -> &'static StyleEntry {
	&STYLES[0]
}

/// Looks up a style by name. Unknown names fall back to [`default_style`] without raising an error.
pub fn lookup(name: &str) -> &'static StyleEntry {
	match STYLE_INDEX.get(name) {
		Some(style) => style,
		None => {
			tracing::warn!(style = name, "unknown style, using {DEFAULT_STYLE_NAME:?}");
			default_style()
		}
	}
}

/// Applies the style `style_name` to a prompt, returning the final `(prompt, negative_prompt)` pair.
///
/// The user's negative prompt comes first and the style's negative suffix is appended directly after it, with no
/// separator.
///
/// ```
/// # use pixart_demo::styles::apply_style;
/// let (prompt, negative) = apply_style("Anime", "a cat", Some(""));
/// assert!(prompt.starts_with("anime artwork a cat . anime style"));
/// assert_eq!(negative, "photo, deformed, black and white, realism, disfigured, low contrast");
/// ```
pub fn apply_style(style_name: &str, prompt: &str, negative_prompt: Option<&str>) -> (String, String) {
	let style = lookup(style_name);
	let negative_prompt = negative_prompt.unwrap_or_default().to_owned() + style.negative_prompt;
	(style.render_prompt(prompt), negative_prompt)
}
