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

//! Persistence of generated images.

use std::{
	fs,
	path::{Path, PathBuf}
};

use anyhow::Context;
use image::{DynamicImage, ImageFormat};
use uuid::Uuid;

/// Directory holding the images of the most recent run.
pub const SESSION_DIR: &str = "session";
/// Directory the previous run's images are moved into.
pub const ARCHIVE_DIR: &str = "old";

/// Writes generated images to `<root>/session/` and archives earlier runs into `<root>/old/`.
///
/// Rotation is a plain move-then-write sequence; a failure halfway through can leave a run split between the two
/// directories.
#[derive(Debug, Clone)]
pub struct OutputManager {
	root: PathBuf,
	session_dir: PathBuf,
	archive_dir: PathBuf
}

impl OutputManager {
	/// Creates an output manager rooted at `root`, creating the session & archive directories if needed.
	pub fn new(root: impl Into<PathBuf>) -> anyhow::Result<Self> {
		let root: PathBuf = root.into();
		let session_dir = root.join(SESSION_DIR);
		let archive_dir = root.join(ARCHIVE_DIR);
		fs::create_dir_all(&session_dir).with_context(|| format!("failed to create {}", session_dir.display()))?;
		fs::create_dir_all(&archive_dir).with_context(|| format!("failed to create {}", archive_dir.display()))?;
		Ok(Self { root, session_dir, archive_dir })
	}

	/// The root output directory.
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// The directory holding the current run's images.
	pub fn session_dir(&self) -> &Path {
		&self.session_dir
	}

	/// The directory holding archived images.
	pub fn archive_dir(&self) -> &Path {
		&self.archive_dir
	}

	/// Moves every file in the session directory into the archive directory. Returns the number of files moved.
	pub fn rotate(&self) -> anyhow::Result<usize> {
		let mut moved = 0;
		for entry in fs::read_dir(&self.session_dir)? {
			let entry = entry?;
			if !entry.file_type()?.is_file() {
				continue;
			}
			let to = self.archive_dir.join(entry.file_name());
			fs::rename(entry.path(), &to).with_context(|| format!("failed to archive {}", entry.path().display()))?;
			moved += 1;
		}
		if moved > 0 {
			tracing::info!(moved, archive = %self.archive_dir.display(), "archived previous session");
		}
		Ok(moved)
	}

	/// Writes `image` into the session directory under a fresh `<uuid>.png` name.
	pub fn save(&self, image: &DynamicImage) -> anyhow::Result<PathBuf> {
		let path = self.session_dir.join(format!("{}.png", Uuid::new_v4()));
		DynamicImage::ImageRgb8(image.to_rgb8())
			.save_with_format(&path, ImageFormat::Png)
			.with_context(|| format!("failed to save {}", path.display()))?;
		tracing::debug!(path = %path.display(), "saved image");
		Ok(path)
	}

	/// Lists every file currently in the session directory, sorted by file name.
	pub fn session_files(&self) -> anyhow::Result<Vec<PathBuf>> {
		let mut files = Vec::new();
		for entry in fs::read_dir(&self.session_dir)? {
			let entry = entry?;
			if entry.file_type()?.is_file() {
				files.push(entry.path());
			}
		}
		files.sort();
		Ok(files)
	}

	/// Archives the previous session, saves `images`, and returns the full listing of the session directory.
	///
	/// The returned list is the directory listing rather than only the paths just written, so stray files left in
	/// the session directory by a partially failed rotation are included too.
	pub fn rotate_and_save(&self, images: &[DynamicImage]) -> anyhow::Result<Vec<PathBuf>> {
		self.rotate()?;
		for image in images {
			self.save(image)?;
		}
		self.session_files()
	}
}
