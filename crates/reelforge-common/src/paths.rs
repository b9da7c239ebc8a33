//! Scratch directory layout for generated assets.
//!
//! Every run writes images, audio and video under a work directory, one
//! sub-directory per queue item:
//!
//! ```text
//! work_dir/
//!   images/<item>/scene_001.png
//!   audio/<item>/scene_001.mp3
//!   videos/<item>/clip_001.mp4, final.mp4
//! ```

use std::path::{Path, PathBuf};

use crate::ids::ItemId;
use crate::Result;

const SUBDIRS: &[&str] = &["images", "audio", "videos"];

/// Scratch directories rooted at a work directory.
#[derive(Debug, Clone)]
pub struct ScratchLayout {
    root: PathBuf,
}

impl ScratchLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the work directory and its asset sub-directories.
    pub fn ensure(&self) -> Result<()> {
        for sub in SUBDIRS {
            std::fs::create_dir_all(self.root.join(sub))?;
        }
        Ok(())
    }

    /// Remove every file below the asset sub-directories.
    ///
    /// Returns the number of files removed. Files outside the asset
    /// directories (such as the run lock) are left alone.
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for sub in SUBDIRS {
            let dir = self.root.join(sub);
            if !dir.exists() {
                continue;
            }
            for entry in std::fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    removed += count_files(&path)?;
                    std::fs::remove_dir_all(&path)?;
                } else {
                    std::fs::remove_file(&path)?;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    pub fn images_dir(&self, id: &ItemId) -> PathBuf {
        self.root.join("images").join(id.slug())
    }

    pub fn audio_dir(&self, id: &ItemId) -> PathBuf {
        self.root.join("audio").join(id.slug())
    }

    pub fn videos_dir(&self, id: &ItemId) -> PathBuf {
        self.root.join("videos").join(id.slug())
    }

    /// Create the per-item directories.
    pub fn ensure_item(&self, id: &ItemId) -> Result<()> {
        std::fs::create_dir_all(self.images_dir(id))?;
        std::fs::create_dir_all(self.audio_dir(id))?;
        std::fs::create_dir_all(self.videos_dir(id))?;
        Ok(())
    }

    /// Path for the still of a scene (1-based index).
    pub fn scene_image(&self, id: &ItemId, index: usize) -> PathBuf {
        self.images_dir(id).join(format!("scene_{:03}.png", index))
    }

    /// Path for the narration audio of a scene (1-based index).
    pub fn scene_audio(&self, id: &ItemId, index: usize) -> PathBuf {
        self.audio_dir(id).join(format!("scene_{:03}.mp3", index))
    }

    /// Path for the rendered clip of a scene (1-based index).
    pub fn scene_clip(&self, id: &ItemId, index: usize) -> PathBuf {
        self.videos_dir(id).join(format!("clip_{:03}.mp4", index))
    }

    pub fn final_video(&self, id: &ItemId) -> PathBuf {
        self.videos_dir(id).join("final.mp4")
    }
}

fn count_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            count += count_files(&path)?;
        } else {
            count += 1;
        }
    }
    Ok(count)
}
