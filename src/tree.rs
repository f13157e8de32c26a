use std::collections::BTreeMap;
use std::path::{Component, Path};

use anyhow::{Context, Result};
use colored::*;
use path_slash::PathExt as _;
use walkdir::WalkDir;

use crate::{colors, Category};

/// File count and size for one `<course>/<folder>` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub course: String,
    pub folder: String,
    pub files: usize,
    pub bytes: u64,
}

/// Summary of what is already mirrored on disk
#[derive(Debug, Default)]
pub struct MaterialsTree {
    pub entries: Vec<TreeEntry>,
    /// Files sitting directly in a course folder or the root
    pub loose_files: usize,
}

impl MaterialsTree {
    pub fn scan(root: &Path) -> Result<Self> {
        if !root.exists() {
            return Err(anyhow::anyhow!("Path does not exist: {}", root.display()));
        }

        let mut totals: BTreeMap<(String, String), (usize, u64)> = BTreeMap::new();
        let mut loose_files = 0;

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok());

        for entry in walker {
            if !entry.file_type().is_file() {
                continue;
            }
            // Leftovers of interrupted downloads
            if entry.path().extension().is_some_and(|ext| ext == "part") {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(root)
                .context("Walked outside the materials root")?;
            let parts: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();

            if parts.len() < 3 {
                loose_files += 1;
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            let slot = totals
                .entry((parts[0].clone(), parts[1].clone()))
                .or_insert((0, 0));
            slot.0 += 1;
            slot.1 += size;
        }

        let entries = totals
            .into_iter()
            .map(|((course, folder), (files, bytes))| TreeEntry {
                course,
                folder,
                files,
                bytes,
            })
            .collect();

        Ok(Self {
            entries,
            loose_files,
        })
    }

    pub fn total_files(&self) -> usize {
        self.entries.iter().map(|e| e.files).sum::<usize>() + self.loose_files
    }

    pub fn courses(&self) -> Vec<&str> {
        let mut courses: Vec<&str> = self.entries.iter().map(|e| e.course.as_str()).collect();
        courses.dedup();
        courses
    }

    pub fn print(&self, root: &Path) {
        println!();
        println!("{} {}", "📁 MATERIALS".bold().color(colors::HEADER), root.display());
        println!("{}", "─".repeat(50).color(colors::PATH));

        if self.entries.is_empty() {
            println!("{} Nothing mirrored yet", "📭".cyan());
            return;
        }

        let mut current_course: Option<&str> = None;
        for entry in &self.entries {
            if current_course != Some(entry.course.as_str()) {
                println!();
                println!("{}", entry.course.bold());
                current_course = Some(entry.course.as_str());
            }

            let label = Path::new(&entry.course).join(&entry.folder);
            let folder = if Category::from_folder_name(&entry.folder).is_some() {
                entry.folder.color(colors::SUCCESS)
            } else {
                entry.folder.normal()
            };
            println!(
                "  {:<12} {:>4} files {:>8.1} MB  {}",
                folder,
                entry.files,
                entry.bytes as f64 / (1024.0 * 1024.0),
                label.to_slash_lossy().dimmed()
            );
        }

        println!();
        println!(
            "{} {} files in {} courses",
            "📊".cyan(),
            self.total_files(),
            self.courses().len()
        );
    }
}
