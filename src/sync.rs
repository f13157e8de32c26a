use std::path::{Path, PathBuf};
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use path_slash::PathExt as _;
use tracing::{debug, info, warn};

use crate::api::{Course, MoodleApi, Section};
use crate::categorizer::{self, Categorizer};
use crate::config::{Layout, Settings};
use crate::downloader::{DownloadOutcome, Transfer};
use crate::error::ApiError;
use crate::names::{clean_course_name, sanitize};
use crate::{colors, Category};

/// A file the run intends to place on disk
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedFile {
    pub url: String,
    pub destination: PathBuf,
    pub section: String,
    /// `None` in the section layout, where no categorization happens
    pub category: Option<Category>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SyncReport {
    pub courses_synced: usize,
    pub courses_ignored: usize,
    pub files_downloaded: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
    /// Files listed but not fetched (dry run)
    pub files_planned: usize,
    pub bytes_downloaded: u64,
    pub failures: Vec<(PathBuf, String)>,
}

impl SyncReport {
    pub fn total_files(&self) -> usize {
        self.files_downloaded + self.files_skipped + self.files_failed + self.files_planned
    }

    fn record(&mut self, destination: &Path, outcome: &DownloadOutcome) {
        match outcome {
            DownloadOutcome::Skipped => self.files_skipped += 1,
            DownloadOutcome::Downloaded { bytes } => {
                self.files_downloaded += 1;
                self.bytes_downloaded += bytes;
            }
            DownloadOutcome::Failed(reason) => {
                self.files_failed += 1;
                self.failures.push((destination.to_path_buf(), reason.clone()));
            }
        }
    }
}

/// Walks the user's courses and mirrors their files
pub struct Syncer<'a> {
    settings: &'a Settings,
    api: &'a dyn MoodleApi,
    transfer: &'a dyn Transfer,
    categorizer: &'a Categorizer,
}

impl<'a> Syncer<'a> {
    pub fn new(settings: &'a Settings, api: &'a dyn MoodleApi, transfer: &'a dyn Transfer) -> Self {
        Self {
            settings,
            api,
            transfer,
            categorizer: categorizer::shared(),
        }
    }

    /// Run a full sync.
    ///
    /// Only a failure to identify the user stops the run; everything after
    /// that is reported per course or per file.
    pub fn run(&self) -> Result<SyncReport, ApiError> {
        println!("{}", "--- Starting Moodle Sync ---".bold().color(colors::HEADER));
        if self.settings.dry_run {
            println!("{} DRY RUN: nothing will be downloaded", "🌵".yellow());
        }

        let site = self.api.site_info()?;
        info!(userid = site.userid, site = %site.sitename, "identified user");
        if !site.fullname.is_empty() {
            println!("{} Logged in as {}", "👤".cyan(), site.fullname.bold());
        }

        let courses = self.api.user_courses(site.userid);
        debug!(count = courses.len(), "enrolled courses");

        let mut report = SyncReport::default();
        for course in &courses {
            if self.settings.is_ignored(&course.fullname) {
                println!("{} Skipping ignored course: {}", "⏭️".dimmed(), course.fullname);
                report.courses_ignored += 1;
                continue;
            }
            self.sync_course(course, &mut report);
        }

        Ok(report)
    }

    fn sync_course(&self, course: &Course, report: &mut SyncReport) {
        let folder = course_folder_name(course);
        println!();
        println!("{} {}", "📚 Processing:".color(colors::HEADER), folder.bold());

        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message("Fetching course contents...");
        spinner.enable_steady_tick(Duration::from_millis(100));
        let sections = self.api.course_contents(course.id);
        spinner.finish_and_clear();

        let planned = self.plan_course(&folder, &sections);
        if planned.is_empty() {
            println!("   {} No files", "ℹ️".cyan());
        }

        for file in &planned {
            self.place(file, report);
        }
        report.courses_synced += 1;
    }

    fn place(&self, file: &PlannedFile, report: &mut SyncReport) {
        let name = file
            .destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.settings.dry_run {
            let relative = file
                .destination
                .strip_prefix(&self.settings.output_dir)
                .unwrap_or(&file.destination);
            let label = match file.category {
                Some(category) => format!("[{category}] from {}", file.section),
                None => format!("from {}", file.section),
            };
            println!(
                "   {} {} {}",
                "→".color(colors::PATH),
                relative.to_slash_lossy().color(colors::PATH),
                label.dimmed()
            );
            report.files_planned += 1;
            return;
        }

        let outcome = self.transfer.download(&file.url, &file.destination);
        match &outcome {
            DownloadOutcome::Downloaded { .. } => {
                println!("   {} Downloaded: {}", "✓".color(colors::SUCCESS), name)
            }
            DownloadOutcome::Skipped => debug!(file = %name, "skipped, already present"),
            DownloadOutcome::Failed(reason) => {
                println!("   {} Failed: {} - {}", "x".color(colors::FAILURE), name, reason)
            }
        }
        report.record(&file.destination, &outcome);
    }

    /// Destinations for every file attachment of a course, in listing order
    pub fn plan_course(&self, course_folder: &str, sections: &[Section]) -> Vec<PlannedFile> {
        let course_dir = self.settings.output_dir.join(course_folder);
        let mut planned = Vec::new();

        for section in sections {
            let section_dir = match self.settings.layout {
                Layout::Categorized => None,
                Layout::Sections => {
                    let name = sanitize(&section.name);
                    if name.trim().is_empty() {
                        continue;
                    }
                    Some(name.trim().to_string())
                }
            };

            for module in &section.modules {
                for content in module.contents.iter().filter(|c| c.is_file()) {
                    let filename = sanitize(&content.filename);
                    if filename.trim().is_empty() {
                        warn!(url = %content.fileurl, "file without a usable name, skipping");
                        continue;
                    }

                    let (folder, category) = match &section_dir {
                        Some(dir) => (dir.clone(), None),
                        None => {
                            let category =
                                self.categorizer.categorize(&content.filename, &section.name);
                            (category.folder_name().to_string(), Some(category))
                        }
                    };

                    planned.push(PlannedFile {
                        url: content.fileurl.clone(),
                        destination: course_dir.join(folder).join(&filename),
                        section: section.name.clone(),
                        category,
                    });
                }
            }
        }

        planned
    }

    /// Print the end-of-run summary
    pub fn print_report(&self, report: &SyncReport) {
        println!();
        println!("{}", "📊 SYNC SUMMARY".bold().color(colors::HEADER));
        println!("{}", "─".repeat(50).color(colors::PATH));
        println!("📚 Courses synced: {}", report.courses_synced.to_string().color(colors::SUCCESS));
        if report.courses_ignored > 0 {
            println!("⏭️  Courses ignored: {}", report.courses_ignored.to_string().dimmed());
        }

        if self.settings.dry_run {
            println!("📝 Files planned: {}", report.files_planned.to_string().color(colors::SUCCESS));
            return;
        }

        println!(
            "⬇️  Downloaded: {} ({:.1} MB)",
            report.files_downloaded.to_string().color(colors::SUCCESS),
            report.bytes_downloaded as f64 / (1024.0 * 1024.0)
        );
        println!("📁 Already present: {}", report.files_skipped.to_string().dimmed());

        if report.files_failed > 0 {
            println!("❌ Failed: {}", report.files_failed.to_string().color(colors::FAILURE));
            for (path, reason) in &report.failures {
                println!("   • {} ({})", path.to_slash_lossy().color(colors::PATH), reason);
            }
        }
    }
}

/// Folder name for a course: cleaned name, else the sanitized raw name, else `course-<id>`
pub fn course_folder_name(course: &Course) -> String {
    let cleaned = clean_course_name(&course.fullname);
    if is_usable_folder(&cleaned) {
        return cleaned;
    }
    let sanitized = sanitize(&course.fullname).trim().to_string();
    if is_usable_folder(&sanitized) {
        return sanitized;
    }
    format!("course-{}", course.id)
}

/// `.` and `..` would place files outside the output root
fn is_usable_folder(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".."
}
