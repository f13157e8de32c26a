//! MoodleSync - Mirror Moodle course files into a local, categorized folder tree

pub mod api;
pub mod categorizer;
pub mod cli;
pub mod config;
pub mod downloader;
pub mod error;
pub mod logging;
pub mod login;
pub mod names;
pub mod sync;
pub mod tree;

// Re-exports for easy access
pub use api::{ApiClient, Course, FileContent, Module, MoodleApi, Section, SiteInfo};
pub use categorizer::{categorize, Categorizer, Rule};
pub use cli::{Cli, Commands};
pub use config::{CredentialStore, Layout, Settings, StoredCredentials};
pub use downloader::{DownloadOutcome, Downloader};
pub use error::{ApiError, ConfigError, DownloadError, LoginError};
pub use login::{InteractiveLogin, TokenSource};
pub use names::{clean_course_name, normalize, sanitize};
pub use sync::{SyncReport, Syncer};
pub use tree::{MaterialsTree, TreeEntry};

pub mod colors {
    use colored::Color;

    pub const SUCCESS: Color = Color::TrueColor { r: 77, g: 255, b: 157 };
    pub const HEADER: Color = Color::TrueColor { r: 157, g: 77, b: 255 };
    pub const PATH: Color = Color::TrueColor { r: 77, g: 195, b: 255 };
    pub const WARNING: Color = Color::TrueColor { r: 255, g: 217, b: 61 };
    pub const FAILURE: Color = Color::TrueColor { r: 255, g: 107, b: 157 };
}

/// Current version of MoodleSync
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default root of the mirrored tree
pub const DEFAULT_OUTPUT_DIR: &str = "materials";

/// REST endpoint, relative to the Moodle base URL
pub const API_ENDPOINT: &str = "/webservice/rest/server.php";

/// Token endpoint used by the login helper
pub const LOGIN_ENDPOINT: &str = "/login/token.php";

/// Web service the mobile app token is issued for
pub const LOGIN_SERVICE: &str = "moodle_mobile_app";

/// Download chunk size in bytes
pub const CHUNK_SIZE: usize = 8192;

/// Destination folder for a mirrored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Lecture material
    T,
    /// Practical classes and exercise sheets
    TP,
    /// Lab material
    PL,
    /// Solved examples
    Exemplos,
    /// Anything that is not a PDF
    Anexos,
    Outros,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::T,
        Category::TP,
        Category::PL,
        Category::Exemplos,
        Category::Anexos,
        Category::Outros,
    ];

    /// Folder name on disk (same as the label)
    pub fn folder_name(&self) -> &'static str {
        match self {
            Category::T => "T",
            Category::TP => "TP",
            Category::PL => "PL",
            Category::Exemplos => "Exemplos",
            Category::Anexos => "Anexos",
            Category::Outros => "Outros",
        }
    }

    pub fn from_folder_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.folder_name() == name)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.folder_name())
    }
}
