use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;

use crate::config::{parse_ignore_list, Layout};
use crate::DEFAULT_OUTPUT_DIR;

#[derive(Parser, Debug)]
#[command(
    name = "moodle-sync",
    about = "Mirror Moodle course files into a local folder tree",
    version,
    long_about = "MoodleSync downloads the files of every course you are enrolled in\n\
                  and sorts them into folders by kind of material.\n\n\
                  Folders per course:\n\
                  • T: lecture material\n\
                  • TP: practical classes and exercise sheets\n\
                  • PL: lab material\n\
                  • Exemplos: solved examples\n\
                  • Anexos: anything that is not a PDF\n\
                  • Outros: everything else"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with username and password and store the token
    Login(LoginArgs),

    /// Download new files from all enrolled courses
    Sync(SyncArgs),

    /// List enrolled courses and the folder each one maps to
    Courses(ConnectionArgs),

    /// Show what is already mirrored on disk
    Tree(TreeArgs),

    /// Show which folder a filename would be sorted into
    Categorize(CategorizeArgs),

    /// Show help and examples
    ShowHelp,

    /// Show version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Moodle base URL
    #[arg(long, env = "MOODLE_URL")]
    pub url: Option<String>,

    /// Web service token
    #[arg(long, env = "MOODLE_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma-separated course names to skip (substring match)
    #[arg(long, env = "IGNORED_COURSES", hide_env_values = true)]
    pub ignored_courses: Option<String>,

    /// Additional course to skip (repeatable)
    #[arg(long = "ignore", value_name = "NAME")]
    pub ignore: Vec<String>,
}

impl ConnectionArgs {
    /// Ignore list from the environment plus any `--ignore` flags
    pub fn ignore_list(&self) -> Vec<String> {
        let mut list = self
            .ignored_courses
            .as_deref()
            .map(parse_ignore_list)
            .unwrap_or_default();
        list.extend(
            self.ignore
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        );
        list
    }
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Moodle base URL (prompted when not set)
    #[arg(long, env = "MOODLE_URL")]
    pub url: Option<String>,

    /// Username (prompted when not set)
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Root folder for downloaded materials
    #[arg(short, long, env = "MOODLE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Folder layout inside each course
    #[arg(long, value_enum, default_value_t = LayoutArg::Categorized)]
    pub layout: LayoutArg,

    /// Show where files would go without downloading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Log in interactively when no token is configured
    #[arg(long)]
    pub login: bool,
}

#[derive(Args, Debug)]
pub struct TreeArgs {
    /// Materials folder to inspect
    #[arg(env = "MOODLE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct CategorizeArgs {
    /// Filename as shown in Moodle
    pub filename: String,

    /// Name of the course section the file is in
    #[arg(short, long, default_value = "")]
    pub section: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LayoutArg {
    /// <course>/<category>/<file>
    Categorized,
    /// <course>/<section>/<file>
    Sections,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Categorized => Layout::Categorized,
            LayoutArg::Sections => Layout::Sections,
        }
    }
}

impl Cli {
    /// Print help with examples
    pub fn print_help() {
        println!("{}", "📚 MOODLE-SYNC - COURSE MATERIALS MIRROR".bold().green());
        println!();
        println!("{}", "USAGE:".bold());
        println!("  moodle-sync [OPTIONS] <COMMAND>");
        println!();
        println!("{}", "OPTIONS:".bold());
        println!("  -v, --verbose    Verbose output");
        println!("  --no-color       Disable colored output");
        println!("  -h, --help       Print help");
        println!("  -V, --version    Print version");
        println!();
        println!("{}", "COMMANDS:".bold());
        println!();
        println!("  {}  Get a token and store it", "login".cyan().bold());
        println!("      moodle-sync login --url https://moodle.isep.ipp.pt");
        println!();
        println!("  {}  Download new files", "sync".cyan().bold());
        println!("      moodle-sync sync");
        println!("      moodle-sync sync --ignore Tutoria --dry-run");
        println!("      moodle-sync sync --layout sections --output ~/Moodle");
        println!();
        println!("  {}  List enrolled courses", "courses".cyan().bold());
        println!("      moodle-sync courses");
        println!();
        println!("  {}  Show mirrored files per course", "tree".cyan().bold());
        println!("      moodle-sync tree materials");
        println!();
        println!("  {}  Preview the folder for a file", "categorize".cyan().bold());
        println!("      moodle-sync categorize \"PL3_guiao.pdf\" --section \"Laboratórios\"");
        println!();
        println!("{}", "CONFIGURATION:".bold().cyan());
        println!("  MOODLE_URL        Moodle base URL");
        println!("  MOODLE_TOKEN      Web service token (or use `login`)");
        println!("  IGNORED_COURSES   Comma-separated courses to skip");
        println!("  MOODLE_OUTPUT_DIR Root folder (default: materials)");
        println!("  A .env file in the working directory is read too.");
    }

    /// Print version information
    pub fn print_version() {
        println!("📚 MoodleSync v{}", crate::VERSION);
        println!("Mirror Moodle course files into a local folder tree");
        println!("License: {}", env!("CARGO_PKG_LICENSE"));
    }
}

impl Commands {
    /// Get the command name
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Login(_) => "login",
            Commands::Sync(_) => "sync",
            Commands::Courses(_) => "courses",
            Commands::Tree(_) => "tree",
            Commands::Categorize(_) => "categorize",
            Commands::ShowHelp => "help",
            Commands::Version => "version",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "moodle-sync",
            "sync",
            "--url",
            "https://m.example.org",
            "--token",
            "abc",
            "--ignore",
            "Tutoria",
            "--layout",
            "sections",
            "--dry-run",
            "-o",
            "out",
        ])
        .unwrap();

        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.connection.url.as_deref(), Some("https://m.example.org"));
                assert_eq!(args.connection.token.as_deref(), Some("abc"));
                assert!(args.connection.ignore_list().contains(&"Tutoria".to_string()));
                assert!(matches!(Layout::from(args.layout), Layout::Sections));
                assert!(args.dry_run);
                assert_eq!(args.output, PathBuf::from("out"));
            }
            other => panic!("unexpected command {}", other.name()),
        }
    }

    #[test]
    fn ignore_list_merges_env_style_and_flags() {
        let args = ConnectionArgs {
            url: None,
            token: None,
            ignored_courses: Some("Tutoria, Erasmus".to_string()),
            ignore: vec![" Estágio ".to_string(), " ".to_string()],
        };
        assert_eq!(args.ignore_list(), vec!["Tutoria", "Erasmus", "Estágio"]);
    }

    #[test]
    fn categorize_section_defaults_to_empty() {
        let cli = Cli::try_parse_from(["moodle-sync", "categorize", "x.pdf"]).unwrap();
        match cli.command {
            Commands::Categorize(args) => {
                assert_eq!(args.filename, "x.pdf");
                assert_eq!(args.section, "");
            }
            other => panic!("unexpected command {}", other.name()),
        }
    }
}
