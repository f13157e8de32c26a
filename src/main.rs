use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tracing::debug;

use moodle_sync::categorizer;
use moodle_sync::cli::{self, Cli, Commands, ConnectionArgs};
use moodle_sync::config::{normalize_base_url, CredentialStore, Settings};
use moodle_sync::login::{self, InteractiveLogin};
use moodle_sync::sync::course_folder_name;
use moodle_sync::{colors, ApiClient, Downloader, MaterialsTree, MoodleApi, Syncer};

fn main() -> Result<()> {
    // A missing .env is fine; values can come from the real environment or flags
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    moodle_sync::logging::init_logging(cli.verbose);
    debug!(command = cli.command.name(), "dispatching");

    match cli.command {
        Commands::ShowHelp => {
            Cli::print_help();
            Ok(())
        }
        Commands::Version => {
            Cli::print_version();
            Ok(())
        }
        Commands::Login(args) => handle_login(&args),
        Commands::Sync(args) => handle_sync(&args),
        Commands::Courses(args) => handle_courses(&args),
        Commands::Tree(args) => handle_tree(&args),
        Commands::Categorize(args) => handle_categorize(&args),
    }
}

fn handle_login(args: &cli::LoginArgs) -> Result<()> {
    let store = CredentialStore::default_location()?;

    let base_url = match args.url.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        Some(url) => url.to_string(),
        None => match store.load()? {
            Some(stored) => stored.base_url,
            None => login::prompt_base_url()?,
        },
    };
    let base_url = normalize_base_url(&base_url)?;

    let source = InteractiveLogin::new(args.username.clone())?;
    let token = login::fetch_or_prompt(&store, &source, &base_url, true)?;

    println!();
    println!("{}", "=".repeat(40).color(colors::HEADER));
    println!("{} {}", "NEW TOKEN:".bold(), token);
    println!("{}", "=".repeat(40).color(colors::HEADER));
    println!(
        "{} Saved to {}",
        "✅".green(),
        store.path().display().to_string().color(colors::PATH)
    );
    Ok(())
}

/// Resolve settings from flags, environment and the credential store
fn resolve_settings(connection: &ConnectionArgs, allow_login: bool) -> Result<Settings> {
    let store = CredentialStore::default_location()?;
    let stored = store.load().context("Failed to load stored credentials")?;

    match Settings::resolve(
        connection.url.as_deref(),
        connection.token.as_deref(),
        stored.as_ref(),
    ) {
        Ok(settings) => Ok(settings.with_ignored(connection.ignore_list())),
        Err(moodle_sync::ConfigError::MissingToken) if allow_login => {
            let base_url = connection
                .url
                .as_deref()
                .or(stored.as_ref().map(|s| s.base_url.as_str()))
                .context("Moodle URL is required to log in")?;
            let base_url = normalize_base_url(base_url)?;

            let source = InteractiveLogin::new(None)?;
            let token = login::fetch_or_prompt(&store, &source, &base_url, false)?;
            let settings = Settings::resolve(Some(base_url.as_str()), Some(token.as_str()), None)?;
            Ok(settings.with_ignored(connection.ignore_list()))
        }
        Err(e) => Err(e.into()),
    }
}

fn handle_sync(args: &cli::SyncArgs) -> Result<()> {
    let settings = resolve_settings(&args.connection, args.login)?
        .with_output_dir(args.output.clone())
        .with_layout(args.layout.into())
        .with_dry_run(args.dry_run);
    debug!(
        output_dir = %settings.output_dir.display(),
        layout = ?settings.layout,
        ignored = settings.ignored_courses.len(),
        "resolved settings"
    );

    let api = ApiClient::new(&settings.base_url, &settings.token)
        .context("Failed to build HTTP client")?;
    let downloader =
        Downloader::new(&settings.token).context("Failed to build HTTP client")?;
    let syncer = Syncer::new(&settings, &api, &downloader);

    let report = match syncer.run() {
        Ok(report) => report,
        Err(e) => {
            // Nothing was synced; Moodle's own message is the useful part
            println!("{} Error: {}", "❌".red(), e);
            return Ok(());
        }
    };

    syncer.print_report(&report);

    if !settings.dry_run {
        let store = CredentialStore::default_location()?;
        if let Err(e) = store.record_sync(&settings.base_url) {
            debug!(error = %e, "could not record sync time");
        }
    }

    Ok(())
}

fn handle_courses(args: &ConnectionArgs) -> Result<()> {
    let settings = resolve_settings(args, false)?;
    let api = ApiClient::new(&settings.base_url, &settings.token)
        .context("Failed to build HTTP client")?;

    let site = match api.site_info() {
        Ok(site) => site,
        Err(e) => {
            println!("{} Error: {}", "❌".red(), e);
            return Ok(());
        }
    };

    let courses = api.user_courses(site.userid);

    println!();
    println!("{}", "📚 ENROLLED COURSES".bold().color(colors::HEADER));
    println!("{}", "─".repeat(50).color(colors::PATH));

    if courses.is_empty() {
        println!("{} No courses found", "📭".cyan());
        return Ok(());
    }

    for course in &courses {
        let folder = course_folder_name(course);
        if settings.is_ignored(&course.fullname) {
            println!(
                "{:>6}  {}  {}",
                course.id,
                course.fullname.dimmed(),
                "(ignored)".color(colors::WARNING)
            );
        } else {
            println!(
                "{:>6}  {}  → {}",
                course.id,
                course.fullname,
                folder.color(colors::PATH)
            );
        }
    }

    Ok(())
}

fn handle_tree(args: &cli::TreeArgs) -> Result<()> {
    let tree = MaterialsTree::scan(&args.path)
        .with_context(|| format!("Failed to scan {}", args.path.display()))?;
    tree.print(&args.path);
    Ok(())
}

fn handle_categorize(args: &cli::CategorizeArgs) -> Result<()> {
    let (rule, category) = categorizer::shared().explain(&args.filename, &args.section);
    println!(
        "{} {} → {} {}",
        "🏷️".cyan(),
        args.filename.color(colors::PATH),
        category.to_string().bold().color(colors::SUCCESS),
        format!("({rule})").dimmed()
    );
    Ok(())
}
