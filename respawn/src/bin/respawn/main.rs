mod commands;
mod context;
mod examples;
mod output;
mod theme;

use anyhow::Result;
use clap::{
    ColorChoice, CommandFactory, FromArgMatches, Parser, Subcommand,
    builder::{Styles, styling::AnsiColor},
};
use colored::control::ShouldColorize;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

use respawn::{Backend, DocumentStore};

use commands::{
    author::{AuthorCommands, handle_author_commands},
    category::{CategoryCommands, handle_category_commands},
    favorites::{FavoritesArgs, handle_favorites},
    post::{PostCommands, handle_post_commands},
    profile::{ProfileCommands, handle_profile_commands},
    vote::{VoteCommands, handle_vote_commands},
};
use context::{AppContext, IdentityArgs};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ICONS, THEME, paint};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[
    ("REDIS_URL", "Redis Stack connection URL for the redis backend"),
    ("RESPAWN_USER", "User id to act as (same as --as)"),
    ("RUST_LOG", "Log filter, e.g. respawn=debug"),
];

#[derive(Parser)]
#[command(name = "respawn")]
#[command(version)]
#[command(
    about = "Posts, votes and favorites for the Respawn gaming blog",
    long_about = r#"Command-line client for the Respawn gaming blog that provides:

• Posts and categories
• Like/dislike voting with a consistent score
• Favorites kept in sync between users and posts
• Profiles created and refreshed on sign-in

Commands:
  post       Create, show, list and delete posts
  category   Manage categories
  author     List authors and their post counts
  vote       Like, dislike or favorite a post
  favorites  List the signed-in user's favorite posts
  profile    Register, sync and show profiles
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Config file (defaults to .respawn/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store backend, overriding the config file
    #[arg(long, value_enum, global = true)]
    backend: Option<Backend>,

    /// Act as this user id
    #[arg(long = "as", env = "RESPAWN_USER", global = true)]
    user: Option<String>,

    /// Email of the acting user
    #[arg(long, global = true)]
    email: Option<String>,

    /// Display name of the acting user
    #[arg(long, global = true)]
    name: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    /// Parses arguments with themed help and per-command examples attached.
    fn parse_themed() -> Self {
        let use_color = ShouldColorize::from_env().should_colorize();
        let mut command = Cli::command()
            .styles(help_styles())
            .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
            .after_long_help(render_appendix(use_color));
        for example in command_examples() {
            if let Some(subcommand) = command.find_subcommand_mut(example.name) {
                *subcommand = subcommand
                    .clone()
                    .after_long_help(render_examples(example.groups, use_color));
            }
        }

        let matches = command.get_matches();
        Cli::from_arg_matches(&matches).unwrap_or_else(|err| err.exit())
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Examples:", THEME.accent, true, use_color));

    let rendered: Vec<String> = groups
        .iter()
        .map(|group| {
            let mut section = format!("  {}\n", paint(group.title, THEME.title, true, use_color));
            for line in group.commands {
                let _ = writeln!(
                    section,
                    "    {} {}",
                    paint(ICONS.arrow, THEME.command, false, use_color),
                    paint(line, THEME.command, false, use_color)
                );
            }
            section
        })
        .collect();
    buffer.push_str(&rendered.join("\n"));
    buffer
}

fn render_appendix(use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Environment Variables:", THEME.accent, true, use_color));
    for (key, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(
            buffer,
            "  {}  {}",
            paint(key, THEME.key, true, use_color),
            paint(description, THEME.value, false, use_color)
        );
    }
    let _ = writeln!(
        buffer,
        "\n{} {}",
        paint("Tip:", THEME.accent, true, use_color),
        paint(
            "Use 'respawn <command> --help' to view examples for each command.",
            THEME.command,
            false,
            use_color
        )
    );
    buffer
}

fn help_styles() -> Styles {
    Styles::styled()
        .usage(AnsiColor::BrightMagenta.on_default().bold())
        .header(AnsiColor::Cyan.on_default().bold())
        .literal(AnsiColor::Magenta.on_default())
        .placeholder(AnsiColor::BrightBlack.on_default())
        .valid(AnsiColor::Green.on_default())
        .invalid(AnsiColor::Yellow.on_default())
        .error(AnsiColor::Red.on_default().bold())
}

#[derive(Subcommand)]
enum Commands {
    /// Create, show, list and delete posts
    #[command(subcommand)]
    Post(PostCommands),

    /// Manage post categories
    #[command(subcommand)]
    Category(CategoryCommands),

    /// List authors and their post counts
    #[command(subcommand)]
    Author(AuthorCommands),

    /// Like, dislike or favorite a post
    #[command(subcommand)]
    Vote(VoteCommands),

    /// List the signed-in user's favorite posts
    Favorites(FavoritesArgs),

    /// Register, sync and show user profiles
    #[command(subcommand)]
    Profile(ProfileCommands),
}

#[tokio::main]
async fn main() {
    env_logger::init();

    let cli = Cli::parse_themed();

    if let Err(err) = execute(cli).await {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

async fn execute(cli: Cli) -> Result<()> {
    let global_options = GlobalOptions {
        output_format: cli.output,
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    };
    if cli.no_color {
        colored::control::set_override(false);
    }

    let output = OutputManager::new(global_options);
    let identity = IdentityArgs {
        uid: cli.user,
        email: cli.email,
        name: cli.name,
    };
    let ctx = AppContext::load(cli.config.as_deref(), identity)?;

    match cli.backend.unwrap_or(ctx.config.store.backend) {
        Backend::Memory => {
            let store = Arc::new(ctx.open_memory_store()?);
            output.verbose(&format!("Using memory store in {}", ctx.config_dir.display()));
            dispatch(cli.command, &ctx, &store, &output).await?;
            ctx.save_memory_store(&store)?;
        }
        Backend::Redis => {
            output.progress("Connecting to Redis");
            let store = Arc::new(ctx.connect_redis().await?);
            output.clear_line();
            output.verbose(&format!("Using redis store with prefix '{}'", ctx.config.store.prefix));
            dispatch(cli.command, &ctx, &store, &output).await?;
        }
    }

    Ok(())
}

async fn dispatch<S: DocumentStore>(
    command: Commands,
    ctx: &AppContext,
    store: &Arc<S>,
    output: &OutputManager,
) -> Result<()> {
    match command {
        Commands::Post(post_cmd) => {
            handle_post_commands(post_cmd, ctx, store.as_ref(), output).await?;
        }
        Commands::Category(category_cmd) => {
            handle_category_commands(category_cmd, ctx, store.as_ref(), output).await?;
        }
        Commands::Author(author_cmd) => {
            handle_author_commands(author_cmd, ctx, store.as_ref(), output).await?;
        }
        Commands::Vote(vote_cmd) => {
            handle_vote_commands(vote_cmd, ctx, store, output).await?;
        }
        Commands::Favorites(args) => {
            handle_favorites(args, ctx, store, output).await?;
        }
        Commands::Profile(profile_cmd) => {
            handle_profile_commands(profile_cmd, ctx, store, output).await?;
        }
    }

    Ok(())
}
