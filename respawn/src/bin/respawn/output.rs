use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;
use std::io::Write;

use respawn::{AuthorSummary, Category, EngagementState, Notice, NoticeLevel, Post, UserProfile};

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output and behavior
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

/// Output manager handles formatting and display
pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: colored::Color) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    /// Display a success message with color and icon
    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.success, message, THEME.success));
        }
    }

    /// Display an error message with color and icon
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, message, THEME.error));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.warning, message, THEME.warning));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.info, message, THEME.info));
        }
    }

    /// Display verbose information (only if verbose mode is enabled)
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(ICONS.arrow, message, THEME.muted));
        }
    }

    /// Relays an engagement notice the way a toast would show it.
    pub fn notice(&self, notice: &Notice) {
        if matches!(self.options.output_format, OutputFormat::Json) {
            return;
        }
        match notice.level {
            NoticeLevel::Success => self.success(&notice.message),
            NoticeLevel::Error => self.error(&notice.message),
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.options.quiet && !matches!(self.options.output_format, OutputFormat::Json) {
            let output = if self.options.no_color {
                format!("\n{text}\n{}", "=".repeat(text.len()))
            } else {
                format!("\n{}", text.color(THEME.title).bold())
            };
            println!("{output}");
        }
    }

    pub fn bullet(&self, text: &str) {
        if !self.options.quiet {
            let output = if self.options.no_color {
                format!("  {} {text}", ICONS.bullet)
            } else {
                format!("  {} {text}", ICONS.bullet.color(THEME.muted))
            };
            println!("{output}");
        }
    }

    /// Display progress indicator
    pub fn progress(&self, message: &str) {
        if self.options.quiet || matches!(self.options.output_format, OutputFormat::Json) {
            return;
        }

        let output = if self.options.no_color {
            format!("{} {message}...", ICONS.loading)
        } else {
            format!(
                "{} {}...",
                ICONS.loading.color(THEME.accent).bold(),
                message.color(THEME.accent)
            )
        };

        print!("\r{output}");
        std::io::stdout().flush().ok();
    }

    /// Clear the current line (useful after progress indicators)
    pub fn clear_line(&self) {
        if self.options.quiet || matches!(self.options.output_format, OutputFormat::Json) {
            return;
        }

        print!("\r{}", " ".repeat(80));
        print!("\r");
        std::io::stdout().flush().ok();
    }
}

fn themed_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(comfy_table::presets::ASCII_FULL);
    } else {
        table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
    }
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

fn key_value_table(options: &GlobalOptions, rows: Vec<(&str, String)>) -> Table {
    let mut table = themed_table(options, &["Field", "Value"]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key).add_attribute(Attribute::Bold), Cell::new(value)]);
    }
    table
}

fn join(values: &std::collections::BTreeSet<String>) -> String {
    values.iter().cloned().collect::<Vec<_>>().join(", ")
}

/// Posts rendered as one row each.
#[derive(Serialize)]
#[serde(transparent)]
pub struct PostList(pub Vec<Post>);

impl TableDisplay for PostList {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Id", "Title", "Category", "Author", "Score", "Created"]);
        if self.0.is_empty() {
            table.add_row(vec![Cell::new("No posts found")]);
            return table;
        }
        for post in &self.0 {
            table.add_row(vec![
                Cell::new(&post.id),
                Cell::new(&post.title),
                Cell::new(&post.category_name),
                Cell::new(&post.author_name),
                Cell::new(post.like_count),
                Cell::new(post.created_at.format("%Y-%m-%d %H:%M").to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|post| format!("{} {:+} {}", post.id, post.like_count, post.title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct PostDetail(pub Post);

impl TableDisplay for PostDetail {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let post = &self.0;
        key_value_table(
            options,
            vec![
                ("Id", post.id.clone()),
                ("Title", post.title.clone()),
                ("Description", post.description.clone()),
                ("Category", format!("{} ({})", post.category_name, post.category_slug)),
                ("Author", format!("{} ({})", post.author_name, post.author_id)),
                ("Published", post.published.to_string()),
                ("Score", post.like_count.to_string()),
                ("Liked by", join(&post.liked_by)),
                ("Disliked by", join(&post.disliked_by)),
                ("Favorited by", join(&post.favorited_by)),
                ("Created", post.created_at.to_rfc3339()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        format!("{} {:+} {}", self.0.id, self.0.like_count, self.0.title)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct CategoryList(pub Vec<Category>);

impl TableDisplay for CategoryList {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Id", "Name", "Slug", "Image"]);
        if self.0.is_empty() {
            table.add_row(vec![Cell::new("No categories found")]);
            return table;
        }
        for category in &self.0 {
            table.add_row(vec![
                Cell::new(&category.id),
                Cell::new(&category.name),
                Cell::new(&category.slug),
                Cell::new(&category.image_url),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|category| format!("{} {}", category.id, category.slug))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct AuthorList(pub Vec<AuthorSummary>);

impl TableDisplay for AuthorList {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Uid", "Name", "Email", "Posts", "Role", "Joined"]);
        if self.0.is_empty() {
            table.add_row(vec![Cell::new("No authors found")]);
            return table;
        }
        for author in &self.0 {
            table.add_row(vec![
                Cell::new(&author.profile.uid),
                Cell::new(&author.profile.display_name),
                Cell::new(&author.profile.email),
                Cell::new(author.post_count),
                Cell::new(if author.is_admin { "admin" } else { "author" }),
                Cell::new(author.profile.created_at.format("%Y-%m-%d").to_string()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.0
            .iter()
            .map(|author| format!("{} {} posts", author.profile.uid, author.post_count))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Engagement state of one post for the acting user.
#[derive(Serialize)]
pub struct EngagementView {
    pub post_id: String,
    #[serde(flatten)]
    pub state: EngagementState,
}

impl TableDisplay for EngagementView {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        key_value_table(
            options,
            vec![
                ("Post", self.post_id.clone()),
                ("Score", self.state.like_count.to_string()),
                ("Liked", self.state.is_liked.to_string()),
                ("Disliked", self.state.is_disliked.to_string()),
                ("Favorited", self.state.is_favorited.to_string()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        let vote = if self.state.is_liked {
            ICONS.up
        } else if self.state.is_disliked {
            ICONS.down
        } else {
            "-"
        };
        let favorite = if self.state.is_favorited { ICONS.star } else { "-" };
        format!("{} {:+} {vote} {favorite}", self.post_id, self.state.like_count)
    }
}

#[derive(Serialize)]
#[serde(transparent)]
pub struct ProfileDetail(pub UserProfile);

impl TableDisplay for ProfileDetail {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let profile = &self.0;
        key_value_table(
            options,
            vec![
                ("Uid", profile.uid.clone()),
                ("Name", profile.display_name.clone()),
                ("Email", profile.email.clone()),
                ("Photo", profile.photo_url.clone().unwrap_or_default()),
                ("Provider", profile.provider.clone()),
                ("Favorites", join(&profile.favorite_post_ids)),
                ("Last login", profile.last_login.map(|at| at.to_rfc3339()).unwrap_or_default()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        format!("{} {} ({} favorites)", self.0.uid, self.0.display_name, self.0.favorite_post_ids.len())
    }
}
