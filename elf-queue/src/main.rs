//! elf-queue - Manage scheduled posts
//!
//! Lists, edits, reschedules and cancels posts held by the posting provider.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use futures::future::join_all;
use libsocialelf::logging::init_cli;
use libsocialelf::platforms::PlatformOptions;
use libsocialelf::scheduling::parse_schedule;
use libsocialelf::service::calendar::MoveOutcome;
use libsocialelf::timezone::TimezoneResolver;
use libsocialelf::types::MediaItem;
use libsocialelf::{
    Platform, Post, PostFilter, PostPatch, PostStatus, Result, SocialElfError, SocialElfService,
};

#[derive(Parser, Debug)]
#[command(name = "elf-queue")]
#[command(version)]
#[command(about = "Manage scheduled posts")]
#[command(long_about = "\
elf-queue - Manage scheduled posts

DESCRIPTION:
    elf-queue works on the posts your posting provider holds for a profile.
    Use it to list and inspect posts, edit or reschedule them, move them
    between calendar days, and cancel them. Posts that are publishing or
    published cannot be edited; published posts cannot be cancelled.

COMMANDS:
    list        List posts
    show        Show one post
    edit        Change fields of a post
    reschedule  Reschedule a post to a different time
    move        Move a post to another calendar day
    calendar    Show scheduled posts grouped by day
    cancel      Cancel (delete) one or more posts

USAGE EXAMPLES:
    # List scheduled posts
    elf-queue list --status scheduled

    # List posts in JSON format
    elf-queue list --format json

    # Reschedule a post
    elf-queue reschedule <POST_ID> \"tomorrow 3pm\"

    # Move a post to another day, keeping its time of day
    elf-queue move <POST_ID> 2030-06-03

    # Show the next two weeks
    elf-queue calendar --until 2030-06-14

    # Cancel two posts
    elf-queue cancel <POST_ID> <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/socialelf/config.toml
    API key: read from SOCIALELF_API_KEY (or provider.api_key_env)

    Override with environment variables:
        SOCIALELF_CONFIG   - Path to config file
        SOCIALELF_PROFILE  - Profile to act as

EXIT CODES:
    0 - Success
    1 - Operation failed (post locked, provider error, etc.)
    2 - Account not connected
    3 - Invalid input (bad status, time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile to act as
    #[arg(long, global = true, env = "SOCIALELF_PROFILE")]
    profile: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List posts
    List {
        /// Filter by status: draft, scheduled, publishing, published, failed
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by platform
        #[arg(short, long)]
        platform: Option<String>,

        /// Only posts scheduled on or after this date or time
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// Only posts scheduled on or before this date or time
        #[arg(long, value_name = "DATE")]
        until: Option<String>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<u32>,

        /// Posts per page
        #[arg(long)]
        limit: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show one post
    Show {
        post_id: String,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Change fields of a post; anything not given is kept
    Edit {
        post_id: String,

        /// New content
        #[arg(short, long)]
        content: Option<String>,

        /// Replace the tags (repeatable)
        #[arg(short, long)]
        tag: Vec<String>,

        /// Replace the media (repeatable)
        #[arg(short, long, value_name = "URL")]
        media: Vec<String>,

        /// Replace the platforms, comma-separated
        #[arg(short, long, value_delimiter = ',')]
        platform: Vec<String>,

        /// New schedule time
        #[arg(short, long, value_name = "WHEN")]
        schedule: Option<String>,

        /// Publish immediately
        #[arg(short, long)]
        now: bool,

        /// Turn back into a draft
        #[arg(short, long)]
        draft: bool,
    },

    /// Reschedule a post
    Reschedule {
        /// Post ID to reschedule
        post_id: String,

        /// New schedule time (e.g., "tomorrow 3pm", "+2h")
        time: String,
    },

    /// Move a post to another calendar day
    Move {
        post_id: String,

        /// Target day (YYYY-MM-DD) in the profile's timezone
        date: String,

        /// Precise local time (HH:MM); defaults to the post's current time of day
        #[arg(long, value_name = "HH:MM")]
        at: Option<String>,
    },

    /// Show scheduled posts grouped by local day
    Calendar {
        /// First day shown (defaults to today)
        #[arg(long, value_name = "DATE")]
        from: Option<String>,

        /// Last day shown (defaults to a week after the first)
        #[arg(long, value_name = "DATE")]
        until: Option<String>,
    },

    /// Cancel (delete) posts
    Cancel {
        /// Post IDs to cancel
        #[arg(required = true)]
        post_ids: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_cli(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = SocialElfService::new()?;
    let profile_id = service.config().select_profile(cli.profile.as_deref())?;
    let queue = Queue {
        service: &service,
        profile_id: &profile_id,
    };

    match cli.command {
        Commands::List {
            status,
            platform,
            from,
            until,
            page,
            limit,
            format,
        } => {
            let tz = queue.timezone().await?;
            let filter = PostFilter {
                status: status.as_deref().map(str::parse::<PostStatus>).transpose()?,
                platform: platform.as_deref().map(str::parse::<Platform>).transpose()?,
                from: from.as_deref().map(|s| parse_bound(s, tz, false)).transpose()?,
                until: until.as_deref().map(|s| parse_bound(s, tz, true)).transpose()?,
                page,
                limit,
            };
            queue.list(&filter, &format).await?;
        }
        Commands::Show { post_id, format } => queue.show(&post_id, &format).await?,
        Commands::Edit {
            post_id,
            content,
            tag,
            media,
            platform,
            schedule,
            now,
            draft,
        } => {
            let mut patch = PostPatch {
                content,
                tags: (!tag.is_empty()).then_some(tag),
                media_items: (!media.is_empty())
                    .then(|| media.iter().map(MediaItem::from_url).collect()),
                ..PostPatch::default()
            };
            if !platform.is_empty() {
                let platforms = platform
                    .iter()
                    .map(|s| s.parse::<Platform>().map(PlatformOptions::bare))
                    .collect::<Result<Vec<_>>>()?;
                patch.platforms = Some(platforms);
            }
            if [schedule.is_some(), now, draft].iter().filter(|set| **set).count() > 1 {
                return Err(timing_conflict());
            }
            let scheduled_for = match schedule {
                Some(when) => Some(parse_schedule(&when, queue.timezone().await?)?),
                None => None,
            };
            apply_timing(&mut patch, scheduled_for, now, draft)?;
            if patch.fields().is_empty() {
                return Err(SocialElfError::Validation(
                    "Nothing to change. Pass at least one field to edit".to_string(),
                ));
            }
            let post = service.update_post(&profile_id, &post_id, patch).await?;
            println!("Updated post {} ({})", post.id, post.status);
        }
        Commands::Reschedule { post_id, time } => {
            let tz = queue.timezone().await?;
            let instant = parse_schedule(&time, tz)?;
            let post = service
                .reschedule_post(&profile_id, &post_id, instant)
                .await?;
            println!(
                "Rescheduled post {} for {}",
                post.id,
                queue.local(instant, tz)
            );
        }
        Commands::Move { post_id, date, at } => {
            let day = parse_day(&date)?;
            let precise = at.as_deref().map(parse_time_of_day).transpose()?;
            queue.move_post(&post_id, day, precise).await?;
        }
        Commands::Calendar { from, until } => queue.calendar(from, until).await?,
        Commands::Cancel { post_ids } => queue.cancel(&post_ids).await?,
    }

    Ok(())
}

struct Queue<'a> {
    service: &'a SocialElfService,
    profile_id: &'a str,
}

impl Queue<'_> {
    async fn timezone(&self) -> Result<Tz> {
        Ok(self
            .service
            .scheduling()
            .acting(self.profile_id)
            .await?
            .timezone)
    }

    fn local(&self, instant: DateTime<Utc>, tz: Tz) -> String {
        self.service
            .scheduling()
            .timezones()
            .format_local(instant, tz)
    }

    /// List posts
    async fn list(&self, filter: &PostFilter, format: &str) -> Result<()> {
        let page = self.service.list_posts(self.profile_id, filter).await?;

        if format == "json" {
            let json = serde_json::json!({
                "posts": page.posts,
                "pagination": page.pagination,
            });
            println!("{}", to_pretty(&json)?);
            return Ok(());
        }

        if page.posts.is_empty() {
            return Ok(());
        }
        let tz = self.timezone().await?;
        for post in &page.posts {
            println!(
                "{} | {} | {} | {} | {}",
                post.id,
                post.status,
                post.scheduled_for
                    .map(|at| self.local(at, tz))
                    .unwrap_or_else(|| "-".to_string()),
                post.platform_names().join(","),
                truncate_content(&post.content, 50)
            );
        }
        if page.pagination.pages > 1 {
            eprintln!(
                "Page {} of {} ({} posts)",
                page.pagination.page, page.pagination.pages, page.pagination.total
            );
        }
        Ok(())
    }

    async fn show(&self, post_id: &str, format: &str) -> Result<()> {
        let post = self.service.get_post(self.profile_id, post_id).await?;
        if format == "json" {
            println!("{}", to_pretty(&post)?);
            return Ok(());
        }

        let tz = self.timezone().await?;
        println!("ID:        {}", post.id);
        println!("Status:    {}", post.status);
        if let Some(at) = post.scheduled_for {
            println!("Scheduled: {}", self.local(at, tz));
        }
        println!("Platforms: {}", post.platform_names().join(", "));
        if !post.tags.is_empty() {
            println!("Tags:      {}", post.tags.join(", "));
        }
        for item in &post.media_items {
            println!("Media:     {}", item.url);
        }
        println!();
        println!("{}", post.content);
        Ok(())
    }

    async fn move_post(
        &self,
        post_id: &str,
        day: NaiveDate,
        precise: Option<NaiveTime>,
    ) -> Result<()> {
        let post = self.service.get_post(self.profile_id, post_id).await?;
        let mut view = self
            .service
            .calendar(self.profile_id, window_around(&post))
            .await?;

        match view.move_post(post_id, day, precise).await? {
            MoveOutcome::Confirmed(post) => {
                let tz = view.timezone();
                println!(
                    "Moved post {} to {}",
                    post.id,
                    post.scheduled_for
                        .map(|at| self.local(at, tz))
                        .unwrap_or_else(|| day.to_string())
                );
                Ok(())
            }
            MoveOutcome::Reverted { message, .. } => {
                eprintln!("Error: {}", message);
                std::process::exit(1);
            }
        }
    }

    async fn calendar(&self, from: Option<String>, until: Option<String>) -> Result<()> {
        let tz = self.timezone().await?;
        let timezones = self.service.scheduling().timezones();
        let first = match from {
            Some(s) => parse_day(&s)?,
            None => timezones.local_date(Utc::now(), tz),
        };
        let last = match until {
            Some(s) => parse_day(&s)?,
            None => first + Duration::days(6),
        };
        if last < first {
            return Err(SocialElfError::Validation(
                "--until must not be before --from".to_string(),
            ));
        }

        let filter = PostFilter {
            from: Some(day_start(&timezones, first, tz)?),
            until: Some(day_end(&timezones, last, tz)?),
            limit: Some(100),
            ..PostFilter::default()
        };
        let view = self.service.calendar(self.profile_id, filter).await?;

        for (day, posts) in view.posts_by_day() {
            println!("{}", day.format("%Y-%m-%d (%a)"));
            for post in posts {
                let time = post
                    .scheduled_for
                    .map(|at| timezones.to_local(at, tz).format("%H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "  {}  {}  {}  {}  {}",
                    time,
                    post.id,
                    post.status,
                    post.platform_names().join(","),
                    truncate_content(&post.content, 40)
                );
            }
        }
        Ok(())
    }

    /// Cancel posts concurrently; every id is attempted even when one fails
    async fn cancel(&self, post_ids: &[String]) -> Result<()> {
        let results = join_all(
            post_ids
                .iter()
                .map(|id| self.service.delete_post(self.profile_id, id)),
        )
        .await;

        let mut first_failure: Option<SocialElfError> = None;
        for (id, result) in post_ids.iter().zip(results) {
            match result {
                Ok(ack) => println!("Cancelled post {}", ack.post_id),
                Err(e) => {
                    eprintln!("Failed to cancel {}: {}", id, e);
                    first_failure.get_or_insert(e);
                }
            }
        }

        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// The narrowest listing that still contains `post`
/// Timing flags of `edit`. Exactly one may be given, and it sets the other
/// two explicitly so a draft can become scheduled and back.
fn apply_timing(
    patch: &mut PostPatch,
    scheduled_for: Option<DateTime<Utc>>,
    now: bool,
    draft: bool,
) -> Result<()> {
    match (scheduled_for, now, draft) {
        (None, false, false) => {}
        (Some(at), false, false) => {
            patch.scheduled_for = Some(at);
            patch.publish_now = Some(false);
            patch.is_draft = Some(false);
        }
        (None, true, false) => {
            patch.publish_now = Some(true);
            patch.is_draft = Some(false);
        }
        (None, false, true) => {
            patch.publish_now = Some(false);
            patch.is_draft = Some(true);
        }
        _ => return Err(timing_conflict()),
    }
    Ok(())
}

fn timing_conflict() -> SocialElfError {
    SocialElfError::Validation("--schedule, --now and --draft are mutually exclusive".to_string())
}

fn window_around(post: &Post) -> PostFilter {
    match post.scheduled_for {
        Some(at) => PostFilter {
            from: Some(at),
            until: Some(at),
            limit: Some(100),
            ..PostFilter::default()
        },
        None => PostFilter {
            status: Some(post.status),
            limit: Some(100),
            ..PostFilter::default()
        },
    }
}

fn parse_day(input: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| {
        SocialElfError::Validation(format!("Invalid date '{}'. Use YYYY-MM-DD", input))
    })
}

fn parse_time_of_day(input: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(input.trim(), "%H:%M").map_err(|_| {
        SocialElfError::Validation(format!("Invalid time '{}'. Use HH:MM", input))
    })
}

fn day_start(timezones: &TimezoneResolver, day: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    timezones.at(day, NaiveTime::from_hms_opt(0, 0, 0).unwrap_or_default(), tz)
}

fn day_end(timezones: &TimezoneResolver, day: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default();
    timezones.at(day, last_second, tz)
}

/// A bare date covers the whole local day; anything else is an absolute time
fn parse_bound(input: &str, tz: Tz, end_of_day: bool) -> Result<DateTime<Utc>> {
    let timezones = TimezoneResolver::default();
    match NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d") {
        Ok(day) if end_of_day => day_end(&timezones, day, tz),
        Ok(day) => day_start(&timezones, day, tz),
        Err(_) => timezones.parse_absolute(input, tz),
    }
}

/// Truncate content to max length with ellipsis
fn truncate_content(content: &str, max_len: usize) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    if first_line.chars().count() <= max_len && first_line.len() == content.len() {
        first_line.to_string()
    } else {
        let truncated: String = first_line.chars().take(max_len).collect();
        format!("{}...", truncated)
    }
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| SocialElfError::Validation(format!("Failed to encode output: {}", e)))
}
