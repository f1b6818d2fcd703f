//! elf-post - Create a post for one or more social networks

use std::io::Read;

use clap::Parser;
use libsocialelf::logging::init_cli;
use libsocialelf::platforms::youtube::split_tags;
use libsocialelf::platforms::{
    InstagramContentType, InstagramOptions, PlatformOptions, TwitterOptions, YoutubeOptions,
};
use libsocialelf::scheduling::parse_schedule;
use libsocialelf::types::MediaItem;
use libsocialelf::{Platform, Post, PostDraft, Result, SocialElfError, SocialElfService};

#[derive(Parser, Debug)]
#[command(name = "elf-post")]
#[command(version)]
#[command(about = "Create a post for one or more social networks")]
#[command(long_about = "\
elf-post - Create a post for one or more social networks

DESCRIPTION:
    elf-post hands one post to the posting provider for every selected
    platform in a single request. The post is published immediately,
    saved as a draft, or scheduled for later. Accounts are looked up from
    the profile's connected accounts; a platform without a connected
    account stops the whole post.

USAGE EXAMPLES:
    # Publish now to two networks
    elf-post \"Hello world\" --platform twitter,linkedin --now

    # Schedule for tomorrow morning in your profile's timezone
    elf-post \"Launch day\" --platform facebook --schedule \"tomorrow 9am\"

    # Read content from stdin and save a draft
    echo \"Draft text\" | elf-post --platform linkedin --draft

    # A twitter thread
    elf-post \"1/ Big news\" --platform twitter --now \\
        --thread \"2/ More details\" --thread \"3/ The end\"

    # An Instagram reel with a cover image
    elf-post \"Behind the scenes\" --platform instagram --now \\
        --media https://cdn.example.com/clip.mp4 \\
        --ig-type reel --ig-thumbnail https://cdn.example.com/cover.jpg

SCHEDULE FORMATS:
    30m, 2h, +1day, in 45m         Relative to now
    2030-06-01 09:00               Wall clock time in the profile's timezone
    2030-06-01T09:00:00Z           RFC 3339 with its own offset
    friday 3pm, tomorrow           Natural language

CONFIGURATION:
    Configuration file: ~/.config/socialelf/config.toml
    API key: read from SOCIALELF_API_KEY (or provider.api_key_env)

    Override with environment variables:
        SOCIALELF_CONFIG   - Path to config file
        SOCIALELF_PROFILE  - Profile to post as

EXIT CODES:
    0 - Success
    1 - Provider or configuration error
    2 - Account not connected
    3 - Invalid input (empty content, bad platform, bad schedule, etc.)
")]
struct Cli {
    /// Content to post (reads from stdin if not provided)
    content: Option<String>,

    /// Target platform(s), comma-separated
    #[arg(short, long, value_delimiter = ',', required = true)]
    platform: Vec<String>,

    /// Profile to post as
    #[arg(long, env = "SOCIALELF_PROFILE")]
    profile: Option<String>,

    /// Save as draft without scheduling
    #[arg(short, long)]
    draft: bool,

    /// Publish immediately
    #[arg(short, long)]
    now: bool,

    /// When to publish (e.g. "2h", "tomorrow 9am", "2030-06-01 09:00")
    #[arg(short, long, value_name = "WHEN")]
    schedule: Option<String>,

    /// Media URL to attach (repeatable)
    #[arg(short, long, value_name = "URL")]
    media: Vec<String>,

    /// Tag to attach (repeatable)
    #[arg(short, long)]
    tag: Vec<String>,

    /// Follow-up tweet; the post content is always the first tweet (repeatable)
    #[arg(long, value_name = "TEXT")]
    thread: Vec<String>,

    /// Instagram content type: post, story, reel, or carousel
    #[arg(long, value_name = "TYPE")]
    ig_type: Option<String>,

    /// Instagram collaborator handle (repeatable, max 3)
    #[arg(long, value_name = "HANDLE")]
    ig_collaborator: Vec<String>,

    /// Instagram reel cover image URL
    #[arg(long, value_name = "URL")]
    ig_thumbnail: Option<String>,

    /// YouTube video title (defaults to the content)
    #[arg(long)]
    yt_title: Option<String>,

    /// YouTube first comment
    #[arg(long)]
    yt_first_comment: Option<String>,

    /// YouTube tags, comma-separated
    #[arg(long)]
    yt_tags: Option<String>,

    /// YouTube thumbnail URL
    #[arg(long, value_name = "URL")]
    yt_thumbnail: Option<String>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_cli(cli.verbose);

    if let Err(e) = run(cli).await {
        report(&e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let content = match &cli.content {
        Some(content) => content.clone(),
        None => read_stdin()?,
    };
    let platforms = parse_platforms(&cli.platform)?;
    let options = platforms
        .iter()
        .map(|platform| build_options(*platform, &cli, &content))
        .collect::<Result<Vec<_>>>()?;

    let service = SocialElfService::new()?;
    let profile_id = service.config().select_profile(cli.profile.as_deref())?;

    let mut draft = PostDraft::new(content).with_tags(cli.tag.iter().cloned());
    draft.platforms = options;
    draft.media_items = cli.media.iter().map(MediaItem::from_url).collect();
    draft.is_draft = cli.draft;
    draft.publish_now = cli.now;
    if let Some(when) = &cli.schedule {
        let acting = service.scheduling().acting(&profile_id).await?;
        draft.scheduled_for = Some(parse_schedule(when, acting.timezone)?);
    }

    let post = service.create_post(&profile_id, draft).await?;

    if cli.format == "json" {
        let json = serde_json::to_string_pretty(&post)
            .map_err(|e| SocialElfError::Validation(format!("Failed to encode post: {}", e)))?;
        println!("{}", json);
    } else {
        println!("{}", post.id);
        eprintln!("{}", describe(&service, &profile_id, &post).await);
    }
    Ok(())
}

fn read_stdin() -> Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .read_to_string(&mut buffer)
        .map_err(|e| SocialElfError::Validation(format!("Failed to read stdin: {}", e)))?;
    Ok(buffer.trim_end_matches('\n').to_string())
}

fn parse_platforms(raw: &[String]) -> Result<Vec<Platform>> {
    raw.iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::parse)
        .collect()
}

/// Platform options from the per-platform flags
fn build_options(platform: Platform, cli: &Cli, content: &str) -> Result<PlatformOptions> {
    let options = match platform {
        Platform::Twitter => PlatformOptions::Twitter(TwitterOptions {
            thread: (!cli.thread.is_empty()).then(|| {
                std::iter::once(content.to_string())
                    .chain(cli.thread.iter().cloned())
                    .collect()
            }),
        }),
        Platform::Instagram => PlatformOptions::Instagram(InstagramOptions {
            content_type: cli
                .ig_type
                .as_deref()
                .map(str::parse::<InstagramContentType>)
                .transpose()
                .map_err(SocialElfError::Validation)?,
            collaborators: cli.ig_collaborator.clone(),
            thumbnail: cli.ig_thumbnail.clone(),
        }),
        Platform::Youtube => PlatformOptions::Youtube(YoutubeOptions {
            title: cli.yt_title.clone(),
            first_comment: cli.yt_first_comment.clone(),
            tags: cli.yt_tags.as_deref().map(split_tags).unwrap_or_default(),
            thumbnail: cli.yt_thumbnail.clone(),
        }),
        other => PlatformOptions::bare(other),
    };
    Ok(options)
}

async fn describe(service: &SocialElfService, profile_id: &str, post: &Post) -> String {
    match post.scheduled_for {
        Some(at) => {
            let timezones = service.scheduling().timezones();
            let tz = match service.scheduling().acting(profile_id).await {
                Ok(acting) => acting.timezone,
                Err(_) => timezones.default_zone(),
            };
            format!(
                "{} for {} on {}",
                post.status,
                timezones.format_local(at, tz),
                post.platform_names().join(", ")
            )
        }
        None => format!("{} on {}", post.status, post.platform_names().join(", ")),
    }
}

fn report(error: &SocialElfError) {
    eprintln!("Error: {}", error);
    if let SocialElfError::Connection(failure) = error {
        for hint in &failure.troubleshooting {
            eprintln!("  - {}", hint);
        }
    }
}
