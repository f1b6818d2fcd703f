//! elf-connect - Connect social accounts to a profile
//!
//! Drives the authorization round trip: `start` hands out the URL to open,
//! `callback` finishes the flow from the URL the browser came back to.

use std::io::{BufRead, Write};

use clap::{Parser, Subcommand};
use libsocialelf::connection::{CallbackOutcome, CallbackParams};
use libsocialelf::logging::init_cli;
use libsocialelf::provider::FacebookPage;
use libsocialelf::{Platform, Result, SocialElfError, SocialElfService};

#[derive(Parser, Debug)]
#[command(name = "elf-connect")]
#[command(version)]
#[command(about = "Connect social accounts to a profile")]
#[command(long_about = "\
elf-connect - Connect social accounts to a profile

DESCRIPTION:
    elf-connect links social network accounts to a SocialElf profile. Start
    a connection, open the printed URL in a browser, authorize, then pass
    the URL the browser was sent back to into `elf-connect callback`.

    Facebook connects a page rather than a personal profile: after the
    callback you choose one of the pages you manage, either with --page or
    from the numbered list.

COMMANDS:
    start       Begin connecting a platform
    callback    Finish a connection from the callback URL
    list        List connected accounts
    disconnect  Remove a connected account

USAGE EXAMPLES:
    # Connect twitter
    elf-connect start twitter
    elf-connect callback twitter \"https://app.example.com/api/profiles/main/connect/twitter/callback?state=...\"

    # Connect a Facebook page without prompting
    elf-connect callback facebook \"<CALLBACK_URL>\" --page 1234567890

    # Show connected accounts as JSON
    elf-connect list --format json

CONFIGURATION:
    Configuration file: ~/.config/socialelf/config.toml
    API key: read from SOCIALELF_API_KEY (or provider.api_key_env)
    Facebook app secret: read from FACEBOOK_APP_SECRET (or oauth.facebook.app_secret_env)

    Override with environment variables:
        SOCIALELF_CONFIG   - Path to config file
        SOCIALELF_PROFILE  - Profile to connect accounts to

EXIT CODES:
    0 - Success
    1 - Provider or configuration error
    2 - Connection failed (denied, expired state, no pages, etc.)
    3 - Invalid input (bad platform, malformed URL, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Profile to connect accounts to
    #[arg(long, global = true, env = "SOCIALELF_PROFILE")]
    profile: Option<String>,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Begin connecting a platform
    Start {
        platform: String,

        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Finish a connection from the URL the browser returned to
    Callback {
        platform: String,

        /// Full callback URL, including its query string
        callback_url: String,

        /// Facebook page to connect; prompts when omitted
        #[arg(long, value_name = "PAGE_ID")]
        page: Option<String>,
    },

    /// List connected accounts
    List {
        /// Output format
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Remove a connected account
    Disconnect { account_id: String },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_cli(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        if let SocialElfError::Connection(failure) = &e {
            for hint in &failure.troubleshooting {
                eprintln!("  - {}", hint);
            }
        }
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let service = SocialElfService::new()?;
    let profile_id = service.config().select_profile(cli.profile.as_deref())?;

    match cli.command {
        Commands::Start { platform, format } => {
            let platform: Platform = platform.parse()?;
            let start = service.initiate_connection(&profile_id, platform).await?;
            if format == "json" {
                println!("{}", to_pretty(&start)?);
            } else {
                println!("{}", start.auth_url);
                eprintln!("Open the URL above to authorize {}.", platform);
                eprintln!("Then run: elf-connect callback {} \"<CALLBACK_URL>\"", platform);
            }
        }
        Commands::Callback {
            platform,
            callback_url,
            page,
        } => {
            let platform: Platform = platform.parse()?;
            let params = CallbackParams::from_url(&callback_url)?;
            match service
                .complete_connection_callback(&profile_id, platform, &params)
                .await?
            {
                CallbackOutcome::Connected { platform, username } => {
                    println!("Connected {} as {}", platform, username);
                }
                CallbackOutcome::PageSelectionRequired { temp_token, .. } => {
                    select_page(&service, &profile_id, &temp_token, page.as_deref()).await?;
                }
            }
        }
        Commands::List { format } => {
            let accounts = service.list_connections(&profile_id).await?;
            if format == "json" {
                println!("{}", to_pretty(&accounts)?);
            } else {
                for account in &accounts {
                    println!(
                        "{} | {} | {}{}",
                        account.id,
                        account.platform,
                        account.label(),
                        if account.is_active { "" } else { " (inactive)" }
                    );
                }
            }
        }
        Commands::Disconnect { account_id } => {
            service.disconnect(&profile_id, &account_id).await?;
            println!("Disconnected {}", account_id);
        }
    }

    Ok(())
}

/// List the user's pages and connect the chosen one in this same process
async fn select_page(
    service: &SocialElfService,
    profile_id: &str,
    temp_token: &str,
    requested: Option<&str>,
) -> Result<()> {
    let listing = service.list_connectable_pages(profile_id, temp_token).await?;
    if listing.pages.is_empty() {
        eprintln!("No Facebook pages are available to connect.");
        for hint in &listing.troubleshooting {
            eprintln!("  - {}", hint);
        }
        return Err(SocialElfError::NotFound(
            "Facebook pages for this account; start the connection again once fixed".to_string(),
        ));
    }

    let page_id = match requested {
        Some(id) => id.to_string(),
        None => prompt_for_page(&listing.pages)?,
    };
    let connection = service
        .finalize_connection(profile_id, &page_id, temp_token)
        .await?;

    let label = connection
        .account
        .as_ref()
        .map(|account| account.label().to_string())
        .or_else(|| {
            listing
                .pages
                .iter()
                .find(|p| p.id == page_id)
                .map(|p| p.name.clone())
        })
        .unwrap_or(page_id);
    println!("Connected facebook page {}", label);
    Ok(())
}

fn prompt_for_page(pages: &[FacebookPage]) -> Result<String> {
    eprintln!("Choose a Facebook page:");
    for (i, page) in pages.iter().enumerate() {
        match &page.category {
            Some(category) => eprintln!("  {}) {} [{}]", i + 1, page.name, category),
            None => eprintln!("  {}) {}", i + 1, page.name),
        }
    }
    eprint!("Page number: ");
    let _ = std::io::stderr().flush();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| SocialElfError::Validation(format!("Failed to read choice: {}", e)))?;
    pick_page(pages, &line)
}

fn pick_page(pages: &[FacebookPage], answer: &str) -> Result<String> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(SocialElfError::Validation(
            "No page selected. Pass --page or enter a number".to_string(),
        ));
    }
    answer
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| pages.get(i))
        .map(|page| page.id.clone())
        .ok_or_else(|| {
            SocialElfError::Validation(format!(
                "Invalid choice '{}'. Enter a number from 1 to {}",
                answer,
                pages.len()
            ))
        })
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| SocialElfError::Validation(format!("Failed to encode output: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages() -> Vec<FacebookPage> {
        vec![
            FacebookPage {
                id: "111".to_string(),
                name: "Bakery".to_string(),
                category: Some("Food".to_string()),
            },
            FacebookPage {
                id: "222".to_string(),
                name: "Book Club".to_string(),
                category: None,
            },
        ]
    }

    #[test]
    fn test_pick_page_by_number() {
        assert_eq!(pick_page(&pages(), "2\n").unwrap(), "222");
        assert_eq!(pick_page(&pages(), " 1 ").unwrap(), "111");
    }

    #[test]
    fn test_pick_page_rejects_out_of_range() {
        assert!(pick_page(&pages(), "0").is_err());
        assert!(pick_page(&pages(), "3").is_err());
        assert!(pick_page(&pages(), "bakery").is_err());
        assert!(matches!(
            pick_page(&pages(), ""),
            Err(SocialElfError::Validation(_))
        ));
    }
}
