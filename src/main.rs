//! freestream: command-line client for the FreeStream hub.
//!
//! Usage: freestream <command> [args...]

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc::UnboundedReceiver;

use freestream::admin::{NewsForm, ScheduleForm, StreamForm};
use freestream::config::Config;
use freestream::events::HubEvent;
use freestream::logging::init_logging;
use freestream::models::{ResourceKind, StreamRecord};
use freestream::resolver::UrlResolver;
use freestream::sync::RefreshOutcome;
use freestream::Hub;

const USAGE: &str = "Usage: freestream <command> [args...]

Commands:
  resolve <url>                                     Print the embed URL for a video link
  watch                                             Follow the live stream and print changes
  login <password>                                  Store the admin password
  logout                                            Forget the admin password
  stream <url> [title] [sport]                      Set the current stream
  schedule list
  schedule add <title> <date> <time> <sport> [description]
  schedule rm <id>
  news list
  news add <title> <content> [image_url]
  news rm <id>
  config [--example]                                Print the effective (or default) configuration";

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || matches!(args[0].as_str(), "-h" | "--help" | "help") {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    match run(&config, &args).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config, args: &[String]) -> Result<ExitCode> {
    let command = args[0].as_str();
    let rest = &args[1..];

    match command {
        "resolve" => {
            let url = arg(rest, 0, "url")?;
            let embed = UrlResolver::new(config.embed.resolved_host()).resolve(url);
            println!("{}", embed.url);
            println!("  platform: {}", embed.platform);
            if let Some(id) = &embed.id {
                println!("  id: {}", id);
            }
            Ok(ExitCode::SUCCESS)
        }
        "config" if rest.first().map(String::as_str) == Some("--example") => {
            print!("{}", Config::example_config());
            Ok(ExitCode::SUCCESS)
        }
        "config" => {
            let path = Config::config_path()?;
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
            Ok(ExitCode::SUCCESS)
        }
        _ => {
            let (hub, mut rx) = Hub::connect(config)?;
            let result = run_hub_command(&hub, &mut rx, command, rest).await;
            let notified = print_notices(&mut rx);
            match result {
                Err(e) if already_reported(&e, notified) => {
                    tracing::debug!("{:#}", e);
                    Ok(ExitCode::FAILURE)
                }
                other => other.map(|()| ExitCode::SUCCESS),
            }
        }
    }
}

async fn run_hub_command(
    hub: &Hub,
    rx: &mut UnboundedReceiver<HubEvent>,
    command: &str,
    rest: &[String],
) -> Result<()> {
    match (command, rest.first().map(String::as_str)) {
        ("login", _) => {
            hub.session().login(arg(rest, 0, "password")?)?;
        }
        ("logout", _) => hub.session().logout(),
        ("watch", _) => watch(hub, rx).await,
        ("stream", _) => {
            let form = StreamForm {
                url: arg(rest, 0, "url")?.to_string(),
                title: optional(rest, 1),
                sport: optional(rest, 2),
            };
            let record = hub.admin().update_stream(&form).await?;
            print_stream(&record);
        }
        ("schedule", Some("list")) => {
            refresh(hub, ResourceKind::Schedule).await?;
            for event in hub.state().schedule.get() {
                let when = match event.starts_at() {
                    Some(at) => at.format("%d.%m.%Y %H:%M").to_string(),
                    None => format!("{} {}", event.event_date, event.event_time),
                };
                println!("{:>5}  {}  {}  [{}]", event.id, when, event.title, event.sport);
                if let Some(description) = &event.description {
                    println!("       {}", description);
                }
            }
        }
        ("schedule", Some("add")) => {
            let form = ScheduleForm {
                title: arg(rest, 1, "title")?.to_string(),
                date: arg(rest, 2, "date")?.to_string(),
                time: arg(rest, 3, "time")?.to_string(),
                sport: arg(rest, 4, "sport")?.to_string(),
                description: optional(rest, 5),
            };
            hub.admin().create_schedule_event(&form).await?;
        }
        ("schedule", Some("rm")) => {
            hub.admin().delete_schedule_event(id_arg(rest)?).await?;
        }
        ("news", Some("list")) => {
            refresh(hub, ResourceKind::News).await?;
            for post in hub.state().news.get() {
                let published = post
                    .published()
                    .map(|at| at.format("%d.%m.%Y %H:%M").to_string())
                    .unwrap_or_else(|| post.published_at.clone());
                println!("{:>5}  {}  {}", post.id, published, post.title);
                println!("       {}", post.content);
            }
        }
        ("news", Some("add")) => {
            let form = NewsForm {
                title: arg(rest, 1, "title")?.to_string(),
                content: arg(rest, 2, "content")?.to_string(),
                image_url: optional(rest, 3),
            };
            hub.admin().create_news_post(&form).await?;
        }
        ("news", Some("rm")) => {
            hub.admin().delete_news_post(id_arg(rest)?).await?;
        }
        _ => bail!("Unknown command: {} {}\n\n{}", command, rest.join(" "), USAGE),
    }
    Ok(())
}

/// Follow the hub until Ctrl-C, printing the stream whenever it changes.
async fn watch(hub: &Hub, rx: &mut UnboundedReceiver<HubEvent>) {
    let sync = hub.start_sync();
    println!(
        "Watching the hub, stream refresh every {}s (Ctrl-C to stop)",
        hub.scheduler().interval().as_secs()
    );
    let mut last_url: Option<String> = None;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(HubEvent::StreamReplaced) => {
                    if let Some(record) = hub.state().stream.get() {
                        if last_url.as_deref() != Some(record.url.as_str()) {
                            last_url = Some(record.url.clone());
                            print_stream(&record);
                        }
                    }
                }
                Some(HubEvent::ScheduleReplaced { count }) => println!("Schedule: {} events", count),
                Some(HubEvent::NewsReplaced { count }) => println!("News: {} posts", count),
                Some(HubEvent::Notice(notice)) => println!("{}", notice),
                Some(HubEvent::SessionChanged { .. }) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    sync.stop().await;
}

async fn refresh(hub: &Hub, kind: ResourceKind) -> Result<()> {
    match hub.scheduler().refresh(kind).await {
        RefreshOutcome::Failed => bail!("Could not load {} from the hub", kind),
        _ => Ok(()),
    }
}

fn print_stream(record: &StreamRecord) {
    let live = if record.is_live { "LIVE" } else { "offline" };
    println!("[{}] {}", live, record.title);
    if let Some(sport) = &record.sport {
        println!("  sport: {}", sport);
    }
    println!("  {}", record.url);
}

/// Print pending notices. Returns whether any of them was an error.
fn print_notices(rx: &mut UnboundedReceiver<HubEvent>) -> bool {
    let mut reported_error = false;
    while let Ok(event) = rx.try_recv() {
        if let HubEvent::Notice(notice) = event {
            if notice.is_error() {
                reported_error = true;
                eprintln!("{}", notice);
            } else {
                println!("{}", notice);
            }
        }
    }
    reported_error
}

/// Hub errors always come with an error notice; printing them again would duplicate it.
fn already_reported(error: &anyhow::Error, notified: bool) -> bool {
    notified && error.is::<freestream::Error>()
}

fn arg<'a>(rest: &'a [String], index: usize, name: &str) -> Result<&'a str> {
    rest.get(index)
        .map(String::as_str)
        .with_context(|| format!("Missing argument <{}>\n\n{}", name, USAGE))
}

fn optional(rest: &[String], index: usize) -> String {
    rest.get(index).cloned().unwrap_or_default()
}

fn id_arg(rest: &[String]) -> Result<i64> {
    let raw = arg(rest, 1, "id")?;
    raw.parse().with_context(|| format!("Invalid id: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notified_hub_errors_are_not_printed_twice() {
        let error = anyhow::Error::from(freestream::Error::Transport("offline".to_string()));
        assert!(already_reported(&error, true));
        assert!(!already_reported(&error, false));
    }

    #[test]
    fn test_cli_errors_are_always_printed() {
        let error = arg(&[], 0, "url").unwrap_err();
        assert!(!already_reported(&error, true));
    }
}
