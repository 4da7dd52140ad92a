use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use run_tracker_lib::{location_fix::LocationFix, stopwatch::format_stopwatch};
use run_tracker_session::{Command, StateBus, TrackerSnapshot};
use tokio_util::sync::CancellationToken;

/// One line of console input.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleLine {
    Command(Command),
    Fix(LocationFix),
    Wait(Duration),
    Status,
    Quit,
}

/// Blank lines and `#` comments give `None`.
pub fn parse_line(line: &str) -> anyhow::Result<Option<ConsoleLine>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        return Ok(None);
    };

    let parsed = match keyword.to_ascii_lowercase().as_str() {
        "start" | "resume" => ConsoleLine::Command(Command::StartOrResume),
        "pause" => ConsoleLine::Command(Command::Pause),
        "stop" => ConsoleLine::Command(Command::Stop),
        "status" => ConsoleLine::Status,
        "quit" | "exit" => ConsoleLine::Quit,
        "wait" => {
            let millis: u64 = words
                .next()
                .ok_or_else(|| anyhow!("wait needs a duration in milliseconds"))?
                .parse()
                .context("invalid wait duration")?;
            ConsoleLine::Wait(Duration::from_millis(millis))
        }
        "fix" => {
            let latitude: f64 = words
                .next()
                .ok_or_else(|| anyhow!("fix needs a latitude"))?
                .parse()
                .context("invalid latitude")?;
            let longitude: f64 = words
                .next()
                .ok_or_else(|| anyhow!("fix needs a longitude"))?
                .parse()
                .context("invalid longitude")?;

            match words.next() {
                None => ConsoleLine::Fix(LocationFix::new(latitude, longitude)),
                Some(code) => {
                    let code: i32 = code.parse().context("invalid error code")?;
                    let info = words.collect::<Vec<_>>().join(" ");
                    ConsoleLine::Fix(LocationFix {
                        latitude,
                        longitude,
                        error_code: code,
                        error_info: info,
                    })
                }
            }
        }
        other => bail!("unknown command: {}", other),
    };

    Ok(Some(parsed))
}

pub fn format_status(snapshot: &TrackerSnapshot) -> String {
    format!(
        "{:?} | {} | {} points in {} segments | {} m",
        snapshot.state,
        format_stopwatch(snapshot.elapsed_millis, true),
        snapshot.path.point_count(),
        snapshot.path.segment_count(),
        snapshot.path.distance_meters(),
    )
}

/// Prints notification changes and path growth until cancelled.
pub async fn print_updates(bus: StateBus, cancel: CancellationToken) {
    let mut notifications = bus.notification().subscribe();
    let mut paths = bus.path().subscribe();

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            Some(notification) = notifications.recv() => match notification {
                Some(notification) => println!(
                    "[{}] {} ({})",
                    notification.title,
                    notification.content_text,
                    notification.action.label()
                ),
                None => println!("[no notification]"),
            },
            Some(path) = paths.recv() => {
                if !path.is_empty() {
                    println!("path: {} points, {} m", path.point_count(), path.distance_meters());
                }
            }
            else => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_line("start").unwrap(), Some(ConsoleLine::Command(Command::StartOrResume)));
        assert_eq!(parse_line(" Resume ").unwrap(), Some(ConsoleLine::Command(Command::StartOrResume)));
        assert_eq!(parse_line("pause").unwrap(), Some(ConsoleLine::Command(Command::Pause)));
        assert_eq!(parse_line("stop").unwrap(), Some(ConsoleLine::Command(Command::Stop)));
        assert_eq!(parse_line("status").unwrap(), Some(ConsoleLine::Status));
        assert_eq!(parse_line("quit").unwrap(), Some(ConsoleLine::Quit));
        assert_eq!(parse_line("wait 250").unwrap(), Some(ConsoleLine::Wait(Duration::from_millis(250))));
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# warm up").unwrap(), None);
    }

    #[test]
    fn parses_fixes() {
        assert_eq!(
            parse_line("fix 55.67 12.56").unwrap(),
            Some(ConsoleLine::Fix(LocationFix::new(55.67, 12.56)))
        );
        assert_eq!(
            parse_line("fix 0 0 4 network location failed").unwrap(),
            Some(ConsoleLine::Fix(LocationFix::error(4, "network location failed")))
        );
    }

    #[test]
    fn rejects_bad_lines() {
        for line in ["jump", "fix 1", "fix north 2", "fix 1 2 x", "wait", "wait soon"] {
            assert!(parse_line(line).is_err(), "{line} should be rejected");
        }
    }
}
