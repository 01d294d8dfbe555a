use std::{fmt::Display, path::PathBuf};

use ansi_term::Colour::{Green, Red};
use anyhow::Result;
use chrono::{DateTime, Local};
use chrono_english::parse_date_string;
use clap::{Parser, ValueEnum};
use now::DateTimeNow;

use crate::{
    daemon::storage::{
        entities::SessionEntity,
        session_store::{JsonSessionStore, SessionStore},
    },
    utils::{
        dir::create_application_default_path,
        time::{next_day_start, parse_session_date},
    },
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long = "date",
        short,
        help = "Day to report on. Examples are \"yesterday\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long = "date-style", default_value_t = DateStyle::Uk, help = "Disambiguates numeric dates")]
    date_style: DateStyle,
    #[arg(long, help = "Application directory override")]
    dir: Option<PathBuf>,
}

pub async fn process_report_command(command: ReportCommand) -> Result<()> {
    let dir = command.dir.map_or_else(create_application_default_path, Ok)?;
    let store = JsonSessionStore::new(dir.join("sessions"))?;
    let sessions = store.list_sessions().await?;

    let day_start = match &command.date {
        Some(text) => parse_date_string(text, Local::now(), command.date_style.into())?
            .beginning_of_day(),
        None => Local::now().beginning_of_day(),
    };
    let day_end = next_day_start(day_start);

    match day_totals(&sessions, day_start, day_end) {
        Some(last) => {
            println!("{}", day_start.format("%Y-%m-%d"));
            println!(
                "  {} {:.2} hours",
                Green.paint("Active:"),
                last.active_hours
            );
            println!("  {} {:.2} hours", Red.paint("Idle:"), last.idle_hours);
            println!("  Last snapshot at {}", last.date);
        }
        None => {
            println!("No sessions recorded on {}", day_start.format("%Y-%m-%d"));
        }
    }
    Ok(())
}

/// Snapshots are cumulative, so a day's totals are its last snapshot.
fn day_totals(
    sessions: &[SessionEntity],
    from: DateTime<Local>,
    to: DateTime<Local>,
) -> Option<&SessionEntity> {
    sessions
        .iter()
        .filter(|s| match parse_session_date(&s.date) {
            Ok(taken) => taken >= from.naive_local() && taken < to.naive_local(),
            // skip records with unreadable dates instead of failing the report
            Err(_) => false,
        })
        .max_by(|a, b| a.date.cmp(&b.date))
}
