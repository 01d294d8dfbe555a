use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::{
    daemon::storage::{
        entities::SessionEntity,
        session_store::{JsonSessionStore, SessionStore},
    },
    utils::dir::create_application_default_path,
};

/// Fixed export target, written into the current directory.
pub const EXPORT_FILE: &str = "time_sessions.csv";

#[derive(Debug, Parser)]
pub struct ExportCommand {
    #[arg(long, help = "Application directory override")]
    dir: Option<PathBuf>,
}

pub async fn process_export_command(command: ExportCommand) -> Result<()> {
    let dir = command.dir.map_or_else(create_application_default_path, Ok)?;
    let store = JsonSessionStore::new(dir.join("sessions"))?;
    let sessions = store.list_sessions().await?;

    tokio::fs::write(EXPORT_FILE, sessions_to_csv(&sessions)).await?;
    println!("Exported {} sessions to {EXPORT_FILE}", sessions.len());
    Ok(())
}

fn sessions_to_csv(sessions: &[SessionEntity]) -> String {
    let mut output = String::from("Date,Active Time,Idle Time\n");
    for session in sessions {
        output.push_str(&format!(
            "{},{:.2},{:.2}\n",
            session.date, session.active_hours, session.idle_hours
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_shape() {
        let sessions = vec![
            SessionEntity::new("2024-01-01 09:00:00".into(), 0.5, 0.1),
            SessionEntity::new("2024-01-01 10:00:00".into(), 1.5, 0.25),
        ];

        let csv = sessions_to_csv(&sessions);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Date,Active Time,Idle Time"));
        assert_eq!(lines.next(), Some("2024-01-01 09:00:00,0.50,0.10"));
        assert_eq!(lines.next(), Some("2024-01-01 10:00:00,1.50,0.25"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_csv_of_empty_log_is_just_the_header() {
        assert_eq!(sessions_to_csv(&[]), "Date,Active Time,Idle Time\n");
    }
}
