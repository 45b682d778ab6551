//! Staff administration panel: backfill action, result banner, roster table.
//!
//! Every action handler here is an error boundary. Failures are logged and
//! shown to the user; the panel and its roster subscription keep running.

use crate::{
    backfill::{self, Outcome, Report, RunState, Runner},
    config::Config,
    interaction::Interaction,
    roster::{self, DeleteOutcome, EditOutcome, RosterView},
};
use itertools::Itertools;
use staff_db::{models::StaffRow, Backend};
use std::{fmt, sync::Arc};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Banner {
    Done(Report),
    Error(String),
}

impl fmt::Display for Banner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Banner::Done(Report { processed, batches }) => write!(
                f,
                "Done. Processed {processed} teachers in {batches} batch{}.",
                if *batches == 1 { "" } else { "es" }
            ),
            Banner::Error(message) => write!(f, "Error: {message}"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("configuring backfill: {0}")]
    Backfill(#[from] backfill::Error),
    #[error("opening roster: {0}")]
    Roster(#[from] roster::Error),
}

pub struct Panel {
    runner: Arc<Runner>,
    roster: RosterView,
    interaction: Arc<dyn Interaction>,
    banner: Option<Banner>,
}

impl Panel {
    pub async fn open(
        backend: Arc<dyn Backend>,
        interaction: Arc<dyn Interaction>,
        config: &Config,
    ) -> Result<Self, Error> {
        let runner = Runner::new(
            backend.clone(),
            interaction.clone(),
            config.backfill.clone(),
        )?;
        let roster =
            RosterView::open(backend, interaction.clone(), config.roster.clone()).await?;
        Ok(Self {
            runner: Arc::new(runner),
            roster,
            interaction,
            banner: None,
        })
    }

    pub fn roster(&self) -> &RosterView {
        &self.roster
    }

    pub fn roster_mut(&mut self) -> &mut RosterView {
        &mut self.roster
    }

    pub fn runner(&self) -> Arc<Runner> {
        self.runner.clone()
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn button_label(&self) -> &'static str {
        match self.runner.state() {
            RunState::Idle => "Backfill staff from teachers",
            RunState::Running => "Backfilling…",
        }
    }

    pub fn button_enabled(&self) -> bool {
        self.runner.state() == RunState::Idle
    }

    pub async fn backfill(&mut self) {
        match self.runner.run().await {
            Ok(Outcome::Completed(report)) => self.banner = Some(Banner::Done(report)),
            Ok(Outcome::Cancelled) | Ok(Outcome::AlreadyRunning) => (),
            Err(err) => {
                tracing::error!("Backfill failed: {err}");
                self.banner = Some(Banner::Error(err.to_string()));
            }
        }
    }

    /// Resolves a 1-based row number from the rendered table, or returns the
    /// input as a record id.
    pub fn resolve(&self, target: &str) -> String {
        let target = target.trim();
        target
            .parse::<usize>()
            .ok()
            .and_then(|number| number.checked_sub(1))
            .and_then(|index| self.roster.rows().get(index).map(|row| row.id.clone()))
            .unwrap_or_else(|| target.to_owned())
    }

    pub async fn edit(&self, target: &str) -> Option<EditOutcome> {
        let id = self.resolve(target);
        match self.roster.edit(&id).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::error!("Edit failed: {err}");
                self.interaction.notify(&format!("Update failed: {err}"));
                None
            }
        }
    }

    pub async fn delete(&self, target: &str) -> Option<DeleteOutcome> {
        let id = self.resolve(target);
        match self.roster.delete(&id).await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::error!("Delete failed: {err}");
                self.interaction.notify(&format!("Delete failed: {err}"));
                None
            }
        }
    }

    pub fn render(&self) -> String {
        let button = if self.button_enabled() {
            format!("[ {} ]", self.button_label())
        } else {
            format!("( {} )", self.button_label())
        };
        let mut out = format!("Staff    {button}\n");
        if let Some(banner) = &self.banner {
            out.push_str(&format!("{banner}\n"));
        }
        out.push('\n');
        out.push_str(&render_table(&self.roster.rows()));
        out
    }

    pub async fn close(self) {
        self.roster.close().await;
    }
}

const HEADERS: [&str; 7] = ["#", "Name", "USN", "Email", "Department", "Phone", "Created"];

fn render_table(rows: &[StaffRow]) -> String {
    if rows.is_empty() {
        return "No staff records.\n".to_owned();
    }
    let cells = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_owned());
            [
                (index + 1).to_string(),
                text(&row.name),
                text(&row.usn),
                text(&row.email),
                text(&row.department),
                text(&row.phone),
                row.created_at
                    .map(|created| created.strftime("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_owned()),
            ]
        })
        .collect_vec();
    let widths = (0..HEADERS.len())
        .map(|column| {
            cells
                .iter()
                .map(|row| row[column].chars().count())
                .chain(std::iter::once(HEADERS[column].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect_vec();
    let mut out = format_line(HEADERS.iter().copied(), &widths);
    out.push('\n');
    for row in &cells {
        out.push_str(&format_line(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out
}

fn format_line<'a>(values: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    values
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .join("  ")
        .trim_end()
        .to_owned()
}
