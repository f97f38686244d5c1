//! Read-only statistics over already-fetched projects.
//!
//! Everything here is a pure function of its input: nothing is cached
//! between calls and no collaborator is consulted.

use chrono::{DateTime, Datelike, Duration, TimeZone};
use serde::Serialize;

use crate::lifecycle::{is_phase_complete, phase_tally};
use crate::types::{Phase, Project, Task, TaskStatus};

pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

const PHASE_LABEL_MAX: usize = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct UserTotals {
    pub completed: usize,
    pub backlog: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub label: &'static str,
    pub count: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PhaseBreakdown {
    pub phase_id: String,
    pub label: String,
    pub completed: usize,
    /// Pending and in-progress tasks.
    pub pending: usize,
    pub backlog: usize,
    pub total: usize,
    /// Every task done; an empty phase is never complete.
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub progress: u8,
    pub member_count: usize,
    pub streak: u32,
}

fn all_tasks(projects: &[Project]) -> impl Iterator<Item = &Task> {
    projects.iter().flat_map(|project| project.tasks())
}

/// Rounds half up; an empty project is 0%.
pub fn percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    ((completed * 200 + total) / (total * 2)) as u8
}

pub fn project_progress(project: &Project) -> u8 {
    let total = project.tasks().count();
    let completed = project.tasks().filter(|t| t.status.is_completed()).count();
    percentage(completed, total)
}

pub fn user_totals(projects: &[Project]) -> UserTotals {
    all_tasks(projects).fold(UserTotals::default(), |mut totals, task| {
        if task.status.is_completed() {
            totals.completed += 1;
        }
        if task.has_blocker() {
            totals.backlog += 1;
        }
        totals
    })
}

/// Completed tasks per weekday over `[now - 6 days, now]`, always Monday
/// first.
///
/// Weekdays are taken in `now`'s time zone. Timestamps that fail to parse or
/// fall outside the window are skipped.
pub fn weekly_activity<Tz: TimeZone>(projects: &[Project], now: &DateTime<Tz>) -> [DayActivity; 7] {
    let tz = now.timezone();
    let start = now.clone() - Duration::days(6);

    let mut counts = [0u32; 7];
    for task in all_tasks(projects) {
        let TaskStatus::Completed(submission) = &task.status else {
            continue;
        };
        let Ok(completed_at) = DateTime::parse_from_rfc3339(submission.completed_at.trim()) else {
            continue;
        };
        let completed_at = completed_at.with_timezone(&tz);
        if completed_at > *now || completed_at < start {
            continue;
        }
        counts[completed_at.weekday().num_days_from_monday() as usize] += 1;
    }

    std::array::from_fn(|i| DayActivity {
        label: WEEKDAY_LABELS[i],
        count: counts[i],
    })
}

pub fn phase_label(title: &str) -> String {
    if title.chars().count() > PHASE_LABEL_MAX {
        let head: String = title.chars().take(PHASE_LABEL_MAX).collect();
        format!("{head}...")
    } else {
        title.to_string()
    }
}

pub fn phase_breakdown(phase: &Phase) -> PhaseBreakdown {
    let (completed, total) = phase_tally(phase);
    let mut row = PhaseBreakdown {
        phase_id: phase.id.clone(),
        label: phase_label(&phase.title),
        completed,
        pending: 0,
        backlog: 0,
        total,
        complete: is_phase_complete(phase),
    };
    for task in &phase.tasks {
        if matches!(task.status, TaskStatus::Pending | TaskStatus::InProgress) {
            row.pending += 1;
        }
        if task.has_blocker() {
            row.backlog += 1;
        }
    }
    row
}

pub fn project_breakdown(project: &Project) -> Vec<PhaseBreakdown> {
    project.phases.iter().map(phase_breakdown).collect()
}

pub fn summarize(project: &Project) -> ProjectSummary {
    ProjectSummary {
        id: project.id.clone(),
        name: project.name.clone(),
        description: project.description.clone(),
        progress: project_progress(project),
        member_count: project.members.len(),
        streak: project.streak,
    }
}
