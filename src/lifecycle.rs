//! Task and phase state rules.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{EntityKind, TrackerError, TrackerResult};
use crate::types::{Phase, Project, Submission, Task, TaskDraft, TaskStatus, WorkState};

/// Fields a member fills in when handing in a task.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct SubmissionInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub blocker_note: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub proof_image_ref: Option<String>,
}

pub fn new_id() -> String {
    Ulid::new().to_string()
}

/// A phase with no tasks is never complete.
pub fn is_phase_complete(phase: &Phase) -> bool {
    if phase.tasks.is_empty() {
        return false;
    }
    phase.tasks.iter().all(|task| task.status.is_completed())
}

/// `(completed, total)` for a phase header.
pub fn phase_tally(phase: &Phase) -> (usize, usize) {
    let done = phase.tasks.iter().filter(|t| t.status.is_completed()).count();
    (done, phase.tasks.len())
}

/// Builds a pending task for `project` from a manual draft.
pub fn build_task(project: &Project, draft: TaskDraft) -> TrackerResult<Task> {
    let title = draft.title.trim();
    if title.is_empty() {
        return Err(TrackerError::missing_field("title"));
    }
    let assignee_id = match draft.assignee_id {
        Some(id) if !id.trim().is_empty() => id,
        _ => project.owner_id.clone(),
    };
    if !project.is_member(&assignee_id) {
        return Err(TrackerError::Validation(format!(
            "assignee {assignee_id} is not a member of project {}",
            project.id
        )));
    }
    Ok(Task {
        id: new_id(),
        title: title.to_string(),
        description: draft.description,
        status: TaskStatus::Pending,
        assignee_id,
        due_date: draft.due_date,
    })
}

pub fn add_task(project: &mut Project, phase_id: &str, draft: TaskDraft) -> TrackerResult<Task> {
    if project.phase(phase_id).is_none() {
        return Err(TrackerError::not_found(EntityKind::Phase, phase_id));
    }
    let task = build_task(project, draft)?;
    if let Some(phase) = project.phase_mut(phase_id) {
        phase.tasks.push(task.clone());
    }
    Ok(task)
}

/// Removing an absent task is not an error. Returns whether anything was removed.
pub fn delete_task(phase: &mut Phase, task_id: &str) -> bool {
    let before = phase.tasks.len();
    phase.tasks.retain(|t| t.id != task_id);
    phase.tasks.len() != before
}

/// The completed status a submission produces, stamped with `now`.
pub fn completion_status(input: SubmissionInput, now: DateTime<Utc>) -> TaskStatus {
    TaskStatus::Completed(Submission {
        completed_at: now.to_rfc3339(),
        proof_image_ref: input.proof_image_ref.filter(|r| !r.trim().is_empty()),
        notes: input.notes,
        description: input.description,
        blocker_note: input.blocker_note,
    })
}

/// Marks `task` completed together with its submission in one assignment.
pub fn submit_task(task: &mut Task, input: SubmissionInput, now: DateTime<Utc>) {
    task.status = completion_status(input, now);
}

/// Moves `task` to a non-completed state. Leaving `Completed` discards the
/// submission. Returns the previous status.
pub fn set_work_state(task: &mut Task, state: WorkState) -> TaskStatus {
    std::mem::replace(&mut task.status, state.into())
}

/// Rejects a completed status that lacks its timestamp.
pub fn check_status(status: &TaskStatus) -> TrackerResult<()> {
    match status {
        TaskStatus::Completed(submission) if submission.completed_at.trim().is_empty() => Err(
            TrackerError::Validation("completed tasks need a completion timestamp".to_string()),
        ),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::User;

    fn project() -> Project {
        let mut phase = Phase::new("ph1", "Month 1");
        phase.tasks = vec![Task {
            id: "t1".to_string(),
            title: "Initialize Repo".to_string(),
            description: "Setup Next.js".to_string(),
            status: TaskStatus::Pending,
            assignee_id: "u1".to_string(),
            due_date: None,
        }];
        Project {
            id: "p1".to_string(),
            name: "Shop".to_string(),
            description: "A store".to_string(),
            repo_url: None,
            owner_id: "u1".to_string(),
            members: vec![User::new("u1", "alex_dev"), User::new("u2", "sarah_code")],
            created_at: "2026-10-01T00:00:00Z".to_string(),
            mode: None,
            skill_level: None,
            streak: 0,
            phases: vec![phase],
        }
    }

    fn now() -> DateTime<Utc> {
        "2026-10-14T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn empty_phase_is_not_complete() {
        assert!(!is_phase_complete(&Phase::new("ph1", "Month 1")));
    }

    #[test]
    fn phase_completion_needs_every_task() {
        let mut p = project();
        for title in ["b", "c"] {
            add_task(&mut p, "ph1", TaskDraft { title: title.to_string(), ..Default::default() }).unwrap();
        }
        let phase = &mut p.phases[0];
        let ids: Vec<String> = phase.tasks.iter().map(|t| t.id.clone()).collect();
        for id in &ids[..2] {
            submit_task(phase.task_mut(id).unwrap(), SubmissionInput::default(), now());
        }
        assert_eq!(phase_tally(phase), (2, 3));
        assert!(!is_phase_complete(phase));

        submit_task(phase.task_mut(&ids[2]).unwrap(), SubmissionInput::default(), now());
        assert!(is_phase_complete(phase));
    }

    #[test]
    fn added_task_defaults_to_pending_and_owner() {
        let mut p = project();
        let task = add_task(
            &mut p,
            "ph1",
            TaskDraft {
                title: "  Database Schema ".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(task.title, "Database Schema");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.assignee_id, "u1");
        assert_eq!(p.phases[0].tasks.len(), 2);
        assert_ne!(task.id, "t1");
    }

    #[test]
    fn added_task_rejects_blank_title_and_outsiders() {
        let mut p = project();
        let blank = add_task(&mut p, "ph1", TaskDraft { title: " ".to_string(), ..Default::default() });
        assert!(matches!(blank, Err(TrackerError::Validation(_))));

        let outsider = add_task(
            &mut p,
            "ph1",
            TaskDraft {
                title: "Deploy".to_string(),
                assignee_id: Some("u9".to_string()),
                ..Default::default()
            },
        );
        assert!(matches!(outsider, Err(TrackerError::Validation(_))));

        let missing = add_task(&mut p, "nope", TaskDraft { title: "x".to_string(), ..Default::default() });
        assert!(matches!(missing, Err(TrackerError::NotFound { kind: EntityKind::Phase, .. })));
        assert_eq!(p.phases[0].tasks.len(), 1);
    }

    #[test]
    fn delete_is_idempotent() {
        let mut p = project();
        assert!(delete_task(&mut p.phases[0], "t1"));
        assert!(!delete_task(&mut p.phases[0], "t1"));
        assert!(p.phases[0].tasks.is_empty());
    }

    #[test]
    fn submit_sets_status_and_metadata_together() {
        let mut p = project();
        let task = p.phases[0].task_mut("t1").unwrap();
        submit_task(
            task,
            SubmissionInput {
                description: "Repo is up".to_string(),
                blocker_note: "Need Stripe keys".to_string(),
                notes: "used pnpm".to_string(),
                proof_image_ref: Some("  ".to_string()),
            },
            now(),
        );
        let submission = task.status.submission().unwrap();
        assert_eq!(submission.completed_at, now().to_rfc3339());
        assert_eq!(submission.description, "Repo is up");
        assert_eq!(submission.proof_image_ref, None);
        assert!(task.has_blocker());
    }

    #[test]
    fn reopening_drops_the_submission() {
        let mut p = project();
        let task = p.phases[0].task_mut("t1").unwrap();
        submit_task(task, SubmissionInput::default(), now());
        let previous = set_work_state(task, WorkState::InProgress);
        assert!(previous.is_completed());
        assert_eq!(task.status, TaskStatus::InProgress);
        assert!(task.status.submission().is_none());
    }

    #[test]
    fn completed_status_without_timestamp_is_rejected() {
        assert!(check_status(&TaskStatus::Completed(Submission::default())).is_err());
        assert!(check_status(&completion_status(SubmissionInput::default(), now())).is_ok());
        assert!(check_status(&TaskStatus::Backlog).is_ok());
    }
}
