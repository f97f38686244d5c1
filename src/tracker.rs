//! Tracker: the operations a signed-in user performs.
//!
//! Each call validates its input, applies the lifecycle rules on a freshly
//! fetched copy of the affected records and then writes through the backend.
//! Nothing fetched is kept between calls.

use chrono::{DateTime, TimeZone, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::drafting::{DraftRequest, PhaseDraft, PhaseDrafter, PlannedPhase, owner_first, plan_phases};
use crate::error::{EntityKind, TrackerError, TrackerResult};
use crate::invite::{self, Response};
use crate::lifecycle::{self, SubmissionInput};
use crate::progress::{
    DayActivity, PhaseBreakdown, ProjectSummary, UserTotals, project_breakdown, project_progress, summarize,
    user_totals, weekly_activity,
};
use crate::store::{Backend, ProjectSpec, TaskUpdate};
use crate::types::{Invite, InviteStatus, Phase, Project, ProjectMode, SkillLevel, Task, TaskDraft, User, WorkState};

/// Shortest invitee search query that reaches the backend.
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Members besides the owner.
    #[serde(default)]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub mode: Option<ProjectMode>,
    #[serde(default)]
    pub skill_level: Option<SkillLevel>,
    /// Drafted phases to store with the project.
    #[serde(default)]
    pub phases: Vec<PhaseDraft>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProjectDetails {
    pub project: Project,
    pub progress: u8,
    pub phases: Vec<PhaseBreakdown>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ProfileStats {
    pub user: User,
    pub totals: UserTotals,
    pub weekly_activity: [DayActivity; 7],
    pub pending_invites: Vec<Invite>,
}

pub struct Tracker {
    backend: Box<dyn Backend>,
    drafter: Option<Box<dyn PhaseDrafter>>,
}

impl Tracker {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
            drafter: None,
        }
    }

    pub fn with_drafter(mut self, drafter: impl PhaseDrafter + 'static) -> Self {
        self.drafter = Some(Box::new(drafter));
        self
    }

    pub fn has_drafter(&self) -> bool {
        self.drafter.is_some()
    }

    pub fn current_user(&self) -> TrackerResult<User> {
        self.backend.current_user()?.ok_or(TrackerError::NotSignedIn)
    }

    pub fn projects(&self) -> TrackerResult<Vec<Project>> {
        let user = self.current_user()?;
        self.backend.fetch_projects_for_user(&user.id)
    }

    pub fn dashboard(&self) -> TrackerResult<Vec<ProjectSummary>> {
        Ok(self.projects()?.iter().map(summarize).collect())
    }

    /// A project the signed-in user belongs to.
    pub fn project(&self, project_id: &str) -> TrackerResult<Project> {
        let user = self.current_user()?;
        let project = self.fetch_project(project_id)?;
        if !project.is_member(&user.id) {
            return Err(TrackerError::Validation(format!(
                "{} is not a member of {}",
                user.username, project.name
            )));
        }
        Ok(project)
    }

    pub fn project_details(&self, project_id: &str) -> TrackerResult<ProjectDetails> {
        let project = self.project(project_id)?;
        Ok(ProjectDetails {
            progress: project_progress(&project),
            phases: project_breakdown(&project),
            project,
        })
    }

    pub fn profile_stats<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TrackerResult<ProfileStats> {
        let user = self.current_user()?;
        let projects = self.backend.fetch_projects_for_user(&user.id)?;
        let pending_invites = self.backend.pending_invites_for_user(&user.id)?;
        Ok(ProfileStats {
            totals: user_totals(&projects),
            weekly_activity: weekly_activity(&projects, now),
            pending_invites,
            user,
        })
    }

    /// Creates a project owned by the signed-in user, then its members and
    /// any drafted phases. A failure after the project row exists is reported
    /// as [`TrackerError::PartialWrite`].
    pub fn create_project(&mut self, new: NewProject) -> TrackerResult<Project> {
        let owner = self.current_user()?;
        let name = new.name.trim();
        if name.is_empty() {
            return Err(TrackerError::missing_field("name"));
        }
        let description = new.description.trim();
        if description.is_empty() {
            return Err(TrackerError::missing_field("description"));
        }
        let members = self.team(&owner, &new.member_ids)?;

        let spec = ProjectSpec {
            name: name.to_string(),
            description: description.to_string(),
            repo_url: new.repo_url.filter(|u| !u.trim().is_empty()),
            owner_id: owner.id.clone(),
            mode: new.mode,
            skill_level: new.skill_level,
        };
        let created = self.backend.create_project(&spec)?;
        tracing::info!(project_id = %created.id, name = %created.name, "created project");

        let planned = plan_phases(&new.phases, &members, &owner.id);
        let populated = self.populate(&created.id, &members, &planned).and_then(|()| self.fetch_project(&created.id));
        populated.map_err(|source| {
            tracing::warn!(project_id = %created.id, error = %source, "project created with missing parts");
            TrackerError::PartialWrite {
                project_id: created.id.clone(),
                source: Box::new(source),
            }
        })
    }

    /// Asks the drafter for a first plan without writing anything.
    pub fn draft_project_plan(
        &self,
        description: &str,
        mode: Option<ProjectMode>,
        skill_level: Option<SkillLevel>,
        member_ids: &[String],
    ) -> TrackerResult<Vec<PhaseDraft>> {
        let owner = self.current_user()?;
        if description.trim().is_empty() {
            return Err(TrackerError::missing_field("description"));
        }
        let members = self.team(&owner, member_ids)?;
        let request = DraftRequest::new(description.trim(), mode, skill_level, &members);
        self.draft(&request)
    }

    /// Drafts the phase after the existing ones and appends it to the project.
    /// A failure after the first phase row is written is reported as
    /// [`TrackerError::PartialWrite`].
    pub fn draft_next_phase(&mut self, project_id: &str) -> TrackerResult<Project> {
        let project = self.project(project_id)?;
        let request = DraftRequest::next_phase_for(&project);
        let drafts = self.draft(&request)?;
        let members = owner_first(&project);
        let planned = plan_phases(&drafts, &members, &project.owner_id);

        let mut wrote = false;
        let stored = planned
            .iter()
            .try_for_each(|phase| self.store_phase(&project.id, phase, &mut wrote));
        if let Err(source) = stored {
            if !wrote {
                return Err(source);
            }
            tracing::warn!(project_id = %project.id, error = %source, "drafted phases only partly stored");
            return Err(TrackerError::PartialWrite {
                project_id: project.id.clone(),
                source: Box::new(source),
            });
        }
        tracing::info!(project_id = %project.id, phases = planned.len(), "appended drafted phases");
        self.fetch_project(&project.id)
    }

    pub fn add_phase(&mut self, project_id: &str, title: &str) -> TrackerResult<Phase> {
        let title = title.trim();
        if title.is_empty() {
            return Err(TrackerError::missing_field("title"));
        }
        let project = self.project(project_id)?;
        let phase = self.backend.add_phase(&project.id, title)?;
        tracing::info!(project_id = %project.id, phase_id = %phase.id, "added phase");
        Ok(phase)
    }

    pub fn add_task(&mut self, project_id: &str, phase_id: &str, draft: TaskDraft) -> TrackerResult<Task> {
        let project = self.project(project_id)?;
        if project.phase(phase_id).is_none() {
            return Err(TrackerError::not_found(EntityKind::Phase, phase_id));
        }
        let task = lifecycle::build_task(&project, draft)?;
        let task = self.backend.add_task(phase_id, &task)?;
        tracing::info!(project_id = %project.id, phase_id, task_id = %task.id, "added task");
        Ok(task)
    }

    /// Returns whether a task was removed; deleting an absent task is fine.
    pub fn delete_task(&mut self, project_id: &str, task_id: &str) -> TrackerResult<bool> {
        let project = self.project(project_id)?;
        if project.locate_task(task_id).is_none() {
            tracing::debug!(project_id = %project.id, task_id, "task already gone");
            return Ok(false);
        }
        self.backend.delete_task(task_id)?;
        tracing::info!(project_id = %project.id, task_id, "deleted task");
        Ok(true)
    }

    pub fn set_task_status(&mut self, project_id: &str, task_id: &str, state: WorkState) -> TrackerResult<Task> {
        let mut task = self.task(project_id, task_id)?;
        let previous = lifecycle::set_work_state(&mut task, state);
        self.backend.update_task(&task.id, &TaskUpdate::status(task.status.clone()))?;
        tracing::info!(task_id = %task.id, from = %previous, to = %task.status, "changed task status");
        Ok(task)
    }

    pub fn submit_task(&mut self, project_id: &str, task_id: &str, input: SubmissionInput) -> TrackerResult<Task> {
        self.submit_task_at(project_id, task_id, input, Utc::now())
    }

    /// Marks the task completed at `now`, writing status and submission together.
    pub fn submit_task_at(
        &mut self,
        project_id: &str,
        task_id: &str,
        input: SubmissionInput,
        now: DateTime<Utc>,
    ) -> TrackerResult<Task> {
        let mut task = self.task(project_id, task_id)?;
        lifecycle::submit_task(&mut task, input, now);
        self.backend.update_task(&task.id, &TaskUpdate::status(task.status.clone()))?;
        tracing::info!(task_id = %task.id, blocker = task.has_blocker(), "submitted task");
        Ok(task)
    }

    /// Users matching `query` who are not yet members of the project.
    pub fn search_invitees(&self, project_id: &str, query: &str) -> TrackerResult<Vec<User>> {
        let query = query.trim();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Ok(Vec::new());
        }
        let project = self.project(project_id)?;
        let mut found = self.backend.search_users(query)?;
        found.retain(|u| !project.is_member(&u.id));
        Ok(found)
    }

    pub fn send_invite(&mut self, project_id: &str, invitee_id: &str) -> TrackerResult<Invite> {
        let inviter = self.current_user()?;
        let project = self.fetch_project(project_id)?;
        let existing = self.backend.invites_for_project(&project.id)?;
        invite::check_new_invite(&project, &inviter.id, invitee_id, &existing)?;
        if self.backend.fetch_user(invitee_id)?.is_none() {
            return Err(TrackerError::not_found(EntityKind::User, invitee_id));
        }
        let invite = self.backend.create_invite(&project.id, &inviter.id, invitee_id)?;
        tracing::info!(invite_id = %invite.id, project_id = %project.id, invitee_id, "sent invite");
        Ok(invite)
    }

    pub fn pending_invites(&self) -> TrackerResult<Vec<Invite>> {
        let user = self.current_user()?;
        self.backend.pending_invites_for_user(&user.id)
    }

    /// Accepts an invite addressed to the signed-in user and joins the project.
    pub fn accept_invite(&mut self, invite_id: &str) -> TrackerResult<Response> {
        let (user, mut invite) = self.addressed_invite(invite_id)?;
        let mut project = self.fetch_project(&invite.project_id)?;
        let response = invite::accept_into(&mut invite, &mut project, user.clone())?;
        if response == Response::Changed {
            self.backend.update_invite_status(&invite.id, InviteStatus::Accepted)?;
        }
        // Also runs on a repeated accept so an earlier failed membership write is repaired.
        self.backend.add_member(&project.id, &user.id)?;
        tracing::info!(invite_id = %invite.id, project_id = %invite.project_id, ?response, "accepted invite");
        Ok(response)
    }

    pub fn decline_invite(&mut self, invite_id: &str) -> TrackerResult<Response> {
        let (_, mut invite) = self.addressed_invite(invite_id)?;
        let response = invite::decline(&mut invite)?;
        if response == Response::Changed {
            self.backend.update_invite_status(&invite.id, InviteStatus::Declined)?;
        }
        tracing::info!(invite_id = %invite.id, ?response, "declined invite");
        Ok(response)
    }

    fn fetch_project(&self, project_id: &str) -> TrackerResult<Project> {
        self.backend
            .fetch_project(project_id)?
            .ok_or_else(|| TrackerError::not_found(EntityKind::Project, project_id))
    }

    fn task(&self, project_id: &str, task_id: &str) -> TrackerResult<Task> {
        let project = self.project(project_id)?;
        project
            .locate_task(task_id)
            .map(|(_, task)| task.clone())
            .ok_or_else(|| TrackerError::not_found(EntityKind::Task, task_id))
    }

    fn addressed_invite(&self, invite_id: &str) -> TrackerResult<(User, Invite)> {
        let user = self.current_user()?;
        let invite = self
            .backend
            .fetch_invite(invite_id)?
            .ok_or_else(|| TrackerError::not_found(EntityKind::Invite, invite_id))?;
        invite::check_responder(&invite, &user.id)?;
        Ok((user, invite))
    }

    /// Owner first, then the other distinct members that exist.
    fn team(&self, owner: &User, member_ids: &[String]) -> TrackerResult<Vec<User>> {
        let mut members = vec![owner.clone()];
        for id in member_ids {
            let id = id.trim();
            if id.is_empty() || members.iter().any(|m| m.id == id) {
                continue;
            }
            let user = self
                .backend
                .fetch_user(id)?
                .ok_or_else(|| TrackerError::not_found(EntityKind::User, id))?;
            members.push(user);
        }
        Ok(members)
    }

    fn draft(&self, request: &DraftRequest) -> TrackerResult<Vec<PhaseDraft>> {
        let drafter = self
            .drafter
            .as_ref()
            .ok_or_else(|| TrackerError::Validation("AI drafting is not configured".to_string()))?;
        let drafts = drafter.draft(request).map_err(|err| {
            tracing::warn!(drafter = drafter.name(), error = %err, "drafting failed");
            match err {
                TrackerError::Upstream { .. } => err,
                other => TrackerError::upstream("drafting", other),
            }
        })?;
        if drafts.is_empty() {
            tracing::warn!(drafter = drafter.name(), "drafting returned no phases");
            return Err(TrackerError::upstream("drafting", "no phases were drafted"));
        }
        Ok(drafts)
    }

    fn populate(&mut self, project_id: &str, members: &[User], phases: &[PlannedPhase]) -> TrackerResult<()> {
        for member in members {
            self.backend.add_member(project_id, &member.id)?;
        }
        let mut wrote = false;
        for phase in phases {
            self.store_phase(project_id, phase, &mut wrote)?;
        }
        Ok(())
    }

    /// Sets `wrote` once the phase row exists.
    fn store_phase(&mut self, project_id: &str, planned: &PlannedPhase, wrote: &mut bool) -> TrackerResult<()> {
        if planned.title.is_empty() {
            return Ok(());
        }
        let phase = self.backend.add_phase(project_id, &planned.title)?;
        *wrote = true;
        for task in &planned.tasks {
            self.backend.add_task(&phase.id, task)?;
        }
        tracing::debug!(project_id, phase_id = %phase.id, tasks = planned.tasks.len(), "stored phase");
        Ok(())
    }
}
