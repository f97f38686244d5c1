//! Supabase backend
//!
//! Talks to the hosted Postgres REST API (`/rest/v1`) and the auth API
//! (`/auth/v1`) of a Supabase project:
//! - projects, members, phases and tasks
//! - invites and their status
//! - the signed-in profile and profile search

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::time::Duration;

use crate::error::{EntityKind, TrackerError, TrackerResult};
use crate::lifecycle::check_status;
use crate::store::{Identity, ProjectSpec, SEARCH_LIMIT, Store, TaskUpdate};
use crate::types::{
    Invite, InviteStatus, Phase, Project, ProjectMode, SkillLevel, Submission, Task, TaskStatus, User,
};

const SERVICE: &str = "supabase";

const PROJECT_SELECT: &str = "*,members:project_members(user:profiles(*)),phases:phases(*,tasks(*))";
const INVITE_SELECT: &str = "*,project:projects(name),inviter:profiles!inviter_id(username)";

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
    /// Session token of the signed-in user; without it requests run as anon.
    pub access_token: Option<String>,
    pub timeout: Duration,
}

pub struct SupabaseStore {
    agent: ureq::Agent,
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    streak: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct TaskRow {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assignee_id: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    completed_at: Option<String>,
    #[serde(default)]
    proof_image_url: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    submission_description: Option<String>,
    #[serde(default)]
    backlogs: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct PhaseRow {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    tasks: Vec<TaskRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct MemberRow {
    #[serde(default)]
    user: Option<ProfileRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectRow {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    git_repo_url: Option<String>,
    owner_id: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    skill_level: Option<String>,
    #[serde(default)]
    streak: Option<i64>,
    #[serde(default)]
    members: Vec<MemberRow>,
    #[serde(default)]
    phases: Vec<PhaseRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct NameRow {
    #[serde(default, alias = "username")]
    name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct InviteRow {
    id: String,
    project_id: String,
    inviter_id: String,
    invitee_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    project: Option<NameRow>,
    #[serde(default)]
    inviter: Option<NameRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct MembershipRow {
    project_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct AuthUser {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

fn streak_of(value: Option<i64>) -> u32 {
    value.and_then(|s| u32::try_from(s).ok()).unwrap_or(0)
}

fn user_from_row(row: ProfileRow) -> User {
    let username = row
        .username
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| "Unknown".to_string());
    let avatar_url = row
        .avatar_url
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| crate::types::default_avatar_url(&username));
    User {
        id: row.id,
        username,
        avatar_url,
        streak: streak_of(row.streak),
    }
}

/// A `Completed` row without a completion time is read back as `Pending`.
fn status_from_row(row: &TaskRow) -> TaskStatus {
    let completed_at = row
        .completed_at
        .as_deref()
        .map(str::trim)
        .filter(|at| !at.is_empty());
    match row.status.as_deref().unwrap_or("Pending") {
        "Completed" if completed_at.is_none() => {
            tracing::warn!(task_id = %row.id, "completed task has no completion time, reading it as pending");
            TaskStatus::Pending
        }
        "Completed" => TaskStatus::Completed(Submission {
            completed_at: completed_at.unwrap_or_default().to_string(),
            proof_image_ref: row.proof_image_url.clone(),
            notes: row.notes.clone().unwrap_or_default(),
            description: row.submission_description.clone().unwrap_or_default(),
            blocker_note: row.backlogs.clone().unwrap_or_default(),
        }),
        "In Progress" => TaskStatus::InProgress,
        "Backlog" => TaskStatus::Backlog,
        _ => TaskStatus::Pending,
    }
}

fn task_from_row(row: TaskRow) -> Task {
    let status = status_from_row(&row);
    Task {
        id: row.id,
        title: row.title.unwrap_or_default(),
        description: row.description.unwrap_or_default(),
        status,
        assignee_id: row.assignee_id.unwrap_or_default(),
        due_date: row.due_date,
    }
}

fn project_from_row(row: ProjectRow) -> Project {
    Project {
        id: row.id,
        name: row.name.unwrap_or_default(),
        description: row.description.unwrap_or_default(),
        repo_url: row.git_repo_url.filter(|u| !u.is_empty()),
        owner_id: row.owner_id,
        members: row
            .members
            .into_iter()
            .filter_map(|m| m.user)
            .map(user_from_row)
            .collect(),
        created_at: row.created_at.unwrap_or_default(),
        mode: row.mode.as_deref().and_then(|m| m.parse().ok()),
        skill_level: row.skill_level.as_deref().and_then(|s| s.parse().ok()),
        streak: streak_of(row.streak),
        phases: row
            .phases
            .into_iter()
            .map(|ph| Phase {
                id: ph.id,
                title: ph.title.unwrap_or_default(),
                tasks: ph.tasks.into_iter().map(task_from_row).collect(),
                expanded: true,
            })
            .collect(),
    }
}

fn invite_from_row(row: InviteRow) -> Invite {
    Invite {
        id: row.id,
        project_id: row.project_id,
        project_name: row.project.and_then(|p| p.name).unwrap_or_default(),
        inviter_id: row.inviter_id,
        inviter_name: row.inviter.and_then(|i| i.name).unwrap_or_default(),
        invitee_id: row.invitee_id,
        status: row
            .status
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default(),
    }
}

/// Task columns for `status`; submission columns are cleared unless completed.
fn status_columns(status: &TaskStatus) -> Map<String, Value> {
    let mut columns = Map::new();
    columns.insert("status".into(), json!(status.label()));
    let submission = status.submission();
    columns.insert("completed_at".into(), json!(submission.map(|s| &s.completed_at)));
    columns.insert(
        "proof_image_url".into(),
        json!(submission.and_then(|s| s.proof_image_ref.as_ref())),
    );
    columns.insert("notes".into(), json!(submission.map(|s| &s.notes)));
    columns.insert(
        "submission_description".into(),
        json!(submission.map(|s| &s.description)),
    );
    columns.insert("backlogs".into(), json!(submission.map(|s| &s.blocker_note)));
    columns
}

fn update_columns(update: &TaskUpdate) -> Map<String, Value> {
    let mut columns = update.status.as_ref().map(status_columns).unwrap_or_default();
    if let Some(title) = &update.title {
        columns.insert("title".into(), json!(title));
    }
    if let Some(description) = &update.description {
        columns.insert("description".into(), json!(description));
    }
    if let Some(assignee_id) = &update.assignee_id {
        columns.insert("assignee_id".into(), json!(assignee_id));
    }
    if let Some(due_date) = &update.due_date {
        columns.insert("due_date".into(), json!(due_date));
    }
    columns
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

fn in_list(values: &[String]) -> String {
    format!("in.({})", values.join(","))
}

fn ilike_contains(query: &str) -> String {
    let cleaned: String = query.chars().filter(|c| !matches!(c, '*' | ',' | '(' | ')')).collect();
    format!("ilike.*{cleaned}*")
}

impl SupabaseStore {
    pub fn new(config: SupabaseConfig) -> TrackerResult<Self> {
        if config.url.trim().is_empty() {
            return Err(TrackerError::missing_field("supabase url"));
        }
        if config.anon_key.trim().is_empty() {
            return Err(TrackerError::missing_field("supabase anon key"));
        }
        let base_url = if config.url.starts_with("http") {
            config.url.trim_end_matches('/').to_string()
        } else {
            format!("https://{}", config.url.trim_end_matches('/'))
        };
        Ok(Self {
            agent: ureq::AgentBuilder::new().timeout(config.timeout).build(),
            base_url,
            anon_key: config.anon_key,
            access_token: config.access_token.filter(|t| !t.trim().is_empty()),
        })
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn authorize(&self, request: ureq::Request) -> ureq::Request {
        let bearer = self.access_token.as_deref().unwrap_or(&self.anon_key);
        request
            .set("apikey", &self.anon_key)
            .set("Authorization", &format!("Bearer {bearer}"))
    }

    fn read_rows<T: DeserializeOwned>(&self, response: ureq::Response, table: &str) -> TrackerResult<Vec<T>> {
        response.into_json().map_err(|e| {
            TrackerError::upstream(SERVICE, format!("failed to read {table} rows: {e}"))
        })
    }

    fn select<T: DeserializeOwned>(&self, table: &str, query: &[(&str, String)]) -> TrackerResult<Vec<T>> {
        tracing::debug!(table, "select");
        let mut request = self.authorize(self.agent.get(&self.rest_url(table)));
        for (key, value) in query {
            request = request.query(key, value);
        }
        let response = request.call().map_err(|e| TrackerError::from_http(SERVICE, e))?;
        self.read_rows(response, table)
    }

    fn insert<T: DeserializeOwned>(&self, table: &str, select: Option<&str>, body: Value) -> TrackerResult<T> {
        tracing::debug!(table, "insert");
        let mut request = self
            .authorize(self.agent.post(&self.rest_url(table)))
            .set("Prefer", "return=representation");
        if let Some(select) = select {
            request = request.query("select", select);
        }
        let response = request.send_json(body).map_err(|e| TrackerError::from_http(SERVICE, e))?;
        self.read_rows::<T>(response, table)?
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::upstream(SERVICE, format!("insert into {table} returned no row")))
    }

    fn patch(&self, table: &str, id: &str, body: Value) -> TrackerResult<usize> {
        tracing::debug!(table, id, "update");
        let response = self
            .authorize(self.agent.request("PATCH", &self.rest_url(table)))
            .set("Prefer", "return=representation")
            .query("id", &eq(id))
            .send_json(body)
            .map_err(|e| TrackerError::from_http(SERVICE, e))?;
        Ok(self.read_rows::<Value>(response, table)?.len())
    }

    fn fetch_profile(&self, user_id: &str) -> TrackerResult<Option<User>> {
        let rows: Vec<ProfileRow> = self.select("profiles", &[("select", "*".to_string()), ("id", eq(user_id))])?;
        Ok(rows.into_iter().next().map(user_from_row))
    }
}

impl Store for SupabaseStore {
    fn fetch_projects_for_user(&self, user_id: &str) -> TrackerResult<Vec<Project>> {
        let memberships: Vec<MembershipRow> = self.select(
            "project_members",
            &[("select", "project_id".to_string()), ("user_id", eq(user_id))],
        )?;
        let ids: Vec<String> = memberships.into_iter().map(|m| m.project_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<ProjectRow> = self.select(
            "projects",
            &[("select", PROJECT_SELECT.to_string()), ("id", in_list(&ids))],
        )?;
        Ok(rows.into_iter().map(project_from_row).collect())
    }

    fn fetch_project(&self, project_id: &str) -> TrackerResult<Option<Project>> {
        let rows: Vec<ProjectRow> = self.select(
            "projects",
            &[("select", PROJECT_SELECT.to_string()), ("id", eq(project_id))],
        )?;
        Ok(rows.into_iter().next().map(project_from_row))
    }

    fn create_project(&mut self, spec: &ProjectSpec) -> TrackerResult<Project> {
        let row: ProjectRow = self.insert(
            "projects",
            None,
            json!({
                "name": spec.name,
                "description": spec.description,
                "git_repo_url": spec.repo_url,
                "owner_id": spec.owner_id,
                "mode": spec.mode.map(|m: ProjectMode| m.as_str()),
                "skill_level": spec.skill_level.map(|s: SkillLevel| s.as_str()),
            }),
        )?;
        Ok(project_from_row(row))
    }

    fn add_member(&mut self, project_id: &str, user_id: &str) -> TrackerResult<()> {
        self.authorize(self.agent.post(&self.rest_url("project_members")))
            .set("Prefer", "resolution=ignore-duplicates,return=minimal")
            .query("on_conflict", "project_id,user_id")
            .send_json(json!({ "project_id": project_id, "user_id": user_id }))
            .map_err(|e| TrackerError::from_http(SERVICE, e))?;
        Ok(())
    }

    fn add_phase(&mut self, project_id: &str, title: &str) -> TrackerResult<Phase> {
        let row: PhaseRow = self.insert("phases", None, json!({ "project_id": project_id, "title": title }))?;
        Ok(Phase {
            id: row.id,
            title: row.title.unwrap_or_else(|| title.to_string()),
            tasks: Vec::new(),
            expanded: true,
        })
    }

    fn add_task(&mut self, phase_id: &str, task: &Task) -> TrackerResult<Task> {
        check_status(&task.status)?;
        let mut columns = status_columns(&task.status);
        columns.insert("phase_id".into(), json!(phase_id));
        columns.insert("title".into(), json!(task.title));
        columns.insert("description".into(), json!(task.description));
        columns.insert("assignee_id".into(), json!(task.assignee_id));
        columns.insert("due_date".into(), json!(task.due_date));
        let row: TaskRow = self.insert("tasks", None, Value::Object(columns))?;
        Ok(task_from_row(row))
    }

    fn update_task(&mut self, task_id: &str, update: &TaskUpdate) -> TrackerResult<()> {
        if let Some(status) = &update.status {
            check_status(status)?;
        }
        let columns = update_columns(update);
        if columns.is_empty() {
            return Ok(());
        }
        match self.patch("tasks", task_id, Value::Object(columns))? {
            0 => Err(TrackerError::not_found(EntityKind::Task, task_id)),
            _ => Ok(()),
        }
    }

    fn delete_task(&mut self, task_id: &str) -> TrackerResult<()> {
        tracing::debug!(task_id, "delete task");
        self.authorize(self.agent.delete(&self.rest_url("tasks")))
            .query("id", &eq(task_id))
            .call()
            .map_err(|e| TrackerError::from_http(SERVICE, e))?;
        Ok(())
    }

    fn create_invite(&mut self, project_id: &str, inviter_id: &str, invitee_id: &str) -> TrackerResult<Invite> {
        let pending: Vec<InviteRow> = self.select(
            "invites",
            &[
                ("select", "*".to_string()),
                ("project_id", eq(project_id)),
                ("invitee_id", eq(invitee_id)),
                ("status", eq(InviteStatus::Pending.as_str())),
            ],
        )?;
        if !pending.is_empty() {
            return Err(TrackerError::Duplicate(format!(
                "{invitee_id} already has a pending invite to project {project_id}"
            )));
        }
        let row: InviteRow = self.insert(
            "invites",
            Some(INVITE_SELECT),
            json!({
                "project_id": project_id,
                "inviter_id": inviter_id,
                "invitee_id": invitee_id,
                "status": InviteStatus::Pending.as_str(),
            }),
        )?;
        Ok(invite_from_row(row))
    }

    fn update_invite_status(&mut self, invite_id: &str, status: InviteStatus) -> TrackerResult<()> {
        match self.patch("invites", invite_id, json!({ "status": status.as_str() }))? {
            0 => Err(TrackerError::not_found(EntityKind::Invite, invite_id)),
            _ => Ok(()),
        }
    }

    fn fetch_invite(&self, invite_id: &str) -> TrackerResult<Option<Invite>> {
        let rows: Vec<InviteRow> = self.select(
            "invites",
            &[("select", INVITE_SELECT.to_string()), ("id", eq(invite_id))],
        )?;
        Ok(rows.into_iter().next().map(invite_from_row))
    }

    fn invites_for_project(&self, project_id: &str) -> TrackerResult<Vec<Invite>> {
        let rows: Vec<InviteRow> = self.select(
            "invites",
            &[("select", INVITE_SELECT.to_string()), ("project_id", eq(project_id))],
        )?;
        Ok(rows.into_iter().map(invite_from_row).collect())
    }

    fn pending_invites_for_user(&self, user_id: &str) -> TrackerResult<Vec<Invite>> {
        let rows: Vec<InviteRow> = self.select(
            "invites",
            &[
                ("select", INVITE_SELECT.to_string()),
                ("invitee_id", eq(user_id)),
                ("status", eq(InviteStatus::Pending.as_str())),
            ],
        )?;
        Ok(rows.into_iter().map(invite_from_row).collect())
    }
}

impl Identity for SupabaseStore {
    fn current_user(&self) -> TrackerResult<Option<User>> {
        if self.access_token.is_none() {
            return Ok(None);
        }
        let url = format!("{}/auth/v1/user", self.base_url);
        let auth_user: AuthUser = match self.authorize(self.agent.get(&url)).call() {
            Ok(response) => response
                .into_json()
                .map_err(|e| TrackerError::upstream(SERVICE, format!("failed to read auth user: {e}")))?,
            Err(ureq::Error::Status(401 | 403, _)) => return Ok(None),
            Err(e) => return Err(TrackerError::from_http(SERVICE, e)),
        };

        // The profile row is written by a trigger and may lag behind sign-up.
        match self.fetch_profile(&auth_user.id)? {
            Some(user) => Ok(Some(user)),
            None => Ok(Some(User {
                id: auth_user.id,
                username: auth_user.email.unwrap_or_else(|| "User".to_string()),
                avatar_url: String::new(),
                streak: 0,
            })),
        }
    }

    fn fetch_user(&self, user_id: &str) -> TrackerResult<Option<User>> {
        self.fetch_profile(user_id)
    }

    fn search_users(&self, query: &str) -> TrackerResult<Vec<User>> {
        let rows: Vec<ProfileRow> = self.select(
            "profiles",
            &[
                ("select", "*".to_string()),
                ("username", ilike_contains(query)),
                ("limit", SEARCH_LIMIT.to_string()),
            ],
        )?;
        Ok(rows.into_iter().map(user_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(url: &str) -> SupabaseConfig {
        SupabaseConfig {
            url: url.to_string(),
            anon_key: "anon".to_string(),
            access_token: Some(" ".to_string()),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn store_creation_normalises_url() {
        let store = SupabaseStore::new(config("abc.supabase.co/")).unwrap();
        assert_eq!(store.rest_url("tasks"), "https://abc.supabase.co/rest/v1/tasks");
        assert_eq!(store.access_token, None);

        let store = SupabaseStore::new(config("http://localhost:54321")).unwrap();
        assert_eq!(store.base_url, "http://localhost:54321");

        let mut missing_key = config("http://localhost:54321");
        missing_key.anon_key.clear();
        assert!(SupabaseStore::new(missing_key).is_err());
    }

    #[test]
    fn project_rows_map_to_the_model() {
        let row: ProjectRow = serde_json::from_value(json!({
            "id": "p1",
            "name": "Shop",
            "description": "A store",
            "git_repo_url": "",
            "owner_id": "u1",
            "created_at": "2026-10-01T00:00:00+00:00",
            "mode": "Learn & Develop",
            "skill_level": "Beginner",
            "streak": 3,
            "members": [
                { "user": { "id": "u1", "username": "alex_dev", "avatar_url": null, "streak": 12 } },
                { "user": { "id": "u2", "username": null } }
            ],
            "phases": [{
                "id": "ph1",
                "title": "Month 1",
                "tasks": [
                    { "id": "t1", "title": "Repo", "status": "Completed", "assignee_id": "u1",
                      "completed_at": "2026-10-14T10:00:00+00:00", "backlogs": "keys", "notes": null },
                    { "id": "t2", "title": "Schema", "status": "In Progress", "assignee_id": "u2" },
                    { "id": "t3", "title": "Auth", "status": "Backlog", "assignee_id": "u2" },
                    { "id": "t4", "title": "Deploy", "status": null }
                ]
            }]
        }))
        .unwrap();

        let project = project_from_row(row);
        assert_eq!(project.repo_url, None);
        assert_eq!(project.mode, Some(ProjectMode::LearnAndDevelop));
        assert_eq!(project.skill_level, Some(SkillLevel::Beginner));
        assert_eq!(project.members[0].streak, 12);
        assert_eq!(project.members[0].avatar_url, crate::types::default_avatar_url("alex_dev"));
        assert_eq!(project.members[1].username, "Unknown");

        let tasks = &project.phases[0].tasks;
        let submission = tasks[0].status.submission().unwrap();
        assert_eq!(submission.blocker_note, "keys");
        assert_eq!(submission.notes, "");
        assert_eq!(tasks[1].status, TaskStatus::InProgress);
        assert_eq!(tasks[2].status, TaskStatus::Backlog);
        assert_eq!(tasks[3].status, TaskStatus::Pending);
        assert_eq!(crate::progress::project_progress(&project), 25);
    }

    #[test]
    fn completed_rows_without_a_time_read_as_pending() {
        let row: TaskRow = serde_json::from_value(json!({
            "id": "t1", "title": "Repo", "status": "Completed", "completed_at": null, "backlogs": "keys"
        }))
        .unwrap();
        assert_eq!(task_from_row(row).status, TaskStatus::Pending);

        let row: TaskRow = serde_json::from_value(json!({
            "id": "t2", "title": "Repo", "status": "Completed", "completed_at": "  "
        }))
        .unwrap();
        assert_eq!(task_from_row(row).status, TaskStatus::Pending);
    }

    #[test]
    fn status_columns_clear_submission_unless_completed() {
        let columns = status_columns(&TaskStatus::InProgress);
        assert_eq!(columns["status"], "In Progress");
        assert!(columns["completed_at"].is_null());
        assert!(columns["backlogs"].is_null());

        let columns = status_columns(&TaskStatus::Completed(Submission {
            completed_at: "2026-10-14T10:00:00Z".to_string(),
            proof_image_ref: Some("https://img.test/1.png".to_string()),
            notes: "n".to_string(),
            description: "d".to_string(),
            blocker_note: String::new(),
        }));
        assert_eq!(columns["status"], "Completed");
        assert_eq!(columns["completed_at"], "2026-10-14T10:00:00Z");
        assert_eq!(columns["proof_image_url"], "https://img.test/1.png");
        assert_eq!(columns["submission_description"], "d");
    }

    #[test]
    fn partial_updates_only_send_given_fields() {
        let update = TaskUpdate {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let columns = update_columns(&update);
        assert_eq!(columns.len(), 1);
        assert_eq!(columns["title"], "Renamed");
        assert!(update_columns(&TaskUpdate::default()).is_empty());
    }

    #[test]
    fn invite_rows_carry_cached_names() {
        let row: InviteRow = serde_json::from_value(json!({
            "id": "i1",
            "project_id": "p1",
            "inviter_id": "u1",
            "invitee_id": "u2",
            "status": "declined",
            "project": { "name": "Shop" },
            "inviter": { "username": "alex_dev" }
        }))
        .unwrap();
        let invite = invite_from_row(row);
        assert_eq!(invite.project_name, "Shop");
        assert_eq!(invite.inviter_name, "alex_dev");
        assert_eq!(invite.status, InviteStatus::Declined);
    }

    #[test]
    fn filters_use_rest_operators() {
        assert_eq!(eq("abc"), "eq.abc");
        assert_eq!(in_list(&["a".to_string(), "b".to_string()]), "in.(a,b)");
        assert_eq!(ilike_contains("Al*ex"), "ilike.*Alex*");
    }
}
