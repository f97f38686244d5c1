use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{EntityKind, TrackerError, TrackerResult};
use crate::lifecycle::{check_status, new_id};
use crate::store::{Identity, ProjectSpec, SEARCH_LIMIT, Store, TaskUpdate};
use crate::types::{
    Invite, InviteStatus, Phase, Project, ProjectMode, SkillLevel, Submission, Task, TaskStatus, User,
};

const DATA_DIR: &str = ".devstreak";
const DATA_FILE: &str = "data.json";

#[derive(Clone, Debug, Serialize, Deserialize)]
struct ProjectRecord {
    id: String,
    name: String,
    description: String,
    #[serde(default)]
    repo_url: Option<String>,
    owner_id: String,
    #[serde(default)]
    member_ids: Vec<String>,
    created_at: String,
    #[serde(default)]
    mode: Option<ProjectMode>,
    #[serde(default)]
    skill_level: Option<SkillLevel>,
    #[serde(default)]
    streak: u32,
    #[serde(default)]
    phases: Vec<Phase>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct InviteRecord {
    id: String,
    project_id: String,
    inviter_id: String,
    invitee_id: String,
    #[serde(default)]
    status: InviteStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
struct StorageData {
    #[serde(default)]
    users: BTreeMap<String, User>,
    #[serde(default)]
    projects: BTreeMap<String, ProjectRecord>,
    #[serde(default)]
    invites: BTreeMap<String, InviteRecord>,
}

/// Repository kept in memory and, when opened from a path, mirrored to a
/// JSON file after every write.
///
/// Each store is an owned value handed to whoever uses it; nothing here is
/// global.
pub struct FileStore {
    storage_path: Option<PathBuf>,
    data: StorageData,
    current_user_id: Option<String>,
}

impl FileStore {
    pub fn in_memory() -> Self {
        Self {
            storage_path: None,
            data: StorageData::default(),
            current_user_id: None,
        }
    }

    /// `~/.devstreak/data.json`
    pub fn default_path() -> TrackerResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| {
            TrackerError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "couldn't find home dir",
            ))
        })?;
        Ok(home.join(DATA_DIR).join(DATA_FILE))
    }

    /// Loads `path`, creating an empty data file when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> TrackerResult<Self> {
        let storage_path = path.into();
        let mut store = Self {
            storage_path: Some(storage_path.clone()),
            data: StorageData::default(),
            current_user_id: None,
        };
        if storage_path.exists() {
            let contents = fs::read_to_string(&storage_path)?;
            store.data = serde_json::from_str(&contents)?;
            tracing::debug!(path = %storage_path.display(), "loaded tracker data");
        } else {
            store.save()?;
            tracing::info!(path = %storage_path.display(), "created tracker data file");
        }
        Ok(store)
    }

    pub fn with_current_user(mut self, user_id: impl Into<String>) -> Self {
        self.current_user_id = Some(user_id.into());
        self
    }

    pub fn set_current_user(&mut self, user_id: Option<String>) {
        self.current_user_id = user_id;
    }

    pub fn path(&self) -> Option<&Path> {
        self.storage_path.as_deref()
    }

    /// Persist the current content using a temporary file and an atomic
    /// rename to avoid partial writes. No-op for in-memory stores.
    pub fn save(&self) -> TrackerResult<()> {
        let Some(storage_path) = &self.storage_path else {
            return Ok(());
        };
        if let Some(parent) = storage_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp = storage_path.with_extension("tmp");
        let mut f = File::create(&temp)?;
        let content = serde_json::to_string_pretty(&self.data)?;
        f.write_all(content.as_bytes())?;
        f.sync_all()?;
        fs::rename(temp, storage_path)?;
        Ok(())
    }

    /// Saves, restoring `previous` when the write fails so that memory never
    /// holds changes the file does not.
    fn commit(&mut self, previous: StorageData) -> TrackerResult<()> {
        if let Err(err) = self.save() {
            tracing::warn!(error = %err, "save failed, discarding the change");
            self.data = previous;
            return Err(err);
        }
        Ok(())
    }

    /// Registers a profile. Usernames are unique, ignoring case.
    pub fn create_user(&mut self, username: &str) -> TrackerResult<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(TrackerError::missing_field("username"));
        }
        let taken = self
            .data
            .users
            .values()
            .any(|u| u.username.eq_ignore_ascii_case(username));
        if taken {
            return Err(TrackerError::Duplicate(format!("username {username} is taken")));
        }
        let user = User::new(new_id(), username);
        let previous = self.data.clone();
        self.data.users.insert(user.id.clone(), user.clone());
        self.commit(previous)?;
        tracing::info!(user_id = %user.id, username = %user.username, "created user");
        Ok(user)
    }

    /// Loads a small sample workspace and returns its owner.
    pub fn seed_demo(&mut self, now: DateTime<Utc>) -> TrackerResult<User> {
        let people = [
            ("alex_dev", "https://picsum.photos/200", 12),
            ("sarah_code", "https://picsum.photos/201", 5),
            ("mike_design", "https://picsum.photos/202", 0),
            ("jane_doe", "https://picsum.photos/203", 2),
        ];
        let previous = self.data.clone();
        let mut users = Vec::with_capacity(people.len());
        for (username, avatar_url, streak) in people {
            let user = User {
                id: new_id(),
                username: username.to_string(),
                avatar_url: avatar_url.to_string(),
                streak,
            };
            self.data.users.insert(user.id.clone(), user.clone());
            users.push(user);
        }
        let (alex, sarah) = (&users[0], &users[1]);

        let mut phase = Phase::new(new_id(), "Month 1: Setup & Auth");
        phase.tasks = vec![
            Task {
                id: new_id(),
                title: "Initialize Repo".to_string(),
                description: "Setup Next.js".to_string(),
                status: TaskStatus::Completed(Submission {
                    completed_at: now.to_rfc3339(),
                    ..Default::default()
                }),
                assignee_id: alex.id.clone(),
                due_date: None,
            },
            Task {
                id: new_id(),
                title: "Database Schema".to_string(),
                description: "Design SQL schema".to_string(),
                status: TaskStatus::Pending,
                assignee_id: sarah.id.clone(),
                due_date: None,
            },
        ];
        let record = ProjectRecord {
            id: new_id(),
            name: "E-Commerce Platform".to_string(),
            description: "A full-stack e-commerce app with Next.js and Stripe.".to_string(),
            repo_url: Some("https://github.com/alex/shop".to_string()),
            owner_id: alex.id.clone(),
            member_ids: vec![alex.id.clone(), sarah.id.clone()],
            created_at: now.to_rfc3339(),
            mode: Some(ProjectMode::DirectDevelop),
            skill_level: None,
            streak: 4,
            phases: vec![phase],
        };
        self.data.projects.insert(record.id.clone(), record);
        self.commit(previous)?;
        Ok(alex.clone())
    }

    fn user_or_placeholder(&self, user_id: &str) -> User {
        self.data
            .users
            .get(user_id)
            .cloned()
            .unwrap_or_else(|| User::new(user_id, "Unknown"))
    }

    fn hydrate(&self, record: &ProjectRecord) -> Project {
        let mut phases = record.phases.clone();
        for phase in &mut phases {
            phase.expanded = true;
        }
        Project {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            repo_url: record.repo_url.clone(),
            owner_id: record.owner_id.clone(),
            members: record
                .member_ids
                .iter()
                .map(|id| self.user_or_placeholder(id))
                .collect(),
            created_at: record.created_at.clone(),
            mode: record.mode,
            skill_level: record.skill_level,
            streak: record.streak,
            phases,
        }
    }

    fn hydrate_invite(&self, record: &InviteRecord) -> Invite {
        let project_name = self
            .data
            .projects
            .get(&record.project_id)
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Invite {
            id: record.id.clone(),
            project_id: record.project_id.clone(),
            project_name,
            inviter_id: record.inviter_id.clone(),
            inviter_name: self.user_or_placeholder(&record.inviter_id).username,
            invitee_id: record.invitee_id.clone(),
            status: record.status,
        }
    }

    fn project_record_mut(&mut self, project_id: &str) -> TrackerResult<&mut ProjectRecord> {
        self.data
            .projects
            .get_mut(project_id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Project, project_id))
    }

    fn phase_mut(&mut self, phase_id: &str) -> TrackerResult<&mut Phase> {
        self.data
            .projects
            .values_mut()
            .flat_map(|p| p.phases.iter_mut())
            .find(|ph| ph.id == phase_id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Phase, phase_id))
    }

    fn task_mut(&mut self, task_id: &str) -> Option<&mut Task> {
        self.data
            .projects
            .values_mut()
            .flat_map(|p| p.phases.iter_mut())
            .flat_map(|ph| ph.tasks.iter_mut())
            .find(|t| t.id == task_id)
    }
}

impl Store for FileStore {
    fn fetch_projects_for_user(&self, user_id: &str) -> TrackerResult<Vec<Project>> {
        Ok(self
            .data
            .projects
            .values()
            .filter(|p| p.member_ids.iter().any(|id| id == user_id))
            .map(|p| self.hydrate(p))
            .collect())
    }

    fn fetch_project(&self, project_id: &str) -> TrackerResult<Option<Project>> {
        Ok(self.data.projects.get(project_id).map(|p| self.hydrate(p)))
    }

    fn create_project(&mut self, spec: &ProjectSpec) -> TrackerResult<Project> {
        let record = ProjectRecord {
            id: new_id(),
            name: spec.name.clone(),
            description: spec.description.clone(),
            repo_url: spec.repo_url.clone(),
            owner_id: spec.owner_id.clone(),
            member_ids: Vec::new(),
            created_at: Utc::now().to_rfc3339(),
            mode: spec.mode,
            skill_level: spec.skill_level,
            streak: 0,
            phases: Vec::new(),
        };
        let project = self.hydrate(&record);
        let previous = self.data.clone();
        self.data.projects.insert(record.id.clone(), record);
        self.commit(previous)?;
        Ok(project)
    }

    fn add_member(&mut self, project_id: &str, user_id: &str) -> TrackerResult<()> {
        if !self.data.users.contains_key(user_id) {
            return Err(TrackerError::not_found(EntityKind::User, user_id));
        }
        let previous = self.data.clone();
        let record = self.project_record_mut(project_id)?;
        if record.member_ids.iter().any(|id| id == user_id) {
            return Ok(());
        }
        record.member_ids.push(user_id.to_string());
        self.commit(previous)
    }

    fn add_phase(&mut self, project_id: &str, title: &str) -> TrackerResult<Phase> {
        let phase = Phase::new(new_id(), title);
        let previous = self.data.clone();
        self.project_record_mut(project_id)?.phases.push(phase.clone());
        self.commit(previous)?;
        Ok(phase)
    }

    fn add_task(&mut self, phase_id: &str, task: &Task) -> TrackerResult<Task> {
        check_status(&task.status)?;
        let mut stored = task.clone();
        if stored.id.is_empty() {
            stored.id = new_id();
        }
        let previous = self.data.clone();
        self.phase_mut(phase_id)?.tasks.push(stored.clone());
        self.commit(previous)?;
        Ok(stored)
    }

    fn update_task(&mut self, task_id: &str, update: &TaskUpdate) -> TrackerResult<()> {
        if let Some(status) = &update.status {
            check_status(status)?;
        }
        let previous = self.data.clone();
        let task = self
            .task_mut(task_id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Task, task_id))?;
        update.clone().apply_to(task);
        self.commit(previous)
    }

    fn delete_task(&mut self, task_id: &str) -> TrackerResult<()> {
        let previous = self.data.clone();
        let mut removed = false;
        for phase in self.data.projects.values_mut().flat_map(|p| p.phases.iter_mut()) {
            let before = phase.tasks.len();
            phase.tasks.retain(|t| t.id != task_id);
            removed |= phase.tasks.len() != before;
        }
        if removed { self.commit(previous) } else { Ok(()) }
    }

    fn create_invite(&mut self, project_id: &str, inviter_id: &str, invitee_id: &str) -> TrackerResult<Invite> {
        if !self.data.projects.contains_key(project_id) {
            return Err(TrackerError::not_found(EntityKind::Project, project_id));
        }
        if !self.data.users.contains_key(invitee_id) {
            return Err(TrackerError::not_found(EntityKind::User, invitee_id));
        }
        let pending = self.data.invites.values().any(|i| {
            i.project_id == project_id && i.invitee_id == invitee_id && i.status == InviteStatus::Pending
        });
        if pending {
            return Err(TrackerError::Duplicate(format!(
                "{invitee_id} already has a pending invite to project {project_id}"
            )));
        }
        let record = InviteRecord {
            id: new_id(),
            project_id: project_id.to_string(),
            inviter_id: inviter_id.to_string(),
            invitee_id: invitee_id.to_string(),
            status: InviteStatus::Pending,
        };
        let invite = self.hydrate_invite(&record);
        let previous = self.data.clone();
        self.data.invites.insert(record.id.clone(), record);
        self.commit(previous)?;
        Ok(invite)
    }

    fn update_invite_status(&mut self, invite_id: &str, status: InviteStatus) -> TrackerResult<()> {
        let previous = self.data.clone();
        let record = self
            .data
            .invites
            .get_mut(invite_id)
            .ok_or_else(|| TrackerError::not_found(EntityKind::Invite, invite_id))?;
        record.status = status;
        self.commit(previous)
    }

    fn fetch_invite(&self, invite_id: &str) -> TrackerResult<Option<Invite>> {
        Ok(self.data.invites.get(invite_id).map(|i| self.hydrate_invite(i)))
    }

    fn invites_for_project(&self, project_id: &str) -> TrackerResult<Vec<Invite>> {
        Ok(self
            .data
            .invites
            .values()
            .filter(|i| i.project_id == project_id)
            .map(|i| self.hydrate_invite(i))
            .collect())
    }

    fn pending_invites_for_user(&self, user_id: &str) -> TrackerResult<Vec<Invite>> {
        Ok(self
            .data
            .invites
            .values()
            .filter(|i| i.invitee_id == user_id && i.status == InviteStatus::Pending)
            .map(|i| self.hydrate_invite(i))
            .collect())
    }
}

impl Identity for FileStore {
    fn current_user(&self) -> TrackerResult<Option<User>> {
        Ok(self
            .current_user_id
            .as_deref()
            .and_then(|id| self.data.users.get(id))
            .cloned())
    }

    fn fetch_user(&self, user_id: &str) -> TrackerResult<Option<User>> {
        Ok(self.data.users.get(user_id).cloned())
    }

    fn search_users(&self, query: &str) -> TrackerResult<Vec<User>> {
        let needle = query.to_lowercase();
        Ok(self
            .data
            .users
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .take(SEARCH_LIMIT)
            .cloned()
            .collect())
    }
}

impl Default for FileStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(owner_id: &str) -> ProjectSpec {
        ProjectSpec {
            name: "Shop".to_string(),
            description: "A store".to_string(),
            repo_url: None,
            owner_id: owner_id.to_string(),
            mode: None,
            skill_level: None,
        }
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut store = FileStore::open(&path).unwrap();
        let alex = store.create_user("alex_dev").unwrap();
        let project = store.create_project(&spec(&alex.id)).unwrap();
        store.add_member(&project.id, &alex.id).unwrap();
        let phase = store.add_phase(&project.id, "Month 1").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap().with_current_user(alex.id.clone());
        assert_eq!(reopened.current_user().unwrap(), Some(alex.clone()));
        let loaded = reopened.fetch_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded.members, vec![alex]);
        assert_eq!(loaded.phases[0].id, phase.id);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn in_memory_store_writes_nothing() {
        let mut store = FileStore::in_memory();
        store.create_user("alex_dev").unwrap();
        assert!(store.path().is_none());
        assert!(store.save().is_ok());
    }

    #[test]
    fn usernames_are_unique_ignoring_case() {
        let mut store = FileStore::in_memory();
        store.create_user("alex_dev").unwrap();
        assert!(matches!(store.create_user("ALEX_DEV"), Err(TrackerError::Duplicate(_))));
        assert!(matches!(store.create_user("  "), Err(TrackerError::Validation(_))));
    }

    #[test]
    fn search_is_case_insensitive_and_capped() {
        let mut store = FileStore::in_memory();
        for i in 0..12 {
            store.create_user(&format!("Dev_{i}")).unwrap();
        }
        store.create_user("mike_design").unwrap();
        assert_eq!(store.search_users("dev").unwrap().len(), SEARCH_LIMIT);
        let found = store.search_users("DESIGN").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].username, "mike_design");
    }

    #[test]
    fn task_writes_find_their_phase() {
        let mut store = FileStore::in_memory();
        let alex = store.create_user("alex_dev").unwrap();
        let project = store.create_project(&spec(&alex.id)).unwrap();
        let phase = store.add_phase(&project.id, "Month 1").unwrap();
        let task = Task {
            id: String::new(),
            title: "Initialize Repo".to_string(),
            description: String::new(),
            status: TaskStatus::Pending,
            assignee_id: alex.id.clone(),
            due_date: None,
        };
        let stored = store.add_task(&phase.id, &task).unwrap();
        assert!(!stored.id.is_empty());

        store
            .update_task(&stored.id, &TaskUpdate::status(TaskStatus::InProgress))
            .unwrap();
        let bad = TaskUpdate::status(TaskStatus::Completed(Submission::default()));
        assert!(store.update_task(&stored.id, &bad).is_err());
        let loaded = store.fetch_project(&project.id).unwrap().unwrap();
        assert_eq!(loaded.phases[0].tasks[0].status, TaskStatus::InProgress);

        store.delete_task(&stored.id).unwrap();
        store.delete_task(&stored.id).unwrap();
        assert!(matches!(
            store.add_task("missing", &task),
            Err(TrackerError::NotFound { kind: EntityKind::Phase, .. })
        ));
        assert!(matches!(
            store.update_task(&stored.id, &TaskUpdate::default()),
            Err(TrackerError::NotFound { kind: EntityKind::Task, .. })
        ));
    }

    #[test]
    fn pending_invites_are_unique_per_project_and_invitee() {
        let mut store = FileStore::in_memory();
        let alex = store.create_user("alex_dev").unwrap();
        let sarah = store.create_user("sarah_code").unwrap();
        let project = store.create_project(&spec(&alex.id)).unwrap();

        let invite = store.create_invite(&project.id, &alex.id, &sarah.id).unwrap();
        assert_eq!(invite.project_name, "Shop");
        assert_eq!(invite.inviter_name, "alex_dev");
        assert!(matches!(
            store.create_invite(&project.id, &alex.id, &sarah.id),
            Err(TrackerError::Duplicate(_))
        ));

        store.update_invite_status(&invite.id, InviteStatus::Declined).unwrap();
        assert!(store.pending_invites_for_user(&sarah.id).unwrap().is_empty());
        let history = store.invites_for_project(&project.id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, InviteStatus::Declined);

        assert!(store.create_invite(&project.id, &alex.id, &sarah.id).is_ok());
    }

    #[test]
    fn failed_save_leaves_prior_state_intact() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let mut store = FileStore::open(data_dir.join("data.json")).unwrap();
        let alex = store.create_user("alex_dev").unwrap();
        let project = store.create_project(&spec(&alex.id)).unwrap();
        let phase = store.add_phase(&project.id, "Month 1").unwrap();

        // A plain file where the data directory was makes every save fail.
        fs::remove_dir_all(&data_dir).unwrap();
        fs::write(&data_dir, "").unwrap();

        let task = Task {
            id: String::new(),
            title: "Initialize Repo".to_string(),
            description: String::new(),
            status: TaskStatus::Pending,
            assignee_id: alex.id.clone(),
            due_date: None,
        };
        assert!(store.add_task(&phase.id, &task).is_err());
        assert!(store.add_task(&phase.id, &task).is_err());
        assert!(store.create_project(&spec(&alex.id)).is_err());
        assert!(store.create_user("sarah_code").is_err());

        let loaded = store.fetch_project(&project.id).unwrap().unwrap();
        assert!(loaded.phases[0].tasks.is_empty());
        assert_eq!(store.data.projects.len(), 1);
        assert!(store.search_users("sarah").unwrap().is_empty());
    }

    #[test]
    fn demo_seed_matches_sample_workspace() {
        let mut store = FileStore::in_memory();
        let now: DateTime<Utc> = "2026-10-14T12:00:00Z".parse().unwrap();
        let alex = store.seed_demo(now).unwrap();
        assert_eq!(alex.username, "alex_dev");
        assert_eq!(alex.streak, 12);

        let projects = store.fetch_projects_for_user(&alex.id).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].members.len(), 2);
        assert_eq!(crate::progress::project_progress(&projects[0]), 50);
        assert_eq!(store.search_users("_").unwrap().len(), 4);
    }
}
