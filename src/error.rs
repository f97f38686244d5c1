use std::fmt;

use thiserror::Error;

pub type TrackerResult<T> = core::result::Result<T, TrackerError>;

/// Entity named in a [`TrackerError::NotFound`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    Project,
    Phase,
    Task,
    Invite,
    User,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::Project => "project",
            EntityKind::Phase => "phase",
            EntityKind::Task => "task",
            EntityKind::Invite => "invite",
            EntityKind::User => "user",
        })
    }
}

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    InvalidState(String),
    #[error("no signed-in user")]
    NotSignedIn,
    #[error("{service} request failed: {message}")]
    Upstream {
        service: &'static str,
        message: String,
    },
    #[error("project {project_id} was created but a follow-up write failed: {source}")]
    PartialWrite {
        project_id: String,
        #[source]
        source: Box<TrackerError>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TrackerError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        TrackerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        TrackerError::Validation(format!("missing required field: {field}"))
    }

    pub fn upstream(service: &'static str, message: impl fmt::Display) -> Self {
        TrackerError::Upstream {
            service,
            message: message.to_string(),
        }
    }

    /// Maps a failed HTTP exchange with `service` to `Upstream`, keeping the
    /// start of any error body the service sent back.
    pub fn from_http(service: &'static str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => {
                let body = response.into_string().unwrap_or_default();
                let body: String = body.chars().take(200).collect();
                TrackerError::upstream(service, format!("HTTP {code}: {}", body.trim()))
            }
            ureq::Error::Transport(transport) => TrackerError::upstream(service, transport),
        }
    }

    /// True for errors raised before anything was written.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            TrackerError::Validation(_)
                | TrackerError::Duplicate(_)
                | TrackerError::InvalidState(_)
                | TrackerError::NotSignedIn
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        let err = TrackerError::not_found(EntityKind::Phase, "ph-1");
        assert_eq!(err.to_string(), "phase not found: ph-1");
    }

    #[test]
    fn partial_write_keeps_the_cause() {
        let err = TrackerError::PartialWrite {
            project_id: "p1".to_string(),
            source: Box::new(TrackerError::upstream("supabase", "HTTP 503")),
        };
        assert_eq!(
            err.to_string(),
            "project p1 was created but a follow-up write failed: supabase request failed: HTTP 503"
        );
        assert!(!err.is_caller_error());
        assert!(TrackerError::missing_field("name").is_caller_error());
    }
}
