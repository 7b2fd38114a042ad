//! Engine results and their serializable wire shape.

use crate::entity::Entity;
use crate::error::LockerError;
use crate::ratelimit::RateDecision;
use serde::Serialize;

/// Result of one engine call.
pub type Outcome<T> = std::result::Result<Accepted<T>, Rejection>;

/// A request that was carried out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted<T> {
    /// HTTP-status-equivalent code (200 or 201).
    pub status: u16,
    pub message: String,
    pub value: T,
    pub rate_limit: Option<RateDecision>,
}

/// A request that was refused. Always carries at least one error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    errors: Vec<LockerError>,
    pub rate_limit: Option<RateDecision>,
}

impl Rejection {
    pub fn new(error: LockerError, rate_limit: Option<RateDecision>) -> Self {
        Self {
            errors: vec![error],
            rate_limit,
        }
    }

    /// `None` if `errors` is empty.
    pub fn from_errors(errors: Vec<LockerError>, rate_limit: Option<RateDecision>) -> Option<Self> {
        (!errors.is_empty()).then_some(Self { errors, rate_limit })
    }

    /// The first problem found; it decides the status and exit code.
    pub fn primary(&self) -> &LockerError {
        &self.errors[0]
    }

    pub fn errors(&self) -> &[LockerError] {
        &self.errors
    }

    pub fn status(&self) -> u16 {
        self.primary().status_code()
    }

    pub fn into_primary(self) -> LockerError {
        self.errors.into_iter().next().unwrap_or(LockerError::StoreFailure(
            "rejection without errors".to_string(),
        ))
    }
}

/// Values that can be reported as the entity of a response.
pub trait Snapshot {
    fn snapshot(&self) -> Option<Entity>;
}

impl Snapshot for Entity {
    fn snapshot(&self) -> Option<Entity> {
        Some(self.clone())
    }
}

impl Snapshot for Option<Entity> {
    fn snapshot(&self) -> Option<Entity> {
        self.clone()
    }
}

impl Snapshot for () {
    fn snapshot(&self) -> Option<Entity> {
        None
    }
}

/// Wire form of an [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Response {
    pub success: bool,
    pub status: u16,
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity: Option<Entity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateDecision>,
}

impl Response {
    pub fn from_outcome<T: Snapshot>(outcome: &Outcome<T>) -> Self {
        match outcome {
            Ok(accepted) => Self {
                success: true,
                status: accepted.status,
                messages: vec![accepted.message.clone()],
                entity: accepted.value.snapshot(),
                rate_limit: accepted.rate_limit,
            },
            Err(rejection) => Self {
                success: false,
                status: rejection.status(),
                messages: rejection.errors().iter().map(ToString::to_string).collect(),
                entity: None,
                rate_limit: rejection.rate_limit,
            },
        }
    }

    /// Pretty JSON, as printed by the CLI.
    pub fn to_json(&self) -> crate::error::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| LockerError::store("failed to serialize response", e))
    }
}
