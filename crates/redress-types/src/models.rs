use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Staff,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "STUDENT",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STUDENT" => Ok(Role::Student),
            "STAFF" => Ok(Role::Staff),
            "ADMIN" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintType {
    Academic,
    Facility,
}

impl ComplaintType {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintType::Academic => "ACADEMIC",
            ComplaintType::Facility => "FACILITY",
        }
    }
}

impl fmt::Display for ComplaintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACADEMIC" => Ok(ComplaintType::Academic),
            "FACILITY" => Ok(ComplaintType::Facility),
            other => Err(format!("unknown complaint type: {other}")),
        }
    }
}

/// Complaint lifecycle states. The nominal flow is
/// NEW -> ASSIGNED -> IN_PROGRESS -> RESOLUTION_ANNOUNCED ->
/// CONFIRMED_BY_STUDENT -> CLOSED, but transitions are not validated against
/// a table: staff may jump states directly (e.g. NEW -> CLOSED for junk
/// complaints). Side effects are keyed on the target status only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComplaintStatus {
    New,
    Assigned,
    InProgress,
    ResolutionAnnounced,
    ConfirmedByStudent,
    Closed,
}

impl ComplaintStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ComplaintStatus::New => "NEW",
            ComplaintStatus::Assigned => "ASSIGNED",
            ComplaintStatus::InProgress => "IN_PROGRESS",
            ComplaintStatus::ResolutionAnnounced => "RESOLUTION_ANNOUNCED",
            ComplaintStatus::ConfirmedByStudent => "CONFIRMED_BY_STUDENT",
            ComplaintStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for ComplaintStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplaintStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NEW" => Ok(ComplaintStatus::New),
            "ASSIGNED" => Ok(ComplaintStatus::Assigned),
            "IN_PROGRESS" => Ok(ComplaintStatus::InProgress),
            "RESOLUTION_ANNOUNCED" => Ok(ComplaintStatus::ResolutionAnnounced),
            "CONFIRMED_BY_STUDENT" => Ok(ComplaintStatus::ConfirmedByStudent),
            "CLOSED" => Ok(ComplaintStatus::Closed),
            other => Err(format!("unknown complaint status: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_roundtrip() {
        for status in [
            ComplaintStatus::New,
            ComplaintStatus::Assigned,
            ComplaintStatus::InProgress,
            ComplaintStatus::ResolutionAnnounced,
            ComplaintStatus::ConfirmedByStudent,
            ComplaintStatus::Closed,
        ] {
            assert_eq!(status.as_str().parse::<ComplaintStatus>(), Ok(status));
        }
    }

    #[test]
    fn wire_values_are_screaming_snake() {
        let json = serde_json::to_string(&ComplaintStatus::ResolutionAnnounced).unwrap();
        assert_eq!(json, "\"RESOLUTION_ANNOUNCED\"");
        let json = serde_json::to_string(&Role::Student).unwrap();
        assert_eq!(json, "\"STUDENT\"");
    }
}
