//! Partial update payloads.
//!
//! Every mutable field distinguishes "not supplied" from "supplied". For
//! nullable fields the inner option distinguishes "set to a value" from
//! "cleared", so `{"assigned_to": null}` unassigns while an absent
//! `assigned_to` leaves the assignee alone.

use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::UpdateError;
use crate::model::Status;

/// Wire shape of a partial update, as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub assigned_to: Option<Option<i64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub resolution_notes: Option<Option<String>>,

    /// RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC).
    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub due_at: Option<Option<String>>,

    #[serde(
        default,
        deserialize_with = "supplied",
        skip_serializing_if = "Option::is_none"
    )]
    pub recurrence_rule: Option<Option<String>>,
}

/// A present key (even `null`) deserializes to `Some(..)`; an absent key
/// falls back to `default`.
fn supplied<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Typed form of [`UpdatePayload`] consumed by the planner.
///
/// Text values are trimmed and blank strings are folded into `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRequest {
    pub status: Option<Status>,
    pub assigned_to: Option<Option<i64>>,
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub resolution_notes: Option<Option<String>>,
    pub due_at_us: Option<Option<i64>>,
    pub recurrence_rule: Option<Option<String>>,
}

impl UpdateRequest {
    /// Parse and normalize a wire payload.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Validation`] for an unrecognized status value
    /// or a malformed due date.
    pub fn from_payload(payload: &UpdatePayload) -> Result<Self, UpdateError> {
        let status = payload
            .status
            .as_deref()
            .map(|raw| {
                raw.parse::<Status>()
                    .map_err(|_| UpdateError::invalid(format!("unknown status '{raw}'")))
            })
            .transpose()?;

        let due_at_us = match &payload.due_at {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) if raw.trim().is_empty() => Some(None),
            Some(Some(raw)) => Some(Some(parse_due(raw)?)),
        };

        Ok(Self {
            status,
            assigned_to: payload.assigned_to,
            title: payload.title.as_ref().map(|t| t.trim().to_string()),
            description: payload.description.as_ref().map(|v| normalize_text(v.as_deref())),
            resolution_notes: payload
                .resolution_notes
                .as_ref()
                .map(|v| normalize_text(v.as_deref())),
            due_at_us,
            recurrence_rule: payload
                .recurrence_rule
                .as_ref()
                .map(|v| normalize_text(v.as_deref())),
        })
    }

    /// True when the caller supplied no field at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.assigned_to.is_none()
            && self.title.is_none()
            && self.description.is_none()
            && self.resolution_notes.is_none()
            && self.due_at_us.is_none()
            && self.recurrence_rule.is_none()
    }
}

/// Trim, and fold whitespace-only text into `None`.
pub(crate) fn normalize_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse a due date given as RFC 3339 or `YYYY-MM-DD` (midnight UTC).
///
/// # Errors
///
/// Returns [`UpdateError::Validation`] when neither form matches.
pub fn parse_due(raw: &str) -> Result<i64, UpdateError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.timestamp_micros());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp_micros())
        .ok_or_else(|| {
            UpdateError::invalid(format!(
                "malformed due date '{raw}' (expected RFC 3339 or YYYY-MM-DD)"
            ))
        })
}
