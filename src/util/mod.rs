use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub(crate) fn parse_rfc3339(raw: &str) -> Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid RFC3339 timestamp in DB: {raw}"))?;
    Ok(parsed.with_timezone(&Utc))
}

pub(crate) fn parse_rfc3339_opt(raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    match raw {
        Some(value) => Ok(Some(parse_rfc3339(&value)?)),
        None => Ok(None),
    }
}
