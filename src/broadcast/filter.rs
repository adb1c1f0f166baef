use serde::{Deserialize, Serialize};

use crate::models::LogEntry;

/// Per-connection subscription criteria; every criterion present must match
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConnectionFilter {
    pub level: Option<String>,
    pub service: Option<String>,
    pub tag: Option<String>,
}

impl ConnectionFilter {
    /// Treat empty query values (`?level=`) as unset
    pub fn normalized(self) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            level: keep(self.level),
            service: keep(self.service),
            tag: keep(self.tag),
        }
    }

    pub fn matches(&self, entry: &LogEntry) -> bool {
        if self.level.as_ref().is_some_and(|level| *level != entry.level) {
            return false;
        }
        if self
            .service
            .as_ref()
            .is_some_and(|service| *service != entry.service)
        {
            return false;
        }
        if self.tag.as_ref().is_some_and(|tag| !entry.has_tag(tag)) {
            return false;
        }
        true
    }
}
