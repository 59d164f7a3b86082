use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one host event. Settings are scoped per event.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    pub fn for_slugs(organizer: &str, event: &str) -> Self {
        Self(format!("{organizer}/{event}"))
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The slice of a host event the plugin reads when rendering or routing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    pub id: EventId,
    pub organizer: String,
    pub slug: String,
    pub currency: String,
}

impl EventContext {
    pub fn new(
        organizer: impl Into<String>,
        slug: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        let organizer = organizer.into();
        let slug = slug.into();
        Self {
            id: EventId::for_slugs(&organizer, &slug),
            organizer,
            slug,
            currency: currency.into(),
        }
    }
}
