// The three things a user can do with an email card. Button ids are decoded
// into `EmailButton` once, at the transport boundary.

/// Prefix shared by every email button id.
const PREFIX: &str = "email";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailAction {
    Expand(String),
    CreateEvent(String),
    Ignore(String),
}

impl EmailAction {
    pub fn tag(&self) -> &'static str {
        match self {
            EmailAction::Expand(_) => "expand",
            EmailAction::CreateEvent(_) => "calendar",
            EmailAction::Ignore(_) => "ignore",
        }
    }

    pub fn email_id(&self) -> &str {
        match self {
            EmailAction::Expand(id) | EmailAction::CreateEvent(id) | EmailAction::Ignore(id) => id,
        }
    }

    /// True when the id belongs to an email card, even if the tag is unknown.
    pub fn is_email_component(custom_id: &str) -> bool {
        custom_id
            .split_once(':')
            .map(|(prefix, _)| prefix == PREFIX)
            .unwrap_or(false)
    }
}

/// A decoded email card button: what to do, and whose card it is.
///
/// Cards are only actionable by the user who fetched them, so the owner
/// travels in the button id as `email:<tag>:<owner_id>:<email_id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailButton {
    pub owner_id: u64,
    pub action: EmailAction,
}

impl EmailButton {
    pub fn new(owner_id: u64, action: EmailAction) -> Self {
        Self { owner_id, action }
    }

    /// Gmail ids are hex, so they never contain the separator.
    pub fn custom_id(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            PREFIX,
            self.action.tag(),
            self.owner_id,
            self.action.email_id()
        )
    }

    /// Decode a button id. `None` for anything this bot did not produce.
    pub fn parse(custom_id: &str) -> Option<Self> {
        let mut parts = custom_id.splitn(4, ':');
        if parts.next()? != PREFIX {
            return None;
        }
        let tag = parts.next()?;
        let owner_id = parts.next()?.parse::<u64>().ok()?;
        let id = parts.next().filter(|id| !id.is_empty())?.to_string();

        let action = match tag {
            "expand" => EmailAction::Expand(id),
            "calendar" => EmailAction::CreateEvent(id),
            "ignore" => EmailAction::Ignore(id),
            _ => return None,
        };
        Some(Self { owner_id, action })
    }

    pub fn is_owned_by(&self, user_id: u64) -> bool {
        self.owner_id == user_id
    }
}
