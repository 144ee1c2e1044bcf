// Per-user state for the two-step attendance conversation.
//
// The flow is: `/attendance` -> student id -> password -> lookup. Each step is
// a plain message in the same channel, so sessions are keyed by both the
// user and the channel they started in.

use dashmap::DashMap;
use secrecy::SecretString;
use std::time::{Duration, Instant};

/// A session nobody answered within this long is treated as abandoned.
pub const SESSION_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct SessionKey {
    user_id: u64,
    channel_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttendanceStep {
    AwaitingId,
    AwaitingPassword { student_id: String },
}

#[derive(Debug)]
struct Session {
    step: AttendanceStep,
    touched: Instant,
}

/// What the transport should do with a message that arrived mid-flow.
#[derive(Debug)]
pub enum FlowReply {
    /// The id was captured; ask for the password next.
    AskPassword,
    /// Both values are in. The session is already gone at this point.
    Dispatch {
        student_id: String,
        password: SecretString,
    },
    /// The message was empty; repeat the current question.
    Reprompt(AttendanceStep),
}

/// All open attendance conversations.
///
/// **DashMap:**
/// Messages from different users are handled on different tasks, so the map
/// has to be shareable without a global lock.
#[derive(Default)]
pub struct AttendanceSessions {
    sessions: DashMap<SessionKey, Session>,
}

impl AttendanceSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the flow for this user in this channel.
    pub fn begin(&self, user_id: u64, channel_id: u64) {
        self.sessions.insert(
            SessionKey { user_id, channel_id },
            Session {
                step: AttendanceStep::AwaitingId,
                touched: Instant::now(),
            },
        );
    }

    /// Drop the flow. Returns whether one was open.
    pub fn cancel(&self, user_id: u64, channel_id: u64) -> bool {
        self.sessions
            .remove(&SessionKey { user_id, channel_id })
            .map(|(_, session)| !is_stale(&session, Instant::now()))
            .unwrap_or(false)
    }

    pub fn is_active(&self, user_id: u64, channel_id: u64) -> bool {
        self.sessions
            .get(&SessionKey { user_id, channel_id })
            .map(|session| !is_stale(&session, Instant::now()))
            .unwrap_or(false)
    }

    /// Feed one message into the flow. `None` when this user has no open
    /// session here, in which case the message is not ours to handle.
    pub fn advance(&self, user_id: u64, channel_id: u64, text: &str) -> Option<FlowReply> {
        self.advance_at(user_id, channel_id, text, Instant::now())
    }

    fn advance_at(&self, user_id: u64, channel_id: u64, text: &str, now: Instant) -> Option<FlowReply> {
        let key = SessionKey { user_id, channel_id };
        let text = text.trim();

        let mut session = self.sessions.get_mut(&key)?;
        if is_stale(&session, now) {
            drop(session);
            self.sessions.remove(&key);
            return None;
        }

        if text.is_empty() {
            session.touched = now;
            return Some(FlowReply::Reprompt(session.step.clone()));
        }

        match &session.step {
            AttendanceStep::AwaitingId => {
                session.step = AttendanceStep::AwaitingPassword {
                    student_id: text.to_string(),
                };
                session.touched = now;
                Some(FlowReply::AskPassword)
            }
            AttendanceStep::AwaitingPassword { student_id } => {
                let student_id = student_id.clone();
                // Release the shard lock before removing from the same map.
                drop(session);
                self.sessions.remove(&key);
                Some(FlowReply::Dispatch {
                    student_id,
                    password: SecretString::from(text.to_string()),
                })
            }
        }
    }
}

fn is_stale(session: &Session, now: Instant) -> bool {
    now.saturating_duration_since(session.touched) > SESSION_TTL
}
