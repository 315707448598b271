//! Single authorization gate for inbound chats.

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    Denied,
}

/// Only the configured owner may talk to the bot.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer {
    owner: i64,
}

impl Authorizer {
    pub fn new(owner: i64) -> Self {
        Self { owner }
    }

    pub fn check(&self, chat_id: i64) -> Access {
        if chat_id == self.owner {
            Access::Granted
        } else {
            Access::Denied
        }
    }
}
