//! Transcript mutations.
//!
//! Each mutation swaps in a freshly built `Arc<[Message]>`; readers that cloned
//! the previous sequence keep an unchanged view of it.

use std::sync::Arc;

use job_protocol::{Conversation, Message, Role};

/// Longest derived title, in characters, before the ellipsis.
pub const TITLE_MAX_CHARS: usize = 48;
const TITLE_ELLIPSIS: &str = "...";

/// Adds `message` at the end of the conversation.
///
/// The first user message of an untitled conversation also names it.
pub fn append(conversation: &mut Conversation, message: Message) {
    if message.role == Role::User
        && conversation.title.is_none()
        && !conversation
            .messages
            .iter()
            .any(|existing| existing.role == Role::User)
    {
        conversation.title = derive_title(&message.content);
    }

    let mut messages = Vec::with_capacity(conversation.messages.len() + 1);
    messages.extend(conversation.messages.iter().cloned());
    messages.push(message);
    conversation.messages = Arc::from(messages);
}

/// Replaces the content of the last message when it is an assistant message.
///
/// Returns `false` and leaves the transcript untouched otherwise; this never
/// creates a message.
pub fn replace_last(conversation: &mut Conversation, content: &str) -> bool {
    match conversation.messages.last() {
        Some(last) if last.role == Role::Assistant => {}
        _ => return false,
    }

    let mut messages = conversation.messages.to_vec();
    if let Some(last) = messages.last_mut() {
        last.content = content.to_owned();
    }
    conversation.messages = Arc::from(messages);
    true
}

/// First non-empty line of `content`, capped at [`TITLE_MAX_CHARS`].
pub fn derive_title(content: &str) -> Option<String> {
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())?;

    if line.chars().count() <= TITLE_MAX_CHARS {
        return Some(line.to_owned());
    }

    let mut title: String = line.chars().take(TITLE_MAX_CHARS).collect();
    title.truncate(title.trim_end().len());
    title.push_str(TITLE_ELLIPSIS);
    Some(title)
}
