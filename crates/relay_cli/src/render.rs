use job_protocol::{ConversationId, Message, Role};

pub fn format_message(message: &Message) -> String {
    let label = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    format!("{label}: {}", message.content)
}

/// Turns successive transcript states into terminal output.
///
/// Streaming updates to the last message print only the new suffix; anything
/// else reprints the message on a fresh line.
#[derive(Debug, Default)]
pub struct TranscriptEcho {
    conversation: Option<ConversationId>,
    printed: usize,
    tail: String,
}

impl TranscriptEcho {
    pub fn render(&mut self, conversation: &ConversationId, messages: &[Message]) -> String {
        if self.conversation.as_ref() != Some(conversation) {
            self.conversation = Some(conversation.clone());
            self.printed = 0;
            self.tail.clear();
        }
        self.printed = self.printed.min(messages.len());

        let mut out = String::new();
        if let Some(last) = self.printed.checked_sub(1).map(|index| &messages[index]) {
            if last.content != self.tail {
                match last.content.strip_prefix(self.tail.as_str()) {
                    Some(suffix) => out.push_str(suffix),
                    None => {
                        out.push('\n');
                        out.push_str(&format_message(last));
                    }
                }
                self.tail = last.content.clone();
            }
        }

        for message in &messages[self.printed..] {
            if self.printed > 0 {
                out.push('\n');
            }
            out.push_str(&format_message(message));
            self.printed += 1;
            self.tail = message.content.clone();
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streamed_growth_prints_only_the_suffix() {
        let conversation = ConversationId::new("c1");
        let mut echo = TranscriptEcho::default();

        let first = echo.render(&conversation, &[Message::user("hi")]);
        let second = echo.render(
            &conversation,
            &[Message::user("hi"), Message::assistant("Hel")],
        );
        let third = echo.render(
            &conversation,
            &[Message::user("hi"), Message::assistant("Hello")],
        );

        assert_eq!(first, "you: hi");
        assert_eq!(second, "\nassistant: Hel");
        assert_eq!(third, "lo");
        assert_eq!(
            echo.render(
                &conversation,
                &[Message::user("hi"), Message::assistant("Hello")]
            ),
            ""
        );
    }

    #[test]
    fn rewritten_last_message_is_reprinted() {
        let conversation = ConversationId::new("c1");
        let mut echo = TranscriptEcho::default();
        echo.render(&conversation, &[Message::assistant("draft")]);

        let out = echo.render(&conversation, &[Message::assistant("final")]);

        assert_eq!(out, "\nassistant: final");
    }

    #[test]
    fn switching_conversation_starts_over() {
        let mut echo = TranscriptEcho::default();
        echo.render(&ConversationId::new("a"), &[Message::user("one")]);

        let out = echo.render(&ConversationId::new("b"), &[]);

        assert_eq!(out, "");
        assert_eq!(
            echo.render(&ConversationId::new("b"), &[Message::user("two")]),
            "you: two"
        );
    }
}
