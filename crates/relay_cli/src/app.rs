use std::io;
use std::sync::Arc;

use job_protocol::ConversationId;
use job_relay::Coordinator;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};
use crate::render::TranscriptEcho;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Line-oriented host around a [`Coordinator`].
pub struct App<W> {
    coordinator: Coordinator,
    output: W,
    echo: TranscriptEcho,
}

impl<W: AsyncWrite + Unpin> App<W> {
    pub fn new(coordinator: Coordinator, output: W) -> Self {
        Self {
            coordinator,
            output,
            echo: TranscriptEcho::default(),
        }
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn into_output(self) -> W {
        self.output
    }

    /// Reads lines until `/quit` or end of input, interleaving job events.
    ///
    /// At end of input the running job, if any, is awaited before returning.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> io::Result<()> {
        let mut lines = input.lines();
        self.flush_transcript().await?;

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        self.coordinator.run_until_settled().await;
                        break;
                    };
                    if self.handle_line(&line).await? == Flow::Quit {
                        break;
                    }
                }
                Some(event) = self.coordinator.next_event() => {
                    self.coordinator.handle_event(event);
                }
            }
            self.flush_transcript().await?;
        }

        self.flush_transcript().await?;
        self.coordinator.flush_snapshots().await;
        self.output.write_all(b"\n").await?;
        self.output.flush().await
    }

    async fn handle_line(&mut self, line: &str) -> io::Result<Flow> {
        match parse_slash_command(line) {
            Some(SlashCommand::Help) => self.notice(HELP_TEXT).await?,
            Some(SlashCommand::New) => {
                self.coordinator.create_conversation();
            }
            Some(SlashCommand::Cancel) => match self.coordinator.cancel() {
                Ok(Some(job_id)) => self.notice(&format!("cancelled {job_id}")).await?,
                Ok(None) => self.notice("no job is running").await?,
                Err(error) => self.notice(&error.to_string()).await?,
            },
            Some(SlashCommand::Quit) => return Ok(Flow::Quit),
            Some(SlashCommand::Unknown(command)) => {
                self.notice(&format!("unknown command {command}, try /help"))
                    .await?;
            }
            None if line.trim().is_empty() => {}
            None => {
                let conversation = self.current_conversation();
                if let Err(error) = self.coordinator.submit(&conversation, line).await {
                    tracing::debug!(%error, "submission rejected");
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn current_conversation(&mut self) -> ConversationId {
        let current = self
            .coordinator
            .state()
            .read(|state| state.current_conversation_id.clone());
        match current {
            Some(id) => id,
            None => self.coordinator.create_conversation(),
        }
    }

    async fn notice(&mut self, text: &str) -> io::Result<()> {
        self.output.write_all(format!("\n{text}").as_bytes()).await
    }

    async fn flush_transcript(&mut self) -> io::Result<()> {
        let current = self.coordinator.state().read(|state| {
            state
                .current_conversation()
                .map(|conversation| (conversation.id.clone(), Arc::clone(&conversation.messages)))
        });
        let Some((id, messages)) = current else {
            return Ok(());
        };

        let text = self.echo.render(&id, &messages);
        if !text.is_empty() {
            self.output.write_all(text.as_bytes()).await?;
            self.output.flush().await?;
        }
        Ok(())
    }
}
