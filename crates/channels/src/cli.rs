//! CLI channel: questions from stdin, answers to stdout.
//!
//! Used by `reasonloop ask` in interactive mode.

use async_trait::async_trait;
use reasonloop_core::channel::{Channel, ChannelId, ChannelMessage};
use reasonloop_core::error::ChannelError;
use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::debug;

/// Lines that end an interactive session.
const EXIT_COMMANDS: &[&str] = &["exit", "quit", "/exit", "/quit", ":q"];

/// Interactive terminal channel.
pub struct CliChannel {
    id: ChannelId,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            id: ChannelId("cli".into()),
        }
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

pub fn is_exit_command(line: &str) -> bool {
    EXIT_COMMANDS.contains(&line.trim())
}

/// Forward non-empty lines from `reader` until EOF, an exit command, or the
/// receiver going away.
fn spawn_reader<R>(
    reader: R,
    channel_id: ChannelId,
    tx: mpsc::Sender<Result<ChannelMessage, ChannelError>>,
) -> tokio::task::JoinHandle<()>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = reader.lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }

                    if is_exit_command(&line) {
                        debug!("Exit command received");
                        break;
                    }

                    let msg = ChannelMessage {
                        channel_id: channel_id.clone(),
                        sender_id: "local_user".into(),
                        sender_name: Some("User".into()),
                        content: line,
                        chat_id: "cli_session".into(),
                    };

                    if tx.send(Ok(msg)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    fn id(&self) -> &ChannelId {
        &self.id
    }

    async fn start(
        &self,
    ) -> Result<mpsc::Receiver<Result<ChannelMessage, ChannelError>>, ChannelError> {
        let (tx, rx) = mpsc::channel(32);
        spawn_reader(BufReader::new(io::stdin()), self.id.clone(), tx);
        Ok(rx)
    }

    async fn send(&self, _chat_id: &str, content: &str) -> Result<(), ChannelError> {
        println!("{content}");
        Ok(())
    }

    fn is_allowed(&self, _sender_id: &str) -> bool {
        true // local user
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_channel_properties() {
        let ch = CliChannel::new();
        assert_eq!(ch.name(), "cli");
        assert_eq!(ch.id().0, "cli");
        assert!(ch.is_allowed("anyone"));
    }

    #[test]
    fn exit_commands_recognized() {
        assert!(is_exit_command("quit"));
        assert!(is_exit_command("  /exit "));
        assert!(!is_exit_command("quit smoking"));
    }

    #[tokio::test]
    async fn reader_skips_blank_lines_and_stops_on_exit() {
        let input: &'static [u8] = b"How do I focus?\n\n   \nWhy is CI slow?\nexit\nignored\n";
        let (tx, mut rx) = mpsc::channel(8);
        spawn_reader(BufReader::new(input), ChannelId("cli".into()), tx)
            .await
            .unwrap();

        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content, "How do I focus?");
        assert_eq!(first.chat_id, "cli_session");
        let second = rx.recv().await.unwrap().unwrap();
        assert_eq!(second.content, "Why is CI slow?");
        assert!(rx.recv().await.is_none());
    }
}
