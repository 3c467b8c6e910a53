use clap::{Parser, Subcommand};
use persona_agent::{Agent, RunInput};
use std::path::PathBuf;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

pub const DEFAULT_CLI_SESSION: &str = "cli_session";

#[derive(Parser, Debug)]
#[command(name = "persona", version, about = "Persona chatbot server and terminal client")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Chat with the agent in the terminal
    Chat {
        /// Session to continue
        #[arg(long, default_value = DEFAULT_CLI_SESSION)]
        session: String,
    },

    /// Write a consistent copy of the database to DEST
    Backup {
        dest: PathBuf,
    },

    /// Replace the database with a backup
    Restore {
        src: PathBuf,

        /// Overwrite an existing database
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Read lines from `input` and answer each with the agent until EOF or quit.
pub async fn run_chat<R, W>(
    agent: &Agent,
    session_id: &str,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    output
        .write_all(format!("=== Chatting with {} ===\n", agent.name()).as_bytes())
        .await?;
    output
        .write_all(b"Type 'quit' or 'exit' to leave.\n\n")
        .await?;

    let mut lines = input.lines();
    loop {
        output.write_all(b"You: ").await?;
        output.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message.eq_ignore_ascii_case("quit") || message.eq_ignore_ascii_case("exit") {
            break;
        }

        let reply = match agent
            .run(RunInput::new(message).with_session(session_id))
            .await
        {
            Ok(run) => format!("\nAgent: {}\n\n", run.content),
            Err(e) => format!("\nError: {}\n\n", e),
        };
        output.write_all(reply.as_bytes()).await?;
    }

    output.write_all(b"Goodbye!\n").await?;
    output.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["persona"]).unwrap();
        assert_eq!(cli.command(), Commands::Serve);
    }

    #[test]
    fn test_chat_session_default() {
        let cli = Cli::try_parse_from(["persona", "chat"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Chat {
                session: DEFAULT_CLI_SESSION.to_string()
            }
        );
    }

    #[test]
    fn test_restore_flags() {
        let cli = Cli::try_parse_from(["persona", "restore", "backup.db", "--force"]).unwrap();
        assert_eq!(
            cli.command(),
            Commands::Restore {
                src: PathBuf::from("backup.db"),
                force: true
            }
        );
    }
}
