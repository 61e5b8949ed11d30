#![forbid(unsafe_code)]

//! `event-herald-ctl`: local CLI companion for `event-herald`.
//!
//! Connects to the IPC socket and sends JSON commands to the running relay:
//! manual job triggers, publication, and debug listings.

use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "event-herald-ctl",
    about = "Local CLI for the event-herald relay",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the server's `ipc_name` config).
    #[arg(long, default_value = "event-herald")]
    ipc_name: String,

    /// File holding the shared secret written by the server at start-up
    /// (the database path with an `ipc-token` extension).
    #[arg(long)]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a heartbeat now: poll, retry sweep and due daily jobs.
    Tick,

    /// Send the status report now.
    Report,

    /// Publish the digest thread for today now.
    Digest,

    /// Run the birthday check now.
    Birthdays,

    /// Publish one stored post.
    Publish {
        /// Post ID (the source message id).
        id: String,
    },

    /// Publish every pending post that has generated text.
    PublishPending,

    /// List recently ingested posts.
    Posts {
        /// Maximum number of posts.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// List recent operator log entries.
    Logs {
        /// Maximum number of entries.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },

    /// Show the scheduler state.
    State,

    /// Register or update a member birthday.
    AddBirthday {
        /// Member display name.
        name: String,
        /// Birthday as MM-DD, YYYY-MM-DD or M/D.
        date: String,
    },

    /// List registered members.
    Members,

    /// Resolve an X username to its user id.
    LookupUser {
        /// Username, with or without `@`.
        username: String,
    },

    /// List recent posts mentioning a user.
    Mentions {
        /// Username, with or without `@`.
        username: String,
    },

    /// Show past messages of the source channel.
    History {
        /// Maximum number of messages.
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

impl Command {
    fn to_request(&self) -> serde_json::Value {
        match self {
            Self::Tick => serde_json::json!({ "command": "tick" }),
            Self::Report => serde_json::json!({ "command": "report" }),
            Self::Digest => serde_json::json!({ "command": "digest" }),
            Self::Birthdays => serde_json::json!({ "command": "birthdays" }),
            Self::Publish { id } => serde_json::json!({ "command": "publish", "id": id }),
            Self::PublishPending => serde_json::json!({ "command": "publish-pending" }),
            Self::Posts { limit } => serde_json::json!({ "command": "posts", "limit": limit }),
            Self::Logs { limit } => serde_json::json!({ "command": "logs", "limit": limit }),
            Self::State => serde_json::json!({ "command": "state" }),
            Self::AddBirthday { name, date } => {
                serde_json::json!({ "command": "add-birthday", "name": name, "date": date })
            }
            Self::Members => serde_json::json!({ "command": "members" }),
            Self::LookupUser { username } => {
                serde_json::json!({ "command": "lookup-user", "username": username })
            }
            Self::Mentions { username } => {
                serde_json::json!({ "command": "mentions", "username": username })
            }
            Self::History { limit } => serde_json::json!({ "command": "history", "limit": limit }),
        }
    }
}

fn main() {
    let args = Cli::parse();

    let mut request_json = args.command.to_request();
    if let Some(ref path) = args.token_file {
        match std::fs::read_to_string(path) {
            Ok(token) => {
                request_json["auth_token"] = serde_json::Value::String(token.trim().to_owned());
            }
            Err(err) => {
                eprintln!("Failed to read token file {}: {err}", path.display());
                std::process::exit(1);
            }
        }
    }

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    match obj.get("data") {
                        Some(serde_json::Value::Null) | None => println!("OK"),
                        Some(data) => {
                            println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                        }
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to server: {err}");
            eprintln!("Is event-herald running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}
