//! REPL – interactive shell over the memory facade.
//!
//! Supported slash-commands:
//!   /chambers                 – list chambers
//!   /new <name> <persona...>  – create a chamber and select it
//!   /use <chamber-id>         – select a chamber
//!   /say <persona> <text>     – store a user message
//!   /reply <persona> <text>   – store an agent message
//!   /messages                 – show the selected chamber
//!   /search <text>            – substring search across chambers
//!   /assoc <message-id>       – associated memories of a message
//!   /consolidate              – run a consolidation cycle now
//!   /delete <message-id>      – delete one message
//!   /purge <days>             – delete messages older than <days>
//!   /rotate                   – rotate the selected chamber's key
//!   /backends                 – storage backend health
//!   /help
//!   /quit | /exit

use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use engram_memory::MemoryFacade;
use engram_types::{ConsolidationOutcome, Message};
use tokio::runtime::Runtime;
use uuid::Uuid;

/// A parsed REPL line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chambers,
    New { name: String, personas: Vec<String> },
    Use(Uuid),
    Say { persona: String, text: String },
    Reply { persona: String, text: String },
    Messages,
    Search(String),
    Assoc(Uuid),
    Consolidate,
    Delete(Uuid),
    Purge { days: u32 },
    Rotate,
    Backends,
    Help,
    Quit,
}

/// Parse one input line. The error is a message for the user.
pub fn parse_command(line: &str) -> Result<Command, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head {
        "/chambers" => Ok(Command::Chambers),
        "/new" => {
            let mut words = rest.split_whitespace();
            let name = words.next().ok_or("usage: /new <name> <persona...>")?;
            let personas: Vec<String> = words.map(str::to_string).collect();
            if personas.is_empty() {
                return Err("a chamber needs at least one persona".into());
            }
            Ok(Command::New { name: name.to_string(), personas })
        }
        "/use" => parse_id(rest, "/use <chamber-id>").map(Command::Use),
        "/say" | "/reply" => {
            let (persona, text) = rest
                .split_once(char::is_whitespace)
                .map(|(p, t)| (p, t.trim()))
                .filter(|(_, t)| !t.is_empty())
                .ok_or_else(|| format!("usage: {head} <persona> <text>"))?;
            let (persona, text) = (persona.to_string(), text.to_string());
            if head == "/say" {
                Ok(Command::Say { persona, text })
            } else {
                Ok(Command::Reply { persona, text })
            }
        }
        "/messages" => Ok(Command::Messages),
        "/search" => {
            if rest.is_empty() {
                Err("usage: /search <text>".into())
            } else {
                Ok(Command::Search(rest.to_string()))
            }
        }
        "/assoc" => parse_id(rest, "/assoc <message-id>").map(Command::Assoc),
        "/consolidate" => Ok(Command::Consolidate),
        "/delete" => parse_id(rest, "/delete <message-id>").map(Command::Delete),
        "/purge" => rest
            .parse::<u32>()
            .map(|days| Command::Purge { days })
            .map_err(|_| "usage: /purge <days>".to_string()),
        "/rotate" => Ok(Command::Rotate),
        "/backends" => Ok(Command::Backends),
        "/help" => Ok(Command::Help),
        "/quit" | "/exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}'")),
    }
}

fn parse_id(raw: &str, usage: &str) -> Result<Uuid, String> {
    if raw.is_empty() {
        return Err(format!("usage: {usage}"));
    }
    Uuid::parse_str(raw).map_err(|_| format!("'{raw}' is not a valid id"))
}

/// REPL session state.
pub struct Session {
    facade: Arc<MemoryFacade>,
    runtime: Arc<Runtime>,
    current: Option<Uuid>,
}

impl Session {
    pub fn new(facade: Arc<MemoryFacade>, runtime: Arc<Runtime>) -> Self {
        Self { facade, runtime, current: None }
    }

    /// Read commands until EOF, `/quit` or `shutdown` is set.
    pub fn run(&mut self, shutdown: Arc<AtomicBool>) {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            if shutdown.load(Ordering::SeqCst) {
                break;
            }

            print!("{} ", self.prompt());
            stdout.flush().ok();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => break, // EOF
                Ok(_) => {}
                Err(e) => {
                    eprintln!("{}: {}", "Read error".red(), e);
                    break;
                }
            }
            if line.trim().is_empty() {
                continue;
            }

            match parse_command(&line) {
                Ok(Command::Quit) => {
                    println!("{}", "Goodbye.".green());
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(cmd) => {
                    if let Err(e) = self.execute(cmd) {
                        println!("{} {}", "✗".red().bold(), e);
                    }
                }
                Err(e) => println!(
                    "{} {}. Type {} for available commands.",
                    "✗".red().bold(),
                    e,
                    "/help".bold()
                ),
            }
        }
    }

    fn prompt(&self) -> String {
        match self.current {
            Some(id) => format!("{}{}{}", "engram:".bold().cyan(), short(id).cyan(), ">".bold().cyan()),
            None => "engram>".bold().cyan().to_string(),
        }
    }

    fn selected(&self) -> Result<Uuid, String> {
        self.current
            .ok_or_else(|| "no chamber selected; use /new or /use first".to_string())
    }

    fn execute(&mut self, cmd: Command) -> Result<(), String> {
        let facade = Arc::clone(&self.facade);
        match cmd {
            Command::Chambers => {
                let chambers = facade.list_chambers().map_err(|e| e.to_string())?;
                if chambers.is_empty() {
                    println!("  {}", "no chambers yet".dimmed());
                }
                for chamber in chambers {
                    let personas: Vec<&str> =
                        chamber.participants.iter().map(|p| p.name.as_str()).collect();
                    let marker = if Some(chamber.id) == self.current { "*" } else { " " };
                    println!(
                        " {} {}  {}  [{}]",
                        marker.green(),
                        chamber.id.to_string().dimmed(),
                        chamber.name.bold(),
                        personas.join(", ")
                    );
                }
            }
            Command::New { name, personas } => {
                let names: Vec<&str> = personas.iter().map(String::as_str).collect();
                let chamber = facade.create_chamber(&name, &names).map_err(|e| e.to_string())?;
                println!("  {} chamber {} ({})", "✓".green(), chamber.name.bold(), chamber.id);
                self.current = Some(chamber.id);
            }
            Command::Use(id) => {
                let chamber = facade.get_chamber(id).map_err(|e| e.to_string())?;
                println!("  using {}", chamber.name.bold());
                self.current = Some(id);
            }
            Command::Say { persona, text } => self.store(&persona, &text, true)?,
            Command::Reply { persona, text } => self.store(&persona, &text, false)?,
            Command::Messages => {
                let chamber = self.selected()?;
                let messages = self
                    .runtime
                    .block_on(facade.get_messages(chamber))
                    .map_err(|e| e.to_string())?;
                if messages.is_empty() {
                    println!("  {}", "no messages".dimmed());
                }
                messages.iter().for_each(print_message);
            }
            Command::Search(text) => {
                let hits = self.runtime.block_on(facade.search(&text));
                println!("  {} match(es)", hits.len());
                hits.iter().for_each(print_message);
            }
            Command::Assoc(message) => {
                let chamber = self.selected()?;
                let linked = self
                    .runtime
                    .block_on(facade.get_associated_memories(message, chamber))
                    .map_err(|e| e.to_string())?;
                if linked.is_empty() {
                    println!("  {}", "no associated memories".dimmed());
                }
                linked.iter().for_each(print_message);
            }
            Command::Consolidate => {
                let report = self
                    .runtime
                    .block_on(facade.consolidate_now())
                    .map_err(|e| e.to_string())?;
                println!(
                    "  examined {}  consolidated {}  deferred {}  failed {}  ({} bytes)",
                    report.examined,
                    report.consolidated.to_string().green(),
                    report.deferred.to_string().yellow(),
                    report.failed.to_string().red(),
                    report.bytes_written
                );
                for (id, outcome) in &report.outcomes {
                    match outcome {
                        ConsolidationOutcome::Consolidated { backend, .. } => {
                            println!("    {} {} → {}", "✓".green(), short(*id), backend)
                        }
                        ConsolidationOutcome::Deferred(reason) => {
                            println!("    {} {} {}", "·".yellow(), short(*id), reason)
                        }
                        ConsolidationOutcome::Failed(err) => {
                            println!("    {} {} {}", "✗".red(), short(*id), err)
                        }
                    }
                }
            }
            Command::Delete(message) => {
                self.runtime
                    .block_on(facade.delete_memory(message))
                    .map_err(|e| e.to_string())?;
                println!("  {} deleted", "✓".green());
            }
            Command::Purge { days } => {
                let chamber = self.selected()?;
                let purged = self
                    .runtime
                    .block_on(facade.purge_older_than(chamber, chrono::Duration::days(days.into())))
                    .map_err(|e| e.to_string())?;
                println!("  {} {} message(s) purged", "✓".green(), purged);
            }
            Command::Rotate => {
                let chamber = self.selected()?;
                let count = self
                    .runtime
                    .block_on(facade.rotate_chamber_key(chamber))
                    .map_err(|e| e.to_string())?;
                println!("  {} key rotated, {} message(s) re-encrypted", "✓".green(), count);
            }
            Command::Backends => {
                for backend in facade.router().health() {
                    let status = if backend.configured {
                        "configured".green()
                    } else {
                        "not configured".yellow()
                    };
                    println!("  {:>3}  {:<16} {}", backend.priority, backend.name.bold(), status);
                }
            }
            Command::Help => cmd_help(),
            Command::Quit => {}
        }
        Ok(())
    }

    fn store(&self, persona: &str, text: &str, is_user: bool) -> Result<(), String> {
        let chamber = self.selected()?;
        let message = self
            .runtime
            .block_on(self.facade.store_memory(text, is_user, Some(persona), chamber))
            .map_err(|e| e.to_string())?;
        println!("  {} {}", "✓".green(), message.id.to_string().dimmed());
        Ok(())
    }
}

fn short(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

fn print_message(message: &Message) {
    let who = message.persona.as_deref().unwrap_or("?");
    let who = if message.is_user { who.bold().blue() } else { who.bold().magenta() };
    println!(
        "  {} {} {}: {}",
        message.created_at.format("%Y-%m-%d %H:%M").to_string().dimmed(),
        message.id.to_string().dimmed(),
        who,
        message.content
    );
}

fn cmd_help() {
    println!();
    println!("{}", "Engram Commands".bold().underline());
    println!("  {}                 – list chambers", "/chambers".bold().cyan());
    println!("  {}  – create and select a chamber", "/new <name> <persona...>".bold().cyan());
    println!("  {}          – select a chamber", "/use <chamber-id>".bold().cyan());
    println!("  {}      – store a user message", "/say <persona> <text>".bold().cyan());
    println!("  {}    – store an agent message", "/reply <persona> <text>".bold().cyan());
    println!("  {}                 – show the selected chamber", "/messages".bold().cyan());
    println!("  {}            – search every chamber", "/search <text>".bold().cyan());
    println!("  {}       – associated memories", "/assoc <message-id>".bold().cyan());
    println!("  {}              – run a consolidation cycle", "/consolidate".bold().cyan());
    println!("  {}      – delete a message", "/delete <message-id>".bold().cyan());
    println!("  {}             – delete old messages", "/purge <days>".bold().cyan());
    println!("  {}                   – rotate the chamber key", "/rotate".bold().cyan());
    println!("  {}                 – storage backend health", "/backends".bold().cyan());
    println!("  {}              – exit", "/quit  /exit".bold().cyan());
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("/chambers"), Ok(Command::Chambers));
        assert_eq!(parse_command("  /messages  "), Ok(Command::Messages));
        assert_eq!(parse_command("/exit"), Ok(Command::Quit));
        assert_eq!(parse_command("/quit"), Ok(Command::Quit));
        assert_eq!(parse_command("/rotate"), Ok(Command::Rotate));
    }

    #[test]
    fn new_requires_a_persona() {
        assert_eq!(
            parse_command("/new travel alice bob"),
            Ok(Command::New {
                name: "travel".into(),
                personas: vec!["alice".into(), "bob".into()],
            })
        );
        assert!(parse_command("/new travel").is_err());
        assert!(parse_command("/new").is_err());
    }

    #[test]
    fn say_and_reply_keep_the_full_text() {
        assert_eq!(
            parse_command("/say alice I moved to  Lisbon"),
            Ok(Command::Say { persona: "alice".into(), text: "I moved to  Lisbon".into() })
        );
        assert_eq!(
            parse_command("/reply assistant noted"),
            Ok(Command::Reply { persona: "assistant".into(), text: "noted".into() })
        );
        assert!(parse_command("/say alice").is_err());
        assert!(parse_command("/say").is_err());
    }

    #[test]
    fn id_commands_validate_uuids() {
        let id = Uuid::new_v4();
        assert_eq!(parse_command(&format!("/use {id}")), Ok(Command::Use(id)));
        assert_eq!(parse_command(&format!("/assoc {id}")), Ok(Command::Assoc(id)));
        assert_eq!(parse_command(&format!("/delete {id}")), Ok(Command::Delete(id)));
        assert!(parse_command("/use not-an-id").is_err());
        assert!(parse_command("/delete").is_err());
    }

    #[test]
    fn search_and_purge_arguments() {
        assert_eq!(parse_command("/search hello world"), Ok(Command::Search("hello world".into())));
        assert!(parse_command("/search").is_err());
        assert_eq!(parse_command("/purge 30"), Ok(Command::Purge { days: 30 }));
        assert!(parse_command("/purge soon").is_err());
    }

    #[test]
    fn unknown_command_is_reported() {
        let err = parse_command("/frobnicate").unwrap_err();
        assert!(err.contains("/frobnicate"));
    }
}
