//! Interactive shell
//!
//! A line-oriented front-end over the engine and the profile store: activate a
//! device, bind controls with MIDI learn, save and reload profiles. Messages
//! received on the driver thread are queued and printed before each prompt.

use anyhow::{anyhow, bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::engine::{CallbackId, MidiEvent, MidiProcessor};
use crate::error::Error;
use crate::midi::{format_hex, format_monitor, parse_message, MidiMessage};
use crate::monitor;
use crate::persistence::{LoadOutcome, ProfileStore};
use crate::profile::{ActionType, DeviceProfile, MessageType, PropertyId};
use crate::queue::SpscQueue;

/// Received messages buffered between two prompts
const EVENT_QUEUE_CAPACITY: usize = 64;

const HELP: &str = "\
Commands:
  devices                      List MIDI input devices
  activate <device>            Activate a device and load its saved profile
  deactivate                   Close the device ports
  show                         Print the active profile
  add-input | add-output       Append a property
  set <id> type <none|note|cc>
  set <id> action <none|volume|mute|command|open>
  set <id> toggle <on|off>
  set <id> command <text>
  set <id> path <file>
  set <id> message <b0 b1 b2>  Works on input and output properties
  learn <id>                   Capture the next incoming message into <id>
  remove <id>                  Remove a property
  send <b0 b1 b2>              Transmit a message to the device
  sync                         Transmit every output property
  process <b0 b1 b2>           Dispatch a message as if it was received
  inject <b0 b1 b2>            Simulate incoming traffic (test mode)
  save | load | forget         Write, reload or delete the saved profile
  log                          Print and clear the message log
  help | quit

Bytes are hex (B0 07 7F); start with 'dec' for decimal (dec 176 7 127).";

/// Property field edited by `set`
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    MessageType(MessageType),
    Action(ActionType),
    Toggle(bool),
    Command(String),
    Path(PathBuf),
    Message(MidiMessage),
}

/// One parsed shell line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Devices,
    Activate(String),
    Deactivate,
    Show,
    AddInput,
    AddOutput,
    Set { id: PropertyId, field: Field },
    Learn(PropertyId),
    Remove(PropertyId),
    Send(MidiMessage),
    Sync,
    Process(MidiMessage),
    Inject(MidiMessage),
    Save,
    Load,
    Forget,
    Log,
    Quit,
}

impl Command {
    /// Parse a non-empty shell line
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word {
            "help" | "?" => Command::Help,
            "devices" => Command::Devices,
            "activate" => {
                if rest.is_empty() {
                    bail!("usage: activate <device>");
                }
                Command::Activate(rest.to_string())
            }
            "deactivate" => Command::Deactivate,
            "show" => Command::Show,
            "add-input" => Command::AddInput,
            "add-output" => Command::AddOutput,
            "set" => {
                let (id, rest) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow!("usage: set <id> <field> <value>"))?;
                let (field, value) = match rest.trim().split_once(char::is_whitespace) {
                    Some((field, value)) => (field, value.trim()),
                    None => bail!("usage: set <id> <field> <value>"),
                };
                Command::Set {
                    id: parse_id(id)?,
                    field: parse_field(field, value)?,
                }
            }
            "learn" => Command::Learn(parse_id(rest)?),
            "remove" => Command::Remove(parse_id(rest)?),
            "send" => Command::Send(parse_bytes(rest)?),
            "sync" => Command::Sync,
            "process" => Command::Process(parse_bytes(rest)?),
            "inject" => Command::Inject(parse_bytes(rest)?),
            "save" => Command::Save,
            "load" => Command::Load,
            "forget" => Command::Forget,
            "log" => Command::Log,
            "quit" | "exit" => Command::Quit,
            other => bail!("unknown command '{}', try 'help'", other),
        };
        Ok(command)
    }
}

fn parse_id(text: &str) -> Result<PropertyId> {
    let digits = text.trim().trim_start_matches('#');
    digits
        .parse::<u32>()
        .map(PropertyId)
        .map_err(|_| anyhow!("invalid property id '{}'", text))
}

fn parse_bytes(text: &str) -> Result<MidiMessage> {
    parse_message(text).ok_or_else(|| anyhow!("expected three bytes, got '{}'", text))
}

fn parse_field(field: &str, value: &str) -> Result<Field> {
    let field = match field {
        "type" => Field::MessageType(
            MessageType::all()
                .iter()
                .copied()
                .find(|t| t.as_str() == value)
                .ok_or_else(|| anyhow!("unknown message type '{}'", value))?,
        ),
        "action" => Field::Action(
            ActionType::all()
                .iter()
                .copied()
                .find(|a| a.as_str() == value)
                .ok_or_else(|| anyhow!("unknown action '{}'", value))?,
        ),
        "toggle" => Field::Toggle(match value {
            "on" | "true" | "yes" => true,
            "off" | "false" | "no" => false,
            _ => bail!("toggle expects on or off"),
        }),
        "command" => Field::Command(value.to_string()),
        "path" => Field::Path(PathBuf::from(value)),
        "message" => Field::Message(parse_bytes(value)?),
        other => bail!("unknown field '{}'", other),
    };
    Ok(field)
}

/// REPL state: the engine, the store and the queue fed by the driver thread
pub struct Shell {
    processor: MidiProcessor,
    store: ProfileStore,
    events: Arc<SpscQueue<MidiEvent>>,
    callback: CallbackId,
    started: Instant,
}

impl Shell {
    pub fn new(processor: MidiProcessor, store: ProfileStore) -> Self {
        let events = Arc::new(SpscQueue::new(EVENT_QUEUE_CAPACITY));
        let producer = Arc::clone(&events);
        let callback = processor.add_callback(move |event| {
            producer.push_overwrite(*event);
        });

        Self {
            processor,
            store,
            events,
            callback,
            started: Instant::now(),
        }
    }

    /// Run the read-eval-print loop until `quit`, Ctrl+C or Ctrl+D
    pub fn run(mut self, device: Option<String>) -> Result<()> {
        let mut rl = DefaultEditor::new()?;

        println!("{}", "=== MIDI Mapper ===".bold().cyan());
        println!(
            "API: {}  Profiles: {}",
            self.processor.api_name().bright_white(),
            self.store.profiles_file_path().display()
        );
        println!("Type 'help' for commands\n");

        if let Some(device) = device {
            if let Err(e) = self.execute(Command::Activate(device)) {
                print_error(&e);
            }
        }

        loop {
            self.print_pending_events();

            let prompt = match self.processor.try_active_profile() {
                Some(profile) => format!("midi-mapper[{}]> ", profile.name()),
                None => "midi-mapper> ".to_string(),
            };

            match rl.readline(&prompt) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line.as_str());

                    let result = Command::parse(&line).and_then(|command| self.execute(command));
                    match result {
                        Ok(true) => {}
                        Ok(false) => break,
                        Err(e) => print_error(&e),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e).context("Failed to read line"),
            }
        }

        self.processor.remove_callback(self.callback);
        self.processor.deactivate_profile();
        info!("Shell closed");
        Ok(())
    }

    /// Run one command. Returns `false` when the shell should exit.
    pub fn execute(&mut self, command: Command) -> Result<bool> {
        debug!("Shell command: {:?}", command);

        match command {
            Command::Help => println!("{}", HELP),
            Command::Devices => monitor::list_devices_formatted(&self.processor),
            Command::Activate(device) => self.activate(&device)?,
            Command::Deactivate => match self.processor.deactivate_profile() {
                Some(profile) => println!("Deactivated {}", profile.name()),
                None => println!("{}", "No active device".dimmed()),
            },
            Command::Show => {
                let profile = self.profile_snapshot()?;
                print_profile(&profile);
            }
            Command::AddInput => {
                let id = self.active()?.make_input_property().id;
                println!("Added input property {}", id);
            }
            Command::AddOutput => {
                let id = self.active()?.make_output_property().id;
                println!("Added output property {}", id);
            }
            Command::Set { id, field } => self.set_field(id, field)?,
            Command::Learn(id) => {
                let mut profile = self.active()?;
                let property = profile
                    .input_property_mut(id)
                    .ok_or_else(|| anyhow!("no input property {}", id))?;
                property.is_recording = true;
                println!("Waiting for MIDI input for {}...", id);
            }
            Command::Remove(id) => {
                let mut profile = self.active()?;
                let removed = profile.remove_input_property(id).is_some()
                    || profile.remove_output_property(id).is_some();
                if !removed {
                    bail!("no property {}", id);
                }
                println!("Removed property {}", id);
            }
            Command::Send(message) => {
                self.processor.send_output_message(message)?;
                println!("Sent {}", message);
            }
            Command::Sync => {
                let count = self.processor.sync_output_properties()?;
                println!("Sent {} output properties", count);
            }
            Command::Process(message) => {
                if self.processor.process_input_message(message) {
                    println!("Dispatched {}", message);
                } else {
                    println!("{}", format!("No handler for {}", message).dimmed());
                }
            }
            Command::Inject(message) => {
                let device = self
                    .processor
                    .virtual_device()
                    .ok_or_else(|| anyhow!("inject is only available in test mode"))?;
                let timestamp = self.started.elapsed().as_micros() as u64;
                if !device.inject(timestamp, message.as_bytes()) {
                    bail!(Error::NoActiveProfile);
                }
            }
            Command::Save => {
                let profile = self.profile_snapshot()?;
                self.store.save_profile(&profile)?;
                println!("Saved {}", profile.name());
            }
            Command::Load => self.load_active()?,
            Command::Forget => {
                let profile = self.profile_snapshot()?;
                if self.store.remove_profile(&profile)? {
                    println!("Removed saved profile {}", profile.name());
                } else {
                    println!("{}", format!("{} was never saved", profile.name()).dimmed());
                }
            }
            Command::Log => {
                let messages = self.processor.drain_log();
                if messages.is_empty() {
                    println!("{}", "Log is empty".dimmed());
                }
                for message in messages {
                    println!("  {} => {}", format_hex(message.as_bytes()), message);
                }
            }
            Command::Quit => return Ok(false),
        }

        Ok(true)
    }

    fn active(&self) -> Result<parking_lot::MappedMutexGuard<'_, DeviceProfile>> {
        self.processor
            .try_active_profile()
            .ok_or_else(|| Error::NoActiveProfile.into())
    }

    /// Copy of the active profile, so file I/O runs without the lock
    fn profile_snapshot(&self) -> Result<DeviceProfile> {
        Ok(self.active()?.clone())
    }

    fn activate(&mut self, device: &str) -> Result<()> {
        self.processor.activate_profile(device)?;
        println!("{} {}", "✅ Activated".green(), device.bright_white());
        self.load_active()
    }

    fn load_active(&mut self) -> Result<()> {
        // Read into a copy so input dispatch never waits on the file
        let mut loaded = self.profile_snapshot()?;
        let outcome = self.store.load_profile(&mut loaded)?;
        if outcome == LoadOutcome::Loaded {
            *self.active()? = loaded;
        }

        match outcome {
            LoadOutcome::Loaded => {
                let sent = self.processor.sync_output_properties()?;
                let profile = self.profile_snapshot()?;
                println!(
                    "Loaded {} ({} inputs, {} outputs, {} sent)",
                    profile.name(),
                    profile.input_properties.len(),
                    profile.output_properties.len(),
                    sent
                );
            }
            LoadOutcome::NotFound => println!("{}", "No saved profile for this device".dimmed()),
        }
        Ok(())
    }

    fn set_field(&mut self, id: PropertyId, field: Field) -> Result<()> {
        let mut profile = self.active()?;

        if let Some(property) = profile.input_property_mut(id) {
            match field {
                Field::MessageType(message_type) => property.message_type = message_type,
                Field::Action(action_type) => property.action_type = action_type,
                Field::Toggle(is_toggle) => property.is_toggle = is_toggle,
                Field::Command(command) => property.console_command = command,
                Field::Path(path) => property.open_file_path = path,
                Field::Message(message) => property.message = message,
            }
            return Ok(());
        }

        let property = profile
            .output_property_mut(id)
            .ok_or_else(|| anyhow!("no property {}", id))?;
        match field {
            Field::Message(message) => property.message = message,
            _ => bail!("output property {} only has a message", id),
        }
        Ok(())
    }

    fn print_pending_events(&self) {
        for event in self.events.drain() {
            let line = format_monitor(event.timestamp, &event.message);
            match event.captured {
                Some(id) => println!("{} {}", line, format!("(learned by {})", id).green()),
                None => println!("{}", line.dimmed()),
            }
        }
    }
}

fn print_error(error: &anyhow::Error) {
    println!("{} {:#}", "error:".red().bold(), error);
}

fn print_profile(profile: &DeviceProfile) {
    println!(
        "\n{} (in: {}, out: {})",
        profile.name().bold(),
        profile.input_port,
        profile.output_port
    );

    println!("{}", "Input Properties:".bold());
    if profile.input_properties.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for p in &profile.input_properties {
        let mut line = format!(
            "  {:>4} {:<5} {:<8} {}",
            p.id.to_string(),
            p.message_type,
            p.action_type,
            format_hex(p.message.as_bytes())
        );
        if p.is_toggle {
            line.push_str(" toggle");
        }
        match p.action_type {
            ActionType::ConsoleCommand => line.push_str(&format!(" '{}'", p.console_command)),
            ActionType::OpenFile => line.push_str(&format!(" {}", p.open_file_path.display())),
            _ => {}
        }
        if p.is_recording {
            line.push_str(&" [learning]".yellow().to_string());
        }
        println!("{}", line);
    }

    println!("{}", "Output Properties:".bold());
    if profile.output_properties.is_empty() {
        println!("  {}", "none".dimmed());
    }
    for p in &profile.output_properties {
        println!("  {:>4} {}", p.id.to_string(), format_hex(p.message.as_bytes()));
    }
    println!();
}
