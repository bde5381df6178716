//! Helix - recruiting outreach assistant
//!
//! Line-oriented driver over the conversation store. Plain lines go to the
//! agent; lines starting with `/` are workspace commands.

use helix_outreach::backend::SavedSequence;
use helix_outreach::store::StoreState;
use helix_outreach::{ConversationStore, HelixConfig, HttpBackend, LoggingBackend};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Store = ConversationStore<LoggingBackend<HttpBackend>>;

const HELP: &str = "\
Commands:
  /save                 save the active sequence
  /add                  append a step
  /edit <n> <text>      replace step n's content
  /sessions             list sessions
  /session <id>         switch to a session
  /new [title]          create a session and switch to it
  /saved                list saved sequences
  /load <id>            load a saved sequence
  /show                 print the active sequence
  /quit                 exit
Anything else is sent to Helix.";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "helix_outreach=info,helix=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = HelixConfig::from_env();
    tracing::info!(api_url = %config.api_url, user_id = config.user_id, "Starting Helix");

    let backend = LoggingBackend::new(HttpBackend::from_config(&config)?);
    let store = ConversationStore::new(backend).with_user(config.user_id);

    if !store.initialize().await {
        if let Some(error) = store.snapshot().error {
            eprintln!("{error}");
        }
    } else if let Some(session_id) = store.open_default_session().await {
        println!("Resumed session {session_id}");
    }

    let mut shown = print_new_messages(&store.snapshot(), 0);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        let resets_transcript = run_line(&store, line).await;
        if resets_transcript {
            shown = 0;
        }
        shown = print_new_messages(&store.snapshot(), shown);
    }

    tracing::info!("Exiting");
    Ok(())
}

/// Execute one input line. Returns true when the transcript was replaced.
async fn run_line(store: &Store, line: &str) -> bool {
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();

    match command {
        "/save" => {
            if let Err(e) = store.persist_active_sequence().await {
                println!("Nothing saved: {e}");
            }
        }
        "/add" => match store.append_step() {
            Ok(_) => print_sequence(&store.snapshot()),
            Err(e) => println!("{e}"),
        },
        "/edit" => edit(store, rest),
        "/show" => print_sequence(&store.snapshot()),
        "/sessions" => {
            for session in store.list_sessions().await {
                println!("  {:>4}  {}  (updated {})", session.id, session.title, session.updated_at());
            }
        }
        "/session" => match rest.parse() {
            Ok(session_id) => {
                store.switch_active_session(session_id).await;
                return true;
            }
            Err(_) => println!("Usage: /session <id>"),
        },
        "/new" => {
            let title = (!rest.is_empty()).then_some(rest);
            match store.create_session(title).await {
                Ok(session) => {
                    println!("Created session {} ({})", session.id, session.title);
                    return true;
                }
                Err(e) => println!("Could not create session: {e}"),
            }
        }
        "/saved" => {
            for saved in store.saved_sequences().await {
                println!("  {:>4}  {}", saved.id, saved.preview(60).replace('\n', " "));
            }
        }
        "/load" => load(store, rest).await,
        "/help" => println!("{HELP}"),
        _ if command.starts_with('/') => println!("Unknown command. Type /help."),
        _ => {
            if let Err(e) = store.append_user_message(line).await {
                println!("{e}");
            }
            if store.snapshot().sequence.is_some() {
                print_sequence(&store.snapshot());
            }
        }
    }
    false
}

fn edit(store: &Store, args: &str) {
    let Some((number, content)) = args.split_once(' ') else {
        println!("Usage: /edit <n> <text>");
        return;
    };
    let Ok(number) = number.parse::<u32>() else {
        println!("Usage: /edit <n> <text>");
        return;
    };
    let snapshot = store.snapshot();
    let step_id = snapshot
        .sequence
        .as_ref()
        .and_then(|s| s.steps.iter().find(|step| step.step_number == number))
        .map(|step| step.id.clone());
    let Some(step_id) = step_id else {
        println!("No step {number}");
        return;
    };
    match store.edit_step(&step_id, content.trim()) {
        Ok(_) => print_sequence(&store.snapshot()),
        Err(e) => println!("{e}"),
    }
}

async fn load(store: &Store, args: &str) {
    let Ok(id) = args.parse::<i64>() else {
        println!("Usage: /load <id>");
        return;
    };
    let saved: Vec<SavedSequence> = store.saved_sequences().await;
    match saved.iter().find(|s| s.id == id) {
        Some(found) => {
            store.load_saved_sequence(found);
            print_sequence(&store.snapshot());
        }
        None => println!("No saved sequence {id}"),
    }
}

/// Print transcript messages past `already_shown`; returns the new count
fn print_new_messages(state: &StoreState, already_shown: usize) -> usize {
    for message in state.messages.iter().skip(already_shown) {
        println!("[{}] {}", message.role, message.content);
    }
    state.messages.len()
}

fn print_sequence(state: &StoreState) {
    let Some(sequence) = &state.sequence else {
        return;
    };
    println!("== {} ({} steps) ==", sequence.title, sequence.steps.len());
    for step in &sequence.steps {
        let parts = step.parts();
        println!("Step {}: {}", step.step_number, parts.body);
        if let Some(strategy) = parts.strategy {
            println!("    Strategy: {strategy}");
        }
    }
}
