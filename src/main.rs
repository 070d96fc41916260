use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use notesmith::clipboard::SystemClipboard;
use notesmith::config::Settings;
use notesmith::editor::VaultHost;
use notesmith::error::GenerationError;
use notesmith::http_client::ReqwestHttpClient;
use notesmith::orchestrator::{ApplyOutcome, GenerationOrchestrator, Invocation};
use notesmith::request::{ContextScope, OutputAction};
use notesmith::transport::{MockTransport, ModelTransport, TransportClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("quill")
        .about("AI-assisted note generation - select, generate, apply safely")
        .long_about(
            "quill sends a text selection plus an instruction template to a model \
             and applies the result back to the note, or to a new sibling note, \
             without clobbering edits made while the request was in flight",
        )
        .arg(Arg::new("note")
            .help("Vault-relative path of the note to work on")
            .num_args(1))
        .arg(Arg::new("vault")
            .long("vault")
            .help("Vault root directory")
            .value_name("DIR")
            .default_value("."))
        .arg(Arg::new("select")
            .long("select")
            .help("Text to select (first occurrence in the note)")
            .value_name("TEXT"))
        .arg(Arg::new("instruction")
            .long("instruction")
            .help("Instruction template name (under the instructions folder) or literal text")
            .value_name("TEXT"))
        .arg(Arg::new("action")
            .long("action")
            .help("Output action: create-note, replace-selection, or insert-after")
            .value_name("ACTION"))
        .arg(Arg::new("scope")
            .long("scope")
            .help("Context scope: selection-only or selection-and-full-parent")
            .value_name("SCOPE"))
        .arg(Arg::new("save-to")
            .long("save-to")
            .help("Target folder for created notes")
            .value_name("FOLDER"))
        .arg(Arg::new("ref")
            .long("ref")
            .help("Background reference note (repeatable)")
            .value_name("PATH")
            .action(ArgAction::Append))
        .arg(Arg::new("set-api-key")
            .long("set-api-key")
            .help("Set the provider API key")
            .value_name("API_KEY")
            .num_args(1))
        .arg(Arg::new("config")
            .long("config")
            .help("Show configuration information")
            .action(ArgAction::SetTrue))
        .get_matches();

    // Handle configuration commands
    if let Some(api_key) = matches.get_one::<String>("set-api-key") {
        let mut settings = Settings::load()?;
        settings.set_api_key(api_key.clone())?;
        println!("✅ API key saved successfully");
        return Ok(());
    }

    if matches.get_flag("config") {
        Settings::show_config_info()?;
        return Ok(());
    }

    let settings = Settings::load()?;

    let note = matches
        .get_one::<String>("note")
        .ok_or_else(|| anyhow!("No note given. Use 'quill --help' for usage information."))?;
    let selection = matches
        .get_one::<String>("select")
        .ok_or_else(|| anyhow!("--select is required"))?;
    let instruction_arg = matches
        .get_one::<String>("instruction")
        .ok_or_else(|| anyhow!("--instruction is required"))?;
    let vault = matches.get_one::<String>("vault").unwrap();

    let output_action = match matches.get_one::<String>("action") {
        Some(raw) => parse_action(raw)?,
        None => settings.default_output_action,
    };
    let context_scope = match matches.get_one::<String>("scope") {
        Some(raw) => parse_scope(raw)?,
        None => settings.default_context_scope,
    };
    let save_location = matches
        .get_one::<String>("save-to")
        .cloned()
        .unwrap_or_else(|| settings.default_save_location.clone());
    let reference_paths: Vec<String> = matches
        .get_many::<String>("ref")
        .unwrap_or_default()
        .cloned()
        .collect();

    let instruction_content =
        resolve_instruction(vault, &settings.instructions_folder, instruction_arg)?;

    let transport: Arc<dyn ModelTransport> = if settings.use_mock {
        info!("Using mock transport (NOTESMITH_USE_MOCK=1)");
        Arc::new(MockTransport::new())
    } else {
        let http = Arc::new(ReqwestHttpClient::new());
        match TransportClient::new(&settings, http) {
            Ok(client) => Arc::new(client),
            Err(err) => {
                eprintln!("❌ {}", err);
                std::process::exit(1);
            }
        }
    };

    let mut host = VaultHost::open(vault, note)?;
    host.select_str(selection)?;

    let orchestrator = GenerationOrchestrator::new(&settings, transport);
    let mut clipboard = SystemClipboard;
    let invocation = Invocation {
        instruction_content,
        output_action,
        context_scope,
        save_location,
        reference_paths,
    };

    match orchestrator.run(&mut host, &mut clipboard, invocation).await {
        Ok(report) => {
            for failure in &report.reference_failures {
                println!("⚠️  Skipped reference '{}': {}", failure.path, failure.reason);
            }
            if report.degraded {
                println!("⚠️  Model output was not structured; using raw text with a placeholder title");
            }
            match report.outcome {
                ApplyOutcome::Applied { relocated, created_note } => {
                    if relocated {
                        println!("ℹ️  Selection had moved; applied at the relocated text");
                    }
                    match created_note {
                        Some(created) => println!("✅ Created '{}' and linked it from the selection", created.path),
                        None => println!("✅ Applied generated text to '{}'", note),
                    }
                }
                ApplyOutcome::DivertedToClipboard { created_note, warning } => {
                    if let Some(created) = created_note {
                        println!("✅ Created '{}'", created.path);
                    }
                    println!("⚠️  {}", warning);
                }
            }
            Ok(())
        }
        Err(err) => {
            match err.downcast_ref::<GenerationError>() {
                Some(GenerationError::Precondition(msg)) => eprintln!("❌ {}", msg),
                Some(GenerationError::Transport(msg)) => {
                    eprintln!("❌ The model request failed: {}", msg)
                }
                Some(GenerationError::Collision { path }) => {
                    eprintln!("⚠️  A note already exists at '{}'; nothing was overwritten", path)
                }
                None => eprintln!("❌ {}", err),
            }
            std::process::exit(1);
        }
    }
}

fn parse_action(raw: &str) -> Result<OutputAction> {
    match raw {
        "create-note" => Ok(OutputAction::CreateNote),
        "replace-selection" => Ok(OutputAction::ReplaceSelection),
        "insert-after" => Ok(OutputAction::InsertAfter),
        other => Err(anyhow!(
            "unknown action '{}' (expected create-note, replace-selection, or insert-after)",
            other
        )),
    }
}

fn parse_scope(raw: &str) -> Result<ContextScope> {
    match raw {
        "selection-only" => Ok(ContextScope::SelectionOnly),
        "selection-and-full-parent" => Ok(ContextScope::SelectionAndFullParent),
        other => Err(anyhow!(
            "unknown scope '{}' (expected selection-only or selection-and-full-parent)",
            other
        )),
    }
}

/// Resolves the instruction argument: a template under the instructions
/// folder, then an arbitrary vault path, then literal instruction text.
fn resolve_instruction(vault: &str, instructions_folder: &str, arg: &str) -> Result<String> {
    let template = Path::new(vault)
        .join(instructions_folder)
        .join(format!("{}.md", arg));
    if template.is_file() {
        info!("Using instruction template '{}'", template.display());
        return Ok(std::fs::read_to_string(template)?);
    }

    let as_path = Path::new(vault).join(arg);
    if as_path.is_file() {
        info!("Using instruction file '{}'", as_path.display());
        return Ok(std::fs::read_to_string(as_path)?);
    }

    Ok(arg.to_string())
}
