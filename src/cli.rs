use crate::broker::sweep_stale_files;
use crate::commands::{Dispatcher, WorkspaceRoot};
use crate::config::{default_settings_path, Settings};
use crate::orchestrator::{FileTransport, Mode, Orchestrator};
use crate::prompt::PromptStore;
use crate::shared::{canonicalize_existing, LogLevel, LogQueue};
use std::path::PathBuf;
use std::sync::Arc;

const HELP_TEXT: &str = "dropwire - file-drop agent broker\n\
\n\
Usage: dropwire [--config <path>] <command>\n\
\n\
Commands:\n\
  send <mode> <text>      send a message through the transport and print the result\n\
  simulate <mode> <text>  run the command layer on <text> without the transport\n\
  prompt show             print the current mutable prompt\n\
  prompt set <content>    replace the mutable prompt\n\
  sweep                   delete stale transport files from the drop directory\n\
  help                    show this help\n\
\n\
Modes: chatting | coding | simulation\n\
Default config: ~/.dropwire/config.yaml";

/// Entry point for the binary. Returns the text to print on success or the
/// error line to print on stderr; the caller maps that to the exit code.
pub fn run_cli(args: Vec<String>) -> Result<String, String> {
    let (config_path, rest) = split_config_flag(args)?;
    let mut rest = rest.into_iter();

    let Some(verb) = rest.next() else {
        return Ok(HELP_TEXT.to_string());
    };
    match verb.as_str() {
        "help" | "--help" | "-h" => Ok(HELP_TEXT.to_string()),
        "send" => {
            let (mode, text) = mode_and_text(&mut rest, "send")?;
            let runtime = Runtime::load(config_path)?;
            runtime.send(&text, mode)
        }
        "simulate" => {
            let (mode, text) = mode_and_text(&mut rest, "simulate")?;
            let runtime = Runtime::load(config_path)?;
            runtime.simulate(&text, mode)
        }
        "prompt" => match rest.next().as_deref() {
            Some("show") => {
                let runtime = Runtime::load(config_path)?;
                Ok(runtime.prompts.prompt_content())
            }
            Some("set") => {
                let content = rest.collect::<Vec<_>>().join(" ");
                if content.is_empty() {
                    return Err("usage: prompt set <content>".to_string());
                }
                let runtime = Runtime::load(config_path)?;
                runtime
                    .prompts
                    .set_prompt(&content)
                    .map_err(|err| err.to_string())?;
                Ok("Prompt updated.".to_string())
            }
            _ => Err("usage: prompt show | prompt set <content>".to_string()),
        },
        "sweep" => {
            let settings = load_settings(config_path)?;
            let removed = sweep_stale_files(&settings.transport.directory)
                .map_err(|err| format!("sweep failed: {err}"))?;
            Ok(format!("Removed {removed} stale transport file(s)."))
        }
        unknown => Err(format!("unknown command `{unknown}` (try `help`)")),
    }
}

fn split_config_flag(args: Vec<String>) -> Result<(Option<PathBuf>, Vec<String>), String> {
    let mut config = None;
    let mut rest = Vec::new();
    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else {
            rest.push(arg);
        }
    }
    Ok((config, rest))
}

fn mode_and_text(
    rest: &mut impl Iterator<Item = String>,
    verb: &str,
) -> Result<(Mode, String), String> {
    let mode = rest
        .next()
        .ok_or_else(|| format!("usage: {verb} <mode> <text>"))
        .and_then(|raw| Mode::parse(&raw))?;
    let text = rest.collect::<Vec<_>>().join(" ");
    if text.is_empty() {
        return Err(format!("usage: {verb} <mode> <text>"));
    }
    Ok((mode, text))
}

fn load_settings(config_path: Option<PathBuf>) -> Result<Settings, String> {
    let path = match config_path {
        Some(path) => path,
        None => default_settings_path().map_err(|err| err.to_string())?,
    };
    let settings = Settings::from_path(&path).map_err(|err| err.to_string())?;
    settings.validate().map_err(|err| err.to_string())?;
    Ok(settings)
}

/// Everything a verb needs, assembled once from settings.
struct Runtime {
    settings: Settings,
    project_root: PathBuf,
    prompts: Arc<PromptStore>,
    log: Arc<LogQueue>,
}

impl Runtime {
    fn load(config_path: Option<PathBuf>) -> Result<Self, String> {
        let settings = load_settings(config_path)?;
        let project_root = canonicalize_existing(&settings.project_root)
            .map_err(|err| format!("project root `{}`: {err}", settings.project_root.display()))?;
        let prompts = Arc::new(
            PromptStore::open(&settings.prompts.rules_path, &settings.prompts.prompt_path)
                .map_err(|err| err.to_string())?,
        );
        let log = Arc::new(LogQueue::new(settings.log_path.clone()));
        Ok(Self {
            settings,
            project_root,
            prompts,
            log,
        })
    }

    fn orchestrator(&self) -> Orchestrator {
        let dispatcher = Dispatcher::new(
            WorkspaceRoot::new(self.project_root.clone()),
            Arc::clone(&self.prompts),
        );
        Orchestrator::new(Arc::clone(&self.prompts)).with_dispatcher(dispatcher)
    }

    fn send(&self, text: &str, mode: Mode) -> Result<String, String> {
        let transport = FileTransport::new(self.settings.transport.clone(), Arc::clone(&self.log));
        let mut orchestrator = self.orchestrator().with_transport(Box::new(transport));
        orchestrator.connect().map_err(|err| err.to_string())?;
        let outcome = orchestrator
            .send_user_message(text, mode)
            .map_err(|err| err.to_string());
        orchestrator.disconnect();
        self.report_background_trouble();
        outcome
    }

    /// Warnings the polling thread queued during the exchange belong on
    /// stderr, not inside the command output.
    fn report_background_trouble(&self) {
        for entry in self.log.drain() {
            if entry.level != LogLevel::Info {
                eprintln!("[{}] {}: {}", entry.level.as_str(), entry.event, entry.message);
            }
        }
    }

    fn simulate(&self, text: &str, mode: Mode) -> Result<String, String> {
        self.orchestrator()
            .simulate(text, mode)
            .map_err(|err| err.to_string())
    }
}
