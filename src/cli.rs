use crate::config::{ConfigError, ConfigManager};
use crate::handlers::{HandlerError, ListView, TodoApp};
use crate::models::TodoList;
use crate::session::{FlashKind, SessionId};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "todos", version, about = "Keep todo lists in a session")]
pub struct Cli {
    /// Configuration file to use instead of the default location
    #[arg(long, global = true, env = "TODOS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Session to act on; a new one is started when omitted
    #[arg(long, short, global = true, env = "TODOS_SESSION")]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show all todo lists, open lists first
    Lists,
    /// Show one list with its todos
    Show { list_id: String },
    /// Create a todo list
    NewList { title: String },
    /// Rename a todo list
    RenameList { list_id: String, title: String },
    /// Delete a todo list and all of its todos
    DeleteList { list_id: String },
    /// Mark every todo in a list as done
    CompleteAll { list_id: String },
    /// Add a todo to a list
    Add { list_id: String, title: String },
    /// Flip a todo between done and not done
    Toggle { list_id: String, todo_id: String },
    /// Delete a todo from a list
    Remove { list_id: String, todo_id: String },
    #[command(subcommand)]
    Session(SessionCommand),
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
pub enum SessionCommand {
    /// Start a session and print its id
    New,
    /// Forget the session and everything in it
    End,
    /// Remove sessions idle for longer than session.max-age-days
    Purge,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    Get { key: String },
    Set { key: String, value: String },
    Unset { key: String },
    List,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Handler(#[from] HandlerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Invalid session id: {0}")]
    InvalidSession(String),
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

/// Runs one command. Regular output goes to `out`, notices to `err`.
pub fn run(
    cli: Cli,
    config: &mut ConfigManager,
    out: &mut impl Write,
    err: &mut impl Write,
) -> Result<(), CliError> {
    let command = match cli.command {
        Command::Config(command) => return run_config(command, config, out),
        command => command,
    };

    let effective = config.effective();
    let app = TodoApp::new(effective.create_store()?, effective.app_options());

    if let Command::Session(SessionCommand::New) = command {
        writeln!(out, "{}", app.new_session()?)?;
        return Ok(());
    }

    let session = match cli.session {
        Some(ref raw) => raw
            .parse::<SessionId>()
            .map_err(|_| CliError::InvalidSession(raw.clone()))?,
        None => {
            let id = app.new_session()?;
            writeln!(err, "Started session {} (set TODOS_SESSION to keep using it)", id)?;
            id
        }
    };

    let result = run_command(command, &app, &session, out);

    // Errors are reported through `result`; only confirmations are printed here.
    for message in app.take_flash(&session)? {
        if message.kind != FlashKind::Error {
            writeln!(out, "{}", message.text)?;
        }
    }

    result
}

fn run_command(
    command: Command,
    app: &TodoApp,
    session: &SessionId,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Command::Lists => {
            let lists = app.list_all(session)?;
            if lists.is_empty() {
                writeln!(out, "No todo lists.")?;
            }
            for list in &lists {
                writeln!(out, "{}", render_list_line(list))?;
            }
        }
        Command::Show { list_id } => {
            let view = app.view_list(session, &list_id)?;
            render_list_view(&view, out)?;
        }
        Command::NewList { title } => {
            app.create_list(session, &title)?;
        }
        Command::RenameList { list_id, title } => {
            app.rename_list(session, &list_id, &title)?;
        }
        Command::DeleteList { list_id } => {
            app.delete_list(session, &list_id)?;
        }
        Command::CompleteAll { list_id } => {
            app.mark_all_done(session, &list_id)?;
        }
        Command::Add { list_id, title } => {
            app.add_todo(session, &list_id, &title)?;
        }
        Command::Toggle { list_id, todo_id } => {
            app.toggle_todo(session, &list_id, &todo_id)?;
        }
        Command::Remove { list_id, todo_id } => {
            app.delete_todo(session, &list_id, &todo_id)?;
        }
        Command::Session(SessionCommand::End) => {
            app.end_session(session)?;
            writeln!(out, "Session ended.")?;
        }
        Command::Session(SessionCommand::Purge) => {
            let purged = app.purge_expired_sessions()?;
            writeln!(out, "Removed {} expired session(s).", purged)?;
        }
        // Handled by `run` before a session is resolved.
        Command::Config(_) | Command::Session(SessionCommand::New) => {}
    }
    Ok(())
}

fn run_config(
    command: ConfigCommand,
    config: &mut ConfigManager,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        ConfigCommand::Get { key } => match config.get(&key) {
            Some(value) => writeln!(out, "{}", value)?,
            None => writeln!(out, "{} is not set", key)?,
        },
        ConfigCommand::Set { key, value } => {
            config.set(&key, &value)?;
            writeln!(out, "Set {} = {}", key, value)?;
        }
        ConfigCommand::Unset { key } => {
            config.unset(&key)?;
            writeln!(out, "Unset {}", key)?;
        }
        ConfigCommand::List => {
            for (key, value, is_default) in config.list() {
                let marker = if is_default { " (default)" } else { "" };
                writeln!(out, "{} = {}{}", key, value, marker)?;
            }
        }
    }
    Ok(())
}

fn done_mark(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

pub fn render_list_line(list: &TodoList) -> String {
    format!(
        "{:>4}  {} {} ({}/{})",
        list.id,
        done_mark(list.is_done()),
        list.title,
        list.done_count(),
        list.size()
    )
}

pub fn render_list_view(view: &ListView, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "{}", render_list_line(&view.list))?;
    if view.todos.is_empty() {
        writeln!(out, "      (no todos)")?;
    }
    for todo in &view.todos {
        writeln!(out, "      {:>4}  {} {}", todo.id, done_mark(todo.is_done()), todo.title)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::temp_session_path;

    fn config_manager() -> (ConfigManager, tempfile::TempDir) {
        let (path, temp_dir) = temp_session_path("config.json");
        let mut manager = ConfigManager::new(Some(path.as_path())).unwrap();
        let sessions = temp_dir.path().join("sessions.json");
        manager
            .set("session.path", &sessions.to_string_lossy())
            .unwrap();
        (manager, temp_dir)
    }

    fn run_args(manager: &mut ConfigManager, args: &[&str]) -> (Result<(), CliError>, String) {
        let cli = Cli::parse_from(std::iter::once("todos").chain(args.iter().copied()));
        let mut out = Vec::new();
        let mut err = Vec::new();
        let result = run(cli, manager, &mut out, &mut err);
        (result, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_list_commands() {
        let (mut manager, _temp_dir) = config_manager();
        let (result, session) = run_args(&mut manager, &["session", "new"]);
        result.unwrap();
        let session = session.trim().to_string();

        let (result, output) = run_args(&mut manager, &["-s", session.as_str(), "new-list", "Work"]);
        result.unwrap();
        assert!(output.contains("The todo list has been created."));

        run_args(&mut manager, &["-s", session.as_str(), "add", "1", "Buy milk"]).0.unwrap();
        run_args(&mut manager, &["-s", session.as_str(), "add", "1", "Call bank"]).0.unwrap();
        let (result, output) = run_args(&mut manager, &["-s", session.as_str(), "toggle", "1", "2"]);
        result.unwrap();
        assert!(output.contains("\"Call bank\" marked done."));

        let (result, output) = run_args(&mut manager, &["-s", session.as_str(), "show", "1"]);
        result.unwrap();
        assert!(output.contains("[ ] Work (1/2)"));
        let milk = output.find("Buy milk").unwrap();
        let bank = output.find("Call bank").unwrap();
        assert!(milk < bank);
    }

    #[test]
    fn test_run_reports_errors() {
        let (mut manager, _temp_dir) = config_manager();
        let session = SessionId::new().to_string();

        let (result, _) = run_args(&mut manager, &["-s", session.as_str(), "show", "abc"]);
        assert!(matches!(
            result,
            Err(CliError::Handler(HandlerError::NotFound(_)))
        ));

        let (result, output) = run_args(&mut manager, &["-s", session.as_str(), "new-list", "  "]);
        assert!(matches!(
            result,
            Err(CliError::Handler(HandlerError::Validation(_)))
        ));
        assert!(output.is_empty());

        let (result, _) = run_args(&mut manager, &["-s", "not-a-uuid", "lists"]);
        assert!(matches!(result, Err(CliError::InvalidSession(_))));
    }

    #[test]
    fn test_run_config_commands() {
        let (mut manager, _temp_dir) = config_manager();
        let (result, output) = run_args(&mut manager, &["config", "set", "seed-data", "true"]);
        result.unwrap();
        assert_eq!(output.trim(), "Set seed-data = true");

        let (_, output) = run_args(&mut manager, &["config", "get", "seed-data"]);
        assert_eq!(output.trim(), "true");

        let (_, output) = run_args(&mut manager, &["config", "list"]);
        assert!(output.contains("log-level = warn (default)"));

        let (_, output) = run_args(&mut manager, &["lists"]);
        assert!(output.contains("Work Todos"));
    }
}
