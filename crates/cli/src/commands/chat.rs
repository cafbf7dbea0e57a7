//! `hsxassist chat`: interactive or single-question chat in the terminal.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use hsxassist_agent::AgentStreamEvent;
use hsxassist_core::message::ThreadId;
use hsxassist_session::{SessionManager, StarterMenu};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One line typed at the prompt.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Empty,
    Exit,
    /// `/N` picks starter N (1-based, as printed)
    Action(String),
    Message(String),
}

fn parse_input(line: &str) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return Input::Exit;
    }
    if let Some(n) = line.strip_prefix('/').and_then(|n| n.parse::<usize>().ok()) {
        if n >= 1 {
            return Input::Action(format!("starter_{}", n - 1));
        }
    }
    Input::Message(line.to_string())
}

pub async fn run(
    message: Option<String>,
    knowledge_file: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(knowledge_file)?;
    let manager = super::build_manager(&config)?;
    let session = manager.start_session().await?;
    let thread_id = session.thread_id;

    if let Some(msg) = message {
        run_turn(&manager, &thread_id, Input::Message(msg), false).await?;
        manager.end_session(&thread_id).await?;
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        hsxassist: HSxTech / Odoo chat        ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Model:     {}", config.llm.model);
    println!("  Session:   {thread_id}");
    println!();
    println!("  Type a question, or /N to pick a suggestion.");
    println!("  Ctrl+C stops an answer; 'exit' quits.");
    println!();
    print_menu(manager.starters());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            input => {
                if let Err(e) = run_turn(&manager, &thread_id, input, true).await {
                    eprintln!("  [Error] {e}");
                    println!();
                }
            }
        }
    }

    manager.end_session(&thread_id).await?;
    println!("  Bye!");
    Ok(())
}

/// Run one turn, printing events as they arrive. Ctrl+C stops the answer.
async fn run_turn(
    manager: &Arc<SessionManager>,
    thread_id: &ThreadId,
    input: Input,
    show_menu: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(64);
    let printer = tokio::spawn(async move {
        println!();
        print!("  Assistant > ");
        let _ = std::io::stdout().flush();
        while let Some(event) = rx.recv().await {
            render(&event, show_menu);
        }
    });

    let result = {
        let turn = async {
            match &input {
                Input::Action(name) => manager.select_action(thread_id, name, &tx).await.map(|_| ()),
                Input::Message(text) => manager.send_message(thread_id, text, &tx).await.map(|_| ()),
                Input::Empty | Input::Exit => Ok(()),
            }
        };
        tokio::pin!(turn);
        loop {
            tokio::select! {
                result = &mut turn => break result,
                _ = tokio::signal::ctrl_c() => manager.stop(thread_id).await?,
            }
        }
    };

    drop(tx);
    let _ = printer.await;
    result.map_err(Into::into)
}

fn render(event: &AgentStreamEvent, show_menu: bool) {
    match event {
        AgentStreamEvent::Chunk { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        AgentStreamEvent::ToolCall { name, input, .. } => {
            eprintln!("\n  [tool] {name} {input}");
        }
        AgentStreamEvent::ToolResult {
            name,
            output,
            success: false,
            ..
        } => {
            eprintln!("  [tool] {name} failed: {output}");
        }
        AgentStreamEvent::ToolResult { .. } => {}
        AgentStreamEvent::Message { cancelled, .. } => {
            println!();
            if *cancelled {
                println!("  [stopped]");
            }
            println!();
        }
        AgentStreamEvent::Actions { prompt, actions } if show_menu => {
            println!("\n\n  {prompt}");
            for (i, action) in actions.iter().enumerate() {
                println!("    /{}  {}", i + 1, action.label);
            }
            println!();
        }
        AgentStreamEvent::Actions { .. } | AgentStreamEvent::Done { .. } => {}
        AgentStreamEvent::Error { message } => {
            eprintln!("\n  [Error] {message}");
        }
    }
}

fn print_menu(menu: &StarterMenu) {
    for (i, starter) in menu.starters().iter().enumerate() {
        println!("    /{}  {}", i + 1, starter.label);
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exit_words() {
        assert_eq!(parse_input("exit"), Input::Exit);
        assert_eq!(parse_input("  QUIT "), Input::Exit);
    }

    #[test]
    fn slash_number_selects_starter() {
        assert_eq!(parse_input("/1"), Input::Action("starter_0".into()));
        assert_eq!(parse_input("/5"), Input::Action("starter_4".into()));
    }

    #[test]
    fn other_text_is_a_message() {
        assert_eq!(parse_input("/0"), Input::Message("/0".into()));
        assert_eq!(parse_input("/help"), Input::Message("/help".into()));
        assert_eq!(parse_input(" What is Odoo? "), Input::Message("What is Odoo?".into()));
        assert_eq!(parse_input("   "), Input::Empty);
    }
}
