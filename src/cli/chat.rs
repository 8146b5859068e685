use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::chat::TurnCoordinator;
use crate::core::AppConfig;

pub async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    let client = config.gemini_client()?;
    let coordinator = TurnCoordinator::initialize(
        &client,
        config.conversation_log(),
        config.coordinator_options(),
    )?;

    let mut rl = DefaultEditor::new()?;

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                // A failed turn isn't recorded so the user can just
                // try again
                match coordinator.handle(line).await {
                    Ok(reply) => println!("{}", reply),
                    Err(e) => println!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
