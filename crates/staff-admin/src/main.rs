use anyhow::Context;
use staff_admin::{config, interaction::Terminal, logging, panel::Panel};
use std::sync::Arc;

const HELP: &str = "commands: list | backfill | edit <row|id> | delete <row|id> | help | quit";

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = config::load().context("loading configuration")?;
    logging::init(&config.tracing).context("initializing tracing")?;
    let backend = Arc::new(staff_db::create(&config.store).context("creating document store")?);
    let terminal = Arc::new(Terminal::new());
    let mut panel = Panel::open(backend, terminal.clone(), &config)
        .await
        .context("opening staff panel")?;
    println!("{HELP}");
    loop {
        let line = tokio::select! {
            line = terminal.next_line("> ") => line,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let (command, argument) = line
            .trim()
            .split_once(char::is_whitespace)
            .map(|(command, argument)| (command, argument.trim()))
            .unwrap_or((line.trim(), ""));
        match (command, argument) {
            ("", _) => continue,
            ("list" | "ls", _) => println!("{}", panel.render()),
            ("backfill", _) => {
                panel.backfill().await;
                println!("{}", panel.render());
            }
            ("edit", target) if !target.is_empty() => {
                panel.edit(target).await;
            }
            ("delete" | "rm", target) if !target.is_empty() => {
                panel.delete(target).await;
            }
            ("quit" | "exit" | "q", _) => break,
            _ => println!("{HELP}"),
        }
    }
    tracing::info!("shutting down");
    panel.close().await;
    Ok(())
}
