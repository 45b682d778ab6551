//! The dialogs the panel needs from whatever surface hosts it.

use std::io::{BufRead, Write};
use tokio::sync::{mpsc, Mutex};

/// Blocking dialogs: each call returns only once the user has answered.
pub trait Interaction: Send + Sync {
    fn confirm(&self, message: &str) -> bool;

    /// `None` when the user cancels.
    fn prompt_text(&self, label: &str, default: &str) -> Option<String>;

    fn notify(&self, message: &str);
}

/// Interaction over stdin/stdout.
///
/// Lines are read on a dedicated thread so the command loop can wait on them
/// alongside other futures. Dialog methods block the calling worker and must
/// run on a multi-threaded runtime.
pub struct Terminal {
    lines: Mutex<mpsc::UnboundedReceiver<String>>,
}

/// A prompt answered with this alone cancels it.
const CANCEL: &str = ".";

impl Terminal {
    pub fn new() -> Self {
        let (sender, lines) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if sender.send(line).is_err() {
                    break;
                }
            }
        });
        Self {
            lines: Mutex::new(lines),
        }
    }

    /// Next command line, or `None` at end of input.
    pub async fn next_line(&self, prompt: &str) -> Option<String> {
        show(prompt);
        self.lines.lock().await.recv().await
    }

    fn read_line(&self, prompt: &str) -> Option<String> {
        show(prompt);
        tokio::task::block_in_place(|| self.lines.blocking_lock().blocking_recv())
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::new()
    }
}

fn show(prompt: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = write!(stdout, "{prompt}");
    let _ = stdout.flush();
}

impl Interaction for Terminal {
    fn confirm(&self, message: &str) -> bool {
        self.read_line(&format!("{message} [y/N]: "))
            .is_some_and(|answer| matches!(answer.trim(), "y" | "Y" | "yes" | "YES" | "Yes"))
    }

    fn prompt_text(&self, label: &str, default: &str) -> Option<String> {
        let answer = self.read_line(&format!("{label} [{default}]: "))?;
        match answer.trim() {
            CANCEL => None,
            "" => Some(default.to_owned()),
            value => Some(value.to_owned()),
        }
    }

    fn notify(&self, message: &str) {
        eprintln!("{message}");
    }
}
