//! Plain terminal view: types lines out on stdout and reads option choices from stdin.

use async_trait::async_trait;
use parley_core::dialogue::OptionId;
use parley_core::line::{DialogueOption, LocalizedLine};
use parley_core::runner::{DialogueView, LineCancellationToken};
use parley_core::{ParleyError, ParleyResult};
use std::io::Write;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const TYPE_DELAY: Duration = Duration::from_millis(15);

#[derive(Debug, Clone)]
pub struct ConsoleSettings {
    /// Pick the first available option instead of asking, and print lines instantly.
    pub auto: bool,
    /// How long a finished line stays up before the dialogue moves on.
    pub line_delay: Duration,
}

pub struct ConsoleView {
    settings: ConsoleSettings,
    input: Mutex<Lines<BufReader<Stdin>>>,
}

impl ConsoleView {
    pub fn new(settings: ConsoleSettings) -> Self {
        Self {
            settings,
            input: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn type_out(&self, text: &str, token: &LineCancellationToken) -> ParleyResult<()> {
        let mut stdout = std::io::stdout();
        if self.settings.auto {
            write!(stdout, "{}", text)?;
            return Ok(());
        }

        for (idx, ch) in text.char_indices() {
            if token.is_hurry_up_requested() {
                write!(stdout, "{}", &text[idx..])?;
                break;
            }
            write!(stdout, "{}", ch)?;
            stdout.flush()?;
            tokio::select! {
                _ = tokio::time::sleep(TYPE_DELAY) => {}
                _ = token.hurry_up.cancelled() => {}
            }
        }
        Ok(())
    }

    async fn ask(
        &self,
        options: &[DialogueOption],
        cancellation: &CancellationToken,
    ) -> ParleyResult<Option<OptionId>> {
        let mut input = self.input.lock().await;
        loop {
            print!("> ");
            std::io::stdout().flush()?;

            let answer = tokio::select! {
                answer = input.next_line() => answer?,
                _ = cancellation.cancelled() => return Ok(None),
            };
            let Some(answer) = answer else {
                return Err(ParleyError::view(
                    "standard input closed before an option was chosen",
                ));
            };

            let choice = answer
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| n.checked_sub(1))
                .and_then(|idx| options.get(idx));
            match choice {
                Some(option) if option.is_available => return Ok(Some(option.id)),
                Some(_) => println!("That option is not available."),
                None => println!("Choose a number between 1 and {}.", options.len()),
            }
        }
    }
}

#[async_trait]
impl DialogueView for ConsoleView {
    fn name(&self) -> &str {
        "console"
    }

    async fn run_line(
        &self,
        line: &LocalizedLine,
        token: &LineCancellationToken,
    ) -> ParleyResult<()> {
        if let Some(name) = &line.character_name {
            print!("{}: ", name);
        }
        self.type_out(&line.text, token).await?;
        println!();

        tokio::select! {
            _ = tokio::time::sleep(self.settings.line_delay) => {}
            _ = token.next_line.cancelled() => {}
        }
        Ok(())
    }

    async fn run_options(
        &self,
        options: &[DialogueOption],
        cancellation: &CancellationToken,
    ) -> ParleyResult<Option<OptionId>> {
        println!();
        for (idx, option) in options.iter().enumerate() {
            if option.is_available {
                println!("  {}) {}", idx + 1, option.line.text);
            } else {
                println!("  {}) {} (unavailable)", idx + 1, option.line.text);
            }
        }

        if !self.settings.auto {
            return self.ask(options, cancellation).await;
        }
        let chosen = options.iter().position(|option| option.is_available);
        if let Some(idx) = chosen {
            println!("> {}", idx + 1);
        }
        Ok(chosen.map(|idx| options[idx].id))
    }

    async fn on_dialogue_complete(&self) -> ParleyResult<()> {
        println!();
        println!("[end of dialogue]");
        Ok(())
    }
}
