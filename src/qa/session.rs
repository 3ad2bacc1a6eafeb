//! Interactive question loop
//!
//! ```text
//!            empty line / answered / query error
//!                  ┌──────────────┐
//!                  ▼              │
//!          ┌────────────────┐     │
//!   ──────▶│ AwaitingInput  │─────┘
//!          └────────────────┘
//!                  │ exit | quit | Ctrl+C | end of input
//!                  ▼
//!          ┌────────────────┐
//!          │   Terminated   │
//!          └────────────────┘
//! ```

use std::io::{self, Write};

use async_trait::async_trait;
use colored::Colorize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

use super::pipeline::{Answer, QueryPipeline};

pub const FAREWELL: &str = "Thank you for using the Knowledge Base Q&A system. Goodbye!";
pub const INTERRUPT_FAREWELL: &str = "Goodbye!";

/// One event from the user
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Line(String),
    Interrupt,
    Eof,
}

#[async_trait(?Send)]
pub trait InputSource {
    async fn next_input(&mut self) -> Input;
}

/// Reads lines from the terminal, racing each read against Ctrl+C.
///
/// Interrupts arrive on a channel that stays open for the whole session, so
/// one pressed while a query is running ends the session at the next prompt.
/// A pending interrupt wins over input that is already buffered.
pub struct TerminalInput<R = BufReader<Stdin>> {
    lines: Lines<R>,
    interrupts: mpsc::UnboundedReceiver<()>,
}

impl TerminalInput {
    /// Stdin plus a background Ctrl+C listener. Must be called from within a
    /// tokio runtime.
    pub fn new() -> Self {
        let (tx, interrupts) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!(error = %e, "could not listen for Ctrl+C");
                    break;
                }
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        Self::with_reader(BufReader::new(tokio::io::stdin()), interrupts)
    }
}

impl<R> TerminalInput<R>
where
    R: AsyncBufRead + Unpin,
{
    pub fn with_reader(reader: R, interrupts: mpsc::UnboundedReceiver<()>) -> Self {
        Self {
            lines: reader.lines(),
            interrupts,
        }
    }
}

async fn read_line<R>(lines: &mut Lines<R>) -> Input
where
    R: AsyncBufRead + Unpin,
{
    match lines.next_line().await {
        Ok(Some(line)) => Input::Line(line),
        Ok(None) => Input::Eof,
        Err(e) => {
            tracing::warn!(error = %e, "could not read from stdin");
            Input::Eof
        }
    }
}

#[async_trait(?Send)]
impl<R> InputSource for TerminalInput<R>
where
    R: AsyncBufRead + Unpin,
{
    async fn next_input(&mut self) -> Input {
        let lines = &mut self.lines;
        let interrupts = &mut self.interrupts;
        tokio::select! {
            biased;
            Some(()) = interrupts.recv() => Input::Interrupt,
            input = read_line(lines) => input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingInput,
    Terminated,
}

/// How a trimmed input line is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Skip,
    Exit,
    Ask(&'a str),
}

pub fn parse_command(line: &str) -> Command<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Command::Skip
    } else if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        Command::Exit
    } else {
        Command::Ask(trimmed)
    }
}

/// Counters reported when the session ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub answered: usize,
    pub failed: usize,
}

pub struct Session<'a, P: ?Sized, W> {
    pipeline: &'a P,
    out: W,
    state: SessionState,
    summary: SessionSummary,
}

impl<'a, P, W> Session<'a, P, W>
where
    P: QueryPipeline + ?Sized,
    W: Write,
{
    pub fn new(pipeline: &'a P, out: W) -> Self {
        Self {
            pipeline,
            out,
            state: SessionState::AwaitingInput,
            summary: SessionSummary::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Loop until the user leaves. Query failures are printed and the loop
    /// continues; only a failing output sink ends it early.
    pub async fn run<I>(&mut self, input: &mut I) -> io::Result<SessionSummary>
    where
        I: InputSource + ?Sized,
    {
        while self.state == SessionState::AwaitingInput {
            write!(self.out, "\n{} ", "Your question:".bold())?;
            self.out.flush()?;

            let event = input.next_input().await;
            self.handle(event).await?;
        }
        Ok(self.summary)
    }

    async fn handle(&mut self, event: Input) -> io::Result<()> {
        let line = match event {
            Input::Line(line) => line,
            Input::Interrupt | Input::Eof => {
                writeln!(self.out, "\n\n{}", INTERRUPT_FAREWELL.cyan())?;
                self.state = SessionState::Terminated;
                return Ok(());
            }
        };

        match parse_command(&line) {
            Command::Skip => {}
            Command::Exit => {
                writeln!(self.out, "\n{}", FAREWELL.cyan())?;
                self.state = SessionState::Terminated;
            }
            Command::Ask(query) => {
                writeln!(self.out, "\n{}", "Searching knowledge base...".dimmed())?;
                match self.pipeline.answer(query).await {
                    Ok(answer) => {
                        self.summary.answered += 1;
                        self.print_answer(&answer)?;
                    }
                    Err(e) => {
                        self.summary.failed += 1;
                        tracing::warn!(error = ?e, "query failed");
                        writeln!(self.out, "\n{} {}", "Error:".red().bold(), e)?;
                        writeln!(self.out, "Please try again or type 'exit' to quit.")?;
                    }
                }
            }
        }
        Ok(())
    }

    fn print_answer(&mut self, answer: &Answer) -> io::Result<()> {
        writeln!(self.out, "\n{} {}", "Answer:".green().bold(), answer.text)?;
        if answer.sources.is_empty() {
            return Ok(());
        }

        writeln!(self.out)?;
        for (i, passage) in answer.sources.iter().enumerate() {
            let name = std::path::Path::new(&passage.source)
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or(&passage.source);
            writeln!(
                self.out,
                "  {}",
                format!(
                    "[{}] {} #{} (score {:.2})",
                    i + 1,
                    name,
                    passage.chunk_index,
                    passage.score
                )
                .dimmed()
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::{QueryError, ServiceError};
    use crate::search::ScoredPassage;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedInput(VecDeque<Input>);

    impl ScriptedInput {
        fn lines(lines: &[&str]) -> Self {
            Self(lines.iter().map(|l| Input::Line(l.to_string())).collect())
        }

        fn events(events: Vec<Input>) -> Self {
            Self(events.into())
        }
    }

    #[async_trait(?Send)]
    impl InputSource for ScriptedInput {
        async fn next_input(&mut self) -> Input {
            self.0.pop_front().unwrap_or(Input::Eof)
        }
    }

    /// Counts calls; fails any query containing "fail"
    #[derive(Default)]
    struct FakePipeline {
        calls: RefCell<Vec<String>>,
    }

    #[async_trait(?Send)]
    impl QueryPipeline for FakePipeline {
        async fn answer(&self, query: &str) -> Result<Answer, QueryError> {
            self.calls.borrow_mut().push(query.to_string());
            if query.contains("fail") {
                return Err(QueryError::Generation(ServiceError::Status {
                    service: "language model",
                    status: 500,
                    message: "Traceback: internal".to_string(),
                }));
            }
            Ok(Answer {
                text: format!("About {}", query),
                sources: vec![ScoredPassage {
                    source: "data/knowledge.txt".to_string(),
                    chunk_index: 3,
                    content: "Altitudinal migration means moving up mountains.".to_string(),
                    score: 0.57,
                }],
            })
        }
    }

    async fn run_script(pipeline: &FakePipeline, mut input: ScriptedInput) -> (String, SessionSummary) {
        let mut out = Vec::new();
        let summary = {
            let mut session = Session::new(pipeline, &mut out);
            let summary = session.run(&mut input).await.unwrap();
            assert_eq!(session.state(), SessionState::Terminated);
            summary
        };
        (String::from_utf8(out).unwrap(), summary)
    }

    #[test]
    fn test_parse_command() {
        assert_eq!(parse_command(""), Command::Skip);
        assert_eq!(parse_command("   \t"), Command::Skip);
        assert_eq!(parse_command("exit"), Command::Exit);
        assert_eq!(parse_command("  QUIT "), Command::Exit);
        assert_eq!(parse_command("Exit"), Command::Exit);
        assert_eq!(parse_command(" exit now "), Command::Ask("exit now"));
        assert_eq!(parse_command(" Why? "), Command::Ask("Why?"));
    }

    #[tokio::test]
    async fn test_empty_then_exit() {
        let pipeline = FakePipeline::default();
        let (output, summary) = run_script(&pipeline, ScriptedInput::lines(&["", "exit"])).await;

        assert_eq!(output.matches("Goodbye!").count(), 1);
        assert!(output.contains(FAREWELL));
        assert!(pipeline.calls.borrow().is_empty());
        assert_eq!(summary, SessionSummary::default());
    }

    #[tokio::test]
    async fn test_one_query_then_quit() {
        let pipeline = FakePipeline::default();
        let (output, summary) = run_script(
            &pipeline,
            ScriptedInput::lines(&["what is altitudinal migration?", "quit"]),
        )
        .await;

        assert_eq!(*pipeline.calls.borrow(), vec!["what is altitudinal migration?"]);
        assert_eq!(summary.answered, 1);
        assert!(output.contains("Searching knowledge base..."));
        assert!(output.contains("About what is altitudinal migration?"));
        assert!(output.contains("knowledge.txt #3 (score 0.57)"));
        assert_eq!(output.matches("Goodbye!").count(), 1);
    }

    #[tokio::test]
    async fn test_interrupt_while_waiting() {
        let pipeline = FakePipeline::default();
        let (output, _) = run_script(
            &pipeline,
            ScriptedInput::events(vec![Input::Interrupt, Input::Line("never asked".into())]),
        )
        .await;

        assert_eq!(output.matches("Goodbye!").count(), 1);
        assert!(!output.contains(FAREWELL));
        assert!(pipeline.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_end_of_input_terminates() {
        let pipeline = FakePipeline::default();
        let (output, _) = run_script(&pipeline, ScriptedInput::lines(&["   "])).await;
        assert_eq!(output.matches("Goodbye!").count(), 1);
        assert!(pipeline.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn test_query_error_does_not_end_session() {
        let pipeline = FakePipeline::default();
        let (output, summary) = run_script(
            &pipeline,
            ScriptedInput::lines(&["please fail", "how do birds navigate?", "exit"]),
        )
        .await;

        assert_eq!(
            *pipeline.calls.borrow(),
            vec!["please fail", "how do birds navigate?"]
        );
        assert_eq!(summary, SessionSummary { answered: 1, failed: 1 });
        assert!(output.contains("Could not generate an answer"));
        assert!(output.contains("Please try again or type 'exit' to quit."));
        assert!(!output.contains("Traceback"));
        assert!(output.contains("About how do birds navigate?"));
    }

    #[tokio::test]
    async fn test_terminal_interrupt_while_read_pending() {
        // Writer half stays open so the read never completes
        let (_writer, reader) = tokio::io::duplex(64);
        let (tx, rx) = mpsc::unbounded_channel();
        let mut input = TerminalInput::with_reader(BufReader::new(reader), rx);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send(()).unwrap();
        });

        assert_eq!(input.next_input().await, Input::Interrupt);
    }

    #[tokio::test]
    async fn test_terminal_buffered_interrupt_wins_over_ready_line() {
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(()).unwrap();
        let mut input =
            TerminalInput::with_reader(BufReader::new(&b"how do birds navigate?\n"[..]), rx);

        assert_eq!(input.next_input().await, Input::Interrupt);
        assert_eq!(
            input.next_input().await,
            Input::Line("how do birds navigate?".to_string())
        );
        assert_eq!(input.next_input().await, Input::Eof);
    }

    #[tokio::test]
    async fn test_terminal_reads_after_listener_is_gone() {
        let (tx, rx) = mpsc::unbounded_channel::<()>();
        drop(tx);
        let mut input = TerminalInput::with_reader(BufReader::new(&b"exit\n"[..]), rx);

        assert_eq!(input.next_input().await, Input::Line("exit".to_string()));
        assert_eq!(input.next_input().await, Input::Eof);
    }

    /// Simulates Ctrl+C pressed while the answer is being produced
    struct InterruptingPipeline {
        interrupts: mpsc::UnboundedSender<()>,
        calls: RefCell<usize>,
    }

    #[async_trait(?Send)]
    impl QueryPipeline for InterruptingPipeline {
        async fn answer(&self, _query: &str) -> Result<Answer, QueryError> {
            *self.calls.borrow_mut() += 1;
            self.interrupts.send(()).unwrap();
            Ok(Answer {
                text: "By the stars.".to_string(),
                sources: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_interrupt_during_query_ends_at_next_prompt() {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = InterruptingPipeline {
            interrupts: tx,
            calls: RefCell::new(0),
        };
        let mut input = TerminalInput::with_reader(
            BufReader::new(&b"how do birds navigate?\nwhat is a flyway?\n"[..]),
            rx,
        );

        let mut out = Vec::new();
        let summary = Session::new(&pipeline, &mut out)
            .run(&mut input)
            .await
            .unwrap();
        let output = String::from_utf8(out).unwrap();

        assert_eq!(*pipeline.calls.borrow(), 1);
        assert_eq!(summary.answered, 1);
        assert!(output.contains("By the stars."));
        assert_eq!(output.matches("Goodbye!").count(), 1);
        assert!(!output.contains(FAREWELL));
    }
}
