//! Interactive voice cloning console.
//!
//! Loads the reference audio and the cloning model once, then turns every
//! typed line into `output_<N>.wav`.

use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::audio::AudioConverter;
use crate::backend::{ModelConfig, load_models};
use crate::cli::{Args, ConsoleArgs, Reference};
use crate::engine::{CloneEngine, GenerationRequest, counter_filename};
use crate::voice::ReferenceAudio;

const EXIT_COMMANDS: [&str; 4] = ["exit", "quit", "exit()", "q"];

/// Reference voice and output location shared by every iteration.
#[derive(Debug, Clone)]
pub struct Session {
    pub ref_audio: PathBuf,
    pub ref_text: String,
    pub output_dir: PathBuf,
}

/// Whether `input` ends the loop (case-insensitive).
pub fn is_exit_command(input: &str) -> bool {
    let lowered = input.to_lowercase();
    EXIT_COMMANDS.contains(&lowered.as_str())
}

/// Run the console tool against stdin/stdout.
pub async fn run(args: &Args, console: &ConsoleArgs) -> Result<()> {
    let reference = Reference::new(&console.reference, &console.transcript)
        .context("Cannot start interactive mode")?;

    let source = reference.audio_path.clone();
    let prepared = tokio::task::spawn_blocking(move || {
        ReferenceAudio::prepare(&source, &AudioConverter::passthrough())
    })
    .await
    .context("Reference preparation task failed")?
    .context("Failed to prepare reference audio")?;

    if prepared.canonical != prepared.source {
        println!("[*] Using converted reference: {}", prepared.canonical.display());
    }

    let config = ModelConfig {
        tts_url: args.tts_url.clone(),
        model_dir: args.model_dir.clone(),
        device: args.resolved_device(),
        stt: None,
    };
    println!("[*] Using device: {}", config.device);
    let models = load_models(&config)
        .await
        .context("Failed to load voice cloning model")?;
    println!("[*] Model loaded successfully!");

    let session = Session {
        ref_audio: prepared.canonical,
        ref_text: reference.transcript,
        output_dir: console.output_dir.clone(),
    };
    let engine = CloneEngine::new(Arc::clone(&models.cloner));

    print_banner();

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = io::stdout();
    let generated = run_loop(&engine, &session, stdin, &mut stdout, interrupted()).await?;

    tracing::info!(generated, "console session finished");
    Ok(())
}

/// Resolves on Ctrl+C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

fn print_banner() {
    println!("\n{}", "=".repeat(50));
    println!(" Interactive Voice Cloning Mode ");
    println!(" (Type 'exit', 'quit', or Ctrl+C to stop) ");
    println!("{}", "=".repeat(50));
}

/// Prompt for lines on `input` until an exit command, end of input or
/// `interrupt` resolving.
///
/// Returns the number of files generated.
pub async fn run_loop<R, W, I>(
    engine: &CloneEngine,
    session: &Session,
    mut input: R,
    out: &mut W,
    interrupt: I,
) -> io::Result<usize>
where
    R: AsyncBufRead + Unpin,
    W: Write,
    I: Future<Output = ()>,
{
    tokio::pin!(interrupt);
    let mut counter = 1;
    let mut buf = Vec::new();

    loop {
        write!(out, "\n[#{counter}] Enter text to generate: ")?;
        out.flush()?;

        buf.clear();
        let read = tokio::select! {
            biased;
            () = &mut interrupt => None,
            read = input.read_until(b'\n', &mut buf) => Some(read),
        };

        let line = match read {
            None | Some(Ok(0)) => {
                writeln!(out, "\nExiting...")?;
                break;
            }
            Some(Ok(_)) => match std::str::from_utf8(&buf) {
                Ok(line) => line,
                Err(e) => {
                    writeln!(out, "[!] An error occurred: {e}")?;
                    continue;
                }
            },
            Some(Err(e)) => {
                writeln!(out, "[!] An error occurred: {e}")?;
                continue;
            }
        };

        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if is_exit_command(text) {
            writeln!(out, "\nExiting...")?;
            break;
        }

        writeln!(out, "\nGenerating speech for: '{text}'")?;

        let output = session.output_dir.join(counter_filename(counter));
        let request = GenerationRequest::new(text, &session.ref_audio, &session.ref_text);

        let outcome = tokio::select! {
            biased;
            () = &mut interrupt => None,
            outcome = engine.generate(&request, &output) => Some(outcome),
        };

        match outcome {
            None => {
                writeln!(out, "\nExiting...")?;
                break;
            }
            Some(Ok(result)) => {
                writeln!(
                    out,
                    "[*] Done in {}s! Saved to: {}",
                    result.time_taken(),
                    result.output_path.display()
                )?;
                counter += 1;
            }
            Some(Err(e)) => {
                tracing::error!(error = %e, "generation failed");
                writeln!(out, "[!] An error occurred: {e}")?;
            }
        }
    }

    Ok(counter - 1)
}
