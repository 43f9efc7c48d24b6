use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use tcgen_client::StatusClient;
use tcgen_core::job::{Job, JobState};
use tcgen_core::request::{FileUpload, GenerationRequest, OutputFormat, RecognitionRequest};
use tcgen_tracker::flavor::Outcome;
use tcgen_tracker::{JobFlavor, JobSession, JobTracker, SessionEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::broadcast::Receiver;

use crate::cli::{Cli, Command, GenerateArgs, OutputArgs, RecognizeArgs};
use crate::config::AppConfig;

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(&cli)?;
    let client = Arc::new(StatusClient::from_config(&config.client)?);
    tracing::debug!(base_url = %client.base_url(), "Job service client ready");

    match cli.command {
        Command::Ping => {
            client
                .ping()
                .await
                .with_context(|| format!("{} is not reachable", client.base_url()))?;
            println!("{} is reachable", client.base_url());
            Ok(())
        }
        Command::Generate(args) => {
            let tracker = JobTracker::new(client, config.tracker);
            let result = generate(&tracker, args).await;
            tracker.shutdown();
            result
        }
        Command::Recognize(args) => {
            let tracker = JobTracker::new(client, config.tracker);
            let result = recognize(&tracker, args).await;
            tracker.shutdown();
            result
        }
    }
}

async fn generate(tracker: &JobTracker, args: GenerateArgs) -> anyhow::Result<()> {
    let request = match (args.file, args.text) {
        (Some(path), _) => {
            GenerationRequest::from_document(read_upload(&path).await?, args.output.format)
        }
        (None, Some(text)) => GenerationRequest::from_text(text, args.output.format),
        (None, None) => bail!("either --file or --text is required"),
    };
    run_generation(tracker, request, &args.output.out).await
}

async fn recognize(tracker: &JobTracker, args: RecognizeArgs) -> anyhow::Result<()> {
    let request = RecognitionRequest::new(read_upload(&args.image).await?);
    let session = tracker.recognition();
    let mut events = session.observe();
    session.submit(request).await?;

    let job = follow(session, &mut events, |event| match event {
        SessionEvent::Finished { job } if job.state == JobState::Succeeded => Some(job),
        _ => None,
    })
    .await?;
    let text = job.recognized_text().unwrap_or_default().to_string();
    println!("{text}");

    if args.then_generate {
        if text.trim().is_empty() {
            bail!("no text was recognized in {}", args.image.display());
        }
        let OutputArgs { format, out } = args.output;
        run_generation(tracker, GenerationRequest::from_text(text, format), &out).await?;
    }
    Ok(())
}

async fn run_generation(
    tracker: &JobTracker,
    request: GenerationRequest,
    out: &Path,
) -> anyhow::Result<()> {
    let format: OutputFormat = request.output_format;
    let session = tracker.generation();
    let mut events = session.observe();
    session.submit(request).await?;

    follow(session, &mut events, |event| match event {
        SessionEvent::ArtifactReady { .. } => Some(()),
        _ => None,
    })
    .await?;

    let handle = session
        .take_artifact()
        .context("artifact was ready but has already been taken")?;
    let path = handle
        .save_and_release(out)
        .await
        .with_context(|| format!("writing {format} export to {}", out.display()))?;
    println!("Saved {}", path.display());
    Ok(())
}

/// Print progress for `session` until `done` picks an event, a terminal
/// error is reported, or Ctrl-C cancels the job.
async fn follow<F, T>(
    session: &JobSession<F>,
    events: &mut Receiver<SessionEvent<Outcome<F>>>,
    mut done: impl FnMut(SessionEvent<Outcome<F>>) -> Option<T>,
) -> anyhow::Result<T>
where
    F: JobFlavor,
{
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => {
                session.cancel();
                bail!("cancelled");
            }
            event = events.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Missed session events");
                continue;
            }
            Err(RecvError::Closed) => bail!("job session closed"),
        };

        if let Some(err) = event.terminal_error() {
            return Err(err.into());
        }

        match &event {
            SessionEvent::Submitted { job } => println!("Submitted {} job {}", job.kind, job.id),
            SessionEvent::Updated { job } => print_progress(job),
            SessionEvent::PollFailed { error, .. } => eprintln!("Status check failed: {error}"),
            SessionEvent::Finished { job } => print_progress(job),
            SessionEvent::GaveUp { job, reason } => {
                bail!("gave up on job {}: {reason}", job.id)
            }
            SessionEvent::Cancelled { job_id } => bail!("job {job_id} was cancelled"),
            SessionEvent::ArtifactReady { .. } | SessionEvent::ArtifactUnavailable { .. } => {}
        }

        if let Some(value) = done(event) {
            return Ok(value);
        }
    }
}

fn print_progress<O>(job: &Job<O>) {
    if job.message.is_empty() {
        println!("[{:>3}%] {}", job.progress, job.state);
    } else {
        println!("[{:>3}%] {} {}", job.progress, job.state, job.message);
    }
}

async fn read_upload(path: &Path) -> anyhow::Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("{} is not a file", path.display()))?;
    Ok(FileUpload::new(file_name, bytes))
}
