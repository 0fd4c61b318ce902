//! Run a pipeline over a WAV file.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;
use serde_json::{Map, Value, json};
use sondeo_analysis::{Orchestrator, Snapshot};
use sondeo_config::Config;
use sondeo_io::{CaptureLoop, WavCapture};

/// Analyze a WAV file with a pipeline.
#[derive(Args)]
pub struct AnalyzeArgs {
    /// Input WAV file
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    /// Pipeline TOML
    #[arg(short, long)]
    pub config: PathBuf,

    /// Frames per capture buffer
    #[arg(long, default_value = "480")]
    pub buffer: usize,

    /// Also print values every N buffers (0 = only at the end)
    #[arg(long, default_value = "0")]
    pub every: u64,

    /// Pace the file at its own sample rate
    #[arg(long)]
    pub realtime: bool,

    /// Print one JSON object per report
    #[arg(long)]
    pub json: bool,
}

/// Run the analyze command.
pub fn run(args: AnalyzeArgs) -> anyhow::Result<()> {
    let config = Config::load(&args.config)?;
    let params = config.build()?;
    let source = WavCapture::open(&args.input, args.buffer)?.realtime(args.realtime);
    let sample_rate = source.info().sample_rate;

    tracing::info!(
        input = %args.input.display(),
        processings = params.processings.len(),
        frames = source.info().num_frames,
        "analysis started"
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = Arc::clone(&running);
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let mut capture = CaptureLoop::new(source, Orchestrator::new(params));
    let snapshot = capture.orchestrator().snapshot();
    let mut reported = 0;

    while running.load(Ordering::SeqCst) && capture.step()? {
        let buffers = capture.stats().buffers;
        if args.every > 0 && buffers != reported && buffers % args.every == 0 {
            reported = buffers;
            let time = seconds(capture.stats().frames, sample_rate);
            report(&snapshot.lock(), time, args.json)?;
        }
    }

    let stats = capture.stats();
    report(&snapshot.lock(), seconds(stats.frames, sample_rate), args.json)?;
    tracing::info!(
        buffers = stats.buffers,
        frames = stats.frames,
        overruns = stats.overruns,
        interrupted = !running.load(Ordering::SeqCst),
        "analysis finished"
    );
    Ok(())
}

fn seconds(frames: u64, sample_rate: u32) -> f64 {
    frames as f64 / f64::from(sample_rate.max(1))
}

fn report(snapshot: &Snapshot, time: f64, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string(&to_json(snapshot, time))?);
        return Ok(());
    }

    println!("t = {time:.3}s");
    for (processing, channels) in snapshot.processings() {
        for (channel, handlers) in channels {
            for (handler, data) in handlers {
                let values: Vec<String> = data
                    .values
                    .row(0)
                    .unwrap_or_default()
                    .iter()
                    .map(|v| format!("{v:.6}"))
                    .collect();
                println!("  {processing}/{channel}/{handler}: {}", values.join(" "));
            }
        }
    }
    Ok(())
}

// {"time": t, "processings": {processing: {channel: {handler: [values]}}}}
fn to_json(snapshot: &Snapshot, time: f64) -> Value {
    let mut processings = Map::new();
    for (processing, channels) in snapshot.processings() {
        let mut by_channel = Map::new();
        for (channel, handlers) in channels {
            let by_handler: Map<String, Value> = handlers
                .iter()
                .map(|(handler, data)| {
                    let values = data.values.row(0).unwrap_or_default();
                    (handler.clone(), json!(values))
                })
                .collect();
            by_channel.insert(channel.to_string(), Value::Object(by_handler));
        }
        processings.insert(processing.clone(), Value::Object(by_channel));
    }
    json!({ "time": time, "processings": processings })
}
