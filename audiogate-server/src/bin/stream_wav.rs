//! Test client: stream a WAV file to a running triage server and print the
//! decision tokens it answers.
//!
//! The send unit matches the reference capture client: 4800-sample frames
//! (100 ms at 48 kHz). Decisions arrive as bare unframed tokens, so the
//! socket is polled with a short read timeout after each frame and once
//! more after the last one.

use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::path::PathBuf;
use std::time::Duration;

use audiogate_core::protocol::Frame;

const DEFAULT_FRAME_SAMPLES: usize = 4800;
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

struct Args {
    input: PathBuf,
    addr: String,
    frame_samples: usize,
}

fn parse_args() -> Result<Args, String> {
    let mut input: Option<PathBuf> = None;
    let mut addr = "127.0.0.1:5050".to_string();
    let mut frame_samples = DEFAULT_FRAME_SAMPLES;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--input" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --input".into());
                };
                input = Some(PathBuf::from(v));
            }
            "--addr" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --addr".into());
                };
                addr = v;
            }
            "--frame-samples" => {
                let Some(v) = it.next() else {
                    return Err("missing value for --frame-samples".into());
                };
                frame_samples = v
                    .parse::<usize>()
                    .map_err(|_| "invalid value for --frame-samples".to_string())?
                    .max(1);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    let Some(input) = input else {
        return Err("required: --input <file.wav>".into());
    };
    Ok(Args {
        input,
        addr,
        frame_samples,
    })
}

/// Decode the WAV into mono f32 samples.
fn read_wav(path: &PathBuf) -> Result<Vec<f32>, String> {
    let reader = hound::WavReader::open(path)
        .map_err(|e| format!("opening {}: {e}", path.display()))?;
    let spec = reader.spec();

    if spec.sample_rate != 48_000 {
        eprintln!(
            "warning: {} is {} Hz; the server treats all input as 48 kHz",
            path.display(),
            spec.sample_rate
        );
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    let channels = spec.channels as usize;
    if channels == 1 {
        return Ok(interleaved);
    }
    Ok(interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect())
}

/// Drain any decision tokens currently sitting in the socket buffer.
fn drain_decisions(
    stream: &mut TcpStream,
    pending: &mut Vec<u8>,
    decisions: &mut usize,
) -> Result<bool, String> {
    let mut buf = [0u8; 16];
    match stream.read(&mut buf) {
        Ok(0) => return Ok(false), // server closed the connection
        Ok(n) => {
            pending.extend_from_slice(&buf[..n]);
            while pending.len() >= 4 {
                let token: Vec<u8> = pending.drain(..4).collect();
                println!("{}", String::from_utf8_lossy(&token));
                *decisions += 1;
            }
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || e.kind() == ErrorKind::TimedOut => {}
        Err(e) => return Err(format!("reading decision: {e}")),
    }
    Ok(true)
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    let samples = read_wav(&args.input)?;

    let mut stream = TcpStream::connect(&args.addr)
        .map_err(|e| format!("connecting to {}: {e}", args.addr))?;
    stream
        .set_read_timeout(Some(POLL_TIMEOUT))
        .map_err(|e| e.to_string())?;

    let mut frames = 0usize;
    let mut decisions = 0usize;
    let mut pending = Vec::new();

    for chunk in samples.chunks(args.frame_samples) {
        stream
            .write_all(&Frame::encode(chunk))
            .map_err(|e| format!("sending frame: {e}"))?;
        frames += 1;
        if !drain_decisions(&mut stream, &mut pending, &mut decisions)? {
            break;
        }
    }

    // Collect trailing decisions the server is still producing.
    loop {
        let before = decisions;
        if !drain_decisions(&mut stream, &mut pending, &mut decisions)? {
            break;
        }
        if decisions == before {
            break;
        }
    }

    eprintln!("{frames} frames sent, {decisions} decisions received");
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("stream-wav failed: {e}");
        std::process::exit(1);
    }
}
