//! Operator CLI: negotiate with one board, then run captures on request.
//!
//! # Usage
//!
//! ```bash
//! dvrk-capture 3 -t 2.5 -s 1000
//! ```

mod console;

use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;

use dvrk_capture_core::{CaptureError, HandshakePolicy, SessionOptions, SessionState};
use dvrk_capture_udp::{connect_board, UdpTransportConfig};

use console::ConsoleDelegate;

#[derive(Parser)]
#[command(name = "dvrk-capture")]
#[command(about = "Stream controller board telemetry to CSV files")]
#[command(after_help = "Ensure the board's data collection server is running before starting the client.")]
struct Args {
    /// ID of the board to connect to
    board_id: u8,

    /// Capture duration in seconds; without it, press Enter to stop
    #[arg(short, long)]
    time: Option<f64>,

    /// Sample rate in Hz requested from the board
    #[arg(short, long)]
    sample_rate: Option<u32>,

    /// Include PS IO pins in each sample
    #[arg(short = 'i', long)]
    ps_io: bool,

    /// Directory for capture files
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Board address, overriding the one derived from the board ID
    #[arg(long)]
    peer: Option<SocketAddr>,

    /// Receive poll timeout in microseconds
    #[arg(long, default_value = "1000")]
    poll_timeout_us: u64,

    /// Seconds to wait for each board response during negotiation (0 = forever)
    #[arg(long, default_value = "30")]
    handshake_timeout: f64,

    /// Do not write a JSON sidecar next to each capture
    #[arg(long)]
    no_sidecar: bool,
}

impl Args {
    fn session_options(&self) -> Result<SessionOptions, String> {
        if !self.handshake_timeout.is_finite() || self.handshake_timeout < 0.0 {
            return Err(format!("invalid handshake timeout: {}", self.handshake_timeout));
        }
        let handshake = if self.handshake_timeout == 0.0 {
            HandshakePolicy::unbounded()
        } else {
            HandshakePolicy::with_deadline(Duration::from_secs_f64(self.handshake_timeout))
        };

        let options = SessionOptions {
            use_ps_io: self.ps_io,
            sample_rate: self.sample_rate,
            output_directory: self.output_dir.clone(),
            handshake,
            write_sidecar: !self.no_sidecar,
            ..Default::default()
        };
        options.validate()?;
        Ok(options)
    }

    fn transport_config(&self) -> UdpTransportConfig {
        let mut config = match self.peer {
            Some(peer) => UdpTransportConfig::with_peer(peer),
            None => UdpTransportConfig::for_board(self.board_id),
        };
        config.poll_timeout = Duration::from_micros(self.poll_timeout_us);
        config
    }

    fn capture_duration(&self) -> Result<Option<Duration>, String> {
        match self.time {
            Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
            Some(secs) => Err(format!("invalid capture time: {}", secs)),
            None => Ok(None),
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let options = args.session_options()?;
    let duration = args.capture_duration()?;
    let config = args.transport_config();

    if let Some(rate) = options.sample_rate {
        println!("Sample rate set to {} Hz", rate);
    }
    if options.use_ps_io {
        println!("PS IO pins will be included in each sample");
    }
    if let Some(d) = duration {
        println!("Timed capture enabled: {:.3} s", d.as_secs_f64());
    }

    let mut session = connect_board(&config, options)?;
    session.set_delegate(Arc::new(ConsoleDelegate));
    session.init()?;

    let stdin = io::stdin();
    let mut input = stdin.lock();

    loop {
        let index = session.next_capture_index();
        match prompt_yes_no(&mut input, index)? {
            Some(true) => {}
            Some(false) => break,
            None => {
                println!("Type either 'y' or 'n' and press Enter");
                continue;
            }
        }

        session.start()?;
        match duration {
            Some(d) => thread::sleep(d),
            None => {
                println!("...Press [ENTER] to stop capture");
                let mut line = String::new();
                input.read_line(&mut line)?;
            }
        }
        session.stop()?;

        if let SessionState::Failed(err) = session.state() {
            return Err(err.into());
        }
    }

    session.terminate()?;
    Ok(())
}

/// Ask whether to run capture `index`. `None` means the answer was not y/n;
/// end of input counts as "no".
fn prompt_yes_no(input: &mut impl BufRead, index: u32) -> Result<Option<bool>, CaptureError> {
    print!("Would you like to start capture [{}]? (y/n): ", index);
    io::stdout()
        .flush()
        .map_err(|e| CaptureError::Unknown(format!("failed to write prompt: {}", e)))?;

    let mut line = String::new();
    let read = input
        .read_line(&mut line)
        .map_err(|e| CaptureError::Unknown(format!("failed to read answer: {}", e)))?;
    if read == 0 {
        println!();
        return Ok(Some(false));
    }

    Ok(match line.trim() {
        "y" | "Y" => Some(true),
        "n" | "N" => Some(false),
        _ => None,
    })
}
