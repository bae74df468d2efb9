use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use clap::Args;
use stillpoint_core::bell::{BellPlayer, SilentBell, TerminalBell};
use stillpoint_core::clock::{Clock, SystemClock};
use stillpoint_core::noise::{LoggedNoise, NoisePlayer, SilentNoise};
use stillpoint_core::storage::{
    FileSettingsStore, FileTimingCache, SessionConfigPatch, SettingsStore,
};
use stillpoint_core::{Devices, Event, NoopWakeLock, Phase, Session, SimulatedSpeech};
use tokio::io::{AsyncBufReadExt, BufReader};

const TICK_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Args)]
pub struct RunArgs {
    /// Meditation length in seconds
    #[arg(long)]
    duration: Option<u64>,
    /// Silent pre-roll before the start bells, in seconds
    #[arg(long)]
    delay: Option<u64>,
    /// Number of start bells
    #[arg(long)]
    start_bells: Option<usize>,
    /// Number of end bells
    #[arg(long)]
    end_bells: Option<usize>,
    /// Interval bell period in minutes (0 = off)
    #[arg(long)]
    interval: Option<u64>,
    /// Narrate the script during the meditation
    #[arg(long)]
    guided: bool,
    /// Script file (.json or markup); defaults to the bundled script
    #[arg(long)]
    script: Option<PathBuf>,
    /// Jump to this remaining time right after starting (negative = pre-roll)
    #[arg(long, allow_hyphen_values = true)]
    seek: Option<i64>,
    /// Run the clock this many times faster than real time
    #[arg(long, default_value_t = 1)]
    speed: u64,
    /// Log bells instead of ringing the terminal bell
    #[arg(long)]
    silent: bool,
    /// No background noise during unguided meditation
    #[arg(long)]
    no_noise: bool,
    /// Ignore commands on stdin
    #[arg(long)]
    no_input: bool,
}

/// System clock running `factor` times faster than real time.
struct ScaledClock {
    inner: SystemClock,
    factor: u64,
}

impl Clock for ScaledClock {
    fn now_ms(&self) -> u64 {
        self.inner.now_ms().saturating_mul(self.factor)
    }
}

pub fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FileSettingsStore::open()?;
    let mut config = store.current();
    if let Some(d) = args.duration {
        config.meditation_duration = d;
    }
    if let Some(d) = args.delay {
        config.start_delay = d;
    }
    if let Some(n) = args.start_bells {
        config.set_start_bell_count(n);
    }
    if let Some(n) = args.end_bells {
        config.set_end_bell_count(n);
    }
    if let Some(p) = args.interval {
        config.interval_bell_period = p;
    }
    config.guided |= args.guided;

    let script = super::load_script(args.script.as_deref())?;
    let clock: Rc<dyn Clock> = Rc::new(ScaledClock {
        inner: SystemClock::new(),
        factor: args.speed.max(1),
    });
    let bell: Box<dyn BellPlayer> = if args.silent {
        Box::new(SilentBell::default())
    } else {
        Box::new(TerminalBell::new())
    };
    let noise: Box<dyn NoisePlayer> = if args.no_noise {
        Box::new(SilentNoise)
    } else {
        Box::new(LoggedNoise)
    };
    let speech = SimulatedSpeech::new(config.voice.voice_id.clone()).with_echo(true);
    let devices = Devices {
        bell,
        speech: Box::new(speech),
        noise,
        wake_lock: Box::new(NoopWakeLock),
        cache: Box::new(FileTimingCache::open()?),
    };

    tracing::info!(
        duration = config.meditation_duration,
        delay = config.start_delay,
        guided = config.guided,
        "starting session"
    );
    let mut session = Session::new(config, script, clock, devices);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(drive(&mut session, &mut store, args.seek, !args.no_input))
}

async fn drive(
    session: &mut Session,
    store: &mut dyn SettingsStore,
    seek: Option<i64>,
    read_input: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    emit(session.start())?;
    if let Some(remaining) = seek {
        emit(session.seek(remaining))?;
    }

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = read_input;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for event in session.tick() {
                    emit(Some(event))?;
                }
                let st = session.state();
                if st.phase == Phase::Finished && !st.is_bell_sequence_running {
                    break;
                }
            }
            line = lines.next_line(), if input_open => match line {
                Ok(Some(line)) => {
                    if !handle_input(session, store, line.trim())? {
                        break;
                    }
                }
                Ok(None) => input_open = false,
                Err(e) => {
                    tracing::warn!("stdin closed: {e}");
                    input_open = false;
                }
            },
        }
    }
    emit(Some(session.engine().snapshot()))
}

/// Apply one line of keyboard input. Returns false to quit.
fn handle_input(
    session: &mut Session,
    store: &mut dyn SettingsStore,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut words = line.split_whitespace();
    match words.next() {
        None | Some("p") => emit(session.toggle())?,
        Some("r") => emit(session.reset())?,
        Some("s") => match words.next().map(str::parse::<i64>) {
            Some(Ok(remaining)) => emit(session.seek(remaining))?,
            _ => eprintln!("usage: s <remaining seconds>"),
        },
        Some("m") => {
            let mut config = session.engine().config().clone();
            config.volume.toggle_mute();
            tracing::info!(muted = config.volume.muted, "volume toggled");
            store.save(&SessionConfigPatch {
                volume: Some(config.volume),
                ..Default::default()
            });
            session.apply_config(config);
        }
        Some("q") => return Ok(false),
        Some(other) => eprintln!("unknown command '{other}' (p, r, s <secs>, m, q)"),
    }
    Ok(true)
}

fn emit(event: Option<Event>) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(event) = event {
        println!("{}", serde_json::to_string(&event)?);
    }
    Ok(())
}
