use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tinnitus_matcher::audio;
use tinnitus_matcher::calibration::{
    BisectionAnswer, BisectionMatcher, CancelToken, Ear, PlaybackOutcome, SimulatedListener,
    StaircaseController, TestResult, TrialPresenter, TrialStep,
};
use tinnitus_matcher::config::AppConfig;
use tinnitus_matcher::managers::MatchingSession;

#[derive(Parser, Debug)]
#[command(
    name = "pitch_match",
    about = "Adaptive tinnitus pitch matching from the terminal"
)]
struct Cli {
    /// JSON configuration file (defaults to assets/matcher_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the 3AFC staircase through the default audio device
    Run {
        #[arg(long, default_value = "both")]
        ear: Ear,
        /// Starting frequency in Hz
        #[arg(long)]
        start: Option<f64>,
        /// Write the result as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Run the quick higher/lower bisection through the default audio device
    Bisect {
        #[arg(long, default_value = "both")]
        ear: Ear,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Drive the staircase with a simulated listener, no audio
    Simulate {
        /// Simulated tinnitus pitch in Hz
        #[arg(long)]
        pitch: f64,
        /// Probability of a random answer per trial
        #[arg(long, default_value_t = 0.0)]
        error_rate: f64,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        #[arg(long)]
        start: Option<f64>,
        /// Use the bisection matcher instead of the staircase
        #[arg(long)]
        bisection: bool,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration
    ShowConfig,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };
    config.validate().context("configuration rejected")?;

    match cli.command {
        Commands::Run { ear, start, output } => run_staircase(config, ear, start, output),
        Commands::Bisect { ear, output } => run_bisect(config, ear, output),
        Commands::Simulate {
            pitch,
            error_rate,
            seed,
            start,
            bisection,
            json,
        } => run_simulate(config, pitch, error_rate, seed, start, bisection, json),
        Commands::ShowConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(ExitCode::from(0))
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("building async runtime")
}

fn run_staircase(
    config: AppConfig,
    ear: Ear,
    start: Option<f64>,
    output: Option<PathBuf>,
) -> Result<ExitCode> {
    let session = MatchingSession::new(config, audio::default_output())?;
    session.start(ear, start)?;
    println!("Listen to three tones, then pick the one closest to your tinnitus.");
    println!("Answer 1, 2 or 3; r replays the trial; q quits.");

    let rt = runtime()?;
    loop {
        let set = match session.next_trial()? {
            TrialStep::Trial(set) => set,
            TrialStep::Finished => break,
        };

        let selection = loop {
            println!("\nTrial {}", set.iteration);
            if rt.block_on(session.play_current_trial())? == PlaybackOutcome::Cancelled {
                return Ok(ExitCode::from(1));
            }
            match prompt("Which tone matched [1/2/3, r, q]? ")?.as_str() {
                "q" => {
                    session.cancel()?;
                    println!("Cancelled.");
                    return Ok(ExitCode::from(1));
                }
                "r" | "" => continue,
                answer => match answer.parse::<usize>() {
                    Ok(n @ 1..=3) => break n - 1,
                    _ => println!("Please answer 1, 2 or 3."),
                },
            }
        };

        if session.submit_response(selection)?.is_finished() {
            break;
        }
    }

    finish(session.result()?, output)
}

fn run_bisect(config: AppConfig, ear: Ear, output: Option<PathBuf>) -> Result<ExitCode> {
    let mut matcher = BisectionMatcher::new(&config)?;
    let presenter = TrialPresenter::new(audio::default_output(), config.playback.clone());
    let cancel = CancelToken::new();
    let rt = runtime()?;

    println!("Is your tinnitus higher or lower than the tone? Answer h, l or m (match); q quits.");
    let mut probe = Some(matcher.start(ear)?);
    while let Some(frequency_hz) = probe {
        rt.block_on(presenter.play_probe(frequency_hz, ear, &cancel))?;
        let answer = match prompt("[h/l/m, r, q]? ")?.as_str() {
            "q" => {
                matcher.cancel();
                println!("Cancelled.");
                return Ok(ExitCode::from(1));
            }
            "r" | "" => continue,
            text => match text.parse::<BisectionAnswer>() {
                Ok(answer) => answer,
                Err(msg) => {
                    println!("{msg}");
                    continue;
                }
            },
        };
        probe = matcher.submit(answer)?;
    }

    finish(matcher.get_result()?, output)
}

fn run_simulate(
    config: AppConfig,
    pitch: f64,
    error_rate: f64,
    seed: u64,
    start: Option<f64>,
    bisection: bool,
    json: bool,
) -> Result<ExitCode> {
    if !(pitch.is_finite() && pitch > 0.0) {
        bail!("pitch must be a positive frequency, got {pitch}");
    }
    let mut listener = SimulatedListener::new(pitch, error_rate, seed);

    let result = if bisection {
        let mut matcher = BisectionMatcher::new(&config)?;
        let mut probe = Some(matcher.start(Ear::Both)?);
        while let Some(frequency_hz) = probe {
            let answer = listener.compare(frequency_hz);
            println!("probe {frequency_hz:>8.1} Hz -> {answer:?}");
            probe = matcher.submit(answer)?;
        }
        matcher.get_result()?
    } else {
        let mut controller = StaircaseController::seeded(&config, seed)?;
        controller.start(Ear::Both, start)?;
        while let TrialStep::Trial(set) = controller.next_trial()? {
            let selection = listener.choose(&set);
            let summary = controller.submit_response(selection)?;
            println!(
                "trial {:>2}: [{:>8.1} {:>8.1} {:>8.1}] picked {:>8.1} Hz {}",
                set.iteration,
                set.frequencies[0],
                set.frequencies[1],
                set.frequencies[2],
                summary.record.selected_frequency_hz,
                if summary.record.was_correct { "(confirm)" } else { "" }
            );
            if summary.is_finished() {
                break;
            }
        }
        controller.get_result()?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let error_octaves = (result.frequency_hz / pitch).log2();
        println!(
            "true pitch {:.1} Hz, error {:+.3} oct",
            pitch, error_octaves
        );
        print_result(&result);
    }
    Ok(ExitCode::from(0))
}

fn finish(result: TestResult, output: Option<PathBuf>) -> Result<ExitCode> {
    print_result(&result);
    if let Some(path) = output {
        result
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
    }
    Ok(ExitCode::from(0))
}

fn print_result(result: &TestResult) {
    println!(
        "Matched {:.1} Hz ({} ear), confidence {}%, {} trials, {:?}",
        result.frequency_hz,
        result.ear.display_name(),
        result.confidence_percent,
        result.iterations,
        result.outcome
    );
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok("q".to_string());
    }
    Ok(line.trim().to_ascii_lowercase())
}
