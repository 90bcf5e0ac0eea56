use std::{path::PathBuf, thread, time::Duration};

use clap::{Args, Parser, Subcommand};
use crossbeam::channel::{self, RecvTimeoutError, Sender};
use hitsync_core::{
    AnalysisCompletion, AnalysisResponse, AppConfig, Category, EngineState, FireLog,
    FlashOverlay, Generation, HitSyncError, LoadOutcome, PlaybackClock, SyncEngine,
    TransportClock,
};
use tracing_subscriber::EnvFilter;

fn main() -> hitsync_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Inspect { analysis } => run_inspect(&analysis),
        Commands::Replay(args) => run_replay(args),
    }
}

fn run_inspect(path: &PathBuf) -> hitsync_core::Result<()> {
    let body = std::fs::read_to_string(path)?;
    let summary = AnalysisResponse::from_json(&body)?.summary();

    tracing::info!(
        ?path,
        tempo_bpm = ?summary.tempo_bpm,
        last_event_seconds = ?summary.last_event_seconds,
        "analysis summary"
    );
    for category in Category::ALL {
        tracing::info!(%category, events = summary.count(category), "track");
    }
    Ok(())
}

fn run_replay(args: ReplayArgs) -> hitsync_core::Result<()> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_json_file(path)?,
        None => AppConfig::default(),
    };
    if let Some(fps) = args.fps {
        config.replay.fps = fps;
    }
    config.validate()?;

    tracing::info!(
        analysis = ?args.analysis,
        fps = config.replay.fps,
        seek_policy = ?config.sync.seek_policy,
        "starting replay"
    );

    let path = args.analysis.clone();
    let outcome = replay(&config, &args.plan(), |generation, results| {
        spawn_analysis(generation, path.clone(), results.clone());
    })?;

    report_summary(&outcome);
    Ok(())
}

/// Runs the simulated render loop.
///
/// `request` is called once per source with the generation its analysis must
/// be tagged with and the channel to deliver it on. The transport holds still
/// while the engine waits for tracks.
fn replay<F>(
    config: &AppConfig,
    plan: &ReplayPlan,
    mut request: F,
) -> hitsync_core::Result<ReplayOutcome>
where
    F: FnMut(Generation, &Sender<AnalysisCompletion>),
{
    config.validate()?;
    let frame_seconds = 1.0 / f64::from(config.replay.fps);
    let frame = Duration::from_secs_f64(frame_seconds);

    let mut engine = SyncEngine::new(config.sync.clone());
    let mut clock = TransportClock::new();
    let mut dispatcher = (FlashOverlay::new(config.overlay.clone()), FireLog::new());
    let (results_tx, results_rx) = channel::unbounded();
    let mut schedule = Schedule::new(plan);
    let mut outcome = ReplayOutcome::default();

    let mut end = start_source(&mut engine, &mut clock, plan, &results_tx, &mut request);
    let mut awaiting = true;

    loop {
        if engine.state() == EngineState::Idle {
            if !awaiting {
                break;
            }
            match results_rx.recv_timeout(frame) {
                Ok(completion) => {
                    let current = apply_completion(
                        &mut engine,
                        &clock,
                        completion,
                        &mut end,
                        config,
                        &mut outcome,
                    );
                    if current {
                        awaiting = false;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(HitSyncError::msg("analysis channel closed"));
                }
            }
            continue;
        }

        while let Ok(completion) = results_rx.try_recv() {
            apply_completion(&mut engine, &clock, completion, &mut end, config, &mut outcome);
        }

        let report = engine.tick(&clock, &mut dispatcher)?;
        if report.discontinuity {
            outcome.discontinuities += 1;
            tracing::info!(position = report.position, "seek detected");
        }
        for category in Category::ALL {
            for timestamp in report.fired(category) {
                tracing::debug!(
                    %category,
                    timestamp,
                    position = report.position,
                    level = dispatcher.0.levels().get(category),
                    "hit"
                );
            }
        }

        dispatcher.0.decay(frame_seconds);

        if schedule.take_reload(clock.position()) {
            end = start_source(&mut engine, &mut clock, plan, &results_tx, &mut request);
            awaiting = true;
            continue;
        }
        schedule.apply(&mut clock, frame_seconds);

        clock.advance(frame_seconds);
        outcome.frames += 1;

        let finished = end.is_some_and(|end| clock.position() >= end)
            || (clock.duration() > 0.0 && !clock.is_playing() && !schedule.is_paused());
        if finished {
            engine.tick(&clock, &mut dispatcher)?;
            break;
        }
    }

    outcome.position = clock.position();
    outcome.generation = engine.generation();
    outcome.events = Category::ALL.map(|category| engine.cursor(category).track().len());
    outcome.flashes = dispatcher.0.flashes();
    outcome.fires = dispatcher.1;
    Ok(outcome)
}

/// Begins a new source and asks for its analysis. Returns the replay end
/// position when it is already known.
fn start_source<F>(
    engine: &mut SyncEngine,
    clock: &mut TransportClock,
    plan: &ReplayPlan,
    results: &Sender<AnalysisCompletion>,
    request: &mut F,
) -> Option<f64>
where
    F: FnMut(Generation, &Sender<AnalysisCompletion>),
{
    let generation = engine.begin_source();
    clock.stop();
    if let Some(duration) = plan.duration {
        clock.set_duration(duration);
    }
    clock.play();
    request(generation, results);
    plan.duration
}

fn spawn_analysis(generation: Generation, path: PathBuf, results: Sender<AnalysisCompletion>) {
    thread::spawn(move || {
        let result = std::fs::read_to_string(&path)
            .map_err(HitSyncError::from)
            .and_then(|body| AnalysisResponse::from_json(&body));
        tracing::debug!(%generation, ok = result.is_ok(), "analysis request finished");
        let _ = results.send(AnalysisCompletion::new(generation, result));
    });
}

/// Hands one finished analysis to the engine. Returns whether it answered
/// the current source.
fn apply_completion(
    engine: &mut SyncEngine,
    clock: &TransportClock,
    completion: AnalysisCompletion,
    end: &mut Option<f64>,
    config: &AppConfig,
    outcome: &mut ReplayOutcome,
) -> bool {
    let summary = completion
        .result
        .as_ref()
        .ok()
        .map(AnalysisResponse::summary);

    match engine.complete(completion, clock) {
        Ok(LoadOutcome::Applied) => {
            if let Some(summary) = summary {
                tracing::info!(
                    position = clock.position(),
                    tempo_bpm = ?summary.tempo_bpm,
                    kicks = summary.kicks,
                    snares = summary.snares,
                    vocals = summary.vocals,
                    "analysis applied"
                );
                if end.is_none() {
                    let last_event = summary.last_event_seconds.unwrap_or(0.0);
                    *end = Some(last_event + config.replay.tail_seconds);
                }
            }
            true
        }
        Ok(stale) => {
            outcome.stale_results += 1;
            tracing::info!(outcome = ?stale, "ignored analysis for a previous source");
            false
        }
        Err(err) => {
            tracing::error!(error = %err, "analysis failed; ending replay");
            outcome.analysis_error = Some(err.to_string());
            true
        }
    }
}

fn report_summary(outcome: &ReplayOutcome) {
    tracing::info!(
        frames = outcome.frames,
        position = outcome.position,
        discontinuities = outcome.discontinuities,
        stale_results = outcome.stale_results,
        flashes = outcome.flashes,
        generation = %outcome.generation,
        "replay finished"
    );
    if let Some(error) = &outcome.analysis_error {
        tracing::warn!(%error, "replay ran without tracks");
    }
    for (category, events) in Category::ALL.into_iter().zip(outcome.events) {
        tracing::info!(
            %category,
            fired = outcome.fires.count(category),
            events,
            "fires"
        );
    }
}

/// Everything a replay run observed.
#[derive(Debug, Default)]
struct ReplayOutcome {
    frames: u64,
    discontinuities: u64,
    stale_results: u64,
    position: f64,
    generation: Generation,
    /// Track lengths of the final source, in `Category::ALL` order.
    events: [usize; 3],
    flashes: usize,
    fires: FireLog,
    analysis_error: Option<String>,
}

/// Transport script for one replay run.
#[derive(Debug, Clone, Default)]
struct ReplayPlan {
    duration: Option<f64>,
    seeks: Vec<(f64, f64)>,
    pauses: Vec<(f64, f64)>,
    reload_at: Option<f64>,
}

/// Scripted transport actions applied as the replay clock crosses them.
#[derive(Debug)]
struct Schedule {
    seeks: Vec<(f64, f64)>,
    pauses: Vec<(f64, f64)>,
    reload_at: Option<f64>,
    paused_for: Option<f64>,
}

impl Schedule {
    fn new(plan: &ReplayPlan) -> Self {
        let mut seeks = plan.seeks.clone();
        seeks.sort_by(|a, b| b.0.total_cmp(&a.0));
        let mut pauses = plan.pauses.clone();
        pauses.sort_by(|a, b| b.0.total_cmp(&a.0));
        Self {
            seeks,
            pauses,
            reload_at: plan.reload_at,
            paused_for: None,
        }
    }

    fn is_paused(&self) -> bool {
        self.paused_for.is_some()
    }

    fn take_reload(&mut self, position: f64) -> bool {
        if self.reload_at.is_some_and(|at| position >= at) {
            tracing::info!(position, "loading the file again");
            self.reload_at = None;
            return true;
        }
        false
    }

    fn apply(&mut self, clock: &mut TransportClock, frame_seconds: f64) {
        if let Some(remaining) = self.paused_for.as_mut() {
            *remaining -= frame_seconds;
            if *remaining <= 0.0 {
                self.paused_for = None;
                clock.play();
                tracing::info!(position = clock.position(), "resumed");
            }
            return;
        }

        let position = clock.position();
        if self.pauses.last().is_some_and(|(at, _)| position >= *at) {
            if let Some((_, seconds)) = self.pauses.pop() {
                clock.pause();
                self.paused_for = Some(seconds);
                tracing::info!(position, seconds, "paused");
            }
        }
        if self.seeks.last().is_some_and(|(from, _)| position >= *from) {
            if let Some((_, to)) = self.seeks.pop() {
                clock.seek(to);
                tracing::info!(from = position, to, "seeking");
            }
        }
    }
}

fn parse_pair(value: &str) -> Result<(f64, f64), String> {
    let (left, right) = value
        .split_once(':')
        .ok_or_else(|| format!("expected `A:B`, got `{value}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| format!("`{part}` is not a non-negative number of seconds"))
    };
    Ok((parse(left)?, parse(right)?))
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive hit synchronisation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print what an analysis response contains.
    Inspect {
        /// JSON body returned by the analysis service.
        analysis: PathBuf,
    },
    /// Play an analysis response back against a simulated clock.
    Replay(ReplayArgs),
}

#[derive(Args, Debug)]
struct ReplayArgs {
    /// JSON body returned by the analysis service.
    analysis: PathBuf,
    /// Optional JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Render loop rate, overriding the configuration.
    #[arg(long)]
    fps: Option<u32>,
    /// Length of the simulated source in seconds.
    #[arg(long)]
    duration: Option<f64>,
    /// Jump from one position to another, as `FROM:TO` seconds.
    #[arg(long = "seek", value_parser = parse_pair)]
    seeks: Vec<(f64, f64)>,
    /// Pause at a position for a while, as `AT:SECONDS`.
    #[arg(long = "pause-at", value_parser = parse_pair)]
    pauses: Vec<(f64, f64)>,
    /// Load the same file again once playback reaches this position.
    #[arg(long)]
    reload_at: Option<f64>,
}

impl ReplayArgs {
    fn plan(&self) -> ReplayPlan {
        ReplayPlan {
            duration: self.duration,
            seeks: self.seeks.clone(),
            pauses: self.pauses.clone(),
            reload_at: self.reload_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_position_pairs() {
        assert_eq!(parse_pair("5:1.5"), Ok((5.0, 1.5)));
        assert_eq!(parse_pair(" 2.0 : 0 "), Ok((2.0, 0.0)));
        assert!(parse_pair("5").is_err());
        assert!(parse_pair("-1:2").is_err());
        assert!(parse_pair("a:b").is_err());
    }

    #[test]
    fn cli_accepts_repeated_seeks() {
        let cli = Cli::try_parse_from([
            "hitsync-app",
            "replay",
            "analysis.json",
            "--seek",
            "4:1",
            "--seek",
            "8:2",
            "--pause-at",
            "3:0.5",
        ])
        .unwrap();

        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        assert_eq!(args.seeks, vec![(4.0, 1.0), (8.0, 2.0)]);
        assert_eq!(args.pauses, vec![(3.0, 0.5)]);
    }

    #[test]
    fn schedule_applies_seek_once() {
        let cli = Cli::try_parse_from(["hitsync-app", "replay", "a.json", "--seek", "1:0.25"])
            .unwrap();
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        let mut schedule = Schedule::new(&args.plan());
        let mut clock = TransportClock::new();
        clock.play();
        clock.advance(1.0);

        schedule.apply(&mut clock, 0.1);
        assert_eq!(clock.position(), 0.25);
        clock.advance(1.0);
        schedule.apply(&mut clock, 0.1);
        assert_eq!(clock.position(), 1.25);
    }

    #[test]
    fn schedule_pauses_then_resumes() {
        let cli = Cli::try_parse_from(["hitsync-app", "replay", "a.json", "--pause-at", "0:0.15"])
            .unwrap();
        let Commands::Replay(args) = cli.command else {
            panic!("expected replay");
        };
        let mut schedule = Schedule::new(&args.plan());
        let mut clock = TransportClock::new();
        clock.play();

        schedule.apply(&mut clock, 0.1);
        assert!(!clock.is_playing());
        assert!(schedule.is_paused());
        schedule.apply(&mut clock, 0.1);
        schedule.apply(&mut clock, 0.1);
        assert!(clock.is_playing());
    }

    const BODY: &str = r#"{
        "tempo": 120.0,
        "kicks": [0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.5, 4.0],
        "snares": [1.0, 2.0, 3.0, 4.0],
        "vocals": [0.75, 2.25, 2.3, 3.8]
    }"#;

    fn serve(body: &'static str) -> impl FnMut(Generation, &Sender<AnalysisCompletion>) {
        move |generation: Generation, results: &Sender<AnalysisCompletion>| {
            results
                .send(AnalysisCompletion::from_body(generation, body))
                .unwrap();
        }
    }

    fn seek_plan() -> ReplayPlan {
        ReplayPlan {
            seeks: vec![(3.0, 0.5)],
            ..Default::default()
        }
    }

    #[test]
    fn plain_replay_fires_every_event_once() {
        let outcome = replay(&AppConfig::default(), &ReplayPlan::default(), serve(BODY)).unwrap();

        assert_eq!(outcome.discontinuities, 0);
        assert_eq!(outcome.events, [8, 4, 4]);
        for (category, events) in Category::ALL.into_iter().zip(outcome.events) {
            assert_eq!(outcome.fires.count(category), events);
        }
        assert_eq!(outcome.flashes, 16);
        assert!(outcome.position >= 5.0);
    }

    #[test]
    fn scripted_seek_rewinds_loaded_tracks() {
        let outcome = replay(&AppConfig::default(), &seek_plan(), serve(BODY)).unwrap();

        assert_eq!(outcome.discontinuities, 1);
        // six kicks up to 3.0, 0.5 again on the rewind, then 1.0 through 4.0
        assert_eq!(outcome.fires.count(Category::Kick), 14);
        assert!(outcome.analysis_error.is_none());
    }

    #[test]
    fn replay_is_deterministic() {
        let first = replay(&AppConfig::default(), &seek_plan(), serve(BODY)).unwrap();
        let second = replay(&AppConfig::default(), &seek_plan(), serve(BODY)).unwrap();

        assert_eq!(first.frames, second.frames);
        assert_eq!(first.fires.fires(), second.fires.fires());
    }

    #[test]
    fn reload_discards_late_result_for_previous_source() {
        let plan = ReplayPlan {
            reload_at: Some(2.0),
            ..Default::default()
        };
        let mut previous = None;
        let outcome = replay(&AppConfig::default(), &plan, |generation, results| {
            if let Some(old) = previous.replace(generation) {
                results
                    .send(AnalysisCompletion::from_body(old, BODY))
                    .unwrap();
            }
            results
                .send(AnalysisCompletion::from_body(generation, BODY))
                .unwrap();
        })
        .unwrap();

        assert_eq!(outcome.stale_results, 1);
        assert_eq!(outcome.generation.value(), 2);
        assert_eq!(outcome.discontinuities, 0);
        // four kicks before the reload, all eight after it
        assert_eq!(outcome.fires.count(Category::Kick), 12);
    }

    #[test]
    fn pause_holds_position_without_refiring() {
        let plain = replay(&AppConfig::default(), &ReplayPlan::default(), serve(BODY)).unwrap();
        let plan = ReplayPlan {
            pauses: vec![(1.0, 0.5)],
            ..Default::default()
        };
        let paused = replay(&AppConfig::default(), &plan, serve(BODY)).unwrap();

        assert_eq!(paused.discontinuities, 0);
        assert_eq!(paused.fires.fires(), plain.fires.fires());
        assert!(paused.frames > plain.frames + 25);
    }

    #[test]
    fn failed_analysis_ends_with_summary() {
        let outcome = replay(
            &AppConfig::default(),
            &seek_plan(),
            serve(r#"{"error": "No file uploaded"}"#),
        )
        .unwrap();

        assert_eq!(outcome.frames, 0);
        assert!(outcome.fires.fires().is_empty());
        assert!(outcome
            .analysis_error
            .as_deref()
            .is_some_and(|error| error.contains("No file uploaded")));
    }

    #[test]
    fn known_duration_ends_the_run() {
        let plan = ReplayPlan {
            duration: Some(2.2),
            ..Default::default()
        };
        let outcome = replay(&AppConfig::default(), &plan, serve(BODY)).unwrap();

        assert!((outcome.position - 2.2).abs() < 1e-9);
        assert_eq!(outcome.fires.count(Category::Kick), 4);
    }
}
