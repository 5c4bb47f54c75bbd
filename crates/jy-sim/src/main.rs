//! Headless runner for Heroes of Jin Yong
//!
//! Loads a session from JSON and either fights one battle with both sides
//! on autopilot or runs one event script, answering every window request
//! automatically. Prints a JSON summary of what happened.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use log::{LevelFilter, Log, Metadata, Record, debug, info, trace, warn};
use serde::Serialize;

use jy_core::battle::{Battle, Outcome, Stage};
use jy_core::event::EventVm;
use jy_core::ui::{Direction, Key, UiRequest};
use jy_core::world::{CoreResult, Session};

/// Headless battle and event script runner
#[derive(Parser, Debug)]
#[command(name = "jy-sim")]
#[command(author, version, about = "Heroes of Jin Yong - headless runner", long_about = None)]
struct Args {
    /// Session file (save data, content and factors as JSON)
    session: PathBuf,

    /// Fight this battle with both sides auto-controlled
    #[arg(short = 'b', long = "battle", conflicts_with = "event")]
    battle: Option<i16>,

    /// Run this event script
    #[arg(short = 'e', long = "event")]
    event: Option<i16>,

    /// Reseed the random generator
    #[arg(short = 's', long = "seed")]
    seed: Option<u64>,

    /// Answer every yes/no prompt with "no"
    #[arg(short = 'n', long = "decline")]
    decline: bool,

    /// Submap the player stands on while the script runs
    #[arg(long = "sub-map", default_value_t = 0)]
    sub_map: i16,

    /// Frames before giving up on a battle or script
    #[arg(long = "max-frames", default_value_t = 100_000)]
    max_frames: usize,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short = 'l', long = "log-level", default_value = "warn")]
    log_level: String,
}

/// Writes every record to stderr.
struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!("[{:5}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

#[derive(Debug, Serialize)]
struct BattleReport {
    battle: i16,
    won: bool,
    dead: bool,
    frames: usize,
}

#[derive(Debug, Serialize)]
struct MemberReport {
    id: i16,
    level: i16,
    hp: i16,
    max_hp: i16,
    mp: i16,
    exp: u16,
}

#[derive(Debug, Default, Serialize)]
struct Summary {
    battles: Vec<BattleReport>,
    /// Window requests the script raised.
    requests: usize,
    finished: bool,
    position: Option<(i32, i32)>,
    facing: Option<String>,
    party: Vec<MemberReport>,
    bag: Vec<(i16, i16)>,
}

impl Summary {
    fn record_party(&mut self, session: &Session) {
        self.party = session
            .data
            .members()
            .filter_map(|id| session.data.character(id))
            .map(|c| MemberReport {
                id: c.id,
                level: c.level,
                hp: c.hp,
                max_hp: c.max_hp,
                mp: c.mp,
                exp: c.exp,
            })
            .collect();
        self.bag = session.data.bag.items().collect();
    }
}

/// How the driver answers the window requests of one script step.
enum Answer {
    Continue(bool),
    Key,
    Menu,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = LevelFilter::from_str(&args.log_level)?;
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);

    let mut session = Session::load(&args.session)?;
    if let Some(seed) = args.seed {
        session.rng = jy_core::GameRng::new(seed);
    }
    info!("loaded {} with seed {}", args.session.display(), session.rng.seed());

    let mut summary = Summary::default();
    match (args.battle, args.event) {
        (Some(battle), _) => {
            let report = auto_battle(&mut session, battle, false, false, args.max_frames)?;
            summary.finished = report.frames < args.max_frames;
            summary.battles.push(report);
        }
        (None, Some(event)) => run_script(&args, &mut session, event, &mut summary)?,
        (None, None) => return Err("nothing to run: pass --battle or --event".into()),
    }
    summary.record_party(&session);

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Deploy the party and let the AI play both sides until the battle ends.
fn auto_battle(
    session: &mut Session,
    battle_id: i16,
    exp_on_lose: bool,
    dead_on_lose: bool,
    max_frames: usize,
) -> CoreResult<BattleReport> {
    let mut battle = Battle::load(session, battle_id, exp_on_lose, dead_on_lose)?;
    let members = match battle.forced_members() {
        Some(forced) => forced,
        None => {
            let preset = battle.default_members();
            if preset.is_empty() { session.data.members().collect() } else { preset }
        }
    };
    debug!("battle {battle_id} with members {members:?}");
    battle.put_chars(session, &members);
    battle.set_auto_control(true);

    let mut frames = 0;
    let outcome = loop {
        if let Some(outcome) = battle.outcome() {
            break outcome;
        }
        if frames >= max_frames {
            warn!("battle {battle_id} still running after {frames} frames");
            break Outcome { won: false, dead: false };
        }
        match battle.stage() {
            Stage::PoppingUp | Stage::Finished => battle.close_popup(session),
            _ => battle.frame(session),
        }
        for request in battle.take_requests() {
            trace!("battle: {request:?}");
        }
        frames += 1;
    };
    info!("battle {battle_id} ended: won {} dead {}", outcome.won, outcome.dead);
    Ok(BattleReport {
        battle: battle_id,
        won: outcome.won,
        dead: outcome.dead,
        frames,
    })
}

fn run_script(args: &Args, session: &mut Session, event: i16, summary: &mut Summary) -> CoreResult<()> {
    let mut vm = EventVm::new();
    vm.enter(args.sub_map, 0, 0, Direction::Down);
    vm.run_event(session, event)?;

    let mut frames = 0;
    while vm.is_running() && frames < args.max_frames {
        let mut answer = None;
        for request in vm.take_requests() {
            debug!("script {}: {request:?}", vm.script_id());
            summary.requests += 1;
            match request {
                UiRequest::EnterBattle {
                    battle,
                    exp_on_lose,
                    dead_on_lose,
                } => {
                    let report = auto_battle(session, battle, exp_on_lose, dead_on_lose, args.max_frames)?;
                    answer = Some(Answer::Continue(report.won));
                    summary.battles.push(report);
                }
                UiRequest::YesNo(_) => answer = Some(Answer::Continue(!args.decline)),
                UiRequest::ExtendedWaitKey => answer = Some(Answer::Key),
                UiRequest::ExtendedMenu { .. } => answer = Some(Answer::Menu),
                UiRequest::Talk { .. }
                | UiRequest::Message(_)
                | UiRequest::OpenShop(_)
                | UiRequest::FadeIn
                | UiRequest::FadeOut
                | UiRequest::PlayerDie => {
                    answer.get_or_insert(Answer::Continue(true));
                }
                _ => {}
            }
        }
        match answer {
            Some(Answer::Continue(result)) => vm.continue_events(session, result),
            Some(Answer::Key) => {
                vm.press_key(session, Key::Ok);
            }
            Some(Answer::Menu) => {
                vm.choose(session, Some(0));
            }
            None => vm.frame(session),
        }
        frames += 1;
    }
    if vm.is_running() {
        warn!("script {event} still running after {frames} steps");
    }

    summary.finished = !vm.is_running();
    summary.position = Some(vm.position());
    summary.facing = Some(vm.direction().to_string());
    Ok(())
}
