//! `navgate-cli` – runs a navigation mission against a simulated robot.
//!
//! 1. Loads `~/.navgate/config.toml`, writing the defaults on first run.
//! 2. Initialises tracing (`RUST_LOG`, `NAVGATE_LOG_FORMAT`,
//!    `OTEL_EXPORTER_OTLP_ENDPOINT`).
//! 3. Builds `Sequence[NavigateTo, IsInFront]` through the node registry:
//!    drive (on a truncated policy) to a spot in front of the visitor, then
//!    check the visitor is straight ahead.
//! 4. Ticks the tree until it finishes, the tick budget runs out, or Ctrl-C
//!    halts it.

mod config;
mod sim;

use colored::Colorize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use navgate_middleware::action_channel;
use navgate_runtime::{BehaviorNode, Blackboard, Collaborators, NodeRegistry, NodeStatus, PortMap, init_tracing};
use navgate_types::{DetectionRecord, NavError, Vec3};

use sim::{APPROACH_FRAME, SimWorld};

/// Frame name the visitor is published under once faced.
const VISITOR_FRAME: &str = "visitor";

/// How far short of the approach spot the robot may stop, in metres.
const APPROACH_TOLERANCE: f64 = 0.25;

fn main() {
    let _telemetry = init_tracing("navgate");
    print_banner();

    let cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!("  Config loaded from {}", config::config_path().display().to_string().bold());
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Error saving config".red(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – halting mission …".yellow().bold());
        shutdown_flag.store(true, Ordering::SeqCst);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler");
    }

    match run_mission(&cfg, &shutdown) {
        Ok(report) => report.print(),
        Err(e) => {
            println!("{}: {}", "Mission setup failed".red().bold(), e);
            std::process::exit(1);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mission
// ─────────────────────────────────────────────────────────────────────────────

struct MissionReport {
    status: Option<NodeStatus>,
    ticks: u64,
    goals_reached: usize,
    direction: Option<i32>,
    visitor_published: bool,
    halted: bool,
}

fn run_mission(cfg: &config::Config, shutdown: &AtomicBool) -> Result<MissionReport, NavError> {
    let (client, server) = action_channel(cfg.action_name.as_str());
    let mut world = SimWorld::new(server, &cfg.world_frame, &cfg.robot_frame, &cfg.truncation_service);

    let mut blackboard = Blackboard::new();
    blackboard.set("visitor_template", DetectionRecord::new("person", Vec3::zero(), 0.0))?;

    let registry = NodeRegistry::new(cfg.navigate_config(&config::home_dir()));
    let mut collaborators = Collaborators {
        frames: Arc::new(world.tf.clone()),
        config_service: world.truncation_service.clone(),
        action_client: Some(Box::new(client)),
        detections: world.detections.clone(),
    };

    let navigate = registry.build(
        "NavigateTo",
        "approach_visitor",
        PortMap::new()
            .with("tf_frame", APPROACH_FRAME)
            .with("will_finish", true)
            .with("is_truncated", true)
            .with("distance_tolerance", APPROACH_TOLERANCE),
        &mut collaborators,
        &blackboard,
    )?;
    let check = registry.build(
        "IsInFront",
        "visitor_in_front",
        PortMap::new()
            .with("what", "person")
            .with("target", "visitor_template")
            .with("confidence", 0.6)
            .with("entity_to_identify", VISITOR_FRAME),
        &mut collaborators,
        &blackboard,
    )?;
    let mut tree = BehaviorNode::sequence(vec![BehaviorNode::leaf(navigate), BehaviorNode::leaf(check)]);

    info!(frame = APPROACH_FRAME, "mission started");
    let mut report = MissionReport {
        status: None,
        ticks: 0,
        goals_reached: 0,
        direction: None,
        visitor_published: false,
        halted: false,
    };

    while report.ticks < cfg.max_ticks {
        if shutdown.load(Ordering::SeqCst) {
            tree.halt();
            world.settle();
            report.halted = true;
            break;
        }
        report.ticks += 1;
        let status = tree.tick(&mut blackboard);
        if status != NodeStatus::Running {
            report.status = Some(status);
            break;
        }
        world.step();
        std::thread::sleep(cfg.tick_period());
    }

    report.goals_reached = world.completed_goals;
    report.direction = blackboard.get::<i32>("direction")?;
    report.visitor_published = world.tf.has_frame(VISITOR_FRAME);
    info!(ticks = report.ticks, status = ?report.status, "mission ended");
    Ok(report)
}

impl MissionReport {
    fn print(&self) {
        println!();
        let verdict = match self.status {
            Some(NodeStatus::Success) => "SUCCESS".green().bold(),
            Some(NodeStatus::Failure) => "FAILURE".red().bold(),
            _ if self.halted => "HALTED".yellow().bold(),
            _ => "TIMED OUT".yellow().bold(),
        };
        println!("  Mission result : {}", verdict);
        println!("  Ticks          : {}", self.ticks);
        println!("  Goals reached  : {}", self.goals_reached);
        let direction = match self.direction {
            Some(0) => "aligned (0)".green(),
            Some(1) => "turn left (+1)".yellow(),
            Some(-1) => "turn right (-1)".yellow(),
            Some(other) => other.to_string().normal(),
            None => "not evaluated".dimmed(),
        };
        println!("  Direction      : {}", direction);
        println!(
            "  Visitor frame  : {}",
            if self.visitor_published { VISITOR_FRAME.green() } else { "not published".dimmed() }
        );
        println!();
    }
}

fn print_banner() {
    println!();
    println!("  {} {}", "navgate".bold().cyan(), format!("v{}", env!("CARGO_PKG_VERSION")).dimmed());
    println!("  Goal resolution and bearing gating for mobile robots");
    println!();
}
