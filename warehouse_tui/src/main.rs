use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ratatui::{
    crossterm::{
        self,
        event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
        execute,
        terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
    },
    prelude::*,
    widgets::{
        canvas::{Canvas, Circle, Rectangle},
        *,
    },
};
use std::{
    fs::File,
    io::{self, Stdout},
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;
use warehouse_core::{
    config::{Preset, WarehouseConfig},
    environment::Warehouse,
    ledger::PickupState,
    observation::Observation,
    policy::{GreedyPolicy, Policy, RandomPolicy},
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Random,
    Greedy,
}

#[derive(Parser, Debug)]
#[command(version, about = "Multi-agent warehouse simulator", long_about = None)]
struct Args {
    /// Built-in warehouse size (small, medium, large), ignored when --config is given
    #[arg(short, long, default_value_t = Preset::Small, value_parser = str::parse::<Preset>)]
    preset: Preset,

    /// TOML configuration file
    #[arg(short, long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Seed for the warehouse and the policy
    #[arg(short, long, default_value_t = 0, env = "WAREHOUSE_SEED")]
    seed: u64,

    /// Policy driving the agents
    #[arg(long, value_enum, default_value_t = PolicyArg::Greedy)]
    policy: PolicyArg,

    /// Run one episode without the terminal UI and log the result
    #[arg(long)]
    headless: bool,

    /// Milliseconds between simulation ticks in the terminal UI
    #[arg(long, default_value_t = 50)]
    tick_ms: u64,

    /// Write logs to this file (the terminal UI discards logs otherwise)
    #[arg(long, value_name = "LOG_FILE")]
    log_file: Option<PathBuf>,
}

struct App {
    /// The core simulation environment.
    warehouse: Warehouse,
    /// Decision maker for every agent.
    policy: Box<dyn Policy>,
    policy_kind: PolicyArg,
    /// Latest observations, fed to the policy on the next tick.
    observations: Vec<Observation>,
    /// Accumulated reward per agent over the current episode.
    totals: Vec<f32>,
    seed: u64,
    /// Flag to control the main loop.
    should_quit: bool,
    paused: bool,
    /// Flag to control if the episode is over.
    episode_over: bool,
}

impl App {
    fn new(config: WarehouseConfig, policy_kind: PolicyArg, seed: u64) -> Result<Self> {
        let num_agents = config.num_agents;
        let mut warehouse =
            Warehouse::with_default_physics(config).context("invalid warehouse configuration")?;
        let observations = warehouse.reset(seed)?;

        Ok(App {
            warehouse,
            policy: make_policy(policy_kind, seed),
            policy_kind,
            observations,
            totals: vec![0.0; num_agents],
            seed,
            should_quit: false,
            paused: false,
            episode_over: false,
        })
    }

    /// Handles one step of the simulation.
    fn tick(&mut self) -> Result<()> {
        if self.episode_over {
            return Ok(());
        }
        let actions = self.policy.compute_actions(&self.observations);
        let result = self.warehouse.step(&actions)?;

        for (total, reward) in self.totals.iter_mut().zip(&result.rewards) {
            *total += reward;
        }
        self.observations = result.observations;
        if result.dones.all {
            self.episode_over = true;
            info!(
                seed = self.seed,
                ticks = result.summary.tick,
                total = self.total_reward(),
                per_agent = self.total_reward() / self.totals.len() as f32,
                "episode finished"
            );
        }
        Ok(())
    }

    /// Starts a new episode with the next seed.
    fn reset(&mut self) -> Result<()> {
        self.seed = self.seed.wrapping_add(1);
        self.observations = self.warehouse.reset(self.seed)?;
        self.policy = make_policy(self.policy_kind, self.seed);
        self.totals.fill(0.0);
        self.episode_over = false;
        Ok(())
    }

    fn total_reward(&self) -> f32 {
        self.totals.iter().sum()
    }

    /// Sets the quit flag.
    fn quit(&mut self) {
        self.should_quit = true;
    }
}

fn make_policy(kind: PolicyArg, seed: u64) -> Box<dyn Policy> {
    match kind {
        PolicyArg::Random => Box::new(RandomPolicy::new(seed)),
        PolicyArg::Greedy => Box::new(GreedyPolicy::new(seed)),
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    init_logging(args.log_file.as_deref(), args.headless)?;

    let config = match &args.config {
        Some(path) => WarehouseConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => WarehouseConfig::preset(args.preset),
    };

    // Create the application state
    let mut app = App::new(config, args.policy, args.seed)?;
    info!(
        policy = app.policy.name(),
        seed = args.seed,
        agents = app.totals.len(),
        "starting warehouse"
    );

    if args.headless {
        return run_headless(&mut app);
    }

    // Set up the terminal
    let mut terminal = setup_terminal()?;

    // Run the main application loop, restoring the terminal even on error
    let result = run_app(&mut terminal, &mut app, Duration::from_millis(args.tick_ms));

    // Restore the terminal state
    restore_terminal(&mut terminal)?;

    result
}

/// Installs the tracing subscriber. `RUST_LOG` overrides the default filter.
fn init_logging(log_file: Option<&Path>, headless: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warehouse_core=info,warehouse_tui=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None if headless => builder.try_init(),
        // Anything written to the terminal would tear the UI.
        None => builder.with_writer(io::sink).try_init(),
    };
    installed.map_err(|err| anyhow::anyhow!("failed to install logger: {err}"))
}

/// Runs a single episode to completion without drawing anything.
fn run_headless(app: &mut App) -> Result<()> {
    let report_every = (u64::from(app.warehouse.config().frames_per_second) * 10).max(1);
    while !app.episode_over {
        app.tick()?;
        let tick = app.warehouse.elapsed_ticks();
        if tick % report_every == 0 {
            info!(tick, total = app.total_reward(), "progress");
        }
    }

    let per_agent: Vec<String> = app.totals.iter().map(|t| format!("{t:.2}")).collect();
    info!(rewards = %per_agent.join(" "), "per agent rewards");
    Ok(())
}

/// Configures the terminal for TUI interaction.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    let mut stdout = io::stdout();
    enable_raw_mode()?; // Put terminal in raw mode
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?; // Use alternate screen and enable mouse capture
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend).map_err(Into::into) // Map io::Error to anyhow::Error
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

/// Runs the main loop of the TUI application.
fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_tick = Instant::now();

    loop {
        // Draw the UI
        terminal.draw(|f| ui(f, app))?;

        // Calculate timeout for event polling
        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        // Poll for events (keyboard, mouse, etc.)
        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => app.quit(),
                    KeyCode::Char(' ') => app.paused = !app.paused,
                    KeyCode::Char('r') => app.reset()?,
                    _ => {}
                }
            }
        }

        // Update application state if enough time has passed
        if last_tick.elapsed() >= tick_rate {
            if !app.paused {
                app.tick()?; // Perform simulation step
            }
            last_tick = Instant::now();
        }

        // Exit loop if requested
        if app.should_quit {
            break;
        }
    }
    Ok(())
}

/// Renders the user interface.
fn ui(frame: &mut Frame, app: &App) {
    let main_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(10), Constraint::Length(3)])
        .split(frame.area());
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_layout[0]);

    // Render the floor
    render_floor(frame, body[0], &app.warehouse);

    // Render the agent list
    render_agents(frame, body[1], app);

    // Render status/help text
    let state = if app.episode_over {
        "episode over"
    } else if app.paused {
        "paused"
    } else {
        "running"
    };
    let status = format!(
        "tick {}/{} | seed {} | policy {} | {} | total reward {:.2}    'space' pause, 'r' reset, 'q' quit",
        app.warehouse.elapsed_ticks(),
        app.warehouse.config().episode_duration_ticks,
        app.seed,
        app.policy.name(),
        state,
        app.total_reward(),
    );
    let help_text = Paragraph::new(status)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::TOP));
    frame.render_widget(help_text, main_layout[1]);
}

/// Renders the status of each agent onto the frame.
fn render_agents(frame: &mut Frame, area: Rect, app: &App) {
    let world = app.warehouse.world();
    let items: Vec<ListItem> = world
        .agent_positions
        .iter()
        .enumerate()
        .map(|(id, position)| {
            let carrying = match world.agent_delivery_targets[id] {
                Some(target) => Span::styled(
                    format!("-> D{target}"),
                    Style::default().fg(Color::Green),
                ),
                None => Span::styled("idle", Style::default().fg(Color::DarkGray)),
            };
            ListItem::from(Line::from(vec![
                Span::styled(format!("Agent {id:>2} "), Style::default().bold()),
                Span::raw(format!(
                    "({:5.2}, {:5.2}) reward {:8.2} ",
                    position.x, position.y, app.totals[id]
                )),
                carrying,
            ]))
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Agents"));
    frame.render_widget(list, area);
}

/// Renders the warehouse floor onto the frame.
fn render_floor(frame: &mut Frame, area: Rect, warehouse: &Warehouse) {
    let world = warehouse.world();
    let dimension = f64::from(world.layout.world_dimension);
    let radius = f64::from(world.agent_radius);

    let canvas = Canvas::default()
        .block(Block::default().title("Warehouse").borders(Borders::ALL))
        .marker(symbols::Marker::Braille)
        .x_bounds([0.0, dimension])
        .y_bounds([0.0, dimension])
        .paint(|ctx| {
            for boundary in &world.layout.boundaries {
                let (min, max) = (boundary.min(), boundary.max());
                ctx.draw(&Rectangle {
                    x: f64::from(min.x),
                    y: f64::from(min.y),
                    width: f64::from(max.x - min.x),
                    height: f64::from(max.y - min.y),
                    color: Color::DarkGray,
                });
            }

            for (id, point) in world.pickup_positions().iter().enumerate() {
                let color = match world.pickup_state(id) {
                    Some(PickupState::Waiting { .. }) => Color::Blue,
                    _ => Color::Gray,
                };
                ctx.draw(&Rectangle {
                    x: f64::from(point.x) - 0.4,
                    y: f64::from(point.y) - 0.4,
                    width: 0.8,
                    height: 0.8,
                    color,
                });
            }

            for (id, point) in world.delivery_positions().iter().enumerate() {
                let color = if world.is_delivery_targeted(id) {
                    Color::Yellow
                } else {
                    Color::Gray
                };
                ctx.draw(&Rectangle {
                    x: f64::from(point.x) - 0.3,
                    y: f64::from(point.y) - 0.3,
                    width: 0.6,
                    height: 0.6,
                    color,
                });
            }

            ctx.layer();
            for (id, position) in world.agent_positions.iter().enumerate() {
                let color = if world.is_available(id) {
                    Color::White
                } else {
                    Color::Green
                };
                let (x, y) = (f64::from(position.x), f64::from(position.y));
                ctx.draw(&Circle {
                    x,
                    y,
                    radius,
                    color,
                });
                ctx.print(x, y, Span::styled(id.to_string(), Style::default().fg(color)));
            }
        });

    frame.render_widget(canvas, area);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preset_flag_parses_into_preset() {
        let args = Args::try_parse_from(["warehouse_tui", "--preset", "Medium"]).unwrap();
        assert_eq!(args.preset, Preset::Medium);

        let args = Args::try_parse_from(["warehouse_tui"]).unwrap();
        assert_eq!(args.preset, Preset::Small);

        assert!(Args::try_parse_from(["warehouse_tui", "-p", "huge"]).is_err());
    }
}
