use clap::{error::ErrorKind, CommandFactory, Parser, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use hero_fx::{
    config::{Config, ConfigStore, FileConfigStore},
    dom::NodeId,
    hover::HoverRace,
    logging,
    page::{render_html, PageSpec},
    runtime::{ChannelSource, PageEvent, Runner},
    ui::{hit_test, Preview},
    Engine,
};
use rand::{rngs::StdRng, SeedableRng};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    io::{self, stdin},
    path::PathBuf,
    time::Duration,
};

const TICK_RATE_MS: u64 = 20;

/// generative hero effects: floating shapes, a typed-out bio and hover pulses
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Populates a page's hero region with randomized floating shapes, types out the bio and pulses social links on hover. Runs as a terminal preview, or headless to print the resulting page."
)]
pub struct Cli {
    /// page description (JSON) to use instead of the bundled page
    #[clap(short = 'p', long)]
    page: Option<PathBuf>,

    /// config file to read (defaults to the per-user config)
    #[clap(short = 'c', long)]
    config: Option<PathBuf>,

    /// number of floating elements to generate
    #[clap(short = 'n', long)]
    count: Option<usize>,

    /// seed for the random source, for reproducible fields
    #[clap(short = 's', long)]
    seed: Option<u64>,

    /// milliseconds between typing ticks
    #[clap(long)]
    tick_ms: Option<u64>,

    /// let a stale hover timer clear a newer pulse, like the original page did
    #[clap(long)]
    legacy_hover: bool,

    /// run without a terminal and print the page after --run-for-ms of virtual time
    #[clap(long)]
    headless: bool,

    /// virtual milliseconds to simulate in headless mode
    #[clap(long, default_value_t = 5000)]
    run_for_ms: u64,

    /// output format for headless mode
    #[clap(long, value_enum, default_value_t = OutputFormat::Html)]
    format: OutputFormat,

    /// headless pointer-enter on the Nth social link at a virtual time, as N@MS (repeatable)
    #[clap(long = "hover", value_parser = parse_hover)]
    hovers: Vec<(usize, u64)>,

    /// append logs to this file (RUST_LOG controls the level)
    #[clap(long)]
    log_file: Option<PathBuf>,

    /// write the effective config to the config file and exit
    #[clap(long)]
    save_config: bool,
}

#[derive(Debug, Copy, Clone, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    Html,
    Json,
}

fn parse_hover(s: &str) -> Result<(usize, u64), String> {
    let (index, at) = s
        .split_once('@')
        .ok_or_else(|| format!("expected N@MS, got `{s}`"))?;
    let index = index
        .trim()
        .parse()
        .map_err(|e| format!("bad link index `{index}`: {e}"))?;
    let at = at
        .trim()
        .parse()
        .map_err(|e| format!("bad time `{at}`: {e}"))?;
    Ok((index, at))
}

impl Cli {
    fn config_store(&self) -> FileConfigStore {
        match &self.config {
            Some(path) => FileConfigStore::with_path(path),
            None => FileConfigStore::new(),
        }
    }

    /// Stored config with command line overrides applied
    fn to_config(&self, store: &FileConfigStore) -> Config {
        let mut config = store.load();
        if let Some(count) = self.count {
            config.field.count = count;
        }
        if let Some(tick_ms) = self.tick_ms {
            config.typing.tick_interval_ms = tick_ms;
        }
        if self.legacy_hover {
            config.hover.race = HoverRace::Legacy;
        }
        config
    }

    fn load_page(&self) -> hero_fx::Result<PageSpec> {
        match &self.page {
            Some(path) => PageSpec::from_file(path),
            None => PageSpec::bundled(),
        }
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    fn build_engine(&self, config: &Config) -> hero_fx::Result<Engine<StdRng>> {
        let doc = self.load_page()?.into_document();
        let mut engine = Engine::new(doc, config.clone(), self.rng());
        engine.on_ready();
        Ok(engine)
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => logging::init_file(path)?,
        None if cli.headless => logging::init_stderr(),
        None => {}
    }

    let store = cli.config_store();
    let config = cli.to_config(&store);
    if let Err(err) = config.validate() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::InvalidValue, err.to_string()).exit();
    }

    if cli.save_config {
        store.save(&config)?;
        println!("{}", store.path().display());
        return Ok(());
    }

    if cli.headless {
        let engine = run_headless(&cli, &config)?;
        let doc = engine.document();
        match cli.format {
            OutputFormat::Html => print!("{}", render_html(doc)),
            OutputFormat::Json => println!(
                "{}",
                serde_json::to_string_pretty(&PageSpec::from_document(doc, doc.root()))?
            ),
        }
        return Ok(());
    }

    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty (or pass --headless)")
            .exit();
    }

    let engine = cli.build_engine(&config)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start_tui(&mut terminal, &cli, &config, engine);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen,
    )?;
    terminal.show_cursor()?;

    result
}

/// Simulates `--run-for-ms` of virtual time, firing scripted hovers on the way
fn run_headless(cli: &Cli, config: &Config) -> Result<Engine<StdRng>, Box<dyn Error>> {
    let mut engine = cli.build_engine(config)?;
    let links = engine
        .document()
        .query_selector_all(&config.selectors.social_links);

    let mut hovers = cli.hovers.clone();
    hovers.sort_by_key(|(_, at)| *at);

    let end = Duration::from_millis(cli.run_for_ms);
    for (index, at) in hovers {
        let at = Duration::from_millis(at);
        if at > end {
            break;
        }
        engine.advance(at.saturating_sub(engine.now()));
        match links.get(index) {
            Some(link) => engine.pointer_enter(*link),
            None => tracing::warn!(index, "no social link at this index"),
        }
    }
    engine.advance(end.saturating_sub(engine.now()));
    engine.teardown();
    Ok(engine)
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    cli: &Cli,
    config: &Config,
    mut engine: Engine<StdRng>,
) -> Result<(), Box<dyn Error>> {
    let mut runner = Runner::new(
        ChannelSource::terminal(),
        Duration::from_millis(TICK_RATE_MS),
    );
    let mut hovered: Option<NodeId> = None;

    loop {
        let event = runner.step();
        engine.advance(runner.elapsed());

        match event {
            PageEvent::Tick | PageEvent::Resize => {}
            PageEvent::Pointer { column, row } => {
                let area = terminal.size()?;
                let area = ratatui::layout::Rect::new(0, 0, area.width, area.height);
                let target = hit_test(engine.document(), config, area, column, row);
                if let Some(link) = target {
                    if hovered != Some(link) {
                        engine.pointer_enter(link);
                    }
                }
                hovered = target;
            }
            PageEvent::Key(key) => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => break,
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
                KeyCode::Char('r') => {
                    engine.teardown();
                    engine = cli.build_engine(config)?;
                    hovered = None;
                }
                _ => {}
            },
        }

        let preview = Preview {
            doc: engine.document(),
            config,
            elapsed: engine.now(),
        };
        terminal.draw(|f| f.render_widget(&preview, f.area()))?;
    }

    engine.teardown();
    Ok(())
}
