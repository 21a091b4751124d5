//! GymGate - access-guarded navigation and attendance for a gym client
//!
//! The core of a gym-management client: an access guard deciding every
//! navigation from an explicit authentication context, a dispatcher running
//! named route intents before committing, and an attendance session manager
//! recording time-in / time-out against a record store that enforces at most
//! one open session per subject and day.
//!
//! ```
//! use gymgate::auth::AuthContext;
//! use gymgate::navigation::{Dispatcher, NavigationRequest};
//! use gymgate::routes::{gym_routes, RouteTable};
//! use std::sync::Arc;
//!
//! let table = Arc::new(RouteTable::new(&gym_routes()).unwrap());
//! let dispatcher = Dispatcher::new(table);
//! let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! let outcome = runtime
//!     .block_on(dispatcher.navigate(
//!         &NavigationRequest::path("/application/dashboard"),
//!         &AuthContext::anonymous(),
//!     ))
//!     .unwrap();
//! assert_eq!(outcome.destination.name(), Some("login"));
//! ```

pub mod attendance;
pub mod auth;
pub mod cli;
pub mod clock;
pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod navigation;
pub mod notify;
pub mod output;
pub mod routes;
pub mod signal;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::attendance::{AttendanceManager, BoundedStore, SqliteRecordStore};
use crate::auth::{AuthContext, FileStorage, Subject, SubjectId};
use crate::cli::{
    Cli, Commands, HistoryArgs, IdentitySourceArg, NavOptions, OutputFormat, StatusArgs,
};
use crate::clock::{Clock, FixedClock, SystemClock};
use crate::config::Config;
use crate::error::ExitCode;
use crate::guard::AccessGuard;
use crate::navigation::{
    Dispatcher, IntentRegistry, NavigationOutcome, NavigationRequest, TitleApplier,
};
use crate::notify::{ConsoleNotifier, LogNotifier, Notifier};
use crate::output::json::{self, JsonAttendance, JsonNavigation, JsonRoutes, JsonStatus};
use crate::output::{AttendanceCsv, TextOutput};
use crate::routes::gym::{STAFF_TIME_IN, STAFF_TIME_OUT, TIME_IN, TIME_OUT};
use crate::routes::{gym_routes, RouteTable};
use crate::signal::ShutdownHandler;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Configuration, storage and routing failures. Attendance failures are not
/// errors; they are reported and mapped to [`ExitCode::ActionFailed`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    let shutdown = signal::install_handler().context("Failed to set up signal handling")?;

    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    config.merge_cli(&cli);
    if !config.use_color {
        yansi::disable();
    }

    let table = match &config.routes_file {
        Some(path) => RouteTable::load(path)
            .with_context(|| format!("Failed to load routes from {}", path.display()))?,
        None => RouteTable::new(&gym_routes()).context("Built-in route table is invalid")?,
    };
    config.validate(&table).context("Invalid configuration")?;

    let app = App {
        storage: FileStorage::new(&config.storage),
        table: Arc::new(table),
        config,
        shutdown,
        quiet: cli.quiet,
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(app.run(cli.command))
}

struct App {
    config: Config,
    table: Arc<RouteTable>,
    storage: FileStorage,
    shutdown: ShutdownHandler,
    quiet: bool,
}

impl App {
    async fn run(mut self, command: Commands) -> Result<ExitCode> {
        match command {
            Commands::Login(args) => self.login(&args.id, &args.token),
            Commands::Logout => self.logout(),
            Commands::Whoami => self.whoami(),
            Commands::Navigate(args) => {
                self.navigate(NavigationRequest::Path(args.path.clone()), &args.path, &args.nav)
                    .await
            }
            Commands::Open(args) => {
                let params: BTreeMap<String, String> = args.params.into_iter().collect();
                let request = NavigationRequest::Named {
                    name: args.name.clone(),
                    params,
                };
                self.navigate(request, &args.name, &args.nav).await
            }
            Commands::TimeIn(args) => {
                self.attendance_action(TIME_IN, STAFF_TIME_IN, args.subject, &args.nav)
                    .await
            }
            Commands::TimeOut(args) => {
                self.attendance_action(TIME_OUT, STAFF_TIME_OUT, args.subject, &args.nav)
                    .await
            }
            Commands::Status(args) => self.status(&args).await,
            Commands::Attendance(args) => self.history(&args).await,
            Commands::Routes(args) => self.routes(args.output),
        }
    }

    fn login(&self, id: &str, token: &str) -> Result<ExitCode> {
        let Some(id) = SubjectId::new(id) else {
            bail!("Subject identifier must not be empty");
        };
        Subject::new(id.clone(), token)
            .store(&self.storage)
            .with_context(|| {
                format!("Failed to store subject in {}", self.storage.path().display())
            })?;
        println!("Signed in as {}", id);
        Ok(ExitCode::Success)
    }

    fn logout(&self) -> Result<ExitCode> {
        let removed = Subject::clear(&self.storage).context("Failed to clear stored subject")?;
        println!("{}", if removed { "Signed out" } else { "Not signed in" });
        Ok(ExitCode::Success)
    }

    fn whoami(&self) -> Result<ExitCode> {
        let auth = AuthContext::load(&self.storage);
        match (auth.has_active_subject(), auth.subject_id()) {
            (_, Some(id)) => println!("{}", id),
            (true, None) => println!("Signed in (stored subject is unreadable)"),
            (false, None) => println!("Not signed in"),
        }
        Ok(ExitCode::Success)
    }

    async fn attendance_action(
        &mut self,
        own_route: &str,
        staff_route: &str,
        subject: Option<String>,
        nav: &NavOptions,
    ) -> Result<ExitCode> {
        let mut nav = nav.clone();
        let (request, label) = match subject {
            Some(id) => {
                // Naming a subject explicitly means recording for that subject
                nav.identity_source = Some(IdentitySourceArg::PathParam);
                (
                    NavigationRequest::named(staff_route).with_param("id", id),
                    staff_route,
                )
            }
            None => (NavigationRequest::named(own_route), own_route),
        };
        self.navigate(request, label, &nav).await
    }

    async fn navigate(
        &mut self,
        request: NavigationRequest,
        requested: &str,
        nav: &NavOptions,
    ) -> Result<ExitCode> {
        self.config.merge_nav_options(nav);
        let auth = AuthContext::load(&self.storage);
        let dispatcher = self.dispatcher(nav.at)?;

        let outcome = dispatcher
            .navigate(&request, &auth)
            .await
            .with_context(|| format!("Navigation to '{}' failed", requested))?;
        let code = self.exit_code_for(&outcome);

        match nav.output {
            OutputFormat::Json => {
                json::write_to(&JsonNavigation::new(requested, &outcome, code), std::io::stdout())?
            }
            OutputFormat::Text => print!("{}", self.text().navigation(&outcome)),
            OutputFormat::Csv => bail!("CSV output is only available for attendance listings"),
        }
        Ok(code)
    }

    async fn status(&self, args: &StatusArgs) -> Result<ExitCode> {
        let subject = self.subject_for(args.subject.as_deref())?;
        let date = args.date.unwrap_or_else(today);
        let state = self
            .manager()?
            .session_state(&subject, date)
            .await
            .context("Failed to read attendance state")?;

        match args.output {
            OutputFormat::Json => json::write_to(
                &JsonStatus::new(subject.as_str(), date, &state),
                std::io::stdout(),
            )?,
            OutputFormat::Text => print!("{}", self.text().status(subject.as_str(), date, &state)),
            OutputFormat::Csv => bail!("CSV output is only available for attendance listings"),
        }
        Ok(self.interrupted_or(ExitCode::Success))
    }

    async fn history(&self, args: &HistoryArgs) -> Result<ExitCode> {
        let subject = self.subject_for(args.subject.as_deref())?;
        let records = self
            .manager()?
            .history(&subject, args.date)
            .await
            .context("Failed to read attendance records")?;

        let rendered = match args.output {
            OutputFormat::Text => self.text().history(subject.as_str(), &records),
            OutputFormat::Json => {
                json::to_json_pretty(&JsonAttendance::new(subject.as_str(), args.date, &records))?
                    + "\n"
            }
            OutputFormat::Csv => AttendanceCsv::new(&records).to_string()?,
        };
        match &args.output_file {
            Some(path) => write_output_file(path, &rendered)?,
            None => print!("{}", rendered),
        }
        Ok(self.interrupted_or(ExitCode::Success))
    }

    fn routes(&self, output: OutputFormat) -> Result<ExitCode> {
        let routes = self.table.summaries();
        match output {
            OutputFormat::Json => json::write_to(&JsonRoutes { routes }, std::io::stdout())?,
            OutputFormat::Text => print!("{}", self.text().routes(&routes)),
            OutputFormat::Csv => bail!("CSV output is only available for attendance listings"),
        }
        Ok(ExitCode::Success)
    }

    fn dispatcher(&self, at: Option<DateTime<FixedOffset>>) -> Result<Dispatcher> {
        let clock: Arc<dyn Clock> = match at {
            Some(at) => Arc::new(FixedClock::new(at)),
            None => Arc::new(SystemClock),
        };
        let manager = Arc::new(self.manager()?);
        Ok(Dispatcher::new(self.table.clone())
            .with_guard(AccessGuard::new(
                &self.config.login_route,
                &self.config.fallback_route,
            ))
            .with_intents(IntentRegistry::attendance(
                manager,
                self.config.identity_source,
            ))
            .with_titles(TitleApplier::new(&self.config.default_title))
            .with_clock(clock)
            .with_max_redirects(self.config.max_redirects)
            .with_hook_timeout(self.config.hook_timeout()))
    }

    fn manager(&self) -> Result<AttendanceManager> {
        let database = SqliteRecordStore::open(&self.config.database).with_context(|| {
            format!(
                "Failed to open attendance database {}",
                self.config.database.display()
            )
        })?;
        let store = BoundedStore::new(Arc::new(database))
            .with_timeout(self.config.store_timeout())
            .with_shutdown(self.shutdown.clone());
        let notifier: Arc<dyn Notifier> = if self.quiet {
            Arc::new(LogNotifier)
        } else {
            Arc::new(ConsoleNotifier::new(self.config.use_color))
        };
        Ok(AttendanceManager::new(Arc::new(store), notifier).with_mode(self.config.consistency))
    }

    fn subject_for(&self, explicit: Option<&str>) -> Result<SubjectId> {
        if let Some(id) = explicit {
            return SubjectId::new(id).context("Subject identifier must not be empty");
        }
        let auth = AuthContext::load(&self.storage);
        match auth.subject_id() {
            Some(id) => Ok(id.clone()),
            None => bail!("Not signed in; sign in with `gymgate login <ID>` or pass --for <ID>"),
        }
    }

    fn text(&self) -> TextOutput {
        TextOutput::new(self.config.use_color)
    }

    fn exit_code_for(&self, outcome: &NavigationOutcome) -> ExitCode {
        let code = if outcome.has_failures() {
            ExitCode::ActionFailed
        } else if outcome.was_redirected() {
            ExitCode::Redirected
        } else {
            ExitCode::Success
        };
        self.interrupted_or(code)
    }

    fn interrupted_or(&self, code: ExitCode) -> ExitCode {
        if self.shutdown.is_shutdown_requested() {
            ExitCode::Interrupted
        } else {
            code
        }
    }
}

fn write_output_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {}", path.display());
    Ok(())
}

/// Today's date in the local time zone.
#[must_use]
pub fn today() -> NaiveDate {
    SystemClock.now().date_naive()
}
