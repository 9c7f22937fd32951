//! Console state and the interactive command loop.
//!
//! `App` owns every controller. Fetches, mutations and the session timer run
//! as background tasks inside the core; this loop drains their results
//! before each prompt and while waiting for input.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

use rocsun_core::auth::guard::{self, GuardDecision, LOGIN_PATH};
use rocsun_core::auth::{
    self, CredentialStore, FileCredentialStore, KeyringCredentialStore, SessionController,
};
use rocsun_core::clock::{Clock, SystemClock};
use rocsun_core::config::{Config, CredentialBackend};
use rocsun_core::models::{LoginForm, RegisterForm, UserDraft, UserForm};
use rocsun_core::mutation::{MutationController, MutationOutcome};
use rocsun_core::notify::{self, Notice, Notifier};
use rocsun_core::query::{FetchOutcome, QueryController};
use rocsun_core::{ApiClient, ConsoleError, UserGateway};

use crate::commands::{self, Command, HELP_TEXT};
use crate::render;

// ============================================================================
// Constants
// ============================================================================

/// Prefill for the login prompt.
const USERNAME_ENV: &str = "ROCSUN_USERNAME";

/// Skips the password prompt when set.
const PASSWORD_ENV: &str = "ROCSUN_PASSWORD";

/// What the loop should do after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

fn credential_store(config: &Config) -> Result<Arc<dyn CredentialStore>> {
    let store: Arc<dyn CredentialStore> = match config.credential_backend {
        CredentialBackend::File => Arc::new(FileCredentialStore::new(config.cache_dir()?)),
        CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new()),
    };
    Ok(store)
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn prompt_password(prompt: &str) -> Result<String> {
    rpassword::prompt_password(prompt).context("Failed to read password")
}

pub struct App {
    config: Config,
    client: ApiClient,
    gateway: Arc<dyn UserGateway>,
    notifier: Notifier,
    notices: UnboundedReceiver<Notice>,
    session: SessionController,
    query: QueryController,
    mutation: MutationController,
    input: Lines<BufReader<Stdin>>,
    /// Route currently shown.
    path: String,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let client = ApiClient::new(&config.base_url, config.request_timeout_secs)?;
        let gateway: Arc<dyn UserGateway> = Arc::new(client.clone());
        let (notifier, notices) = Notifier::channel();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let session = SessionController::new(
            credential_store(&config)?,
            Arc::clone(&clock),
            notifier.clone(),
            config.session_ttl(),
        );
        let query = QueryController::with_page_size(
            Arc::clone(&gateway),
            notifier.clone(),
            config.default_page_size,
        );
        let mutation = MutationController::new(Arc::clone(&gateway), notifier.clone(), clock);

        Ok(Self {
            config,
            client,
            gateway,
            notifier,
            notices,
            session,
            query,
            mutation,
            input: BufReader::new(tokio::io::stdin()).lines(),
            path: LOGIN_PATH.to_string(),
        })
    }

    // =========================================================================
    // Main loop
    // =========================================================================

    pub async fn run(&mut self) -> Result<()> {
        println!(
            "rocsun admin console ({}). Type 'help' for commands.",
            self.client.base_url()
        );

        if self.session.restore_from_store() {
            self.sync_token();
            if let Some(profile) = self.session.profile() {
                println!("Welcome back, {}.", profile.nickname);
            }
            self.dispatch(Command::Users).await?;
        } else {
            self.dispatch(Command::Login).await?;
        }

        loop {
            self.drain_background();
            self.flush_notices();
            self.print_prompt()?;

            let line = tokio::select! {
                line = self.input.next_line() => line.context("Failed to read input")?,
                Some(_) = self.session.next_event() => {
                    // The prompt line was interrupted by the expiry notice.
                    println!();
                    self.on_session_changed();
                    continue;
                }
            };
            let Some(line) = line else {
                debug!("Input closed");
                break;
            };

            match commands::parse(&line) {
                Ok(Some(command)) => match self.dispatch(command).await {
                    Ok(Flow::Quit) => break,
                    Ok(Flow::Continue) => {}
                    Err(e) => println!("Error: {:#}", e),
                },
                Ok(None) => {}
                Err(e) => println!("{}", e),
            }
        }

        self.flush_notices();
        Ok(())
    }

    fn print_prompt(&self) -> Result<()> {
        print!("{}> ", self.path);
        io::stdout().flush()?;
        Ok(())
    }

    async fn read_line(&mut self, prompt: &str) -> Result<String> {
        print!("{}", prompt);
        io::stdout().flush()?;
        let line = self
            .input
            .next_line()
            .await
            .context("Failed to read input")?;
        Ok(line.unwrap_or_default().trim().to_string())
    }

    async fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = self.read_line(prompt).await?;
        Ok(matches!(answer.to_lowercase().as_str(), "y" | "yes"))
    }

    // =========================================================================
    // Background results
    // =========================================================================

    /// Apply whatever finished while we were not looking.
    fn drain_background(&mut self) {
        if self.session.poll_events() > 0 {
            self.on_session_changed();
        }
        for outcome in self.query.poll_results() {
            if let FetchOutcome::Failed(e) = outcome {
                self.route_failure(&e);
            }
        }
        for outcome in self.mutation.poll_results(&mut self.query) {
            if let MutationOutcome::Failed(e) = outcome {
                self.route_failure(&e);
            }
        }
    }

    fn flush_notices(&mut self) {
        for notice in notify::drain(&mut self.notices) {
            println!("{}", notice);
        }
    }

    /// Keep the HTTP client's bearer token in step with the session.
    fn sync_token(&self) {
        self.client
            .set_token(self.session.token().map(str::to_string));
    }

    fn on_session_changed(&mut self) {
        self.sync_token();
        if !self.session.is_valid() {
            self.path = LOGIN_PATH.to_string();
        }
        self.flush_notices();
    }

    /// A 401 from any call ends the session.
    fn route_failure(&mut self, error: &ConsoleError) {
        if let ConsoleError::Network(api) = error {
            if self.session.handle_api_error(api) {
                self.on_session_changed();
            }
        }
    }

    fn report(&mut self, error: ConsoleError) {
        match &error {
            ConsoleError::Validation(errors) => {
                println!("Please fix the following:");
                for e in errors.errors() {
                    println!("  {}: {}", e.field, e.message);
                }
            }
            ConsoleError::Network(_) => {
                // Already notified by the controller.
                self.route_failure(&error);
            }
            other => println!("{}", other),
        }
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Route a command through the guard, logging in first when needed.
    pub async fn dispatch(&mut self, command: Command) -> Result<Flow> {
        if let Some(path) = command.path() {
            let authenticated = self.session.is_authenticated();
            self.sync_token();

            match guard::guard(authenticated, path) {
                GuardDecision::Render(path) => self.path = path,
                GuardDecision::Redirect { to, from } => {
                    debug!(%from, "Redirecting to login");
                    self.flush_notices();
                    println!("Please log in to continue.");
                    self.path = to;
                    if !self.login().await? {
                        return Ok(Flow::Continue);
                    }
                    self.path = guard::resume_target(Some(&from));
                }
            }
        }
        self.execute(command).await
    }

    async fn execute(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::Login => {
                if self.login().await? {
                    self.path = guard::resume_target(None);
                    self.query.refresh();
                    self.show_list().await;
                }
            }
            Command::Logout => self.logout(),
            Command::Register => self.register().await?,
            Command::Whoami => self.whoami(),
            Command::Users | Command::Refresh => {
                self.query.refresh();
                self.show_list().await;
            }
            Command::Search(search) => {
                self.query.search(search);
                self.show_list().await;
            }
            Command::Page { page, size } => {
                let size = size.unwrap_or(self.query.state().page_size);
                self.query.change_page(page, size);
                self.show_list().await;
            }
            Command::Show(id) => self.show_user(id).await,
            Command::Edit { id, fields } => self.edit_user(id, &fields).await?,
            Command::Create { fields } => self.create_user(&fields).await?,
            Command::Delete(id) => self.delete_user(id).await?,
            Command::Help => println!("{}", HELP_TEXT),
            Command::Quit => return Ok(Flow::Quit),
        }
        self.flush_notices();
        Ok(Flow::Continue)
    }

    // =========================================================================
    // Session commands
    // =========================================================================

    /// Prompt for credentials and sign in. Returns whether a session started.
    async fn login(&mut self) -> Result<bool> {
        let default_username =
            env_non_empty(USERNAME_ENV).or_else(|| self.config.last_username.clone());
        let prompt = match &default_username {
            Some(name) => format!("Username [{}]: ", name),
            None => "Username: ".to_string(),
        };
        let mut username = self.read_line(&prompt).await?;
        if username.is_empty() {
            username = default_username.unwrap_or_default();
        }

        let password = match env_non_empty(PASSWORD_ENV) {
            Some(password) => password,
            None => prompt_password("Password: ")?,
        };

        let form = LoginForm::new(username, password);
        let result = auth::sign_in(self.gateway.as_ref(), &mut self.session, &form).await;
        self.sync_token();

        match result {
            Ok(()) => {
                info!(username = %form.username.trim(), "Logged in");
                self.config.last_username = Some(form.username.trim().to_string());
                if let Err(e) = self.config.save() {
                    warn!(error = %e, "Failed to save config");
                }
                self.flush_notices();
                Ok(true)
            }
            Err(e) => {
                self.report(e);
                self.flush_notices();
                Ok(false)
            }
        }
    }

    fn logout(&mut self) {
        if self.session.data().is_none() {
            println!("Not logged in.");
            return;
        }
        self.session.logout();
        self.sync_token();
        self.path = LOGIN_PATH.to_string();
        self.notifier.info("Logged out");
    }

    async fn register(&mut self) -> Result<()> {
        let username = self.read_line("Username: ").await?;
        let email = self.read_line("Email: ").await?;
        let nickname = self.read_line("Nickname (optional): ").await?;
        let phone = self.read_line("Phone (optional): ").await?;
        let password = prompt_password("Password: ")?;
        let confirm_password = prompt_password("Confirm password: ")?;

        let form = RegisterForm {
            username,
            password,
            confirm_password,
            email,
            phone: Some(phone).filter(|p| !p.is_empty()),
            nickname: Some(nickname).filter(|n| !n.is_empty()),
        };

        match auth::register(self.gateway.as_ref(), &self.notifier, form).await {
            Ok(()) => self.path = LOGIN_PATH.to_string(),
            Err(e) => self.report(e),
        }
        Ok(())
    }

    fn whoami(&self) {
        let Some(data) = self.session.data() else {
            println!("Not logged in.");
            return;
        };
        println!("Logged in as {} ({})", data.profile.nickname, data.profile.username);
        println!(
            "Session expires at {} ({} minutes left)",
            data.expires_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S"),
            self.session.minutes_until_expiry().unwrap_or(0)
        );
    }

    // =========================================================================
    // User list
    // =========================================================================

    /// Wait for the latest fetch and print the page.
    async fn show_list(&mut self) {
        if let Some(FetchOutcome::Failed(e)) = self.query.settle().await {
            self.route_failure(&e);
        }
        self.flush_notices();
        if self.session.is_valid() {
            print!("{}", render::user_list(&self.query));
        }
    }

    async fn show_user(&mut self, id: i64) {
        match self.gateway.fetch_user(id).await {
            Ok(user) => print!("{}", render::user_detail(&user)),
            Err(e) => {
                self.notifier
                    .error(format!("Failed to load user {}: {}", id, e.user_message()));
                self.route_failure(&ConsoleError::from(e));
            }
        }
    }

    /// The record to edit: from the current page when shown, else fetched.
    async fn load_draft(&mut self, id: i64) -> Option<UserDraft> {
        if let Some(user) = self.query.find(id) {
            return Some(user.to_draft());
        }
        match self.gateway.fetch_user(id).await {
            Ok(user) => Some(user.to_draft()),
            Err(e) => {
                self.notifier
                    .error(format!("Failed to load user {}: {}", id, e.user_message()));
                self.route_failure(&ConsoleError::from(e));
                None
            }
        }
    }

    async fn edit_user(&mut self, id: i64, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            println!("Nothing to change. Use: edit <id> field=value ...");
            return Ok(());
        }
        let Some(draft) = self.load_draft(id).await else {
            return Ok(());
        };

        let mut form = UserForm::from(&draft);
        commands::apply_fields(&mut form, fields)?;
        match self.mutation.save_form(form) {
            Ok(()) => self.finish_mutation().await,
            Err(e) => self.report(e),
        }
        Ok(())
    }

    async fn create_user(&mut self, fields: &[(String, String)]) -> Result<()> {
        let mut form = UserForm::default();
        commands::apply_fields(&mut form, fields)?;
        if form.password.is_none() {
            form.password = Some(prompt_password("Password for new user: ")?);
            form.confirm_password = Some(prompt_password("Confirm password: ")?);
        }

        match self.mutation.save_form(form) {
            Ok(()) => self.finish_mutation().await,
            Err(e) => self.report(e),
        }
        Ok(())
    }

    async fn delete_user(&mut self, id: i64) -> Result<()> {
        let name = self.query.find(id).map(|u| u.display_name().to_string());
        let confirmed = match name {
            Some(name) => {
                self.confirm(&format!("Delete user {} ({})? [y/N] ", id, name))
                    .await?
            }
            // Not on this page: let the controller report it.
            None => true,
        };

        match self.mutation.delete(id, confirmed, &self.query) {
            Ok(true) => self.finish_mutation().await,
            Ok(false) => println!("Cancelled."),
            Err(e) => self.report(e),
        }
        Ok(())
    }

    async fn finish_mutation(&mut self) {
        match self.mutation.next_result(&mut self.query).await {
            Some(MutationOutcome::Created) => self.show_list().await,
            Some(MutationOutcome::Updated(_)) | Some(MutationOutcome::Deleted(_)) => {
                self.flush_notices();
                print!("{}", render::user_list(&self.query));
            }
            Some(MutationOutcome::Failed(e)) => self.route_failure(&e),
            None => {}
        }
    }
}
