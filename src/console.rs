//! Line-oriented console front end for the login flow.
//!
//! The console owns the [`Gate`] and the countdowns of the current user and
//! turns typed commands and countdown expiries into output lines.

use std::time::Duration;

use chrono_tz::Tz;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::audit::{ActivityKind, RECENT_ACTIVITY_LIMIT};
use crate::auth::{password_strength, AuthSession, OtpError, VerificationMethod};
use crate::config::Config;
use crate::datetime::{format_countdown, format_local_default};
use crate::gate::{Gate, LoginError, OtpDispatch, RegistrationRequest};
use crate::risk::ClientInfo;
use crate::timer::{SessionTimers, TimerEvent, TimerKind};

/// Command help text.
pub const HELP: &str = "\
Commands:
  register <badge> <password> <confirm> [email|phone <contact>]
  login <badge> <password>
  otp <code>
  resend
  strength <password>
  status
  logs
  logout
  help
  quit";

/// Command parse errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// First word is not a command.
    #[error("unknown command: {0}")]
    Unknown(String),

    /// Wrong arguments for a command.
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account.
    Register {
        /// Badge ID.
        badge_id: String,
        /// Password.
        password: String,
        /// Confirmation.
        confirm: String,
        /// Optional delivery channel and destination.
        contact: Option<(VerificationMethod, String)>,
    },
    /// Start a login.
    Login {
        /// Badge ID.
        badge_id: String,
        /// Password.
        password: String,
    },
    /// Submit a one-time code.
    Otp(String),
    /// Request a new code.
    Resend,
    /// Rate a password.
    Strength(String),
    /// Show login and countdown state.
    Status,
    /// Show recent activity.
    Logs,
    /// End the session.
    Logout,
    /// Show help.
    Help,
    /// Leave the console.
    Quit,
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else {
            return Ok(None);
        };

        let command = match (name.to_ascii_lowercase().as_str(), args) {
            ("register", [badge, password, confirm]) => Command::Register {
                badge_id: badge.to_string(),
                password: password.to_string(),
                confirm: confirm.to_string(),
                contact: None,
            },
            ("register", [badge, password, confirm, method, contact]) => {
                let method = match method.to_ascii_lowercase().as_str() {
                    "email" => VerificationMethod::Email,
                    "phone" => VerificationMethod::Phone,
                    _ => return Err(CommandError::Usage(REGISTER_USAGE)),
                };
                Command::Register {
                    badge_id: badge.to_string(),
                    password: password.to_string(),
                    confirm: confirm.to_string(),
                    contact: Some((method, contact.to_string())),
                }
            }
            ("register", _) => return Err(CommandError::Usage(REGISTER_USAGE)),
            ("login", [badge, password]) => Command::Login {
                badge_id: badge.to_string(),
                password: password.to_string(),
            },
            ("login", _) => return Err(CommandError::Usage("login <badge> <password>")),
            ("otp", [code]) => Command::Otp(code.to_string()),
            ("otp", _) => return Err(CommandError::Usage("otp <code>")),
            ("strength", [password]) => Command::Strength(password.to_string()),
            ("strength", _) => return Err(CommandError::Usage("strength <password>")),
            ("resend", []) => Command::Resend,
            ("status", []) => Command::Status,
            ("logs", []) => Command::Logs,
            ("logout", []) => Command::Logout,
            ("help", _) => Command::Help,
            ("quit" | "exit", _) => Command::Quit,
            (other, _) => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

const REGISTER_USAGE: &str = "register <badge> <password> <confirm> [email|phone <contact>]";

#[derive(Debug)]
enum ConsoleState {
    Idle,
    AwaitingOtp { badge_id: String },
    LoggedIn(AuthSession),
}

/// Console session state.
pub struct Console {
    gate: Gate,
    timers: SessionTimers,
    client: ClientInfo,
    tz: Tz,
    otp_ttl: Duration,
    resend_cooldown: Duration,
    state: ConsoleState,
}

impl Console {
    /// Create a console and the channel its countdown expiries arrive on.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(gate: Gate, config: &Config) -> (Self, mpsc::UnboundedReceiver<TimerEvent>) {
        let (timers, rx) = SessionTimers::new();
        let tz = gate.scorer().tz();
        let console = Self {
            gate,
            timers,
            client: ClientInfo::new(
                config.client.user_agent.clone(),
                config.client.network_address.clone(),
            ),
            tz,
            otp_ttl: Duration::from_secs(config.auth.otp_ttl_secs),
            resend_cooldown: Duration::from_secs(config.auth.resend_cooldown_secs),
            state: ConsoleState::Idle,
        };
        (console, rx)
    }

    /// The underlying login flow.
    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    /// Badge of the logged-in user.
    pub fn logged_in_badge(&self) -> Option<&str> {
        match &self.state {
            ConsoleState::LoggedIn(session) => Some(&session.badge_id),
            _ => None,
        }
    }

    /// Badge waiting for a one-time code.
    pub fn awaiting_badge(&self) -> Option<&str> {
        match &self.state {
            ConsoleState::AwaitingOtp { badge_id } => Some(badge_id),
            _ => None,
        }
    }

    /// Whether a countdown is running.
    pub fn timer_active(&self, kind: TimerKind) -> bool {
        self.timers.is_active(kind)
    }

    /// Run one command and return the lines to print.
    pub fn handle(&mut self, command: Command) -> Vec<String> {
        self.touch_session();

        match command {
            Command::Register {
                badge_id,
                password,
                confirm,
                contact,
            } => self.register(badge_id, password, confirm, contact),
            Command::Login { badge_id, password } => self.login(&badge_id, &password),
            Command::Otp(code) => self.submit_otp(&code),
            Command::Resend => self.resend(),
            Command::Strength(password) => {
                let strength = password_strength(&password);
                vec![format!("Strength: {strength}. {}", strength.hint())]
            }
            Command::Status => self.status(),
            Command::Logs => self.logs(),
            Command::Logout => self.logout(),
            Command::Help => HELP.lines().map(str::to_string).collect(),
            Command::Quit => self.shutdown(),
        }
    }

    /// React to a countdown expiry and return the lines to print.
    pub fn on_timer(&mut self, event: TimerEvent) -> Vec<String> {
        let Some(kind) = self.timers.accept(event) else {
            return Vec::new();
        };

        let awaiting = matches!(self.state, ConsoleState::AwaitingOtp { .. });
        match kind {
            TimerKind::OtpExpiry if awaiting => {
                vec!["Code expired. Type `resend` for a new code.".to_string()]
            }
            TimerKind::ResendCooldown if awaiting => {
                vec!["You can now request a new code.".to_string()]
            }
            TimerKind::Inactivity => {
                let session = match std::mem::replace(&mut self.state, ConsoleState::Idle) {
                    ConsoleState::LoggedIn(session) => session,
                    other => {
                        self.state = other;
                        return Vec::new();
                    }
                };
                let badge_id = session.badge_id.clone();
                if let Err(e) = self.gate.expire_session(session, &self.client) {
                    error!(badge_id = %badge_id, error = %e, "Failed to record session timeout");
                }
                info!(badge_id = %badge_id, "Session timed out");
                vec!["Session timed out due to inactivity. Please log in again.".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// End any session or pending login; used before exiting.
    pub fn shutdown(&mut self) -> Vec<String> {
        let lines = match std::mem::replace(&mut self.state, ConsoleState::Idle) {
            ConsoleState::LoggedIn(session) => self.end_session(session),
            ConsoleState::AwaitingOtp { badge_id } => {
                self.gate.abandon(&badge_id);
                Vec::new()
            }
            ConsoleState::Idle => Vec::new(),
        };
        self.timers.cancel_all();
        lines
    }

    fn touch_session(&mut self) {
        let ConsoleState::LoggedIn(session) = &mut self.state else {
            return;
        };
        if self.gate.record_activity(session) {
            let remaining = session
                .remaining(self.gate.now())
                .to_std()
                .unwrap_or_default();
            self.timers.start(TimerKind::Inactivity, remaining);
        }
    }

    fn register(
        &mut self,
        badge_id: String,
        password: String,
        confirm: String,
        contact: Option<(VerificationMethod, String)>,
    ) -> Vec<String> {
        let mut request = RegistrationRequest::new(badge_id, password, confirm);
        if let Some((method, destination)) = contact {
            request = request.with_contact(method, destination);
        }

        match self.gate.register(&request, &self.client) {
            Ok(account) => vec![format!(
                "Registration successful. Codes for {} go to {} {}. Please log in.",
                account.badge_id,
                account.verification_method,
                account.masked_contact()
            )],
            Err(e) => vec![self.failure(e)],
        }
    }

    fn login(&mut self, badge_id: &str, password: &str) -> Vec<String> {
        if let ConsoleState::LoggedIn(session) = &self.state {
            return vec![format!("Already logged in as {}", session.badge_id)];
        }
        if let ConsoleState::AwaitingOtp { badge_id: pending } = &self.state {
            self.gate.abandon(pending);
        }
        self.state = ConsoleState::Idle;
        self.timers.cancel_all();

        match self.gate.login(badge_id, password, &self.client) {
            Ok(dispatch) => {
                self.state = ConsoleState::AwaitingOtp {
                    badge_id: badge_id.trim().to_string(),
                };
                self.start_otp_timers();
                vec![self.dispatch_line(&dispatch)]
            }
            Err(e) => vec![self.failure(e)],
        }
    }

    fn submit_otp(&mut self, code: &str) -> Vec<String> {
        let ConsoleState::AwaitingOtp { badge_id } = &self.state else {
            return vec!["No login in progress. Use `login` first.".to_string()];
        };
        let badge_id = badge_id.clone();

        match self.gate.submit_otp(&badge_id, code, &self.client) {
            Ok(session) => {
                self.timers.cancel(TimerKind::OtpExpiry);
                self.timers.cancel(TimerKind::ResendCooldown);
                self.timers.start(
                    TimerKind::Inactivity,
                    session.max_timeout().to_std().unwrap_or_default(),
                );

                let assessment = &session.assessment;
                let mut lines = vec![
                    format!("Welcome, {badge_id}!"),
                    format!(
                        "Risk level: {} ({})",
                        assessment.tier, assessment.rationale
                    ),
                    format!(
                        "Session timeout: {}",
                        format_countdown(Duration::from_secs(assessment.recommended_timeout_secs))
                    ),
                ];
                lines.extend(assessment.insights.iter().map(|i| format!("  ! {i}")));
                self.state = ConsoleState::LoggedIn(session);
                lines
            }
            Err(LoginError::Otp(OtpError::Blocked)) => {
                self.state = ConsoleState::Idle;
                self.timers.cancel_all();
                vec![
                    OtpError::Blocked.user_message(),
                    "Please log in again.".to_string(),
                ]
            }
            Err(e) => vec![self.failure(e)],
        }
    }

    fn resend(&mut self) -> Vec<String> {
        let ConsoleState::AwaitingOtp { badge_id } = &self.state else {
            return vec!["No login in progress. Use `login` first.".to_string()];
        };
        if let Some(wait) = self.active_remaining(TimerKind::ResendCooldown) {
            return vec![format!(
                "Please wait {} before requesting a new code.",
                format_countdown(wait)
            )];
        }

        let badge_id = badge_id.clone();
        match self.gate.resend_otp(&badge_id) {
            Ok(dispatch) => {
                self.start_otp_timers();
                vec![self.dispatch_line(&dispatch)]
            }
            Err(e) => vec![self.failure(e)],
        }
    }

    fn status(&self) -> Vec<String> {
        match &self.state {
            ConsoleState::Idle => vec!["Not logged in.".to_string()],
            ConsoleState::AwaitingOtp { badge_id } => {
                let mut lines = vec![format!("Waiting for the code sent to {badge_id}.")];
                if let Some(left) = self.active_remaining(TimerKind::OtpExpiry) {
                    lines.push(format!("Code expires in {}", format_countdown(left)));
                }
                match self.active_remaining(TimerKind::ResendCooldown) {
                    Some(wait) => lines.push(format!("Resend available in {}", format_countdown(wait))),
                    None => lines.push("Resend available now".to_string()),
                }
                lines
            }
            ConsoleState::LoggedIn(session) => {
                let left = session
                    .remaining(self.gate.now())
                    .to_std()
                    .unwrap_or_default();
                vec![
                    format!("Logged in as {} (risk {})", session.badge_id, session.tier()),
                    format!("Session ends in {}", format_countdown(left)),
                ]
            }
        }
    }

    fn logs(&self) -> Vec<String> {
        let ConsoleState::LoggedIn(session) = &self.state else {
            return vec!["Log in to view recent activity.".to_string()];
        };

        let events = self
            .gate
            .recent_activity(&session.badge_id, RECENT_ACTIVITY_LIMIT);
        if events.is_empty() {
            return vec!["No recent activity.".to_string()];
        }
        events
            .into_iter()
            .map(|event| {
                let marker = match event.kind() {
                    ActivityKind::Success => "ok",
                    ActivityKind::Warning => "!!",
                    ActivityKind::Failure => "xx",
                };
                format!(
                    "[{marker}] {}  {} ({} risk)",
                    format_local_default(&event.timestamp, self.tz),
                    event.message,
                    event.risk_level
                )
            })
            .collect()
    }

    fn logout(&mut self) -> Vec<String> {
        match std::mem::replace(&mut self.state, ConsoleState::Idle) {
            ConsoleState::LoggedIn(session) => {
                self.timers.cancel_all();
                self.end_session(session)
            }
            other => {
                self.state = other;
                vec!["Not logged in.".to_string()]
            }
        }
    }

    fn end_session(&mut self, session: AuthSession) -> Vec<String> {
        match self.gate.logout(session, &self.client) {
            Ok(()) => vec!["Logged out.".to_string()],
            Err(e) => vec![self.failure(e)],
        }
    }

    fn start_otp_timers(&mut self) {
        self.timers.start(TimerKind::OtpExpiry, self.otp_ttl);
        self.timers
            .start(TimerKind::ResendCooldown, self.resend_cooldown);
    }

    fn active_remaining(&self, kind: TimerKind) -> Option<Duration> {
        if self.timers.is_active(kind) {
            self.timers.remaining(kind)
        } else {
            None
        }
    }

    fn dispatch_line(&self, dispatch: &OtpDispatch) -> String {
        let left = (dispatch.expires_at - self.gate.now())
            .to_std()
            .unwrap_or_default();
        format!(
            "Code sent via {} to {}. It expires in {}.",
            dispatch.verification_method,
            dispatch.masked_contact,
            format_countdown(left)
        )
    }

    fn failure(&self, e: LoginError) -> String {
        if let LoginError::Internal(inner) = &e {
            error!(error = %inner, "Login flow failed");
        }
        e.user_message()
    }
}
