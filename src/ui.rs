// UI layer: terminal prompts via `dialoguer` and a spinner via `indicatif`.
// Everything here draws on stderr; stdout belongs to the token.

use std::io;
use std::time::Duration;

use crossterm::style::Stylize;
use dialoguer::{Input, Password};
use indicatif::{ProgressBar, ProgressStyle};

use crate::api::{Credentials, TwoFactorMethod};

/// Source of user input for the resolution protocol.
pub trait Prompter {
    /// Username, password and an optional two-factor code (blank means none).
    fn credentials(&mut self) -> io::Result<Credentials>;

    /// Ask for a two-factor code after the service demanded one.
    fn two_factor_code(&mut self, method: &TwoFactorMethod) -> io::Result<String>;

    /// Show what the tool is waiting on.
    fn status(&mut self, _message: &str) {}

    /// Remove any status output.
    fn done(&mut self) {}
}

/// Interactive prompter backed by the controlling terminal.
#[derive(Default)]
pub struct TerminalPrompter {
    spinner: Option<ProgressBar>,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Prompter for TerminalPrompter {
    fn credentials(&mut self) -> io::Result<Credentials> {
        self.clear_spinner();
        let login: String = Input::new().with_prompt("Username").interact_text()?;
        // `Password` hides input in terminal for passwords.
        let password = Password::new().with_prompt("Password").interact()?;
        let otp: String = Input::new()
            .with_prompt("Two-factor code (blank if none)")
            .allow_empty(true)
            .interact_text()?;
        let otp = otp.trim();
        Ok(Credentials {
            login: login.trim().to_string(),
            password,
            otp: (!otp.is_empty()).then(|| otp.to_string()),
        })
    }

    fn two_factor_code(&mut self, method: &TwoFactorMethod) -> io::Result<String> {
        self.clear_spinner();
        let hint = match method {
            TwoFactorMethod::Sms => "A code has been sent to your phone.",
            TwoFactorMethod::App => "Open your authenticator app.",
            TwoFactorMethod::Other(_) => "Two-factor authentication is required.",
        };
        eprintln!("{}", hint.yellow());
        let code: String = Input::new().with_prompt("Two-factor code").interact_text()?;
        Ok(code.trim().to_string())
    }

    fn status(&mut self, message: &str) {
        let spinner = self.spinner.get_or_insert_with(new_spinner);
        spinner.set_message(message.to_string());
    }

    fn done(&mut self) {
        self.clear_spinner();
    }
}

fn new_spinner() -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Print a failure the way the binary reports it.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "error:".red().bold(), err);
}

pub fn print_notice(message: &str) {
    eprintln!("{}", message.to_string().green());
}
