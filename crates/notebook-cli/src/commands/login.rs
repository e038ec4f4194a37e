//! Login command handler

use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{bail, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use notebook_core::api::LoginRequest;
use notebook_core::sync::login as remote_login;
use notebook_core::{Config, LocalStore, Session};

use crate::output::Output;

/// Exchange credentials for a session and store it locally
pub fn login(
    store: &mut LocalStore,
    config: &Config,
    email: Option<String>,
    password: Option<String>,
    output: &Output,
) -> Result<()> {
    let email = match email {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = match password {
        Some(password) => password,
        None => prompt_password("Password: ")?,
    };
    if email.is_empty() || password.is_empty() {
        bail!("Email and password are required");
    }

    let session = remote_login(
        config,
        &LoginRequest {
            email: email.clone(),
            password,
        },
    )?;
    store.set_session(&Session {
        key: session.key,
        expires_at: session.expires_at,
    })?;

    output.success(&format!("Logged in as {}", email));
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;
    Ok(input.trim().to_string())
}

/// Read a password without echoing it
///
/// Piped stdin is read as a plain line so scripts can supply it.
fn prompt_password(label: &str) -> Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }
    print!("{}", label);
    io::stdout().flush()?;

    enable_raw_mode().context("Failed to switch the terminal to raw mode")?;
    let result = read_hidden_line();
    disable_raw_mode().context("Failed to restore the terminal")?;
    println!();
    result
}

/// What a key press does to hidden input
#[derive(Debug, PartialEq, Eq)]
enum Entry {
    Continue,
    Done,
    Cancelled,
}

fn apply_key(input: &mut String, key: &KeyEvent) -> Entry {
    if key.kind != KeyEventKind::Press {
        return Entry::Continue;
    }
    match key.code {
        KeyCode::Enter => Entry::Done,
        KeyCode::Esc => Entry::Cancelled,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => Entry::Cancelled,
        KeyCode::Backspace => {
            input.pop();
            Entry::Continue
        }
        KeyCode::Char(c) => {
            input.push(c);
            Entry::Continue
        }
        _ => Entry::Continue,
    }
}

fn read_hidden_line() -> Result<String> {
    let mut input = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match apply_key(&mut input, &key) {
                Entry::Continue => {}
                Entry::Done => return Ok(input),
                Entry::Cancelled => bail!("Login cancelled"),
            }
        }
    }
}
