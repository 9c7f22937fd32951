//! Console command parsing.
//!
//! Each command maps to the route it needs so the guard can decide whether
//! it runs now or after a login.

use anyhow::{anyhow, bail, Result};

use rocsun_core::auth::guard::{LOGIN_PATH, REGISTER_PATH};
use rocsun_core::models::{Role, UserForm};
use rocsun_core::UserSearch;

pub const USERS_PATH: &str = "/users";
pub const PROFILE_PATH: &str = "/profile";

pub const HELP_TEXT: &str = "\
Commands:
  login                          Log in
  logout                         Log out
  register                       Create an account
  whoami                         Show the signed-in operator
  users                          List users
  search [username=..] [status=true|false] [role=user|admin]
                                 Filter the list (no arguments clears filters)
  page <n> [size]                Go to a page
  refresh                        Reload the current page
  show <id>                      Show one user
  edit <id> field=value ...      Update a user
  create field=value ...         Create a user
  delete <id>                    Delete a user
  help                           Show this help
  quit                           Exit

Editable fields: username, email, phone, nickname, avatar, status, role,
password, confirm_password (the last two on create only)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Login,
    Logout,
    Register,
    Whoami,
    Users,
    Search(UserSearch),
    Page { page: u32, size: Option<u32> },
    Refresh,
    Show(i64),
    Edit { id: i64, fields: Vec<(String, String)> },
    Create { fields: Vec<(String, String)> },
    Delete(i64),
    Help,
    Quit,
}

impl Command {
    /// Route this command renders. `None` for commands that are always allowed.
    pub fn path(&self) -> Option<&'static str> {
        match self {
            Command::Login => Some(LOGIN_PATH),
            Command::Register => Some(REGISTER_PATH),
            Command::Whoami => Some(PROFILE_PATH),
            Command::Logout | Command::Help | Command::Quit => None,
            _ => Some(USERS_PATH),
        }
    }
}

fn parse_id(arg: Option<&str>) -> Result<i64> {
    let raw = arg.ok_or_else(|| anyhow!("Missing user id"))?;
    raw.parse()
        .map_err(|_| anyhow!("Invalid user id: {}", raw))
}

fn parse_number(raw: &str, what: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => bail!("Invalid {}: {}", what, raw),
    }
}

pub fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "enabled" | "on" => Ok(true),
        "false" | "0" | "no" | "disabled" | "off" => Ok(false),
        _ => bail!("Invalid status: {} (use true or false)", raw),
    }
}

pub fn parse_role(raw: &str) -> Result<Role> {
    Role::parse(raw).ok_or_else(|| anyhow!("Invalid role: {} (use user or admin)", raw))
}

/// Split `key=value` arguments. Values may be empty.
fn parse_fields<'a>(args: impl Iterator<Item = &'a str>) -> Result<Vec<(String, String)>> {
    args.map(|arg| {
        let (key, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected field=value, got: {}", arg))?;
        Ok((key.trim().to_lowercase(), value.to_string()))
    })
    .collect()
}

fn parse_search(fields: Vec<(String, String)>) -> Result<UserSearch> {
    let mut search = UserSearch::default();
    for (key, value) in fields {
        match key.as_str() {
            "username" => search.username = Some(value),
            "status" if value.trim().is_empty() => search.status = None,
            "status" => search.status = Some(parse_bool(&value)?),
            "role" if value.trim().is_empty() => search.role = None,
            "role" => search.role = Some(parse_role(&value)?),
            other => bail!("Unknown filter: {}", other),
        }
    }
    Ok(search)
}

pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(None);
    };

    let command = match name.to_lowercase().as_str() {
        "login" => Command::Login,
        "logout" => Command::Logout,
        "register" => Command::Register,
        "whoami" => Command::Whoami,
        "users" | "list" => Command::Users,
        "search" => Command::Search(parse_search(parse_fields(parts)?)?),
        "page" => {
            let page = parse_number(
                parts.next().ok_or_else(|| anyhow!("Missing page number"))?,
                "page",
            )?;
            let size = parts
                .next()
                .map(|s| parse_number(s, "page size"))
                .transpose()?;
            Command::Page { page, size }
        }
        "refresh" => Command::Refresh,
        "show" => Command::Show(parse_id(parts.next())?),
        "edit" => {
            let id = parse_id(parts.next())?;
            Command::Edit {
                id,
                fields: parse_fields(parts)?,
            }
        }
        "create" => Command::Create {
            fields: parse_fields(parts)?,
        },
        "delete" | "rm" => Command::Delete(parse_id(parts.next())?),
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => bail!("Unknown command: {} (type 'help')", other),
    };
    Ok(Some(command))
}

fn optional(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Apply `field=value` edits to a form.
pub fn apply_fields(form: &mut UserForm, fields: &[(String, String)]) -> Result<()> {
    for (key, value) in fields {
        match key.as_str() {
            "username" => form.username = value.clone(),
            "email" => form.email = value.clone(),
            "phone" => form.phone = optional(value),
            "nickname" => form.nickname = optional(value),
            "avatar" => form.avatar = optional(value),
            "status" => form.status = parse_bool(value)?,
            "role" => form.role = parse_role(value)?,
            "password" | "confirm_password" if !form.is_new() => {
                bail!("Passwords can only be set when creating a user")
            }
            "password" => form.password = optional(value),
            "confirm_password" => form.confirm_password = optional(value),
            other => bail!("Unknown field: {}", other),
        }
    }
    Ok(())
}
