//! Plain-text rendering of users and the paged list.

use std::fmt::Write;

use rocsun_core::models::User;
use rocsun_core::query::FilterValue;
use rocsun_core::utils::{format_timestamp, truncate_string};
use rocsun_core::QueryController;

/// Column headers with their maximum widths.
const COLUMNS: [(&str, usize); 8] = [
    ("ID", 6),
    ("Username", 16),
    ("Nickname", 16),
    ("Email", 24),
    ("Phone", 14),
    ("Status", 8),
    ("Role", 13),
    ("Last login", 19),
];

fn row(user: &User) -> [String; 8] {
    [
        user.id.to_string(),
        user.username.clone(),
        user.nickname.clone().unwrap_or_default(),
        user.email.clone(),
        user.phone.clone().unwrap_or_default(),
        user.status_display().to_string(),
        user.role.display_name().to_string(),
        user.last_login_display(),
    ]
}

pub fn user_table(users: &[User]) -> String {
    let mut out = String::new();

    let header: Vec<String> = COLUMNS
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect();
    let _ = writeln!(out, "{}", header.join("  ").trim_end());

    let rule: Vec<String> = COLUMNS.iter().map(|(_, width)| "-".repeat(*width)).collect();
    let _ = writeln!(out, "{}", rule.join("  "));

    for user in users {
        let cells: Vec<String> = row(user)
            .iter()
            .zip(COLUMNS.iter())
            .map(|(cell, (_, width))| {
                format!("{:<width$}", truncate_string(cell, *width), width = width)
            })
            .collect();
        let _ = writeln!(out, "{}", cells.join("  ").trim_end());
    }
    out
}

/// The current page plus a footer with paging and filter information.
pub fn user_list(query: &QueryController) -> String {
    let state = query.state();
    let mut out = if query.records().is_empty() {
        "No users found.\n".to_string()
    } else {
        user_table(query.records())
    };

    let _ = write!(
        out,
        "Page {}/{} ({} per page), {} users",
        state.page,
        query.total_pages().max(1),
        state.page_size,
        query.total()
    );
    if !state.filters.is_empty() {
        let filters: Vec<String> = state
            .filters
            .iter()
            .map(|(key, value)| format!("{}={}", key.as_str(), filter_text(value)))
            .collect();
        let _ = write!(out, " [filters: {}]", filters.join(", "));
    }
    out.push('\n');
    out
}

fn filter_text(value: &FilterValue) -> String {
    match value {
        FilterValue::Text(text) => text.clone(),
        FilterValue::Bool(flag) => flag.to_string(),
        FilterValue::Role(role) => role.as_str().to_string(),
    }
}

pub fn user_detail(user: &User) -> String {
    let mut out = String::new();
    let field = |out: &mut String, label: &str, value: &str| {
        let _ = writeln!(out, "{:<12} {}", format!("{}:", label), value);
    };
    field(&mut out, "ID", &user.id.to_string());
    field(&mut out, "Username", &user.username);
    field(&mut out, "Nickname", user.nickname.as_deref().unwrap_or("-"));
    field(&mut out, "Email", &user.email);
    field(&mut out, "Phone", user.phone.as_deref().unwrap_or("-"));
    field(&mut out, "Avatar", user.avatar.as_deref().unwrap_or("-"));
    field(&mut out, "Status", user.status_display());
    field(&mut out, "Role", user.role.display_name());
    field(&mut out, "Last login", &user.last_login_display());
    let created = user.created_at.as_deref().map(format_timestamp);
    field(&mut out, "Created", created.as_deref().unwrap_or("-"));
    let modified = user.modified_at.as_deref().map(format_timestamp);
    field(&mut out, "Modified", modified.as_deref().unwrap_or("-"));
    out
}
