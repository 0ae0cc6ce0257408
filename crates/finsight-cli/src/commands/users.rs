//! User management commands

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use finsight_core::db::Database;
use finsight_core::models::NewUser;

use super::truncate;

/// Environment variable holding the password for `user add`
pub const PASSWORD_ENV: &str = "FINSIGHT_PASSWORD";

/// Read the new user's password from FINSIGHT_PASSWORD or stdin
pub fn read_password() -> Result<String> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(password);
        }
    }

    print!("Password: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub fn cmd_user_add(
    db: &Database,
    name: &str,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    if password.chars().count() < 8 {
        anyhow::bail!("Password must be at least 8 characters");
    }

    let user = db
        .create_user(&NewUser {
            name: name.trim().to_string(),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password: password.to_string(),
        })
        .with_context(|| format!("Failed to create user '{}'", username))?;

    println!("✅ Created user {} (id {})", user.username, user.id);
    Ok(())
}

pub fn cmd_user_list(db: &Database) -> Result<()> {
    let users = db.list_users()?;

    if users.is_empty() {
        println!("No users yet. Create one with: finsight user add");
        return Ok(());
    }

    println!("👤 Users");
    println!("   ─────────────────────────────────────────────────────────");
    for user in &users {
        println!(
            "   {:>4}  {:<16} {:<24} {}",
            user.id,
            truncate(&user.username, 16),
            truncate(&user.email, 24),
            user.name
        );
    }

    Ok(())
}
