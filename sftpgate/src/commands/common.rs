use std::io::stdin;

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;

/// Prompts on a terminal, reads a single line from stdin otherwise.
pub(crate) fn read_password(username: &str) -> Result<String> {
    if console::user_attended() {
        return Ok(dialoguer::Password::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("SFTP password for {username}"))
            .interact()?);
    }

    let mut input = String::new();
    stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_owned())
}
