use crate::cli::actions::Action;
use anyhow::Result;
use std::path::PathBuf;

pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches.get_one::<u16>("port").copied().unwrap_or(8080),
        config: matches
            .get_one::<PathBuf>("config")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --config"))?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::commands;

    #[test]
    fn test_handler_returns_server_action() -> Result<()> {
        let matches = commands::new().get_matches_from(vec![
            "grovemart",
            "--port",
            "9443",
            "--config",
            "/etc/grovemart/settings.toml",
        ]);

        let action = handler(&matches)?;

        match action {
            Action::Server { port, config } => {
                assert_eq!(port, 9443);
                assert_eq!(config, PathBuf::from("/etc/grovemart/settings.toml"));
            }
        }

        Ok(())
    }
}
