use clap::Subcommand;
use patrolboard_core::BoardConfig;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Write a default config file if none exists
    Init,
    /// Print the config file location
    Path,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ConfigAction::Show => {
            let config = BoardConfig::load()?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Init => {
            let path = BoardConfig::config_path()?;
            if path.exists() {
                println!("config already exists at {}", path.display());
            } else {
                BoardConfig::default().save()?;
                println!("wrote {}", path.display());
            }
        }
        ConfigAction::Path => {
            println!("{}", BoardConfig::config_path()?.display());
        }
    }
    Ok(())
}
