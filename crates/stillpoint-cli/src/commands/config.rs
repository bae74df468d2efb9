use clap::Subcommand;
use stillpoint_core::storage::{FileSettingsStore, SessionConfig, SettingsStore};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the whole configuration as JSON
    Show,
    /// Get a config value
    Get {
        /// Config key (e.g. "meditation_duration", "voice.rate")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
    /// Reset config to defaults
    Reset,
}

pub fn run(action: ConfigAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = FileSettingsStore::open()?;
    match action {
        ConfigAction::Show => {
            let json = serde_json::to_string_pretty(&store.current())?;
            println!("{json}");
        }
        ConfigAction::Get { key } => match store.current().get(&key) {
            Some(value) => println!("{value}"),
            None => {
                eprintln!("unknown key: {key}");
                std::process::exit(1);
            }
        },
        ConfigAction::Set { key, value } => {
            let mut config = store.current();
            config.set(&key, &value)?;
            store.replace(config)?;
            println!("ok");
        }
        ConfigAction::Reset => {
            store.replace(SessionConfig::default())?;
            println!("config reset to defaults");
        }
    }
    Ok(())
}
