use clap::Subcommand;
use stillpoint_core::error::Result;
use stillpoint_core::storage::FileTimingCache;

#[derive(Subcommand)]
pub enum CacheAction {
    /// List stored word timing entries
    Show,
    /// Delete every stored entry
    Clear,
}

pub fn run(action: CacheAction) -> Result<()> {
    let cache = FileTimingCache::open()?;
    match action {
        CacheAction::Show => {
            let entries = cache.entries();
            if entries.is_empty() {
                println!("cache is empty ({})", cache.dir().display());
            }
            for name in entries {
                println!("{name}");
            }
        }
        CacheAction::Clear => {
            let removed = cache.clear()?;
            println!("removed {removed} entries");
        }
    }
    Ok(())
}
