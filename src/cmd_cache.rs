//! Cache subcommand handlers.

use storebridge_config::{CacheKind, Config};
use storebridge_core::cache::{self, LocalCache, VersionCache};

use crate::cli::CacheAction;

pub(crate) async fn handle_cache_command(
    action: CacheAction,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let cache = cache::from_config(&config.version_cache)?;

    match action {
        CacheAction::Resolve { version, print } => match cache.resolve(&version).await? {
            Some(content) if print => println!("{}", content),
            Some(content) => println!(
                "{}: {} bytes from {} cache",
                version,
                content.len(),
                cache.kind()
            ),
            None => println!("{}: not cached", version),
        },
        CacheAction::Import { version, file } => {
            let content = tokio::fs::read_to_string(&file).await?;
            cache.persist(&content, &version).await?;
            println!(
                "Imported {} as {} ({} cache)",
                file.display(),
                version,
                cache.kind()
            );
        }
        CacheAction::List => {
            if config.version_cache.kind != CacheKind::Local {
                println!("Listing is only available for the local cache.");
                return Ok(());
            }
            let local = LocalCache::new(config.version_cache.local_dir(), false);
            let versions = local.versions().await?;
            if versions.is_empty() {
                println!("No snapshots in {}", local.dir().display());
            }
            for version in versions {
                println!("{}", version);
            }
        }
    }

    Ok(())
}
