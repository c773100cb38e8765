use dalsys_core::config::Config;
use dalsys_core::paths;
use std::path::Path;

pub fn run(root: &Path) -> anyhow::Result<()> {
    let config_path = paths::config_path(root);
    let config = if config_path.exists() {
        Config::load(root)?
    } else {
        let config = Config::default();
        config.save(root)?;
        println!("Created {}", config_path.display());
        config
    };

    // Opening creates the database and its tables.
    config.open_persistence(root)?;
    println!("DALSys ready in {}", paths::dalsys_dir(root).display());
    Ok(())
}
