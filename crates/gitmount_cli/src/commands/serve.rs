//! Serve command implementation.

use gitmount_core::{MountConfig, MountInstance};
use std::path::{Path, PathBuf};

/// Mounts `root` and runs until interrupted.
pub fn run(
    root: &Path,
    mount_point: &Path,
    origin: &str,
    branch: &str,
    install_dir: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = MountConfig::new(root, mount_point).with_remote(origin, branch);
    if let Some(dir) = install_dir {
        config = config.with_install_dir(dir);
    }

    let mount = MountInstance::start(config)?;
    println!("Serving {} on {}", root.display(), mount.config().socket_path().display());

    super::wait_for_interrupt()?;

    match mount.shutdown()? {
        Some(outcome) => println!("Final sync: {:?}", outcome),
        None => println!("Already stopped"),
    }
    Ok(())
}
