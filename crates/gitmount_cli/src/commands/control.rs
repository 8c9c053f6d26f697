//! Control socket commands.

use gitmount_control::ControlClient;
use gitmount_core::socket_path;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

#[derive(Serialize)]
struct InfoOutput {
    origin: String,
    branch: String,
    root: String,
    path: String,
    merge_needed: bool,
    held: bool,
}

fn connect(root: &Path) -> Result<ControlClient, Box<dyn std::error::Error>> {
    let socket = socket_path(root);
    ControlClient::connect(&socket)
        .map_err(|e| format!("no instance at {}: {}", socket.display(), e).into())
}

/// Pings the instance.
pub fn ping(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    connect(root)?.ping()?;
    println!("ok");
    Ok(())
}

/// Takes a lease, optionally holding it until interrupted.
pub fn lock(root: &Path, hold: bool, renew_secs: u64) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = connect(root)?;
    if !hold {
        let name = client.lock()?;
        println!("Locked as {}", name);
        return Ok(());
    }

    let renew = Duration::from_secs(renew_secs.max(1));
    let held = client.hold_lock(renew)?;
    println!("Holding lock as {} (renewing every {}s)", held.name(), renew.as_secs());
    super::wait_for_interrupt()?;
    held.release()?;
    println!("Released");
    Ok(())
}

/// Releases this connection's lease.
///
/// Leases belong to the connection that took them, and every invocation
/// opens a new one, so this only reports whether anything was released.
/// `lock --hold` releases its own lease when it stops.
pub fn unlock(root: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if connect(root)?.unlock()? {
        println!("Unlocked");
        Ok(())
    } else {
        Err("no lease held by this connection; a lease taken by `lock` expires on its own, \
             use `lock --hold` to release on exit"
            .into())
    }
}

/// Prints the instance description.
pub fn info(root: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let info = connect(root)?.info()?;
    let output = InfoOutput {
        origin: info.origin,
        branch: info.branch,
        root: info.root,
        path: info.path,
        merge_needed: info.merge_needed,
        held: info.held,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        _ => {
            println!("Mount Information");
            println!("=================");
            println!("Origin:       {}", output.origin);
            println!("Branch:       {}", output.branch);
            println!("Root:         {}", output.root);
            println!("Mount point:  {}", output.path);
            println!("Merge needed: {}", output.merge_needed);
            println!("Lock held:    {}", output.held);
        }
    }
    Ok(())
}

/// Resolves `key` on the instance.
pub fn get_config(root: &Path, key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let value = require_value(key, connect(root)?.get_config(key)?)?;
    println!("{}", value);
    Ok(())
}

fn require_value(key: &str, value: Option<String>) -> Result<String, String> {
    value.ok_or_else(|| format!("{}: not set", key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_key_is_an_error() {
        assert_eq!(require_value("editor", Some("vi".into())), Ok("vi".to_string()));
        assert_eq!(require_value("pager", None), Err("pager: not set".to_string()));
    }
}
