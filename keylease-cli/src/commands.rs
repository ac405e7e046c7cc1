//! One-shot subcommands. Each returns the process exit code.

use std::process::Command;

use anyhow::{bail, Context};
use serde::Serialize;

use keylease_core::clock::{Clock, SystemClock};
use keylease_core::manager::LockManager;
use keylease_core::types::Exclusive;

use crate::handlers::LockInfo;

pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = 1;
    /// Lock held elsewhere, wait timed out, or work skipped
    pub const CONTENDED: i32 = 3;
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn acquire(manager: &LockManager, lock_key: &str, holder: Option<&str>) -> anyhow::Result<i32> {
    let now = SystemClock.now_ms();
    match manager.try_acquire(lock_key, holder.unwrap_or(""))? {
        Some(record) => {
            print_json(&serde_json::json!({
                "acquired": true,
                "lock": LockInfo::from_record(&record, now),
            }))?;
            Ok(exit_codes::SUCCESS)
        }
        None => {
            let current = manager.holder(lock_key)?;
            print_json(&serde_json::json!({
                "acquired": false,
                "lock": current.as_ref().map(|r| LockInfo::from_record(r, now)),
            }))?;
            Ok(exit_codes::CONTENDED)
        }
    }
}

pub fn release(manager: &LockManager, lock_key: &str, holder: Option<&str>) -> anyhow::Result<i32> {
    let released = match holder {
        Some(holder) => manager.release_owned(lock_key, holder)?,
        None => {
            manager.release(lock_key)?;
            true
        }
    };
    print_json(&serde_json::json!({ "lock_key": lock_key, "released": released }))?;
    Ok(if released {
        exit_codes::SUCCESS
    } else {
        exit_codes::CONTENDED
    })
}

pub fn status(manager: &LockManager, lock_key: &str) -> anyhow::Result<i32> {
    let record = manager.holder(lock_key)?;
    let now = SystemClock.now_ms();
    print_json(&serde_json::json!({
        "lock_key": lock_key,
        "locked": record.is_some(),
        "lock": record.as_ref().map(|r| LockInfo::from_record(r, now)),
    }))?;
    Ok(exit_codes::SUCCESS)
}

pub fn wait(manager: &LockManager, lock_key: &str) -> anyhow::Result<i32> {
    let released = manager.wait_for_lock_release(lock_key)?;
    print_json(&serde_json::json!({ "lock_key": lock_key, "released": released }))?;
    Ok(if released {
        exit_codes::SUCCESS
    } else {
        exit_codes::CONTENDED
    })
}

pub fn sweep(manager: &LockManager) -> anyhow::Result<i32> {
    let deleted = manager.cleanup_expired_locks()?;
    tracing::info!(deleted, "Expired locks swept");
    print_json(&serde_json::json!({ "deleted": deleted }))?;
    Ok(exit_codes::SUCCESS)
}

pub fn list(manager: &LockManager) -> anyhow::Result<i32> {
    let now = SystemClock.now_ms();
    let locks: Vec<LockInfo> = manager
        .list_locks()?
        .iter()
        .map(|record| LockInfo::from_record(record, now))
        .collect();
    print_json(&locks)?;
    Ok(exit_codes::SUCCESS)
}

/// Run `command` under the lock and pass its exit code through.
pub fn run(
    manager: &LockManager,
    lock_key: &str,
    holder: Option<&str>,
    command: &[String],
) -> anyhow::Result<i32> {
    let Some((program, args)) = command.split_first() else {
        bail!("no command given to run");
    };

    let outcome = manager.run_exclusive(lock_key, holder.unwrap_or(""), || {
        tracing::info!(lock_key, program = %program, "Running under lock");
        Command::new(program).args(args).status()
    })?;

    match outcome {
        Exclusive::Ran(status) => {
            let status = status.with_context(|| format!("failed to start '{}'", program))?;
            Ok(status.code().unwrap_or(exit_codes::ERROR))
        }
        Exclusive::Skipped => {
            tracing::warn!(lock_key, "Lock still held elsewhere, command skipped");
            Ok(exit_codes::CONTENDED)
        }
    }
}
