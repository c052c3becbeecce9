//! Snapshot file persistence.
//!
//! Breaker states are written as one JSON object keyed by breaker key, so a
//! restarted process resumes with the circuits it left open.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use crate::breaker::BreakerState;

/// Read snapshots written by [`save_snapshots`]. A missing file is empty.
pub fn load_snapshots(path: impl AsRef<Path>) -> std::io::Result<HashMap<String, BreakerState>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let reader = BufReader::new(File::open(path)?);
    let snapshots: HashMap<String, BreakerState> = serde_json::from_reader(reader)?;
    tracing::info!(path = %path.display(), count = snapshots.len(), "Loaded breaker snapshots");
    Ok(snapshots)
}

/// Write all snapshots, replacing the file atomically.
pub fn save_snapshots<'a, I>(path: impl AsRef<Path>, snapshots: I) -> std::io::Result<usize>
where
    I: IntoIterator<Item = (&'a String, &'a BreakerState)>,
{
    let path = path.as_ref();
    let map: HashMap<&String, &BreakerState> = snapshots.into_iter().collect();

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut writer, &map)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    tracing::info!(path = %path.display(), count = map.len(), "Saved breaker snapshots");
    Ok(map.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use chrono::Utc;
    use std::time::Duration;

    #[test]
    fn test_persistence() {
        let dir = std::env::temp_dir().join(format!("breaker-snapshots-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("snapshots.json");

        let mut open = BreakerState::closed(3, Duration::from_secs(10));
        open.circuit_state = CircuitState::Open;
        open.consecutive_failure_count = 3;
        open.broken_until = Some(Utc::now());

        let mut states = HashMap::new();
        states.insert("orders".to_string(), open.clone());
        states.insert("billing".to_string(), BreakerState::closed(5, Duration::from_millis(1500)));

        assert_eq!(save_snapshots(&path, states.iter()).unwrap(), 2);

        let loaded = load_snapshots(&path).unwrap();
        assert_eq!(loaded, states);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_file_is_empty() {
        let path = std::env::temp_dir().join(format!("missing-{}.json", uuid::Uuid::new_v4()));
        assert!(load_snapshots(&path).unwrap().is_empty());
    }
}
