//! Rollback ledger - durable record of pre-mutation port state
//!
//! Storage is a flat file with one record per line and six comma-separated
//! fields, no header:
//!
//! ```text
//! id,kind,switch_serial,port_id,vlan,voice_vlan
//! 12,bulk,Q2XX-AAAA-0001,7,10,
//! ```
//!
//! An absent VLAN is an empty field, distinct from `0`. A missing file is an
//! empty ledger. Every operation holds one lock across the whole
//! read-modify-write of the file, so concurrent workers can neither allocate
//! the same ID nor interleave partial writes.

use parking_lot::Mutex;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use vlanbulk_common::{
    LedgerEntry, LedgerError, LedgerId, LedgerResult, OperationKind, PortState, VlanId,
};

/// Number of fields in one stored record
const FIELD_COUNT: usize = 6;

/// Default ledger file name
pub const DEFAULT_LEDGER_FILE: &str = "rollback_data.csv";

/// Append-only rollback ledger
///
/// All file IO is synchronous and runs on the calling task. Each call is a
/// single small read or write and at most `MAX_WORKERS` tasks contend for
/// the lock, so workers call it inline rather than through
/// `spawn_blocking`.
pub struct Ledger {
    path: PathBuf,
    /// Largest ID ever allocated by this instance
    high_water: Mutex<LedgerId>,
}

impl Ledger {
    /// Opens the ledger at `path`, seeding ID allocation from its contents
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        let path = path.into();
        let high_water = max_id(&read_entries(&path)?);
        debug!(path = %path.display(), high_water, "Opened rollback ledger");
        Ok(Self {
            path,
            high_water: Mutex::new(high_water),
        })
    }

    /// Returns the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the ID the next append will receive
    pub fn next_id(&self) -> LedgerResult<LedgerId> {
        let high_water = self.high_water.lock();
        let entries = read_entries(&self.path)?;
        Ok(max_id(&entries).max(*high_water) + 1)
    }

    /// Records `state` as the pre-mutation state of its port
    ///
    /// The record is flushed to disk before the ID is returned.
    #[instrument(skip(self, state), fields(switch = %state.switch_serial, port = %state.port_id))]
    pub fn append(&self, kind: OperationKind, state: &PortState) -> LedgerResult<LedgerId> {
        check_field("switch_serial", &state.switch_serial)?;
        check_field("port_id", &state.port_id)?;

        let mut high_water = self.high_water.lock();
        let entries = read_entries(&self.path)?;
        let id = max_id(&entries).max(*high_water) + 1;

        let entry = LedgerEntry {
            id,
            kind,
            switch_serial: state.switch_serial.clone(),
            port_id: state.port_id.clone(),
            vlan: state.vlan,
            voice_vlan: state.voice_vlan,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e))?;
        writeln!(file, "{}", encode(&entry)).map_err(|e| LedgerError::io(&self.path, e))?;
        file.sync_data()
            .map_err(|e| LedgerError::io(&self.path, e))?;

        *high_water = id;
        debug!(id, kind = %kind, "Captured rollback entry");
        Ok(id)
    }

    /// Looks up an entry by ID
    pub fn get(&self, id: LedgerId) -> LedgerResult<Option<LedgerEntry>> {
        let _guard = self.high_water.lock();
        let entries = read_entries(&self.path)?;
        Ok(entries.into_iter().find(|e| e.id == id))
    }

    /// Removes an entry, returning whether it existed
    ///
    /// Deleting a missing ID is a no-op.
    #[instrument(skip(self))]
    pub fn delete(&self, id: LedgerId) -> LedgerResult<bool> {
        let _guard = self.high_water.lock();
        let mut entries = read_entries(&self.path)?;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Ok(false);
        }

        self.rewrite(&entries)?;
        debug!(id, "Consumed rollback entry");
        Ok(true)
    }

    /// Returns every entry in storage order
    pub fn list(&self) -> LedgerResult<Vec<LedgerEntry>> {
        let _guard = self.high_water.lock();
        read_entries(&self.path)
    }

    /// Removes every entry
    ///
    /// IDs allocated afterwards still continue above the previous maximum.
    pub fn clear(&self) -> LedgerResult<()> {
        let _guard = self.high_water.lock();
        File::create(&self.path).map_err(|e| LedgerError::io(&self.path, e))?;
        info!(path = %self.path.display(), "Rollback ledger cleared");
        Ok(())
    }

    /// Replaces the file contents atomically via a sibling temp file
    fn rewrite(&self, entries: &[LedgerEntry]) -> LedgerResult<()> {
        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        let mut content = String::new();
        for entry in entries {
            content.push_str(&encode(entry));
            content.push('\n');
        }

        let write = || -> io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_data()?;
            fs::rename(&tmp_path, &self.path)
        };
        write().map_err(|e| LedgerError::io(&self.path, e))
    }
}

fn max_id(entries: &[LedgerEntry]) -> LedgerId {
    entries.iter().map(|e| e.id).max().unwrap_or(0)
}

fn check_field(field: &'static str, value: &str) -> LedgerResult<()> {
    if value.is_empty() || value.contains([',', '\n', '\r']) {
        return Err(LedgerError::InvalidField {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn read_entries(path: &Path) -> LedgerResult<Vec<LedgerEntry>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LedgerError::io(path, e)),
    };

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| decode(line).map_err(|reason| LedgerError::corrupt(idx + 1, reason)))
        .collect()
}

/// Encodes one entry as a storage line (without newline)
pub fn encode(entry: &LedgerEntry) -> String {
    format!(
        "{},{},{},{},{},{}",
        entry.id,
        entry.kind.as_str(),
        entry.switch_serial,
        entry.port_id,
        encode_vlan(entry.vlan),
        encode_vlan(entry.voice_vlan)
    )
}

/// Decodes one storage line
pub fn decode(line: &str) -> Result<LedgerEntry, String> {
    let fields: Vec<&str> = line.trim_end_matches('\r').split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(format!(
            "expected {} fields, found {}",
            FIELD_COUNT,
            fields.len()
        ));
    }

    let id = fields[0]
        .trim()
        .parse::<LedgerId>()
        .map_err(|e| format!("invalid id '{}': {}", fields[0], e))?;
    let kind = fields[1].trim().parse::<OperationKind>()?;
    if fields[2].is_empty() || fields[3].is_empty() {
        return Err("empty switch serial or port id".to_string());
    }

    Ok(LedgerEntry {
        id,
        kind,
        switch_serial: fields[2].to_string(),
        port_id: fields[3].to_string(),
        vlan: decode_vlan(fields[4])?,
        voice_vlan: decode_vlan(fields[5])?,
    })
}

fn encode_vlan(vlan: Option<VlanId>) -> String {
    vlan.map(|v| v.to_string()).unwrap_or_default()
}

fn decode_vlan(field: &str) -> Result<Option<VlanId>, String> {
    let field = field.trim();
    if field.is_empty() {
        return Ok(None);
    }
    field
        .parse::<VlanId>()
        .map(Some)
        .map_err(|e| format!("invalid vlan '{}': {}", field, e))
}
