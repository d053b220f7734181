//! Command and macro catalogs.
//!
//! Sessions execute ad-hoc commands; the catalog is where curated
//! commands and reusable macros live. [`CommandStore`] and
//! [`SecretStore`] are the seams for real persistence; a seeded
//! [`MemoryCatalog`] backs tests and transient use.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A curated command with a short description, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct CommandRecord {
    pub command: String,
    pub description: String,
    pub category: String,
}

/// A named command sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MacroRecord {
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Storage for curated commands and macros.
pub trait CommandStore: Send + Sync {
    fn list_categories(&self) -> Vec<String>;
    fn list_commands(&self, category: Option<&str>) -> Vec<CommandRecord>;
    /// Case-insensitive substring search over command text and
    /// descriptions.
    fn search_commands(&self, query: &str) -> Vec<CommandRecord>;
    fn add_command(&self, record: CommandRecord);
    /// Returns false when no such command existed.
    fn remove_command(&self, category: &str, command: &str) -> bool;

    fn list_macros(&self) -> Vec<MacroRecord>;
    fn get_macro(&self, name: &str) -> Option<MacroRecord>;
    /// Returns false when a macro with the same name already exists.
    fn create_macro(&self, record: MacroRecord) -> bool;
    /// Returns false when no such macro exists. `modified_at` is
    /// refreshed; `created_at` is preserved from the stored record.
    fn update_macro(&self, record: MacroRecord) -> bool;
    fn delete_macro(&self, name: &str) -> bool;
}

/// Reversible protection for stored credentials. Implementations own
/// key management; callers only see plaintext in and ciphertext out.
pub trait SecretStore: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Vec<u8>;
    /// `None` when the ciphertext does not verify.
    fn decrypt(&self, ciphertext: &[u8]) -> Option<String>;
}

#[derive(Debug, Default)]
struct CatalogState {
    commands: BTreeMap<String, Vec<CommandRecord>>,
    macros: BTreeMap<String, MacroRecord>,
}

/// In-memory [`CommandStore`] seeded with a starter set of common
/// show/diagnostic commands and maintenance macros.
pub struct MemoryCatalog {
    state: Mutex<CatalogState>,
}

impl Default for MemoryCatalog {
    fn default() -> Self {
        Self::seeded()
    }
}

impl MemoryCatalog {
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(CatalogState::default()),
        }
    }

    pub fn seeded() -> Self {
        let catalog = Self::empty();
        for (category, command, description) in SEED_COMMANDS {
            catalog.add_command(CommandRecord {
                command: (*command).to_string(),
                description: (*description).to_string(),
                category: (*category).to_string(),
            });
        }
        let now = Utc::now();
        for (name, description, commands) in SEED_MACROS {
            catalog.create_macro(MacroRecord {
                name: (*name).to_string(),
                description: (*description).to_string(),
                commands: commands.iter().map(|c| (*c).to_string()).collect(),
                author: "builtin".to_string(),
                created_at: now,
                modified_at: now,
            });
        }
        catalog
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CatalogState> {
        self.state.lock().unwrap_or_else(|err| err.into_inner())
    }
}

impl CommandStore for MemoryCatalog {
    fn list_categories(&self) -> Vec<String> {
        self.lock().commands.keys().cloned().collect()
    }

    fn list_commands(&self, category: Option<&str>) -> Vec<CommandRecord> {
        let state = self.lock();
        match category {
            Some(category) => state.commands.get(category).cloned().unwrap_or_default(),
            None => state.commands.values().flatten().cloned().collect(),
        }
    }

    fn search_commands(&self, query: &str) -> Vec<CommandRecord> {
        let query = query.to_lowercase();
        self.lock()
            .commands
            .values()
            .flatten()
            .filter(|record| {
                record.command.to_lowercase().contains(&query)
                    || record.description.to_lowercase().contains(&query)
            })
            .cloned()
            .collect()
    }

    fn add_command(&self, record: CommandRecord) {
        let mut state = self.lock();
        let bucket = state.commands.entry(record.category.clone()).or_default();
        if let Some(existing) = bucket.iter_mut().find(|c| c.command == record.command) {
            *existing = record;
        } else {
            bucket.push(record);
        }
    }

    fn remove_command(&self, category: &str, command: &str) -> bool {
        let mut state = self.lock();
        let Some(bucket) = state.commands.get_mut(category) else {
            return false;
        };
        let before = bucket.len();
        bucket.retain(|record| record.command != command);
        let removed = bucket.len() != before;
        if bucket.is_empty() {
            state.commands.remove(category);
        }
        removed
    }

    fn list_macros(&self) -> Vec<MacroRecord> {
        self.lock().macros.values().cloned().collect()
    }

    fn get_macro(&self, name: &str) -> Option<MacroRecord> {
        self.lock().macros.get(name).cloned()
    }

    fn create_macro(&self, record: MacroRecord) -> bool {
        let mut state = self.lock();
        if state.macros.contains_key(&record.name) {
            return false;
        }
        state.macros.insert(record.name.clone(), record);
        true
    }

    fn update_macro(&self, mut record: MacroRecord) -> bool {
        let mut state = self.lock();
        let Some(existing) = state.macros.get(&record.name) else {
            return false;
        };
        record.created_at = existing.created_at;
        record.modified_at = Utc::now();
        state.macros.insert(record.name.clone(), record);
        true
    }

    fn delete_macro(&self, name: &str) -> bool {
        self.lock().macros.remove(name).is_some()
    }
}

const SEED_COMMANDS: &[(&str, &str, &str)] = &[
    ("show", "show version", "Software version and hardware summary"),
    ("show", "show running-config", "Active configuration"),
    ("show", "show ip route", "IPv4 routing table"),
    ("interface", "show interfaces", "Interface counters and state"),
    ("interface", "show ip interface brief", "One-line interface status"),
    ("routing", "show ip ospf neighbor", "OSPF adjacency state"),
    ("routing", "show ip bgp summary", "BGP peer summary"),
    ("diagnostics", "show processes cpu", "CPU load per process"),
    ("diagnostics", "show logging", "Local log buffer"),
    ("diagnostics", "show environment", "Power, fans and temperature"),
];

const SEED_MACROS: &[(&str, &str, &[&str])] = &[
    (
        "basic_info",
        "Collect version, interface and routing overview",
        &["show version", "show ip interface brief", "show ip route"],
    ),
    (
        "interface_status",
        "Interface state with counters",
        &["show interfaces", "show ip interface brief"],
    ),
    (
        "save_config",
        "Persist the running configuration",
        &["write memory"],
    ),
];
