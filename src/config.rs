// Copyright 2025 Trellis project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use serde_derive::Deserialize;

///
/// The full configuration surface. Every field has a default, so a TOML
/// file only names what it changes:
///
/// ```toml
/// client_ratio = 5
/// server_ratio = 3
/// datastores_per_server = 4
///
/// [datastore]
/// kind = "in_memory"
///
/// [histograms]
/// names = ["temperature"]
/// ```
///
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Client portion of the client:server ratio.
    pub client_ratio: u32,
    /// Server portion of the client:server ratio.
    pub server_ratio: u32,
    pub datastores_per_server: u32,
    /// Bulk-request capacity: slots per destination per round.
    pub max_ops_per_send: usize,
    pub async_puts: AsyncPutsConfig,
    pub datastore: DatastoreConfig,
    pub hash: HashConfig,
    pub transport: TransportConfig,
    pub histograms: HistogramsConfig,
    /// When set, the subset of server ranks this client will talk to.
    pub endpoint_group: Option<Vec<u32>>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            client_ratio: 1,
            server_ratio: 1,
            datastores_per_server: 1,
            max_ops_per_send: 256,
            async_puts: AsyncPutsConfig::default(),
            datastore: DatastoreConfig::default(),
            hash: HashConfig::default(),
            transport: TransportConfig::default(),
            histograms: HistogramsConfig::default(),
            endpoint_group: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AsyncPutsConfig {
    pub enabled: bool,
    /// The watermark: queued PUTs at which the background worker wakes.
    pub max_queued: usize,
}

impl Default for AsyncPutsConfig {
    fn default() -> AsyncPutsConfig {
        AsyncPutsConfig {
            enabled: false,
            max_queued: 256,
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum DatastoreKind {
    InMemory,
    #[serde(alias = "rocksdb")]
    RocksDb,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatastoreConfig {
    pub kind: DatastoreKind,
    /// Name prefix for in-memory stores, directory prefix for on-disk ones.
    pub prefix: String,
    pub create_if_missing: bool,
}

impl Default for DatastoreConfig {
    fn default() -> DatastoreConfig {
        DatastoreConfig {
            kind: DatastoreKind::InMemory,
            prefix: "trellis".to_owned(),
            create_if_missing: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HashConfig {
    pub name: String,
}

impl Default for HashConfig {
    fn default() -> HashConfig {
        HashConfig {
            name: "sum_mod_datastores".to_owned(),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// No remote peers: every operation must hash to the local rank.
    None,
    /// The in-process channel mesh; built by `World::open`.
    Mesh,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub kind: TransportKind,
}

impl Default for TransportConfig {
    fn default() -> TransportConfig {
        TransportConfig {
            kind: TransportKind::None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HistogramsConfig {
    /// Predicates to maintain streaming estimators for.
    pub names: Vec<String>,
    /// Samples cached before the bucket set is generated.
    pub first_n: usize,
    /// Buckets the default generator produces.
    pub buckets: usize,
    /// Reload persisted histograms when a datastore opens.
    pub read: bool,
    /// Persist histograms when a datastore closes.
    pub write: bool,
}

impl Default for HistogramsConfig {
    fn default() -> HistogramsConfig {
        HistogramsConfig {
            names: Vec::new(),
            first_n: 10,
            buckets: 10,
            read: false,
            write: false,
        }
    }
}

impl Config {
    pub fn from_toml_str(raw: &str) -> Result<Config, String> {
        let config: Config =
            toml::from_str(raw).map_err(|e| format!("failed to parse configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.client_ratio == 0 || self.server_ratio == 0 {
            return Err(format!(
                "client:server ratio {}:{} must have both sides nonzero",
                self.client_ratio, self.server_ratio
            ));
        }
        if self.datastores_per_server == 0 {
            return Err("datastores_per_server must be nonzero".to_owned());
        }
        if self.max_ops_per_send == 0 {
            return Err("max_ops_per_send must be nonzero".to_owned());
        }
        if self.async_puts.enabled && self.async_puts.max_queued == 0 {
            return Err("async_puts.max_queued must be nonzero when enabled".to_owned());
        }
        if self.histograms.first_n == 0 || self.histograms.buckets == 0 {
            return Err("histograms.first_n and histograms.buckets must be nonzero".to_owned());
        }
        if let Some(group) = &self.endpoint_group {
            if group.is_empty() {
                return Err("endpoint_group, when set, must name at least one rank".to_owned());
            }
        }
        Ok(())
    }
}
