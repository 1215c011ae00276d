//! Partitioned store configuration.

use serde::{Deserialize, Serialize};

use crate::routes::{PartitionSource, RouteConfig};

fn default_data_dir() -> String {
    String::from(".chronicle/data")
}

fn default_keyspace_prefix() -> String {
    String::from("audits_")
}

fn default_table() -> String {
    String::from("audits")
}

fn default_partition_column() -> String {
    String::from("partition_key")
}

const fn default_partition_source() -> PartitionSource {
    PartitionSource::YearMonth
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    /// Directory holding one database file per temporal bucket.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database file prefix; the bucket is appended (`audits_26.db`).
    #[serde(default = "default_keyspace_prefix")]
    pub keyspace_prefix: String,

    /// Table for records whose `associated_type` has no route.
    #[serde(default = "default_table")]
    pub default_table: String,

    /// Partition column of the default table.
    #[serde(default = "default_partition_column")]
    pub default_partition_column: String,

    /// Where the default table's partition value comes from.
    #[serde(default = "default_partition_source")]
    pub default_source: PartitionSource,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            keyspace_prefix: default_keyspace_prefix(),
            default_table: default_table(),
            default_partition_column: default_partition_column(),
            default_source: default_partition_source(),
        }
    }
}

impl StoreConfig {
    /// Database file name for a bucket.
    #[must_use]
    pub fn keyspace_file(&self, bucket: &str) -> String {
        format!("{}{bucket}.db", self.keyspace_prefix)
    }

    /// The route for records without a configured owner route.
    #[must_use]
    pub fn default_route(&self) -> RouteConfig {
        RouteConfig::new(
            self.default_table.clone(),
            self.default_partition_column.clone(),
            self.default_source,
        )
    }
}
