use std::collections::BTreeMap;

use crate::types::ConnectorDefinition;

const POSTGRES_CONNECTOR_CLASS: &str = "io.debezium.connector.postgresql.PostgresConnector";
const JSON_CONVERTER: &str = "org.apache.kafka.connect.json.JsonConverter";

/// Debezium PostgreSQL source connector settings.
///
/// Changes are read through `pgoutput` and published as schemaless JSON, one
/// topic per table named `{topic_prefix}.{schema}.{table}`.
#[derive(Clone)]
pub struct PostgresConnectorConfig {
    pub name: String,
    pub hostname: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub topic_prefix: String,
    /// Tables as `schema.table`.
    pub tables: Vec<String>,
    pub slot_name: String,
    pub publication_name: String,
    pub snapshot_mode: String,
    pub tasks_max: u32,
}

impl PostgresConnectorConfig {
    pub fn new(
        hostname: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
        dbname: impl Into<String>,
    ) -> Self {
        Self {
            name: "postgres-connector".to_string(),
            hostname: hostname.into(),
            port: 5432,
            user: user.into(),
            password: password.into(),
            dbname: dbname.into(),
            topic_prefix: "banking_server".to_string(),
            tables: vec![
                "public.customers".to_string(),
                "public.accounts".to_string(),
                "public.transactions".to_string(),
            ],
            slot_name: "banking_slot".to_string(),
            publication_name: "banking_publication".to_string(),
            snapshot_mode: "initial".to_string(),
            tasks_max: 1,
        }
    }

    /// Topics the connector publishes to.
    pub fn topics(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|table| format!("{}.{table}", self.topic_prefix))
            .collect()
    }

    pub fn to_definition(&self) -> ConnectorDefinition {
        let entries = [
            ("connector.class", POSTGRES_CONNECTOR_CLASS.to_string()),
            ("tasks.max", self.tasks_max.to_string()),
            ("database.hostname", self.hostname.clone()),
            ("database.port", self.port.to_string()),
            ("database.user", self.user.clone()),
            ("database.password", self.password.clone()),
            ("database.dbname", self.dbname.clone()),
            ("topic.prefix", self.topic_prefix.clone()),
            ("table.include.list", self.tables.join(",")),
            ("plugin.name", "pgoutput".to_string()),
            ("slot.name", self.slot_name.clone()),
            ("publication.name", self.publication_name.clone()),
            ("publication.autocreate.mode", "filtered".to_string()),
            ("tombstones.on.delete", "false".to_string()),
            ("decimal.handling.mode", "double".to_string()),
            ("time.precision.mode", "adaptive".to_string()),
            ("snapshot.mode", self.snapshot_mode.clone()),
            ("key.converter", JSON_CONVERTER.to_string()),
            ("value.converter", JSON_CONVERTER.to_string()),
            ("key.converter.schemas.enable", "false".to_string()),
            ("value.converter.schemas.enable", "false".to_string()),
        ];

        let config = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<BTreeMap<_, _>>();

        ConnectorDefinition {
            name: self.name.clone(),
            config,
        }
    }
}

impl std::fmt::Debug for PostgresConnectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConnectorConfig")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("dbname", &self.dbname)
            .field("topic_prefix", &self.topic_prefix)
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}
