use semver::Version as Semver;
use serde::{Deserialize, Serialize};

/// Response of `GET /` on the cluster root.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerInfo {
    #[serde(rename = "name")]
    hostname: String,
    #[serde(rename = "cluster_name")]
    name: String,
    #[serde(rename = "cluster_uuid")]
    uuid: Option<String>,
    version: Version,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Version {
    number: String,
    lucene_version: String,
}

impl ServerInfo {
    pub fn get_hostname(&self) -> &str {
        &self.hostname
    }
    pub fn get_name(&self) -> &str {
        &self.name
    }
    pub fn get_uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }
    pub fn get_version(&self) -> &str {
        &self.version.number
    }
    pub fn get_lucene_version(&self) -> &str {
        &self.version.lucene_version
    }

    /// None when the reported version number is not valid semver.
    pub fn get_version_major(&self) -> Option<u64> {
        Semver::parse(&self.version.number).ok().map(|v| v.major)
    }
}
