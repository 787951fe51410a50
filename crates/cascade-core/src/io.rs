//! Network files.
//!
//! A network file holds three arrays, `buses`, `generators` and `branches`,
//! in JSON or YAML. The format follows the file extension; anything else is
//! tried as YAML, then JSON.
//!
//! ```yaml
//! buses:
//!   - { id: 1, bus_type: slack }
//!   - { id: 2, load: 50.0 }
//! generators:
//!   - { id: 1, bus: 1, active_power: 50.0 }
//! branches:
//!   - { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1 }
//!   - { id: 2, from_bus: 1, to_bus: 2, reactance: null, status: failed }
//! ```

use crate::{Branch, Bus, Diagnostics, Gen, GridError, GridResult, Network};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkFormat {
    Json,
    Yaml,
}

impl NetworkFormat {
    /// Format implied by the extension of `path`, if any.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Some(NetworkFormat::Yaml)
            }
            Some(ext) if ext.eq_ignore_ascii_case("json") => Some(NetworkFormat::Json),
            _ => None,
        }
    }
}

/// Serialized form of a [`Network`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkFile {
    pub buses: Vec<Bus>,
    #[serde(default)]
    pub generators: Vec<Gen>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

impl NetworkFile {
    pub fn from_network(network: &Network) -> Self {
        Self {
            buses: network.buses().into_iter().cloned().collect(),
            generators: network.generators().into_iter().cloned().collect(),
            branches: network.branches().into_iter().cloned().collect(),
        }
    }

    /// Build the graph. Branches naming an unknown bus are rejected here;
    /// everything else is left to [`Network::validate_into`].
    pub fn into_network(self) -> GridResult<Network> {
        let mut network = Network::new();
        for bus in self.buses {
            network.add_bus(bus);
        }
        for gen in self.generators {
            network.add_gen(gen);
        }
        for branch in self.branches {
            network.add_branch(branch)?;
        }
        Ok(network)
    }
}

pub fn parse_network(data: &str, format: Option<NetworkFormat>) -> GridResult<NetworkFile> {
    let file = match format {
        Some(NetworkFormat::Yaml) => serde_yaml::from_str(data)?,
        Some(NetworkFormat::Json) => serde_json::from_str(data)?,
        None => match serde_yaml::from_str(data) {
            Ok(file) => file,
            Err(_) => serde_json::from_str(data)?,
        },
    };
    Ok(file)
}

/// Load and validate a network, returning the non-fatal diagnostics too.
///
/// # Errors
///
/// I/O and parse failures, branches with unknown endpoints, and any
/// validation issue of severity error.
pub fn load_network_with_diagnostics(path: &Path) -> GridResult<(Network, Diagnostics)> {
    let data = fs::read_to_string(path)?;
    let network = parse_network(&data, NetworkFormat::from_path(path))?.into_network()?;

    let mut diag = Diagnostics::new();
    network.validate_into(&mut diag);
    if diag.has_errors() {
        let details: Vec<String> = diag.errors().map(|issue| issue.to_string()).collect();
        return Err(GridError::Validation(format!(
            "{} ({}): {}",
            path.display(),
            diag.summary(),
            details.join("; ")
        )));
    }
    Ok((network, diag))
}

pub fn load_network(path: &Path) -> GridResult<Network> {
    load_network_with_diagnostics(path).map(|(network, _)| network)
}

/// Write `network` to `path`; YAML for `.yaml`/`.yml`, JSON otherwise.
pub fn write_network(network: &Network, path: &Path) -> GridResult<()> {
    let file = NetworkFile::from_network(network);
    let data = match NetworkFormat::from_path(path) {
        Some(NetworkFormat::Yaml) => serde_yaml::to_string(&file)?,
        _ => serde_json::to_string_pretty(&file)?,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BranchId, BranchStatus, BusId, BusType, Megawatts};
    use tempfile::tempdir;

    const SAMPLE_YAML: &str = r#"
buses:
  - { id: 1, bus_type: slack }
  - { id: 2, load: 50.0 }
generators:
  - { id: 1, bus: 1, active_power: 50.0 }
branches:
  - { id: 1, from_bus: 1, to_bus: 2, reactance: 0.1 }
  - { id: 2, from_bus: 1, to_bus: 2, reactance: null, status: failed }
"#;

    #[test]
    fn test_parse_yaml_with_failed_branch() {
        let network = parse_network(SAMPLE_YAML, Some(NetworkFormat::Yaml))
            .unwrap()
            .into_network()
            .unwrap();
        assert_eq!(network.buses().len(), 2);
        assert_eq!(network.bus(BusId::new(1)).unwrap().bus_type, BusType::Slack);
        assert_eq!(network.bus(BusId::new(2)).unwrap().load, Megawatts(50.0));
        let failed = network.branch(BranchId::new(2)).unwrap();
        assert_eq!(failed.status, BranchStatus::Failed);
        assert!(failed.reactance.is_infinite());
        assert!(network.generators()[0].status);
    }

    #[test]
    fn test_unknown_extension_falls_back() {
        let json = r#"{"buses":[{"id":1}],"generators":[],"branches":[]}"#;
        let file = parse_network(json, None).unwrap();
        assert_eq!(file.buses.len(), 1);
    }

    #[test]
    fn test_write_and_reload_json() {
        let network = parse_network(SAMPLE_YAML, None)
            .unwrap()
            .into_network()
            .unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("grid.json");
        write_network(&network, &path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"reactance\": null"));

        let reloaded = load_network(&path).unwrap();
        assert!(reloaded.same_records(&network));
    }

    #[test]
    fn test_load_rejects_invalid_network() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        fs::write(
            &path,
            "buses:\n  - { id: 1 }\n  - { id: 2 }\nbranches:\n  - { id: 1, from_bus: 1, to_bus: 2, reactance: -1.0 }\n",
        )
        .unwrap();
        let err = load_network(&path).unwrap_err();
        assert!(matches!(err, GridError::Validation(_)));
        assert!(err.to_string().contains("invalid reactance"));
    }

    #[test]
    fn test_load_reports_warnings() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grid.yml");
        fs::write(&path, SAMPLE_YAML).unwrap();
        let (_, diag) = load_network_with_diagnostics(&path).unwrap();
        assert!(!diag.has_errors());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_network(Path::new("/nonexistent/grid.json")).unwrap_err();
        assert!(matches!(err, GridError::Io(_)));
    }
}
