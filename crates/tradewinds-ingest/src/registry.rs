//! Dataset registry loading. The YAML document is read once at process
//! start; a reload requires a restart.

use std::path::Path;

use tradewinds_core::DatasetRegistry;

use crate::IngestError;

pub fn load_registry(path: impl AsRef<Path>) -> Result<DatasetRegistry, IngestError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| IngestError::RegistryIo {
        path: path.display().to_string(),
        source,
    })?;
    let registry: DatasetRegistry =
        serde_yaml::from_str(&text).map_err(|source| IngestError::RegistryParse {
            path: path.display().to_string(),
            source,
        })?;
    registry.validate()?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_validates_a_registry_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
datasets:
  freight.bdi:
    name: Baltic Dry Index
    cadence: daily
    adapter: file_scraper
    transform: commodities
    target_table: freight_indices
    conflict_keys: [index_code, ts]
    enabled: true
    url: https://index.example.test/bdi.csv
"#
        )
        .unwrap();

        let registry = load_registry(file.path()).unwrap();
        assert_eq!(registry.datasets.len(), 1);
        assert!(registry.get("freight.bdi").is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_registry("/nonexistent/datasets.yaml").unwrap_err();
        assert!(matches!(err, IngestError::RegistryIo { .. }));
    }

    #[test]
    fn invalid_yaml_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "datasets: [not, a, map]").unwrap();
        let err = load_registry(file.path()).unwrap_err();
        assert!(matches!(err, IngestError::RegistryParse { .. }));
    }
}
