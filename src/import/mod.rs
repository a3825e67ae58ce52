//! CSV import of the application, contract, and placement projections.

mod parser;

use crate::funnel::ingest::{
    ApplicationRecord, ContractRecord, PlacementRecord, ProjectionSnapshot,
};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub const APPLICATIONS_FILE: &str = "applications.csv";
pub const CONTRACTS_FILE: &str = "contracts.csv";
pub const PLACEMENTS_FILE: &str = "placements.csv";

#[derive(Debug, Error)]
pub enum ProjectionImportError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid {file} data: {source}")]
    Csv {
        file: &'static str,
        #[source]
        source: csv::Error,
    },
}

/// Loads projection exports into a [`ProjectionSnapshot`].
pub struct ProjectionImporter;

impl ProjectionImporter {
    /// Reads `applications.csv`, `contracts.csv`, and `placements.csv` from `dir`.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<ProjectionSnapshot, ProjectionImportError> {
        let dir = dir.as_ref();
        Ok(ProjectionSnapshot {
            applications: Self::applications_from_path(dir.join(APPLICATIONS_FILE))?,
            contracts: Self::contracts_from_path(dir.join(CONTRACTS_FILE))?,
            placements: Self::placements_from_path(dir.join(PLACEMENTS_FILE))?,
        })
    }

    pub fn from_readers<A, C, P>(
        applications: A,
        contracts: C,
        placements: P,
    ) -> Result<ProjectionSnapshot, ProjectionImportError>
    where
        A: Read,
        C: Read,
        P: Read,
    {
        Ok(ProjectionSnapshot {
            applications: read_rows(applications, APPLICATIONS_FILE)?,
            contracts: read_rows(contracts, CONTRACTS_FILE)?,
            placements: read_rows(placements, PLACEMENTS_FILE)?,
        })
    }

    pub fn applications_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<ApplicationRecord>, ProjectionImportError> {
        read_path(path.as_ref(), APPLICATIONS_FILE)
    }

    pub fn contracts_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<ContractRecord>, ProjectionImportError> {
        read_path(path.as_ref(), CONTRACTS_FILE)
    }

    pub fn placements_from_path<P: AsRef<Path>>(
        path: P,
    ) -> Result<Vec<PlacementRecord>, ProjectionImportError> {
        read_path(path.as_ref(), PLACEMENTS_FILE)
    }
}

fn read_path<T: DeserializeOwned>(
    path: &Path,
    file: &'static str,
) -> Result<Vec<T>, ProjectionImportError> {
    let handle = File::open(path).map_err(|source| ProjectionImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rows = read_rows(handle, file)?;
    debug!(path = %path.display(), rows = rows.len(), "loaded projection export");
    Ok(rows)
}

fn read_rows<T: DeserializeOwned, R: Read>(
    reader: R,
    file: &'static str,
) -> Result<Vec<T>, ProjectionImportError> {
    parser::parse_rows(reader).map_err(|source| ProjectionImportError::Csv { file, source })
}
