use std::fs;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayD, Ix3};
use num_complex::Complex64;
use tracing::debug;
use xtal_core::{Dataset, ErrorInfo, PhaseError};

const EXTENSION: &str = "json";

fn io_error(code: &str, path: &Path, err: impl ToString) -> PhaseError {
    PhaseError::Storage(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

/// Hierarchical container of named datasets backed by a directory.
///
/// The dataset `/group/name` lives in `<root>/group/name.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayStore {
    root: PathBuf,
}

impl ArrayStore {
    /// Opens an existing container.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PhaseError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PhaseError::Storage(
                ErrorInfo::new("store-missing", "array store does not exist")
                    .with_context("path", root.display().to_string()),
            ));
        }
        Ok(Self { root })
    }

    /// Opens a container, creating its directory when needed.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self, PhaseError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| io_error("store-create", &root, err))?;
        Ok(Self { root })
    }

    /// Directory holding the container.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, name: &str) -> Result<PathBuf, PhaseError> {
        let parts: Vec<&str> = name.split('/').filter(|part| !part.is_empty()).collect();
        if parts.is_empty() || parts.iter().any(|part| *part == "." || *part == "..") {
            return Err(PhaseError::Storage(
                ErrorInfo::new("dataset-name", "invalid dataset name").with_context("name", name),
            ));
        }
        let mut path = self.root.clone();
        for part in &parts {
            path.push(part);
        }
        path.set_extension(EXTENSION);
        Ok(path)
    }

    /// Whether `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.path_of(name).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Reads a dataset.
    pub fn load(&self, name: &str) -> Result<Dataset, PhaseError> {
        let path = self.path_of(name)?;
        let bytes = fs::read(&path).map_err(|err| {
            PhaseError::Storage(
                ErrorInfo::new("dataset-read", err.to_string())
                    .with_context("path", path.display().to_string())
                    .with_context("name", name),
            )
        })?;
        serde_json::from_slice(&bytes).map_err(|err| io_error("dataset-parse", &path, err))
    }

    /// Writes a dataset, replacing any previous value.
    pub fn store(&self, name: &str, dataset: &Dataset) -> Result<(), PhaseError> {
        let path = self.path_of(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| io_error("dataset-mkdir", parent, err))?;
        }
        let json =
            serde_json::to_vec(dataset).map_err(|err| io_error("dataset-serialize", &path, err))?;
        fs::write(&path, json).map_err(|err| io_error("dataset-write", &path, err))?;
        debug!(name, kind = dataset.kind(), shape = ?dataset.shape(), "dataset stored");
        Ok(())
    }

    /// Deletes a dataset if present.
    pub fn remove(&self, name: &str) -> Result<bool, PhaseError> {
        let path = self.path_of(name)?;
        if !path.is_file() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|err| io_error("dataset-remove", &path, err))?;
        Ok(true)
    }

    /// Every dataset name in the container, sorted.
    pub fn names(&self) -> Result<Vec<String>, PhaseError> {
        let mut names = Vec::new();
        collect_names(&self.root, "", &mut names)?;
        names.sort();
        Ok(names)
    }

    /// Reads a real 3D array.
    pub fn load_real3(&self, name: &str) -> Result<Array3<f64>, PhaseError> {
        match self.load(name)? {
            Dataset::Real(array) => into_3d(name, array),
            other => Err(kind_mismatch(name, "real", &other)),
        }
    }

    /// Reads a complex 3D array; real arrays are promoted.
    pub fn load_complex3(&self, name: &str) -> Result<Array3<Complex64>, PhaseError> {
        match self.load(name)? {
            Dataset::Complex(array) => into_3d(name, array),
            Dataset::Real(array) => into_3d(name, array.mapv(Complex64::from)),
            other => Err(kind_mismatch(name, "complex", &other)),
        }
    }

    /// Reads a boolean 3D mask; real arrays are read as `value != 0`.
    pub fn load_mask3(&self, name: &str) -> Result<Array3<bool>, PhaseError> {
        match self.load(name)? {
            Dataset::Mask(array) => into_3d(name, array),
            Dataset::Real(array) => into_3d(name, array.mapv(|value| value != 0.0)),
            other => Err(kind_mismatch(name, "mask", &other)),
        }
    }

    /// Reads a text dataset.
    pub fn load_text(&self, name: &str) -> Result<String, PhaseError> {
        match self.load(name)? {
            Dataset::Text(text) => Ok(text),
            other => Err(kind_mismatch(name, "text", &other)),
        }
    }
}

fn collect_names(dir: &Path, prefix: &str, names: &mut Vec<String>) -> Result<(), PhaseError> {
    let entries = fs::read_dir(dir).map_err(|err| io_error("store-list", dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| io_error("store-list", dir, err))?;
        let path = entry.path();
        let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if path.is_dir() {
            let Some(dir_name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            collect_names(&path, &format!("{prefix}/{dir_name}"), names)?;
        } else if path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION) {
            names.push(format!("{prefix}/{stem}"));
        }
    }
    Ok(())
}

fn kind_mismatch(name: &str, expected: &str, found: &Dataset) -> PhaseError {
    PhaseError::Storage(
        ErrorInfo::new("dataset-kind", "dataset has an unexpected kind")
            .with_context("name", name)
            .with_context("expected", expected)
            .with_context("found", found.kind()),
    )
}

fn into_3d<T>(name: &str, array: ArrayD<T>) -> Result<Array3<T>, PhaseError> {
    let shape = array.shape().to_vec();
    array.into_dimensionality::<Ix3>().map_err(|_| {
        PhaseError::Storage(
            ErrorInfo::new("dataset-rank", "dataset is not three dimensional")
                .with_context("name", name)
                .with_context("shape", format!("{shape:?}")),
        )
    })
}
