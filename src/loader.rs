use anyhow::{bail, Context};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Load and deserialize a file, picking the format from its extension.
/// Supported formats: yaml, json and toml
pub fn load<T: DeserializeOwned, P: AsRef<Path>>(file: P) -> anyhow::Result<T> {
    let file = file.as_ref();
    check_file_exists_and_readable(file)?;

    let contents =
        std::fs::read_to_string(file).with_context(|| format!("can not read {:?}", file))?;

    let extension = file
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    log::trace!("loading {:?} as {:?}", file, extension);

    let parsed = match extension.as_deref() {
        Some("yaml") | Some("yml") => serde_yaml::from_str::<T>(&contents)
            .map_err(|err| format_serde_error::SerdeError::new(contents.clone(), err))
            .with_context(|| format!("failed to parse {:?}", file))?,
        Some("json") => serde_json::from_str::<T>(&contents)
            .map_err(|err| format_serde_error::SerdeError::new(contents.clone(), err))
            .with_context(|| format!("failed to parse {:?}", file))?,
        Some("toml") => {
            toml::from_str::<T>(&contents).with_context(|| format!("failed to parse {:?}", file))?
        }
        _ => bail!(
            "unsupported file format of {:?}; use one of yaml, yml, json, toml",
            file
        ),
    };

    Ok(parsed)
}

/// Check whether the given input file exists and is readable
pub fn check_file_exists_and_readable(input_file: &Path) -> anyhow::Result<()> {
    if !input_file.exists() {
        bail!("File {:?} does not exist or is not readable", input_file);
    }

    Ok(())
}
