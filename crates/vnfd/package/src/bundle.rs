use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Result};
use tracing::{instrument, Level};
use vnfd_api::descriptor::Descriptor;

const SCRIPT_DIR: &str = "cloud-init";

/// One boot-customization script, addressed by its file stem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootScript {
    name: String,
    content: String,
}

impl BootScript {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Load every regular file of a directory as a boot script, sorted by
    /// name so the bundle layout is deterministic.
    #[instrument(level = Level::INFO, skip_all, err(Display))]
    pub fn read_dir(path: &Path) -> Result<Vec<Self>> {
        let entries = fs::read_dir(path)
            .map_err(|error| anyhow!("failed to read the script directory {path:?}: {error}"))?;

        let mut scripts = Vec::default();
        for entry in entries {
            let entry = entry
                .map_err(|error| anyhow!("failed to read the script directory {path:?}: {error}"))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let name = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let content = fs::read_to_string(&path)
                .map_err(|error| anyhow!("failed to read the script {path:?}: {error}"))?;
            scripts.push(Self { name, content });
        }
        scripts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(scripts)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A descriptor document paired with the boot scripts its units declare,
/// ready to be laid out on disk or pushed to a remote host.
#[derive(Clone, Debug)]
pub struct Bundle {
    id: String,
    document: String,
    scripts: Vec<BootScript>,
}

impl Bundle {
    /// Serialize the descriptor and pair it with the scripts. Every boot
    /// script a unit declares must be present in the provided set.
    #[instrument(level = Level::INFO, skip_all, err(Display))]
    pub fn assemble(descriptor: &Descriptor, scripts: Vec<BootScript>) -> Result<Self> {
        for unit in descriptor.units() {
            if let Some(reference) = unit.boot_script() {
                if !scripts.iter().any(|script| script.name() == reference) {
                    bail!(
                        "failed to assemble the bundle: the unit {:?} references the missing boot script {reference:?}",
                        unit.id(),
                    );
                }
            }
        }

        let document = ::serde_yaml::to_string(&descriptor.to_document())
            .map_err(|error| anyhow!("failed to serialize the descriptor document: {error}"))?;
        Ok(Self {
            id: descriptor.id().into(),
            document,
            scripts,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn scripts(&self) -> &[BootScript] {
        &self.scripts
    }

    pub fn document_file_name(&self) -> String {
        format!("{}_vnfd.yaml", self.id)
    }

    /// Lay the bundle out under the given base directory:
    /// `<id>/<id>_vnfd.yaml` plus `<id>/cloud-init/<script>` files.
    #[instrument(level = Level::INFO, skip_all, err(Display))]
    pub fn write(&self, base: &Path) -> Result<PathBuf> {
        let root = base.join(&self.id);
        fs::create_dir_all(&root)
            .map_err(|error| anyhow!("failed to create the bundle directory {root:?}: {error}"))?;

        let document = root.join(self.document_file_name());
        fs::write(&document, &self.document)
            .map_err(|error| anyhow!("failed to write the descriptor document {document:?}: {error}"))?;

        if !self.scripts.is_empty() {
            let scripts = root.join(SCRIPT_DIR);
            fs::create_dir_all(&scripts).map_err(|error| {
                anyhow!("failed to create the script directory {scripts:?}: {error}")
            })?;
            for script in &self.scripts {
                let path = scripts.join(script.name());
                fs::write(&path, script.content())
                    .map_err(|error| anyhow!("failed to write the script {path:?}: {error}"))?;
            }
        }
        Ok(root)
    }
}
