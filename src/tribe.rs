//! Template collections and their on-disk archive.
//!
//! A [`Tribe`] is an ordered set of templates. Archives are JSON documents
//! holding one or more templates; every template read back is re-validated
//! before it is handed out.

use crate::error::{MatchFilterError, Result};
use crate::template::construct::template_from_generated;
use crate::template::{ConstructParams, ConstructionMethod, Template, TemplateGenerator, group_templates};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Ordered collection of templates
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tribe {
    pub templates: Vec<Template>,
}

impl Tribe {
    pub fn new(templates: Vec<Template>) -> Self {
        Self { templates }
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn push(&mut self, template: Template) {
        self.templates.push(template);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Template> {
        self.templates.iter()
    }

    /// Find a template by name
    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates
            .iter()
            .find(|template| template.name.as_deref() == Some(name))
    }

    /// Partition into same-processing groups
    pub fn group(&self) -> Vec<Vec<Template>> {
        group_templates(&self.templates)
    }

    /// Write the whole collection to an archive
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        info!("Wrote {} templates to {}", self.len(), path.display());
        Ok(())
    }

    /// Read a collection from an archive, validating every template
    pub fn read(path: &Path) -> Result<Tribe> {
        let reader = BufReader::new(File::open(path)?);
        let tribe: Tribe = serde_json::from_reader(reader)?;
        for template in &tribe.templates {
            template.validate()?;
        }
        debug!("Read {} templates from {}", tribe.len(), path.display());
        Ok(tribe)
    }

    /// Construct templates with any method, naming them `<prefix>_<n>`
    pub fn construct(
        method: ConstructionMethod,
        name_prefix: &str,
        params: &ConstructParams,
        generator: &dyn TemplateGenerator,
    ) -> Result<Tribe> {
        let generated = generator.generate(method, params)?;
        if generated.is_empty() {
            return Err(MatchFilterError::Generation {
                reason: format!("{} produced no templates", method),
            });
        }

        let templates = generated
            .into_iter()
            .enumerate()
            .map(|(i, piece)| template_from_generated(&format!("{}_{}", name_prefix, i), params, piece))
            .collect::<Result<Vec<_>>>()?;

        info!("Constructed tribe of {} templates via {}", templates.len(), method);
        Ok(Tribe { templates })
    }
}

impl IntoIterator for Tribe {
    type Item = Template;
    type IntoIter = std::vec::IntoIter<Template>;

    fn into_iter(self) -> Self::IntoIter {
        self.templates.into_iter()
    }
}

impl From<Vec<Template>> for Tribe {
    fn from(templates: Vec<Template>) -> Self {
        Self { templates }
    }
}
