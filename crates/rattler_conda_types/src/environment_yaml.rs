//! Defines [`EnvironmentYaml`], a representation of an `environment.yaml` file.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserializer, Serializer,
};

use crate::{MatchSpec, UnresolvedChannel};

/// A representation of an `environment.yaml` file.
#[derive(Default, Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct EnvironmentYaml {
    /// The preferred name for the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// The preferred path to the environment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<PathBuf>,

    /// A list of channels that are used to resolve dependencies.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<UnresolvedChannel>,

    /// A list of matchspecs that are required for the environment, or a
    /// subsection of specs for another package manager.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<MatchSpecOrSubSection>,

    /// An optional map of variables to be dumped into the `conda-meta/state`
    /// file of the target environment. Keys are always emitted lowercase.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, String>,
}

/// A matchspec or a subsection, as part of the `dependencies` section of an
/// `environment.yaml` file.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchSpecOrSubSection {
    /// A conda package match spec.
    MatchSpec(MatchSpec),
    /// A list of specs for another package manager (e.g. `pip`).
    SubSection(String, Vec<String>),
}

impl MatchSpecOrSubSection {
    /// Returns the matchspec if this is a matchspec, or `None` otherwise.
    pub fn as_match_spec(&self) -> Option<&MatchSpec> {
        match self {
            MatchSpecOrSubSection::MatchSpec(s) => Some(s),
            MatchSpecOrSubSection::SubSection(_, _) => None,
        }
    }

    /// Returns the subsection if this is a subsection, or `None` otherwise.
    pub fn as_sub_section(&self) -> Option<(&String, &Vec<String>)> {
        match self {
            MatchSpecOrSubSection::MatchSpec(_) => None,
            MatchSpecOrSubSection::SubSection(key, specs) => Some((key, specs)),
        }
    }
}

impl EnvironmentYaml {
    /// Returns all the matchspecs in the `dependencies` section of the file.
    pub fn match_specs(&self) -> impl DoubleEndedIterator<Item = &'_ MatchSpec> + '_ {
        self.dependencies
            .iter()
            .filter_map(MatchSpecOrSubSection::as_match_spec)
    }

    /// Returns the subsection with the given name, or `None` if no such
    /// subsection exists.
    pub fn find_sub_section(&self, name: &str) -> Option<&[String]> {
        self.dependencies
            .iter()
            .filter_map(MatchSpecOrSubSection::as_sub_section)
            .find_map(|(subsection_name, specs)| {
                (subsection_name == name).then_some(specs.as_slice())
            })
    }

    /// Returns the `pip` subsection.
    pub fn pip_specs(&self) -> Option<&[String]> {
        self.find_sub_section("pip")
    }

    /// Ensures `pip` is present in the top-level dependencies whenever a
    /// `pip:` subsection exists.
    pub fn ensure_pip_dependency(&mut self) {
        if self.pip_specs().is_none() {
            return;
        }
        let already_present = self
            .match_specs()
            .any(|spec| spec.name.as_exact().is_some_and(|n| n.as_normalized() == "pip"));
        if !already_present {
            if let Ok(pip_spec) = "pip".parse::<MatchSpec>() {
                self.dependencies
                    .insert(0, MatchSpecOrSubSection::MatchSpec(pip_spec));
            }
        }
    }

    /// Reads the contents of a file at the given path and parses it as an
    /// `environment.yaml` file.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Reads the contents of a string and parses it as an `environment.yaml`.
    pub fn from_yaml_str(contents: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(contents)
    }

    /// Writes the contents of this `environment.yaml` file to the given path.
    pub fn to_path(&self, path: &Path) -> std::io::Result<()> {
        std::fs::write(path, self.to_yaml_string())
    }

    /// Converts the contents of this `environment.yaml` file to a string.
    pub fn to_yaml_string(&self) -> String {
        serde_yaml::to_string(&self).expect("failed to serialize to a string")
    }

    /// Builds an [`EnvironmentYaml`] from a prefix's state, lowercasing
    /// variable keys as required by the on-disk format.
    pub fn with_variables(mut self, variables: impl IntoIterator<Item = (String, String)>) -> Self {
        self.variables = variables
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self
    }
}

impl<'a> serde::Deserialize<'a> for MatchSpecOrSubSection {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'a>,
    {
        serde_untagged::UntaggedEnumVisitor::new()
            .string(|v| {
                Ok(MatchSpecOrSubSection::MatchSpec(
                    v.parse().map_err(serde_untagged::de::Error::custom)?,
                ))
            })
            .map(|v| {
                struct SubSectionVisitor;

                impl<'a> Visitor<'a> for SubSectionVisitor {
                    type Value = MatchSpecOrSubSection;

                    fn expecting(
                        &self,
                        formatter: &mut std::fmt::Formatter<'_>,
                    ) -> std::fmt::Result {
                        formatter.write_str("a map with a single entry")
                    }

                    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
                    where
                        A: MapAccess<'a>,
                    {
                        let (key, value) = map
                            .next_entry()?
                            .ok_or_else(|| serde::de::Error::custom("expected a map entry"))?;
                        if map.next_key::<String>()?.is_some() {
                            return Err(serde::de::Error::custom(
                                "expected a map with a single entry",
                            ));
                        }
                        Ok(MatchSpecOrSubSection::SubSection(key, value))
                    }
                }

                SubSectionVisitor.visit_map(v)
            })
            .deserialize(deserializer)
    }
}

impl serde::Serialize for MatchSpecOrSubSection {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            MatchSpecOrSubSection::MatchSpec(spec) => spec.to_string().serialize(serializer),
            MatchSpecOrSubSection::SubSection(key, value) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(key, value)?;
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
name: my-env
channels:
  - conda-forge
  - nvidia
dependencies:
  - python=3.11
  - numpy>=1.20
  - pip:
      - requests==2.28.2
variables:
  MY_VAR: hello
";

    #[test]
    fn test_deserialize_environment_yaml() {
        let env = EnvironmentYaml::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(env.name.as_deref(), Some("my-env"));
        assert_eq!(env.channels.len(), 2);
        assert_eq!(env.match_specs().count(), 2);
        assert_eq!(env.pip_specs(), Some(&["requests==2.28.2".to_string()][..]));
    }

    #[test]
    fn test_roundtrip_preserves_sections() {
        let env = EnvironmentYaml::from_yaml_str(SAMPLE).unwrap();
        let yaml = env.to_yaml_string();
        let reparsed = EnvironmentYaml::from_yaml_str(&yaml).unwrap();
        assert_eq!(env, reparsed);
    }

    #[test]
    fn test_ensure_pip_dependency_inserts_pip() {
        let mut env = EnvironmentYaml::from_yaml_str(SAMPLE).unwrap();
        env.ensure_pip_dependency();
        assert!(env
            .match_specs()
            .any(|spec| spec.name.as_exact().unwrap().as_normalized() == "pip"));
    }

    #[test]
    fn test_variables_lowercased() {
        let env = EnvironmentYaml::default()
            .with_variables([("MY_VAR".to_string(), "1".to_string())]);
        assert!(env.variables.contains_key("my_var"));
    }
}
