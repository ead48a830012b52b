//! Resource instance and provider configuration addresses.
//!
//! Addresses render and parse in the familiar dotted syntax:
//! `module.net["a"].aws_instance.web[1]`, `data.aws_ami.ubuntu`,
//! `provider["registry.terraform.io/hashicorp/aws"].east`.

use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_REGISTRY_HOST: &str = "registry.terraform.io";
pub const DEFAULT_NAMESPACE: &str = "hashicorp";

/// Whether a resource is managed by the walk or only read from outside.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceMode {
    Managed,
    Data,
}

/// Key selecting one instance of a multi-instance resource or module.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum InstanceKey {
    #[default]
    NoKey,
    Int(i64),
    Str(String),
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoKey => Ok(()),
            Self::Int(i) => write!(f, "[{}]", i),
            Self::Str(s) => {
                f.write_str("[\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"]")
            }
        }
    }
}

#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ModuleInstanceStep {
    pub name: String,
    pub key: InstanceKey,
}

/// Path from the root module to one module instance. Empty is the root.
#[derive(Clone, Debug, Default, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ModuleInstance(pub Vec<ModuleInstanceStep>);

impl ModuleInstance {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn child(&self, name: impl Into<String>, key: InstanceKey) -> Self {
        let mut steps = self.0.clone();
        steps.push(ModuleInstanceStep {
            name: name.into(),
            key,
        });
        Self(steps)
    }
}

impl fmt::Display for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "module.{}{}", step.name, step.key)?;
        }
        Ok(())
    }
}

/// A resource block within a module, independent of instance key.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct Resource {
    pub mode: ResourceMode,
    pub type_name: String,
    pub name: String,
}

impl Resource {
    pub fn managed(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Managed,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    pub fn data(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            mode: ResourceMode::Data,
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// The provider a resource type belongs to when nothing is configured:
    /// everything up to the first underscore, in the default namespace.
    pub fn implied_provider(&self) -> String {
        let local = self
            .type_name
            .split_once('_')
            .map(|(prefix, _)| prefix)
            .unwrap_or(&self.type_name);
        normalize_provider_source(local)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            ResourceMode::Managed => write!(f, "{}.{}", self.type_name, self.name),
            ResourceMode::Data => write!(f, "data.{}.{}", self.type_name, self.name),
        }
    }
}

/// Unique coordinate of one tracked object. Cheap to clone, hashable.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct ResourceInstanceAddress {
    pub module: ModuleInstance,
    pub resource: Resource,
    pub key: InstanceKey,
}

impl ResourceInstanceAddress {
    pub fn new(module: ModuleInstance, resource: Resource, key: InstanceKey) -> Self {
        Self {
            module,
            resource,
            key,
        }
    }

    /// Shorthand for an unkeyed instance in the root module.
    pub fn root(resource: Resource) -> Self {
        Self::new(ModuleInstance::root(), resource, InstanceKey::NoKey)
    }

    pub fn with_key(mut self, key: InstanceKey) -> Self {
        self.key = key;
        self
    }

    pub fn mode(&self) -> ResourceMode {
        self.resource.mode
    }

    pub fn is_data(&self) -> bool {
        self.resource.mode == ResourceMode::Data
    }
}

impl fmt::Display for ResourceInstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        write!(f, "{}{}", self.resource, self.key)
    }
}

impl FromStr for ResourceInstanceAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = AddrParser::new(s);
        let module = p.module_path()?;
        let mode = if p.eat("data.") {
            ResourceMode::Data
        } else {
            ResourceMode::Managed
        };
        let type_name = p.ident()?.to_string();
        p.expect(".")?;
        let name = p.ident()?.to_string();
        let key = p.key()?;
        p.finish()?;
        Ok(Self {
            module,
            resource: Resource {
                mode,
                type_name,
                name,
            },
            key,
        })
    }
}

/// Fully qualified provider configuration: the module it lives in, the
/// provider source address, and an optional alias.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct AbsProviderConfig {
    pub module: ModuleInstance,
    pub source: String,
    pub alias: Option<String>,
}

impl AbsProviderConfig {
    /// Root-module, unaliased configuration for `source`. Short sources like
    /// `aws` or `hashicorp/aws` are normalized onto the default registry.
    pub fn new(source: &str) -> Self {
        Self {
            module: ModuleInstance::root(),
            source: normalize_provider_source(source),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn in_module(mut self, module: ModuleInstance) -> Self {
        self.module = module;
        self
    }

    /// Provider type name, the last segment of the source.
    pub fn type_name(&self) -> &str {
        self.source.rsplit('/').next().unwrap_or(&self.source)
    }
}

impl fmt::Display for AbsProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.module.is_root() {
            write!(f, "{}.", self.module)?;
        }
        write!(f, "provider[\"{}\"]", self.source)?;
        if let Some(alias) = &self.alias {
            write!(f, ".{}", alias)?;
        }
        Ok(())
    }
}

impl FromStr for AbsProviderConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut p = AddrParser::new(s);
        let module = p.module_path()?;
        p.expect("provider")?;
        let source = match p.key()? {
            InstanceKey::Str(source) if !source.is_empty() => source,
            _ => return Err(p.error("expected quoted provider source")),
        };
        let alias = if p.eat(".") {
            Some(p.ident()?.to_string())
        } else {
            None
        };
        p.finish()?;
        Ok(Self {
            module,
            source: normalize_provider_source(&source),
            alias,
        })
    }
}

/// Expand `aws` and `hashicorp/aws` to `registry.terraform.io/hashicorp/aws`.
pub fn normalize_provider_source(source: &str) -> String {
    let parts: Vec<&str> = source.split('/').collect();
    match parts.as_slice() {
        [name] => format!("{}/{}/{}", DEFAULT_REGISTRY_HOST, DEFAULT_NAMESPACE, name),
        [ns, name] => format!("{}/{}/{}", DEFAULT_REGISTRY_HOST, ns, name),
        _ => source.to_string(),
    }
}

struct AddrParser<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> AddrParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, rest: input }
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::invalid_address(self.input, reason)
    }

    fn eat(&mut self, token: &str) -> bool {
        match self.rest.strip_prefix(token) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!("expected {:?} at {:?}", token, self.rest)))
        }
    }

    fn ident(&mut self) -> Result<&'a str> {
        let end = self
            .rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error(format!("expected identifier at {:?}", self.rest)));
        }
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(ident)
    }

    fn key(&mut self) -> Result<InstanceKey> {
        if !self.eat("[") {
            return Ok(InstanceKey::NoKey);
        }
        if self.eat("\"") {
            let mut out = String::new();
            let rest = self.rest;
            let mut chars = rest.char_indices();
            loop {
                match chars.next() {
                    Some((_, '\\')) => match chars.next() {
                        Some((_, c)) => out.push(c),
                        None => return Err(self.error("unterminated escape")),
                    },
                    Some((i, '"')) => {
                        self.rest = &rest[i + 1..];
                        break;
                    }
                    Some((_, c)) => out.push(c),
                    None => return Err(self.error("unterminated string key")),
                }
            }
            self.expect("]")?;
            return Ok(InstanceKey::Str(out));
        }
        let end = self
            .rest
            .find(']')
            .ok_or_else(|| self.error("unterminated index"))?;
        let index = self.rest[..end]
            .parse::<i64>()
            .map_err(|e| self.error(format!("bad index: {}", e)))?;
        self.rest = &self.rest[end + 1..];
        Ok(InstanceKey::Int(index))
    }

    fn module_path(&mut self) -> Result<ModuleInstance> {
        let mut module = ModuleInstance::root();
        while self.eat("module.") {
            let name = self.ident()?.to_string();
            let key = self.key()?;
            self.expect(".")?;
            module.0.push(ModuleInstanceStep { name, key });
        }
        Ok(module)
    }

    fn finish(&self) -> Result<()> {
        if self.rest.is_empty() {
            Ok(())
        } else {
            Err(self.error(format!("unexpected trailing {:?}", self.rest)))
        }
    }
}

macro_rules! serde_via_string {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

serde_via_string!(ResourceInstanceAddress);
serde_via_string!(AbsProviderConfig);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_nested_module_address() {
        let addr: ResourceInstanceAddress = r#"module.net["a.b"].module.sub[2].aws_instance.web[1]"#
            .parse()
            .unwrap();
        assert_eq!(addr.module.0.len(), 2);
        assert_eq!(addr.module.0[0].key, InstanceKey::Str("a.b".into()));
        assert_eq!(addr.module.0[1].key, InstanceKey::Int(2));
        assert_eq!(addr.resource.type_name, "aws_instance");
        assert_eq!(addr.key, InstanceKey::Int(1));
        assert_eq!(
            addr.to_string(),
            r#"module.net["a.b"].module.sub[2].aws_instance.web[1]"#
        );
    }

    #[test]
    fn parse_data_address() {
        let addr: ResourceInstanceAddress = "data.aws_ami.ubuntu".parse().unwrap();
        assert!(addr.is_data());
        assert_eq!(addr.to_string(), "data.aws_ami.ubuntu");
    }

    #[test]
    fn escaped_string_key() {
        let addr = ResourceInstanceAddress::root(Resource::managed("null_resource", "x"))
            .with_key(InstanceKey::Str("say \"hi\"".into()));
        let rendered = addr.to_string();
        assert_eq!(rendered, r#"null_resource.x["say \"hi\""]"#);
        assert_eq!(rendered.parse::<ResourceInstanceAddress>().unwrap(), addr);
    }

    #[test]
    fn rejects_garbage() {
        assert!("aws_instance".parse::<ResourceInstanceAddress>().is_err());
        assert!("aws_instance.web[".parse::<ResourceInstanceAddress>().is_err());
        assert!("aws_instance.web extra".parse::<ResourceInstanceAddress>().is_err());
    }

    #[test]
    fn provider_config_roundtrip() {
        let p: AbsProviderConfig = r#"module.net.provider["hashicorp/aws"].east"#.parse().unwrap();
        assert_eq!(p.source, "registry.terraform.io/hashicorp/aws");
        assert_eq!(p.alias.as_deref(), Some("east"));
        assert_eq!(p.type_name(), "aws");
        assert_eq!(
            p.to_string(),
            r#"module.net.provider["registry.terraform.io/hashicorp/aws"].east"#
        );
    }

    #[test]
    fn implied_provider_from_type() {
        assert_eq!(
            Resource::managed("aws_instance", "web").implied_provider(),
            "registry.terraform.io/hashicorp/aws"
        );
        assert_eq!(
            Resource::data("random", "x").implied_provider(),
            "registry.terraform.io/hashicorp/random"
        );
    }
}
