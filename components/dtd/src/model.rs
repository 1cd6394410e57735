//! The DTD model built from one `Dtd` event's raw content.

use std::collections::HashMap;

/// Particle occurrence indicator: `?`, `*`, `+`, or none.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Occurrence {
    One,
    Optional,
    ZeroOrMore,
    OneOrMore,
}

/// Either a sequence (`,`) or a choice (`|`) of particles, or a named
/// element, each optionally wrapped in an occurrence indicator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentParticle {
    Name(String, Occurrence),
    Seq(Vec<ContentParticle>, Occurrence),
    Choice(Vec<ContentParticle>, Occurrence),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ContentModel {
    Empty,
    Any,
    /// `(#PCDATA)` or `(#PCDATA | a | b)*`. An empty `names` means no
    /// element children are mixed in.
    Mixed(Vec<String>),
    Children(ContentParticle),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttType {
    CData,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    NmToken,
    NmTokens,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnumeratedType {
    Enumeration(Vec<String>),
    Notation(Vec<String>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttValueType {
    Plain(AttType),
    Enumerated(EnumeratedType),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttDefault {
    Required,
    Implied,
    Fixed(String),
    Default(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttributeDef {
    pub name: String,
    pub att_type: AttValueType,
    pub default: AttDefault,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalId {
    pub public_id: Option<String>,
    pub system_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EntityDef {
    Internal(String),
    External(ExternalId),
    /// External, unparsed (`NDATA notation-name`).
    Unparsed(ExternalId, String),
}

/// A parameter entity's definition: either an inline literal value (with
/// character references already expanded, per the PE processor's
/// definition-time expansion rule) or an external reference whose
/// replacement text is not known until the external resolver fetches it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamEntityDef {
    Internal(String),
    External(ExternalId),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotationDef {
    pub public_id: Option<String>,
    pub system_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DtdModel {
    pub root_element: Option<String>,
    pub elements: HashMap<String, ContentModel>,
    pub attributes: HashMap<String, Vec<AttributeDef>>,
    pub entities: HashMap<String, EntityDef>,
    pub param_entities: HashMap<String, ParamEntityDef>,
    pub notations: HashMap<String, NotationDef>,
}

impl DtdModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// First-declaration-wins: returns `false` (and does nothing) if
    /// `name` is already bound.
    pub fn declare_element(&mut self, name: String, model: ContentModel) -> bool {
        if self.elements.contains_key(&name) {
            return false;
        }
        self.elements.insert(name, model);
        true
    }

    /// ATTLIST declarations for the same element accumulate in source
    /// order, but a given attribute name within that element still obeys
    /// first-declaration-wins.
    pub fn declare_attribute(&mut self, element: &str, attr: AttributeDef) -> bool {
        let list = self.attributes.entry(element.to_string()).or_default();
        if list.iter().any(|a| a.name == attr.name) {
            return false;
        }
        list.push(attr);
        true
    }

    pub fn declare_entity(&mut self, name: String, def: EntityDef) -> bool {
        if self.entities.contains_key(&name) {
            return false;
        }
        self.entities.insert(name, def);
        true
    }

    pub fn declare_param_entity(&mut self, name: String, def: ParamEntityDef) -> bool {
        if self.param_entities.contains_key(&name) {
            return false;
        }
        self.param_entities.insert(name, def);
        true
    }

    /// The subset of `param_entities` usable by the internal PE
    /// expansion pass (`pe::expand`): only entries with an inline value
    /// contribute - an external PE whose content has not been fetched
    /// yet is simply absent, so `%name;` is left verbatim until the
    /// external resolver supplies it.
    pub fn internal_param_entity_values(&self) -> HashMap<String, String> {
        self.param_entities
            .iter()
            .filter_map(|(k, v)| match v {
                ParamEntityDef::Internal(s) => Some((k.clone(), s.clone())),
                ParamEntityDef::External(_) => None,
            })
            .collect()
    }

    pub fn declare_notation(&mut self, name: String, def: NotationDef) -> bool {
        if self.notations.contains_key(&name) {
            return false;
        }
        self.notations.insert(name, def);
        true
    }
}
