use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::errors::AppError;

/// The four fixed navigation groupings, in rendering order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SectionId {
    Documents,
    Departments,
    Operations,
    Admin,
}

impl SectionId {
    pub const ALL: [SectionId; 4] = [
        SectionId::Documents,
        SectionId::Departments,
        SectionId::Operations,
        SectionId::Admin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SectionId::Documents => "documents",
            SectionId::Departments => "departments",
            SectionId::Operations => "operations",
            SectionId::Admin => "admin",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "documents" => Ok(SectionId::Documents),
            "departments" => Ok(SectionId::Departments),
            "operations" => Ok(SectionId::Operations),
            "admin" => Ok(SectionId::Admin),
            other => Err(AppError::BadRequest(format!("Unknown section '{}'", other))),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredRole {
    #[default]
    None,
    Admin,
    SuperAdmin,
}

/// Static department definition supplied by configuration. Never mutated here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DepartmentDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub icon_ref: String,
    #[serde(default)]
    pub route: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub required_role: RequiredRole,
    #[serde(default)]
    pub required_feature: Option<String>,
    #[serde(default)]
    pub default_section: Option<SectionId>,
}

impl DepartmentDefinition {
    pub fn new(id: &str, name: &str) -> Self {
        DepartmentDefinition {
            id: id.to_string(),
            name: name.to_string(),
            description: None,
            icon_ref: id.to_string(),
            route: Some(format!("/{}", id)),
            color: None,
            required_role: RequiredRole::None,
            required_feature: None,
            default_section: None,
        }
    }
}
