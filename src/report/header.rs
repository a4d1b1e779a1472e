//! Report header records
//!
//! These records have no behaviour beyond validation, so they carry the
//! wire field names directly.

use serde::{Deserialize, Serialize};

use crate::common::error::{limit, require};
use crate::common::{Error, Result};

/// Longest `uut.comment` the service accepts, in characters
pub const MAX_COMMENT: usize = 5000;

/// Error code attached to a step or to the unit; the service accepts either form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        Self::Number(code)
    }
}

impl From<&str> for ErrorCode {
    fn from(code: &str) -> Self {
        Self::Text(code.to_string())
    }
}

/// The `uut` header block of a test report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Uut {
    /// Operator who ran the test
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_socket_index: Option<i64>,
    #[serde(rename = "batchSN", skip_serializing_if = "Option::is_none")]
    pub batch_sn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fixture_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_fail_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_loop_index: Option<i64>,
}

impl Uut {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            ..Default::default()
        }
    }
}

/// Free-form key/value information shown with the report header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiscInfo {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub typedef: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<i64>,
}

impl MiscInfo {
    pub fn new(description: &str, text: Option<&str>, numeric: Option<i64>) -> Result<Self> {
        require("miscInfo.description", description, 100)?;
        if let Some(text) = text {
            limit("miscInfo.text", text, 100)?;
        }
        Ok(Self {
            description: description.to_string(),
            typedef: None,
            text: text.map(str::to_string),
            numeric,
        })
    }
}

/// A component mounted in the unit under test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubUnit {
    pub part_type: String,
    pub pn: String,
    pub rev: String,
    pub sn: String,
}

impl SubUnit {
    pub fn new(part_type: &str, part_number: &str, revision: &str, serial_number: &str) -> Result<Self> {
        require("subUnit.partType", part_type, 50)?;
        require("subUnit.pn", part_number, 100)?;
        limit("subUnit.rev", revision, 100)?;
        require("subUnit.sn", serial_number, 100)?;
        Ok(Self {
            part_type: part_type.to_string(),
            pn: part_number.to_string(),
            rev: revision.to_string(),
            sn: serial_number.to_string(),
        })
    }
}

/// Test equipment used during the test
///
/// The asset must already exist in the service's asset manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    #[serde(rename = "assetSN")]
    pub asset_sn: String,
    pub usage_count: i64,
}

impl Asset {
    pub fn new(asset_sn: &str, usage_count: i64) -> Result<Self> {
        require("asset.assetSN", asset_sn, 100)?;
        Ok(Self {
            asset_sn: asset_sn.to_string(),
            usage_count,
        })
    }
}

/// Type tag of an additional data property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyType {
    Number,
    String,
    Bool,
    Obj,
    Array,
}

/// A named group of typed properties, attached to the report or a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalData {
    pub name: String,
    #[serde(default)]
    pub props: Vec<AdditionalDataProperty>,
}

impl AdditionalData {
    pub fn new(name: &str) -> Result<Self> {
        require("additionalData.name", name, 200)?;
        Ok(Self {
            name: name.to_string(),
            props: Vec::new(),
        })
    }

    /// Add a property and return it so nested `Obj` properties can be filled
    pub fn add_property(
        &mut self,
        name: &str,
        kind: PropertyType,
        value: Option<&str>,
    ) -> Result<&mut AdditionalDataProperty> {
        let index = self.props.len();
        self.props.push(AdditionalDataProperty::new(name, kind, value)?);
        Ok(&mut self.props[index])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalDataProperty {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub props: Vec<AdditionalDataProperty>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array: Option<AdditionalDataArray>,
}

impl AdditionalDataProperty {
    pub fn new(name: &str, kind: PropertyType, value: Option<&str>) -> Result<Self> {
        require("additionalData.props.name", name, 200)?;
        Ok(Self {
            name: Some(name.to_string()),
            kind,
            flags: None,
            value: value.map(str::to_string),
            comment: None,
            props: Vec::new(),
            array: None,
        })
    }

    /// Unnamed property used as the value of an array element
    pub fn element(kind: PropertyType, value: Option<&str>) -> Self {
        Self {
            name: None,
            kind,
            flags: None,
            value: value.map(str::to_string),
            comment: None,
            props: Vec::new(),
            array: None,
        }
    }

    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn add_property(
        &mut self,
        name: &str,
        kind: PropertyType,
        value: Option<&str>,
    ) -> Result<&mut AdditionalDataProperty> {
        let index = self.props.len();
        self.props.push(AdditionalDataProperty::new(name, kind, value)?);
        Ok(&mut self.props[index])
    }

    /// Turn an `Array` property into an array of `dimension` dimensions
    /// holding values of type `kind`
    pub fn set_array(&mut self, dimension: usize, kind: PropertyType) -> Result<&mut AdditionalDataArray> {
        if self.kind != PropertyType::Array {
            return Err(Error::Validation(format!(
                "additionalData.props.array: property type is {:?}, not Array",
                self.kind
            )));
        }
        if dimension == 0 {
            return Err(Error::Validation(
                "additionalData.props.array.dimension must be at least 1".to_string(),
            ));
        }
        Ok(self.array.insert(AdditionalDataArray {
            dimension,
            kind,
            indexes: Vec::new(),
        }))
    }
}

/// Array payload of an `Array` property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalDataArray {
    pub dimension: usize,
    #[serde(rename = "type")]
    pub kind: PropertyType,
    #[serde(default)]
    pub indexes: Vec<AdditionalDataArrayIndex>,
}

impl AdditionalDataArray {
    /// Add one element; `indexes` holds one position per dimension
    pub fn add_index(
        &mut self,
        text: &str,
        indexes: &[i64],
        value: AdditionalDataProperty,
    ) -> Result<&mut AdditionalDataArrayIndex> {
        if indexes.len() != self.dimension {
            return Err(Error::Validation(format!(
                "additionalData.props.array.indexes: {} positions for a {}-dimensional array",
                indexes.len(),
                self.dimension
            )));
        }
        if value.kind != self.kind {
            return Err(Error::Validation(format!(
                "additionalData.props.array: {:?} element in a {:?} array",
                value.kind, self.kind
            )));
        }
        let index = self.indexes.len();
        self.indexes.push(AdditionalDataArrayIndex {
            text: text.to_string(),
            indexes: indexes.to_vec(),
            value,
        });
        Ok(&mut self.indexes[index])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditionalDataArrayIndex {
    /// The position as text, e.g. `[0,1]`
    pub text: String,
    pub indexes: Vec<i64>,
    pub value: AdditionalDataProperty,
}
