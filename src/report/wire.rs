//! Wire representation of a WSJF report
//!
//! Field names follow the receiving service's schema exactly, including
//! its irregular capitalization (`startUTC`, `seqCall`, `totTime`, ...).
//! Absent optional fields are omitted rather than sent as `null`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::header::{AdditionalData, Asset, ErrorCode, MiscInfo, SubUnit, Uut};
use super::status::{MeasurementStatus, Status, StepStatus};
use super::step::{ChartType, StepGroup, StepType};

/// `dataType` of every chart series
pub const SERIES_DATA_TYPE: &str = "XYG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireReport {
    #[serde(rename = "type")]
    pub report_type: String,
    pub id: Uuid,
    pub pn: String,
    pub sn: String,
    pub rev: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub process_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_name: Option<String>,
    pub result: Status,
    pub machine_name: String,
    pub location: String,
    pub purpose: String,
    pub start: String,
    #[serde(rename = "startUTC", skip_serializing_if = "Option::is_none")]
    pub start_utc: Option<String>,
    pub root: WireStep,
    pub uut: Uut,
    #[serde(default)]
    pub misc_infos: Vec<MiscInfo>,
    #[serde(default)]
    pub sub_units: Vec<SubUnit>,
    #[serde(default)]
    pub additional_data: Vec<AdditionalData>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Any step of the tree, sequence calls included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStep {
    #[serde(default)]
    pub group: StepGroup,
    pub step_type: StepType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tot_time: Option<f64>,
    #[serde(rename = "causedUUTFailure", skip_serializing_if = "Option::is_none")]
    pub caused_uut_failure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_results: Vec<AdditionalData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seq_call: Option<WireSeqCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<WireStep>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric_meas: Option<Vec<WireNumericMeasurement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub string_meas: Option<Vec<WireStringMeasurement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boolean_meas: Option<Vec<WireBooleanMeasurement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<WireChart>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<WireAttachment>,
}

impl WireStep {
    /// A step with only the shared fields set
    pub(crate) fn bare(step_type: StepType, name: &str, status: StepStatus) -> Self {
        Self {
            group: StepGroup::Main,
            step_type,
            name: name.to_string(),
            start: None,
            status,
            error_code: None,
            error_message: None,
            tot_time: None,
            caused_uut_failure: None,
            report_text: None,
            additional_results: Vec::new(),
            seq_call: None,
            steps: None,
            numeric_meas: None,
            string_meas: None,
            boolean_meas: None,
            chart: None,
            attachment: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSeqCall {
    pub path: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNumericMeasurement {
    pub comp_op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: MeasurementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high_limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_limit: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStringMeasurement {
    pub comp_op: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: MeasurementStatus,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireBooleanMeasurement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: MeasurementStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireChart {
    pub chart_type: ChartType,
    pub label: String,
    pub x_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_unit: Option<String>,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_unit: Option<String>,
    #[serde(default)]
    pub series: Vec<WireSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSeries {
    pub data_type: String,
    pub name: String,
    pub xdata: String,
    pub ydata: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAttachment {
    pub name: String,
    pub content_type: String,
    /// Base64 encoded payload
    pub data: String,
}
