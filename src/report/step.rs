//! Leaf steps and their payloads
//!
//! A step is a tagged union over the five payload kinds. Its status is
//! evaluated from the payload unless an outcome was forced on it.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::header::{AdditionalData, ErrorCode};
use super::measurement::{BooleanMeasurement, Measurement, NumericMeasurement, StringMeasurement};
use super::status::{MeasurementStatus, StepStatus};
use crate::common::error::{limit, require};
use crate::common::{Error, Result};

/// Most measurements a multiple-measurement step may hold
pub const MAX_MEASUREMENTS: usize = 10;
/// Most series a chart may hold
pub const MAX_SERIES: usize = 10;
/// Longest joined `xdata`/`ydata` string of a chart series
pub const MAX_SERIES_DATA: usize = 10_000;

/// Measurements held by a limit step
///
/// A single set holds exactly one unnamed measurement. A multiple set holds
/// up to ten uniquely named measurements and may be filled after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementSet<M> {
    multiple: bool,
    items: Vec<M>,
}

pub type NumericLimit = MeasurementSet<NumericMeasurement>;
pub type StringValue = MeasurementSet<StringMeasurement>;
pub type PassFail = MeasurementSet<BooleanMeasurement>;

impl<M: Measurement> MeasurementSet<M> {
    pub fn single(measurement: M) -> Result<Self> {
        if measurement.name().is_some() {
            return Err(Error::Validation(
                "measurements of a single-measurement step cannot be named".to_string(),
            ));
        }
        Ok(Self {
            multiple: false,
            items: vec![measurement],
        })
    }

    pub fn multiple(measurements: Vec<M>) -> Result<Self> {
        let mut set = Self::empty_multiple();
        for measurement in measurements {
            set.push(measurement)?;
        }
        Ok(set)
    }

    pub fn empty_multiple() -> Self {
        Self {
            multiple: true,
            items: Vec::new(),
        }
    }

    /// Add a measurement to a multiple set
    pub fn push(&mut self, measurement: M) -> Result<()> {
        if !self.multiple {
            return Err(Error::Validation(
                "a single-measurement step holds exactly one measurement".to_string(),
            ));
        }
        if self.items.len() >= MAX_MEASUREMENTS {
            return Err(Error::Validation(format!(
                "a multiple-measurement step holds at most {} measurements",
                MAX_MEASUREMENTS
            )));
        }
        let name = measurement
            .name()
            .ok_or_else(|| Error::missing_field("measurement.name"))?;
        require("measurement.name", name, 100)?;
        if self.items.iter().any(|m| m.name() == Some(name)) {
            return Err(Error::Validation(format!(
                "measurement name `{}` already exists in the step",
                name
            )));
        }
        self.items.push(measurement);
        Ok(())
    }

    pub fn is_multiple(&self) -> bool {
        self.multiple
    }

    pub fn items(&self) -> &[M] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Failed if any measurement failed, Skipped if every measurement was skipped
    pub fn status(&self) -> StepStatus {
        let statuses: Vec<MeasurementStatus> = self.items.iter().map(Measurement::status).collect();
        if statuses.contains(&MeasurementStatus::Failed) {
            StepStatus::Failed
        } else if !statuses.is_empty() && statuses.iter().all(|s| *s == MeasurementStatus::Skipped) {
            StepStatus::Skipped
        } else {
            StepStatus::Passed
        }
    }
}

/// A file attached to a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    name: String,
    content_type: String,
    data: Vec<u8>,
}

impl Attachment {
    pub fn new(name: &str, content_type: &str, data: Vec<u8>) -> Result<Self> {
        require("attachment.name", name, 100)?;
        require("attachment.contentType", content_type, 100)?;
        if data.is_empty() {
            return Err(Error::missing_field("attachment.data"));
        }
        Ok(Self {
            name: name.to_string(),
            content_type: content_type.to_string(),
            data,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChartType {
    #[default]
    #[serde(rename = "LINE")]
    Line,
    #[serde(rename = "LineLogXY")]
    LineLogXY,
    #[serde(rename = "LineLogX")]
    LineLogX,
    #[serde(rename = "LineLogY")]
    LineLogY,
}

/// A named series of (x, y) points
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSeries {
    name: String,
    points: Vec<(f64, f64)>,
}

impl ChartSeries {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    /// x values joined with `;`
    pub fn xdata(&self) -> String {
        join(self.points.iter().map(|(x, _)| *x))
    }

    /// y values joined with `;`
    pub fn ydata(&self) -> String {
        join(self.points.iter().map(|(_, y)| *y))
    }
}

fn join(values: impl Iterator<Item = f64>) -> String {
    values.map(|v| v.to_string()).collect::<Vec<_>>().join(";")
}

#[derive(Debug, Clone, PartialEq)]
pub struct Chart {
    chart_type: ChartType,
    label: String,
    x_label: String,
    y_label: String,
    x_unit: Option<String>,
    y_unit: Option<String>,
    series: Vec<ChartSeries>,
}

impl Chart {
    pub fn new(chart_type: ChartType, label: &str, x_label: &str, y_label: &str) -> Result<Self> {
        require("chart.label", label, 100)?;
        require("chart.xLabel", x_label, 50)?;
        require("chart.yLabel", y_label, 50)?;
        Ok(Self {
            chart_type,
            label: label.to_string(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            x_unit: None,
            y_unit: None,
            series: Vec::new(),
        })
    }

    pub fn with_units(mut self, x_unit: Option<&str>, y_unit: Option<&str>) -> Result<Self> {
        if let Some(unit) = x_unit {
            limit("chart.xUnit", unit, 20)?;
        }
        if let Some(unit) = y_unit {
            limit("chart.yUnit", unit, 20)?;
        }
        self.x_unit = x_unit.map(str::to_string);
        self.y_unit = y_unit.map(str::to_string);
        Ok(self)
    }

    pub fn add_series(&mut self, name: &str, points: Vec<(f64, f64)>) -> Result<()> {
        if self.series.len() >= MAX_SERIES {
            return Err(Error::Validation(format!(
                "a chart holds at most {} series",
                MAX_SERIES
            )));
        }
        require("chart.series.name", name, 100)?;
        if points.is_empty() {
            return Err(Error::missing_field("chart.series.ydata"));
        }
        let series = ChartSeries {
            name: name.to_string(),
            points,
        };
        limit("chart.series.xdata", &series.xdata(), MAX_SERIES_DATA)?;
        limit("chart.series.ydata", &series.ydata(), MAX_SERIES_DATA)?;
        self.series.push(series);
        Ok(())
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    pub fn x_unit(&self) -> Option<&str> {
        self.x_unit.as_deref()
    }

    pub fn y_unit(&self) -> Option<&str> {
        self.y_unit.as_deref()
    }

    pub fn series(&self) -> &[ChartSeries] {
        &self.series
    }
}

/// Payload of a leaf step
#[derive(Debug, Clone, PartialEq)]
pub enum StepKind {
    NumericLimit(NumericLimit),
    StringValue(StringValue),
    PassFail(PassFail),
    Attachment(Attachment),
    Chart(Chart),
}

impl StepKind {
    pub fn step_type(&self) -> StepType {
        match self {
            Self::NumericLimit(set) if set.is_multiple() => StepType::NumericLimitMultiple,
            Self::NumericLimit(_) => StepType::NumericLimitSingle,
            Self::StringValue(set) if set.is_multiple() => StepType::StringValueMultiple,
            Self::StringValue(_) => StepType::StringValueSingle,
            Self::PassFail(set) if set.is_multiple() => StepType::PassFailMultiple,
            Self::PassFail(_) => StepType::PassFailSingle,
            Self::Attachment(_) => StepType::Attachment,
            Self::Chart(_) => StepType::Chart,
        }
    }

    fn status(&self) -> StepStatus {
        match self {
            Self::NumericLimit(set) => set.status(),
            Self::StringValue(set) => set.status(),
            Self::PassFail(set) => set.status(),
            Self::Attachment(_) | Self::Chart(_) => StepStatus::Passed,
        }
    }
}

/// The `stepType` discriminator on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepType {
    #[serde(rename = "SequenceCall")]
    SequenceCall,
    #[serde(rename = "ET_NLT")]
    NumericLimitSingle,
    #[serde(rename = "ET_MNLT")]
    NumericLimitMultiple,
    #[serde(rename = "ET_SVT")]
    StringValueSingle,
    #[serde(rename = "ET_MSVT")]
    StringValueMultiple,
    #[serde(rename = "ET_PFT")]
    PassFailSingle,
    #[serde(rename = "ET_MPFT")]
    PassFailMultiple,
    #[serde(rename = "Chart")]
    Chart,
    #[serde(rename = "Attachment")]
    Attachment,
}

impl StepType {
    pub fn code(self) -> &'static str {
        match self {
            Self::SequenceCall => "SequenceCall",
            Self::NumericLimitSingle => "ET_NLT",
            Self::NumericLimitMultiple => "ET_MNLT",
            Self::StringValueSingle => "ET_SVT",
            Self::StringValueMultiple => "ET_MSVT",
            Self::PassFailSingle => "ET_PFT",
            Self::PassFailMultiple => "ET_MPFT",
            Self::Chart => "Chart",
            Self::Attachment => "Attachment",
        }
    }

    pub fn is_multiple(self) -> bool {
        matches!(
            self,
            Self::NumericLimitMultiple | Self::StringValueMultiple | Self::PassFailMultiple
        )
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Step group: setup, main or cleanup
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepGroup {
    #[serde(rename = "S")]
    Setup,
    #[default]
    #[serde(rename = "M")]
    Main,
    #[serde(rename = "C")]
    Cleanup,
}

/// An outcome recorded on a step regardless of its measurements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcedOutcome {
    Done,
    Error,
    Terminated,
    Skipped,
}

impl From<ForcedOutcome> for StepStatus {
    fn from(outcome: ForcedOutcome) -> Self {
        match outcome {
            ForcedOutcome::Done => StepStatus::Done,
            ForcedOutcome::Error => StepStatus::Error,
            ForcedOutcome::Terminated => StepStatus::Terminated,
            ForcedOutcome::Skipped => StepStatus::Skipped,
        }
    }
}

impl ForcedOutcome {
    pub(crate) fn from_status(status: StepStatus) -> Option<Self> {
        match status {
            StepStatus::Done => Some(Self::Done),
            StepStatus::Error => Some(Self::Error),
            StepStatus::Terminated => Some(Self::Terminated),
            StepStatus::Skipped => Some(Self::Skipped),
            StepStatus::Passed | StepStatus::Failed => None,
        }
    }
}

/// A single test step
#[derive(Debug, Clone)]
pub struct Step {
    name: String,
    group: StepGroup,
    pub(crate) kind: StepKind,
    forced: Option<ForcedOutcome>,
    error_code: Option<ErrorCode>,
    error_message: Option<String>,
    report_text: Option<String>,
    total_time: Option<f64>,
    start: Option<DateTime<FixedOffset>>,
    additional_results: Vec<AdditionalData>,
}

// A forced outcome equal to what the measurements already give leaves no
// trace on the wire, so steps compare by resulting status instead.
impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.group == other.group
            && self.kind == other.kind
            && self.status() == other.status()
            && self.error_code == other.error_code
            && self.error_message == other.error_message
            && self.report_text == other.report_text
            && self.total_time == other.total_time
            && self.start == other.start
            && self.additional_results == other.additional_results
    }
}

impl Step {
    pub fn new(name: &str, kind: StepKind) -> Result<Self> {
        require("step.name", name, 100)?;
        Ok(Self {
            name: name.to_string(),
            group: StepGroup::Main,
            kind,
            forced: None,
            error_code: None,
            error_message: None,
            report_text: None,
            total_time: None,
            start: None,
            additional_results: Vec::new(),
        })
    }

    /// Single numeric limit step
    pub fn numeric(name: &str, measurement: NumericMeasurement) -> Result<Self> {
        Self::new(name, StepKind::NumericLimit(MeasurementSet::single(measurement)?))
    }

    pub fn numeric_multiple(name: &str, measurements: Vec<NumericMeasurement>) -> Result<Self> {
        Self::new(name, StepKind::NumericLimit(MeasurementSet::multiple(measurements)?))
    }

    /// Single string value step
    pub fn string(name: &str, measurement: StringMeasurement) -> Result<Self> {
        Self::new(name, StepKind::StringValue(MeasurementSet::single(measurement)?))
    }

    pub fn string_multiple(name: &str, measurements: Vec<StringMeasurement>) -> Result<Self> {
        Self::new(name, StepKind::StringValue(MeasurementSet::multiple(measurements)?))
    }

    /// Single pass/fail step
    pub fn pass_fail(name: &str, passed: bool) -> Result<Self> {
        Self::new(
            name,
            StepKind::PassFail(MeasurementSet::single(BooleanMeasurement::new(passed))?),
        )
    }

    pub fn pass_fail_multiple(name: &str, measurements: Vec<BooleanMeasurement>) -> Result<Self> {
        Self::new(name, StepKind::PassFail(MeasurementSet::multiple(measurements)?))
    }

    pub fn attachment(name: &str, attachment: Attachment) -> Result<Self> {
        Self::new(name, StepKind::Attachment(attachment))
    }

    pub fn chart(name: &str, chart: Chart) -> Result<Self> {
        Self::new(name, StepKind::Chart(chart))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &StepKind {
        &self.kind
    }

    /// Mutable payload, e.g. to push into a multiple-measurement set
    pub fn kind_mut(&mut self) -> &mut StepKind {
        &mut self.kind
    }

    pub fn step_type(&self) -> StepType {
        self.kind.step_type()
    }

    pub fn status(&self) -> StepStatus {
        match self.forced {
            Some(outcome) => outcome.into(),
            None => self.kind.status(),
        }
    }

    pub fn forced(&self) -> Option<ForcedOutcome> {
        self.forced
    }

    pub(crate) fn set_forced(&mut self, outcome: Option<ForcedOutcome>) {
        self.forced = outcome;
    }

    /// Record that the step could not be executed
    pub fn mark_error(&mut self, message: &str) {
        self.forced = Some(ForcedOutcome::Error);
        self.error_message = Some(message.to_string());
    }

    pub fn mark_terminated(&mut self) {
        self.forced = Some(ForcedOutcome::Terminated);
    }

    pub fn mark_skipped(&mut self) {
        self.forced = Some(ForcedOutcome::Skipped);
    }

    pub fn mark_done(&mut self) {
        self.forced = Some(ForcedOutcome::Done);
    }

    pub fn group(&self) -> StepGroup {
        self.group
    }

    pub fn with_group(mut self, group: StepGroup) -> Self {
        self.group = group;
        self
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error_code.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn set_error(&mut self, code: Option<ErrorCode>, message: Option<&str>) {
        self.error_code = code;
        self.error_message = message.map(str::to_string);
    }

    pub fn report_text(&self) -> Option<&str> {
        self.report_text.as_deref()
    }

    pub fn set_report_text(&mut self, text: &str) {
        self.report_text = Some(text.to_string());
    }

    pub fn total_time(&self) -> Option<f64> {
        self.total_time
    }

    /// Seconds spent executing the step
    pub fn set_total_time(&mut self, seconds: f64) {
        self.total_time = Some(seconds);
    }

    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.start
    }

    pub fn set_start(&mut self, start: DateTime<FixedOffset>) {
        self.start = Some(start);
    }

    pub fn additional_results(&self) -> &[AdditionalData] {
        &self.additional_results
    }

    pub fn add_additional_result(&mut self, name: &str) -> Result<&mut AdditionalData> {
        let index = self.additional_results.len();
        self.additional_results.push(AdditionalData::new(name)?);
        Ok(&mut self.additional_results[index])
    }

    pub(crate) fn push_additional_result(&mut self, data: AdditionalData) {
        self.additional_results.push(data);
    }
}
