//! Rendering a finalized report into wire JSON
//!
//! The builder API already rejects most invalid input. This pass checks the
//! tree once more against what the receiving service accepts and refuses
//! to emit anything outside it.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat, Utc};
use tracing::debug;

use super::header::MAX_COMMENT;
use super::measurement::{NumericMeasurement, StringComparison, StringMeasurement};
use super::report::{FinalizedReport, REPORT_TYPE};
use super::sequence::{Node, Sequence};
use super::status::{Status, StepStatus};
use super::step::{Attachment, Chart, Step, StepKind, StepType};
use super::wire::{
    WireAttachment, WireBooleanMeasurement, WireChart, WireNumericMeasurement, WireReport,
    WireSeqCall, WireSeries, WireStep, WireStringMeasurement, SERIES_DATA_TYPE,
};
use crate::common::{Error, Result};

/// Serialize to compact JSON
pub fn serialize(report: &FinalizedReport) -> Result<Vec<u8>> {
    let wire = to_wire(report)?;
    Ok(serde_json::to_vec(&wire)?)
}

/// Serialize to indented JSON, as written to report files
pub fn serialize_pretty(report: &FinalizedReport) -> Result<Vec<u8>> {
    let wire = to_wire(report)?;
    Ok(serde_json::to_vec_pretty(&wire)?)
}

/// Map a finalized report onto its wire representation
pub fn to_wire(finalized: &FinalizedReport) -> Result<WireReport> {
    let report = finalized.report();
    let root = finalized
        .root()
        .ok_or_else(|| Error::Internal("finalized report has no root sequence".to_string()))?;
    let identity = report.identity();
    if let Some(comment) = &report.uut().comment {
        schema_limit("uut.comment", comment, MAX_COMMENT)?;
    }

    let wire = WireReport {
        report_type: REPORT_TYPE.to_string(),
        id: report.id(),
        pn: identity.part_number.clone(),
        sn: identity.serial_number.clone(),
        rev: identity.revision.clone(),
        product_name: identity.product_name.clone(),
        process_code: identity.process_code,
        process_name: identity.process_name.clone(),
        result: finalized.status(),
        machine_name: identity.machine_name.clone(),
        location: identity.location.clone(),
        purpose: identity.purpose.clone(),
        start: timestamp(&report.start()),
        start_utc: Some(
            report
                .start()
                .with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        root: sequence_to_wire(root)?,
        uut: report.uut().clone(),
        misc_infos: report.misc_infos().to_vec(),
        sub_units: report.sub_units().to_vec(),
        additional_data: report.additional_data().to_vec(),
        assets: report.assets().to_vec(),
    };
    debug!(id = %wire.id, result = %finalized.status(), "Rendered report to wire form");
    Ok(wire)
}

pub(crate) fn timestamp(time: &DateTime<FixedOffset>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, false)
}

fn schema_limit(field: &str, value: &str, max: usize) -> Result<()> {
    let len = value.chars().count();
    if len > max {
        return Err(Error::Schema(format!(
            "`{}` is {} characters long, the service accepts at most {}",
            field, len, max
        )));
    }
    Ok(())
}

fn aggregated_status(status: Status) -> StepStatus {
    match status {
        Status::Passed => StepStatus::Passed,
        Status::Failed => StepStatus::Failed,
        Status::Error => StepStatus::Error,
    }
}

fn sequence_to_wire(seq: &Sequence) -> Result<WireStep> {
    let mut wire = WireStep::bare(StepType::SequenceCall, seq.name(), aggregated_status(seq.status()));
    wire.group = seq.group();
    wire.start = seq.start().as_ref().map(timestamp);
    wire.error_code = seq.error_code().cloned();
    wire.error_message = seq.error_message().map(str::to_string);
    wire.tot_time = seq.total_time();
    wire.report_text = seq.report_text().map(str::to_string);
    wire.additional_results = seq.additional_results().to_vec();
    wire.seq_call = Some(WireSeqCall {
        path: seq.path().to_string(),
        name: seq.name().to_string(),
        version: seq.version().to_string(),
    });
    let steps = seq
        .children()
        .iter()
        .map(|child| match child {
            Node::Step(step) => step_to_wire(step),
            Node::Sequence(nested) => sequence_to_wire(nested),
        })
        .collect::<Result<Vec<_>>>()?;
    wire.steps = Some(steps);
    Ok(wire)
}

fn step_to_wire(step: &Step) -> Result<WireStep> {
    let status = step.status();
    let mut wire = WireStep::bare(step.step_type(), step.name(), status);
    wire.group = step.group();
    wire.start = step.start().as_ref().map(timestamp);
    wire.error_code = step.error_code().cloned();
    wire.error_message = step.error_message().map(str::to_string);
    wire.tot_time = step.total_time();
    wire.report_text = step.report_text().map(str::to_string);
    wire.additional_results = step.additional_results().to_vec();
    if !Status::from(status).is_passed() {
        wire.caused_uut_failure = Some(true);
    }

    match step.kind() {
        StepKind::NumericLimit(set) => {
            let items = set
                .items()
                .iter()
                .map(|m| numeric_to_wire(step.name(), m))
                .collect::<Result<Vec<_>>>()?;
            wire.numeric_meas = Some(items);
        }
        StepKind::StringValue(set) => {
            let items = set
                .items()
                .iter()
                .map(|m| string_to_wire(step.name(), m))
                .collect::<Result<Vec<_>>>()?;
            wire.string_meas = Some(items);
        }
        StepKind::PassFail(set) => {
            let items = set
                .items()
                .iter()
                .map(|m| {
                    if let Some(name) = &m.name {
                        schema_limit("booleanMeas.name", name, 100)?;
                    }
                    Ok(WireBooleanMeasurement {
                        name: m.name.clone(),
                        status: m.status,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            wire.boolean_meas = Some(items);
        }
        StepKind::Attachment(attachment) => wire.attachment = Some(attachment_to_wire(attachment)),
        StepKind::Chart(chart) => wire.chart = Some(chart_to_wire(chart)?),
    }
    Ok(wire)
}

fn numeric_to_wire(step: &str, m: &NumericMeasurement) -> Result<WireNumericMeasurement> {
    if let Some(name) = &m.name {
        schema_limit("numericMeas.name", name, 100)?;
    }
    if let Some(unit) = &m.unit {
        schema_limit("numericMeas.unit", unit, 20)?;
    }
    let comparison = m.comparison();
    let numbers = [Some(m.value), comparison.low_limit(), comparison.high_limit()];
    if numbers.iter().flatten().any(|n| !n.is_finite()) {
        return Err(Error::Schema(format!(
            "step `{}` holds a non-finite number, which JSON cannot carry",
            step
        )));
    }
    Ok(WireNumericMeasurement {
        comp_op: comparison.code().to_string(),
        name: m.name.clone(),
        status: m.status,
        unit: m.unit.clone(),
        value: m.value,
        high_limit: comparison.high_limit(),
        low_limit: comparison.low_limit(),
    })
}

fn string_to_wire(step: &str, m: &StringMeasurement) -> Result<WireStringMeasurement> {
    if let StringComparison::Binary(op) = m.comparison {
        if !op.supports_strings() {
            return Err(Error::Schema(format!(
                "step `{}` compares strings with {}, only EQ and NE are supported",
                step,
                op.code()
            )));
        }
    }
    if let Some(name) = &m.name {
        schema_limit("stringMeas.name", name, 100)?;
    }
    schema_limit("stringMeas.value", &m.value, 100)?;
    if let Some(limit) = &m.limit {
        schema_limit("stringMeas.limit", limit, 100)?;
    }
    Ok(WireStringMeasurement {
        comp_op: m.comparison.code().to_string(),
        name: m.name.clone(),
        status: m.status,
        value: m.value.clone(),
        limit: m.limit.clone(),
    })
}

fn attachment_to_wire(attachment: &Attachment) -> WireAttachment {
    WireAttachment {
        name: attachment.name().to_string(),
        content_type: attachment.content_type().to_string(),
        data: STANDARD.encode(attachment.data()),
    }
}

fn chart_to_wire(chart: &Chart) -> Result<WireChart> {
    let series = chart
        .series()
        .iter()
        .map(|series| {
            if series.points().iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
                return Err(Error::Schema(format!(
                    "chart series `{}` holds a non-finite point",
                    series.name()
                )));
            }
            Ok(WireSeries {
                data_type: SERIES_DATA_TYPE.to_string(),
                name: series.name().to_string(),
                xdata: series.xdata(),
                ydata: series.ydata(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(WireChart {
        chart_type: chart.chart_type(),
        label: chart.label().to_string(),
        x_label: chart.x_label().to_string(),
        x_unit: chart.x_unit().map(str::to_string),
        y_label: chart.y_label().to_string(),
        y_unit: chart.y_unit().map(str::to_string),
        series,
    })
}
