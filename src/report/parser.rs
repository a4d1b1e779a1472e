//! Reading wire JSON back into a finalized report
//!
//! Statuses are never trusted: every measurement and step is re-evaluated,
//! and a declared status that disagrees with the recomputed one is
//! rejected. Forced step outcomes (done, error, terminated, skipped) are
//! the exception since they cannot be derived from the payload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset};
use tracing::debug;

use super::compare::{BinaryCompOp, StringCaseOp, TernaryCompOp, LOG_CODE};
use super::measurement::{BooleanMeasurement, Measurement, NumericMeasurement, StringMeasurement};
use super::report::{FinalizedReport, Report, ReportIdentity, REPORT_TYPE};
use super::sequence::Sequence;
use super::status::MeasurementStatus;
use super::step::{Attachment, Chart, ForcedOutcome, MeasurementSet, Step, StepKind, StepType};
use super::wire::{
    WireBooleanMeasurement, WireChart, WireNumericMeasurement, WireReport, WireStep,
    WireStringMeasurement,
};
use crate::common::{Error, Result};

/// Decode wire JSON without interpreting it
pub fn parse(bytes: &[u8]) -> Result<WireReport> {
    Ok(serde_json::from_slice(bytes)?)
}

impl FinalizedReport {
    /// Parse and rebuild a finalized report from wire JSON
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Self::from_wire(parse(bytes)?)
    }

    /// Rebuild a finalized report, re-evaluating every status
    pub fn from_wire(wire: WireReport) -> Result<Self> {
        if wire.report_type != REPORT_TYPE {
            return Err(Error::Validation(format!(
                "report type `{}` is not a UUT test report",
                wire.report_type
            )));
        }
        let identity = ReportIdentity {
            part_number: wire.pn,
            serial_number: wire.sn,
            revision: wire.rev,
            process_code: wire.process_code,
            machine_name: wire.machine_name,
            location: wire.location,
            purpose: wire.purpose,
            operator: wire.uut.user.clone(),
            product_name: wire.product_name,
            process_name: wire.process_name,
        };
        let mut report = Report::new(identity)?;
        report.id = wire.id;
        report.start = parse_time("start", &wire.start)?;
        report.uut = wire.uut;
        report.misc_infos = wire.misc_infos;
        report.sub_units = wire.sub_units;
        report.assets = wire.assets;
        report.additional_data = wire.additional_data;
        report.attach_root(sequence_from_wire(wire.root)?)?;

        let finalized = report.finalize()?;
        if finalized.status() != wire.result {
            return Err(Error::Validation(format!(
                "report declares result {} but its steps evaluate to {}",
                wire.result.code(),
                finalized.status().code()
            )));
        }
        debug!(id = %finalized.id(), "Rebuilt report from wire form");
        Ok(finalized)
    }
}

fn parse_time(field: &str, text: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(text)
        .map_err(|e| Error::Validation(format!("`{}` is not an RFC 3339 timestamp: {}", field, e)))
}

fn mismatch(name: &str, declared: &str, computed: &str) -> Error {
    Error::Validation(format!(
        "step `{}` declares status {} but evaluates to {}",
        name, declared, computed
    ))
}

fn sequence_from_wire(wire: WireStep) -> Result<Sequence> {
    if wire.step_type != StepType::SequenceCall {
        return Err(Error::Validation(format!(
            "step `{}` of type {} cannot hold child steps",
            wire.name, wire.step_type
        )));
    }
    let call = wire
        .seq_call
        .ok_or_else(|| Error::missing_field("seqCall"))?;
    let mut seq = Sequence::new(&wire.name, &call.path, &call.version)?;
    seq.set_group(wire.group)?;
    if let Some(start) = &wire.start {
        seq.set_start(parse_time("start", start)?)?;
    }
    if let Some(seconds) = wire.tot_time {
        seq.set_total_time(seconds)?;
    }
    if let Some(text) = &wire.report_text {
        seq.set_report_text(text)?;
    }
    if wire.error_code.is_some() || wire.error_message.is_some() {
        seq.set_error(wire.error_code, wire.error_message.as_deref())?;
    }
    for data in wire.additional_results {
        seq.push_additional_result(data);
    }

    for child in wire.steps.unwrap_or_default() {
        if child.step_type == StepType::SequenceCall {
            seq.push_sequence(sequence_from_wire(child)?)?;
        } else {
            seq.push_step(step_from_wire(child)?)?;
        }
    }

    let computed = seq.status();
    if wire.status.code() != computed.code() {
        return Err(mismatch(seq.name(), wire.status.code(), computed.code()));
    }
    Ok(seq)
}

fn step_from_wire(wire: WireStep) -> Result<Step> {
    let multiple = wire.step_type.is_multiple();
    let kind = match wire.step_type {
        StepType::NumericLimitSingle | StepType::NumericLimitMultiple => {
            let items = wire
                .numeric_meas
                .ok_or_else(|| Error::missing_field("numericMeas"))?
                .into_iter()
                .map(numeric_from_wire)
                .collect::<Result<Vec<_>>>()?;
            StepKind::NumericLimit(build_set(items, multiple)?)
        }
        StepType::StringValueSingle | StepType::StringValueMultiple => {
            let items = wire
                .string_meas
                .ok_or_else(|| Error::missing_field("stringMeas"))?
                .into_iter()
                .map(string_from_wire)
                .collect::<Result<Vec<_>>>()?;
            StepKind::StringValue(build_set(items, multiple)?)
        }
        StepType::PassFailSingle | StepType::PassFailMultiple => {
            let items = wire
                .boolean_meas
                .ok_or_else(|| Error::missing_field("booleanMeas"))?
                .into_iter()
                .map(boolean_from_wire)
                .collect();
            StepKind::PassFail(build_set(items, multiple)?)
        }
        StepType::Attachment => {
            let attachment = wire
                .attachment
                .ok_or_else(|| Error::missing_field("attachment"))?;
            let data = STANDARD.decode(attachment.data.as_bytes()).map_err(|e| {
                Error::Validation(format!("attachment `{}` is not valid base64: {}", attachment.name, e))
            })?;
            StepKind::Attachment(Attachment::new(&attachment.name, &attachment.content_type, data)?)
        }
        StepType::Chart => {
            let chart = wire.chart.ok_or_else(|| Error::missing_field("chart"))?;
            StepKind::Chart(chart_from_wire(chart)?)
        }
        StepType::SequenceCall => {
            return Err(Error::Internal("sequence call parsed as a leaf step".to_string()))
        }
    };

    let mut step = Step::new(&wire.name, kind)?.with_group(wire.group);
    if let Some(start) = &wire.start {
        step.set_start(parse_time("start", start)?);
    }
    if let Some(seconds) = wire.tot_time {
        step.set_total_time(seconds);
    }
    if let Some(text) = &wire.report_text {
        step.set_report_text(text);
    }
    step.set_error(wire.error_code, wire.error_message.as_deref());
    for data in wire.additional_results {
        step.push_additional_result(data);
    }

    let computed = step.status();
    if wire.status != computed {
        match ForcedOutcome::from_status(wire.status) {
            Some(outcome) => step.set_forced(Some(outcome)),
            None => return Err(mismatch(step.name(), wire.status.code(), computed.code())),
        }
    }
    Ok(step)
}

fn build_set<M: Measurement>(items: Vec<M>, multiple: bool) -> Result<MeasurementSet<M>> {
    if multiple {
        return MeasurementSet::multiple(items);
    }
    let mut items = items.into_iter();
    match (items.next(), items.next()) {
        (Some(only), None) => MeasurementSet::single(only),
        _ => Err(Error::Validation(
            "a single-measurement step must hold exactly one measurement".to_string(),
        )),
    }
}

/// Apply a declared measurement status to a freshly evaluated one
fn declared<T>(
    measurement: T,
    computed: MeasurementStatus,
    declared: MeasurementStatus,
    skip: impl FnOnce(T) -> T,
) -> Result<T> {
    if declared == computed {
        Ok(measurement)
    } else if declared == MeasurementStatus::Skipped {
        Ok(skip(measurement))
    } else {
        Err(Error::Validation(format!(
            "measurement declares status {:?} but evaluates to {:?}",
            declared, computed
        )))
    }
}

fn required_limit(limit: Option<f64>, which: &str, op: &str) -> Result<f64> {
    limit.ok_or_else(|| Error::Validation(format!("operator {} requires a {} limit", op, which)))
}

fn numeric_from_wire(wire: WireNumericMeasurement) -> Result<NumericMeasurement> {
    let op = wire.comp_op.as_str();
    let mut m = if op == LOG_CODE {
        NumericMeasurement::log(wire.value, "")
    } else if let Ok(binary) = op.parse::<BinaryCompOp>() {
        let limit = required_limit(wire.low_limit, "low", op)?;
        NumericMeasurement::binary(wire.value, limit, binary, "")
    } else {
        let ternary: TernaryCompOp = op.parse()?;
        let low = required_limit(wire.low_limit, "low", op)?;
        let high = required_limit(wire.high_limit, "high", op)?;
        NumericMeasurement::ternary(wire.value, low, high, ternary, "")
    };
    m.unit = wire.unit;
    m.name = wire.name;
    let computed = m.status;
    declared(m, computed, wire.status, NumericMeasurement::skip)
}

fn string_from_wire(wire: WireStringMeasurement) -> Result<StringMeasurement> {
    let op = wire.comp_op.as_str();
    let limit = wire.limit.unwrap_or_default();
    let mut m = if op == LOG_CODE {
        StringMeasurement::log(wire.value)
    } else if let Ok(case) = op.parse::<StringCaseOp>() {
        StringMeasurement::case(wire.value, limit, case)
    } else {
        StringMeasurement::binary(wire.value, limit, op.parse()?)?
    };
    m.name = wire.name;
    let computed = m.status;
    declared(m, computed, wire.status, StringMeasurement::skip)
}

fn boolean_from_wire(wire: WireBooleanMeasurement) -> BooleanMeasurement {
    let mut m = match wire.status {
        MeasurementStatus::Failed => BooleanMeasurement::new(false),
        MeasurementStatus::Passed => BooleanMeasurement::new(true),
        MeasurementStatus::Skipped => BooleanMeasurement::new(true).skip(),
    };
    m.name = wire.name;
    m
}

fn parse_points(series: &str, axis: &str, data: &str) -> Result<Vec<f64>> {
    data.split(';')
        .map(|v| {
            v.trim().parse::<f64>().map_err(|_| {
                Error::Validation(format!("series `{}` has a non-numeric {} value `{}`", series, axis, v))
            })
        })
        .collect()
}

fn chart_from_wire(wire: WireChart) -> Result<Chart> {
    let mut chart = Chart::new(wire.chart_type, &wire.label, &wire.x_label, &wire.y_label)?
        .with_units(wire.x_unit.as_deref(), wire.y_unit.as_deref())?;
    for series in wire.series {
        let xs = parse_points(&series.name, "x", &series.xdata)?;
        let ys = parse_points(&series.name, "y", &series.ydata)?;
        if xs.len() != ys.len() {
            return Err(Error::Validation(format!(
                "series `{}` has {} x values but {} y values",
                series.name,
                xs.len(),
                ys.len()
            )));
        }
        chart.add_series(&series.name, xs.into_iter().zip(ys).collect())?;
    }
    Ok(chart)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::report::tests::identity;
    use crate::report::serializer::serialize;
    use crate::report::header::{AdditionalDataProperty, PropertyType};
    use crate::report::sequence::NodeRef;
    use crate::report::status::{Status, StepStatus};

    fn sample() -> FinalizedReport {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        report.add_misc_info("Firmware", Some("1.2.3"), None).unwrap();
        report.add_asset("FIX-7", 1).unwrap();
        let test = report.add_test_sequence("test_power", "tests/power.rs", "1.0").unwrap();
        test.push_step(
            Step::numeric(
                "Rail",
                NumericMeasurement::binary(3.3, 3.0, BinaryCompOp::GreaterOrEqual, "V"),
            )
            .unwrap(),
        )
        .unwrap();
        let mut skipped = Step::pass_fail("Optional", true).unwrap();
        skipped.mark_skipped();
        test.push_step(skipped).unwrap();
        report.finalize().unwrap()
    }

    #[test]
    fn test_round_trip_preserves_report() {
        let original = sample();
        let parsed = FinalizedReport::from_json(&serialize(&original).unwrap()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.status(), Status::Passed);
    }

    #[test]
    fn test_tampered_result_rejected() {
        let mut wire = crate::report::serializer::to_wire(&sample()).unwrap();
        wire.result = Status::Failed;
        let err = FinalizedReport::from_wire(wire).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_tampered_measurement_rejected() {
        let mut wire = crate::report::serializer::to_wire(&sample()).unwrap();
        let steps = wire.root.steps.as_mut().unwrap()[0].steps.as_mut().unwrap();
        steps[0].numeric_meas.as_mut().unwrap()[0].value = 1.0;
        assert!(FinalizedReport::from_wire(wire).is_err());
    }

    #[test]
    fn test_string_ordering_operator_rejected() {
        let mut wire = crate::report::serializer::to_wire(&sample()).unwrap();
        let mut step = WireStep::bare(StepType::StringValueSingle, "Version", StepStatus::Passed);
        step.string_meas = Some(vec![WireStringMeasurement {
            comp_op: "GT".into(),
            name: None,
            status: MeasurementStatus::Passed,
            value: "b".into(),
            limit: Some("a".into()),
        }]);
        wire.root.steps.as_mut().unwrap().push(step);
        assert!(matches!(FinalizedReport::from_wire(wire).unwrap_err(), Error::Validation(_)));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(parse(b"{\"type\": \"T\"").unwrap_err(), Error::Json(_)));
    }

    #[test]
    fn test_forced_skip_over_skipped_measurements() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        let test = report.add_test_sequence("test_skip", "tests/skip.rs", "1.0").unwrap();
        let mut step = Step::numeric(
            "Not fitted",
            NumericMeasurement::binary(0.0, 1.0, BinaryCompOp::GreaterThan, "V").skip(),
        )
        .unwrap();
        step.mark_skipped();
        test.push_step(step).unwrap();
        let report = report.finalize().unwrap();

        let parsed = FinalizedReport::from_json(&serialize(&report).unwrap()).unwrap();
        assert_eq!(parsed, report);
        let found = parsed.report().find_steps_by_name("Not fitted");
        assert!(matches!(found[0], NodeRef::Step(step) if step.status() == StepStatus::Skipped));
    }

    #[test]
    fn test_array_additional_data_round_trip() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        let data = report.add_additional_data("Matrix").unwrap();
        let prop = data.add_property("gains", PropertyType::Array, None).unwrap();
        let array = prop.set_array(1, PropertyType::Number).unwrap();
        for (i, gain) in ["0.5", "0.75"].into_iter().enumerate() {
            let value = AdditionalDataProperty::element(PropertyType::Number, Some(gain));
            array.add_index(&format!("[{i}]"), &[i as i64], value).unwrap();
        }
        let report = report.finalize().unwrap();

        let wire = serialize(&report).unwrap();
        assert!(String::from_utf8_lossy(&wire).contains("\"type\":\"Array\""));
        let parsed = FinalizedReport::from_json(&wire).unwrap();
        assert_eq!(parsed, report);
        let array = parsed.report().additional_data()[0].props[0].array.as_ref().unwrap();
        assert_eq!(array.indexes[1].value.value.as_deref(), Some("0.75"));
    }
}
