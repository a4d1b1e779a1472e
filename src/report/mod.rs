//! WSJF report model
//!
//! A report owns one root sequence; sequences own steps and nested
//! sequences. Statuses flow bottom-up: measurements judge themselves, steps
//! fold their measurements, sequences aggregate their children.

pub mod compare;
pub mod header;
pub mod measurement;
pub mod parser;
#[allow(clippy::module_inception)]
pub mod report;
pub mod sequence;
pub mod serializer;
pub mod status;
pub mod step;
pub mod wire;

pub use compare::{BinaryCompOp, StringCaseOp, TernaryCompOp};
pub use header::{
    AdditionalData, AdditionalDataArray, AdditionalDataArrayIndex, AdditionalDataProperty, Asset, ErrorCode, MiscInfo,
    PropertyType, SubUnit, Uut,
};
pub use measurement::{BooleanMeasurement, Measurement, NumericMeasurement, StringMeasurement};
pub use parser::parse;
pub use report::{FinalizedReport, Report, ReportIdentity};
pub use sequence::{Node, NodeRef, Sequence};
pub use serializer::{serialize, serialize_pretty};
pub use status::{MeasurementStatus, Status, StepStatus};
pub use step::{
    Attachment, Chart, ChartSeries, ChartType, MeasurementSet, NumericLimit, PassFail, Step,
    StepGroup, StepKind, StepType, StringValue,
};
