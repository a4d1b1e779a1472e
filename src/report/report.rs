//! The report envelope and its finalized snapshot

use chrono::{DateTime, FixedOffset, Local, SubsecRound};
use tracing::{debug, info};
use uuid::Uuid;

use super::header::{AdditionalData, Asset, MiscInfo, SubUnit, Uut, MAX_COMMENT};
use super::sequence::{NodeRef, Sequence};
use super::serializer;
use super::status::Status;
use crate::common::error::{limit, require};
use crate::common::{Error, Result};

/// Report type of a UUT test report
pub const REPORT_TYPE: &str = "T";

/// Separator placed between comments in `uut.comment`
const COMMENT_SEPARATOR: &str = "</br>";

/// Identity and station fields every report must carry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportIdentity {
    pub part_number: String,
    pub serial_number: String,
    pub revision: String,
    pub process_code: i32,
    pub machine_name: String,
    pub location: String,
    pub purpose: String,
    /// Stored as `uut.user`
    pub operator: String,
    pub product_name: Option<String>,
    pub process_name: Option<String>,
}

impl ReportIdentity {
    pub fn validate(&self) -> Result<()> {
        require("pn", &self.part_number, 100)?;
        require("sn", &self.serial_number, 100)?;
        require("rev", &self.revision, 100)?;
        require("machineName", &self.machine_name, 100)?;
        require("location", &self.location, 100)?;
        require("purpose", &self.purpose, 100)?;
        require("uut.user", &self.operator, 100)?;
        if let Some(name) = &self.product_name {
            limit("productName", name, 100)?;
        }
        if let Some(name) = &self.process_name {
            limit("processName", name, 100)?;
        }
        Ok(())
    }
}

/// A UUT test report under construction
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub(crate) id: Uuid,
    pub(crate) identity: ReportIdentity,
    pub(crate) start: DateTime<FixedOffset>,
    pub(crate) root: Option<Sequence>,
    pub(crate) uut: Uut,
    pub(crate) misc_infos: Vec<MiscInfo>,
    pub(crate) sub_units: Vec<SubUnit>,
    pub(crate) assets: Vec<Asset>,
    pub(crate) additional_data: Vec<AdditionalData>,
    finalized: bool,
}

impl Report {
    /// Create an empty report; the root sequence is attached separately
    pub fn new(identity: ReportIdentity) -> Result<Self> {
        identity.validate()?;
        let uut = Uut::new(identity.operator.clone());
        Ok(Self {
            id: Uuid::new_v4(),
            identity,
            start: Local::now().fixed_offset().trunc_subsecs(0),
            root: None,
            uut,
            misc_infos: Vec::new(),
            sub_units: Vec::new(),
            assets: Vec::new(),
            additional_data: Vec::new(),
            finalized: false,
        })
    }

    /// Create a report with a root sequence called `name`
    pub fn with_root(identity: ReportIdentity, name: &str) -> Result<Self> {
        let mut report = Self::new(identity)?;
        report.attach_root(Sequence::named(name)?)?;
        Ok(report)
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.finalized {
            return Err(Error::finalized(action));
        }
        Ok(())
    }

    /// Attach the root sequence; only one root may ever be attached
    pub fn attach_root(&mut self, root: Sequence) -> Result<()> {
        self.ensure_open("attach a root sequence")?;
        if let Some(existing) = &self.root {
            return Err(Error::IllegalState(format!(
                "root sequence `{}` is already attached",
                existing.name()
            )));
        }
        debug!(root = root.name(), "Attached root sequence");
        self.root = Some(root);
        Ok(())
    }

    pub fn root(&self) -> Option<&Sequence> {
        self.root.as_ref()
    }

    pub fn root_mut(&mut self) -> Result<&mut Sequence> {
        self.ensure_open("modify the root sequence")?;
        self.root
            .as_mut()
            .ok_or_else(|| Error::IllegalState("no root sequence attached".to_string()))
    }

    /// Add a sequence call directly under the root
    pub fn add_test_sequence(&mut self, name: &str, path: &str, version: &str) -> Result<&mut Sequence> {
        self.root_mut()?.add_sequence(name, path, version)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn identity(&self) -> &ReportIdentity {
        &self.identity
    }

    pub fn start(&self) -> DateTime<FixedOffset> {
        self.start
    }

    pub fn set_start(&mut self, start: DateTime<FixedOffset>) -> Result<()> {
        self.ensure_open("set the start time")?;
        self.start = start;
        Ok(())
    }

    pub fn uut(&self) -> &Uut {
        &self.uut
    }

    /// Mutable `uut` header; the operator can be changed here too
    pub fn uut_mut(&mut self) -> Result<&mut Uut> {
        self.ensure_open("modify the uut header")?;
        Ok(&mut self.uut)
    }

    pub fn misc_infos(&self) -> &[MiscInfo] {
        &self.misc_infos
    }

    pub fn add_misc_info(&mut self, description: &str, text: Option<&str>, numeric: Option<i64>) -> Result<()> {
        self.ensure_open("add misc info")?;
        self.misc_infos.push(MiscInfo::new(description, text, numeric)?);
        Ok(())
    }

    pub fn sub_units(&self) -> &[SubUnit] {
        &self.sub_units
    }

    pub fn add_sub_unit(
        &mut self,
        part_type: &str,
        part_number: &str,
        revision: &str,
        serial_number: &str,
    ) -> Result<()> {
        self.ensure_open("add a sub unit")?;
        self.sub_units
            .push(SubUnit::new(part_type, part_number, revision, serial_number)?);
        Ok(())
    }

    pub fn assets(&self) -> &[Asset] {
        &self.assets
    }

    pub fn add_asset(&mut self, asset_sn: &str, usage_count: i64) -> Result<()> {
        self.ensure_open("add an asset")?;
        self.assets.push(Asset::new(asset_sn, usage_count)?);
        Ok(())
    }

    pub fn additional_data(&self) -> &[AdditionalData] {
        &self.additional_data
    }

    pub fn add_additional_data(&mut self, name: &str) -> Result<&mut AdditionalData> {
        self.ensure_open("add additional data")?;
        let index = self.additional_data.len();
        self.additional_data.push(AdditionalData::new(name)?);
        Ok(&mut self.additional_data[index])
    }

    /// Append to `uut.comment`, separating comments with `</br>`
    ///
    /// Returns the whole comment. A comment that would push the total past
    /// the service's limit is rejected and the existing text is kept.
    pub fn add_comment(&mut self, comment: &str) -> Result<&str> {
        self.ensure_open("add a comment")?;
        let joined = match &self.uut.comment {
            Some(existing) => format!("{}{}{}", existing, COMMENT_SEPARATOR, comment),
            None => comment.to_string(),
        };
        limit("uut.comment", &joined, MAX_COMMENT)?;
        Ok(self.uut.comment.insert(joined).as_str())
    }

    /// Overall status: the status of the root sequence
    pub fn status(&self) -> Status {
        self.root.as_ref().map_or(Status::Passed, Sequence::status)
    }

    pub fn find_steps_by_name(&self, name: &str) -> Vec<NodeRef<'_>> {
        self.root
            .as_ref()
            .map(|root| root.find_steps_by_name(name))
            .unwrap_or_default()
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Lock the tree, compute the overall status and return an immutable snapshot
    pub fn finalize(&mut self) -> Result<FinalizedReport> {
        self.ensure_open("finalize the report")?;
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| Error::IllegalState("cannot finalize a report without a root sequence".to_string()))?;
        let status = root.lock();
        self.finalized = true;
        info!(
            id = %self.id,
            sn = %self.identity.serial_number,
            nodes = root.node_count(),
            "Finalized report: {}",
            status
        );
        Ok(FinalizedReport {
            report: self.clone(),
            status,
        })
    }
}

/// An immutable, finalized report ready to be serialized
#[derive(Debug, Clone, PartialEq)]
pub struct FinalizedReport {
    report: Report,
    status: Status,
}

impl FinalizedReport {
    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn id(&self) -> Uuid {
        self.report.id
    }

    pub fn root(&self) -> Option<&Sequence> {
        self.report.root()
    }

    /// `YYYY-MM-DDTHHMMSS-{root name}-{sn}_WATS.json`, stamped with the start time
    pub fn file_name(&self) -> String {
        format!(
            "{}-{}-{}_WATS.json",
            self.report.start.format("%Y-%m-%dT%H%M%S"),
            self.root().map_or("", Sequence::name),
            self.report.identity.serial_number
        )
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serializer::serialize(self)
    }

    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        serializer::serialize_pretty(self)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::report::compare::TernaryCompOp;
    use crate::report::measurement::NumericMeasurement;
    use crate::report::step::Step;

    pub(crate) fn identity() -> ReportIdentity {
        ReportIdentity {
            part_number: "PN-100".into(),
            serial_number: "SN-0001".into(),
            revision: "A".into(),
            process_code: 10,
            machine_name: "station-1".into(),
            location: "Line 3".into(),
            purpose: "Production".into(),
            operator: "jdoe".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_identity_field() {
        for blank in ["pn", "sn", "rev", "machineName", "location", "purpose", "uut.user"] {
            let mut id = identity();
            match blank {
                "pn" => id.part_number.clear(),
                "sn" => id.serial_number.clear(),
                "rev" => id.revision.clear(),
                "machineName" => id.machine_name.clear(),
                "location" => id.location = "  ".into(),
                "purpose" => id.purpose.clear(),
                _ => id.operator.clear(),
            }
            let err = Report::new(id).unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{}", blank);
            assert!(err.to_string().contains(blank));
        }
    }

    #[test]
    fn test_root_attaches_once() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        let err = report.attach_root(Sequence::named("Second").unwrap()).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_numeric_and_failed_pass_fail() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        let root = report.root_mut().unwrap();
        root.push_step(
            Step::numeric(
                "Voltage",
                NumericMeasurement::ternary(5.0, 1.0, 10.0, TernaryCompOp::GreaterEqualLessEqual, "V"),
            )
            .unwrap(),
        )
        .unwrap();
        root.push_step(Step::pass_fail("Self test", false).unwrap()).unwrap();

        let finalized = report.finalize().unwrap();
        assert_eq!(finalized.root().unwrap().status(), Status::Failed);
        assert_eq!(finalized.status(), Status::Failed);
    }

    #[test]
    fn test_empty_root_passes() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        assert_eq!(report.finalize().unwrap().status(), Status::Passed);
    }

    #[test]
    fn test_mutation_after_finalize() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        report.add_test_sequence("Test", "tests/a.rs", "1.0").unwrap();
        report.finalize().unwrap();

        assert!(matches!(report.root_mut().unwrap_err(), Error::IllegalState(_)));
        assert!(matches!(
            report.add_test_sequence("Late", "late", "1.0").unwrap_err(),
            Error::IllegalState(_)
        ));
        assert!(report.add_comment("late").is_err());
        assert!(report.finalize().is_err());
    }

    #[test]
    fn test_snapshot_is_locked() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        let finalized = report.finalize().unwrap();
        let mut root = finalized.root().unwrap().clone();
        let err = root.push_step(Step::pass_fail("late", true).unwrap()).unwrap_err();
        assert!(matches!(err, Error::IllegalState(_)));
    }

    #[test]
    fn test_finalize_without_root() {
        let mut report = Report::new(identity()).unwrap();
        assert!(matches!(report.finalize().unwrap_err(), Error::IllegalState(_)));
    }

    #[test]
    fn test_comments_join() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        assert_eq!(report.add_comment("first").unwrap(), "first");
        assert_eq!(report.add_comment("second").unwrap(), "first</br>second");
    }

    #[test]
    fn test_comment_limit() {
        let mut report = Report::with_root(identity(), "Root").unwrap();
        assert_eq!(report.add_comment(&"x".repeat(MAX_COMMENT)).unwrap().len(), MAX_COMMENT);

        let mut report = Report::with_root(identity(), "Root").unwrap();
        let err = report.add_comment(&"x".repeat(MAX_COMMENT + 1)).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(report.uut().comment.is_none());

        // 4990 + separator (5) + 5 fills the limit exactly
        let mut report = Report::with_root(identity(), "Root").unwrap();
        report.add_comment(&"a".repeat(4990)).unwrap();
        assert_eq!(report.add_comment("bbbbb").unwrap().chars().count(), MAX_COMMENT);
        assert!(report.add_comment("c").is_err());
        assert_eq!(report.uut().comment.as_deref().map(str::len), Some(MAX_COMMENT));
    }

    #[test]
    fn test_file_name() {
        let mut report = Report::with_root(identity(), "Smoke").unwrap();
        let start = DateTime::parse_from_rfc3339("2024-03-05T07:08:09+01:00").unwrap();
        report.set_start(start).unwrap();
        let finalized = report.finalize().unwrap();
        assert_eq!(finalized.file_name(), "2024-03-05T070809-Smoke-SN-0001_WATS.json");
    }

    #[test]
    fn test_start_has_no_fraction() {
        let report = Report::new(identity()).unwrap();
        assert_eq!(report.start().timestamp_subsec_nanos(), 0);
    }
}
