//! Sequence calls: the interior nodes of the step tree

use chrono::{DateTime, FixedOffset};
use std::sync::OnceLock;
use tracing::debug;

use super::header::{AdditionalData, ErrorCode};
use super::status::{aggregate, Status};
use super::step::{Step, StepGroup};
use crate::common::error::require;
use crate::common::{Error, Result};

/// A child of a sequence
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Step(Step),
    Sequence(Sequence),
}

/// A borrowed step or sequence, as returned by a name search
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeRef<'a> {
    Step(&'a Step),
    Sequence(&'a Sequence),
}

impl NodeRef<'_> {
    pub fn name(&self) -> &str {
        match self {
            NodeRef::Step(step) => step.name(),
            NodeRef::Sequence(seq) => seq.name(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            NodeRef::Step(step) => step.status().into(),
            NodeRef::Sequence(seq) => seq.status(),
        }
    }
}

impl<'a> From<&'a Node> for NodeRef<'a> {
    fn from(node: &'a Node) -> Self {
        match node {
            Node::Step(step) => NodeRef::Step(step),
            Node::Sequence(seq) => NodeRef::Sequence(seq),
        }
    }
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Step(step) => step.name(),
            Node::Sequence(seq) => seq.name(),
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Node::Step(step) => step.status().into(),
            Node::Sequence(seq) => seq.status(),
        }
    }
}

/// An ordered, append-only container of steps and nested sequences
///
/// Its status is never stored by callers: it is derived from the children.
/// Once the owning report is finalized the sequence is locked and the
/// derived status is cached.
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    path: String,
    version: String,
    group: StepGroup,
    children: Vec<Node>,
    total_time: Option<f64>,
    report_text: Option<String>,
    error_code: Option<ErrorCode>,
    error_message: Option<String>,
    start: Option<DateTime<FixedOffset>>,
    additional_results: Vec<AdditionalData>,
    locked: bool,
    status_cache: OnceLock<Status>,
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.path == other.path
            && self.version == other.version
            && self.group == other.group
            && self.children == other.children
            && self.total_time == other.total_time
            && self.report_text == other.report_text
            && self.error_code == other.error_code
            && self.error_message == other.error_message
            && self.start == other.start
            && self.additional_results == other.additional_results
    }
}

impl Sequence {
    pub fn new(name: &str, path: &str, version: &str) -> Result<Self> {
        require("seqCall.name", name, 100)?;
        require("seqCall.path", path, 500)?;
        require("seqCall.version", version, 30)?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
            version: version.to_string(),
            group: StepGroup::Main,
            children: Vec::new(),
            total_time: None,
            report_text: None,
            error_code: None,
            error_message: None,
            start: None,
            additional_results: Vec::new(),
            locked: false,
            status_cache: OnceLock::new(),
        })
    }

    /// Sequence whose path is its own name, version `1.0`
    pub fn named(name: &str) -> Result<Self> {
        Self::new(name, name, "1.0")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn group(&self) -> StepGroup {
        self.group
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    fn ensure_unlocked(&self, action: &str) -> Result<()> {
        if self.locked {
            return Err(Error::finalized(action));
        }
        Ok(())
    }

    fn push(&mut self, node: Node) -> Result<()> {
        self.ensure_unlocked("append to a sequence")?;
        debug!(sequence = %self.name, child = node.name(), "Appending child");
        self.children.push(node);
        Ok(())
    }

    pub fn push_step(&mut self, step: Step) -> Result<&mut Step> {
        self.push(Node::Step(step))?;
        match self.children.last_mut() {
            Some(Node::Step(step)) => Ok(step),
            _ => Err(Error::Internal("appended step not found".to_string())),
        }
    }

    pub fn push_sequence(&mut self, sequence: Sequence) -> Result<&mut Sequence> {
        self.push(Node::Sequence(sequence))?;
        match self.children.last_mut() {
            Some(Node::Sequence(seq)) => Ok(seq),
            _ => Err(Error::Internal("appended sequence not found".to_string())),
        }
    }

    /// Append a new nested sequence call and return it
    pub fn add_sequence(&mut self, name: &str, path: &str, version: &str) -> Result<&mut Sequence> {
        self.push_sequence(Sequence::new(name, path, version)?)
    }

    /// Mutable access to the nested sequence at `index`
    pub fn sequence_at_mut(&mut self, index: usize) -> Result<&mut Sequence> {
        self.ensure_unlocked("modify a sequence")?;
        match self.children.get_mut(index) {
            Some(Node::Sequence(seq)) => Ok(seq),
            Some(Node::Step(step)) => Err(Error::Validation(format!(
                "child {} (`{}`) is a step, not a sequence",
                index,
                step.name()
            ))),
            None => Err(Error::Validation(format!("no child at index {}", index))),
        }
    }

    /// Mutable access to the step at `index`
    pub fn step_at_mut(&mut self, index: usize) -> Result<&mut Step> {
        self.ensure_unlocked("modify a step")?;
        match self.children.get_mut(index) {
            Some(Node::Step(step)) => Ok(step),
            Some(Node::Sequence(seq)) => Err(Error::Validation(format!(
                "child {} (`{}`) is a sequence, not a step",
                index,
                seq.name()
            ))),
            None => Err(Error::Validation(format!("no child at index {}", index))),
        }
    }

    /// Error > Failed > Passed over the children; Passed when empty
    pub fn status(&self) -> Status {
        if let Some(status) = self.status_cache.get() {
            return *status;
        }
        aggregate(self.children.iter().map(Node::status))
    }

    /// Lock this sequence and every nested one, caching their statuses
    pub(crate) fn lock(&mut self) -> Status {
        let mut statuses = Vec::with_capacity(self.children.len());
        for child in &mut self.children {
            statuses.push(match child {
                Node::Step(step) => step.status().into(),
                Node::Sequence(seq) => seq.lock(),
            });
        }
        self.locked = true;
        *self.status_cache.get_or_init(|| aggregate(statuses))
    }

    /// Steps and sequences named `name`, depth first
    ///
    /// Each sequence's matches come before the sequence itself, and this
    /// sequence is the last entry when its own name matches.
    pub fn find_steps_by_name<'a>(&'a self, name: &str) -> Vec<NodeRef<'a>> {
        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<NodeRef<'a>>) {
        for child in &self.children {
            match child {
                Node::Sequence(seq) => seq.collect_named(name, found),
                Node::Step(step) if step.name() == name => found.push(NodeRef::Step(step)),
                Node::Step(_) => {}
            }
        }
        if self.name == name {
            found.push(NodeRef::Sequence(self));
        }
    }

    /// Number of nodes below this sequence
    pub fn node_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| match child {
                Node::Step(_) => 1,
                Node::Sequence(seq) => 1 + seq.node_count(),
            })
            .sum()
    }

    pub fn total_time(&self) -> Option<f64> {
        self.total_time
    }

    pub fn set_total_time(&mut self, seconds: f64) -> Result<()> {
        self.ensure_unlocked("set the total time")?;
        self.total_time = Some(seconds);
        Ok(())
    }

    pub fn report_text(&self) -> Option<&str> {
        self.report_text.as_deref()
    }

    pub fn set_report_text(&mut self, text: &str) -> Result<()> {
        self.ensure_unlocked("set the report text")?;
        self.report_text = Some(text.to_string());
        Ok(())
    }

    pub fn error_code(&self) -> Option<&ErrorCode> {
        self.error_code.as_ref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn set_error(&mut self, code: Option<ErrorCode>, message: Option<&str>) -> Result<()> {
        self.ensure_unlocked("set an error")?;
        self.error_code = code;
        self.error_message = message.map(str::to_string);
        Ok(())
    }

    pub fn start(&self) -> Option<DateTime<FixedOffset>> {
        self.start
    }

    pub fn set_start(&mut self, start: DateTime<FixedOffset>) -> Result<()> {
        self.ensure_unlocked("set the start time")?;
        self.start = Some(start);
        Ok(())
    }

    pub fn set_group(&mut self, group: StepGroup) -> Result<()> {
        self.ensure_unlocked("set the group")?;
        self.group = group;
        Ok(())
    }

    pub fn additional_results(&self) -> &[AdditionalData] {
        &self.additional_results
    }

    pub fn add_additional_result(&mut self, name: &str) -> Result<&mut AdditionalData> {
        self.ensure_unlocked("add additional results")?;
        let index = self.additional_results.len();
        self.additional_results.push(AdditionalData::new(name)?);
        Ok(&mut self.additional_results[index])
    }

    pub(crate) fn push_additional_result(&mut self, data: AdditionalData) {
        self.additional_results.push(data);
    }
}
