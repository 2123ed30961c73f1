use std::fmt;

use tracing::error;
use ulink_object::{ObjectHandle, ObjectKind};

use crate::sorter::DependencySorter;

/// Why one object forces another to be loaded first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForceLoadRelation {
    Class,
    Archetype,
    TemplateOwnerClass,
    SourceDefaultObject,
    RedirectorDestinationClass,
    RedirectorDestinationArchetype,
}

impl fmt::Display for ForceLoadRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class => write!(f, "Class"),
            Self::Archetype => write!(f, "Archetype"),
            Self::TemplateOwnerClass => write!(f, "TemplateOwnerClass"),
            Self::SourceDefaultObject => write!(f, "SourceDefaultObject"),
            Self::RedirectorDestinationClass => write!(f, "Redirector DestinationObject Class"),
            Self::RedirectorDestinationArchetype => {
                write!(f, "Redirector DestinationObject Archetype")
            }
        }
    }
}

/// A force-loaded object that would be read after the object needing it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SortViolation {
    /// The required object sits later in the sorted list.
    AppearsLater {
        relation: ForceLoadRelation,
        index: usize,
        source: String,
        other_index: usize,
        target: String,
    },
    /// The required object was processed after the source but never listed.
    ProcessedNotListed {
        relation: ForceLoadRelation,
        index: usize,
        source_order: usize,
        source: String,
        other_order: usize,
        target: String,
    },
    /// The required object was never reached.
    NotProcessed {
        relation: ForceLoadRelation,
        index: usize,
        source_order: usize,
        source: String,
        target: String,
    },
}

impl SortViolation {
    pub fn relation(&self) -> ForceLoadRelation {
        match self {
            Self::AppearsLater { relation, .. }
            | Self::ProcessedNotListed { relation, .. }
            | Self::NotProcessed { relation, .. } => *relation,
        }
    }
}

impl fmt::Display for SortViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AppearsLater {
                relation,
                index,
                source,
                other_index,
                target,
            } => write!(
                f,
                "sorting error ({relation} appears later in the sorted list): {index}) {source} => {other_index}) {target}"
            ),
            Self::ProcessedNotListed {
                relation,
                index,
                source_order,
                source,
                other_order,
                target,
            } => write!(
                f,
                "sorting error ({relation} was processed but not added to the sorted list): {index}/{source_order}) {source} => {other_order}) {target}"
            ),
            Self::NotProcessed {
                relation,
                index,
                source_order,
                source,
                target,
            } => write!(
                f,
                "sorting error ({relation} has not yet been processed): {index}/{source_order}) {source} => {target}"
            ),
        }
    }
}

impl DependencySorter<'_> {
    /// Check every collected object past the bootstrap region against the
    /// objects its loading force-loads.
    pub fn verify(&self) -> Vec<SortViolation> {
        let graph = self.graph;
        let mut violations = Vec::new();

        for index in self.core_offset..self.referenced.len() {
            let object = self.referenced[index];
            let mut check = |target: Option<ObjectHandle>, relation| {
                if let Some(target) = target {
                    if let Some(v) = self.verify_dependency(index, target, relation) {
                        violations.push(v);
                    }
                }
            };

            check(Some(graph.class_of(object)), ForceLoadRelation::Class);
            check(graph.archetype_of(object), ForceLoadRelation::Archetype);

            match &graph.object(object).kind {
                ObjectKind::Component(component) => {
                    if component.template_owner_class.is_some() {
                        check(
                            component.template_owner_class,
                            ForceLoadRelation::TemplateOwnerClass,
                        );
                    } else if !graph.is_default_object(object)
                        && component.template_name.is_none()
                        && graph.is_template(object)
                    {
                        check(
                            component.source_default,
                            ForceLoadRelation::SourceDefaultObject,
                        );
                    }
                }
                ObjectKind::Redirector(redirector) => {
                    if let Some(destination) = redirector.destination {
                        check(
                            Some(graph.class_of(destination)),
                            ForceLoadRelation::RedirectorDestinationClass,
                        );
                        check(
                            graph.archetype_of(destination),
                            ForceLoadRelation::RedirectorDestinationArchetype,
                        );
                    }
                }
                _ => {}
            }
        }
        violations
    }

    fn verify_dependency(
        &self,
        index: usize,
        target: ObjectHandle,
        relation: ForceLoadRelation,
    ) -> Option<SortViolation> {
        let graph = self.graph;
        let source = self.referenced[index];

        // A dependency in another package is resolved through that package.
        if graph.outermost(source) != graph.outermost(target) {
            return None;
        }

        if let Some(other_index) = self.position(target) {
            if other_index < index {
                return None;
            }
            return Some(SortViolation::AppearsLater {
                relation,
                index,
                source: graph.full_name(source),
                other_index,
                target: graph.full_name(target),
            });
        }

        let source_order = self.processed.get(&source).copied().unwrap_or_default();
        match self.processed.get(&target) {
            Some(&other_order) if other_order < source_order => None,
            Some(&other_order) => Some(SortViolation::ProcessedNotListed {
                relation,
                index,
                source_order,
                source: graph.full_name(source),
                other_order,
                target: graph.full_name(target),
            }),
            None => Some(SortViolation::NotProcessed {
                relation,
                index,
                source_order,
                source: graph.full_name(source),
                target: graph.full_name(target),
            }),
        }
    }

    /// Log every violation and panic if there is any.
    ///
    /// # Panics
    ///
    /// Panics when [`verify`](Self::verify) reports a violation.
    pub fn assert_sorted(&self) {
        let violations = self.verify();
        if violations.is_empty() {
            return;
        }
        for violation in &violations {
            error!("{violation}");
        }
        let report: Vec<String> = violations.iter().map(ToString::to_string).collect();
        panic!("dependency sort is not seek-free:\n{}", report.join("\n"));
    }
}
