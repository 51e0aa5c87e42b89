//! Promotion of the fields of embedded types.
//!
//! An embedded type contributes all of its fields, its own promoted fields included, to
//! the embedding type. Each promoted field records the path of projections leading from
//! an instance to the value that declares it. When two fields share a name the shallowest
//! one wins, and two at the same depth are ambiguous.

use std::{any::Any, sync::Arc};

use fxhash::FxHashMap;

use super::{
    descriptor::{EmbedKind, EmbedStep, FieldDescriptor, ObjectFields, Projector, TypeDescriptor, TypeKind},
    RegistrationError,
};

pub(crate) struct RawEmbed {
    pub(crate) kind: EmbedKind,
    pub(crate) target: crate::types::NamedType,
    pub(crate) project: Projector,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigationError {
    #[error("cannot resolve field {field}: nil embedded pointer to {embedded}")]
    NilEmbeddedPointer { field: String, embedded: String },
    #[error("cannot resolve field {field}: unexpected value while reaching {embedded}")]
    UnexpectedValue { field: String, embedded: String },
}

pub(crate) fn promote(
    type_name: &str,
    direct: Vec<FieldDescriptor>,
    embeds: Vec<(RawEmbed, Arc<TypeDescriptor>)>,
) -> Result<ObjectFields, RegistrationError> {
    let mut steps = Vec::new();
    let mut candidates = direct;

    for (embed, descriptor) in embeds {
        let TypeKind::Object(inner) = descriptor.kind() else {
            return Err(RegistrationError::InvalidEmbedding {
                type_name: type_name.to_string(),
                embedded: descriptor.name().to_string(),
            });
        };

        let step = steps.len();
        steps.push(EmbedStep {
            kind: embed.kind,
            type_name: descriptor.name().to_string(),
            project: embed.project,
        });

        let offset = steps.len();
        steps.extend(inner.steps.iter().cloned());

        candidates.extend(inner.fields.iter().map(|field| {
            let mut promoted = field.clone();
            promoted.path = std::iter::once(step)
                .chain(field.path.iter().map(|inner_step| inner_step + offset))
                .collect();
            promoted
        }));
    }

    // Stable, so declaration order is kept among fields of the same depth.
    candidates.sort_by_key(FieldDescriptor::depth);

    let mut fields: Vec<FieldDescriptor> = Vec::with_capacity(candidates.len());
    let mut index: FxHashMap<String, usize> = FxHashMap::default();

    for candidate in candidates {
        match index.get(&candidate.name) {
            Some(&existing) if fields[existing].depth() == candidate.depth() => {
                return Err(if candidate.depth() == 0 {
                    RegistrationError::DuplicateName {
                        type_name: type_name.to_string(),
                        kind: "field",
                        name: candidate.name,
                    }
                } else {
                    RegistrationError::AmbiguousField {
                        type_name: type_name.to_string(),
                        field: candidate.name,
                    }
                });
            }
            // Shadowed by a shallower field.
            Some(_) => continue,
            None => {
                index.insert(candidate.name.clone(), fields.len());
                fields.push(candidate);
            }
        }
    }

    Ok(ObjectFields { steps, fields, index })
}

impl ObjectFields {
    /// Walks the embedding path of `field`, starting from an instance of the owning type.
    pub(crate) fn navigate<'a>(
        &self,
        field: &FieldDescriptor,
        root: &'a (dyn Any + 'static),
    ) -> Result<&'a (dyn Any + 'static), NavigationError> {
        let mut current = root;

        for &step in &field.path {
            let step = &self.steps[step];
            current = (step.project)(current).ok_or_else(|| match step.kind {
                EmbedKind::Pointer => NavigationError::NilEmbeddedPointer {
                    field: field.name.clone(),
                    embedded: step.type_name.clone(),
                },
                EmbedKind::Value => NavigationError::UnexpectedValue {
                    field: field.name.clone(),
                    embedded: step.type_name.clone(),
                },
            })?;
        }

        Ok(current)
    }
}
